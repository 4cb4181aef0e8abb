//! Ensure: upsert keyed by the model's unique fields.

use crate::error::ApiError;
use crate::handlers::{RequestContext, ResourceBinding};
use crate::query::Query;
use crate::response::Reply;
use serde_json::Map;

/// Split the body into a matcher (non-null unique fields) and an updater (everything
/// else). An empty matcher always creates.
pub async fn ensure(res: &ResourceBinding, ctx: &RequestContext) -> Result<Reply, ApiError> {
    let body = ctx.body_or_empty();
    let mut matcher = Map::new();
    let mut updater = Map::new();
    for (key, value) in &body {
        let unique = res.model.unique_fields().any(|f| f.answers_to(key));
        if !unique {
            updater.insert(key.clone(), value.clone());
        } else if !value.is_null() {
            matcher.insert(key.clone(), value.clone());
        }
    }

    let found = if matcher.is_empty() {
        None
    } else {
        res.store
            .find_one(&res.model, &Query::from_filter(matcher)?)
            .await?
    };
    let doc = match found {
        Some(doc) => {
            let doc = res.apply(doc, ctx.operator.as_ref())?;
            res.store.set_fields(&res.model, doc, updater)?
        }
        None => {
            let doc = res.store.construct(&res.model, body)?;
            res.apply(doc, ctx.operator.as_ref())?
        }
    };
    let doc = res.store.save(&res.model, doc).await?;
    Ok(Reply::ok(res.serialize(&doc)))
}
