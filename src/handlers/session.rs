//! Session: exchange one identity and one credential for a signed token.

use crate::auth::TokenClaims;
use crate::config::FieldKeys;
use crate::error::ApiError;
use crate::handlers::{RequestContext, ResourceBinding};
use crate::query::Query;
use crate::response::Reply;
use crate::store::Operator;
use chrono::Utc;
use serde_json::{Map, Value};

pub async fn session(res: &ResourceBinding, ctx: &RequestContext) -> Result<Reply, ApiError> {
    let auth = res
        .config
        .auth
        .as_ref()
        .ok_or_else(|| ApiError::Internal(format!("{} has no session config", res.model.class_name)))?;
    let body = ctx.body_or_empty();

    let (identity, identity_value) = single(&body, &auth.identity_fields)
        .map_err(|many| ApiError::Authentication(pick(many, "no identity provided", "multiple identities provided")))?;
    let (credential, credential_value) = single(&body, &auth.credential_fields).map_err(|many| {
        ApiError::Authentication(pick(many, "no authentication provided", "multiple authentications provided"))
    })?;

    let query = Query::by(identity.name.clone(), identity_value.clone());
    let doc = res
        .store
        .find_one(&res.model, &query)
        .await?
        .ok_or_else(|| ApiError::Authentication("authorizable unit not found".into()))?;

    res.store
        .verify_credential(&res.model, &doc, &credential.name, credential_value)
        .map_err(|e| match e {
            ApiError::Validation { message, .. } => ApiError::Authentication(message),
            other => other,
        })?;

    let id = doc.require_id()?.to_string();
    let lifetime = chrono::Duration::from_std(auth.token_lifetime)
        .map_err(|e| ApiError::Internal(format!("token lifetime: {}", e)))?;
    let claims = TokenClaims::new(res.model.class_name.clone(), id.clone(), Utc::now() + lifetime);
    let token = res.signer.sign(&claims)?;

    let operator = Operator {
        class_name: res.model.class_name.clone(),
        id: id.clone(),
    };
    let doc = res.apply(doc, Some(&operator))?;
    let doc = if ctx.query.is_some() {
        let fresh = res.store.get(&res.model, &id, &ctx.url_query()?).await?;
        res.apply(fresh, Some(&operator))?
    } else {
        doc
    };
    tracing::debug!(class = %res.model.class_name, id = %id, "session issued");

    let mut out = Map::new();
    out.insert("token".into(), Value::String(token));
    out.insert(auth.singular_name.clone(), res.serialize(&doc));
    Ok(Reply::ok(Value::Object(out)))
}

/// The one field of `candidates` present in `body`. `Err(false)` when none is, `Err(true)`
/// when several are.
fn single<'a>(body: &'a Map<String, Value>, candidates: &'a [FieldKeys]) -> Result<(&'a FieldKeys, &'a Value), bool> {
    let mut hits = body
        .iter()
        .filter_map(|(k, v)| candidates.iter().find(|f| f.answers_to(k)).map(|f| (f, v)));
    match (hits.next(), hits.next()) {
        (Some(hit), None) => Ok(hit),
        (None, _) => Err(false),
        (Some(_), Some(_)) => Err(true),
    }
}

fn pick(many: bool, none: &str, multiple: &str) -> String {
    let message = if many { multiple } else { none };
    message.to_string()
}
