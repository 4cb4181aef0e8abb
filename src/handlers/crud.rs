//! List, read, create (plain, `_create`, `_upsert`), update, delete and their bulk forms.

use crate::error::ApiError;
use crate::handlers::{RequestContext, ResourceBinding};
use crate::response::Reply;
use crate::store::Document;
use serde_json::{Map, Value};

pub async fn list(res: &ResourceBinding, ctx: &RequestContext) -> Result<Reply, ApiError> {
    let query = ctx.url_query()?;
    let docs = res.store.find(&res.model, &query).await?;
    let mut items = Vec::with_capacity(docs.len());
    for doc in docs {
        match res.apply(doc, ctx.operator.as_ref()) {
            Ok(doc) => items.push(res.serialize(&doc)),
            Err(ApiError::UnauthorizedAction(_)) => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(Reply::many(items))
}

pub async fn read(res: &ResourceBinding, ctx: &RequestContext) -> Result<Reply, ApiError> {
    let doc = res.store.get(&res.model, ctx.require_id()?, &ctx.url_query()?).await?;
    let doc = res.apply(doc, ctx.operator.as_ref())?;
    Ok(Reply::ok(res.serialize(&doc)))
}

pub async fn create(res: &ResourceBinding, ctx: &RequestContext) -> Result<Reply, ApiError> {
    let body = ctx.body_or_empty();
    match (body.get("_create"), body.get("_upsert")) {
        (Some(_), Some(_)) => Err(ApiError::BadRequest(
            "_create and _upsert cannot be used together".into(),
        )),
        (None, Some(upsert)) => upsert_one(res, ctx, upsert).await,
        (Some(Value::Array(items)), None) => {
            let mut created = Vec::with_capacity(items.len());
            for item in items {
                let doc = create_one(res, ctx, object_or_empty(item, "_create item")?).await?;
                created.push(res.serialize(&doc));
            }
            Ok(Reply::many(created))
        }
        (Some(Value::Object(spec)), None) => {
            let data = match spec.get("_data") {
                Some(data) => object_or_empty(data, "_create._data")?,
                None => Map::new(),
            };
            let doc = create_one(res, ctx, data).await?;
            Ok(Reply::ok(res.serialize(&doc)))
        }
        (Some(_), None) => Err(ApiError::BadRequest(
            "_create must be an object or a list".into(),
        )),
        (None, None) => {
            let doc = create_one(res, ctx, body).await?;
            Ok(Reply::ok(res.serialize(&doc)))
        }
    }
}

async fn create_one(
    res: &ResourceBinding,
    ctx: &RequestContext,
    fields: Map<String, Value>,
) -> Result<Document, ApiError> {
    let doc = res.store.construct(&res.model, fields)?;
    let doc = res.apply(doc, ctx.operator.as_ref())?;
    let doc = res.store.save(&res.model, doc).await?;
    res.refetch(doc, ctx).await
}

async fn upsert_one(res: &ResourceBinding, ctx: &RequestContext, upsert: &Value) -> Result<Reply, ApiError> {
    let upsert = upsert
        .as_object()
        .ok_or_else(|| ApiError::BadRequest("_upsert must be an object".into()))?;
    let data = match upsert.get("_data") {
        Some(Value::Object(data)) => data.clone(),
        Some(_) => return Err(ApiError::BadRequest("_upsert._data must be an object".into())),
        None => return Err(ApiError::BadRequest("_upsert requires _data".into())),
    };
    let filter = upsert
        .get("_query")
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));
    let query = ctx.composed_query(&filter)?;

    let doc = match res.store.find_one(&res.model, &query).await? {
        Some(found) => {
            let found = res.apply(found, ctx.operator.as_ref())?;
            res.store.set_fields(&res.model, found, data)?
        }
        None => {
            let fresh = res.store.construct(&res.model, data)?;
            res.apply(fresh, ctx.operator.as_ref())?
        }
    };
    let doc = res.store.save(&res.model, doc).await?;
    let doc = res.refetch(doc, ctx).await?;
    Ok(Reply::ok(res.serialize(&doc)))
}

pub async fn update(res: &ResourceBinding, ctx: &RequestContext) -> Result<Reply, ApiError> {
    let doc = res.store.get(&res.model, ctx.require_id()?, &ctx.url_query()?).await?;
    let doc = res.apply(doc, ctx.operator.as_ref())?;
    let doc = res.store.set_fields(&res.model, doc, ctx.body_or_empty())?;
    let doc = res.store.save(&res.model, doc).await?;
    Ok(Reply::ok(res.serialize(&doc)))
}

/// Sequential; stops at the first failure and keeps earlier saves.
pub async fn update_many(res: &ResourceBinding, ctx: &RequestContext) -> Result<Reply, ApiError> {
    let body = ctx.body_or_empty();
    let spec = body
        .get("_update")
        .and_then(Value::as_object)
        .ok_or_else(|| ApiError::BadRequest("bulk update requires an _update object".into()))?;
    let data = spec
        .get("_data")
        .and_then(Value::as_object)
        .cloned()
        .ok_or_else(|| ApiError::BadRequest("_update requires _data".into()))?;
    let filter = spec
        .get("_query")
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));
    let query = ctx.composed_query(&filter)?;

    let docs = res.store.find(&res.model, &query).await?;
    let mut updated = Vec::with_capacity(docs.len());
    for doc in docs {
        let doc = res.apply(doc, ctx.operator.as_ref())?;
        let doc = res.store.set_fields(&res.model, doc, data.clone())?;
        let doc = res.store.save(&res.model, doc).await?;
        updated.push(res.serialize(&doc));
    }
    Ok(Reply::many(updated))
}

pub async fn delete(res: &ResourceBinding, ctx: &RequestContext) -> Result<Reply, ApiError> {
    let doc = res.store.get(&res.model, ctx.require_id()?, &ctx.url_query()?).await?;
    let doc = res.apply(doc, ctx.operator.as_ref())?;
    res.store.delete(&res.model, doc).await?;
    Ok(Reply::no_content())
}

/// Sequential; stops at the first failure and keeps earlier deletions.
pub async fn delete_many(res: &ResourceBinding, ctx: &RequestContext) -> Result<Reply, ApiError> {
    let docs = res.store.find(&res.model, &ctx.url_query()?).await?;
    for doc in docs {
        let doc = res.apply(doc, ctx.operator.as_ref())?;
        res.store.delete(&res.model, doc).await?;
    }
    Ok(Reply::no_content())
}

fn object_or_empty(v: &Value, what: &str) -> Result<Map<String, Value>, ApiError> {
    match v {
        Value::Object(map) => Ok(map.clone()),
        Value::Null => Ok(Map::new()),
        _ => Err(ApiError::BadRequest(format!("{} must be an object", what))),
    }
}
