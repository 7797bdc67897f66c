//! Generic controllers for every `Shareable` kind.
//!
//! The router instantiates each handler once per kind (`create::<Lead>`, ...),
//! so visibility rules and response shapes are identical across collections.

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::StatusCode,
};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    auth::{AdminUser, AuthUser, RootUser},
    entity::{CreateRecordRequest, Document, DocumentQuery, Record, Shareable},
    error::ApiError,
    extract::{Json, Path},
    models::{AccessToggleRequest, MessageResponse, Page},
    repository::RepositoryState,
};

fn into_record<T: Shareable>(doc: Document) -> Result<Record<T>, ApiError> {
    Record::try_from(doc).map_err(|e| {
        ApiError::Internal(format!("stored {} is malformed: {e}", T::KIND.collection()))
    })
}

fn into_records<T: Shareable>(page: Page<Document>) -> Result<Page<Record<T>>, ApiError> {
    let items = page
        .items
        .into_iter()
        .map(into_record::<T>)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Page {
        items,
        pagination: page.pagination,
    })
}

fn body_of<T: Shareable>(body: &T) -> Result<Map<String, Value>, ApiError> {
    Document::body_from(body).map_err(|e| ApiError::Internal(format!("failed to encode body: {e}")))
}

/// Loads a document the caller may see. Missing and hidden are both 404, so an
/// admin cannot discover ids outside their ACL.
async fn load_visible<T: Shareable>(
    repo: &RepositoryState,
    user: &AuthUser,
    id: Uuid,
) -> Result<Document, ApiError> {
    repo.get_document(T::KIND, id)
        .await?
        .filter(|doc| user.is_super_admin || doc.is_visible_to(user.id))
        .ok_or_else(|| T::KIND.not_found())
}

/// create
///
/// [Authenticated Route] `POST /{collection}`. The optional `accesibles` list
/// seeds the ACL; a non-super-admin creator is always added to it.
pub async fn create<T: Shareable>(
    AdminUser(user): AdminUser,
    State(repo): State<RepositoryState>,
    Json(payload): Json<CreateRecordRequest<T>>,
) -> Result<(StatusCode, Json<Record<T>>), ApiError> {
    payload.body.validate_new()?;

    let mut accessibles = payload.accessibles;
    if !user.is_super_admin && !accessibles.contains(&user.id) {
        accessibles.push(user.id);
    }

    let doc = Document::new(body_of(&payload.body)?, accessibles, Some(user.id));
    let doc = repo.insert_document(T::KIND, doc).await?;

    tracing::info!(kind = T::KIND.collection(), id = %doc.id, created_by = %user.id, "record created");
    Ok((StatusCode::CREATED, Json(into_record(doc)?)))
}

/// list_accessible
///
/// [Authenticated Route] `GET /{collection}`. Admins see the records whose ACL
/// names them; super-admins see everything.
pub async fn list_accessible<T: Shareable>(
    AdminUser(user): AdminUser,
    State(repo): State<RepositoryState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Page<Record<T>>>, ApiError> {
    let query = DocumentQuery::parse::<T>(&params, user.acl_viewer());
    let page = repo.list_documents(T::KIND, &query).await?;
    Ok(Json(into_records(page)?))
}

/// list_all
///
/// [Root Route] `GET /root/{collection}`. Ignores ACLs.
pub async fn list_all<T: Shareable>(
    _root: RootUser,
    State(repo): State<RepositoryState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Page<Record<T>>>, ApiError> {
    let query = DocumentQuery::parse::<T>(&params, None);
    let page = repo.list_documents(T::KIND, &query).await?;
    Ok(Json(into_records(page)?))
}

/// get
///
/// [Authenticated Route] `GET /{collection}/{id}`.
pub async fn get<T: Shareable>(
    AdminUser(user): AdminUser,
    State(repo): State<RepositoryState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Record<T>>, ApiError> {
    let doc = load_visible::<T>(&repo, &user, id).await?;
    Ok(Json(into_record(doc)?))
}

/// update
///
/// [Authenticated Route] `PUT /{collection}/{id}`. Shallow merge of the fields
/// present in the body; the ACL is only changed through the access toggle.
pub async fn update<T: Shareable>(
    AdminUser(user): AdminUser,
    State(repo): State<RepositoryState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<T>,
) -> Result<Json<Record<T>>, ApiError> {
    load_visible::<T>(&repo, &user, id).await?;
    payload.validate_patch()?;

    let doc = repo
        .update_document(T::KIND, id, body_of(&payload)?)
        .await?
        .ok_or_else(|| T::KIND.not_found())?;

    tracing::debug!(kind = T::KIND.collection(), %id, "record updated");
    Ok(Json(into_record(doc)?))
}

/// delete
///
/// [Authenticated Route] `DELETE /{collection}/{id}`. Hard delete.
pub async fn delete<T: Shareable>(
    AdminUser(user): AdminUser,
    State(repo): State<RepositoryState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    load_visible::<T>(&repo, &user, id).await?;

    if !repo.delete_document(T::KIND, id).await? {
        return Err(T::KIND.not_found());
    }

    tracing::info!(kind = T::KIND.collection(), %id, deleted_by = %user.id, "record deleted");
    Ok(Json(MessageResponse::new(format!(
        "{} deleted successfully",
        T::KIND.label()
    ))))
}

/// toggle_access
///
/// [Root Route] `POST /root/{collection}/{id}/access`. Flips each target's
/// membership in the record's ACL and reports the outcome per target alongside
/// the updated record.
pub async fn toggle_access<T: Shareable>(
    RootUser(root): RootUser,
    State(repo): State<RepositoryState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AccessToggleRequest>,
) -> Result<Json<Value>, ApiError> {
    let targets = payload.targets();
    if targets.is_empty() {
        return Err(ApiError::validation("userIds is required"));
    }

    let (doc, results) = repo
        .toggle_access(T::KIND, id, &targets)
        .await?
        .ok_or_else(|| T::KIND.not_found())?;

    tracing::info!(
        kind = T::KIND.collection(),
        %id,
        targets = targets.len(),
        toggled_by = %root.id,
        "access toggled"
    );

    let record = into_record::<T>(doc)?;
    let encode = |e: serde_json::Error| ApiError::Internal(format!("failed to encode response: {e}"));
    let mut body = Map::new();
    body.insert("results".to_string(), serde_json::to_value(&results).map_err(encode)?);
    body.insert(
        T::KIND.singular().to_string(),
        serde_json::to_value(&record).map_err(encode)?,
    );
    Ok(Json(Value::Object(body)))
}
