use crate::{
    AppState,
    entity::Shareable,
    handlers::{entities, users},
    models::{Credential, Earning, Expense, Lead, Project},
};
use axum::{
    Router,
    routing::{get, put},
};

/// Authenticated Router Module
///
/// Routes for any admin or super-admin session. The layer applied in
/// `create_router` rejects requests without one before a handler runs; the
/// handlers then scope every read and write to the caller's ACL membership.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET/PUT /me
        .route("/me", get(users::get_me).put(users::update_me))
        // PUT /me/password
        .route("/me/password", put(users::change_password))
        // --- Shareable collections ---
        .merge(entity_routes::<Credential>())
        .merge(entity_routes::<Lead>())
        .merge(entity_routes::<Project>())
        .merge(entity_routes::<Expense>())
        .merge(entity_routes::<Earning>())
}

/// CRUD for one shareable kind, mounted at `/{collection}`.
fn entity_routes<T: Shareable>() -> Router<AppState> {
    let collection = T::KIND.collection();
    Router::new()
        // GET  /{collection}?page=&limit=&search=&sortBy=&sortOrder=&<filter>=
        // POST /{collection}
        .route(
            &format!("/{collection}"),
            get(entities::list_accessible::<T>).post(entities::create::<T>),
        )
        // GET/PUT/DELETE /{collection}/{id}
        .route(
            &format!("/{collection}/{{id}}"),
            get(entities::get::<T>)
                .put(entities::update::<T>)
                .delete(entities::delete::<T>),
        )
}
