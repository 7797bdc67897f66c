use crate::{
    AppState,
    entity::Shareable,
    handlers::{entities, stats, users},
    models::{Credential, Earning, Expense, Lead, Project},
};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Root Router Module
///
/// Super-admin surface. Every route requires a super-admin account AND a token
/// from the root issuer; an admin-issuer token is refused with 403 even for a
/// super-admin. `/root/login` itself lives in the public router.
pub fn root_routes() -> Router<AppState> {
    Router::new()
        // GET /root/stats
        // Counts, money totals and status buckets, computed per request.
        .route("/root/stats", get(stats::get_stats))
        // GET/POST /root/users
        .route("/root/users", get(users::list_users).post(users::create_user))
        // PUT/DELETE /root/users/{id}
        .route(
            "/root/users/{id}",
            put(users::update_user).delete(users::delete_user),
        )
        .merge(access_routes::<Credential>())
        .merge(access_routes::<Lead>())
        .merge(access_routes::<Project>())
        .merge(access_routes::<Expense>())
        .merge(access_routes::<Earning>())
}

fn access_routes<T: Shareable>() -> Router<AppState> {
    let collection = T::KIND.collection();
    Router::new()
        // GET /root/{collection}
        // Every record of the kind, ACL ignored. Same query parameters as the
        // authenticated listing.
        .route(&format!("/root/{collection}"), get(entities::list_all::<T>))
        // POST /root/{collection}/{id}/access
        // Toggles each listed user id in the record's `accesibles`.
        .route(
            &format!("/root/{collection}/{{id}}/access"),
            post(entities::toggle_access::<T>),
        )
}
