use axum::{Json, extract::State};

use crate::{
    auth::RootUser, error::ApiError, models::DashboardStats, repository::RepositoryState,
};

/// get_stats
///
/// [Root Route] Dashboard counters, recomputed on every call.
#[utoipa::path(
    get,
    path = "/root/stats",
    responses((status = 200, description = "Dashboard stats", body = DashboardStats))
)]
pub async fn get_stats(
    _root: RootUser,
    State(repo): State<RepositoryState>,
) -> Result<Json<DashboardStats>, ApiError> {
    Ok(Json(repo.get_stats().await?))
}
