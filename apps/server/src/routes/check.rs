use actix_web::{HttpResponse, post, web};

use crate::error::ApiError;
use crate::state::AppState;

macros_utils::routes! {
    route check_route,
    route check_all_route,
}

/// Check a single site right away and report `{"up": bool}`
#[post("/check/{site_id}")]
pub async fn check_route(
    state: web::Data<AppState>,
    site_id: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let outcome = state.executor.check_site(site_id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// Run a full sweep and wait for it. Individual site failures are logged by
/// the scheduler and do not fail the request.
#[post("/check-all")]
pub async fn check_all_route(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    state.scheduler.sweep_all().await?;
    Ok(HttpResponse::Ok().finish())
}
