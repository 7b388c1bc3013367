use actix_web::{HttpResponse, get, web};
use serde::Serialize;
use uptime_service::SiteStatus;

use crate::error::ApiError;
use crate::state::AppState;

macros_utils::routes! {
    route status_route,
}

#[derive(Serialize)]
struct StatusResponse {
    sites: Vec<SiteStatus>,
}

/// Current up/down status of every site that has been checked
#[get("/status")]
pub async fn status_route(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let sites = state.status.current_status().await?;
    Ok(HttpResponse::Ok().json(StatusResponse { sites }))
}
