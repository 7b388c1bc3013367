use actix_web::web::ServiceConfig;

mod check;
mod health;
mod status;

pub fn routes(cfg: &mut ServiceConfig) {
    health::routes(cfg);
    check::routes(cfg);
    status::routes(cfg);
}
