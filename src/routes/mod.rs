// Route exports
pub mod events;

use actix_web::web;

pub use events::AppState;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/api/v1").configure(events::configure));
}
