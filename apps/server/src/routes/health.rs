use actix_web::{HttpResponse, Responder, get, web};
use broker::StoreHandle;
use tracing::warn;

macros_utils::routes! {
    route health_route,
}

/// Health check route
/// This route returns no content, the response status is enough: 503 once
/// the state store has stopped.
#[get("/health")]
pub async fn health_route(store: web::Data<StoreHandle>) -> impl Responder {
    if store.is_closed() {
        warn!("Health check failed: state store is not running");
        HttpResponse::ServiceUnavailable()
    } else {
        HttpResponse::Ok()
    }
}
