mod health;
mod state;

use actix_web::web;

/// Mount the health check and the state routes, the latter under `state_path`
pub fn configure(state_path: &str) -> impl FnOnce(&mut web::ServiceConfig) + '_ {
    move |cfg| {
        health::routes(cfg);
        cfg.service(
            web::resource(state_path)
                .route(web::post().to(state::ingest_state))
                .route(web::get().to(state::dump_states)),
        );
    }
}
