//! Ingestion and dump handlers.
//!
//! Ingestion never answers with an error status: failures are echoed back
//! as `Error: ...` text with a 200, which is what existing webhook senders
//! expect.

use actix_web::http::header::ContentType;
use actix_web::{HttpResponse, web};
use broker::{NormalizeError, Normalized, Normalizer, StoreHandle};
use futures::StreamExt;
use tracing::{info, warn};

/// Largest body accepted by the ingestion route
const MAX_BODY_SIZE: usize = 1024 * 1024;

fn plain_text(body: String) -> HttpResponse {
    HttpResponse::Ok().content_type(ContentType::plaintext()).body(body)
}

fn error_text(err: &dyn std::fmt::Display) -> HttpResponse {
    warn!("Rejected state: {err}");
    plain_text(format!("Error: {err}\n"))
}

async fn read_body(mut payload: web::Payload) -> Result<web::BytesMut, NormalizeError> {
    let mut body = web::BytesMut::new();

    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|err| NormalizeError::Body(err.to_string()))?;
        if body.len() + chunk.len() > MAX_BODY_SIZE {
            return Err(NormalizeError::Body(format!(
                "body is larger than {MAX_BODY_SIZE} bytes"
            )));
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}

/// `POST <path>`: normalize a payload and cache the resulting state
pub async fn ingest_state(
    normalizer: web::Data<Normalizer>,
    store: web::Data<StoreHandle>,
    payload: web::Payload,
) -> HttpResponse {
    let body = match read_body(payload).await {
        Ok(body) => body,
        Err(err) => return error_text(&err),
    };

    let (state, shape) = match normalizer.ingest(&body).await {
        Ok(Normalized::State { state, shape }) => (state, shape),
        Ok(Normalized::Confirmation { .. }) => return HttpResponse::Ok().finish(),
        Err(err) => return error_text(&err),
    };

    let echoed = match serde_json::to_string(&state) {
        Ok(json) => json,
        Err(err) => return error_text(&err),
    };

    if let Err(err) = store.upsert(state).await {
        return error_text(&err);
    }

    info!(shape = %shape, "Caching state: {echoed}");
    plain_text(format!("Caching state: {echoed}\n"))
}

/// `GET <path>`: every cached state keyed by `entity:check`
pub async fn dump_states(store: web::Data<StoreHandle>) -> HttpResponse {
    match store.snapshot().await {
        Ok(snapshot) => HttpResponse::Ok().json(snapshot),
        Err(err) => {
            warn!("Couldn't dump states: {err}");
            HttpResponse::ServiceUnavailable().body(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use actix_web::dev::ServerHandle;
    use actix_web::{App, HttpServer, http::StatusCode, test};
    use broker::StateStore;
    use broker::config::IntakeConfig;
    use serde_json::{Value, json};
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::routes;

    fn spawn_store() -> (StoreHandle, CancellationToken) {
        let (store, handle) = StateStore::new(&IntakeConfig::default());
        let shutdown = CancellationToken::new();
        tokio::spawn(store.run(shutdown.clone()));
        (handle, shutdown)
    }

    async fn count_confirmation(hits: web::Data<AtomicUsize>) -> HttpResponse {
        hits.fetch_add(1, Ordering::SeqCst);
        HttpResponse::Ok().body("<ConfirmSubscriptionResponse/>")
    }

    /// Local stand-in for SNS, counting fetches of `/confirm`
    fn spawn_confirmation_target() -> (String, web::Data<AtomicUsize>, ServerHandle) {
        let hits = web::Data::new(AtomicUsize::new(0));
        let counter = hits.clone();

        let server = HttpServer::new(move || {
            App::new()
                .app_data(counter.clone())
                .route("/confirm", web::get().to(count_confirmation))
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();

        let addr = server.addrs()[0];
        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);

        (format!("http://{addr}"), hits, handle)
    }

    fn confirmation_payload(target: &str, path: &str) -> String {
        json!({
            "Type": "SubscriptionConfirmation",
            "Message": "You have chosen to subscribe to the topic",
            "SubscribeURL": format!("{target}{path}"),
            "SigningCertURL": format!("{target}/cert.pem")
        })
        .to_string()
    }

    macro_rules! app {
        ($store:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new(Normalizer::new(Duration::from_secs(1)).unwrap()))
                    .app_data(web::Data::new($store))
                    .configure(routes::configure("/state")),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_posted_state_is_cached_and_dumped() {
        let (store, _shutdown) = spawn_store();
        let app = app!(store);

        let req = test::TestRequest::post()
            .uri("/state")
            .set_payload(r#"{"entity":"web1","check":"ping","state":"ok","summary":"fine"}"#)
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        let body = std::str::from_utf8(&body).unwrap();
        assert!(body.starts_with("Caching state: {"));
        assert!(body.ends_with("}\n"));

        let req = test::TestRequest::get().uri("/state").to_request();
        let dump: Value = test::call_and_read_body_json(&app, req).await;
        let cached = &dump["web1:ping"];
        assert_eq!(cached["type"], "service");
        assert_eq!(cached["ttl"], 300);
        assert_eq!(cached["summary"], "fine");
        assert_eq!(cached["tags"], json!({"from_broker": "httpbroker"}));
    }

    #[actix_web::test]
    async fn test_bad_payload_is_echoed_with_ok_status() {
        let (store, _shutdown) = spawn_store();
        let app = app!(store.clone());

        let req = test::TestRequest::post().uri("/state").set_payload("entity=web1").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = test::read_body(resp).await;
        assert!(body.starts_with(b"Error: Couldn't read request body"));
        assert!(store.snapshot().await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_oversized_body_is_rejected() {
        let (store, _shutdown) = spawn_store();
        let app = app!(store);

        let req = test::TestRequest::post()
            .uri("/state")
            .set_payload(vec![b' '; MAX_BODY_SIZE + 1])
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert!(body.starts_with(b"Error: "));
    }

    #[actix_web::test]
    async fn test_subscription_is_confirmed_without_caching() {
        let (target, hits, target_handle) = spawn_confirmation_target();
        let (store, _shutdown) = spawn_store();
        let app = app!(store.clone());

        let req = test::TestRequest::post()
            .uri("/state")
            .set_payload(confirmation_payload(&target, "/confirm"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(test::read_body(resp).await.is_empty());

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(store.snapshot().await.unwrap().is_empty());
        target_handle.stop(true).await;
    }

    #[actix_web::test]
    async fn test_failed_confirmation_is_echoed() {
        let (target, hits, target_handle) = spawn_confirmation_target();
        let (store, _shutdown) = spawn_store();
        let app = app!(store.clone());

        let req = test::TestRequest::post()
            .uri("/state")
            .set_payload(confirmation_payload(&target, "/missing"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = test::read_body(resp).await;
        assert!(body.starts_with(b"Error: Couldn't confirm subscription"));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(store.snapshot().await.unwrap().is_empty());
        target_handle.stop(true).await;
    }

    #[actix_web::test]
    async fn test_health_follows_the_store() {
        let (store, shutdown) = spawn_store();
        let app = app!(store);

        let req = test::TestRequest::get().uri("/health").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        shutdown.cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let req = test::TestRequest::get().uri("/health").to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
