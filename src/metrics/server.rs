use std::sync::Arc;

use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use prometheus::{Encoder, TextEncoder};

use super::DispatchMetrics;

/// Serve `/metrics` and `/health` until the server is stopped.
/// Runs its own actix system, so call it from a dedicated thread.
pub async fn start_metrics_server(metrics: Arc<DispatchMetrics>, port: u16) -> std::io::Result<()> {
    tracing::info!("📊 Starting metrics server on http://0.0.0.0:{}/metrics", port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::from(metrics.clone()))
            .configure(routes)
    })
    .workers(1)
    .bind(("0.0.0.0", port))?
    .run()
    .await
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/metrics", web::get().to(metrics_handler))
        .route("/health", web::get().to(health_handler));
}

async fn metrics_handler(metrics: web::Data<DispatchMetrics>) -> impl Responder {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metrics.registry().gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buffer)
}

/// Healthy unless the backend circuit breaker is open
async fn health_handler(metrics: web::Data<DispatchMetrics>) -> impl Responder {
    let breaker = match metrics.circuit_breaker_state.get() {
        1 => "open",
        2 => "half_open",
        _ => "closed",
    };

    let mut response = if breaker == "open" {
        HttpResponse::ServiceUnavailable()
    } else {
        HttpResponse::Ok()
    };

    response.json(serde_json::json!({
        "status": if breaker == "open" { "degraded" } else { "healthy" },
        "service": "order-lifecycle",
        "backend_circuit": breaker,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::test;

    fn shared_metrics() -> Arc<DispatchMetrics> {
        Arc::new(DispatchMetrics::new().unwrap())
    }

    #[actix_web::test]
    async fn test_metrics_endpoint_exposes_transition_counters() {
        let metrics = shared_metrics();
        metrics.record_outcome("confirm", "accepted");

        let app = test::init_service(
            App::new()
                .app_data(web::Data::from(metrics.clone()))
                .configure(routes),
        )
        .await;

        let request = test::TestRequest::get().uri("/metrics").to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = test::read_body(response).await;
        let text = String::from_utf8(body.to_vec()).unwrap();
        let line = text
            .lines()
            .find(|line| line.starts_with("order_transitions_total{"))
            .unwrap();
        assert!(line.contains("outcome=\"accepted\""));
        assert!(line.contains("transition=\"confirm\""));
        assert!(line.ends_with(" 1"));
    }

    #[actix_web::test]
    async fn test_health_follows_circuit_breaker() {
        let metrics = shared_metrics();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::from(metrics.clone()))
                .configure(routes),
        )
        .await;

        let request = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["backend_circuit"], "closed");

        metrics.set_circuit_breaker_state(1);

        let request = test::TestRequest::get().uri("/health").to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: serde_json::Value = test::read_body_json(response).await;
        assert_eq!(body["status"], "degraded");
    }
}
