//! Prometheus metrics endpoint, run as its own standalone service
//! alongside the rest of the platform.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::routing::get;
use axum::Router;
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::platform::config::ObservabilitySettings;
use crate::platform::service::ServiceRegistration;

pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

pub static TASKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("orchestrator_tasks_total", "Task lifecycle events by agent and outcome"),
        &["agent", "outcome"],
    )
    .expect("valid metric");
    REGISTRY.register(Box::new(counter.clone())).expect("register tasks_total");
    counter
});

pub static AGENTS_ACTIVE: Lazy<IntGaugeVec> = Lazy::new(|| {
    let gauge = IntGaugeVec::new(Opts::new("orchestrator_agents_active", "Registered agents by status"), &["status"])
        .expect("valid metric");
    REGISTRY.register(Box::new(gauge.clone())).expect("register agents_active");
    gauge
});

pub fn telemetry_service(settings: ObservabilitySettings) -> ServiceRegistration {
    ServiceRegistration::new(
        "telemetry",
        Arc::new(move |_ctx, token: CancellationToken| {
            let settings = settings.clone();
            tokio::spawn(async move {
                if !settings.enable_metrics {
                    return Ok(());
                }

                let app = Router::new().route("/metrics", get(metrics_handler));
                let addr = SocketAddr::from(([0, 0, 0, 0], settings.metrics_port));
                let shutdown = token.clone();

                let listener = tokio::net::TcpListener::bind(addr).await?;
                info!(port = settings.metrics_port, "telemetry server started");

                axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        shutdown.cancelled().await;
                        info!("shutting down telemetry server");
                    })
                    .await?;

                Ok::<(), anyhow::Error>(())
            })
        }),
    )
}

async fn metrics_handler() -> Result<String, axum::http::StatusCode> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|_| axum::http::StatusCode::INTERNAL_SERVER_ERROR)?;
    String::from_utf8(buffer).map_err(|_| axum::http::StatusCode::INTERNAL_SERVER_ERROR)
}
