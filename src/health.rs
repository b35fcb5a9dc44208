//! The long-running health monitor mode.
//!
//! Resolves the cluster's DNS record on an interval and probes each resolved
//! member's health endpoint, emitting per-member health metrics. This mode is
//! purely observational: it never mutates cluster membership. Resolution
//! failures and failed probes are logged and the loop continues, self-
//! correcting on the next interval.

use std::mem::MaybeUninit;
use std::net::IpAddr;
use std::sync::{Arc, Once};

use anyhow::{Context, Result};
use axum::extract::Extension;
use axum::http::{header::HeaderName, HeaderMap, HeaderValue, StatusCode};
use axum::{routing::get, AddExtensionLayer, Router};
use futures::prelude::*;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::SignalStream;
use tokio_stream::StreamMap;
use trust_dns_resolver::TokioAsyncResolver;

use crate::config::Config;
use crate::error::BootError;

/// The health monitor for when this controller is running in healthcheck mode.
pub struct HealthMonitor {
    config: Arc<Config>,
    resolver: TokioAsyncResolver,
    http: reqwest::Client,
    record: String,
}

impl HealthMonitor {
    /// Create a new instance.
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let record = config
            .dns_record
            .clone()
            .context("DNS_RECORD must be set for healthcheck mode")?;
        let resolver = TokioAsyncResolver::tokio_from_system_conf().context("error building DNS resolver from system config")?;
        let http = reqwest::Client::builder()
            .timeout(config.probe_timeout())
            .build()
            .context("error building health probe HTTP client")?;
        Ok(Self { config, resolver, http, record })
    }

    /// Run the monitor loop until an interrupt signal arrives.
    pub async fn run(self) -> Result<()> {
        let recorder = get_metrics_recorder(&self.record);
        metrics::set_recorder(recorder).context("error setting prometheus metrics recorder")?;
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let metrics_server = spawn_prom_server(&self.config, recorder.handle(), shutdown_rx);

        let mut signals = StreamMap::new();
        signals.insert("sigterm", SignalStream::new(signal(SignalKind::terminate()).context("error building signal stream")?));
        signals.insert("sigint", SignalStream::new(signal(SignalKind::interrupt()).context("error building signal stream")?));
        let period = self.config.healthcheck_interval();
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        loop {
            tokio::select! {
                _ = interval.tick() => self.cycle().await,
                Some((_, sig)) = signals.next() => {
                    tracing::info!(signal = ?sig, "signal received, stopping health monitor");
                    break;
                }
            }
        }

        let _ = shutdown_tx.send(());
        if let Err(err) = metrics_server.await.context("error joining metrics server handle").and_then(|res| res) {
            tracing::error!(error = ?err, "error shutting down metrics server");
        }
        Err(BootError::HealthLoopInterrupted.into())
    }

    /// One resolve & probe cycle. Failures are logged and the loop continues.
    async fn cycle(&self) {
        let addrs: Vec<IpAddr> = match self.resolver.lookup_ip(self.record.as_str()).await {
            Ok(lookup) => lookup.iter().collect(),
            Err(err) => {
                tracing::error!(error = ?err, record = %self.record, "DNS resolution failed, will retry next interval");
                return;
            }
        };
        if addrs.is_empty() {
            tracing::error!(record = %self.record, "DNS record resolved to no addresses, will retry next interval");
            return;
        }

        let mut healthy = 0usize;
        for addr in addrs {
            let url = format!("{}://{}:{}{}", self.config.scheme, addr, self.config.client_port, self.config.health_path);
            if probe_endpoint(&self.http, &url).await {
                healthy += 1;
                metrics::gauge!("cluster_member_up", 1.0, "member" => addr.to_string());
            } else {
                metrics::gauge!("cluster_member_up", 0.0, "member" => addr.to_string());
            }
        }
        metrics::gauge!("cluster_members_healthy", healthy as f64);
        tracing::info!(healthy, record = %self.record, "health cycle complete");
    }
}

/// Probe a member's health endpoint, classifying it healthy on any 2xx response.
pub(crate) async fn probe_endpoint(http: &reqwest::Client, url: &str) -> bool {
    match http.get(url).send().await {
        Ok(res) if res.status().is_success() => true,
        Ok(res) => {
            tracing::error!(url, status = %res.status(), "member health endpoint returned failure");
            false
        }
        Err(err) => {
            tracing::error!(url, error = ?err, "member health probe failed");
            false
        }
    }
}

/// Get a handle to the metrics recorder, initializing it as needed.
fn get_metrics_recorder(record: &str) -> &'static PrometheusRecorder {
    static mut RECORDER: MaybeUninit<PrometheusRecorder> = MaybeUninit::uninit();
    static ONCE: Once = Once::new();
    unsafe {
        ONCE.call_once(|| {
            RECORDER.write(PrometheusBuilder::new().add_global_label("record", record.to_string()).build());
        });
        RECORDER.assume_init_ref()
    }
}

/// Spawns a prometheus server which uses the default global registry for metrics.
fn spawn_prom_server(config: &Config, handle: PrometheusHandle, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<Result<()>> {
    let app = Router::new()
        .route("/metrics", get(prometheus_scrape))
        .layer(AddExtensionLayer::new(handle));
    let server = axum::Server::bind(&([0, 0, 0, 0], config.metrics_port).into())
        .serve(app.into_make_service())
        .with_graceful_shutdown(async move {
            let _res = shutdown.recv().await;
        });
    tracing::info!("metrics server is listening at 0.0.0.0:{}/metrics", config.metrics_port);
    tokio::spawn(server.map_err(anyhow::Error::from))
}

/// Handle Prometheus metrics scraping.
async fn prometheus_scrape(Extension(state): Extension<PrometheusHandle>) -> (StatusCode, HeaderMap, String) {
    let mut headers = HeaderMap::new();
    headers.insert(HeaderName::from_static("content-type"), HeaderValue::from_static("text/plain; version=0.0.4"));
    (StatusCode::OK, headers, state.render())
}
