//! Pipeline orchestration -- config resolution, assembly, and lifecycle.
//!
//! The [`Orchestrator`] owns one [`IntelligencePipeline`]. It loads the
//! optional scorer artifact, attaches the audit subscriber, starts the
//! log source and decides when to stop:
//!
//! - `replay`: when the file has been fully processed (or on a signal)
//! - `follow`: on `SIGTERM` / `SIGINT`

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use anyhow::Result;
use tracing::{debug, info, warn};

use emsight_core::bus::{EventBus, HandlerResult};
use emsight_core::config::{EmsightConfig, SourceMode};
use emsight_core::error::{ConfigError, EmsightError};
use emsight_core::event::BusMessage;
use emsight_core::pipeline::{HealthStatus, Pipeline};
use emsight_pipeline::{
    IntelligencePipeline, IntelligencePipelineBuilder, PipelineStats, load_scorer,
};

use crate::cli::DaemonCli;

/// Subscriber name of the audit logger.
const AUDIT_SUBSCRIBER: &str = "audit";

/// Number of incidents and anomalies the audit subscriber has recorded.
#[derive(Debug, Default)]
pub struct AuditCounts {
    incidents: AtomicU64,
    anomalies: AtomicU64,
}

impl AuditCounts {
    pub fn incidents(&self) -> u64 {
        self.incidents.load(Ordering::Relaxed)
    }

    pub fn anomalies(&self) -> u64 {
        self.anomalies.load(Ordering::Relaxed)
    }
}

/// The daemon orchestrator.
pub struct Orchestrator {
    /// Validated configuration the pipeline was built from.
    config: EmsightConfig,
    pipeline: IntelligencePipeline,
    audit: Arc<AuditCounts>,
    start_time: Instant,
}

impl Orchestrator {
    /// Load `emsight.toml` (file, then env overrides) and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, if validation
    /// fails, or if the pipeline cannot be assembled.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = EmsightConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {e}"))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-resolved configuration.
    ///
    /// A scorer is loaded only when `[anomaly].enabled` is set; a missing or
    /// invalid artifact leaves anomaly detection off without failing the build.
    pub async fn build_from_config(config: EmsightConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {e}"))?;

        emsight_core::metrics::describe_all();
        metrics::gauge!(
            emsight_core::metrics::DAEMON_BUILD_INFO,
            "version" => env!("CARGO_PKG_VERSION"),
            "mode" => config.ingestion.mode.to_string()
        )
        .set(1.0);

        let scorer = if config.anomaly.enabled && !config.anomaly.scorer_path.is_empty() {
            load_scorer(Some(Path::new(&config.anomaly.scorer_path))).await
        } else {
            debug!("anomaly detection disabled by configuration");
            None
        };

        let pipeline = IntelligencePipelineBuilder::new()
            .config(config.clone())
            .scorer(scorer)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build pipeline: {e}"))?;

        let audit = Arc::new(AuditCounts::default());
        attach_audit_subscriber(pipeline.bus(), Arc::clone(&audit));

        info!(
            source = %config.ingestion.source_file,
            mode = %config.ingestion.mode,
            anomaly = pipeline.anomaly().is_enabled(),
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            pipeline,
            audit,
            start_time: Instant::now(),
        })
    }

    /// Start the pipeline and run until `SIGTERM`/`SIGINT` or replay completion.
    pub async fn run(&mut self) -> Result<PipelineStats> {
        self.run_until(wait_for_shutdown_signal()).await
    }

    /// Start the pipeline and run until `shutdown` resolves or replay completes.
    ///
    /// In replay mode the last partial anomaly window is flushed once the
    /// file is exhausted. Returns the final pipeline counters.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<PipelineStats>
    where
        F: Future<Output = Result<&'static str>>,
    {
        self.pipeline
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start pipeline: {e}"))?;

        match self.config.ingestion.mode {
            SourceMode::Replay => {
                let finished = tokio::select! {
                    result = self.pipeline.wait_source() => Some(result),
                    signal = shutdown => {
                        let signal = signal?;
                        info!(signal, "shutdown signal received during replay");
                        None
                    }
                };

                match finished {
                    Some(Ok(lines)) => {
                        info!(lines, "replay complete");
                        if let Some(anomaly) = self.pipeline.flush_anomaly_window() {
                            debug!(score = anomaly.score, "final anomaly window flushed");
                        }
                    }
                    Some(Err(e)) => {
                        self.shutdown().await?;
                        return Err(anyhow::anyhow!("replay failed: {e}"));
                    }
                    None => {}
                }
            }
            SourceMode::Follow => {
                info!("following log source");
                let signal = shutdown.await?;
                info!(signal, "shutdown signal received");
            }
        }

        self.shutdown().await?;
        Ok(self.pipeline.stats())
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.pipeline
            .stop()
            .await
            .map_err(|e| anyhow::anyhow!("failed to stop pipeline: {e}"))?;
        info!(
            uptime_secs = self.start_time.elapsed().as_secs(),
            incidents = self.audit.incidents(),
            anomalies = self.audit.anomalies(),
            "emsight stopped"
        );
        Ok(())
    }

    /// Current pipeline health.
    pub async fn health(&self) -> HealthStatus {
        self.pipeline.health_check().await
    }

    pub fn config(&self) -> &EmsightConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &IntelligencePipeline {
        &self.pipeline
    }

    /// Counts recorded by the audit subscriber.
    pub fn audit(&self) -> &AuditCounts {
        &self.audit
    }
}

/// Resolve the effective configuration for a CLI invocation.
///
/// Order: config file (defaults when the file does not exist), then
/// `EMSIGHT_*` environment overrides, then CLI flags, then validation.
pub async fn resolve_config(cli: &DaemonCli) -> Result<EmsightConfig> {
    let mut config = match EmsightConfig::from_file(&cli.config).await {
        Ok(config) => config,
        Err(EmsightError::Config(ConfigError::FileNotFound { .. })) => EmsightConfig::default(),
        Err(e) => return Err(anyhow::anyhow!("failed to load config: {e}")),
    };
    config.apply_env_overrides();
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {e}"))?;
    Ok(config)
}

/// Log every incident and anomaly as a structured record.
fn attach_audit_subscriber(bus: &EventBus, counts: Arc<AuditCounts>) {
    bus.subscribe_all(AUDIT_SUBSCRIBER, move |msg| -> HandlerResult {
        match msg {
            BusMessage::Incident(incident) => {
                counts.incidents.fetch_add(1, Ordering::Relaxed);
                let record = serde_json::to_string(incident.as_ref())?;
                info!(
                    incident_id = %incident.id,
                    pattern = %incident.pattern,
                    severity = %incident.severity,
                    record = %record,
                    "incident"
                );
            }
            BusMessage::Anomaly(anomaly) => {
                counts.anomalies.fetch_add(1, Ordering::Relaxed);
                let record = serde_json::to_string(anomaly.as_ref())?;
                warn!(
                    score = anomaly.score,
                    explanation = %anomaly.explanation,
                    record = %record,
                    "anomaly"
                );
            }
            BusMessage::RawLog(_) | BusMessage::Canonical(_) => {}
        }
        Ok(())
    });
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {e}"))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {e}"))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("failed to listen for ctrl-c: {e}"))?;
    Ok("ctrl-c")
}
