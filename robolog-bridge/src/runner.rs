//! Frame loop and bridge lifecycle.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use robolog::{FaultRegistry, LoggingManager, RunMode};
use robolog_common::{FaultSnapshot, connect, init_tracing};
use tokio::signal;
use tokio::time::MissedTickBehavior;
use zenoh::sample::{Locality, SampleKind};

use crate::BridgeArgs;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::publisher::{PublishStats, Publisher};
use crate::status::StatusPublisher;
use crate::tuning::{Inbound, apply_write, classify};

/// The telemetry objects driven by the frame loop.
#[derive(Debug, Default)]
pub struct Telemetry {
    pub manager: LoggingManager,
    pub faults: FaultRegistry,
}

impl Telemetry {
    pub fn new(manager: LoggingManager) -> Self {
        Self {
            manager,
            faults: FaultRegistry::new(),
        }
    }

    /// Build the manager and its sinks from the `robolog` config section.
    pub fn from_config(config: &BridgeConfig) -> Result<Self> {
        Ok(Self::new(LoggingManager::from_config(&config.robolog)?))
    }
}

/// Runs the frame loop on the current task and mirrors it to Zenoh.
///
/// Handles:
/// - Logging initialization and the Zenoh connection
/// - One telemetry frame per `period_ms` (manager, faults, export)
/// - Inbound tunable writes and run mode changes
/// - Status publishing and graceful shutdown on Ctrl+C
///
/// The telemetry core is single-threaded, so the loop is never spawned:
/// [`BridgeRunner::run`] must be awaited from `main`.
///
/// # Example
///
/// ```ignore
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let args = BridgeArgs::parse_with_default(DEFAULT_CONFIG);
///     let config = BridgeConfig::load(&args.config)?;
///     let mut telemetry = Telemetry::from_config(&config)?;
///     telemetry.manager.register_object("robot", &robot);
///
///     let runner = BridgeRunner::new("robolog", config, Some(&args)).await?;
///     runner.run(&mut telemetry, |_mode| {}).await?;
///     Ok(())
/// }
/// ```
pub struct BridgeRunner {
    name: String,
    version: String,
    config: BridgeConfig,
    session: Arc<zenoh::Session>,
    publisher: Publisher,
    status: Option<StatusPublisher>,
    mode: RunMode,
    last_faults: Option<FaultSnapshot>,
    last_dropped: u64,
    exported: PublishStats,
}

impl BridgeRunner {
    /// Initialize logging, connect to Zenoh and create the runner.
    ///
    /// CLI arguments, when given, override the log level and initial mode.
    pub async fn new(
        name: impl Into<String>,
        config: BridgeConfig,
        args: Option<&BridgeArgs>,
    ) -> Result<Self> {
        let name = name.into();
        let log_config =
            config.logging_with_override(args.and_then(|args| args.log_level.as_deref()));
        init_tracing(&log_config).map_err(|e| BridgeError::config(e.to_string()))?;

        tracing::info!(bridge = %name, version = env!("CARGO_PKG_VERSION"), "Starting bridge");

        let session = Arc::new(
            connect(&config.zenoh)
                .await
                .map_err(|e| BridgeError::ZenohConnection(e.to_string()))?,
        );

        let mut runner = Self::with_session(name, config, session);
        if let Some(mode) = args.and_then(|args| args.mode.as_deref()) {
            runner.mode = mode.parse()?;
        }
        Ok(runner)
    }

    /// Create a runner over an existing session, without touching logging.
    pub fn with_session(
        name: impl Into<String>,
        config: BridgeConfig,
        session: Arc<zenoh::Session>,
    ) -> Self {
        let name = name.into();
        let version = env!("CARGO_PKG_VERSION").to_string();
        let publisher = Publisher::new(
            session.clone(),
            config.key_prefix(),
            config.robolog.format,
        );
        let status = config
            .status
            .then(|| StatusPublisher::new(publisher.clone(), &name, &version));

        Self {
            name,
            version,
            mode: config.initial_mode,
            config,
            session,
            publisher,
            status,
            last_faults: None,
            last_dropped: 0,
            exported: PublishStats::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<zenoh::Session> {
        &self.session
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    /// Current run mode.
    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Totals exported since start.
    pub fn exported(&self) -> PublishStats {
        self.exported
    }

    /// Run one telemetry frame and export what changed.
    pub async fn tick(&mut self, telemetry: &mut Telemetry) -> PublishStats {
        let mode = self.mode;
        let faults = &mut telemetry.faults;
        telemetry.manager.run(mode);
        telemetry.manager.with_frame(mode, |frame| faults.update(frame));

        let live = telemetry.manager.live_mut();
        let dropped = live.dropped();
        let changes = live.take_changes();
        if dropped > self.last_dropped {
            tracing::warn!(
                dropped = dropped - self.last_dropped,
                "Live outbox overflowed; oldest changes were not exported"
            );
            self.last_dropped = dropped;
        }

        let mut stats = self.publisher.publish_changes(changes).await;

        let snapshot = telemetry.faults.snapshot();
        if self.last_faults.as_ref() != Some(&snapshot) {
            let key = self.publisher.keys().faults_key();
            match self.publisher.publish_json(&key, &snapshot).await {
                Ok(()) => stats.success += 1,
                Err(e) => {
                    stats.failed += 1;
                    tracing::warn!(error = %e, "Failed to publish fault snapshot");
                }
            }
            self.last_faults = Some(snapshot);
        }

        self.exported.merge(stats);
        stats
    }

    /// Apply one inbound put.
    pub async fn handle_inbound(
        &mut self,
        key: &str,
        payload: &[u8],
        telemetry: &mut Telemetry,
    ) -> Result<()> {
        match classify(self.publisher.keys(), key, payload)? {
            Some(Inbound::Mode(mode)) => {
                if mode != self.mode {
                    tracing::info!(from = %self.mode, to = %mode, "Run mode changed");
                    self.mode = mode;
                    self.publish_running(telemetry).await;
                }
                Ok(())
            }
            Some(Inbound::Write { path, value }) => {
                apply_write(telemetry.manager.live_mut(), &path, value)
            }
            None => Ok(()),
        }
    }

    /// Run until Ctrl+C is received.
    pub async fn run<F>(self, telemetry: &mut Telemetry, on_frame: F) -> Result<()>
    where
        F: FnMut(RunMode),
    {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        };
        self.run_until(telemetry, on_frame, ctrl_c).await
    }

    /// Run until `shutdown` completes.
    ///
    /// `on_frame` is called with the current mode right before each
    /// telemetry frame, e.g. to step hardware or refresh signals.
    pub async fn run_until<F, S>(
        mut self,
        telemetry: &mut Telemetry,
        mut on_frame: F,
        shutdown: S,
    ) -> Result<()>
    where
        F: FnMut(RunMode),
        S: Future<Output = ()>,
    {
        let wildcard = self.publisher.keys().wildcard();
        let subscriber = self
            .session
            .declare_subscriber(&wildcard)
            .allowed_origin(Locality::Remote)
            .await?;

        let period = Duration::from_millis(self.config.robolog.period_ms);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.publish_running(telemetry).await;
        tracing::info!(
            bridge = %self.name,
            prefix = %self.publisher.key_prefix(),
            period_ms = self.config.robolog.period_ms,
            mode = %self.mode,
            "Bridge running. Press Ctrl+C to stop."
        );

        let mut failure = None;
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!(bridge = %self.name, "Received shutdown signal");
                    break;
                }

                _ = interval.tick() => {
                    let started = Instant::now();
                    on_frame(self.mode);
                    let stats = self.tick(telemetry).await;
                    let elapsed = started.elapsed();
                    if elapsed > period {
                        tracing::warn!(
                            elapsed_ms = elapsed.as_millis() as u64,
                            period_ms = period.as_millis() as u64,
                            "Frame overran its period"
                        );
                    }
                    tracing::trace!(exported = stats.success, failed = stats.failed, "Frame done");
                }

                sample = subscriber.recv_async() => {
                    match sample {
                        Ok(sample) => {
                            if sample.kind() == SampleKind::Delete {
                                tracing::trace!(key = %sample.key_expr(), "Ignoring delete sample");
                                continue;
                            }
                            let key = sample.key_expr().as_str().to_string();
                            let payload = sample.payload().to_bytes();
                            if let Err(e) = self.handle_inbound(&key, &payload, telemetry).await {
                                tracing::warn!(error = %e, "Inbound write rejected");
                            }
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Inbound subscriber closed");
                            failure = Some(format!("inbound subscriber closed: {}", e));
                            break;
                        }
                    }
                }
            }
        }

        telemetry.manager.unpublish_all();
        let changes = telemetry.manager.live_mut().take_changes();
        self.publisher.publish_changes(changes).await;

        if let Some(ref status) = self.status {
            let published = match failure {
                Some(error) => status.publish_error(error).await,
                None => status.publish_offline().await,
            };
            if let Err(e) = published {
                tracing::warn!(error = %e, "Failed to publish final status");
            }
        }

        if let Err(e) = subscriber.undeclare().await {
            tracing::warn!(error = %e, "Error undeclaring subscriber");
        }
        if let Err(e) = self.session.close().await {
            tracing::warn!(error = %e, "Error closing Zenoh session");
        }

        tracing::info!(
            bridge = %self.name,
            frames = telemetry.manager.frames(),
            exported = self.exported.success,
            success_rate = self.exported.success_rate(),
            "Goodbye!"
        );
        Ok(())
    }

    async fn publish_running(&self, telemetry: &Telemetry) {
        let Some(ref status) = self.status else {
            return;
        };
        let metadata = serde_json::json!({
            "entries": telemetry.manager.entry_paths().len(),
            "fault_suppliers": telemetry.faults.supplier_count(),
            "period_ms": self.config.robolog.period_ms,
            "format": self.publisher.format(),
        });
        if let Err(e) = status.publish_running(self.mode, Some(metadata)).await {
            tracing::warn!(error = %e, "Failed to publish running status");
        }
    }
}
