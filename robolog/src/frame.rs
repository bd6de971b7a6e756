//! Sinks and the per-frame context handed to every loggable.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use robolog_common::{ConsoleConfig, Value, ValueKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::durable::{DurableLog, MemoryLog, NullLog, StreamId};
use crate::error::TelemetryError;
use crate::live::{LiveId, LiveTable};

/// Tracing target used by console-tier entries.
pub const CONSOLE_TARGET: &str = "robolog::console";

/// Operating mode of the control loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Disabled,
    Autonomous,
    Teleop,
    Test,
}

impl RunMode {
    /// Whether tunables accept external overrides.
    pub fn is_test(self) -> bool {
        self == RunMode::Test
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunMode::Disabled => "disabled",
            RunMode::Autonomous => "autonomous",
            RunMode::Teleop => "teleop",
            RunMode::Test => "test",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disabled" => Ok(RunMode::Disabled),
            "autonomous" | "auto" => Ok(RunMode::Autonomous),
            "teleop" => Ok(RunMode::Teleop),
            "test" => Ok(RunMode::Test),
            other => Err(TelemetryError::Common(robolog_common::Error::Config(
                format!("Unknown run mode: '{}'", other),
            ))),
        }
    }
}

/// Where an entry's values go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Live table, mirrored into the durable log.
    #[default]
    Live,
    /// Durable log only.
    Durable,
    /// Console events, when enabled.
    Console,
}

/// Everything needed to open the sinks for one entry.
#[derive(Debug, Clone, Copy)]
pub struct SinkSpec<'a> {
    pub path: &'a str,
    pub tier: Tier,
    pub kind: ValueKind,
    pub labels: &'a BTreeMap<String, String>,
    pub writable: bool,
}

/// Open sinks of one entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkHandle {
    pub live: Option<LiveId>,
    pub durable: Option<StreamId>,
    pub console: bool,
}

/// Publication state shared by every entry type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SinkState {
    #[default]
    Unpublished,
    Published(SinkHandle),
    Retired,
}

/// The live table, the durable log and the console settings.
pub struct Sinks {
    live: LiveTable,
    durable: Box<dyn DurableLog>,
    console: ConsoleConfig,
}

impl Default for Sinks {
    fn default() -> Self {
        Self::new(LiveTable::new(), Box::new(NullLog::default()), ConsoleConfig::default())
    }
}

impl fmt::Debug for Sinks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sinks")
            .field("live", &self.live)
            .field("console", &self.console)
            .finish_non_exhaustive()
    }
}

impl Sinks {
    pub fn new(live: LiveTable, durable: Box<dyn DurableLog>, console: ConsoleConfig) -> Self {
        Self {
            live,
            durable,
            console,
        }
    }

    /// Sinks backed by an in-memory durable log.
    ///
    /// The returned [`MemoryLog`] shares its buffer with the one inside the sinks.
    pub fn in_memory() -> (Self, MemoryLog) {
        let log = MemoryLog::new();
        let sinks = Self::new(
            LiveTable::new(),
            Box::new(log.clone()),
            ConsoleConfig::default(),
        );
        (sinks, log)
    }

    pub fn with_console(mut self, console: ConsoleConfig) -> Self {
        self.console = console;
        self
    }

    pub fn live(&self) -> &LiveTable {
        &self.live
    }

    pub fn live_mut(&mut self) -> &mut LiveTable {
        &mut self.live
    }

    pub fn console(&self) -> &ConsoleConfig {
        &self.console
    }

    /// Open the sinks for an entry according to its tier.
    pub fn open(&mut self, spec: SinkSpec<'_>) -> SinkHandle {
        let mut handle = SinkHandle::default();

        match spec.tier {
            Tier::Live => {
                handle.live =
                    Some(self.live.publish(spec.path, spec.kind, spec.labels, spec.writable));
                handle.durable = self.open_durable(spec.path, spec.kind);
            }
            Tier::Durable => {
                handle.durable = self.open_durable(spec.path, spec.kind);
            }
            Tier::Console => {
                handle.console = true;
            }
        }

        handle
    }

    fn open_durable(&mut self, path: &str, kind: ValueKind) -> Option<StreamId> {
        match self.durable.open(path, kind) {
            Ok(stream) => Some(stream),
            Err(e) => {
                warn!(path = %path, error = %e, "Failed to open durable stream");
                None
            }
        }
    }

    /// Write a value through every sink of `handle`.
    pub fn write(&mut self, handle: SinkHandle, path: &str, value: &Value) {
        if let Some(id) = handle.live {
            self.live.set(id, value.clone());
        }
        if let Some(stream) = handle.durable {
            if let Err(e) = self.durable.append(stream, value) {
                warn!(path = %path, error = %e, "Failed to append to durable log");
            }
        }
        if handle.console && self.console.enabled {
            tracing::info!(target: CONSOLE_TARGET, path = %path, value = ?value, "value changed");
        }
    }

    /// Tear down every sink of `handle`.
    pub fn close(&mut self, handle: SinkHandle, path: &str) {
        if let Some(id) = handle.live {
            self.live.unpublish(id);
        }
        if let Some(stream) = handle.durable {
            if let Err(e) = self.durable.close(stream) {
                warn!(path = %path, error = %e, "Failed to close durable stream");
            }
        }
    }

    /// Flush the durable log.
    pub fn flush(&mut self) {
        if let Err(e) = self.durable.flush() {
            warn!(error = %e, "Failed to flush durable log");
        } else {
            debug!(pending = self.live.pending(), "Flushed sinks");
        }
    }
}

/// Per-frame context: the sinks plus the current run mode.
pub struct Frame<'a> {
    sinks: &'a mut Sinks,
    mode: RunMode,
}

impl<'a> Frame<'a> {
    pub fn new(sinks: &'a mut Sinks, mode: RunMode) -> Self {
        Self { sinks, mode }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn live(&self) -> &LiveTable {
        self.sinks.live()
    }

    pub fn live_mut(&mut self) -> &mut LiveTable {
        self.sinks.live_mut()
    }

    pub fn open(&mut self, spec: SinkSpec<'_>) -> SinkHandle {
        self.sinks.open(spec)
    }

    pub fn write(&mut self, handle: SinkHandle, path: &str, value: &Value) {
        self.sinks.write(handle, path, value);
    }

    pub fn close(&mut self, handle: SinkHandle, path: &str) {
        self.sinks.close(handle, path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::durable::LogRecord;

    fn spec<'a>(path: &'a str, tier: Tier, labels: &'a BTreeMap<String, String>) -> SinkSpec<'a> {
        SinkSpec {
            path,
            tier,
            kind: ValueKind::Number,
            labels,
            writable: false,
        }
    }

    #[test]
    fn test_live_tier_is_mirrored_to_durable() {
        let (mut sinks, log) = Sinks::in_memory();
        let labels = BTreeMap::new();
        let handle = sinks.open(spec("arm/angle", Tier::Live, &labels));

        sinks.write(handle, "arm/angle", &Value::Number(30.0));

        assert_eq!(sinks.live().get_path("arm/angle"), Some(&Value::Number(30.0)));
        assert_eq!(log.values_for("arm/angle"), vec![Value::Number(30.0)]);
    }

    #[test]
    fn test_durable_tier_skips_live_table() {
        let (mut sinks, log) = Sinks::in_memory();
        let labels = BTreeMap::new();
        let handle = sinks.open(spec("odometry/rawTicks", Tier::Durable, &labels));

        sinks.write(handle, "odometry/rawTicks", &Value::Number(1.0));

        assert!(!sinks.live().contains("odometry/rawTicks"));
        assert_eq!(log.values_for("odometry/rawTicks").len(), 1);
    }

    #[test]
    fn test_console_tier_touches_neither_table_nor_log() {
        let (sinks, log) = Sinks::in_memory();
        let mut sinks = sinks.with_console(ConsoleConfig { enabled: true });
        let labels = BTreeMap::new();
        let handle = sinks.open(spec("debug/loopTime", Tier::Console, &labels));

        sinks.write(handle, "debug/loopTime", &Value::Number(4.2));

        assert!(handle.console);
        assert!(sinks.live().paths().next().is_none());
        assert!(log.records().is_empty());
    }

    #[test]
    fn test_close_finishes_streams() {
        let (mut sinks, log) = Sinks::in_memory();
        let labels = BTreeMap::new();
        let handle = sinks.open(spec("intake/speed", Tier::Live, &labels));
        sinks.close(handle, "intake/speed");

        assert!(!sinks.live().contains("intake/speed"));
        assert!(matches!(log.records().last(), Some(LogRecord::Finish { .. })));
    }

    #[test]
    fn test_run_mode_parsing() {
        assert_eq!("test".parse::<RunMode>().unwrap(), RunMode::Test);
        assert_eq!(" Teleop ".parse::<RunMode>().unwrap(), RunMode::Teleop);
        assert_eq!("auto".parse::<RunMode>().unwrap(), RunMode::Autonomous);
        assert!("practice".parse::<RunMode>().is_err());
        assert!(RunMode::Test.is_test());
        assert!(!RunMode::default().is_test());
    }
}
