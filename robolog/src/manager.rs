use robolog_common::TelemetryConfig;
use tracing::{debug, info};

use crate::deferred::Deferred;
use crate::describe::{Describe, discover};
use crate::durable::{DurableLog, FileLog, NullLog};
use crate::error::Result;
use crate::frame::{Frame, RunMode, Sinks};
use crate::live::LiveTable;
use crate::loggable::{Loggable, Shared};

/// Owns the registered telemetry trees and the sinks they write to.
///
/// [`LoggingManager::run`] is the per-frame entry point: it initializes new
/// roots, polls deferred tasks, runs every root in registration order and
/// flushes the durable log.
#[derive(Debug)]
pub struct LoggingManager {
    roots: Vec<Box<dyn Loggable>>,
    sinks: Sinks,
    deferred: Vec<Deferred>,
    initialized: usize,
    frames: u64,
}

impl Default for LoggingManager {
    fn default() -> Self {
        Self::new(Sinks::default())
    }
}

impl LoggingManager {
    pub fn new(sinks: Sinks) -> Self {
        Self {
            roots: Vec::new(),
            sinks,
            deferred: Vec::new(),
            initialized: 0,
            frames: 0,
        }
    }

    /// Build the sinks described by `config`.
    pub fn from_config(config: &TelemetryConfig) -> Result<Self> {
        let durable: Box<dyn DurableLog> = match &config.durable_log {
            Some(path) => Box::new(FileLog::create(path, config.format)?),
            None => Box::new(NullLog::default()),
        };
        Ok(Self::new(Sinks::new(
            LiveTable::new(),
            durable,
            config.console.clone(),
        )))
    }

    /// Register a top-level loggable.
    pub fn register(&mut self, mut root: impl Loggable + 'static) {
        root.attach(None);
        info!(root = %root.path(), entries = root.entry_count(), "Registered telemetry root");
        self.roots.push(Box::new(root));
    }

    /// Discover `object` and register the resulting group.
    ///
    /// Returns the number of entries discovered.
    pub fn register_object<T: Describe>(&mut self, name: &str, object: &Shared<T>) -> usize {
        let group = discover(name, object);
        let entries = group.entry_count();
        self.register(group);
        entries
    }

    /// Queue a one-shot task polled at the start of every frame.
    pub fn defer(&mut self, task: Deferred) {
        debug!(task = %task.name(), "Deferred task queued");
        self.deferred.push(task);
    }

    /// Initialize every root not yet initialized.
    pub fn init(&mut self) {
        let mut frame = Frame::new(&mut self.sinks, RunMode::Disabled);
        for root in &mut self.roots[self.initialized..] {
            root.init(&mut frame);
        }
        self.initialized = self.roots.len();
    }

    /// Run one frame.
    pub fn run(&mut self, mode: RunMode) {
        if self.initialized < self.roots.len() {
            self.init();
        }

        self.deferred.retain_mut(|task| {
            task.poll();
            task.is_pending()
        });

        let mut frame = Frame::new(&mut self.sinks, mode);
        for root in &mut self.roots {
            root.run(&mut frame);
        }

        self.sinks.flush();
        self.frames += 1;
    }

    /// Run `f` against the sinks, e.g. to publish faults alongside the roots.
    pub fn with_frame<R>(&mut self, mode: RunMode, f: impl FnOnce(&mut Frame<'_>) -> R) -> R {
        let mut frame = Frame::new(&mut self.sinks, mode);
        f(&mut frame)
    }

    /// Retire every registered entry.
    pub fn unpublish_all(&mut self) {
        let mut frame = Frame::new(&mut self.sinks, RunMode::Disabled);
        for root in &mut self.roots {
            root.unpublish(&mut frame);
        }
        self.sinks.flush();
        info!(roots = self.roots.len(), "Unpublished all telemetry");
    }

    /// Frames run so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn pending_tasks(&self) -> usize {
        self.deferred.len()
    }

    pub fn roots(&self) -> &[Box<dyn Loggable>] {
        &self.roots
    }

    pub fn entry_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        for root in &self.roots {
            root.collect_paths(&mut paths);
        }
        paths
    }

    pub fn sinks(&self) -> &Sinks {
        &self.sinks
    }

    pub fn live(&self) -> &LiveTable {
        self.sinks.live()
    }

    pub fn live_mut(&mut self) -> &mut LiveTable {
        self.sinks.live_mut()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use robolog_common::{Format, Value};

    use super::*;
    use crate::catalog::PidGains;
    use crate::durable::LogRecord;
    use crate::entry::Entry;
    use crate::faults::FaultRegistry;
    use crate::loggable::shared;
    use crate::widget::WidgetEntry;

    #[test]
    fn test_run_counts_frames_and_publishes() {
        let (sinks, _log) = Sinks::in_memory();
        let mut manager = LoggingManager::new(sinks);
        manager.register(Entry::new("loopCount", || 1_i64));

        manager.run(RunMode::Teleop);
        manager.run(RunMode::Teleop);

        assert_eq!(manager.frames(), 2);
        assert_eq!(manager.live().get_path("loopCount"), Some(&Value::Integer(1)));
    }

    #[test]
    fn test_widgets_publish_before_first_run() {
        let (sinks, _log) = Sinks::in_memory();
        let mut manager = LoggingManager::new(sinks);
        manager.register(WidgetEntry::new("armPid", shared(PidGains::default())));

        manager.init();

        assert!(manager.live().contains("armPid/.type"));
        assert!(manager.live().contains("armPid/setpoint"));
        assert_eq!(manager.frames(), 0);
    }

    #[test]
    fn test_deferred_tasks_polled_each_frame() {
        let done = Rc::new(Cell::new(false));
        let flag = Rc::clone(&done);
        let mut manager = LoggingManager::default();
        manager.defer(Deferred::after_frames("zero gyro", 1, move || {
            flag.set(true);
            Ok(())
        }));

        manager.run(RunMode::Disabled);
        assert!(!done.get());
        manager.run(RunMode::Disabled);
        assert!(done.get());
        assert_eq!(manager.pending_tasks(), 0);
    }

    #[test]
    fn test_faults_share_sinks() {
        let mut manager = LoggingManager::default();
        let mut faults = FaultRegistry::new();
        faults.register(|| Some(robolog_common::Fault::warning("Battery", "Low voltage")));

        manager.with_frame(RunMode::Teleop, |frame| faults.update(frame));

        assert_eq!(
            manager.live().get_path("faults/active/warnings"),
            Some(&Value::TextArray(vec!["Battery: Low voltage".to_string()]))
        );
    }

    #[test]
    fn test_from_config_writes_file_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/match.jsonl");
        let config = TelemetryConfig {
            durable_log: Some(path.clone()),
            ..Default::default()
        };

        {
            let mut manager = LoggingManager::from_config(&config).unwrap();
            manager.register(Entry::new("voltage", || 12.5_f64));
            manager.run(RunMode::Teleop);
            manager.unpublish_all();
        }

        let records = FileLog::read_all(&path, Format::Json).unwrap();
        assert_eq!(records.len(), 3);
        assert!(matches!(records[0], LogRecord::Start { .. }));
        assert!(matches!(
            &records[1],
            LogRecord::Value { value: Value::Number(v), .. } if *v == 12.5
        ));
        assert!(matches!(records[2], LogRecord::Finish { .. }));
    }
}
