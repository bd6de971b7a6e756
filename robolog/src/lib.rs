//! robolog telemetry core
//!
//! Declarative telemetry and fault aggregation for a fixed-period robot
//! control loop. Subsystems describe their members once; every frame the
//! [`LoggingManager`] reads them, writes the values that changed to the
//! live table and the durable log, and lets tunables accept overrides while
//! the robot is in test mode.
//!
//! - [`describe`] - Discovery of object members (`Describe`, `Fields`, `discover`)
//! - [`entry`] / [`group`] - The telemetry tree
//! - [`leaf`] / [`catalog`] - Per-type publishing of scalars and well-known types
//! - [`tunable`] / [`widget`] - Values edited from outside the process
//! - [`frame`] / [`live`] / [`durable`] - Sinks and tiers
//! - [`faults`] - Fault registry with active/total sets
//! - [`signals`] - Batched hardware signal refresh
//! - [`deferred`] - One-shot startup tasks polled per frame
//! - [`manager`] - The per-frame entry point
//!
//! Everything here is single-threaded: objects are shared as
//! `Rc<RefCell<_>>` and the frame loop runs on one task.

pub mod catalog;
pub mod deferred;
pub mod describe;
pub mod durable;
pub mod entry;
pub mod error;
pub mod faults;
pub mod frame;
pub mod group;
pub mod leaf;
pub mod live;
pub mod loggable;
pub mod manager;
pub mod signals;
pub mod tunable;
pub mod value;
pub mod widget;

pub use catalog::{
    ChassisSpeeds, MotorController, MotorFaults, PidGains, Pose2d, PowerDistribution,
    PowerFaults, Rotation2d, SwerveModuleState, Translation2d,
};
pub use deferred::{Deferred, DeferredState};
pub use describe::{Describe, Fields, LogOptions, MAX_DEPTH, discover};
pub use durable::{DurableLog, FileLog, LogRecord, MemoryLog, NullLog, StreamId};
pub use entry::Entry;
pub use error::{BoxError, Result, TelemetryError};
pub use faults::{DeviceFaults, FaultBit, FaultRegistry};
pub use frame::{CONSOLE_TARGET, Frame, RunMode, SinkHandle, SinkSpec, Sinks, Tier};
pub use group::Group;
pub use leaf::{Leaf, LeafGroup, LeafOptions, Source};
pub use live::{LiveChange, LiveId, LiveTable, RemoteWriteError};
pub use loggable::{Loggable, Shared, shared};
pub use manager::LoggingManager;
pub use signals::{RefreshStats, SignalBatch, SignalManager, SignalRegistry, SignalWaiter};
pub use tunable::{Tunable, TunableHandle};
pub use value::EntryValue;
pub use widget::{Widget, WidgetEntry, WidgetProps};

pub use robolog_common::{Fault, FaultSnapshot, Format, Severity, TelemetryConfig, Value, ValueKind};
