//! Well-known geometry, controller and device types.
//!
//! Each type publishes a small fixed set of entries through [`Leaf`], so a
//! member of one of these types is logged like any scalar.

use std::rc::Rc;

use bitflags::bitflags;
use robolog_common::Severity;

use crate::faults::{DeviceFaults, FaultBit};
use crate::leaf::{Leaf, LeafGroup, LeafOptions, Source, scalar_entry};
use crate::loggable::Loggable;
use crate::widget::{Widget, WidgetProps};

/// Position on the field, in meters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Translation2d {
    pub x: f64,
    pub y: f64,
}

impl Translation2d {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn norm(&self) -> f64 {
        self.x.hypot(self.y)
    }
}

/// Heading, stored in radians.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rotation2d {
    radians: f64,
}

impl Rotation2d {
    pub const fn from_radians(radians: f64) -> Self {
        Self { radians }
    }

    pub fn from_degrees(degrees: f64) -> Self {
        Self::from_radians(degrees.to_radians())
    }

    pub fn radians(&self) -> f64 {
        self.radians
    }

    pub fn degrees(&self) -> f64 {
        self.radians.to_degrees()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pose2d {
    pub translation: Translation2d,
    pub rotation: Rotation2d,
}

impl Pose2d {
    pub fn new(x: f64, y: f64, rotation: Rotation2d) -> Self {
        Self {
            translation: Translation2d::new(x, y),
            rotation,
        }
    }
}

/// Robot-relative velocity: meters per second and radians per second.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChassisSpeeds {
    pub vx: f64,
    pub vy: f64,
    pub omega: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SwerveModuleState {
    pub speed: f64,
    pub angle: Rotation2d,
}

impl Leaf for Translation2d {
    fn loggable(name: &str, source: Source<Self>, options: &LeafOptions) -> Box<dyn Loggable> {
        LeafGroup::new(name, source, options)
            .field("x", |t| t.x)
            .field("y", |t| t.y)
            .build()
    }
}

impl Leaf for Rotation2d {
    fn loggable(name: &str, source: Source<Self>, options: &LeafOptions) -> Box<dyn Loggable> {
        LeafGroup::new(name, source, options)
            .field("degrees", |r| r.degrees())
            .build()
    }
}

impl Leaf for Pose2d {
    fn loggable(name: &str, source: Source<Self>, options: &LeafOptions) -> Box<dyn Loggable> {
        LeafGroup::new(name, source, options)
            .field("x", |p| p.translation.x)
            .field("y", |p| p.translation.y)
            .field("degrees", |p| p.rotation.degrees())
            .build()
    }
}

impl Leaf for ChassisSpeeds {
    fn loggable(name: &str, source: Source<Self>, options: &LeafOptions) -> Box<dyn Loggable> {
        LeafGroup::new(name, source, options)
            .field("vx", |s| s.vx)
            .field("vy", |s| s.vy)
            .field("omega", |s| s.omega)
            .build()
    }
}

impl Leaf for SwerveModuleState {
    fn loggable(name: &str, source: Source<Self>, options: &LeafOptions) -> Box<dyn Loggable> {
        LeafGroup::new(name, source, options)
            .field("speed", |s| s.speed)
            .field("angle", |s| s.angle.degrees())
            .build()
    }
}

/// Module states are packed as `[angle, speed, angle, speed, ...]`.
impl Leaf for Vec<SwerveModuleState> {
    fn loggable(name: &str, source: Source<Self>, options: &LeafOptions) -> Box<dyn Loggable> {
        let packed: Source<Vec<f64>> = Rc::new(move || {
            source().map(|states| {
                states
                    .iter()
                    .flat_map(|s| [s.angle.degrees(), s.speed])
                    .collect::<Vec<f64>>()
            })
        });
        Box::new(scalar_entry(name, packed, options))
    }
}

/// Gains and setpoint of a PID loop, edited live from the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PidGains {
    pub p: f64,
    pub i: f64,
    pub d: f64,
    pub setpoint: f64,
}

impl Widget for PidGains {
    const WIDGET_TYPE: &'static str = "PIDController";

    fn properties(props: &mut WidgetProps<Self>) {
        props
            .edit("p", |g| g.p, |g, v| g.p = v)
            .edit("i", |g| g.i, |g, v| g.i = v)
            .edit("d", |g| g.d, |g, v| g.d = v)
            .edit("setpoint", |g| g.setpoint, |g, v| g.setpoint = v);
    }
}

bitflags! {
    /// Sticky fault word reported by a motor controller.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct MotorFaults: u32 {
        const HARDWARE = 1 << 0;
        const OVER_TEMPERATURE = 1 << 1;
        const UNDER_VOLTAGE = 1 << 2;
        const BOOT_DURING_ENABLE = 1 << 3;
        const REMOTE_SENSOR = 1 << 4;
        const FORWARD_SOFT_LIMIT = 1 << 5;
        const REVERSE_SOFT_LIMIT = 1 << 6;
        const STATOR_CURRENT_LIMIT = 1 << 7;
        const BRIDGE_BROWNOUT = 1 << 8;
    }
}

impl MotorFaults {
    /// Names of the raised flags.
    pub fn names(&self) -> Vec<String> {
        self.iter_names().map(|(name, _)| name.to_string()).collect()
    }
}

/// Status frame of a CAN motor controller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MotorController {
    pub can_id: u8,
    pub model: String,
    pub connected: bool,
    /// Degrees Celsius.
    pub temperature: f64,
    pub supply_voltage: f64,
    pub stator_current: f64,
    /// Applied duty cycle, -1 to 1.
    pub output: f64,
    /// Rotations.
    pub position: f64,
    /// Rotations per second.
    pub velocity: f64,
    pub faults: MotorFaults,
}

impl MotorController {
    pub fn new(model: impl Into<String>, can_id: u8) -> Self {
        Self {
            can_id,
            model: model.into(),
            connected: true,
            ..Default::default()
        }
    }
}

impl Leaf for MotorController {
    fn loggable(name: &str, source: Source<Self>, options: &LeafOptions) -> Box<dyn Loggable> {
        LeafGroup::new(name, source, options)
            .field("connected", |m| m.connected)
            .field("temperature", |m| m.temperature)
            .field("supplyVoltage", |m| m.supply_voltage)
            .field("statorCurrent", |m| m.stator_current)
            .field("output", |m| m.output)
            .field("position", |m| m.position)
            .field("velocity", |m| m.velocity)
            .field("faults", |m| m.faults.names())
            .build()
    }
}

impl DeviceFaults for MotorController {
    fn identity(&self) -> String {
        format!("{} [{}]", self.model, self.can_id)
    }

    fn fault_bits() -> Vec<FaultBit<Self>> {
        vec![
            FaultBit::new("Disconnected", Severity::Error, |m: &Self| !m.connected),
            FaultBit::new("Hardware fault", Severity::Error, |m: &Self| {
                m.faults.contains(MotorFaults::HARDWARE)
            }),
            FaultBit::new("Overtemperature", Severity::Error, |m: &Self| {
                m.faults.contains(MotorFaults::OVER_TEMPERATURE)
            }),
            FaultBit::new("Supply undervoltage", Severity::Warning, |m: &Self| {
                m.faults.contains(MotorFaults::UNDER_VOLTAGE)
            }),
            FaultBit::new("Rebooted while enabled", Severity::Warning, |m: &Self| {
                m.faults.contains(MotorFaults::BOOT_DURING_ENABLE)
            }),
            FaultBit::new("Remote sensor invalid", Severity::Error, |m: &Self| {
                m.faults.contains(MotorFaults::REMOTE_SENSOR)
            }),
            FaultBit::new("Forward soft limit", Severity::Info, |m: &Self| {
                m.faults.contains(MotorFaults::FORWARD_SOFT_LIMIT)
            }),
            FaultBit::new("Reverse soft limit", Severity::Info, |m: &Self| {
                m.faults.contains(MotorFaults::REVERSE_SOFT_LIMIT)
            }),
            FaultBit::new("Stator current limited", Severity::Info, |m: &Self| {
                m.faults.contains(MotorFaults::STATOR_CURRENT_LIMIT)
            }),
            FaultBit::new("Bridge brownout", Severity::Warning, |m: &Self| {
                m.faults.contains(MotorFaults::BRIDGE_BROWNOUT)
            }),
        ]
    }
}

bitflags! {
    /// Fault word reported by a power distribution module.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct PowerFaults: u32 {
        const BROWNOUT = 1 << 0;
        const CAN_WARNING = 1 << 1;
        const HARDWARE = 1 << 2;
        const BREAKER_TRIPPED = 1 << 3;
    }
}

/// Status of a power distribution module.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PowerDistribution {
    pub can_id: u8,
    pub model: String,
    pub voltage: f64,
    pub total_current: f64,
    pub temperature: f64,
    pub channel_currents: Vec<f64>,
    pub faults: PowerFaults,
}

impl PowerDistribution {
    pub fn new(model: impl Into<String>, can_id: u8, channels: usize) -> Self {
        Self {
            can_id,
            model: model.into(),
            channel_currents: vec![0.0; channels],
            ..Default::default()
        }
    }
}

impl Leaf for PowerDistribution {
    fn loggable(name: &str, source: Source<Self>, options: &LeafOptions) -> Box<dyn Loggable> {
        LeafGroup::new(name, source, options)
            .field("voltage", |p| p.voltage)
            .field("totalCurrent", |p| p.total_current)
            .field("temperature", |p| p.temperature)
            .field("channelCurrents", |p| p.channel_currents.clone())
            .field("faults", |p| {
                p.faults
                    .iter_names()
                    .map(|(name, _)| name.to_string())
                    .collect::<Vec<_>>()
            })
            .build()
    }
}

impl DeviceFaults for PowerDistribution {
    fn identity(&self) -> String {
        format!("{} [{}]", self.model, self.can_id)
    }

    fn fault_bits() -> Vec<FaultBit<Self>> {
        vec![
            FaultBit::new("Brownout", Severity::Error, |p: &Self| {
                p.faults.contains(PowerFaults::BROWNOUT)
            }),
            FaultBit::new("CAN bus warning", Severity::Warning, |p: &Self| {
                p.faults.contains(PowerFaults::CAN_WARNING)
            }),
            FaultBit::new("Hardware fault", Severity::Error, |p: &Self| {
                p.faults.contains(PowerFaults::HARDWARE)
            }),
            FaultBit::new("Breaker tripped", Severity::Warning, |p: &Self| {
                p.faults.contains(PowerFaults::BREAKER_TRIPPED)
            }),
        ]
    }
}
