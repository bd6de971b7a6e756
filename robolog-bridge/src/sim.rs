//! Simulated robot used by the bridge binary.
//!
//! A differential drivetrain, an arm on a PID loop and a power distribution
//! module, stepped once per frame with simple first-order physics. It only
//! exists to give dashboards something to look at without hardware.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use robolog::{
    BoxError, ChassisSpeeds, Deferred, Describe, Fields, LogOptions, MotorController,
    MotorFaults, PidGains, Pose2d, PowerDistribution, Rotation2d, RunMode, Shared,
    SignalManager, SignalRegistry, SignalWaiter, SwerveModuleState, Tier, shared,
};

use crate::runner::Telemetry;

/// Motor temperature that raises the overtemperature fault.
const OVERHEAT_CELSIUS: f64 = 80.0;
const AMBIENT_CELSIUS: f64 = 25.0;
const BATTERY_VOLTS: f64 = 12.6;
const BATTERY_RESISTANCE_OHMS: f64 = 0.015;

pub struct Drivetrain {
    pub left_motor: Shared<MotorController>,
    pub right_motor: Shared<MotorController>,
    pub pose: Pose2d,
    pub speeds: ChassisSpeeds,
    pub modules: Vec<SwerveModuleState>,
    pub odometry_updates: i64,
}

impl Describe for Drivetrain {
    fn describe(fields: &mut Fields<'_, Self>) {
        fields
            .log("leftMotor", |d| d.left_motor.borrow().clone())
            .log("rightMotor", |d| d.right_motor.borrow().clone())
            .log("pose", |d| d.pose)
            .log("speeds", |d| d.speeds)
            .log("modules", |d| d.modules.clone())
            .log(
                LogOptions::new("odometryUpdates").tier(Tier::Durable),
                |d| d.odometry_updates,
            );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmState {
    Stowed,
    Moving,
    AtSetpoint,
}

impl fmt::Display for ArmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArmState::Stowed => write!(f, "stowed"),
            ArmState::Moving => write!(f, "moving"),
            ArmState::AtSetpoint => write!(f, "at setpoint"),
        }
    }
}

pub struct Arm {
    pub pid: Shared<PidGains>,
    /// Degrees.
    pub angle: f64,
    /// Degrees per second.
    pub max_velocity: f64,
    pub state: ArmState,
}

impl Describe for Arm {
    fn describe(fields: &mut Fields<'_, Self>) {
        fields
            .widget("pid", |a| Rc::clone(&a.pid))
            .log("angle", |a| a.angle)
            .tunable("maxVelocity", |a| a.max_velocity, |a, v| a.max_velocity = v)
            .text(LogOptions::new("state").tier(Tier::Console), |a| a.state);
    }
}

pub struct Robot {
    pub drivetrain: Shared<Drivetrain>,
    pub arm: Shared<Arm>,
    pub pdh: Shared<PowerDistribution>,
    pub gyro_zeroed: Rc<Cell<bool>>,
}

impl Describe for Robot {
    fn describe(fields: &mut Fields<'_, Self>) {
        fields
            .nested(
                LogOptions::new("drivetrain").tag("subsystem", "drive"),
                |r| Rc::clone(&r.drivetrain),
            )
            .nested(LogOptions::new("arm").tag("subsystem", "arm"), |r| {
                Rc::clone(&r.arm)
            })
            .log("pdh", |r| r.pdh.borrow().clone())
            .log("gyroZeroed", |r| r.gyro_zeroed.get());
    }
}

impl Robot {
    pub fn new() -> Self {
        Self {
            drivetrain: shared(Drivetrain {
                left_motor: shared(MotorController::new("TalonFX", 1)),
                right_motor: shared(MotorController::new("TalonFX", 2)),
                pose: Pose2d::default(),
                speeds: ChassisSpeeds::default(),
                modules: vec![SwerveModuleState::default(); 4],
                odometry_updates: 0,
            }),
            arm: shared(Arm {
                pid: shared(PidGains {
                    p: 0.8,
                    setpoint: 45.0,
                    ..Default::default()
                }),
                angle: 0.0,
                max_velocity: 90.0,
                state: ArmState::Stowed,
            }),
            pdh: shared(PowerDistribution::new("PDH", 1, 24)),
            gyro_zeroed: Rc::new(Cell::new(false)),
        }
    }
}

impl Default for Robot {
    fn default() -> Self {
        Self::new()
    }
}

/// Signal waiter that counts refreshes per bus.
#[derive(Debug, Default)]
pub struct SimBus {
    refreshes: BTreeMap<String, u64>,
}

impl SimBus {
    pub fn refreshes(&self, bus: &str) -> u64 {
        self.refreshes.get(bus).copied().unwrap_or(0)
    }
}

impl SignalWaiter for SimBus {
    type Handle = u32;

    fn wait_for_all(
        &mut self,
        bus: &str,
        _timeout: Duration,
        _handles: &[u32],
    ) -> Result<(), BoxError> {
        *self.refreshes.entry(bus.to_string()).or_default() += 1;
        Ok(())
    }
}

/// A [`Robot`] wired into the telemetry objects and stepped per frame.
pub struct Simulation {
    robot: Shared<Robot>,
    signals: SignalManager<u32>,
    bus: SimBus,
    dt: f64,
}

impl Simulation {
    /// Build the robot and register it with `telemetry`.
    ///
    /// Devices report faults, their status signals are batched per bus, and
    /// the gyro is zeroed a few frames after startup.
    pub fn install(telemetry: &mut Telemetry, period: Duration) -> Self {
        let robot = shared(Robot::new());
        let entries = telemetry.manager.register_object("robot", &robot);

        let mut signals = SignalRegistry::new();
        {
            let robot = robot.borrow();
            let drivetrain = robot.drivetrain.borrow();
            telemetry.faults.register_device(&drivetrain.left_motor);
            telemetry.faults.register_device(&drivetrain.right_motor);
            telemetry.faults.register_device(&robot.pdh);

            for motor in [&drivetrain.left_motor, &drivetrain.right_motor] {
                let id = u32::from(motor.borrow().can_id);
                signals.register("canivore", (0..6).map(|signal| id * 100 + signal));
            }
            signals.register("rio", 0..26);

            let arm = Rc::clone(&robot.arm);
            telemetry.faults.register_condition(
                move || arm.borrow().angle > 120.0,
                "Arm",
                "Past forward soft limit",
                robolog::Severity::Warning,
            );

            let zeroed = Rc::clone(&robot.gyro_zeroed);
            telemetry
                .manager
                .defer(Deferred::after_frames("zero gyro", 5, move || {
                    zeroed.set(true);
                    Ok(())
                }));
        }

        tracing::info!(entries, signals = signals.len(), "Simulated robot installed");

        Self {
            robot,
            signals: signals.finalize_all(),
            bus: SimBus::default(),
            dt: period.as_secs_f64(),
        }
    }

    pub fn robot(&self) -> &Shared<Robot> {
        &self.robot
    }

    pub fn bus(&self) -> &SimBus {
        &self.bus
    }

    /// Refresh signals and advance the physics by one period.
    pub fn step(&mut self, mode: RunMode) {
        self.signals.refresh(&mut self.bus);

        let enabled = mode != RunMode::Disabled;
        let robot = self.robot.borrow();
        let dt = self.dt;

        let drive_current = {
            let mut drivetrain = robot.drivetrain.borrow_mut();
            let (vx, omega) = if enabled { (1.5, 0.3) } else { (0.0, 0.0) };
            drivetrain.speeds = ChassisSpeeds {
                vx,
                vy: 0.0,
                omega,
            };

            let heading = drivetrain.pose.rotation.radians() + omega * dt;
            drivetrain.pose.translation.x += vx * heading.cos() * dt;
            drivetrain.pose.translation.y += vx * heading.sin() * dt;
            drivetrain.pose.rotation = Rotation2d::from_radians(heading);
            drivetrain.odometry_updates += 1;
            for module in &mut drivetrain.modules {
                module.speed = vx;
                module.angle = Rotation2d::from_degrees(0.0);
            }

            let output = vx / 4.0;
            let mut current = 0.0;
            for motor in [&drivetrain.left_motor, &drivetrain.right_motor] {
                let mut motor = motor.borrow_mut();
                step_motor(&mut motor, output, dt);
                current += motor.stator_current;
            }
            current
        };

        let arm_current = {
            let mut arm = robot.arm.borrow_mut();
            let setpoint = arm.pid.borrow().setpoint;
            let gain = arm.pid.borrow().p;
            let error = setpoint - arm.angle;
            if enabled && error.abs() > 0.5 {
                let limit = arm.max_velocity * dt;
                arm.angle += (error * gain).clamp(-limit, limit);
                arm.state = ArmState::Moving;
            } else if arm.angle.abs() < 0.5 {
                arm.state = ArmState::Stowed;
            } else {
                arm.state = ArmState::AtSetpoint;
            }
            if arm.state == ArmState::Moving { 8.0 } else { 0.5 }
        };

        let mut pdh = robot.pdh.borrow_mut();
        pdh.total_current = drive_current + arm_current;
        pdh.voltage = BATTERY_VOLTS - pdh.total_current * BATTERY_RESISTANCE_OHMS;
        pdh.temperature = AMBIENT_CELSIUS + pdh.total_current * 0.05;
        if let Some(channel) = pdh.channel_currents.get_mut(0) {
            *channel = drive_current / 2.0;
        }
        if let Some(channel) = pdh.channel_currents.get_mut(1) {
            *channel = drive_current / 2.0;
        }
        if let Some(channel) = pdh.channel_currents.get_mut(10) {
            *channel = arm_current;
        }
    }
}

fn step_motor(motor: &mut MotorController, output: f64, dt: f64) {
    motor.output = output;
    motor.supply_voltage = BATTERY_VOLTS;
    motor.stator_current = output.abs() * 40.0;
    motor.velocity = output * 100.0;
    motor.position += motor.velocity * dt;

    let heating = motor.stator_current * 0.01;
    let cooling = (motor.temperature.max(AMBIENT_CELSIUS) - AMBIENT_CELSIUS) * 0.002;
    motor.temperature = (motor.temperature.max(AMBIENT_CELSIUS) + (heating - cooling) * dt)
        .max(AMBIENT_CELSIUS);
    motor
        .faults
        .set(MotorFaults::OVER_TEMPERATURE, motor.temperature > OVERHEAT_CELSIUS);
}

#[cfg(test)]
mod tests {
    use robolog::{LoggingManager, Sinks, Value};

    use super::*;

    fn install() -> (Telemetry, Simulation) {
        let (sinks, _log) = Sinks::in_memory();
        let mut telemetry = Telemetry::new(LoggingManager::new(sinks));
        let sim = Simulation::install(&mut telemetry, Duration::from_millis(100));
        (telemetry, sim)
    }

    #[test]
    fn test_install_registers_everything() {
        let (telemetry, _sim) = install();

        let paths = telemetry.manager.entry_paths();
        assert!(paths.contains(&"robot/drivetrain/leftMotor/temperature".to_string()));
        assert!(paths.contains(&"robot/arm/maxVelocity".to_string()));
        assert!(paths.contains(&"robot/pdh/voltage".to_string()));
        assert_eq!(telemetry.faults.supplier_count(), 25);
        assert_eq!(telemetry.manager.pending_tasks(), 1);
    }

    #[test]
    fn test_step_moves_robot_when_enabled() {
        let (mut telemetry, mut sim) = install();

        for _ in 0..10 {
            sim.step(RunMode::Teleop);
            telemetry.manager.run(RunMode::Teleop);
        }

        let robot = sim.robot().borrow();
        assert!(robot.drivetrain.borrow().pose.translation.x > 0.0);
        assert!(robot.arm.borrow().angle > 0.0);
        assert!(robot.gyro_zeroed.get());
        assert_eq!(sim.bus().refreshes("canivore"), 10);
        assert_eq!(sim.bus().refreshes("rio"), 10);
        assert_eq!(
            telemetry.manager.live().get_path("robot/gyroZeroed"),
            Some(&Value::Boolean(true))
        );
    }

    #[test]
    fn test_disabled_robot_stays_put() {
        let (_telemetry, mut sim) = install();

        for _ in 0..10 {
            sim.step(RunMode::Disabled);
        }

        let robot = sim.robot().borrow();
        assert_eq!(robot.drivetrain.borrow().pose.translation.x, 0.0);
        assert_eq!(robot.arm.borrow().angle, 0.0);
        assert_eq!(robot.arm.borrow().state, ArmState::Stowed);
    }

    #[test]
    fn test_motor_overheats() {
        let mut motor = MotorController::new("TalonFX", 9);
        motor.temperature = OVERHEAT_CELSIUS - 0.1;

        step_motor(&mut motor, 1.0, 1.0);

        assert!(motor.faults.contains(MotorFaults::OVER_TEMPERATURE));
    }
}
