//! Zenoh bridge running a simulated robot.
//!
//! Publishes the robot's telemetry under the configured key prefix and
//! accepts tunable overrides and run mode changes from dashboards.

use std::time::Duration;

use anyhow::Result;
use robolog_bridge::sim::Simulation;
use robolog_bridge::{BridgeArgs, BridgeConfig, BridgeRunner, DEFAULT_CONFIG, Telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    let args = BridgeArgs::parse_with_default(DEFAULT_CONFIG);
    let config = BridgeConfig::load(&args.config).map_err(|e| anyhow::anyhow!("{}", e))?;
    let period = Duration::from_millis(config.robolog.period_ms);

    let mut telemetry = Telemetry::from_config(&config).map_err(|e| anyhow::anyhow!("{}", e))?;

    let runner = BridgeRunner::new("robolog", config, Some(&args))
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let mut sim = Simulation::install(&mut telemetry, period);

    runner
        .run(&mut telemetry, |mode| sim.step(mode))
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))
}
