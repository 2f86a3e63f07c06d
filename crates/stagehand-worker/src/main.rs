//! Binary entrypoint for the Stagehand worker.

use std::io::{self, Write};
use std::process::ExitCode;

use stagehand_config::{Config, OrthoConfig, telemetry};
use stagehand_worker::{DispatchSettings, Dispatcher, SimulatedProvider, run};

fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(error) => {
            writeln!(io::stderr().lock(), "stagehand-worker: {error}").ok();
            return ExitCode::FAILURE;
        }
    };
    let _telemetry = match telemetry::initialise(&config, "stagehand-worker") {
        Ok(handle) => handle,
        Err(error) => {
            writeln!(io::stderr().lock(), "stagehand-worker: {error}").ok();
            return ExitCode::FAILURE;
        }
    };

    let provider = SimulatedProvider::with_devices(config.simulated_devices.iter().cloned())
        .with_latency(config.simulated_latency());
    let mut dispatcher = Dispatcher::new(provider, DispatchSettings::from_config(&config));

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();

    if let Err(error) = run(&mut reader, &mut writer, &mut dispatcher) {
        tracing::error!(target: "stagehand_worker", error = %error, "worker loop failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
