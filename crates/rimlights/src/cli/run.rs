//! `run` subcommand: take over the wheel LEDs and follow telemetry.

use std::io;
use std::sync::atomic::Ordering;

use rimlights_lib::dispatch::{CycleOutcome, Dispatcher};
use rimlights_lib::telemetry::{POLL_INTERVAL, TelemetryMap};
use rimlights_lib::transport::{NullChannel, SerialChannel};

use super::{Config, RUNNING, Result, open_wheel, transport_for};

pub(super) fn cmd_run(config: &Config, no_wheel: bool) -> Result<()> {
    if no_wheel {
        println!("[wheel]  none (--no-wheel), frames are only logged");
        return run_with(config, NullChannel);
    }
    let channel = open_wheel(config)?;
    println!("[wheel]  {}", channel.path());
    run_with(config, channel)
}

fn run_with<C: SerialChannel>(config: &Config, channel: C) -> Result<()> {
    // Build indicators before waiting so config mistakes surface immediately.
    let mut dispatcher = Dispatcher::from_config(config, transport_for(config, channel))?;
    println!(
        "[config] {} rpm, {} button indicator(s)",
        dispatcher.rpm().indicators().len(),
        dispatcher.buttons().indicators().len()
    );

    let telemetry = match TelemetryMap::open(&config.telemetry_file, config.telemetry_size) {
        Ok(map) => map,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::debug!("telemetry: {e}");
            println!(
                "Telemetry not found at {}, waiting for the game to start (Ctrl+C to cancel).",
                config.telemetry_file.display()
            );
            match TelemetryMap::wait_for(
                &config.telemetry_file,
                config.telemetry_size,
                POLL_INTERVAL,
                &RUNNING,
            )? {
                Some(map) => map,
                None => return Ok(()),
            }
        }
        Err(e) => return Err(e.into()),
    };

    dispatcher.startup(telemetry.as_bytes())?;
    println!("Running (Ctrl+C to stop)");

    let result = run_loop(&mut dispatcher, &telemetry, config);
    let restored = dispatcher.restore();
    result?;
    restored?;
    println!("LEDs restored.");
    Ok(())
}

/// Cycle until Ctrl+C.
fn run_loop<C: SerialChannel>(
    dispatcher: &mut Dispatcher<C>,
    telemetry: &TelemetryMap,
    config: &Config,
) -> Result<()> {
    let mut skipping = false;
    while RUNNING.load(Ordering::SeqCst) {
        let outcome = dispatcher.cycle(telemetry.as_bytes())?;
        let skipped = outcome == CycleOutcome::Skipped;
        if skipped != skipping {
            log::info!(
                "{}",
                if skipped {
                    "session inactive, pausing updates"
                } else {
                    "session active, updating LEDs"
                }
            );
            skipping = skipped;
        }
        std::thread::sleep(config.cycle());
    }
    Ok(())
}
