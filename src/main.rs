//! dcdc-usb - command line access to a Mini-Box DCDC-USB-200
//!
//! Without a subcommand this is the self-test: open the converter, log its
//! firmware version and exit.

mod cli;

use clap::Parser;
use cli::{Cli, Commands, FlashCommands, OnOff, SessionArgs};
use dcdc_usb::{Converter, SessionConfig, VoltageStep};
use std::path::Path;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG still wins over -v
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(cli.log_level().to_string()),
    )
    .init();

    let command = cli.command.unwrap_or(Commands::Info);

    if let Commands::List = command {
        let devices = dcdc_usb::list_devices()?;
        if devices.is_empty() {
            println!("no DCDC-USB converters found");
        }
        for device in devices {
            println!(
                "{}: bus {:03} address {:03}",
                device.ordinal, device.bus, device.address
            );
        }
        return Ok(());
    }

    let config = session_config(&cli.session)?;
    let mut converter = match open(cli.library.as_deref(), config) {
        Ok(converter) => converter,
        Err(e) => {
            log::error!("{e}");
            log::info!("Program terminated");
            std::process::exit(1);
        }
    };

    match command {
        Commands::Info | Commands::List => {
            log::info!("FW version: {}", converter.firmware_version());
        }
        Commands::Status => {
            println!("{}", converter.telemetry());
        }
        Commands::Flash(FlashCommands::Dump { load_timeout }) => {
            converter.wait_for_flash_load(seconds(load_timeout)?)?;
            for variable in converter.variables() {
                println!("{variable}");
            }
        }
        Commands::Flash(FlashCommands::Set {
            assignments,
            save,
            load_timeout,
        }) => {
            converter.wait_for_flash_load(seconds(load_timeout)?)?;
            for (index, value) in &assignments {
                let status = converter.set_variable(*index, value)?;
                log::info!("variable {index} <- {value} (status {})", status.0);
            }
            if save {
                converter.save_flash_values();
            } else {
                log::warn!("changes not saved; pass --save to write them to flash");
            }
        }
        Commands::Output { volts, up, down } => {
            if up {
                converter.step_output_voltage(VoltageStep::Up);
            } else if down {
                converter.step_output_voltage(VoltageStep::Down);
            } else if let Some(volts) = volts {
                converter.set_output_voltage_volatile(volts);
            }
        }
        Commands::Switch { target, state } => {
            converter.set_switch(target.into(), matches!(state, OnOff::On));
        }
    }

    converter.close();
    log::info!("Program terminated");
    Ok(())
}

fn open(library: Option<&Path>, config: SessionConfig) -> dcdc_usb::Result<Converter> {
    match library {
        Some(path) => Converter::connect_with_library(path, config),
        None => Converter::connect(config),
    }
}

fn session_config(args: &SessionArgs) -> Result<SessionConfig, String> {
    Ok(SessionConfig::new()
        .with_device_index(args.device)
        .with_refresh_interval(seconds(args.timer)?)
        .with_connect_timeout(seconds(args.timeout)?))
}

fn seconds(value: f64) -> Result<Duration, String> {
    Duration::try_from_secs_f64(value).map_err(|e| format!("Invalid duration {value}: {e}"))
}
