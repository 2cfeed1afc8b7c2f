//! CLI argument parsing

use clap::{Args, Parser, Subcommand, ValueEnum};
use dcdc_usb::Switch;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dcdc-usb")]
#[command(author, version, about = "Mini-Box DCDC-USB-200 control", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Vendor library to load instead of DLL/ next to this executable
    #[arg(long, global = true)]
    pub library: Option<PathBuf>,

    #[command(flatten)]
    pub session: SessionArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Log level selected by the -v count
    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// Converter to open (1 = first)
    #[arg(short, long, default_value_t = 1, global = true)]
    pub device: u32,

    /// Vendor library refresh period in seconds
    #[arg(long, default_value_t = 1.0, global = true)]
    pub timer: f64,

    /// How long to keep trying to connect, in seconds
    #[arg(long, default_value_t = 5.0, global = true)]
    pub timeout: f64,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Connect and report the firmware version
    Info,

    /// List converters attached over USB
    List,

    /// Print every telemetry value
    Status,

    /// Flash variable access
    #[command(subcommand)]
    Flash(FlashCommands),

    /// Change the output voltage until the next reset
    Output {
        /// Target voltage
        #[arg(conflicts_with_all = ["up", "down"], required_unless_present_any = ["up", "down"])]
        volts: Option<f32>,

        /// Raise the output by one step
        #[arg(long, conflicts_with = "down")]
        up: bool,

        /// Lower the output by one step
        #[arg(long)]
        down: bool,
    },

    /// Turn an output on or off
    Switch {
        target: SwitchTarget,
        state: OnOff,
    },
}

#[derive(Subcommand)]
pub enum FlashCommands {
    /// Load and print every flash variable
    Dump {
        /// Seconds to wait for the load to complete
        #[arg(long, default_value_t = 10.0)]
        load_timeout: f64,
    },

    /// Change flash variables by index
    Set {
        /// INDEX=VALUE pairs
        #[arg(required = true, value_parser = parse_assignment)]
        assignments: Vec<(u32, String)>,

        /// Write the changes to the converter's flash
        #[arg(long)]
        save: bool,

        /// Seconds to wait for the load to complete
        #[arg(long, default_value_t = 10.0)]
        load_timeout: f64,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum SwitchTarget {
    Aux,
    Power,
    Output,
}

impl From<SwitchTarget> for Switch {
    fn from(target: SwitchTarget) -> Self {
        match target {
            SwitchTarget::Aux => Switch::AuxOutput,
            SwitchTarget::Power => Switch::PowerSwitch,
            SwitchTarget::Output => Switch::Output,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OnOff {
    On,
    Off,
}

/// Parse `INDEX=VALUE`
fn parse_assignment(s: &str) -> Result<(u32, String), String> {
    let (index, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected INDEX=VALUE, got `{s}`"))?;
    let index = index
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("Invalid index: {}", e))?;
    Ok((index, value.to_string()))
}
