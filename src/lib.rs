//! # dcdc-usb
//!
//! Rust bindings for the Mini-Box DCDC-USB-200 DC-DC converter. The USB
//! protocol lives in the closed vendor library `DCDCUsbLib`; this crate loads
//! it at runtime and exposes its functions through [`Converter`]. The
//! following example opens the first converter, prints its firmware version
//! and input voltage, and raises the output voltage until the next reset:
//!
//! ```no_run
//! use dcdc_usb::{Converter, Result, SessionConfig};
//! use std::time::Duration;
//!
//! fn main() -> Result<()> {
//!     // Retries for up to five seconds if the converter is not there yet.
//!     let config = SessionConfig::new()
//!         .with_device_index(1)
//!         .with_connect_timeout(Duration::from_secs(5));
//!     let mut converter = Converter::connect(config)?;
//!
//!     println!("firmware {}", converter.firmware_version());
//!     println!("vin {:.2} V", converter.input_voltage());
//!     converter.set_output_voltage_volatile(13.8);
//!
//!     converter.close();
//!     Ok(())
//! }
//! ```
//!
//! Persistent settings are flash variables. Load them once, batch the edits
//! and save once, since the converter's flash wears out:
//!
//! ```no_run
//! use dcdc_usb::{Converter, Result, SessionConfig};
//! use std::time::Duration;
//!
//! fn main() -> Result<()> {
//!     let mut converter = Converter::connect(SessionConfig::default())?;
//!     converter.wait_for_flash_load(Duration::from_secs(10))?;
//!     for variable in converter.variables() {
//!         println!("{variable}");
//!     }
//!     converter.set_variable(3, "60")?;
//!     converter.save_flash_values();
//!     Ok(())
//! }
//! ```
//!
//! Neither example runs under `cargo test`; they need a converter on the bus.
pub mod constants;

mod backend;
mod clock;
mod config;
mod converter;
mod error;
mod flash;
mod library;
mod telemetry;
mod usb;

#[cfg(test)]
mod mock;

pub use backend::{Backend, ByteRegister, Switch, Timer, VariableBuffers, VoltageChannel};
pub use clock::{Clock, MonotonicClock};
pub use config::SessionConfig;
pub use converter::Converter;
pub use error::{Error, Result};
pub use flash::{FlashVariable, SetVariableStatus, VariableValue};
pub use library::DcdcLibrary;
pub use telemetry::{FirmwareVersion, Mode, StatusFlags, Telemetry, Timers, VoltageStep};
pub use usb::{UsbDeviceInfo, list_devices};
