//! Flash variables: the converter's persistent configuration.
//!
//! The vendor library keeps a host-side copy of every variable. A load
//! fills that copy asynchronously, [`Converter::set_variable`] edits it and
//! [`Converter::save_flash_values`] writes the whole copy back to the
//! converter. The flash is rated for about
//! [`FLASH_WRITE_ENDURANCE`](crate::constants::FLASH_WRITE_ENDURANCE)
//! writes, so batch edits and save once.

use crate::backend::{Backend, ByteRegister, VariableBuffers};
use crate::clock::Clock;
use crate::constants::{LOAD_COMPLETE, VARIABLE_COMMENT_LEN, VARIABLE_FIELD_LEN};
use crate::converter::{Converter, c_buffer_to_string};
use crate::error::{Error, Result};
use std::ffi::CString;
use std::fmt;
use std::time::Duration;

const LOAD_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FlashState {
    loaded: bool,
    pending_writes: usize,
}

/// Value of a flash variable as last read from the vendor library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableValue {
    /// No load has reached 100% yet; the library's value is meaningless.
    NotLoaded,
    Loaded(String),
}

impl VariableValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            VariableValue::NotLoaded => None,
            VariableValue::Loaded(value) => Some(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashVariable {
    pub index: u32,
    pub name: String,
    pub value: VariableValue,
    pub unit: String,
    pub comment: String,
}

impl fmt::Display for FlashVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.value.as_str().unwrap_or("<not loaded>");
        write!(f, "{:>3} {:<24} {value} {}", self.index, self.name, self.unit)?;
        if !self.comment.is_empty() {
            write!(f, "  # {}", self.comment)?;
        }
        Ok(())
    }
}

/// Raw result of `dcdcSetVariableData`.
///
/// The vendor does not document what this byte means, so it is not mapped
/// onto success or failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetVariableStatus(pub u8);

impl<B: Backend, C: Clock> Converter<B, C> {
    /// Starts copying the converter's flash into the vendor library.
    /// Progress is reported by [`Converter::load_state`].
    pub fn load_flash_values(&mut self) {
        log::debug!("loading flash values");
        self.backend_mut().load_flash();
    }

    /// Load progress in percent; 100 once the copy is complete.
    pub fn load_state(&mut self) -> u8 {
        let state = self.byte(ByteRegister::LoadState);
        if state >= LOAD_COMPLETE && !self.flash.loaded {
            log::debug!("flash values loaded");
            self.flash.loaded = true;
        }
        state
    }

    pub fn is_flash_loaded(&self) -> bool {
        self.flash.loaded
    }

    /// Starts a load and blocks until it completes or `timeout` elapses.
    pub fn wait_for_flash_load(&mut self, timeout: Duration) -> Result<()> {
        self.load_flash_values();
        let deadline = self.clock().now() + timeout;
        loop {
            let state = self.load_state();
            if state >= LOAD_COMPLETE {
                return Ok(());
            }
            if self.clock().now() >= deadline {
                log::warn!("flash load stalled at {state}%");
                return Err(Error::Timeout("flash load"));
            }
            self.clock().sleep(LOAD_POLL_INTERVAL);
        }
    }

    pub fn max_variable_count(&self) -> u32 {
        self.backend().max_variable_count()
    }

    /// Reads variable `index`, or `None` if the converter has no such variable.
    pub fn variable(&self, index: u32) -> Option<FlashVariable> {
        let mut name = vec![0u8; VARIABLE_FIELD_LEN];
        let mut value = vec![0u8; VARIABLE_FIELD_LEN];
        let mut unit = vec![0u8; VARIABLE_FIELD_LEN];
        let mut comment = vec![0u8; VARIABLE_COMMENT_LEN];

        let exists = self.backend().variable_data(
            index,
            VariableBuffers {
                name: &mut name,
                value: &mut value,
                unit: &mut unit,
                comment: &mut comment,
            },
        );
        if exists != 1 {
            return None;
        }

        let value = if self.flash.loaded {
            VariableValue::Loaded(c_buffer_to_string(&value))
        } else {
            VariableValue::NotLoaded
        };

        Some(FlashVariable {
            index,
            name: c_buffer_to_string(&name),
            value,
            unit: c_buffer_to_string(&unit),
            comment: c_buffer_to_string(&comment),
        })
    }

    pub fn variables(&self) -> Vec<FlashVariable> {
        (0..self.max_variable_count())
            .filter_map(|index| self.variable(index))
            .collect()
    }

    /// Changes variable `index` in the vendor library's copy only; nothing
    /// reaches the converter until [`Converter::save_flash_values`].
    pub fn set_variable(&mut self, index: u32, value: &str) -> Result<SetVariableStatus> {
        let value = CString::new(value)
            .map_err(|_| Error::InvalidValue("flash value contains a NUL byte"))?;
        if !self.flash.loaded {
            log::warn!("setting flash variable {index} before a completed load; it may not be saved");
        }

        let status = self.backend_mut().set_variable_data(index, &value);
        self.flash.pending_writes += 1;
        log::debug!("flash variable {index} <- {value:?} (status {status})");
        Ok(SetVariableStatus(status))
    }

    pub fn pending_writes(&self) -> usize {
        self.flash.pending_writes
    }

    /// Writes the vendor library's copy to the converter's flash and returns
    /// how many variable writes it committed.
    pub fn save_flash_values(&mut self) -> usize {
        let committed = std::mem::take(&mut self.flash.pending_writes);
        if committed == 0 {
            log::warn!("saving flash without pending changes uses a write cycle");
        }
        if !self.flash.loaded {
            log::warn!("saving flash before a completed load; nothing may be saved");
        }
        self.backend_mut().save_flash();
        log::info!("saved {committed} flash change(s)");
        committed
    }
}
