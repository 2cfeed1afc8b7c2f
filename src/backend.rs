//! Capability set of the vendor library.
//!
//! [`Backend`] is the seam between [`Converter`](crate::Converter) and the
//! code that actually reaches the board. [`DcdcLibrary`](crate::DcdcLibrary)
//! implements it over `DCDCUsbLib`; the unit tests implement it with a
//! recording stub. Return values are the vendor's raw codes: `1` means
//! success / connected / exists, anything else does not.

use std::ffi::CStr;

/// Single-byte state registers, one per `dcdcGet*` export returning `c_ubyte`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteRegister {
    Connected,
    TimeConfig,
    VoltageConfig,
    Mode,
    State,
    PowerSwitchEnabled,
    OutputEnabled,
    AuxOutputEnabled,
    FlagsStatus1,
    FlagsStatus2,
    FlagsVoltage,
    FlagsTimer,
    FlashPointer,
    VersionMajor,
    VersionMinor,
    LoadState,
}

impl ByteRegister {
    pub const ALL: [ByteRegister; 16] = [
        ByteRegister::Connected,
        ByteRegister::TimeConfig,
        ByteRegister::VoltageConfig,
        ByteRegister::Mode,
        ByteRegister::State,
        ByteRegister::PowerSwitchEnabled,
        ByteRegister::OutputEnabled,
        ByteRegister::AuxOutputEnabled,
        ByteRegister::FlagsStatus1,
        ByteRegister::FlagsStatus2,
        ByteRegister::FlagsVoltage,
        ByteRegister::FlagsTimer,
        ByteRegister::FlashPointer,
        ByteRegister::VersionMajor,
        ByteRegister::VersionMinor,
        ByteRegister::LoadState,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            ByteRegister::Connected => "dcdcGetConnected",
            ByteRegister::TimeConfig => "dcdcGetTimeCfg",
            ByteRegister::VoltageConfig => "dcdcGetVoltageCfg",
            ByteRegister::Mode => "dcdcGetMode",
            ByteRegister::State => "dcdcGetState",
            ByteRegister::PowerSwitchEnabled => "dcdcGetEnabledPowerSwitch",
            ByteRegister::OutputEnabled => "dcdcGetEnabledOutput",
            ByteRegister::AuxOutputEnabled => "dcdcGetEnabledAuxVOut",
            ByteRegister::FlagsStatus1 => "dcdcGetFlagsStatus1",
            ByteRegister::FlagsStatus2 => "dcdcGetFlagsStatus2",
            ByteRegister::FlagsVoltage => "dcdcGetFlagsVoltage",
            ByteRegister::FlagsTimer => "dcdcGetFlagsTimer",
            ByteRegister::FlashPointer => "dcdcGetFlashPointer",
            ByteRegister::VersionMajor => "dcdcGetVersionMajor",
            ByteRegister::VersionMinor => "dcdcGetVersionMinor",
            ByteRegister::LoadState => "dcdcGetLoadState",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoltageChannel {
    Input,
    Ignition,
    Output,
}

impl VoltageChannel {
    pub const ALL: [VoltageChannel; 3] = [
        VoltageChannel::Input,
        VoltageChannel::Ignition,
        VoltageChannel::Output,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            VoltageChannel::Input => "dcdcGetVin",
            VoltageChannel::Ignition => "dcdcGetVIgn",
            VoltageChannel::Output => "dcdcGetVOut",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timer {
    Wait,
    OutputVoltage,
    AuxVoltage,
    PowerSwitch,
    OffDelay,
    HardOff,
}

impl Timer {
    pub const ALL: [Timer; 6] = [
        Timer::Wait,
        Timer::OutputVoltage,
        Timer::AuxVoltage,
        Timer::PowerSwitch,
        Timer::OffDelay,
        Timer::HardOff,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            Timer::Wait => "dcdcGetTimerWait",
            Timer::OutputVoltage => "dcdcGetTimerVout",
            Timer::AuxVoltage => "dcdcGetTimerVAux",
            Timer::PowerSwitch => "dcdcGetTimerPwSwitch",
            Timer::OffDelay => "dcdcGetTimerOffDelay",
            Timer::HardOff => "dcdcGetTimerHardOff",
        }
    }
}

/// Enable flags the host can flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Switch {
    AuxOutput,
    PowerSwitch,
    Output,
}

impl Switch {
    pub const ALL: [Switch; 3] = [Switch::AuxOutput, Switch::PowerSwitch, Switch::Output];

    pub fn symbol(self) -> &'static str {
        match self {
            Switch::AuxOutput => "dcdcSetEnabledAuxVOut",
            Switch::PowerSwitch => "dcdcSetEnabledPowerSwitch",
            Switch::Output => "dcdcSetEnabledOutput",
        }
    }
}

/// Caller-owned output buffers for `dcdcGetVariableData`.
pub struct VariableBuffers<'a> {
    pub name: &'a mut [u8],
    pub value: &'a mut [u8],
    pub unit: &'a mut [u8],
    pub comment: &'a mut [u8],
}

pub trait Backend {
    /// Opens the first converter found. Returns `1` on success.
    fn open(&mut self, timer_ms: u32) -> u8;

    /// Opens the `index`-th converter (1-based). Returns `1` on success.
    fn open_by_index(&mut self, index: u32, timer_ms: u32) -> u8;

    /// Writes the NUL-terminated device path into `buffer`.
    fn device_path(&self, buffer: &mut [u8]);

    fn close(&mut self);

    fn read_byte(&self, register: ByteRegister) -> u8;

    fn read_voltage(&self, channel: VoltageChannel) -> f32;

    fn read_timer(&self, timer: Timer) -> u32;

    fn set_switch(&mut self, switch: Switch, on: bool);

    /// Nudges the output voltage one step; lost on device reset.
    fn step_output_voltage(&mut self, increase: bool);

    /// Sets the output voltage; lost on device reset.
    fn set_output_voltage(&mut self, volts: f32);

    /// Starts the asynchronous copy of flash into the library.
    fn load_flash(&mut self);

    fn max_variable_count(&self) -> u32;

    /// Fills `buffers` for variable `index`. Returns `1` if it exists.
    fn variable_data(&self, index: u32, buffers: VariableBuffers<'_>) -> u8;

    /// Updates the library's copy of variable `index`.
    fn set_variable_data(&mut self, index: u32, value: &CStr) -> u8;

    /// Writes the library's copy of every variable to the converter's flash.
    fn save_flash(&mut self);
}
