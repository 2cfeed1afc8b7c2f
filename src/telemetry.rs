use std::fmt;

/// Operating mode reported by `dcdcGetMode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Dumb,
    Automotive,
    Script,
    Ups,
    /// The vendor documents any other value as an error state.
    Unknown(u8),
}

impl From<u8> for Mode {
    fn from(value: u8) -> Self {
        match value {
            0 => Mode::Dumb,
            1 => Mode::Automotive,
            2 => Mode::Script,
            3 => Mode::Ups,
            other => Mode::Unknown(other),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Dumb => write!(f, "dumb"),
            Mode::Automotive => write!(f, "automotive"),
            Mode::Script => write!(f, "script"),
            Mode::Ups => write!(f, "ups"),
            Mode::Unknown(raw) => write!(f, "error ({raw})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusFlags {
    pub status1: u8,
    pub status2: u8,
    pub voltage: u8,
    pub timer: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timers {
    pub wait: u32,
    pub output_voltage: u32,
    pub aux_voltage: u32,
    pub power_switch: u32,
    pub off_delay: u32,
    pub hard_off: u32,
}

/// Direction for a volatile one-step output voltage change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoltageStep {
    Up,
    Down,
}

/// Every scalar the converter reports, read in one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    pub connected: bool,
    pub mode: Mode,
    pub state: u8,
    pub time_config: u8,
    pub voltage_config: u8,
    pub input_voltage: f32,
    pub ignition_voltage: f32,
    pub output_voltage: f32,
    pub power_switch_enabled: bool,
    pub output_enabled: bool,
    pub aux_output_enabled: bool,
    pub flags: StatusFlags,
    pub flash_pointer: u8,
    pub timers: Timers,
    pub firmware: FirmwareVersion,
}

impl fmt::Display for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "firmware        {}", self.firmware)?;
        writeln!(f, "connected       {}", self.connected)?;
        writeln!(f, "mode            {}", self.mode)?;
        writeln!(f, "state           {}", self.state)?;
        writeln!(f, "vin             {:.2} V", self.input_voltage)?;
        writeln!(f, "vign            {:.2} V", self.ignition_voltage)?;
        writeln!(f, "vout            {:.2} V", self.output_voltage)?;
        writeln!(f, "output          {}", on_off(self.output_enabled))?;
        writeln!(f, "aux output      {}", on_off(self.aux_output_enabled))?;
        writeln!(f, "power switch    {}", on_off(self.power_switch_enabled))?;
        writeln!(
            f,
            "flags           status1={:#04x} status2={:#04x} voltage={:#04x} timer={:#04x}",
            self.flags.status1, self.flags.status2, self.flags.voltage, self.flags.timer
        )?;
        write!(
            f,
            "timers          wait={} vout={} vaux={} pwswitch={} offdelay={} hardoff={}",
            self.timers.wait,
            self.timers.output_voltage,
            self.timers.aux_voltage,
            self.timers.power_switch,
            self.timers.off_delay,
            self.timers.hard_off
        )
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}
