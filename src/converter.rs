use crate::backend::{Backend, ByteRegister, Switch, Timer, VoltageChannel};
use crate::clock::{Clock, MonotonicClock};
use crate::config::SessionConfig;
use crate::constants::DEVICE_PATH_LEN;
use crate::error::{Error, Result};
use crate::flash::FlashState;
use crate::library::DcdcLibrary;
use crate::telemetry::{FirmwareVersion, Mode, StatusFlags, Telemetry, Timers, VoltageStep};
use std::path::Path;

/// Session with one DCDC-USB-200 converter.
///
/// Every getter is a fresh read of the state the vendor library refreshes in
/// the background at [`SessionConfig::refresh_interval`]; nothing is cached
/// here. The vendor library keeps process-wide state, so a `Converter` must
/// not be driven from several threads without external locking.
///
/// The session is closed exactly once, either by [`Converter::close`] or
/// when it is dropped.
pub struct Converter<B: Backend = DcdcLibrary, C: Clock = MonotonicClock> {
    backend: B,
    clock: C,
    config: SessionConfig,
    pub(crate) flash: FlashState,
    open: bool,
}

impl Converter {
    /// Loads the vendor library from its default location and connects.
    pub fn connect(config: SessionConfig) -> Result<Self> {
        Self::with_backend(DcdcLibrary::load()?, config)
    }

    pub fn connect_with_library(path: impl AsRef<Path>, config: SessionConfig) -> Result<Self> {
        Self::with_backend(DcdcLibrary::load_from(path)?, config)
    }
}

impl<B: Backend> Converter<B, MonotonicClock> {
    pub fn with_backend(backend: B, config: SessionConfig) -> Result<Self> {
        Self::with_backend_and_clock(backend, config, MonotonicClock)
    }
}

impl<B: Backend, C: Clock> Converter<B, C> {
    /// Opens `config.device_index()`, polling the connection state for up to
    /// `config.connect_timeout()` when the first attempt fails.
    ///
    /// After a successful connect this blocks for
    /// [`SessionConfig::settle_delay`]: the vendor library reports garbage
    /// until its first refresh cycle completes. On timeout the device is
    /// closed, so the library does not silently attach to the next converter
    /// plugged in.
    pub fn with_backend_and_clock(mut backend: B, config: SessionConfig, clock: C) -> Result<Self> {
        config.validate()?;
        if !config.is_refresh_recommended() {
            log::warn!(
                "refresh interval {:?} is outside the recommended 1-10s window",
                config.refresh_interval()
            );
        }

        let index = config.device_index();
        let mut connected = backend.open_by_index(index, config.refresh_timer_ms()) == 1;

        if !connected {
            log::info!(
                "no DCDC-USB found, trying again for {:.1}s",
                config.connect_timeout().as_secs_f32()
            );
            connected = wait_for_connection(&backend, &clock, &config);
        }

        if !connected {
            log::error!("no DCDC-USB found; closing device");
            backend.close();
            return Err(Error::NoDevice {
                index,
                timeout: config.connect_timeout(),
            });
        }

        let converter = Self {
            backend,
            clock,
            config,
            flash: FlashState::default(),
            open: true,
        };

        log::info!("connected to DCDC-USB with device index {index}");
        log::debug!("device path: {}", converter.device_path());

        converter.clock.sleep(converter.config.settle_delay());
        Ok(converter)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub(crate) fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub(crate) fn clock(&self) -> &C {
        &self.clock
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Closes and re-opens the configured device, e.g. after the vendor
    /// connection was lost. Returns the vendor's success flag.
    ///
    /// A failed attempt is closed again right away, like a connect timeout.
    pub fn reopen(&mut self) -> bool {
        self.shutdown();
        let timer = self.config.refresh_timer_ms();
        let opened = self.backend.open_by_index(self.config.device_index(), timer) == 1;
        self.finish_reopen(opened)
    }

    /// Like [`Converter::reopen`] but takes whichever converter enumerates first.
    pub fn reopen_first(&mut self) -> bool {
        self.shutdown();
        let opened = self.backend.open(self.config.refresh_timer_ms()) == 1;
        self.finish_reopen(opened)
    }

    fn finish_reopen(&mut self, opened: bool) -> bool {
        if opened {
            // May be a different board; its flash has not been loaded.
            self.flash = FlashState::default();
        } else {
            log::warn!("re-open failed; closing device");
            self.backend.close();
        }
        self.open = opened;
        opened
    }

    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.open {
            self.backend.close();
            self.open = false;
            log::debug!("DCDC-USB device closed");
        }
    }

    pub fn device_path(&self) -> String {
        let mut buffer = vec![0u8; DEVICE_PATH_LEN];
        self.backend.device_path(&mut buffer);
        c_buffer_to_string(&buffer)
    }

    pub fn is_connected(&self) -> bool {
        self.byte(ByteRegister::Connected) == 1
    }

    pub fn time_config(&self) -> u8 {
        self.byte(ByteRegister::TimeConfig)
    }

    pub fn voltage_config(&self) -> u8 {
        self.byte(ByteRegister::VoltageConfig)
    }

    pub fn mode(&self) -> Mode {
        Mode::from(self.mode_raw())
    }

    pub fn mode_raw(&self) -> u8 {
        self.byte(ByteRegister::Mode)
    }

    pub fn state(&self) -> u8 {
        self.byte(ByteRegister::State)
    }

    pub fn input_voltage(&self) -> f32 {
        self.backend.read_voltage(VoltageChannel::Input)
    }

    pub fn ignition_voltage(&self) -> f32 {
        self.backend.read_voltage(VoltageChannel::Ignition)
    }

    pub fn output_voltage(&self) -> f32 {
        self.backend.read_voltage(VoltageChannel::Output)
    }

    pub fn power_switch_enabled(&self) -> bool {
        self.byte(ByteRegister::PowerSwitchEnabled) != 0
    }

    pub fn output_enabled(&self) -> bool {
        self.byte(ByteRegister::OutputEnabled) != 0
    }

    pub fn aux_output_enabled(&self) -> bool {
        self.byte(ByteRegister::AuxOutputEnabled) != 0
    }

    pub fn status_flags(&self) -> StatusFlags {
        StatusFlags {
            status1: self.byte(ByteRegister::FlagsStatus1),
            status2: self.byte(ByteRegister::FlagsStatus2),
            voltage: self.byte(ByteRegister::FlagsVoltage),
            timer: self.byte(ByteRegister::FlagsTimer),
        }
    }

    pub fn flash_pointer(&self) -> u8 {
        self.byte(ByteRegister::FlashPointer)
    }

    pub fn timer(&self, timer: Timer) -> u32 {
        self.backend.read_timer(timer)
    }

    pub fn timers(&self) -> Timers {
        Timers {
            wait: self.timer(Timer::Wait),
            output_voltage: self.timer(Timer::OutputVoltage),
            aux_voltage: self.timer(Timer::AuxVoltage),
            power_switch: self.timer(Timer::PowerSwitch),
            off_delay: self.timer(Timer::OffDelay),
            hard_off: self.timer(Timer::HardOff),
        }
    }

    pub fn version_major(&self) -> u8 {
        self.byte(ByteRegister::VersionMajor)
    }

    pub fn version_minor(&self) -> u8 {
        self.byte(ByteRegister::VersionMinor)
    }

    pub fn firmware_version(&self) -> FirmwareVersion {
        FirmwareVersion {
            major: self.version_major(),
            minor: self.version_minor(),
        }
    }

    pub fn firmware_version_string(&self) -> String {
        self.firmware_version().to_string()
    }

    pub fn telemetry(&self) -> Telemetry {
        Telemetry {
            connected: self.is_connected(),
            mode: self.mode(),
            state: self.state(),
            time_config: self.time_config(),
            voltage_config: self.voltage_config(),
            input_voltage: self.input_voltage(),
            ignition_voltage: self.ignition_voltage(),
            output_voltage: self.output_voltage(),
            power_switch_enabled: self.power_switch_enabled(),
            output_enabled: self.output_enabled(),
            aux_output_enabled: self.aux_output_enabled(),
            flags: self.status_flags(),
            flash_pointer: self.flash_pointer(),
            timers: self.timers(),
            firmware: self.firmware_version(),
        }
    }

    pub fn set_switch(&mut self, switch: Switch, on: bool) {
        log::debug!("{} <- {on}", switch.symbol());
        self.backend.set_switch(switch, on);
    }

    pub fn set_aux_output_enabled(&mut self, on: bool) {
        self.set_switch(Switch::AuxOutput, on);
    }

    pub fn set_power_switch_enabled(&mut self, on: bool) {
        self.set_switch(Switch::PowerSwitch, on);
    }

    pub fn set_output_enabled(&mut self, on: bool) {
        self.set_switch(Switch::Output, on);
    }

    /// Moves the output voltage one step. Reset along with the converter;
    /// persistent values go through the flash variables.
    pub fn step_output_voltage(&mut self, step: VoltageStep) {
        self.backend.step_output_voltage(step == VoltageStep::Up);
    }

    /// Sets the output voltage until the converter resets.
    pub fn set_output_voltage_volatile(&mut self, volts: f32) {
        log::debug!("volatile vout <- {volts:.2} V");
        self.backend.set_output_voltage(volts);
    }

    pub(crate) fn byte(&self, register: ByteRegister) -> u8 {
        self.backend.read_byte(register)
    }
}

impl<B: Backend, C: Clock> Drop for Converter<B, C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn wait_for_connection<B: Backend, C: Clock>(backend: &B, clock: &C, config: &SessionConfig) -> bool {
    let deadline = clock.now() + config.connect_timeout();
    while clock.now() < deadline {
        if backend.read_byte(ByteRegister::Connected) == 1 {
            return true;
        }
        clock.sleep(config.poll_interval());
    }
    false
}

pub(crate) fn c_buffer_to_string(buffer: &[u8]) -> String {
    let end = buffer.iter().position(|&b| b == 0).unwrap_or(buffer.len());
    String::from_utf8_lossy(&buffer[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_clock::TestClock;
    use crate::mock::{Call, MockBackend};
    use std::time::Duration;

    fn config() -> SessionConfig {
        SessionConfig::new()
            .with_connect_timeout(Duration::from_millis(500))
            .with_poll_interval(Duration::from_millis(10))
    }

    #[test]
    fn immediate_open_skips_polling() {
        let backend = MockBackend::connected();
        let state = backend.state.clone();
        let clock = TestClock::new();

        let converter = Converter::with_backend_and_clock(backend, config(), clock.clone())
            .expect("stub opens immediately");

        assert!(converter.is_open());
        assert_eq!(state.connected_polls.get(), 0);
        assert_eq!(state.calls()[0], Call::OpenByIndex(1, 1_000));
        assert_eq!(clock.elapsed(), config().settle_delay());
    }

    #[test]
    fn failed_open_retries_until_connected() {
        let backend = MockBackend::failing_open(Some(3));
        let state = backend.state.clone();
        let clock = TestClock::new();

        let converter = Converter::with_backend_and_clock(backend, config(), clock.clone())
            .expect("stub connects on the fourth poll");

        assert!(converter.is_open());
        assert_eq!(state.connected_polls.get(), 4);
        assert_eq!(state.count(|call| *call == Call::Close), 0);
        assert_eq!(
            clock.elapsed(),
            Duration::from_millis(30) + config().settle_delay()
        );
    }

    #[test]
    fn never_connected_times_out_and_closes_once() {
        let backend = MockBackend::failing_open(None);
        let state = backend.state.clone();
        let clock = TestClock::new();
        let config = config().with_device_index(2);

        let result = Converter::with_backend_and_clock(backend, config.clone(), clock.clone());

        match result {
            Err(Error::NoDevice { index, timeout }) => {
                assert_eq!(index, 2);
                assert_eq!(timeout, Duration::from_millis(500));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("stub never connects"),
        }
        assert!(clock.elapsed() >= config.connect_timeout());
        assert!(clock.elapsed() <= config.connect_timeout() + config.poll_interval());
        assert_eq!(state.count(|call| *call == Call::Close), 1);
        assert_eq!(state.count(|call| *call == Call::DevicePath), 0);
    }

    #[test]
    fn invalid_index_never_touches_the_library() {
        let backend = MockBackend::connected();
        let state = backend.state.clone();

        let result = Converter::with_backend_and_clock(
            backend,
            config().with_device_index(0),
            TestClock::new(),
        );

        assert!(matches!(result, Err(Error::InvalidDeviceIndex(0))));
        assert!(state.calls().is_empty());
    }

    #[test]
    fn close_and_drop_close_exactly_once() {
        let backend = MockBackend::connected();
        let state = backend.state.clone();
        let converter =
            Converter::with_backend_and_clock(backend, config(), TestClock::new()).expect("open");
        converter.close();
        assert_eq!(state.count(|call| *call == Call::Close), 1);

        let backend = MockBackend::connected();
        let state = backend.state.clone();
        {
            let _converter = Converter::with_backend_and_clock(backend, config(), TestClock::new())
                .expect("open");
        }
        assert_eq!(state.count(|call| *call == Call::Close), 1);
    }

    #[test]
    fn firmware_version_is_major_dot_minor() {
        let backend = MockBackend::connected();
        backend.state.set_byte(ByteRegister::VersionMajor, 2);
        backend.state.set_byte(ByteRegister::VersionMinor, 7);
        let converter =
            Converter::with_backend_and_clock(backend, config(), TestClock::new()).expect("open");

        assert_eq!(converter.firmware_version_string(), "2.7");
    }

    #[test]
    fn device_path_stops_at_nul() {
        let backend = MockBackend::connected();
        *backend.state.device_path.borrow_mut() = String::from("usb#dcdc");
        let converter =
            Converter::with_backend_and_clock(backend, config(), TestClock::new()).expect("open");

        assert_eq!(converter.device_path(), "usb#dcdc");
    }

    #[test]
    fn telemetry_reads_every_register() {
        let backend = MockBackend::connected();
        let state = backend.state.clone();
        state.set_byte(ByteRegister::Mode, 1);
        state.set_byte(ByteRegister::OutputEnabled, 1);
        state.set_byte(ByteRegister::FlagsVoltage, 0x24);
        state.voltages.borrow_mut().insert(VoltageChannel::Input, 12.5);
        state.voltages.borrow_mut().insert(VoltageChannel::Output, 19.0);
        state.timers.borrow_mut().insert(Timer::OffDelay, 60);
        let converter =
            Converter::with_backend_and_clock(backend, config(), TestClock::new()).expect("open");

        let telemetry = converter.telemetry();

        assert!(telemetry.connected);
        assert_eq!(telemetry.mode, Mode::Automotive);
        assert!(telemetry.output_enabled);
        assert!(!telemetry.aux_output_enabled);
        assert_eq!(telemetry.flags.voltage, 0x24);
        assert_eq!(telemetry.input_voltage, 12.5);
        assert_eq!(telemetry.output_voltage, 19.0);
        assert_eq!(telemetry.timers.off_delay, 60);
    }

    #[test]
    fn mutators_pass_straight_through() {
        let backend = MockBackend::connected();
        let state = backend.state.clone();
        let mut converter =
            Converter::with_backend_and_clock(backend, config(), TestClock::new()).expect("open");

        converter.set_aux_output_enabled(true);
        converter.set_power_switch_enabled(false);
        converter.set_output_enabled(true);
        converter.step_output_voltage(VoltageStep::Down);
        converter.set_output_voltage_volatile(13.8);

        let calls = state.calls();
        assert_eq!(
            &calls[calls.len() - 5..],
            &[
                Call::SetSwitch(Switch::AuxOutput, true),
                Call::SetSwitch(Switch::PowerSwitch, false),
                Call::SetSwitch(Switch::Output, true),
                Call::StepOutputVoltage(false),
                Call::SetOutputVoltage(13.8),
            ]
        );
    }

    #[test]
    fn reopen_reports_vendor_flag() {
        let backend = MockBackend::connected();
        let state = backend.state.clone();
        let mut converter =
            Converter::with_backend_and_clock(backend, config(), TestClock::new()).expect("open");

        state.open_result.set(0);
        assert!(!converter.reopen_first());
        assert!(!converter.is_open());
        state.open_result.set(1);
        assert!(converter.reopen());
        assert!(converter.is_open());
        assert!(state.calls().contains(&Call::Open(1_000)));

        drop(converter);
        let opens = state.count(|call| matches!(call, Call::Open(_) | Call::OpenByIndex(..)));
        assert_eq!(opens, 3);
        assert_eq!(state.count(|call| *call == Call::Close), opens);
    }

    #[test]
    fn failed_reopen_is_closed_once_per_attempt() {
        let backend = MockBackend::connected();
        let state = backend.state.clone();
        let mut converter =
            Converter::with_backend_and_clock(backend, config(), TestClock::new()).expect("open");

        state.open_result.set(0);
        assert!(!converter.reopen());
        assert!(!converter.is_open());
        drop(converter);

        assert_eq!(state.count(|call| matches!(call, Call::OpenByIndex(..))), 2);
        assert_eq!(state.count(|call| *call == Call::Close), 2);
        let calls = state.calls();
        assert_eq!(calls[calls.len() - 2], Call::OpenByIndex(1, 1_000));
        assert_eq!(calls[calls.len() - 1], Call::Close);
    }

    #[test]
    fn reopen_of_open_session_closes_first() {
        let backend = MockBackend::connected();
        let state = backend.state.clone();
        let mut converter =
            Converter::with_backend_and_clock(backend, config(), TestClock::new()).expect("open");

        assert!(converter.reopen());

        let calls = state.calls();
        assert_eq!(&calls[calls.len() - 2..], &[Call::Close, Call::OpenByIndex(1, 1_000)]);
    }
}
