//! Recording stand-in for the vendor library.

use crate::backend::{Backend, ByteRegister, Switch, Timer, VariableBuffers, VoltageChannel};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ffi::CStr;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Open(u32),
    OpenByIndex(u32, u32),
    DevicePath,
    Close,
    SetSwitch(Switch, bool),
    StepOutputVoltage(bool),
    SetOutputVoltage(f32),
    LoadFlash,
    SetVariable(u32, String),
    SaveFlash,
}

#[derive(Debug, Clone)]
pub struct MockVariable {
    pub name: String,
    pub value: String,
    pub unit: String,
    pub comment: String,
}

/// State shared between a [`MockBackend`] and the test holding it.
#[derive(Debug, Default)]
pub struct MockState {
    pub open_result: Cell<u8>,
    /// Polls of `Connected` answered with 0 before answering 1. `None` never connects.
    pub polls_before_connect: Cell<Option<usize>>,
    pub connected_polls: Cell<usize>,
    pub bytes: RefCell<HashMap<ByteRegister, u8>>,
    pub voltages: RefCell<HashMap<VoltageChannel, f32>>,
    pub timers: RefCell<HashMap<Timer, u32>>,
    pub device_path: RefCell<String>,
    pub variables: RefCell<Vec<MockVariable>>,
    /// Successive `LoadState` answers; the last one repeats.
    pub load_states: RefCell<Vec<u8>>,
    pub set_variable_result: Cell<u8>,
    pub calls: RefCell<Vec<Call>>,
}

impl MockState {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.borrow().iter().filter(|call| predicate(call)).count()
    }

    pub fn set_byte(&self, register: ByteRegister, value: u8) {
        self.bytes.borrow_mut().insert(register, value);
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

#[derive(Debug, Clone)]
pub struct MockBackend {
    pub state: Rc<MockState>,
}

impl MockBackend {
    /// A stub whose first open succeeds.
    pub fn connected() -> Self {
        let backend = Self::failing_open(Some(0));
        backend.state.open_result.set(1);
        backend
    }

    pub fn failing_open(polls_before_connect: Option<usize>) -> Self {
        let state = MockState {
            polls_before_connect: Cell::new(polls_before_connect),
            set_variable_result: Cell::new(1),
            ..MockState::default()
        };
        *state.device_path.borrow_mut() = String::from("\\\\?\\hid#vid_04d8&pid_d003");
        Self {
            state: Rc::new(state),
        }
    }

    pub fn with_variables(self, variables: &[(&str, &str, &str, &str)]) -> Self {
        *self.state.variables.borrow_mut() = variables
            .iter()
            .map(|(name, value, unit, comment)| MockVariable {
                name: name.to_string(),
                value: value.to_string(),
                unit: unit.to_string(),
                comment: comment.to_string(),
            })
            .collect();
        self
    }
}

fn write_c_string(text: &str, buffer: &mut [u8]) {
    buffer.fill(0);
    let len = text.len().min(buffer.len().saturating_sub(1));
    buffer[..len].copy_from_slice(&text.as_bytes()[..len]);
}

impl Backend for MockBackend {
    fn open(&mut self, timer_ms: u32) -> u8 {
        self.state.record(Call::Open(timer_ms));
        self.state.open_result.get()
    }

    fn open_by_index(&mut self, index: u32, timer_ms: u32) -> u8 {
        self.state.record(Call::OpenByIndex(index, timer_ms));
        self.state.open_result.get()
    }

    fn device_path(&self, buffer: &mut [u8]) {
        self.state.record(Call::DevicePath);
        write_c_string(&self.state.device_path.borrow(), buffer);
    }

    fn close(&mut self) {
        self.state.record(Call::Close);
    }

    fn read_byte(&self, register: ByteRegister) -> u8 {
        match register {
            ByteRegister::Connected => {
                let polls = self.state.connected_polls.get();
                self.state.connected_polls.set(polls + 1);
                if self.state.open_result.get() == 1 {
                    return 1;
                }
                match self.state.polls_before_connect.get() {
                    Some(limit) if polls >= limit => 1,
                    _ => 0,
                }
            }
            ByteRegister::LoadState => {
                let mut states = self.state.load_states.borrow_mut();
                match states.len() {
                    0 => 0,
                    1 => states[0],
                    _ => states.remove(0),
                }
            }
            other => self.state.bytes.borrow().get(&other).copied().unwrap_or(0),
        }
    }

    fn read_voltage(&self, channel: VoltageChannel) -> f32 {
        self.state.voltages.borrow().get(&channel).copied().unwrap_or(0.0)
    }

    fn read_timer(&self, timer: Timer) -> u32 {
        self.state.timers.borrow().get(&timer).copied().unwrap_or(0)
    }

    fn set_switch(&mut self, switch: Switch, on: bool) {
        self.state.record(Call::SetSwitch(switch, on));
    }

    fn step_output_voltage(&mut self, increase: bool) {
        self.state.record(Call::StepOutputVoltage(increase));
    }

    fn set_output_voltage(&mut self, volts: f32) {
        self.state.record(Call::SetOutputVoltage(volts));
    }

    fn load_flash(&mut self) {
        self.state.record(Call::LoadFlash);
    }

    fn max_variable_count(&self) -> u32 {
        self.state.variables.borrow().len() as u32
    }

    fn variable_data(&self, index: u32, buffers: VariableBuffers<'_>) -> u8 {
        let variables = self.state.variables.borrow();
        let Some(variable) = variables.get(index as usize) else {
            return 0;
        };
        write_c_string(&variable.name, buffers.name);
        write_c_string(&variable.value, buffers.value);
        write_c_string(&variable.unit, buffers.unit);
        write_c_string(&variable.comment, buffers.comment);
        1
    }

    fn set_variable_data(&mut self, index: u32, value: &CStr) -> u8 {
        let value = value.to_string_lossy().into_owned();
        if let Some(variable) = self.state.variables.borrow_mut().get_mut(index as usize) {
            variable.value = value.clone();
        }
        self.state.record(Call::SetVariable(index, value));
        self.state.set_variable_result.get()
    }

    fn save_flash(&mut self) {
        self.state.record(Call::SaveFlash);
    }
}
