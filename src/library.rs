use crate::backend::{Backend, ByteRegister, Switch, Timer, VariableBuffers, VoltageChannel};
use crate::constants::{
    DEVICE_PATH_LEN, LIBRARY_DIR, LIBRARY_STEM, VARIABLE_COMMENT_LEN, VARIABLE_FIELD_LEN,
};
use crate::error::{Error, Result};
use libloading::Library;
use std::ffi::{CStr, c_char, c_float, c_uchar, c_uint};
use std::path::{Path, PathBuf};

type OpenFn = unsafe extern "C" fn(c_uint) -> c_uchar;
type OpenByCntFn = unsafe extern "C" fn(c_uint, c_uint) -> c_uchar;
type PathFn = unsafe extern "C" fn(*mut c_char);
type VoidFn = unsafe extern "C" fn();
type ByteFn = unsafe extern "C" fn() -> c_uchar;
type FloatFn = unsafe extern "C" fn() -> c_float;
type UintFn = unsafe extern "C" fn() -> c_uint;
type SetByteFn = unsafe extern "C" fn(c_uchar);
type SetFloatFn = unsafe extern "C" fn(c_float);
type VariableDataFn =
    unsafe extern "C" fn(c_uint, *mut c_char, *mut c_char, *mut c_char, *mut c_char) -> c_uchar;
type SetVariableFn = unsafe extern "C" fn(c_uint, *const c_char) -> c_uchar;

/// Function table of `DCDCUsbLib`, typed once when the library is loaded.
struct Symbols {
    open: OpenFn,
    open_by_cnt: OpenByCntFn,
    device_path: PathFn,
    close: VoidFn,
    bytes: Vec<ByteFn>,
    voltages: Vec<FloatFn>,
    timers: Vec<UintFn>,
    switches: Vec<SetByteFn>,
    inc_dec_vout: SetByteFn,
    set_vout: SetFloatFn,
    load_flash: VoidFn,
    max_variable_cnt: UintFn,
    variable_data: VariableDataFn,
    set_variable_data: SetVariableFn,
    save_flash: VoidFn,
}

impl Symbols {
    fn resolve(library: &Library) -> Result<Self> {
        let mut bytes = Vec::with_capacity(ByteRegister::ALL.len());
        for register in ByteRegister::ALL {
            bytes.push(symbol(library, register.symbol())?);
        }
        let mut voltages = Vec::with_capacity(VoltageChannel::ALL.len());
        for channel in VoltageChannel::ALL {
            voltages.push(symbol(library, channel.symbol())?);
        }
        let mut timers = Vec::with_capacity(Timer::ALL.len());
        for timer in Timer::ALL {
            timers.push(symbol(library, timer.symbol())?);
        }
        let mut switches = Vec::with_capacity(Switch::ALL.len());
        for switch in Switch::ALL {
            switches.push(symbol(library, switch.symbol())?);
        }

        Ok(Self {
            open: symbol(library, "dcdcOpenDevice")?,
            open_by_cnt: symbol(library, "dcdcOpenDeviceByCnt")?,
            device_path: symbol(library, "dcdcGetDevicePath")?,
            close: symbol(library, "dcdcCloseDevice")?,
            bytes,
            voltages,
            timers,
            switches,
            inc_dec_vout: symbol(library, "dcdcIncDecVOutVolatile")?,
            set_vout: symbol(library, "dcdcSetVOutVolatile")?,
            load_flash: symbol(library, "dcdcLoadFlashValues")?,
            max_variable_cnt: symbol(library, "dcdcGetMaxVariableCnt")?,
            variable_data: symbol(library, "dcdcGetVariableData")?,
            set_variable_data: symbol(library, "dcdcSetVariableData")?,
            save_flash: symbol(library, "dcdcSaveFlashValues")?,
        })
    }
}

fn symbol<T: Copy>(library: &Library, name: &'static str) -> Result<T> {
    // SAFETY: every caller pairs `name` with the signature the vendor
    // header declares for it; the pointer lives as long as `library`.
    let resolved = unsafe { library.get::<T>(name.as_bytes()) }.map_err(|source| {
        Error::MissingSymbol {
            symbol: name,
            source,
        }
    })?;
    Ok(*resolved)
}

/// The vendor `DCDCUsbLib` shared library, loaded at runtime.
///
/// The library keeps one implicit, process-wide device connection. Holding
/// two `DcdcLibrary` values does not give two independent sessions.
pub struct DcdcLibrary {
    symbols: Symbols,
    path: PathBuf,
    _library: Library,
}

impl DcdcLibrary {
    /// Loads the library from `DLL/` next to the running executable.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path()?)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        log::debug!("loading vendor library from {}", path.display());

        // SAFETY: loading runs the library's initialisers; DCDCUsbLib has no
        // preconditions beyond being the vendor build for this platform.
        let library = unsafe { Library::new(&path) }.map_err(|source| {
            log::error!("vendor library {} could not be loaded", path.display());
            Error::LibraryLoad {
                path: path.clone(),
                source,
            }
        })?;
        let symbols = Symbols::resolve(&library)?;

        log::info!("{LIBRARY_STEM} loaded successfully");
        Ok(Self {
            symbols,
            path,
            _library: library,
        })
    }

    pub fn default_path() -> Result<PathBuf> {
        let exe = std::env::current_exe()?;
        let dir = exe.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(dir
            .join(LIBRARY_DIR)
            .join(libloading::library_filename(LIBRARY_STEM)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Backend for DcdcLibrary {
    fn open(&mut self, timer_ms: u32) -> u8 {
        unsafe { (self.symbols.open)(timer_ms) }
    }

    fn open_by_index(&mut self, index: u32, timer_ms: u32) -> u8 {
        unsafe { (self.symbols.open_by_cnt)(index, timer_ms) }
    }

    fn device_path(&self, buffer: &mut [u8]) {
        let mut scratch = [0u8; DEVICE_PATH_LEN];
        // SAFETY: the vendor writes at most DEVICE_PATH_LEN bytes.
        unsafe { (self.symbols.device_path)(scratch.as_mut_ptr().cast()) };
        copy_truncated(&scratch, buffer);
    }

    fn close(&mut self) {
        unsafe { (self.symbols.close)() }
    }

    fn read_byte(&self, register: ByteRegister) -> u8 {
        unsafe { (self.symbols.bytes[register as usize])() }
    }

    fn read_voltage(&self, channel: VoltageChannel) -> f32 {
        unsafe { (self.symbols.voltages[channel as usize])() }
    }

    fn read_timer(&self, timer: Timer) -> u32 {
        unsafe { (self.symbols.timers[timer as usize])() }
    }

    fn set_switch(&mut self, switch: Switch, on: bool) {
        unsafe { (self.symbols.switches[switch as usize])(u8::from(on)) }
    }

    fn step_output_voltage(&mut self, increase: bool) {
        unsafe { (self.symbols.inc_dec_vout)(u8::from(increase)) }
    }

    fn set_output_voltage(&mut self, volts: f32) {
        unsafe { (self.symbols.set_vout)(volts) }
    }

    fn load_flash(&mut self) {
        unsafe { (self.symbols.load_flash)() }
    }

    fn max_variable_count(&self) -> u32 {
        unsafe { (self.symbols.max_variable_cnt)() }
    }

    fn variable_data(&self, index: u32, buffers: VariableBuffers<'_>) -> u8 {
        let mut name = [0u8; VARIABLE_FIELD_LEN];
        let mut value = [0u8; VARIABLE_FIELD_LEN];
        let mut unit = [0u8; VARIABLE_FIELD_LEN];
        let mut comment = [0u8; VARIABLE_COMMENT_LEN];

        // SAFETY: buffer sizes are the maxima documented by the vendor.
        let exists = unsafe {
            (self.symbols.variable_data)(
                index,
                name.as_mut_ptr().cast(),
                value.as_mut_ptr().cast(),
                unit.as_mut_ptr().cast(),
                comment.as_mut_ptr().cast(),
            )
        };

        copy_truncated(&name, buffers.name);
        copy_truncated(&value, buffers.value);
        copy_truncated(&unit, buffers.unit);
        copy_truncated(&comment, buffers.comment);
        exists
    }

    fn set_variable_data(&mut self, index: u32, value: &CStr) -> u8 {
        unsafe { (self.symbols.set_variable_data)(index, value.as_ptr()) }
    }

    fn save_flash(&mut self) {
        unsafe { (self.symbols.save_flash)() }
    }
}

fn copy_truncated(source: &[u8], target: &mut [u8]) {
    let len = source.len().min(target.len());
    target[..len].copy_from_slice(&source[..len]);
}
