//! Fixed values of the DCDC-USB-200 and its vendor library.

use std::time::Duration;

/// USB vendor id of the DCDC-USB-200 (Microchip).
pub const DW_VID: u16 = 0x04d8;
/// USB product id of the DCDC-USB-200.
pub const DW_PID: u16 = 0xd003;

/// File stem of the vendor library; the platform prefix/suffix is added at load.
pub const LIBRARY_STEM: &str = "DCDCUsbLib";
/// Directory, relative to the running executable, holding the vendor library.
pub const LIBRARY_DIR: &str = "DLL";

pub const DEVICE_PATH_LEN: usize = 1024;
pub const VARIABLE_FIELD_LEN: usize = 256;
pub const VARIABLE_COMMENT_LEN: usize = 1024;

/// `dcdcGetLoadState` value reported once the flash copy is complete.
pub const LOAD_COMPLETE: u8 = 100;

/// Write cycles the converter's flash is rated for.
pub const FLASH_WRITE_ENDURANCE: u32 = 10_000;

pub const MIN_RECOMMENDED_REFRESH: Duration = Duration::from_secs(1);
pub const MAX_RECOMMENDED_REFRESH: Duration = Duration::from_secs(10);
