use crate::constants::{DW_PID, DW_VID};
use crate::error::{Error, Result};
use rusb::{Context, UsbContext};

/// A DCDC-USB-200 seen on the bus, independent of the vendor library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbDeviceInfo {
    /// 1-based position, as taken by [`SessionConfig::with_device_index`](crate::SessionConfig::with_device_index).
    pub ordinal: u32,
    pub bus: u8,
    pub address: u8,
}

/// Lists attached converters by VID/PID.
///
/// The ordinal follows libusb's enumeration order, which usually but not
/// necessarily matches the vendor library's own numbering.
pub fn list_devices() -> Result<Vec<UsbDeviceInfo>> {
    let context = Context::new().map_err(|err| usb_error(err, "libusb_init"))?;
    let devices = context
        .devices()
        .map_err(|err| usb_error(err, "libusb_get_device_list"))?;

    let mut found = Vec::new();
    for device in devices.iter() {
        let descriptor = match device.device_descriptor() {
            Ok(descriptor) => descriptor,
            Err(err) => {
                log::debug!(
                    "skipping {:03}:{:03}: {err}",
                    device.bus_number(),
                    device.address()
                );
                continue;
            }
        };
        if !is_converter(descriptor.vendor_id(), descriptor.product_id()) {
            continue;
        }
        found.push(UsbDeviceInfo {
            ordinal: found.len() as u32 + 1,
            bus: device.bus_number(),
            address: device.address(),
        });
    }

    log::debug!("found {} DCDC-USB device(s)", found.len());
    Ok(found)
}

fn is_converter(vid: u16, pid: u16) -> bool {
    vid == DW_VID && pid == DW_PID
}

fn usb_error(err: rusb::Error, context: &'static str) -> Error {
    Error::Usb {
        source: err,
        context,
    }
}
