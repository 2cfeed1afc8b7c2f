use rusb::Error as UsbLibError;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    LibraryLoad {
        path: PathBuf,
        source: libloading::Error,
    },
    MissingSymbol {
        symbol: &'static str,
        source: libloading::Error,
    },
    InvalidDeviceIndex(u32),
    NoDevice {
        index: u32,
        timeout: Duration,
    },
    Timeout(&'static str),
    InvalidValue(&'static str),
    Usb {
        source: UsbLibError,
        context: &'static str,
    },
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::LibraryLoad { path, source } => {
                write!(f, "failed to load vendor library {}: {source}", path.display())
            }
            Error::MissingSymbol { symbol, source } => {
                write!(f, "vendor library does not export `{symbol}`: {source}")
            }
            Error::InvalidDeviceIndex(index) => {
                write!(f, "device index {index} is invalid (indices start at 1)")
            }
            Error::NoDevice { index, timeout } => write!(
                f,
                "no DCDC-USB device {index} connected within {:.1}s",
                timeout.as_secs_f32()
            ),
            Error::Timeout(context) => write!(f, "operation `{context}` timed out"),
            Error::InvalidValue(reason) => write!(f, "invalid value: {reason}"),
            Error::Usb { source, context } => {
                write!(f, "usb error {source} in `{context}`")
            }
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::LibraryLoad { source, .. } | Error::MissingSymbol { source, .. } => {
                Some(source)
            }
            Error::Usb { source, .. } => Some(source),
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}
