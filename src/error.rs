use std::time::Duration;

use thiserror::Error;

/// Failure reported by the external driver while reading or writing an axis.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DriverError {
    #[error("driver communication error: {0}")]
    Communication(String),

    #[error("device disconnected")]
    Disconnected,

    #[error("invalid value {value} for {field}")]
    InvalidValue { field: &'static str, value: u8 },
}

/// Errors from calibration, homing and control calls.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("could not calibrate {axes:?} within {timeout:?}, try rebooting the controller")]
    CalibrationTimeout { axes: Vec<String>, timeout: Duration },

    #[error("could not home correctly: measured length {measured}, expected {expected} (tolerance {tolerance})")]
    HomingOutOfTolerance {
        measured: f32,
        expected: f32,
        tolerance: f32,
    },

    #[error("axis still moving after {timeout:?}")]
    MotionTimeout { timeout: Duration },

    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Errors from enumerating and connecting to controllers.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("USB enumeration error: {0}")]
    Usb(String),

    #[error("could not connect to {connection}: {source}")]
    Connect {
        connection: String,
        #[source]
        source: DriverError,
    },
}

#[cfg(feature = "usb")]
impl From<rusb::Error> for DiscoveryError {
    fn from(e: rusb::Error) -> Self {
        DiscoveryError::Usb(e.to_string())
    }
}
