//! Motion primitives for a two-axis stage driven by an ODrive controller.
//!
//! - [`discovery`] finds attached controllers on the USB bus
//! - [`Axis`] wraps one driver axis: velocity/position/current control,
//!   gains and limits, calibration and homing against hard stops
//! - [`DualAxis`] moves two axes together
//!
//! Every call is synchronous. Blocking routines poll through an injectable
//! [`Clock`] and honor a [`CancelToken`].

pub mod clock;
pub mod config;
pub mod discovery;
pub mod error;
pub mod motor;
pub mod sim;
pub mod telemetry;
pub mod wait;

pub use clock::{CancelToken, Clock, ManualClock, SystemClock};
pub use config::Timing;
pub use discovery::{Connector, UsbLocation, UsbQuery, find_controllers};
#[cfg(feature = "usb")]
pub use discovery::{RusbQuery, find_odrives};
pub use error::{DiscoveryError, DriverError, Error, Result};
pub use motor::{Axis, AxisDevice, AxisHandle, AxisState, ControlMode, Direction, DualAxis};
pub use telemetry::{AxisTelemetry, StageTelemetry};
