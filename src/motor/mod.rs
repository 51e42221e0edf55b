// Motor control module for the two-axis stage
//
// Provides:
// - The driver boundary trait for one ODrive axis
// - Single-axis controller with calibration and homing
// - Dual-axis controller composing two single axes

mod axis;
mod dual;
pub mod handle;

pub use axis::{Axis, Direction};
pub use dual::DualAxis;
pub use handle::{AxisDevice, AxisHandle, AxisState, ControlMode, DriverResult};
