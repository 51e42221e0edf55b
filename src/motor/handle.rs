// Driver boundary: the part of an ODrive axis object this crate touches
//
// The object tree mirrors the driver's:
//   axis.requested_state / axis.current_state
//   axis.controller.{config.{control_mode, vel_limit, pos_gain, vel_gain, vel_integrator_gain},
//                    vel_setpoint, pos_setpoint, current_setpoint, move_to_pos()}
//   axis.motor.{is_calibrated, config.{current_lim, calibration_current},
//               current_meas_phB, current_meas_phC}
//   axis.encoder.{pos_estimate, vel_estimate}

use serde::{Deserialize, Serialize};

use crate::error::DriverError;

pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Axis state machine values (`AXIS_STATE_*`)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisState {
    Undefined = 0,
    Idle = 1,
    StartupSequence = 2,
    FullCalibrationSequence = 3,
    MotorCalibration = 4,
    SensorlessControl = 5,
    EncoderIndexSearch = 6,
    EncoderOffsetCalibration = 7,
    ClosedLoopControl = 8,
}

impl TryFrom<u8> for AxisState {
    type Error = DriverError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => AxisState::Undefined,
            1 => AxisState::Idle,
            2 => AxisState::StartupSequence,
            3 => AxisState::FullCalibrationSequence,
            4 => AxisState::MotorCalibration,
            5 => AxisState::SensorlessControl,
            6 => AxisState::EncoderIndexSearch,
            7 => AxisState::EncoderOffsetCalibration,
            8 => AxisState::ClosedLoopControl,
            _ => {
                return Err(DriverError::InvalidValue {
                    field: "axis state",
                    value,
                });
            }
        })
    }
}

/// Controller modes (`CTRL_MODE_*`)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    Voltage = 0,
    Current = 1,
    Velocity = 2,
    Position = 3,
    Trajectory = 4,
}

impl TryFrom<u8> for ControlMode {
    type Error = DriverError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => ControlMode::Voltage,
            1 => ControlMode::Current,
            2 => ControlMode::Velocity,
            3 => ControlMode::Position,
            4 => ControlMode::Trajectory,
            _ => {
                return Err(DriverError::InvalidValue {
                    field: "control mode",
                    value,
                });
            }
        })
    }
}

/// One physical motor axis as exposed by the external driver.
///
/// Implementations forward each call to the driver's property get/set or
/// method call. They are not expected to be shared between threads.
pub trait AxisHandle {
    fn request_state(&mut self, state: AxisState) -> DriverResult<()>;
    fn current_state(&mut self) -> DriverResult<AxisState>;

    fn control_mode(&mut self) -> DriverResult<ControlMode>;
    fn set_control_mode(&mut self, mode: ControlMode) -> DriverResult<()>;

    fn set_vel_setpoint(&mut self, vel: f32) -> DriverResult<()>;
    fn pos_setpoint(&mut self) -> DriverResult<f32>;
    fn set_pos_setpoint(&mut self, pos: f32) -> DriverResult<()>;
    fn set_current_setpoint(&mut self, current: f32) -> DriverResult<()>;
    /// Trapezoidal trajectory move to `pos` (trajectory mode).
    fn move_to_pos(&mut self, pos: f32) -> DriverResult<()>;

    fn pos_estimate(&mut self) -> DriverResult<f32>;
    fn vel_estimate(&mut self) -> DriverResult<f32>;

    fn vel_limit(&mut self) -> DriverResult<f32>;
    fn set_vel_limit(&mut self, vel: f32) -> DriverResult<()>;
    fn current_lim(&mut self) -> DriverResult<f32>;
    fn set_current_lim(&mut self, current: f32) -> DriverResult<()>;
    fn calibration_current(&mut self) -> DriverResult<f32>;
    fn set_calibration_current(&mut self, current: f32) -> DriverResult<()>;

    fn pos_gain(&mut self) -> DriverResult<f32>;
    fn set_pos_gain(&mut self, gain: f32) -> DriverResult<()>;
    fn vel_gain(&mut self) -> DriverResult<f32>;
    fn set_vel_gain(&mut self, gain: f32) -> DriverResult<()>;
    fn vel_integrator_gain(&mut self) -> DriverResult<f32>;
    fn set_vel_integrator_gain(&mut self, gain: f32) -> DriverResult<()>;

    fn is_calibrated(&mut self) -> DriverResult<bool>;
    fn current_meas_ph_b(&mut self) -> DriverResult<f32>;
    fn current_meas_ph_c(&mut self) -> DriverResult<f32>;
}

/// A connected controller board carrying two axes.
pub trait AxisDevice {
    type Axis: AxisHandle;

    /// Split the device into its `axis0` and `axis1` handles.
    fn into_axes(self) -> (Self::Axis, Self::Axis);
}

macro_rules! forward_axis_handle {
    () => {
        fn request_state(&mut self, state: AxisState) -> DriverResult<()> { (**self).request_state(state) }
        fn current_state(&mut self) -> DriverResult<AxisState> { (**self).current_state() }
        fn control_mode(&mut self) -> DriverResult<ControlMode> { (**self).control_mode() }
        fn set_control_mode(&mut self, mode: ControlMode) -> DriverResult<()> { (**self).set_control_mode(mode) }
        fn set_vel_setpoint(&mut self, vel: f32) -> DriverResult<()> { (**self).set_vel_setpoint(vel) }
        fn pos_setpoint(&mut self) -> DriverResult<f32> { (**self).pos_setpoint() }
        fn set_pos_setpoint(&mut self, pos: f32) -> DriverResult<()> { (**self).set_pos_setpoint(pos) }
        fn set_current_setpoint(&mut self, current: f32) -> DriverResult<()> { (**self).set_current_setpoint(current) }
        fn move_to_pos(&mut self, pos: f32) -> DriverResult<()> { (**self).move_to_pos(pos) }
        fn pos_estimate(&mut self) -> DriverResult<f32> { (**self).pos_estimate() }
        fn vel_estimate(&mut self) -> DriverResult<f32> { (**self).vel_estimate() }
        fn vel_limit(&mut self) -> DriverResult<f32> { (**self).vel_limit() }
        fn set_vel_limit(&mut self, vel: f32) -> DriverResult<()> { (**self).set_vel_limit(vel) }
        fn current_lim(&mut self) -> DriverResult<f32> { (**self).current_lim() }
        fn set_current_lim(&mut self, current: f32) -> DriverResult<()> { (**self).set_current_lim(current) }
        fn calibration_current(&mut self) -> DriverResult<f32> { (**self).calibration_current() }
        fn set_calibration_current(&mut self, current: f32) -> DriverResult<()> { (**self).set_calibration_current(current) }
        fn pos_gain(&mut self) -> DriverResult<f32> { (**self).pos_gain() }
        fn set_pos_gain(&mut self, gain: f32) -> DriverResult<()> { (**self).set_pos_gain(gain) }
        fn vel_gain(&mut self) -> DriverResult<f32> { (**self).vel_gain() }
        fn set_vel_gain(&mut self, gain: f32) -> DriverResult<()> { (**self).set_vel_gain(gain) }
        fn vel_integrator_gain(&mut self) -> DriverResult<f32> { (**self).vel_integrator_gain() }
        fn set_vel_integrator_gain(&mut self, gain: f32) -> DriverResult<()> { (**self).set_vel_integrator_gain(gain) }
        fn is_calibrated(&mut self) -> DriverResult<bool> { (**self).is_calibrated() }
        fn current_meas_ph_b(&mut self) -> DriverResult<f32> { (**self).current_meas_ph_b() }
        fn current_meas_ph_c(&mut self) -> DriverResult<f32> { (**self).current_meas_ph_c() }
    };
}

// Borrowed handles: the driver keeps ownership, the controller borrows it.
impl<H: AxisHandle + ?Sized> AxisHandle for &mut H {
    forward_axis_handle!();
}

impl<H: AxisHandle + ?Sized> AxisHandle for Box<H> {
    forward_axis_handle!();
}
