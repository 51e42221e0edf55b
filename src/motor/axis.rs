// Single-axis controller
//
// Wraps one driver axis handle with friendlier control calls, a zero
// offset between raw encoder space and caller space, and the blocking
// calibration and homing routines.

use tracing::{debug, info, warn};

use super::handle::{AxisHandle, AxisState, ControlMode};
use crate::clock::{CancelToken, Clock, SystemClock};
use crate::config::{DEFAULT_VEL_LIMIT, Timing};
use crate::error::{Error, Result};
use crate::telemetry::AxisTelemetry;
use crate::wait::{WaitOutcome, pause, poll_until};

/// Which end of the track homing treats as the far end.
///
/// `Positive` drives toward the negative stop first, so the homed track
/// only has positive positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Positive,
    Negative,
}

impl Direction {
    pub fn sign(self) -> f32 {
        match self {
            Direction::Positive => 1.0,
            Direction::Negative => -1.0,
        }
    }
}

/// Controller for one motor axis.
///
/// Invariant: `get_position() == get_raw_position() - zero_offset()`.
pub struct Axis<H: AxisHandle, C: Clock = SystemClock> {
    handle: H,
    zero: f32,
    name: String,
    timing: Timing,
    clock: C,
    cancel: CancelToken,
}

impl<H: AxisHandle> Axis<H> {
    /// Wrap `handle` with the default velocity limit (20000)
    pub fn new(handle: H) -> Result<Self> {
        Self::with_vel_limit(handle, DEFAULT_VEL_LIMIT)
    }

    pub fn with_vel_limit(handle: H, vel_limit: f32) -> Result<Self> {
        Self::with_clock(handle, vel_limit, SystemClock)
    }
}

impl<H: AxisHandle, C: Clock> Axis<H, C> {
    /// Wrap `handle`, applying `vel_limit` to its controller config.
    ///
    /// The zero offset starts at 0.
    pub fn with_clock(mut handle: H, vel_limit: f32, clock: C) -> Result<Self> {
        handle.set_vel_limit(vel_limit)?;
        info!("Axis controller ready, velocity limit {}", vel_limit);
        Ok(Self {
            handle,
            zero: 0.0,
            name: "axis".to_string(),
            timing: Timing::default(),
            clock,
            cancel: CancelToken::new(),
        })
    }

    /// Name used in log lines and error reports
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Token checked by every blocking routine of this axis
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn handle(&self) -> &H {
        &self.handle
    }

    pub fn handle_mut(&mut self) -> &mut H {
        &mut self.handle
    }

    /// Give the driver handle back
    pub fn into_handle(self) -> H {
        self.handle
    }

    pub fn zero_offset(&self) -> f32 {
        self.zero
    }

    // === Calibration ===

    /// Run the full calibration sequence and block until the axis is idle again.
    ///
    /// Polls every 100 ms. Fails with [`Error::CalibrationTimeout`] after
    /// 15 s, in which case the controller usually needs a power cycle.
    /// The motor spins during calibration.
    pub fn calibrate(&mut self) -> Result<()> {
        info!("Calibrating {}", self.name);
        self.request_calibration()?;

        let handle = &mut self.handle;
        let outcome = poll_until(
            &self.clock,
            self.timing.calibration_poll,
            Some(self.timing.calibration_timeout),
            &self.cancel,
            || Ok(handle.current_state()? == AxisState::Idle),
        )?;

        match outcome {
            WaitOutcome::Satisfied => {
                info!("{} calibrated", self.name);
                Ok(())
            }
            WaitOutcome::TimedOut => {
                let err = Error::CalibrationTimeout {
                    axes: vec![self.name.clone()],
                    timeout: self.timing.calibration_timeout,
                };
                warn!("{}", err);
                Err(err)
            }
        }
    }

    pub(crate) fn request_calibration(&mut self) -> Result<()> {
        self.handle.request_state(AxisState::FullCalibrationSequence)?;
        Ok(())
    }

    pub(crate) fn is_idle(&mut self) -> Result<bool> {
        Ok(self.handle.current_state()? == AxisState::Idle)
    }

    /// Whether the driver reports the motor as calibrated
    pub fn is_calibrated(&mut self) -> Result<bool> {
        Ok(self.handle.is_calibrated()?)
    }

    /// Set the current used during motor calibration.
    ///
    /// # Arguments
    /// * `current` - Calibration current in amps
    pub fn set_calibration_current(&mut self, current: f32) -> Result<()> {
        self.handle.set_calibration_current(current)?;
        Ok(())
    }

    /// Current used during motor calibration
    pub fn get_calibration_current(&mut self) -> Result<f32> {
        Ok(self.handle.calibration_current()?)
    }

    // === Closed-loop commands (all return immediately) ===

    fn enter_closed_loop(&mut self, mode: ControlMode) -> Result<()> {
        self.handle.set_control_mode(mode)?;
        self.handle.request_state(AxisState::ClosedLoopControl)?;
        Ok(())
    }

    /// Hold velocity `vel` in closed-loop velocity control.
    ///
    /// Returns once the setpoint is written; the axis accelerates on its own.
    pub fn set_velocity(&mut self, vel: f32) -> Result<()> {
        debug!("{}: velocity setpoint {}", self.name, vel);
        self.enter_closed_loop(ControlMode::Velocity)?;
        self.handle.set_vel_setpoint(vel)?;
        Ok(())
    }

    /// Move to `pos` in zeroed coordinates (raw setpoint is `pos + zero_offset`)
    pub fn set_position(&mut self, pos: f32) -> Result<()> {
        let raw = pos + self.zero;
        debug!("{}: position setpoint {} (raw {})", self.name, pos, raw);
        self.enter_closed_loop(ControlMode::Position)?;
        self.handle.set_pos_setpoint(raw)?;
        Ok(())
    }

    /// Like [`set_position`](Self::set_position) but with a trapezoidal
    /// trajectory move instead of a bare setpoint.
    pub fn set_position_trajectory(&mut self, pos: f32) -> Result<()> {
        let raw = pos + self.zero;
        debug!("{}: trajectory move to {} (raw {})", self.name, pos, raw);
        self.enter_closed_loop(ControlMode::Trajectory)?;
        self.handle.move_to_pos(raw)?;
        Ok(())
    }

    /// Drive the motor with a constant current (closed-loop current control).
    ///
    /// # Arguments
    /// * `current` - Current setpoint in amps, sign gives the direction
    pub fn set_current(&mut self, current: f32) -> Result<()> {
        debug!("{}: current setpoint {}", self.name, current);
        self.enter_closed_loop(ControlMode::Current)?;
        self.handle.set_current_setpoint(current)?;
        Ok(())
    }

    /// Leave closed-loop control. The motor is no longer driven.
    pub fn idle(&mut self) -> Result<()> {
        info!("{} going idle", self.name);
        self.handle.request_state(AxisState::Idle)?;
        Ok(())
    }

    // === Position ===

    /// Replace the zero offset with `raw_position`.
    pub fn set_zero(&mut self, raw_position: f32) {
        self.zero = raw_position;
    }

    /// Position relative to the zero offset
    pub fn get_position(&mut self) -> Result<f32> {
        Ok(self.handle.pos_estimate()? - self.zero)
    }

    /// Encoder position estimate, without the zero offset
    pub fn get_raw_position(&mut self) -> Result<f32> {
        Ok(self.handle.pos_estimate()?)
    }

    /// Live encoder velocity estimate
    pub fn get_velocity(&mut self) -> Result<f32> {
        Ok(self.handle.vel_estimate()?)
    }

    /// Velocity heuristic for "still moving", using the configured threshold (500).
    pub fn is_busy(&mut self) -> Result<bool> {
        self.is_busy_above(self.timing.busy_threshold)
    }

    /// True iff `|velocity| > threshold`. Exactly at the threshold is not busy.
    pub fn is_busy_above(&mut self, threshold: f32) -> Result<bool> {
        Ok(self.get_velocity()?.abs() > threshold)
    }

    // === Limits and gains ===

    /// Set the controller's velocity ceiling.
    ///
    /// # Arguments
    /// * `vel` - Limit in counts/s, applied to later velocity and position moves
    pub fn set_velocity_limit(&mut self, vel: f32) -> Result<()> {
        self.handle.set_vel_limit(vel)?;
        Ok(())
    }

    /// Configured velocity ceiling
    pub fn get_velocity_limit(&mut self) -> Result<f32> {
        Ok(self.handle.vel_limit()?)
    }

    /// Set the motor current ceiling.
    ///
    /// # Arguments
    /// * `current` - Limit in amps
    pub fn set_current_limit(&mut self, current: f32) -> Result<()> {
        self.handle.set_current_lim(current)?;
        Ok(())
    }

    /// Configured motor current ceiling
    pub fn get_current_limit(&mut self) -> Result<f32> {
        Ok(self.handle.current_lim()?)
    }

    /// Set the position loop proportional gain.
    ///
    /// # Arguments
    /// * `gain` - (counts/s) per count of position error
    pub fn set_position_gain(&mut self, gain: f32) -> Result<()> {
        self.handle.set_pos_gain(gain)?;
        Ok(())
    }

    /// Position loop proportional gain
    pub fn get_position_gain(&mut self) -> Result<f32> {
        Ok(self.handle.pos_gain()?)
    }

    /// Set the velocity loop proportional gain.
    ///
    /// # Arguments
    /// * `gain` - A per (count/s) of velocity error
    pub fn set_velocity_gain(&mut self, gain: f32) -> Result<()> {
        self.handle.set_vel_gain(gain)?;
        Ok(())
    }

    /// Velocity loop proportional gain
    pub fn get_velocity_gain(&mut self) -> Result<f32> {
        Ok(self.handle.vel_gain()?)
    }

    /// Set the velocity loop integrator gain.
    ///
    /// # Arguments
    /// * `gain` - A per ((count/s) * s) of integrated velocity error
    pub fn set_velocity_integrator_gain(&mut self, gain: f32) -> Result<()> {
        self.handle.set_vel_integrator_gain(gain)?;
        Ok(())
    }

    /// Velocity loop integrator gain
    pub fn get_velocity_integrator_gain(&mut self) -> Result<f32> {
        Ok(self.handle.vel_integrator_gain()?)
    }

    // === Diagnostics ===

    /// Measured current on motor phase B
    pub fn get_phase_current_b(&mut self) -> Result<f32> {
        Ok(self.handle.current_meas_ph_b()?)
    }

    /// Measured current on motor phase C
    pub fn get_phase_current_c(&mut self) -> Result<f32> {
        Ok(self.handle.current_meas_ph_c()?)
    }

    /// Read every live value at once
    pub fn telemetry(&mut self) -> Result<AxisTelemetry> {
        let raw_position = self.get_raw_position()?;
        Ok(AxisTelemetry {
            state: self.handle.current_state()?,
            position: raw_position - self.zero,
            raw_position,
            velocity: self.get_velocity()?,
            phase_current_b: self.get_phase_current_b()?,
            phase_current_c: self.get_phase_current_c()?,
        })
    }

    // === Homing ===

    /// Home against the mechanical stops using current control.
    ///
    /// Drives at `-current1 * direction` into the first stop and zeroes
    /// there. With `expected_length`, drives at `current2 * direction` into
    /// the opposite stop and checks the measured track length against it
    /// (tolerance 50). Ends by commanding position 0.
    ///
    /// # Errors
    /// [`Error::HomingOutOfTolerance`] when the measured length is off;
    /// the axis is left pressing against the far stop.
    /// [`Error::Cancelled`] and [`Error::MotionTimeout`] put the axis in
    /// idle before returning.
    pub fn home(
        &mut self,
        current1: f32,
        current2: f32,
        expected_length: Option<f32>,
        direction: Direction,
    ) -> Result<()> {
        info!("Homing {} by current ({}, {})", self.name, current1, current2);
        self.run_homing(Self::set_current, current1, current2, expected_length, direction)
    }

    /// Same sequence as [`home`](Self::home), driving with velocity
    /// setpoints of magnitude `vel` instead of currents.
    pub fn home_with_velocity(
        &mut self,
        vel: f32,
        expected_length: Option<f32>,
        direction: Direction,
    ) -> Result<()> {
        info!("Homing {} by velocity {}", self.name, vel);
        self.run_homing(Self::set_velocity, vel, vel, expected_length, direction)
    }

    // Cancel and motion timeout idle the axis before returning; a length
    // mismatch leaves it driven against the far stop.
    fn run_homing<F>(
        &mut self,
        drive: F,
        first: f32,
        second: f32,
        expected_length: Option<f32>,
        direction: Direction,
    ) -> Result<()>
    where
        F: FnMut(&mut Self, f32) -> Result<()>,
    {
        let result = self.homing_sequence(drive, first, second, expected_length, direction);
        if let Err(err @ (Error::Cancelled | Error::MotionTimeout { .. })) = &result {
            warn!("{}: homing aborted ({}), going idle", self.name, err);
            if let Err(idle_err) = self.idle() {
                warn!("{}: could not idle after abort: {}", self.name, idle_err);
            }
        }
        result
    }

    fn homing_sequence<F>(
        &mut self,
        mut drive: F,
        first: f32,
        second: f32,
        expected_length: Option<f32>,
        direction: Direction,
    ) -> Result<()>
    where
        F: FnMut(&mut Self, f32) -> Result<()>,
    {
        let sign = direction.sign();

        drive(self, -first * sign)?;
        self.settle()?;
        self.wait_until_stopped()?;
        self.settle()?;

        let raw = self.get_raw_position()?;
        self.set_zero(raw);
        info!("{} zeroed at raw position {}", self.name, raw);
        self.settle()?;

        if let Some(expected) = expected_length {
            drive(self, second * sign)?;
            self.settle()?;
            self.wait_until_stopped()?;
            self.settle()?;

            // signed position against expected_length as given, whatever the direction
            let measured = self.get_position()?;
            info!("{} reached far stop at {}", self.name, measured);
            let tolerance = self.timing.homing_tolerance;
            if (measured - expected).abs() > tolerance {
                let err = Error::HomingOutOfTolerance {
                    measured,
                    expected,
                    tolerance,
                };
                warn!("{}: {}", self.name, err);
                return Err(err);
            }
        }

        self.set_position(0.0)?;
        info!("{} homed correctly", self.name);
        Ok(())
    }

    fn settle(&self) -> Result<()> {
        pause(
            &self.clock,
            self.timing.homing_settle,
            self.timing.homing_poll,
            &self.cancel,
        )
    }

    /// Poll `is_busy` until the axis slows below the threshold.
    pub(crate) fn wait_until_stopped(&mut self) -> Result<()> {
        let threshold = self.timing.busy_threshold;
        let timeout = self.timing.motion_timeout;
        let handle = &mut self.handle;
        let outcome = poll_until(
            &self.clock,
            self.timing.homing_poll,
            timeout,
            &self.cancel,
            || Ok(handle.vel_estimate()?.abs() <= threshold),
        )?;
        match (outcome, timeout) {
            (WaitOutcome::TimedOut, Some(timeout)) => {
                warn!("{} still moving after {:?}", self.name, timeout);
                Err(Error::MotionTimeout { timeout })
            }
            _ => Ok(()),
        }
    }
}
