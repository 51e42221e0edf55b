// Dual-axis controller for a two-axis stage
//
// Composes two single-axis controllers and moves them together. The two
// axes are driven from one thread: "concurrent" calibration issues both
// requests before waiting on either.

use tracing::{info, warn};

use super::axis::Axis;
use super::handle::{AxisDevice, AxisHandle};
use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::telemetry::StageTelemetry;
use crate::wait::{WaitOutcome, pause, poll_until};

pub struct DualAxis<A: AxisHandle, B: AxisHandle, C: Clock = SystemClock> {
    primary: Axis<A, C>,
    secondary: Axis<B, C>,
}

impl<D: AxisHandle> DualAxis<D, D> {
    /// Build both controllers from a connected device (`axis0` is primary)
    pub fn from_device<T>(device: T, vel_limit: f32) -> Result<Self>
    where
        T: AxisDevice<Axis = D>,
    {
        Self::from_device_with_clock(device, vel_limit, SystemClock)
    }
}

impl<D: AxisHandle, C: Clock + Clone> DualAxis<D, D, C> {
    pub fn from_device_with_clock<T>(device: T, vel_limit: f32, clock: C) -> Result<Self>
    where
        T: AxisDevice<Axis = D>,
    {
        let (axis0, axis1) = device.into_axes();
        let primary = Axis::with_clock(axis0, vel_limit, clock.clone())?.named("axis0");
        let secondary = Axis::with_clock(axis1, vel_limit, clock)?.named("axis1");
        Ok(Self::new(primary, secondary))
    }
}

impl<A: AxisHandle, B: AxisHandle, C: Clock + Clone> DualAxis<A, B, C> {
    /// Timing and cancellation for the combined waits come from `primary`.
    pub fn new(primary: Axis<A, C>, secondary: Axis<B, C>) -> Self {
        Self { primary, secondary }
    }

    pub fn primary(&mut self) -> &mut Axis<A, C> {
        &mut self.primary
    }

    pub fn secondary(&mut self) -> &mut Axis<B, C> {
        &mut self.secondary
    }

    pub fn into_axes(self) -> (Axis<A, C>, Axis<B, C>) {
        (self.primary, self.secondary)
    }

    /// Calibrate both axes and block until both are idle.
    ///
    /// Both calibration requests go out before any waiting. Fails with
    /// [`Error::CalibrationTimeout`] naming every axis still calibrating
    /// after 15 s.
    pub fn calibrate(&mut self) -> Result<()> {
        info!(
            "Calibrating {} and {}",
            self.primary.name(),
            self.secondary.name()
        );
        self.primary.request_calibration()?;
        self.secondary.request_calibration()?;

        let clock = self.primary.clock().clone();
        let cancel = self.primary.cancel_token().clone();
        let timing = *self.primary.timing();

        // idle flags from the most recent poll
        let mut last = (false, false);
        let (primary, secondary) = (&mut self.primary, &mut self.secondary);
        let outcome = poll_until(
            &clock,
            timing.calibration_poll,
            Some(timing.calibration_timeout),
            &cancel,
            || {
                last = (primary.is_idle()?, secondary.is_idle()?);
                Ok(last.0 && last.1)
            },
        )?;

        match outcome {
            WaitOutcome::Satisfied => {
                info!("Both axes calibrated");
                Ok(())
            }
            WaitOutcome::TimedOut => {
                let (primary_idle, secondary_idle) = last;
                let mut axes = Vec::new();
                if !primary_idle {
                    axes.push(self.primary.name().to_string());
                }
                if !secondary_idle {
                    axes.push(self.secondary.name().to_string());
                }
                let err = Error::CalibrationTimeout {
                    axes,
                    timeout: timing.calibration_timeout,
                };
                warn!("{}", err);
                Err(err)
            }
        }
    }

    /// Zeroed positions `(primary, secondary)`
    pub fn get_position(&mut self) -> Result<(f32, f32)> {
        Ok((self.primary.get_position()?, self.secondary.get_position()?))
    }

    pub fn set_position(&mut self, primary: f32, secondary: f32) -> Result<()> {
        self.primary.set_position(primary)?;
        self.secondary.set_position(secondary)
    }

    pub fn telemetry(&mut self) -> Result<StageTelemetry> {
        Ok(StageTelemetry {
            primary: self.primary.telemetry()?,
            secondary: self.secondary.telemetry()?,
        })
    }

    /// Drive both axes at the given velocities until both stall against
    /// their stops, then zero each at its own raw position.
    ///
    /// After the velocity commands go out it waits one settle delay (1 s)
    /// before polling, since an axis that has not started moving yet would
    /// already read as not busy. Polling then runs every 300 ms until
    /// neither axis is busy, and one more settle delay precedes zeroing.
    ///
    /// # Errors
    /// On [`Error::Cancelled`] or [`Error::MotionTimeout`] both axes are put
    /// in idle before the error is returned.
    pub fn home_with_velocity(&mut self, primary_vel: f32, secondary_vel: f32) -> Result<()> {
        info!(
            "Homing both axes by velocity ({}, {})",
            primary_vel, secondary_vel
        );
        let result = self.homing_sequence(primary_vel, secondary_vel);
        if let Err(err @ (Error::Cancelled | Error::MotionTimeout { .. })) = &result {
            warn!("Stage homing aborted ({}), going idle", err);
            if let Err(idle_err) = self.primary.idle() {
                warn!("{}: could not idle after abort: {}", self.primary.name(), idle_err);
            }
            if let Err(idle_err) = self.secondary.idle() {
                warn!("{}: could not idle after abort: {}", self.secondary.name(), idle_err);
            }
        }
        result
    }

    fn homing_sequence(&mut self, primary_vel: f32, secondary_vel: f32) -> Result<()> {
        self.primary.set_velocity(primary_vel)?;
        self.secondary.set_velocity(secondary_vel)?;

        let clock = self.primary.clock().clone();
        let cancel = self.primary.cancel_token().clone();
        let timing = *self.primary.timing();

        pause(&clock, timing.homing_settle, timing.homing_poll, &cancel)?;

        let (primary, secondary) = (&mut self.primary, &mut self.secondary);
        let outcome = poll_until(
            &clock,
            timing.dual_homing_poll,
            timing.motion_timeout,
            &cancel,
            || {
                let primary_busy = primary.is_busy()?;
                let secondary_busy = secondary.is_busy()?;
                Ok(!primary_busy && !secondary_busy)
            },
        )?;
        if let (WaitOutcome::TimedOut, Some(timeout)) = (outcome, timing.motion_timeout) {
            warn!("Stage still moving after {:?}", timeout);
            return Err(Error::MotionTimeout { timeout });
        }

        pause(&clock, timing.homing_settle, timing.homing_poll, &cancel)?;

        let primary_raw = self.primary.get_raw_position()?;
        self.primary.set_zero(primary_raw);
        let secondary_raw = self.secondary.get_raw_position()?;
        self.secondary.set_zero(secondary_raw);

        info!(
            "Done homing: zeroed at raw ({}, {})",
            primary_raw, secondary_raw
        );
        Ok(())
    }
}
