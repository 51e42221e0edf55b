//! Simulated axis for exercising controllers without hardware.
//!
//! [`SimAxis`] models a carriage on a track between two hard stops. Motion
//! is integrated lazily from the shared [`Clock`] every time the axis is
//! touched, so under a [`ManualClock`](crate::clock::ManualClock) time only
//! moves when a controller sleeps.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::clock::Clock;
use crate::error::DriverError;
use crate::motor::{AxisDevice, AxisHandle, AxisState, ControlMode, DriverResult};

/// Default time the simulated full calibration sequence takes.
pub const SIM_CALIBRATION_TIME: Duration = Duration::from_secs(5);

pub struct SimAxis<C: Clock> {
    clock: C,
    low_stop: f32,
    high_stop: f32,
    travel_speed: f32,
    calibration_time: Option<Duration>,

    state: AxisState,
    calibration_started: Option<Instant>,
    calibrated: bool,
    requested: Vec<AxisState>,
    state_reads: usize,
    fault: Option<DriverError>,

    mode: ControlMode,
    vel_setpoint: f32,
    pos_setpoint: f32,
    current_setpoint: f32,
    last_move_to: Option<f32>,

    position: f32,
    velocity: f32,
    last_update: Instant,

    vel_limit: f32,
    current_lim: f32,
    calibration_current: f32,
    pos_gain: f32,
    vel_gain: f32,
    vel_integrator_gain: f32,
}

impl<C: Clock> SimAxis<C> {
    /// Idle, uncalibrated axis at raw position 0 on an effectively unbounded
    /// track, travelling at 2000 counts/s under current control.
    pub fn new(clock: C) -> Self {
        let last_update = clock.now();
        Self {
            clock,
            low_stop: -1.0e9,
            high_stop: 1.0e9,
            travel_speed: 2000.0,
            calibration_time: Some(SIM_CALIBRATION_TIME),
            state: AxisState::Idle,
            calibration_started: None,
            calibrated: false,
            requested: Vec::new(),
            state_reads: 0,
            fault: None,
            mode: ControlMode::Position,
            vel_setpoint: 0.0,
            pos_setpoint: 0.0,
            current_setpoint: 0.0,
            last_move_to: None,
            position: 0.0,
            velocity: 0.0,
            last_update,
            vel_limit: 20_000.0,
            current_lim: 10.0,
            calibration_current: 10.0,
            pos_gain: 20.0,
            vel_gain: 5.0e-4,
            vel_integrator_gain: 1.0e-3,
        }
    }

    /// Hard stops at raw positions `low` and `high`.
    pub fn with_track(mut self, low: f32, high: f32) -> Self {
        self.low_stop = low;
        self.high_stop = high;
        self.position = self.position.clamp(low, high);
        self
    }

    pub fn at(mut self, position: f32) -> Self {
        self.position = position.clamp(self.low_stop, self.high_stop);
        self
    }

    /// Speed reached when driven by a non-zero current, and the cruise
    /// speed of position moves.
    pub fn with_travel_speed(mut self, speed: f32) -> Self {
        self.travel_speed = speed.abs();
        self
    }

    /// `None` leaves the axis stuck in the calibration state.
    pub fn with_calibration_time(mut self, time: Option<Duration>) -> Self {
        self.calibration_time = time;
        self
    }

    pub fn calibrated(mut self) -> Self {
        self.calibrated = true;
        self
    }

    /// Make every following driver call fail with `err`.
    pub fn inject_fault(&mut self, err: DriverError) {
        self.fault = Some(err);
    }

    pub fn clear_fault(&mut self) {
        self.fault = None;
    }

    /// Every state passed to `request_state`, oldest first.
    pub fn requested_states(&self) -> &[AxisState] {
        &self.requested
    }

    pub fn commanded_velocity(&self) -> f32 {
        self.vel_setpoint
    }

    pub fn commanded_current(&self) -> f32 {
        self.current_setpoint
    }

    /// Target of the most recent `move_to_pos`.
    pub fn last_move_to(&self) -> Option<f32> {
        self.last_move_to
    }

    /// Number of `current_state` reads so far.
    pub fn state_reads(&self) -> usize {
        self.state_reads
    }

    fn check(&mut self) -> DriverResult<()> {
        if let Some(err) = &self.fault {
            return Err(err.clone());
        }
        self.advance();
        Ok(())
    }

    fn advance(&mut self) {
        let now = self.clock.now();
        let dt = now.duration_since(self.last_update).as_secs_f32();
        self.last_update = now;

        if self.state == AxisState::FullCalibrationSequence {
            if let (Some(started), Some(needed)) = (self.calibration_started, self.calibration_time) {
                if now.duration_since(started) >= needed {
                    debug!("sim: calibration finished");
                    self.state = AxisState::Idle;
                    self.calibrated = true;
                    self.calibration_started = None;
                }
            }
        }

        if self.state != AxisState::ClosedLoopControl {
            self.velocity = 0.0;
            return;
        }

        let cruise = self.travel_speed.min(self.vel_limit);
        let mut velocity = match self.mode {
            ControlMode::Voltage => 0.0,
            ControlMode::Current => {
                if self.current_setpoint == 0.0 {
                    0.0
                } else {
                    cruise.copysign(self.current_setpoint)
                }
            }
            ControlMode::Velocity => self.vel_setpoint.clamp(-self.vel_limit, self.vel_limit),
            ControlMode::Position | ControlMode::Trajectory => {
                let remaining = self.pos_setpoint - self.position;
                if remaining.abs() <= cruise * dt {
                    // arrives within this step
                    self.position = self.pos_setpoint.clamp(self.low_stop, self.high_stop);
                    self.velocity = 0.0;
                    return;
                }
                cruise.copysign(remaining)
            }
        };

        let next = self.position + velocity * dt;
        if (velocity < 0.0 && next <= self.low_stop) || (velocity > 0.0 && next >= self.high_stop) {
            // jammed against a stop
            velocity = 0.0;
        }
        self.position = next.clamp(self.low_stop, self.high_stop);
        self.velocity = velocity;
    }
}

impl<C: Clock> AxisHandle for SimAxis<C> {
    fn request_state(&mut self, state: AxisState) -> DriverResult<()> {
        self.check()?;
        self.requested.push(state);
        match state {
            AxisState::FullCalibrationSequence => {
                self.calibration_started = Some(self.clock.now());
                self.state = AxisState::FullCalibrationSequence;
            }
            AxisState::ClosedLoopControl | AxisState::Idle => self.state = state,
            _ => {}
        }
        Ok(())
    }

    fn current_state(&mut self) -> DriverResult<AxisState> {
        self.check()?;
        self.state_reads += 1;
        Ok(self.state)
    }

    fn control_mode(&mut self) -> DriverResult<ControlMode> {
        self.check()?;
        Ok(self.mode)
    }

    fn set_control_mode(&mut self, mode: ControlMode) -> DriverResult<()> {
        self.check()?;
        self.mode = mode;
        Ok(())
    }

    fn set_vel_setpoint(&mut self, vel: f32) -> DriverResult<()> {
        self.check()?;
        self.vel_setpoint = vel;
        Ok(())
    }

    fn pos_setpoint(&mut self) -> DriverResult<f32> {
        self.check()?;
        Ok(self.pos_setpoint)
    }

    fn set_pos_setpoint(&mut self, pos: f32) -> DriverResult<()> {
        self.check()?;
        self.pos_setpoint = pos;
        Ok(())
    }

    fn set_current_setpoint(&mut self, current: f32) -> DriverResult<()> {
        self.check()?;
        self.current_setpoint = current;
        Ok(())
    }

    fn move_to_pos(&mut self, pos: f32) -> DriverResult<()> {
        self.check()?;
        if self.mode != ControlMode::Trajectory {
            return Err(DriverError::Communication(
                "move_to_pos outside trajectory control".to_string(),
            ));
        }
        self.pos_setpoint = pos;
        self.last_move_to = Some(pos);
        Ok(())
    }

    fn pos_estimate(&mut self) -> DriverResult<f32> {
        self.check()?;
        Ok(self.position)
    }

    fn vel_estimate(&mut self) -> DriverResult<f32> {
        self.check()?;
        Ok(self.velocity)
    }

    fn vel_limit(&mut self) -> DriverResult<f32> {
        self.check()?;
        Ok(self.vel_limit)
    }

    fn set_vel_limit(&mut self, vel: f32) -> DriverResult<()> {
        self.check()?;
        self.vel_limit = vel;
        Ok(())
    }

    fn current_lim(&mut self) -> DriverResult<f32> {
        self.check()?;
        Ok(self.current_lim)
    }

    fn set_current_lim(&mut self, current: f32) -> DriverResult<()> {
        self.check()?;
        self.current_lim = current;
        Ok(())
    }

    fn calibration_current(&mut self) -> DriverResult<f32> {
        self.check()?;
        Ok(self.calibration_current)
    }

    fn set_calibration_current(&mut self, current: f32) -> DriverResult<()> {
        self.check()?;
        self.calibration_current = current;
        Ok(())
    }

    fn pos_gain(&mut self) -> DriverResult<f32> {
        self.check()?;
        Ok(self.pos_gain)
    }

    fn set_pos_gain(&mut self, gain: f32) -> DriverResult<()> {
        self.check()?;
        self.pos_gain = gain;
        Ok(())
    }

    fn vel_gain(&mut self) -> DriverResult<f32> {
        self.check()?;
        Ok(self.vel_gain)
    }

    fn set_vel_gain(&mut self, gain: f32) -> DriverResult<()> {
        self.check()?;
        self.vel_gain = gain;
        Ok(())
    }

    fn vel_integrator_gain(&mut self) -> DriverResult<f32> {
        self.check()?;
        Ok(self.vel_integrator_gain)
    }

    fn set_vel_integrator_gain(&mut self, gain: f32) -> DriverResult<()> {
        self.check()?;
        self.vel_integrator_gain = gain;
        Ok(())
    }

    fn is_calibrated(&mut self) -> DriverResult<bool> {
        self.check()?;
        Ok(self.calibrated)
    }

    // Split the commanded current evenly between the two measured phases
    fn current_meas_ph_b(&mut self) -> DriverResult<f32> {
        self.check()?;
        Ok(self.phase_current() * 0.5)
    }

    fn current_meas_ph_c(&mut self) -> DriverResult<f32> {
        self.check()?;
        Ok(-self.phase_current() * 0.5)
    }
}

impl<C: Clock> SimAxis<C> {
    fn phase_current(&self) -> f32 {
        if self.state == AxisState::ClosedLoopControl && self.mode == ControlMode::Current {
            self.current_setpoint.clamp(-self.current_lim, self.current_lim)
        } else {
            0.0
        }
    }
}

/// Two simulated axes standing in for one controller board.
pub struct SimDevice<C: Clock> {
    pub axis0: SimAxis<C>,
    pub axis1: SimAxis<C>,
}

impl<C: Clock + Clone> SimDevice<C> {
    pub fn new(clock: C) -> Self {
        Self {
            axis0: SimAxis::new(clock.clone()),
            axis1: SimAxis::new(clock),
        }
    }
}

impl<C: Clock> AxisDevice for SimDevice<C> {
    type Axis = SimAxis<C>;

    fn into_axes(self) -> (Self::Axis, Self::Axis) {
        (self.axis0, self.axis1)
    }
}
