mod common;

use std::time::Duration;

use common::{controller, controller_with_timing, init_tracing};
use odrive_stage::sim::SimAxis;
use odrive_stage::{
    AxisHandle, AxisState, CancelToken, Clock, ControlMode, Direction, DriverError, Error,
    ManualClock, Timing,
};

#[test]
fn current_homing_within_tolerance_succeeds() {
    init_tracing();
    let clock = ManualClock::new();
    // stops 498 apart, expected 500
    let mut axis = controller(&clock, 502.0, 1000.0, 1000.0);

    axis.home(2.0, 2.0, Some(500.0), Direction::Positive).unwrap();

    assert_eq!(axis.zero_offset(), 502.0);
    assert_eq!(axis.handle().commanded_current(), 2.0);
    assert_eq!(axis.handle_mut().control_mode().unwrap(), ControlMode::Position);
    assert_eq!(axis.handle_mut().pos_setpoint().unwrap(), 502.0);

    clock.sleep(Duration::from_secs(1));
    assert!(axis.get_position().unwrap().abs() < 1e-3);
}

#[test]
fn current_homing_out_of_tolerance_fails() {
    init_tracing();
    let clock = ManualClock::new();
    // stops 440 apart: off by 60
    let mut axis = controller(&clock, 502.0, 942.0, 1000.0);

    match axis.home(2.0, 2.0, Some(500.0), Direction::Positive) {
        Err(Error::HomingOutOfTolerance {
            measured,
            expected,
            tolerance,
        }) => {
            assert_eq!(measured, 440.0);
            assert_eq!(expected, 500.0);
            assert_eq!(tolerance, 50.0);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    // no return-to-zero on failure, still pressing the far stop
    assert_eq!(axis.handle_mut().control_mode().unwrap(), ControlMode::Current);
    assert_eq!(
        axis.handle_mut().current_state().unwrap(),
        AxisState::ClosedLoopControl
    );
}

#[test]
fn homing_drives_against_direction_first() {
    let clock = ManualClock::new();
    let mut axis = controller(&clock, -300.0, 700.0, 0.0);

    axis.home(1.5, 1.5, None, Direction::Negative).unwrap();

    // negative direction homes on the high stop
    assert_eq!(axis.zero_offset(), 700.0);
    assert_eq!(axis.handle().requested_states()[0], AxisState::ClosedLoopControl);
}

#[test]
fn negative_direction_does_not_flip_expected_length() {
    let clock = ManualClock::new();
    let mut axis = controller(&clock, 0.0, 500.0, 250.0);
    assert!(matches!(
        axis.home(1.0, 1.0, Some(500.0), Direction::Negative),
        Err(Error::HomingOutOfTolerance { measured, .. }) if measured == -500.0
    ));

    let mut axis = controller(&clock, 0.0, 500.0, 250.0);
    axis.home(1.0, 1.0, Some(-500.0), Direction::Negative).unwrap();
}

#[test]
fn homing_without_length_skips_far_stop() {
    let clock = ManualClock::new();
    let mut axis = controller(&clock, 100.0, 900.0, 400.0);

    axis.home(2.0, 2.0, None, Direction::Positive).unwrap();

    assert_eq!(axis.zero_offset(), 100.0);
    // only the first drive was issued
    assert_eq!(axis.handle().commanded_current(), -2.0);
    // three settle delays, no waiting on the busy poll
    assert_eq!(clock.elapsed(), Duration::from_secs(3));
}

#[test]
fn velocity_homing_succeeds() {
    init_tracing();
    let clock = ManualClock::new();
    let mut axis = controller(&clock, 502.0, 1000.0, 800.0);

    axis.home_with_velocity(3000.0, Some(500.0), Direction::Positive)
        .unwrap();

    assert_eq!(axis.zero_offset(), 502.0);
    assert_eq!(axis.handle().commanded_velocity(), 3000.0);
    assert_eq!(axis.handle_mut().pos_setpoint().unwrap(), 502.0);
}

#[test]
fn velocity_homing_reports_short_track() {
    let clock = ManualClock::new();
    let mut axis = controller(&clock, 0.0, 420.0, 200.0);

    let err = axis
        .home_with_velocity(3000.0, Some(500.0), Direction::Positive)
        .unwrap_err();
    assert!(matches!(err, Error::HomingOutOfTolerance { measured, .. } if measured == 420.0));
}

#[test]
fn busy_wait_polls_instead_of_spinning() {
    let clock = ManualClock::new();
    // 10 s of travel at the default 2000 counts/s
    let mut axis = controller(&clock, 0.0, 30_000.0, 20_000.0);

    axis.home(1.0, 1.0, None, Direction::Positive).unwrap();

    assert_eq!(axis.zero_offset(), 0.0);
    let elapsed = clock.elapsed();
    assert!(elapsed >= Duration::from_millis(11_500), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(14), "{elapsed:?}");
}

#[test]
fn motion_timeout_bounds_the_busy_wait() {
    let clock = ManualClock::new();
    let timing = Timing {
        motion_timeout: Some(Duration::from_secs(5)),
        ..Timing::default()
    };
    let sim = SimAxis::new(clock.clone());
    let mut axis = odrive_stage::Axis::with_clock(sim, 20_000.0, clock.clone())
        .unwrap()
        .with_timing(timing);

    let err = axis
        .home_with_velocity(1000.0, None, Direction::Positive)
        .unwrap_err();
    assert!(matches!(err, Error::MotionTimeout { timeout } if timeout == Duration::from_secs(5)));
    assert_eq!(clock.elapsed(), Duration::from_secs(6));
    assert_eq!(axis.handle().requested_states().last(), Some(&AxisState::Idle));
}

#[test]
fn timed_out_current_homing_leaves_motor_idle() {
    let clock = ManualClock::new();
    let timing = Timing {
        motion_timeout: Some(Duration::from_secs(5)),
        ..Timing::default()
    };
    let sim = SimAxis::new(clock.clone());
    let mut axis = odrive_stage::Axis::with_clock(sim, 20_000.0, clock.clone())
        .unwrap()
        .with_timing(timing);

    let err = axis.home(3.0, 3.0, None, Direction::Positive).unwrap_err();
    assert!(matches!(err, Error::MotionTimeout { .. }));
    assert_eq!(axis.handle_mut().current_state().unwrap(), AxisState::Idle);

    let stopped_at = axis.get_raw_position().unwrap();
    clock.sleep(Duration::from_secs(60));
    assert_eq!(axis.get_raw_position().unwrap(), stopped_at);
    assert!(!axis.is_busy().unwrap());
}

#[test]
fn cancelled_homing_returns_cancelled() {
    let clock = ManualClock::new();
    let cancel = CancelToken::new();
    let mut axis =
        controller_with_timing(&clock, 0.0, 1000.0, 500.0, Timing::default())
            .with_cancel_token(cancel.clone());

    cancel.cancel();
    assert!(matches!(
        axis.home(1.0, 1.0, Some(1000.0), Direction::Positive),
        Err(Error::Cancelled)
    ));
    // first drive was issued, then the axis was idled
    assert_eq!(axis.handle().commanded_current(), -1.0);
    assert_eq!(axis.zero_offset(), 0.0);
    assert_eq!(
        axis.handle().requested_states(),
        &[AxisState::ClosedLoopControl, AxisState::Idle]
    );
    assert_eq!(axis.handle_mut().current_state().unwrap(), AxisState::Idle);
    clock.sleep(Duration::from_secs(5));
    assert_eq!(axis.get_velocity().unwrap(), 0.0);
}

#[test]
fn driver_fault_surfaces_as_error() {
    let clock = ManualClock::new();
    let mut axis = controller(&clock, 0.0, 1000.0, 500.0);
    axis.handle_mut()
        .inject_fault(DriverError::Communication("usb timeout".to_string()));

    let err = axis.home(1.0, 1.0, None, Direction::Positive).unwrap_err();
    assert!(matches!(err, Error::Driver(DriverError::Communication(_))));
}

#[test]
fn zero_offset_holds_across_moves() {
    let clock = ManualClock::new();
    let mut axis = controller(&clock, -5000.0, 5000.0, 0.0);
    axis.set_zero(-1200.0);

    for target in [0.0_f32, 350.0, -800.0] {
        axis.set_position(target).unwrap();
        clock.sleep(Duration::from_secs(2));
        let raw = axis.get_raw_position().unwrap();
        assert_eq!(raw, target - 1200.0);
        assert_eq!(axis.get_position().unwrap(), raw + 1200.0);
    }
}

#[test]
fn trajectory_moves_through_driver_trap_planner() {
    let clock = ManualClock::new();
    let mut axis = controller(&clock, -5000.0, 5000.0, 0.0);
    axis.set_zero(100.0);

    axis.set_position_trajectory(250.0).unwrap();
    assert_eq!(axis.handle().last_move_to(), Some(350.0));

    clock.sleep(Duration::from_secs(1));
    assert_eq!(axis.get_position().unwrap(), 250.0);
    assert!(!axis.is_busy().unwrap());
}
