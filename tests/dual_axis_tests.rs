mod common;

use std::time::Duration;

use common::{controller, controller_with_timing, init_tracing};
use odrive_stage::sim::{SimAxis, SimDevice};
use odrive_stage::{
    Axis, AxisHandle, AxisState, CancelToken, Clock, DualAxis, Error, ManualClock, Timing,
};

#[test]
fn combined_velocity_homing_zeroes_each_axis_at_its_stop() {
    init_tracing();
    let clock = ManualClock::new();
    let x = controller(&clock, -400.0, 400.0, 0.0).named("x");
    let y = controller(&clock, 1000.0, 9000.0, 5000.0).named("y");
    let mut stage = DualAxis::new(x, y);

    stage.home_with_velocity(-2000.0, 3000.0).unwrap();

    assert_eq!(stage.primary().zero_offset(), -400.0);
    assert_eq!(stage.secondary().zero_offset(), 9000.0);
    let (px, py) = stage.get_position().unwrap();
    assert_eq!((px, py), (0.0, 0.0));
}

#[test]
fn combined_homing_waits_for_the_slower_axis() {
    let clock = ManualClock::new();
    let fast = controller(&clock, 0.0, 1000.0, 500.0);
    // 8000 counts at 1000 counts/s
    let slow = controller(&clock, 0.0, 20_000.0, 8000.0);
    let mut stage = DualAxis::new(fast, slow);

    stage.home_with_velocity(-5000.0, -1000.0).unwrap();

    assert_eq!(stage.primary().zero_offset(), 0.0);
    assert_eq!(stage.secondary().zero_offset(), 0.0);
    assert!(clock.elapsed() >= Duration::from_secs(9));
}

#[test]
fn cancelled_combined_homing_idles_both_axes() {
    let clock = ManualClock::new();
    let cancel = CancelToken::new();
    let x = controller(&clock, -1.0e6, 1.0e6, 0.0).with_cancel_token(cancel.clone());
    let y = controller(&clock, -1.0e6, 1.0e6, 0.0);
    let mut stage = DualAxis::new(x, y);

    cancel.cancel();
    assert!(matches!(
        stage.home_with_velocity(2000.0, -2000.0),
        Err(Error::Cancelled)
    ));

    assert_eq!(stage.primary().handle_mut().current_state().unwrap(), AxisState::Idle);
    assert_eq!(stage.secondary().handle_mut().current_state().unwrap(), AxisState::Idle);
    let before = stage.get_position().unwrap();
    clock.sleep(Duration::from_secs(10));
    assert_eq!(stage.get_position().unwrap(), before);
    // neither axis was zeroed
    assert_eq!(stage.primary().zero_offset(), 0.0);
    assert_eq!(stage.secondary().zero_offset(), 0.0);
}

#[test]
fn combined_homing_timeout_idles_both_axes() {
    let clock = ManualClock::new();
    let timing = Timing {
        motion_timeout: Some(Duration::from_secs(5)),
        ..Timing::default()
    };
    // far stops out of reach within the timeout
    let x = controller_with_timing(&clock, -1.0e6, 1.0e6, 0.0, timing);
    let y = controller(&clock, -1.0e6, 1.0e6, 0.0);
    let mut stage = DualAxis::new(x, y);

    let err = stage.home_with_velocity(1000.0, -1000.0).unwrap_err();
    assert!(matches!(err, Error::MotionTimeout { timeout } if timeout == Duration::from_secs(5)));

    assert_eq!(stage.primary().handle_mut().current_state().unwrap(), AxisState::Idle);
    assert_eq!(stage.secondary().handle_mut().current_state().unwrap(), AxisState::Idle);
    let before = stage.get_position().unwrap();
    clock.sleep(Duration::from_secs(60));
    assert_eq!(stage.get_position().unwrap(), before);
    assert!(!stage.primary().is_busy().unwrap());
    assert!(!stage.secondary().is_busy().unwrap());
}

#[test]
fn dual_position_follows_zero_offsets() {
    let clock = ManualClock::new();
    let mut stage = DualAxis::new(
        controller(&clock, -5000.0, 5000.0, 0.0),
        controller(&clock, -5000.0, 5000.0, 0.0),
    );
    stage.primary().set_zero(100.0);
    stage.secondary().set_zero(-100.0);

    stage.set_position(50.0, 75.0).unwrap();
    clock.sleep(Duration::from_secs(1));

    assert_eq!(stage.get_position().unwrap(), (50.0, 75.0));
    let telemetry = stage.telemetry().unwrap();
    assert_eq!(telemetry.primary.raw_position, 150.0);
    assert_eq!(telemetry.secondary.raw_position, -25.0);
}

#[test]
fn calibration_succeeds_when_both_reach_idle() {
    let clock = ManualClock::new();
    let mut stage = DualAxis::new(
        Axis::with_clock(
            SimAxis::new(clock.clone()).with_calibration_time(Some(Duration::from_secs(10))),
            20_000.0,
            clock.clone(),
        )
        .unwrap(),
        Axis::with_clock(
            SimAxis::new(clock.clone()).with_calibration_time(Some(Duration::from_millis(14_900))),
            20_000.0,
            clock.clone(),
        )
        .unwrap(),
    );

    stage.calibrate().unwrap();
    assert!(stage.primary().is_calibrated().unwrap());
    assert!(stage.secondary().is_calibrated().unwrap());
}

#[test]
fn calibration_fails_if_only_primary_hangs() {
    let clock = ManualClock::new();
    let mut stage = DualAxis::new(
        Axis::with_clock(
            SimAxis::new(clock.clone()).with_calibration_time(None),
            20_000.0,
            clock.clone(),
        )
        .unwrap()
        .named("x"),
        Axis::with_clock(SimAxis::new(clock.clone()), 20_000.0, clock.clone())
            .unwrap()
            .named("y"),
    );

    match stage.calibrate() {
        Err(Error::CalibrationTimeout { axes, timeout }) => {
            assert_eq!(axes, vec!["x".to_string()]);
            assert_eq!(timeout, Duration::from_secs(15));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(clock.elapsed(), Duration::from_secs(15));
}

#[test]
fn calibration_fails_if_only_secondary_hangs() {
    let clock = ManualClock::new();
    let mut device = SimDevice::new(clock.clone());
    device.axis1 = SimAxis::new(clock.clone()).with_calibration_time(None);
    let mut stage = DualAxis::from_device_with_clock(device, 20_000.0, clock.clone()).unwrap();

    let err = stage.calibrate().unwrap_err();
    assert!(matches!(err, Error::CalibrationTimeout { ref axes, .. } if axes == &["axis1".to_string()]));
}

#[test]
fn calibration_reports_both_axes_when_both_hang() {
    let clock = ManualClock::new();
    let mut device = SimDevice::new(clock.clone());
    device.axis0 = SimAxis::new(clock.clone()).with_calibration_time(None);
    device.axis1 = SimAxis::new(clock.clone()).with_calibration_time(None);
    let mut stage = DualAxis::from_device_with_clock(device, 20_000.0, clock).unwrap();

    match stage.calibrate() {
        Err(Error::CalibrationTimeout { axes, .. }) => {
            assert_eq!(axes, vec!["axis0".to_string(), "axis1".to_string()])
        }
        other => panic!("unexpected result: {other:?}"),
    }
}
