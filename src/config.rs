// Device IDs, timeouts, thresholds for homing and calibration
use std::time::Duration;

// ODrive USB identifiers (pid.codes vendor)
pub const USB_VENDOR_ID: u16 = 0x1209;
pub const USB_PRODUCT_ID: u16 = 0x0d32;

// Velocity ceiling applied when an axis controller is constructed
pub const DEFAULT_VEL_LIMIT: f32 = 20_000.0;

// Calibration polling
pub const CALIBRATION_POLL: Duration = Duration::from_millis(100);
pub const CALIBRATION_TIMEOUT: Duration = Duration::from_secs(15);

// |velocity| above this counts as "busy"
pub const BUSY_THRESHOLD: f32 = 500.0;

// Homing
pub const HOMING_SETTLE: Duration = Duration::from_secs(1);
pub const HOMING_POLL: Duration = Duration::from_millis(20);
pub const HOMING_TOLERANCE: f32 = 50.0;
pub const DUAL_HOMING_POLL: Duration = Duration::from_millis(300);

/// Tunables for the blocking routines of one controller.
///
/// `Default` uses the constants above; tests and slower mechanics override
/// individual fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    pub calibration_poll: Duration,
    pub calibration_timeout: Duration,
    pub busy_threshold: f32,
    pub homing_settle: Duration,
    pub homing_poll: Duration,
    pub homing_tolerance: f32,
    pub dual_homing_poll: Duration,
    /// Upper bound on each "wait until not busy" phase of homing.
    /// `None` waits for as long as the axis keeps moving.
    pub motion_timeout: Option<Duration>,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            calibration_poll: CALIBRATION_POLL,
            calibration_timeout: CALIBRATION_TIMEOUT,
            busy_threshold: BUSY_THRESHOLD,
            homing_settle: HOMING_SETTLE,
            homing_poll: HOMING_POLL,
            homing_tolerance: HOMING_TOLERANCE,
            dual_homing_poll: DUAL_HOMING_POLL,
            motion_timeout: None,
        }
    }
}
