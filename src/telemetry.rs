// Snapshot types for logging or publishing axis state

use serde::{Deserialize, Serialize};

use crate::motor::AxisState;

/// Live readings of one axis at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisTelemetry {
    pub state: AxisState,
    /// Position relative to the homed zero
    pub position: f32,
    pub raw_position: f32,
    pub velocity: f32,
    pub phase_current_b: f32,
    pub phase_current_c: f32,
}

/// Both axes of a dual-axis stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageTelemetry {
    pub primary: AxisTelemetry,
    pub secondary: AxisTelemetry,
}
