//! Telemetry record shapes.
//!
//! A [`TelemetryRecord`] is one sample as emitted by the capture client, with
//! pose, gaze and conversation data grouped into nested objects. A
//! [`FlatRecord`] is the same sample as one row of the `session_records`
//! table.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A point or direction in headset space
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

/// Conversational turn captured alongside the sample
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationData {
    pub speaker: Option<String>,
    pub text: Option<String>,
}

/// Head-mounted display pose and gaze
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HmdData {
    pub position: Option<Vector3>,
    pub gaze_vector: Option<Vector3>,
    pub gaze_actor: Option<String>,
    pub movement_speed: Option<f64>,
}

/// Left and right hand controller state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerData {
    pub r_position: Option<Vector3>,
    pub l_position: Option<Vector3>,
    pub r_interacted_actor: Option<String>,
    pub l_interacted_actor: Option<String>,
    pub r_movement_speed: Option<f64>,
    pub l_movement_speed: Option<f64>,
}

/// Nested telemetry record as uploaded and exported
///
/// Missing or `null` groups deserialize to `None`. Records produced by
/// [`crate::transcoder::unflatten`] always carry every group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub session_id: String,
    pub phase: Option<String>,
    pub area: Option<String>,
    /// Caller-supplied, stored as opaque text
    pub timestamp: Option<String>,
    #[serde(alias = "conversation")]
    pub conversation_data: Option<ConversationData>,
    #[serde(alias = "hmd")]
    pub hmd_data: Option<HmdData>,
    #[serde(alias = "controller")]
    pub controller_data: Option<ControllerData>,
    pub user_emotion: Option<String>,
    pub emotion_window_flag: Option<bool>,
}

/// One row of `session_records`
///
/// `id` and `created_at` are assigned by the backend on insert and are
/// `None` on records that have not been stored yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct FlatRecord {
    pub id: Option<i64>,
    pub session_id: String,
    pub phase: Option<String>,
    pub area: Option<String>,
    pub timestamp: Option<String>,
    pub speaker: Option<String>,
    pub text: Option<String>,
    pub hmd_position_x: Option<f64>,
    pub hmd_position_y: Option<f64>,
    pub hmd_position_z: Option<f64>,
    pub hmd_gaze_x: Option<f64>,
    pub hmd_gaze_y: Option<f64>,
    pub hmd_gaze_z: Option<f64>,
    pub hmd_gaze_actor: Option<String>,
    pub hmd_movement_speed: Option<f64>,
    pub controller_r_x: Option<f64>,
    pub controller_r_y: Option<f64>,
    pub controller_r_z: Option<f64>,
    pub controller_l_x: Option<f64>,
    pub controller_l_y: Option<f64>,
    pub controller_l_z: Option<f64>,
    pub controller_r_actor: Option<String>,
    pub controller_l_actor: Option<String>,
    pub controller_r_speed: Option<f64>,
    pub controller_l_speed: Option<f64>,
    pub user_emotion: Option<String>,
    pub emotion_window_flag: Option<bool>,
    /// Insert time, normalized to `YYYY-MM-DDTHH:MM:SSZ`
    pub created_at: Option<String>,
}

/// Data columns in insert order. `id` and `created_at` are backend-assigned.
pub const DATA_COLUMNS: [&str; 26] = [
    "session_id",
    "phase",
    "area",
    "timestamp",
    "speaker",
    "text",
    "hmd_position_x",
    "hmd_position_y",
    "hmd_position_z",
    "hmd_gaze_x",
    "hmd_gaze_y",
    "hmd_gaze_z",
    "hmd_gaze_actor",
    "hmd_movement_speed",
    "controller_r_x",
    "controller_r_y",
    "controller_r_z",
    "controller_l_x",
    "controller_l_y",
    "controller_l_z",
    "controller_r_actor",
    "controller_l_actor",
    "controller_r_speed",
    "controller_l_speed",
    "user_emotion",
    "emotion_window_flag",
];

/// Columns stored as floating point
pub const REAL_COLUMNS: [&str; 15] = [
    "hmd_position_x",
    "hmd_position_y",
    "hmd_position_z",
    "hmd_gaze_x",
    "hmd_gaze_y",
    "hmd_gaze_z",
    "hmd_movement_speed",
    "controller_r_x",
    "controller_r_y",
    "controller_r_z",
    "controller_l_x",
    "controller_l_y",
    "controller_l_z",
    "controller_r_speed",
    "controller_l_speed",
];
