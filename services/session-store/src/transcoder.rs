//! Nested <-> flat record mapping.
//!
//! Every leaf of the nested record has exactly one column. Flattening reads
//! each leaf through its path and yields `None` as soon as any group on the
//! path is missing. Unflattening always rebuilds every group so exported
//! documents have a fixed shape regardless of which values were captured.

use crate::record::{ConversationData, ControllerData, FlatRecord, HmdData, TelemetryRecord, Vector3};

/// Project a nested record onto its storage row
pub fn flatten(record: &TelemetryRecord) -> FlatRecord {
    let conversation = record.conversation_data.as_ref();
    let hmd = record.hmd_data.as_ref();
    let controller = record.controller_data.as_ref();

    let hmd_position = hmd.and_then(|h| h.position.as_ref());
    let hmd_gaze = hmd.and_then(|h| h.gaze_vector.as_ref());
    let r_position = controller.and_then(|c| c.r_position.as_ref());
    let l_position = controller.and_then(|c| c.l_position.as_ref());

    FlatRecord {
        id: None,
        session_id: record.session_id.clone(),
        phase: record.phase.clone(),
        area: record.area.clone(),
        timestamp: record.timestamp.clone(),
        speaker: conversation.and_then(|c| c.speaker.clone()),
        text: conversation.and_then(|c| c.text.clone()),
        hmd_position_x: hmd_position.and_then(|p| p.x),
        hmd_position_y: hmd_position.and_then(|p| p.y),
        hmd_position_z: hmd_position.and_then(|p| p.z),
        hmd_gaze_x: hmd_gaze.and_then(|g| g.x),
        hmd_gaze_y: hmd_gaze.and_then(|g| g.y),
        hmd_gaze_z: hmd_gaze.and_then(|g| g.z),
        hmd_gaze_actor: hmd.and_then(|h| h.gaze_actor.clone()),
        hmd_movement_speed: hmd.and_then(|h| h.movement_speed),
        controller_r_x: r_position.and_then(|p| p.x),
        controller_r_y: r_position.and_then(|p| p.y),
        controller_r_z: r_position.and_then(|p| p.z),
        controller_l_x: l_position.and_then(|p| p.x),
        controller_l_y: l_position.and_then(|p| p.y),
        controller_l_z: l_position.and_then(|p| p.z),
        controller_r_actor: controller.and_then(|c| c.r_interacted_actor.clone()),
        controller_l_actor: controller.and_then(|c| c.l_interacted_actor.clone()),
        controller_r_speed: controller.and_then(|c| c.r_movement_speed),
        controller_l_speed: controller.and_then(|c| c.l_movement_speed),
        user_emotion: record.user_emotion.clone(),
        emotion_window_flag: record.emotion_window_flag,
        created_at: None,
    }
}

/// Rebuild the nested record from a storage row
///
/// `id` and `created_at` are dropped.
pub fn unflatten(flat: &FlatRecord) -> TelemetryRecord {
    TelemetryRecord {
        session_id: flat.session_id.clone(),
        phase: flat.phase.clone(),
        area: flat.area.clone(),
        timestamp: flat.timestamp.clone(),
        conversation_data: Some(ConversationData {
            speaker: flat.speaker.clone(),
            text: flat.text.clone(),
        }),
        hmd_data: Some(HmdData {
            position: Some(Vector3 {
                x: flat.hmd_position_x,
                y: flat.hmd_position_y,
                z: flat.hmd_position_z,
            }),
            gaze_vector: Some(Vector3 {
                x: flat.hmd_gaze_x,
                y: flat.hmd_gaze_y,
                z: flat.hmd_gaze_z,
            }),
            gaze_actor: flat.hmd_gaze_actor.clone(),
            movement_speed: flat.hmd_movement_speed,
        }),
        controller_data: Some(ControllerData {
            r_position: Some(Vector3 {
                x: flat.controller_r_x,
                y: flat.controller_r_y,
                z: flat.controller_r_z,
            }),
            l_position: Some(Vector3 {
                x: flat.controller_l_x,
                y: flat.controller_l_y,
                z: flat.controller_l_z,
            }),
            r_interacted_actor: flat.controller_r_actor.clone(),
            l_interacted_actor: flat.controller_l_actor.clone(),
            r_movement_speed: flat.controller_r_speed,
            l_movement_speed: flat.controller_l_speed,
        }),
        user_emotion: flat.user_emotion.clone(),
        emotion_window_flag: flat.emotion_window_flag,
    }
}
