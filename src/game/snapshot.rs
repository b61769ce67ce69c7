use anyhow::Result;
use serde::Serialize;

use super::state::{GameState, HandPosition};

/// 小数点以下3桁に丸める
pub fn round3(value: f32) -> f32 {
    (value * 1000.0).round() / 1000.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HandSnapshot {
    pub x: f32,
    pub y: f32,
    pub visible: bool,
}

impl From<&HandPosition> for HandSnapshot {
    fn from(hand: &HandPosition) -> Self {
        Self {
            x: round3(hand.x),
            y: round3(hand.y),
            visible: hand.visible,
        }
    }
}

/// ブラウザへ送る1ティック分の状態
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub is_squatting: bool,
    pub squat_count: u32,
    pub xp: u32,
    pub feedback: String,
    pub hip_y: f32,
    pub knee_y: f32,
    pub depth: f32,
    pub left_hand: HandSnapshot,
    pub right_hand: HandSnapshot,
    pub total_sliced: u32,
}

impl From<&GameState> for GameSnapshot {
    fn from(state: &GameState) -> Self {
        Self {
            is_squatting: state.squatting,
            squat_count: state.rep_count,
            xp: state.score,
            feedback: state.feedback.clone(),
            hip_y: round3(state.hip_y),
            knee_y: round3(state.knee_y),
            depth: round3(state.depth),
            left_hand: HandSnapshot::from(&state.left_hand),
            right_hand: HandSnapshot::from(&state.right_hand),
            total_sliced: state.total_sliced,
        }
    }
}

impl GameSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_round3() {
        assert_eq!(round3(0.123456), 0.123);
        assert_eq!(round3(0.9996), 1.0);
        assert_eq!(round3(0.0), 0.0);
        assert_eq!(round3(0.15), 0.15);
    }

    #[test]
    fn test_field_names() {
        let json = GameSnapshot::from(&GameState::default()).to_json().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        let obj = value.as_object().unwrap();

        let mut keys: Vec<&str> = obj.keys().map(|k| k.as_str()).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            [
                "depth", "feedback", "hipY", "isSquatting", "kneeY", "leftHand", "rightHand",
                "squatCount", "totalSliced", "xp",
            ]
        );

        let hand = obj["leftHand"].as_object().unwrap();
        assert!(hand.contains_key("x"));
        assert!(hand.contains_key("y"));
        assert_eq!(hand["visible"], Value::Bool(false));
    }

    #[test]
    fn test_values_rounded() {
        let mut state = GameState::default();
        state.hip_y = 0.412345;
        state.knee_y = 0.587654;
        state.depth = 0.175309;
        state.left_hand = HandPosition { x: 0.33333, y: 0.66666, visible: true };
        state.squatting = true;
        state.rep_count = 3;
        state.score = 270;

        let value: Value = serde_json::from_str(&GameSnapshot::from(&state).to_json().unwrap()).unwrap();
        assert_eq!(value["isSquatting"], Value::Bool(true));
        assert_eq!(value["squatCount"], 3);
        assert_eq!(value["xp"], 270);
        assert!((value["hipY"].as_f64().unwrap() - 0.412).abs() < 1e-6);
        assert!((value["kneeY"].as_f64().unwrap() - 0.588).abs() < 1e-6);
        assert!((value["depth"].as_f64().unwrap() - 0.175).abs() < 1e-6);
        assert!((value["leftHand"]["x"].as_f64().unwrap() - 0.333).abs() < 1e-6);
        assert!((value["leftHand"]["y"].as_f64().unwrap() - 0.667).abs() < 1e-6);
        assert_eq!(value["leftHand"]["visible"], Value::Bool(true));
        assert_eq!(value["totalSliced"], 0);
    }

    #[test]
    fn test_feedback_passthrough() {
        let mut state = GameState::default();
        state.feedback = "🔥 FIRED! 2 REPS — 180 XP".to_string();
        let value: Value = serde_json::from_str(&GameSnapshot::from(&state).to_json().unwrap()).unwrap();
        assert_eq!(value["feedback"], "🔥 FIRED! 2 REPS — 180 XP");
    }
}
