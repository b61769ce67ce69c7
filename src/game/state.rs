use anyhow::{bail, Result};

use super::features::FrameFeatures;
use crate::config::DetectorConfig;
use crate::pose::Landmark;

pub const READY_FEEDBACK: &str = "STAND TALL — READY";
pub const CHARGING_FEEDBACK: &str = "⚡ CHARGING WEAPON...";

/// 手の位置（自撮り映像に合わせてXを左右反転済み）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HandPosition {
    pub x: f32,
    pub y: f32,
    pub visible: bool,
}

impl HandPosition {
    /// x = 1 - clamp(x, 0, 1)、yはそのまま、visibility > 閾値 で可視
    pub fn from_landmark(landmark: &Landmark, visibility_threshold: f32) -> Self {
        Self {
            x: 1.0 - landmark.x.clamp(0.0, 1.0),
            y: landmark.y,
            visible: landmark.is_visible(visibility_threshold),
        }
    }
}

/// セッション中のゲーム状態
#[derive(Debug, Clone, PartialEq)]
pub struct GameState {
    pub squatting: bool,
    pub rep_count: u32,
    pub score: u32,
    pub feedback: String,
    pub hip_y: f32,
    pub knee_y: f32,
    pub depth: f32,
    pub left_hand: HandPosition,
    pub right_hand: HandPosition,
    /// スライサーゲーム用カウンタ（サーバー側では更新しない）
    pub total_sliced: u32,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            squatting: false,
            rep_count: 0,
            score: 0,
            feedback: READY_FEEDBACK.to_string(),
            hip_y: 0.0,
            knee_y: 0.0,
            depth: 0.0,
            left_hand: HandPosition::default(),
            right_hand: HandPosition::default(),
            total_sliced: 0,
        }
    }
}

/// 1フレームの更新で起きた遷移
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SquatEvent {
    None,
    SquatStarted,
    SquatFinished { reps: u32, xp: u32 },
}

/// 2閾値ヒステリシスによるスクワット判定
///
/// 立位で depth < squat_threshold → しゃがみ、
/// しゃがみ中に depth > rise_threshold → 立位に戻り1レップ加算。
/// その間（境界値を含む）は状態を変えない。
#[derive(Debug, Clone, PartialEq)]
pub struct SquatDetector {
    squat_threshold: f32,
    rise_threshold: f32,
    hand_visibility: f32,
    xp_per_rep: u32,
}

impl SquatDetector {
    pub fn new(squat_threshold: f32, rise_threshold: f32, hand_visibility: f32, xp_per_rep: u32) -> Result<Self> {
        if !(squat_threshold < rise_threshold) {
            bail!("squat_threshold ({squat_threshold}) must be below rise_threshold ({rise_threshold})");
        }
        Ok(Self {
            squat_threshold,
            rise_threshold,
            hand_visibility,
            xp_per_rep,
        })
    }

    pub fn from_config(config: &DetectorConfig) -> Result<Self> {
        Self::new(
            config.squat_threshold,
            config.rise_threshold,
            config.hand_visibility,
            config.xp_per_rep,
        )
    }

    /// 1フレーム分の値で状態を更新
    pub fn update(&self, state: &mut GameState, features: &FrameFeatures) -> SquatEvent {
        let depth = features.depth();
        state.hip_y = features.hip_y;
        state.knee_y = features.knee_y;
        state.depth = depth;

        state.left_hand = HandPosition::from_landmark(&features.left_wrist, self.hand_visibility);
        state.right_hand = HandPosition::from_landmark(&features.right_wrist, self.hand_visibility);

        if !state.squatting && depth < self.squat_threshold {
            state.squatting = true;
            state.feedback = CHARGING_FEEDBACK.to_string();
            SquatEvent::SquatStarted
        } else if state.squatting && depth > self.rise_threshold {
            state.squatting = false;
            // 上限で止め、減少させない
            state.rep_count = state.rep_count.saturating_add(1);
            state.score = state.score.saturating_add(self.xp_per_rep);
            state.feedback = format!("🔥 FIRED! {} REPS — {} XP", state.rep_count, state.score);
            SquatEvent::SquatFinished {
                reps: state.rep_count,
                xp: state.score,
            }
        } else {
            SquatEvent::None
        }
    }

    /// ランドマーク列から更新。33点に満たなければ何もしない
    pub fn process(&self, state: &mut GameState, landmarks: &[Landmark]) -> Option<SquatEvent> {
        let features = FrameFeatures::from_slice(landmarks)?;
        Some(self.update(state, &features))
    }
}

impl Default for SquatDetector {
    fn default() -> Self {
        let config = DetectorConfig::default();
        Self {
            squat_threshold: config.squat_threshold,
            rise_threshold: config.rise_threshold,
            hand_visibility: config.hand_visibility,
            xp_per_rep: config.xp_per_rep,
        }
    }
}
