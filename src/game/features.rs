use crate::pose::{Landmark, LandmarkIndex, PoseLandmarks};

/// 1フレームから取り出したスクワット・手の判定用の値
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameFeatures {
    /// 左ヒップのY座標
    pub hip_y: f32,
    /// 左ひざのY座標
    pub knee_y: f32,
    pub left_wrist: Landmark,
    pub right_wrist: Landmark,
}

impl FrameFeatures {
    pub fn extract(pose: &PoseLandmarks) -> Self {
        Self {
            hip_y: pose.get(LandmarkIndex::LeftHip).y,
            knee_y: pose.get(LandmarkIndex::LeftKnee).y,
            left_wrist: *pose.get(LandmarkIndex::LeftWrist),
            right_wrist: *pose.get(LandmarkIndex::RightWrist),
        }
    }

    /// 33点に満たない入力はNone（そのフレームはスキップ）
    pub fn from_slice(landmarks: &[Landmark]) -> Option<Self> {
        PoseLandmarks::from_slice(landmarks).map(|pose| Self::extract(&pose))
    }

    /// スクワット深さ = |hip_y - knee_y|
    pub fn depth(&self) -> f32 {
        (self.hip_y - self.knee_y).abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_named_points() {
        let mut pose = PoseLandmarks::default();
        pose.landmarks[23] = Landmark::new(0.5, 0.40, 0.9);
        pose.landmarks[25] = Landmark::new(0.5, 0.55, 0.9);
        pose.landmarks[15] = Landmark::new(0.2, 0.3, 0.8);
        pose.landmarks[16] = Landmark::new(0.8, 0.3, 0.1);

        let f = FrameFeatures::extract(&pose);
        assert_eq!(f.hip_y, 0.40);
        assert_eq!(f.knee_y, 0.55);
        assert_eq!(f.left_wrist.x, 0.2);
        assert_eq!(f.right_wrist.visibility, 0.1);
    }

    #[test]
    fn test_depth_is_absolute() {
        let mut pose = PoseLandmarks::default();
        pose.landmarks[LandmarkIndex::LeftHip as usize].y = 0.8;
        pose.landmarks[LandmarkIndex::LeftKnee as usize].y = 0.1;
        let f = FrameFeatures::extract(&pose);
        assert!((f.depth() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_short_input_skipped() {
        let landmarks = vec![Landmark::new(0.5, 0.5, 1.0); 24];
        assert!(FrameFeatures::from_slice(&landmarks).is_none());
    }
}
