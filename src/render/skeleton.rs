use crate::pose::{LandmarkIndex, PoseLandmarks};

/// 骨格の接続定義 (開始ランドマーク, 終了ランドマーク)
pub const SKELETON_CONNECTIONS: [(LandmarkIndex, LandmarkIndex); 16] = [
    // 腕
    (LandmarkIndex::LeftShoulder, LandmarkIndex::RightShoulder),
    (LandmarkIndex::LeftShoulder, LandmarkIndex::LeftElbow),
    (LandmarkIndex::LeftElbow, LandmarkIndex::LeftWrist),
    (LandmarkIndex::RightShoulder, LandmarkIndex::RightElbow),
    (LandmarkIndex::RightElbow, LandmarkIndex::RightWrist),
    // 胴体
    (LandmarkIndex::LeftShoulder, LandmarkIndex::LeftHip),
    (LandmarkIndex::RightShoulder, LandmarkIndex::RightHip),
    (LandmarkIndex::LeftHip, LandmarkIndex::RightHip),
    // 脚
    (LandmarkIndex::LeftHip, LandmarkIndex::LeftKnee),
    (LandmarkIndex::LeftKnee, LandmarkIndex::LeftAnkle),
    (LandmarkIndex::RightHip, LandmarkIndex::RightKnee),
    (LandmarkIndex::RightKnee, LandmarkIndex::RightAnkle),
    // 足
    (LandmarkIndex::LeftAnkle, LandmarkIndex::LeftHeel),
    (LandmarkIndex::LeftAnkle, LandmarkIndex::LeftFootIndex),
    (LandmarkIndex::RightAnkle, LandmarkIndex::RightHeel),
    (LandmarkIndex::RightAnkle, LandmarkIndex::RightFootIndex),
];

/// 関節の色 (RGB)
pub const JOINT_COLOR: u32 = 0xF755A8;

/// 骨格線の色 (RGB)
pub const SKELETON_COLOR: u32 = 0xF7FF00;

/// 両端とも可視な接続のみ
pub fn visible_connections(
    pose: &PoseLandmarks,
    threshold: f32,
) -> impl Iterator<Item = (LandmarkIndex, LandmarkIndex)> + '_ {
    let connections: &'static [(LandmarkIndex, LandmarkIndex)] = &SKELETON_CONNECTIONS;
    connections
        .iter()
        .copied()
        .filter(move |(a, b)| pose.get(*a).is_visible(threshold) && pose.get(*b).is_visible(threshold))
}

/// 可視な関節のインデックス
pub fn visible_joints(pose: &PoseLandmarks, threshold: f32) -> impl Iterator<Item = usize> + '_ {
    pose.landmarks
        .iter()
        .enumerate()
        .filter(move |(_, lm)| lm.is_visible(threshold))
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Landmark;

    #[test]
    fn test_connection_count() {
        assert_eq!(SKELETON_CONNECTIONS.len(), 16);
    }

    #[test]
    fn test_hidden_endpoint_skips_line() {
        let mut pose = PoseLandmarks::default();
        pose.landmarks[LandmarkIndex::LeftHip as usize] = Landmark::new(0.4, 0.6, 0.9);
        pose.landmarks[LandmarkIndex::LeftKnee as usize] = Landmark::new(0.4, 0.8, 0.9);
        pose.landmarks[LandmarkIndex::LeftAnkle as usize] = Landmark::new(0.4, 0.95, 0.5);

        let lines: Vec<_> = visible_connections(&pose, 0.5).collect();
        assert_eq!(lines, vec![(LandmarkIndex::LeftHip, LandmarkIndex::LeftKnee)]);
    }

    #[test]
    fn test_visible_joints_exclusive() {
        let mut pose = PoseLandmarks::default();
        pose.landmarks[0] = Landmark::new(0.5, 0.1, 0.51);
        pose.landmarks[1] = Landmark::new(0.5, 0.1, 0.5);
        let joints: Vec<_> = visible_joints(&pose, 0.5).collect();
        assert_eq!(joints, vec![0]);
    }
}
