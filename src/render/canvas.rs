use crate::pose::PoseLandmarks;
use crate::render::skeleton::{visible_connections, visible_joints, JOINT_COLOR, SKELETON_COLOR};

/// 関節マーカーの半径（ピクセル）
pub const JOINT_RADIUS: i32 = 5;

/// 0RGB 形式のピクセルバッファ
///
/// ウィンドウ側はこれをそのまま表示する。
pub struct Canvas {
    pixels: Vec<u32>,
    width: usize,
    height: usize,
}

impl Canvas {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            pixels: vec![0; width * height],
            width,
            height,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        (x < self.width && y < self.height).then(|| self.pixels[y * self.width + x])
    }

    /// BGR8 の連続バッファ (`src_width` × `src_height` × 3) を取り込む
    ///
    /// はみ出す部分は切り捨て、足りない部分は前の内容のまま。
    pub fn blit_bgr(&mut self, bgr: &[u8], src_width: usize, src_height: usize) {
        if src_width == 0 {
            return;
        }
        let cols = self.width.min(src_width);
        for (y, row) in bgr.chunks_exact(src_width * 3).take(src_height.min(self.height)).enumerate() {
            let dst = &mut self.pixels[y * self.width..y * self.width + cols];
            for (out, px) in dst.iter_mut().zip(row.chunks_exact(3)) {
                *out = u32::from(px[2]) << 16 | u32::from(px[1]) << 8 | u32::from(px[0]);
            }
        }
    }

    /// 可視な接続を線で、可視な関節を点で描く
    pub fn draw_pose(&mut self, pose: &PoseLandmarks, visibility_threshold: f32) {
        let (w, h) = (self.width as u32, self.height as u32);

        for (a, b) in visible_connections(pose, visibility_threshold) {
            let from = pose.get(a).to_pixel(w, h);
            let to = pose.get(b).to_pixel(w, h);
            self.line(from, to, SKELETON_COLOR);
        }
        for i in visible_joints(pose, visibility_threshold) {
            let center = pose.landmarks[i].to_pixel(w, h);
            self.disc(center, JOINT_RADIUS, JOINT_COLOR);
        }
    }

    /// 長い方の軸に沿って1ピクセルずつ進める
    fn line(&mut self, (x0, y0): (i32, i32), (x1, y1): (i32, i32), color: u32) {
        let steps = (x1 - x0).abs().max((y1 - y0).abs());
        if steps == 0 {
            self.plot(x0, y0, color);
            return;
        }
        let (dx, dy) = ((x1 - x0) as f32 / steps as f32, (y1 - y0) as f32 / steps as f32);
        for i in 0..=steps {
            let x = x0 as f32 + dx * i as f32;
            let y = y0 as f32 + dy * i as f32;
            self.plot(x.round() as i32, y.round() as i32, color);
        }
    }

    /// 行ごとに横幅を求めて塗る
    fn disc(&mut self, (cx, cy): (i32, i32), radius: i32, color: u32) {
        for dy in -radius..=radius {
            let half = ((radius * radius - dy * dy) as f32).sqrt() as i32;
            for x in cx - half..=cx + half {
                self.plot(x, cy + dy, color);
            }
        }
    }

    fn plot(&mut self, x: i32, y: i32, color: u32) {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return;
        }
        self.pixels[y as usize * self.width + x as usize] = color;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{Landmark, LandmarkIndex};

    #[test]
    fn test_blit_bgr_to_rgb() {
        let mut canvas = Canvas::new(2, 1);
        canvas.blit_bgr(&[10, 20, 30, 1, 2, 3], 2, 1);
        assert_eq!(canvas.pixel(0, 0), Some(0x1E140A));
        assert_eq!(canvas.pixel(1, 0), Some(0x030201));
    }

    #[test]
    fn test_blit_crops_larger_frame() {
        let mut canvas = Canvas::new(1, 1);
        canvas.blit_bgr(&[0, 0, 255, 255, 0, 0, 9, 9, 9, 9, 9, 9], 2, 2);
        assert_eq!(canvas.pixels(), &[0xFF0000]);
    }

    #[test]
    fn test_blit_smaller_frame_keeps_rest() {
        let mut canvas = Canvas::new(2, 2);
        canvas.blit_bgr(&[255, 255, 255], 1, 1);
        assert_eq!(canvas.pixel(0, 0), Some(0xFFFFFF));
        assert_eq!(canvas.pixel(1, 1), Some(0));
    }

    #[test]
    fn test_pose_draws_line_and_joints() {
        let mut canvas = Canvas::new(100, 100);
        let mut pose = PoseLandmarks::default();
        pose.landmarks[LandmarkIndex::LeftHip as usize] = Landmark::new(0.2, 0.5, 0.9);
        pose.landmarks[LandmarkIndex::LeftKnee as usize] = Landmark::new(0.8, 0.5, 0.9);
        canvas.draw_pose(&pose, 0.5);

        // 線の中点と関節の中心
        assert_eq!(canvas.pixel(50, 50), Some(SKELETON_COLOR));
        assert_eq!(canvas.pixel(20, 50), Some(JOINT_COLOR));
        assert_eq!(canvas.pixel(80, 54), Some(JOINT_COLOR));
        assert_eq!(canvas.pixel(50, 60), Some(0));
    }

    #[test]
    fn test_hidden_pose_draws_nothing() {
        let mut canvas = Canvas::new(50, 50);
        let mut pose = PoseLandmarks::default();
        pose.landmarks[LandmarkIndex::LeftHip as usize] = Landmark::new(0.5, 0.5, 0.5);
        canvas.draw_pose(&pose, 0.5);
        assert!(canvas.pixels().iter().all(|&p| p == 0));
    }

    #[test]
    fn test_offscreen_joint_is_clipped() {
        let mut canvas = Canvas::new(10, 10);
        let mut pose = PoseLandmarks::default();
        pose.landmarks[0] = Landmark::new(2.0, -1.0, 0.9);
        canvas.draw_pose(&pose, 0.5);
        assert!(canvas.pixels().iter().all(|&p| p == 0));
    }
}
