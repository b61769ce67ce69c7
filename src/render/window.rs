use anyhow::{bail, Result};
use minifb::{Key, Window, WindowOptions};
use opencv::core::{Mat, Point, Rect, Scalar, CV_8UC3};
use opencv::imgproc;
use opencv::prelude::*;

use crate::pose::PoseLandmarks;
use crate::render::canvas::Canvas;

/// バナーの高さ（ピクセル）
const BANNER_HEIGHT: i32 = 36;

/// フレーム上部に暗い帯とテキストを描く
pub fn draw_banner(frame: &mut Mat, text: &str) -> Result<()> {
    let width = frame.cols();
    imgproc::rectangle(
        frame,
        Rect::new(0, 0, width, BANNER_HEIGHT),
        Scalar::new(5.0, 5.0, 20.0, 0.0),
        -1,
        imgproc::LINE_8,
        0,
    )?;
    imgproc::put_text(
        frame,
        text,
        Point::new(10, 24),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.55,
        Scalar::new(0.0, 255.0, 247.0, 0.0),
        1,
        imgproc::LINE_AA,
        false,
    )?;
    Ok(())
}

/// カメラ映像＋骨格を表示するウィンドウ
pub struct MinifbRenderer {
    window: Window,
    canvas: Canvas,
}

impl MinifbRenderer {
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self> {
        let options = WindowOptions {
            resize: false,
            ..WindowOptions::default()
        };
        let window = Window::new(title, width, height, options)?;
        Ok(Self {
            window,
            canvas: Canvas::new(width, height),
        })
    }

    /// ウィンドウが閉じられた、または q / Esc が押された
    pub fn quit_requested(&self) -> bool {
        !self.window.is_open() || self.window.is_key_down(Key::Q) || self.window.is_key_down(Key::Escape)
    }

    /// BGR8 の Mat を取り込む
    pub fn draw_frame(&mut self, frame: &Mat) -> Result<()> {
        if frame.typ() != CV_8UC3 {
            bail!("expected an 8-bit BGR frame, got type {}", frame.typ());
        }
        // ROI などの非連続 Mat は複製してから読む
        let owned;
        let frame = if frame.is_continuous() {
            frame
        } else {
            owned = frame.try_clone()?;
            &owned
        };
        self.canvas
            .blit_bgr(frame.data_bytes()?, frame.cols() as usize, frame.rows() as usize);
        Ok(())
    }

    pub fn draw_pose(&mut self, pose: &PoseLandmarks, visibility_threshold: f32) {
        self.canvas.draw_pose(pose, visibility_threshold);
    }

    pub fn update(&mut self) -> Result<()> {
        self.window
            .update_with_buffer(self.canvas.pixels(), self.canvas.width(), self.canvas.height())?;
        Ok(())
    }
}
