use anyhow::Result;
use ndarray::Array4;
use opencv::{
    core::{self, AlgorithmHint, Mat, Scalar, Size, CV_32FC3},
    imgproc,
    prelude::*,
};

use super::landmark::Landmark;

/// BlazePose ランドマークモデルの入力サイズ
pub const BLAZEPOSE_INPUT_SIZE: i32 = 256;

/// レターボックス情報（入力画像に対する正規化比率）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxInfo {
    pub pad_left: f32,
    pub pad_top: f32,
    pub content_width: f32,
    pub content_height: f32,
}

impl LetterboxInfo {
    /// パディングなし
    pub fn identity() -> Self {
        Self {
            pad_left: 0.0,
            pad_top: 0.0,
            content_width: 1.0,
            content_height: 1.0,
        }
    }

    /// フレームサイズから正方形入力へのレターボックスを計算
    pub fn for_frame(width: i32, height: i32, input_size: i32) -> Self {
        if width <= 0 || height <= 0 {
            return Self::identity();
        }
        let scale = input_size as f32 / width.max(height) as f32;
        let content_w = (width as f32 * scale).round() / input_size as f32;
        let content_h = (height as f32 * scale).round() / input_size as f32;
        Self {
            pad_left: (1.0 - content_w) / 2.0,
            pad_top: (1.0 - content_h) / 2.0,
            content_width: content_w,
            content_height: content_h,
        }
    }

    /// 入力画像上の正規化座標 → 元フレーム上の正規化座標
    pub fn unletterbox(&self, landmark: Landmark) -> Landmark {
        Landmark::new(
            (landmark.x - self.pad_left) / self.content_width,
            (landmark.y - self.pad_top) / self.content_height,
            landmark.visibility,
        )
    }
}

/// OpenCV Mat を BlazePose 用の入力テンソルに変換
///
/// - アスペクト比を保って 256x256 にレターボックス
/// - BGR -> RGB
/// - [1, 256, 256, 3] の f32 テンソル (0.0-1.0)
pub fn preprocess_for_blazepose(frame: &Mat) -> Result<(Array4<f32>, LetterboxInfo)> {
    let size = BLAZEPOSE_INPUT_SIZE;
    let letterbox = LetterboxInfo::for_frame(frame.cols(), frame.rows(), size);

    let content_w = ((letterbox.content_width * size as f32).round() as i32).clamp(1, size);
    let content_h = ((letterbox.content_height * size as f32).round() as i32).clamp(1, size);

    let mut resized = Mat::default();
    imgproc::resize(
        frame,
        &mut resized,
        Size::new(content_w, content_h),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )?;

    let left = (size - content_w) / 2;
    let top = (size - content_h) / 2;
    let mut padded = Mat::default();
    core::copy_make_border(
        &resized,
        &mut padded,
        top,
        size - content_h - top,
        left,
        size - content_w - left,
        core::BORDER_CONSTANT,
        Scalar::all(0.0),
    )?;

    let mut rgb = Mat::default();
    imgproc::cvt_color(&padded, &mut rgb, imgproc::COLOR_BGR2RGB, 0, AlgorithmHint::ALGO_HINT_DEFAULT)?;

    let mut float_mat = Mat::default();
    rgb.convert_to(&mut float_mat, CV_32FC3, 1.0 / 255.0, 0.0)?;

    let mut tensor = Array4::<f32>::zeros((1, size as usize, size as usize, 3));
    for y in 0..size {
        for x in 0..size {
            let pixel = float_mat.at_2d::<opencv::core::Vec3f>(y, x)?;
            tensor[[0, y as usize, x as usize, 0]] = pixel[0];
            tensor[[0, y as usize, x as usize, 1]] = pixel[1];
            tensor[[0, y as usize, x as usize, 2]] = pixel[2];
        }
    }

    Ok((tensor, letterbox))
}
