use anyhow::{bail, Context, Result};
use opencv::core::Mat;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::thread;

use super::landmark::{Landmark, LandmarkIndex, PoseLandmarks};
use crate::log;
use crate::logging::LogFile;
use super::preprocess::preprocess_for_blazepose;

/// 外部姿勢推定モデル: 画像1枚 → 0 or 1人分のランドマーク
pub trait PoseEstimator {
    fn estimate(&mut self, frame: &Mat, timestamp_ms: u64) -> Result<Option<PoseLandmarks>>;
}

const INPUT_NAME: &str = "input_1";
const LANDMARKS_OUTPUT: &str = "Identity";
const PRESENCE_OUTPUT: &str = "Identity_1";
/// 出力1点あたりの値 (x, y, z, visibility, presence)
const VALUES_PER_POINT: usize = 5;

/// BlazePose (pose_landmark_full) を使用したランドマーク推定
pub struct BlazePoseEstimator {
    session: Session,
    min_pose_presence: f32,
}

impl BlazePoseEstimator {
    /// ONNXモデルを読み込んで初期化
    pub fn new<P: AsRef<Path>>(model_path: P, min_pose_presence: f32) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(model_path.as_ref())
            .context("Failed to load ONNX model")?;

        Ok(Self {
            session,
            min_pose_presence,
        })
    }
}

impl PoseEstimator for BlazePoseEstimator {
    fn estimate(&mut self, frame: &Mat, _timestamp_ms: u64) -> Result<Option<PoseLandmarks>> {
        let (input, letterbox) = preprocess_for_blazepose(frame)?;
        let input_tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![INPUT_NAME => input_tensor])
            .context("Inference failed")?;

        let presence: ndarray::ArrayViewD<f32> = outputs[PRESENCE_OUTPUT]
            .try_extract_array()
            .context("Failed to extract presence tensor")?;
        // 存在スコアは確率値としてそのまま比較
        let presence = presence.iter().next().copied().unwrap_or(0.0);
        if presence < self.min_pose_presence {
            return Ok(None);
        }

        // 出力は [1, 195] = 39点 × (x, y, z, visibility, presence)、入力ピクセル座標
        let raw: ndarray::ArrayViewD<f32> = outputs[LANDMARKS_OUTPUT]
            .try_extract_array()
            .context("Failed to extract landmark tensor")?;
        let values: Vec<f32> = raw.iter().copied().collect();
        if values.len() < LandmarkIndex::COUNT * VALUES_PER_POINT {
            bail!("unexpected landmark output length {}", values.len());
        }

        let size = super::preprocess::BLAZEPOSE_INPUT_SIZE as f32;
        let mut landmarks = [Landmark::default(); LandmarkIndex::COUNT];
        for (i, lm) in landmarks.iter_mut().enumerate() {
            let base = i * VALUES_PER_POINT;
            let in_input = Landmark::new(
                values[base] / size,
                values[base + 1] / size,
                sigmoid(values[base + 3]),
            );
            *lm = letterbox.unletterbox(in_input);
        }

        Ok(Some(PoseLandmarks::new(landmarks)))
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// モデルファイルが無ければダウンロード
pub fn ensure_model<P: AsRef<Path>>(path: P, url: &str) -> Result<bool> {
    let path = path.as_ref();
    if path.exists() {
        return Ok(false);
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .with_context(|| format!("failed to download model from {url}"))?;
    let bytes = response.bytes()?;
    std::fs::write(path, &bytes)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(true)
}

/// 推論を別スレッドで行い、結果をコールバックで通知する
///
/// 投入キューは1件。推論中に届いたフレームは捨てる。
/// 推論エラーは `logfile` に記録して次のフレームへ進む。
pub struct AsyncLandmarker {
    tx: Option<SyncSender<(Mat, u64)>>,
    last_timestamp: Option<u64>,
    handle: Option<thread::JoinHandle<()>>,
}

impl AsyncLandmarker {
    pub fn spawn<E, F>(mut estimator: E, logfile: LogFile, mut on_result: F) -> Self
    where
        E: PoseEstimator + Send + 'static,
        F: FnMut(PoseLandmarks, u64) + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel::<(Mat, u64)>(1);
        let handle = thread::spawn(move || {
            while let Ok((frame, timestamp_ms)) = rx.recv() {
                match estimator.estimate(&frame, timestamp_ms) {
                    Ok(Some(landmarks)) => on_result(landmarks, timestamp_ms),
                    Ok(None) => {}
                    Err(e) => log!(logfile, "[pose] inference error at {timestamp_ms}ms: {e:#}"),
                }
            }
        });

        Self {
            tx: Some(tx),
            last_timestamp: None,
            handle: Some(handle),
        }
    }

    /// フレームを非同期推論に投入。キューが埋まっていればfalse
    ///
    /// タイムスタンプは単調増加でなければならない。
    pub fn detect_async(&mut self, frame: &Mat, timestamp_ms: u64) -> Result<bool> {
        if let Some(last) = self.last_timestamp {
            if timestamp_ms <= last {
                bail!("timestamp {timestamp_ms} is not after previous {last}");
            }
        }
        self.last_timestamp = Some(timestamp_ms);

        let Some(tx) = self.tx.as_ref() else {
            bail!("landmarker is closed");
        };
        match tx.try_send((frame.clone(), timestamp_ms)) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => Ok(false),
            Err(TrySendError::Disconnected(_)) => bail!("landmarker worker exited"),
        }
    }
}

impl Drop for AsyncLandmarker {
    fn drop(&mut self) {
        // 送信側を閉じるとワーカーのrecvが終了する
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::LandmarkSlot;
    use std::time::{Duration, Instant};

    struct FixedEstimator {
        hip_y: f32,
    }

    impl PoseEstimator for FixedEstimator {
        fn estimate(&mut self, _frame: &Mat, _timestamp_ms: u64) -> Result<Option<PoseLandmarks>> {
            let mut pose = PoseLandmarks::default();
            pose.landmarks[LandmarkIndex::LeftHip as usize] = Landmark::new(0.5, self.hip_y, 1.0);
            Ok(Some(pose))
        }
    }

    struct NoPose;

    struct BrokenModel;

    impl PoseEstimator for BrokenModel {
        fn estimate(&mut self, _frame: &Mat, _timestamp_ms: u64) -> Result<Option<PoseLandmarks>> {
            bail!("shape mismatch")
        }
    }

    impl PoseEstimator for NoPose {
        fn estimate(&mut self, _frame: &Mat, _timestamp_ms: u64) -> Result<Option<PoseLandmarks>> {
            Ok(None)
        }
    }

    fn wait_for(slot: &LandmarkSlot) -> Option<PoseLandmarks> {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if let Some(p) = slot.take() {
                return Some(p);
            }
            thread::sleep(Duration::from_millis(5));
        }
        None
    }

    #[test]
    fn test_callback_publishes_to_slot() {
        let slot = LandmarkSlot::new();
        let writer = slot.clone();
        let mut landmarker = AsyncLandmarker::spawn(FixedEstimator { hip_y: 0.42 }, LogFile::stderr_only(), move |p, _| writer.publish(p));

        assert!(landmarker.detect_async(&Mat::default(), 33).unwrap());
        let pose = wait_for(&slot).unwrap();
        assert_eq!(pose.get(LandmarkIndex::LeftHip).y, 0.42);
    }

    #[test]
    fn test_no_pose_leaves_slot_empty() {
        let slot = LandmarkSlot::new();
        let writer = slot.clone();
        let mut landmarker = AsyncLandmarker::spawn(NoPose, LogFile::stderr_only(), move |p, _| writer.publish(p));

        landmarker.detect_async(&Mat::default(), 33).unwrap();
        drop(landmarker);
        assert!(slot.take().is_none());
    }

    #[test]
    fn test_timestamp_must_increase() {
        let mut landmarker = AsyncLandmarker::spawn(NoPose, LogFile::stderr_only(), |_, _| {});
        landmarker.detect_async(&Mat::default(), 66).unwrap();
        assert!(landmarker.detect_async(&Mat::default(), 66).is_err());
        assert!(landmarker.detect_async(&Mat::default(), 33).is_err());
    }

    #[test]
    fn test_inference_error_goes_to_log_file() {
        let dir = std::env::temp_dir().join(format!("kineticore_landmarker_test_{}", std::process::id()));
        let logfile = LogFile::open(&dir, "pose").unwrap();
        let slot = LandmarkSlot::new();
        let writer = slot.clone();
        let mut landmarker = AsyncLandmarker::spawn(BrokenModel, logfile, move |p, _| writer.publish(p));

        assert!(landmarker.detect_async(&Mat::default(), 99).unwrap());
        // dropでワーカーの処理完了を待つ
        drop(landmarker);
        assert!(slot.take().is_none());

        let entries: Vec<_> = std::fs::read_dir(&dir).unwrap().collect();
        let path = entries[0].as_ref().unwrap().path();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[pose] inference error at 99ms: shape mismatch"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(10.0) > 0.99);
    }
}
