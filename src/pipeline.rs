use anyhow::{Context, Result};

use crate::camera::OpenCvCamera;
use crate::config::Config;
use crate::game::{FrameFeatures, GameSnapshot, GameState, SquatDetector, SquatEvent};
use crate::log;
use crate::logging::LogFile;
use crate::pose::{AsyncLandmarker, BlazePoseEstimator, LandmarkSlot, PoseLandmarks};
use crate::render::{banner_text, draw_banner, MinifbRenderer};
use crate::server::SnapshotSource;

const WINDOW_TITLE: &str = "KinetiCore - Pose Detection (press Q to quit)";

/// 1セッション分のカメラ → 推論 → 判定 → 表示
///
/// dropでカメラと推論スレッドを解放する。
pub struct CapturePipeline {
    camera: OpenCvCamera,
    landmarker: AsyncLandmarker,
    slot: LandmarkSlot,
    detector: SquatDetector,
    state: GameState,
    renderer: Option<MinifbRenderer>,
    /// 骨格表示用に保持する直近の検出結果
    last_pose: Option<PoseLandmarks>,
    joint_visibility: f32,
    timestamp_ms: u64,
    tick_ms: u64,
    verbose: bool,
    logfile: LogFile,
}

impl CapturePipeline {
    pub fn open(config: &Config, logfile: &LogFile) -> Result<Self> {
        let detector = SquatDetector::from_config(&config.detector)?;

        let camera = OpenCvCamera::from_config(&config.camera)
            .with_context(|| format!("could not open webcam {}", config.camera.index))?;
        let (width, height) = camera.resolution();
        log!(logfile, "[camera] opened index {} ({}x{})", camera.index(), width, height);

        let estimator = BlazePoseEstimator::new(&config.model.path, config.model.min_pose_presence)?;
        let slot = LandmarkSlot::new();
        let writer = slot.clone();
        let landmarker = AsyncLandmarker::spawn(estimator, logfile.clone(), move |landmarks, _| writer.publish(landmarks));

        let renderer = if config.debug.view {
            Some(MinifbRenderer::new(WINDOW_TITLE, width as usize, height as usize)?)
        } else {
            None
        };

        Ok(Self {
            camera,
            landmarker,
            slot,
            detector,
            state: GameState::default(),
            renderer,
            last_pose: None,
            joint_visibility: config.detector.joint_visibility,
            timestamp_ms: 0,
            tick_ms: config.server.tick_ms.max(1),
            verbose: config.debug.verbose,
            logfile: logfile.clone(),
        })
    }

    fn tick(&mut self) -> Result<Option<GameSnapshot>> {
        let mut frame = self.camera.read_frame()?;

        self.timestamp_ms += self.tick_ms;
        let queued = self.landmarker.detect_async(&frame, self.timestamp_ms)?;
        if !queued && self.verbose {
            log!(self.logfile, "[verbose] inference busy, frame {}ms dropped", self.timestamp_ms);
        }

        // 未検出のフレームでは状態を変えない
        if let Some(pose) = self.slot.take() {
            let features = FrameFeatures::extract(&pose);
            match self.detector.update(&mut self.state, &features) {
                SquatEvent::SquatStarted => log!(self.logfile, "[squat] down (depth {:.3})", self.state.depth),
                SquatEvent::SquatFinished { reps, xp } => log!(self.logfile, "[squat] rep {} ({} XP)", reps, xp),
                SquatEvent::None => {}
            }
            self.last_pose = Some(pose);
        }

        if let Some(renderer) = self.renderer.as_mut() {
            draw_banner(&mut frame, &banner_text(&self.state))?;
            renderer.draw_frame(&frame)?;
            if let Some(pose) = &self.last_pose {
                renderer.draw_pose(pose, self.joint_visibility);
            }
            renderer.update()?;
            if renderer.quit_requested() {
                return Ok(None);
            }
        }

        Ok(Some(GameSnapshot::from(&self.state)))
    }
}

impl SnapshotSource for CapturePipeline {
    fn next_snapshot(&mut self) -> Result<Option<GameSnapshot>> {
        self.tick()
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        if let Err(e) = self.camera.release() {
            log!(self.logfile, "[camera] release failed: {e:#}");
        } else {
            log!(self.logfile, "[camera] released");
        }
    }
}
