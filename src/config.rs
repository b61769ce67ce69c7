use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub debug: DebugConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// WebSocket待ち受けアドレス
    #[serde(default = "default_addr")]
    pub addr: String,
    /// スナップショット送信間隔（ミリ秒）
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

fn default_addr() -> String { "127.0.0.1:8765".to_string() }
fn default_tick_ms() -> u64 { 33 }

impl ServerConfig {
    /// 送信間隔。0msは不可
    pub fn tick(&self) -> Result<Duration> {
        if self.tick_ms == 0 {
            bail!("server.tick_ms must be at least 1");
        }
        Ok(Duration::from_millis(self.tick_ms))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            tick_ms: default_tick_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CameraConfig {
    #[serde(default)]
    pub index: i32,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
}

fn default_width() -> u32 { 640 }
fn default_height() -> u32 { 480 }
fn default_fps() -> u32 { 30 }

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// ONNXモデルのパス
    #[serde(default = "default_model_path")]
    pub path: String,
    /// モデルが無い場合のダウンロード元
    #[serde(default)]
    pub url: Option<String>,
    /// この値未満の人物存在スコアは未検出扱い
    #[serde(default = "default_min_pose_presence")]
    pub min_pose_presence: f32,
}

fn default_model_path() -> String { "models/pose_landmark_full.onnx".to_string() }
fn default_min_pose_presence() -> f32 { 0.6 }

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
            url: None,
            min_pose_presence: default_min_pose_presence(),
        }
    }
}

/// スクワット・手の判定パラメータ（起動時に固定）
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DetectorConfig {
    /// 深さがこれ未満でしゃがみ開始
    #[serde(default = "default_squat_threshold")]
    pub squat_threshold: f32,
    /// 深さがこれを超えると立ち上がり（1レップ完了）
    #[serde(default = "default_rise_threshold")]
    pub rise_threshold: f32,
    /// 手首の可視判定閾値
    #[serde(default = "default_hand_visibility")]
    pub hand_visibility: f32,
    /// 骨格描画の関節可視判定閾値
    #[serde(default = "default_joint_visibility")]
    pub joint_visibility: f32,
    /// 1レップあたりのXP
    #[serde(default = "default_xp_per_rep")]
    pub xp_per_rep: u32,
}

fn default_squat_threshold() -> f32 { 0.15 }
fn default_rise_threshold() -> f32 { 0.22 }
fn default_hand_visibility() -> f32 { 0.4 }
fn default_joint_visibility() -> f32 { 0.5 }
fn default_xp_per_rep() -> u32 { 90 }

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            squat_threshold: default_squat_threshold(),
            rise_threshold: default_rise_threshold(),
            hand_visibility: default_hand_visibility(),
            joint_visibility: default_joint_visibility(),
            xp_per_rep: default_xp_per_rep(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DebugConfig {
    /// カメラ映像ウィンドウを表示
    #[serde(default = "default_view")]
    pub view: bool,
    #[serde(default)]
    pub verbose: bool,
}

fn default_view() -> bool { true }

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            view: default_view(),
            verbose: false,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// 読み込みに失敗したらデフォルト値を使う
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("[config] {e:#}, using defaults");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.addr, "127.0.0.1:8765");
        assert_eq!(config.server.tick_ms, 33);
        assert_eq!(config.detector.squat_threshold, 0.15);
        assert_eq!(config.detector.rise_threshold, 0.22);
        assert_eq!(config.detector.hand_visibility, 0.4);
        assert_eq!(config.detector.joint_visibility, 0.5);
        assert_eq!(config.detector.xp_per_rep, 90);
        assert_eq!(config.model.min_pose_presence, 0.6);
        assert!(config.debug.view);
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.detector, DetectorConfig::default());
        assert_eq!(config.camera.width, 640);
    }

    #[test]
    fn test_partial_section() {
        let config = Config::from_toml(
            r#"
            [server]
            addr = "0.0.0.0:9000"

            [detector]
            rise_threshold = 0.25
            "#,
        )
        .unwrap();
        assert_eq!(config.server.addr, "0.0.0.0:9000");
        assert_eq!(config.server.tick_ms, 33);
        assert_eq!(config.detector.rise_threshold, 0.25);
        assert_eq!(config.detector.squat_threshold, 0.15);
    }

    #[test]
    fn test_zero_tick_rejected() {
        let config = Config::from_toml("[server]\ntick_ms = 0").unwrap();
        assert!(config.server.tick().is_err());

        let config = Config::from_toml("[server]\ntick_ms = 1").unwrap();
        assert_eq!(config.server.tick().unwrap(), Duration::from_millis(1));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(Config::from_toml("[server\naddr = ").is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default("does/not/exist.toml");
        assert_eq!(config.server.addr, "127.0.0.1:8765");
    }
}
