use std::sync::{Arc, Mutex, MutexGuard};

use super::landmark::PoseLandmarks;

/// 推論結果コールバック → メインループへの1要素受け渡しスロット
///
/// 書き込みはコールバックのみ、読み出し（取り出して空にする）はループのみ。
/// 未読の結果は新しい結果で上書きされる。
#[derive(Debug, Clone, Default)]
pub struct LandmarkSlot {
    latest: Arc<Mutex<Option<PoseLandmarks>>>,
}

impl LandmarkSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// 最新の結果を書き込む（未読の値は破棄）
    pub fn publish(&self, landmarks: PoseLandmarks) {
        *self.lock() = Some(landmarks);
    }

    /// 最新の結果を取り出してスロットを空にする
    pub fn take(&self) -> Option<PoseLandmarks> {
        self.lock().take()
    }

    fn lock(&self) -> MutexGuard<'_, Option<PoseLandmarks>> {
        // 書き込み側がpanicしても値自体は壊れないので回収する
        self.latest.lock().unwrap_or_else(|e| e.into_inner())
    }
}
