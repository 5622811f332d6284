//! 再生スケジューラー
//!
//! コメントの投稿時刻に遅延を加えた時刻に配信し、チャットの実時間再生を再現する。
//! 配信時刻はコメントごとに独立して計算するため、配信順はスケジュール順と一致しない場合がある。

use std::time::Duration;
use tokio::task::JoinHandle;

use super::types::ChatEntry;

/// 現在時刻（UNIXエポックからのミリ秒）
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// 配信までの待機時間を計算
///
/// `timestamp_ms - (now_ms - delay_ms)`。負の値は即時配信。
/// delayが負ならライブの遅れを取り戻す方向に前倒しされる。
pub fn delivery_delay(timestamp_usec: i64, now_ms: i64, delay_ms: i64) -> Duration {
    let wait_ms = (timestamp_usec / 1000).saturating_sub(now_ms.saturating_sub(delay_ms));
    u64::try_from(wait_ms)
        .map(Duration::from_millis)
        .unwrap_or(Duration::ZERO)
}

/// 配信待ちコメントのタイマーを管理する
#[derive(Debug)]
pub struct PlaybackScheduler {
    delay_ms: i64,
    pending: Vec<JoinHandle<()>>,
}

impl PlaybackScheduler {
    pub fn new(delay_ms: i64) -> Self {
        Self {
            delay_ms,
            pending: Vec::new(),
        }
    }

    pub fn set_delay(&mut self, delay_ms: i64) {
        self.delay_ms = delay_ms;
    }

    /// コメントの配信を予約し、配信までの待機時間を返す
    ///
    /// # Panics
    /// tokioランタイム外で呼び出した場合
    pub fn schedule<F>(&mut self, entry: ChatEntry, callback: F) -> Duration
    where
        F: FnOnce(ChatEntry) + Send + 'static,
    {
        self.schedule_at(entry, now_ms(), callback)
    }

    /// 基準時刻を指定して配信を予約
    pub fn schedule_at<F>(&mut self, entry: ChatEntry, now_ms: i64, callback: F) -> Duration
    where
        F: FnOnce(ChatEntry) + Send + 'static,
    {
        let wait = delivery_delay(entry.timestamp_usec(), now_ms, self.delay_ms);
        log::debug!("Scheduling chat {} in {:?}", entry.id(), wait);

        self.pending.retain(|handle| !handle.is_finished());
        self.pending.push(tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            callback(entry);
        }));
        wait
    }

    /// 配信待ちの件数
    pub fn pending_count(&mut self) -> usize {
        self.pending.retain(|handle| !handle.is_finished());
        self.pending.len()
    }

    /// 配信待ちをすべて取り消す
    pub fn cancel_all(&mut self) {
        let count = self.pending.len();
        for handle in self.pending.drain(..) {
            handle.abort();
        }
        if count > 0 {
            log::debug!("Cancelled {} pending chat emissions", count);
        }
    }
}

impl Drop for PlaybackScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
