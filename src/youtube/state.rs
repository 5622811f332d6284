use serde::Serialize;
use std::time::Duration;

use super::innertube::NextContinuation;
use crate::config::PollerConfig;

/// ポーリング状態を管理する構造体
///
/// is_replayはセッション作成時に決まり、以後変わらない。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollState {
    pub is_replay: bool,
    pub is_playing: bool,
    /// チャット配信の遅延（ミリ秒、負なら前倒し）
    pub delay_ms: i64,
    /// セッション開始時刻（UNIXエポックからのミリ秒）
    pub start_time_ms: i64,
    /// 次回リクエストに使うcontinuationトークン
    pub continuation: String,
    pub next_poll_delay_ms: u64,
    /// start()ごとに増える世代番号（古いループの自己停止用）
    pub generation: u64,
    pub poll_count: u64,
    pub protocol_errors: u64,
}

impl PollState {
    pub fn new(is_replay: bool, continuation: String, start_time_ms: i64, config: &PollerConfig) -> Self {
        Self {
            is_replay,
            is_playing: false,
            delay_ms: 0,
            start_time_ms,
            continuation,
            next_poll_delay_ms: config.default_poll_interval_ms,
            generation: 0,
            poll_count: 0,
            protocol_errors: 0,
        }
    }

    /// 再生開始。既に再生中ならNone、開始したら新しい世代番号を返す
    pub fn begin(&mut self, delay_ms: i64) -> Option<u64> {
        if self.is_playing {
            return None;
        }
        self.is_playing = true;
        self.delay_ms = delay_ms;
        self.generation += 1;
        Some(self.generation)
    }

    /// 再生停止。再生中だったかどうかを返す
    pub fn halt(&mut self) -> bool {
        std::mem::replace(&mut self.is_playing, false)
    }

    /// 指定世代のループが継続してよいか
    pub fn is_current(&self, generation: u64) -> bool {
        self.is_playing && self.generation == generation
    }

    /// プレイヤー再生位置（セッション開始からの経過ミリ秒）
    pub fn player_offset_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.start_time_ms).max(0)
    }

    /// レスポンスから選択したcontinuationを採用
    pub fn apply_continuation(&mut self, next: &NextContinuation, config: &PollerConfig) {
        self.continuation = next.token.clone();
        self.next_poll_delay_ms = compute_poll_delay_ms(self.delay_ms, next.timeout_ms, config);
        self.poll_count += 1;
    }

    /// continuationが無いレスポンス。トークンは据え置き
    pub fn record_protocol_error(&mut self, config: &PollerConfig) {
        self.protocol_errors += 1;
        self.next_poll_delay_ms = compute_poll_delay_ms(self.delay_ms, None, config);
        self.poll_count += 1;
    }

    pub fn next_poll_delay(&self) -> Duration {
        Duration::from_millis(self.next_poll_delay_ms)
    }
}

/// 次回ポーリングまでの待機時間
///
/// 正の遅延設定があればそれを使い、なければレスポンスのtimeoutMs（上下限でガード）、
/// それも無ければデフォルト間隔。
pub fn compute_poll_delay_ms(delay_ms: i64, timeout_ms: Option<u64>, config: &PollerConfig) -> u64 {
    if delay_ms > 0 {
        return delay_ms as u64;
    }
    match timeout_ms {
        Some(timeout) => timeout.clamp(config.min_poll_interval_ms, config.max_poll_interval_ms),
        None => config.default_poll_interval_ms,
    }
}
