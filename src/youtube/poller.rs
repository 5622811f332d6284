//! ライブチャットのcontinuationポーラー
//!
//! continuationトークンを使ってアクションを取得し、
//! 抽出 → パース → 重複排除 → 配信予約 の順に処理してから次のトークンと待機時間を決める。
//! start()でポーリングループを起動し、stop()でループを止める。

use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use super::backoff::ExponentialBackoff;
use super::dedup::DedupTracker;
use super::errors::YouTubeError;
use super::events::{EventChannel, LiveChatEvent, LiveChatEventKind, SubscriptionId};
use super::innertube::{
    parse_chat_entry, ActionExtractor, ChatTransport, InnerTubeChatResponse, LIVE_CHAT_ENDPOINT,
    LIVE_CHAT_REPLAY_ENDPOINT,
};
use super::scheduler::{now_ms, PlaybackScheduler};
use super::state::PollState;
use crate::config::PollerConfig;

/// ポーリング対象の動画セッション
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveChatSession {
    pub video_id: String,
    /// アーカイブ（リプレイ）かどうか
    pub is_replay: bool,
    /// 最初のcontinuationトークン
    pub continuation: String,
}

/// 1回のポーリング結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollOutcome {
    /// 配信予約したコメント数
    pub scheduled: usize,
    pub duplicates: usize,
    pub malformed: usize,
    /// continuationが得られなかった（トークン据え置き）
    pub protocol_error: bool,
    /// 次回ポーリングまでの待機時間
    pub next_delay: Duration,
}

/// ライブチャットのcontinuationポーラー
pub struct ContinuationPoller<T: ChatTransport> {
    shared: Arc<PollerShared<T>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct PollerShared<T> {
    transport: T,
    config: PollerConfig,
    video_id: String,
    state: Mutex<PollState>,
    dedup: Mutex<DedupTracker>,
    scheduler: Mutex<PlaybackScheduler>,
    events: Arc<EventChannel>,
}

/// ロック取得（ポイズンしていても中身を使う）
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        log::error!("Poller lock was poisoned, recovering");
        poisoned.into_inner()
    })
}

impl<T: ChatTransport> ContinuationPoller<T> {
    /// 新しいポーラーを作成（セッション開始時刻はこの時点）
    pub fn new(transport: T, session: LiveChatSession, config: PollerConfig) -> Self {
        let state = PollState::new(session.is_replay, session.continuation, now_ms(), &config);
        Self {
            shared: Arc::new(PollerShared {
                transport,
                video_id: session.video_id,
                state: Mutex::new(state),
                dedup: Mutex::new(DedupTracker::new()),
                scheduler: Mutex::new(PlaybackScheduler::new(0)),
                events: Arc::new(EventChannel::new()),
                config,
            }),
            task: Mutex::new(None),
        }
    }

    /// イベントチャネル
    pub fn events(&self) -> Arc<EventChannel> {
        Arc::clone(&self.shared.events)
    }

    /// イベントを購読（`events().subscribe()`の短縮形）
    pub fn on<F>(&self, kind: LiveChatEventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&LiveChatEvent) + Send + Sync + 'static,
    {
        self.shared.events.subscribe(kind, handler)
    }

    /// チャットのポーリングを開始
    ///
    /// 既に再生中なら何もせずfalseを返す。
    ///
    /// # 引数
    /// - `delay_ms`: チャット配信の遅延（ミリ秒）。負の値で前倒し
    ///
    /// # Panics
    /// tokioランタイム外で呼び出した場合
    pub fn start(&self, delay_ms: i64) -> bool {
        let generation = match lock(&self.shared.state).begin(delay_ms) {
            Some(generation) => generation,
            None => return false,
        };
        lock(&self.shared.scheduler).set_delay(delay_ms);

        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(run_poll_loop(shared, generation));
        if let Some(previous) = lock(&self.task).replace(handle) {
            previous.abort();
        }

        log::info!(
            "Started live chat polling for {} (delay: {}ms)",
            self.shared.video_id,
            delay_ms
        );
        true
    }

    /// ポーリングを停止
    ///
    /// 次回リクエストのタイマーを取り消す。配信予約済みのコメントはそのまま配信される。
    pub fn stop(&self) -> bool {
        let was_playing = lock(&self.shared.state).halt();
        if let Some(handle) = lock(&self.task).take() {
            handle.abort();
        }
        if was_playing {
            log::info!("Stopped live chat polling for {}", self.shared.video_id);
        }
        was_playing
    }

    pub fn is_playing(&self) -> bool {
        lock(&self.shared.state).is_playing
    }

    /// 現在の状態のスナップショット
    pub fn state(&self) -> PollState {
        lock(&self.shared.state).clone()
    }

    pub fn continuation(&self) -> String {
        lock(&self.shared.state).continuation.clone()
    }

    /// 配信待ちのコメント数
    pub fn pending_emissions(&self) -> usize {
        lock(&self.shared.scheduler).pending_count()
    }

    /// 1回分のリクエストと処理を実行（ループを使わず手動で進める場合）
    pub async fn poll_once(&self) -> Result<PollOutcome, YouTubeError> {
        self.shared.poll_once().await
    }
}

impl<T: ChatTransport> Drop for ContinuationPoller<T> {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.task).take() {
            handle.abort();
        }
        lock(&self.shared.scheduler).cancel_all();
    }
}

impl<T: ChatTransport> std::fmt::Debug for ContinuationPoller<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContinuationPoller")
            .field("video_id", &self.shared.video_id)
            .field("state", &*lock(&self.shared.state))
            .finish()
    }
}

impl<T: ChatTransport> PollerShared<T> {
    fn is_current(&self, generation: u64) -> bool {
        lock(&self.state).is_current(generation)
    }

    /// リクエストを送り、レスポンスを処理する
    ///
    /// 通信エラーのみErrを返す。レスポンスの形の問題はログに残して続行する。
    async fn poll_once(&self) -> Result<PollOutcome, YouTubeError> {
        let (endpoint, body) = {
            let state = lock(&self.state);
            let endpoint = if state.is_replay {
                LIVE_CHAT_REPLAY_ENDPOINT
            } else {
                LIVE_CHAT_ENDPOINT
            };
            (endpoint, build_poll_body(&state, now_ms()))
        };

        match self.transport.post(endpoint, body).await {
            Ok(response) => Ok(self.handle_response(response)),
            Err(e) if e.is_transport() => Err(e),
            Err(e) => {
                log::warn!("Unreadable live chat response for {}: {}", self.video_id, e);
                let mut outcome = PollOutcome::default();
                self.finish_without_continuation(&mut outcome);
                Ok(outcome)
            }
        }
    }

    /// プロトコルエラー: トークンは据え置き、デフォルト間隔で再ポーリング
    fn finish_without_continuation(&self, outcome: &mut PollOutcome) {
        let mut state = lock(&self.state);
        state.record_protocol_error(&self.config);
        outcome.protocol_error = true;
        outcome.next_delay = state.next_poll_delay();
    }

    fn handle_response(&self, response: Value) -> PollOutcome {
        let (actions, variants) = match serde_json::from_value::<InnerTubeChatResponse>(response) {
            Ok(decoded) => decoded.into_parts(),
            Err(e) => {
                log::warn!("Undecodable live chat response: {}", e);
                (vec![], None)
            }
        };

        let (is_replay, start_time_ms) = {
            let state = lock(&self.state);
            (state.is_replay, state.start_time_ms)
        };

        let mut outcome = PollOutcome::default();

        let extractor = ActionExtractor::new(is_replay, start_time_ms);
        for action in extractor.extract(actions) {
            let entry = match parse_chat_entry(action) {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Skipping chat action: {}", e);
                    outcome.malformed += 1;
                    continue;
                }
            };

            if !lock(&self.dedup).accept(&entry) {
                log::debug!("Duplicate chat skipped: {}", entry.id());
                outcome.duplicates += 1;
                continue;
            }

            let events = Arc::clone(&self.events);
            lock(&self.scheduler).schedule(entry, move |entry| {
                events.publish(LiveChatEvent::Chat { chat: entry });
            });
            outcome.scheduled += 1;
        }

        match variants.and_then(|v| v.select(is_replay)) {
            Some(next) => {
                log::debug!("Next continuation: {:?} (timeout: {:?})", next.kind, next.timeout_ms);
                let mut state = lock(&self.state);
                state.apply_continuation(&next, &self.config);
                outcome.next_delay = state.next_poll_delay();
            }
            None => {
                log::warn!(
                    "{} for {}, keeping previous token",
                    YouTubeError::MissingContinuation,
                    self.video_id
                );
                self.finish_without_continuation(&mut outcome);
            }
        }
        outcome
    }
}

/// リクエストボディを構築
fn build_poll_body(state: &PollState, now_ms: i64) -> Value {
    json!({
        "continuation": state.continuation,
        "currentPlayerState": {
            "playerOffsetMs": state.player_offset_ms(now_ms).to_string()
        }
    })
}

/// ポーリングループ（内部実装）
///
/// 世代が変わる（stop/再start）か、通信エラーが上限に達するまで続ける。
async fn run_poll_loop<T: ChatTransport>(shared: Arc<PollerShared<T>>, generation: u64) {
    let mut backoff = ExponentialBackoff::from_config(&shared.config);
    log::debug!("Polling loop {} started for {}", generation, shared.video_id);

    while shared.is_current(generation) {
        match shared.poll_once().await {
            Ok(outcome) => {
                if !outcome.protocol_error {
                    backoff.reset();
                }
                if outcome.scheduled > 0 {
                    log::debug!(
                        "{} new chats, {} duplicates, next poll in {:?}",
                        outcome.scheduled,
                        outcome.duplicates,
                        outcome.next_delay
                    );
                }
                sleep(outcome.next_delay).await;
            }
            Err(e) => {
                let delay = backoff.next_delay();
                if backoff.has_exceeded_max_attempts() {
                    log::error!(
                        "Live chat polling gave up after {} failures: {}",
                        backoff.attempt_count(),
                        e
                    );
                    let halted = {
                        let mut state = lock(&shared.state);
                        state.is_current(generation) && state.halt()
                    };
                    if halted {
                        shared.events.publish(LiveChatEvent::Stopped {
                            reason: format!("request failed repeatedly: {}", e),
                        });
                    }
                    break;
                }

                log::warn!("Live chat request failed: {} (retrying in {:?})", e, delay);
                shared.events.publish(LiveChatEvent::Error {
                    message: e.to_string(),
                    retrying: true,
                });
                sleep(delay).await;
            }
        }
    }

    log::debug!("Polling loop {} ended for {}", generation, shared.video_id);
}
