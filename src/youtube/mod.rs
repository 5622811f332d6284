// =============================================================================
// YouTubeライブチャット取得モジュール
// =============================================================================
// InnerTube APIのcontinuationを辿ってライブ・リプレイのチャットを取得する
//
// 機能:
// - レスポンスからチャットアクションを抽出（リプレイの時刻復元を含む）
// - アクションをコメント・スーパーチャットに変換
// - IDによる重複排除
// - 投稿時刻＋遅延に合わせた配信（実時間再生）
// - continuationの優先順位に従った次回トークン選択と間隔制御
// =============================================================================

pub mod backoff;
pub mod dedup;
pub mod errors;
pub mod events;
pub mod innertube;
pub mod poller;
pub mod scheduler;
pub mod state;
pub mod types;

pub use dedup::DedupTracker;
pub use errors::YouTubeError;
pub use events::{EventChannel, LiveChatEvent, LiveChatEventKind, SubscriptionId};
pub use poller::{ContinuationPoller, LiveChatSession, PollOutcome};
pub use scheduler::PlaybackScheduler;
pub use state::PollState;
pub use types::{ChatEntry, ChatKind, ChatRecord, SuperChatRecord};
