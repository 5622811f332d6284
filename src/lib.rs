//! YouTubeライブチャットのcontinuationクライアント
//!
//! 動画の視聴ページから最初のcontinuationを取得し、[`ContinuationPoller`]で
//! チャットをポーリングして、投稿時刻に合わせてイベントとして配信する。

pub mod config;
pub mod youtube;

pub use config::{InnerTubeConfig, PollerConfig};
pub use youtube::innertube::{ChatTransport, InnerTubeClient};
pub use youtube::{
    ChatEntry, ContinuationPoller, LiveChatEvent, LiveChatEventKind, LiveChatSession, YouTubeError,
};
