//! InnerTube API クライアントモジュール
//!
//! YouTubeの内部APIでライブチャット（ライブ・リプレイ）を取得する。
//! 公式API Data v3と異なり、APIキー不要でクォータ制限なし。
//!
//! ## 注意事項
//! - 非公式APIのため、仕様変更のリスクあり
//! - レスポンスの形はレンダラー種別ごとに異なるため、分類してから型付きデコードする

pub mod client;
pub mod extractor;
pub mod parser;
pub mod types;

pub use client::{ChatTransport, InnerTubeClient, LIVE_CHAT_ENDPOINT, LIVE_CHAT_REPLAY_ENDPOINT};
pub use extractor::{ActionExtractor, RendererPayload, TaggedAction};
pub use parser::parse_chat_entry;
pub use types::{ContinuationType, InnerTubeChatResponse, NextContinuation};
