//! アクション抽出
//!
//! ポーリングレスポンスのアクション配列から、処理対象のレンダラーを順序どおりに取り出す。
//! リプレイ用エンベロープ（replayChatItemAction）は展開し、動画オフセットを
//! 絶対時刻のtimestampUsecに変換してから後段へ渡す。

use serde_json::Value;

use super::types::value_as_i64;
use crate::youtube::types::ChatKind;

/// アイテムの分類結果
///
/// フィールドアクセス前に必ずこの分類を通す。分類自体は失敗しない。
#[derive(Debug, Clone, PartialEq)]
pub enum RendererPayload {
    /// メンバーシップ・ステッカー等、対象外のレンダラー
    Unrecognized,
    TextMessage(Value),
    PaidMessage(Value),
}

/// 種別タグ付きのレンダラー
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedAction {
    pub kind: ChatKind,
    pub renderer: Value,
    /// リプレイエンベロープの動画オフセット（ミリ秒）
    pub video_offset_ms: Option<i64>,
}

/// addChatItemAction.itemを分類
pub fn classify_item(mut item: Value) -> RendererPayload {
    if let Some(renderer) = item.get_mut("liveChatTextMessageRenderer").map(Value::take) {
        if renderer.is_object() {
            return RendererPayload::TextMessage(renderer);
        }
    }
    if let Some(renderer) = item.get_mut("liveChatPaidMessageRenderer").map(Value::take) {
        if renderer.is_object() {
            return RendererPayload::PaidMessage(renderer);
        }
    }
    RendererPayload::Unrecognized
}

/// 動画オフセットとセッション開始時刻から絶対時刻（マイクロ秒）を計算
pub fn replay_timestamp_usec(video_offset_ms: i64, session_start_ms: i64) -> i64 {
    video_offset_ms.saturating_add(session_start_ms).saturating_mul(1000)
}

/// レスポンス1件分のアクション抽出器
#[derive(Debug, Clone, Copy)]
pub struct ActionExtractor {
    is_replay: bool,
    session_start_ms: i64,
}

impl ActionExtractor {
    pub fn new(is_replay: bool, session_start_ms: i64) -> Self {
        Self {
            is_replay,
            session_start_ms,
        }
    }

    /// アクション配列をタグ付きレンダラーのリストに変換（順序保持）
    pub fn extract(&self, actions: Vec<Value>) -> Vec<TaggedAction> {
        actions
            .into_iter()
            .flat_map(unwrap_envelope)
            .filter_map(|(action, offset)| self.tag(action, offset))
            .collect()
    }

    fn tag(&self, mut action: Value, video_offset_ms: Option<i64>) -> Option<TaggedAction> {
        let item = action
            .get_mut("addChatItemAction")
            .and_then(|a| a.get_mut("item"))
            .map(Value::take)?;

        let item_kind = describe_item(&item);
        let (kind, mut renderer) = match classify_item(item) {
            RendererPayload::TextMessage(r) => (ChatKind::Chat, r),
            RendererPayload::PaidMessage(r) => (ChatKind::SuperChat, r),
            RendererPayload::Unrecognized => {
                log::debug!("Skipping unsupported chat item: {}", item_kind);
                return None;
            }
        };

        if self.is_replay {
            if let (Some(offset), Some(fields)) = (video_offset_ms, renderer.as_object_mut()) {
                let usec = replay_timestamp_usec(offset, self.session_start_ms);
                fields.insert("timestampUsec".to_string(), Value::String(usec.to_string()));
            }
        }

        Some(TaggedAction {
            kind,
            renderer,
            video_offset_ms,
        })
    }
}

/// リプレイエンベロープを展開（エンベロープでなければそのまま）
fn unwrap_envelope(mut action: Value) -> Vec<(Value, Option<i64>)> {
    let Some(mut envelope) = action.get_mut("replayChatItemAction").map(Value::take) else {
        return vec![(action, None)];
    };

    let offset = envelope.get("videoOffsetTimeMsec").and_then(value_as_i64);
    match envelope.get_mut("actions").map(Value::take) {
        Some(Value::Array(inner)) => inner.into_iter().map(|a| (a, offset)).collect(),
        _ => {
            log::debug!("Replay envelope without inner actions");
            vec![]
        }
    }
}

/// ログ用: アイテムのレンダラー名
fn describe_item(item: &Value) -> String {
    item.as_object()
        .and_then(|o| o.keys().next().cloned())
        .unwrap_or_else(|| "<empty>".to_string())
}
