//! InnerTube API 固有の型定義
//!
//! アクションはレスポンス全体のデコードを巻き込まないよう`serde_json::Value`のまま受け取り、
//! 分類後にレンダラー単位で型付きデコードする。

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Continuation種別
///
/// 置き換えの優先順位: `Timed` / `Replay` < `Invalidation` < `PlayerSeek`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinuationType {
    /// timedContinuationData - ライブの通常継続
    Timed,
    /// liveChatReplayContinuationData - リプレイの通常継続
    Replay,
    /// invalidationContinuationData - 通常継続より優先
    Invalidation,
    /// playerSeekContinuationData - シーク時、最優先
    PlayerSeek,
}

/// InnerTube APIレスポンス（ライブチャット取得）
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InnerTubeChatResponse {
    pub continuation_contents: Option<ContinuationContents>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuationContents {
    pub live_chat_continuation: Option<LiveChatContinuation>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LiveChatContinuation {
    #[serde(default)]
    pub actions: Vec<Value>,
    #[serde(default)]
    pub continuations: Vec<Value>,
}

/// continuations[0]に含まれる各種Continuationデータ
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuationVariants {
    pub timed_continuation_data: Option<ContinuationData>,
    pub live_chat_replay_continuation_data: Option<ContinuationData>,
    pub invalidation_continuation_data: Option<ContinuationData>,
    pub player_seek_continuation_data: Option<ContinuationData>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuationData {
    pub continuation: String,
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub timeout_ms: Option<u64>,
}

/// 次回リクエスト用に選択されたContinuation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextContinuation {
    pub token: String,
    pub timeout_ms: Option<u64>,
    pub kind: ContinuationType,
}

impl NextContinuation {
    fn from_data(data: &ContinuationData, kind: ContinuationType) -> Self {
        Self {
            token: data.continuation.clone(),
            timeout_ms: data.timeout_ms,
            kind,
        }
    }
}

impl ContinuationVariants {
    /// 次回用のContinuationを優先順位に従って選択
    ///
    /// 通常継続はセッション種別に合うもの（リプレイならreplay、ライブならtimed）を優先し、
    /// invalidationがあれば置き換え、playerSeekがあればさらに置き換える。
    pub fn select(&self, is_replay: bool) -> Option<NextContinuation> {
        let timed = self
            .timed_continuation_data
            .as_ref()
            .map(|d| NextContinuation::from_data(d, ContinuationType::Timed));
        let replay = self
            .live_chat_replay_continuation_data
            .as_ref()
            .map(|d| NextContinuation::from_data(d, ContinuationType::Replay));

        let mut selected = if is_replay {
            replay.or(timed)
        } else {
            timed.or(replay)
        };

        if let Some(data) = &self.invalidation_continuation_data {
            selected = Some(NextContinuation::from_data(data, ContinuationType::Invalidation));
        }
        if let Some(data) = &self.player_seek_continuation_data {
            selected = Some(NextContinuation::from_data(data, ContinuationType::PlayerSeek));
        }

        selected
    }
}

impl InnerTubeChatResponse {
    /// アクション一覧とcontinuations[0]に分解
    ///
    /// continuations[0]がデコードできない場合はNone（プロトコルエラーとして扱う）。
    pub fn into_parts(self) -> (Vec<Value>, Option<ContinuationVariants>) {
        let Some(continuation) = self
            .continuation_contents
            .and_then(|c| c.live_chat_continuation)
        else {
            return (vec![], None);
        };

        let variants = continuation.continuations.into_iter().next().and_then(|raw| {
            serde_json::from_value::<ContinuationVariants>(raw)
                .map_err(|e| log::debug!("Undecodable continuation entry: {}", e))
                .ok()
        });

        (continuation.actions, variants)
    }
}

/// テキストメッセージレンダラー
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatTextMessageRenderer {
    pub id: String,
    pub message: Option<MessageContent>,
    pub author_name: Option<SimpleText>,
    pub author_photo: Option<ThumbnailContainer>,
    pub author_external_channel_id: Option<String>,
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub timestamp_usec: Option<i64>,
    pub author_badges: Option<Vec<AuthorBadge>>,
}

/// スーパーチャットレンダラー
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatPaidMessageRenderer {
    #[serde(flatten)]
    pub base: LiveChatTextMessageRenderer,
    pub purchase_amount_text: Option<SimpleText>,
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub header_background_color: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub header_text_color: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub body_background_color: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub body_text_color: Option<i64>,
}

/// メッセージ内容（runs配列を含む）
#[derive(Debug, Deserialize)]
pub struct MessageContent {
    #[serde(default)]
    pub runs: Vec<RunItem>,
}

/// runs配列の要素（テキストまたは絵文字）
#[derive(Debug, Deserialize)]
pub struct RunItem {
    pub text: Option<String>,
    pub emoji: Option<InnerTubeEmoji>,
}

/// InnerTube絵文字情報
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InnerTubeEmoji {
    pub emoji_id: String,
    pub shortcuts: Option<Vec<String>>,
    pub image: Option<ThumbnailContainer>,
    pub is_custom_emoji: Option<bool>,
}

/// サムネイルコンテナ
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThumbnailContainer {
    #[serde(default)]
    pub thumbnails: Vec<RawThumbnail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawThumbnail {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// シンプルテキスト
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleText {
    pub simple_text: Option<String>,
    pub runs: Option<Vec<RunItem>>,
}

impl SimpleText {
    /// テキスト内容を取得（simpleTextが無ければrunsを連結）
    pub fn get_text(&self) -> Option<String> {
        if let Some(text) = &self.simple_text {
            return Some(text.clone());
        }
        self.runs
            .as_ref()
            .map(|runs| runs.iter().filter_map(|r| r.text.as_deref()).collect())
    }
}

/// 投稿者バッジ
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorBadge {
    pub live_chat_author_badge_renderer: Option<BadgeRenderer>,
}

/// バッジレンダラー
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeRenderer {
    pub custom_thumbnail: Option<ThumbnailContainer>,
    pub icon: Option<BadgeIcon>,
    pub tooltip: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeIcon {
    pub icon_type: String,
}

/// 文字列・数値どちらで来ても整数として読む
/// （timestampUsecやvideoOffsetTimeMsecは文字列で返される）
pub fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn de_opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => value_as_i64(&v)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("expected integer, got {}", v))),
    }
}

fn de_opt_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(de_opt_i64(deserializer)?.and_then(|v| u64::try_from(v).ok()))
}
