use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// サムネイル
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

/// サムネイル一覧（サイズ違いの同一画像）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Thumbnails(pub Vec<Thumbnail>);

impl Thumbnails {
    /// 最大解像度のサムネイル
    pub fn best(&self) -> Option<&Thumbnail> {
        self.0.iter().max_by_key(|t| t.width as u64 * t.height as u64)
    }

    /// 最小解像度のサムネイル
    pub fn min(&self) -> Option<&Thumbnail> {
        self.0.iter().min_by_key(|t| t.width as u64 * t.height as u64)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// コメント投稿者
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: String,
    pub name: String,
    pub thumbnails: Thumbnails,
}

/// 投稿者名の横に表示されるバッジ
///
/// カスタムサムネイル（メンバーバッジ）があれば`thumbnails`、
/// なければアイコン種別（OWNER / MODERATOR / VERIFIED）が`icon`に入る。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnails: Option<Thumbnails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// メッセージ内の絵文字
///
/// `start_index..end_index`はmessage内の文字（char）単位の半開区間。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Emote {
    pub id: String,
    pub thumbnails: Thumbnails,
    pub start_index: usize,
    pub end_index: usize,
    pub is_custom: bool,
}

/// メッセージの構成要素（テキストまたは絵文字）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MessageSpan {
    Text { text: String },
    Emote { emote: Emote },
}

/// チャットメッセージ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRecord {
    pub id: String,
    pub author: Author,
    pub message: String,
    pub message_spans: Vec<MessageSpan>,
    pub emotes: Vec<Emote>,
    pub badges: Vec<Badge>,
    /// 投稿時刻（マイクロ秒）。リプレイでは動画オフセットから再構成した値
    pub timestamp_usec: i64,
}

impl ChatRecord {
    /// 投稿時刻をDateTime<Utc>に変換
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_micros(self.timestamp_usec).single()
    }

    /// 絵文字が占めるmessage内の文字列を取り出す
    pub fn emote_text(&self, emote: &Emote) -> String {
        self.message
            .chars()
            .skip(emote.start_index)
            .take(emote.end_index.saturating_sub(emote.start_index))
            .collect()
    }
}

/// スーパーチャットの配色（ARGB整数値そのまま）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperChatColors {
    pub header_background: i64,
    pub header_text: i64,
    pub body_background: i64,
    pub body_text: i64,
}

/// スーパーチャット
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperChatRecord {
    #[serde(flatten)]
    pub chat: ChatRecord,
    /// 通貨記号付きの金額表示（例: "NZ$2.00"）
    pub purchase_amount: String,
    pub colors: SuperChatColors,
}

impl SuperChatRecord {
    /// 金額テキストを数値部分と通貨コードに分割（例: "¥1,000" -> ("1,000", "JPY")）
    pub fn amount_and_currency(&self) -> (String, String) {
        let text = self.purchase_amount.trim();
        let currency = if text.starts_with('¥') || text.starts_with('￥') {
            "JPY"
        } else if text.starts_with('€') {
            "EUR"
        } else if text.starts_with('£') {
            "GBP"
        } else if text.starts_with('₩') {
            "KRW"
        } else if text.starts_with("CA$") {
            "CAD"
        } else if text.starts_with("A$") {
            "AUD"
        } else if text.starts_with("NT$") {
            "TWD"
        } else if text.starts_with("NZ$") {
            "NZD"
        } else {
            "USD"
        };

        let amount: String = text
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
            .collect();

        (amount, currency.to_string())
    }
}

/// レンダラー種別のタグ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChatKind {
    Chat,
    SuperChat,
}

/// `chat`イベントで配信される1件のコメント
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChatEntry {
    Chat(ChatRecord),
    SuperChat(SuperChatRecord),
}

impl ChatEntry {
    pub fn id(&self) -> &str {
        &self.record().id
    }

    /// 共通部分（スーパーチャットの場合も含む）
    pub fn record(&self) -> &ChatRecord {
        match self {
            ChatEntry::Chat(chat) => chat,
            ChatEntry::SuperChat(sc) => &sc.chat,
        }
    }

    pub fn kind(&self) -> ChatKind {
        match self {
            ChatEntry::Chat(_) => ChatKind::Chat,
            ChatEntry::SuperChat(_) => ChatKind::SuperChat,
        }
    }

    pub fn timestamp_usec(&self) -> i64 {
        self.record().timestamp_usec
    }

    pub fn as_super_chat(&self) -> Option<&SuperChatRecord> {
        match self {
            ChatEntry::SuperChat(sc) => Some(sc),
            ChatEntry::Chat(_) => None,
        }
    }
}
