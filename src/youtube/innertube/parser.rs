//! InnerTube レスポンスパーサー

use super::extractor::TaggedAction;
use super::types::*;
use crate::youtube::errors::YouTubeError;
use crate::youtube::types::{
    Author, Badge, ChatEntry, ChatKind, ChatRecord, Emote, MessageSpan, SuperChatColors,
    SuperChatRecord, Thumbnail, Thumbnails,
};

/// タグ付きレンダラー1件をChatEntryに変換
///
/// 失敗はこのアクション単体のエラーとして返す（バッチ全体は止めない）。
pub fn parse_chat_entry(action: TaggedAction) -> Result<ChatEntry, YouTubeError> {
    match action.kind {
        ChatKind::Chat => {
            let renderer: LiveChatTextMessageRenderer = serde_json::from_value(action.renderer)
                .map_err(|e| YouTubeError::MalformedAction(format!("text message: {}", e)))?;
            parse_text_message(renderer).map(ChatEntry::Chat)
        }
        ChatKind::SuperChat => {
            let renderer: LiveChatPaidMessageRenderer = serde_json::from_value(action.renderer)
                .map_err(|e| YouTubeError::MalformedAction(format!("paid message: {}", e)))?;
            parse_paid_message(renderer).map(ChatEntry::SuperChat)
        }
    }
}

/// テキストメッセージをパース
fn parse_text_message(msg: LiveChatTextMessageRenderer) -> Result<ChatRecord, YouTubeError> {
    let author = parse_author(&msg)?;
    let timestamp_usec = msg.timestamp_usec.ok_or_else(|| {
        YouTubeError::MalformedAction(format!("{}: missing timestampUsec", msg.id))
    })?;

    let mut builder = MessageBuilder::default();
    if let Some(content) = &msg.message {
        for run in &content.runs {
            builder.push_run(run).map_err(|reason| {
                YouTubeError::MalformedAction(format!("{}: {}", msg.id, reason))
            })?;
        }
    }

    Ok(ChatRecord {
        id: msg.id,
        author,
        message: builder.message,
        message_spans: builder.spans,
        emotes: builder.emotes,
        badges: parse_badges(msg.author_badges.as_deref().unwrap_or_default()),
        timestamp_usec,
    })
}

/// スーパーチャットをパース
fn parse_paid_message(msg: LiveChatPaidMessageRenderer) -> Result<SuperChatRecord, YouTubeError> {
    let purchase_amount = msg
        .purchase_amount_text
        .as_ref()
        .and_then(SimpleText::get_text)
        .unwrap_or_default();

    let colors = SuperChatColors {
        header_background: msg.header_background_color.unwrap_or_default(),
        header_text: msg.header_text_color.unwrap_or_default(),
        body_background: msg.body_background_color.unwrap_or_default(),
        body_text: msg.body_text_color.unwrap_or_default(),
    };

    Ok(SuperChatRecord {
        chat: parse_text_message(msg.base)?,
        purchase_amount,
        colors,
    })
}

fn parse_author(msg: &LiveChatTextMessageRenderer) -> Result<Author, YouTubeError> {
    let name = msg
        .author_name
        .as_ref()
        .and_then(SimpleText::get_text)
        .ok_or_else(|| YouTubeError::MalformedAction(format!("{}: missing authorName", msg.id)))?;

    Ok(Author {
        id: msg.author_external_channel_id.clone().unwrap_or_default(),
        name,
        thumbnails: msg
            .author_photo
            .as_ref()
            .map(to_thumbnails)
            .unwrap_or_default(),
    })
}

/// 投稿者バッジを変換
///
/// カスタムサムネイルがあればサムネイル、なければアイコン種別を記録する。
fn parse_badges(badges: &[AuthorBadge]) -> Vec<Badge> {
    badges
        .iter()
        .filter_map(|badge| badge.live_chat_author_badge_renderer.as_ref())
        .map(|renderer| {
            let name = renderer.tooltip.clone().unwrap_or_default();
            match &renderer.custom_thumbnail {
                Some(custom) => Badge {
                    name,
                    thumbnails: Some(to_thumbnails(custom)),
                    icon: None,
                },
                None => Badge {
                    name,
                    thumbnails: None,
                    icon: renderer.icon.as_ref().map(|i| i.icon_type.clone()),
                },
            }
        })
        .collect()
}

fn to_thumbnails(container: &ThumbnailContainer) -> Thumbnails {
    Thumbnails(
        container
            .thumbnails
            .iter()
            .map(|t| Thumbnail {
                url: normalize_url(&t.url),
                width: t.width.unwrap_or_default(),
                height: t.height.unwrap_or_default(),
            })
            .collect(),
    )
}

/// プロトコル相対URL（//yt3.ggpht.com/...）をhttpsに補完
fn normalize_url(url: &str) -> String {
    if url.starts_with("//") {
        format!("https:{}", url)
    } else {
        url.to_string()
    }
}

/// runsからmessage・spans・emotesを組み立てる
///
/// emoteの区間はmessageの文字数（char単位）で記録する。
#[derive(Debug, Default)]
struct MessageBuilder {
    message: String,
    char_len: usize,
    spans: Vec<MessageSpan>,
    emotes: Vec<Emote>,
}

impl MessageBuilder {
    fn push_run(&mut self, run: &RunItem) -> Result<(), &'static str> {
        if let Some(emoji) = &run.emoji {
            self.push_emoji(emoji);
            return Ok(());
        }
        match &run.text {
            Some(text) => {
                self.push_text(text);
                Ok(())
            }
            None => Err("run without text or emoji"),
        }
    }

    fn push_text(&mut self, text: &str) {
        self.message.push_str(text);
        self.char_len += text.chars().count();
        self.spans.push(MessageSpan::Text {
            text: text.to_string(),
        });
    }

    fn push_emoji(&mut self, emoji: &InnerTubeEmoji) {
        // ショートカットが無い絵文字（Unicode絵文字）はemojiIdをそのまま表示
        let label = emoji
            .shortcuts
            .as_ref()
            .and_then(|s| s.first())
            .cloned()
            .unwrap_or_else(|| emoji.emoji_id.clone());

        let start_index = self.char_len;
        let end_index = start_index + label.chars().count();

        let emote = Emote {
            id: emoji.emoji_id.clone(),
            thumbnails: emoji.image.as_ref().map(to_thumbnails).unwrap_or_default(),
            start_index,
            end_index,
            is_custom: emoji.is_custom_emoji.unwrap_or(false),
        };

        self.message.push_str(&label);
        self.char_len = end_index;
        self.emotes.push(emote.clone());
        self.spans.push(MessageSpan::Emote { emote });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn tagged(kind: ChatKind, renderer: Value) -> TaggedAction {
        TaggedAction {
            kind,
            renderer,
            video_offset_ms: None,
        }
    }

    fn text_renderer(id: &str, runs: Value) -> Value {
        json!({
            "id": id,
            "message": { "runs": runs },
            "authorName": { "simpleText": "Test User" },
            "authorPhoto": { "thumbnails": [
                { "url": "//yt3.ggpht.com/photo=s32", "width": 32, "height": 32 },
                { "url": "https://yt3.ggpht.com/photo=s64", "width": 64, "height": 64 }
            ]},
            "authorExternalChannelId": "UC123",
            "timestampUsec": "1703145600000000"
        })
    }

    fn parse_text(runs: Value) -> ChatRecord {
        match parse_chat_entry(tagged(ChatKind::Chat, text_renderer("a1", runs))).unwrap() {
            ChatEntry::Chat(chat) => chat,
            other => panic!("unexpected entry: {:?}", other),
        }
    }

    #[test]
    fn test_parse_plain_and_paid() {
        let plain = parse_chat_entry(tagged(
            ChatKind::Chat,
            text_renderer("a1", json!([{ "text": "hi" }])),
        ))
        .unwrap();
        assert_eq!(plain.kind(), ChatKind::Chat);
        assert_eq!(plain.record().message, "hi");

        let mut paid_renderer = text_renderer("a2", json!([{ "text": "thanks" }]));
        paid_renderer["purchaseAmountText"] = json!({ "simpleText": "$2.00" });
        paid_renderer["headerBackgroundColor"] = json!(4_291_821_568_i64);
        paid_renderer["headerTextColor"] = json!(4_294_967_295_i64);
        paid_renderer["bodyBackgroundColor"] = json!(4_293_271_831_i64);
        paid_renderer["bodyTextColor"] = json!(4_294_967_295_i64);

        let paid = parse_chat_entry(tagged(ChatKind::SuperChat, paid_renderer)).unwrap();
        let sc = paid.as_super_chat().unwrap();
        assert_eq!(sc.chat.id, "a2");
        assert_eq!(sc.chat.message, "thanks");
        assert_eq!(sc.purchase_amount, "$2.00");
        assert_eq!(sc.colors.header_background, 4_291_821_568);
        assert_eq!(sc.colors.body_text, 4_294_967_295);
    }

    #[test]
    fn test_parse_author() {
        let chat = parse_text(json!([{ "text": "hi" }]));
        assert_eq!(chat.author.id, "UC123");
        assert_eq!(chat.author.name, "Test User");
        assert_eq!(chat.author.thumbnails.len(), 2);
        assert_eq!(chat.author.thumbnails.0[0].url, "https://yt3.ggpht.com/photo=s32");
        assert_eq!(chat.timestamp_usec, 1_703_145_600_000_000);
    }

    #[test]
    fn test_emoji_only_message() {
        let chat = parse_text(json!([
            { "emoji": { "emojiId": "e1", "shortcuts": ["smile"] } }
        ]));
        assert_eq!(chat.message, "smile");
        assert_eq!(chat.emotes.len(), 1);
        assert_eq!(chat.emotes[0].id, "e1");
        assert_eq!(chat.emotes[0].start_index, 0);
        assert_eq!(chat.emotes[0].end_index, 5);
    }

    #[test]
    fn test_emoji_without_shortcut_uses_id() {
        let chat = parse_text(json!([
            { "text": "nice " },
            { "emoji": { "emojiId": "👍", "image": { "thumbnails": [{ "url": "https://e/1.png" }] } } }
        ]));
        assert_eq!(chat.message, "nice 👍");
        assert_eq!(chat.emotes[0].start_index, 5);
        assert_eq!(chat.emotes[0].end_index, 6);
        assert_eq!(chat.emotes[0].thumbnails.0[0].width, 0);
    }

    #[test]
    fn test_emote_spans_match_message() {
        let chat = parse_text(json!([
            { "text": "こんにちは" },
            { "emoji": { "emojiId": "UCx/abc", "shortcuts": [":_草:", ":_kusa:"], "isCustomEmoji": true } },
            { "text": " and " },
            { "emoji": { "emojiId": "e2", "shortcuts": [":wave:"] } },
            { "emoji": { "emojiId": "e3", "shortcuts": [] } }
        ]));

        assert_eq!(chat.message, "こんにちは:_草: and :wave:e3");
        let labels: Vec<String> = chat.emotes.iter().map(|e| chat.emote_text(e)).collect();
        assert_eq!(labels, vec![":_草:", ":wave:", "e3"]);

        // 区間は重ならず、出現順に並ぶ
        for pair in chat.emotes.windows(2) {
            assert!(pair[0].end_index <= pair[1].start_index);
        }
        assert!(chat.emotes[0].is_custom);
        assert!(!chat.emotes[1].is_custom);

        // spansを連結するとmessageになる
        let rebuilt: String = chat
            .message_spans
            .iter()
            .map(|span| match span {
                MessageSpan::Text { text } => text.clone(),
                MessageSpan::Emote { emote } => chat.emote_text(emote),
            })
            .collect();
        assert_eq!(rebuilt, chat.message);
        assert_eq!(chat.message_spans.len(), 5);
    }

    #[test]
    fn test_missing_message_is_empty() {
        let mut renderer = text_renderer("a1", json!([]));
        renderer.as_object_mut().unwrap().remove("message");
        let entry = parse_chat_entry(tagged(ChatKind::SuperChat, renderer)).unwrap();
        assert_eq!(entry.record().message, "");
        assert!(entry.record().message_spans.is_empty());
        // 金額が無ければ空文字列
        assert_eq!(entry.as_super_chat().unwrap().purchase_amount, "");
    }

    #[test]
    fn test_missing_author_name_is_error() {
        let mut renderer = text_renderer("a1", json!([{ "text": "hi" }]));
        renderer.as_object_mut().unwrap().remove("authorName");
        let result = parse_chat_entry(tagged(ChatKind::Chat, renderer));
        assert!(matches!(result, Err(YouTubeError::MalformedAction(_))));
    }

    #[test]
    fn test_missing_timestamp_is_error() {
        let mut renderer = text_renderer("a1", json!([{ "text": "hi" }]));
        renderer.as_object_mut().unwrap().remove("timestampUsec");
        assert!(parse_chat_entry(tagged(ChatKind::Chat, renderer)).is_err());
    }

    #[test]
    fn test_malformed_run_is_error() {
        let result = parse_chat_entry(tagged(
            ChatKind::Chat,
            text_renderer("a1", json!([{ "text": "ok" }, { "navigationEndpoint": {} }])),
        ));
        assert!(matches!(result, Err(YouTubeError::MalformedAction(_))));
    }

    #[test]
    fn test_wrong_field_type_is_error() {
        let mut renderer = text_renderer("a1", json!([{ "text": "hi" }]));
        renderer["message"] = json!("not an object");
        assert!(parse_chat_entry(tagged(ChatKind::Chat, renderer)).is_err());
    }

    #[test]
    fn test_author_name_from_runs() {
        let mut renderer = text_renderer("a1", json!([{ "text": "hi" }]));
        renderer["authorName"] = json!({ "runs": [{ "text": "@" }, { "text": "handle" }] });
        let entry = parse_chat_entry(tagged(ChatKind::Chat, renderer)).unwrap();
        assert_eq!(entry.record().author.name, "@handle");
    }

    #[test]
    fn test_parse_badges() {
        let mut renderer = text_renderer("a1", json!([{ "text": "hi" }]));
        renderer["authorBadges"] = json!([
            { "liveChatAuthorBadgeRenderer": {
                "icon": { "iconType": "MODERATOR" },
                "tooltip": "Moderator"
            }},
            { "liveChatAuthorBadgeRenderer": {
                "customThumbnail": { "thumbnails": [{ "url": "https://e/badge.png", "width": 16, "height": 16 }] },
                "tooltip": "Member (1 month)"
            }},
            { "somethingElse": {} }
        ]);

        let entry = parse_chat_entry(tagged(ChatKind::Chat, renderer)).unwrap();
        let badges = &entry.record().badges;
        assert_eq!(badges.len(), 2);
        assert_eq!(badges[0].name, "Moderator");
        assert_eq!(badges[0].icon.as_deref(), Some("MODERATOR"));
        assert!(badges[0].thumbnails.is_none());
        assert_eq!(badges[1].name, "Member (1 month)");
        assert!(badges[1].icon.is_none());
        assert_eq!(badges[1].thumbnails.as_ref().unwrap().0[0].width, 16);
    }

    #[test]
    fn test_numeric_timestamp_accepted() {
        let mut renderer = text_renderer("a1", json!([{ "text": "hi" }]));
        renderer["timestampUsec"] = json!(1_000_000);
        let entry = parse_chat_entry(tagged(ChatKind::Chat, renderer)).unwrap();
        assert_eq!(entry.timestamp_usec(), 1_000_000);
    }
}
