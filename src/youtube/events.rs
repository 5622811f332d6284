use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use super::types::ChatEntry;

/// イベント種別（購読のキー）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiveChatEventKind {
    Chat,
    Error,
    Stopped,
}

/// ポーラーから発行されるイベント
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LiveChatEvent {
    /// 新しいコメント（重複排除・時刻調整済み）
    #[serde(rename = "chat")]
    Chat { chat: ChatEntry },

    /// 通信エラー（retryingがtrueなら自動再試行する）
    #[serde(rename = "error")]
    Error { message: String, retrying: bool },

    /// ポーリング停止（再試行上限到達など）
    #[serde(rename = "stopped")]
    Stopped { reason: String },
}

impl LiveChatEvent {
    pub fn kind(&self) -> LiveChatEventKind {
        match self {
            LiveChatEvent::Chat { .. } => LiveChatEventKind::Chat,
            LiveChatEvent::Error { .. } => LiveChatEventKind::Error,
            LiveChatEvent::Stopped { .. } => LiveChatEventKind::Stopped,
        }
    }
}

pub type EventHandler = Arc<dyn Fn(&LiveChatEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    kind: LiveChatEventKind,
    handler: EventHandler,
}

/// イベントの購読・発行チャネル
///
/// ポーラーはこれを保持してイベントを発行する。
/// ハンドラはロック解放後に呼ぶので、ハンドラ内から購読・解除してもデッドロックしない。
#[derive(Default)]
pub struct EventChannel {
    next_id: AtomicU64,
    subscriptions: RwLock<Vec<Subscription>>,
}

impl EventChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// 指定種別のイベントを購読
    pub fn subscribe<F>(&self, kind: LiveChatEventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&LiveChatEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        match self.subscriptions.write() {
            Ok(mut subs) => subs.push(Subscription {
                id,
                kind,
                handler: Arc::new(handler),
            }),
            Err(e) => log::error!("Event subscriptions lock is poisoned: {}", e),
        }
        id
    }

    /// 購読を解除（存在しなければfalse）
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        match self.subscriptions.write() {
            Ok(mut subs) => {
                let before = subs.len();
                subs.retain(|s| s.id != id);
                subs.len() != before
            }
            Err(e) => {
                log::error!("Event subscriptions lock is poisoned: {}", e);
                false
            }
        }
    }

    /// イベントを発行し、呼び出したハンドラ数を返す
    pub fn publish(&self, event: LiveChatEvent) -> usize {
        let kind = event.kind();
        let handlers: Vec<EventHandler> = match self.subscriptions.read() {
            Ok(subs) => subs
                .iter()
                .filter(|s| s.kind == kind)
                .map(|s| Arc::clone(&s.handler))
                .collect(),
            Err(e) => {
                log::error!("Event subscriptions lock is poisoned: {}", e);
                return 0;
            }
        };

        for handler in &handlers {
            handler(&event);
        }
        handlers.len()
    }

    pub fn subscriber_count(&self, kind: LiveChatEventKind) -> usize {
        self.subscriptions
            .read()
            .map(|subs| subs.iter().filter(|s| s.kind == kind).count())
            .unwrap_or(0)
    }
}

impl std::fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.subscriptions.read().map(|s| s.len()).unwrap_or(0);
        f.debug_struct("EventChannel")
            .field("subscriptions", &count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_publish_routes_by_kind() {
        let channel = EventChannel::new();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        channel.subscribe(LiveChatEventKind::Error, move |event| {
            if let LiveChatEvent::Error { message, .. } = event {
                sink.lock().unwrap().push(message.clone());
            }
        });

        let delivered = channel.publish(LiveChatEvent::Stopped {
            reason: "done".to_string(),
        });
        assert_eq!(delivered, 0);

        let delivered = channel.publish(LiveChatEvent::Error {
            message: "timeout".to_string(),
            retrying: true,
        });
        assert_eq!(delivered, 1);
        assert_eq!(*errors.lock().unwrap(), vec!["timeout".to_string()]);
    }

    #[test]
    fn test_unsubscribe() {
        let channel = EventChannel::new();
        let id = channel.subscribe(LiveChatEventKind::Stopped, |_| {});
        channel.subscribe(LiveChatEventKind::Stopped, |_| {});
        assert_eq!(channel.subscriber_count(LiveChatEventKind::Stopped), 2);

        assert!(channel.unsubscribe(id));
        assert!(!channel.unsubscribe(id));
        assert_eq!(channel.subscriber_count(LiveChatEventKind::Stopped), 1);
    }

    #[test]
    fn test_handler_can_subscribe_during_publish() {
        let channel = Arc::new(EventChannel::new());
        let inner = Arc::clone(&channel);
        channel.subscribe(LiveChatEventKind::Stopped, move |_| {
            inner.subscribe(LiveChatEventKind::Chat, |_| {});
        });

        channel.publish(LiveChatEvent::Stopped {
            reason: "test".to_string(),
        });
        assert_eq!(channel.subscriber_count(LiveChatEventKind::Chat), 1);
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(LiveChatEvent::Error {
            message: "boom".to_string(),
            retrying: false,
        })
        .unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["retrying"], false);
    }
}
