// =============================================================================
// 共通設定・定数モジュール
// =============================================================================
// InnerTubeクライアントとチャットポーラーで使用する設定値・定数を定義
// =============================================================================

use serde::Deserialize;
use std::time::Duration;

/// HTTPリクエストのデフォルトタイムアウト（秒）
///
/// InnerTube APIへのリクエストで使用。
/// ネットワーク状況が悪い場合でも適切にタイムアウトし、
/// ポーリングループが応答待ちで停滞しないようにする。
pub const HTTP_TIMEOUT_SECS: u64 = 10;

/// HTTPリクエストのデフォルトタイムアウト（Duration）
pub fn http_timeout() -> Duration {
    Duration::from_secs(HTTP_TIMEOUT_SECS)
}

/// InnerTubeのベースURL
pub const DEFAULT_BASE_URL: &str = "https://www.youtube.com";

/// InnerTubeクライアントバージョン
/// YouTube側で定期的に更新されるため、必要に応じて更新すること
pub const DEFAULT_CLIENT_VERSION: &str = "2.20231219.01.00";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// 環境変数プレフィックス
const ENV_PREFIX: &str = "YT_LIVE_CHAT_";

/// InnerTube APIクライアントの設定
///
/// 部分的な設定ドキュメントからも読み込めるよう、全フィールドにデフォルト値を持つ。
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InnerTubeConfig {
    pub base_url: String,
    pub client_name: String,
    pub client_version: String,
    pub hl: String,
    pub gl: String,
    pub user_agent: String,
    /// INNERTUBE_API_KEY（ページから取得できた場合はそちらを優先）
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for InnerTubeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            client_name: "WEB".to_string(),
            client_version: DEFAULT_CLIENT_VERSION.to_string(),
            hl: "en".to_string(),
            gl: "US".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            api_key: None,
            timeout_secs: HTTP_TIMEOUT_SECS,
        }
    }
}

impl InnerTubeConfig {
    /// デフォルト設定に環境変数（YT_LIVE_CHAT_*）の上書きを適用
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// 任意のルックアップ関数で設定を上書き
    ///
    /// 空文字列は未設定として扱う。
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|v| !v.trim().is_empty())
        };

        if let Some(v) = get("BASE_URL") {
            self.base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("CLIENT_VERSION") {
            self.client_version = v;
        }
        if let Some(v) = get("HL") {
            self.hl = v;
        }
        if let Some(v) = get("GL") {
            self.gl = v;
        }
        if let Some(v) = get("API_KEY") {
            self.api_key = Some(v);
        }
        if let Some(v) = get("TIMEOUT_SECS") {
            match v.parse() {
                Ok(secs) => self.timeout_secs = secs,
                Err(e) => log::warn!("Ignoring invalid {}TIMEOUT_SECS '{}': {}", ENV_PREFIX, v, e),
            }
        }
        self
    }

    /// リクエストタイムアウト（0ならデフォルト値）
    pub fn timeout(&self) -> Duration {
        match self.timeout_secs {
            0 => http_timeout(),
            secs => Duration::from_secs(secs),
        }
    }
}

/// チャットポーラーの設定
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PollerConfig {
    /// レスポンスにtimeoutMsが無い場合・プロトコルエラー時のポーリング間隔
    pub default_poll_interval_ms: u64,
    /// timeoutMsの下限（サーバー過負荷防止）
    pub min_poll_interval_ms: u64,
    /// timeoutMsの上限（極端に大きな値へのガード）
    pub max_poll_interval_ms: u64,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    /// 連続した通信エラーの許容回数。超えるとポーリングを停止する
    pub max_retry_attempts: u32,
    pub retry_jitter: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            default_poll_interval_ms: 1000,
            min_poll_interval_ms: 500,
            max_poll_interval_ms: 30_000,
            retry_base_delay_ms: 1000,
            retry_max_delay_ms: 60_000,
            max_retry_attempts: 10,
            retry_jitter: true,
        }
    }
}
