//! InnerTube API クライアント実装

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};
use std::future::Future;

use crate::config::InnerTubeConfig;
use crate::youtube::errors::YouTubeError;

pub const LIVE_CHAT_ENDPOINT: &str = "/youtubei/v1/live_chat/get_live_chat";
pub const LIVE_CHAT_REPLAY_ENDPOINT: &str = "/youtubei/v1/live_chat/get_live_chat_replay";

/// continuationトークン抽出用の最小長さ
/// 有効なcontinuationトークンは通常100文字以上のBase64エンコード文字列
const MIN_CONTINUATION_LENGTH: usize = 50;

static RELOAD_CONTINUATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""reloadContinuationData"\s*:\s*\{\s*"continuation"\s*:\s*"([^"]+)""#)
        .expect("Failed to compile reloadContinuationData regex")
});

static CONTINUATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""continuation"\s*:\s*"([^"]+)""#).expect("Failed to compile continuation regex")
});

static API_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""INNERTUBE_API_KEY"\s*:\s*"([^"]+)""#).expect("Failed to compile API key regex")
});

/// ポーラーが使うHTTP POST機能
///
/// エンドポイントのパスとJSONボディを受け取り、レスポンスJSONを返す。
/// テストではインメモリ実装に差し替える。
pub trait ChatTransport: Send + Sync + 'static {
    fn post(
        &self,
        endpoint: &str,
        body: Value,
    ) -> impl Future<Output = Result<Value, YouTubeError>> + Send;
}

/// InnerTube APIクライアント
pub struct InnerTubeClient {
    client: Client,
    config: InnerTubeConfig,
    api_key: Option<String>,
}

impl InnerTubeClient {
    /// 新しいクライアントを作成
    ///
    /// # Errors
    /// HTTPクライアントのビルドに失敗した場合にエラーを返す
    pub fn new(config: InnerTubeConfig) -> Result<Self, YouTubeError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            api_key: config.api_key.clone(),
            client,
            config,
        })
    }

    /// 視聴ページから最初のcontinuationトークンを取得
    ///
    /// INNERTUBE_API_KEYが見つかれば以降のリクエストで使用する。
    pub async fn initialize(&mut self, video_id: &str) -> Result<String, YouTubeError> {
        let url = format!("{}/watch?v={}", self.config.base_url, video_id);
        log::info!("Fetching watch page: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(YouTubeError::ApiError(format!(
                "Failed to fetch watch page: {}",
                response.status()
            )));
        }

        let body = response.text().await?;

        if let Some(key) = Self::extract_api_key(&body) {
            self.api_key = Some(key);
        }

        let continuation =
            Self::extract_continuation(&body).ok_or(YouTubeError::InnerTubeNotInitialized)?;
        log::info!("InnerTube client initialized for video {}", video_id);
        Ok(continuation)
    }

    /// continuationトークンを抽出
    ///
    /// reloadContinuationData（チャット欄の初期トークン）を優先し、
    /// 見つからなければ任意の"continuation"にフォールバックする。
    fn extract_continuation(html: &str) -> Option<String> {
        for (label, re) in [
            ("reloadContinuationData", &*RELOAD_CONTINUATION_RE),
            ("continuation", &*CONTINUATION_RE),
        ] {
            let found = re
                .captures_iter(html)
                .filter_map(|caps| caps.get(1))
                .map(|m| m.as_str())
                .find(|token| token.len() > MIN_CONTINUATION_LENGTH);
            if let Some(token) = found {
                log::debug!("Found continuation token from {} (length: {})", label, token.len());
                return Some(token.to_string());
            }
        }

        log::warn!("No valid continuation token found in page");
        None
    }

    fn extract_api_key(html: &str) -> Option<String> {
        API_KEY_RE
            .captures(html)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        match &self.api_key {
            Some(key) => format!("{}{}?key={}", self.config.base_url, endpoint, key),
            None => format!("{}{}", self.config.base_url, endpoint),
        }
    }

    /// リクエストボディにクライアントcontextを付与
    fn build_request_body(&self, mut body: Value) -> Value {
        let context = json!({
            "client": {
                "clientName": self.config.client_name,
                "clientVersion": self.config.client_version,
                "hl": self.config.hl,
                "gl": self.config.gl
            }
        });
        if let Some(fields) = body.as_object_mut() {
            fields.entry("context").or_insert(context);
        }
        body
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }
}

impl ChatTransport for InnerTubeClient {
    async fn post(&self, endpoint: &str, body: Value) -> Result<Value, YouTubeError> {
        let url = self.endpoint_url(endpoint);
        let request_body = self.build_request_body(body);

        log::debug!("POST {}", endpoint);

        let response = self
            .client
            .post(&url)
            .header("Origin", self.config.base_url.as_str())
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            log::error!("InnerTube API error: {} - {}", status, body);
            return Err(YouTubeError::ApiError(format!("status {}", status)));
        }

        // 本文の受信失敗は通信エラー、JSONとして読めない本文はレスポンスの問題
        let text = response.text().await?;
        serde_json::from_str::<Value>(&text)
            .map_err(|e| YouTubeError::ParseError(format!("InnerTube response is not JSON: {}", e)))
    }
}

impl std::fmt::Debug for InnerTubeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InnerTubeClient")
            .field("base_url", &self.config.base_url)
            .field("has_api_key", &self.api_key.is_some())
            .finish()
    }
}
