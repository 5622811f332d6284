use thiserror::Error;

#[derive(Error, Debug)]
pub enum YouTubeError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("InnerTube API error: {0}")]
    ApiError(String),

    #[error("InnerTube client is not initialized - continuation token missing")]
    InnerTubeNotInitialized,

    #[error("No recognized continuation in response")]
    MissingContinuation,

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Malformed chat action: {0}")]
    MalformedAction(String),
}

impl YouTubeError {
    /// 通信層のエラーかどうか（リトライ対象）
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            YouTubeError::HttpError(_) | YouTubeError::ApiError(_)
        )
    }
}

impl From<YouTubeError> for String {
    fn from(err: YouTubeError) -> String {
        err.to_string()
    }
}
