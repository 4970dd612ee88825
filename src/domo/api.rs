use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Token returned by Domo's client-credentials grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// A failed call to the Domo API.
///
/// `status` is `None` when the request never produced a response
/// (connect error, timeout, unreadable body).
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct UpstreamFailure {
    pub status: Option<u16>,
    pub message: String,
    pub payload: Value,
}

impl UpstreamFailure {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            payload: Value::Null,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(401)
    }
}

/// Calls the relay makes against the Domo platform.
///
/// `DomoClient` is the HTTP implementation; tests substitute an in-memory one.
#[async_trait]
pub trait DomoApi: Send + Sync {
    /// Client-credentials grant for `scope`.
    async fn request_token(&self, scope: &str) -> Result<TokenSet, UpstreamFailure>;

    /// Column names of the dataset schema, in schema order, unfiltered.
    async fn dataset_columns(&self, token: &str, dataset_id: &str)
        -> Result<Vec<String>, UpstreamFailure>;

    /// Dataset content as headerless CSV.
    async fn dataset_csv(&self, token: &str, dataset_id: &str) -> Result<String, UpstreamFailure>;

    /// Replace the dataset content with a headerless CSV payload.
    async fn upload_dataset_csv(
        &self,
        token: &str,
        dataset_id: &str,
        csv: String,
    ) -> Result<(), UpstreamFailure>;
}
