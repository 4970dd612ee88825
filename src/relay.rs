//! Dataset relay: Domo CSV in and out as JSON records.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::codec::{self, Record};
use crate::domo::{DomoApi, TokenManager, UpstreamFailure};
use crate::error::RelayError;

/// Domo bookkeeping columns hidden from readers.
pub const RESERVED_COLUMNS: [&str; 2] = ["_BATCH_ID_", "_BATCH_LAST_RUN_"];

/// A dataset as returned to the front-end.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatasetView {
    pub dataset_id: String,
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

pub struct DatasetRelay {
    api: Arc<dyn DomoApi>,
    tokens: Arc<TokenManager>,
}

impl DatasetRelay {
    pub fn new(api: Arc<dyn DomoApi>, tokens: Arc<TokenManager>) -> Self {
        Self { api, tokens }
    }

    /// Read schema and content of `dataset_id` as records.
    ///
    /// A 401 from either call discards the cached token, acquires a new one
    /// and repeats the whole read once. Every other failure, including a
    /// second 401, is reported as a 500 with the upstream payload.
    pub async fn fetch_dataset(&self, dataset_id: &str) -> Result<DatasetView, RelayError> {
        let mut refreshed = false;

        let (columns, csv) = loop {
            let token = self.tokens.ensure_token().await?;
            match self.read_raw(&token, dataset_id).await {
                Ok(raw) => break raw,
                Err(e) if e.is_unauthorized() && !refreshed => {
                    warn!("Domo rejected cached token reading dataset {dataset_id}, refreshing");
                    refreshed = true;
                    self.tokens.invalidate().await;
                    self.tokens.acquire_token().await?;
                }
                Err(e) => {
                    return Err(RelayError::Upstream {
                        status: None,
                        message: format!("Failed to read dataset {dataset_id}: {e}"),
                        payload: e.payload,
                    })
                }
            }
        };

        let columns = visible_columns(columns);
        let records = codec::records_from_csv(&columns, &csv)?;
        info!("Read {} rows from dataset {dataset_id}", records.len());

        Ok(DatasetView {
            dataset_id: dataset_id.to_string(),
            columns,
            records,
        })
    }

    async fn read_raw(
        &self,
        token: &str,
        dataset_id: &str,
    ) -> Result<(Vec<String>, String), UpstreamFailure> {
        let columns = self.api.dataset_columns(token, dataset_id).await?;
        let csv = self.api.dataset_csv(token, dataset_id).await?;
        Ok((columns, csv))
    }

    /// Replace the content of `dataset_id` with `records`.
    ///
    /// The CSV is laid out against the full schema, reserved columns
    /// included. Failures are not retried; a 401 still refreshes the cached
    /// token so the next call starts clean.
    pub async fn update_dataset(
        &self,
        dataset_id: &str,
        records: Option<&Value>,
    ) -> Result<usize, RelayError> {
        let records = validate_records(records)?;
        let token = self.tokens.ensure_token().await?;

        if let Err(e) = self.write_raw(&token, dataset_id, &records).await {
            if e.is_unauthorized() {
                self.refresh_after_rejection(dataset_id).await;
            }
            return Err(RelayError::Upstream {
                status: e.status,
                message: format!("Failed to update dataset {dataset_id}: {e}"),
                payload: e.payload,
            });
        }

        info!("Wrote {} rows to dataset {dataset_id}", records.len());
        Ok(records.len())
    }

    async fn write_raw(
        &self,
        token: &str,
        dataset_id: &str,
        records: &[Record],
    ) -> Result<(), UpstreamFailure> {
        let columns = self.api.dataset_columns(token, dataset_id).await?;
        let csv = codec::records_to_csv(&columns, records);
        self.api.upload_dataset_csv(token, dataset_id, csv).await
    }

    async fn refresh_after_rejection(&self, dataset_id: &str) {
        warn!("Domo rejected cached token writing dataset {dataset_id}, refreshing");
        self.tokens.invalidate().await;
        if let Err(e) = self.tokens.acquire_token().await {
            warn!("Token refresh after rejected write failed: {e}");
        }
    }
}

/// Drop reserved batch columns, keeping schema order.
pub fn visible_columns(columns: Vec<String>) -> Vec<String> {
    columns
        .into_iter()
        .filter(|c| !RESERVED_COLUMNS.contains(&c.as_str()))
        .collect()
}

fn validate_records(records: Option<&Value>) -> Result<Vec<Record>, RelayError> {
    let items = match records {
        Some(Value::Array(items)) if !items.is_empty() => items,
        Some(Value::Array(_)) => {
            return Err(RelayError::BadRequest("records must not be empty".into()))
        }
        _ => return Err(RelayError::BadRequest("records must be an array".into())),
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(map) => Ok(map.clone()),
            _ => Err(RelayError::BadRequest(format!("records[{i}] must be an object"))),
        })
        .collect()
}
