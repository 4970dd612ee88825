use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use super::api::{DomoApi, TokenSet, UpstreamFailure};
use crate::config::Config;

/// Dataset uploads can be large; Domo takes a while to ingest them.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// HTTP client for the Domo public API.
pub struct DomoClient {
    api_base: String,
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
}

// Raw dataset metadata from GET /v1/datasets/{id}
#[derive(Debug, Deserialize)]
struct DatasetMetadata {
    schema: Option<DatasetSchemaBody>,
}

#[derive(Debug, Deserialize)]
struct DatasetSchemaBody {
    #[serde(default)]
    columns: Vec<SchemaColumn>,
}

#[derive(Debug, Deserialize)]
struct SchemaColumn {
    name: String,
}

impl DomoClient {
    pub fn new(config: &Config) -> Self {
        Self {
            api_base: config.api_base.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            http: reqwest::Client::new(),
        }
    }

    /// `{base}/v1/datasets/{id}[/data]` with the id encoded as one path segment.
    fn dataset_url(&self, dataset_id: &str, data: bool) -> Result<Url, UpstreamFailure> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| UpstreamFailure::transport(format!("Invalid Domo API base: {e}")))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| UpstreamFailure::transport("Domo API base cannot carry a path"))?;
            segments.pop_if_empty().extend(["v1", "datasets", dataset_id]);
            if data {
                segments.push("data");
            }
        }
        Ok(url)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<reqwest::Response, UpstreamFailure> {
        let resp = request
            .send()
            .await
            .map_err(|e| UpstreamFailure::transport(format!("{what} request failed: {e}")))?;

        if resp.status().is_success() {
            Ok(resp)
        } else {
            Err(failure_from_response(resp, what).await)
        }
    }
}

#[async_trait]
impl DomoApi for DomoClient {
    async fn request_token(&self, scope: &str) -> Result<TokenSet, UpstreamFailure> {
        let request = self
            .http
            .get(format!("{}/oauth/token", self.api_base))
            .query(&[("grant_type", "client_credentials"), ("scope", scope)])
            .basic_auth(&self.client_id, Some(&self.client_secret));

        let resp = self.send(request, "Token").await?;
        resp.json::<TokenSet>()
            .await
            .map_err(|e| UpstreamFailure::transport(format!("Failed to parse token response: {e}")))
    }

    async fn dataset_columns(
        &self,
        token: &str,
        dataset_id: &str,
    ) -> Result<Vec<String>, UpstreamFailure> {
        let request = self
            .http
            .get(self.dataset_url(dataset_id, false)?)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json");

        let resp = self.send(request, "Dataset metadata").await?;
        let metadata: DatasetMetadata = resp.json().await.map_err(|e| {
            UpstreamFailure::transport(format!("Failed to parse dataset metadata: {e}"))
        })?;

        Ok(metadata
            .schema
            .map(|s| s.columns.into_iter().map(|c| c.name).collect())
            .unwrap_or_default())
    }

    async fn dataset_csv(&self, token: &str, dataset_id: &str) -> Result<String, UpstreamFailure> {
        let request = self
            .http
            .get(self.dataset_url(dataset_id, true)?)
            .query(&[("includeHeader", "false")])
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "text/csv");

        let resp = self.send(request, "Dataset export").await?;
        resp.text()
            .await
            .map_err(|e| UpstreamFailure::transport(format!("Failed to read dataset export: {e}")))
    }

    async fn upload_dataset_csv(
        &self,
        token: &str,
        dataset_id: &str,
        csv: String,
    ) -> Result<(), UpstreamFailure> {
        let request = self
            .http
            .put(self.dataset_url(dataset_id, true)?)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "text/csv; charset=utf-8")
            .timeout(UPLOAD_TIMEOUT)
            .body(csv);

        self.send(request, "Dataset import").await?;
        Ok(())
    }
}

/// Capture status and body of a non-2xx response. Bodies that are not JSON
/// are kept as a JSON string.
async fn failure_from_response(resp: reqwest::Response, what: &str) -> UpstreamFailure {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    UpstreamFailure {
        status: Some(status.as_u16()),
        message: format!("{what} failed with status {status}"),
        payload: parse_payload(&body),
    }
}

fn parse_payload(body: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::{HeaderMap, Method, StatusCode, Uri};
    use axum::response::{IntoResponse, Response};
    use axum::Router;
    use std::sync::{Arc, Mutex};

    /// One request as seen by the local Domo stand-in.
    #[derive(Debug, Clone)]
    struct Seen {
        method: Method,
        path: String,
        query: Option<String>,
        headers: HeaderMap,
        body: String,
    }

    type SeenLog = Arc<Mutex<Vec<Seen>>>;

    async fn domo_stub(
        State(log): State<SeenLog>,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: String,
    ) -> Response {
        let path = uri.path().to_string();
        log.lock().unwrap().push(Seen {
            method: method.clone(),
            path: path.clone(),
            query: uri.query().map(str::to_string),
            headers: headers.clone(),
            body,
        });

        let bearer = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if bearer == "Bearer expired" {
            return (
                StatusCode::UNAUTHORIZED,
                axum::Json(serde_json::json!({ "status": 401, "message": "Full authentication is required" })),
            )
                .into_response();
        }

        match (method.as_str(), path.as_str()) {
            ("GET", "/oauth/token") => axum::Json(serde_json::json!({
                "access_token": "abc123",
                "token_type": "bearer",
                "expires_in": 3599,
                "scope": "data dashboard user",
            }))
            .into_response(),
            ("GET", "/v1/datasets/ds-1") => axum::Json(serde_json::json!({
                "id": "ds-1",
                "schema": { "columns": [
                    { "type": "STRING", "name": "Name" },
                    { "type": "LONG", "name": "Score" },
                ]},
            }))
            .into_response(),
            ("GET", "/v1/datasets/ds-1/data") => "Alice,91\nBob,78\n".into_response(),
            ("PUT", "/v1/datasets/ds-1/data") => StatusCode::NO_CONTENT.into_response(),
            _ => (StatusCode::NOT_FOUND, "no such dataset").into_response(),
        }
    }

    async fn start_stub() -> (DomoClient, SeenLog) {
        let log: SeenLog = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new().fallback(domo_stub).with_state(log.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let mut config = Config::new("id", "secret");
        config.api_base = format!("http://{addr}");
        (DomoClient::new(&config), log)
    }

    fn header<'a>(seen: &'a Seen, name: &str) -> &'a str {
        seen.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_token_grant_uses_basic_auth_and_scope_query() {
        let (client, log) = start_stub().await;

        let tokens = client.request_token("data dashboard user").await.unwrap();

        assert_eq!(tokens.access_token, "abc123");
        assert_eq!(tokens.expires_in, Some(3599));
        let seen = log.lock().unwrap()[0].clone();
        assert_eq!(seen.method, Method::GET);
        assert_eq!(seen.path, "/oauth/token");
        assert_eq!(
            seen.query.as_deref(),
            Some("grant_type=client_credentials&scope=data+dashboard+user")
        );
        // base64("id:secret")
        assert_eq!(header(&seen, "authorization"), "Basic aWQ6c2VjcmV0");
    }

    #[tokio::test]
    async fn test_schema_and_export_requests() {
        let (client, log) = start_stub().await;

        let columns = client.dataset_columns("tok", "ds-1").await.unwrap();
        let csv = client.dataset_csv("tok", "ds-1").await.unwrap();

        assert_eq!(columns, vec!["Name", "Score"]);
        assert_eq!(csv, "Alice,91\nBob,78\n");

        let seen = log.lock().unwrap().clone();
        assert_eq!(seen[0].path, "/v1/datasets/ds-1");
        assert_eq!(header(&seen[0], "authorization"), "Bearer tok");
        assert_eq!(header(&seen[0], "accept"), "application/json");

        assert_eq!(seen[1].method, Method::GET);
        assert_eq!(seen[1].path, "/v1/datasets/ds-1/data");
        assert_eq!(seen[1].query.as_deref(), Some("includeHeader=false"));
        assert_eq!(header(&seen[1], "accept"), "text/csv");
        assert_eq!(header(&seen[1], "authorization"), "Bearer tok");
    }

    #[tokio::test]
    async fn test_import_puts_csv_body() {
        let (client, log) = start_stub().await;

        client
            .upload_dataset_csv("tok", "ds-1", "\"Brien, J.\",7".to_string())
            .await
            .unwrap();

        let seen = log.lock().unwrap()[0].clone();
        assert_eq!(seen.method, Method::PUT);
        assert_eq!(seen.path, "/v1/datasets/ds-1/data");
        assert_eq!(header(&seen, "content-type"), "text/csv; charset=utf-8");
        assert_eq!(header(&seen, "authorization"), "Bearer tok");
        assert_eq!(seen.body, "\"Brien, J.\",7");
    }

    #[tokio::test]
    async fn test_unauthorized_response_maps_to_failure_with_payload() {
        let (client, _) = start_stub().await;

        let err = client.dataset_columns("expired", "ds-1").await.unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(err.status, Some(401));
        assert_eq!(err.payload["message"], "Full authentication is required");
    }

    #[tokio::test]
    async fn test_non_json_error_body_is_kept_as_string() {
        let (client, _) = start_stub().await;

        let err = client.dataset_csv("tok", "missing").await.unwrap_err();

        assert_eq!(err.status, Some(404));
        assert_eq!(err.payload, Value::String("no such dataset".into()));
    }

    #[test]
    fn test_parse_payload_prefers_json() {
        let payload = parse_payload(r#"{"status":401,"message":"Full authentication is required"}"#);
        assert_eq!(payload["status"], 401);
        assert_eq!(parse_payload("Bad Gateway"), Value::String("Bad Gateway".into()));
        assert_eq!(parse_payload("  "), Value::Null);
    }

    #[test]
    fn test_dataset_url_keeps_id_as_one_segment() {
        let client = DomoClient::new(&Config::new("id", "secret"));
        assert_eq!(
            client.dataset_url("a1b2-c3", false).unwrap().as_str(),
            "https://api.domo.com/v1/datasets/a1b2-c3"
        );
        assert_eq!(
            client.dataset_url("sales q1", true).unwrap().as_str(),
            "https://api.domo.com/v1/datasets/sales%20q1/data"
        );
        assert_eq!(
            client.dataset_url("a/b+c", false).unwrap().as_str(),
            "https://api.domo.com/v1/datasets/a%2Fb+c"
        );
    }

    #[test]
    fn test_metadata_without_schema_has_no_columns() {
        let metadata: DatasetMetadata = serde_json::from_str(r#"{"id":"7","name":"Sales"}"#).unwrap();
        assert!(metadata.schema.is_none());

        let metadata: DatasetMetadata = serde_json::from_str(
            r#"{"schema":{"columns":[{"type":"STRING","name":"Name"},{"type":"LONG","name":"Score"}]}}"#,
        )
        .unwrap();
        let names: Vec<String> = metadata.schema.unwrap().columns.into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Name", "Score"]);
    }
}
