//! File hub upload connector
//!
//! Implements `ChunkedUploadApi` against the file hub's resumable upload endpoints.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::upload::{ChunkAck, ChunkedUploadApi, FinalizedUpload, UploadSession};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{FileHubError, UploadOperation};
use crate::types::{
    BeginUploadResponse, CancelUploadResponse, FinalizeUploadResponse, UploadChunkResponse,
};

/// Name of the session cookie issued by the file hub login endpoint
const SESSION_COOKIE: &str = "filehub_session";

/// Timeout applied to every protocol exchange unless overridden
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// File hub API connector
///
/// # Features
///
/// - Resumable chunked uploads (begin / chunk / finalize / cancel)
/// - Session-cookie authentication via `HttpClient`
/// - Exchanges are issued once; retry belongs to the sync coordinator
///
/// # Example
///
/// ```ignore
/// use provider_filehub::FileHubConnector;
/// use bridge_traits::upload::ChunkedUploadApi;
///
/// let connector = FileHubConnector::new(http_client, "https://hub.example.com");
/// let session = connector.begin_upload("dcim", "/dcim/2024/01/IMG.jpg", 1024, &hash).await?;
/// ```
pub struct FileHubConnector {
    /// HTTP client for API requests
    http_client: Arc<dyn HttpClient>,

    /// Server origin without a trailing slash
    base_url: String,

    /// Value of the `filehub_session` cookie
    session_cookie: Option<String>,

    request_timeout: Duration,
}

impl FileHubConnector {
    /// Create a new connector
    ///
    /// # Arguments
    ///
    /// * `http_client` - HTTP client implementation
    /// * `base_url` - Server origin, e.g. `https://hub.example.com`
    pub fn new(http_client: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http_client,
            base_url,
            session_cookie: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_session_cookie(mut self, value: impl Into<String>) -> Self {
        self.session_cookie = Some(value.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Build `{base}/api/files/{repo}/upload/{action}?{query}`
    fn upload_url(&self, repo: &str, action: &str, query: &str) -> String {
        format!(
            "{}/api/files/{}/upload/{}?{}",
            self.base_url,
            urlencoding::encode(repo),
            action,
            query
        )
    }

    fn request(&self, method: HttpMethod, url: String) -> HttpRequest {
        let request = HttpRequest::new(method, url)
            .header("Accept", "application/json")
            .timeout(self.request_timeout);

        match &self.session_cookie {
            Some(cookie) => request.cookie(SESSION_COOKIE, cookie),
            None => request,
        }
    }

    /// Send one exchange without transport-level retry and check its status
    #[instrument(skip(self, request))]
    async fn send(&self, request: HttpRequest, operation: UploadOperation) -> Result<HttpResponse> {
        let response = self
            .http_client
            .execute_with_retry(request, RetryPolicy::no_retry())
            .await
            .map_err(|e| {
                warn!("{} request did not complete: {}", operation, e);
                e
            })?;

        if response.status == 401 {
            warn!("Session rejected by file hub");
            return Err(FileHubError::Unauthorized.into());
        }

        if !response.is_success() {
            warn!("{} failed: status={}", operation, response.status);
            return Err(FileHubError::RequestFailed {
                operation,
                status_code: response.status,
            }
            .into());
        }

        debug!("{} succeeded: status={}", operation, response.status);
        Ok(response)
    }

    fn parse<T: DeserializeOwned>(response: &HttpResponse, operation: UploadOperation) -> Result<T> {
        serde_json::from_slice(&response.body).map_err(|e| {
            FileHubError::ParseError(format!("Failed to parse {} response: {}", operation, e))
                .into()
        })
    }
}

#[async_trait]
impl ChunkedUploadApi for FileHubConnector {
    #[instrument(skip(self, checksum), fields(repo = %repo, size = size))]
    async fn begin_upload(
        &self,
        repo: &str,
        path: &str,
        size: u64,
        checksum: &str,
    ) -> Result<UploadSession> {
        let query = format!(
            "path={}&size={}&checksum={}",
            urlencoding::encode(path),
            size,
            urlencoding::encode(checksum)
        );
        let url = self.upload_url(repo, "begin", &query);

        let response = self
            .send(self.request(HttpMethod::Post, url), UploadOperation::Begin)
            .await?;
        let begin: BeginUploadResponse = Self::parse(&response, UploadOperation::Begin)?;

        info!(
            upload_id = %begin.upload_id,
            total_chunks = begin.total_chunks,
            already_uploaded = begin.uploaded_chunks.len(),
            "Upload session opened"
        );

        Ok(begin.into())
    }

    #[instrument(skip(self, data), fields(upload_id = %upload_id, index = index, len = data.len()))]
    async fn upload_chunk(
        &self,
        repo: &str,
        upload_id: &str,
        index: u32,
        data: Bytes,
    ) -> Result<ChunkAck> {
        let query = format!("upload_id={}&index={}", urlencoding::encode(upload_id), index);
        let url = self.upload_url(repo, "chunk", &query);

        let request = self
            .request(HttpMethod::Put, url)
            .header("Content-Type", "application/octet-stream")
            .body(data);

        let response = self.send(request, UploadOperation::Chunk).await?;
        let chunk: UploadChunkResponse = Self::parse(&response, UploadOperation::Chunk)?;

        Ok(chunk.into())
    }

    #[instrument(skip(self), fields(upload_id = %upload_id))]
    async fn finalize_upload(&self, repo: &str, upload_id: &str) -> Result<FinalizedUpload> {
        let query = format!("upload_id={}", urlencoding::encode(upload_id));
        let url = self.upload_url(repo, "finalize", &query);

        let response = self
            .send(self.request(HttpMethod::Post, url), UploadOperation::Finalize)
            .await?;
        let finalized: FinalizeUploadResponse = Self::parse(&response, UploadOperation::Finalize)?;

        info!(etag = %finalized.etag, size = finalized.size, "Upload finalized");

        Ok(finalized.into())
    }

    #[instrument(skip(self), fields(upload_id = %upload_id))]
    async fn cancel_upload(&self, repo: &str, upload_id: &str) -> Result<ChunkAck> {
        let query = format!("upload_id={}", urlencoding::encode(upload_id));
        let url = self.upload_url(repo, "cancel", &query);

        let response = self
            .send(self.request(HttpMethod::Post, url), UploadOperation::Cancel)
            .await?;
        let cancelled: CancelUploadResponse = Self::parse(&response, UploadOperation::Cancel)?;

        info!(success = cancelled.success, "Upload cancelled");

        Ok(cancelled.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::BridgeError;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
        }
    }

    fn json_response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    #[tokio::test]
    async fn test_begin_upload_success() {
        let mut mock_http = MockHttpClient::new();

        mock_http.expect_execute().times(1).returning(|req| {
            assert_eq!(req.method, HttpMethod::Post);
            assert_eq!(
                req.url,
                "https://hub.example.com/api/files/dcim/upload/begin?path=%2Fdcim%2F2023%2F11%2FIMG%201.jpg&size=2048&checksum=abc123"
            );
            assert_eq!(
                req.headers.get("Cookie"),
                Some(&"filehub_session=s3cret".to_string())
            );

            Ok(json_response(
                200,
                r#"{"upload_id":"up-1","total_chunks":2,"chunk_size":1024,"uploaded_chunks":[0]}"#,
            ))
        });

        let connector = FileHubConnector::new(Arc::new(mock_http), "https://hub.example.com/")
            .with_session_cookie("s3cret");
        let session = connector
            .begin_upload("dcim", "/dcim/2023/11/IMG 1.jpg", 2048, "abc123")
            .await
            .unwrap();

        assert_eq!(session.upload_id, "up-1");
        assert_eq!(session.total_chunks, 2);
        assert_eq!(session.chunk_size, 1024);
        assert_eq!(session.uploaded_chunks, vec![0]);
    }

    #[tokio::test]
    async fn test_upload_chunk_sends_raw_bytes() {
        let mut mock_http = MockHttpClient::new();

        mock_http.expect_execute().times(1).returning(|req| {
            assert_eq!(req.method, HttpMethod::Put);
            assert!(req.url.ends_with("/upload/chunk?upload_id=up-1&index=3"));
            assert_eq!(
                req.headers.get("Content-Type"),
                Some(&"application/octet-stream".to_string())
            );
            assert!(!req.headers.contains_key("Cookie"));
            assert_eq!(req.body.as_deref(), Some(&[1u8, 2, 3][..]));

            Ok(json_response(200, r#"{"success":true}"#))
        });

        let connector = FileHubConnector::new(Arc::new(mock_http), "https://hub.example.com");
        let ack = connector
            .upload_chunk("dcim", "up-1", 3, Bytes::from_static(&[1, 2, 3]))
            .await
            .unwrap();

        assert!(ack.success);
        assert_eq!(ack.message, None);
    }

    #[tokio::test]
    async fn test_rejected_chunk_is_not_an_error() {
        let mut mock_http = MockHttpClient::new();

        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(json_response(200, r#"{"success":false,"message":"bad offset"}"#)));

        let connector = FileHubConnector::new(Arc::new(mock_http), "https://hub.example.com");
        let ack = connector
            .upload_chunk("dcim", "up-1", 0, Bytes::from_static(b"x"))
            .await
            .unwrap();

        assert!(!ack.success);
        assert_eq!(ack.message.as_deref(), Some("bad offset"));
    }

    #[tokio::test]
    async fn test_finalize_and_cancel() {
        let mut mock_http = MockHttpClient::new();

        mock_http.expect_execute().times(2).returning(|req| {
            if req.url.contains("/upload/finalize?") {
                Ok(json_response(200, r#"{"etag":"\"e1\"","size":2048,"file_id":7}"#))
            } else {
                assert!(req.url.contains("/upload/cancel?upload_id=up-1"));
                Ok(json_response(200, r#"{"success":true,"message":"gone"}"#))
            }
        });

        let connector = FileHubConnector::new(Arc::new(mock_http), "https://hub.example.com");

        let finalized = connector.finalize_upload("dcim", "up-1").await.unwrap();
        assert_eq!(finalized.etag, "\"e1\"");
        assert_eq!(finalized.size, 2048);
        assert_eq!(finalized.file_id, Some(7));

        let cancelled = connector.cancel_upload("dcim", "up-1").await.unwrap();
        assert!(cancelled.success);
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried() {
        let mut mock_http = MockHttpClient::new();

        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(json_response(503, "unavailable")));

        let connector = FileHubConnector::new(Arc::new(mock_http), "https://hub.example.com");
        let error = connector
            .begin_upload("dcim", "/dcim/2024/01/a.jpg", 1, "00")
            .await
            .unwrap_err();

        match error {
            BridgeError::Http { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "Begin upload failed: 503");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let mut mock_http = MockHttpClient::new();

        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(json_response(401, "")));

        let connector = FileHubConnector::new(Arc::new(mock_http), "https://hub.example.com")
            .with_session_cookie("expired");
        let error = connector.finalize_upload("dcim", "up-1").await.unwrap_err();

        assert!(matches!(error, BridgeError::Unauthorized));
        assert_eq!(error.to_string(), "Unauthorized - Please login again");
    }

    #[tokio::test]
    async fn test_transport_error_passes_through() {
        let mut mock_http = MockHttpClient::new();

        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Err(BridgeError::Network("connection reset".to_string())));

        let connector = FileHubConnector::new(Arc::new(mock_http), "https://hub.example.com");
        let error = connector
            .upload_chunk("dcim", "up-1", 0, Bytes::from_static(b"x"))
            .await
            .unwrap_err();

        assert!(error.is_transport());
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let mut mock_http = MockHttpClient::new();

        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(json_response(200, "not json")));

        let connector = FileHubConnector::new(Arc::new(mock_http), "https://hub.example.com");
        let error = connector
            .begin_upload("dcim", "/dcim/2024/01/a.jpg", 1, "00")
            .await
            .unwrap_err();

        assert!(matches!(error, BridgeError::OperationFailed(_)));
    }
}
