//! Connection management: request shaping, dispatch, txn-time tracking.

use crate::error::ClientError;
use crate::http::HttpHandle;
use crate::metrics::{MetricsSink, NullMetrics, REQUEST_TIMER};
use crate::response::HttpResponse;
use crate::stream::StreamingResponse;
use futures::stream::{StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, Request, Version};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Wire API version sent with every request.
pub const API_VERSION: &str = "4";

/// Public service root used when the builder is given no override.
pub const FAUNA_ROOT: &str = "https://db.fauna.com";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const X_FAUNADB_API_VERSION: &str = "X-FaunaDB-API-Version";
const X_FAUNADB_HOST: &str = "X-FaunaDB-Host";
const X_FAUNADB_BUILD: &str = "X-FaunaDB-Build";
const X_FAUNA_DRIVER: &str = "X-Fauna-Driver";
const X_QUERY_TIMEOUT: &str = "X-Query-Timeout";
const X_LAST_SEEN_TXN: &str = "X-Last-Seen-Txn";
const X_TXN_TIME: &str = "x-txn-time";

/// Request parameters rendered into the query string.
/// Each entry maps a key to its values; entries with no values are skipped.
pub type RequestParams = HashMap<String, Vec<String>>;

/// Driver identifier reported to the server for telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JvmDriver {
    #[default]
    Java,
    Scala,
}

impl JvmDriver {
    pub fn as_str(&self) -> &'static str {
        match self {
            JvmDriver::Java => "Java",
            JvmDriver::Scala => "Scala",
        }
    }
}

/// Builder for [`Connection`].
pub struct ConnectionBuilder {
    fauna_root: Option<Url>,
    auth_token: Option<String>,
    metrics: Option<Arc<dyn MetricsSink>>,
    jvm_driver: JvmDriver,
    last_seen_txn: i64,
    http_client: Option<reqwest::Client>,
    query_timeout: Option<Duration>,
}

impl ConnectionBuilder {
    fn new() -> Self {
        Self {
            fauna_root: None,
            auth_token: None,
            metrics: None,
            jvm_driver: JvmDriver::default(),
            last_seen_txn: 0,
            http_client: None,
            query_timeout: None,
        }
    }

    /// Sets the service root from a URL string.
    pub fn with_fauna_root(mut self, root: &str) -> Result<Self, ClientError> {
        self.fauna_root = Some(Url::parse(root)?);
        Ok(self)
    }

    /// Sets the service root from an already-parsed URL.
    pub fn with_fauna_root_url(mut self, root: Url) -> Self {
        self.fauna_root = Some(root);
        self
    }

    /// Sets the authentication token. Required; `build` fails without it.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Sets the metrics sink used to time requests.
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Sets the driver identifier reported to the server.
    pub fn with_jvm_driver(mut self, jvm_driver: JvmDriver) -> Self {
        self.jvm_driver = jvm_driver;
        self
    }

    /// Seeds the last-seen transaction time, in microseconds.
    pub fn with_last_seen_txn(mut self, txn_time: i64) -> Self {
        self.last_seen_txn = txn_time;
        self
    }

    /// Injects an HTTP engine instead of constructing the default one.
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the default query timeout, applied when a request carries none.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    /// Builds the connection, applying defaults for anything unset.
    pub fn build(self) -> Result<Connection, ClientError> {
        let auth_token = self.auth_token.ok_or(ClientError::MissingAuthToken)?;

        let fauna_root = match self.fauna_root {
            Some(root) => root,
            None => Url::parse(FAUNA_ROOT)?,
        };

        let client = match self.http_client {
            Some(client) => client,
            None => reqwest::Client::builder()
                .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
                .build()?,
        };

        Ok(Connection {
            fauna_root,
            auth_header: generate_auth_header(&auth_token),
            jvm_driver: self.jvm_driver,
            http: HttpHandle::new(client),
            metrics: self.metrics.unwrap_or_else(|| Arc::new(NullMetrics)),
            default_query_timeout: self.query_timeout,
            txn_time: AtomicI64::new(self.last_seen_txn),
        })
    }
}

/// The HTTP connection adapter for Fauna drivers.
///
/// Immutable after build except for the last-seen-txn register, a single
/// atomic cell. Safe to share across tasks; each request is dispatched to the
/// async HTTP engine and the methods return as soon as the engine completes.
pub struct Connection {
    fauna_root: Url,
    auth_header: String,
    jvm_driver: JvmDriver,
    http: HttpHandle,
    metrics: Arc<dyn MetricsSink>,
    default_query_timeout: Option<Duration>,
    txn_time: AtomicI64,
}

impl Connection {
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::new()
    }

    /// Creates a new connection sharing this one's underlying I/O resources.
    /// Requests on the session are authenticated with the token provided.
    ///
    /// The session starts from this connection's current txn-time and holds
    /// its own reference on the HTTP engine.
    pub fn new_session_connection(
        &self,
        auth_token: impl Into<String>,
    ) -> Result<Connection, ClientError> {
        let http = self.http.try_clone().ok_or(ClientError::EngineClosed)?;
        Ok(Connection {
            fauna_root: self.fauna_root.clone(),
            auth_header: generate_auth_header(&auth_token.into()),
            jvm_driver: self.jvm_driver,
            http,
            metrics: self.metrics.clone(),
            default_query_timeout: self.default_query_timeout,
            txn_time: AtomicI64::new(self.last_txn_time()),
        })
    }

    /// The freshest transaction time reported to this client, in
    /// microseconds. Zero until a response has carried one.
    pub fn last_txn_time(&self) -> i64 {
        self.txn_time.load(Ordering::SeqCst)
    }

    /// Syncs the freshest transaction time seen by this client.
    ///
    /// Has no effect when more stale than the stored timestamp, so the
    /// register is monotonic under any interleaving. Use only when
    /// coordinating timestamps across clients; pushing the register
    /// arbitrarily far forward will stall transactions.
    pub fn sync_last_txn_time(&self, new_txn_time: i64) {
        loop {
            let old_txn_time = self.last_txn_time();
            if old_txn_time >= new_txn_time {
                return;
            }
            if self
                .txn_time
                .compare_exchange(old_txn_time, new_txn_time, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return;
            }
        }
    }

    /// Issues a `GET` request.
    pub async fn get(
        &self,
        path: &str,
        params: &RequestParams,
        query_timeout: Option<Duration>,
    ) -> Result<HttpResponse, ClientError> {
        self.perform_request(Method::GET, path, None, params, query_timeout)
            .await
    }

    /// Issues a `POST` request with the provided JSON body.
    pub async fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
        query_timeout: Option<Duration>,
    ) -> Result<HttpResponse, ClientError> {
        self.perform_request(Method::POST, path, Some(body), &RequestParams::new(), query_timeout)
            .await
    }

    /// Issues a `PUT` request with the provided JSON body.
    pub async fn put(
        &self,
        path: &str,
        body: &serde_json::Value,
        query_timeout: Option<Duration>,
    ) -> Result<HttpResponse, ClientError> {
        self.perform_request(Method::PUT, path, Some(body), &RequestParams::new(), query_timeout)
            .await
    }

    /// Issues a `PATCH` request with the provided JSON body.
    pub async fn patch(
        &self,
        path: &str,
        body: &serde_json::Value,
        query_timeout: Option<Duration>,
    ) -> Result<HttpResponse, ClientError> {
        self.perform_request(Method::PATCH, path, Some(body), &RequestParams::new(), query_timeout)
            .await
    }

    async fn perform_request(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        params: &RequestParams,
        query_timeout: Option<Duration>,
    ) -> Result<HttpResponse, ClientError> {
        let timer = self.metrics.start_timer(REQUEST_TIMER);

        let request = match self.make_request(
            method.clone(),
            path,
            body,
            params,
            query_timeout,
            Version::HTTP_11,
        ) {
            Ok(request) => request,
            Err(err) => {
                timer.stop();
                log_failure(&format!("{method} {path}"), &body_repr(body), &err);
                return Err(err);
            }
        };

        let url = request.url().clone();

        let result = async {
            let response = self.http.client()?.execute(request).await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.text().await?;
            Ok::<_, ClientError>(HttpResponse::new(status, headers, body))
        }
        .await;

        match result {
            Ok(response) => {
                self.observe_txn_time(response.headers());
                timer.stop();
                self.log_success(&method, &url, body, &response);
                Ok(response)
            }
            Err(err) => {
                timer.stop();
                log_failure(&format!("{method} {url}"), &body_repr(body), &err);
                Err(err)
            }
        }
    }

    /// Issues a request whose response body is a lazy sequence of byte
    /// chunks, produced until the server closes the stream. Forces HTTP/2.
    pub async fn perform_stream_request(
        &self,
        method: Method,
        path: &str,
        body: &serde_json::Value,
        params: &RequestParams,
    ) -> Result<StreamingResponse, ClientError> {
        self.stream_request(method, path, body, params, Version::HTTP_2)
            .await
    }

    async fn stream_request(
        &self,
        method: Method,
        path: &str,
        body: &serde_json::Value,
        params: &RequestParams,
        version: Version,
    ) -> Result<StreamingResponse, ClientError> {
        let timer = self.metrics.start_timer(REQUEST_TIMER);

        let request =
            match self.make_request(method.clone(), path, Some(body), params, None, version) {
                Ok(request) => request,
                Err(err) => {
                    timer.stop();
                    log_failure(&format!("{method} {path}"), &body.to_string(), &err);
                    return Err(err);
                }
            };

        let url = request.url().clone();

        let result = async { Ok::<_, ClientError>(self.http.client()?.execute(request).await?) }
            .await;

        match result {
            Ok(response) => {
                let status = response.status();
                let headers = response.headers().clone();
                self.observe_txn_time(&headers);
                timer.stop();
                let chunks = response.bytes_stream().map_err(ClientError::from).boxed();
                Ok(StreamingResponse::new(status, headers, chunks))
            }
            Err(err) => {
                timer.stop();
                log_failure(&format!("{method} {url}"), &body.to_string(), &err);
                Err(err)
            }
        }
    }

    fn make_request(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        params: &RequestParams,
        query_timeout: Option<Duration>,
        version: Version,
    ) -> Result<Request, ClientError> {
        let mut url = self.fauna_root.join(path)?;
        for (key, values) in params {
            if !values.is_empty() {
                append_query(&mut url, key, values);
            }
        }

        let mut builder = self
            .http
            .client()?
            .request(method, url)
            .version(version)
            .header(AUTHORIZATION, self.auth_header.as_str())
            .header(X_FAUNADB_API_VERSION, API_VERSION)
            .header(USER_AGENT, "Fauna JVM Http Client")
            .header(X_FAUNA_DRIVER, self.jvm_driver.as_str())
            .header(CONTENT_TYPE, "application/json; charset=utf-8");

        // Streaming bodies are open-ended, so only unary requests carry the
        // fixed deadline.
        if version == Version::HTTP_11 {
            builder = builder.timeout(DEFAULT_REQUEST_TIMEOUT);
        }

        // A per-request timeout overrides the connection default, if any.
        if let Some(timeout) = query_timeout.or(self.default_query_timeout) {
            builder = builder.header(X_QUERY_TIMEOUT, timeout.as_millis().to_string());
        }

        let last_txn_time = self.last_txn_time();
        if last_txn_time > 0 {
            builder = builder.header(X_LAST_SEEN_TXN, last_txn_time.to_string());
        }

        if let Some(body) = body {
            builder = builder.body(serde_json::to_vec(body)?);
        }

        Ok(builder.build()?)
    }

    fn observe_txn_time(&self, headers: &HeaderMap) {
        // An unparseable header value is ignored; the response still counts.
        let txn_time = headers
            .get(X_TXN_TIME)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<i64>().ok());
        if let Some(txn_time) = txn_time {
            self.sync_last_txn_time(txn_time);
        }
    }

    fn log_success(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&serde_json::Value>,
        response: &HttpResponse,
    ) {
        if tracing::enabled!(tracing::Level::DEBUG) {
            let body_repr = body_repr(body);
            let host = response.header(X_FAUNADB_HOST).unwrap_or("Unknown");
            let build = response.header(X_FAUNADB_BUILD).unwrap_or("Unknown");
            tracing::debug!(
                "Request: {method} {url}: [{body_repr}]. Response: Status={status}, Fauna Host: {host}, Fauna Build: {build}: {body}",
                status = response.status().as_u16(),
                body = response.body(),
            );
        }
    }
}

fn log_failure(target: &str, body_repr: &str, err: &ClientError) {
    tracing::info!("Request: {target}: {body_repr}. Failed: {err}");
}

fn body_repr(body: Option<&serde_json::Value>) -> String {
    match body {
        Some(body) => body.to_string(),
        None => "NoBody".to_string(),
    }
}

fn generate_auth_header(auth_token: &str) -> String {
    format!("Bearer {auth_token}")
}

/// Renders one params entry into the query string. The key and each value are
/// percent-encoded individually; values join with a literal comma. The pair
/// appends to any query the URL already carries.
fn append_query(url: &mut Url, key: &str, values: &[String]) {
    let encoded_key: String = form_urlencoded::byte_serialize(key.as_bytes()).collect();
    let encoded_values: Vec<String> = values
        .iter()
        .map(|value| form_urlencoded::byte_serialize(value.as_bytes()).collect())
        .collect();
    let pair = format!("{}={}", encoded_key, encoded_values.join(","));

    let query = match url.query() {
        Some(existing) if !existing.is_empty() => format!("{existing}&{pair}"),
        _ => pair,
    };
    url.set_query(Some(&query));
}
