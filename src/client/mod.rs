//! Blocking HTTP client for the Datasette JSON API.
//!
//! Every request carries `Authorization: Bearer <token>` when a token was
//! resolved, follows redirects and gives up after [`REQUEST_TIMEOUT`].
//! Responses are classified into two failure layers: a non-2xx status is an
//! [`Error::Transport`], a 2xx body with `"ok": false` is an
//! [`Error::Application`].

pub mod oauth;

use crate::error::{Error, Result};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(40);

const USER_AGENT: &str = concat!("dclient/", env!("CARGO_PKG_VERSION"));

/// An unclassified response, for callers that need the status or raw body.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl RawResponse {
    /// Whether the status is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the server labelled the body as JSON.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("json"))
    }

    /// Parse the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidResponse`] if the body is not JSON.
    pub fn json(&self) -> Result<Value> {
        serde_json::from_str(&self.body).map_err(|e| Error::InvalidResponse(e.to_string()))
    }
}

/// Client bound to one base URL and an optional bearer token.
///
/// Paths passed to the request methods are appended to the base URL
/// verbatim, so `"/-/plugins.json"` and `".json"` are both valid.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::blocking::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a client. Trailing slashes on `base_url` are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Absolute URL for a path under the base.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET `path` with query parameters and classify the JSON response.
    ///
    /// # Errors
    ///
    /// Returns transport, application or decoding errors per [`classify`].
    pub fn get_json(&self, path: &str, params: &[(String, String)]) -> Result<Value> {
        let request = self.http.get(self.url(path)).query(params);
        let response = self.send(request)?;
        classify(response.status, &response.body)
    }

    /// GET an absolute URL, as returned in `next_url` pagination links.
    ///
    /// # Errors
    ///
    /// Returns transport, application or decoding errors per [`classify`].
    pub fn get_url(&self, url: &str) -> Result<Value> {
        let response = self.send(self.http.get(url))?;
        classify(response.status, &response.body)
    }

    /// GET `path` without classifying the response.
    ///
    /// # Errors
    ///
    /// Returns an error only if the request could not be completed.
    pub fn get_raw(&self, path: &str) -> Result<RawResponse> {
        self.send(self.http.get(self.url(path)))
    }

    /// POST a JSON body to `path` and classify the JSON response.
    ///
    /// # Errors
    ///
    /// Returns transport, application or decoding errors per [`classify`].
    pub fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        debug!(body = %body, "Request body");
        let response = self.send(self.http.post(self.url(path)).json(body))?;
        classify(response.status, &response.body)
    }

    /// POST an urlencoded form to `path` without classifying the response.
    ///
    /// # Errors
    ///
    /// Returns an error only if the request could not be completed.
    pub fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Result<RawResponse> {
        self.send(self.http.post(self.url(path)).form(form))
    }

    fn send(&self, request: reqwest::blocking::RequestBuilder) -> Result<RawResponse> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let request = request.build()?;
        info!(method = %request.method(), url = %request.url(), "HTTP request");

        let response = self.http.execute(request)?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text()?;

        info!(status, "HTTP response");
        debug!(body = %body, "Response body");

        Ok(RawResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Classify a response into a JSON value or a typed failure.
///
/// - non-2xx: [`Error::Transport`] carrying the `errors` list (newline
///   separated), else `"<title>: <error>"`, else a generic description
/// - 2xx but not JSON: [`Error::InvalidResponse`]
/// - 2xx with `"ok": false`: [`Error::Application`]
///
/// # Errors
///
/// See above.
pub fn classify(status: u16, body: &str) -> Result<Value> {
    let parsed: std::result::Result<Value, _> = serde_json::from_str(body);

    if !(200..300).contains(&status) {
        let message = match &parsed {
            Ok(data) => error_list(data)
                .or_else(|| title_and_error(data))
                .unwrap_or_else(|| "Response contained no error details".to_string()),
            Err(_) => "Response was not valid JSON".to_string(),
        };
        return Err(Error::Transport { status, message });
    }

    let data = parsed.map_err(|e| Error::InvalidResponse(e.to_string()))?;

    if data.get("ok") == Some(&Value::Bool(false)) {
        let message = error_list(&data)
            .or_else(|| title_and_error(&data))
            .unwrap_or_else(|| data.to_string());
        return Err(Error::Application(message));
    }

    Ok(data)
}

fn error_list(data: &Value) -> Option<String> {
    let errors = data.get("errors")?.as_array()?;
    let lines: Vec<String> = errors
        .iter()
        .map(|e| match e {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();
    (!lines.is_empty()).then(|| lines.join("\n"))
}

fn title_and_error(data: &Value) -> Option<String> {
    let bits: Vec<&str> = ["title", "error"]
        .iter()
        .filter_map(|key| data.get(*key).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
        .collect();
    (!bits.is_empty()).then(|| bits.join(": "))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers for driving a `wiremock` server from synchronous tests.
    //!
    //! The blocking client must not run inside an async context, so the
    //! runtime is only entered to start and configure the server.

    use tokio::runtime::Runtime;
    use wiremock::{Mock, MockServer};

    pub struct TestServer {
        pub runtime: Runtime,
        pub server: MockServer,
    }

    impl TestServer {
        pub fn start() -> Self {
            let runtime = Runtime::new().unwrap();
            let server = runtime.block_on(MockServer::start());
            Self { runtime, server }
        }

        pub fn mount(&self, mock: Mock) {
            self.runtime.block_on(mock.mount(&self.server));
        }

        pub fn uri(&self) -> String {
            self.server.uri()
        }

        pub fn received(&self) -> Vec<wiremock::Request> {
            self.runtime
                .block_on(self.server.received_requests())
                .unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::TestServer;
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    #[test]
    fn test_classify_success() {
        let value = classify(200, r#"{"ok": true, "rows": []}"#).unwrap();
        assert_eq!(value["rows"], json!([]));

        // Endpoints without an "ok" key are fine
        let value = classify(200, r#"[{"name": "fixtures"}]"#).unwrap();
        assert!(value.is_array());
    }

    #[test]
    fn test_classify_transport_errors() {
        let err = classify(400, r#"{"ok": false, "title": "Invalid SQL", "error": "no such table: x"}"#)
            .unwrap_err();
        assert_eq!(err.to_string(), "400 status code. Invalid SQL: no such table: x");

        let err = classify(400, r#"{"errors": ["Row 1 is bad", "Row 2 is bad"]}"#).unwrap_err();
        assert!(matches!(err, Error::Transport { status: 400, .. }));
        assert_eq!(err.to_string(), "400 status code. Row 1 is bad\nRow 2 is bad");

        let err = classify(500, "<html>boom</html>").unwrap_err();
        assert_eq!(err.to_string(), "500 status code. Response was not valid JSON");

        let err = classify(404, "{}").unwrap_err();
        assert!(matches!(err, Error::Transport { status: 404, .. }));
    }

    #[test]
    fn test_classify_application_errors() {
        let err = classify(200, r#"{"ok": false, "error": "Table not found"}"#).unwrap_err();
        assert!(matches!(err, Error::Application(_)));
        assert_eq!(err.to_string(), "Table not found");

        let err = classify(200, r#"{"ok": false}"#).unwrap_err();
        assert_eq!(err.to_string(), r#"{"ok":false}"#);
    }

    #[test]
    fn test_classify_invalid_json() {
        let err = classify(200, "not json").unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }

    #[test]
    fn test_get_json_sends_token_and_params() {
        let server = TestServer::start();
        server.mount(
            Mock::given(method("GET"))
                .and(path("/fixtures.json"))
                .and(query_param("sql", "select 1"))
                .and(header("authorization", "Bearer xyz"))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(json!({"ok": true, "rows": [{"1": 1}]})),
                ),
        );

        let client = ApiClient::new(&format!("{}/", server.uri()), Some("xyz".to_string())).unwrap();
        let params = vec![("sql".to_string(), "select 1".to_string())];
        let value = client.get_json("/fixtures.json", &params).unwrap();
        assert_eq!(value["rows"], json!([{"1": 1}]));
    }

    #[test]
    fn test_no_authorization_header_without_token() {
        let server = TestServer::start();
        server.mount(
            Mock::given(method("GET"))
                .and(path("/.json"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!([]))),
        );

        let client = ApiClient::new(&server.uri(), None).unwrap();
        client.get_json("/.json", &[]).unwrap();

        let requests = server.received();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0]
            .headers
            .iter()
            .any(|(name, _)| name.as_str().eq_ignore_ascii_case("authorization")));
    }

    #[test]
    fn test_post_json_surfaces_errors() {
        let server = TestServer::start();
        server.mount(
            Mock::given(method("POST"))
                .and(path("/data/-/create"))
                .and(body_json(json!({"table": "t", "rows": [{"id": 1}]})))
                .respond_with(
                    ResponseTemplate::new(403).set_body_json(json!({"ok": false, "errors": ["Permission denied"]})),
                ),
        );

        let client = ApiClient::new(&server.uri(), Some("t".to_string())).unwrap();
        let err = client
            .post_json("/data/-/create", &json!({"table": "t", "rows": [{"id": 1}]}))
            .unwrap_err();
        assert_eq!(err.to_string(), "403 status code. Permission denied");
        assert!(err.hint().is_some());
    }

    #[test]
    fn test_get_raw_keeps_content_type() {
        let server = TestServer::start();
        server.mount(
            Mock::given(method("GET"))
                .and(path("/-/versions.txt"))
                .respond_with(ResponseTemplate::new(200).set_body_raw("hello", "text/plain")),
        );

        let client = ApiClient::new(&server.uri(), None).unwrap();
        let raw = client.get_raw("/-/versions.txt").unwrap();
        assert!(raw.is_success());
        assert!(!raw.is_json());
        assert_eq!(raw.body, "hello");
    }
}
