pub mod auth;

use crate::error::{self, RequestError};
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::time::Duration;

pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// National-cloud deployment of Microsoft Graph.
///
/// Each environment pairs a Graph base URL with the login authority tokens
/// must be issued from. An unrecognized selector resolves to the global
/// cloud; that permissive default is intentional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CloudEnvironment {
    #[default]
    Global,
    UsGov,
    UsGovDod,
    China,
    Germany,
}

impl CloudEnvironment {
    pub const ALL: [CloudEnvironment; 5] = [
        CloudEnvironment::Global,
        CloudEnvironment::UsGov,
        CloudEnvironment::UsGovDod,
        CloudEnvironment::China,
        CloudEnvironment::Germany,
    ];

    /// Resolve a selector name. Unknown names fall back to the global cloud.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "usgov" | "gcc" => CloudEnvironment::UsGov,
            "usgovdod" | "dod" => CloudEnvironment::UsGovDod,
            "china" => CloudEnvironment::China,
            "germany" => CloudEnvironment::Germany,
            _ => CloudEnvironment::Global,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CloudEnvironment::Global => "global",
            CloudEnvironment::UsGov => "usgov",
            CloudEnvironment::UsGovDod => "usgovdod",
            CloudEnvironment::China => "china",
            CloudEnvironment::Germany => "germany",
        }
    }

    pub fn graph_base(&self) -> &'static str {
        match self {
            CloudEnvironment::Global => "https://graph.microsoft.com",
            CloudEnvironment::UsGov => "https://graph.microsoft.us",
            CloudEnvironment::UsGovDod => "https://dod-graph.microsoft.us",
            CloudEnvironment::China => "https://microsoftgraph.chinacloudapi.cn",
            CloudEnvironment::Germany => "https://graph.microsoft.de",
        }
    }

    /// OAuth authority issuing tokens for this cloud.
    pub fn authority(&self) -> &'static str {
        match self {
            CloudEnvironment::Global => "https://login.microsoftonline.com",
            CloudEnvironment::UsGov | CloudEnvironment::UsGovDod => {
                "https://login.microsoftonline.us"
            }
            CloudEnvironment::China => "https://login.chinacloudapi.cn",
            CloudEnvironment::Germany => "https://login.microsoftonline.de",
        }
    }

    /// The `/.default` scope covering all statically consented permissions.
    pub fn default_scope(&self) -> String {
        format!("{}/.default", self.graph_base())
    }
}

impl From<String> for CloudEnvironment {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

impl From<CloudEnvironment> for String {
    fn from(env: CloudEnvironment) -> Self {
        env.name().to_string()
    }
}

impl fmt::Display for CloudEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Request payload with an explicit serialization policy per variant.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Pre-formed JSON text, sent through unchanged.
    RawJson(String),
    /// A bare string payload, sent as a JSON string literal.
    ScalarString(String),
    /// A structured value serialized with serde_json.
    Structured(Value),
}

impl RequestBody {
    /// Classify caller-supplied text: valid JSON passes through unchanged,
    /// anything else is treated as a bare scalar string.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        if serde_json::from_str::<Value>(&text).is_ok() {
            RequestBody::RawJson(text)
        } else {
            RequestBody::ScalarString(text)
        }
    }

    /// Unchecked passthrough, for payloads that are not JSON at all
    /// (certificate blobs and the like, paired with a content-type override).
    pub fn raw(text: impl Into<String>) -> Self {
        RequestBody::RawJson(text.into())
    }

    /// Wire representation of the payload.
    pub fn to_payload(&self) -> Result<String, RequestError> {
        match self {
            RequestBody::RawJson(text) => Ok(text.clone()),
            RequestBody::ScalarString(text) => Ok(serde_json::to_string(text)?),
            RequestBody::Structured(value) => Ok(serde_json::to_string(value)?),
        }
    }
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        RequestBody::Structured(value)
    }
}

/// Restrict methods to the verbs the Graph API actually serves.
pub fn parse_method(name: &str) -> Result<Method, RequestError> {
    match name.to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "PATCH" => Ok(Method::PATCH),
        "DELETE" => Ok(Method::DELETE),
        other => Err(RequestError::UnsupportedMethod(other.to_string())),
    }
}

/// One logical request against the Graph API.
///
/// The target may be a path relative to the session's environment or a
/// fully-qualified URL, which bypasses the environment base entirely.
#[derive(Debug, Clone)]
pub struct GraphRequest {
    pub target: String,
    pub method: Method,
    pub body: Option<RequestBody>,
    pub content_type: String,
}

impl GraphRequest {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            method,
            body: None,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
        }
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::GET, target)
    }

    pub fn post(target: impl Into<String>, body: RequestBody) -> Self {
        Self::new(Method::POST, target).with_body(body)
    }

    pub fn patch(target: impl Into<String>, body: RequestBody) -> Self {
        Self::new(Method::PATCH, target).with_body(body)
    }

    pub fn delete(target: impl Into<String>) -> Self {
        Self::new(Method::DELETE, target)
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }
}

/// Fully aggregated outcome of one logical request.
///
/// Collection responses are flattened across all pages in arrival order;
/// anything without a `value` array comes back whole.
#[derive(Debug)]
pub enum GraphResult {
    Collection(Vec<Value>),
    Object(Value),
}

impl GraphResult {
    pub fn into_value(self) -> Value {
        match self {
            GraphResult::Collection(items) => Value::Array(items),
            GraphResult::Object(value) => value,
        }
    }
}

/// Bounded retry for transient failures, composed around `invoke` rather
/// than baked into it. The default policy performs no retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// Run an operation, re-attempting transient failures up to the bound.
    /// A `Retry-After` carried by the error takes precedence over the fixed
    /// delay. Non-transient failures surface immediately.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, RequestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RequestError>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.attempts && e.is_transient() => {
                    let wait = e
                        .retry_after()
                        .map(Duration::from_secs)
                        .unwrap_or(self.delay);
                    eprintln!(
                        "Transient error: {}. Retrying in {:?}... (attempt {}/{})",
                        e,
                        wait,
                        attempt + 1,
                        self.attempts
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Session context captured when a login is confirmed.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub tenant_id: String,
    pub tenant_name: Option<String>,
    pub account: Option<String>,
    pub scopes: Vec<String>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

/// Authenticated handle against one Graph environment.
///
/// The handle owns the resolved base URL, so two clients against different
/// national clouds can coexist in one process without shared state.
pub struct GraphClient {
    http: Client,
    access_token: String,
    environment: CloudEnvironment,
    context: Option<SessionContext>,
}

impl GraphClient {
    pub fn new(access_token: String, environment: CloudEnvironment) -> Self {
        Self {
            http: Client::new(),
            access_token,
            environment,
            context: None,
        }
    }

    pub(crate) fn with_context(mut self, context: SessionContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn environment(&self) -> CloudEnvironment {
        self.environment
    }

    pub fn context(&self) -> Option<&SessionContext> {
        self.context.as_ref()
    }

    /// Join a relative path onto the environment base with exactly one
    /// separating slash. Fully-qualified targets are used verbatim.
    fn resolve_url(&self, target: &str) -> String {
        if target.starts_with("https://") || target.starts_with("http://") {
            target.to_string()
        } else {
            format!(
                "{}/{}",
                self.environment.graph_base().trim_end_matches('/'),
                target.trim_start_matches('/')
            )
        }
    }

    /// Perform one logical request, following `@odata.nextLink` until the
    /// collection is exhausted.
    ///
    /// The first request carries the caller's method, body, and content
    /// type; every continuation fetch is a plain GET of the link with no
    /// body. Any failed page fetch aborts the whole call, a partial
    /// aggregate is never returned.
    pub async fn invoke(&self, request: &GraphRequest) -> Result<GraphResult, RequestError> {
        let url = self.resolve_url(&request.target);
        let mut page = self
            .send(
                request.method.clone(),
                &url,
                request.body.as_ref(),
                &request.content_type,
            )
            .await?;

        if !page.get("value").map(Value::is_array).unwrap_or(false) {
            // Non-collection response: the whole body is the result.
            return Ok(GraphResult::Object(page));
        }

        let mut items: Vec<Value> = Vec::new();
        loop {
            if let Some(Value::Array(batch)) = page.get_mut("value").map(Value::take) {
                items.extend(batch);
            }
            match next_link(&page) {
                Some(next) => {
                    page = self.send(Method::GET, &next, None, DEFAULT_CONTENT_TYPE).await?;
                }
                None => break,
            }
        }
        Ok(GraphResult::Collection(items))
    }

    /// Issue a single page fetch and decode the body. Empty bodies (204
    /// responses) decode to JSON null.
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&RequestBody>,
        content_type: &str,
    ) -> Result<Value, RequestError> {
        let mut builder = self
            .http
            .request(method, url)
            .bearer_auth(&self.access_token);

        if let Some(body) = body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, content_type.to_string())
                .body(body.to_payload()?);
        }

        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let text = response.text().await.unwrap_or_default();
            return Err(error::api_error(status.as_u16(), &text, retry_after));
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

/// Extract the continuation pointer, if any. Graph names it
/// `@odata.nextLink`; matching on the suffix tolerates prefix variations.
fn next_link(page: &Value) -> Option<String> {
    page.as_object()?
        .iter()
        .find(|(key, _)| key.ends_with("nextLink"))
        .and_then(|(_, v)| v.as_str())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn environment_table_matches_fixed_literals() {
        assert_eq!(
            CloudEnvironment::Global.graph_base(),
            "https://graph.microsoft.com"
        );
        assert_eq!(
            CloudEnvironment::UsGov.graph_base(),
            "https://graph.microsoft.us"
        );
        assert_eq!(
            CloudEnvironment::UsGovDod.graph_base(),
            "https://dod-graph.microsoft.us"
        );
        assert_eq!(
            CloudEnvironment::China.graph_base(),
            "https://microsoftgraph.chinacloudapi.cn"
        );
        assert_eq!(
            CloudEnvironment::Germany.graph_base(),
            "https://graph.microsoft.de"
        );
    }

    #[test]
    fn unknown_selector_falls_back_to_global() {
        assert_eq!(
            CloudEnvironment::from_name("antarctica"),
            CloudEnvironment::Global
        );
        assert_eq!(CloudEnvironment::from_name(""), CloudEnvironment::Global);
        assert_eq!(
            CloudEnvironment::from_name("USGOV"),
            CloudEnvironment::UsGov
        );
    }

    #[test]
    fn relative_paths_join_with_exactly_one_slash() {
        let client = GraphClient::new("t".into(), CloudEnvironment::Global);
        assert_eq!(
            client.resolve_url("v1.0/organization"),
            "https://graph.microsoft.com/v1.0/organization"
        );
        assert_eq!(
            client.resolve_url("/beta/deviceManagement"),
            "https://graph.microsoft.com/beta/deviceManagement"
        );
    }

    #[test]
    fn absolute_urls_bypass_the_environment_base() {
        let client = GraphClient::new("t".into(), CloudEnvironment::UsGov);
        assert_eq!(
            client.resolve_url("https://example.test/v1.0/users"),
            "https://example.test/v1.0/users"
        );
    }

    #[test]
    fn valid_json_text_passes_through_unchanged() {
        let body = RequestBody::from_text(r#"{"displayName":"Baseline"}"#);
        assert_eq!(
            body.to_payload().unwrap(),
            r#"{"displayName":"Baseline"}"#
        );
    }

    #[test]
    fn non_json_text_becomes_a_quoted_string_literal() {
        let body = RequestBody::from_text("retire");
        assert_eq!(body.to_payload().unwrap(), "\"retire\"");

        let body = RequestBody::from_text("say \"hi\"");
        assert_eq!(body.to_payload().unwrap(), "\"say \\\"hi\\\"\"");
    }

    #[test]
    fn structured_bodies_serialize_deeply_nested_values() {
        let mut value = json!("leaf");
        for _ in 0..12 {
            value = json!({ "child": value });
        }
        let payload = RequestBody::from(value.clone()).to_payload().unwrap();
        assert_eq!(serde_json::from_str::<Value>(&payload).unwrap(), value);
    }

    #[test]
    fn next_link_matches_on_suffix() {
        let page = json!({
            "value": [],
            "@odata.nextLink": "https://graph.microsoft.com/v1.0/users?$skiptoken=abc"
        });
        assert_eq!(
            next_link(&page).as_deref(),
            Some("https://graph.microsoft.com/v1.0/users?$skiptoken=abc")
        );
        assert_eq!(next_link(&json!({ "value": [] })), None);
    }

    #[test]
    fn only_graph_verbs_are_accepted() {
        assert_eq!(parse_method("get").unwrap(), Method::GET);
        assert_eq!(parse_method("Patch").unwrap(), Method::PATCH);
        assert!(matches!(
            parse_method("HEAD"),
            Err(RequestError::UnsupportedMethod(_))
        ));
    }
}
