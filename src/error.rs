use thiserror::Error;

/// Errors raised while establishing an authenticated Graph session.
///
/// Missing credential material is detected before any network call and is
/// deliberately distinct from a failed login.
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("missing credential material: {0}")]
    MissingCredentials(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("could not confirm session context: {0}")]
    Context(#[from] RequestError),

    #[error("token cache error: {0}")]
    TokenCache(String),
}

/// Errors raised by the request invoker.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Graph API error (HTTP {status}): {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
        retry_after: Option<u64>,
    },

    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RequestError {
    /// Whether a retry policy may reasonably re-attempt this failure.
    /// Covers throttling, server errors, and transport-level failures.
    pub fn is_transient(&self) -> bool {
        match self {
            RequestError::Api { status, .. } => *status == 429 || (500..600).contains(status),
            RequestError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Server-suggested wait in seconds, when the response carried one.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            RequestError::Api { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Top-level error for the CLI and configuration layer.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("No valid token found. Please run 'graphctl login' first")]
    TokenNotFound,

    #[error("Tenant '{0}' not found")]
    TenantNotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Build an API error from a non-success response, extracting the Graph
/// `error.code` / `error.message` pair when the body carries one.
pub fn api_error(status: u16, body: &str, retry_after: Option<u64>) -> RequestError {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(error) = json.get("error") {
            let code = error
                .get("code")
                .and_then(|c| c.as_str())
                .unwrap_or("Unknown")
                .to_string();
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("No message")
                .to_string();
            let message = match hint_for(&code, &message) {
                Some(hint) => format!("{} (hint: {})", message, hint),
                None => message,
            };
            return RequestError::Api {
                status,
                code,
                message,
                retry_after,
            };
        }
    }

    RequestError::Api {
        status,
        code: "Unknown".to_string(),
        message: body.trim().to_string(),
        retry_after,
    }
}

/// Short remediation hints for the Graph error codes admins hit most often.
fn hint_for(code: &str, message: &str) -> Option<&'static str> {
    match code {
        "Unauthorized" | "InvalidAuthenticationToken" => {
            Some("your token may have expired, run 'graphctl login' again")
        }
        "Forbidden" | "InsufficientPrivileges" | "Authorization_RequestDenied" => {
            Some("check that the app registration has the required permissions and admin consent")
        }
        "BadRequest" if message.contains("Resource not found for the segment") => {
            Some("this endpoint may require the beta path or different permissions")
        }
        "NotFound" | "Request_ResourceNotFound" => {
            Some("the requested resource doesn't exist, check IDs and resource names")
        }
        "TooManyRequests" => Some("rate limit exceeded, wait a moment or use --retries"),
        _ => None,
    }
}
