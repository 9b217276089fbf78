use clap::Args;
use colored::Colorize;
use graphctl::config::ConfigManager;
use graphctl::error::{Error, Result};
use graphctl::graph::auth::GraphAuth;
use graphctl::graph::{
    parse_method, GraphRequest, GraphResult, RequestBody, RetryPolicy, DEFAULT_CONTENT_TYPE,
};
use std::fs;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Graph path (e.g. "v1.0/deviceManagement/managedDevices") or an
    /// absolute URL, which bypasses the tenant's environment base
    #[arg(index = 1)]
    path: String,

    /// HTTP method (GET, POST, PUT, PATCH, DELETE)
    #[arg(short, long, default_value = "GET")]
    method: String,

    /// Request body. JSON text is sent as-is; anything else is sent as a
    /// JSON string literal
    #[arg(short, long, conflicts_with = "body_file")]
    body: Option<String>,

    /// Read the request body from a file
    #[arg(long)]
    body_file: Option<String>,

    /// Content type of the request body
    #[arg(long, default_value = DEFAULT_CONTENT_TYPE)]
    content_type: String,

    /// Tenant to call as (defaults to the active tenant)
    #[arg(short, long)]
    tenant: Option<String>,

    /// Retry transient failures (429/5xx) up to this many extra attempts
    #[arg(long, default_value_t = 0)]
    retries: u32,

    /// Fixed delay between retries, in seconds. A server-provided
    /// Retry-After takes precedence
    #[arg(long, default_value_t = 5)]
    retry_delay: u64,
}

pub async fn call(args: CallArgs) -> Result<()> {
    let config_manager = ConfigManager::new()?;

    let tenant = match &args.tenant {
        Some(name) => config_manager.get_tenant(name)?,
        None => config_manager
            .get_active_tenant()?
            .ok_or_else(|| Error::Config("No active tenant. Run 'graphctl login' first".into()))?,
    };

    let auth = GraphAuth::new(config_manager);
    let client = auth.from_cache(&tenant)?;

    let method = parse_method(&args.method)?;
    let mut request = GraphRequest::new(method, &args.path);

    let body_text = match (&args.body, &args.body_file) {
        (Some(text), _) => Some(text.clone()),
        (None, Some(path)) => Some(fs::read_to_string(path)?),
        (None, None) => None,
    };
    if let Some(text) = body_text {
        // The JSON sniffing policy only makes sense for JSON payloads;
        // other content types go over the wire untouched.
        let body = if args.content_type.contains("json") {
            RequestBody::from_text(text)
        } else {
            RequestBody::raw(text)
        };
        request = request.with_body(body);
    }
    request = request.with_content_type(&args.content_type);

    let policy = RetryPolicy::new(args.retries, Duration::from_secs(args.retry_delay));
    let result = policy.run(|| client.invoke(&request)).await?;

    match result {
        GraphResult::Collection(items) => {
            eprintln!("{} {} item(s)", "✓".green(), items.len());
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::Value::Array(items))?
            );
        }
        GraphResult::Object(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }

    Ok(())
}
