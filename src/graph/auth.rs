use crate::config::{AuthType, ConfigManager, TenantConfig, TokenCache};
use crate::error::ConnectError;
use crate::graph::{GraphClient, GraphRequest, GraphResult, SessionContext};
use oauth2::{
    basic::BasicClient, reqwest::async_http_client, AuthUrl, ClientId, ClientSecret,
    DeviceAuthorizationUrl, EmptyExtraDeviceAuthorizationFields, Scope, TokenResponse, TokenUrl,
};
use serde_json::Value;
use std::time::Duration;

pub struct GraphAuth {
    config_manager: ConfigManager,
}

impl GraphAuth {
    pub fn new(config_manager: ConfigManager) -> Self {
        Self { config_manager }
    }

    /// Establish an authenticated session for the tenant's environment.
    ///
    /// Credential material is checked before any network call; a login is
    /// only attempted once the selected flow is known to be satisfiable.
    /// Success is confirmed by reading the organization back through the
    /// new handle.
    pub async fn connect(
        &self,
        tenant: &TenantConfig,
        scopes: &[String],
    ) -> Result<GraphClient, ConnectError> {
        check_credentials(tenant)?;

        let token = match tenant.auth_type {
            AuthType::DeviceCode => self.login_device_code(tenant, scopes).await?,
            AuthType::ClientCredentials => self.login_client_credentials(tenant, scopes).await?,
        };

        self.config_manager
            .save_token(&tenant.name, &token)
            .map_err(|e| ConnectError::TokenCache(e.to_string()))?;

        let client = GraphClient::new(token.access_token.clone(), tenant.environment);
        let context = read_back_context(&client, tenant, scopes, token.expires_at).await?;
        Ok(client.with_context(context))
    }

    /// Rebuild a session handle from the cached token, without logging in.
    pub fn from_cache(&self, tenant: &TenantConfig) -> crate::error::Result<GraphClient> {
        let token = self.config_manager.load_token(&tenant.name)?;
        Ok(GraphClient::new(token.access_token, tenant.environment))
    }

    /// Authenticate using device code flow (interactive)
    async fn login_device_code(
        &self,
        tenant: &TenantConfig,
        scopes: &[String],
    ) -> Result<TokenCache, ConnectError> {
        println!(
            "🔐 Starting device code authentication for tenant '{}' ({})...",
            tenant.name, tenant.environment
        );

        let client = oauth_client(tenant, None)?.set_device_authorization_url(
            DeviceAuthorizationUrl::new(format!(
                "{}/{}/oauth2/v2.0/devicecode",
                tenant.environment.authority(),
                tenant.tenant_id
            ))
            .map_err(|e| ConnectError::Auth(format!("Invalid device auth URL: {}", e)))?,
        );

        let mut request = client
            .exchange_device_code()
            .map_err(|e| ConnectError::Auth(format!("Device code exchange failed: {}", e)))?;
        for scope in effective_scopes(tenant, scopes) {
            request = request.add_scope(Scope::new(scope));
        }

        let details: oauth2::DeviceAuthorizationResponse<EmptyExtraDeviceAuthorizationFields> =
            request.request_async(async_http_client).await.map_err(|e| {
                ConnectError::Auth(format!("Device authorization request failed: {}", e))
            })?;

        println!("\n📱 Please visit: {}", details.verification_uri().as_str());
        println!("🔑 Enter code: {}\n", details.user_code().secret());

        // Poll for token
        let token = client
            .exchange_device_access_token(&details)
            .request_async(async_http_client, tokio::time::sleep, None)
            .await
            .map_err(|e| ConnectError::Auth(format!("Token exchange failed: {}", e)))?;

        Ok(token_cache(tenant, &token))
    }

    /// Authenticate using client credentials flow (non-interactive)
    async fn login_client_credentials(
        &self,
        tenant: &TenantConfig,
        scopes: &[String],
    ) -> Result<TokenCache, ConnectError> {
        println!(
            "🔐 Authenticating with client credentials for tenant '{}' ({})...",
            tenant.name, tenant.environment
        );

        // Presence is guaranteed by the credential check.
        let secret = tenant.client_secret.clone().unwrap_or_default();
        let client = oauth_client(tenant, Some(secret))?;

        let mut request = client.exchange_client_credentials();
        for scope in effective_scopes(tenant, scopes) {
            request = request.add_scope(Scope::new(scope));
        }

        let token = request.request_async(async_http_client).await.map_err(|e| {
            ConnectError::Auth(format!("Client credentials exchange failed: {}", e))
        })?;

        Ok(token_cache(tenant, &token))
    }

    /// Logout (delete token cache)
    pub fn logout(&self, tenant_name: &str) -> crate::error::Result<()> {
        self.config_manager.delete_token(tenant_name)?;
        println!("✅ Logged out from tenant '{}'", tenant_name);
        Ok(())
    }
}

/// Fail fast when the selected flow cannot possibly succeed. Detecting this
/// here keeps "you gave me nothing to log in with" distinct from a rejected
/// login.
fn check_credentials(tenant: &TenantConfig) -> Result<(), ConnectError> {
    if tenant.tenant_id.trim().is_empty() {
        return Err(ConnectError::MissingCredentials("tenant id is empty".into()));
    }
    if tenant.client_id.trim().is_empty() {
        return Err(ConnectError::MissingCredentials("client id is empty".into()));
    }
    if matches!(tenant.auth_type, AuthType::ClientCredentials)
        && tenant.client_secret.as_deref().map_or(true, str::is_empty)
    {
        return Err(ConnectError::MissingCredentials(
            "client secret is required for the client credentials flow".into(),
        ));
    }
    Ok(())
}

fn oauth_client(
    tenant: &TenantConfig,
    secret: Option<String>,
) -> Result<BasicClient, ConnectError> {
    let authority = tenant.environment.authority();

    let auth_url = AuthUrl::new(format!(
        "{}/{}/oauth2/v2.0/authorize",
        authority, tenant.tenant_id
    ))
    .map_err(|e| ConnectError::Auth(format!("Invalid auth URL: {}", e)))?;

    let token_url = TokenUrl::new(format!(
        "{}/{}/oauth2/v2.0/token",
        authority, tenant.tenant_id
    ))
    .map_err(|e| ConnectError::Auth(format!("Invalid token URL: {}", e)))?;

    Ok(BasicClient::new(
        ClientId::new(tenant.client_id.clone()),
        secret.map(ClientSecret::new),
        auth_url,
        Some(token_url),
    ))
}

/// Declared scopes, or the environment's `/.default` scope when none given.
fn effective_scopes(tenant: &TenantConfig, scopes: &[String]) -> Vec<String> {
    if scopes.is_empty() {
        vec![tenant.environment.default_scope()]
    } else {
        scopes.to_vec()
    }
}

fn token_cache(tenant: &TenantConfig, token: &impl TokenResponse<oauth2::basic::BasicTokenType>) -> TokenCache {
    let expires_at = chrono::Utc::now()
        + chrono::Duration::from_std(token.expires_in().unwrap_or(Duration::from_secs(3600)))
            .unwrap_or_else(|_| chrono::Duration::seconds(3600));

    TokenCache {
        access_token: token.access_token().secret().clone(),
        refresh_token: token.refresh_token().map(|t| t.secret().clone()),
        expires_at,
        tenant_id: tenant.tenant_id.clone(),
    }
}

/// Confirm the login by reading the organization through the new handle.
/// The signed-in account is resolved best-effort; app-only sessions have
/// no user to report.
async fn read_back_context(
    client: &GraphClient,
    tenant: &TenantConfig,
    scopes: &[String],
    expires_at: chrono::DateTime<chrono::Utc>,
) -> Result<SessionContext, ConnectError> {
    let organization = client.invoke(&GraphRequest::get("v1.0/organization")).await?;
    let tenant_name = match organization {
        GraphResult::Collection(items) => items
            .into_iter()
            .next()
            .and_then(|org| string_field(&org, "displayName")),
        GraphResult::Object(org) => string_field(&org, "displayName"),
    };

    let account = match tenant.auth_type {
        AuthType::DeviceCode => match client.invoke(&GraphRequest::get("v1.0/me")).await {
            Ok(GraphResult::Object(me)) => string_field(&me, "userPrincipalName"),
            _ => None,
        },
        AuthType::ClientCredentials => None,
    };

    Ok(SessionContext {
        tenant_id: tenant.tenant_id.clone(),
        tenant_name,
        account,
        scopes: effective_scopes(tenant, scopes),
        expires_at,
    })
}

fn string_field(value: &Value, field: &str) -> Option<String> {
    value.get(field).and_then(Value::as_str).map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::CloudEnvironment;

    fn tenant(auth_type: AuthType, secret: Option<&str>) -> TenantConfig {
        TenantConfig {
            name: "TEST".into(),
            tenant_id: "00000000-0000-0000-0000-000000000000".into(),
            client_id: "11111111-1111-1111-1111-111111111111".into(),
            client_secret: secret.map(str::to_owned),
            auth_type,
            environment: CloudEnvironment::Global,
            description: None,
        }
    }

    #[test]
    fn app_flow_without_secret_fails_before_any_network_call() {
        let result = check_credentials(&tenant(AuthType::ClientCredentials, None));
        assert!(matches!(result, Err(ConnectError::MissingCredentials(_))));

        let result = check_credentials(&tenant(AuthType::ClientCredentials, Some("")));
        assert!(matches!(result, Err(ConnectError::MissingCredentials(_))));
    }

    #[test]
    fn device_flow_needs_no_secret() {
        assert!(check_credentials(&tenant(AuthType::DeviceCode, None)).is_ok());
    }

    #[test]
    fn empty_client_id_is_missing_credentials() {
        let mut t = tenant(AuthType::DeviceCode, None);
        t.client_id = String::new();
        assert!(matches!(
            check_credentials(&t),
            Err(ConnectError::MissingCredentials(_))
        ));
    }

    #[test]
    fn empty_scope_set_falls_back_to_default_scope() {
        let t = tenant(AuthType::DeviceCode, None);
        assert_eq!(
            effective_scopes(&t, &[]),
            vec!["https://graph.microsoft.com/.default".to_string()]
        );
        let declared = vec!["DeviceManagementConfiguration.ReadWrite.All".to_string()];
        assert_eq!(effective_scopes(&t, &declared), declared);
    }
}
