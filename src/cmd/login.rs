use clap::Args;
use colored::Colorize;
use graphctl::config::{AuthType, ConfigManager, TenantConfig};
use graphctl::error::Result;
use graphctl::graph::auth::GraphAuth;
use graphctl::graph::CloudEnvironment;

/// Safely truncate a string to n characters (not bytes) to prevent panics on non-ASCII
fn truncate_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Name of a configured tenant
    #[arg(index = 1)]
    name: Option<String>,

    /// Tenant ID (Azure AD tenant ID) for quick setup
    #[arg(long)]
    tenant_id: Option<String>,

    /// Client ID (Application ID) for quick setup
    #[arg(long)]
    client_id: Option<String>,

    /// Client secret (for client credentials flow)
    #[arg(long)]
    client_secret: Option<String>,

    /// Use client credentials flow instead of device code
    #[arg(long)]
    client_credentials: bool,

    /// National cloud environment (global, usgov, usgovdod, china, germany).
    /// Unrecognized names resolve to global.
    #[arg(long, short)]
    environment: Option<String>,

    /// Permission scope to request (repeatable; defaults to the
    /// environment's /.default Graph scope)
    #[arg(long = "scope")]
    scopes: Vec<String>,

    /// Tenant description
    #[arg(long)]
    description: Option<String>,
}

#[derive(Args, Debug)]
pub struct LogoutArgs {
    /// Tenant name
    #[arg(short, long)]
    tenant: Option<String>,

    /// Logout from all tenants
    #[arg(long)]
    all: bool,
}

pub async fn login(args: LoginArgs) -> Result<()> {
    let config_manager = ConfigManager::new()?;
    let auth = GraphAuth::new(config_manager.clone());

    let mut tenant_config = if let Some(name) = &args.name {
        let tenant = config_manager.get_tenant(name)?;
        println!(
            "{} Loaded tenant: {} ({})",
            "✓".green(),
            tenant.name.bold(),
            tenant.description.as_deref().unwrap_or("")
        );
        println!("  Tenant ID: {}...", truncate_chars(&tenant.tenant_id, 8));
        println!("  Client ID: {}...", truncate_chars(&tenant.client_id, 8));
        tenant
    } else if let (Some(tenant_id), Some(client_id)) = (&args.tenant_id, &args.client_id) {
        println!(
            "{} Quick setup mode: Creating tenant configuration...",
            "→".cyan()
        );

        let name = tenant_id.split('-').next().unwrap_or("my-tenant").to_string();
        let auth_type = if args.client_credentials || args.client_secret.is_some() {
            AuthType::ClientCredentials
        } else {
            AuthType::DeviceCode
        };

        let tenant = TenantConfig {
            name: name.clone(),
            tenant_id: tenant_id.clone(),
            client_id: client_id.clone(),
            client_secret: args.client_secret.clone(),
            auth_type,
            environment: CloudEnvironment::default(),
            description: args.description.clone(),
        };

        config_manager.add_tenant(tenant.clone())?;
        println!("{} Tenant '{}' configuration saved", "✓".green(), name);

        tenant
    } else {
        return Err(graphctl::error::Error::Config(
            "Usage:\n  \
            graphctl login NAME                           # Use existing config\n  \
            graphctl login --tenant-id ID --client-id ID  # Quick setup"
                .into(),
        ));
    };

    // A command-line environment override wins over the stored one and is
    // persisted for subsequent calls.
    if let Some(env_name) = &args.environment {
        tenant_config.environment = CloudEnvironment::from_name(env_name);
        config_manager.add_tenant(tenant_config.clone())?;
    }

    let client = auth.connect(&tenant_config, &args.scopes).await?;

    if let Some(context) = client.context() {
        println!("\n{} Authentication successful", "✓".green());
        println!(
            "  Tenant:      {} ({})",
            context.tenant_name.as_deref().unwrap_or("unknown").bold(),
            truncate_chars(&context.tenant_id, 8)
        );
        if let Some(account) = &context.account {
            println!("  Account:     {}", account);
        }
        println!("  Environment: {}", client.environment());
        println!("  Scopes:      {}", context.scopes.join(", "));
        println!(
            "  Expires:     {}",
            context.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }

    config_manager.set_active_tenant(&tenant_config.name)?;
    println!(
        "\n{} Active tenant: {}",
        "→".cyan(),
        tenant_config.name.bold()
    );
    Ok(())
}

pub async fn logout(args: LogoutArgs) -> Result<()> {
    let config_manager = ConfigManager::new()?;
    let auth = GraphAuth::new(config_manager.clone());

    if args.all {
        let tenants = config_manager.load_tenants()?;

        for tenant in &tenants {
            auth.logout(&tenant.name)?;
        }

        println!("{} Logged out from all tenants", "✓".green());
    } else if let Some(tenant_name) = &args.tenant {
        auth.logout(tenant_name)?;
    } else {
        let config = config_manager.load_config()?;

        if let Some(current_tenant) = config.current_tenant {
            auth.logout(&current_tenant)?;
        } else {
            println!("{} No active tenant", "!".yellow());
        }
    }

    Ok(())
}
