use clap::Args;
use colored::Colorize;
use graphctl::config::{AuthType, ConfigManager, TenantConfig};
use graphctl::error::Result;
use graphctl::graph::CloudEnvironment;

#[derive(Args, Debug)]
pub struct TenantAddArgs {
    /// Tenant name (used to reference this tenant in other commands)
    #[arg(index = 1)]
    name: String,

    /// Tenant ID (Azure AD tenant ID)
    #[arg(long)]
    tenant_id: String,

    /// Client ID (Application ID)
    #[arg(long)]
    client_id: String,

    /// Client secret (enables the client credentials flow)
    #[arg(long)]
    client_secret: Option<String>,

    /// National cloud environment (global, usgov, usgovdod, china, germany)
    #[arg(long, short, default_value = "global")]
    environment: String,

    /// Tenant description
    #[arg(long)]
    description: Option<String>,
}

#[derive(Args, Debug)]
pub struct TenantRemoveArgs {
    /// Tenant name
    #[arg(index = 1)]
    name: String,
}

#[derive(Args, Debug)]
pub struct TenantUseArgs {
    /// Tenant name
    #[arg(index = 1)]
    name: String,
}

pub fn add(args: TenantAddArgs) -> Result<()> {
    let config_manager = ConfigManager::new()?;

    let auth_type = if args.client_secret.is_some() {
        AuthType::ClientCredentials
    } else {
        AuthType::DeviceCode
    };

    let environment = CloudEnvironment::from_name(&args.environment);
    let tenant = TenantConfig {
        name: args.name.clone(),
        tenant_id: args.tenant_id,
        client_id: args.client_id,
        client_secret: args.client_secret,
        auth_type,
        environment,
        description: args.description,
    };

    config_manager.add_tenant(tenant)?;
    println!(
        "{} Tenant '{}' saved ({})",
        "✓".green(),
        args.name.bold(),
        environment
    );
    Ok(())
}

pub fn list() -> Result<()> {
    let config_manager = ConfigManager::new()?;
    let tenants = config_manager.load_tenants()?;
    let active = config_manager.load_config()?.current_tenant;

    if tenants.is_empty() {
        println!("{} No tenants configured", "!".yellow());
        return Ok(());
    }

    for tenant in tenants {
        let marker = if active.as_deref() == Some(tenant.name.as_str()) {
            "●".green()
        } else {
            "○".normal()
        };
        let flow = match tenant.auth_type {
            AuthType::DeviceCode => "device code",
            AuthType::ClientCredentials => "client credentials",
        };
        println!(
            "{} {} [{}] {} {}",
            marker,
            tenant.name.bold(),
            tenant.environment,
            flow,
            tenant.description.as_deref().unwrap_or("").dimmed()
        );
    }
    Ok(())
}

pub fn remove(args: TenantRemoveArgs) -> Result<()> {
    let config_manager = ConfigManager::new()?;
    config_manager.remove_tenant(&args.name)?;
    println!("{} Tenant '{}' removed", "✓".green(), args.name);
    Ok(())
}

pub fn use_tenant(args: TenantUseArgs) -> Result<()> {
    let config_manager = ConfigManager::new()?;
    config_manager.set_active_tenant(&args.name)?;
    println!("{} Active tenant: {}", "→".cyan(), args.name.bold());
    Ok(())
}
