mod cmd;

use clap::{Parser, Subcommand};
use colored::Colorize;
use graphctl::graph::CloudEnvironment;

#[derive(Parser, Debug)]
#[command(
    name = "graphctl",
    about = "Authenticated, paginated Microsoft Graph requests from the command line",
    version,
    long_about = "Issue Microsoft Graph API requests against any national cloud.\n\n\
                  Authenticates via device code or client credentials, follows\n\
                  @odata.nextLink pagination automatically, and prints the full\n\
                  aggregated result as JSON."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Authenticate to Microsoft Graph API
    Login(cmd::login::LoginArgs),

    /// Logout and clear cached credentials
    Logout(cmd::login::LogoutArgs),

    /// Manage tenant configurations
    #[command(subcommand)]
    Tenant(TenantCommands),

    /// Issue a Graph API request and print the aggregated result
    Call(cmd::call::CallArgs),

    /// List the supported national-cloud environments
    Environments,
}

#[derive(Subcommand, Debug)]
enum TenantCommands {
    /// Add a new tenant configuration
    Add(cmd::tenant::TenantAddArgs),

    /// List all configured tenants
    List,

    /// Remove a tenant configuration
    Remove(cmd::tenant::TenantRemoveArgs),

    /// Set the active tenant
    Use(cmd::tenant::TenantUseArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Login(args) => cmd::login::login(args).await,
        Commands::Logout(args) => cmd::login::logout(args).await,
        Commands::Tenant(TenantCommands::Add(args)) => cmd::tenant::add(args),
        Commands::Tenant(TenantCommands::List) => cmd::tenant::list(),
        Commands::Tenant(TenantCommands::Remove(args)) => cmd::tenant::remove(args),
        Commands::Tenant(TenantCommands::Use(args)) => cmd::tenant::use_tenant(args),
        Commands::Call(args) => cmd::call::call(args).await,
        Commands::Environments => {
            print_environments();
            Ok(())
        }
    };

    if let Err(e) = outcome {
        eprintln!("{} {}", "✗".red(), e);
        std::process::exit(1);
    }
}

fn print_environments() {
    println!("{:<10} {:<42} {}", "NAME".bold(), "GRAPH".bold(), "AUTHORITY".bold());
    for env in CloudEnvironment::ALL {
        println!(
            "{:<10} {:<42} {}",
            env.name(),
            env.graph_base(),
            env.authority()
        );
    }
}
