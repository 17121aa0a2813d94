//! RoleBridge - role queries against LDAP and Active Directory
//!
//! Resolves role existence, membership and role listings the way the
//! application-facing role provider does, from the command line.

mod output;

use clap::{Parser, Subcommand};
use rolebridge_core::RoleBridgeConfig;
use rolebridge_ldap::{LdapDirectory, RoleAdapter};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "rolebridge")]
#[command(author = "RoleBridge Team")]
#[command(version = rolebridge_core::VERSION)]
#[command(about = "Role queries against an LDAP directory", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// LDAP server URL
    #[arg(long, global = true, env = "ROLEBRIDGE_LDAP_URL")]
    server_url: Option<String>,

    /// Force ranged retrieval of group members on or off
    #[arg(long, global = true)]
    range_retrieval: Option<bool>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "ROLEBRIDGE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Print answers as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a role exists
    RoleExists { role: String },

    /// Check whether a user holds a role
    IsUserInRole { username: String, role: String },

    /// List the roles of a user
    RolesForUser { username: String },

    /// List the members of a role
    UsersInRole { role: String },

    /// List every role
    AllRoles,

    /// Print the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Load or create config
    let mut config = if let Some(config_path) = &cli.config {
        RoleBridgeConfig::from_file(config_path)?
    } else {
        RoleBridgeConfig::from_env()
    };

    // Override with CLI args
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(url) = &cli.server_url {
        config.ldap.server_url = url.clone();
    }
    if let Some(ranged) = cli.range_retrieval {
        config.ldap.server.range_retrieval_support = ranged;
    }

    init_logging(&config);

    if let Commands::ShowConfig = cli.command {
        let mut shown = config.clone();
        shown.ldap = shown.ldap.masked();
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }

    config.ldap.validate()?;

    info!(
        "Querying {} ({:?})",
        config.ldap.server_url, config.ldap.server_type
    );

    let adapter = LdapDirectory::new(config.ldap).into_role_adapter();
    let answer = run_query(&adapter, &cli.command, cli.json).await?;
    println!("{}", answer);

    Ok(())
}

fn init_logging(config: &RoleBridgeConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    // Answers go to stdout, logs to stderr
    if config.logging.is_json() {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .with(filter)
            .init();
    }
}

async fn run_query(adapter: &RoleAdapter, command: &Commands, json: bool) -> anyhow::Result<String> {
    let answer = match command {
        Commands::RoleExists { role } => output::render_flag(adapter.role_exists(role).await?, json),
        Commands::IsUserInRole { username, role } => {
            output::render_flag(adapter.is_user_in_role(username, role).await?, json)
        }
        Commands::RolesForUser { username } => {
            output::render_names(&adapter.roles_for_user(username).await?, json)?
        }
        Commands::UsersInRole { role } => {
            info!("Resolving members with {} retrieval", adapter.strategy_name());
            output::render_names(&adapter.users_in_role(role).await?, json)?
        }
        Commands::AllRoles => output::render_names(&adapter.all_roles().await?, json)?,
        Commands::ShowConfig => anyhow::bail!("show-config does not query the directory"),
    };
    Ok(answer)
}
