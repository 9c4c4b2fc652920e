//! CLI argument definitions.
//!
//! Uses clap derive macros for type-safe argument parsing.

use clap::{Parser, Subcommand};

/// treechat - accounts, admin console and a branching chatbot API
#[derive(Parser, Debug)]
#[command(name = "treechat")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server
    Serve(ServeArgs),

    /// Run database migrations
    Migrate(MigrateArgs),

    /// Create an approved, verified admin account
    CreateAdmin(CreateAdminArgs),
}

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Host to bind to, overriding SERVER_HOST
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Port to listen on, overriding SERVER_PORT
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Arguments for the migrate command
#[derive(Parser, Debug)]
pub struct MigrateArgs {
    #[command(subcommand)]
    pub action: MigrateAction,
}

/// Migration actions
#[derive(Subcommand, Debug)]
pub enum MigrateAction {
    /// Run pending migrations
    Up,
    /// Rollback last migration
    Down,
    /// Show migration status
    Status,
    /// Reset and re-run all migrations
    Fresh,
}

/// Arguments for the create-admin command
#[derive(Parser, Debug)]
pub struct CreateAdminArgs {
    #[arg(long, env = "ADMIN_EMAIL")]
    pub email: String,

    #[arg(long, default_value = "Administrator")]
    pub name: String,

    /// At least 8 characters
    #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::parse_from(["treechat", "-v", "serve", "-H", "127.0.0.1", "-p", "8080"]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Serve(args) => {
                assert_eq!(args.host.as_deref(), Some("127.0.0.1"));
                assert_eq!(args.port, Some(8080));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_serve_defaults_come_from_config() {
        let cli = Cli::parse_from(["treechat", "serve"]);
        match cli.command {
            Commands::Serve(args) => {
                assert!(args.host.is_none());
                assert!(args.port.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_create_admin() {
        let cli = Cli::parse_from([
            "treechat",
            "create-admin",
            "--email",
            "root@example.com",
            "--password",
            "correct-horse",
        ]);
        match cli.command {
            Commands::CreateAdmin(args) => {
                assert_eq!(args.email, "root@example.com");
                assert_eq!(args.name, "Administrator");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_migrate_status() {
        let cli = Cli::parse_from(["treechat", "migrate", "status"]);
        assert!(matches!(
            cli.command,
            Commands::Migrate(MigrateArgs {
                action: MigrateAction::Status
            })
        ));
    }
}
