//! Liveshop CLI - database migrations and back-office maintenance.
//!
//! # Usage
//!
//! ```bash
//! # Apply the back-office migrations
//! liveshop migrate
//!
//! # Create a staff account (password read from LIVESHOP_STAFF_PASSWORD)
//! LIVESHOP_STAFF_PASSWORD=... liveshop staff create -e lan@example.com -n "Lan" -r staff
//!
//! # List accounts, or reset a password the same way
//! liveshop staff list
//! LIVESHOP_STAFF_PASSWORD=... liveshop staff set-password -e lan@example.com
//!
//! # Rebuild oversell flags and sold quantities of a phase
//! liveshop oversell recompute --phase 12
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "liveshop")]
#[command(author, version, about = "Liveshop back-office tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage staff accounts
    Staff {
        #[command(subcommand)]
        action: StaffAction,
    },
    /// Oversell maintenance
    Oversell {
        #[command(subcommand)]
        action: OversellAction,
    },
}

#[derive(Subcommand)]
enum StaffAction {
    /// Create a new staff account
    Create {
        /// Login email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Role (`admin`, `staff`, `viewer`)
        #[arg(short, long, default_value = "staff")]
        role: String,
    },
    /// List staff accounts
    List,
    /// Replace a staff account's password
    SetPassword {
        /// Login email address
        #[arg(short, long)]
        email: String,
    },
}

#[derive(Subcommand)]
enum OversellAction {
    /// Recompute oversell flags for every product of a phase
    Recompute {
        /// Live phase ID
        #[arg(long)]
        phase: i32,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Staff { action } => match action {
            StaffAction::Create { email, name, role } => {
                commands::staff::create(&email, &name, &role).await?;
            }
            StaffAction::List => commands::staff::list().await?,
            StaffAction::SetPassword { email } => {
                commands::staff::set_password(&email).await?;
            }
        },
        Commands::Oversell { action } => match action {
            OversellAction::Recompute { phase } => {
                commands::oversell::recompute(phase).await?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_oversell_recompute() {
        let cli = Cli::try_parse_from(["liveshop", "oversell", "recompute", "--phase", "7"]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Oversell {
                action: OversellAction::Recompute { phase: 7 }
            })
        ));
    }

    #[test]
    fn test_staff_role_defaults_to_staff() {
        let cli = Cli::try_parse_from(["liveshop", "staff", "create", "-e", "a@b.vn", "-n", "A"]);
        match cli.map(|c| c.command) {
            Ok(Commands::Staff {
                action: StaffAction::Create { role, .. },
            }) => assert_eq!(role, "staff"),
            _ => panic!("unexpected parse result"),
        }
    }
}
