//! Crypted CLI - admin registry management tools.
//!
//! # Usage
//!
//! ```bash
//! # Grant panel access to a Firebase user
//! crypted-cli admins grant -u <uid> -e admin@crypted.app -n "Admin Name" -r moderator -p reports
//!
//! # Revoke panel access
//! crypted-cli admins revoke -u <uid>
//!
//! # List registry entries
//! crypted-cli admins list
//! ```
//!
//! # Environment Variables
//!
//! - `CLI_ADMIN_EMAIL` / `CLI_ADMIN_PASSWORD` - credentials of the super
//!   admin running the command
//! - `FIREBASE_API_KEY`, `FIREBASE_PROJECT_ID` - Firebase project, as for
//!   the panel server
//!
//! # Commands
//!
//! - `admins grant` - Create or replace a registry entry
//! - `admins revoke` - Delete a registry entry
//! - `admins list` - List registry entries, newest first

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::print_stdout)]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "crypted-cli")]
#[command(author, version, about = "Crypted CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the admin registry
    Admins {
        #[command(subcommand)]
        action: AdminsAction,
    },
}

#[derive(Subcommand)]
enum AdminsAction {
    /// Grant panel access: create or replace a registry entry
    Grant {
        /// Subject id of the Firebase user
        #[arg(short, long)]
        uid: String,

        /// Admin email address
        #[arg(short, long)]
        email: String,

        /// Admin display name
        #[arg(short, long)]
        name: String,

        /// Admin role (`super_admin`, `admin`, `moderator`, `analyst`)
        #[arg(short, long, default_value = "moderator")]
        role: String,

        /// Permission to grant (repeatable)
        #[arg(short, long = "permission")]
        permissions: Vec<String>,

        /// Grant every permission, current and future
        #[arg(long, conflicts_with = "permissions")]
        all_permissions: bool,
    },
    /// Revoke panel access: delete the registry entry
    Revoke {
        /// Subject id of the Firebase user
        #[arg(short, long)]
        uid: String,
    },
    /// List registry entries, newest first
    List {
        /// Maximum number of entries to print
        #[arg(short, long, default_value_t = 50)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
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
        Commands::Admins { action } => match action {
            AdminsAction::Grant {
                uid,
                email,
                name,
                role,
                permissions,
                all_permissions,
            } => {
                commands::admins::grant(&uid, &email, &name, &role, permissions, all_permissions)
                    .await?;
            }
            AdminsAction::Revoke { uid } => commands::admins::revoke(&uid).await?,
            AdminsAction::List { limit } => commands::admins::list(limit).await?,
        },
    }
    Ok(())
}
