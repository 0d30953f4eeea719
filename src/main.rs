// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! ScoutComp command-line client
//!
//! Logs in to a ScoutComp server, keeps the session on disk, and shows the
//! current user's profile and permissions.

use anyhow::Context;
use clap::{Parser, Subcommand};
use scoutcomp_session::models::{
    ForcePasswordChangeRequest, LoginRequest, PasswordChangeRequest, RegistrationRequest,
};
use scoutcomp_session::services::SessionSnapshot;
use scoutcomp_session::{ClientConfig, ClientError, ScoutClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "scoutcomp", about = "ScoutComp session client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and store the session
    Login {
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Register a new account and store the session
    Register {
        username: String,
        #[arg(long)]
        real_name: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        email: Option<String>,
        /// Team join code (required for members)
        #[arg(long)]
        join_code: Option<String>,
        #[arg(long)]
        language: Option<String>,
    },
    /// Set a new password for an account that must change it before logging in
    ChangePassword {
        username: String,
        #[arg(long)]
        old_password: String,
        #[arg(long)]
        new_password: String,
    },
    /// Change the logged-in user's password
    Passwd {
        #[arg(long)]
        current_password: String,
        #[arg(long)]
        new_password: String,
    },
    /// Show the current user and their permissions
    Whoami,
    /// End the session
    Logout,
    /// Show which registrations the server accepts
    Options,
    /// Show the public application configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = ClientConfig::from_env().context("Failed to load configuration")?;
    tracing::debug!(api = %config.api_base_url, session = %config.session_file().display(), "Configuration loaded");

    let client = ScoutClient::from_config(&config).context("Failed to create client")?;

    match cli.command {
        Command::Login { username, password } => {
            let result = client.login(&LoginRequest { username, password }).await;
            match result {
                Ok(snapshot) => print_session(&snapshot)?,
                Err(ClientError::PasswordChangeRequired { message }) => {
                    anyhow::bail!("{message}; run `scoutcomp change-password` first")
                }
                Err(e) => return Err(e).context("Login failed"),
            }
        }
        Command::Register {
            username,
            real_name,
            password,
            email,
            join_code,
            language,
        } => {
            let payload = RegistrationRequest {
                username,
                real_name,
                password,
                email,
                join_code,
                role: None,
                preferred_language: language,
            };
            let snapshot = client.register(&payload).await.context("Registration failed")?;
            print_session(&snapshot)?;
        }
        Command::ChangePassword {
            username,
            old_password,
            new_password,
        } => {
            let payload = ForcePasswordChangeRequest {
                username,
                old_password,
                new_password,
            };
            let snapshot = client
                .change_password(&payload)
                .await
                .context("Password change failed")?;
            print_session(&snapshot)?;
        }
        Command::Passwd {
            current_password,
            new_password,
        } => {
            client
                .change_own_password(&PasswordChangeRequest {
                    current_password,
                    new_password,
                })
                .await
                .context("Password change failed")?;
            println!("Password changed");
        }
        Command::Whoami => {
            client.resume().await.context("Session check failed")?;
            print_session(&client.snapshot())?;
        }
        Command::Logout => {
            client.logout().await;
            println!("Logged out");
        }
        Command::Options => {
            let options = client.registration_options().await?;
            println!("{}", serde_json::to_string_pretty(&options)?);
        }
        Command::Config => {
            let app_config = client.app_config().await?;
            println!("{}", serde_json::to_string_pretty(&app_config)?);
        }
    }

    Ok(())
}

fn print_session(snapshot: &SessionSnapshot) -> anyhow::Result<()> {
    let Some(profile) = &snapshot.profile else {
        println!("Not logged in");
        return Ok(());
    };

    let report = serde_json::json!({
        "user": profile.user,
        "scoreboard": profile.scoreboard,
        "capabilities": snapshot.capabilities(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    if profile.user.needs_password_change {
        eprintln!("Your password was set by an administrator; consider `scoutcomp passwd`.");
    }
    Ok(())
}

/// Initialize logging to stderr. `LOG_FORMAT=json` selects structured JSON output.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("scoutcomp_session=info,scoutcomp=info,warn"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_current_span(true)
            .flatten_event(true)
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}
