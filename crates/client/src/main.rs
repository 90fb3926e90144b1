// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::error;

use authgate::credential::persist::FileStore;
use authgate::transport::api::RegisterRequest;
use authgate::{AuthClient, ClientConfig, CredentialStore};

#[derive(Parser)]
#[command(name = "authgate", version, about)]
struct Cli {
    #[command(flatten)]
    client: ClientConfig,

    /// Log format (json or text).
    #[arg(long, env = "AUTHGATE_LOG_FORMAT", default_value = "text")]
    log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "AUTHGATE_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and persist the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "AUTHGATE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and log in with it
    Register {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "AUTHGATE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Revoke the session and clear stored credentials
    Logout,
    /// Show the current user's profile
    Whoami,
    /// GET an API path and print the JSON response
    Get {
        /// Path relative to the base URL (e.g. /api/items)
        path: String,
    },
    /// Show whether a session is stored (never prints tokens)
    Status,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    if let Err(e) = run(cli).await {
        error!("fatal: {e:#}");
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(cli: &Cli) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    match cli.log_format.as_str() {
        "json" => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).json().init();
        }
        _ => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let store = Arc::new(FileStore::open_in(&cli.client.state_dir())?);
    let client = AuthClient::new(&cli.client, Arc::clone(&store) as Arc<dyn CredentialStore>)?;

    match cli.command {
        Command::Login { email, password } => {
            let user = client.login(&email, &password).await?;
            match user {
                Some(user) => println!("logged in as {} <{}>", user.display_name(), user.email),
                None => println!("logged in as {email}"),
            }
        }
        Command::Register { first_name, last_name, email, password } => {
            let request = RegisterRequest { first_name, last_name, email, password };
            let user = client.register(&request).await?;
            match user {
                Some(user) => println!("registered {} <{}>", user.display_name(), user.email),
                None => println!("registered {}", request.email),
            }
        }
        Command::Logout => {
            let was_logged_in = client.is_logged_in();
            client.logout().await?;
            if was_logged_in {
                println!("logged out");
            } else {
                println!("not logged in");
            }
        }
        Command::Whoami => {
            let user = client.current_user().await?;
            println!("{} <{}>", user.display_name(), user.email);
            println!("id: {}", user.id);
        }
        Command::Get { path } => {
            let body: serde_json::Value = client.get_json(&path).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Command::Status => {
            println!("credentials: {}", store.path().display());
            match (client.is_logged_in(), client.identity()) {
                (true, Some(user)) => println!("logged in as {} <{}>", user.display_name(), user.email),
                (true, None) => println!("logged in"),
                (false, _) => println!("not logged in"),
            }
        }
    }
    Ok(())
}
