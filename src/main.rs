//! `fitlive` - command-line tap for live feeds.
//!
//! ```text
//! fitlive login  --subject u-17 --role member --token <bearer>
//! fitlive tap    --namespace websocket_live --feed live --resource 42
//! fitlive verify
//! fitlive logout
//! ```
//!
//! Configuration comes from `FITLIVE__*` environment variables (see
//! `fitlive::config`).

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use thiserror::Error;

use fitlive::adapters::auth::HttpAuthApi;
use fitlive::adapters::navigation::LoggingNavigator;
use fitlive::adapters::storage::FileCredentialStore;
use fitlive::adapters::websocket::TungsteniteConnector;
use fitlive::application::live::{
    ConnectionSupervisor, EndpointError, ListenerError, LiveListener,
};
use fitlive::application::CredentialManager;
use fitlive::config::{AppConfig, ConfigError};
use fitlive::domain::credential::{BearerToken, IdentityReference, Role};
use fitlive::domain::foundation::{AuthError, ResourceId, SubjectId, ValidationError};
use fitlive::domain::live::{InboundMessage, Scope};

/// FitLive live-feed tap
#[derive(Parser, Debug)]
#[command(name = "fitlive")]
#[command(author = "FitLive Team")]
#[command(version)]
#[command(about = "Tap FitLive live feeds from the terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a credential issued by the sign-in flow
    Login {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        role: String,
        /// Bearer token
        #[arg(long, env = "FITLIVE_TOKEN", hide_env_values = true)]
        token: String,
    },
    /// Check the stored credential, refreshing it once if rejected
    Verify,
    /// Forget the stored credential
    Logout,
    /// Print every message of one feed until interrupted
    Tap {
        #[arg(long, default_value = "websocket_live")]
        namespace: String,
        #[arg(long, default_value = "live")]
        feed: String,
        #[arg(long)]
        resource: String,
        /// Stop after this many seconds
        #[arg(long)]
        duration_secs: Option<u64>,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid argument: {0}")]
    Argument(#[from] ValidationError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error("Tracing setup failed: {0}")]
    Telemetry(#[from] tracing_subscriber::util::TryInitError),
}

/// Prints each message as one JSON line.
struct PrintListener;

impl LiveListener for PrintListener {
    fn on_message(&self, message: &InboundMessage) -> Result<(), ListenerError> {
        println!("{}", message.to_value());
        Ok(())
    }

    fn name(&self) -> &str {
        "stdout"
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = AppConfig::load()?;
    config
        .validate()
        .map_err(|e| CliError::Config(ConfigError::ValidationFailed(e)))?;
    fitlive::telemetry::init_tracing(&config.client)?;

    let credentials = Arc::new(CredentialManager::new(
        Arc::new(HttpAuthApi::new(
            &config.auth.api_base_url,
            config.auth.request_timeout(),
        )?),
        Arc::new(FileCredentialStore::new(&config.auth.credential_path)),
        Arc::new(LoggingNavigator),
    ));

    match cli.command {
        Command::Login {
            subject,
            role,
            token,
        } => {
            let identity = IdentityReference::new(SubjectId::new(subject)?, Role::new(role)?);
            credentials
                .establish_session(identity, BearerToken::new(token)?)
                .await?;
            println!("Signed in");
        }
        Command::Verify => {
            credentials.get_verified_token().await?;
            println!("Credential valid");
        }
        Command::Logout => {
            credentials.logout().await;
        }
        Command::Tap {
            namespace,
            feed,
            resource,
            duration_secs,
        } => {
            let scope = Scope::new(namespace, feed, ResourceId::new(resource)?)?;
            let supervisor = ConnectionSupervisor::new(
                config.live.endpoint()?,
                Arc::new(TungsteniteConnector::new(config.live.connect_timeout())),
                config.live.supervisor_config(),
            )
            .with_credentials(credentials);

            supervisor.start(&scope);
            let _subscription = supervisor.add(&scope, Arc::new(PrintListener));
            tracing::info!(scope = %scope, "Tapping live feed, Ctrl-C to stop");

            let wait = async {
                match duration_secs {
                    Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                    None => std::future::pending::<()>().await,
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = wait => {}
            }

            supervisor.stop(&scope);
            supervisor.shutdown().await;
        }
    }

    Ok(())
}
