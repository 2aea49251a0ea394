//! `socialctl`: command-line client for the social backend.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Parse configuration** from flags with environment fallbacks.
//! 2. **Wire observability** (see [`telemetry`]).
//! 3. **Construct infrastructure**: a [`ClientConfig`], a [`MemorySession`]
//!    seeded from the given credential, and a [`SocialService`] over
//!    `reqwest`.
//! 4. **Run one command** and print its result as tagged JSON on stdout.
//!
//! Failures are printed as an error record on stderr and exit with status 1.

mod telemetry;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use facade::SocialService;
use objects::{AuthToken, Data, ErrorModel, MemorySession, Page, Session, UserId};
use serde_json::{json, Value};
use transport::ClientConfig;

#[derive(Parser, Debug)]
#[command(name = "socialctl", version, about = "Social backend command-line client")]
struct Cli {
    /// Absolute URL of the API host.
    #[arg(long, env = "SOCIAL_API_HOST")]
    api_host: String,

    /// Signed-in user id.
    #[arg(long, env = "SOCIAL_USER_ID")]
    user: Option<String>,

    /// Session token for `--user`.
    #[arg(long, env = "SOCIAL_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Language sent as `x-app-lang`.
    #[arg(long, env = "SOCIAL_LANG")]
    lang: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// OTLP collector endpoint; traces are exported only when set.
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a post
    Post { id: String },
    /// Fetch a user profile
    User { id: String },
    /// List a post's comments
    Comments {
        post_id: String,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        #[arg(long, default_value_t = 20)]
        max: u32,
    },
    /// List a user's followers
    Followers {
        user_id: String,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        #[arg(long, default_value_t = 20)]
        max: u32,
    },
    /// Like a post, or remove the like with `--undo`
    Like {
        post_id: String,
        #[arg(long)]
        undo: bool,
    },
    /// Sign in and print the identity to export
    Login {
        username: String,
        #[arg(long, env = "SOCIAL_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let telemetry = telemetry::init(cli.otlp_endpoint.as_deref())?;

    let outcome = run(cli).await;
    let code = match outcome {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            ExitCode::SUCCESS
        }
        Err(error) => {
            tracing::debug!(code = %error.code(), "command failed");
            eprintln!("{}", serde_json::to_string_pretty(&error.to_json())?);
            ExitCode::FAILURE
        }
    };

    telemetry.shutdown();
    Ok(code)
}

async fn run(cli: Cli) -> Result<Value, ErrorModel> {
    let mut config = ClientConfig::new(&cli.api_host)?
        .with_request_timeout(Duration::from_secs(cli.timeout_secs))?;
    if let Some(lang) = cli.lang {
        config = config.with_lang(lang);
    }

    let session = Arc::new(MemorySession::new());
    if let (Some(user), Some(token)) = (
        cli.user.and_then(UserId::new),
        cli.token.and_then(AuthToken::new),
    ) {
        session.set_credential(user, token);
    }

    let service = SocialService::connect(config, session.clone())?;
    let data: Data = match cli.command {
        Command::Post { id } => service.fetch_post(&id).await?.into(),
        Command::User { id } => service.fetch_user(&id).await?.into(),
        Command::Comments {
            post_id,
            offset,
            max,
        } => service
            .fetch_comments(&post_id, Page::new(offset, max))
            .await?
            .into(),
        Command::Followers {
            user_id,
            offset,
            max,
        } => service
            .fetch_followers(&user_id, Page::new(offset, max))
            .await?
            .into(),
        Command::Like { post_id, undo } if undo => service.unlike_post(&post_id).await?.into(),
        Command::Like { post_id, .. } => service.like_post(&post_id).await?.into(),
        Command::Login { username, password } => {
            let user = service.login(&username, &password).await?;
            return Ok(json!({
                "user": service.serializer().serialize(&user.into()),
                "export": {
                    "SOCIAL_USER_ID": session.user_id().map(|u| u.to_string()),
                    "SOCIAL_TOKEN": session.token().map(|t| t.expose().to_string()),
                },
            }));
        }
    };
    Ok(service.serializer().serialize(&data))
}
