use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use dialoguer::{Input, Password};
use finboard_auth::auth::{
    AuthController, AuthError, AuthResult, AuthState, GuardDecision, RegisterPayload, Session,
    SessionStore,
};
use finboard_auth::config::Config;
use finboard_auth::http::ReqwestApiClient;
use finboard_auth::ui::{ConsoleNavigator, ConsoleNotifier};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Sign in to the finance dashboard backend and manage the local session.
#[derive(Parser, Debug)]
#[command(name = "finboard-auth", version, about)]
struct Cli {
    /// Config file (default: ~/.finboard/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Create an account
    Register {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Sign out and forget the local session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Re-fetch the profile behind the stored token
    Refresh,
    /// Show where the route guard sends the current session for a path
    Guard { path: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let api = Arc::new(ReqwestApiClient::new(&config.api)?);
    let db_path = config.session_db_path();
    let store = SessionStore::open(&db_path)
        .with_context(|| format!("Failed to open session store at {}", db_path.display()))?;
    let controller = Arc::new(AuthController::new(
        &config,
        api,
        store,
        Arc::new(ConsoleNotifier),
        Arc::new(ConsoleNavigator::default()),
    ));

    match cli.command {
        Commands::Login { email } => {
            let email = prompt_or(email, "Email")?;
            let password = Password::new().with_prompt("Password").interact()?;
            let outcome = controller.login(&email, &password).await;
            finish_sign_in(&controller, outcome).await
        }
        Commands::Register { name, email } => {
            let name = prompt_or(name, "Name")?;
            let email = prompt_or(email, "Email")?;
            let password = Password::new()
                .with_prompt("Password")
                .with_confirmation("Confirm password", "Passwords do not match")
                .interact()?;
            let payload = RegisterPayload {
                name,
                email,
                password_confirmation: password.clone(),
                password,
            };
            let outcome = controller.register(payload).await;
            finish_sign_in(&controller, outcome).await
        }
        Commands::Logout => {
            controller.logout().await;
            Ok(())
        }
        Commands::Whoami => {
            match controller.user() {
                Some(user) => {
                    println!("{} <{}>", style(user.display_name()).bold(), user.email);
                    println!("role:  {}", user.role);
                    println!("roles: {}", user.roles.join(", "));
                }
                None => println!("Not signed in."),
            }
            Ok(())
        }
        Commands::Refresh => {
            let session = controller.refresh_profile().await?;
            println!(
                "{} is signed in as {}",
                session.user.display_name(),
                style(&session.user.role).bold()
            );
            Ok(())
        }
        Commands::Guard { path } => {
            match controller.check_route(&path) {
                GuardDecision::Allow => println!("{} allow", style("✓").green()),
                GuardDecision::Redirect(to) => println!("{} redirect to {to}", style("→").yellow()),
            }
            Ok(())
        }
    }
}

fn prompt_or(value: Option<String>, prompt: &str) -> Result<String> {
    match value {
        Some(v) => Ok(v),
        None => Ok(Input::<String>::new().with_prompt(prompt).interact_text()?),
    }
}

/// Report a login/register outcome, running the OTP step when needed.
async fn finish_sign_in(
    controller: &Arc<AuthController>,
    outcome: AuthResult<Session>,
) -> Result<()> {
    match outcome {
        Ok(_) => Ok(()),
        Err(AuthError::VerificationRequired { email, .. }) => verify_loop(controller, &email).await,
        Err(AuthError::FieldValidation { fields }) => {
            for (field, message) in &fields {
                eprintln!("{} {field}: {message}", style("✗").red());
            }
            anyhow::bail!("Please correct the highlighted fields")
        }
        Err(e) => Err(e.into()),
    }
}

/// Prompt for the emailed code until it is accepted. `r` asks for a new
/// code, an empty line gives up.
async fn verify_loop(controller: &Arc<AuthController>, email: &str) -> Result<()> {
    let ticker = controller.spawn_cooldown_ticker();
    let result = loop {
        let input: String = Input::new()
            .with_prompt("6-digit code (r = resend, empty = cancel)")
            .allow_empty(true)
            .interact_text()?;
        let input = input.trim();

        if input.is_empty() {
            controller.cancel_verification();
            break Ok(());
        }
        if input.eq_ignore_ascii_case("r") {
            if let Err(e) = controller.resend_otp(email).await {
                eprintln!("{} {e}", style("✗").red());
            }
            continue;
        }
        match controller.verify_otp(email, input).await {
            Ok(_) => break Ok(()),
            Err(AuthError::FieldValidation { fields }) => {
                for message in fields.values() {
                    eprintln!("{} {message}", style("✗").red());
                }
            }
            Err(e) if controller.state() == AuthState::VerificationRequired => {
                eprintln!("{} {e}", style("✗").red());
            }
            Err(e) => break Err(e.into()),
        }
    };
    ticker.abort();
    result
}
