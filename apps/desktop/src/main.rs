use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    auth_gate::redirect_param, config::DEFAULT_CONFIG_PATH, load_settings, AuthGate, AuthState,
    Field, HttpCommandBridge, LoginForm, RecordingNavigator, RegisterForm, Settings,
};
use tracing_subscriber::EnvFilter;

/// Pause between simulated keystrokes.
const KEYSTROKE_INTERVAL: Duration = Duration::from_millis(60);

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long)]
    typing_cooldown_ms: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Type a username into the registration form and report its checks.
    CheckUsername { username: String },
    /// Type a password into the registration form and report its rules.
    CheckPassword { password: String },
    Login {
        username: String,
        password: String,
        /// Value of the `redirect` query parameter the auth page was opened with.
        #[arg(long)]
        redirect: Option<String>,
    },
    Register {
        username: String,
        password: String,
        #[arg(long)]
        redirect: Option<String>,
    },
    /// Navigate to a protected path, optionally logging in first.
    Open {
        path: String,
        #[arg(long, requires = "password")]
        username: Option<String>,
        #[arg(long, requires = "username")]
        password: Option<String>,
    },
}

fn settings(cli: &Cli) -> Result<Settings> {
    let mut settings = load_settings(&cli.config)?;
    if let Some(api_url) = &cli.api_url {
        settings.api_url = api_url.clone();
    }
    if let Some(cooldown) = cli.typing_cooldown_ms {
        settings.typing_cooldown_ms = cooldown;
    }
    Ok(settings)
}

/// Feeds `text` one keystroke at a time, then waits for the debounced verdict.
async fn type_into(field: &Field, text: &str) {
    let mut typed = String::new();
    for c in text.chars() {
        typed.push(c);
        field.input(typed.as_str());
        tokio::time::sleep(KEYSTROKE_INTERVAL).await;
    }
    field.settled().await;
}

fn print_navigation(navigator: &RecordingNavigator) {
    if let Some(target) = navigator.last() {
        println!("navigated to {target}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = settings(&cli)?;
    let bridge = Arc::new(HttpCommandBridge::new(settings.api_url.clone()));
    let navigator = Arc::new(RecordingNavigator::new());

    match cli.command {
        Command::CheckUsername { username } => {
            let form = RegisterForm::new(
                bridge.clone(),
                navigator.clone(),
                None,
                settings.typing_cooldown(),
            );
            type_into(form.username(), &username).await;
            println!("username: {}", form.username().validation());
            println!("rules: {:?}", form.username_hints().get());
            match form.username_unique().get() {
                Some(unique) => println!("available: {unique}"),
                None => println!("available: unknown"),
            }
        }
        Command::CheckPassword { password } => {
            let form = RegisterForm::new(
                bridge.clone(),
                navigator.clone(),
                None,
                settings.typing_cooldown(),
            );
            type_into(form.password(), &password).await;
            println!("password: {}", form.password().validation());
            println!("rules: {:?}", form.password_hints().get());
        }
        Command::Login {
            username,
            password,
            redirect,
        } => {
            let form = LoginForm::new(bridge.clone(), navigator.clone(), redirect);
            form.validate_all().await;
            type_into(form.username(), &username).await;
            type_into(form.password(), &password).await;
            if !form.can_submit() {
                println!("warning: credentials do not meet the length rules");
            }
            println!("login: {:?}", form.submit().await?);
            print_navigation(&navigator);
        }
        Command::Register {
            username,
            password,
            redirect,
        } => {
            let form = RegisterForm::new(
                bridge.clone(),
                navigator.clone(),
                redirect,
                settings.typing_cooldown(),
            );
            form.validate_all().await;
            type_into(form.username(), &username).await;
            type_into(form.password(), &password).await;
            type_into(form.confirm(), &password).await;
            match form.submit().await {
                Ok(outcome) => println!("register: {outcome:?}"),
                Err(err) => {
                    println!("register: {err}");
                    println!("username: {:?}", form.username_hints().get());
                    println!("password: {:?}", form.password_hints().get());
                }
            }
            print_navigation(&navigator);
        }
        Command::Open {
            path,
            username,
            password,
        } => {
            let gate = Arc::new(AuthGate::new(
                bridge.clone(),
                navigator.clone(),
                &settings.auth_entry_path,
            ));
            let mut resolution = gate.resolve(&path).await;

            if let (false, Some(username), Some(password)) =
                (resolution.may_render(), username, password)
            {
                let back = resolution.redirect.as_deref().and_then(redirect_param);
                let form = LoginForm::new(bridge.clone(), navigator.clone(), back)
                    .with_gate(gate.clone());
                form.username().input(username.as_str());
                form.password().input(password.as_str());
                let outcome = form
                    .submit()
                    .await
                    .with_context(|| format!("failed to log in as {username}"))?;
                println!("login: {outcome:?}");
                resolution = gate.resolve(&path).await;
            }

            match resolution.state {
                AuthState::Authenticated => {
                    if let Some(session) = &resolution.session {
                        println!("{path}: rendering for {} (id {})", session.username, session.id);
                    }
                }
                _ => {
                    println!("{path}: {}", resolution.state);
                    if let Some(redirect) = &resolution.redirect {
                        println!("redirected to {redirect}");
                        if let Some(back) = redirect_param(redirect) {
                            println!("log in with --redirect {back} to come back");
                        }
                    }
                }
            }
            print_navigation(&navigator);
        }
    }

    Ok(())
}
