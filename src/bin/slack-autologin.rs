//! Slack auto-login CLI.
//!
//! Signs in to Slack in a Chrome window (email, password, TOTP) and then
//! confirms the "Open Slack?" prompt so the desktop app takes over.
//!
//! Usage examples:
//!   Credentials from `.env` / environment:
//!     $ SLACK_EMAIL=... SLACK_PASSWORD=... SLACK_TOTP_SECRET=... \
//!       cargo run --bin slack-autologin -- --show-browser
//!   Inspect the effective configuration without launching a browser:
//!     $ cargo run --bin slack-autologin -- check

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use slack_autologin::config::{ConfigOverrides, LoginConfig};
use slack_autologin::desktop;
use slack_autologin::flow::{self, LoginFlow};
use slack_autologin::logging::{CATEGORY_FLOW, FlowLogger, Verbosity};
use slack_autologin::runtime::{ChromiumSession, LaunchOptions};
use slack_autologin::totp::SecretTotp;
use slack_autologin::two_factor::TerminalAcknowledger;

#[derive(Parser)]
#[command(
    name = "slack-autologin",
    author,
    version,
    about = "Sign in to Slack in a browser and hand off to the desktop app"
)]
struct Cli {
    /// Increase narration (pass -v for stage details).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Read configuration from a JSON file instead of the environment.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Show the browser window even if HEADLESS is set.
    #[arg(long, global = true, conflicts_with = "headless")]
    show_browser: bool,

    /// Run the browser without a window.
    #[arg(long, global = true)]
    headless: bool,

    /// Sign-in page to open.
    #[arg(long, global = true, value_name = "URL")]
    signin_url: Option<String>,

    /// Seconds to wait for manual 2FA in a visible browser (0 disables).
    #[arg(long, global = true, value_name = "SECONDS")]
    wait_seconds: Option<u64>,

    /// Number of desktop handoff attempts.
    #[arg(long, global = true, value_name = "COUNT")]
    attempts: Option<u32>,

    /// Chrome or Chromium executable to launch.
    #[arg(long, global = true, value_name = "PATH")]
    chrome: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the effective configuration (secrets omitted) and validate it.
    Check,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        let headless = if self.show_browser {
            Some(false)
        } else if self.headless {
            Some(true)
        } else {
            None
        };
        ConfigOverrides {
            signin_url: self.signin_url.clone(),
            headless,
            manual_2fa_wait_seconds: self.wait_seconds,
            handoff_attempts: self.attempts,
            chrome_executable: self.chrome.clone(),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_env_logger();

    let cli = Cli::parse();
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err:#}");
            return ExitCode::from(1);
        }
    };

    match cli.command {
        Some(Command::Check) => check(&config),
        None => login(&config, Verbosity::from_occurrences(cli.verbose)).await,
    }
}

fn load_config(cli: &Cli) -> Result<LoginConfig> {
    let base = match &cli.config {
        Some(path) => LoginConfig::from_json_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => LoginConfig::from_env().context("failed to read configuration from environment")?,
    };
    Ok(base.with_overrides(cli.overrides()))
}

fn check(config: &LoginConfig) -> ExitCode {
    match serde_json::to_string_pretty(config) {
        Ok(rendered) => println!("{rendered}"),
        Err(err) => eprintln!("failed to render configuration: {err}"),
    }
    match config.validate() {
        Ok(()) => {
            println!("Configuration is valid.");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::from(1)
        }
    }
}

async fn login(config: &LoginConfig, verbosity: Verbosity) -> ExitCode {
    let logger = FlowLogger::new(verbosity);
    let input = desktop::detect(config.headless);
    let options = LaunchOptions::from_config(config);
    let flow = LoginFlow::new(
        config,
        &logger,
        &SecretTotp,
        input.as_ref(),
        &TerminalAcknowledger,
    );

    let result = flow.run(|| ChromiumSession::launch(&options)).await;
    match &result {
        Ok(report) => {
            info!(
                "second factor: {:?}, handoff attempts: {}",
                report.two_factor, report.handoff_attempts
            );
            logger.info(
                "Login complete. Slack desktop should now be open.",
                CATEGORY_FLOW,
            );
        }
        Err(err) => eprintln!("Error: {err}"),
    }
    ExitCode::from(flow::exit_code(&result))
}

fn init_env_logger() {
    if env::var("RUST_LOG").is_err() {
        unsafe {
            env::set_var("RUST_LOG", "warn");
        }
    }

    let _ = env_logger::Builder::from_env(env_logger::Env::default())
        .format_timestamp_secs()
        .try_init();
}
