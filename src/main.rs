mod auth;
mod config;
mod console;
mod models;
mod network_client;
mod processor;
mod retry;
mod scheduler;
mod session;
mod siwe;
mod utils;
mod wallet;

use clap::Parser;
use log::{error, info};
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::{ConfigError, Endpoints, DEFAULT_AUTH_API, DEFAULT_COMMUNITY_API, LOOP_INTERVAL};
use crate::console::Console;
use crate::processor::Context;
use crate::retry::RetryPolicy;
use crate::scheduler::Scheduler;

// Custom Application Error Type
#[derive(Debug)]
enum AppError {
    Network(network_client::NetworkError),
    Config(ConfigError),
    Io(std::io::Error),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Network(err) => write!(f, "Network error: {}", err),
            AppError::Config(err) => write!(f, "{}", err),
            AppError::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Network(err) => Some(err),
            AppError::Config(err) => Some(err),
            AppError::Io(err) => Some(err),
        }
    }
}

impl From<network_client::NetworkError> for AppError {
    fn from(err: network_client::NetworkError) -> Self {
        AppError::Network(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err)
    }
}

#[derive(Parser, Debug)]
#[clap(author, version, about = "Daily login, mining claim and check-in for Nitrograph wallets", long_about = None)]
struct Args {
    /// Base URL of the auth/user API.
    #[clap(long, env = "NITRO_AUTH_API", default_value = DEFAULT_AUTH_API)]
    auth_api: Url,

    /// Base URL of the community (referral/loyalty) API.
    #[clap(long, env = "NITRO_COMMUNITY_API", default_value = DEFAULT_COMMUNITY_API)]
    community_api: Url,
}

#[derive(Debug, PartialEq)]
enum MenuChoice {
    Start,
    Exit,
    Invalid,
}

fn parse_choice(input: &str) -> MenuChoice {
    match input.trim() {
        "1" => MenuChoice::Start,
        "2" => MenuChoice::Exit,
        _ => MenuChoice::Invalid,
    }
}

/// Shows the menu until the user picks something valid. EOF counts as exit.
async fn show_menu(console: &Console) -> Result<MenuChoice, AppError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        console.menu();
        console.prompt("Choose [1/2]: ");
        let Some(line) = lines.next_line().await? else {
            return Ok(MenuChoice::Exit);
        };
        match parse_choice(&line) {
            MenuChoice::Invalid => console.warning("Invalid choice. Please select 1 or 2."),
            choice => return Ok(choice),
        }
    }
}

async fn run_continuous(endpoints: Endpoints, console: Console, shutdown: CancellationToken) -> Result<(), AppError> {
    let keys = config::private_keys_from_env()?;
    console.accounts_badge(keys.len());

    let ctx = Context {
        client: network_client::build_client()?,
        endpoints,
        retry: RetryPolicy::default(),
        console,
    };

    let ctx = &ctx;
    let mut scheduler = Scheduler::new(LOOP_INTERVAL, console);
    scheduler
        .run(&keys, &shutdown, move |key| async move {
            processor::process_account(ctx, &key).await;
        })
        .await;
    info!(
        "Scheduler stopped after {} pass(es), next run was due at {:?}",
        scheduler.passes(),
        scheduler.next_run()
    );
    Ok(())
}

async fn run(args: Args, console: Console, shutdown: CancellationToken) -> Result<(), AppError> {
    match show_menu(&console).await? {
        MenuChoice::Start => {
            let endpoints = Endpoints::new(args.auth_api, args.community_api);
            info!("Auth API: {}, community API: {}", endpoints.auth_api, endpoints.community_api);
            run_continuous(endpoints, console, shutdown).await
        }
        _ => {
            console.info("Bye!");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // `.env` first so clap's `env` fallbacks and PRIVATE_KEYS see its values.
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let console = Console::default();
    let shutdown = CancellationToken::new();

    tokio::select! {
        result = run(args, console, shutdown.clone()) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("{:?}", e);
                console.error(&format!("Fatal error: {}", e));
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            shutdown.cancel();
            println!();
            console.error("[EXIT] Nitro Graph Auto Bot");
            // A pending stdin read would otherwise keep the runtime from shutting down.
            std::process::exit(0);
        }
    }
}
