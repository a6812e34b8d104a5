use std::env;
use std::io;
use std::path;

use anyhow::anyhow;
use anyhow::bail;
use anyhow::Result;
use chrono::Utc;
use clap::builder::PossibleValuesParser;
use clap::value_parser;
use clap::Arg;
use clap::ArgAction;
use clap::ArgMatches;
use clap::Command;
use clap_complete::generate;
use clap_complete::Generator;
use clap_complete::Shell;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Input;
use dialoguer::Password;
use strum::VariantNames;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use yansi::Paint;

use crate::application::ui;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::ClientError;
use crate::domain::models::CredentialStoreName;
use crate::domain::services::mutations::ADD_FALLBACK;
use crate::domain::services::mutations::DEFAULT_INTERVAL_TEXT;
use crate::domain::services::MonitorDraft;
use crate::domain::services::Sentinel;
use crate::domain::services::FETCH_FALLBACK;
use crate::domain::services::LOGIN_FALLBACK;
use crate::domain::services::REGISTER_FALLBACK;

fn print_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
}

fn failure(err: ClientError, fallback: &str) -> anyhow::Error {
    if err == ClientError::Unauthenticated {
        return anyhow!("You are not logged in. Run `sentinel login` first.");
    }

    return anyhow!(err.reason(fallback));
}

pub fn log_path() -> path::PathBuf {
    let log_dir = env::var("SENTINEL_LOG_DIR").map(path::PathBuf::from).unwrap_or_else(|_| {
        return dirs::cache_dir()
            .unwrap_or_else(env::temp_dir)
            .join("sentinel");
    });

    return log_dir.join("debug.log");
}

async fn create_config_file() -> Result<()> {
    let config_file_path_str = Config::default(ConfigKey::ConfigFile);
    let config_file_path = path::PathBuf::from(&config_file_path_str);
    if config_file_path.exists() {
        bail!(format!(
            "Config file already exists at {config_file_path_str}"
        ));
    }

    if let Some(parent) = config_file_path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut file = fs::File::create(&config_file_path).await?;
    file.write_all(Config::serialize_default(build()).as_bytes())
        .await?;

    println!("Created default config file at {config_file_path_str}");
    return Ok(());
}

/// Reads credentials from flags or the environment, prompting for whatever is
/// missing.
fn credentials(matches: &ArgMatches) -> Result<(String, String)> {
    let email = match matches.get_one::<String>("email") {
        Some(email) => email.to_string(),
        None => Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt("Email")
            .interact_text()?,
    };

    let password = match matches.get_one::<String>("password") {
        Some(password) => password.to_string(),
        None => Password::with_theme(&ColorfulTheme::default())
            .with_prompt("Password")
            .interact()?,
    };

    return Ok((email, password));
}

async fn register(sentinel: &Sentinel, matches: &ArgMatches) -> Result<()> {
    let (email, password) = credentials(matches)?;
    let message = sentinel
        .register(&email, &password)
        .await
        .map_err(|err| return failure(err, REGISTER_FALLBACK))?;

    println!("{}", Paint::green(message));
    println!("Run `sentinel login` to sign in.");
    return Ok(());
}

async fn login(sentinel: &Sentinel, matches: &ArgMatches) -> Result<()> {
    let (email, password) = credentials(matches)?;
    sentinel
        .login(&email, &password)
        .await
        .map_err(|err| return failure(err, LOGIN_FALLBACK))?;

    println!("{}", Paint::green(format!("Logged in as {email}")));
    return Ok(());
}

async fn add(sentinel: &Sentinel, matches: &ArgMatches) -> Result<()> {
    let url = matches
        .get_one::<String>("url")
        .map(|url| return url.to_string())
        .unwrap_or_default();
    let interval = matches
        .get_one::<String>("interval")
        .map(|interval| return interval.to_string())
        .unwrap_or_default();

    let draft = MonitorDraft::parse(&url, &interval).map_err(|err| return failure(err, ADD_FALLBACK))?;
    let message = sentinel
        .add_monitor(&draft.url, draft.interval_seconds)
        .await
        .map_err(|err| return failure(err, ADD_FALLBACK))?;

    println!("{}", Paint::green(message));
    println!("\n{}", ui::render(&sentinel.monitors().snapshot(), Utc::now()));
    return Ok(());
}

async fn list(sentinel: &Sentinel) -> Result<()> {
    sentinel
        .refresh()
        .await
        .map_err(|err| return failure(err, FETCH_FALLBACK))?;

    println!("{}", ui::render(&sentinel.monitors().snapshot(), Utc::now()));
    return Ok(());
}

fn status(sentinel: &Sentinel) {
    println!("API: {}", Config::get(ConfigKey::ApiURL));
    println!("Credential store: {}", Config::get(ConfigKey::CredentialStore));
    println!("Session: {}", sentinel.session().state());
}

fn subcommand_completions() -> Command {
    return Command::new("completions")
        .about("Generates shell completions.")
        .arg(
            clap::Arg::new("shell")
                .short('s')
                .long("shell")
                .help("Which shell to generate completions for.")
                .action(ArgAction::Set)
                .value_parser(value_parser!(Shell))
                .required(true),
        );
}

fn subcommand_config() -> Command {
    return Command::new("config")
        .about("Configuration file options.")
        .subcommand(
            Command::new("create").about("Saves the default config file to the configuration file path. This command will fail if the file exists already.")
        )
        .subcommand(
            Command::new("default").about("Outputs the default configuration file to stdout.")
        )
        .subcommand(
            Command::new("path").about("Returns the default path for the configuration file.")
        );
}

fn subcommand_debug() -> Command {
    return Command::new("debug")
        .about("Debug helpers for Sentinel")
        .hide(true)
        .subcommand(
            Command::new("log-path").about("Output path to debug log file generated when running Sentinel with environment variable RUST_LOG=sentinel")
        )
        .subcommand(
            Command::new("enum-config").about("List all config keys as strings.")
        );
}

fn arg_email() -> Arg {
    return Arg::new("email")
        .short('e')
        .long("email")
        .env("SENTINEL_EMAIL")
        .num_args(1)
        .help("Account email. Prompted for when omitted.");
}

fn arg_password() -> Arg {
    return Arg::new("password")
        .short('p')
        .long("password")
        .env("SENTINEL_PASSWORD")
        .hide_env_values(true)
        .num_args(1)
        .help("Account password. Prompted for when omitted.");
}

fn subcommand_add() -> Command {
    return Command::new("add")
        .about("Adds a monitor and shows the refreshed list.")
        .arg(
            Arg::new("url")
                .short('u')
                .long("url")
                .num_args(1)
                .required(true)
                .help("Absolute URL to health-check."),
        )
        .arg(
            Arg::new("interval")
                .short('i')
                .long("interval")
                .num_args(1)
                .default_value(DEFAULT_INTERVAL_TEXT)
                .help("Seconds between checks, at least 5."),
        );
}

pub fn build() -> Command {
    let about = format!(
        "{}\n\nVersion: {}\nCommit: {}",
        env!("CARGO_PKG_DESCRIPTION"),
        env!("CARGO_PKG_VERSION"),
        env!("VERGEN_GIT_DESCRIBE")
    );

    return Command::new("sentinel")
        .about(about)
        .author(env!("CARGO_PKG_AUTHORS"))
        .version(env!("CARGO_PKG_VERSION"))
        .arg_required_else_help(true)
        .subcommand(
            Command::new("register")
                .about("Creates an account. Does not sign in.")
                .arg(arg_email())
                .arg(arg_password()),
        )
        .subcommand(
            Command::new("login")
                .about("Signs in and stores the session token.")
                .arg(arg_email())
                .arg(arg_password()),
        )
        .subcommand(Command::new("logout").about("Forgets the stored session token."))
        .subcommand(subcommand_add())
        .subcommand(Command::new("list").about("Fetches and prints your monitors once."))
        .subcommand(Command::new("watch").about("Shows your monitors and keeps them up to date."))
        .subcommand(Command::new("status").about("Prints the API URL and session state."))
        .subcommand(subcommand_completions())
        .subcommand(subcommand_config())
        .subcommand(subcommand_debug())
        .arg(
            Arg::new(ConfigKey::ConfigFile.to_string())
                .short('c')
                .long(ConfigKey::ConfigFile.to_string())
                .env("SENTINEL_CONFIG_FILE")
                .num_args(1)
                .help(format!("Path to configuration file [default: {}]", Config::default(ConfigKey::ConfigFile)))
                .global(true)
        )
        .arg(
            Arg::new(ConfigKey::ApiURL.to_string())
                .long(ConfigKey::ApiURL.to_string())
                .env("SENTINEL_API_URL")
                .num_args(1)
                .help(format!("SentinelAI backend URL. [default: {}]", Config::default(ConfigKey::ApiURL)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::PollInterval.to_string())
                .long(ConfigKey::PollInterval.to_string())
                .env("SENTINEL_POLL_INTERVAL")
                .num_args(1)
                .help(format!("Milliseconds between monitor refreshes while watching. [default: {}]", Config::default(ConfigKey::PollInterval)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::RequestTimeout.to_string())
                .long(ConfigKey::RequestTimeout.to_string())
                .env("SENTINEL_REQUEST_TIMEOUT")
                .num_args(1)
                .help(format!("Milliseconds to wait for the backend before a request fails. [default: {}]", Config::default(ConfigKey::RequestTimeout)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::CredentialStore.to_string())
                .long(ConfigKey::CredentialStore.to_string())
                .env("SENTINEL_CREDENTIAL_STORE")
                .num_args(1)
                .help(format!("Where the session token is kept. [default: {}]", Config::default(ConfigKey::CredentialStore)))
                .value_parser(PossibleValuesParser::new(CredentialStoreName::VARIANTS))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::CredentialsFile.to_string())
                .long(ConfigKey::CredentialsFile.to_string())
                .env("SENTINEL_CREDENTIALS_FILE")
                .num_args(1)
                .help(format!("Path of the token file for the file credential store. [default: {}]", Config::default(ConfigKey::CredentialsFile)))
                .global(true),
        );
}

pub async fn parse() -> Result<()> {
    let matches = build().get_matches();

    match matches.subcommand() {
        Some(("debug", debug_matches)) => match debug_matches.subcommand() {
            Some(("log-path", _)) => {
                println!("{}", log_path().to_string_lossy());
            }
            Some(("enum-config", _)) => {
                println!("{}", ConfigKey::VARIANTS.join("\n"));
            }
            _ => {
                subcommand_debug().print_long_help()?;
            }
        },
        Some(("completions", subcmd_matches)) => {
            if let Some(completions) = subcmd_matches.get_one::<Shell>("shell").copied() {
                let mut app = build();
                print_completions(completions, &mut app);
            }
        }
        Some(("config", subcmd_matches)) => match subcmd_matches.subcommand() {
            Some(("create", _)) => {
                create_config_file().await?;
            }
            Some(("default", _)) => {
                println!("{}", Config::serialize_default(build()));
            }
            Some(("path", _)) => {
                println!("{}", Config::default(ConfigKey::ConfigFile));
            }
            _ => {
                subcommand_config().print_long_help()?;
            }
        },
        Some((name, subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
            let sentinel = Sentinel::from_config().await?;

            match name {
                "register" => register(&sentinel, subcmd_matches).await?,
                "login" => login(&sentinel, subcmd_matches).await?,
                "logout" => {
                    sentinel.logout().await?;
                    println!("Logged out.");
                }
                "add" => add(&sentinel, subcmd_matches).await?,
                "list" => list(&sentinel).await?,
                "watch" => {
                    let period = Config::get_duration(ConfigKey::PollInterval)?;
                    ui::start(&sentinel, period)
                        .await
                        .map_err(|err| {
                            if let Some(client_err) = err.downcast_ref::<ClientError>() {
                                return failure(client_err.clone(), FETCH_FALLBACK);
                            }
                            return err;
                        })?;
                }
                "status" => status(&sentinel),
                _ => {
                    build().print_long_help()?;
                }
            }
        }
        None => {
            build().print_long_help()?;
        }
    }

    return Ok(());
}
