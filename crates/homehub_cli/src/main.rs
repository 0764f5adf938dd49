//! `homehub` command-line front end.
//!
//! # Responsibility
//! - Map subcommands onto membership registration and device façade calls.
//! - Print one JSON envelope per invocation: `{ok, status, data|error}`.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use homehub_core::db::open_db_with_timeout;
use homehub_core::{
    init_logging_from_config, sqlite_device_service, DeviceDescriptor, DeviceDetailsUpdate,
    DeviceServiceError, FamilyId, HomehubConfig, JwtVerifier, PowerState, SqliteMembershipStore,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "homehub")]
#[command(version)]
#[command(about = "Family-scoped household device management", long_about = None)]
struct Cli {
    /// Configuration file path (JSON)
    #[arg(short, long, env = "HOMEHUB_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides `auth.secret` from the configuration file
    #[arg(long, env = "HOMEHUB_AUTH_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Overrides `database.path` from the configuration file
    #[arg(long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or migrate the database
    Init,
    /// Family registration
    #[command(subcommand)]
    Family(FamilyCommand),
    /// Principal registration
    #[command(subcommand)]
    User(UserCommand),
    /// Token helpers
    #[command(subcommand)]
    Token(TokenCommand),
    /// Family-scoped device operations
    #[command(subcommand)]
    Device(DeviceCommand),
}

#[derive(Subcommand, Debug)]
enum FamilyCommand {
    Add { name: String },
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Add {
        email: String,
        #[arg(long)]
        family_id: Option<i64>,
    },
}

#[derive(Subcommand, Debug)]
enum TokenCommand {
    Issue { email: String },
}

#[derive(Args, Debug)]
struct RequestArgs {
    /// Full authorization header value, e.g. "Bearer <jwt>"
    #[arg(long, env = "HOMEHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,
    /// Email whose family is targeted
    #[arg(long)]
    target: String,
}

#[derive(Subcommand, Debug)]
enum DeviceCommand {
    Get {
        #[command(flatten)]
        request: RequestArgs,
        name: String,
    },
    Power {
        #[command(flatten)]
        request: RequestArgs,
        name: String,
        #[arg(value_parser = parse_power_state)]
        state: PowerState,
    },
    Add {
        #[command(flatten)]
        request: RequestArgs,
        name: String,
        /// Warranty expiration (YYYY-MM-DD)
        #[arg(long)]
        warranty: Option<NaiveDate>,
        /// Create the device switched on
        #[arg(long)]
        on: bool,
    },
    Update {
        #[command(flatten)]
        request: RequestArgs,
        name: String,
        /// New warranty expiration (YYYY-MM-DD); omit to clear
        #[arg(long)]
        warranty: Option<NaiveDate>,
    },
    List {
        #[command(flatten)]
        request: RequestArgs,
    },
}

/// Failure rendered into the output envelope.
struct Failure {
    status: u16,
    code: &'static str,
    message: String,
}

impl Failure {
    fn new(status: u16, code: &'static str, message: impl ToString) -> Self {
        Self {
            status,
            code,
            message: message.to_string(),
        }
    }
}

impl From<DeviceServiceError> for Failure {
    fn from(value: DeviceServiceError) -> Self {
        Self::new(value.status_code(), value.error_code(), &value)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let envelope = match run(cli) {
        Ok(data) => json!({ "ok": true, "status": 200, "data": data }),
        Err(failure) => json!({
            "ok": false,
            "status": failure.status,
            "error": { "code": failure.code, "message": failure.message },
        }),
    };

    println!("{envelope:#}");
    if envelope["ok"].as_bool().unwrap_or(false) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn run(cli: Cli) -> Result<Value, Failure> {
    let mut config = match &cli.config {
        Some(path) => HomehubConfig::load(path)
            .map_err(|err| Failure::new(400, "invalid_config", err))?,
        None => HomehubConfig::default(),
    };
    if let Some(secret) = cli.secret {
        config.auth.secret = secret;
    }
    if let Some(db) = cli.db {
        config.database.path = db;
    }
    let checked = match cli.command {
        Command::Token(_) | Command::Device(_) => config.validate_for_tokens(),
        Command::Init | Command::Family(_) | Command::User(_) => config.validate(),
    };
    checked.map_err(|err| Failure::new(400, "invalid_config", err))?;

    if let Err(err) = init_logging_from_config(&config.logging) {
        eprintln!("logging disabled: {err}");
    }

    let conn = open_db_with_timeout(&config.database.path, config.database.busy_timeout())
        .map_err(|err| Failure::new(503, "persistence_unavailable", err))?;

    match cli.command {
        Command::Init => Ok(json!({ "database": config.database.path })),
        Command::Family(FamilyCommand::Add { name }) => {
            let family = SqliteMembershipStore::new(&conn)
                .register_family(&name)
                .map_err(|err| Failure::new(400, "family_rejected", err))?;
            Ok(json!(family))
        }
        Command::User(UserCommand::Add { email, family_id }) => {
            let principal = SqliteMembershipStore::new(&conn)
                .register_principal(&email, family_id.map(FamilyId))
                .map_err(|err| Failure::new(400, "principal_rejected", err))?;
            Ok(json!(principal))
        }
        Command::Token(TokenCommand::Issue { email }) => {
            let token = JwtVerifier::from_config(&config.auth)
                .issue(&email)
                .map_err(|err| Failure::new(500, "token_issue_failed", err))?;
            Ok(json!({ "authorization": format!("{} {token}", config.auth.scheme) }))
        }
        Command::Device(command) => {
            let service = sqlite_device_service(&conn, &config.auth);
            match command {
                DeviceCommand::Get { request, name } => {
                    let view = service.get_device_details(
                        request.token.as_deref(),
                        &request.target,
                        &name,
                    )?;
                    Ok(json!({ "device": view }))
                }
                DeviceCommand::Power {
                    request,
                    name,
                    state,
                } => {
                    let ack = service.set_power_state(
                        request.token.as_deref(),
                        &request.target,
                        &name,
                        state,
                    )?;
                    Ok(json!(ack))
                }
                DeviceCommand::Add {
                    request,
                    name,
                    warranty,
                    on,
                } => {
                    let descriptor = DeviceDescriptor {
                        device_name: name,
                        warranty_expiration: warranty,
                        initial_power_state: if on { PowerState::On } else { PowerState::Off },
                    };
                    let view = service.add_device(
                        request.token.as_deref(),
                        &request.target,
                        &descriptor,
                    )?;
                    Ok(json!({ "device": view }))
                }
                DeviceCommand::Update {
                    request,
                    name,
                    warranty,
                } => {
                    let update = DeviceDetailsUpdate {
                        warranty_expiration: warranty,
                    };
                    let view = service.update_device_details(
                        request.token.as_deref(),
                        &request.target,
                        &name,
                        &update,
                    )?;
                    Ok(json!({ "device": view }))
                }
                DeviceCommand::List { request } => {
                    let views = service
                        .list_devices_for_family(request.token.as_deref(), &request.target)?;
                    Ok(json!({ "devices": views }))
                }
            }
        }
    }
}

fn parse_power_state(value: &str) -> Result<PowerState, String> {
    PowerState::parse(value).ok_or_else(|| format!("expected `on` or `off`, got `{value}`"))
}
