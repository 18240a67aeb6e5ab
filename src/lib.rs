pub mod config;
pub mod models;
pub mod password;
pub mod services;
pub mod session;
pub mod store;

use std::io::Write as _;

use anyhow::{Context, Result};
pub use config::Config;
use models::InitialCredentials;
use services::{AuthError, AuthService, LocalAuthService};
use store::FileCredentialStorage;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub fn run() -> Result<()> {
    let config = Config::load()?;
    config.validate()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_help();
        return Ok(());
    }

    match args[1].as_str() {
        "init" | "--init" => cmd_init(&config),

        "login" | "l" => {
            if args.len() < 3 {
                println!("Usage: medguard login <username or email>");
                return Ok(());
            }
            cmd_login(&config, &args[2])
        }

        "change-password" | "passwd" => cmd_change_password(&config),

        "status" | "s" => cmd_status(&config),

        "help" | "-h" | "--help" => {
            print_help();
            Ok(())
        }

        _ => {
            println!("Unknown command: {}", args[1]);
            println!();
            print_help();
            Ok(())
        }
    }
}

fn print_help() {
    println!("Medguard - Admin Authentication Console");
    println!("Local credential and session guard for the practice admin console");
    println!();
    println!("USAGE:");
    println!("  medguard <COMMAND>");
    println!();
    println!("COMMANDS:");
    println!("  init              Create the admin credential record (prints the");
    println!("                    one-time initial password)");
    println!("  login <id>        Authenticate with username or email");
    println!("  change-password   Change the admin password");
    println!("  status            Show credential record metadata and lock state");
    println!("  help              Show this help message");
    println!();
    println!("CONFIG:");
    println!("  Edit medguard.toml to configure timeouts and lockout policy.");
}

fn open_service(config: &Config) -> Result<(LocalAuthService, Option<InitialCredentials>)> {
    let storage = FileCredentialStorage::new(config.credentials_path());
    LocalAuthService::open(
        Box::new(storage),
        config.security.pbkdf2_iterations,
        config.lockout_policy(),
        config.security.session_timeout_minutes,
    )
}

fn cmd_init(config: &Config) -> Result<()> {
    if Config::create_default_if_missing()? {
        println!("✓ Config file created. Edit medguard.toml to adjust policy.");
    }

    let (_, disclosure) = open_service(config)?;

    match disclosure {
        Some(initial) => disclose_initial_credentials(config, &initial)?,
        None => {
            println!("Credentials already initialized.");
            println!("  File: {}", config.credentials_path().display());
        }
    }

    Ok(())
}

fn cmd_login(config: &Config, identifier: &str) -> Result<()> {
    let (mut service, disclosure) = open_service(config)?;

    // First run: the record was just created, surface the password now.
    if let Some(initial) = disclosure {
        disclose_initial_credentials(config, &initial)?;
    }

    let password = prompt("Password: ")?;

    match service.authenticate(identifier, &password) {
        Ok(outcome) => {
            println!("✓ Logged in as {}", outcome.username);
            if outcome.require_password_change {
                println!("  Password change required — run 'medguard change-password'.");
            }
            println!(
                "  Session valid for {} minutes.",
                service.remaining_session_minutes()
            );
            Ok(())
        }
        Err(e @ (AuthError::InvalidCredentials | AuthError::AccountLocked { .. })) => {
            println!("Login failed: {e}");
            Ok(())
        }
        Err(e) => Err(e).context("Login aborted"),
    }
}

fn cmd_change_password(config: &Config) -> Result<()> {
    let (mut service, _) = open_service(config)?;

    let current = prompt("Current password: ")?;
    let new = prompt("New password: ")?;
    let confirm = prompt("Confirm new password: ")?;

    if new != confirm {
        println!("New passwords do not match.");
        return Ok(());
    }

    match service.change_password(&current, &new) {
        Ok(()) => {
            println!("✓ Password changed.");
            Ok(())
        }
        Err(e @ (AuthError::InvalidCredentials | AuthError::WeakPassword(_))) => {
            println!("Password change failed: {e}");
            Ok(())
        }
        Err(e) => Err(e).context("Password change aborted"),
    }
}

fn cmd_status(config: &Config) -> Result<()> {
    let (service, _) = open_service(config)?;
    let record = service.credential_record();

    println!("Admin Credential Record");
    println!("{:-<60}", "");
    println!("Username:         {}", record.username);
    println!("Email:            {}", record.email);
    println!("Created:          {}", record.created_at);
    println!(
        "Last login:       {}",
        record
            .last_login
            .map_or_else(|| "Never".to_string(), |t| t.to_string())
    );
    println!("Password changed: {}", record.last_password_change);
    println!(
        "Change required:  {}",
        if record.require_password_change { "Yes" } else { "No" }
    );
    println!("Failed attempts:  {}", record.failed_attempts);

    match record.locked_until {
        Some(until) if until > chrono::Utc::now() => println!("Locked until:     {until}"),
        Some(_) => println!("Locked:           No (previous lockout elapsed)"),
        None => println!("Locked:           No"),
    }

    Ok(())
}

fn disclose_initial_credentials(config: &Config, initial: &InitialCredentials) -> Result<()> {
    println!();
    println!("{:=<60}", "");
    println!("INITIAL ADMIN CREDENTIALS");
    println!("{:=<60}", "");
    println!("Username: {}", initial.username);
    println!("Password: {}", initial.password);
    println!("{:=<60}", "");
    println!("IMPORTANT: Save these credentials securely!");
    println!("You will be required to change the password on first login.");
    println!("{:=<60}", "");
    println!();

    let sidecar = config.disclosure_path();
    let content = format!(
        "INITIAL ADMIN CREDENTIALS\n\
         ========================\n\
         Username: {}\n\
         Password: {}\n\n\
         IMPORTANT: Delete this file after noting the credentials!\n",
        initial.username, initial.password
    );
    std::fs::write(&sidecar, content)
        .with_context(|| format!("Failed to write disclosure file: {}", sidecar.display()))?;
    restrict_to_owner(&sidecar)?;

    info!("Wrote one-time disclosure file: {}", sidecar.display());
    Ok(())
}

#[cfg(unix)]
fn restrict_to_owner(path: &std::path::Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .with_context(|| format!("Failed to restrict permissions on: {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &std::path::Path) -> Result<()> {
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}
