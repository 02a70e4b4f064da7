//! kec-gate - terminal login shell for the KEC Assistant session gate.
//!
//! Signs the user in against the credential service, shows who is signed in,
//! signs out, and can send a request through the session dispatcher so the
//! injected headers can be inspected.

use std::io::{self, Write};

use anyhow::{Context, Result};
use kec_gate_core::{Config, Session, SessionGate};
use reqwest::Method;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const USAGE: &str = "\
Usage: kec-gate <command>

Commands:
  login [email]   Sign in (prompts for anything not given)
  status          Show the signed-in user
  logout          Sign out
  fetch <url>     GET <url> through the session dispatcher
";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut config = Config::load()?;
    let gate = SessionGate::from_config(&config)?;
    gate.startup();

    match args.first().map(String::as_str) {
        Some("login") => login(&gate, &mut config, args.get(1).cloned()).await,
        Some("status") => {
            match gate.current() {
                Some(session) => print_chip(&session),
                None => println!("Not signed in"),
            }
            Ok(())
        }
        Some("logout") => {
            gate.logout()?;
            println!("Signed out");
            Ok(())
        }
        Some("fetch") => {
            let url = args.get(1).context("fetch needs a URL")?;
            fetch(&gate, url).await
        }
        _ => {
            eprint!("{}", USAGE);
            Ok(())
        }
    }
}

async fn login(gate: &SessionGate, config: &mut Config, email: Option<String>) -> Result<()> {
    let email = match email {
        Some(email) => email,
        None => prompt_email(config.last_email.as_deref())?,
    };
    let password = rpassword::prompt_password("Password: ")?;

    println!("Checking credentials...");
    match gate.login(&email, &password).await {
        Ok(session) => {
            config.last_email = Some(session.identity.clone());
            if let Err(e) = config.save() {
                warn!(error = %e, "Failed to save config");
            }
            info!(identity = %session.identity, "Signed in");
            print_chip(&session);
            Ok(())
        }
        Err(e) if e.is_retryable() => {
            Err(anyhow::anyhow!("{} (try again in a moment)", e.user_message()))
        }
        Err(e) => Err(anyhow::anyhow!(e.user_message())),
    }
}

fn prompt_email(last_email: Option<&str>) -> Result<String> {
    match last_email {
        Some(last) => print!("Email [{}]: ", last),
        None => print!("Email: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    Ok(match (input.is_empty(), last_email) {
        (true, Some(last)) => last.to_string(),
        _ => input.to_string(),
    })
}

fn print_chip(session: &Session) {
    println!("{}", session.identity);
    println!("Role: {}", session.role);
    if !session.allowed_scopes.is_empty() {
        println!("Servers: {}", session.allowed_scopes.join(", "));
    }
    println!("Storage: {}", session.storage_prefix());
}

async fn fetch(gate: &SessionGate, url: &str) -> Result<()> {
    let request = gate
        .request(Method::GET, url)
        .build()
        .with_context(|| format!("Invalid URL: {}", url))?;

    let response = gate
        .send(request)
        .await
        .with_context(|| format!("Failed to send GET request to {}", url))?;

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    println!("{}", status);
    println!("{}", body);
    Ok(())
}
