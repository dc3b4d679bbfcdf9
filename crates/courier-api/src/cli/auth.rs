//! Authentication commands: greet, login, logout, token, validate.

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Input, Select};

use courier_core::client::{AuthMode, AuthOutcome};
use courier_types::token::SessionToken;

use crate::client::RemoteClient;

/// Send one greeting and print the reply.
pub async fn greet(client: &RemoteClient, name: &str, again: bool, json: bool) -> Result<()> {
    let mode = if again { AuthMode::Login } else { AuthMode::Register };
    let message = client.greet(name, mode).await?;

    if json {
        println!("{}", serde_json::json!({ "message": message }));
    } else {
        println!("  {}", style(message).bold());
    }
    Ok(())
}

/// Register or log in as `username`, prompting for anything not given.
///
/// # Examples
///
/// ```bash
/// # Interactive
/// courier login
///
/// # One-shot
/// courier login alice --register
/// ```
pub async fn login(
    client: &mut RemoteClient,
    username: Option<String>,
    register: bool,
    json: bool,
) -> Result<()> {
    let (username, mode) = match username {
        Some(name) => {
            let mode = if register { AuthMode::Register } else { AuthMode::Login };
            (name, mode)
        }
        None => prompt_identity()?,
    };

    let outcome = client.authenticate(&username, mode).await?;
    print_outcome(&outcome, json);
    Ok(())
}

/// Make sure the client holds credentials the server accepts, running the
/// interactive login flow when nothing is stored.
pub async fn ensure_logged_in(client: &mut RemoteClient, json: bool) -> Result<()> {
    if let Some(credentials) = client.ensure_fresh().await? {
        if !json {
            println!(
                "  {} Logged in as {}",
                style("✓").green().bold(),
                style(&credentials.client_id).cyan()
            );
        }
        return Ok(());
    }

    let (username, mode) = prompt_identity()?;
    let outcome = client.authenticate(&username, mode).await?;
    print_outcome(&outcome, json);
    Ok(())
}

fn prompt_identity() -> Result<(String, AuthMode)> {
    let choice = Select::new()
        .with_prompt("Are you a new or returning user?")
        .items(&["Register (new user)", "Login (returning user)"])
        .default(0)
        .interact()?;
    let mode = if choice == 0 { AuthMode::Register } else { AuthMode::Login };

    let username: String = Input::new()
        .with_prompt("Username")
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("username must not be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    Ok((username.trim().to_string(), mode))
}

fn print_outcome(outcome: &AuthOutcome, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::json!({
                "client_id": outcome.credentials.client_id,
                "greeting": outcome.greeting,
                "reused": outcome.greeting.is_none(),
            })
        );
        return;
    }

    match &outcome.greeting {
        Some(greeting) => {
            println!("  {}", style(greeting).bold());
            println!(
                "  {} Token stored for {}",
                style("✓").green().bold(),
                style(&outcome.credentials.client_id).cyan()
            );
        }
        None => println!(
            "  {} Using stored token for {}",
            style("✓").green().bold(),
            style(&outcome.credentials.client_id).cyan()
        ),
    }
}

/// Forget the stored credentials.
pub async fn logout(client: &mut RemoteClient, json: bool) -> Result<()> {
    let removed = client.logout().await?;

    if json {
        println!("{}", serde_json::json!({ "logged_out": removed }));
    } else if removed {
        println!("  {} Logged out", style("✓").green().bold());
    } else {
        println!("  {}", style("No stored credentials").dim());
    }
    Ok(())
}

/// Print a freshly issued token for the stored client id.
pub async fn token(client: &mut RemoteClient, json: bool) -> Result<()> {
    client
        .restore()
        .await?
        .context("not logged in; run `courier login` first")?;
    let token = client.refresh_token().await?;

    if json {
        println!("{}", serde_json::json!({ "token": token }));
    } else {
        println!("{token}");
    }
    Ok(())
}

/// Validate `token`, or the stored token when none is given.
pub async fn validate(client: &mut RemoteClient, token: Option<String>, json: bool) -> Result<()> {
    let token = match token {
        Some(raw) => SessionToken::new(raw),
        None => client
            .restore()
            .await?
            .map(|c| c.token.clone())
            .context("no token given and none stored; run `courier login` first")?,
    };
    let claims = client.validate_token(&token).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&claims)?);
        return Ok(());
    }

    println!("  {} Token is valid", style("✓").green().bold());
    println!("  {:<10} {}", style("subject").dim(), claims.sub);
    println!("  {:<10} {}", style("issuer").dim(), claims.iss);
    println!("  {:<10} {}", style("issued").dim(), claims.iat.to_rfc3339());
    println!("  {:<10} {}", style("expires").dim(), claims.exp.to_rfc3339());
    Ok(())
}
