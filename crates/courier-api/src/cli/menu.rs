//! Interactive menu: log in once, then pick actions until quitting.

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Input, Select};

use super::{auth, chat, download, ClientContext};

const ITEMS: [&str; 8] = [
    "Say hello",
    "Say hello again",
    "Generate a token",
    "Validate token",
    "Download a file",
    "Start chat",
    "Log out",
    "Quit",
];

pub async fn run(ctx: &ClientContext) -> Result<()> {
    let mut client = ctx.connect()?;
    auth::ensure_logged_in(&mut client, ctx.json).await?;
    let user = client
        .credentials()
        .map(|c| c.client_id.clone())
        .context("login did not produce credentials")?;

    loop {
        println!();
        let choice = Select::new()
            .with_prompt("What would you like to do?")
            .items(&ITEMS)
            .default(0)
            .interact()?;

        let outcome = match choice {
            0 => auth::greet(&client, &user, false, ctx.json).await,
            1 => auth::greet(&client, &user, true, ctx.json).await,
            2 => auth::token(&mut client, ctx.json).await,
            3 => auth::validate(&mut client, None, ctx.json).await,
            4 => {
                let filename: String = Input::new()
                    .with_prompt("File name")
                    .interact_text()?;
                download::download(&client, filename.trim(), None, &ctx.download_prefix, ctx.json)
                    .await
            }
            5 => chat::chat(&client, ctx.json, true).await,
            6 => {
                auth::logout(&mut client, ctx.json).await?;
                break;
            }
            _ => break,
        };

        if let Err(e) = outcome {
            println!("  {} {e:#}", style("✗").red().bold());
        }
    }

    Ok(())
}
