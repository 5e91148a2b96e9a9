//! Account and session commands.

use anyhow::{Context, Result};
use std::path::Path;
use tandem_chat_client::{ChatApi, ChatClient, Transport};

use super::restore;
use crate::config::StoredSession;

/// Use the given password or prompt for one without echo.
fn password_or_prompt(password: Option<String>) -> Result<String> {
    match password {
        Some(p) => Ok(p),
        None => rpassword::prompt_password("Password: ").context("Failed to read password"),
    }
}

/// Create an account. The user still has to log in.
pub async fn signup<A: ChatApi, T: Transport>(
    client: &ChatClient<A, T>,
    username: &str,
    password: Option<String>,
) -> Result<()> {
    let password = password_or_prompt(password)?;
    client
        .signup(username, &password)
        .await
        .context("Signup failed")?;

    println!("Account '{}' created.", username);
    println!("Run 'tandem login {}' to start chatting.", username);
    Ok(())
}

/// Log in and store the session token.
pub async fn login<A: ChatApi, T: Transport>(
    client: &ChatClient<A, T>,
    data_dir: &Path,
    username: &str,
    password: Option<String>,
) -> Result<()> {
    let password = password_or_prompt(password)?;
    let identity = client
        .login(username, &password)
        .await
        .context("Login failed")?;

    StoredSession::new(identity.token.expose(), &identity.display_name)
        .save(data_dir)
        .await?;

    println!("Logged in as {} ({})", identity.display_name, identity.id);
    println!("Contacts: {}", client.contacts().len());
    Ok(())
}

/// Forget the stored session.
pub async fn logout<A: ChatApi, T: Transport>(client: &ChatClient<A, T>, data_dir: &Path) -> Result<()> {
    let stored = StoredSession::load(data_dir).await?;
    client.logout().await;
    StoredSession::delete(data_dir).await?;

    match stored {
        Some(session) => println!("Logged out {}.", session.display_name),
        None => println!("Not logged in."),
    }
    Ok(())
}

/// Show the logged-in user.
pub async fn whoami<A: ChatApi, T: Transport>(client: &ChatClient<A, T>, data_dir: &Path) -> Result<()> {
    if StoredSession::load(data_dir).await?.is_none() {
        println!("Not logged in.");
        return Ok(());
    }

    let identity = restore(client, data_dir).await?;
    println!("Logged in as {} ({})", identity.display_name, identity.id);
    Ok(())
}
