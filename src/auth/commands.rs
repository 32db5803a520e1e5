//! Login, logout and status commands

use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{bail, Context, Result};
use chrono::{TimeZone, Utc};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;

use super::jwt::decode_claims;
use super::SessionManager;

const PASSWORD_ENV: &str = "PIXORUS_PASSWORD";

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush().context("Failed to flush stdout")?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[derive(Debug, PartialEq)]
enum PasswordInput {
    Continue,
    Submit,
    Cancel,
}

/// Apply one key press to the password being typed.
fn apply_password_key(password: &mut String, key: &KeyEvent) -> PasswordInput {
    if key.kind != KeyEventKind::Press {
        return PasswordInput::Continue;
    }
    match key.code {
        KeyCode::Enter => PasswordInput::Submit,
        KeyCode::Esc => PasswordInput::Cancel,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => PasswordInput::Cancel,
        KeyCode::Backspace => {
            password.pop();
            PasswordInput::Continue
        }
        KeyCode::Char(c) => {
            password.push(c);
            PasswordInput::Continue
        }
        _ => PasswordInput::Continue,
    }
}

fn read_password_keys() -> Result<Option<String>> {
    let mut password = String::new();
    loop {
        if let Event::Key(key) = event::read().context("Failed to read key")? {
            match apply_password_key(&mut password, &key) {
                PasswordInput::Continue => {}
                PasswordInput::Submit => return Ok(Some(password)),
                PasswordInput::Cancel => return Ok(None),
            }
        }
    }
}

/// Prompt for a password without echoing it. Piped stdin is read as a line.
fn prompt_password(label: &str) -> Result<String> {
    if !io::stdin().is_terminal() {
        return prompt(label);
    }

    print!("{}", label);
    io::stdout().flush().context("Failed to flush stdout")?;

    terminal::enable_raw_mode().context("Failed to switch terminal to raw mode")?;
    let typed = read_password_keys();
    let restored = terminal::disable_raw_mode();
    println!();
    restored.context("Failed to restore terminal")?;

    match typed? {
        Some(password) => Ok(password),
        None => bail!("Login cancelled."),
    }
}

fn format_millis(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| millis.to_string())
}

/// Sign in with username and password
pub async fn login(session: &SessionManager, username: Option<String>, force: bool) -> Result<()> {
    if !force && session.get_valid_token().await?.is_some() {
        println!("Already logged in. Use --force to re-authenticate.");
        return Ok(());
    }

    let username = match username {
        Some(u) => u,
        None => prompt("Username: ")?,
    };
    let password = match std::env::var(PASSWORD_ENV) {
        Ok(p) if !p.is_empty() => p,
        _ => prompt_password("Password: ")?,
    };
    if username.trim().is_empty() || password.is_empty() {
        bail!("Username and password are required.");
    }

    let tokens = session
        .sign_in(username.trim(), &password)
        .await
        .context("Login failed")?;

    println!("Login successful.");
    println!("  expires_at: {}", format_millis(tokens.expiry));
    Ok(())
}

/// Clear stored credentials
pub async fn logout(session: &SessionManager) -> Result<()> {
    session.clear_session();
    println!("Logged out.");
    Ok(())
}

/// Display current session status
pub async fn status(session: &SessionManager) -> Result<()> {
    let Some(tokens) = session.snapshot()? else {
        println!("Session:     none");
        println!("\nRun 'pixorus-cli login' to authenticate.");
        return Ok(());
    };

    if tokens.is_valid_at(session.now_millis()) {
        println!("Id token:    valid");
    } else {
        println!("Id token:    expired (will refresh on next use)");
    }
    println!("  expires_at: {}", format_millis(tokens.expiry));
    println!("Refresh tok: present");

    match decode_claims(&tokens.id_token) {
        Ok(claims) => {
            let who = claims
                .email
                .or(claims.username)
                .or(claims.sub)
                .unwrap_or_else(|| "(unknown)".to_string());
            println!("Signed in:   {}", who);
        }
        Err(e) => tracing::debug!("Could not read id token claims: {:#}", e),
    }

    Ok(())
}

/// Print a valid id token for use in scripts
pub async fn print_token(session: &SessionManager) -> Result<()> {
    match session.get_valid_token().await? {
        Some(token) => {
            println!("{}", token);
            Ok(())
        }
        None => bail!("Not logged in. Run 'pixorus-cli login'."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(password: &mut String, code: KeyCode) -> PasswordInput {
        apply_password_key(password, &KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn test_password_keys_edit_and_submit() {
        let mut password = String::new();
        for c in "pw1x".chars() {
            assert_eq!(press(&mut password, KeyCode::Char(c)), PasswordInput::Continue);
        }
        press(&mut password, KeyCode::Backspace);
        press(&mut password, KeyCode::Left);
        assert_eq!(password, "pw1");
        assert_eq!(press(&mut password, KeyCode::Enter), PasswordInput::Submit);
    }

    #[test]
    fn test_password_keys_cancel() {
        let mut password = String::from("secret");
        assert_eq!(press(&mut password, KeyCode::Esc), PasswordInput::Cancel);

        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(apply_password_key(&mut password, &ctrl_c), PasswordInput::Cancel);
        assert_eq!(password, "secret");
    }

    #[test]
    fn test_format_millis_is_rfc3339() {
        assert_eq!(format_millis(0), "1970-01-01T00:00:00+00:00");
    }
}
