use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use hearth_auth::{TokenPair, decode as decode_token};
use hearth_client::{ClientContext, SessionSeed};
use hearth_core::now_millis;
use serde_json::json;
use tracing::info;

use crate::cli::{DecodeArgs, LoginArgs};
use crate::output::{print_json, print_success, print_warning};
use crate::session_file::SessionFile;

/// How often `watch` checks whether the pair changed on disk.
const PERSIST_POLL: Duration = Duration::from_secs(1);

fn load_required(file: &SessionFile) -> Result<TokenPair> {
    file.load()?
        .context("No stored session for this profile. Run `hearth login` first")
}

pub fn login(args: &LoginArgs, file: &SessionFile) -> Result<()> {
    let pair = TokenPair::new(args.access_token.trim(), args.refresh_token.trim());
    match decode_token(&pair.access_token) {
        Ok(claims) => print_success(&format!(
            "Stored session for member {} in network {}",
            claims.subject_id.as_str().cyan(),
            claims.network_id.as_str().cyan()
        )),
        Err(e) => print_warning(&format!(
            "Access token does not decode ({e}); it will be renewed on first refresh"
        )),
    }
    file.save(&pair)
}

pub fn decode(args: &DecodeArgs, file: &SessionFile) -> Result<()> {
    let token = match &args.token {
        Some(token) => token.clone(),
        None => load_required(file)?.access_token,
    };
    let claims = decode_token(token.trim()).context("Failed to decode access token")?;
    print_json(&json!({
        "claims": claims,
        "expired": claims.is_expired_at(now_millis()),
    }));
    Ok(())
}

pub fn status(ctx: &ClientContext, file: &SessionFile) -> Result<()> {
    let Some(pair) = file.load()? else {
        println!("No stored session ({})", file.path().display());
        return Ok(());
    };
    ctx.init(SessionSeed::Pair(pair));
    let store = ctx.store();
    println!("{}: {}", "Session".cyan(), file.path().display());
    match store.claims() {
        Some(claims) => {
            println!("{}: {}", "Member".cyan(), claims.subject_id);
            println!("{}: {}", "Network".cyan(), claims.network_id);
            println!("{}: {:?}", "Role type".cyan(), claims.role_type);
            if let Some(exp) = claims.expires_at_datetime() {
                println!("{}: {exp}", "Expires".cyan());
            }
        }
        None => println!("{}: undecodable", "Access token".cyan()),
    }
    let state = if store.is_expired() {
        "expired".red()
    } else if store.needs_renewal(ctx.config().session.refresh.renewal_margin) {
        "renewal due".yellow()
    } else {
        "valid".green()
    };
    println!("{}: {state}", "State".cyan());
    println!(
        "{}: {}",
        "Refresh token".cyan(),
        if store.refresh_token().is_some() { "present" } else { "missing" }
    );
    Ok(())
}

pub async fn refresh(ctx: &ClientContext, file: &SessionFile) -> Result<()> {
    ctx.init(SessionSeed::Pair(load_required(file)?));
    let renewed = ctx
        .scheduler()
        .refresh_now()
        .await
        .context("Token refresh failed")?;
    file.save(&renewed.tokens)?;
    let expires = ctx
        .store()
        .claims()
        .and_then(|c| c.expires_at_datetime())
        .map(|t| t.to_string())
        .unwrap_or_else(|| "unknown".into());
    print_success(&format!("Session renewed, expires {expires}"));
    Ok(())
}

pub async fn logout(ctx: &ClientContext, file: &SessionFile) -> Result<()> {
    if let Some(pair) = file.load()? {
        ctx.init(SessionSeed::Pair(pair));
    }
    let outcome = ctx.logout().await;
    file.remove()?;
    if outcome.server_acknowledged {
        print_success("Logged out");
    } else {
        print_warning("Server logout not confirmed; local session removed");
    }
    println!("{}: {}", "Continue at".cyan(), outcome.redirect);
    Ok(())
}

pub async fn watch(ctx: &ClientContext, file: &SessionFile) -> Result<()> {
    let pair = load_required(file)?;
    ctx.init(SessionSeed::Pair(pair.clone()));
    ctx.start();
    print_success("Watching session, press Ctrl-C to stop");

    let mut saved = Some(pair);
    let mut poll = tokio::time::interval(PERSIST_POLL);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                res.context("Failed to listen for Ctrl-C")?;
                break;
            }
            _ = poll.tick() => {
                let current = ctx.store().get();
                if current != saved {
                    if let Some(pair) = &current {
                        file.save(pair)?;
                        info!("Renewed session persisted");
                    }
                    saved = current;
                }
            }
        }
    }

    ctx.shutdown();
    if let Some(pair) = ctx.store().get() {
        file.save(&pair)?;
    }
    print_success("Stopped");
    Ok(())
}
