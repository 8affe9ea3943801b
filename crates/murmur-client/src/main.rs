//! # murmur
//!
//! Minimal terminal front-end: restores or opens a session, prints the
//! contact list and tails store events until interrupted.
//!
//! Credentials for a fresh login are read from `MURMUR_EMAIL` and
//! `MURMUR_PASSWORD` when no session cookie is accepted.

use anyhow::{bail, Context};
use chrono::Utc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use murmur_client_lib::{init_tracing, AppContext, ClientConfig, NoticeLevel, StoreEvent};
use murmur_net::LoginRequest;
use murmur_shared::constants::APP_NAME;
use murmur_shared::format::last_seen_text;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Logging and configuration
    // -----------------------------------------------------------------------
    init_tracing();
    info!("Starting {} v{}", APP_NAME, env!("CARGO_PKG_VERSION"));

    let config = ClientConfig::from_env();
    info!(?config, "Loaded configuration");

    let ctx = AppContext::new(config).context("Invalid backend configuration")?;
    let mut events = ctx.subscribe();

    // -----------------------------------------------------------------------
    // 2. Session
    // -----------------------------------------------------------------------
    let user = match ctx.session().check_session().await {
        Some(user) => user,
        None => {
            let (Ok(email), Ok(password)) = (
                std::env::var("MURMUR_EMAIL"),
                std::env::var("MURMUR_PASSWORD"),
            ) else {
                bail!("No active session; set MURMUR_EMAIL and MURMUR_PASSWORD to log in");
            };
            ctx.session()
                .login(LoginRequest { email, password })
                .await
                .context("Login failed")?
        }
    };
    println!("Signed in as {} <{}>", user.full_name, user.email);

    // -----------------------------------------------------------------------
    // 3. Roster
    // -----------------------------------------------------------------------
    ctx.conversations().fetch_roster().await?;
    let now = Utc::now();
    for peer in ctx.conversations().roster() {
        let status = if ctx.session().is_online(&peer.id) {
            "Online".to_string()
        } else {
            last_seen_text(peer.last_seen, now)
        };
        let badge = ctx
            .conversations()
            .unread_badge(&peer.id)
            .map(|b| format!(" [{b}]"))
            .unwrap_or_default();
        println!("  {}{} - {}", peer.full_name, badge, status);
    }
    println!("{} online", ctx.conversations().online_count());

    // -----------------------------------------------------------------------
    // 4. Tail events
    // -----------------------------------------------------------------------
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(StoreEvent::Notice(notice)) => match notice.level {
                    NoticeLevel::Success => println!("ok: {}", notice.text),
                    NoticeLevel::Error => eprintln!("error: {}", notice.text),
                },
                Ok(StoreEvent::UnreadChanged) => {
                    for peer in ctx.conversations().roster() {
                        if let Some(badge) = ctx.conversations().unread_badge(&peer.id) {
                            println!("{}: {} unread", peer.full_name, badge);
                        }
                    }
                }
                Ok(StoreEvent::PresenceChanged) => {
                    println!("{} online", ctx.conversations().online_count());
                }
                Ok(StoreEvent::TypingChanged(Some(peer))) => println!("{peer} is typing..."),
                Ok(other) => info!(event = ?other, "Store event"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event stream lagged"),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    ctx.shutdown();
    Ok(())
}
