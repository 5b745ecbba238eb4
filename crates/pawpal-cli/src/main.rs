//! # pawpal-chat
//!
//! Terminal client for PawPal.
//!
//! Signs in as `PAWPAL_USER_ID`, opens the conversation with
//! `PAWPAL_COUNTERPART_ID` on a local SQLite store, and reprints the feed
//! whenever it changes.  Lines typed on stdin are sent as messages; lines
//! starting with `/` browse and adopt pets (see `/help`).

mod commands;
mod config;
mod error;

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pawpal_feed::{FeedConfig, FeedEngine, FeedHandle, FeedStatus, FeedView, SendOutcome};
use pawpal_pets::{FavoriteOutcome, Pet, PetCatalog};
use pawpal_shared::constants::APP_NAME;
use pawpal_shared::{StaticIdentity, UserId};
use pawpal_store::SqliteStore;

use crate::commands::{Command, HELP};
use crate::config::ChatConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,pawpal_chat=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting {} chat v{}", APP_NAME, env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ChatConfig::from_env()?;
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open the store and sign in
    // -----------------------------------------------------------------------
    let store = match &config.db_path {
        Some(path) => SqliteStore::open_at(path)?,
        None => SqliteStore::open_default()?,
    };
    let store = Arc::new(store);
    let identity = Arc::new(StaticIdentity::signed_in(config.user_id.clone()));

    let engine = FeedEngine::with_config(
        store.clone(),
        identity.clone(),
        FeedConfig {
            scope: config.feed_scope,
        },
    );
    let catalog = PetCatalog::new(store, identity);

    // -----------------------------------------------------------------------
    // 4. Open the conversation and print it on every change
    // -----------------------------------------------------------------------
    let handle = engine.open_conversation(&config.counterpart_id).await?;
    let printer = tokio::spawn(print_feed(
        handle.watch(),
        config.user_id.clone(),
        config.feed_display,
    ));

    println!("{HELP}");

    // -----------------------------------------------------------------------
    // 5. Read input until /quit, EOF or Ctrl+C
    // -----------------------------------------------------------------------
    let outcome = tokio::select! {
        result = input_loop(&handle, &catalog) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
            Ok(())
        }
    };

    handle.close();
    printer.abort();
    if let Err(e) = &outcome {
        tracing::error!(error = %e, "Input loop failed");
    }
    outcome
}

async fn input_loop(handle: &FeedHandle, catalog: &PetCatalog) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        match command {
            Command::Quit => break,
            Command::Help => println!("{HELP}"),
            Command::Say(text) => match handle.send(&text).await {
                Ok(SendOutcome::Sent(_)) | Ok(SendOutcome::Skipped) => {}
                Err(e) => println!("Message not sent: {e}"),
            },
            Command::Pets => match catalog.list_adoptable().await {
                Ok(pets) if pets.is_empty() => println!("No pets up for adoption."),
                Ok(pets) => pets.iter().for_each(|pet| println!("{}", describe_pet(pet))),
                Err(e) => println!("Could not list pets: {e}"),
            },
            Command::Add(pet) => match catalog.add_pet(pet).await {
                Ok(id) => println!("Listed pet {id}"),
                Err(e) => println!("Could not add pet: {e}"),
            },
            Command::Fav(id) => match catalog.save_favorite(&id).await {
                Ok(FavoriteOutcome::Added(_)) => println!("Saved to favorites."),
                Ok(FavoriteOutcome::AlreadyFavorite) => println!("Already in your favorites."),
                Err(e) => println!("Could not save favorite: {e}"),
            },
            Command::Favs => match catalog.list_favorites().await {
                Ok(pets) if pets.is_empty() => println!("No favorites yet."),
                Ok(pets) => pets.iter().for_each(|pet| println!("{}", describe_pet(pet))),
                Err(e) => println!("Could not list favorites: {e}"),
            },
            Command::Adopt(id) => match catalog.adopt(&id).await {
                Ok(()) => println!("Adopted pet {id}. Congratulations!"),
                Err(e) => println!("Could not adopt: {e}"),
            },
        }

        if !handle.is_open() {
            warn!(reason = ?handle.close_reason(), "Conversation closed");
            break;
        }
    }

    Ok(())
}

async fn print_feed(mut rx: watch::Receiver<FeedView>, me: UserId, display: usize) {
    loop {
        let view = rx.borrow_and_update().clone();
        println!("{}", render_feed(&view, &me, display));
        if view.status == FeedStatus::Closed {
            break;
        }
        if rx.changed().await.is_err() {
            break;
        }
    }
}

/// The `display` most recent messages, oldest at the top.
fn render_feed(view: &FeedView, me: &UserId, display: usize) -> String {
    let mut out = String::from("──────── conversation ────────\n");
    if view.messages.is_empty() {
        out.push_str("(no messages yet)\n");
    }
    for message in view.messages.iter().take(display).rev() {
        let who = if message.is_from(me) {
            "you".to_string()
        } else {
            message.sender_id.to_string()
        };
        out.push_str(&format!(
            "[{}] {}: {}\n",
            message.created_at.format("%H:%M:%S"),
            who,
            message.text
        ));
    }
    if view.status == FeedStatus::Closed {
        out.push_str("(conversation closed)\n");
    }
    out
}

fn describe_pet(pet: &Pet) -> String {
    let mut line = format!("{}  {} ({}, {})", pet.id, pet.name, pet.pet_type, pet.age);
    if pet.adopted {
        line.push_str(" [adopted]");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pawpal_feed::{Message, Participants};
    use pawpal_shared::DocumentId;

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    fn message(id: &str, from: &str, to: &str, text: &str, secs: u32) -> Message {
        Message {
            id: DocumentId::from(id),
            sender_id: uid(from),
            receiver_id: uid(to),
            participants: Participants::new(uid(from), uid(to)),
            text: text.to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, secs).unwrap(),
        }
    }

    #[test]
    fn test_render_feed_shows_latest_oldest_first() {
        let view = FeedView {
            status: FeedStatus::Open,
            messages: Arc::new(vec![
                message("m3", "bob", "alice", "third", 3),
                message("m2", "alice", "bob", "second", 2),
                message("m1", "bob", "alice", "first", 1),
            ]),
            revision: 1,
            close_reason: None,
        };

        let out = render_feed(&view, &uid("alice"), 2);
        assert!(!out.contains("first"));
        let second = out.find("you: second").unwrap();
        let third = out.find("bob: third").unwrap();
        assert!(second < third);
    }

    #[test]
    fn test_render_empty_and_closed() {
        let view = FeedView {
            status: FeedStatus::Closed,
            messages: Arc::new(Vec::new()),
            revision: 0,
            close_reason: None,
        };
        let out = render_feed(&view, &uid("alice"), 20);
        assert!(out.contains("(no messages yet)"));
        assert!(out.contains("(conversation closed)"));
    }
}
