use anyhow::{bail, Context};
use marketchat_client::{
    init_tracing, load_inbox, ApiClient, ChannelEvent, ChannelManager, ClientConfig, Composer,
    ConversationView, MessageOrigin, Session, WsConnector,
};
use marketchat_messaging::{ChatMessage, ListingId, UserId};
use std::{env, sync::Arc};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let mut args = env::args().skip(1);
    let (Some(listing), Some(counterpart)) = (args.next(), args.next()) else {
        bail!("usage: marketchat <listing-id> <counterpart-user-id>");
    };
    let listing_id = ListingId(listing.parse().context("listing id must be an integer")?);
    let counterpart = UserId(counterpart.parse().context("counterpart id must be an integer")?);
    let user_id = UserId(
        env::var("MARKETCHAT_USER_ID")
            .context("MARKETCHAT_USER_ID is not set")?
            .parse()
            .context("MARKETCHAT_USER_ID must be an integer")?,
    );
    let session = Session::new(user_id, env::var("MARKETCHAT_TOKEN").ok());

    let config = ClientConfig::from_env()?;
    let api = Arc::new(ApiClient::new(&config)?);

    let mut inbox = load_inbox(&api, &session).await;
    for listing in inbox.listings() {
        for thread in &listing.threads {
            let name = thread
                .counterpart_name
                .clone()
                .unwrap_or_else(|| thread.counterpart_id.to_string());
            let last = thread.last_message().map_or("", |m| m.body.as_str());
            println!("listing {} / {name}: {last}", listing.listing_id);
        }
    }

    let manager = ChannelManager::new(config, Arc::new(WsConnector)).with_history(api.clone());
    let channel = manager.open(listing_id, &session);
    let mut events = channel.subscribe();
    info!(
        %listing_id,
        %counterpart,
        authenticated = session.is_authenticated(),
        "conversation opened"
    );

    let view = ConversationView::new(&channel, counterpart);
    let mut composer = Composer::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                composer.set_draft(line);
                let outcome = view.submit(&mut composer);
                if !outcome.is_accepted() {
                    warn!(?outcome, "message not sent");
                }
            }
            event = events.recv() => match event {
                Ok(ChannelEvent::Message { message, origin }) => {
                    let fresh = inbox.record(&message);
                    if message.counterpart(user_id) != counterpart {
                        if fresh && origin == MessageOrigin::Remote {
                            println!("(new message from {} on listing {})", message.sender_id, message.listing_id);
                        }
                    } else {
                        let marker = if origin == MessageOrigin::Local { " (sending)" } else { "" };
                        print_message(&view, &message, marker);
                    }
                }
                Ok(ChannelEvent::History(batch)) => {
                    for message in &batch {
                        inbox.record(message);
                    }
                    print_conversation(&view);
                }
                Ok(ChannelEvent::State(state)) => info!(?state, "connection state"),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "display fell behind, redrawing");
                    print_conversation(&view);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    channel.close();
    Ok(())
}

fn print_message(view: &ConversationView<'_>, message: &ChatMessage, marker: &str) {
    let author = if view.is_own(message) { "you" } else { "them" };
    println!(
        "[{}] {author}: {}{marker}",
        message.created_at.format("%H:%M:%S"),
        message.body
    );
}

/// Redraws the whole conversation in list order, history first.
fn print_conversation(view: &ConversationView<'_>) {
    println!("--- conversation with {} ---", view.counterpart());
    for message in view.messages() {
        print_message(view, &message, "");
    }
}
