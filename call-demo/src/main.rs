use std::time::Duration;

use anyhow::Context;
use call_signal::channel::{ChannelConfig, SignalEvent, SignalEvents, SignalingChannel};
use call_signal::store::{DocumentStore, WebSocketStore};
use call_signal::{CallId, Role, SdpType};
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use log::{info, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use crate::media::FakeMediaEngine;

mod media;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// WebSocket endpoint of call-signal-server.
    #[arg(long, default_value = "ws://127.0.0.1:9001/store")]
    server: String,
    /// Collection call documents live in.
    #[arg(long, default_value = "calls")]
    collection: String,
    /// One of off, error, warn, info, debug, trace.
    #[arg(long, default_value = "info", value_parser = parse_level)]
    log_level: LevelFilter,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a call and print its id.
    Phone {
        /// Delete the call this many seconds after it was created.
        #[arg(long)]
        hang_up_after: Option<u64>,
    },
    /// Answer the call with the given id.
    Dispatcher { call_id: CallId },
}

fn parse_level(level: &str) -> Result<LevelFilter, String> {
    level
        .parse()
        .map_err(|_| format!("unknown log level: {level}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    TermLogger::init(
        cli.log_level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )?;

    let store = WebSocketStore::connect(&cli.server)
        .await
        .with_context(|| format!("could not reach {}", cli.server))?;

    match cli.command {
        Command::Phone { hang_up_after } => {
            let config = ChannelConfig::new(Role::Phone).with_collection(cli.collection);
            let (mut channel, events) = SignalingChannel::new(store, config);
            let call_id = channel.connect().await?;
            println!("{call_id}");

            let media = FakeMediaEngine::new(Role::Phone);
            channel.send_description(media.create_offer()).await?;
            for candidate in media.gather_candidates() {
                channel.send_candidate(candidate).await?;
            }
            run_call(channel, events, media, hang_up_after.map(Duration::from_secs)).await
        }
        Command::Dispatcher { call_id } => {
            let config = ChannelConfig::new(Role::Dispatcher).with_collection(cli.collection);
            let (mut channel, events) = SignalingChannel::new(store, config);
            channel.join(call_id).await?;
            run_call(channel, events, FakeMediaEngine::new(Role::Dispatcher), None).await
        }
    }
}

/// Feed signaling events into the media engine until the call ends, is hung up or interrupted.
async fn run_call<S: DocumentStore>(
    mut channel: SignalingChannel<S>,
    mut events: SignalEvents,
    mut media: FakeMediaEngine,
    hang_up_after: Option<Duration>,
) -> anyhow::Result<()> {
    let hang_up = async {
        match hang_up_after {
            Some(delay) => tokio::time::sleep(delay).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(hang_up);

    loop {
        tokio::select! {
            event = events.next() => {
                let Some(event) = event else { break };
                if !handle_event(&channel, &mut media, event).await? {
                    break;
                }
            }
            () = &mut hang_up => {
                channel.hang_up().await?;
                break;
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("interrupted, leaving the call");
                channel.close();
                break;
            }
        }
    }

    info!(
        "call finished, media negotiated: {}",
        media.is_negotiated()
    );
    Ok(())
}

/// Returns `false` once the call is over.
async fn handle_event<S: DocumentStore>(
    channel: &SignalingChannel<S>,
    media: &mut FakeMediaEngine,
    event: SignalEvent,
) -> call_signal::Result<bool> {
    match event {
        SignalEvent::Connected => info!("remote participant joined the call"),
        SignalEvent::Disconnected => {
            info!("call document is gone");
            return Ok(false);
        }
        SignalEvent::RemoteDescription(description) => {
            media.set_remote_description(&description);
            if description.sdp_type == SdpType::Offer {
                channel.send_description(media.create_answer()).await?;
                for candidate in media.gather_candidates() {
                    channel.send_candidate(candidate).await?;
                }
            }
        }
        SignalEvent::RemoteCandidate(candidate) => media.add_remote_candidate(&candidate),
    }
    Ok(true)
}
