use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{self, AsyncBufReadExt};
use tokio::sync::mpsc;

use tandem::chat::UiEvent;
use tandem::config::{ChatArgs, init_logging};
use tandem::peer::{Event, Handshake, HandshakeConfig};
use tandem::rtc::native::WebRtcConnector;
use tandem::rtc::{MediaConstraints, MediaSource, SyntheticMedia};
use tandem::transport;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = ChatArgs::parse();
    init_logging();

    // 1. Local media first; without it there is nothing to start.
    let stream = SyntheticMedia.acquire(MediaConstraints::default()).await?;

    // 2. Join the room.
    let (joined, handle, transport_rx) = transport::connect(&args.server, &args.room).await?;

    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel::<UiEvent>();
    let connector = Arc::new(WebRtcConnector::new(args.ice_servers.clone()));
    let (handshake, inbox) = Handshake::new(
        HandshakeConfig {
            display_name: args.name.clone(),
        },
        connector,
        handle,
        ui_tx,
    );

    let events = handshake.sender();
    let _ = events.send(Event::MediaReady(stream));
    let _ = events.send(Event::Joined(joined));

    // 3. Render the transcript as it grows.
    tokio::spawn(async move {
        while let Some(event) = ui_rx.recv().await {
            match event {
                UiEvent::Line(line) => {
                    println!("[{}] {}: {}", line.at.format("%H:%M:%S"), line.sender, line.text)
                }
                UiEvent::ChatEnabled => println!("-- chat ready, type a message and press Enter --"),
                UiEvent::ChatDisabled => println!("-- chat disabled --"),
                UiEvent::RemoteTrack { kind } => println!("-- receiving remote {} --", kind),
                UiEvent::Closed { reason } => println!("-- session closed: {} --", reason),
            }
        }
    });

    // 4. One stdin line per Enter press.
    let input_events = events.clone();
    tokio::spawn(async move {
        let mut stdin = io::BufReader::new(io::stdin()).lines();
        while let Ok(Some(line)) = stdin.next_line().await {
            if input_events.send(Event::ChatInput(line)).is_err() {
                return;
            }
        }
        let _ = input_events.send(Event::Shutdown);
    });

    let signal_events = events.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = signal_events.send(Event::Shutdown);
        }
    });

    handshake.run(inbox, transport_rx).await?;
    Ok(())
}
