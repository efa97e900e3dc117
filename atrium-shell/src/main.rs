//! Atrium Shell: a terminal front for one room session.
//!
//! Runs the whole stack in one process: push gateway, in-memory
//! backend, push client, and the session controller. Input lines are
//! sent as posts (enter to submit); `/up` nudges the synthetic viewport
//! toward the top to exercise backward pagination; `/who` prints the
//! presence sidebar; `/quit` tears the session down.

mod backend;
mod view;

use std::sync::Arc;
use std::time::Duration;

use atrium_sync::api::ChatApi;
use atrium_sync::client::{PushClient, PushEvent};
use atrium_sync::presence::Participant;
use atrium_sync::scroll::ScrollPosition;
use atrium_sync::server::{GatewayConfig, PushGateway};
use atrium_sync::session::{
    init, setup_commands, teardown_commands, update, Command, Msg, Session, SessionModel,
};
use chrono::Utc;
use log::info;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use backend::LocalBackend;

/// Synthetic stand-in for a scroll container. Offset-from-top shrinks
/// as the viewer scrolls up; the bottom is just a large offset.
struct ShellViewport {
    offset_from_top: f32,
}

const VIEWPORT_BOTTOM: f32 = 1_500.0;
const SCROLL_STEP: f32 = 300.0;
/// Height a prepended page adds above the anchor in the synthetic
/// viewport.
const PREPENDED_PAGE_HEIGHT: f32 = 800.0;

impl ShellViewport {
    fn new() -> Self {
        Self {
            offset_from_top: VIEWPORT_BOTTOM,
        }
    }

    fn scroll_up(&mut self) {
        self.offset_from_top = (self.offset_from_top - SCROLL_STEP).max(0.0);
    }

    fn scroll_to_bottom(&mut self) {
        self.offset_from_top = VIEWPORT_BOTTOM;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Bring up the gateway on a free local port.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    drop(listener);

    let gateway = PushGateway::new(GatewayConfig {
        bind_addr: format!("127.0.0.1:{port}"),
        ..GatewayConfig::default()
    });
    let handle = gateway.handle();
    tokio::spawn(async move {
        if let Err(e) = gateway.run().await {
            log::error!("gateway stopped: {e}");
        }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let api = Arc::new(LocalBackend::seed(handle));
    let session = Session::new("local-dev");
    let mut model = init(api.as_ref(), &session, api.space_slug(), api.room_id()).await?;

    let identity = Participant::new(model.viewer.id, model.viewer.name.clone());
    let mut client = PushClient::new(identity, format!("ws://127.0.0.1:{port}"));
    let mut push_events = client.take_event_rx().expect("fresh client");
    client.connect().await?;
    let client = Arc::new(client);

    info!(
        "joined #{} in {} ({} messages loaded)",
        model.room.name,
        model.space.name,
        model.posts.len()
    );

    let (msg_tx, mut msg_rx) = mpsc::channel::<Msg>(64);
    let mut viewport = ShellViewport::new();

    for command in setup_commands(&model) {
        run_command(command, &api, &session, &client, &msg_tx, &mut viewport);
    }

    print!("{}", view::render_thread(&model));
    print!("{}", view::render_sidebar(&model));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut clock = tokio::time::interval(Duration::from_secs(1));
    let mut scroll_poll = tokio::time::interval(Duration::from_millis(500));

    let mut last_post_count = model.posts.len();
    let mut last_presence = model.presence.state().clone();

    loop {
        let msgs: Vec<Msg> = tokio::select! {
            line = lines.next_line() => {
                match line? {
                    None => break,
                    Some(input) => match shell_input(input.trim(), &model, &mut viewport) {
                        ShellAction::Quit => break,
                        ShellAction::Msgs(msgs) => msgs,
                    },
                }
            }
            _ = clock.tick() => vec![Msg::Ticked(Utc::now().fixed_offset())],
            _ = scroll_poll.tick() => vec![Msg::ScrollPolled],
            event = push_events.recv() => match event {
                Some(PushEvent::Event(event)) => vec![Msg::PushEventReceived(event)],
                Some(PushEvent::Presence { topic, participants }) => {
                    vec![Msg::PresenceSnapshotReceived { topic, participants }]
                }
                Some(PushEvent::Connected) => Vec::new(),
                Some(PushEvent::Disconnected) | None => {
                    println!("(connection to gateway lost)");
                    break;
                }
            },
            Some(msg) = msg_rx.recv() => vec![msg],
        };

        for msg in msgs {
            for command in update(&mut model, msg) {
                run_command(command, &api, &session, &client, &msg_tx, &mut viewport);
            }
        }

        if model.posts.len() != last_post_count {
            last_post_count = model.posts.len();
            print!("{}", view::render_thread(&model));
        }
        if model.presence.state() != &last_presence {
            last_presence = model.presence.state().clone();
            print!("{}", view::render_sidebar(&model));
        }
        if !model.submit_errors.is_empty() {
            println!("{}", view::render_submit_errors(&model));
        }
    }

    for command in teardown_commands(&model) {
        run_command(command, &api, &session, &client, &msg_tx, &mut viewport);
    }
    // Let the leave frame drain before the process exits.
    tokio::time::sleep(Duration::from_millis(100)).await;
    info!("left #{}", model.room.name);
    Ok(())
}

enum ShellAction {
    Quit,
    Msgs(Vec<Msg>),
}

fn shell_input(input: &str, model: &SessionModel, viewport: &mut ShellViewport) -> ShellAction {
    match input {
        "/quit" => ShellAction::Quit,
        "/up" => {
            viewport.scroll_up();
            ShellAction::Msgs(vec![Msg::ScrollPolled])
        }
        "/who" => {
            print!("{}", view::render_sidebar(model));
            ShellAction::Msgs(Vec::new())
        }
        "" => ShellAction::Msgs(Vec::new()),
        text => ShellAction::Msgs(vec![
            Msg::ComposerChanged(text.to_string()),
            Msg::SubmitRequested,
        ]),
    }
}

/// Interpret one controller command against the shell's collaborators.
fn run_command(
    command: Command,
    api: &Arc<LocalBackend>,
    session: &Session,
    client: &Arc<PushClient>,
    msg_tx: &mpsc::Sender<Msg>,
    viewport: &mut ShellViewport,
) {
    match command {
        Command::FetchOlder {
            room_id,
            before,
            limit,
        } => {
            let api = api.clone();
            let session = session.clone();
            let tx = msg_tx.clone();
            tokio::spawn(async move {
                let result = api.fetch_older(&session, room_id, before, limit).await;
                let _ = tx.send(Msg::OlderFetched(result)).await;
            });
        }

        Command::SubmitPost { room_id, body } => {
            let api = api.clone();
            let session = session.clone();
            let tx = msg_tx.clone();
            tokio::spawn(async move {
                let result = api.submit_post(&session, room_id, &body).await;
                let _ = tx.send(Msg::SubmitResponded(result)).await;
            });
        }

        Command::RecordView {
            space_id,
            room_id,
            last_read_post_id,
        } => {
            let api = api.clone();
            let session = session.clone();
            let tx = msg_tx.clone();
            tokio::spawn(async move {
                let result = api
                    .record_view(&session, space_id, room_id, last_read_post_id)
                    .await;
                let _ = tx.send(Msg::ViewRecorded(result)).await;
            });
        }

        Command::JoinPresence { topic } => {
            let client = client.clone();
            tokio::spawn(async move {
                if let Err(e) = client.join(&topic).await {
                    log::warn!("presence join failed: {e}");
                }
            });
        }

        Command::LeavePresence { topic } => {
            let client = client.clone();
            tokio::spawn(async move {
                if let Err(e) = client.leave(&topic).await {
                    log::debug!("presence leave failed: {e}");
                }
            });
        }

        Command::QueryScrollPosition { .. } => {
            let position = ScrollPosition::new(viewport.offset_from_top);
            let _ = msg_tx.try_send(Msg::ScrollPositionReceived(position));
        }

        Command::ScrollToBottom { .. } => viewport.scroll_to_bottom(),

        Command::ScrollToAnchor { offset, .. } => {
            // The prepended page now sits above the anchor, so the
            // restored offset lands clear of the fetch threshold.
            viewport.offset_from_top = offset + PREPENDED_PAGE_HEIGHT;
        }

        Command::RedirectToLogin => {
            println!("session expired, please sign in again");
            std::process::exit(0);
        }
    }
}
