//! Plain-text rendering of the session model.

use atrium_sync::presence::PresenceState;
use atrium_sync::session::SessionModel;
use atrium_sync::timefmt::format_time;

/// The conversation thread, one line per post.
pub fn render_thread(model: &SessionModel) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "== #{} in {} ==\n",
        model.room.name, model.space.name
    ));
    if model.is_fetching_older {
        out.push_str("  (loading older messages...)\n");
    }
    for post in model.posts.nodes() {
        let stamp = format_time(&post.posted_at.with_timezone(&model.now.timezone()));
        out.push_str(&format!("[{stamp}] {}: {}\n", post.author.name, post.body));
    }
    out
}

/// The presence sidebar. Shows a placeholder until the first snapshot.
pub fn render_sidebar(model: &SessionModel) -> String {
    let mut out = String::from("-- who's here --\n");
    match model.presence.state() {
        PresenceState::NotLoaded => out.push_str("Loading...\n"),
        PresenceState::Loaded(participants) => {
            if participants.is_empty() {
                out.push_str("(nobody)\n");
            } else {
                for participant in participants {
                    out.push_str(&format!("* {}\n", participant.name));
                }
            }
        }
    }
    out
}

/// Field errors from the last rejected submission.
pub fn render_submit_errors(model: &SessionModel) -> String {
    model
        .submit_errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("\n")
}

// ===================================================================
// Tests
// ===================================================================
