// =============================================================================
// Dashboard Feed — WebSocket push of DashboardSnapshot
// =============================================================================
//
// `/api/v1/ws` sends the current dashboard as soon as the socket opens, then
// re-sends it whenever the state version moves. The version is polled every
// 500 ms, so bursts of publishes collapse into one frame.
// =============================================================================

use std::ops::ControlFlow;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::app_state::AppState;

const VERSION_POLL: Duration = Duration::from_millis(500);

type FeedSink = SplitSink<WebSocket, Message>;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    debug!("dashboard feed upgrade requested");
    ws.on_upgrade(move |socket| run_feed(socket, state))
}

async fn run_feed(socket: WebSocket, state: Arc<AppState>) {
    let (mut sink, mut stream) = socket.split();
    info!("dashboard feed opened");

    let mut sent_version = state.current_state_version();
    if let Err(e) = push_dashboard(&mut sink, &state).await {
        warn!(error = %e, "dashboard feed: initial push failed");
        return;
    }

    let mut poll = interval(VERSION_POLL);
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let flow = tokio::select! {
            _ = poll.tick() => {
                let version = state.current_state_version();
                if version == sent_version {
                    ControlFlow::Continue(())
                } else {
                    match push_dashboard(&mut sink, &state).await {
                        Ok(()) => {
                            sent_version = version;
                            ControlFlow::Continue(())
                        }
                        Err(e) => {
                            debug!(error = %e, "dashboard feed: push failed");
                            ControlFlow::Break(())
                        }
                    }
                }
            }
            frame = stream.next() => on_frame(frame, &mut sink).await,
        };

        if flow.is_break() {
            break;
        }
    }

    info!("dashboard feed closed");
}

/// React to one inbound frame. Only Ping (answered) and Close matter.
async fn on_frame(
    frame: Option<Result<Message, axum::Error>>,
    sink: &mut FeedSink,
) -> ControlFlow<()> {
    match frame {
        Some(Ok(Message::Ping(payload))) => match sink.send(Message::Pong(payload)).await {
            Ok(()) => ControlFlow::Continue(()),
            Err(e) => {
                debug!(error = %e, "dashboard feed: pong failed");
                ControlFlow::Break(())
            }
        },
        Some(Ok(Message::Close(_))) | None => ControlFlow::Break(()),
        Some(Ok(_)) => ControlFlow::Continue(()),
        Some(Err(e)) => {
            warn!(error = %e, "dashboard feed: receive error");
            ControlFlow::Break(())
        }
    }
}

async fn push_dashboard(sink: &mut FeedSink, state: &AppState) -> Result<(), axum::Error> {
    let snapshot = state.build_snapshot();
    let json = match serde_json::to_string(&snapshot) {
        Ok(json) => json,
        Err(e) => {
            // Keep the socket; the next publish may serialise.
            warn!(error = %e, "dashboard feed: snapshot serialisation failed");
            return Ok(());
        }
    };

    sink.send(Message::Text(json.into())).await?;
    debug!(version = snapshot.state_version, "dashboard feed: snapshot pushed");
    Ok(())
}
