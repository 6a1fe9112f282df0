//! Server-Sent Events stream of bus outputs

use super::AppContext;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};
use vela_common::events::VelaEvent;

/// GET /api/v1/events
///
/// Only outbound events are streamed: thresholds, AGD outputs, level changes
/// and player state changes.
pub async fn event_stream(
    State(ctx): State<AppContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("New SSE client connected");

    let stream = BroadcastStream::new(ctx.bus.subscribe())
        .filter_map(|result| async move {
            match result {
                Ok(event) if event.is_outbound() => to_sse_event(&event).map(Ok),
                Ok(_) => None,
                Err(e) => {
                    warn!("SSE stream error: {:?}", e);
                    None
                }
            }
        });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_sse_event(event: &VelaEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Event::default().event(event.event_type()).data(json)),
        Err(e) => {
            warn!("Failed to serialize event: {}", e);
            None
        }
    }
}
