use std::convert::Infallible;

use axum::{
    Router,
    extract::State,
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
    routing::get,
};
use futures::{Stream, StreamExt};

use crate::{
    events::LmsEvent,
    web::{AppState, RequestContext, WebResult, error::ErrorResponse},
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/events", get(events_stream_handler))
}

fn to_sse(event: LmsEvent) -> Result<Event, Infallible> {
    Ok(match Event::default().event(event.name()).json_data(&event) {
        Ok(sse) => sse,
        Err(e) => {
            tracing::warn!("failed to encode {} event: {e}", event.name());
            Event::default().comment("encoding failed")
        }
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/events",
    description = "Server-sent events. Staff receive every event, learners their own and catalog changes",
    responses(
        (status = 200, description = "Event stream", body = String, content_type = "text/event-stream"),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    ),
    tag = "events",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn events_stream_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?.clone();
    tracing::debug!(
        "user {} subscribed to events ({} listeners)",
        user.user_id(),
        state.events().subscriber_count() + 1
    );

    let stream: std::pin::Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>> =
        Box::pin(state.events().stream_for(user).map(to_sse));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
