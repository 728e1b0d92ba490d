//! Inbox, device registration and the live event stream.

use crate::auth::Identity;
use crate::server::AppState;
use axum::{
	extract::{Path, State},
	response::{
		sse::{Event, KeepAlive, Sse},
		Json,
	},
	routing::{get, post, put},
	Router,
};
use futures::{future, Stream, StreamExt};
use shop_types::{APIError, Notification, RegisterTokenRequest, SuccessResponse};
use std::convert::Infallible;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

pub fn router() -> Router<AppState> {
	Router::new()
		.route("/notifications", get(handle_inbox))
		.route("/notifications/register-token", post(handle_register_token))
		.route("/notifications/stream", get(handle_stream))
		.route("/notifications/{id}/read", put(handle_mark_read))
}

/// Handles POST /api/notifications/register-token requests.
///
/// A `null` token unregisters the caller's device.
async fn handle_register_token(
	State(state): State<AppState>,
	Identity(caller): Identity,
	Json(request): Json<RegisterTokenRequest>,
) -> Result<Json<SuccessResponse>, APIError> {
	state
		.shop
		.notifications()
		.register_token(&caller, request)
		.await?;
	Ok(Json(SuccessResponse::ok()))
}

async fn handle_inbox(
	State(state): State<AppState>,
	Identity(caller): Identity,
) -> Result<Json<Vec<Notification>>, APIError> {
	Ok(Json(state.shop.notifications().inbox(&caller).await?))
}

async fn handle_mark_read(
	State(state): State<AppState>,
	Identity(caller): Identity,
	Path(id): Path<String>,
) -> Result<Json<Notification>, APIError> {
	Ok(Json(state.shop.notifications().mark_read(&caller, &id).await?))
}

/// Handles GET /api/notifications/stream requests.
///
/// Streams order events as server-sent events. Customers only see events
/// for their own orders; staff see everything. A client that falls behind
/// skips the events it missed.
async fn handle_stream(
	State(state): State<AppState>,
	Identity(caller): Identity,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, APIError> {
	let Some(user) = caller.user().cloned() else {
		return Err(APIError::Unauthorized {
			message: "Authentication required".to_string(),
		});
	};
	tracing::debug!(user_id = %user.id, "Event stream opened");

	let receiver = state.shop.event_bus().subscribe();
	let stream = BroadcastStream::new(receiver).filter_map(move |item| {
		let event = match item {
			Ok(event) if event.visible_to(Some(&user.id), user.is_staff()) => {
				match Event::default().json_data(&event) {
					Ok(sse) => Some(Ok(sse)),
					Err(e) => {
						tracing::warn!(error = %e, "Failed to encode event");
						None
					},
				}
			},
			Ok(_) => None,
			Err(BroadcastStreamRecvError::Lagged(skipped)) => {
				tracing::warn!(user_id = %user.id, skipped, "Event stream lagged");
				None
			},
		};
		future::ready(event)
	});

	Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
