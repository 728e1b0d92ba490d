//! Caller identity extraction.
//!
//! The shop sits behind an auth provider that authenticates users and
//! forwards who they are in trusted headers. A request without a user id is
//! treated as an anonymous guest.

use axum::{extract::FromRequestParts, http::request::Parts};
use shop_types::{APIError, AuthenticatedUser, Caller, Role};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_EMAIL_HEADER: &str = "x-user-email";

/// The caller of the current request.
#[derive(Debug, Clone)]
pub struct Identity(pub Caller);

fn header<'a>(parts: &'a Parts, name: &str) -> Result<Option<&'a str>, APIError> {
	match parts.headers.get(name) {
		None => Ok(None),
		Some(value) => value
			.to_str()
			.map(|v| Some(v.trim()).filter(|v| !v.is_empty()))
			.map_err(|_| APIError::Unauthorized {
				message: format!("Invalid {} header", name),
			}),
	}
}

impl<S> FromRequestParts<S> for Identity
where
	S: Send + Sync,
{
	type Rejection = APIError;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		let Some(id) = header(parts, USER_ID_HEADER)? else {
			return Ok(Identity(Caller::Anonymous));
		};
		let role = match header(parts, USER_ROLE_HEADER)? {
			Some(raw) => raw
				.parse::<Role>()
				.map_err(|message| APIError::Unauthorized { message })?,
			None => Role::User,
		};
		Ok(Identity(Caller::User(AuthenticatedUser {
			id: id.to_string(),
			role,
			name: header(parts, USER_NAME_HEADER)?.map(str::to_string),
			email: header(parts, USER_EMAIL_HEADER)?.map(str::to_string),
		})))
	}
}
