use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::{error::AppError, services::access::Identity, state::RoomHub};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const CONNECTION_ID_HEADER: &str = "x-connection-id";

/// Authenticated caller as forwarded by the SSO proxy headers.
#[derive(Debug, Clone)]
pub struct Caller {
    pub identity: Identity,
    /// Realtime connection named by `X-Connection-Id`, as sent. See [`Caller::origin`].
    pub connection_id: Option<Uuid>,
}

impl Caller {
    /// Connection to exclude from the events this request triggers.
    ///
    /// Only a live connection the caller opened qualifies; anything else is ignored so a
    /// caller cannot mute someone else's stream.
    pub fn origin(&self, hub: &RoomHub) -> Option<Uuid> {
        self.connection_id
            .filter(|connection_id| hub.is_owned_by(*connection_id, self.identity.user_id))
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized("missing user identity".into()))?;
        let user_id = Uuid::parse_str(user_id)
            .map_err(|_| AppError::Unauthorized("malformed user identity".into()))?;

        let identity = Identity {
            user_id,
            email: header(parts, USER_EMAIL_HEADER).map(String::from),
            display_name: header(parts, USER_NAME_HEADER).map(String::from),
        };
        let connection_id =
            header(parts, CONNECTION_ID_HEADER).and_then(|value| Uuid::parse_str(value).ok());

        Ok(Self {
            identity,
            connection_id,
        })
    }
}
