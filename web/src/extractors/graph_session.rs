use crate::error::Error;
use crate::session::{SessionUser, SESSION_USER_KEY};
use crate::AppState;
use axum::{extract::FromRequestParts, http::request::Parts};
use domain::{QueryMode, SharedClient};
use log::*;
use tower_sessions::Session;

/// The logged-in user together with their live database connection.
pub(crate) struct GraphSession {
    pub client: SharedClient,
    pub user: SessionUser,
}

impl GraphSession {
    pub fn mode(&self) -> QueryMode {
        self.user.role.into()
    }
}

impl FromRequestParts<AppState> for GraphSession {
    type Rejection = Error;

    // Rejects with 401 when there is no logged-in user or their connection is gone.
    // Touches the session so inactivity expiry is pushed back on every call.
    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_status, msg)| Error::session(msg))?;

        let user: SessionUser = session
            .get(SESSION_USER_KEY)
            .await
            .map_err(Error::session)?
            .ok_or_else(Error::unauthenticated)?;

        let client = state.connections.get(&user.id).ok_or_else(|| {
            debug!("Session for {} has no live connection", user.username);
            Error::unauthenticated()
        })?;

        if let Err(e) = session.save().await {
            warn!("Failed to touch session for activity renewal: {e:?}");
        } else {
            trace!("Session touched successfully for activity renewal");
        }

        Ok(GraphSession { client, user })
    }
}
