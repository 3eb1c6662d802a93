//! Error taxonomy for client operations

use crate::backend::BackendError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The operation needs a signed-in user and there is none
    #[error("You must be logged in to {0}.")]
    AuthRequired(&'static str),

    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Rejected locally before any request was made
    #[error("{0}")]
    Invalid(String),

    /// An expected row was absent; callers treat this as a no-op
    #[error("{0} not found")]
    NotFound(String),

    /// The membership row changed but the likes counter write failed
    #[error("Song {song_id} was {action}, but its like count could not be updated: {source}")]
    CounterDrift {
        song_id: i64,
        action: &'static str,
        #[source]
        source: BackendError,
    },
}

impl AppError {
    /// Short message suitable for the notification area
    pub fn user_message(&self) -> String {
        match self {
            AppError::AuthRequired(_) | AppError::Invalid(_) | AppError::CounterDrift { .. } => {
                self.to_string()
            }
            AppError::NotFound(what) => format!("Nothing to do: {} not found", what),
            AppError::Backend(BackendError::Timeout) => {
                "The server did not answer in time. Try again.".to_string()
            }
            AppError::Backend(BackendError::Http { status: 401, .. }) => {
                "Session expired. Restart to sign in again.".to_string()
            }
            AppError::Backend(e) => format!("Error: {}", e),
        }
    }
}
