use thiserror::Error;

/// Errors surfaced by the round engine and its collaborators.
#[derive(Error, Debug)]
pub enum QuizError {
  /// No bearer credential, or the stored one has expired
  #[error("not logged in")]
  NotAuthenticated,

  /// The playlist reference has no `/playlist/<id>` segment
  #[error("could not read a playlist id from {0:?}")]
  InvalidReference(String),

  /// Nothing playable left after filtering
  #[error("playlist has no playable tracks")]
  EmptyPlaylist,

  #[error("no playlist loaded")]
  EmptyQueue,

  #[error("no round started yet")]
  NoActiveRound,

  /// Transport failures and non-success responses from the catalog
  #[error("network error: {0}")]
  Network(String),
}

impl From<reqwest::Error> for QuizError {
  fn from(e: reqwest::Error) -> Self {
    QuizError::Network(e.to_string())
  }
}

pub type QuizResult<T> = std::result::Result<T, QuizError>;
