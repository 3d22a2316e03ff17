use std::fmt::Debug;

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::json;
use thiserror::Error;

use crate::api::ApiClientImpl;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
  /// The service knows no device with an open session for this account
  #[error("no active playback device")]
  NoActiveDevice,

  /// Usually a non-premium account or missing playback scopes
  #[error("playback not allowed")]
  Forbidden,

  #[error("login expired")]
  Unauthorized,

  #[error("unexpected status {0}")]
  Other(u16),

  #[error("network error: {0}")]
  Network(String),
}

impl PlaybackError {
  pub fn from_status(status: u16) -> PlaybackError {
    match status {
      404 => PlaybackError::NoActiveDevice,
      403 => PlaybackError::Forbidden,
      401 => PlaybackError::Unauthorized,
      other => PlaybackError::Other(other),
    }
  }

  /// What the player should do about it.
  pub fn user_message(&self) -> String {
    match self {
      PlaybackError::NoActiveDevice => "No active playback device found.\n\
        1. Open Spotify on any device (phone, desktop, speaker)\n\
        2. Play any song briefly and pause it again\n\
        3. Start the round again"
        .to_string(),
      PlaybackError::Forbidden => "Playback is not allowed (403). Make sure the account is \
        Premium and the login granted 'streaming' and 'user-modify-playback-state'."
        .to_string(),
      PlaybackError::Unauthorized => "The login has expired (401). Please log in again.".to_string(),
      PlaybackError::Other(status) => format!("Failed to start playback: status {}", status),
      PlaybackError::Network(e) => format!("Network error while starting playback: {}", e),
    }
  }
}

/// Remote control of the user's already active playback device.
#[async_trait]
pub trait PlaybackRemote: Send + Sync + Debug {
  /// Starts `track_uri` from the beginning. An empty URI is a no-op.
  async fn play(&self, track_uri: &str) -> Result<(), PlaybackError>;

  async fn pause(&self) -> Result<(), PlaybackError>;
}

#[async_trait]
impl PlaybackRemote for ApiClientImpl {
  async fn play(&self, track_uri: &str) -> Result<(), PlaybackError> {
    if track_uri.is_empty() {
      return Ok(());
    }
    let token = self.token().await.ok_or(PlaybackError::Unauthorized)?;
    debug!("play {}", track_uri);
    let response = self
      .http
      .put(self.url("me/player/play"))
      .bearer_auth(&token)
      .json(&json!({
        "uris": [track_uri],
        "position_ms": 0,
      }))
      .send()
      .await
      .map_err(|e| PlaybackError::Network(e.to_string()))?;

    let status = response.status();
    if status.is_success() {
      return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    warn!("Failed to start playback: {} {}", status, body);
    Err(PlaybackError::from_status(status.as_u16()))
  }

  async fn pause(&self) -> Result<(), PlaybackError> {
    let Some(token) = self.token().await else {
      return Ok(());
    };
    let response = self
      .http
      .put(self.url("me/player/pause"))
      .bearer_auth(&token)
      .send()
      .await
      .map_err(|e| PlaybackError::Network(e.to_string()))?;
    match response.status() {
      s if s.is_success() => Ok(()),
      s => Err(PlaybackError::from_status(s.as_u16())),
    }
  }
}
