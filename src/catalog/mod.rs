use std::fmt::Debug;

use async_trait::async_trait;
use log::{debug, warn};
use serde::de::DeserializeOwned;

use crate::{
  api::ApiClientImpl,
  errors::{QuizError, QuizResult},
  types::{Page, PlaylistItem, PlaylistSummary, RemotePlaylist, Track, UserProfile},
};

pub mod directory;

pub const PLAYLIST_PAGE_LIMIT: u32 = 100;
pub const USER_PLAYLISTS_PAGE_LIMIT: u32 = 50;

/// Read side of the remote music service.
#[async_trait]
pub trait CatalogClient: Send + Sync + Debug {
  /// Every track of the playlist, in playlist order. Pagination is
  /// followed internally, local files and removed entries are skipped.
  async fn list_playlist_tracks(&self, playlist_id: &str) -> QuizResult<Vec<Track>>;

  async fn list_user_playlists(&self) -> QuizResult<Vec<PlaylistSummary>>;
}

impl ApiClientImpl {
  async fn fetch_all_pages<T: DeserializeOwned + Send>(&self, first_page: String) -> QuizResult<Vec<T>> {
    let token = self.token().await.ok_or(QuizError::NotAuthenticated)?;
    let mut items = vec![];
    let mut next = Some(first_page);
    while let Some(url) = next {
      debug!("GET {}", url);
      let response = self.http.get(&url).bearer_auth(&token).send().await?;
      let status = response.status();
      if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!("API error on {}: {} {}", url, status, body);
        return Err(QuizError::Network(format!(
          "status {}: {}",
          status.as_u16(),
          body
        )));
      }
      let page: Page<T> = response.json().await?;
      items.extend(page.items.into_iter().flatten());
      next = page.next;
    }
    Ok(items)
  }

  pub async fn current_user(&self) -> QuizResult<UserProfile> {
    let token = self.token().await.ok_or(QuizError::NotAuthenticated)?;
    let response = self
      .http
      .get(self.url("me"))
      .bearer_auth(&token)
      .send()
      .await?;
    let status = response.status();
    if !status.is_success() {
      return Err(QuizError::Network(format!(
        "status {} reading profile",
        status.as_u16()
      )));
    }
    Ok(response.json().await?)
  }
}

#[async_trait]
impl CatalogClient for ApiClientImpl {
  async fn list_playlist_tracks(&self, playlist_id: &str) -> QuizResult<Vec<Track>> {
    let first = self.url(&format!(
      "playlists/{}/tracks?limit={}",
      playlist_id, PLAYLIST_PAGE_LIMIT
    ));
    let items: Vec<PlaylistItem> = self.fetch_all_pages(first).await?;
    Ok(
      items
        .into_iter()
        .filter_map(PlaylistItem::into_track)
        .collect(),
    )
  }

  async fn list_user_playlists(&self) -> QuizResult<Vec<PlaylistSummary>> {
    let first = self.url(&format!(
      "me/playlists?limit={}",
      USER_PLAYLISTS_PAGE_LIMIT
    ));
    let playlists: Vec<RemotePlaylist> = self.fetch_all_pages(first).await?;
    Ok(
      playlists
        .into_iter()
        .filter_map(RemotePlaylist::into_summary)
        .collect(),
    )
  }
}
