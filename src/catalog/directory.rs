use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::Mutex;

use crate::{
  auth::AccessTokenProvider,
  catalog::CatalogClient,
  errors::{QuizError, QuizResult},
  types::PlaylistSummary,
};

pub const MAX_SUGGESTIONS: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub enum Suggestions {
  LoginRequired,
  /// Loading the playlists failed, see the log
  Unavailable,
  NoPlaylists,
  NoMatches,
  Matches(Vec<PlaylistSummary>),
}

/// The logged-in user's playlists, fetched once and then filtered locally.
#[derive(Debug)]
pub struct PlaylistDirectoryImpl {
  catalog: Arc<dyn CatalogClient>,
  auth: Arc<dyn AccessTokenProvider>,
  // Held across the fetch, so concurrent callers wait for one load.
  playlists: Mutex<Option<Vec<PlaylistSummary>>>,
}

pub type PlaylistDirectory = Arc<PlaylistDirectoryImpl>;

impl PlaylistDirectoryImpl {
  pub fn new(
    catalog: Arc<dyn CatalogClient>,
    auth: Arc<dyn AccessTokenProvider>,
  ) -> PlaylistDirectory {
    Arc::new(PlaylistDirectoryImpl {
      catalog,
      auth,
      playlists: Default::default(),
    })
  }
}

impl PlaylistDirectoryImpl {
  pub async fn ensure_loaded(&self) -> QuizResult<Vec<PlaylistSummary>> {
    if self.auth.get_valid_access_token().await.is_none() {
      return Err(QuizError::NotAuthenticated);
    }
    let mut playlists = self.playlists.lock().await;
    if let Some(playlists) = &*playlists {
      return Ok(playlists.clone());
    }
    let loaded = self.catalog.list_user_playlists().await?;
    debug!("loaded {} user playlists", loaded.len());
    *playlists = Some(loaded.clone());
    Ok(loaded)
  }

  /// Forget the cached list, e.g. after logout.
  pub async fn invalidate(&self) {
    *self.playlists.lock().await = None;
  }

  pub async fn suggestions(&self, filter: &str) -> Suggestions {
    let playlists = match self.ensure_loaded().await {
      Ok(playlists) => playlists,
      Err(QuizError::NotAuthenticated) => return Suggestions::LoginRequired,
      Err(e) => {
        warn!("Failed to load playlists: {}", e);
        return Suggestions::Unavailable;
      }
    };
    if playlists.is_empty() {
      return Suggestions::NoPlaylists;
    }
    match filter_playlists(&playlists, filter) {
      matches if matches.is_empty() => Suggestions::NoMatches,
      matches => Suggestions::Matches(matches),
    }
  }
}

/// Case-insensitive substring match on name or owner, first
/// [`MAX_SUGGESTIONS`] hits in listing order.
pub fn filter_playlists(playlists: &[PlaylistSummary], filter: &str) -> Vec<PlaylistSummary> {
  let needle = filter.trim().to_lowercase();
  playlists
    .iter()
    .filter(|p| {
      needle.is_empty()
        || p.name.to_lowercase().contains(&needle)
        || p.owner.to_lowercase().contains(&needle)
    })
    .take(MAX_SUGGESTIONS)
    .cloned()
    .collect()
}
