use serde_derive::{Deserialize, Serialize};

pub type TrackId = String;
pub type PlaylistId = String;
pub type TrackUri = String;

// {
//   "id": "4uLU6hMCjMI75M1A2tKUQC",
//   "uri": "spotify:track:4uLU6hMCjMI75M1A2tKUQC",
//   "name": "Never Gonna Give You Up",
//   "artists": [{ "name": "Rick Astley" }],
//   "album": { "name": "Whenever You Need Somebody", "release_date": "1987-11-12" },
//   "is_playable": true
// }
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Track {
  #[serde(default)]
  pub id: Option<TrackId>,
  #[serde(default)]
  pub uri: TrackUri,
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub artists: Vec<Artist>,
  #[serde(default)]
  pub album: Option<Album>,
  #[serde(default)]
  pub is_playable: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Artist {
  #[serde(default)]
  pub name: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Album {
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub release_date: Option<String>,
}

impl Track {
  /// A track can be handed to the playback remote only when it has a URI
  /// and the catalog did not flag it as unplayable for this account.
  pub fn is_playable(&self) -> bool {
    !self.uri.is_empty() && self.is_playable != Some(false)
  }

  pub fn artist_names(&self) -> impl Iterator<Item = &str> {
    self
      .artists
      .iter()
      .map(|a| a.name.as_str())
      .filter(|name| !name.is_empty())
  }

  pub fn album_name(&self) -> Option<&str> {
    self
      .album
      .as_ref()
      .map(|a| a.name.as_str())
      .filter(|name| !name.is_empty())
  }

  pub fn release_date(&self) -> Option<&str> {
    self
      .album
      .as_ref()
      .and_then(|a| a.release_date.as_deref())
      .filter(|date| !date.is_empty())
  }
}

/// One entry of a playlist page. Local files carry `is_local = true` and
/// removed tracks come back as `track: null`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlaylistItem {
  #[serde(default)]
  pub is_local: bool,
  #[serde(default)]
  pub track: Option<Track>,
}

impl PlaylistItem {
  pub fn into_track(self) -> Option<Track> {
    match self.is_local {
      true => None,
      false => self.track,
    }
  }
}

/// Cursor-paginated listing, `next` is the absolute URL of the next page.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
  #[serde(default = "Vec::new")]
  pub items: Vec<Option<T>>,
  #[serde(default)]
  pub next: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemotePlaylist {
  #[serde(default)]
  pub id: Option<PlaylistId>,
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub owner: Option<RemoteOwner>,
  #[serde(default)]
  pub tracks: Option<RemoteTrackCount>,
  #[serde(default)]
  pub external_urls: Option<ExternalUrls>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteOwner {
  #[serde(default)]
  pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteTrackCount {
  #[serde(default)]
  pub total: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExternalUrls {
  #[serde(default)]
  pub spotify: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaylistSummary {
  pub id: PlaylistId,
  pub name: String,
  pub owner: String,
  pub track_count: Option<u32>,
  pub canonical_url: String,
}

impl RemotePlaylist {
  pub fn into_summary(self) -> Option<PlaylistSummary> {
    let id = self.id.filter(|id| !id.is_empty())?;
    let canonical_url = self
      .external_urls
      .and_then(|u| u.spotify)
      .unwrap_or_else(|| format!("https://open.spotify.com/playlist/{}", id));
    Some(PlaylistSummary {
      name: self.name.unwrap_or_default(),
      owner: self
        .owner
        .and_then(|o| o.display_name)
        .unwrap_or_else(|| "Unknown".to_string()),
      track_count: self.tracks.and_then(|t| t.total),
      canonical_url,
      id,
    })
  }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserProfile {
  #[serde(default)]
  pub id: String,
  #[serde(default)]
  pub display_name: Option<String>,
}

impl UserProfile {
  pub fn display(&self) -> String {
    match (self.display_name.as_deref(), self.id.as_str()) {
      (Some(name), _) if !name.is_empty() => name.to_string(),
      (_, id) if !id.is_empty() => id.to_string(),
      _ => "Spotify User".to_string(),
    }
  }
}
