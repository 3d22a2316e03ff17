use itertools::Itertools;
use serde_derive::Serialize;

use crate::types::Track;

pub const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Solution {
  pub title: String,
  pub artists: String,
  pub album: String,
  pub year: String,
  pub decade: String,
  /// More than one credited artist
  pub has_feature: bool,
  pub position: usize,
  pub total: usize,
}

impl Solution {
  pub fn from_track(track: &Track, position: usize, total: usize) -> Solution {
    let year = release_year(track.release_date());
    let artists = track.artist_names().join(", ");
    Solution {
      title: match track.name.is_empty() {
        true => UNKNOWN.to_string(),
        false => track.name.clone(),
      },
      artists: match artists.is_empty() {
        true => UNKNOWN.to_string(),
        false => artists,
      },
      album: track.album_name().unwrap_or(UNKNOWN).to_string(),
      year: year.map_or_else(|| UNKNOWN.to_string(), |y| y.to_string()),
      decade: year.map_or_else(|| UNKNOWN.to_string(), |y| (y / 10 * 10).to_string()),
      has_feature: track.artists.len() > 1,
      position,
      total,
    }
  }
}

/// Release dates come as `YYYY`, `YYYY-MM` or `YYYY-MM-DD`.
pub fn release_year(date: Option<&str>) -> Option<u32> {
  let prefix = date?.get(..4)?;
  match prefix.chars().all(|c| c.is_ascii_digit()) {
    true => prefix.parse().ok(),
    false => None,
  }
}
