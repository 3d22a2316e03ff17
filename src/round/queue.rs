use rand::{seq::SliceRandom, Rng};

use crate::types::Track;

/// Shuffled tracks of the loaded playlist plus the position of the
/// current round, `None` before the first round.
#[derive(Debug, Clone, Default)]
pub struct TrackQueue {
  tracks: Vec<Track>,
  position: Option<usize>,
}

impl TrackQueue {
  pub fn shuffled<R: Rng + ?Sized>(mut tracks: Vec<Track>, rng: &mut R) -> TrackQueue {
    tracks.shuffle(rng);
    TrackQueue {
      tracks,
      position: None,
    }
  }

  pub fn len(&self) -> usize {
    self.tracks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tracks.is_empty()
  }

  pub fn position(&self) -> Option<usize> {
    self.position
  }

  pub fn tracks(&self) -> &[Track] {
    &self.tracks
  }

  pub fn current(&self) -> Option<&Track> {
    self.position.and_then(|p| self.tracks.get(p))
  }

  /// Moves to the next track. Running off the end reshuffles in place and
  /// starts over at 0, so `position == len` is never observable.
  pub fn advance<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<usize> {
    if self.tracks.is_empty() {
      return None;
    }
    let mut next = self.position.map_or(0, |p| p + 1);
    if next >= self.tracks.len() {
      self.tracks.shuffle(rng);
      next = 0;
    }
    self.position = Some(next);
    self.position
  }
}
