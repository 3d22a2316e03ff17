use std::sync::Arc;

use log::{debug, info, warn};
use rand::{rngs::StdRng, SeedableRng};
use tokio::sync::broadcast;

use crate::{
  auth::AccessTokenProvider,
  catalog::CatalogClient,
  errors::{QuizError, QuizResult},
  playback::PlaybackRemote,
};

pub mod category;
pub mod countdown;
pub mod queue;
pub mod reference;
pub mod solution;

pub use category::{choose_category, Category, Mode};
pub use countdown::{CountdownState, IntervalTickSource, ManualTickSource, TickSource};
pub use queue::TrackQueue;
pub use reference::parse_reference;
pub use solution::Solution;

use countdown::Countdown;

pub const DEFAULT_ROUND_SECONDS: u32 = 30;
const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundInfo {
  pub position: usize,
  pub total: usize,
  pub category: Category,
  pub seconds: u32,
}

/// Everything the presentation layer needs to follow the game.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundEvent {
  PlaylistLoaded { count: usize },
  RoundStarted(RoundInfo),
  CountdownTick { remaining: u32 },
  /// Playback has been told to pause, the solution stays hidden
  CountdownExpired,
  SolutionRevealed(Solution),
  /// Playback failed, the round goes on regardless
  PlaybackWarning(String),
  Stopped,
  ModeChanged(Mode),
}

/// Snapshot of the derived round state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundState {
  pub mode: Mode,
  pub position: Option<usize>,
  pub total: usize,
  pub category: Option<Category>,
  pub remaining: u32,
  pub countdown: CountdownState,
  pub round_active: bool,
  pub revealed: bool,
}

impl RoundState {
  /// `"3 / 20"`, or a dash before the first round.
  pub fn round_label(&self) -> String {
    match self.position {
      Some(p) if self.total > 0 => format!("{} / {}", p + 1, self.total),
      _ => "–".to_string(),
    }
  }
}

/// Owns the queue, the mode and the countdown, and drives the remote
/// playback. Exactly one round is live at a time: every operation that
/// starts, reveals or stops a round cancels the pending countdown before
/// issuing any remote command.
#[derive(Debug)]
pub struct RoundEngine {
  auth: Arc<dyn AccessTokenProvider>,
  catalog: Arc<dyn CatalogClient>,
  playback: Arc<dyn PlaybackRemote>,
  queue: TrackQueue,
  mode: Mode,
  category: Option<Category>,
  round_active: bool,
  revealed: bool,
  countdown: Countdown,
  events: broadcast::Sender<RoundEvent>,
  rng: StdRng,
  default_seconds: u32,
}

fn countdown_for(source: Arc<dyn TickSource>, events: &broadcast::Sender<RoundEvent>) -> Countdown {
  let events = events.clone();
  Countdown::new(
    source,
    Arc::new(move |remaining| {
      let _ = events.send(RoundEvent::CountdownTick { remaining });
    }),
  )
}

impl RoundEngine {
  pub fn new(
    auth: Arc<dyn AccessTokenProvider>,
    catalog: Arc<dyn CatalogClient>,
    playback: Arc<dyn PlaybackRemote>,
  ) -> RoundEngine {
    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    RoundEngine {
      auth,
      catalog,
      playback,
      queue: TrackQueue::default(),
      mode: Mode::default(),
      category: None,
      round_active: false,
      revealed: false,
      countdown: countdown_for(Arc::new(IntervalTickSource::default()), &events),
      events,
      rng: StdRng::from_entropy(),
      default_seconds: DEFAULT_ROUND_SECONDS,
    }
  }

  pub fn with_tick_source(mut self, source: Arc<dyn TickSource>) -> RoundEngine {
    self.countdown = countdown_for(source, &self.events);
    self
  }

  pub fn with_seed(mut self, seed: u64) -> RoundEngine {
    self.rng = StdRng::seed_from_u64(seed);
    self
  }

  pub fn with_mode(mut self, mode: Mode) -> RoundEngine {
    self.mode = mode;
    self
  }

  /// Used when a round is started with 0 seconds.
  pub fn with_default_seconds(mut self, seconds: u32) -> RoundEngine {
    self.default_seconds = match seconds {
      0 => DEFAULT_ROUND_SECONDS,
      s => s,
    };
    self
  }
}

impl RoundEngine {
  pub fn subscribe(&self) -> broadcast::Receiver<RoundEvent> {
    self.events.subscribe()
  }

  pub fn state(&self) -> RoundState {
    RoundState {
      mode: self.mode,
      position: self.queue.position(),
      total: self.queue.len(),
      category: self.category,
      remaining: self.countdown.remaining(),
      countdown: self.countdown.state(),
      round_active: self.round_active,
      revealed: self.revealed,
    }
  }

  pub fn mode(&self) -> Mode {
    self.mode
  }

  pub fn default_seconds(&self) -> u32 {
    self.default_seconds
  }

  fn emit(&self, event: RoundEvent) {
    // No subscribers is fine.
    let _ = self.events.send(event);
  }

  /// Replaces the queue with the playable tracks of the referenced
  /// playlist, shuffled. On any error the previous queue stays as it was.
  pub async fn load_playlist(&mut self, reference: &str) -> QuizResult<usize> {
    if self.auth.get_valid_access_token().await.is_none() {
      return Err(QuizError::NotAuthenticated);
    }
    let playlist_id = parse_reference(reference)?;
    info!("loading playlist {}", playlist_id);

    let tracks = self
      .catalog
      .list_playlist_tracks(&playlist_id)
      .await?
      .into_iter()
      .filter(|t| t.is_playable())
      .collect::<Vec<_>>();
    if tracks.is_empty() {
      return Err(QuizError::EmptyPlaylist);
    }

    self.countdown.cancel();
    if self.round_active {
      // the old track would otherwise keep playing with no round to stop
      self.spawn_pause();
    }
    self.queue = TrackQueue::shuffled(tracks, &mut self.rng);
    self.category = None;
    self.round_active = false;
    self.revealed = false;

    let count = self.queue.len();
    info!("playlist {} loaded, {} tracks", playlist_id, count);
    self.emit(RoundEvent::PlaylistLoaded { count });
    Ok(count)
  }

  /// Moves to the next track, poses a fresh category and starts the
  /// countdown. The play command runs in the background: a playback
  /// failure shows up as [`RoundEvent::PlaybackWarning`] and does not undo
  /// the round.
  pub async fn start_round(&mut self, seconds: u32) -> QuizResult<RoundInfo> {
    if self.auth.get_valid_access_token().await.is_none() {
      return Err(QuizError::NotAuthenticated);
    }
    if self.queue.is_empty() {
      return Err(QuizError::EmptyQueue);
    }

    self.countdown.cancel();
    let position = self.queue.advance(&mut self.rng).ok_or(QuizError::EmptyQueue)?;
    let uri = self
      .queue
      .current()
      .map(|t| t.uri.clone())
      .unwrap_or_default();

    self.revealed = false;
    self.round_active = true;
    let category = category::choose_category_with(self.mode, &mut self.rng);
    self.category = Some(category);

    let seconds = match seconds {
      0 => self.default_seconds,
      s => s,
    };
    let info = RoundInfo {
      position,
      total: self.queue.len(),
      category,
      seconds,
    };
    debug!(
      "round {}/{}: {} ({}s)",
      position + 1,
      info.total,
      category.id(),
      seconds
    );
    self.emit(RoundEvent::RoundStarted(info.clone()));

    let events = self.events.clone();
    let playback = self.playback.clone();
    self.countdown.start(seconds, move || {
      info!("countdown expired, pausing playback");
      let _ = events.send(RoundEvent::CountdownExpired);
      tokio::spawn(async move {
        if let Err(e) = playback.pause().await {
          warn!("Failed to pause after countdown: {}", e);
        }
      });
    });

    let events = self.events.clone();
    let playback = self.playback.clone();
    tokio::spawn(async move {
      if let Err(e) = playback.play(&uri).await {
        warn!("Failed to start playback of {}: {}", uri, e);
        let _ = events.send(RoundEvent::PlaybackWarning(e.user_message()));
      }
    });

    Ok(info)
  }

  /// Stops the countdown, pauses playback in the background and returns
  /// the solution for the current track.
  pub fn reveal_solution(&mut self) -> QuizResult<Solution> {
    let (position, track) = match (self.queue.position(), self.queue.current()) {
      (Some(position), Some(track)) => (position, track),
      _ => return Err(QuizError::NoActiveRound),
    };
    let solution = Solution::from_track(track, position, self.queue.len());

    self.countdown.cancel();
    self.spawn_pause();
    self.revealed = true;
    self.emit(RoundEvent::SolutionRevealed(solution.clone()));
    Ok(solution)
  }

  /// Ends the current round. Does nothing when no round is active.
  pub async fn stop(&mut self) {
    if !self.round_active {
      return;
    }
    self.countdown.cancel();
    self.round_active = false;
    if let Err(e) = self.playback.pause().await {
      warn!("Failed to pause playback: {}", e);
    }
    self.emit(RoundEvent::Stopped);
  }

  /// Takes effect with the next round, the current category stays.
  pub fn set_mode(&mut self, mode: Mode) {
    if self.mode != mode {
      info!("mode: {}", mode);
    }
    self.mode = mode;
    self.emit(RoundEvent::ModeChanged(mode));
  }

  fn spawn_pause(&self) {
    let playback = self.playback.clone();
    tokio::spawn(async move {
      if let Err(e) = playback.pause().await {
        warn!("Failed to pause playback: {}", e);
      }
    });
  }
}

/// Parses a round duration the way a form field would: the leading
/// integer counts ("45s" is 45), anything else or a value of 0 or less
/// falls back to `default`.
pub fn parse_round_seconds(input: &str, default: u32) -> u32 {
  let input = input.trim();
  let (negative, digits) = match input.strip_prefix('-') {
    Some(rest) => (true, rest),
    None => (false, input.strip_prefix('+').unwrap_or(input)),
  };
  let digits = digits
    .chars()
    .take_while(|c| c.is_ascii_digit())
    .collect::<String>();
  match digits.parse::<u64>() {
    Ok(n) if !negative && n > 0 => u32::try_from(n).unwrap_or(u32::MAX),
    _ => default,
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use async_trait::async_trait;
  use tokio::sync::mpsc;

  use super::*;
  use crate::{
    playback::PlaybackError,
    types::{Album, Artist, PlaylistSummary, Track},
  };

  #[derive(Debug)]
  struct FakeAuth(Mutex<Option<String>>);

  #[async_trait]
  impl AccessTokenProvider for FakeAuth {
    async fn get_valid_access_token(&self) -> Option<String> {
      self.0.lock().unwrap().clone()
    }
  }

  #[derive(Debug, Default)]
  struct FakeCatalog {
    playlists: Mutex<Vec<(String, Vec<Track>)>>,
  }

  #[async_trait]
  impl CatalogClient for FakeCatalog {
    async fn list_playlist_tracks(&self, playlist_id: &str) -> QuizResult<Vec<Track>> {
      self
        .playlists
        .lock()
        .unwrap()
        .iter()
        .find(|(id, _)| id == playlist_id)
        .map(|(_, tracks)| tracks.clone())
        .ok_or_else(|| QuizError::Network("status 404: not found".to_string()))
    }

    async fn list_user_playlists(&self) -> QuizResult<Vec<PlaylistSummary>> {
      Ok(vec![])
    }
  }

  #[derive(Debug, Clone, PartialEq)]
  enum Call {
    Play(String),
    Pause,
  }

  #[derive(Debug)]
  struct FakePlayback {
    calls: mpsc::UnboundedSender<Call>,
    play_error: Mutex<Option<PlaybackError>>,
  }

  #[async_trait]
  impl PlaybackRemote for FakePlayback {
    async fn play(&self, track_uri: &str) -> Result<(), PlaybackError> {
      let _ = self.calls.send(Call::Play(track_uri.to_string()));
      match self.play_error.lock().unwrap().clone() {
        Some(e) => Err(e),
        None => Ok(()),
      }
    }

    async fn pause(&self) -> Result<(), PlaybackError> {
      let _ = self.calls.send(Call::Pause);
      Err(PlaybackError::Other(500))
    }
  }

  struct Fixture {
    engine: RoundEngine,
    auth: Arc<FakeAuth>,
    catalog: Arc<FakeCatalog>,
    playback: Arc<FakePlayback>,
    calls: mpsc::UnboundedReceiver<Call>,
    ticks: ManualTickSource,
  }

  fn track(i: usize, artists: &[&str]) -> Track {
    Track {
      id: Some(format!("t{}", i)),
      uri: format!("spotify:track:{}", i),
      name: format!("Song {}", i),
      artists: artists
        .iter()
        .map(|a| Artist {
          name: a.to_string(),
        })
        .collect(),
      album: Some(Album {
        name: format!("Album {}", i),
        release_date: Some("1987-03-01".to_string()),
      }),
      is_playable: None,
    }
  }

  fn fixture() -> Fixture {
    let auth = Arc::new(FakeAuth(Mutex::new(Some("token".to_string()))));
    let catalog = Arc::new(FakeCatalog::default());
    let (tx, calls) = mpsc::unbounded_channel();
    let playback = Arc::new(FakePlayback {
      calls: tx,
      play_error: Mutex::new(None),
    });
    let ticks = ManualTickSource::new();
    let engine = RoundEngine::new(auth.clone(), catalog.clone(), playback.clone())
      .with_tick_source(Arc::new(ticks.clone()))
      .with_seed(42);
    Fixture {
      engine,
      auth,
      catalog,
      playback,
      calls,
      ticks,
    }
  }

  impl Fixture {
    fn add_playlist(&self, id: &str, tracks: Vec<Track>) {
      self
        .catalog
        .playlists
        .lock()
        .unwrap()
        .push((id.to_string(), tracks));
    }

    async fn load_three(&mut self) {
      self.add_playlist("three", (0..3).map(|i| track(i, &["A"])).collect());
      assert_eq!(
        self
          .engine
          .load_playlist("https://open.spotify.com/playlist/three?si=1")
          .await
          .unwrap(),
        3
      );
    }
  }

  async fn next_event(
    events: &mut broadcast::Receiver<RoundEvent>,
    wanted: impl Fn(&RoundEvent) -> bool,
  ) -> RoundEvent {
    loop {
      let event = events.recv().await.unwrap();
      if wanted(&event) {
        return event;
      }
    }
  }

  #[tokio::test]
  async fn load_requires_login_and_a_playlist_reference() {
    let mut f = fixture();
    assert!(matches!(
      f.engine.load_playlist("https://x/album/abc").await,
      Err(QuizError::InvalidReference(_))
    ));
    *f.auth.0.lock().unwrap() = None;
    assert!(matches!(
      f.engine.load_playlist("https://x/playlist/abc").await,
      Err(QuizError::NotAuthenticated)
    ));
  }

  #[tokio::test]
  async fn empty_playlist_keeps_the_previous_queue() {
    let mut f = fixture();
    f.load_three().await;
    f.engine.start_round(10).await.unwrap();
    let before = f.engine.state();

    let mut unplayable = track(9, &["A"]);
    unplayable.is_playable = Some(false);
    let mut no_uri = track(10, &["A"]);
    no_uri.uri.clear();
    f.add_playlist("empty", vec![unplayable, no_uri]);

    assert!(matches!(
      f.engine.load_playlist("https://x/playlist/empty").await,
      Err(QuizError::EmptyPlaylist)
    ));
    let after = f.engine.state();
    assert_eq!(after.total, 3);
    assert_eq!(after.position, before.position);
  }

  #[tokio::test]
  async fn catalog_failure_is_reported() {
    let mut f = fixture();
    assert!(matches!(
      f.engine.load_playlist("https://x/playlist/missing").await,
      Err(QuizError::Network(_))
    ));
  }

  #[tokio::test]
  async fn start_round_preconditions() {
    let mut f = fixture();
    assert!(matches!(
      f.engine.start_round(10).await,
      Err(QuizError::EmptyQueue)
    ));
    f.load_three().await;
    *f.auth.0.lock().unwrap() = None;
    assert!(matches!(
      f.engine.start_round(10).await,
      Err(QuizError::NotAuthenticated)
    ));
  }

  #[tokio::test]
  async fn positions_wrap_after_the_last_track() {
    let mut f = fixture();
    f.load_three().await;
    assert_eq!(f.engine.state().position, None);
    assert_eq!(f.engine.state().round_label(), "–");

    let mut positions = vec![];
    let mut uris = vec![];
    for _ in 0..4 {
      let info = f.engine.start_round(10).await.unwrap();
      positions.push(info.position);
      match f.calls.recv().await.unwrap() {
        Call::Play(uri) => uris.push(uri),
        other => panic!("expected play, got {:?}", other),
      }
    }
    assert_eq!(positions, vec![0, 1, 2, 0]);
    let mut first_pass = uris[..3].to_vec();
    first_pass.sort();
    assert_eq!(
      first_pass,
      vec!["spotify:track:0", "spotify:track:1", "spotify:track:2"]
    );
    assert_eq!(f.engine.state().round_label(), "1 / 3");
  }

  #[tokio::test]
  async fn start_round_poses_a_category_and_counts_down() {
    let mut f = fixture();
    f.load_three().await;
    let mut events = f.engine.subscribe();

    let info = f.engine.start_round(0).await.unwrap();
    assert_eq!(info.seconds, DEFAULT_ROUND_SECONDS);
    assert!(Mode::Noob.categories().contains(&info.category));

    let state = f.engine.state();
    assert!(state.round_active);
    assert!(!state.revealed);
    assert_eq!(state.countdown, CountdownState::Running);
    assert_eq!(state.category, Some(info.category));

    assert_eq!(
      events.recv().await.unwrap(),
      RoundEvent::RoundStarted(info.clone())
    );
    assert_eq!(
      events.recv().await.unwrap(),
      RoundEvent::CountdownTick { remaining: 30 }
    );
  }

  #[tokio::test]
  async fn playback_failure_is_only_a_warning() {
    let mut f = fixture();
    f.load_three().await;
    *f.playback.play_error.lock().unwrap() = Some(PlaybackError::NoActiveDevice);
    let mut events = f.engine.subscribe();

    assert!(f.engine.start_round(10).await.is_ok());
    let warning = next_event(&mut events, |e| matches!(e, RoundEvent::PlaybackWarning(_))).await;
    assert_eq!(
      warning,
      RoundEvent::PlaybackWarning(PlaybackError::NoActiveDevice.user_message())
    );
    assert_eq!(f.engine.state().countdown, CountdownState::Running);
    assert!(f.engine.state().round_active);
  }

  #[tokio::test]
  async fn expiry_pauses_without_revealing() {
    let mut f = fixture();
    f.load_three().await;
    let mut events = f.engine.subscribe();
    f.engine.start_round(2).await.unwrap();
    assert!(matches!(f.calls.recv().await, Some(Call::Play(_))));

    f.ticks.advance(2);
    next_event(&mut events, |e| *e == RoundEvent::CountdownExpired).await;
    assert_eq!(f.calls.recv().await, Some(Call::Pause));

    let state = f.engine.state();
    assert_eq!(state.countdown, CountdownState::Expired);
    assert!(!state.revealed);
    assert!(state.round_active);
  }

  #[tokio::test]
  async fn reveal_returns_the_current_track() {
    let mut f = fixture();
    assert!(matches!(
      f.engine.reveal_solution(),
      Err(QuizError::NoActiveRound)
    ));

    f.add_playlist("duo", vec![track(0, &["A", "B"])]);
    f.engine.load_playlist("https://x/playlist/duo").await.unwrap();
    f.engine.start_round(10).await.unwrap();
    assert!(matches!(f.calls.recv().await, Some(Call::Play(_))));

    let solution = f.engine.reveal_solution().unwrap();
    assert_eq!(solution.title, "Song 0");
    assert_eq!(solution.artists, "A, B");
    assert_eq!(solution.album, "Album 0");
    assert_eq!(solution.year, "1987");
    assert_eq!(solution.decade, "1980");
    assert!(solution.has_feature);
    assert_eq!((solution.position, solution.total), (0, 1));

    // pause failures are swallowed
    assert_eq!(f.calls.recv().await, Some(Call::Pause));
    let state = f.engine.state();
    assert!(state.revealed);
    assert_eq!(state.countdown, CountdownState::Cancelled);

    // countdown was cancelled, ticking further does nothing
    let mut events = f.engine.subscribe();
    f.ticks.advance(20);
    for _ in 0..50 {
      tokio::task::yield_now().await;
    }
    assert!(events.try_recv().is_err());
  }

  #[tokio::test]
  async fn next_round_hides_the_solution_again() {
    let mut f = fixture();
    f.load_three().await;
    f.engine.start_round(10).await.unwrap();
    f.engine.reveal_solution().unwrap();
    assert!(f.engine.state().revealed);
    f.engine.start_round(10).await.unwrap();
    assert!(!f.engine.state().revealed);
  }

  #[tokio::test]
  async fn stop_is_idempotent() {
    let mut f = fixture();
    f.load_three().await;
    f.engine.stop().await;
    assert!(f.calls.try_recv().is_err());

    let mut events = f.engine.subscribe();
    f.engine.start_round(10).await.unwrap();
    assert!(matches!(f.calls.recv().await, Some(Call::Play(_))));
    f.engine.stop().await;
    assert_eq!(f.calls.recv().await, Some(Call::Pause));
    next_event(&mut events, |e| *e == RoundEvent::Stopped).await;
    assert_eq!(f.engine.state().countdown, CountdownState::Cancelled);
    assert!(!f.engine.state().round_active);

    f.engine.stop().await;
    assert!(f.calls.try_recv().is_err());
  }

  #[tokio::test]
  async fn mode_change_applies_to_the_next_round() {
    let mut f = fixture();
    f.load_three().await;
    let info = f.engine.start_round(10).await.unwrap();
    f.engine.set_mode(Mode::Pro);
    assert_eq!(f.engine.state().category, Some(info.category));
    assert_eq!(f.engine.mode(), Mode::Pro);

    for _ in 0..20 {
      let info = f.engine.start_round(10).await.unwrap();
      assert!(Mode::Pro.categories().contains(&info.category));
    }
  }

  #[tokio::test]
  async fn loading_a_playlist_mid_round_pauses_the_old_track() {
    let mut f = fixture();
    f.load_three().await;
    f.engine.start_round(5).await.unwrap();
    assert!(matches!(f.calls.recv().await, Some(Call::Play(_))));

    f.add_playlist("other", (0..5).map(|i| track(i, &["A"])).collect());
    f.engine.load_playlist("https://x/playlist/other").await.unwrap();
    assert_eq!(f.calls.recv().await, Some(Call::Pause));

    // the round is gone, later ticks and stop send nothing more
    f.engine.stop().await;
    f.ticks.advance(10);
    for _ in 0..50 {
      tokio::task::yield_now().await;
    }
    assert!(f.calls.try_recv().is_err());
  }

  #[tokio::test]
  async fn loading_a_playlist_without_a_round_does_not_pause() {
    let mut f = fixture();
    f.load_three().await;
    f.add_playlist("other", (0..5).map(|i| track(i, &["A"])).collect());
    f.engine.load_playlist("https://x/playlist/other").await.unwrap();
    for _ in 0..50 {
      tokio::task::yield_now().await;
    }
    assert!(f.calls.try_recv().is_err());
  }

  #[tokio::test]
  async fn loading_a_playlist_resets_the_round() {
    let mut f = fixture();
    f.load_three().await;
    f.engine.start_round(10).await.unwrap();
    f.engine.reveal_solution().unwrap();

    f.add_playlist("other", (0..5).map(|i| track(i, &["A"])).collect());
    f.engine.load_playlist("https://x/playlist/other").await.unwrap();
    let state = f.engine.state();
    assert_eq!(state.total, 5);
    assert_eq!(state.position, None);
    assert_eq!(state.category, None);
    assert!(!state.revealed);
    assert!(!state.round_active);
  }

  #[test]
  fn round_seconds_parsing() {
    assert_eq!(parse_round_seconds("45", 30), 45);
    assert_eq!(parse_round_seconds(" 45s ", 30), 45);
    assert_eq!(parse_round_seconds("+20", 30), 20);
    assert_eq!(parse_round_seconds("0", 30), 30);
    assert_eq!(parse_round_seconds("-5", 30), 30);
    assert_eq!(parse_round_seconds("abc", 30), 30);
    assert_eq!(parse_round_seconds("", 30), 30);
  }
}
