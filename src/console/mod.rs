//! Line-oriented terminal front end: command parsing and rendering of
//! engine events.

use itertools::Itertools;

use crate::{
  catalog::directory::Suggestions,
  playback::PlaybackError,
  round::{
    countdown::{format_remaining, is_critical},
    parse_round_seconds, CountdownState, Mode, RoundEvent, RoundInfo, RoundState, Solution,
  },
  types::PlaylistSummary,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
  Login,
  Logout,
  WhoAmI,
  Playlists(String),
  Load(String),
  /// `None` shows the current mode
  Mode(Option<Mode>),
  /// `None` uses the configured round length
  Start(Option<u32>),
  Reveal,
  Stop,
  Status,
  Help,
  Setup,
  Quit,
  Empty,
}

impl Command {
  /// Parses one input line. `default_seconds` applies when the duration
  /// argument is not a positive integer.
  pub fn parse(line: &str, default_seconds: u32) -> crate::Result<Command> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
      Some((word, rest)) => (word, rest.trim()),
      None => (line, ""),
    };
    let command = match word.to_ascii_lowercase().as_str() {
      "" => Command::Empty,
      "login" => Command::Login,
      "logout" => Command::Logout,
      "whoami" => Command::WhoAmI,
      "playlists" | "ls" => Command::Playlists(rest.to_string()),
      "load" => match rest {
        "" => anyhow::bail!("usage: load <playlist url>"),
        url => Command::Load(url.to_string()),
      },
      "mode" => match rest {
        "" => Command::Mode(None),
        m => Command::Mode(Some(m.parse()?)),
      },
      "start" | "next" => match rest {
        "" => Command::Start(None),
        s => Command::Start(Some(parse_round_seconds(s, default_seconds))),
      },
      "reveal" => Command::Reveal,
      "stop" => Command::Stop,
      "status" => Command::Status,
      "help" | "?" => Command::Help,
      "setup" => Command::Setup,
      "quit" | "exit" => Command::Quit,
      other => anyhow::bail!("unknown command {:?}, try `help`", other),
    };
    Ok(command)
  }
}

pub const HELP: &str = "\
commands:
  login               sign in with your Spotify account
  logout              forget the stored login
  whoami              show the signed in user
  playlists [filter]  list your playlists, optionally filtered by name or owner
  load <url>          load a playlist by its share link
  mode [noob|pro]     show or change the difficulty
  start [seconds]     play the next track and start the countdown
  reveal              show the solution for the current track
  stop                stop the round and pause playback
  status              show round, mode and time left
  setup               how to get a playback device ready
  quit                leave";

pub fn setup_instructions() -> String {
  PlaybackError::NoActiveDevice.user_message()
}

pub fn render_round(info: &RoundInfo) -> String {
  format!(
    "Round {} / {}: {} ({}s)",
    info.position + 1,
    info.total,
    info.category.label(),
    info.seconds
  )
}

pub fn render_status(state: &RoundState) -> String {
  let mut line = format!("Round {} | Mode: {}", state.round_label(), state.mode.label());
  if let Some(category) = state.category {
    line.push_str(&format!(" | {}", category.label()));
  }
  if state.countdown == CountdownState::Running {
    line.push_str(&format!(" | {}s left", format_remaining(state.remaining)));
  }
  line
}

pub fn render_solution(solution: &Solution) -> String {
  let mut lines = vec![
    format!("Title:   {}", solution.title),
    format!("Artists: {}", solution.artists),
    format!("Album:   {}", solution.album),
    match solution.decade.parse::<u32>() {
      Ok(_) => format!("Year:    {} ({}s)", solution.year, solution.decade),
      Err(_) => format!("Year:    {}", solution.year),
    },
  ];
  lines.push(match solution.has_feature {
    true => "Feature: yes".to_string(),
    false => "Feature: no".to_string(),
  });
  lines.join("\n")
}

pub fn render_playlist(playlist: &PlaylistSummary) -> String {
  match playlist.track_count {
    Some(n) => format!(
      "{} by {} ({} tracks)\n    {}",
      playlist.name, playlist.owner, n, playlist.canonical_url
    ),
    None => format!(
      "{} by {}\n    {}",
      playlist.name, playlist.owner, playlist.canonical_url
    ),
  }
}

pub fn render_suggestions(suggestions: &Suggestions) -> String {
  match suggestions {
    Suggestions::LoginRequired => "Log in to see your playlists.".to_string(),
    Suggestions::Unavailable => "Could not load your playlists.".to_string(),
    Suggestions::NoPlaylists => "You have no playlists yet.".to_string(),
    Suggestions::NoMatches => "No matching playlists.".to_string(),
    Suggestions::Matches(playlists) => playlists.iter().map(render_playlist).join("\n"),
  }
}

/// `None` for events that do not need their own line.
pub fn render_event(event: &RoundEvent) -> Option<String> {
  let line = match event {
    RoundEvent::PlaylistLoaded { count } => format!("Loaded {} playable tracks.", count),
    RoundEvent::RoundStarted(info) => render_round(info),
    RoundEvent::CountdownTick { remaining } if is_critical(*remaining) => {
      format!("  {} !", format_remaining(*remaining))
    }
    RoundEvent::CountdownTick { remaining } if remaining % 10 == 0 && *remaining > 0 => {
      format!("  {}", format_remaining(*remaining))
    }
    RoundEvent::CountdownTick { .. } => return None,
    RoundEvent::CountdownExpired => "Time's up! Type `reveal` for the solution.".to_string(),
    RoundEvent::SolutionRevealed(solution) => render_solution(solution),
    RoundEvent::PlaybackWarning(message) => format!("Playback problem:\n{}", message),
    RoundEvent::Stopped => "Round stopped.".to_string(),
    RoundEvent::ModeChanged(mode) => format!("Mode: {}", mode.label()),
  };
  Some(line)
}
