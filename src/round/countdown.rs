use std::{
  fmt::Debug,
  sync::{Arc, Mutex, MutexGuard, PoisonError},
  time::Duration,
};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One tick per call, the countdown never looks at the wall clock itself.
#[async_trait]
pub trait Ticker: Send {
  async fn tick(&mut self);
}

/// Hands out a fresh [`Ticker`] for every countdown run.
pub trait TickSource: Send + Sync + Debug {
  fn ticker(&self) -> Box<dyn Ticker>;
}

#[derive(Debug, Clone)]
pub struct IntervalTickSource {
  pub period: Duration,
}

impl Default for IntervalTickSource {
  fn default() -> Self {
    IntervalTickSource {
      period: Duration::from_secs(1),
    }
  }
}

struct IntervalTicker(tokio::time::Interval);

#[async_trait]
impl Ticker for IntervalTicker {
  async fn tick(&mut self) {
    self.0.tick().await;
  }
}

impl TickSource for IntervalTickSource {
  fn ticker(&self) -> Box<dyn Ticker> {
    // First tick one period from now, not immediately.
    let mut interval =
      tokio::time::interval_at(tokio::time::Instant::now() + self.period, self.period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    Box::new(IntervalTicker(interval))
  }
}

/// Ticks on demand, for driving countdowns without real time passing.
#[derive(Debug, Clone)]
pub struct ManualTickSource {
  tx: mpsc::UnboundedSender<()>,
  rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<()>>>,
}

impl ManualTickSource {
  pub fn new() -> ManualTickSource {
    let (tx, rx) = mpsc::unbounded_channel();
    ManualTickSource {
      tx,
      rx: Arc::new(tokio::sync::Mutex::new(rx)),
    }
  }

  pub fn advance(&self, ticks: u32) {
    for _ in 0..ticks {
      let _ = self.tx.send(());
    }
  }
}

impl Default for ManualTickSource {
  fn default() -> Self {
    Self::new()
  }
}

struct ManualTicker(Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<()>>>);

#[async_trait]
impl Ticker for ManualTicker {
  async fn tick(&mut self) {
    let mut rx = self.0.lock().await;
    if rx.recv().await.is_none() {
      // sender gone, no more ticks ever
      std::future::pending::<()>().await;
    }
  }
}

impl TickSource for ManualTickSource {
  fn ticker(&self) -> Box<dyn Ticker> {
    Box::new(ManualTicker(self.rx.clone()))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownState {
  Idle,
  Running,
  Expired,
  Cancelled,
}

#[derive(Debug)]
struct Shared {
  state: CountdownState,
  remaining: u32,
  // Bumped by every start, a tick task only acts for its own run.
  generation: u64,
}

pub type TickObserver = Arc<dyn Fn(u32) + Send + Sync>;

/// Single-shot, cancelable countdown ticking once per [`Ticker`] tick.
///
/// Observers see every value from the start value down to 0. The expiry
/// callback runs at most once per [`Countdown::start`] and never after a
/// [`Countdown::cancel`].
pub struct Countdown {
  source: Arc<dyn TickSource>,
  on_tick: TickObserver,
  shared: Arc<Mutex<Shared>>,
  cancel: Option<CancellationToken>,
}

impl Debug for Countdown {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Countdown")
      .field("source", &self.source)
      .field("shared", &self.shared)
      .finish()
  }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
  shared.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Countdown {
  pub fn new(source: Arc<dyn TickSource>, on_tick: TickObserver) -> Countdown {
    Countdown {
      source,
      on_tick,
      shared: Arc::new(Mutex::new(Shared {
        state: CountdownState::Idle,
        remaining: 0,
        generation: 0,
      })),
      cancel: None,
    }
  }

  pub fn state(&self) -> CountdownState {
    lock(&self.shared).state
  }

  pub fn remaining(&self) -> u32 {
    lock(&self.shared).remaining
  }

  /// Replaces any run in progress. Zero seconds only shows 0 and ends in
  /// `Expired` without calling `on_expire`.
  ///
  /// Must be called from within a tokio runtime.
  pub fn start<F>(&mut self, seconds: u32, on_expire: F)
  where
    F: FnOnce() + Send + 'static,
  {
    self.cancel();

    let generation = {
      let mut shared = lock(&self.shared);
      shared.generation += 1;
      shared.remaining = seconds;
      shared.state = match seconds {
        0 => CountdownState::Expired,
        _ => CountdownState::Running,
      };
      (self.on_tick)(seconds);
      shared.generation
    };
    if seconds == 0 {
      return;
    }

    let token = CancellationToken::new();
    self.cancel = Some(token.clone());
    let shared = self.shared.clone();
    let on_tick = self.on_tick.clone();
    let mut ticker = self.source.ticker();

    tokio::spawn(async move {
      loop {
        tokio::select! {
          biased;
          _ = token.cancelled() => return,
          _ = ticker.tick() => (),
        }

        let expired = {
          let mut shared = lock(&shared);
          if shared.generation != generation || shared.state != CountdownState::Running {
            return;
          }
          shared.remaining = shared.remaining.saturating_sub(1);
          if shared.remaining == 0 {
            shared.state = CountdownState::Expired;
          }
          on_tick(shared.remaining);
          shared.remaining == 0
        };

        if expired {
          on_expire();
          return;
        }
      }
    });
  }

  /// Stops a running countdown without firing the expiry callback.
  /// No-op unless running.
  pub fn cancel(&mut self) {
    if let Some(token) = self.cancel.take() {
      token.cancel();
    }
    let mut shared = lock(&self.shared);
    if shared.state == CountdownState::Running {
      shared.state = CountdownState::Cancelled;
    }
  }
}

impl Drop for Countdown {
  fn drop(&mut self) {
    if let Some(token) = self.cancel.take() {
      token.cancel();
    }
  }
}

/// Zero-padded two digit display value.
pub fn format_remaining(remaining: u32) -> String {
  format!("{:02}", remaining)
}

/// The last five seconds are shown as critical.
pub fn is_critical(remaining: u32) -> bool {
  (1..=5).contains(&remaining)
}
