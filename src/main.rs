use std::time::Duration;

use clap::Parser;
use log::{info, warn};
use music_quiz::{
  auth::callback::RedirectListener,
  console::{self, Command},
  round::{RoundEngine, RoundEvent},
  AppOpts, AppService, AppServiceImpl,
};
use tokio::{
  io::{AsyncBufReadExt, BufReader, Lines, Stdin},
  sync::broadcast::error::RecvError,
};

const LOGIN_TIMEOUT: Duration = Duration::from_secs(300);

type Input = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() {
  match dotenvy::dotenv() {
    Err(e) => warn!("dotenv(): failed to load .env file: {}", e),
    _ => {}
  }

  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
    .filter(Some("warp::server"), log::LevelFilter::Off)
    .init();

  let opts = AppOpts::parse();

  info!(
    "MusicQuiz: starting, version {}",
    music_quiz::my_git_hash()
  );

  let app = AppServiceImpl::new(opts.clone())
    .await
    .expect("Failed to initialize app service");
  if !app.auth.is_logged_in().await {
    println!("Not logged in yet, type `login` to start.");
  }
  println!("Mode: {}. Type `help` for commands.", opts.mode.label());

  let mut engine = app.round_engine();
  let mut events = engine.subscribe();
  let mut input = BufReader::new(tokio::io::stdin()).lines();

  loop {
    tokio::select! {
        line = input.next_line() => {
            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to read input: {}", e);
                    break;
                }
            };
            match Command::parse(&line, engine.default_seconds()) {
                Ok(Command::Quit) => break,
                Ok(command) => {
                    if let Err(e) = run_command(&app, &mut engine, &mut input, command).await {
                        println!("Error: {}", e);
                    }
                }
                Err(e) => println!("{}", e),
            }
        },
        event = events.recv() => {
            match event {
                Ok(event) => {
                    if let Some(line) = console::render_event(&event) {
                        println!("{}", line);
                    }
                }
                Err(RecvError::Lagged(n)) => warn!("Skipped {} round events", n),
                Err(RecvError::Closed) => break,
            }
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C, shutting down...");
            break;
        }
    }
  }

  engine.stop().await;
  info!("Goodbye!");
}

async fn run_command(
  app: &AppService,
  engine: &mut RoundEngine,
  input: &mut Input,
  command: Command,
) -> music_quiz::Result<()> {
  match command {
    Command::Empty | Command::Quit => {}
    Command::Help => println!("{}", console::HELP),
    Command::Setup => println!("{}", console::setup_instructions()),
    Command::Login => {
      login(app, input).await?;
      app.directory.invalidate().await;
      let user = app.api.current_user().await?;
      println!("Logged in as {}.", user.display());
    }
    Command::Logout => {
      engine.stop().await;
      app.auth.logout().await?;
      app.directory.invalidate().await;
      println!("Logged out.");
    }
    Command::WhoAmI => match app.auth.is_logged_in().await {
      true => println!("{}", app.api.current_user().await?.display()),
      false => println!("Not logged in."),
    },
    Command::Playlists(filter) => {
      let suggestions = app.directory.suggestions(&filter).await;
      println!("{}", console::render_suggestions(&suggestions));
    }
    // progress and results arrive as events
    Command::Load(reference) => {
      engine.load_playlist(&reference).await?;
    }
    Command::Mode(None) => println!("Mode: {}", engine.mode().label()),
    Command::Mode(Some(mode)) => engine.set_mode(mode),
    Command::Start(seconds) => {
      engine.start_round(seconds.unwrap_or(0)).await?;
    }
    Command::Reveal => {
      engine.reveal_solution()?;
    }
    Command::Stop => engine.stop().await,
    Command::Status => println!("{}", console::render_status(&engine.state())),
  }
  Ok(())
}

async fn login(app: &AppService, input: &mut Input) -> music_quiz::Result<()> {
  let url = app.auth.begin_login().await?;
  println!("Open this URL in your browser to log in:\n{}", url);

  let listener = match app.opts.no_callback_listener {
    true => None,
    false => match RedirectListener::bind(&app.auth.config().redirect_uri).await {
      Ok(listener) => Some(listener),
      Err(e) => {
        warn!("Cannot listen for the login redirect: {}", e);
        None
      }
    },
  };

  let redirect_url = match listener {
    Some(listener) => {
      tokio::time::timeout(LOGIN_TIMEOUT, listener.wait())
        .await
        .map_err(|_| anyhow::anyhow!("timed out waiting for the login redirect"))??
    }
    None => {
      println!("Paste the URL you were redirected to:");
      input
        .next_line()
        .await?
        .ok_or_else(|| anyhow::anyhow!("input closed during login"))?
    }
  };

  app.auth.complete_login(redirect_url.trim()).await?;
  Ok(())
}
