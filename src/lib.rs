use std::sync::Arc;

use clap::Parser;

use crate::{
  api::{ApiClient, ApiClientImpl},
  auth::{store::TokenStore, AccessTokenProvider, AuthConfig, AuthSession, AuthSessionImpl},
  catalog::directory::{PlaylistDirectory, PlaylistDirectoryImpl},
  round::{Mode, RoundEngine},
};

pub mod api;
pub mod auth;
pub mod catalog;
pub mod console;
pub mod errors;
pub mod playback;
pub mod round;
pub mod types;

pub type Result<T> = anyhow::Result<T>;

#[derive(Debug, Parser, Clone)]
#[clap(version, about = "Music trivia rounds on your Spotify playback device")]
pub struct AppOpts {
  /// OAuth client id of the registered application
  #[clap(long, env)]
  pub client_id: String,
  #[clap(long, env, default_value = "http://127.0.0.1:8888/callback")]
  pub redirect_uri: String,
  #[clap(long, env, default_value = "https://api.spotify.com/v1")]
  pub api_base: String,
  #[clap(long, env, default_value = "https://accounts.spotify.com")]
  pub accounts_base: String,
  #[clap(long, env, default_value = "./.music-quiz-auth.json")]
  pub token_file: String,

  #[clap(long, env, default_value = "30")]
  pub round_seconds: u32,
  #[clap(long, env, value_enum, default_value = "noob")]
  pub mode: Mode,

  /// Paste the redirect URL by hand instead of listening for it
  #[clap(long, env, default_value = "false")]
  pub no_callback_listener: bool,
}

#[derive(Debug)]
pub struct AppServiceImpl {
  pub opts: AppOpts,
  pub auth: AuthSession,
  pub api: ApiClient,
  pub directory: PlaylistDirectory,
}

pub type AppService = Arc<AppServiceImpl>;

impl AppServiceImpl {
  pub async fn new(opts: AppOpts) -> Result<AppService> {
    let auth = AuthSessionImpl::new(
      AuthConfig::new(
        opts.client_id.clone(),
        opts.redirect_uri.clone(),
        opts.accounts_base.clone(),
      ),
      TokenStore::file(&opts.token_file),
      api::shared_client(),
    );
    auth.restore().await?;

    let provider: Arc<dyn AccessTokenProvider> = auth.clone();
    let api = ApiClientImpl::new(opts.api_base.clone(), provider.clone());
    let directory = PlaylistDirectoryImpl::new(api.clone(), provider);
    Ok(Arc::new(AppServiceImpl {
      opts,
      auth,
      api,
      directory,
    }))
  }

  pub fn round_engine(&self) -> RoundEngine {
    RoundEngine::new(self.auth.clone(), self.api.clone(), self.api.clone())
      .with_mode(self.opts.mode)
      .with_default_seconds(self.opts.round_seconds)
  }
}

pub fn my_git_hash() -> String {
  option_env!("VERGEN_GIT_SHA")
    .map(|x| x[..8].to_string())
    .unwrap_or_else(|| "0".to_string())
}
