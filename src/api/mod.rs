use std::{sync::Arc, time::Duration};

use once_cell::sync::OnceCell;

use crate::auth::AccessTokenProvider;

pub static CLIENT: OnceCell<reqwest::Client> = OnceCell::new();

/// Thin handle on the remote catalog/playback API: base URL, a shared
/// HTTP client, and where to get the bearer credential from.
#[derive(Debug)]
pub struct ApiClientImpl {
  pub base_url: String,
  pub(crate) http: reqwest::Client,
  pub(crate) auth: Arc<dyn AccessTokenProvider>,
}

pub type ApiClient = Arc<ApiClientImpl>;

impl ApiClientImpl {
  pub fn new(base_url: String, auth: Arc<dyn AccessTokenProvider>) -> ApiClient {
    Self::with_http(base_url, auth, shared_client())
  }

  pub fn with_http(
    base_url: String,
    auth: Arc<dyn AccessTokenProvider>,
    http: reqwest::Client,
  ) -> ApiClient {
    Arc::new(ApiClientImpl {
      base_url: base_url.trim_end_matches('/').to_string(),
      http,
      auth,
    })
  }
}

impl ApiClientImpl {
  pub fn url(&self, path: &str) -> String {
    format!("{}/{}", self.base_url, path.trim_start_matches('/'))
  }

  pub async fn token(&self) -> Option<String> {
    self.auth.get_valid_access_token().await
  }
}

pub fn shared_client() -> reqwest::Client {
  CLIENT.get_or_init(default_reqwest_client).clone()
}

fn default_reqwest_client() -> reqwest::Client {
  reqwest::Client::builder()
    .timeout(Duration::from_secs(30))
    .connect_timeout(Duration::from_secs(10))
    .user_agent(format!(
      "MusicQuiz/{}.{}",
      env!("CARGO_PKG_VERSION"),
      crate::my_git_hash()
    ))
    .build()
    // Without an HTTP client nothing works, there is no sensible fallback.
    .expect("Default reqwest client couldn't build")
}
