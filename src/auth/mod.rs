use std::{fmt::Debug, sync::Arc, time::Duration};

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use log::{debug, info, warn};
#[cfg(test)]
use mock_instant::Instant;
use serde_derive::Deserialize;
#[cfg(not(test))]
use std::time::Instant;
use tokio::sync::RwLock;

use crate::{
  auth::store::{StoredAuth, TokenStore},
  Result,
};

pub mod callback;
pub mod pkce;
pub mod store;

pub const SCOPES: &[&str] = &[
  "streaming",
  "user-read-email",
  "user-read-private",
  "user-read-playback-state",
  "user-modify-playback-state",
  "playlist-read-private",
  "playlist-read-collaborative",
];

/// Lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

/// Source of the bearer credential for every remote call.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync + Debug {
  /// The current token, or `None` when logged out or expired.
  async fn get_valid_access_token(&self) -> Option<String>;
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
  pub client_id: String,
  pub redirect_uri: String,
  pub accounts_base: String,
  pub scopes: String,
}

impl AuthConfig {
  pub fn new(client_id: String, redirect_uri: String, accounts_base: String) -> Self {
    AuthConfig {
      client_id,
      redirect_uri,
      accounts_base: accounts_base.trim_end_matches('/').to_string(),
      scopes: SCOPES.join(" "),
    }
  }
}

#[derive(Debug, Clone)]
struct Token {
  value: String,
  expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
  access_token: String,
  #[serde(default)]
  expires_in: Option<u64>,
}

/// At most one live token. There is no refresh flow: once the token
/// expires the user has to log in again.
#[derive(Debug)]
pub struct AuthSessionImpl {
  config: AuthConfig,
  store: TokenStore,
  http: reqwest::Client,
  token: RwLock<Option<Token>>,
}

pub type AuthSession = Arc<AuthSessionImpl>;

impl AuthSessionImpl {
  pub fn new(config: AuthConfig, store: TokenStore, http: reqwest::Client) -> AuthSession {
    Arc::new(AuthSessionImpl {
      config,
      store,
      http,
      token: Default::default(),
    })
  }
}

impl AuthSessionImpl {
  pub fn config(&self) -> &AuthConfig {
    &self.config
  }

  /// Picks up a token persisted by an earlier run. Expired tokens are
  /// removed from the store.
  pub async fn restore(&self) -> Result<bool> {
    let stored = self.store.load().await;
    let (access_token, expires_at) = match (stored.access_token.clone(), stored.expires_at) {
      (Some(token), Some(expires_at)) if !token.is_empty() && expires_at > 0 => {
        (token, expires_at)
      }
      _ => return Ok(false),
    };

    let remaining_ms = expires_at - chrono::Utc::now().timestamp_millis();
    if remaining_ms <= 0 {
      info!("stored token expired, dropping it");
      self
        .store
        .save(&StoredAuth {
          access_token: None,
          expires_at: None,
          ..stored
        })
        .await?;
      return Ok(false);
    }

    *self.token.write().await = Some(Token {
      value: access_token,
      expires_at: Instant::now() + Duration::from_millis(remaining_ms as u64),
    });
    debug!("restored token, {}s left", remaining_ms / 1000);
    Ok(true)
  }

  /// Starts a fresh login: drops any existing credential, remembers a new
  /// verifier and returns the URL the user has to open.
  pub async fn begin_login(&self) -> Result<String> {
    self.logout().await?;

    let verifier = pkce::generate_code_verifier(pkce::VERIFIER_LENGTH);
    let challenge = pkce::code_challenge(&verifier);
    self
      .store
      .save(&StoredAuth {
        code_verifier: Some(verifier),
        ..Default::default()
      })
      .await?;

    let url = pkce::authorize_url(
      &self.config.accounts_base,
      &self.config.client_id,
      &self.config.scopes,
      &self.config.redirect_uri,
      &challenge,
    )?;
    info!("authorize URL: {}", url);
    Ok(url)
  }

  /// Exchanges the `code` carried by the redirect URL for a token.
  pub async fn complete_login(&self, redirect_url: &str) -> Result<()> {
    let url = reqwest::Url::parse(redirect_url.trim())?;
    let param = |name: &str| {
      url
        .query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
    };

    if let Some(error) = param("error") {
      bail!("login aborted: {}", error);
    }
    let code = param("code").ok_or_else(|| anyhow!("redirect URL carries no code"))?;

    let stored = self.store.load().await;
    let verifier = stored
      .code_verifier
      .clone()
      .ok_or_else(|| anyhow!("no code verifier found, start the login again"))?;

    let response = self
      .http
      .post(format!("{}/api/token", self.config.accounts_base))
      .form(&[
        ("grant_type", "authorization_code"),
        ("code", code.as_str()),
        ("redirect_uri", self.config.redirect_uri.as_str()),
        ("client_id", self.config.client_id.as_str()),
        ("code_verifier", verifier.as_str()),
      ])
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      warn!("token request failed: {} {}", status, body);
      bail!("token request failed with status {}", status.as_u16());
    }

    let token: TokenResponse = response.json().await?;
    self.save_token(token.access_token, token.expires_in).await
  }

  pub async fn save_token(&self, access_token: String, expires_in: Option<u64>) -> Result<()> {
    let lifetime = Duration::from_secs(expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS));
    let expires_at = chrono::Utc::now().timestamp_millis() + lifetime.as_millis() as i64;

    self
      .store
      .save(&StoredAuth {
        access_token: Some(access_token.clone()),
        expires_at: Some(expires_at),
        code_verifier: None,
      })
      .await?;
    *self.token.write().await = Some(Token {
      value: access_token,
      expires_at: Instant::now() + lifetime,
    });
    info!("logged in, token valid for {}s", lifetime.as_secs());
    Ok(())
  }

  pub async fn logout(&self) -> Result<()> {
    *self.token.write().await = None;
    self.store.clear().await
  }

  pub async fn is_logged_in(&self) -> bool {
    self.get_valid_access_token().await.is_some()
  }
}

#[async_trait]
impl AccessTokenProvider for AuthSessionImpl {
  async fn get_valid_access_token(&self) -> Option<String> {
    {
      let token = self.token.read().await;
      match token.as_ref() {
        None => return None,
        Some(t) if Instant::now() < t.expires_at => return Some(t.value.clone()),
        Some(_) => (),
      }
    }

    info!("token expired, login required");
    *self.token.write().await = None;
    if let Err(e) = self.store.clear().await {
      warn!("Failed to clear expired token: {:?}", e);
    }
    None
  }
}
