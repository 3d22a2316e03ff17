use std::{path::PathBuf, sync::Arc};

use log::{debug, warn};
use serde_derive::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::Result;

/// Everything that survives a restart: the bearer token, its absolute
/// expiry in unix milliseconds, and the verifier of a login in progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredAuth {
  #[serde(default)]
  pub access_token: Option<String>,
  #[serde(default)]
  pub expires_at: Option<i64>,
  #[serde(default)]
  pub code_verifier: Option<String>,
}

#[derive(Debug, Clone)]
pub enum TokenStore {
  File(PathBuf),
  Memory(Arc<Mutex<StoredAuth>>),
}

impl TokenStore {
  pub fn file(path: impl Into<PathBuf>) -> Self {
    TokenStore::File(path.into())
  }

  pub fn in_memory() -> Self {
    TokenStore::Memory(Default::default())
  }

  /// A missing or unreadable file counts as "nothing stored".
  pub async fn load(&self) -> StoredAuth {
    match self {
      TokenStore::Memory(m) => m.lock().await.clone(),
      TokenStore::File(path) => {
        let raw = match tokio::fs::read_to_string(path).await {
          Ok(raw) => raw,
          Err(e) => {
            debug!("no stored auth at {:?}: {}", path, e);
            return StoredAuth::default();
          }
        };
        match serde_json::from_str(&raw) {
          Ok(auth) => auth,
          Err(e) => {
            warn!("Failed to parse stored auth {:?}: {:?}", path, e);
            StoredAuth::default()
          }
        }
      }
    }
  }

  pub async fn save(&self, auth: &StoredAuth) -> Result<()> {
    match self {
      TokenStore::Memory(m) => *m.lock().await = auth.clone(),
      TokenStore::File(path) => {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
          tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, serde_json::to_vec_pretty(auth)?).await?;
      }
    }
    Ok(())
  }

  pub async fn clear(&self) -> Result<()> {
    match self {
      TokenStore::Memory(m) => *m.lock().await = StoredAuth::default(),
      TokenStore::File(path) => match tokio::fs::remove_file(path).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
      },
    }
    Ok(())
  }
}
