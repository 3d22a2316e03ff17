use std::{
  net::SocketAddr,
  sync::{Arc, Mutex},
};

use anyhow::anyhow;
use log::{debug, info};
use tokio::sync::oneshot;
use warp::{http::StatusCode, path::FullPath, Filter};

use crate::Result;

/// One-shot HTTP listener for the OAuth redirect. It answers the first
/// request on the redirect path and hands its full URL back.
#[derive(Debug)]
pub struct RedirectListener {
  pub addr: SocketAddr,
  received: oneshot::Receiver<String>,
  shutdown: oneshot::Sender<()>,
}

impl RedirectListener {
  /// Listens on the host and port of the configured redirect URI.
  pub async fn bind(redirect_uri: &str) -> Result<RedirectListener> {
    let url = reqwest::Url::parse(redirect_uri)?;
    let host = url
      .host_str()
      .ok_or_else(|| anyhow!("redirect URI {} has no host", redirect_uri))?;
    let port = url
      .port_or_known_default()
      .ok_or_else(|| anyhow!("redirect URI {} has no port", redirect_uri))?;
    let socket = tokio::net::lookup_host((host, port))
      .await?
      .next()
      .ok_or_else(|| anyhow!("cannot resolve {}:{}", host, port))?;
    Self::bind_on(socket, url)
  }

  pub fn bind_on(socket: SocketAddr, redirect_uri: reqwest::Url) -> Result<RedirectListener> {
    let (tx, received) = oneshot::channel::<String>();
    let (shutdown, shutdown_rx) = oneshot::channel::<()>();
    let tx = Arc::new(Mutex::new(Some(tx)));

    let mut base = redirect_uri.clone();
    base.set_query(None);
    let expected_path = base.path().to_string();

    let route = warp::get()
      .and(warp::path::full())
      .and(
        warp::query::raw()
          .or(warp::any().map(String::new))
          .unify(),
      )
      .map(move |full: FullPath, query: String| {
        if full.as_str() != expected_path {
          debug!("ignoring request to {}", full.as_str());
          return warp::reply::with_status(
            warp::reply::html("Not found".to_string()),
            StatusCode::NOT_FOUND,
          );
        }
        let sender = tx.lock().ok().and_then(|mut tx| tx.take());
        if let Some(sender) = sender {
          let mut url = base.clone();
          url.set_query(Some(query.as_str()).filter(|q| !q.is_empty()));
          let _ = sender.send(url.to_string());
        }
        warp::reply::with_status(
          warp::reply::html("Login received, you can close this tab.".to_string()),
          StatusCode::OK,
        )
      });

    let (addr, server) = warp::serve(route).try_bind_with_graceful_shutdown(socket, async {
      shutdown_rx.await.ok();
    })?;
    tokio::spawn(server);
    info!("waiting for the login redirect on http://{}", addr);

    Ok(RedirectListener {
      addr,
      received,
      shutdown,
    })
  }

  /// Resolves with the redirect URL, then stops the listener.
  pub async fn wait(self) -> Result<String> {
    let url = self
      .received
      .await
      .map_err(|_| anyhow!("redirect listener closed"))?;
    let _ = self.shutdown.send(());
    Ok(url)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn captures_the_redirect_query() {
    let listener = RedirectListener::bind_on(
      "127.0.0.1:0".parse().unwrap(),
      reqwest::Url::parse("http://127.0.0.1:8888/callback").unwrap(),
    )
    .unwrap();
    let addr = listener.addr;

    let client = reqwest::Client::new();
    let miss = client
      .get(format!("http://{}/favicon.ico", addr))
      .send()
      .await
      .unwrap();
    assert_eq!(miss.status().as_u16(), 404);

    let hit = client
      .get(format!("http://{}/callback?code=abc&state=xyz", addr))
      .send()
      .await
      .unwrap();
    assert!(hit.status().is_success());

    let url = listener.wait().await.unwrap();
    assert_eq!(url, "http://127.0.0.1:8888/callback?code=abc&state=xyz");
  }
}
