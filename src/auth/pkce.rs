use rand::Rng;
use sha2::{Digest, Sha256};

use crate::Result;

const VERIFIER_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

pub const VERIFIER_LENGTH: usize = 64;

pub fn generate_code_verifier(length: usize) -> String {
  let mut rng = rand::thread_rng();
  (0..length)
    .map(|_| VERIFIER_CHARSET[rng.gen_range(0..VERIFIER_CHARSET.len())] as char)
    .collect()
}

/// S256 challenge: unpadded base64url of the SHA-256 digest.
pub fn code_challenge(verifier: &str) -> String {
  base64_url::encode(&Sha256::digest(verifier.as_bytes()))
}

pub fn authorize_url(
  accounts_base: &str,
  client_id: &str,
  scopes: &str,
  redirect_uri: &str,
  challenge: &str,
) -> Result<String> {
  let url = reqwest::Url::parse_with_params(
    &format!("{}/authorize", accounts_base.trim_end_matches('/')),
    &[
      ("response_type", "code"),
      ("client_id", client_id),
      ("scope", scopes),
      ("redirect_uri", redirect_uri),
      ("code_challenge_method", "S256"),
      ("code_challenge", challenge),
    ],
  )?;
  Ok(url.to_string())
}
