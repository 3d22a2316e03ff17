use crate::{
  errors::{QuizError, QuizResult},
  types::PlaylistId,
};

/// Extracts `<id>` from anything containing `/playlist/<id>`, with an
/// optional `?query` after it. The id is taken verbatim.
pub fn parse_reference(raw: &str) -> QuizResult<PlaylistId> {
  let invalid = || QuizError::InvalidReference(raw.to_string());
  let rest = raw.trim().split("/playlist/").nth(1).ok_or_else(invalid)?;
  match rest.split('?').next() {
    Some(id) if !id.is_empty() => Ok(id.to_string()),
    _ => Err(invalid()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn extracts_id_before_query() {
    assert_eq!(
      parse_reference("https://x/playlist/abc123?si=xyz").unwrap(),
      "abc123"
    );
    assert_eq!(
      parse_reference("  https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M ").unwrap(),
      "37i9dQZF1DXcBWIGoYBM5M"
    );
  }

  #[test]
  fn rejects_other_references() {
    assert!(matches!(
      parse_reference("https://x/album/abc123"),
      Err(QuizError::InvalidReference(_))
    ));
    assert!(matches!(
      parse_reference("https://x/playlist/?si=xyz"),
      Err(QuizError::InvalidReference(_))
    ));
    assert!(matches!(
      parse_reference(""),
      Err(QuizError::InvalidReference(_))
    ));
  }
}
