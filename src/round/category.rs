use std::{fmt, str::FromStr};

use anyhow::anyhow;
use rand::Rng;

/// Difficulty tier, each one poses its own five kinds of question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, clap::ValueEnum)]
pub enum Mode {
  #[default]
  Noob,
  Pro,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
  Decade,
  Feature,
  YearPlusMinus4,
  BeforeAfter2000,
  YearPlusMinus2,
  Artist,
  Title,
  Album,
}

const NOOB_CATEGORIES: [Category; 5] = [
  Category::Decade,
  Category::Feature,
  Category::YearPlusMinus4,
  Category::BeforeAfter2000,
  Category::YearPlusMinus2,
];

const PRO_CATEGORIES: [Category; 5] = [
  Category::Artist,
  Category::Title,
  Category::YearPlusMinus4,
  Category::YearPlusMinus2,
  Category::Album,
];

impl Mode {
  pub fn categories(&self) -> &'static [Category; 5] {
    match self {
      Mode::Noob => &NOOB_CATEGORIES,
      Mode::Pro => &PRO_CATEGORIES,
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      Mode::Noob => "Noob",
      Mode::Pro => "Pro",
    }
  }
}

impl fmt::Display for Mode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

impl FromStr for Mode {
  type Err = anyhow::Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "noob" => Ok(Mode::Noob),
      "pro" => Ok(Mode::Pro),
      other => Err(anyhow!("unknown mode {:?}, expected noob or pro", other)),
    }
  }
}

impl Category {
  pub fn id(&self) -> &'static str {
    match self {
      Category::Decade => "decade",
      Category::Feature => "feature",
      Category::YearPlusMinus4 => "year-plus-minus-4",
      Category::BeforeAfter2000 => "before-after-2000",
      Category::YearPlusMinus2 => "year-plus-minus-2",
      Category::Artist => "artist",
      Category::Title => "title",
      Category::Album => "album",
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      Category::Decade => "Guess the decade",
      Category::Feature => "Does the song have a feature (2+ artists)?",
      Category::YearPlusMinus4 => "Release year (±4 years)",
      Category::BeforeAfter2000 => "Before or after 2000?",
      Category::YearPlusMinus2 => "Release year (±2 years)",
      Category::Artist => "Guess the artist",
      Category::Title => "Guess the song title",
      Category::Album => "Guess the album",
    }
  }
}

impl fmt::Display for Category {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

/// Uniform pick over the mode's list. Earlier picks are not remembered,
/// the same category may come up several rounds in a row.
pub fn choose_category_with<R: Rng + ?Sized>(mode: Mode, rng: &mut R) -> Category {
  let list = mode.categories();
  list[rng.gen_range(0..list.len())]
}

pub fn choose_category(mode: Mode) -> Category {
  choose_category_with(mode, &mut rand::thread_rng())
}

#[cfg(test)]
mod tests {
  use std::collections::HashSet;

  use rand::{rngs::StdRng, SeedableRng};

  use super::*;

  #[test]
  fn picks_stay_within_the_mode() {
    for mode in [Mode::Noob, Mode::Pro] {
      for _ in 0..200 {
        assert!(mode.categories().contains(&choose_category(mode)));
      }
    }
  }

  #[test]
  fn every_category_of_a_mode_comes_up() {
    let mut rng = StdRng::seed_from_u64(7);
    for mode in [Mode::Noob, Mode::Pro] {
      let seen = (0..500)
        .map(|_| choose_category_with(mode, &mut rng))
        .collect::<HashSet<_>>();
      assert_eq!(seen.len(), 5);
    }
  }

  #[test]
  fn modes_parse_case_insensitively() {
    assert_eq!("PRO".parse::<Mode>().unwrap(), Mode::Pro);
    assert_eq!(" noob ".parse::<Mode>().unwrap(), Mode::Noob);
    assert!("expert".parse::<Mode>().is_err());
  }

  #[test]
  fn category_ids_are_unique() {
    let all = NOOB_CATEGORIES
      .iter()
      .chain(PRO_CATEGORIES.iter())
      .map(|c| c.id())
      .collect::<HashSet<_>>();
    assert_eq!(all.len(), 8);
  }
}
