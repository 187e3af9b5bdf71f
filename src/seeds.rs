//! Built-in challenge bank.

use crate::domain::NewChallenge;

/// The default set, used to seed an empty database and by application reset
/// when no TOML bank is configured.
pub fn default_challenges() -> Vec<NewChallenge> {
  vec![
    seed("Pull-ups", "Do as many pull-ups as you can.", "Strength", 3, 1),
    seed("Push-ups", "Do as many push-ups as you can.", "Strength", 3, 2),
    seed("Meditation", "Sit quietly and focus on your breathing.", "Mindfulness", 2, 11),
    seed("Walk", "Take a brisk walk outside.", "Mindfulness", 1, 21),
    seed("Handstand", "Hold a handstand against the wall.", "Strength", 3, 5),
    seed("Squats", "Do as many squats as you can.", "Strength", 2, 2),
  ]
}

fn seed(name: &str, description: &str, category: &str, difficulty: u8, duration_minutes: u32) -> NewChallenge {
  NewChallenge {
    name: name.into(),
    description: description.into(),
    category: category.into(),
    difficulty,
    duration_minutes,
    image_path: None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_pass_validation() {
    let all = default_challenges();
    assert_eq!(all.len(), 6);
    for c in all {
      c.clone().validated().unwrap_or_else(|e| panic!("{}: {e}", c.name));
    }
  }
}
