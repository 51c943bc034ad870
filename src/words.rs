//! Secret word vocabulary and per-game assignment.

use crate::error::{GameError, GameResult};
use crate::types::{PlayerId, MAX_PLAYERS, MIN_PLAYERS_TO_START};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::path::Path;

const DEFAULT_WORDS: &str = include_str!("words.txt");

/// A validated pool of distinct words, large enough for a full room
#[derive(Debug, Clone)]
pub struct Vocabulary {
    words: Vec<String>,
}

impl Vocabulary {
    /// Build a vocabulary, rejecting pools too small for a full room.
    ///
    /// Entries are trimmed; blanks and duplicates (case-insensitive) are dropped.
    pub fn new<I, S>(words: I) -> GameResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let words: Vec<String> = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_string())
            .filter(|w| !w.is_empty())
            .filter(|w| seen.insert(w.to_lowercase()))
            .collect();

        if words.len() < MAX_PLAYERS {
            return Err(GameError::Configuration(format!(
                "vocabulary has {} distinct words, need at least {}",
                words.len(),
                MAX_PLAYERS
            )));
        }

        Ok(Self { words })
    }

    /// The vocabulary bundled with the server
    pub fn builtin() -> GameResult<Self> {
        Self::new(DEFAULT_WORDS.lines())
    }

    /// Load a newline-separated word list
    pub fn from_file(path: &Path) -> GameResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GameError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::new(content.lines())
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.iter().any(|w| w == word)
    }

    /// Give every player a distinct word.
    ///
    /// Words are sampled without replacement and the sample order is itself
    /// random, so a player's seat in `player_ids` has no bearing on which
    /// word they get.
    pub fn assign<R: Rng + ?Sized>(
        &self,
        player_ids: &[PlayerId],
        rng: &mut R,
    ) -> GameResult<HashMap<PlayerId, String>> {
        if player_ids.len() < MIN_PLAYERS_TO_START {
            return Err(GameError::InvalidState(format!(
                "Need at least {} players to start",
                MIN_PLAYERS_TO_START
            )));
        }
        // Guaranteed by the capacity check at construction
        if player_ids.len() > self.words.len() {
            return Err(GameError::Configuration(format!(
                "{} players but only {} words",
                player_ids.len(),
                self.words.len()
            )));
        }

        let mut pool: Vec<&String> = self.words.iter().collect();
        let (drawn, _) = pool.partial_shuffle(rng, player_ids.len());

        Ok(player_ids
            .iter()
            .cloned()
            .zip(drawn.iter().map(|w| (*w).clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ids(n: usize) -> Vec<PlayerId> {
        (0..n).map(|i| format!("p{}", i)).collect()
    }

    #[test]
    fn test_builtin_vocabulary_is_valid() {
        let vocab = Vocabulary::builtin().unwrap();
        assert!(vocab.len() >= MAX_PLAYERS);
    }

    #[test]
    fn test_small_vocabulary_is_rejected() {
        let words: Vec<String> = (0..MAX_PLAYERS - 1).map(|i| format!("w{}", i)).collect();
        let result = Vocabulary::new(&words);
        assert!(matches!(result, Err(GameError::Configuration(_))));
    }

    #[test]
    fn test_duplicates_do_not_count_towards_capacity() {
        let mut words: Vec<String> = (0..MAX_PLAYERS - 1).map(|i| format!("w{}", i)).collect();
        words.push("W0".to_string());
        words.push("   ".to_string());
        assert!(Vocabulary::new(&words).is_err());
    }

    #[test]
    fn test_assign_full_room_gives_distinct_words() {
        let vocab = Vocabulary::builtin().unwrap();
        let players = ids(MAX_PLAYERS);
        let mut rng = StdRng::seed_from_u64(7);

        let words = vocab.assign(&players, &mut rng).unwrap();

        assert_eq!(words.len(), MAX_PLAYERS);
        for id in &players {
            assert!(vocab.contains(&words[id]));
        }
        let distinct: HashSet<_> = words.values().collect();
        assert_eq!(distinct.len(), MAX_PLAYERS);
    }

    #[test]
    fn test_assign_requires_two_players() {
        let vocab = Vocabulary::builtin().unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let result = vocab.assign(&ids(1), &mut rng);
        assert!(matches!(result, Err(GameError::InvalidState(_))));
    }

    #[test]
    fn test_first_seat_is_not_favoured() {
        // With a 20-word pool and 2 players, the first seat should see many
        // different words over many games.
        let words: Vec<String> = (0..MAX_PLAYERS).map(|i| format!("w{}", i)).collect();
        let vocab = Vocabulary::new(&words).unwrap();
        let players = ids(2);
        let mut rng = StdRng::seed_from_u64(42);

        let mut first_seat_words = HashSet::new();
        for _ in 0..400 {
            let assigned = vocab.assign(&players, &mut rng).unwrap();
            first_seat_words.insert(assigned["p0"].clone());
        }
        assert_eq!(first_seat_words.len(), MAX_PLAYERS);
    }

    #[test]
    fn test_from_file() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for i in 0..25 {
            writeln!(file, "word{}", i).unwrap();
        }
        let vocab = Vocabulary::from_file(file.path()).unwrap();
        assert_eq!(vocab.len(), 25);
        assert!(vocab.contains("word24"));
    }
}
