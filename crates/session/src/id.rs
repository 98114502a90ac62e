//! Session IDs: 8 random alphanumeric characters drawn uniformly from
//! `[a-zA-Z]` (spec.md §4.6).

use rand::Rng;
use rand::seq::SliceRandom;
use std::fmt;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LENGTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let id: String = (0..LENGTH).map(|_| *ALPHABET.choose(&mut rng).expect("alphabet is non-empty") as char).collect();
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
impl std::str::FromStr for SessionId {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_eight_letters() {
        let id = SessionId::generate();
        assert_eq!(id.as_str().len(), LENGTH);
        assert!(id.as_str().chars().all(|c| c.is_ascii_alphabetic()));
    }

    #[test]
    fn generated_ids_are_unlikely_to_collide() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
    }
}
