//! Session identity: unique ids and human-friendly run names.

use uuid::Uuid;

const ADJECTIVES: &[&str] = &[
    "agitated", "amazing", "angry", "awesome", "berserk", "boring", "clever", "cranky", "dreamy", "elegant", "evil",
    "focused", "friendly", "gloomy", "goofy", "happy", "hungry", "jolly", "jovial", "lonely", "loving", "mad", "modest",
    "naughty", "nostalgic", "peaceful", "pensive", "romantic", "sad", "serene", "sharp", "sleepy", "stoic", "tender",
    "trusting", "zen",
];

const SCIENTISTS: &[&str] = &[
    "archimedes", "babbage", "bohr", "curie", "darwin", "einstein", "euler", "faraday", "feynman", "franklin", "galileo",
    "goodall", "hopper", "hypatia", "kepler", "lovelace", "mcclintock", "meitner", "mendel", "newton", "noether",
    "pasteur", "poincare", "ramanujan", "shannon", "tesla", "turing", "volta", "wozniak",
];

/// A fresh random session identifier.
pub fn new_session_id() -> Uuid {
    Uuid::new_v4()
}

/// Derives a run name such as `focused-turing` from a session id.
///
/// The same session id always yields the same name.
pub fn run_name_for(session_id: &Uuid) -> String {
    let bytes = session_id.as_bytes();
    let adjective = ADJECTIVES[usize::from(bytes[0]) % ADJECTIVES.len()];
    let scientist = SCIENTISTS[usize::from(bytes[15]) % SCIENTISTS.len()];
    format!("{adjective}-{scientist}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_name_is_stable_for_a_session() {
        let session = Uuid::from_bytes([0; 16]);

        assert_eq!(run_name_for(&session), "agitated-archimedes");
        assert_eq!(run_name_for(&session), run_name_for(&session));
    }

    #[test]
    fn run_name_uses_known_words() {
        let name = run_name_for(&new_session_id());
        let (adjective, scientist) = name.split_once('-').expect("two words");

        assert!(ADJECTIVES.contains(&adjective));
        assert!(SCIENTISTS.contains(&scientist));
    }

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(new_session_id(), new_session_id());
    }
}
