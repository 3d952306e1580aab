//! Function id generation. The storage collaborator owns this format; the
//! dispatch core never parses an id, it only compares and forwards them.

use std::time::{SystemTime, UNIX_EPOCH};

/// Builds an id of the form `<name>_<unix_millis>`, matching the literal
/// example reply in the spec's testable properties (`"id":"hello_<ts>"`).
///
/// `now_millis` is threaded in explicitly so tests can pin it.
pub fn function_id(name: &str, now_millis: u128) -> String {
    format!("{name}_{now_millis}")
}

pub fn unix_millis_now() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_name_and_timestamp() {
        assert_eq!(function_id("hello", 42), "hello_42");
    }

    #[test]
    fn unix_millis_now_is_plausible() {
        // Any time after 2020-01-01 in millis.
        assert!(unix_millis_now() > 1_577_836_800_000);
    }
}
