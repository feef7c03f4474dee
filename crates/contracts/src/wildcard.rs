//! Wildcard filters as the simulator applies them
//!
//! Supports `*` (any run), `?` (any single char), `[abc]` / `[a-z]` sets and
//! `[!abc]` negated sets. Matching is case-sensitive and anchored at both ends;
//! `.` and `/` are ordinary characters. A pattern that does not parse, such as
//! one with an unclosed `[`, only matches itself.

use globset::{GlobBuilder, GlobMatcher};

enum Pattern<'a> {
    Glob(GlobMatcher),
    Literal(&'a str),
}

impl<'a> Pattern<'a> {
    fn new(pattern: &'a str) -> Self {
        match GlobBuilder::new(pattern).literal_separator(false).build() {
            Ok(glob) => Self::Glob(glob.compile_matcher()),
            Err(_) => Self::Literal(pattern),
        }
    }

    fn is_match(&self, text: &str) -> bool {
        match self {
            Self::Glob(matcher) => matcher.is_match(text),
            Self::Literal(literal) => *literal == text,
        }
    }
}

/// Match `text` against a shell-style wildcard `pattern`.
pub fn matches(text: &str, pattern: &str) -> bool {
    Pattern::new(pattern).is_match(text)
}

/// Blueprint filter: the pattern matches the full id or any of its tags.
///
/// Tags are the dot-separated parts of the id, so `vehicle.tesla.model3`
/// is matched by `model3`, `vehicle`, `vehicle.*` and `*tesla*`.
pub fn blueprint_matches(blueprint_id: &str, pattern: &str) -> bool {
    let pattern = Pattern::new(pattern);
    pattern.is_match(blueprint_id) || blueprint_id.split('.').any(|tag| pattern.is_match(tag))
}

/// Actor filter: the pattern matches the actor's type id only.
pub fn actor_matches(type_id: &str, pattern: &str) -> bool {
    matches(type_id, pattern)
}
