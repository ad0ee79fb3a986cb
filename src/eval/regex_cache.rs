//! Process-wide compiled regex cache for the `=~` operator.
//!
//! Patterns are compiled once and reused across all engines and threads.
//! `Regex` clones share the compiled program, so handing out clones is
//! cheap.

use hashbrown::HashMap;
use lazy_static::lazy_static;
use parking_lot::RwLock;
use regex::Regex;

use crate::{Error, Result};

lazy_static! {
    static ref COMPILED_PATTERNS: RwLock<HashMap<String, Regex>> = RwLock::new(HashMap::new());
}

/// Fetch a compiled pattern, compiling and caching on first use.
/// Concurrent first-use may compile twice; one result wins the store.
pub fn compiled(pattern: &str) -> Result<Regex> {
    if let Some(re) = COMPILED_PATTERNS.read().get(pattern) {
        return Ok(re.clone());
    }
    let re = Regex::new(pattern).map_err(|e| Error::SyntaxError {
        position: 0,
        message: format!("Invalid regular expression `{pattern}`: {e}"),
    })?;
    COMPILED_PATTERNS
        .write()
        .entry(pattern.to_string())
        .or_insert_with(|| re.clone());
    Ok(re)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compiled_is_cached() {
        let a = compiled("^a+b$").unwrap();
        assert!(a.is_match("aaab"));
        // Second fetch hits the cache and matches identically
        let b = compiled("^a+b$").unwrap();
        assert!(b.is_match("ab"));
        assert!(!b.is_match("ba"));
    }

    #[test]
    fn test_invalid_pattern_errors() {
        assert!(compiled("(unclosed").is_err());
    }
}
