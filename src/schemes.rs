//! Scheme vocabulary for the standards corpus.
//!
//! Maps scheme roots (`ML-KEM`, `ML-DSA`, `SLH-DSA`) to their standard
//! identifiers, role phrases, and dot-name operations. Used by query
//! expansion, query refinement, and the compare fallback.

/// One scheme family.
#[derive(Debug, Clone, Copy)]
pub struct SchemeInfo {
    /// Scheme root as written in the documents.
    pub root: &'static str,
    /// Standard identifier used as a retrieval bias token.
    pub standard: &'static str,
    /// Role phrase used by the compare fallback.
    pub role: &'static str,
    /// Operation phrasings and their dot-name suffixes.
    pub ops: &'static [(&'static str, &'static str)],
}

/// Known scheme families.
pub const SCHEMES: &[SchemeInfo] = &[
    SchemeInfo {
        root: "ML-KEM",
        standard: "FIPS 203",
        role: "key-encapsulation mechanism",
        ops: &[
            ("key generation", "KeyGen"),
            ("encapsulation", "Encaps"),
            ("decapsulation", "Decaps"),
        ],
    },
    SchemeInfo {
        root: "ML-DSA",
        standard: "FIPS 204",
        role: "digital signature scheme",
        ops: &[
            ("key generation", "KeyGen"),
            ("sign", "Sign"),
            ("verify", "Verify"),
        ],
    },
    SchemeInfo {
        root: "SLH-DSA",
        standard: "FIPS 205",
        role: "stateless hash-based digital signature scheme",
        ops: &[
            ("key generation", "KeyGen"),
            ("sign", "Sign"),
            ("verify", "Verify"),
        ],
    },
];

/// Checks whether `haystack` contains `phrase` at word boundaries,
/// case-insensitively.
#[must_use]
pub fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    let haystack = haystack.to_lowercase();
    let phrase = phrase.to_lowercase();
    let mut search_from = 0;
    while let Some(pos) = haystack[search_from..].find(&phrase) {
        let start = search_from + pos;
        let end = start + phrase.len();
        let before_ok = start == 0
            || !haystack[..start]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_ascii_alphanumeric());
        let after_ok = end == haystack.len()
            || !haystack[end..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        search_from = start + 1;
    }
    false
}

/// Returns the schemes whose root appears in `text` (word-boundary,
/// case-insensitive), in table order.
#[must_use]
pub fn schemes_in(text: &str) -> Vec<&'static SchemeInfo> {
    SCHEMES
        .iter()
        .filter(|s| contains_phrase(text, s.root))
        .collect()
}

/// Looks up a scheme by root, case-insensitively.
#[must_use]
pub fn find_scheme(root: &str) -> Option<&'static SchemeInfo> {
    SCHEMES
        .iter()
        .find(|s| s.root.eq_ignore_ascii_case(root.trim()))
}
