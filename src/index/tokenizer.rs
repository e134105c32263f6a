//! Technical-token-aware tokenizer.
//!
//! Standards documents are full of compound identifiers like `ML-KEM.KeyGen`
//! or `SHAKE128`. The tokenizer treats `-`, `.` and `_` inside alphanumeric
//! runs as intra-token joiners, emitting both the full lowercased compound
//! and each alphanumeric component, so queries match on either form.
//!
//! The scanner is a single forward pass over the characters; no regex engine
//! is involved on document-sized inputs.

/// Returns true for characters that join compound tokens.
const fn is_joiner(c: char) -> bool {
    matches!(c, '-' | '.' | '_')
}

/// Tokenizes text for indexing and scoring.
///
/// Runs of `[A-Za-z0-9]` joined by `[-._]` are compound tokens: the full
/// compound (lowercased) is emitted followed by each component. Plain runs
/// emit a single lowercased token. All other characters split.
///
/// # Examples
///
/// ```
/// use citeseek::index::tokenize;
///
/// let tokens = tokenize("ML-KEM.KeyGen (Algorithm 19)");
/// assert_eq!(
///     tokens,
///     vec!["ml-kem.keygen", "ml", "kem", "keygen", "algorithm", "19"]
/// );
/// ```
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        if !chars[i].is_ascii_alphanumeric() {
            i += 1;
            continue;
        }

        // Scan one compound run: alnum segments joined by single joiners.
        let start = i;
        let mut has_joiner = false;
        while i < chars.len() {
            if chars[i].is_ascii_alphanumeric() {
                i += 1;
            } else if is_joiner(chars[i])
                && i + 1 < chars.len()
                && chars[i + 1].is_ascii_alphanumeric()
            {
                has_joiner = true;
                i += 1;
            } else {
                break;
            }
        }

        let run: String = chars[start..i].iter().collect::<String>().to_lowercase();
        if has_joiner {
            tokens.push(run.clone());
            for component in run.split(|c| is_joiner(c)) {
                if !component.is_empty() {
                    tokens.push(component.to_string());
                }
            }
        } else {
            tokens.push(run);
        }
    }

    tokens
}

/// Extracts technical compound tokens (runs matching
/// `[A-Za-z0-9]+([-._][A-Za-z0-9]+)+`) in their original case,
/// first-seen order, deduplicated.
#[must_use]
pub fn technical_tokens(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        if !chars[i].is_ascii_alphanumeric() {
            i += 1;
            continue;
        }
        let start = i;
        let mut has_joiner = false;
        while i < chars.len() {
            if chars[i].is_ascii_alphanumeric() {
                i += 1;
            } else if is_joiner(chars[i])
                && i + 1 < chars.len()
                && chars[i + 1].is_ascii_alphanumeric()
            {
                has_joiner = true;
                i += 1;
            } else {
                break;
            }
        }
        if has_joiner {
            let run: String = chars[start..i].iter().collect();
            if !out.contains(&run) {
                out.push(run);
            }
        }
    }

    out
}

/// Splits a compound token into its alphanumeric components.
#[must_use]
pub fn split_components(token: &str) -> Vec<&str> {
    token
        .split(|c: char| is_joiner(c))
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_compound_emits_full_and_components() {
        let tokens = tokenize("ML-KEM.KeyGen");
        assert_eq!(tokens, vec!["ml-kem.keygen", "ml", "kem", "keygen"]);
    }

    #[test]
    fn test_plain_words_lowercased() {
        assert_eq!(tokenize("The Quick FOX"), vec!["the", "quick", "fox"]);
    }

    #[test]
    fn test_punctuation_splits() {
        assert_eq!(tokenize("keys; values, etc."), vec!["keys", "values", "etc"]);
    }

    #[test]
    fn test_trailing_joiner_not_part_of_token() {
        // A trailing period is sentence punctuation, not a joiner.
        assert_eq!(tokenize("see ML-KEM."), vec!["see", "ml-kem", "ml", "kem"]);
    }

    #[test]
    fn test_underscore_compound() {
        assert_eq!(tokenize("key_gen"), vec!["key_gen", "key", "gen"]);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(tokenize("Algorithm 19"), vec!["algorithm", "19"]);
        assert_eq!(tokenize("SHAKE128"), vec!["shake128"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("  \t\n").is_empty());
    }

    #[test_case("What is ML-KEM?", &["ML-KEM"]; "single compound")]
    #[test_case("ML-KEM vs ML-DSA", &["ML-KEM", "ML-DSA"]; "two compounds")]
    #[test_case("plain words only", &[]; "no compounds")]
    #[test_case("FIPS 203", &[]; "space is not a joiner")]
    #[test_case("ML-KEM and ML-KEM again", &["ML-KEM"]; "dedup")]
    fn test_technical_tokens(input: &str, expected: &[&str]) {
        assert_eq!(technical_tokens(input), expected);
    }

    #[test]
    fn test_technical_tokens_preserve_case() {
        assert_eq!(technical_tokens("ml-kem.KeyGen"), vec!["ml-kem.KeyGen"]);
    }

    #[test]
    fn test_split_components() {
        assert_eq!(split_components("ML-KEM.KeyGen"), vec!["ML", "KEM", "KeyGen"]);
        assert_eq!(split_components("plain"), vec!["plain"]);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn tokens_are_lowercase_alnum_or_compound(input in ".{0,200}") {
                for token in tokenize(&input) {
                    prop_assert!(!token.is_empty());
                    prop_assert!(token
                        .chars()
                        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || is_joiner(c)));
                    // Joiners never lead or trail a token.
                    prop_assert!(!is_joiner(token.chars().next().unwrap_or('a')));
                    prop_assert!(!is_joiner(token.chars().last().unwrap_or('a')));
                }
            }

            #[test]
            fn tokenize_is_deterministic(input in ".{0,200}") {
                prop_assert_eq!(tokenize(&input), tokenize(&input));
            }
        }
    }
}
