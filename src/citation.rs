// ============================================================================
// File: src/citation.rs
// Rewrites citation numbers in an answer as markdown links
// ============================================================================

use regex::{Captures, Regex};
use std::sync::OnceLock;

use crate::models::Reference;

/// ASCII digits only; other Unicode decimal digits never form a citation.
fn digit_runs() -> &'static Regex {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    DIGITS.get_or_init(|| Regex::new(r"[0-9]+").expect("valid digit pattern"))
}

/// Replace each digit run `n` with `[n](link)` when `1 <= n <= references.len()`
/// and reference `n` has a non-empty link. Everything else is left as is.
pub fn link_citations(answer: &str, references: Option<&[Reference]>) -> String {
    let Some(references) = references else {
        return answer.to_string();
    };

    digit_runs()
        .replace_all(answer, |caps: &Captures| {
            let digits = &caps[0];
            let target = digits
                .parse::<usize>()
                .ok()
                .filter(|n| (1..=references.len()).contains(n))
                .and_then(|n| references[n - 1].target());
            match target {
                Some(link) => format!("[{}]({})", digits, link),
                None => digits.to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(index: i64, link: &str) -> Reference {
        Reference {
            index,
            link: Some(link.to_string()),
            ..Reference::default()
        }
    }

    #[test]
    fn test_links_in_range_numbers() {
        let references = vec![reference(1, "https://a"), reference(2, "https://b")];
        let linked = link_citations("See 1 and 2 for details, also note 5.", Some(references.as_slice()));
        assert_eq!(linked, "See [1](https://a) and [2](https://b) for details, also note 5.");
    }

    #[test]
    fn test_without_references_returns_input() {
        let answer = "Rates rose 3 times in 2023.";
        assert_eq!(link_citations(answer, None), answer);
    }

    #[test]
    fn test_empty_reference_list_changes_nothing() {
        assert_eq!(link_citations("see 1", Some(&[][..])), "see 1");
    }

    #[test]
    fn test_empty_link_stays_plain() {
        let references = vec![reference(1, ""), reference(2, "https://b")];
        let linked = link_citations("1, 2", Some(references.as_slice()));
        assert_eq!(linked, "1, [2](https://b)");
        assert!(!linked.contains("]()"));
    }

    #[test]
    fn test_missing_link_stays_plain() {
        let references = vec![Reference::default()];
        assert_eq!(link_citations("[1]", Some(references.as_slice())), "[1]");
    }

    #[test]
    fn test_runs_are_maximal() {
        let references = vec![reference(1, "https://a"), reference(2, "https://b")];
        // "12" and "2023" are single runs, both out of range
        assert_eq!(link_citations("12 and 2023", Some(references.as_slice())), "12 and 2023");
    }

    #[test]
    fn test_zero_and_overflow_are_untouched() {
        let references = vec![reference(1, "https://a")];
        let huge = "99999999999999999999999999";
        let answer = format!("0 {} 01", huge);
        assert_eq!(link_citations(&answer, Some(references.as_slice())), format!("0 {} [01](https://a)", huge));
    }

    #[test]
    fn test_numbering_follows_list_order_not_index_field() {
        let references = vec![reference(7, "https://first"), reference(3, "https://second")];
        assert_eq!(
            link_citations("2", Some(references.as_slice())),
            "[2](https://second)"
        );
    }

    #[test]
    fn test_non_ascii_digits_stay_plain() {
        let references = vec![reference(1, "https://a"), reference(2, "https://b")];
        let linked = link_citations("See １ and ٢, then 1.", Some(references.as_slice()));
        assert_eq!(linked, "See １ and ٢, then [1](https://a).");
    }
}
