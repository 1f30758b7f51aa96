//! `name:<digits>` score suffix parsing.

use once_cell::sync::Lazy;
use regex::Regex;

static SCORED_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\A(.+):([0-9]+)\z").expect("valid scored name regex"));

/// One raw input split into tag name and optional score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredName {
    pub name: String,
    pub score: Option<i64>,
}

impl ScoredName {
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            score: None,
        }
    }
}

/// Splits a trailing `:<digits>` score off `raw`.
///
/// The whole string must match; anything else (including a digit run that
/// overflows `i64`) is returned unchanged as the name.
pub fn parse_scored(raw: &str) -> ScoredName {
    let Some(caps) = SCORED_NAME_RE.captures(raw) else {
        return ScoredName::plain(raw);
    };
    match caps[2].parse::<i64>() {
        Ok(score) => ScoredName {
            name: caps[1].to_string(),
            score: Some(score),
        },
        Err(_) => ScoredName::plain(raw),
    }
}

/// Applies [`parse_scored`] only when `scored` is set.
pub fn split_if_scored(raw: &str, scored: bool) -> ScoredName {
    if scored {
        parse_scored(raw)
    } else {
        ScoredName::plain(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_scored, split_if_scored, ScoredName};

    #[test]
    fn splits_trailing_score() {
        assert_eq!(
            parse_scored("focus:5"),
            ScoredName {
                name: "focus".to_string(),
                score: Some(5)
            }
        );
    }

    #[test]
    fn leaves_unscored_and_malformed_names_intact() {
        assert_eq!(parse_scored("focus"), ScoredName::plain("focus"));
        assert_eq!(parse_scored("focus:abc"), ScoredName::plain("focus:abc"));
        assert_eq!(parse_scored("focus:"), ScoredName::plain("focus:"));
        assert_eq!(parse_scored(":5"), ScoredName::plain(":5"));
        assert_eq!(parse_scored("focus:5x"), ScoredName::plain("focus:5x"));
    }

    #[test]
    fn only_the_last_suffix_is_the_score() {
        let parsed = parse_scored("c++:2011:7");
        assert_eq!(parsed.name, "c++:2011");
        assert_eq!(parsed.score, Some(7));
    }

    #[test]
    fn overflowing_score_stays_in_the_name() {
        let raw = "big:99999999999999999999";
        assert_eq!(parse_scored(raw), ScoredName::plain(raw));
    }

    #[test]
    fn unicode_digits_are_not_scores() {
        assert_eq!(parse_scored("rank:٣"), ScoredName::plain("rank:٣"));
    }

    #[test]
    fn split_if_scored_respects_flag() {
        assert_eq!(split_if_scored("focus:5", false), ScoredName::plain("focus:5"));
        assert_eq!(split_if_scored("focus:5", true).score, Some(5));
    }
}
