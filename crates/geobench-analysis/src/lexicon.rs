//! Lexicon scorer for brand sentiment in platform recommendations.

/// Word weights for webinar and event-platform commentary.
///
/// Keys are lowercase single words. Values in `(0.0, 1.0]` are positive,
/// in `[-1.0, 0.0)` are negative. The final score is clamped to `[-1.0, 1.0]`.
pub(crate) const LEXICON: &[(&str, f64)] = &[
    // Positive signals
    ("great", 0.4),
    ("good", 0.3),
    ("excellent", 0.5),
    ("best", 0.5),
    ("leading", 0.4),
    ("leader", 0.4),
    ("robust", 0.4),
    ("powerful", 0.4),
    ("comprehensive", 0.3),
    ("strong", 0.3),
    ("recommend", 0.4),
    ("recommended", 0.4),
    ("ideal", 0.4),
    ("intuitive", 0.3),
    ("popular", 0.3),
    ("reliable", 0.4),
    ("scalable", 0.3),
    ("innovative", 0.3),
    ("seamless", 0.3),
    ("flexible", 0.3),
    ("engaging", 0.3),
    ("easy", 0.3),
    ("standout", 0.4),
    ("advanced", 0.2),
    ("trusted", 0.3),
    // Negative signals
    ("expensive", -0.4),
    ("costly", -0.4),
    ("pricey", -0.3),
    ("limited", -0.3),
    ("lacks", -0.4),
    ("lacking", -0.4),
    ("complex", -0.3),
    ("complicated", -0.4),
    ("clunky", -0.5),
    ("cumbersome", -0.5),
    ("outdated", -0.5),
    ("dated", -0.3),
    ("difficult", -0.4),
    ("weak", -0.4),
    ("poor", -0.5),
    ("buggy", -0.6),
    ("unreliable", -0.6),
    ("steep", -0.3),
    ("drawback", -0.3),
    ("drawbacks", -0.3),
    ("downside", -0.3),
    ("downsides", -0.3),
    ("restrictive", -0.4),
    ("bad", -0.4),
    ("worst", -0.6),
];

/// Score a text string using the lexicon.
///
/// Splits text into lowercase words, sums matching weights, and clamps
/// the result to `[-1.0, 1.0]`. Returns `0.0` for empty or unknown text.
#[must_use]
pub fn lexicon_score(text: &str) -> f64 {
    let mut score = 0.0_f64;
    for word in text.split_whitespace() {
        let w = word
            .trim_matches(|c: char| !c.is_alphabetic())
            .to_lowercase();
        if let Some(&(_, weight)) = LEXICON.iter().find(|&&(lex_word, _)| w == lex_word) {
            score += weight;
        }
    }
    score.clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geobench_core::Sentiment;

    #[test]
    fn empty_string_returns_zero() {
        assert_eq!(lexicon_score(""), 0.0);
    }

    #[test]
    fn unknown_words_return_zero() {
        assert_eq!(lexicon_score("platform for hosting sessions"), 0.0);
    }

    #[test]
    fn positive_commentary_scores_positive() {
        let score = lexicon_score("ON24 is a great, reliable platform.");
        assert!(score > 0.0, "expected positive, got {score}");
        assert_eq!(Sentiment::from_score(score), Sentiment::Positive);
    }

    #[test]
    fn negative_commentary_scores_negative() {
        let score = lexicon_score("Clunky and expensive for small teams.");
        assert!(score < 0.0, "expected negative, got {score}");
        assert_eq!(Sentiment::from_score(score), Sentiment::Negative);
    }

    #[test]
    fn punctuation_is_stripped_before_lookup() {
        assert!((lexicon_score("**Best**") - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn score_is_clamped() {
        let text = "best best best best best excellent excellent";
        assert!((lexicon_score(text) - 1.0).abs() < f64::EPSILON);
        let text = "worst worst worst buggy buggy";
        assert!((lexicon_score(text) + 1.0).abs() < f64::EPSILON);
    }
}
