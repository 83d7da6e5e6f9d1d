use crate::error::Result;
use crate::nlp::lexicon::Lexicon;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Display;

static URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"http\S+|https\S+|www\.\S+").expect("valid URL pattern"));

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\S+@\S+").expect("valid email pattern"));

static DIGIT_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid digit pattern"));

static WHITESPACE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// Turns raw message text into the cleaned token string the vectorizer
/// consumes.
///
/// The pipeline is order-sensitive: URLs and emails are stripped before
/// digits and punctuation so that their fragments never survive as tokens.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    lexicon: Lexicon,
}

impl TextNormalizer {
    /// Create a normalizer over an already-loaded lexicon
    pub fn new(lexicon: Lexicon) -> Self {
        Self { lexicon }
    }

    /// Create a normalizer over the bundled English lexicon
    pub fn english() -> Result<Self> {
        Ok(Self::new(Lexicon::english()?))
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    /// Normalize any displayable value into space-separated lemma tokens.
    ///
    /// Never fails. Text without alphabetic content yields an empty string.
    pub fn normalize<T: Display + ?Sized>(&self, text: &T) -> String {
        let cleaned = clean_text(&text.to_string());
        self.tokens(&cleaned).join(" ")
    }

    /// Normalize into a token vector instead of a joined string
    pub fn normalize_tokens<T: Display + ?Sized>(&self, text: &T) -> Vec<String> {
        let cleaned = clean_text(&text.to_string());
        self.tokens(&cleaned)
    }

    fn tokens(&self, cleaned: &str) -> Vec<String> {
        cleaned
            .split_whitespace()
            .filter(|token| !self.lexicon.is_stopword(token))
            .map(|token| self.lexicon.lemma(token).into_owned())
            // A lemma may itself be a stopword ("others" -> "other") or spell a
            // URL scheme once punctuation is gone ("ht.tps" -> "https"); both
            // would be removed by a second pass, so they go now.
            .filter(|lemma| !self.lexicon.is_stopword(lemma) && !looks_like_url(lemma))
            .collect()
    }
}

/// Steps 1-7 of the pipeline: strip URLs, emails, digits and non-letters,
/// lowercase, and collapse whitespace.
pub fn clean_text(text: &str) -> String {
    let text = URL_PATTERN.replace_all(text, "");
    let text = EMAIL_PATTERN.replace_all(&text, "");
    let text = DIGIT_PATTERN.replace_all(&text, "");

    let letters: String = text
        .chars()
        .filter(|c| c.is_ascii_alphabetic() || c.is_whitespace())
        .collect();
    let lowered = letters.to_lowercase();

    WHITESPACE_PATTERN
        .replace_all(&lowered, " ")
        .trim()
        .to_string()
}

fn looks_like_url(token: &str) -> bool {
    URL_PATTERN.is_match(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> TextNormalizer {
        TextNormalizer::english().unwrap()
    }

    #[test]
    fn test_clean_text_strips_noise() {
        assert_eq!(
            clean_text("Visit http://example.com or www.spam.biz NOW!!"),
            "visit or now"
        );
        assert_eq!(clean_text("Mail me: someone@example.com ok"), "mail me ok");
        assert_eq!(clean_text("  Call 123-456-7890\t\ttoday  "), "call today");
        assert_eq!(clean_text("Café ☕ 50% off"), "caf off");
    }

    #[test]
    fn test_winner_message() {
        let cleaned =
            normalizer().normalize("WINNER!! You have won a $1000 prize! Call 123-456-7890 now!");

        let allowed = ["winner", "prize", "call", "now"];
        assert!(cleaned
            .split_whitespace()
            .all(|token| allowed.contains(&token)));
        assert_eq!(cleaned, "winner prize call");
    }

    #[test]
    fn test_empty_and_symbol_only_input() {
        let normalizer = normalizer();
        assert_eq!(normalizer.normalize(""), "");
        assert_eq!(normalizer.normalize("   "), "");
        assert_eq!(normalizer.normalize("!!! 12345 $$$ :-)"), "");
        assert_eq!(normalizer.normalize("the and of is"), "");
    }

    #[test]
    fn test_non_string_input_is_coerced() {
        let normalizer = normalizer();
        assert_eq!(normalizer.normalize(&42), "");
        assert_eq!(normalizer.normalize(&3.5f64), "");
        assert_eq!(normalizer.normalize(&'x'), "x");
    }

    #[test]
    fn test_noun_lemmatization() {
        let normalizer = normalizer();
        assert_eq!(normalizer.normalize("Prizes and offers"), "prize offer");
        assert_eq!(normalizer.normalize("free ringtones for babies"), "free ringtone baby");
        assert_eq!(normalizer.normalize("children need new boxes"), "child need new box");
        // noun-only: verb forms stay as they are
        assert_eq!(normalizer.normalize("running meeting"), "running meeting");
    }

    #[test]
    fn test_lemma_that_is_a_stopword_is_dropped() {
        assert_eq!(normalizer().normalize("others cheered"), "cheered");
    }

    #[test]
    fn test_reassembled_url_scheme_is_dropped() {
        let normalizer = normalizer();
        let once = normalizer.normalize("ht.tpfoo deal HTTPbar");
        assert_eq!(once, "deal");
        assert_eq!(normalizer.normalize(&once), once);
    }

    #[test]
    fn test_idempotence() {
        let normalizer = normalizer();
        let samples = [
            "WINNER!! You have won a $1000 prize! Call 123-456-7890 now!",
            "Hey, are we still meeting for lunch tomorrow at 2pm?",
            "FREE entry to win! Text WIN to 12345. Visit http://example.com",
            "Congratulations! You've been selected for a FREE iPhone. Email us at spam@example.com",
            "URGENT: Your account will be closed! Click here: www.phishing.com",
            "Get 50% OFF on all products! Limited time offer! Call 999-888-7777",
            "Glasses, buses, bonuses, quizzes, wolves, criteria and data",
            "others, theirs and ours; companies' policies",
            "ÜBER naïve façade — résumé",
        ];

        for sample in samples {
            let once = normalizer.normalize(sample);
            assert_eq!(normalizer.normalize(&once), once, "input: {}", sample);
        }
    }

    #[test]
    fn test_output_invariants() {
        let normalizer = normalizer();
        let text = "The 3 BEST deals!!! Reply YES to +44 7700 900123, or visit https://x.io/a?b=c";
        let cleaned = normalizer.normalize(text);

        for token in cleaned.split_whitespace() {
            assert!(token.bytes().all(|b| b.is_ascii_lowercase()), "token {}", token);
            assert!(!normalizer.lexicon().is_stopword(token), "token {}", token);
        }
        assert!(!cleaned.contains("  "));
        assert_eq!(cleaned, cleaned.trim());
    }

    #[test]
    fn test_normalize_tokens_matches_string_form() {
        let normalizer = normalizer();
        let text = "Limited time offers on cheap flights";
        assert_eq!(
            normalizer.normalize_tokens(text).join(" "),
            normalizer.normalize(text)
        );
    }
}
