use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

const BUNDLED_STOPWORDS: &str = include_str!("../../data/stopwords_en.txt");
const BUNDLED_LEMMAS: &str = include_str!("../../data/lemmas_en.txt");

/// Upper bound on lemma chain length while resolving a lemma table
const MAX_CHAIN: usize = 16;

/// Lexicon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LexiconConfig {
    /// Stopword file replacing the bundled list
    #[serde(default)]
    pub stopwords_path: Option<PathBuf>,

    /// Lemma table replacing the bundled one
    #[serde(default)]
    pub lemmas_path: Option<PathBuf>,
}

/// Stopword set and noun lemma table used by the normalizer.
///
/// Built once at startup from bundled data files (or configured overrides)
/// and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Lexicon {
    stopwords: HashSet<String>,
    lemmas: HashMap<String, String>,
    base_forms: HashSet<String>,
}

impl Lexicon {
    /// Build the lexicon from the bundled English tables
    pub fn english() -> Result<Self> {
        Self::parse(BUNDLED_STOPWORDS, BUNDLED_LEMMAS)
    }

    /// Build the lexicon described by the configuration
    pub fn from_config(config: &LexiconConfig) -> Result<Self> {
        let stopwords = match &config.stopwords_path {
            Some(path) => read_table(path)?,
            None => BUNDLED_STOPWORDS.to_string(),
        };
        let lemmas = match &config.lemmas_path {
            Some(path) => read_table(path)?,
            None => BUNDLED_LEMMAS.to_string(),
        };
        Self::parse(&stopwords, &lemmas)
    }

    /// Parse a stopword list and a lemma table from their text form
    pub fn parse(stopwords: &str, lemmas: &str) -> Result<Self> {
        let stopwords = parse_stopwords(stopwords);
        let (raw, protected) = parse_lemmas(lemmas)?;
        let lemmas = resolve_chains(&raw)?;

        let mut base_forms: HashSet<String> = protected;
        base_forms.extend(lemmas.values().cloned());

        Ok(Self {
            stopwords,
            lemmas,
            base_forms,
        })
    }

    /// Check whether a token is a stopword
    pub fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(token)
    }

    /// Number of stopwords
    pub fn stopword_count(&self) -> usize {
        self.stopwords.len()
    }

    /// Number of irregular lemma entries
    pub fn lemma_count(&self) -> usize {
        self.lemmas.len()
    }

    /// Reduce a lowercase token to its noun lemma.
    ///
    /// Irregular forms come from the table; known base forms are returned as
    /// they are; everything else goes through WordNet-style noun suffix
    /// detachment. The result is a fixed point: `lemma(lemma(w)) == lemma(w)`.
    pub fn lemma<'a>(&'a self, token: &'a str) -> Cow<'a, str> {
        if let Some(lemma) = self.lemmas.get(token) {
            return Cow::Borrowed(lemma.as_str());
        }
        if self.base_forms.contains(token) {
            return Cow::Borrowed(token);
        }

        let candidate = detach_noun_suffix(token);
        match self.lemmas.get(candidate.as_ref()) {
            Some(lemma) => Cow::Borrowed(lemma.as_str()),
            None => candidate,
        }
    }
}

fn read_table(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        AppError::Configuration(format!("Cannot read lexicon file {}: {}", path.display(), e))
    })
}

fn table_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}

fn parse_stopwords(text: &str) -> HashSet<String> {
    table_lines(text)
        .map(|(_, line)| line.to_lowercase())
        .collect()
}

fn is_token(word: &str) -> bool {
    !word.is_empty() && word.bytes().all(|b| b.is_ascii_lowercase())
}

fn parse_lemmas(text: &str) -> Result<(HashMap<String, String>, HashSet<String>)> {
    let mut lemmas = HashMap::new();
    let mut protected = HashSet::new();

    for (line_no, line) in table_lines(text) {
        if let Some(word) = line.strip_prefix('=') {
            let word = word.trim().to_lowercase();
            if !is_token(&word) {
                return Err(AppError::Configuration(format!(
                    "Lemma table line {}: '{}' is not an alphabetic token",
                    line_no, word
                )));
            }
            protected.insert(word);
            continue;
        }

        let fields: Vec<String> = line.split_whitespace().map(str::to_lowercase).collect();
        match fields.as_slice() {
            [form, lemma] if is_token(form) && is_token(lemma) => {
                lemmas.insert(form.clone(), lemma.clone());
            }
            _ => {
                return Err(AppError::Configuration(format!(
                    "Lemma table line {}: expected '<form> <lemma>', got '{}'",
                    line_no, line
                )));
            }
        }
    }

    Ok((lemmas, protected))
}

/// Follow `form -> lemma` chains so every value is a fixed point
fn resolve_chains(raw: &HashMap<String, String>) -> Result<HashMap<String, String>> {
    let mut resolved = HashMap::with_capacity(raw.len());

    for (form, lemma) in raw {
        let mut current = lemma;
        let mut steps = 0;
        while let Some(next) = raw.get(current) {
            if next == current {
                break;
            }
            steps += 1;
            if steps > MAX_CHAIN {
                return Err(AppError::Configuration(format!(
                    "Lemma table contains a cycle through '{}'",
                    form
                )));
            }
            current = next;
        }
        resolved.insert(form.clone(), current.clone());
    }

    Ok(resolved)
}

/// WordNet-style noun suffix detachment for regular plurals
fn detach_noun_suffix(token: &str) -> Cow<'_, str> {
    let len = token.len();
    if len <= 3 || token.ends_with("ss") || token.ends_with("us") || token.ends_with("is") {
        return Cow::Borrowed(token);
    }

    if len >= 5 {
        if let Some(stem) = token.strip_suffix("ies") {
            return Cow::Owned(format!("{}y", stem));
        }
    }

    for suffix in ["sses", "ches", "shes", "xes", "zzes"] {
        if token.ends_with(suffix) {
            return Cow::Borrowed(&token[..len - 2]);
        }
    }

    Cow::Borrowed(token.strip_suffix('s').unwrap_or(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_lexicon_loads() {
        let lexicon = Lexicon::english().unwrap();

        assert_eq!(lexicon.stopword_count(), 179);
        assert!(lexicon.lemma_count() > 50);
        assert!(lexicon.is_stopword("the"));
        assert!(lexicon.is_stopword("won"));
        assert!(!lexicon.is_stopword("prize"));
    }

    #[test]
    fn test_regular_plurals() {
        let lexicon = Lexicon::english().unwrap();

        assert_eq!(lexicon.lemma("prizes"), "prize");
        assert_eq!(lexicon.lemma("parties"), "party");
        assert_eq!(lexicon.lemma("matches"), "match");
        assert_eq!(lexicon.lemma("wishes"), "wish");
        assert_eq!(lexicon.lemma("boxes"), "box");
        assert_eq!(lexicon.lemma("glasses"), "glass");
        assert_eq!(lexicon.lemma("buzzes"), "buzz");
    }

    #[test]
    fn test_irregular_and_protected_words() {
        let lexicon = Lexicon::english().unwrap();

        assert_eq!(lexicon.lemma("children"), "child");
        assert_eq!(lexicon.lemma("women"), "woman");
        assert_eq!(lexicon.lemma("bonuses"), "bonus");
        assert_eq!(lexicon.lemma("news"), "news");
        assert_eq!(lexicon.lemma("always"), "always");
        assert_eq!(lexicon.lemma("class"), "class");
        assert_eq!(lexicon.lemma("virus"), "virus");
        assert_eq!(lexicon.lemma("gas"), "gas");
    }

    #[test]
    fn test_lemma_is_a_fixed_point() {
        let lexicon = Lexicon::english().unwrap();
        let words = [
            "prizes", "parties", "matches", "glasses", "children", "data", "mens", "datas",
            "wolves", "series", "bonuses", "others", "aches", "quizzes", "iphones", "texts",
        ];

        for word in words {
            let once = lexicon.lemma(word).into_owned();
            assert_eq!(lexicon.lemma(&once), once, "word: {}", word);
        }
    }

    #[test]
    fn test_chains_are_resolved() {
        let lexicon = Lexicon::parse("the\n", "aa bb\nbb cc\n").unwrap();

        assert_eq!(lexicon.lemma("aa"), "cc");
        assert_eq!(lexicon.lemma("bb"), "cc");
        assert_eq!(lexicon.lemma("cc"), "cc");
    }

    #[test]
    fn test_cycle_is_rejected() {
        let err = Lexicon::parse("", "aa bb\nbb aa\n").unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn test_malformed_lemma_line_is_rejected() {
        assert!(Lexicon::parse("", "only-one-field\n").is_err());
        assert!(Lexicon::parse("", "caf\u{e9}s caf\u{e9}\n").is_err());
        assert!(Lexicon::parse("", "=two words\n").is_err());
    }

    #[test]
    fn test_overrides_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let stopwords = dir.path().join("stop.txt");
        let lemmas = dir.path().join("lemmas.txt");
        std::fs::write(&stopwords, "# custom\nfoo\nbar\n").unwrap();
        std::fs::write(&lemmas, "geese goose\n").unwrap();

        let lexicon = Lexicon::from_config(&LexiconConfig {
            stopwords_path: Some(stopwords),
            lemmas_path: Some(lemmas),
        })
        .unwrap();

        assert_eq!(lexicon.stopword_count(), 2);
        assert!(lexicon.is_stopword("foo"));
        assert!(!lexicon.is_stopword("the"));
        assert_eq!(lexicon.lemma("geese"), "goose");
    }

    #[test]
    fn test_missing_override_file() {
        let config = LexiconConfig {
            stopwords_path: Some(PathBuf::from("/nonexistent/stopwords.txt")),
            lemmas_path: None,
        };
        assert!(matches!(
            Lexicon::from_config(&config),
            Err(AppError::Configuration(_))
        ));
    }
}
