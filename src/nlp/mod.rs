//! Text normalization for spam classification
//!
//! Raw message text is cleaned (URLs, emails, digits and punctuation removed),
//! lowercased, stripped of stopwords and reduced to noun lemmas. The stopword
//! set and lemma table form the [`Lexicon`], loaded once from bundled data
//! files and injected into the [`TextNormalizer`].

pub mod lexicon;
pub mod normalizer;

pub use lexicon::{Lexicon, LexiconConfig};
pub use normalizer::{clean_text, TextNormalizer};
