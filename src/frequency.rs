use std::collections::{HashMap, HashSet};

/// A word selected for the cloud together with its weight.
#[derive(Clone, Debug, PartialEq)]
pub struct Term {
    pub text: String,
    pub weight: f32,
    /// `weight` divided by the largest weight of the set the term was selected in.
    pub relative_size: f32,
}

impl Term {
    pub fn new(text: impl Into<String>, weight: f32) -> Self {
        Term {
            text: text.into(),
            weight,
            relative_size: 1.0,
        }
    }
}

/// Fills in `relative_size` for every term of the set.
pub fn normalize_weights(terms: &mut [Term]) {
    let max_weight = terms.iter().map(|term| term.weight).fold(0.0, f32::max);
    for term in terms.iter_mut() {
        term.relative_size = if max_weight > 0.0 {
            term.weight / max_weight
        } else {
            1.0
        };
    }
}

/// Builds a term list from externally weighted words.
///
/// Words with an empty text or a negative or non-finite weight are skipped; the
/// rest are sorted by weight, heaviest first, keeping input order among ties.
pub fn terms_from_weights<'a, I>(weights: I) -> Vec<Term>
where
    I: IntoIterator<Item = (&'a str, f32)>,
{
    let mut terms: Vec<Term> = weights
        .into_iter()
        .filter(|(text, weight)| !text.is_empty() && weight.is_finite() && *weight >= 0.0)
        .map(|(text, weight)| Term::new(text, weight))
        .collect();

    terms.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    normalize_weights(&mut terms);
    terms
}

/// Turns a token stream into a ranked term list.
#[derive(Clone, Debug)]
pub struct WordCounter {
    pub stopwords: HashSet<String>,
    pub min_word_length: usize,
    pub max_words: usize,
    pub exclude_numbers: bool,
}

impl Default for WordCounter {
    fn default() -> Self {
        WordCounter {
            stopwords: HashSet::new(),
            min_word_length: 0,
            max_words: 200,
            exclude_numbers: true,
        }
    }
}

impl WordCounter {
    /// Stopwords match case-insensitively.
    pub fn with_stopwords<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.stopwords = words
            .into_iter()
            .map(|word| word.as_ref().to_lowercase())
            .collect();
        self
    }

    /// Minimum length in characters, not bytes.
    pub fn with_min_word_length(mut self, size: usize) -> Self {
        self.min_word_length = size;
        self
    }

    /// `0` keeps every term.
    pub fn with_max_words(mut self, size: usize) -> Self {
        self.max_words = size;
        self
    }

    /// Purely numeric tokens are dropped unless this is turned off.
    pub fn with_exclude_numbers(mut self, value: bool) -> Self {
        self.exclude_numbers = value;
        self
    }

    fn keep(&self, token: &str) -> bool {
        if token.is_empty() || token.chars().count() < self.min_word_length {
            return false;
        }
        if self.exclude_numbers && token.chars().all(char::is_numeric) {
            return false;
        }
        self.stopwords.is_empty() || !self.stopwords.contains(&token.to_lowercase())
    }

    /// Counts tokens case-sensitively and ranks them by count, then by first
    /// occurrence.
    pub fn count<'a, I>(&self, tokens: I) -> Vec<Term>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut slots: HashMap<&str, usize> = HashMap::new();
        let mut counts: Vec<(&str, usize)> = vec![];

        for token in tokens.into_iter().filter(|token| self.keep(token)) {
            match slots.get(token) {
                Some(slot) => counts[*slot].1 += 1,
                None => {
                    slots.insert(token, counts.len());
                    counts.push((token, 1));
                }
            }
        }

        // stable, so equal counts stay in first-occurrence order
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        if self.max_words > 0 {
            counts.truncate(self.max_words);
        }

        let mut terms: Vec<Term> = counts
            .into_iter()
            .map(|(text, count)| Term::new(text, count as f32))
            .collect();
        normalize_weights(&mut terms);
        terms
    }
}
