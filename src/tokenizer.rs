use jieba_rs::Jieba;
use regex::Regex;

pub trait Tokenizer {
    /// Splits `text` into word tokens, in reading order.
    fn segment<'a>(&'a self, text: &'a str) -> Vec<&'a str>;
}

/// Segments Chinese with jieba; Latin words and digit runs come out whole.
pub struct ChineseTokenizer {
    // runs of CJK ideographs, ASCII letters and digits; everything else separates words
    regex: Regex,
    pub jieba: Jieba,
    pub hmm: bool,
}

impl Default for ChineseTokenizer {
    fn default() -> Self {
        let regex = Regex::new("[\\x{4e00}-\\x{9fa5}A-Za-z0-9]+")
            .expect("Unable to compile tokenization regex");

        ChineseTokenizer {
            regex,
            jieba: Jieba::new(),
            hmm: true,
        }
    }
}

impl std::fmt::Debug for ChineseTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChineseTokenizer")
            .field("regex", &self.regex)
            .field("hmm", &self.hmm)
            .finish_non_exhaustive()
    }
}

impl ChineseTokenizer {
    /// Adds a word to the segmentation dictionary so it is never split.
    pub fn with_word(mut self, word: &str) -> Self {
        self.jieba.add_word(word, None, None);
        self
    }

    /// Toggles HMM discovery of words missing from the dictionary.
    pub fn with_hmm(mut self, value: bool) -> Self {
        self.hmm = value;
        self
    }
}

impl Tokenizer for ChineseTokenizer {
    fn segment<'a>(&'a self, text: &'a str) -> Vec<&'a str> {
        self.regex
            .find_iter(text)
            .map(|mat| mat.as_str())
            .flat_map(|run| self.jieba.cut(run, self.hmm))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .collect()
    }
}

/// Plain `\w[\w']*` words, for text without CJK content.
#[derive(Debug)]
pub struct WordTokenizer {
    regex: Regex,
}

impl Default for WordTokenizer {
    fn default() -> Self {
        WordTokenizer {
            regex: Regex::new("\\w[\\w']*").expect("Unable to compile tokenization regex"),
        }
    }
}

impl Tokenizer for WordTokenizer {
    fn segment<'a>(&'a self, text: &'a str) -> Vec<&'a str> {
        self.regex.find_iter(text).map(|mat| mat.as_str()).collect()
    }
}
