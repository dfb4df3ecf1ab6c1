// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Tokenization for model-agnostic token handling.
//!
//! [`VocabTokenizer`] is a small curated word list with a printable-ASCII
//! fallback. It satisfies the [`Tokenizer`] contract the generation loop
//! relies on; a real subword tokenizer can be swapped in behind the trait.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

pub const PAD_ID: u32 = 0;
pub const UNK_ID: u32 = 1;
pub const BOS_ID: u32 = 2;
pub const EOS_ID: u32 = 3;

const SPECIAL_TOKENS: [&str; 4] = ["<pad>", "<unk>", "<s>", "</s>"];

/// Surface prefix marking a token that attaches to the previous one.
pub const CONTINUATION_PREFIX: &str = "##";

const BUILTIN_WORDS: &[&str] = &[
    "the", "a", "an", "to", "and", "or", "of", "in", "on", "at", "by", "for", "from", "with",
    "about", "i", "you", "your", "me", "my", "we", "our", "it", "this", "that", "is", "are",
    "be", "will", "can", "do", "does", "have", "has", "not", "no", "yes", "if", "all", "any",
    "some", "more", "less", "than", "here", "there", "what", "which", "how", "much", "when",
    "where", "today", "now", "get", "use", "try", "let", "know", "help", "hello", "hi",
    "thanks", "thank", "please", "sorry", "sure", "save", "savings", "coupon", "coupons",
    "code", "codes", "discount", "discounts", "deal", "deals", "off", "percent", "free",
    "shipping", "order", "cart", "price", "store", "shop", "best", "find", "found", "apply",
    "applied", "valid", "expired", "expires", "minimum", "purchase", "total", "item", "items",
    "sale", "offer", "offers", "checkout", "worked", "works", "verified", "success", "rate",
    "new", "first", "top", "up", "out",
];

#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("Failed to read vocabulary: {0}")]
    Io(#[from] std::io::Error),

    #[error("Vocabulary is empty")]
    EmptyVocabulary,
}

/// Text ↔ token id contract used by the generation loop.
///
/// Neither direction fails: unknown input degrades to the UNK id and
/// unknown ids are skipped on decode.
pub trait Tokenizer: Send + Sync {
    /// Encode text. Always starts with BOS and ends with EOS.
    fn encode(&self, text: &str) -> Vec<u32>;

    /// Decode ids, dropping BOS/EOS and skipping unknown ids.
    fn decode(&self, ids: &[u32]) -> String;

    fn bos_id(&self) -> u32;

    fn eos_id(&self) -> u32;

    fn vocab_size(&self) -> usize;

    /// Text contributed by `token` when appended after `previous`.
    ///
    /// Concatenating the fragments of a sequence yields its full decode.
    fn decode_incremental(&self, previous: &[u32], token: u32) -> String {
        let before = self.decode(previous);
        let mut all = Vec::with_capacity(previous.len() + 1);
        all.extend_from_slice(previous);
        all.push(token);
        let after = self.decode(&all);
        match after.strip_prefix(before.as_str()) {
            Some(fragment) => fragment.to_string(),
            None => after,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    Special(&'static str),
    Word(String),
    Continuation(char),
}

/// Bijection between token ids and surface strings.
///
/// Ids 0..=3 are always pad, unknown, beginning- and end-of-sequence.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    entries: Vec<Entry>,
    words: HashMap<String, u32>,
    continuations: HashMap<char, u32>,
}

impl Vocabulary {
    /// Build a vocabulary from a word list plus the ASCII fallback.
    ///
    /// Words are case-folded; duplicates, empty entries, entries containing
    /// whitespace and entries shaped like special or continuation tokens are
    /// ignored.
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vocab = Self {
            entries: SPECIAL_TOKENS.iter().map(|&s| Entry::Special(s)).collect(),
            words: HashMap::new(),
            continuations: HashMap::new(),
        };

        for word in words {
            let word = normalize(word.as_ref());
            let word = word.trim();
            if word.is_empty()
                || word.contains(char::is_whitespace)
                || word.starts_with(CONTINUATION_PREFIX)
                || SPECIAL_TOKENS.iter().any(|s| *s == word)
            {
                continue;
            }
            vocab.push_word(word);
        }

        for c in (0x21u8..=0x7e).map(char::from) {
            vocab.push_word(&c.to_string());
        }
        for c in (0x21u8..=0x7e).map(char::from) {
            let id = vocab.next_id();
            vocab.entries.push(Entry::Continuation(c));
            vocab.continuations.insert(c, id);
        }

        vocab
    }

    /// The built-in shopping-assistant vocabulary.
    pub fn builtin() -> Self {
        Self::from_words(BUILTIN_WORDS.iter().copied())
    }

    /// Load a newline-separated word list.
    pub fn from_words_file(path: &Path) -> Result<Self, TokenizerError> {
        let content = std::fs::read_to_string(path)?;
        let words: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
        if words.is_empty() {
            return Err(TokenizerError::EmptyVocabulary);
        }
        Ok(Self::from_words(words))
    }

    fn next_id(&self) -> u32 {
        self.entries.len() as u32
    }

    fn push_word(&mut self, word: &str) {
        if self.words.contains_key(word) {
            return;
        }
        let id = self.next_id();
        self.entries.push(Entry::Word(word.to_string()));
        self.words.insert(word.to_string(), id);
    }

    /// Id of a whole word, if present.
    pub fn word_id(&self, word: &str) -> Option<u32> {
        self.words.get(word).copied()
    }

    /// Surface form of an id. Continuation tokens carry the `##` prefix.
    pub fn token(&self, id: u32) -> Option<String> {
        self.entries.get(id as usize).map(|entry| match entry {
            Entry::Special(s) => (*s).to_string(),
            Entry::Word(w) => w.clone(),
            Entry::Continuation(c) => format!("{}{}", CONTINUATION_PREFIX, c),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn encode_segment(&self, segment: &str, out: &mut Vec<u32>) {
        if let Some(id) = self.word_id(segment) {
            out.push(id);
            return;
        }
        for (i, c) in segment.chars().enumerate() {
            let id = if i == 0 {
                let mut buf = [0u8; 4];
                self.word_id(c.encode_utf8(&mut buf))
            } else {
                self.continuations.get(&c).copied()
            };
            out.push(id.unwrap_or(UNK_ID));
        }
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::builtin()
    }
}

fn normalize(text: &str) -> String {
    text.nfkc().collect::<String>().to_lowercase()
}

/// Word-level tokenizer over a [`Vocabulary`].
#[derive(Debug, Clone, Default)]
pub struct VocabTokenizer {
    vocab: Vocabulary,
}

impl VocabTokenizer {
    pub fn new(vocab: Vocabulary) -> Self {
        Self { vocab }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Whether `id` contributes text to a decode.
    fn is_visible(&self, id: u32) -> bool {
        id != BOS_ID && id != EOS_ID && (id as usize) < self.vocab.entries.len()
    }
}

impl Tokenizer for VocabTokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        let normalized = normalize(text);
        let mut ids = vec![BOS_ID];
        for segment in normalized.split_whitespace() {
            self.vocab.encode_segment(segment, &mut ids);
        }
        ids.push(EOS_ID);
        ids
    }

    fn decode(&self, ids: &[u32]) -> String {
        let mut text = String::new();
        for &id in ids {
            if id == BOS_ID || id == EOS_ID {
                continue;
            }
            match self.vocab.entries.get(id as usize) {
                Some(Entry::Continuation(c)) => text.push(*c),
                Some(Entry::Word(w)) => push_word(&mut text, w),
                Some(Entry::Special(s)) => push_word(&mut text, s),
                None => {}
            }
        }
        text
    }

    /// Looks only at `token` and whether anything visible precedes it.
    fn decode_incremental(&self, previous: &[u32], token: u32) -> String {
        if token == BOS_ID || token == EOS_ID {
            return String::new();
        }
        let surface = match self.vocab.entries.get(token as usize) {
            Some(Entry::Continuation(c)) => return c.to_string(),
            Some(Entry::Word(w)) => w.as_str(),
            Some(Entry::Special(s)) => *s,
            None => return String::new(),
        };
        if previous.iter().rev().any(|&id| self.is_visible(id)) {
            format!(" {}", surface)
        } else {
            surface.to_string()
        }
    }

    fn bos_id(&self) -> u32 {
        BOS_ID
    }

    fn eos_id(&self) -> u32 {
        EOS_ID
    }

    fn vocab_size(&self) -> usize {
        self.vocab.len()
    }
}

fn push_word(text: &mut String, word: &str) {
    if !text.is_empty() {
        text.push(' ');
    }
    text.push_str(word);
}
