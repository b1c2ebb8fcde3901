use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::error::{EmbedError, EmbedResult};

/// An ordered list of distinct words. Order fixes the row order of built tables.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Vocabulary {
    words: Vec<String>,
}

impl Vocabulary {
    /// Builds a [`Vocabulary`], failing on the first duplicated word.
    pub fn build<I, S>(words: I) -> EmbedResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut list = Vec::new();
        for word in words {
            let word = word.into();
            if !seen.insert(word.clone()) {
                return Err(EmbedError::DuplicateWord(word));
            }
            list.push(word);
        }
        Ok(Self { words: list })
    }

    /// Reads one word per line, keeping the first tab-separated column so the
    /// row index of an exported count matrix can be used directly. Blank lines
    /// are skipped.
    pub fn from_reader<R: Read>(reader: R) -> EmbedResult<Self> {
        let mut words = Vec::new();
        for line in BufReader::new(reader).lines() {
            let line = line?;
            let word = line.split('\t').next().unwrap_or("");
            if !word.trim().is_empty() {
                words.push(word.to_string());
            }
        }
        Self::build(words)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> EmbedResult<Self> {
        Self::from_reader(File::open(path)?)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(String::as_str)
    }
}
