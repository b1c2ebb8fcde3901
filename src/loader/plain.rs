use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::loader::CorpusSource;
use crate::parser::{RecordFormat, TextParser};

pub struct TextFileLoader {
    filepath: PathBuf,
    format: RecordFormat,
}

impl TextFileLoader {
    pub fn new<P>(filepath: P, format: RecordFormat) -> Self
    where
        P: AsRef<Path>,
    {
        Self {
            filepath: PathBuf::from(filepath.as_ref()),
            format,
        }
    }
}

impl CorpusSource for TextFileLoader {
    type Iter = TextParser<File>;

    fn iter(&self) -> Result<TextParser<File>> {
        let reader = BufReader::new(File::open(&self.filepath)?);
        Ok(TextParser::new(reader, self.format))
    }
}

/// In-memory corpus.
pub struct TextLoader<'a> {
    text: &'a [u8],
    format: RecordFormat,
}

impl<'a> TextLoader<'a> {
    pub const fn new(text: &'a [u8], format: RecordFormat) -> Self {
        Self { text, format }
    }
}

impl<'a> CorpusSource for TextLoader<'a> {
    type Iter = TextParser<&'a [u8]>;

    fn iter(&self) -> Result<TextParser<&'a [u8]>> {
        let reader = BufReader::new(self.text);
        Ok(TextParser::new(reader, self.format))
    }
}
