use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::Result;
use flate2::read::GzDecoder;

use crate::loader::CorpusSource;
use crate::parser::{RecordFormat, TextParser};

pub struct GzTextLoader {
    filepath: PathBuf,
    format: RecordFormat,
}

impl GzTextLoader {
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

impl CorpusSource for GzTextLoader {
    type Iter = TextParser<GzDecoder<File>>;

    fn iter(&self) -> Result<TextParser<GzDecoder<File>>> {
        let reader = GzDecoder::new(File::open(&self.filepath)?);
        Ok(TextParser::new(BufReader::new(reader), self.format))
    }
}
