use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::Result;
use zstd::stream::read::Decoder;

use crate::loader::CorpusSource;
use crate::parser::{RecordFormat, TextParser};

pub struct ZstdTextLoader {
    filepath: PathBuf,
    format: RecordFormat,
}

impl ZstdTextLoader {
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

impl CorpusSource for ZstdTextLoader {
    type Iter = TextParser<Decoder<'static, BufReader<File>>>;

    fn iter(&self) -> Result<Self::Iter> {
        let reader = Decoder::new(File::open(&self.filepath)?)?;
        Ok(TextParser::new(BufReader::new(reader), self.format))
    }
}
