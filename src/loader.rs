mod flate2;
mod plain;
mod zstd;

use std::path::Path;

use anyhow::Result;

use crate::parser::RecordFormat;

pub use crate::loader::flate2::GzTextLoader;
pub use crate::loader::plain::{TextFileLoader, TextLoader};
pub use crate::loader::zstd::ZstdTextLoader;

/// Source of corpus texts.
pub trait CorpusSource {
    type Iter: Iterator<Item = Result<String>>;

    /// Returns an iterator over fallible texts, in corpus order.
    fn iter(&self) -> Result<Self::Iter>;

    /// Reads every text, failing on the first bad record.
    fn collect_texts(&self) -> Result<Vec<String>> {
        self.iter()?.collect()
    }
}

/// Reads all texts of `path`, picking decompression from the `.gz` / `.zst`
/// extension and the record format from the remaining name unless `format`
/// is given.
pub fn load_texts<P: AsRef<Path>>(path: P, format: Option<RecordFormat>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let format = format.unwrap_or_else(|| RecordFormat::from_path(path));
    match path.extension().and_then(|s| s.to_str()) {
        Some("gz") => GzTextLoader::new(path, format).collect_texts(),
        Some("zst") => ZstdTextLoader::new(path, format).collect_texts(),
        _ => TextFileLoader::new(path, format).collect_texts(),
    }
}
