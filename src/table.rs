use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::config::Approach;
use crate::error::{EmbedError, EmbedResult};
use crate::pooling::Pooling;

/// Why a vocabulary word has no vector.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum Unrepresentable {
    /// The encoder produced no ids and no unknown-token fallback applied.
    Unencodable,
    /// The word never occurs in the corpus.
    NoOccurrences,
    DimensionMismatch { expected: usize, found: usize },
    /// The pooled vector contained NaN or infinite components.
    NonFinite,
    /// The encoder or representer failed; holds its message.
    ExternalFailure(String),
    /// The build was cancelled before this word was processed.
    Cancelled,
}

impl From<EmbedError> for Unrepresentable {
    fn from(err: EmbedError) -> Self {
        match err {
            EmbedError::UnencodableInput { .. } => Unrepresentable::Unencodable,
            EmbedError::EmptyPoolingInput => Unrepresentable::NoOccurrences,
            EmbedError::DimensionMismatch { expected, found } => {
                Unrepresentable::DimensionMismatch { expected, found }
            }
            EmbedError::ExternalModel { message, .. } => Unrepresentable::ExternalFailure(message),
            other => Unrepresentable::ExternalFailure(other.to_string()),
        }
    }
}

impl fmt::Display for Unrepresentable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Unrepresentable::Unencodable => write!(f, "unencodable"),
            Unrepresentable::NoOccurrences => write!(f, "no occurrences in corpus"),
            Unrepresentable::DimensionMismatch { expected, found } => {
                write!(f, "dimension {} instead of {}", found, expected)
            }
            Unrepresentable::NonFinite => write!(f, "non-finite components"),
            Unrepresentable::ExternalFailure(message) => write!(f, "model failure: {}", message),
            Unrepresentable::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One table row: a vector, or an explicit marker that none could be built.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub enum Row {
    Computed(Vec<f32>),
    Unrepresentable(Unrepresentable),
}

impl Row {
    pub fn vector(&self) -> Option<&[f32]> {
        match self {
            Row::Computed(v) => Some(v),
            Row::Unrepresentable(_) => None,
        }
    }
}

impl From<EmbedResult<Vec<f32>>> for Row {
    fn from(result: EmbedResult<Vec<f32>>) -> Self {
        match result {
            Ok(v) => Row::Computed(v),
            Err(e) => Row::Unrepresentable(e.into()),
        }
    }
}

/// The configuration a table was built with.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct TableMeta {
    pub approach: Approach,
    pub pooling: Pooling,
    /// Layer as requested, possibly negative.
    pub requested_layer: isize,
    /// Layer index actually read.
    pub layer: usize,
}

/// A static representation table: one row per vocabulary word, in vocabulary
/// order. Every computed row has the table's dimension.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(from = "RawTable")]
pub struct StaticTable {
    meta: TableMeta,
    dim: usize,
    words: Vec<String>,
    rows: Vec<Row>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

/// Serialized form of [`StaticTable`]; the word index is rebuilt on load.
#[derive(Deserialize)]
struct RawTable {
    meta: TableMeta,
    dim: usize,
    words: Vec<String>,
    rows: Vec<Row>,
}

impl From<RawTable> for StaticTable {
    fn from(raw: RawTable) -> Self {
        let mut table = StaticTable {
            meta: raw.meta,
            dim: raw.dim,
            words: raw.words,
            rows: raw.rows,
            index: HashMap::new(),
        };
        table.reindex();
        table
    }
}

impl StaticTable {
    /// Assembles a table from `(word, row)` pairs in vocabulary order.
    ///
    /// Computed rows whose length differs from `dim`, or which hold
    /// non-finite values, are replaced by an unrepresentable marker.
    pub fn assemble<I>(meta: TableMeta, dim: usize, entries: I) -> Self
    where
        I: IntoIterator<Item = (String, Row)>,
    {
        let (words, rows): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .map(|(word, row)| {
                let row = match row {
                    Row::Computed(v) if v.len() != dim => {
                        Row::Unrepresentable(Unrepresentable::DimensionMismatch {
                            expected: dim,
                            found: v.len(),
                        })
                    }
                    Row::Computed(v) if v.iter().any(|x| !x.is_finite()) => {
                        Row::Unrepresentable(Unrepresentable::NonFinite)
                    }
                    row => row,
                };
                (word, row)
            })
            .unzip();

        let mut table = StaticTable {
            meta,
            dim,
            words,
            rows,
            index: HashMap::new(),
        };
        table.reindex();
        table
    }

    fn reindex(&mut self) {
        self.index = self
            .words
            .iter()
            .enumerate()
            .map(|(i, w)| (w.clone(), i))
            .collect();
    }

    pub fn meta(&self) -> &TableMeta {
        &self.meta
    }

    /// Dimension shared by every computed row.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of rows, computed or not.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` iff `self.len() == 0`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn get(&self, word: &str) -> Option<&Row> {
        self.index.get(word).map(|&i| &self.rows[i])
    }

    /// The vector for `word`, if the word is in the table and was representable.
    pub fn vector(&self, word: &str) -> Option<&[f32]> {
        self.get(word).and_then(Row::vector)
    }

    /// Iterates `(word, row)` in vocabulary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Row)> {
        self.words.iter().map(String::as_str).zip(self.rows.iter())
    }

    /// Iterates the words that have no vector, with the reason.
    pub fn unrepresentable(&self) -> impl Iterator<Item = (&str, &Unrepresentable)> {
        self.iter().filter_map(|(w, row)| match row {
            Row::Unrepresentable(reason) => Some((w, reason)),
            Row::Computed(_) => None,
        })
    }

    pub fn num_computed(&self) -> usize {
        self.rows.iter().filter(|r| r.vector().is_some()).count()
    }

    /// Returns `true` if every word has a vector.
    pub fn is_complete(&self) -> bool {
        self.num_computed() == self.len()
    }

    /// Writes the table as bincode.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> EmbedResult<()> {
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, self).map_err(|e| EmbedError::Serialization(format!("{:?}", e)))
    }

    /// Reads a table written by [`StaticTable::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> EmbedResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        bincode::deserialize_from(reader).map_err(|e| EmbedError::Serialization(format!("{:?}", e)))
    }

    /// Writes the table as JSON, unrepresentable rows included.
    pub fn write_json<W: Write>(&self, mut writer: W) -> EmbedResult<()> {
        serde_json::to_writer(&mut writer, self).map_err(|e| EmbedError::Serialization(e.to_string()))?;
        writer.flush()?;
        Ok(())
    }

    /// Writes computed rows as `word\tx0\tx1...` lines. Returns the number of
    /// rows written; unrepresentable rows are skipped.
    pub fn write_tsv<W: Write>(&self, mut writer: W) -> EmbedResult<usize> {
        let mut written = 0;
        for (word, row) in self.iter() {
            match row {
                Row::Computed(v) => {
                    write!(writer, "{}", word)?;
                    for x in v {
                        write!(writer, "\t{}", x)?;
                    }
                    writeln!(writer)?;
                    written += 1;
                }
                Row::Unrepresentable(reason) => warn!("Omitting {:?} from TSV: {}", word, reason),
            }
        }
        writer.flush()?;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn meta() -> TableMeta {
        TableMeta {
            approach: Approach::Decontextualized,
            pooling: Pooling::Mean,
            requested_layer: -1,
            layer: 2,
        }
    }

    fn table() -> StaticTable {
        StaticTable::assemble(
            meta(),
            2,
            vec![
                ("a".to_string(), Row::Computed(vec![1.0, 2.0])),
                ("b".to_string(), Row::Unrepresentable(Unrepresentable::NoOccurrences)),
                ("c".to_string(), Row::Computed(vec![3.5, -1.0])),
            ],
        )
    }

    #[test]
    fn keeps_vocabulary_order() {
        let table = table();
        assert_eq!(table.words(), &["a", "b", "c"]);
        assert_eq!(table.vector("c"), Some(&[3.5, -1.0][..]));
        assert_eq!(table.vector("b"), None);
        assert_eq!(table.get("z"), None);
        assert_eq!(table.num_computed(), 2);
        assert!(!table.is_complete());
    }

    #[test]
    fn marks_bad_rows() {
        let table = StaticTable::assemble(
            meta(),
            2,
            vec![
                ("short".to_string(), Row::Computed(vec![1.0])),
                ("nan".to_string(), Row::Computed(vec![f32::NAN, 0.0])),
            ],
        );
        assert_eq!(
            table.get("short"),
            Some(&Row::Unrepresentable(Unrepresentable::DimensionMismatch {
                expected: 2,
                found: 1
            }))
        );
        assert_eq!(
            table.get("nan"),
            Some(&Row::Unrepresentable(Unrepresentable::NonFinite))
        );
    }

    #[test]
    fn error_reasons() {
        let reason: Unrepresentable = EmbedError::EmptyPoolingInput.into();
        assert_eq!(reason, Unrepresentable::NoOccurrences);
        let reason: Unrepresentable = EmbedError::external("w", anyhow::anyhow!("boom")).into();
        assert_eq!(reason, Unrepresentable::ExternalFailure("boom".to_string()));
    }

    #[test]
    fn tsv_skips_unrepresentable() {
        let mut out = Vec::new();
        assert_eq!(table().write_tsv(&mut out).unwrap(), 2);
        assert_eq!(String::from_utf8(out).unwrap(), "a\t1\t2\nc\t3.5\t-1\n");
    }

    #[test]
    fn save_and_load() {
        let dir = TempDir::new("staticvsm").unwrap();
        let path = dir.path().join("table.bin");
        let table = table();
        table.save(&path).unwrap();

        let loaded = StaticTable::load(&path).unwrap();
        assert_eq!(loaded, table);
        assert_eq!(loaded.vector("a"), Some(&[1.0, 2.0][..]));
        assert_eq!(loaded.meta().layer, 2);
    }

    #[test]
    fn json_marks_unrepresentable() {
        let mut out = Vec::new();
        table().write_json(&mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["rows"][1]["Unrepresentable"], "NoOccurrences");
        assert_eq!(value["meta"]["approach"], "decontextualized");
    }

    #[test]
    fn json_read_back_finds_words() {
        let mut out = Vec::new();
        table().write_json(&mut out).unwrap();
        let read: StaticTable = serde_json::from_slice(&out).unwrap();
        assert_eq!(read, table());
        assert_eq!(read.vector("c"), Some(&[3.5, -1.0][..]));
        assert_eq!(
            read.get("b"),
            Some(&Row::Unrepresentable(Unrepresentable::NoOccurrences))
        );
    }

    /// Accepts a fixed number of bytes, then fails every write.
    struct FullDisk(usize);

    impl Write for FullDisk {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.0 == 0 {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
            }
            let n = buf.len().min(self.0);
            self.0 -= n;
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn json_write_errors_surface() {
        // The buffer holds the whole document until flushed.
        let writer = BufWriter::with_capacity(1 << 16, FullDisk(8));
        assert!(matches!(table().write_json(writer), Err(EmbedError::Io(_))));
    }
}
