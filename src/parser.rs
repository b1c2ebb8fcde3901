use std::io::{BufRead, BufReader, Lines, Read};
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde_json::Value;

/// How corpus texts are laid out in a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordFormat {
    /// One text per line.
    Lines,
    /// One JSON object per line, text under the `"text"` key.
    Jsonl,
}

impl RecordFormat {
    /// Guesses the format from a file name, ignoring any compression suffix.
    pub fn from_path(path: &std::path::Path) -> Self {
        let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
        let name = name
            .strip_suffix(".gz")
            .or_else(|| name.strip_suffix(".zst"))
            .unwrap_or(name);
        if name.ends_with(".jsonl") || name.ends_with(".json") {
            Self::Jsonl
        } else {
            Self::Lines
        }
    }
}

impl FromStr for RecordFormat {
    type Err = &'static str;

    fn from_str(fmt: &str) -> Result<Self, Self::Err> {
        match fmt {
            "lines" => Ok(Self::Lines),
            "jsonl" => Ok(Self::Jsonl),
            _ => Err("Invalid format"),
        }
    }
}

/// Iterator over the texts of a corpus file. Blank records are skipped.
pub struct TextParser<R> {
    lines: Lines<BufReader<R>>,
    format: RecordFormat,
    line_no: usize,
}

impl<R: Read> TextParser<R> {
    pub fn new(reader: BufReader<R>, format: RecordFormat) -> Self {
        Self {
            lines: reader.lines(),
            format,
            line_no: 0,
        }
    }

    fn parse(&self, line: &str) -> Result<String> {
        match self.format {
            RecordFormat::Lines => Ok(line.to_string()),
            RecordFormat::Jsonl => {
                let row: Value = serde_json::from_str(line)
                    .map_err(|e| anyhow!("Line {}: {}", self.line_no, e))?;
                row["text"]
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| anyhow!("Line {}: no \"text\" string field", self.line_no))
            }
        }
    }
}

impl<R: Read> Iterator for TextParser<R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            return Some(self.parse(&line));
        }
    }
}
