use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
};
use stderrlog::{LogLevelNum, Timestamp};

use staticvsm::{
    loader::load_texts, parser::RecordFormat, AggregatedBuilder, BuildConfig,
    DecontextualizedBuilder, HfEncoder, Pooling, StaticTable, TokenEncoder, UnknownPolicy,
    Vocabulary, WindowedEmbeddingModel,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(flatten)]
    log: LogArgs,

    #[command(subcommand)]
    command: Command,
}

/// Logging setup arg group.
#[derive(clap::Args, Debug)]
struct LogArgs {
    /// Silence log messages
    #[arg(short, long, global = true)]
    quiet: bool,

    /// More log output (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Timestamp log lines
    #[arg(long, global = true)]
    ts: bool,
}

impl LogArgs {
    fn setup_logging(&self) -> Result<()> {
        let level = match self.verbose {
            0 => LogLevelNum::Warn,
            1 => LogLevelNum::Info,
            2 => LogLevelNum::Debug,
            _ => LogLevelNum::Trace,
        };
        stderrlog::new()
            .module(module_path!())
            .quiet(self.quiet)
            .verbosity(level)
            .timestamp(if self.ts {
                Timestamp::Second
            } else {
                Timestamp::Off
            })
            .init()?;
        Ok(())
    }
}

#[derive(clap::Args, Debug)]
struct TokenizerArgs {
    /// HuggingFace tokenizer: a tokenizer.json path or a hub model name
    #[arg(short, long)]
    tokenizer: String,

    /// Surround encoded texts with the model's boundary tokens (corpus search
    /// targets never get them)
    #[arg(long)]
    add_special_tokens: bool,

    /// Token substituted for words that encode to nothing
    #[arg(long)]
    unk_token: Option<String>,
}

impl TokenizerArgs {
    fn load(&self) -> Result<HfEncoder> {
        let encoder = HfEncoder::load(&self.tokenizer)
            .with_context(|| format!("loading tokenizer {}", self.tokenizer))?
            .with_special_tokens(self.add_special_tokens);
        match &self.unk_token {
            Some(token) => encoder.with_unknown_token(token),
            None => Ok(encoder),
        }
    }
}

#[derive(clap::Args, Debug)]
struct BuildArgs {
    #[command(flatten)]
    tokenizer: TokenizerArgs,

    /// Embedding model file (.json or bincode)
    #[arg(short, long)]
    model: PathBuf,

    /// Vocabulary file, one word per line (first tab-separated column)
    #[arg(long)]
    vocab: PathBuf,

    /// Hidden-state layer; negative values count back from the last layer
    #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
    layer: isize,

    /// Pooling function: mean, max, min or last
    #[arg(short, long, default_value_t = Pooling::Mean)]
    pooling: Pooling,

    /// Mark words that encode to nothing as unrepresentable instead of
    /// substituting the unknown token
    #[arg(long)]
    reject_unknown: bool,

    /// Show a progress bar
    #[arg(long)]
    progress: bool,

    /// Output path: .bin (bincode), .json, anything else is TSV
    #[arg(short, long)]
    output: PathBuf,
}

impl BuildArgs {
    fn config(&self) -> BuildConfig {
        BuildConfig {
            layer: self.layer,
            pooling: self.pooling,
            unknown: if self.reject_unknown {
                UnknownPolicy::Reject
            } else {
                UnknownPolicy::Substitute
            },
            verbose: self.progress,
        }
    }

    fn load(&self) -> Result<(HfEncoder, WindowedEmbeddingModel, Vocabulary)> {
        let encoder = self.tokenizer.load()?;
        let model = WindowedEmbeddingModel::from_file(&self.model)
            .with_context(|| format!("loading model {}", self.model.display()))?;
        let vocab = Vocabulary::from_file(&self.vocab)
            .with_context(|| format!("loading vocabulary {}", self.vocab.display()))?;
        Ok((encoder, model, vocab))
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode each vocabulary word on its own and pool its subword vectors
    Decontextualized {
        #[command(flatten)]
        build: BuildArgs,
    },

    /// Pool every occurrence of each vocabulary word across a corpus
    Aggregated {
        #[command(flatten)]
        build: BuildArgs,

        /// Corpus files (.gz and .zst are decompressed)
        #[arg(short, long, required = true, num_args = 1..)]
        corpus: Vec<PathBuf>,

        /// Record format: lines or jsonl (default: guessed from file name)
        #[arg(long)]
        format: Option<RecordFormat>,
    },

    /// Print the subwords and ids of a text
    Tokenize {
        #[command(flatten)]
        tokenizer: TokenizerArgs,

        text: String,
    },
}

fn write_table(table: &StaticTable, path: &Path) -> Result<()> {
    match path.extension().and_then(|s| s.to_str()) {
        Some("bin") => table.save(path)?,
        Some("json") => table.write_json(BufWriter::new(File::create(path)?))?,
        _ => {
            let rows = table.write_tsv(BufWriter::new(File::create(path)?))?;
            info!("Wrote {} rows to {}", rows, path.display());
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    args.log.setup_logging()?;

    match args.command {
        Command::Decontextualized { build } => {
            let (encoder, model, vocab) = build.load()?;
            let table = DecontextualizedBuilder::new(&encoder, &model, build.config()).build(&vocab)?;
            write_table(&table, &build.output)?;
        }
        Command::Aggregated {
            build,
            corpus,
            format,
        } => {
            let (encoder, model, vocab) = build.load()?;
            let mut texts = Vec::new();
            for path in &corpus {
                let loaded = load_texts(path, format)
                    .with_context(|| format!("loading corpus {}", path.display()))?;
                info!("Loaded {} texts from {}", loaded.len(), path.display());
                texts.extend(loaded);
            }
            let output = AggregatedBuilder::new(&encoder, &model, build.config()).build(&vocab, &texts)?;
            write_table(&output.table, &build.output)?;
        }
        Command::Tokenize { tokenizer, text } => {
            let encoder = tokenizer.load()?;
            let ids = encoder.encode(&text)?;
            println!("{}", encoder.tokenize(&text)?.join(" "));
            println!("{:?}", ids);
            println!("{}", encoder.decode(&ids)?.join(" "));
        }
    }
    Ok(())
}
