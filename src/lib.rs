//! Static word vectors from contextual language models.
//!
//! A [`StaticTable`] holds one fixed vector per vocabulary word, derived from
//! a [`Representer`]'s hidden states either by encoding each word on its own
//! ([`DecontextualizedBuilder`]) or by pooling the word's occurrences across
//! a corpus ([`AggregatedBuilder`]). Tokenizers and models are injected
//! through the [`TokenEncoder`] and [`Representer`] traits.

pub mod aggregated;
pub mod config;
pub mod decontextualized;
pub mod encoder;
pub mod error;
pub mod loader;
pub mod parser;
pub mod pooling;
pub mod representer;
pub mod spans;
pub mod table;
pub mod util;
pub mod vocabulary;

pub use aggregated::{AggregatedBuilder, AggregatedOutput};
pub use config::{Approach, BuildConfig, CancelToken};
pub use decontextualized::DecontextualizedBuilder;
pub use encoder::{HfEncoder, TokenEncoder, UnknownPolicy};
pub use error::{EmbedError, EmbedResult};
pub use pooling::Pooling;
pub use representer::{Representer, WindowedEmbeddingModel};
pub use spans::{find_spans, Span};
pub use table::{Row, StaticTable, Unrepresentable};
pub use vocabulary::Vocabulary;
