use log::{debug, info};
use rayon::prelude::*;

use crate::config::{Approach, BuildConfig, CancelToken};
use crate::encoder::{encode_with_fallback, TokenEncoder};
use crate::error::EmbedResult;
use crate::representer::{represent_checked, resolve_layer, Representer};
use crate::table::{Row, StaticTable, TableMeta, Unrepresentable};
use crate::util::{log_table_summary, progress_bar};
use crate::vocabulary::Vocabulary;

/// Builds a static table by encoding each vocabulary word in isolation and
/// pooling its subword vectors.
///
/// Words are processed independently in parallel. A word whose encoding or
/// representation fails gets an [`Unrepresentable`] row; the build itself only
/// fails when the configured layer does not exist.
pub struct DecontextualizedBuilder<'a, E: ?Sized, R: ?Sized> {
    encoder: &'a E,
    representer: &'a R,
    config: BuildConfig,
    cancel: CancelToken,
}

impl<'a, E, R> DecontextualizedBuilder<'a, E, R>
where
    E: TokenEncoder + ?Sized,
    R: Representer + ?Sized,
{
    pub fn new(encoder: &'a E, representer: &'a R, config: BuildConfig) -> Self {
        DecontextualizedBuilder {
            encoder,
            representer,
            config,
            cancel: CancelToken::default(),
        }
    }

    /// Stops issuing model calls once `cancel` fires; remaining words are
    /// marked [`Unrepresentable::Cancelled`].
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn build(&self, vocab: &Vocabulary) -> EmbedResult<StaticTable> {
        let layer = resolve_layer(self.config.layer, self.representer.num_layers())?;
        info!(
            "Building decontextualized table for {} words at layer {}",
            vocab.len(),
            layer
        );

        let pb = progress_bar(vocab.len() as u64, self.config.verbose);
        let rows: Vec<Row> = vocab
            .words()
            .par_iter()
            .map(|word| {
                let row = if self.cancel.is_cancelled() {
                    Row::Unrepresentable(Unrepresentable::Cancelled)
                } else {
                    self.represent_word(word, layer).into()
                };
                pb.inc(1);
                row
            })
            .collect();
        pb.finish_and_clear();

        let meta = TableMeta {
            approach: Approach::Decontextualized,
            pooling: self.config.pooling,
            requested_layer: self.config.layer,
            layer,
        };
        let words = vocab.words().iter().cloned();
        let table = StaticTable::assemble(meta, self.representer.dim(), words.zip(rows));
        log_table_summary(&table);
        Ok(table)
    }

    /// The pooled vector of `word` encoded on its own, read at `layer`.
    pub fn represent_word(&self, word: &str, layer: usize) -> EmbedResult<Vec<f32>> {
        let ids = encode_with_fallback(self.encoder, word, self.config.unknown)?;
        debug!("{:?} -> {:?}", word, ids);
        let reps = represent_checked(self.representer, &ids, layer, word)?;
        self.config.pooling.apply(&reps)
    }
}
