use log::{debug, info, log_enabled, warn, Level};
use rayon::prelude::*;

use crate::config::{Approach, BuildConfig, CancelToken};
use crate::encoder::TokenEncoder;
use crate::error::{EmbedError, EmbedResult};
use crate::representer::{represent_checked, resolve_layer, Representer};
use crate::spans::find_spans;
use crate::table::{Row, StaticTable, TableMeta, Unrepresentable};
use crate::util::{log_table_summary, progress_bar};
use crate::vocabulary::Vocabulary;

/// A corpus text after encoding, with its hidden vectors at one layer.
#[derive(Clone, Debug)]
pub struct EncodedText {
    pub ids: Vec<u32>,
    pub reps: Vec<Vec<f32>>,
}

/// A corpus text that could not be encoded or represented.
#[derive(Debug)]
pub struct TextFailure {
    /// Position of the text in the corpus.
    pub index: usize,
    pub error: EmbedError,
}

/// Result of an aggregated build.
#[derive(Debug)]
pub struct AggregatedOutput {
    pub table: StaticTable,
    /// Texts left out of the aggregation, in corpus order.
    pub failed_texts: Vec<TextFailure>,
}

/// Builds a static table by pooling every in-context occurrence of each word
/// across a corpus.
///
/// Each word is encoded on its own, without boundary markers, to obtain its
/// token-id target. Every
/// exact occurrence of that target in an encoded corpus text is pooled into
/// an occurrence vector, and the occurrence vectors are pooled again into the
/// word's row. Occurrences are gathered in corpus order, then span order, so
/// the result does not depend on how the work was scheduled.
///
/// Matching is on token ids only: a word split differently in context (case,
/// adjacent punctuation) is not found.
///
/// A word that encodes to nothing, or only to the unknown token, is marked
/// [`Unrepresentable::Unencodable`] whatever the configured
/// [`UnknownPolicy`](crate::UnknownPolicy): its target would otherwise match
/// every unknown token in the corpus.
pub struct AggregatedBuilder<'a, E: ?Sized, R: ?Sized> {
    encoder: &'a E,
    representer: &'a R,
    config: BuildConfig,
    cancel: CancelToken,
}

impl<'a, E, R> AggregatedBuilder<'a, E, R>
where
    E: TokenEncoder + ?Sized,
    R: Representer + ?Sized,
{
    pub fn new(encoder: &'a E, representer: &'a R, config: BuildConfig) -> Self {
        AggregatedBuilder {
            encoder,
            representer,
            config,
            cancel: CancelToken::default(),
        }
    }

    /// Stops issuing model calls once `cancel` fires; words not yet
    /// aggregated are marked [`Unrepresentable::Cancelled`].
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn build<S: AsRef<str> + Sync>(&self, vocab: &Vocabulary, corpus: &[S]) -> EmbedResult<AggregatedOutput> {
        let layer = resolve_layer(self.config.layer, self.representer.num_layers())?;
        info!(
            "Building aggregated table for {} words over {} texts at layer {}",
            vocab.len(),
            corpus.len(),
            layer
        );

        let (encoded, failed_texts) = self.encode_corpus(corpus, layer);
        for failure in &failed_texts {
            warn!("Skipping text {}: {}", failure.index, failure.error);
        }

        let pb = progress_bar(vocab.len() as u64, self.config.verbose);
        let rows: Vec<Row> = vocab
            .words()
            .par_iter()
            .map(|word| {
                let row = if self.cancel.is_cancelled() {
                    Row::Unrepresentable(Unrepresentable::Cancelled)
                } else {
                    self.aggregate_word(word, &encoded).into()
                };
                pb.inc(1);
                row
            })
            .collect();
        pb.finish_and_clear();

        let meta = TableMeta {
            approach: Approach::Aggregated,
            pooling: self.config.pooling,
            requested_layer: self.config.layer,
            layer,
        };
        let words = vocab.words().iter().cloned();
        let table = StaticTable::assemble(meta, self.representer.dim(), words.zip(rows));
        log_table_summary(&table);
        Ok(AggregatedOutput { table, failed_texts })
    }

    /// Encodes and represents every text, in parallel, keeping corpus order.
    fn encode_corpus<S: AsRef<str> + Sync>(&self, corpus: &[S], layer: usize) -> (Vec<EncodedText>, Vec<TextFailure>) {
        let results: Vec<Option<EmbedResult<EncodedText>>> = corpus
            .par_iter()
            .map(|text| {
                if self.cancel.is_cancelled() {
                    None
                } else {
                    Some(self.encode_text(text.as_ref(), layer))
                }
            })
            .collect();

        let mut encoded = Vec::with_capacity(results.len());
        let mut failed = Vec::new();
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Some(Ok(text)) => encoded.push(text),
                Some(Err(error)) => failed.push(TextFailure { index, error }),
                None => {}
            }
        }
        (encoded, failed)
    }

    fn encode_text(&self, text: &str, layer: usize) -> EmbedResult<EncodedText> {
        let ids = self
            .encoder
            .encode(text)
            .map_err(|e| EmbedError::external(text, e))?;
        let reps = if ids.is_empty() {
            Vec::new()
        } else {
            represent_checked(self.representer, &ids, layer, text)?
        };
        Ok(EncodedText { ids, reps })
    }

    /// The token ids searched for in the corpus.
    pub fn search_target(&self, word: &str) -> EmbedResult<Vec<u32>> {
        let target = self
            .encoder
            .encode_word(word)
            .map_err(|e| EmbedError::external(word, e))?;
        let unknown = self.encoder.unknown_id();
        if target.iter().all(|&id| Some(id) == unknown) {
            return Err(EmbedError::UnencodableInput {
                text: word.to_string(),
            });
        }
        Ok(target)
    }

    /// Pools each occurrence of `word` in `encoded`, then pools the occurrences.
    pub fn aggregate_word(&self, word: &str, encoded: &[EncodedText]) -> EmbedResult<Vec<f32>> {
        let target = self.search_target(word)?;
        if log_enabled!(Level::Debug) {
            let pieces = self.encoder.decode(&target).unwrap_or_default();
            debug!("{:?} -> {:?} {:?}", word, target, pieces);
        }

        let occurrences = occurrence_vectors(&target, encoded, &self.config)?;
        debug!("{:?}: {} occurrences", word, occurrences.len());
        self.config.pooling.apply(&occurrences)
    }
}

/// One pooled vector per occurrence of `target`, in corpus then span order.
pub fn occurrence_vectors(target: &[u32], encoded: &[EncodedText], config: &BuildConfig) -> EmbedResult<Vec<Vec<f32>>> {
    let mut occurrences = Vec::new();
    for text in encoded {
        for span in find_spans(target, &text.ids) {
            occurrences.push(config.pooling.apply(&text.reps[span.range()])?);
        }
    }
    Ok(occurrences)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::testing::FakeEncoder;
    use crate::encoder::UnknownPolicy;
    use crate::pooling::Pooling;
    use crate::representer::testing::{toy_model, PoisonedModel};
    use crate::representer::WindowedEmbeddingModel;

    fn encoder() -> FakeEncoder {
        // ids: # = 1, sail = 2, boat = 3, water = 4, big = 5
        FakeEncoder::new(&["#", "sail", "boat", "water", "big"])
    }

    fn vocab(words: &[&str]) -> Vocabulary {
        Vocabulary::build(words.iter().copied()).unwrap()
    }

    fn config(pooling: Pooling, layer: isize) -> BuildConfig {
        BuildConfig {
            layer,
            pooling,
            ..BuildConfig::default()
        }
    }

    #[test]
    fn averages_occurrences_across_texts() {
        let model = toy_model(8, 2);
        let encoder = encoder();
        let corpus = ["big boat", "boat water", "sail"];

        let output = AggregatedBuilder::new(&encoder, &model, config(Pooling::Mean, 1))
            .build(&vocab(&["boat"]), &corpus)
            .unwrap();
        assert!(output.failed_texts.is_empty());

        // layer 1 "boat" in [5, 3] -> [4, 40]; in [3, 4] -> [3.5, 35].
        assert_eq!(output.table.vector("boat"), Some(&[3.75, 37.5][..]));
    }

    #[test]
    fn multi_token_targets_are_pooled_per_occurrence() {
        let model = toy_model(8, 2);
        let encoder = encoder();
        let corpus = ["#sail boat #sail"];

        let output = AggregatedBuilder::new(&encoder, &model, config(Pooling::Max, 0))
            .build(&vocab(&["#sail"]), &corpus)
            .unwrap();
        // ids [1, 2, 3, 1, 2]; both spans max-pool to [2, 20].
        assert_eq!(output.table.vector("#sail"), Some(&[2.0, 20.0][..]));
    }

    #[test]
    fn absent_word_is_unrepresentable() {
        let model = toy_model(8, 2);
        let encoder = encoder();
        let output = AggregatedBuilder::new(&encoder, &model, BuildConfig::default())
            .build(&vocab(&["boat", "water"]), &["big boat"])
            .unwrap();
        assert!(output.table.vector("boat").is_some());
        assert_eq!(
            output.table.get("water"),
            Some(&Row::Unrepresentable(Unrepresentable::NoOccurrences))
        );
    }

    #[test]
    fn unknown_words_are_not_matched() {
        let model = toy_model(8, 2);
        let encoder = encoder();
        // "kayak" and "rowing" both encode to the unknown id 0.
        let corpus = ["kayak boat", "rowing water"];
        let strict = BuildConfig {
            unknown: UnknownPolicy::Reject,
            ..BuildConfig::default()
        };

        for config in [BuildConfig::default(), strict] {
            let output = AggregatedBuilder::new(&encoder, &model, config)
                .build(&vocab(&["kayak", "", "boat"]), &corpus)
                .unwrap();
            assert_eq!(
                output.table.get("kayak"),
                Some(&Row::Unrepresentable(Unrepresentable::Unencodable))
            );
            assert_eq!(
                output.table.get(""),
                Some(&Row::Unrepresentable(Unrepresentable::Unencodable))
            );
            assert!(output.table.vector("boat").is_some());
        }
    }

    #[test]
    fn target_may_contain_unknown_pieces() {
        let encoder = encoder();
        let model = toy_model(8, 2);
        let builder = AggregatedBuilder::new(&encoder, &model, BuildConfig::default());
        // "#kayak" -> [1, 0]: only fully unknown targets are rejected.
        assert_eq!(builder.search_target("#kayak").unwrap(), vec![1, 0]);
        assert!(matches!(
            builder.search_target("kayak"),
            Err(EmbedError::UnencodableInput { .. })
        ));
    }

    #[test]
    fn failing_text_is_skipped() {
        let model = PoisonedModel {
            inner: toy_model(8, 2),
            poison: 4,
        };
        let encoder = encoder();
        let corpus = ["boat", "boat water", "big boat"];

        let output = AggregatedBuilder::new(&encoder, &model, config(Pooling::Mean, 0))
            .build(&vocab(&["boat"]), &corpus)
            .unwrap();
        assert_eq!(output.failed_texts.len(), 1);
        assert_eq!(output.failed_texts[0].index, 1);
        assert_eq!(output.table.vector("boat"), Some(&[3.0, 30.0][..]));
    }

    #[test]
    fn occurrences_follow_corpus_order() {
        let model = WindowedEmbeddingModel::new(
            vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0], vec![4.0]],
            1,
        )
        .unwrap();
        let encoded = ["sail boat", "boat", "water boat"]
            .iter()
            .map(|t| {
                let ids = encoder().encode(t).unwrap();
                let reps = model.represent(&ids, 1).unwrap();
                EncodedText { ids, reps }
            })
            .collect::<Vec<_>>();

        let occurrences = occurrence_vectors(&[3], &encoded, &config(Pooling::Last, 1)).unwrap();
        assert_eq!(occurrences, vec![vec![2.5], vec![3.0], vec![3.5]]);

        // Last pooling across occurrences picks the final text's.
        let pooled = AggregatedBuilder::new(&encoder(), &model, config(Pooling::Last, 1))
            .aggregate_word("boat", &encoded)
            .unwrap();
        assert_eq!(pooled, vec![3.5]);
    }

    #[test]
    fn rebuild_is_deterministic() {
        let model = toy_model(8, 2);
        let encoder = encoder();
        let corpus: Vec<String> = (0..200)
            .map(|i| match i % 3 {
                0 => "big boat water".to_string(),
                1 => "boat sail boat".to_string(),
                _ => "water #sail big".to_string(),
            })
            .collect();
        let vocab = vocab(&["boat", "water", "#sail", "big", "sail"]);

        for pooling in [Pooling::Mean, Pooling::Max, Pooling::Min, Pooling::Last] {
            let builder = AggregatedBuilder::new(&encoder, &model, config(pooling, 2));
            let first = builder.build(&vocab, &corpus).unwrap().table;
            let second = builder.build(&vocab, &corpus).unwrap().table;
            assert_eq!(first, second);
            assert!(first.is_complete());
        }
    }

    #[test]
    fn cancelled_build_marks_rows() {
        let model = toy_model(8, 2);
        let encoder = encoder();
        let cancel = CancelToken::new();
        cancel.cancel();
        let output = AggregatedBuilder::new(&encoder, &model, BuildConfig::default())
            .with_cancel(cancel)
            .build(&vocab(&["boat"]), &["boat"])
            .unwrap();
        assert!(output.failed_texts.is_empty());
        assert_eq!(
            output.table.get("boat"),
            Some(&Row::Unrepresentable(Unrepresentable::Cancelled))
        );
    }
}
