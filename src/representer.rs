use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};

use crate::error::{EmbedError, EmbedResult};
use crate::pooling::mean_pooling;

/// Trait for a model producing per-token hidden vectors at a given layer.
pub trait Representer: Send + Sync {
    /// Number of hidden-state layers, the embedding layer (0) included.
    fn num_layers(&self) -> usize;

    /// Dimension of every hidden vector.
    fn dim(&self) -> usize;

    /// Returns one vector per id in `ids`, taken from `layer`.
    fn represent(&self, ids: &[u32], layer: usize) -> Result<Vec<Vec<f32>>>;
}

/// Resolves a possibly negative layer index against a model's depth.
///
/// Negative indices count back from the final layer, so `-1` is the deepest.
pub fn resolve_layer(layer: isize, num_layers: usize) -> EmbedResult<usize> {
    let resolved = if layer < 0 {
        num_layers as isize + layer
    } else {
        layer
    };
    if resolved < 0 || resolved as usize >= num_layers {
        return Err(EmbedError::LayerOutOfRange { layer, num_layers });
    }
    Ok(resolved as usize)
}

/// Calls `representer`, tagging failures with `item` and checking that one
/// vector came back per token.
pub(crate) fn represent_checked<R>(representer: &R, ids: &[u32], layer: usize, item: &str) -> EmbedResult<Vec<Vec<f32>>>
where
    R: Representer + ?Sized,
{
    let reps = representer
        .represent(ids, layer)
        .map_err(|e| EmbedError::external(item, e))?;
    if reps.len() != ids.len() {
        return Err(EmbedError::ExternalModel {
            item: item.to_string(),
            message: format!("{} vectors returned for {} tokens", reps.len(), ids.len()),
        });
    }
    Ok(reps)
}

/// Embedding lookup whose deeper layers average over a widening context
/// window: layer `k` maps position `i` to the mean embedding of positions
/// `i - k ..= i + k`, clipped to the sequence.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct WindowedEmbeddingModel {
    depth: usize,
    embeddings: Vec<Vec<f32>>,
}

impl WindowedEmbeddingModel {
    pub fn new(embeddings: Vec<Vec<f32>>, depth: usize) -> Result<Self> {
        let dim = match embeddings.first() {
            Some(row) if !row.is_empty() => row.len(),
            _ => bail!("Embedding matrix must have at least one non-empty row"),
        };
        if let Some((id, row)) = embeddings.iter().enumerate().find(|(_, r)| r.len() != dim) {
            bail!("Embedding row {} has dimension {}, expected {}", id, row.len(), dim);
        }
        Ok(WindowedEmbeddingModel { depth, embeddings })
    }

    /// Loads a model from JSON (`.json`) or bincode (anything else).
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let model: Self = if path.extension().and_then(|s| s.to_str()) == Some("json") {
            serde_json::from_reader(reader)?
        } else {
            bincode::deserialize_from(reader).map_err(|e| anyhow!("{:?}", e))?
        };
        // Re-validate, the file may not have come from `new`.
        Self::new(model.embeddings, model.depth)
    }

    /// Writes the model as bincode.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, self).map_err(|e| anyhow!("{:?}", e))
    }

    pub fn vocab_size(&self) -> usize {
        self.embeddings.len()
    }

    fn lookup(&self, id: u32) -> Result<&[f32]> {
        self.embeddings
            .get(id as usize)
            .map(Vec::as_slice)
            .ok_or_else(|| anyhow!("Token id {} outside embedding matrix of {} rows", id, self.vocab_size()))
    }
}

impl Representer for WindowedEmbeddingModel {
    fn num_layers(&self) -> usize {
        self.depth + 1
    }

    fn dim(&self) -> usize {
        self.embeddings.first().map_or(0, Vec::len)
    }

    fn represent(&self, ids: &[u32], layer: usize) -> Result<Vec<Vec<f32>>> {
        if layer > self.depth {
            bail!("Layer {} requested from a model of depth {}", layer, self.depth);
        }
        let rows = ids.iter().map(|&id| self.lookup(id)).collect::<Result<Vec<_>>>()?;
        if layer == 0 {
            return Ok(rows.into_iter().map(<[f32]>::to_vec).collect());
        }

        (0..rows.len())
            .map(|i| {
                let start = i.saturating_sub(layer);
                let end = (i + layer + 1).min(rows.len());
                Ok(mean_pooling(&rows[start..end])?)
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Wraps a model and fails on any sequence containing `poison`.
    pub struct PoisonedModel {
        pub inner: WindowedEmbeddingModel,
        pub poison: u32,
    }

    impl Representer for PoisonedModel {
        fn num_layers(&self) -> usize {
            self.inner.num_layers()
        }

        fn dim(&self) -> usize {
            self.inner.dim()
        }

        fn represent(&self, ids: &[u32], layer: usize) -> Result<Vec<Vec<f32>>> {
            if ids.contains(&self.poison) {
                bail!("out of memory");
            }
            self.inner.represent(ids, layer)
        }
    }

    /// Distinct, exactly representable embeddings: row `i` is `[i, 10 * i]`.
    pub fn toy_model(vocab_size: usize, depth: usize) -> WindowedEmbeddingModel {
        let embeddings = (0..vocab_size)
            .map(|i| vec![i as f32, 10.0 * i as f32])
            .collect();
        WindowedEmbeddingModel::new(embeddings, depth).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::toy_model;
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn layer_zero_is_lookup() {
        let model = toy_model(5, 2);
        assert_eq!(
            model.represent(&[3, 1], 0).unwrap(),
            vec![vec![3.0, 30.0], vec![1.0, 10.0]]
        );
    }

    #[test]
    fn deeper_layers_mix_context() {
        let model = toy_model(5, 2);
        let reps = model.represent(&[1, 2, 3], 1).unwrap();
        assert_eq!(reps[0], vec![1.5, 15.0]);
        assert_eq!(reps[1], vec![2.0, 20.0]);
        assert_eq!(reps[2], vec![2.5, 25.0]);
    }

    #[test]
    fn single_token_is_context_free() {
        let model = toy_model(5, 3);
        for layer in 0..model.num_layers() {
            assert_eq!(model.represent(&[4], layer).unwrap(), vec![vec![4.0, 40.0]]);
        }
    }

    #[test]
    fn rejects_bad_input() {
        let model = toy_model(5, 1);
        assert!(model.represent(&[5], 0).is_err());
        assert!(model.represent(&[1], 2).is_err());
        assert!(WindowedEmbeddingModel::new(vec![], 1).is_err());
        assert!(WindowedEmbeddingModel::new(vec![vec![1.0], vec![1.0, 2.0]], 1).is_err());
    }

    #[test]
    fn resolves_layers() {
        assert_eq!(resolve_layer(0, 13).unwrap(), 0);
        assert_eq!(resolve_layer(-1, 13).unwrap(), 12);
        assert_eq!(resolve_layer(-13, 13).unwrap(), 0);
        assert!(resolve_layer(13, 13).is_err());
        assert!(resolve_layer(-14, 13).is_err());
    }

    #[test]
    fn save_and_load() {
        let dir = TempDir::new("staticvsm").unwrap();
        let model = toy_model(4, 2);

        let bin = dir.path().join("model.bin");
        model.save(&bin).unwrap();
        let loaded = WindowedEmbeddingModel::from_file(&bin).unwrap();
        assert_eq!(loaded.num_layers(), 3);
        assert_eq!(loaded.represent(&[2], 0).unwrap(), vec![vec![2.0, 20.0]]);

        let json = dir.path().join("model.json");
        std::fs::write(&json, r#"{"depth": 1, "embeddings": [[0.5], [1.5]]}"#).unwrap();
        let loaded = WindowedEmbeddingModel::from_file(&json).unwrap();
        assert_eq!(loaded.dim(), 1);
        assert_eq!(loaded.represent(&[0, 1], 1).unwrap(), vec![vec![1.0], vec![1.0]]);
    }
}
