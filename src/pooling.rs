use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{EmbedError, EmbedResult};

/// Reduction used to collapse a sequence of hidden vectors into one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Pooling {
    #[default]
    Mean,
    Max,
    Min,
    Last,
}

impl Pooling {
    /// Applies the selected pooling function to `vectors`.
    pub fn apply<V: AsRef<[f32]>>(&self, vectors: &[V]) -> EmbedResult<Vec<f32>> {
        match self {
            Pooling::Mean => mean_pooling(vectors),
            Pooling::Max => max_pooling(vectors),
            Pooling::Min => min_pooling(vectors),
            Pooling::Last => last_pooling(vectors),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Pooling::Mean => "mean",
            Pooling::Max => "max",
            Pooling::Min => "min",
            Pooling::Last => "last",
        }
    }
}

impl fmt::Display for Pooling {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Pooling {
    type Err = &'static str;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "mean" => Ok(Self::Mean),
            "max" => Ok(Self::Max),
            "min" => Ok(Self::Min),
            "last" => Ok(Self::Last),
            _ => Err("Invalid pooling function"),
        }
    }
}

/// Elementwise average of `vectors`, accumulated in input order.
pub fn mean_pooling<V: AsRef<[f32]>>(vectors: &[V]) -> EmbedResult<Vec<f32>> {
    let dim = check_dimensions(vectors)?;
    if vectors.len() == 1 {
        return Ok(vectors[0].as_ref().to_vec());
    }

    let mut sums = vec![0f64; dim];
    for v in vectors {
        for (sum, &x) in sums.iter_mut().zip(v.as_ref()) {
            *sum += x as f64;
        }
    }
    let n = vectors.len() as f64;
    Ok(sums.into_iter().map(|sum| (sum / n) as f32).collect())
}

/// Elementwise maximum of `vectors`.
pub fn max_pooling<V: AsRef<[f32]>>(vectors: &[V]) -> EmbedResult<Vec<f32>> {
    fold_elementwise(vectors, f32::max)
}

/// Elementwise minimum of `vectors`.
pub fn min_pooling<V: AsRef<[f32]>>(vectors: &[V]) -> EmbedResult<Vec<f32>> {
    fold_elementwise(vectors, f32::min)
}

/// The final vector of the sequence, unchanged.
pub fn last_pooling<V: AsRef<[f32]>>(vectors: &[V]) -> EmbedResult<Vec<f32>> {
    check_dimensions(vectors)?;
    match vectors.last() {
        Some(v) => Ok(v.as_ref().to_vec()),
        None => Err(EmbedError::EmptyPoolingInput),
    }
}

fn fold_elementwise<V, F>(vectors: &[V], op: F) -> EmbedResult<Vec<f32>>
where
    V: AsRef<[f32]>,
    F: Fn(f32, f32) -> f32,
{
    check_dimensions(vectors)?;
    let (first, rest) = vectors.split_first().ok_or(EmbedError::EmptyPoolingInput)?;

    let mut acc = first.as_ref().to_vec();
    for v in rest {
        for (a, &x) in acc.iter_mut().zip(v.as_ref()) {
            *a = op(*a, x);
        }
    }
    Ok(acc)
}

/// Returns the shared dimension of `vectors`, failing on empty or ragged input.
pub(crate) fn check_dimensions<V: AsRef<[f32]>>(vectors: &[V]) -> EmbedResult<usize> {
    let expected = match vectors.first() {
        Some(v) => v.as_ref().len(),
        None => return Err(EmbedError::EmptyPoolingInput),
    };
    match vectors.iter().map(|v| v.as_ref().len()).find(|&d| d != expected) {
        Some(found) => Err(EmbedError::DimensionMismatch { expected, found }),
        None => Ok(expected),
    }
}
