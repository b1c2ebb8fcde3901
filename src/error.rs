//! # Error Types

/// Errors from static representation building.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// The encoder produced no token ids and no unknown-token fallback applies.
    #[error("no token ids for {text:?}")]
    UnencodableInput {
        /// The text that could not be encoded.
        text: String,
    },

    /// A pooling function was given zero vectors.
    #[error("cannot pool an empty sequence of vectors")]
    EmptyPoolingInput,

    /// Vectors of differing dimensionality were combined.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// The dimension of the first vector.
        expected: usize,
        /// The offending dimension.
        found: usize,
    },

    /// The encoder or representer failed on a specific word or text.
    #[error("external model failed on {item:?}: {message}")]
    ExternalModel {
        /// The word or text being processed.
        item: String,
        /// The adapter's error message.
        message: String,
    },

    /// The requested layer does not exist in the model.
    #[error("layer {layer} out of range for a model with {num_layers} layers")]
    LayerOutOfRange {
        /// The layer as requested (possibly negative).
        layer: isize,
        /// The number of hidden-state layers, embedding layer included.
        num_layers: usize,
    },

    /// A vocabulary listed the same word twice.
    #[error("duplicated word: {0:?}")]
    DuplicateWord(String),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Table (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl EmbedError {
    /// Wraps an adapter error with the item that triggered it.
    pub fn external(item: &str, err: anyhow::Error) -> Self {
        EmbedError::ExternalModel {
            item: item.to_string(),
            message: format!("{:#}", err),
        }
    }
}

/// Result type for static representation building.
pub type EmbedResult<T> = Result<T, EmbedError>;
