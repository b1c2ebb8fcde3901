use std::path::Path;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokenizers::tokenizer::Tokenizer;

use crate::error::{EmbedError, EmbedResult};

/// Trait for a subword tokenizer mapping text to token ids.
pub trait TokenEncoder: Send + Sync {
    /// Splits `text` into subword strings.
    fn tokenize(&self, text: &str) -> Result<Vec<String>>;

    /// Encodes `text` into token ids. May return an empty sequence.
    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    /// Encodes a single word without boundary markers, so that the ids can
    /// be found inside an encoded text.
    fn encode_word(&self, word: &str) -> Result<Vec<u32>> {
        self.encode(word)
    }

    /// Maps token ids back to subword strings. Used for diagnostics only.
    fn decode(&self, ids: &[u32]) -> Result<Vec<String>>;

    /// The id substituted for input that encodes to nothing, if the vocabulary has one.
    fn unknown_id(&self) -> Option<u32>;
}

/// What to do when a text encodes to an empty token sequence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownPolicy {
    /// Substitute the encoder's unknown-token id.
    #[default]
    Substitute,
    /// Report the input as unencodable.
    Reject,
}

/// Encodes `text`, applying `policy` when the encoder yields no ids.
pub fn encode_with_fallback<E>(encoder: &E, text: &str, policy: UnknownPolicy) -> EmbedResult<Vec<u32>>
where
    E: TokenEncoder + ?Sized,
{
    let ids = encoder
        .encode(text)
        .map_err(|e| EmbedError::external(text, e))?;
    if !ids.is_empty() {
        return Ok(ids);
    }

    match (policy, encoder.unknown_id()) {
        (UnknownPolicy::Substitute, Some(unk)) => Ok(vec![unk]),
        _ => Err(EmbedError::UnencodableInput {
            text: text.to_string(),
        }),
    }
}

/// [`TokenEncoder`] backed by a Hugging Face `tokenizers` model.
pub struct HfEncoder {
    tokenizer: Tokenizer,
    add_special_tokens: bool,
    unknown_id: Option<u32>,
}

impl HfEncoder {
    pub const DEFAULT_UNK_TOKEN: &'static str = "[UNK]";

    pub fn new(tokenizer: Tokenizer) -> Self {
        let unknown_id = tokenizer.token_to_id(Self::DEFAULT_UNK_TOKEN);
        HfEncoder {
            tokenizer,
            add_special_tokens: false,
            unknown_id,
        }
    }

    /// Loads a `tokenizer.json` file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(path).map_err(anyhow::Error::msg)?;
        Ok(Self::new(tokenizer))
    }

    /// Loads a tokenizer by name from the Hugging Face hub.
    pub fn from_pretrained(name: &str) -> Result<Self> {
        let tokenizer = Tokenizer::from_pretrained(name, None).map_err(anyhow::Error::msg)?;
        Ok(Self::new(tokenizer))
    }

    /// Loads from a local file when `name` is one, otherwise from the hub.
    pub fn load(name: &str) -> Result<Self> {
        if Path::new(name).is_file() {
            Self::from_file(name)
        } else {
            Self::from_pretrained(name)
        }
    }

    /// Whether model boundary markers are added around each encoded text.
    pub fn with_special_tokens(mut self, add_special_tokens: bool) -> Self {
        self.add_special_tokens = add_special_tokens;
        self
    }

    /// Sets the token used as the unknown-token fallback.
    pub fn with_unknown_token(mut self, token: &str) -> Result<Self> {
        let id = self
            .tokenizer
            .token_to_id(token)
            .ok_or_else(|| anyhow!("Unknown token {:?} is not in the vocabulary", token))?;
        self.unknown_id = Some(id);
        Ok(self)
    }
}

impl TokenEncoder for HfEncoder {
    fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        let encoding = self
            .tokenizer
            .encode(text, self.add_special_tokens)
            .map_err(anyhow::Error::msg)?;
        Ok(encoding.get_tokens().to_vec())
    }

    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, self.add_special_tokens)
            .map_err(anyhow::Error::msg)?;
        Ok(encoding.get_ids().to_vec())
    }

    fn encode_word(&self, word: &str) -> Result<Vec<u32>> {
        let encoding = self.tokenizer.encode(word, false).map_err(anyhow::Error::msg)?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32]) -> Result<Vec<String>> {
        ids.iter()
            .map(|&id| {
                self.tokenizer
                    .id_to_token(id)
                    .ok_or_else(|| anyhow!("Token id {} is not in the vocabulary", id))
            })
            .collect()
    }

    fn unknown_id(&self) -> Option<u32> {
        self.unknown_id
    }
}
