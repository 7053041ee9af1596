//! Adapter exposing the OpenAI BPE encodings from `tiktoken-rs` as a [`Tokenizer`]
use super::{TokenId, Tokenizer};
use crate::error::TokenizerSnafu;
use crate::Result;
use tracing::*;

pub type Encoder = tiktoken_rs::CoreBPE;

/// The text that marks a document boundary in every tiktoken encoding.
const END_OF_TEXT: &str = "<|endoftext|>";

/// Context size of GPT-2, the model whose training recipe this adapter defaults to
pub const DEFAULT_MAX_SEQUENCE_LENGTH: usize = 1024;

/// Names of the encodings that [`TiktokenTokenizer::new`] accepts
pub const ENCODINGS: &[&str] = &["cl100k_base", "p50k_base", "r50k_base", "p50k_edit", "gpt2"];

fn encoding_for_name(name: &str) -> Option<tiktoken_rs::tokenizer::Tokenizer> {
    use tiktoken_rs::tokenizer::Tokenizer::*;

    match name {
        "cl100k_base" => Some(Cl100kBase),
        "p50k_base" => Some(P50kBase),
        "r50k_base" => Some(R50kBase),
        "p50k_edit" => Some(P50kEdit),
        "gpt2" => Some(Gpt2),
        _ => None,
    }
}

fn to_token_id(rank: usize) -> Result<TokenId> {
    TokenId::try_from(rank).map_err(|_| {
        TokenizerSnafu {
            message: format!("token rank {rank} does not fit in a token id"),
        }
        .build()
    })
}

/// A tiktoken BPE encoding.
///
/// GPT-2 style models don't frame their inputs, so by default no special tokens are added and
/// the special token overhead is zero.  Use [`Self::with_end_of_text`] to append `<|endoftext|>`
/// to every framed sequence instead.
#[derive(Clone)]
pub struct TiktokenTokenizer {
    name: &'static str,
    encoder: Encoder,
    end_of_text: Option<TokenId>,
    max_sequence_length: usize,
}

impl TiktokenTokenizer {
    /// Load the encoding called `name`, which must be one of [`ENCODINGS`].
    pub fn new(name: &str) -> Result<Self> {
        let (name, tokenizer) = ENCODINGS
            .iter()
            .find(|candidate| **candidate == name)
            .and_then(|name| encoding_for_name(name).map(|tokenizer| (*name, tokenizer)))
            .ok_or_else(|| {
                TokenizerSnafu {
                    message: format!(
                        "unknown encoding '{name}', expected one of {}",
                        ENCODINGS.join(", ")
                    ),
                }
                .build()
            })?;

        let encoder = tiktoken_rs::get_bpe_from_tokenizer(tokenizer).map_err(|e| {
            TokenizerSnafu {
                message: format!("failed to load encoding '{name}': {e}"),
            }
            .build()
        })?;

        debug!(encoding = name, "Loaded tiktoken encoding");

        Ok(Self {
            name,
            encoder,
            end_of_text: None,
            max_sequence_length: DEFAULT_MAX_SEQUENCE_LENGTH,
        })
    }

    /// Append the encoding's `<|endoftext|>` token when framing sequences.
    pub fn with_end_of_text(mut self) -> Result<Self> {
        let ranks = self.encoder.encode_with_special_tokens(END_OF_TEXT);
        let [rank] = ranks[..] else {
            return TokenizerSnafu {
                message: format!(
                    "encoding '{}' has no single token for {END_OF_TEXT}",
                    self.name
                ),
            }
            .fail();
        };

        self.end_of_text = Some(to_token_id(rank)?);
        Ok(self)
    }

    pub fn with_max_sequence_length(mut self, max_sequence_length: usize) -> Self {
        self.max_sequence_length = max_sequence_length;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Tokenizer for TiktokenTokenizer {
    /// The decoded text of every token in `text`.
    ///
    /// BPE tokens are byte sequences, and a multi-byte character is sometimes split across
    /// tokens.  Such a token has no text of its own, so tokenizing it fails.  [`Self::encode`]
    /// doesn't go through token strings and never has this problem.
    fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        self.encoder
            .encode_ordinary(text)
            .into_iter()
            .map(|rank| {
                self.encoder.decode(vec![rank]).map_err(|e| {
                    TokenizerSnafu {
                        message: format!("token {rank} is not on a UTF-8 boundary: {e}"),
                    }
                    .build()
                })
            })
            .collect()
    }

    fn convert_tokens_to_ids(&self, tokens: &[String]) -> Result<Vec<TokenId>> {
        tokens
            .iter()
            .map(|token| match self.encoder.encode_ordinary(token)[..] {
                [rank] => to_token_id(rank),
                _ => TokenizerSnafu {
                    message: format!("'{token}' is not a single token in '{}'", self.name),
                }
                .fail(),
            })
            .collect()
    }

    fn encode(&self, text: &str) -> Result<Vec<TokenId>> {
        self.encoder
            .encode_ordinary(text)
            .into_iter()
            .map(to_token_id)
            .collect()
    }

    fn build_inputs_with_special_tokens(&self, ids: &[TokenId]) -> Result<Vec<TokenId>> {
        let mut framed = Vec::with_capacity(ids.len() + 1);
        framed.extend_from_slice(ids);
        framed.extend(self.end_of_text);

        Ok(framed)
    }

    fn max_sequence_length(&self) -> usize {
        self.max_sequence_length
    }

    fn max_single_sentence_length(&self) -> usize {
        let reserved = usize::from(self.end_of_text.is_some());
        self.max_sequence_length.saturating_sub(reserved)
    }
}
