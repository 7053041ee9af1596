//! The tokenizer capability that corpus ingestion is written against.
//!
//! This crate never implements a tokenization algorithm itself.  Everything it needs from a
//! tokenizer is captured by the [`Tokenizer`] trait, and adapters over real tokenizer
//! implementations live in the submodules.
mod hf;
mod tiktoken;

pub use hf::*;
pub use tiktoken::*;

use crate::Result;

/// The integer representation of a single token in a tokenizer's vocabulary.
pub type TokenId = u32;

/// The operations a tokenizer must provide to feed a [`crate::TokenizedCorpus`].
///
/// Implementors need to supply the text splitting, the vocabulary lookup, the special token
/// framing, and the two length limits.  Everything else has a default built on top of those.
pub trait Tokenizer: Send + Sync {
    /// Split `text` into the token strings of this tokenizer's vocabulary, without adding any
    /// special tokens.
    fn tokenize(&self, text: &str) -> Result<Vec<String>>;

    /// Look up the integer id for each token string.
    fn convert_tokens_to_ids(&self, tokens: &[String]) -> Result<Vec<TokenId>>;

    /// Encode `text` straight to ids, without special tokens.
    ///
    /// Equivalent to [`Self::tokenize`] followed by [`Self::convert_tokens_to_ids`].
    /// Implementations with a direct path from text to ids should override this.
    fn encode(&self, text: &str) -> Result<Vec<TokenId>> {
        let tokens = self.tokenize(text)?;
        self.convert_tokens_to_ids(&tokens)
    }

    /// Wrap a single sequence of ids in whatever framing tokens (beginning/end of sequence
    /// markers and the like) this tokenizer uses.
    fn build_inputs_with_special_tokens(&self, ids: &[TokenId]) -> Result<Vec<TokenId>>;

    /// Maximum length of a model input, including special tokens.
    fn max_sequence_length(&self) -> usize;

    /// Maximum length of a single sentence once room for special tokens has been reserved.
    fn max_single_sentence_length(&self) -> usize;

    /// How many slots the special token framing takes up in a model input.
    fn special_token_overhead(&self) -> usize {
        self.max_sequence_length()
            .saturating_sub(self.max_single_sentence_length())
    }

    /// Encode many texts in one call.
    ///
    /// When `max_length` is given, each result is truncated so that it fits, counting the
    /// special tokens when `add_special_tokens` is set.  A `max_length` at or below
    /// [`Self::special_token_overhead`] leaves no content, and the framing alone can still exceed
    /// it; corpus ingestion rejects such block sizes before calling this.
    fn batch_encode(
        &self,
        texts: &[String],
        add_special_tokens: bool,
        max_length: Option<usize>,
    ) -> Result<Vec<Vec<TokenId>>> {
        let overhead = if add_special_tokens {
            self.special_token_overhead()
        } else {
            0
        };

        texts
            .iter()
            .map(|text| {
                let mut ids = self.encode(text)?;
                if let Some(max_length) = max_length {
                    ids.truncate(max_length.saturating_sub(overhead));
                }

                if add_special_tokens {
                    self.build_inputs_with_special_tokens(&ids)
                } else {
                    Ok(ids)
                }
            })
            .collect()
    }
}
