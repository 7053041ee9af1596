//! Splitting one long run of tokens into fixed-size training examples
use crate::error::ConfigurationSnafu;
use crate::tokenizer::{TokenId, Tokenizer};
use crate::Result;

/// How many content tokens fit in one chunk once the tokenizer's framing has been accounted for.
///
/// Fails if the framing alone would use up the whole block.
pub fn effective_block_size(block_size: usize, tokenizer: &dyn Tokenizer) -> Result<usize> {
    let overhead = tokenizer.special_token_overhead();

    match block_size.checked_sub(overhead) {
        Some(effective) if effective > 0 => Ok(effective),
        _ => ConfigurationSnafu {
            message: format!(
                "block size {block_size} leaves no room for content after {overhead} special tokens"
            ),
        }
        .fail(),
    }
}

/// Consecutive, non-overlapping windows of exactly `block_size` tokens, starting at the first
/// token.
///
/// Tokens left over at the end that can't fill a whole window are not returned.
///
/// # Panics
///
/// If `block_size` is zero.
pub fn token_chunks(tokens: &[TokenId], block_size: usize) -> std::slice::ChunksExact<'_, TokenId> {
    tokens.chunks_exact(block_size)
}

/// Chunk `tokens` and frame each chunk with the tokenizer's special tokens.
pub fn frame_chunks(
    tokens: &[TokenId],
    block_size: usize,
    tokenizer: &dyn Tokenizer,
) -> Result<Vec<Vec<TokenId>>> {
    token_chunks(tokens, block_size)
        .map(|chunk| tokenizer.build_inputs_with_special_tokens(chunk))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{WordTokenizer, BOS, EOS};
    use crate::CorpusError;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    #[test]
    fn effective_size_subtracts_framing() {
        let tokenizer = WordTokenizer::default();

        assert_eq!(effective_block_size(1024, &tokenizer).unwrap(), 1022);
        assert_eq!(effective_block_size(3, &tokenizer).unwrap(), 1);
    }

    #[test]
    fn block_too_small_for_framing_is_rejected() {
        let tokenizer = WordTokenizer::default();

        assert_matches!(
            effective_block_size(2, &tokenizer),
            Err(CorpusError::Configuration { .. })
        );
        assert_matches!(
            effective_block_size(1, &tokenizer),
            Err(CorpusError::Configuration { .. })
        );
    }

    #[test]
    fn remainder_is_dropped() {
        let tokens: Vec<TokenId> = (0..10).collect();

        let chunks: Vec<&[TokenId]> = token_chunks(&tokens, 4).collect();
        let expected: Vec<&[TokenId]> = vec![&[0, 1, 2, 3], &[4, 5, 6, 7]];

        assert_eq!(chunks, expected);
    }

    #[test]
    fn too_few_tokens_means_no_chunks() {
        let tokens: Vec<TokenId> = vec![7, 8];
        assert_eq!(token_chunks(&tokens, 3).count(), 0);
    }

    #[test]
    fn frames_every_chunk() {
        let tokenizer = WordTokenizer::default();
        let tokens: Vec<TokenId> = vec![10, 20, 30, 40, 50];

        let framed = frame_chunks(&tokens, 2, &tokenizer).unwrap();

        assert_eq!(
            framed,
            vec![vec![BOS, 10, 20, EOS], vec![BOS, 30, 40, EOS]]
        );
    }

    proptest! {
        /// floor(L / B) chunks of exactly B tokens, tiling the front of the input with nothing
        /// skipped and nothing repeated
        #[test]
        fn chunks_tile_the_input(
            tokens in proptest::collection::vec(any::<TokenId>(), 0..500),
            block_size in 1usize..64,
        ) {
            let chunks: Vec<&[TokenId]> = token_chunks(&tokens, block_size).collect();

            prop_assert_eq!(chunks.len(), tokens.len() / block_size);
            for (index, chunk) in chunks.iter().enumerate() {
                prop_assert_eq!(chunk.len(), block_size);
                prop_assert_eq!(*chunk, &tokens[index * block_size..(index + 1) * block_size]);
            }
        }
    }
}
