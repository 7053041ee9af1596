//! Adapter for HuggingFace `tokenizers` models, the kind distributed as a `tokenizer.json`
use super::{TokenId, Tokenizer};
use crate::error::TokenizerSnafu;
use crate::Result;
use std::path::Path;
use tokenizers::models::ModelWrapper;
use tokenizers::{Encoding, PostProcessor, Token};
use tracing::*;

/// The unknown token of models that have one.  Unigram models only expose it by id.
fn unk_token(model: &ModelWrapper) -> Option<&str> {
    match model {
        ModelWrapper::WordLevel(model) => Some(model.unk_token.as_str()),
        ModelWrapper::WordPiece(model) => Some(model.unk_token.as_str()),
        ModelWrapper::BPE(model) => model.unk_token.as_deref(),
        _ => None,
    }
}

fn tokenizer_error(e: impl std::fmt::Display) -> crate::CorpusError {
    TokenizerSnafu {
        message: e.to_string(),
    }
    .build()
}

/// A HuggingFace tokenizer.
///
/// The special token framing is whatever the tokenizer's post-processor does, so for a BERT
/// style tokenizer that's `[CLS] ... [SEP]` and for GPT-2 it's nothing at all.
///
/// `tokenizer.json` doesn't record the model's context size, so the caller has to supply it.
///
/// Token strings missing from the vocabulary map to the model's unknown token, if it has one.
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
    unk_id: Option<TokenId>,
    max_sequence_length: usize,
}

impl HfTokenizer {
    pub fn new(inner: tokenizers::Tokenizer, max_sequence_length: usize) -> Self {
        let unk_id = unk_token(inner.get_model()).and_then(|unk| inner.token_to_id(unk));

        Self {
            inner,
            unk_id,
            max_sequence_length,
        }
    }

    /// Load a tokenizer from either a local `tokenizer.json` or a HuggingFace hub identifier.
    ///
    /// If `identifier` exists on disk it's loaded from there, otherwise it's treated as the name
    /// of a hub model (e.g. `"gpt2"` or `"bert-base-uncased"`).
    pub fn load(identifier: &str, max_sequence_length: usize) -> Result<Self> {
        let inner = if Path::new(identifier).exists() {
            tokenizers::Tokenizer::from_file(identifier)
        } else {
            tokenizers::Tokenizer::from_pretrained(identifier, None)
        }
        .map_err(|e| tokenizer_error(format!("failed to load '{identifier}': {e}")))?;

        debug!(identifier, max_sequence_length, "Loaded HuggingFace tokenizer");

        Ok(Self::new(inner, max_sequence_length))
    }

    /// Number of tokens the post-processor adds around a single sequence
    fn added_tokens(&self) -> usize {
        self.inner
            .get_post_processor()
            .map(|processor| processor.added_tokens(false))
            .unwrap_or(0)
    }
}

impl Tokenizer for HfTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        let encoding = self.inner.encode(text, false).map_err(tokenizer_error)?;
        Ok(encoding.get_tokens().to_vec())
    }

    fn convert_tokens_to_ids(&self, tokens: &[String]) -> Result<Vec<TokenId>> {
        tokens
            .iter()
            .map(|token| {
                self.inner
                    .token_to_id(token)
                    .or(self.unk_id)
                    .ok_or_else(|| tokenizer_error(format!("'{token}' is not in the vocabulary")))
            })
            .collect()
    }

    fn encode(&self, text: &str) -> Result<Vec<TokenId>> {
        let encoding = self.inner.encode(text, false).map_err(tokenizer_error)?;
        Ok(encoding.get_ids().to_vec())
    }

    fn build_inputs_with_special_tokens(&self, ids: &[TokenId]) -> Result<Vec<TokenId>> {
        let tokens = ids
            .iter()
            .map(|&id| Token::new(id, self.inner.id_to_token(id).unwrap_or_default(), (0, 0)))
            .collect();

        let framed = self
            .inner
            .post_process(Encoding::from_tokens(tokens, 0), None, true)
            .map_err(tokenizer_error)?;

        Ok(framed.get_ids().to_vec())
    }

    fn max_sequence_length(&self) -> usize {
        self.max_sequence_length
    }

    fn max_single_sentence_length(&self) -> usize {
        self.max_sequence_length.saturating_sub(self.added_tokens())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokenizers::models::bpe::BPE;
    use tokenizers::models::wordlevel::WordLevel;
    use tokenizers::pre_tokenizers::whitespace::Whitespace;
    use tokenizers::processors::template::TemplateProcessing;

    /// A tiny word-level tokenizer that frames sequences as `[CLS] ... [SEP]`
    fn word_level(with_template: bool) -> HfTokenizer {
        let vocab: HashMap<String, u32> = [
            ("[UNK]", 0),
            ("[CLS]", 1),
            ("[SEP]", 2),
            ("hello", 10),
            ("world", 20),
            ("foo", 30),
        ]
        .into_iter()
        .map(|(token, id)| (token.to_string(), id))
        .collect();

        let model = WordLevel::builder()
            .vocab(vocab)
            .unk_token("[UNK]".to_string())
            .build()
            .unwrap();

        let mut inner = tokenizers::Tokenizer::new(model);
        inner.with_pre_tokenizer(Some(Whitespace::default()));

        if with_template {
            let template = TemplateProcessing::builder()
                .try_single("[CLS] $A [SEP]")
                .unwrap()
                .try_pair("[CLS] $A [SEP] $B:1 [SEP]:1")
                .unwrap()
                .special_tokens(vec![("[CLS]", 1), ("[SEP]", 2)])
                .build()
                .unwrap();
            inner.with_post_processor(Some(template));
        }

        HfTokenizer::new(inner, 512)
    }

    #[test]
    fn tokenize_then_lookup() {
        let tokenizer = word_level(true);

        let tokens = tokenizer.tokenize("hello world").unwrap();
        assert_eq!(tokens, vec!["hello", "world"]);
        assert_eq!(tokenizer.convert_tokens_to_ids(&tokens).unwrap(), vec![10, 20]);
        assert_eq!(tokenizer.encode("hello world").unwrap(), vec![10, 20]);
    }

    #[test]
    fn unknown_token_string_maps_to_unk() {
        let tokenizer = word_level(true);

        assert_eq!(
            tokenizer
                .convert_tokens_to_ids(&["hello".to_string(), "nope".to_string()])
                .unwrap(),
            vec![10, 0]
        );
        assert_eq!(tokenizer.encode("hello nope").unwrap(), vec![10, 0]);
    }

    #[test]
    fn unknown_token_string_without_unk_is_an_error() {
        let vocab: HashMap<String, u32> = [("a".to_string(), 0), ("b".to_string(), 1)]
            .into_iter()
            .collect();
        let model = BPE::builder().vocab_and_merges(vocab, vec![]).build().unwrap();
        let tokenizer = HfTokenizer::new(tokenizers::Tokenizer::new(model), 512);

        assert_eq!(tokenizer.convert_tokens_to_ids(&["b".to_string()]).unwrap(), vec![1]);
        assert!(tokenizer
            .convert_tokens_to_ids(&["nope".to_string()])
            .is_err());
    }

    #[test]
    fn template_framing_and_overhead() {
        let tokenizer = word_level(true);

        assert_eq!(tokenizer.special_token_overhead(), 2);
        assert_eq!(tokenizer.max_single_sentence_length(), 510);
        assert_eq!(
            tokenizer.build_inputs_with_special_tokens(&[10, 20]).unwrap(),
            vec![1, 10, 20, 2]
        );
    }

    #[test]
    fn no_post_processor_means_no_framing() {
        let tokenizer = word_level(false);

        assert_eq!(tokenizer.special_token_overhead(), 0);
        assert_eq!(
            tokenizer.build_inputs_with_special_tokens(&[30]).unwrap(),
            vec![30]
        );
    }
}
