//! Prepare text for language model training: tokenize it, keep it in a random-access corpus, and
//! cache the result so the tokenizing only has to happen once.
mod cache;
mod chunk;
mod corpus;
mod error;
mod lines;
pub mod tokenizer;

pub use cache::*;
pub use chunk::*;
pub use corpus::*;
pub use error::*;
pub use lines::*;
pub use tokenizer::{TokenId, Tokenizer};

pub type Result<T, E = CorpusError> = std::result::Result<T, E>;
