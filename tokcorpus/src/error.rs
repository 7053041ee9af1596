use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CorpusError {
    /// The options passed to a corpus constructor can't describe any ingestion strategy
    #[snafu(display("Invalid corpus configuration: {message}"))]
    Configuration { message: String },

    #[snafu(display("Input file '{}' does not exist or is not a regular file", path.display()))]
    NotFound { path: PathBuf },

    #[snafu(display("Precondition violated: {message}"))]
    Precondition { message: String },

    /// A tokenizing ingestion strategy ran to completion but produced nothing usable.
    #[snafu(display("No examples were produced when loading {provenance}"))]
    NoExamples { provenance: String },

    #[snafu(display("Cache file '{}' could not be decoded", path.display()))]
    Decode {
        path: PathBuf,
        source: rmp_serde::decode::Error,
    },

    #[snafu(display("Examples could not be encoded into cache file '{}'", path.display()))]
    Encode {
        path: PathBuf,
        source: rmp_serde::encode::Error,
    },

    #[snafu(display("Index {index} is out of range for a corpus of {len} examples"))]
    Index { index: usize, len: usize },

    #[snafu(display("File I/O error on file '{}'", path.display()))]
    FileIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Malformed CSV in file '{}'", path.display()))]
    Csv { path: PathBuf, source: csv::Error },

    #[snafu(display("Tokenizer error: {message}"))]
    Tokenizer { message: String },
}
