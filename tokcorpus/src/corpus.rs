//! [`TokenizedCorpus`] and the options that decide how one gets built.
use crate::cache::{read_cache, write_cache, DEFAULT_CACHE_DESTINATION};
use crate::chunk::{effective_block_size, frame_chunks};
use crate::error::{
    ConfigurationSnafu, FileIoSnafu, IndexSnafu, NoExamplesSnafu, NotFoundSnafu,
};
use crate::lines::read_lines;
use crate::tokenizer::{TokenId, Tokenizer};
use crate::Result;
use serde::{Deserialize, Serialize};
use snafu::{ensure, OptionExt, ResultExt};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tracing::*;

/// Block size used when the caller doesn't pick one; GPT-2's context size
pub const DEFAULT_BLOCK_SIZE: usize = 1024;

/// Everything that controls how a corpus is built.
///
/// These are the loose options a caller (or a config file) supplies.  They're turned into exactly
/// one [`CorpusSource`] by [`Self::resolve`], in this order of priority:
///
/// 1. `from_cache` loads a previously saved cache from `file_path`.
/// 2. `texts` are tokenized directly.
/// 3. `line_by_line` tokenizes each line of `file_path` as its own example.
/// 4. Otherwise `file_path` is tokenized as one long text and cut into blocks.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusOptions {
    /// Texts to tokenize, one example each.
    pub texts: Option<Vec<String>>,

    /// Treat every line of `file_path` as a separate example.
    pub line_by_line: bool,

    /// The input file, or the cache file when `from_cache` is set.
    pub file_path: Option<PathBuf>,

    /// `file_path` is a cache written by [`TokenizedCorpus::save`].
    pub from_cache: bool,

    /// The first line of a line-by-line file is a header and should be skipped.
    pub header: bool,

    /// Save a cache as soon as the corpus is built.
    pub save_cache: bool,

    /// Where to save the cache.  Defaults to [`DEFAULT_CACHE_DESTINATION`].
    pub cache_destination: Option<PathBuf>,

    /// Maximum length of an example in tokens, including special tokens.
    pub block_size: usize,
}

impl Default for CorpusOptions {
    fn default() -> Self {
        Self {
            texts: None,
            line_by_line: false,
            file_path: None,
            from_cache: false,
            header: true,
            save_cache: false,
            cache_destination: None,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl CorpusOptions {
    /// Pick the single ingestion strategy these options describe.
    ///
    /// `has_tokenizer` says whether the caller can supply a tokenizer; every strategy except
    /// loading a cache needs one.
    pub fn resolve(&self, has_tokenizer: bool) -> Result<CorpusSource> {
        let texts = self.texts.as_ref().filter(|texts| !texts.is_empty());

        ensure!(
            texts.is_some() || self.file_path.is_some(),
            ConfigurationSnafu {
                message: "texts or file_path must be specified"
            }
        );
        ensure!(
            self.from_cache || has_tokenizer,
            ConfigurationSnafu {
                message: "a tokenizer must be specified"
            }
        );
        ensure!(
            self.block_size > 0,
            ConfigurationSnafu {
                message: "block_size must be positive"
            }
        );

        if self.from_cache {
            let path = self.file_path.clone().context(ConfigurationSnafu {
                message: "file_path must point at the cache to load",
            })?;
            return Ok(CorpusSource::Cache { path });
        }

        if let Some(texts) = &self.texts {
            return Ok(CorpusSource::Texts {
                texts: texts.clone(),
                block_size: self.block_size,
            });
        }

        // At least one of texts or file_path was checked for above
        let path = self.file_path.clone().context(ConfigurationSnafu {
            message: "file_path must be specified",
        })?;

        if self.line_by_line {
            Ok(CorpusSource::LineFile {
                path,
                header: self.header,
                block_size: self.block_size,
            })
        } else {
            Ok(CorpusSource::ChunkedFile {
                path,
                block_size: self.block_size,
            })
        }
    }

    /// The cache destination, falling back to the default file name
    pub fn cache_destination(&self) -> &Path {
        self.cache_destination
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_CACHE_DESTINATION))
    }
}

/// One fully resolved way of producing a corpus's examples
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CorpusSource {
    /// Load examples saved by [`TokenizedCorpus::save`].  No tokenizer needed.
    Cache { path: PathBuf },

    /// Tokenize each text into one example, framed with special tokens and truncated to
    /// `block_size`.
    Texts {
        texts: Vec<String>,
        block_size: usize,
    },

    /// Like [`Self::Texts`], with the texts read from a file by [`read_lines`].
    LineFile {
        path: PathBuf,
        header: bool,
        block_size: usize,
    },

    /// Tokenize the whole file as one text and cut it into back-to-back blocks of `block_size`
    /// tokens (special tokens included).  A partial block at the end is dropped.
    ChunkedFile { path: PathBuf, block_size: usize },
}

/// Records which ingestion strategy a corpus's examples came from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provenance {
    Cache,
    Application,
    LineFile(PathBuf),
    ChunkedFile(PathBuf),
}

impl Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provenance::Cache => write!(f, "via cache."),
            Provenance::Application => write!(f, "via application."),
            Provenance::LineFile(path) => {
                write!(f, "from line-by-line file at {}.", path.display())
            }
            Provenance::ChunkedFile(path) => write!(f, "from file at {}.", path.display()),
        }
    }
}

/// Tokenized training examples with random access by index.
///
/// The examples are produced once, when the corpus is built, and never change afterwards.
#[derive(Clone, Debug)]
pub struct TokenizedCorpus {
    examples: Vec<Vec<TokenId>>,
    provenance: Provenance,
}

impl TokenizedCorpus {
    /// Build a corpus from loose options, saving a cache afterwards if asked to.
    ///
    /// `tokenizer` may be `None` only when loading from a cache.
    #[instrument(skip_all)]
    pub fn build(options: &CorpusOptions, tokenizer: Option<&dyn Tokenizer>) -> Result<Self> {
        let source = options.resolve(tokenizer.is_some())?;
        let corpus = Self::from_source(source, tokenizer)?;

        if options.save_cache {
            corpus.save(options.cache_destination())?;
        }

        Ok(corpus)
    }

    /// Build a corpus with one specific ingestion strategy.
    pub fn from_source(source: CorpusSource, tokenizer: Option<&dyn Tokenizer>) -> Result<Self> {
        let (examples, provenance) = match source {
            CorpusSource::Cache { path } => (read_cache(&path)?, Provenance::Cache),
            CorpusSource::Texts { texts, block_size } => {
                let tokenizer = require_tokenizer(tokenizer)?;
                let examples = encode_texts(tokenizer, &texts, block_size)?;
                non_empty(examples, Provenance::Application)?
            }
            CorpusSource::LineFile {
                path,
                header,
                block_size,
            } => {
                let tokenizer = require_tokenizer(tokenizer)?;
                require_file(&path)?;

                let texts = read_lines(&path, header)?;
                let examples = encode_texts(tokenizer, &texts, block_size)?;
                non_empty(examples, Provenance::LineFile(path))?
            }
            CorpusSource::ChunkedFile { path, block_size } => {
                let tokenizer = require_tokenizer(tokenizer)?;
                require_file(&path)?;

                let examples = encode_chunked_file(tokenizer, &path, block_size)?;
                non_empty(examples, Provenance::ChunkedFile(path))?
            }
        };

        info!(count = examples.len(), %provenance, "{} samples loaded", format_count(examples.len()));

        Ok(Self {
            examples,
            provenance,
        })
    }

    /// Load a corpus from a cache written by [`Self::save`].
    pub fn from_cache(path: impl Into<PathBuf>) -> Result<Self> {
        Self::from_source(CorpusSource::Cache { path: path.into() }, None)
    }

    /// Tokenize `texts` into a corpus, one example per text.
    pub fn from_texts(
        tokenizer: &dyn Tokenizer,
        texts: Vec<String>,
        block_size: usize,
    ) -> Result<Self> {
        Self::from_source(CorpusSource::Texts { texts, block_size }, Some(tokenizer))
    }

    /// Write this corpus's examples to a cache file at `destination`.
    ///
    /// Fails without touching the file system if the corpus is empty.
    pub fn save(&self, destination: impl AsRef<Path>) -> Result<()> {
        let destination = destination.as_ref();

        info!(destination = %destination.display(), "Caching dataset to {}", destination.display());

        write_cache(destination, &self.examples)
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// The example at `index`, with ids widened to `i64` as training frameworks expect.
    pub fn get(&self, index: usize) -> Result<Vec<i64>> {
        let example = self.example(index).context(IndexSnafu {
            index,
            len: self.len(),
        })?;

        Ok(example.iter().map(|&id| i64::from(id)).collect())
    }

    /// Borrow the example at `index` without copying it
    pub fn example(&self, index: usize) -> Option<&[TokenId]> {
        self.examples.get(index).map(Vec::as_slice)
    }

    pub fn examples(&self) -> &[Vec<TokenId>] {
        &self.examples
    }

    pub fn iter(&self) -> impl Iterator<Item = &[TokenId]> {
        self.examples.iter().map(Vec::as_slice)
    }

    pub fn into_examples(self) -> Vec<Vec<TokenId>> {
        self.examples
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// Number of tokens across all examples
    pub fn total_tokens(&self) -> usize {
        self.examples.iter().map(Vec::len).sum()
    }

    /// A one-line human readable summary of this corpus
    pub fn describe(&self) -> String {
        self.to_string()
    }
}

impl Display for TokenizedCorpus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TokenizedCorpus containing {} examples loaded {}",
            format_count(self.examples.len()),
            self.provenance
        )
    }
}

fn require_tokenizer(tokenizer: Option<&dyn Tokenizer>) -> Result<&dyn Tokenizer> {
    tokenizer.context(ConfigurationSnafu {
        message: "a tokenizer must be specified",
    })
}

fn require_file(path: &Path) -> Result<()> {
    ensure!(path.is_file(), NotFoundSnafu { path });
    Ok(())
}

fn non_empty(
    examples: Vec<Vec<TokenId>>,
    provenance: Provenance,
) -> Result<(Vec<Vec<TokenId>>, Provenance)> {
    ensure!(
        !examples.is_empty(),
        NoExamplesSnafu {
            provenance: provenance.to_string()
        }
    );
    Ok((examples, provenance))
}

#[instrument(skip_all, fields(texts = texts.len(), block_size = block_size))]
fn encode_texts(
    tokenizer: &dyn Tokenizer,
    texts: &[String],
    block_size: usize,
) -> Result<Vec<Vec<TokenId>>> {
    // Framing alone must not fill (or overflow) the block
    effective_block_size(block_size, tokenizer)?;

    tokenizer.batch_encode(texts, true, Some(block_size))
}

#[instrument(skip_all, fields(path = %path.display(), block_size = block_size))]
fn encode_chunked_file(
    tokenizer: &dyn Tokenizer,
    path: &Path,
    block_size: usize,
) -> Result<Vec<Vec<TokenId>>> {
    let block_size = effective_block_size(block_size, tokenizer)?;

    let text = std::fs::read_to_string(path).context(FileIoSnafu { path })?;
    let tokens = tokenizer.encode(&text)?;

    debug!(
        tokens = tokens.len(),
        effective_block_size = block_size,
        "Tokenized file, cutting into blocks"
    );

    frame_chunks(&tokens, block_size, tokenizer)
}

/// Render a count with `,` between each group of three digits
fn format_count(count: usize) -> String {
    let digits = count.to_string();
    let mut formatted = String::with_capacity(digits.len() + digits.len() / 3);

    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            formatted.push(',');
        }
        formatted.push(digit);
    }

    formatted
}
