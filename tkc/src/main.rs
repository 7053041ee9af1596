use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::exit;
use tokcorpus::tokenizer::{HfTokenizer, TiktokenTokenizer, ENCODINGS};
use tokcorpus::{CorpusOptions, TokenizedCorpus, Tokenizer};
use tracing::*;
use tracing_subscriber::{filter::LevelFilter, EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    globals: Globals,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Globals {
    /// JSON file with default corpus options.  Command line flags take precedence over it.
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Turn debugging information on
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    debug: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Tokenize text into a corpus and write it out as a cache file
    Build {
        /// Text file to read.  Either this or at least one `--text` is required.
        file: Option<PathBuf>,

        /// Tokenize this text as one example.  Can be repeated.
        #[arg(long = "text", value_name = "TEXT")]
        texts: Vec<String>,

        /// A tiktoken encoding name (see `tkc encodings`), a path to a `tokenizer.json`, or a
        /// HuggingFace hub model name
        #[arg(short, long, default_value = "gpt2")]
        tokenizer: String,

        /// With a tiktoken encoding, end every example with `<|endoftext|>`
        #[arg(long)]
        end_of_text: bool,

        /// Context size of the model the tokenizer belongs to
        #[arg(long, default_value_t = tokcorpus::tokenizer::DEFAULT_MAX_SEQUENCE_LENGTH)]
        max_len: usize,

        /// Every line of FILE is a separate example, instead of cutting the whole file into
        /// blocks.  Files ending in `.csv` are read as CSV, one example per row.
        #[arg(long)]
        line_by_line: bool,

        /// The first line of FILE is data, not a header
        #[arg(long)]
        no_header: bool,

        /// Maximum example length in tokens, special tokens included
        #[arg(long)]
        block_size: Option<usize>,

        /// Where to write the cache
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Load a cache file and summarize what's in it
    Inspect {
        /// The cache file
        cache: PathBuf,

        /// Also print the token ids of the example at this index
        #[arg(long, value_name = "INDEX")]
        show: Option<usize>,
    },

    /// List the tiktoken encodings that `--tokenizer` accepts by name
    Encodings,
}

impl Commands {
    fn execute(self, globals: &Globals) -> anyhow::Result<()> {
        use Commands::*;
        match self {
            Build {
                file,
                texts,
                tokenizer,
                end_of_text,
                max_len,
                line_by_line,
                no_header,
                block_size,
                output,
            } => {
                let mut options = load_options(globals.config.as_deref())?;

                if file.is_some() {
                    options.file_path = file;
                }
                if !texts.is_empty() {
                    options.texts = Some(texts);
                }
                if line_by_line {
                    options.line_by_line = true;
                }
                if no_header {
                    options.header = false;
                }
                if let Some(block_size) = block_size {
                    options.block_size = block_size;
                }
                if output.is_some() {
                    options.cache_destination = output;
                }
                options.save_cache = true;
                options.from_cache = false;

                let tokenizer = load_tokenizer(&tokenizer, end_of_text, max_len)?;
                let corpus = TokenizedCorpus::build(&options, Some(tokenizer.as_ref()))?;

                println!("{}", corpus);
                println!("Cache written to {}", options.cache_destination().display());
            }
            Inspect { cache, show } => {
                let corpus = TokenizedCorpus::from_cache(&cache)?;

                println!("{}", corpus);
                println!("Total tokens: {}", corpus.total_tokens());

                if let Some(index) = show {
                    let example = corpus.get(index)?;
                    println!("Example {index} ({} tokens): {:?}", example.len(), example);
                }
            }
            Encodings => {
                for name in ENCODINGS {
                    println!("{}", name);
                }
            }
        }

        Ok(())
    }
}

/// Read corpus options from a JSON config file, or start from the defaults if there isn't one
fn load_options(config: Option<&Path>) -> anyhow::Result<CorpusOptions> {
    let Some(path) = config else {
        return Ok(CorpusOptions::default());
    };

    debug!(path = %path.display(), "Loading corpus options");

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;

    serde_json::from_str(&contents)
        .with_context(|| format!("Invalid corpus options in config file '{}'", path.display()))
}

/// Names in [`ENCODINGS`] are tiktoken encodings; anything else goes to the HuggingFace loader.
fn load_tokenizer(
    name: &str,
    end_of_text: bool,
    max_len: usize,
) -> anyhow::Result<Box<dyn Tokenizer>> {
    if ENCODINGS.contains(&name) {
        let tokenizer = TiktokenTokenizer::new(name)?.with_max_sequence_length(max_len);
        let tokenizer = if end_of_text {
            tokenizer.with_end_of_text()?
        } else {
            tokenizer
        };

        Ok(Box::new(tokenizer))
    } else {
        if end_of_text {
            warn!("--end-of-text only applies to tiktoken encodings; the HuggingFace tokenizer's own framing is used");
        }

        Ok(Box::new(HfTokenizer::load(name, max_len)?))
    }
}

fn main() {
    let cli = Cli::parse();
    // You can see how many times a particular flag or argument occurred
    // Note, only flags can have multiple occurrences
    let default_log_directive = match cli.globals.debug {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default_log_directive.into())
                .from_env_lossy(),
        )
        .json()
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");

    if let Err(e) = cli.command.execute(&cli.globals) {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        exit(1);
    } else {
        debug!("command executed successfully");
    }
}
