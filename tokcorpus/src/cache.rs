//! The on-disk cache of tokenized examples.
//!
//! A cache file holds exactly one MessagePack value: an array of examples, each an array of
//! unsigned integer token ids.  There is no header or version number, so any MessagePack producer
//! that writes a list of lists of non-negative integers produces a readable cache.
use crate::error::{DecodeSnafu, EncodeSnafu, FileIoSnafu, PreconditionSnafu};
use crate::tokenizer::TokenId;
use crate::Result;
use snafu::{ensure, ResultExt};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::*;

/// Where a cache is written when the caller doesn't say otherwise
pub const DEFAULT_CACHE_DESTINATION: &str = "model_cache.msgpack";

/// Write `examples` to a cache file at `path`, replacing whatever was there.
///
/// The data is written to a temporary file next to `path` which is then renamed into place, so a
/// failure part way through never leaves a truncated cache behind.
///
/// Refuses to write an empty cache.
pub fn write_cache(path: impl AsRef<Path>, examples: &[Vec<TokenId>]) -> Result<()> {
    let path = path.as_ref();

    ensure!(
        !examples.is_empty(),
        PreconditionSnafu {
            message: "no data loaded to save"
        }
    );

    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file =
        tempfile::NamedTempFile::new_in(directory).context(FileIoSnafu { path: directory })?;

    {
        let mut writer = BufWriter::new(file.as_file_mut());
        rmp_serde::encode::write(&mut writer, examples).context(EncodeSnafu { path })?;
        writer.flush().context(FileIoSnafu { path })?;
    }

    file.persist(path)
        .map_err(|e| e.error)
        .context(FileIoSnafu { path })?;

    debug!(path = %path.display(), examples = examples.len(), "Wrote cache file");

    Ok(())
}

/// Read every example out of the cache file at `path`.
///
/// An empty cache is returned as-is; it's up to the caller whether that's a problem.
pub fn read_cache(path: impl AsRef<Path>) -> Result<Vec<Vec<TokenId>>> {
    let path = path.as_ref();

    let file = File::open(path).context(FileIoSnafu { path })?;
    let examples: Vec<Vec<TokenId>> =
        rmp_serde::decode::from_read(BufReader::new(file)).context(DecodeSnafu { path })?;

    debug!(path = %path.display(), examples = examples.len(), "Read cache file");

    Ok(examples)
}
