use std::io;
use std::path::Path;

use tokenizers::{PaddingParams, Tokenizer, TruncationParams};

/// Loads `tokenizer.json` from a model directory (or an explicit file path).
pub fn load_tokenizer(model_path: &Path) -> io::Result<Tokenizer> {
    let tokenizer_path = if model_path.is_dir() {
        model_path.join("tokenizer.json")
    } else {
        model_path.to_path_buf()
    };

    if !tokenizer_path.exists() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("tokenizer not found: {}", tokenizer_path.display()),
        ));
    }

    Tokenizer::from_file(&tokenizer_path).map_err(io::Error::other)
}

/// Loads a tokenizer that truncates to `max_len` tokens.
///
/// Both BERT models here have a fixed position-embedding table, so longer
/// inputs must be cut rather than rejected.
pub fn load_tokenizer_with_truncation(model_path: &Path, max_len: usize) -> io::Result<Tokenizer> {
    let mut tokenizer = load_tokenizer(model_path)?;

    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: max_len,
            ..Default::default()
        }))
        .map_err(|e| io::Error::other(format!("failed to configure truncation: {e}")))?;

    Ok(tokenizer)
}

/// Like [`load_tokenizer_with_truncation`], additionally padding batches to the longest entry.
pub fn load_tokenizer_for_batches(model_path: &Path, max_len: usize) -> io::Result<Tokenizer> {
    let mut tokenizer = load_tokenizer_with_truncation(model_path, max_len)?;
    tokenizer.with_padding(Some(PaddingParams::default()));
    Ok(tokenizer)
}
