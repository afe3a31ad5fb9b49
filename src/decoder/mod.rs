//! Save-format decoding into a generic document tree.
//!
//! Extractors only depend on the [`SaveDecoder`] contract: bytes in, a
//! `serde_json::Value` tree out. [`TextDecoder`] hands the clausewitz text
//! that Stellaris writes for both normal and ironman saves to `jomini`.

use jomini::json::{DuplicateKeyMode, JsonOptions};
use jomini::TextTape;
use serde_json::Value;

use crate::error::Error;

/// Decodes the raw `gamestate` entry into a document tree.
pub trait SaveDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Value, Error>;
}

/// Clausewitz text decoder backed by `jomini`.
///
/// Repeated keys are grouped into an array in order of appearance, keys are
/// kept verbatim, and unquoted scalars become numbers or booleans when they
/// parse as such.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextDecoder;

impl SaveDecoder for TextDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Value, Error> {
        let tape = TextTape::from_slice(bytes)?;
        let options = JsonOptions::new().with_duplicate_keys(DuplicateKeyMode::Group);

        let mut json = Vec::with_capacity(bytes.len());
        tape.utf8_reader().json().with_options(options).to_writer(&mut json)?;
        Ok(serde_json::from_slice(&json)?)
    }
}
