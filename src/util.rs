//! Utility functions shared across the pipeline.

use std::borrow::Cow;

/// Decode bytes to a string, handling the encodings reference pages ship in.
///
/// Tries UTF-8 first (handles BOM automatically via encoding_rs), then falls
/// back to Windows-1252, the common encoding of legacy reference pages
/// (superset of ISO-8859-1).
///
/// Uses `Cow<str>` to avoid allocation when the input is valid UTF-8.
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);

    if !malformed {
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}
