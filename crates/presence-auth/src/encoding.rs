//! Lenient base64 decoding.
//!
//! Identity providers are inconsistent about the alphabet and padding used
//! for key parameters, so every decoder is tried in a fixed order.

use base64::Engine;
use base64::engine::GeneralPurpose;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};

/// Decoders in the order they are attempted.
const DECODERS: [&GeneralPurpose; 4] = [&URL_SAFE_NO_PAD, &STANDARD_NO_PAD, &URL_SAFE, &STANDARD];

/// Decodes `input` with the first decoder that accepts it.
///
/// Returns `None` only when all four variants reject the input.
pub fn decode_lenient(input: &str) -> Option<Vec<u8>> {
    let trimmed = input.trim();
    DECODERS
        .iter()
        .find_map(|engine| engine.decode(trimmed).ok())
}
