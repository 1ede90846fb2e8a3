//! Short code generation.
//!
//! Codes are drawn from an alphabet without visually ambiguous characters
//! (`0`/`O`, `1`/`l`/`I`), so they survive being read aloud or retyped.

use rand::Rng;

/// Length used when the caller does not ask for a specific one.
pub const DEFAULT_SHORT_CODE_LENGTH: usize = 5;

/// Shortest code that will ever be generated.
pub const MIN_SHORT_CODE_LENGTH: usize = 4;

const ALPHABET: &[u8] = b"23456789abcdefghijkmnopqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ";

/// Generates a random short code of `length` characters.
///
/// Lengths below [`MIN_SHORT_CODE_LENGTH`] are raised to it.
pub fn generate_random_short_code(length: usize) -> String {
    let length = length.max(MIN_SHORT_CODE_LENGTH);
    let mut rng = rand::rng();

    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..ALPHABET.len());
            ALPHABET[idx] as char
        })
        .collect()
}
