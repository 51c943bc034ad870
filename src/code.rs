//! Room codes: short, easy to read aloud, case-insensitive.

use rand::Rng;

/// Safe character set for room codes (excludes 0/O, 1/I to avoid confusion)
pub const CODE_CHARS: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const CODE_LENGTH: usize = 4;

/// Generate a random room code
pub fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

/// Normalize user input into a canonical room code.
///
/// Returns None when the input can't be a room code at all, so callers can
/// treat it the same as an unknown room.
pub fn normalize_room_code(input: &str) -> Option<String> {
    let code = input.trim().to_ascii_uppercase();
    if code.len() != CODE_LENGTH {
        return None;
    }
    if !code.bytes().all(|b| CODE_CHARS.contains(&b)) {
        return None;
    }
    Some(code)
}
