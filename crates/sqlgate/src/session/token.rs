//! Session token generation

/// Token length in bytes before hex encoding
pub const TOKEN_BYTES: usize = 32;

/// Generate a fresh session token.
///
/// Tokens come from the thread-local CSPRNG and carry no user, plane,
/// time, or password material.
pub fn generate_token() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::random();
    hex::encode(bytes)
}
