/// Length of the random secret minted for account tokens.
pub const TOKEN_LENGTH: usize = 16;

/// Decoded form of an extension token presented in the `Authorization`
/// header.
///
/// Current tokens are `base64("{user_id}:{secret}")`. The stored
/// metadata keeps the full encoded value, so lookups compare the raw
/// header rather than the decoded secret. Older tokens are either a
/// bare 32 character secret or `{qualifier}:{secret}` and can only be
/// matched by scanning the user directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedToken {
    /// Current generation token carrying the id of the user it was
    /// minted for.
    V2 {
        user_id: String,
        /// The raw header value, which is what gets compared against
        /// stored metadata.
        raw: String,
    },
    /// First generation token. The secret is the last `:` separated
    /// segment of the header, or the whole header when there is no
    /// separator.
    Legacy { secret: String },
}
