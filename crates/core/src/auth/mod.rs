mod functions;
mod types;

pub use functions::{extension_field, mint_token, parse_token, seal_token, verify_sealed};
pub use types::{ParsedToken, TOKEN_LENGTH};
