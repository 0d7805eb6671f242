use base64::prelude::{Engine, BASE64_STANDARD};
use hmac::{Hmac, Mac};
use rand::{distr::Alphanumeric, Rng};
use sha2::Sha256;

use super::{ParsedToken, TOKEN_LENGTH};

type HmacSha256 = Hmac<Sha256>;

/// Classify an `Authorization` header value.
///
/// A 32 character value or anything containing `:` is a legacy token.
/// Everything else is treated as a current token: base64 of
/// `{user_id}:{secret}`. Parsing never fails; an undecodable value
/// yields an empty user id, which no directory lookup will match.
pub fn parse_token(authorization: &str) -> ParsedToken {
    if authorization.len() == 32 || authorization.contains(':') {
        let secret = authorization
            .rsplit(':')
            .next()
            .unwrap_or(authorization)
            .to_string();
        ParsedToken::Legacy { secret }
    } else {
        let decoded = BASE64_STANDARD
            .decode(authorization)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .unwrap_or_default();
        let user_id = decoded.split(':').next().unwrap_or_default().to_string();
        ParsedToken::V2 {
            user_id,
            raw: authorization.to_string(),
        }
    }
}

/// Mint a fresh account secret. Returned to the caller exactly once;
/// only the sealed form is ever stored.
pub fn mint_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Seal a secret for storage as lowercase hex of an HMAC-SHA256 tag.
/// Deterministic for a given key, so equality checks go through
/// [`verify_sealed`] rather than re-deriving and comparing strings.
pub fn seal_token(secret: &str, key: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC can take key of any size");
    mac.update(secret.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Check a presented secret against a sealed value in constant time.
/// Malformed sealed values simply fail the check.
pub fn verify_sealed(candidate: &str, sealed: &str, key: &str) -> bool {
    let Ok(expected) = hex::decode(sealed) else {
        return false;
    };
    let mut mac =
        HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC can take key of any size");
    mac.update(candidate.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

/// Metadata field name for an extension id: kebab-case to camelCase,
/// e.g. `google-calendar` becomes `googleCalendar`.
pub fn extension_field(extension_id: &str) -> String {
    extension_id
        .split('-')
        .enumerate()
        .map(|(i, part)| {
            if i == 0 {
                part.to_string()
            } else {
                let mut chars = part.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                    None => String::new(),
                }
            }
        })
        .collect()
}
