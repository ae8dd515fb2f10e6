//! Hashing dispatch handlers.
//!
//! Binary values cross the boundary as standard base64; `secureHash` digests
//! are lowercase hex.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use super::dispatcher::{core_err, err, json_parse, ok_json, optional_b64, require_str, DResult};
use crate::crypto;
use crate::vault;

/// Args: `{ "password": "...", "salt"?: "<base64>" }`
/// Returns: `{ "hash": "<base64>", "salt": "<base64>" }`
pub fn hash_password(args: &str) -> DResult {
    let data = json_parse(args)?;
    let password = require_str(&data, "password")?;
    let salt = optional_b64(&data, "salt")?;

    let hashed = crypto::hash_password(password, salt.as_deref()).map_err(core_err)?;
    ok_json(serde_json::json!({
        "hash": BASE64.encode(hashed.hash),
        "salt": BASE64.encode(&hashed.salt),
    }))
}

/// Args: `{ "text": "...", "salt"?: "<base64>" }`
/// Returns: `{ "hash": "<hex>", "salt": "<base64>" }`
pub fn secure_hash(args: &str) -> DResult {
    let data = json_parse(args)?;
    let text = require_str(&data, "text")?;
    let salt = optional_b64(&data, "salt")?;

    let (hash, salt) = vault::secure_hash(text, salt.as_deref()).map_err(core_err)?;
    ok_json(serde_json::json!({ "hash": hash, "salt": BASE64.encode(salt) }))
}

/// Args: `{ "text": "...", "hash": "<hex>", "salt": "<base64>" }`
/// Returns: `{ "valid": bool }`
pub fn verify_hash(args: &str) -> DResult {
    let data = json_parse(args)?;
    let text = require_str(&data, "text")?;
    let hash = require_str(&data, "hash")?;
    let salt = BASE64
        .decode(require_str(&data, "salt")?)
        .map_err(|e| err(2, format!("Invalid salt: {}", e)))?;

    ok_json(serde_json::json!({ "valid": vault::verify_hash(text, hash, &salt) }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::dispatcher::tests::parse;

    #[test]
    fn test_hash_password_with_salt_is_deterministic() {
        let salt = BASE64.encode([7u8; 16]);
        let args = serde_json::json!({ "password": "Passw0rd!", "salt": salt }).to_string();
        let a = parse(hash_password(&args));
        let b = parse(hash_password(&args));
        assert_eq!(a["hash"], b["hash"]);
        assert_eq!(a["salt"], salt);
        assert_eq!(BASE64.decode(a["hash"].as_str().unwrap()).unwrap().len(), 32);
    }

    #[test]
    fn test_hash_password_fresh_salt() {
        let a = parse(hash_password(r#"{"password":"Passw0rd!"}"#));
        let b = parse(hash_password(r#"{"password":"Passw0rd!"}"#));
        assert_ne!(a["salt"], b["salt"]);
        assert_ne!(a["hash"], b["hash"]);
        assert_eq!(BASE64.decode(a["salt"].as_str().unwrap()).unwrap().len(), 16);
    }

    #[test]
    fn test_secure_hash_verifies() {
        let hashed = parse(secure_hash(r#"{"text":"pin-1234"}"#));
        let check = |text: &str| {
            let args = serde_json::json!({
                "text": text, "hash": hashed["hash"], "salt": hashed["salt"],
            });
            parse(verify_hash(&args.to_string()))["valid"].as_bool().unwrap()
        };
        assert!(check("pin-1234"));
        assert!(!check("pin-1235"));
    }

    #[test]
    fn test_bad_salt() {
        let (code, _) = hash_password(r#"{"password":"x","salt":"***"}"#).unwrap_err();
        assert_eq!(code, 2);
    }
}
