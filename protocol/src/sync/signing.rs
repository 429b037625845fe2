//! Request signatures.
//!
//! ```text
//! message   = lowercase(method) "|" url "|" json(body)
//! signature = ECDSA(SHA-256d(message), request key)
//! ```
//!
//! `url` is the path and query as sent (no scheme or host). A request
//! without a body signs `{}`.

use serde_json::Value;

use crate::crypto::keys::{PrivateKey, PublicKey, Signature};

pub fn request_message(method: &str, url: &str, body: Option<&Value>) -> String {
    let body = match body {
        Some(value) => value.to_string(),
        None => "{}".to_string(),
    };
    format!("{}|{}|{}", method.to_lowercase(), url, body)
}

pub fn sign_request(method: &str, url: &str, body: Option<&Value>, key: &PrivateKey) -> Signature {
    key.sign_message(request_message(method, url, body).as_bytes())
}

pub fn verify_request(
    method: &str,
    url: &str,
    body: Option<&Value>,
    signature: &Signature,
    key: &PublicKey,
) -> bool {
    key.verify_message(request_message(method, url, body).as_bytes(), signature)
}
