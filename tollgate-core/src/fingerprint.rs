//! Deterministic cache keys derived from a request.
//!
//! A fingerprint is the lowercase hex SHA-256 digest over three
//! length-prefixed components:
//!
//! 1. the HTTP method
//! 2. the absolute URL, query string included
//! 3. the normalized body (empty when the request has none)
//!
//! JSON bodies are normalized by sorting object keys recursively, so two
//! bodies that differ only in key order share a fingerprint. Anything that is
//! not JSON is hashed verbatim.
//!
//! ```
//! use http::Method;
//! use tollgate_core::Fingerprint;
//!
//! let a = Fingerprint::compute(&Method::POST, "https://api.test/q", Some(br#"{"a":1,"b":2}"#));
//! let b = Fingerprint::compute(&Method::POST, "https://api.test/q", Some(br#"{"b":2,"a":1}"#));
//! assert_eq!(a, b);
//! assert_eq!(a.as_str().len(), 64);
//! ```

use std::fmt;

use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use smol_str::SmolStr;

/// Cache key for a request, see the [module docs](self) for how it is built.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(SmolStr);

impl Fingerprint {
    /// Computes the fingerprint of a request.
    pub fn compute(method: &Method, url: &str, body: Option<&[u8]>) -> Self {
        let body = body.map(normalize_body).unwrap_or_default();

        let mut hasher = Sha256::new();
        update_part(&mut hasher, method.as_str().as_bytes());
        update_part(&mut hasher, url.as_bytes());
        update_part(&mut hasher, &body);

        Self(SmolStr::new(hex::encode(hasher.finalize())))
    }

    /// Wraps an already computed fingerprint, e.g. one read back from storage.
    pub fn from_hex(hex: impl AsRef<str>) -> Self {
        Self(SmolStr::new(hex))
    }

    /// Returns the hex representation.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Length prefix keeps component boundaries unambiguous: ("GET", "/ab")
// and ("GET/", "ab") must not hash the same.
fn update_part(hasher: &mut Sha256, part: &[u8]) {
    hasher.update((part.len() as u64).to_be_bytes());
    hasher.update(part);
}

fn normalize_body(body: &[u8]) -> Vec<u8> {
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => {
            let mut out = String::with_capacity(body.len());
            write_canonical(&value, &mut out);
            out.into_bytes()
        }
        Err(_) => body.to_vec(),
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(value, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
