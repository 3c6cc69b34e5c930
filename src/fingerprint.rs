//! Request fingerprinting.
//!
//! A [`CacheKey`] identifies a cacheable request by digesting the triple
//! `(provider, prompt, options)`. Options are canonicalized first: object
//! keys are written in sorted order regardless of how the mapping was built,
//! so value-equal option sets always produce the same key.
//!
//! The digest is SHA-256 over length-prefixed fields. It is stable across
//! processes and releases, unlike `DefaultHasher`, which makes keys usable
//! in logs and by the `muninn fingerprint` CLI.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::{MuninnError, Result};

/// Maximum nesting depth accepted in request options.
///
/// Deeper structures are rejected as malformed rather than recursed into.
pub const MAX_OPTIONS_DEPTH: usize = 128;

/// Opaque fixed-length request fingerprint.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex encoding of the full digest.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // first 8 bytes are plenty to tell keys apart in logs
        write!(f, "CacheKey(")?;
        for b in &self.0[..8] {
            write!(f, "{b:02x}")?;
        }
        write!(f, "…)")
    }
}

/// Compute the fingerprint of a request.
///
/// `options` may be any serializable value; it is converted to JSON and
/// written canonically before hashing. Fails with
/// [`MuninnError::MalformedOptions`] when the options cannot be represented
/// as JSON (e.g. maps with non-string keys) or nest deeper than
/// [`MAX_OPTIONS_DEPTH`], and with [`MuninnError::InvalidInput`] when the
/// provider identifier is empty.
///
/// ```rust
/// # use muninn::fingerprint::fingerprint;
/// let a = fingerprint("claude", "hi", &serde_json::json!({"t": 0.2, "max": 5}))?;
/// let b = fingerprint("claude", "hi", &serde_json::json!({"max": 5, "t": 0.2}))?;
/// assert_eq!(a, b);
/// # Ok::<(), muninn::MuninnError>(())
/// ```
pub fn fingerprint<T>(provider: &str, prompt: &str, options: &T) -> Result<CacheKey>
where
    T: Serialize + ?Sized,
{
    if provider.is_empty() {
        return Err(MuninnError::InvalidInput(
            "provider identifier must not be empty".into(),
        ));
    }

    let value =
        serde_json::to_value(options).map_err(|e| MuninnError::MalformedOptions(e.to_string()))?;
    let canonical = canonical_json(&value)?;

    let mut hasher = Sha256::new();
    for field in [provider, prompt, canonical.as_str()] {
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }
    Ok(CacheKey(hasher.finalize().into()))
}

/// Serialize a JSON value with object keys in sorted order and no whitespace.
pub fn canonical_json(value: &Value) -> Result<String> {
    let mut out = String::new();
    write_canonical(value, &mut out, 0)?;
    Ok(out)
}

fn write_canonical(value: &Value, out: &mut String, depth: usize) -> Result<()> {
    if depth > MAX_OPTIONS_DEPTH {
        return Err(MuninnError::MalformedOptions(format!(
            "options nest deeper than {MAX_OPTIONS_DEPTH} levels"
        )));
    }

    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_canonical(item, out, depth + 1)?;
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out, depth + 1)?;
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn key_order_does_not_matter() {
        let mut a = serde_json::Map::new();
        a.insert("temperature".into(), json!(0.7));
        a.insert("max_tokens".into(), json!(256));
        let mut b = serde_json::Map::new();
        b.insert("max_tokens".into(), json!(256));
        b.insert("temperature".into(), json!(0.7));

        let k1 = fingerprint("claude", "hello", &Value::Object(a)).unwrap();
        let k2 = fingerprint("claude", "hello", &Value::Object(b)).unwrap();
        assert_eq!(k1, k2);
    }

    #[test]
    fn nested_key_order_does_not_matter() {
        let k1 = fingerprint("gemini", "p", &json!({"a": {"x": 1, "y": [1, {"q": 1, "p": 2}]}}))
            .unwrap();
        let k2 = fingerprint("gemini", "p", &json!({"a": {"y": [1, {"p": 2, "q": 1}], "x": 1}}))
            .unwrap();
        assert_eq!(k1, k2);
    }

    #[test]
    fn one_character_changes_key() {
        let opts = json!({});
        let k1 = fingerprint("claude", "hello", &opts).unwrap();
        let k2 = fingerprint("claude", "hellp", &opts).unwrap();
        assert_ne!(k1, k2);
    }

    #[test]
    fn provider_is_part_of_key() {
        let opts = json!({});
        let k1 = fingerprint("claude", "hello", &opts).unwrap();
        let k2 = fingerprint("gpt35", "hello", &opts).unwrap();
        assert_ne!(k1, k2);
    }

    #[test]
    fn field_boundaries_are_unambiguous() {
        let opts = json!(null);
        let k1 = fingerprint("ab", "c", &opts).unwrap();
        let k2 = fingerprint("a", "bc", &opts).unwrap();
        assert_ne!(k1, k2);
    }

    #[test]
    fn array_order_matters() {
        let k1 = fingerprint("claude", "x", &json!({"stop": ["a", "b"]})).unwrap();
        let k2 = fingerprint("claude", "x", &json!({"stop": ["b", "a"]})).unwrap();
        assert_ne!(k1, k2);
    }

    #[test]
    fn empty_prompt_is_allowed() {
        assert!(fingerprint("claude", "", &json!({})).is_ok());
    }

    #[test]
    fn empty_provider_is_rejected() {
        let err = fingerprint("", "hello", &json!({})).unwrap_err();
        assert!(matches!(err, MuninnError::InvalidInput(_)));
    }

    #[test]
    fn non_string_map_keys_are_malformed() {
        let mut opts: HashMap<(i32, i32), i32> = HashMap::new();
        opts.insert((1, 2), 3);
        let err = fingerprint("claude", "hello", &opts).unwrap_err();
        assert!(matches!(err, MuninnError::MalformedOptions(_)));
    }

    #[test]
    fn excessive_nesting_is_malformed() {
        let mut value = json!(1);
        for _ in 0..(MAX_OPTIONS_DEPTH + 2) {
            value = json!([value]);
        }
        let err = fingerprint("claude", "hello", &value).unwrap_err();
        assert!(matches!(err, MuninnError::MalformedOptions(_)));
    }

    #[test]
    fn canonical_json_sorts_keys() {
        let s = canonical_json(&json!({"b": 1, "a": {"d": true, "c": null}})).unwrap();
        assert_eq!(s, r#"{"a":{"c":null,"d":true},"b":1}"#);
    }

    #[test]
    fn struct_options_hash_like_equivalent_json() {
        #[derive(Serialize)]
        struct Opts {
            temperature: f64,
            max_tokens: u32,
        }
        let k1 = fingerprint(
            "claude",
            "hi",
            &Opts {
                temperature: 0.5,
                max_tokens: 10,
            },
        )
        .unwrap();
        let k2 = fingerprint("claude", "hi", &json!({"max_tokens": 10, "temperature": 0.5})).unwrap();
        assert_eq!(k1, k2);
    }

    #[test]
    fn hex_encoding_covers_full_digest() {
        let key = fingerprint("claude", "hello", &json!({"a": 1})).unwrap();
        assert_eq!(key.to_hex().len(), 64);
        assert_eq!(key.to_hex(), key.to_string());
    }

    #[test]
    fn digest_layout_is_pinned() {
        let key = fingerprint("claude", "hello", &json!({"a": 1})).unwrap();
        assert_eq!(
            key.to_hex(),
            "24c09dd1f77c70e58c38a24274af04dae29415ef6bf1a890a4c744a4bc945338"
        );
    }

    #[test]
    fn debug_is_abbreviated() {
        let key = fingerprint("claude", "hello", &json!({})).unwrap();
        let dbg = format!("{key:?}");
        assert!(dbg.starts_with("CacheKey("));
        assert!(dbg.len() < 30);
    }
}
