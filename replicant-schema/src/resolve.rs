//! `$ref` resolution against sibling schema files.
//!
//! A `$ref` value is resolved one of two ways:
//!
//! - A *local* pointer (`"#/definitions/foo"`) stays untouched. It is not an
//!   external reference, and self-referential schemas (a recursive tree
//!   shape, say) would inline forever if we expanded these.
//! - Anything else (`"other.json"`, `"other.json#/definitions/foo"`) names a
//!   sibling file, resolved relative to the referencing file's directory,
//!   loaded, optionally narrowed by the `#`-fragment JSON pointer, and
//!   inlined wholesale in place of the `$ref` object — transitively, so the
//!   final document has no external references left in it at all.

use replicant_base::{kind_err, Error, ErrorKind, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub fn resolve_schema_file(path: &Path) -> Result<Value> {
    let dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
    let mut cache = HashMap::new();
    let root = load_json_file(path, &mut cache)?;
    let mut chain = vec![canonical(path)];
    inline_value(&root, &dir, &mut cache, &mut chain)
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn load_json_file(path: &Path, cache: &mut HashMap<PathBuf, Value>) -> Result<Value> {
    let key = canonical(path);
    if let Some(v) = cache.get(&key) {
        return Ok(v.clone());
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::new(ErrorKind::SchemaLoadFailed, e))?;
    let value: Value = serde_json::from_str(&text)
        .map_err(|e| Error::new(ErrorKind::SchemaLoadFailed, e))?;
    cache.insert(key, value.clone());
    Ok(value)
}

fn inline_value(
    value: &Value,
    dir: &Path,
    cache: &mut HashMap<PathBuf, Value>,
    chain: &mut Vec<PathBuf>,
) -> Result<Value> {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(r)) = map.get("$ref") {
                if r.starts_with('#') {
                    // Local pointer: left for the compiled validator to resolve itself.
                    return Ok(value.clone());
                }
                return inline_external_ref(r, dir, cache, chain);
            }
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), inline_value(v, dir, cache, chain)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(arr) => {
            let mut out = Vec::with_capacity(arr.len());
            for v in arr {
                out.push(inline_value(v, dir, cache, chain)?);
            }
            Ok(Value::Array(out))
        }
        other => Ok(other.clone()),
    }
}

fn inline_external_ref(
    r: &str,
    dir: &Path,
    cache: &mut HashMap<PathBuf, Value>,
    chain: &mut Vec<PathBuf>,
) -> Result<Value> {
    let (file_part, pointer) = match r.split_once('#') {
        Some((f, p)) => (f, Some(p)),
        None => (r, None),
    };
    let ref_path = dir.join(file_part);
    let key = canonical(&ref_path);
    if chain.contains(&key) {
        return Err(kind_err(
            ErrorKind::SchemaLoadFailed,
            format!("circular $ref chain resolving {r}"),
        ));
    }
    let doc = load_json_file(&ref_path, cache)?;
    let pointed = match pointer {
        Some(p) if !p.is_empty() => doc.pointer(p).cloned().ok_or_else(|| {
            kind_err(
                ErrorKind::SchemaLoadFailed,
                format!("no such pointer {p} in {file_part}"),
            )
        })?,
        _ => doc,
    };
    let ref_dir = ref_path.parent().unwrap_or(dir).to_path_buf();
    chain.push(key);
    let inlined = inline_value(&pointed, &ref_dir, cache, chain)?;
    chain.pop();
    Ok(inlined)
}
