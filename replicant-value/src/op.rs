//! The operation model: a tagged record describing one mutation to apply
//! to a value tree. Operations are pure data — applying one only needs
//! the current value and the operation itself.

use crate::Path;
use replicant_base::{kind_err, Error, ErrorKind, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One mutation, targeted at `path`, described by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub path: Path,
    #[serde(flatten)]
    pub kind: OpKind,
}

impl Operation {
    pub fn new(path: Path, kind: OpKind) -> Self {
        Operation { path, kind }
    }

    /// The wire `method` string, e.g. `"array:splice"`.
    pub fn method(&self) -> &'static str {
        self.kind.method()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "args")]
pub enum OpKind {
    #[serde(rename = "overwrite")]
    Overwrite {
        #[serde(rename = "newValue")]
        new_value: Value,
    },
    #[serde(rename = "add")]
    Add {
        prop: String,
        #[serde(rename = "newValue")]
        new_value: Value,
    },
    #[serde(rename = "update")]
    Update {
        prop: String,
        #[serde(rename = "newValue")]
        new_value: Value,
    },
    #[serde(rename = "delete")]
    Delete { prop: String },
    #[serde(rename = "array:splice")]
    ArraySplice {
        start: i64,
        #[serde(rename = "deleteCount")]
        delete_count: i64,
        items: Vec<Value>,
    },
    #[serde(rename = "array:push")]
    ArrayPush { items: Vec<Value> },
    #[serde(rename = "array:pop")]
    ArrayPop,
    #[serde(rename = "array:shift")]
    ArrayShift,
    #[serde(rename = "array:unshift")]
    ArrayUnshift { items: Vec<Value> },
    #[serde(rename = "array:reverse")]
    ArrayReverse,
    #[serde(rename = "array:sort")]
    ArraySort,
    #[serde(rename = "array:copyWithin")]
    ArrayCopyWithin {
        target: i64,
        start: i64,
        end: Option<i64>,
    },
    #[serde(rename = "array:fill")]
    ArrayFill {
        value: Value,
        start: Option<i64>,
        end: Option<i64>,
    },
}

impl OpKind {
    pub fn method(&self) -> &'static str {
        match self {
            OpKind::Overwrite { .. } => "overwrite",
            OpKind::Add { .. } => "add",
            OpKind::Update { .. } => "update",
            OpKind::Delete { .. } => "delete",
            OpKind::ArraySplice { .. } => "array:splice",
            OpKind::ArrayPush { .. } => "array:push",
            OpKind::ArrayPop => "array:pop",
            OpKind::ArrayShift => "array:shift",
            OpKind::ArrayUnshift { .. } => "array:unshift",
            OpKind::ArrayReverse => "array:reverse",
            OpKind::ArraySort => "array:sort",
            OpKind::ArrayCopyWithin { .. } => "array:copyWithin",
            OpKind::ArrayFill { .. } => "array:fill",
        }
    }
}

/// Apply `op` to `value` in place. On `Err`, `value` is left untouched:
/// unknown methods are rejected and the state is not touched, and the
/// same holds for any other structural mismatch.
pub fn apply(value: &mut Value, op: &Operation) -> Result<()> {
    match &op.kind {
        OpKind::Overwrite { new_value } => {
            let target = navigate_mut(value, &op.path)?;
            *target = new_value.clone();
            Ok(())
        }
        OpKind::Add { prop, new_value } | OpKind::Update { prop, new_value } => {
            let container = navigate_mut(value, &op.path)?;
            let obj = as_object_mut(container)?;
            obj.insert(prop.clone(), new_value.clone());
            Ok(())
        }
        OpKind::Delete { prop } => {
            let container = navigate_mut(value, &op.path)?;
            let obj = as_object_mut(container)?;
            obj.remove(prop);
            Ok(())
        }
        OpKind::ArraySplice { start, delete_count, items } => {
            let arr = as_array_mut(navigate_mut(value, &op.path)?)?;
            let start = clamp_index(*start, arr.len());
            let delete_count = (*delete_count).max(0) as usize;
            let end = (start + delete_count).min(arr.len());
            arr.splice(start..end, items.iter().cloned());
            Ok(())
        }
        OpKind::ArrayPush { items } => {
            let arr = as_array_mut(navigate_mut(value, &op.path)?)?;
            arr.extend(items.iter().cloned());
            Ok(())
        }
        OpKind::ArrayPop => {
            let arr = as_array_mut(navigate_mut(value, &op.path)?)?;
            arr.pop();
            Ok(())
        }
        OpKind::ArrayShift => {
            let arr = as_array_mut(navigate_mut(value, &op.path)?)?;
            if !arr.is_empty() {
                arr.remove(0);
            }
            Ok(())
        }
        OpKind::ArrayUnshift { items } => {
            let arr = as_array_mut(navigate_mut(value, &op.path)?)?;
            for (i, item) in items.iter().enumerate() {
                arr.insert(i, item.clone());
            }
            Ok(())
        }
        OpKind::ArrayReverse => {
            let arr = as_array_mut(navigate_mut(value, &op.path)?)?;
            arr.reverse();
            Ok(())
        }
        OpKind::ArraySort => {
            let arr = as_array_mut(navigate_mut(value, &op.path)?)?;
            arr.sort_by(|a, b| js_sort_key(a).cmp(&js_sort_key(b)));
            Ok(())
        }
        OpKind::ArrayCopyWithin { target, start, end } => {
            let arr = as_array_mut(navigate_mut(value, &op.path)?)?;
            let len = arr.len();
            let target = clamp_index(*target, len);
            let start = clamp_index(*start, len);
            let end = end.map(|e| clamp_index(e, len)).unwrap_or(len);
            if start < end {
                let slice: Vec<Value> = arr[start..end].to_vec();
                for (i, v) in slice.into_iter().enumerate() {
                    let pos = target + i;
                    if pos >= len {
                        break;
                    }
                    arr[pos] = v;
                }
            }
            Ok(())
        }
        OpKind::ArrayFill { value: fill_value, start, end } => {
            let arr = as_array_mut(navigate_mut(value, &op.path)?)?;
            let len = arr.len();
            let start = start.map(|s| clamp_index(s, len)).unwrap_or(0);
            let end = end.map(|e| clamp_index(e, len)).unwrap_or(len);
            for slot in arr.iter_mut().take(end).skip(start) {
                *slot = fill_value.clone();
            }
            Ok(())
        }
    }
}

fn clamp_index(i: i64, len: usize) -> usize {
    if i < 0 {
        let from_end = (-i) as usize;
        len.saturating_sub(from_end)
    } else {
        (i as usize).min(len)
    }
}

fn js_sort_key(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut serde_json::Map<String, Value>> {
    value
        .as_object_mut()
        .ok_or_else(|| kind_err(ErrorKind::UnknownOperation, "target path is not an object"))
}

fn as_array_mut(value: &mut Value) -> Result<&mut Vec<Value>> {
    value
        .as_array_mut()
        .ok_or_else(|| kind_err(ErrorKind::UnknownOperation, "target path is not an array"))
}

/// Walk `path` from `value`, returning the node at that path.
fn navigate_mut<'v>(value: &'v mut Value, path: &Path) -> Result<&'v mut Value> {
    let mut cur = value;
    for seg in path.segments() {
        cur = match cur {
            Value::Object(map) => map
                .get_mut(seg)
                .ok_or_else(|| missing_path_err(path))?,
            Value::Array(arr) => {
                let idx: usize = seg.parse().map_err(|_| missing_path_err(path))?;
                arr.get_mut(idx).ok_or_else(|| missing_path_err(path))?
            }
            _ => return Err(missing_path_err(path)),
        };
    }
    Ok(cur)
}

fn missing_path_err(path: &Path) -> Error {
    kind_err(ErrorKind::UnknownOperation, format!("no such path: {path}"))
}

/// Read-only walk of `path` from `value`. Returns `None` if any segment is
/// missing, used by `replicant-observe` to classify `add` vs. `update` and
/// to check the structurally-equal-is-a-no-op rule before building an
/// `Operation`.
pub fn navigate<'v>(value: &'v Value, path: &Path) -> Option<&'v Value> {
    let mut cur = value;
    for seg in path.segments() {
        cur = match cur {
            Value::Object(map) => map.get(seg)?,
            Value::Array(arr) => arr.get(seg.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(cur)
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_add_applies() {
        let mut v = json!({"a": {"b": 1}});
        let op = Operation::new(
            Path::root().child("a"),
            OpKind::Add { prop: "c".into(), new_value: json!(2) },
        );
        apply(&mut v, &op).unwrap();
        assert_eq!(v, json!({"a": {"b": 1, "c": 2}}));
    }

    #[test]
    fn array_splice_applies() {
        let mut v = json!([10, 20, 30]);
        let op = Operation::new(
            Path::root(),
            OpKind::ArraySplice { start: 1, delete_count: 1, items: vec![json!(40), json!(50)] },
        );
        apply(&mut v, &op).unwrap();
        assert_eq!(v, json!([10, 40, 50, 30]));
    }

    #[test]
    fn delete_removes_key() {
        let mut v = json!({"a": 1, "b": 2});
        let op = Operation::new(Path::root(), OpKind::Delete { prop: "a".into() });
        apply(&mut v, &op).unwrap();
        assert_eq!(v, json!({"b": 2}));
    }

    #[test]
    fn unknown_path_leaves_value_untouched() {
        let mut v = json!({"a": 1});
        let before = v.clone();
        let op = Operation::new(
            Path::root().child("missing"),
            OpKind::Add { prop: "x".into(), new_value: json!(1) },
        );
        assert!(apply(&mut v, &op).is_err());
        assert_eq!(v, before);
    }

    #[test]
    fn wire_shape_matches_spec() {
        let op = Operation::new(
            Path::root().child("a"),
            OpKind::Add { prop: "c".into(), new_value: json!(2) },
        );
        let wire = serde_json::to_value(&op).unwrap();
        assert_eq!(
            wire,
            json!({"path": "/a", "method": "add", "args": {"prop": "c", "newValue": 2}})
        );
    }

    #[test]
    fn array_sort_default_is_lexicographic_on_stringified_elements() {
        let mut v = json!([10, 2, 1]);
        let op = Operation::new(Path::root(), OpKind::ArraySort);
        apply(&mut v, &op).unwrap();
        // JS default sort: "1" < "10" < "2"
        assert_eq!(v, json!([1, 10, 2]));
    }
}
