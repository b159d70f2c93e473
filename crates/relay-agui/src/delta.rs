//! Minimal JSON patches between two state snapshots

use json_patch::{AddOperation, RemoveOperation, ReplaceOperation};
use jsonptr::{Pointer, Token};
use serde_json::{Map, Value};

use crate::error::Result;

pub use json_patch::PatchOperation;

/// Operations turning `before` into `after`.
///
/// Objects are diffed key by key; any other change, arrays included, replaces
/// the value wholesale. Per object, removals come first and keys are visited
/// in sorted order.
pub fn compute_delta(before: &Value, after: &Value) -> Vec<PatchOperation> {
    let mut ops = Vec::new();
    diff_value(&Pointer::root(), before, after, &mut ops);
    ops
}

/// Apply `ops` to `doc` in place
pub fn apply_delta(doc: &mut Value, ops: &[PatchOperation]) -> Result<()> {
    json_patch::patch(doc, ops)?;
    Ok(())
}

fn diff_value(path: &Pointer, before: &Value, after: &Value, ops: &mut Vec<PatchOperation>) {
    if before == after {
        return;
    }
    match (before, after) {
        (Value::Object(before), Value::Object(after)) => diff_object(path, before, after, ops),
        _ => ops.push(PatchOperation::Replace(ReplaceOperation {
            path: path.clone(),
            value: after.clone(),
        })),
    }
}

fn diff_object(
    path: &Pointer,
    before: &Map<String, Value>,
    after: &Map<String, Value>,
    ops: &mut Vec<PatchOperation>,
) {
    let mut removed: Vec<&String> = before.keys().filter(|k| !after.contains_key(*k)).collect();
    removed.sort();
    for key in removed {
        ops.push(PatchOperation::Remove(RemoveOperation {
            path: child_path(path, key),
        }));
    }

    let mut keys: Vec<&String> = after.keys().collect();
    keys.sort();
    for key in keys {
        let child = child_path(path, key);
        match (before.get(key), after.get(key)) {
            (Some(old), Some(new)) => diff_value(&child, old, new, ops),
            (None, Some(new)) => ops.push(PatchOperation::Add(AddOperation {
                path: child,
                value: new.clone(),
            })),
            _ => {}
        }
    }
}

fn child_path(parent: &Pointer, key: &str) -> Pointer {
    let mut child = parent.clone();
    child.push_back(Token::new(key));
    child
}
