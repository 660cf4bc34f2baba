//! Client-submitted expression evaluation.
//!
//! Expressions are JEXL, evaluated against a read-only context:
//!
//! - `userId`: the session owner
//! - `networks`: `[{ id, name }]`
//! - `buffers`: `[{ id, networkId, networkName, name }]`
//!
//! Transforms: `lower`, `upper`, `length`, `join`.

use relay_core::UserId;
use relay_store::StorageQuery;
use serde_json::{Value, json};
use tracing::debug;

use crate::errors::{Result, SessionError};

fn evaluator() -> jexl_eval::Evaluator<'static> {
    jexl_eval::Evaluator::new()
        .with_transform("lower", |args: &[Value]| {
            let s = args.first().and_then(Value::as_str).unwrap_or("");
            Ok(json!(s.to_lowercase()))
        })
        .with_transform("upper", |args: &[Value]| {
            let s = args.first().and_then(Value::as_str).unwrap_or("");
            Ok(json!(s.to_uppercase()))
        })
        .with_transform("length", |args: &[Value]| {
            let len = match args.first() {
                Some(Value::String(s)) => s.chars().count(),
                Some(Value::Array(a)) => a.len(),
                Some(Value::Object(o)) => o.len(),
                _ => 0,
            };
            Ok(json!(len))
        })
        .with_transform("join", |args: &[Value]| {
            let separator = args.get(1).and_then(Value::as_str).unwrap_or(",");
            let parts: Vec<String> = match args.first() {
                Some(Value::Array(items)) => items.iter().map(render).collect(),
                _ => Vec::new(),
            };
            Ok(json!(parts.join(separator)))
        })
}

/// Render a result: strings as-is, everything else as JSON text.
pub fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Evaluation context for `user`.
pub fn build_context<Q: StorageQuery + ?Sized>(query: &Q, user: UserId) -> Result<Value> {
    Ok(json!({
        "userId": user,
        "networks": query.networks(user)?,
        "buffers": query.buffers(user)?,
    }))
}

/// Evaluate `expression` for `user` and render the result.
pub fn evaluate<Q: StorageQuery + ?Sized>(query: &Q, user: UserId, expression: &str) -> Result<String> {
    let context = build_context(query, user)?;
    let value = evaluator()
        .eval_in_context(expression, &context)
        .map_err(|e| SessionError::Evaluation(e.to_string()))?;
    debug!(user = %user, "expression evaluated");
    Ok(render(&value))
}
