//! Typed access to a request's `params` object.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::RpcError;

/// Borrowed view of request params. Lookups on absent params fail the same
/// way as lookups of absent keys.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Params<'a>(Option<&'a Value>);

impl<'a> Params<'a> {
    pub(crate) fn new(params: Option<&'a Value>) -> Self {
        Self(params)
    }

    /// `key`, treating `null` as absent.
    pub(crate) fn optional(self, key: &str) -> Option<&'a Value> {
        self.0?.get(key).filter(|v| !v.is_null())
    }

    pub(crate) fn value(self, key: &str) -> Result<&'a Value, RpcError> {
        self.optional(key)
            .ok_or_else(|| invalid(format!("Missing required parameter: {key}")))
    }

    pub(crate) fn string(self, key: &str) -> Result<String, RpcError> {
        match self.value(key)? {
            Value::String(s) => Ok(s.clone()),
            _ => Err(invalid(format!("Parameter '{key}' must be a string"))),
        }
    }

    pub(crate) fn parse<T: DeserializeOwned>(self, key: &str) -> Result<T, RpcError> {
        T::deserialize(self.value(key)?).map_err(|e| invalid(format!("Invalid parameter '{key}': {e}")))
    }
}

pub(crate) fn invalid(message: impl Into<String>) -> RpcError {
    RpcError::InvalidParams {
        message: message.into(),
    }
}
