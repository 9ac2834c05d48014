use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

/// Given the opaque `function`/`kwargs` blobs pulled off a claimed task,
/// produce a result blob or a textual failure description.
///
/// `queueless-core` treats this purely as a boundary — it never inspects
/// the blobs itself. [`FunctionRegistry`] below is the one concrete
/// implementation this workspace ships, standing in for whatever payload
/// carrier and encoding a deployment actually wants.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn call(&self, function: &[u8], kwargs: &[u8]) -> Result<Vec<u8>, String>;
}

type BoxedFn = Box<dyn Fn(&Value) -> Result<Value, String> + Send + Sync>;

/// A name-keyed table of functions, with arguments and results carried as
/// JSON. `function` is the UTF-8 encoded registered name; `kwargs` is a JSON
/// object of keyword arguments; the result is the JSON-encoded return value.
///
/// This is deliberately the simplest executor that implements the trait —
/// it is not meant to be the only possible one. Any other `Executor` impl
/// (a WASM sandbox, a subprocess, a different encoding) plugs into the
/// worker loop exactly the same way.
#[derive(Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, BoxedFn>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Box::new(f));
    }
}

#[async_trait]
impl Executor for FunctionRegistry {
    async fn call(&self, function: &[u8], kwargs: &[u8]) -> Result<Vec<u8>, String> {
        let name =
            std::str::from_utf8(function).map_err(|e| format!("function name was not utf-8: {e}"))?;

        let f = self
            .functions
            .get(name)
            .ok_or_else(|| format!("no function registered with name {name:?}"))?;

        let kwargs: Value = if kwargs.is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_slice(kwargs).map_err(|e| format!("invalid kwargs json: {e}"))?
        };

        let result = f(&kwargs)?;
        serde_json::to_vec(&result).map_err(|e| format!("failed to encode result: {e}"))
    }
}
