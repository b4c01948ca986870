//! Shared utilities for the web binding
//!
//! Console logging and conversions between `JsValue` and `serde_json::Value`.

use serde_json::Value;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
extern "C" {
    /// Console.log binding for WASM
    #[wasm_bindgen(js_namespace = console)]
    pub fn log(s: &str);
}

/// Convert a JSON value into a structured-cloneable JS value.
pub fn to_js(value: &Value) -> Result<JsValue, JsValue> {
    js_sys::JSON::parse(&value.to_string())
}

/// Convert message data into JSON.
///
/// Data that cannot be represented as JSON (functions, cycles, `undefined`)
/// becomes `Value::Null` and is ignored by the supervisor like any other noise.
pub fn from_js(data: &JsValue) -> Value {
    if data.is_undefined() || data.is_function() {
        return Value::Null;
    }
    js_sys::JSON::stringify(data)
        .ok()
        .and_then(|s| s.as_string())
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or(Value::Null)
}
