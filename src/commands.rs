//! Request payloads and response extraction for the one-shot CLI commands.

use anyhow::{Context, Result, anyhow, bail};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Value, json};

/// `getSettings` request.
pub fn get_settings() -> Value {
    json!({ "getSettings": {} })
}

/// `setZoom` request for zoom factor `level`.
pub fn set_zoom(level: f64) -> Value {
    json!({ "setZoom": { "x": level } })
}

/// `setScene` request for scene `id`.
pub fn set_scene(id: &str) -> Value {
    json!({ "setScene": { "id": id } })
}

/// `setStream` request. `on = true` goes live, `false` ends the stream.
pub fn set_stream(on: bool) -> Value {
    json!({ "setStream": { "on": on } })
}

/// Fail if the producer reported anything but `{"ok": {}}`.
///
/// Responses without a `result` are taken as successful.
pub fn check_result(response: &Value) -> Result<()> {
    match response.get("result") {
        None => Ok(()),
        Some(result) if result.get("ok").is_some() => Ok(()),
        Some(result) => bail!("request failed: {result}"),
    }
}

/// Settings object inside a `getSettings` response.
pub fn settings_data(response: &Value) -> Result<&Value> {
    response
        .pointer("/data/getSettings/data")
        .context("response carries no settings")
}

/// Look up the id of the scene called `name`.
pub fn scene_id<'a>(settings: &'a Value, name: &str) -> Result<&'a str> {
    settings
        .get("scenes")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .find(|scene| scene.get("name").and_then(Value::as_str) == Some(name))
        .and_then(|scene| scene.get("id").and_then(Value::as_str))
        .ok_or_else(|| anyhow!("Unknown scene {name}"))
}

/// Render JSON with four-space indentation.
pub fn pretty(value: &Value) -> Result<String> {
    let mut out = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut ser)?;
    Ok(String::from_utf8(out)?)
}
