//! Answer formatting

/// Render a list of names, one per line or as a JSON array
pub fn render_names(names: &[String], json: bool) -> anyhow::Result<String> {
    if json {
        return Ok(serde_json::to_string(names)?);
    }
    Ok(names.join("\n"))
}

pub fn render_flag(value: bool, json: bool) -> String {
    if json {
        serde_json::json!({ "result": value }).to_string()
    } else {
        value.to_string()
    }
}
