//! Initialization file: `key = value` pairs applied through the same
//! path as `setoption`. Missing file is not an error; malformed lines
//! are.

use std::path::Path;

pub fn load(path: &Path) -> Result<Vec<(String, String)>, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    parse(&text)
}

pub fn parse(text: &str) -> Result<Vec<(String, String)>, String> {
    let mut pairs = Vec::new();
    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(format!("line {}: expected `key = value`, got {:?}", lineno + 1, raw));
        };
        let key = key.trim();
        let value = value.trim();
        if key.is_empty() || value.is_empty() {
            return Err(format!("line {}: empty key or value", lineno + 1));
        }
        pairs.push((key.to_string(), value.to_string()));
    }
    Ok(pairs)
}
