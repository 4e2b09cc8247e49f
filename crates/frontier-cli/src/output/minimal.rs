use serde_json::{Map, Value};

/// Headline fields, most informative first.
const PRIORITY_KEYS: [&str; 5] = [
    "weights",
    "max_sharpe_ratio",
    "sortino_ratio",
    "max_drawdown",
    "expected_return",
];

/// Print only the key answer of a result.
///
/// A pipeline report prints one `SYMBOL pct%` line per holding. Anything else
/// prints the first non-null priority field, or the first field as a fallback.
pub fn print_minimal(value: &Value) {
    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    match result {
        Value::Object(map) => {
            for line in minimal_lines(map) {
                println!("{}", line);
            }
        }
        other => println!("{}", format_minimal(other)),
    }
}

fn minimal_lines(map: &Map<String, Value>) -> Vec<String> {
    if let Some(Value::Array(allocation)) = map.get("allocation") {
        let lines: Vec<String> = allocation
            .iter()
            .filter_map(|entry| {
                let symbol = entry.get("symbol")?.as_str()?;
                let pct = entry.get("weight_pct")?.as_f64()?;
                Some(format!("{} {:.2}%", symbol, pct))
            })
            .collect();
        if !lines.is_empty() {
            return lines;
        }
    }

    for key in PRIORITY_KEYS {
        match map.get(key) {
            Some(Value::Null) | None => continue,
            Some(val) => return vec![format_minimal(val)],
        }
    }

    map.iter()
        .next()
        .map(|(key, val)| vec![format!("{}: {}", key, format_minimal(val))])
        .unwrap_or_default()
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
