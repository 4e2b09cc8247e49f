use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

/// Nested sections of a result that read better as their own tables.
const SECTION_KEYS: [&str; 3] = ["allocation", "weights", "points"];

/// Format output as tables using the tabled crate.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => match map.get("result") {
            Some(Value::Object(result)) => print_result(result, map),
            _ => print_fields(map),
        },
        Value::Array(arr) => print_rows(arr),
        _ => println!("{}", value),
    }
}

fn print_result(result: &Map<String, Value>, envelope: &Map<String, Value>) {
    // Scalars and small arrays first, tabular sections after.
    let mut scalars = Map::new();
    let mut sections: Vec<(&str, &Vec<Value>)> = Vec::new();
    for (key, val) in result {
        match val {
            Value::Array(rows) if SECTION_KEYS.contains(&key.as_str()) && is_object_rows(rows) => {
                sections.push((key.as_str(), rows))
            }
            Value::Object(inner) if key == "frontier" => match inner.get("points") {
                Some(Value::Array(rows)) => {
                    sections.push(("frontier", rows));
                    for (k, v) in inner {
                        if k != "points" {
                            scalars.insert(format!("frontier.{}", k), v.clone());
                        }
                    }
                }
                _ => {
                    scalars.insert(key.clone(), val.clone());
                }
            },
            // Chart payload duplicates the frontier section.
            Value::Object(_) if key == "chart" => {}
            _ => {
                scalars.insert(key.clone(), val.clone());
            }
        }
    }

    print_fields(&scalars);
    for (title, rows) in sections {
        println!("\n{}:", title);
        print_rows(rows);
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings.iter().filter_map(|w| w.as_str()) {
                println!("  - {}", w);
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn is_object_rows(rows: &[Value]) -> bool {
    !rows.is_empty() && rows.iter().all(|r| r.is_object())
}

fn print_fields(map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map {
        builder.push_record([key.as_str(), &format_value(val)]);
    }
    println!("{}", Table::from(builder));
}

fn print_rows(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<String> = first.keys().cloned().collect();
        let mut builder = Builder::default();
        builder.push_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(h.as_str()).map(format_value).unwrap_or_default())
                    .collect();
                builder.push_record(row);
            }
        }

        println!("{}", Table::from(builder));
    } else {
        for item in arr {
            println!("{}", format_value(item));
        }
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => format!("{:.6}", f),
            _ => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        Value::Null => "n/a".to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
