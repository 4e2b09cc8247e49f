use serde_json::Value;
use std::io;

/// Write output as CSV to stdout.
///
/// A traced frontier is written one point per row, so the output can be fed
/// straight into a plotting tool. Other results fall back to an allocation
/// table or a two-column `field,value` listing.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());
    if let Err(e) = write_csv(&mut wtr, value) {
        eprintln!("CSV output error: {}", e);
    }
}

fn write_csv<W: io::Write>(wtr: &mut csv::Writer<W>, value: &Value) -> csv::Result<()> {
    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    if let Some(points) = frontier_points(result) {
        write_frontier(wtr, points)?;
    } else if let Some(rows) =
        object_rows(result, "allocation").or_else(|| object_rows(result, "weights"))
    {
        write_rows(wtr, rows)?;
    } else if let Value::Object(map) = result {
        wtr.write_record(["field", "value"])?;
        for (key, val) in map {
            wtr.write_record([key.as_str(), &format_csv_value(val)])?;
        }
    } else {
        wtr.write_record([&format_csv_value(result)])?;
    }

    wtr.flush()?;
    Ok(())
}

fn frontier_points(result: &Value) -> Option<&Vec<Value>> {
    result
        .get("frontier")
        .and_then(|f| f.get("points"))
        .and_then(|p| p.as_array())
}

fn object_rows<'a>(result: &'a Value, key: &str) -> Option<&'a Vec<Value>> {
    result
        .get(key)
        .and_then(|v| v.as_array())
        .filter(|rows| !rows.is_empty() && rows.iter().all(|r| r.is_object()))
}

fn write_frontier<W: io::Write>(wtr: &mut csv::Writer<W>, points: &[Value]) -> csv::Result<()> {
    let n_weights = points
        .first()
        .and_then(|p| p.get("weights"))
        .and_then(|w| w.as_array())
        .map(|w| w.len())
        .unwrap_or(0);

    let mut header = vec!["volatility".to_string(), "target_return".to_string()];
    header.extend((0..n_weights).map(|i| format!("w{}", i)));
    wtr.write_record(&header)?;

    for p in points {
        let mut row = vec![
            p.get("volatility").map(format_csv_value).unwrap_or_default(),
            p.get("target_return").map(format_csv_value).unwrap_or_default(),
        ];
        if let Some(Value::Array(ws)) = p.get("weights") {
            row.extend(ws.iter().map(format_csv_value));
        }
        wtr.write_record(&row)?;
    }
    Ok(())
}

fn write_rows<W: io::Write>(wtr: &mut csv::Writer<W>, rows: &[Value]) -> csv::Result<()> {
    let Some(Value::Object(first)) = rows.first() else {
        return Ok(());
    };
    let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
    wtr.write_record(&headers)?;

    for item in rows {
        let row: Vec<String> = headers
            .iter()
            .map(|h| item.get(*h).map(format_csv_value).unwrap_or_default())
            .collect();
        wtr.write_record(&row)?;
    }
    Ok(())
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
