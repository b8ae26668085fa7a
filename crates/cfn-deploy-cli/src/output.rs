use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print `label  value` lines with the values aligned in one column.
pub fn print_fields(fields: &[(&str, String)]) {
    print!("{}", format_fields(fields));
}

fn format_fields(fields: &[(&str, String)]) -> String {
    let width = fields.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    fields
        .iter()
        .map(|(label, value)| format!("{label:width$}  {value}\n"))
        .collect()
}
