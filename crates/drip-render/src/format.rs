//! Value formatting and escaping helpers shared by all templates.

/// Abbreviated dollar amount: `$1.2M`, `$340K`, `$950`.
///
/// Rounds half up to one decimal place for millions and to whole thousands
/// otherwise. Integer arithmetic only, so output never depends on float
/// formatting. Values that would round up to `$1000K` are shown as `$1.0M`.
pub fn format_currency(value: u64) -> String {
  if value >= 999_500 {
    let tenths = value.saturating_add(50_000) / 100_000;
    format!("${}.{}M", tenths / 10, tenths % 10)
  } else if value >= 1_000 {
    format!("${}K", (value + 500) / 1_000)
  } else {
    format!("${value}")
  }
}

/// Escape text for inclusion in HTML element content or a quoted attribute.
pub fn escape_html(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for c in s.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#39;"),
      other => out.push(other),
    }
  }
  out
}
