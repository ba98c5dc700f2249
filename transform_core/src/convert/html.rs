// HTML table output. Write-only: there is no HTML reader.
use html_escape::encode_text;

use crate::convert::shape::Table;

/// Renders a table as `<table>` markup with a header row. Cell text is
/// entity-escaped; `Null` cells are empty.
pub fn write(table: &Table) -> String {
    let mut out = String::from("<table>\n");
    out.push_str("  <thead>\n    <tr>\n");
    for column in &table.columns {
        out.push_str(&format!("      <th>{}</th>\n", encode_text(column)));
    }
    out.push_str("    </tr>\n  </thead>\n  <tbody>\n");
    for row in &table.rows {
        out.push_str("    <tr>\n");
        for cell in row {
            let text = cell.scalar_text().unwrap_or_default();
            out.push_str(&format!("      <td>{}</td>\n", encode_text(&text)));
        }
        out.push_str("    </tr>\n");
    }
    out.push_str("  </tbody>\n</table>\n");
    out
}
