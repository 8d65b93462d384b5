//! Minimal RFC 4180 CSV writing for the blob export path.

/// Quotes a cell when it contains a delimiter, quote, or newline.
fn escape(cell: &str) -> String {
    if cell.contains(',') || cell.contains('"') || cell.contains('\n') || cell.contains('\r') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

/// Renders header + data rows as a CSV document with CRLF line endings.
pub fn write_csv(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    push_row(&mut out, headers);
    for row in rows {
        push_row(&mut out, row);
    }
    out
}

fn push_row(out: &mut String, row: &[String]) {
    let line: Vec<String> = row.iter().map(|cell| escape(cell)).collect();
    out.push_str(&line.join(","));
    out.push_str("\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|x| x.to_string()).collect()
    }

    #[test]
    fn test_plain_rows() {
        let csv = write_csv(&s(&["Id", "Name"]), &[s(&["1", "Home"])]);
        assert_eq!(csv, "Id,Name\r\n1,Home\r\n");
    }

    #[test]
    fn test_cells_with_commas_and_quotes() {
        let csv = write_csv(&s(&["Title"]), &[s(&["Hello, \"World\""])]);
        assert_eq!(csv, "Title\r\n\"Hello, \"\"World\"\"\"\r\n");
    }

    #[test]
    fn test_cells_with_newlines() {
        let csv = write_csv(&s(&["Body"]), &[s(&["line1\nline2"])]);
        assert_eq!(csv, "Body\r\n\"line1\nline2\"\r\n");
    }
}
