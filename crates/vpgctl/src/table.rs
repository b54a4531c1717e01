// CSV reading and writing for tabular rows
//
// Files are written the way spreadsheet tools expect them: every cell quoted,
// CRLF line endings, header first. Reading takes the header row as column
// names and trims surrounding whitespace from every cell.

use std::io::{Read, Write};

use anyhow::{Context, Result};
use csv::{QuoteStyle, ReaderBuilder, Terminator, Trim, WriterBuilder};
use vpgctl_core::TabularRow;

/// Write rows under the given header, in header order
pub fn write_rows<W: Write>(writer: W, columns: &[&str], rows: &[TabularRow]) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::CRLF)
        .from_writer(writer);

    writer.write_record(columns)?;
    for row in rows {
        writer.write_record(columns.iter().map(|column| row.get(column).unwrap_or("")))?;
    }
    writer.flush().context("Failed to flush CSV output")?;
    Ok(())
}

/// Read every data row; the first record is the header
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<TabularRow>> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers().context("Failed to read CSV header")?.clone();
    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to read CSV row {}", index + 1))?;
        rows.push(
            headers
                .iter()
                .zip(record.iter())
                .map(|(column, cell)| (column.to_string(), cell.to_string()))
                .collect(),
        );
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn written_cells_are_quoted_with_crlf() {
        let rows = vec![
            TabularRow::new()
                .with("VM Identifier", "vm1")
                .with("NIC Identifier", "0"),
        ];
        let mut out = Vec::new();

        write_rows(&mut out, &["VM Identifier", "NIC Identifier", "Failover IP"], &rows).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "\"VM Identifier\",\"NIC Identifier\",\"Failover IP\"\r\n\"vm1\",\"0\",\"\"\r\n"
        );
    }

    #[test]
    fn header_names_the_cells() {
        let input = "VPG Name,VM Identifier, NIC Identifier \r\nFinance, vm1 ,0\r\nPayroll,vm2,1\r\n";

        let rows = read_rows(input.as_bytes()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("VM Identifier"), Some("vm1"));
        assert_eq!(rows[0].get("NIC Identifier"), Some("0"));
        assert_eq!(rows[1].get("VPG Name"), Some("Payroll"));
    }

    #[test]
    fn short_rows_leave_columns_missing() {
        let input = "VM Identifier,NIC Identifier,Failover DHCP\nvm1,0\n";

        let rows = read_rows(input.as_bytes()).unwrap();

        assert!(!rows[0].contains("Failover DHCP"));
    }
}
