use crate::table::Table;

/// Quote a field if it contains the delimiter, a quote, or a line break
///
/// Embedded quotes are doubled.
///
/// # Examples
/// ```
/// use datashield::downloader::escape_field;
///
/// assert_eq!(escape_field("plain", ','), "plain");
/// assert_eq!(escape_field("a,b", ','), "\"a,b\"");
/// assert_eq!(escape_field("say \"hi\"", ','), "\"say \"\"hi\"\"\"");
/// ```
pub fn escape_field(value: &str, delimiter: char) -> String {
    let needs_quotes = value.contains(delimiter)
        || value.contains('"')
        || value.contains('\n')
        || value.contains('\r');
    if needs_quotes {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Convert a table to CSV
///
/// Rows are written in table order. The header row is optional.
pub fn to_csv(table: &Table, include_headers: bool) -> String {
    to_csv_with(table, include_headers, |_, _| true)
}

/// Convert a table to CSV, blanking every cell for which `visible` is false
pub fn to_csv_with(
    table: &Table,
    include_headers: bool,
    visible: impl Fn(usize, usize) -> bool,
) -> String {
    let mut csv_content = String::new();

    if include_headers {
        let headers: Vec<String> = table.headers().iter().map(|h| escape_field(h, ',')).collect();
        csv_content.push_str(&headers.join(","));
        csv_content.push('\n');
    }

    for (r, row) in table.rows().iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            if c > 0 {
                csv_content.push(',');
            }
            if visible(r, c) {
                csv_content.push_str(&escape_field(&cell.value().to_string(), ','));
            }
        }
        csv_content.push('\n');
    }

    csv_content
}

/// Convert a table to XLSX bytes
///
/// Headers go on the first worksheet row, values keep their type.
#[cfg(feature = "xlsx")]
pub fn to_xlsx(
    table: &Table,
    visible: impl Fn(usize, usize) -> bool,
) -> Result<Vec<u8>, rust_xlsxwriter::XlsxError> {
    use crate::cell::CellValue;
    use rust_xlsxwriter::{Workbook, Worksheet};

    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();

    for (c, header) in table.headers().iter().enumerate() {
        worksheet.write_string(0, c as u16, header.as_str())?;
    }

    for (r, row) in table.rows().iter().enumerate() {
        let xr = (r + 1) as u32;
        for (c, cell) in row.iter().enumerate() {
            if !visible(r, c) {
                continue;
            }
            let xc = c as u16;
            match cell.value() {
                CellValue::Empty => {}
                CellValue::Number(n) => {
                    worksheet.write_number(xr, xc, *n)?;
                }
                CellValue::Boolean(b) => {
                    worksheet.write_boolean(xr, xc, *b)?;
                }
                CellValue::Text(s) => {
                    worksheet.write_string(xr, xc, s.as_str())?;
                }
            }
        }
    }

    workbook.push_worksheet(worksheet);
    workbook.save_to_buffer()
}
