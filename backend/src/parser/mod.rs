//! Blob decoding and generic CSV table reading.
//!
//! Turns raw blob bytes into text (UTF-8, with ISO-8859 / Windows-1252
//! fallback via encoding detection) and text into a [`CsvTable`] that row
//! parsers inspect. No election-specific logic here.

use crate::error::{DecodeError, ParseError, ParseResult};

/// UTF-8 byte order mark.
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Detect the encoding of raw bytes using chardet.
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "iso-8859-2" | "latin-2" | "latin2" => "iso-8859-2".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        "windows-1250" | "cp1250" => "windows-1250".to_string(),
        _ => charset,
    }
}

/// Decode bytes using the given encoding.
///
/// UTF-8 is decoded strictly: an invalid sequence is an error, never a
/// replacement character. Single-byte code pages accept almost any byte, so
/// picking the wrong one yields wrong letters, not an error.
pub fn decode_content(bytes: &[u8], encoding: &str) -> Result<String, DecodeError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let codec = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => {
            return String::from_utf8(bytes.to_vec())
                .map_err(|e| DecodeError::InvalidEncoding(format!("invalid UTF-8: {}", e)));
        }
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15,
        "iso-8859-2" | "latin-2" | "latin2" => encoding_rs::ISO_8859_2,
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252,
        "windows-1250" | "cp1250" => encoding_rs::WINDOWS_1250,
        other => {
            return Err(DecodeError::InvalidEncoding(format!(
                "unsupported encoding '{}'",
                other
            )))
        }
    };

    let (text, _, had_errors) = codec.decode(bytes);
    if had_errors {
        return Err(DecodeError::InvalidEncoding(format!(
            "malformed {} content",
            codec.name()
        )));
    }
    Ok(text.into_owned())
}

/// Decode a whole blob to text.
///
/// Valid UTF-8 is taken as-is; anything else goes through encoding detection.
/// Binary content (NUL bytes) is rejected.
///
/// chardet tends to report Latin-2 / Windows-1250 text (Romanian `ş`, `ţ`)
/// as ISO-8859-1, which decodes without error but with the wrong letters.
/// Blobs in a central European code page should be converted to UTF-8
/// upstream, or decoded with [`decode_content`] and an explicit encoding.
pub fn decode_bytes(bytes: &[u8]) -> Result<String, DecodeError> {
    if bytes.contains(&0) {
        return Err(DecodeError::InvalidEncoding(
            "binary content (NUL byte)".to_string(),
        ));
    }
    if let Ok(text) = decode_content(bytes, "utf-8") {
        return Ok(text);
    }
    let encoding = detect_encoding(bytes);
    decode_content(bytes, &encoding)
}

/// Detect the delimiter by counting occurrences in the first line.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// One data row with its 1-based source line.
#[derive(Debug, Clone)]
pub struct CsvRow {
    pub line: usize,
    pub values: Vec<String>,
}

/// A decoded CSV table with normalised (trimmed, lowercase) headers.
#[derive(Debug, Clone, Default)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<CsvRow>,
    pub delimiter: char,
}

impl CsvTable {
    /// Read CSV text with auto-detected delimiter.
    ///
    /// Empty content yields a table without headers; blank lines are skipped.
    pub fn parse(content: &str) -> ParseResult<Self> {
        let delimiter = detect_delimiter(content);
        Self::parse_with_delimiter(content, delimiter)
    }

    pub fn parse_with_delimiter(content: &str, delimiter: char) -> ParseResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self {
                delimiter,
                ..Self::default()
            });
        }

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter as u8)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| ParseError::InvalidCsv(format!("cannot read header: {}", e)))?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_lowercase())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| ParseError::InvalidCsv(e.to_string()))?;
            if record.iter().all(|v| v.is_empty()) {
                continue;
            }
            let line = record.position().map(|p| p.line() as usize).unwrap_or(0);
            rows.push(CsvRow {
                line,
                values: record.iter().map(str::to_string).collect(),
            });
        }

        Ok(Self {
            headers,
            rows,
            delimiter,
        })
    }

    /// Index of a header, case-insensitive.
    pub fn column(&self, name: &str) -> Option<usize> {
        let name = name.to_lowercase();
        self.headers.iter().position(|h| *h == name)
    }

    pub fn has_columns(&self, names: &[&str]) -> bool {
        names.iter().all(|n| self.column(n).is_some())
    }

    /// Cell value, empty when the row is short.
    pub fn value<'a>(&self, row: &'a CsvRow, column: usize) -> &'a str {
        row.values.get(column).map(String::as_str).unwrap_or("")
    }

    /// Cell value parsed as a non-negative count. Empty cells count as zero.
    pub fn count(&self, row: &CsvRow, column: usize) -> ParseResult<u64> {
        let raw = self.value(row, column);
        parse_count(raw).ok_or_else(|| ParseError::InvalidRow {
            line: row.line,
            column: self.headers.get(column).cloned().unwrap_or_default(),
            message: format!("'{}' is not a non-negative integer", raw),
        })
    }
}

fn parse_count(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(0);
    }
    raw.parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_table() {
        let table = CsvTable::parse("Name;Votes\nAlice;30\nBob;25").unwrap();
        assert_eq!(table.delimiter, ';');
        assert_eq!(table.headers, vec!["name", "votes"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].line, 2);
        assert_eq!(table.value(&table.rows[1], 0), "Bob");
    }

    #[test]
    fn test_quoted_values() {
        let table = CsvTable::parse("name,value\n\"Pop, Ana\",\"12\"").unwrap();
        assert_eq!(table.value(&table.rows[0], 0), "Pop, Ana");
        assert_eq!(table.count(&table.rows[0], 1).unwrap(), 12);
    }

    #[test]
    fn test_empty_lines_skipped() {
        let table = CsvTable::parse("a,b\n1,2\n\n3,4\n").unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1].line, 4);
    }

    #[test]
    fn test_empty_content_has_no_headers() {
        let table = CsvTable::parse("").unwrap();
        assert!(table.headers.is_empty());
        assert!(table.rows.is_empty());
    }

    #[test]
    fn test_short_rows_read_as_empty() {
        let table = CsvTable::parse("a,b,c\n1").unwrap();
        assert_eq!(table.value(&table.rows[0], 2), "");
        assert_eq!(table.count(&table.rows[0], 2).unwrap(), 0);
    }

    #[test]
    fn test_count_rejects_garbage() {
        let table = CsvTable::parse("votes\n-3\nabc").unwrap();
        let err = table.count(&table.rows[0], 0).unwrap_err();
        assert!(matches!(err, ParseError::InvalidRow { line: 2, .. }));
        assert!(table.count(&table.rows[1], 0).is_err());
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
        assert_eq!(detect_delimiter("a|b|c"), '|');
        assert_eq!(detect_delimiter("single"), ',');
    }

    #[test]
    fn test_decode_utf8_with_bom() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice("județ".as_bytes());
        assert_eq!(decode_bytes(&bytes).unwrap(), "județ");
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1").unwrap();
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_code_page_choice_changes_letters_not_validity() {
        // "Timiş" in ISO-8859-2; 0xBA is "º" in ISO-8859-1.
        let bytes: &[u8] = b"Timi\xba";
        assert_eq!(decode_content(bytes, "iso-8859-2").unwrap(), "Timiş");
        assert_eq!(decode_content(bytes, "iso-8859-1").unwrap(), "Timiº");
        assert_eq!(decode_content(bytes, "windows-1250").unwrap(), "Timiş");
    }

    #[test]
    fn test_strict_utf8_rejects_invalid() {
        assert!(decode_content(&[0x61, 0xFF, 0x62], "utf-8").is_err());
    }

    #[test]
    fn test_binary_rejected() {
        let err = decode_bytes(&[0x00, 0x01, 0x02]).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidEncoding(_)));
    }

    #[test]
    fn test_unsupported_encoding() {
        assert!(decode_content(b"abc", "klingon").is_err());
    }
}
