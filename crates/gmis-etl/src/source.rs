//! Reading wide CSV source files: encoding fallback, header cleaning, schema
//! validation and numeric cells.

use std::path::Path;

use gmis_core::{ontology::FileSchema, period::PeriodId};

use crate::{Error, Result};

// ─── Encodings ───────────────────────────────────────────────────────────────

/// A text encoding a source file may be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
  /// UTF-8 with an optional byte-order mark.
  Utf8Sig,
  Utf8,
  Legacy(&'static encoding_rs::Encoding),
}

impl TextEncoding {
  pub fn from_label(label: &str) -> Option<Self> {
    match label.trim().to_ascii_lowercase().as_str() {
      "utf-8-sig" | "utf8-sig" => Some(Self::Utf8Sig),
      "utf-8" | "utf8" => Some(Self::Utf8),
      // Windows code page 949 is a superset of EUC-KR; encoding_rs decodes
      // both under the EUC-KR label.
      "cp949" | "ms949" => Some(Self::Legacy(encoding_rs::EUC_KR)),
      other => encoding_rs::Encoding::for_label(other.as_bytes()).map(Self::Legacy),
    }
  }

  pub fn name(self) -> &'static str {
    match self {
      Self::Utf8Sig => "utf-8-sig",
      Self::Utf8 => "utf-8",
      Self::Legacy(enc) => enc.name(),
    }
  }

  /// Decode `bytes` without replacement characters; `None` if any byte
  /// sequence is invalid in this encoding.
  pub fn decode(self, bytes: &[u8]) -> Option<String> {
    match self {
      Self::Utf8Sig => {
        let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        std::str::from_utf8(body).ok().map(str::to_owned)
      }
      Self::Utf8 => std::str::from_utf8(bytes).ok().map(str::to_owned),
      Self::Legacy(enc) => enc
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned()),
    }
  }
}

/// Read `path` and decode it with the first encoding that succeeds.
pub fn read_text(path: &Path, encodings: &[TextEncoding]) -> Result<(String, TextEncoding)> {
  let bytes = std::fs::read(path).map_err(|source| Error::Io { path: path.to_path_buf(), source })?;
  encodings
    .iter()
    .find_map(|enc| enc.decode(&bytes).map(|text| (text, *enc)))
    .ok_or_else(|| Error::Undecodable { path: path.to_path_buf() })
}

// ─── Tables ──────────────────────────────────────────────────────────────────

/// Collapse internal whitespace runs to one space and trim.
pub fn clean_header(raw: &str) -> String { raw.split_whitespace().collect::<Vec<_>>().join(" ") }

/// A parsed CSV file with cleaned headers.
#[derive(Debug, Clone)]
pub struct SourceTable {
  pub headers: Vec<String>,
  pub rows:    Vec<csv::StringRecord>,
}

impl SourceTable {
  pub fn parse(text: &str) -> Result<Self> {
    let mut reader = csv::ReaderBuilder::new()
      .flexible(true)
      .trim(csv::Trim::Fields)
      .from_reader(text.as_bytes());
    let headers = reader.headers()?.iter().map(clean_header).collect();
    let rows = reader.records().collect::<Result<Vec<_>, _>>()?;
    Ok(Self { headers, rows })
  }

  pub fn read(path: &Path, encodings: &[TextEncoding]) -> Result<(Self, TextEncoding)> {
    let (text, encoding) = read_text(path, encodings)?;
    Ok((Self::parse(&text)?, encoding))
  }

  pub fn column(&self, name: &str) -> Option<usize> { self.headers.iter().position(|h| h == name) }

  /// Resolve the columns `schema` declares, failing on any missing required
  /// column.
  pub fn bind(&self, file: &str, schema: &FileSchema) -> Result<BoundColumns> {
    let missing: Vec<String> = schema
      .required_columns()
      .into_iter()
      .filter(|c| self.column(c).is_none())
      .map(str::to_owned)
      .collect();
    if !missing.is_empty() {
      return Err(Error::SchemaMismatch { file: file.to_owned(), missing });
    }

    let col = |name: &str| self.column(name).unwrap_or_default();
    Ok(BoundColumns {
      company:   col(&schema.company_column),
      year:      col(&schema.year_column),
      month:     col(&schema.month_column),
      class:     col(&schema.class_column),
      statement: schema.statement_column.as_deref().and_then(|c| self.column(c)),
      sub_unit:  schema.sub_unit_flag_column.as_deref().and_then(|c| self.column(c)),
    })
  }
}

/// Column positions of a table bound to its [`FileSchema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundColumns {
  pub company:   usize,
  pub year:      usize,
  pub month:     usize,
  pub class:     usize,
  pub statement: Option<usize>,
  pub sub_unit:  Option<usize>,
}

impl BoundColumns {
  pub fn period(&self, row: &csv::StringRecord) -> Option<PeriodId> {
    let year = parse_integer(row.get(self.year)?)?;
    let month = parse_integer(row.get(self.month)?)?;
    PeriodId::new(i32::try_from(year).ok()?, u32::try_from(month).ok()?).ok()
  }
}

/// `"Y"` flag cells.
pub fn is_flagged(row: &csv::StringRecord, column: Option<usize>) -> bool {
  column.and_then(|i| row.get(i)).is_some_and(|v| v.trim() == "Y")
}

// ─── Numbers ─────────────────────────────────────────────────────────────────

/// A numeric cell after parsing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell {
  Empty,
  Unparseable,
  /// Exactly zero; treated as not reported.
  Zero,
  Value(f64),
}

pub fn parse_numeric(raw: &str) -> Cell {
  let trimmed = raw.trim();
  if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
    return Cell::Empty;
  }
  match trimmed.replace(',', "").parse::<f64>() {
    Ok(v) if !v.is_finite() => Cell::Unparseable,
    Ok(v) if v == 0.0 => Cell::Zero,
    Ok(v) => Cell::Value(v),
    Err(_) => Cell::Unparseable,
  }
}

/// Integers that may have been written as floats (`2023.0`).
pub fn parse_integer(raw: &str) -> Option<i64> {
  let trimmed = raw.trim();
  trimmed.parse::<i64>().ok().or_else(|| {
    let v = trimmed.parse::<f64>().ok()?;
    (v.fract() == 0.0 && v.is_finite()).then_some(v as i64)
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn headers_are_whitespace_normalised() {
    assert_eq!(clean_header("  전력기기   매출액\t누계 "), "전력기기 매출액 누계");
    assert_eq!(clean_header("year"), "year");
  }

  #[test]
  fn numeric_cells() {
    assert_eq!(parse_numeric("1,234.5"), Cell::Value(1234.5));
    assert_eq!(parse_numeric("-12"), Cell::Value(-12.0));
    assert_eq!(parse_numeric("0.0001"), Cell::Value(0.0001));
    assert_eq!(parse_numeric("0"), Cell::Zero);
    assert_eq!(parse_numeric("0.00"), Cell::Zero);
    assert_eq!(parse_numeric(""), Cell::Empty);
    assert_eq!(parse_numeric("NaN"), Cell::Empty);
    assert_eq!(parse_numeric("n/a"), Cell::Unparseable);
  }

  #[test]
  fn integers_tolerate_float_notation() {
    assert_eq!(parse_integer("2023"), Some(2023));
    assert_eq!(parse_integer("2023.0"), Some(2023));
    assert_eq!(parse_integer("3.5"), None);
  }

  #[test]
  fn utf8_sig_strips_bom() {
    let bytes = b"\xEF\xBB\xBFyear,month";
    assert_eq!(TextEncoding::Utf8Sig.decode(bytes).unwrap(), "year,month");
  }

  #[test]
  fn falls_back_to_legacy_korean_encoding() {
    let (encoded, _, _) = encoding_rs::EUC_KR.encode("회사,매출액");
    assert!(TextEncoding::Utf8Sig.decode(&encoded).is_none());
    let cp949 = TextEncoding::from_label("cp949").unwrap();
    assert_eq!(cp949.decode(&encoded).unwrap(), "회사,매출액");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.csv");
    std::fs::write(&path, &encoded).unwrap();
    let (text, used) = read_text(&path, &[TextEncoding::Utf8Sig, cp949]).unwrap();
    assert_eq!(text, "회사,매출액");
    assert_eq!(used, cp949);
  }

  #[test]
  fn binding_reports_missing_columns() {
    let table = SourceTable::parse("회사,year,항목,매출액\nMnM,2023,실적,10\n").unwrap();
    let err = table.bind("main.csv", &FileSchema::corporate()).unwrap_err();
    let Error::SchemaMismatch { file, missing } = err else { panic!("expected schema mismatch") };
    assert_eq!(file, "main.csv");
    assert_eq!(missing, ["month", "계정"]);
  }

  #[test]
  fn bound_columns_read_period_and_flags() {
    let table =
      SourceTable::parse("회사,year,month,항목,계정,CIC\nMnM,2023,3.0,실적,IS(연결),Y\n").unwrap();
    let cols = table.bind("main.csv", &FileSchema::corporate()).unwrap();
    let row = &table.rows[0];
    assert_eq!(cols.period(row), PeriodId::new(2023, 3).ok());
    assert!(is_flagged(row, cols.sub_unit));
  }
}
