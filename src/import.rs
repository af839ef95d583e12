//! Bulk import of records from CSV or JSON
//!
//! CSV rows are split positionally on commas:
//!
//! ```text
//! 0 id, 1 -, 2 phone, 3 organization, 4 -, 5 rating, 6 totalReview,
//! 7 category, 8 country, 9 state, 10 city, 11 street, 12 building
//! ```
//!
//! A malformed row never aborts the load. Missing text fields become empty
//! strings and unparseable numbers become not-a-number.

use std::path::Path;

use tracing::{debug, info};

use crate::error::SourceError;
use crate::record::Record;

const ID: usize = 0;
const PHONE: usize = 2;
const ORGANIZATION: usize = 3;
const RATING: usize = 5;
const TOTAL_REVIEW: usize = 6;
const CATEGORY: usize = 7;
const COUNTRY: usize = 8;
const STATE: usize = 9;
const CITY: usize = 10;
const STREET: usize = 11;
const BUILDING: usize = 12;

/// Parse a CSV export into records, one per non-blank line after the header.
pub fn parse_csv(csv: &str) -> Vec<Record> {
    let records: Vec<Record> = csv
        .lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(parse_row)
        .collect();

    let partial = records.iter().filter(|r| !r.is_complete()).count();
    if partial > 0 {
        debug!(partial, "rows with unparseable numeric fields");
    }
    records
}

fn parse_row(line: &str) -> Record {
    let values: Vec<&str> = line.split(',').map(str::trim).collect();
    let text = |i: usize| values.get(i).copied().unwrap_or_default().to_string();
    let field = |i: usize| values.get(i).copied().unwrap_or_default();

    Record {
        id: text(ID),
        phone: text(PHONE),
        organization: unquote(field(ORGANIZATION)).to_string(),
        rating: leading_float(field(RATING)).unwrap_or(f64::NAN),
        total_review: leading_int(field(TOTAL_REVIEW)),
        category: text(CATEGORY),
        country: text(COUNTRY),
        state: text(STATE),
        city: text(CITY),
        street: text(STREET),
        building: leading_int(field(BUILDING)),
    }
}

/// Strip one quote character from each end.
fn unquote(s: &str) -> &str {
    let s = s.strip_prefix('"').unwrap_or(s);
    s.strip_suffix('"').unwrap_or(s)
}

/// Parse the leading run of digits ("12A" -> 12).
fn leading_int(s: &str) -> Option<u64> {
    let end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(s.len(), |(i, _)| i);
    s[..end].parse().ok()
}

/// Parse the longest numeric prefix ("4.5 stars" -> 4.5, ".5" -> 0.5).
fn leading_float(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = if matches!(bytes.first(), Some(b'+' | b'-')) { 1 } else { 0 };
    let int_end = digits_from(end);
    let mut mantissa = int_end > end;
    end = int_end;
    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        mantissa |= frac_end > end + 1;
        end = frac_end;
    }
    if !mantissa {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let sign = usize::from(matches!(bytes.get(end + 1), Some(b'+' | b'-')));
        let exp_end = digits_from(end + 1 + sign);
        if exp_end > end + 1 + sign {
            end = exp_end;
        }
    }
    s[..end].parse().ok()
}

/// Parse a JSON array of records.
pub fn parse_json(json: &str) -> Result<Vec<Record>, serde_json::Error> {
    serde_json::from_str(json)
}

/// Read and parse a dataset file, choosing the format by extension.
pub async fn load(path: &Path) -> Result<Vec<Record>, SourceError> {
    let data = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SourceError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    let is_json = path.extension().is_some_and(|ext| ext == "json");
    let records = if is_json {
        parse_json(&data).map_err(|source| SourceError::Decode {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        parse_csv(&data)
    };

    info!(count = records.len(), path = %path.display(), "imported records");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "id,url,phone,organization,desc,rating,totalReview,category,country,state,city,street,building";

    #[test]
    fn test_two_valid_rows_and_one_malformed() {
        let csv = format!(
            "{HEADER}\n\
             1,u,555-0100,\"Cafe Luna\",d,4.5,120,Cafe,US,CA,Oakland,Main St,12\n\
             2,u,555-0101,Bolt Hardware,d,3,8,Hardware,US,CA,Berkeley,Shattuck Ave,2100\n\
             3,u,555-0102,Broken Row,d\n"
        );

        let records = parse_csv(&csv);
        assert_eq!(records.len(), 3);

        let complete: Vec<_> = records.iter().filter(|r| r.is_complete()).collect();
        assert_eq!(complete.len(), 2);
        assert_eq!(complete[0].organization, "Cafe Luna");
        assert_eq!(complete[0].rating, 4.5);
        assert_eq!(complete[0].total_review, Some(120));
        assert_eq!(complete[1].building, Some(2100));

        let broken = &records[2];
        assert_eq!(broken.id, "3");
        assert_eq!(broken.organization, "Broken Row");
        assert!(broken.rating.is_nan());
        assert_eq!(broken.total_review, None);
        assert_eq!(broken.building, None);
        assert_eq!(broken.city, "");
    }

    #[test]
    fn test_blank_lines_and_crlf_skipped() {
        let csv = format!("{HEADER}\r\n\r\n1,u,p,Org,d,5,1,c,US,CA,SF,St,1\r\n   \n");
        let records = parse_csv(&csv);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].building, Some(1));
    }

    #[test]
    fn test_header_only() {
        assert!(parse_csv(HEADER).is_empty());
        assert!(parse_csv("").is_empty());
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"Acme\""), "Acme");
        assert_eq!(unquote("\"Acme"), "Acme");
        assert_eq!(unquote("Acme"), "Acme");
        assert_eq!(unquote("\"\"Acme\"\""), "\"Acme\"");
    }

    #[test]
    fn test_leading_int() {
        assert_eq!(leading_int("12A"), Some(12));
        assert_eq!(leading_int("300"), Some(300));
        assert_eq!(leading_int("n/a"), None);
        assert_eq!(leading_int(""), None);
    }

    #[test]
    fn test_leading_float() {
        assert_eq!(leading_float("4.5 stars"), Some(4.5));
        assert_eq!(leading_float("4"), Some(4.0));
        assert_eq!(leading_float(".5"), Some(0.5));
        assert_eq!(leading_float("-2.5e1x"), Some(-25.0));
        assert_eq!(leading_float("3e"), Some(3.0));
        assert_eq!(leading_float("n/a"), None);
        assert_eq!(leading_float("."), None);
        assert_eq!(leading_float(""), None);
    }

    #[test]
    fn test_rating_with_trailing_text() {
        let csv = format!("{HEADER}\n1,u,p,Org,d,4.5 stars,1,c,US,CA,SF,St,1\n");
        let records = parse_csv(&csv);
        assert_eq!(records[0].rating, 4.5);
        assert!(records[0].is_complete());
    }

    #[test]
    fn test_parse_json_array() {
        let records = parse_json(
            r#"[{"id":"1","organization":"Cafe","rating":4,"totalReview":2,"building":3}]"#,
        )
        .unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_complete());
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = load(Path::new("/nonexistent/smartlist/data.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Read { .. }));
    }
}
