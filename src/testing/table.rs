//! Case tables loaded from files
//!
//! Lets a table-driven test keep its rows in YAML or TOML:
//!
//! ```yaml
//! cases:
//!   - name: division
//!     input: [6, 3]
//!     want: 2
//!   - name: division by zero
//!     input: [1, 0]
//!     want_err: true
//!     err: div by zero
//! ```

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::common::{Error, Result};

use super::case::{Case, MessageError};

/// A file of case rows
#[derive(Deserialize, Debug)]
pub struct CaseTable {
    pub cases: Vec<CaseRow>,
}

/// One row as written in a table file
#[derive(Deserialize, Debug)]
pub struct CaseRow {
    pub name: String,
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub want: Value,
    #[serde(default)]
    pub want_err: bool,
    /// Message of the expected error
    pub err: Option<String>,
}

impl From<CaseRow> for Case {
    fn from(row: CaseRow) -> Self {
        Case::new(
            row.name,
            row.input,
            row.want,
            row.want_err,
            row.err.map(MessageError::expected),
        )
    }
}

impl CaseTable {
    pub fn into_cases(self) -> Vec<Case> {
        self.cases.into_iter().map(Case::from).collect()
    }
}

/// Load cases from a `.yaml`, `.yml` or `.toml` file
pub fn load_cases(path: &Path) -> Result<Vec<Case>> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, &e))?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let table = match extension.as_str() {
        "yaml" | "yml" => parse_yaml(&content),
        "toml" => parse_toml(&content),
        other => return Err(Error::UnsupportedTableFormat(other.to_string())),
    }
    .map_err(|e| Error::table_parse(path, e))?;

    tracing::debug!("Loaded {} cases from {}", table.cases.len(), path.display());
    Ok(table.into_cases())
}

/// Parse a YAML case table
pub fn parse_yaml(content: &str) -> Result<CaseTable> {
    Ok(serde_yaml::from_str(content)?)
}

/// Parse a TOML case table (`[[cases]]` array of tables)
pub fn parse_toml(content: &str) -> Result<CaseTable> {
    Ok(toml::from_str(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_parse_yaml_rows() {
        let table = parse_yaml(
            "cases:\n  - name: ok\n    input: [1, 2]\n    want: 3\n  - name: bad\n    want_err: true\n    err: boom\n",
        )
        .unwrap();
        let cases = table.into_cases();

        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].name(), "ok");
        assert_eq!(cases[0].input(), &json!([1, 2]));
        assert_eq!(cases[0].want(), &json!(3));
        assert!(!cases[0].want_err());

        assert!(cases[1].input().is_null());
        assert!(cases[1].want_err());
        assert_eq!(cases[1].err().map(|e| e.to_string()).as_deref(), Some("boom"));
    }

    #[test]
    fn test_parse_toml_rows() {
        let table = parse_toml(
            r#"
            [[cases]]
            name = "upper"
            input = "abc"
            want = "ABC"
            "#,
        )
        .unwrap();
        let cases = table.into_cases();
        assert_eq!(cases[0].input(), &json!("abc"));
        assert_eq!(cases[0].want(), &json!("ABC"));
    }

    #[test]
    fn test_load_rejects_unknown_extension() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(b"{}").unwrap();
        let err = load_cases(file.path()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedTableFormat(ext) if ext == "json"));
    }

    #[test]
    fn test_load_reports_bad_rows() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(b"cases:\n  - input: 1\n").unwrap();
        let err = load_cases(file.path()).unwrap_err();
        assert!(matches!(err, Error::TableParse { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_cases(Path::new("/nonexistent/cases.yaml")).unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));
    }
}
