//! Standard area codes (標準地域コード).
//!
//! The bundled file covers every prefecture plus the wards of Sapporo and
//! the Tokyo special wards. A full e-Stat export with the same columns can be
//! loaded with [`StandardAreaCodes::from_path`].

use std::path::Path;

use estat_table::{Table, delimited};

use crate::{ReferenceError, decode_shift_jis};

const STANDARD_AREA_CODES_CSV: &[u8] = include_bytes!("../assets/standard_area_codes.csv");

/// Column holding the five-digit area code.
pub const CODE_COLUMN: &str = "標準地域コード";
/// Column holding the prefecture name.
pub const PREFECTURE_COLUMN: &str = "都道府県";
/// Column holding the designated city / county / subprefecture name.
pub const DISTRICT_COLUMN: &str = "政令市･郡･支庁･振興局等";
/// Column holding the municipality name.
pub const MUNICIPALITY_COLUMN: &str = "市区町村";

/// The standard area code table.
#[derive(Debug, Clone)]
pub struct StandardAreaCodes {
    table: Table,
}

impl StandardAreaCodes {
    /// Loads the bundled area code subset.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::Table`] if the embedded CSV is malformed or
    /// lacks the code column.
    pub fn bundled() -> Result<Self, ReferenceError> {
        Self::from_shift_jis(STANDARD_AREA_CODES_CSV)
    }

    /// Loads a Shift-JIS encoded area code CSV from disk.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::Io`] if the file cannot be read, or
    /// [`ReferenceError::Table`] if it cannot be parsed.
    pub fn from_path(path: &Path) -> Result<Self, ReferenceError> {
        let bytes = std::fs::read(path).map_err(|e| ReferenceError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        log::debug!("Loaded standard area codes from {}", path.display());
        Self::from_shift_jis(&bytes)
    }

    /// Parses Shift-JIS encoded CSV bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::Table`] if the CSV is malformed or lacks
    /// the code column.
    pub fn from_shift_jis(bytes: &[u8]) -> Result<Self, ReferenceError> {
        let table = delimited::read_str(&decode_shift_jis(bytes), b',')?;
        table.text(CODE_COLUMN)?;
        Ok(Self { table })
    }

    #[must_use]
    pub const fn table(&self) -> &Table {
        &self.table
    }

    /// All non-missing values of one column, in file order.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::Table`] if the column does not exist.
    pub fn column(&self, name: &str) -> Result<Vec<&str>, ReferenceError> {
        Ok(self
            .table
            .text(name)?
            .iter()
            .filter_map(Option::as_deref)
            .collect())
    }

    /// All area codes, in file order.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::Table`] if the code column is missing.
    pub fn codes(&self) -> Result<Vec<&str>, ReferenceError> {
        self.column(CODE_COLUMN)
    }

    /// Rows whose `column` contains `word`.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::Table`] if the column does not exist.
    pub fn search(&self, column: &str, word: &str) -> Result<Table, ReferenceError> {
        Ok(self.table.filter_text(column, |v| v.contains(word))?)
    }

    /// Display name of an area code: prefecture, district and municipality
    /// joined with spaces, skipping empty parts.
    #[must_use]
    pub fn name(&self, code: &str) -> Option<String> {
        let codes = self.table.text(CODE_COLUMN).ok()?;
        let row = codes.iter().position(|c| c.as_deref() == Some(code))?;

        let parts: Vec<&str> = [PREFECTURE_COLUMN, DISTRICT_COLUMN, MUNICIPALITY_COLUMN]
            .iter()
            .filter_map(|column| self.table.text(column).ok())
            .filter_map(|values| values[row].as_deref())
            .collect();

        Some(parts.join(" "))
    }
}
