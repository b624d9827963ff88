//! Government statistics codes (政府統計コード).

use std::collections::BTreeMap;

use estat_table::{Table, delimited};

use crate::{ReferenceError, decode_shift_jis};

const GOVERNMENT_STATISTICS_CODES_TSV: &[u8] =
    include_bytes!("../assets/government_statistics_codes.tsv");

/// Column holding the eight-digit government statistics code.
pub const CODE_COLUMN: &str = "政府統計コード";
/// Column holding the statistics name.
pub const NAME_COLUMN: &str = "政府統計名";
/// Columns projected by default when listing codes.
pub const DEFAULT_COLUMNS: &[&str] = &[CODE_COLUMN, NAME_COLUMN];

/// The government statistics code table.
#[derive(Debug, Clone)]
pub struct GovStatsCodes {
    table: Table,
}

impl GovStatsCodes {
    /// Loads the bundled Shift-JIS TSV.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::Table`] if the embedded TSV is malformed.
    pub fn bundled() -> Result<Self, ReferenceError> {
        Self::from_shift_jis(GOVERNMENT_STATISTICS_CODES_TSV)
    }

    /// Parses Shift-JIS encoded tab-separated bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::Table`] if the TSV is malformed.
    pub fn from_shift_jis(bytes: &[u8]) -> Result<Self, ReferenceError> {
        let table = delimited::read_str(&decode_shift_jis(bytes), b'\t')?;
        Ok(Self { table })
    }

    #[must_use]
    pub const fn table(&self) -> &Table {
        &self.table
    }

    /// Projects `columns` and returns one map per row, column name → value.
    /// Missing cells are omitted from the row's map.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::Table`] if any column does not exist.
    pub fn records(&self, columns: &[&str]) -> Result<Vec<BTreeMap<String, String>>, ReferenceError> {
        let projected = self.table.select(columns)?;

        let mut records = vec![BTreeMap::new(); projected.len()];
        for column in projected.columns() {
            let Some(values) = column.as_text() else {
                continue;
            };
            for (record, value) in records.iter_mut().zip(values) {
                if let Some(value) = value {
                    record.insert(column.name().to_string(), value.clone());
                }
            }
        }

        Ok(records)
    }

    /// Name of the statistics identified by `code`.
    #[must_use]
    pub fn name(&self, code: &str) -> Option<&str> {
        let codes = self.table.text(CODE_COLUMN).ok()?;
        let names = self.table.text(NAME_COLUMN).ok()?;
        let row = codes.iter().position(|c| c.as_deref() == Some(code))?;
        names[row].as_deref()
    }
}
