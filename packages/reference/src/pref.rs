//! Prefecture name ↔ code lookup.
//!
//! Prefecture codes are the JIS X 0401 numbers 1–47. The shapefile download
//! endpoint expects them zero-padded to two digits (see [`PrefCodes::padded_code`]).

use serde::Deserialize;

use crate::ReferenceError;

const PREF_CODE_JSON: &str = include_str!("../assets/pref_code.json");

/// One prefecture row of the bundled JSON list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrefCodeEntry {
    /// Prefecture code (1–47).
    pub pref_code: u8,
    /// Prefecture name (e.g. "北海道", "東京都").
    pub pref_name: String,
}

/// The prefecture code table.
#[derive(Debug, Clone)]
pub struct PrefCodes {
    entries: Vec<PrefCodeEntry>,
}

impl PrefCodes {
    /// Loads the bundled prefecture list.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::Json`] if the embedded JSON is malformed.
    pub fn bundled() -> Result<Self, ReferenceError> {
        Self::from_json(PREF_CODE_JSON)
    }

    /// Parses a JSON array of `{"prefCode": .., "prefName": ..}` objects.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::Json`] if the text is not such an array.
    pub fn from_json(text: &str) -> Result<Self, ReferenceError> {
        let entries: Vec<PrefCodeEntry> = serde_json::from_str(text)?;
        Ok(Self { entries })
    }

    #[must_use]
    pub fn entries(&self) -> &[PrefCodeEntry] {
        &self.entries
    }

    /// Converts a prefecture name to its code.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::PrefectureNotFound`] for an unknown name.
    pub fn name_to_code(&self, name: &str) -> Result<u8, ReferenceError> {
        self.entries
            .iter()
            .find(|e| e.pref_name == name)
            .map(|e| e.pref_code)
            .ok_or_else(|| ReferenceError::PrefectureNotFound {
                name: name.to_string(),
            })
    }

    /// Converts a prefecture code to its name.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::PrefectureCodeNotFound`] for an unknown code.
    pub fn code_to_name(&self, code: u8) -> Result<&str, ReferenceError> {
        self.entries
            .iter()
            .find(|e| e.pref_code == code)
            .map(|e| e.pref_name.as_str())
            .ok_or(ReferenceError::PrefectureCodeNotFound { code })
    }

    /// Converts a prefecture name to its two-digit code string (`"01"`).
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::PrefectureNotFound`] for an unknown name.
    pub fn padded_code(&self, name: &str) -> Result<String, ReferenceError> {
        Ok(format!("{:02}", self.name_to_code(name)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_has_all_prefectures() {
        let prefs = PrefCodes::bundled().unwrap();
        assert_eq!(prefs.entries().len(), 47);
    }

    #[test]
    fn hokkaido_lookup() {
        let prefs = PrefCodes::bundled().unwrap();
        assert_eq!(prefs.name_to_code("北海道").unwrap(), 1);
        assert_eq!(prefs.code_to_name(1).unwrap(), "北海道");
    }

    #[test]
    fn lookups_are_exact_inverses() {
        let prefs = PrefCodes::bundled().unwrap();
        for entry in prefs.entries() {
            assert_eq!(prefs.name_to_code(&entry.pref_name).unwrap(), entry.pref_code);
            assert_eq!(prefs.code_to_name(entry.pref_code).unwrap(), entry.pref_name);
        }
    }

    #[test]
    fn padded_code_keeps_leading_zero() {
        let prefs = PrefCodes::bundled().unwrap();
        assert_eq!(prefs.padded_code("北海道").unwrap(), "01");
        assert_eq!(prefs.padded_code("東京都").unwrap(), "13");
    }

    #[test]
    fn unknown_lookups_fail() {
        let prefs = PrefCodes::bundled().unwrap();
        assert!(matches!(
            prefs.name_to_code("東京"),
            Err(ReferenceError::PrefectureNotFound { .. })
        ));
        assert!(matches!(
            prefs.code_to_name(48),
            Err(ReferenceError::PrefectureCodeNotFound { code: 48 })
        ));
    }

    #[test]
    fn rejects_non_list_json() {
        assert!(PrefCodes::from_json(r#"{"prefCode": 1, "prefName": "北海道"}"#).is_err());
    }
}
