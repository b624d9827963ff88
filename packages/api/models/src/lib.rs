#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Query and endpoint types for the e-Stat "simple" REST API.
//!
//! These types carry no HTTP logic; they describe which endpoint is called,
//! which filters are sent, and how yearly time codes are formed.

/// Suffix e-Stat appends to a four-digit year to form a yearly time code
/// (`"2000"` → `"2000100000"`).
pub const TIME_CODE_SUFFIX: &str = "100000";

/// Builds the yearly time code for `year`.
#[must_use]
pub fn time_code(year: &str) -> String {
    format!("{year}{TIME_CODE_SUFFIX}")
}

/// The three fixed e-Stat endpoints consumed by this toolchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Statistics table id list under a government statistics code.
    StatsList,
    /// Classification metadata of one statistics table.
    MetaInfo,
    /// Statistics values of one table.
    StatsData,
}

impl Endpoint {
    /// Path segment appended to the API base URL.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::StatsList => "getSimpleStatsList",
            Self::MetaInfo => "getSimpleMetaInfo",
            Self::StatsData => "getSimpleStatsData",
        }
    }

    /// Quoted section name on the line right before the CSV payload.
    #[must_use]
    pub const fn section_marker(self) -> &'static str {
        match self {
            Self::StatsList | Self::StatsData => "STAT_INF",
            Self::MetaInfo => "CLASS_INF",
        }
    }
}

/// Filters for a `getSimpleStatsData` request. Each list is sent
/// comma-joined; years are sent as time codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsDataQuery {
    /// Statistics table id (e.g. "0000020201").
    pub stats_table_id: String,
    /// Standard area codes.
    pub areas: Vec<String>,
    /// `cat01` classification codes.
    pub class_codes: Vec<String>,
    /// Four-digit years.
    pub years: Vec<String>,
}

impl StatsDataQuery {
    /// Builds a query from comma-separated filter strings, as typed on the
    /// command line (`"01101,01103"`).
    #[must_use]
    pub fn from_comma_lists(
        stats_table_id: &str,
        areas: &str,
        class_codes: &str,
        years: &str,
    ) -> Self {
        Self {
            stats_table_id: stats_table_id.to_string(),
            areas: split_list(areas),
            class_codes: split_list(class_codes),
            years: split_list(years),
        }
    }

    /// `cdArea` parameter value.
    #[must_use]
    pub fn area_filter(&self) -> String {
        self.areas.join(",")
    }

    /// `cdCat01` parameter value.
    #[must_use]
    pub fn class_filter(&self) -> String {
        self.class_codes.join(",")
    }

    /// `cdTime` parameter value: every year with [`TIME_CODE_SUFFIX`].
    #[must_use]
    pub fn time_filter(&self) -> String {
        self.years
            .iter()
            .map(|y| time_code(y))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// A single-area, single-class, single-year statistics request, as used by
/// the boundary merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleStatsQuery {
    /// Statistics table id.
    pub stats_table_id: String,
    /// Standard area code.
    pub area: String,
    /// `cat01` classification code.
    pub class_code: String,
    /// Four-digit year.
    pub year: String,
}

impl SingleStatsQuery {
    /// The time code rows must start with to be kept.
    #[must_use]
    pub fn time_code(&self) -> String {
        time_code(&self.year)
    }

    /// The equivalent one-element-per-filter [`StatsDataQuery`].
    #[must_use]
    pub fn to_query(&self) -> StatsDataQuery {
        StatsDataQuery {
            stats_table_id: self.stats_table_id.clone(),
            areas: vec![self.area.clone()],
            class_codes: vec![self.class_code.clone()],
            years: vec![self.year.clone()],
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_code_appends_suffix() {
        assert_eq!(time_code("2000"), "2000100000");
    }

    #[test]
    fn comma_lists_round_trip_to_filters() {
        let query =
            StatsDataQuery::from_comma_lists("0000020201", "01101,01103", "A1101", "2000, 2005");
        assert_eq!(query.area_filter(), "01101,01103");
        assert_eq!(query.class_filter(), "A1101");
        assert_eq!(query.time_filter(), "2000100000,2005100000");
    }

    #[test]
    fn single_query_expands() {
        let single = SingleStatsQuery {
            stats_table_id: "0000020201".into(),
            area: "13101".into(),
            class_code: "A1101".into(),
            year: "2015".into(),
        };
        assert_eq!(single.time_code(), "2015100000");
        assert_eq!(single.to_query().time_filter(), "2015100000");
    }

    #[test]
    fn endpoints_and_markers() {
        assert_eq!(Endpoint::StatsData.path(), "getSimpleStatsData");
        assert_eq!(Endpoint::MetaInfo.section_marker(), "CLASS_INF");
        assert_eq!(Endpoint::StatsList.section_marker(), "STAT_INF");
    }
}
