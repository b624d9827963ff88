//! Default statistics table ids for 社会・人口統計体系 (`00200502`), the
//! statistics whose tables carry standard area codes and join cleanly with
//! boundary data.

use estat_table::{Table, delimited};

use crate::ReferenceError;

const DEFAULT_STATS_TABLE_IDS_CSV: &str = include_str!("../assets/default_stats_table_ids.csv");

/// Government statistics code the bundled table ids belong to.
pub const DEFAULT_GOV_STATS_CODE: &str = "00200502";

/// The bundled statistics table id list, shaped like a `getSimpleStatsList`
/// response (`TABLE_INF`, `STAT_CODE`, `STAT_NAME`, ...).
///
/// # Errors
///
/// Returns [`ReferenceError::Table`] if the embedded CSV is malformed.
pub fn default_stats_table_ids() -> Result<Table, ReferenceError> {
    Ok(delimited::read_str(DEFAULT_STATS_TABLE_IDS_CSV, b',')?)
}
