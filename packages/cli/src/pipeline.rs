//! Command implementations.
//!
//! Each command runs its steps strictly in sequence: at most one boundary
//! download and one statistics request per invocation.

use std::path::{Path, PathBuf};

use estat_api::EStatClient;
use estat_api_models::{SingleStatsQuery, StatsDataQuery};
use estat_boundary::{BoundaryDownloader, BoundaryNormalizer, load_boundary};
use estat_cli_utils::{IndicatifProgress, MultiProgress};
use estat_export::{write_csv, write_geojson};
use estat_merge::{AREA_CODE_KEYS, fetch_and_merge};
use estat_reference::area::{self, StandardAreaCodes};
use estat_reference::default_ids::{DEFAULT_GOV_STATS_CODE, default_stats_table_ids};
use estat_reference::gov_stats::{self, GovStatsCodes};
use estat_reference::pref::PrefCodes;
use estat_reference::ReferenceError;
use estat_table::Table;

use crate::config::AppConfig;
use crate::error::CliError;

const BOUNDARY_GEOJSON: &str = "boundary.geojson";
const BOUNDARY_CSV: &str = "boundary.csv";
const STATS_IDS_CSV: &str = "stats_ids.csv";
const META_DATA_CSV: &str = "meta_data.csv";
const STATS_CSV: &str = "stats.csv";
const MERGE_BOUNDARY_GEOJSON: &str = "merge_boundary.geojson";
const MERGE_BOUNDARY_CSV: &str = "merge_boundary.csv";

/// Downloads (or reuses) a prefecture's boundary archive and dissolves it to
/// one row per municipality. Writes `boundary.geojson` and `boundary.csv`
/// to the created directory.
pub async fn boundary(
    config: &AppConfig,
    multi: &MultiProgress,
    pref_name: &str,
    download_dir: &Path,
) -> Result<Table, CliError> {
    let pref_code = PrefCodes::bundled()?.padded_code(pref_name)?;
    log::info!("{pref_name} has prefecture code {pref_code}");

    let downloader = BoundaryDownloader::new(config.download_url.clone())?;
    let progress = IndicatifProgress::bytes_bar(multi, "boundary");
    let archive = downloader
        .download(&pref_code, download_dir, false, &progress)
        .await?;

    let shards = load_boundary(&archive)?;
    let normalized = BoundaryNormalizer::default().normalize(&shards)?;

    write_geojson(&normalized, &config.created_dir, BOUNDARY_GEOJSON)?;
    write_csv(&normalized, &config.created_dir, BOUNDARY_CSV)?;

    Ok(normalized)
}

/// Writes the statistics table ids under `gov_stats_code` to
/// `stats_ids.csv`. Offline, the bundled list is written instead.
pub async fn ids(
    config: &AppConfig,
    gov_stats_code: &str,
    output_dir: &Path,
    offline: bool,
) -> Result<PathBuf, CliError> {
    let table = if offline {
        if gov_stats_code != DEFAULT_GOV_STATS_CODE {
            log::warn!(
                "Only ids for {DEFAULT_GOV_STATS_CODE} are bundled; ignoring {gov_stats_code}"
            );
        }
        default_stats_table_ids()?
    } else {
        client(config)?.fetch_stats_list(gov_stats_code).await?
    };

    Ok(write_csv(&table, output_dir, STATS_IDS_CSV)?)
}

/// Writes the classification metadata of one table to `meta_data.csv`.
pub async fn meta(
    config: &AppConfig,
    stats_table_id: &str,
    output_dir: &Path,
) -> Result<PathBuf, CliError> {
    let table = client(config)?.fetch_meta_info(stats_table_id).await?;
    Ok(write_csv(&table, output_dir, META_DATA_CSV)?)
}

/// Writes unfiltered statistics values to `stats.csv`.
pub async fn stats(
    config: &AppConfig,
    query: &StatsDataQuery,
    output_dir: &Path,
) -> Result<PathBuf, CliError> {
    let table = client(config)?.fetch_stats_data(query).await?;
    Ok(write_csv(&table, output_dir, STATS_CSV)?)
}

/// Runs the boundary step, joins one year of statistics onto it and writes
/// `merge_boundary.geojson` (created directory) and `merge_boundary.csv`
/// (`output_dir`).
pub async fn merge_boundary(
    config: &AppConfig,
    multi: &MultiProgress,
    pref_name: &str,
    download_dir: &Path,
    query: &SingleStatsQuery,
    output_dir: &Path,
) -> Result<Table, CliError> {
    let client = client(config)?;
    let boundary = boundary(config, multi, pref_name, download_dir).await?;

    let merged = fetch_and_merge(&client, &boundary, query, AREA_CODE_KEYS).await?;

    write_geojson(&merged, &config.created_dir, MERGE_BOUNDARY_GEOJSON)?;
    write_csv(&merged, output_dir, MERGE_BOUNDARY_CSV)?;

    Ok(merged)
}

/// Prints government statistics codes, projected to `columns` (code and
/// name by default).
pub fn codes(columns: &[String]) -> Result<(), CliError> {
    let codes = GovStatsCodes::bundled()?;
    let columns: Vec<&str> = if columns.is_empty() {
        gov_stats::DEFAULT_COLUMNS.to_vec()
    } else {
        columns.iter().map(String::as_str).collect()
    };

    let records = codes.records(&columns)?;

    println!("{}", columns.join("\t"));
    for record in &records {
        let row: Vec<&str> = columns
            .iter()
            .map(|c| record.get(*c).map_or("", String::as_str))
            .collect();
        println!("{}", row.join("\t"));
    }

    Ok(())
}

/// Prints every prefecture code and name.
pub fn prefs() -> Result<(), CliError> {
    for entry in PrefCodes::bundled()?.entries() {
        println!("{:02}\t{}", entry.pref_code, entry.pref_name);
    }
    Ok(())
}

/// Prints the areas whose `column` contains `word`.
pub fn search_areas(config: &AppConfig, column: &str, word: &str) -> Result<Table, CliError> {
    let areas = area_codes(config)?;
    let found = areas.search(column, word)?;

    let codes = found.text(area::CODE_COLUMN)?;
    if codes.is_empty() {
        log::warn!("No area has {word} in {column}");
    }
    for code in codes.iter().flatten() {
        println!("{code}\t{}", areas.name(code).unwrap_or_default());
    }

    Ok(found)
}

/// Prints the display name of one area code.
pub fn area_name(config: &AppConfig, code: &str) -> Result<String, CliError> {
    let name = area_codes(config)?
        .name(code)
        .ok_or_else(|| ReferenceError::AreaCodeNotFound {
            code: code.to_string(),
        })?;
    println!("{code}\t{name}");
    Ok(name)
}

fn area_codes(config: &AppConfig) -> Result<StandardAreaCodes, CliError> {
    Ok(match &config.area_codes_path {
        Some(path) => StandardAreaCodes::from_path(path)?,
        None => StandardAreaCodes::bundled()?,
    })
}

fn client(config: &AppConfig) -> Result<EStatClient, CliError> {
    Ok(EStatClient::new(config.api_config()?)?)
}

#[cfg(test)]
mod tests {
    use estat_reference::area::MUNICIPALITY_COLUMN;

    use super::*;
    use crate::config::ConfigError;

    fn offline_config() -> AppConfig {
        AppConfig::from_sources(None, |_| None).unwrap()
    }

    #[tokio::test]
    async fn offline_ids_need_no_app_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = ids(&offline_config(), DEFAULT_GOV_STATS_CODE, dir.path(), true)
            .await
            .unwrap();

        assert_eq!(path, dir.path().join(STATS_IDS_CSV));
        let written = std::fs::read_to_string(path).unwrap();
        assert!(written.starts_with("TABLE_INF,STAT_CODE"));
        assert!(written.contains("0000010101"));
    }

    #[tokio::test]
    async fn api_commands_require_app_id() {
        let dir = tempfile::tempdir().unwrap();
        let err = meta(&offline_config(), "0000020201", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Config(ConfigError::MissingAppId)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn unknown_prefecture_fails_before_download() {
        let dir = tempfile::tempdir().unwrap();
        let multi = MultiProgress::new();
        let err = boundary(&offline_config(), &multi, "東京", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CliError::Reference(ReferenceError::PrefectureNotFound { .. })
        ));
    }

    #[test]
    fn unknown_code_column_fails() {
        let err = codes(&["存在しない列".to_string()]).unwrap_err();
        assert!(matches!(err, CliError::Reference(ReferenceError::Table(_))));
    }

    #[test]
    fn area_search_and_lookup() {
        let config = offline_config();
        let found = search_areas(&config, MUNICIPALITY_COLUMN, "千代田").unwrap();
        assert_eq!(found.len(), 1);

        assert_eq!(area_name(&config, "13101").unwrap(), "東京都 千代田区");
        assert!(matches!(
            area_name(&config, "99999"),
            Err(CliError::Reference(ReferenceError::AreaCodeNotFound { .. }))
        ));
    }
}
