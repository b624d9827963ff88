#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `estat`: command-line client for the e-Stat statistics API.
//!
//! Fetches statistics table ids, table metadata and statistics values, and
//! downloads prefecture boundary shapefiles that can be dissolved per
//! municipality and merged with statistics into GeoJSON / CSV.
//!
//! Logging goes through `indicatif-log-bridge` (via
//! [`estat_cli_utils::init_logger`]) so log lines and the download progress
//! bar never fight for the terminal.

mod config;
mod error;
mod pipeline;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use estat_api_models::{SingleStatsQuery, StatsDataQuery};
use estat_reference::area::MUNICIPALITY_COLUMN;

use crate::config::AppConfig;
use crate::error::CliError;

#[derive(Parser)]
#[command(name = "estat", about = "Command-line client for the e-Stat API")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a prefecture's boundaries and dissolve them per municipality
    Boundary {
        /// Prefecture name (e.g. "東京都")
        #[arg(short = 'p', long = "pref_name")]
        pref_name: String,
        /// Directory the boundary archive is downloaded to
        #[arg(short = 'd', long = "download_dir")]
        download_dir: PathBuf,
    },
    /// Fetch the statistics table ids under a government statistics code
    Ids {
        /// Government statistics code (e.g. "00200502")
        #[arg(short = 'g', long = "gov_stats_code")]
        gov_stats_code: String,
        /// Directory `stats_ids.csv` is written to
        #[arg(short = 'o', long = "output_dir")]
        output_dir: PathBuf,
        /// Write the bundled id list instead of calling the API
        #[arg(long)]
        offline: bool,
    },
    /// Fetch the classification metadata of a statistics table
    Meta {
        /// Statistics table id (also `-st`)
        #[arg(long = "stats_table_id")]
        stats_table_id: String,
        /// Directory `meta_data.csv` is written to
        #[arg(short = 'o', long = "output_dir")]
        output_dir: PathBuf,
    },
    /// Fetch statistics values
    Stats {
        /// Comma-separated standard area codes (e.g. "01101,01103")
        #[arg(short = 'a', long)]
        areas: String,
        /// Comma-separated class codes (e.g. "A1101,A110101")
        #[arg(short = 'c', long = "class_codes")]
        class_codes: String,
        /// Comma-separated years (e.g. "2000,2005")
        #[arg(short = 'y', long)]
        years: String,
        /// Statistics table id (also `-st`)
        #[arg(long = "stats_table_id")]
        stats_table_id: String,
        /// Directory `stats.csv` is written to
        #[arg(short = 'o', long = "output_dir")]
        output_dir: PathBuf,
    },
    /// Fetch boundaries and one year of statistics and merge them on area code
    #[command(name = "merge_boundary")]
    MergeBoundary {
        /// Prefecture name (e.g. "東京都")
        #[arg(short = 'p', long = "pref_name")]
        pref_name: String,
        /// Directory the boundary archive is downloaded to
        #[arg(short = 'd', long = "download_dir")]
        download_dir: PathBuf,
        /// Standard area code
        #[arg(short = 'a', long)]
        area: String,
        /// Class code
        #[arg(short = 'c', long = "class_code")]
        class_code: String,
        /// Year (e.g. "2015")
        #[arg(short = 'y', long)]
        year: String,
        /// Statistics table id (also `-st`)
        #[arg(long = "stats_table_id")]
        stats_table_id: String,
        /// Directory `merge_boundary.csv` is written to
        #[arg(short = 'o', long = "output_dir")]
        output_dir: PathBuf,
    },
    /// List government statistics codes
    Codes {
        /// Columns to print (default: code and name)
        #[arg(long = "column")]
        columns: Vec<String>,
    },
    /// List prefecture codes
    Prefs,
    /// Look up standard area codes
    Areas {
        /// Substring to search for
        #[arg(short = 's', long, conflicts_with = "code", required_unless_present = "code")]
        search: Option<String>,
        /// Column searched by `--search`
        #[arg(short = 'k', long, default_value = MUNICIPALITY_COLUMN)]
        column: String,
        /// Area code to print the name of
        #[arg(short = 'c', long)]
        code: Option<String>,
    },
}

/// Rewrites the two-letter `-st` flag, which clap cannot express as a short
/// option, to `--stats_table_id`.
fn expand_short_flags(args: impl IntoIterator<Item = String>) -> Vec<String> {
    args.into_iter()
        .map(|arg| {
            if arg == "-st" {
                "--stats_table_id".to_string()
            } else if let Some(value) = arg.strip_prefix("-st=") {
                format!("--stats_table_id={value}")
            } else {
                arg
            }
        })
        .collect()
}

#[tokio::main]
async fn main() -> ExitCode {
    let multi = estat_cli_utils::init_logger();
    let cli = Cli::parse_from(expand_short_flags(std::env::args()));

    let result = match AppConfig::load() {
        Ok(config) => run(cli.command, &config, &multi).await,
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(
    command: Commands,
    config: &AppConfig,
    multi: &estat_cli_utils::MultiProgress,
) -> Result<(), CliError> {
    match command {
        Commands::Boundary {
            pref_name,
            download_dir,
        } => {
            let table = pipeline::boundary(config, multi, &pref_name, &download_dir).await?;
            log::info!("{} areas written to {}", table.len(), config.created_dir.display());
        }
        Commands::Ids {
            gov_stats_code,
            output_dir,
            offline,
        } => {
            pipeline::ids(config, &gov_stats_code, &output_dir, offline).await?;
        }
        Commands::Meta {
            stats_table_id,
            output_dir,
        } => {
            pipeline::meta(config, &stats_table_id, &output_dir).await?;
        }
        Commands::Stats {
            areas,
            class_codes,
            years,
            stats_table_id,
            output_dir,
        } => {
            let query =
                StatsDataQuery::from_comma_lists(&stats_table_id, &areas, &class_codes, &years);
            pipeline::stats(config, &query, &output_dir).await?;
        }
        Commands::MergeBoundary {
            pref_name,
            download_dir,
            area,
            class_code,
            year,
            stats_table_id,
            output_dir,
        } => {
            let query = SingleStatsQuery {
                stats_table_id,
                area,
                class_code,
                year,
            };
            let merged = pipeline::merge_boundary(
                config,
                multi,
                &pref_name,
                &download_dir,
                &query,
                &output_dir,
            )
            .await?;
            log::info!("{} merged records", merged.len());
        }
        Commands::Codes { columns } => pipeline::codes(&columns)?,
        Commands::Prefs => pipeline::prefs()?,
        Commands::Areas {
            search,
            column,
            code,
        } => {
            if let Some(code) = code {
                pipeline::area_name(config, &code)?;
            } else if let Some(word) = search {
                pipeline::search_areas(config, &column, &word)?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(expand_short_flags(args.iter().map(|a| (*a).to_string()))).unwrap()
    }

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn st_flag_is_expanded() {
        let cli = parse(&["estat", "meta", "-st", "0000020201", "-o", "out"]);
        let Commands::Meta { stats_table_id, .. } = cli.command else {
            panic!("expected meta");
        };
        assert_eq!(stats_table_id, "0000020201");
    }

    #[test]
    fn merge_boundary_takes_all_flags() {
        let cli = parse(&[
            "estat",
            "merge_boundary",
            "-p",
            "東京都",
            "-d",
            "download",
            "-a",
            "13101",
            "-c",
            "A1101",
            "-y",
            "2015",
            "-st=0000020201",
            "-o",
            "out",
        ]);
        let Commands::MergeBoundary {
            pref_name,
            stats_table_id,
            year,
            ..
        } = cli.command
        else {
            panic!("expected merge_boundary");
        };
        assert_eq!(pref_name, "東京都");
        assert_eq!(stats_table_id, "0000020201");
        assert_eq!(year, "2015");
    }

    #[test]
    fn long_flags_use_underscores() {
        let cli = parse(&[
            "estat",
            "ids",
            "--gov_stats_code",
            "00200502",
            "--output_dir",
            "out",
        ]);
        assert!(matches!(cli.command, Commands::Ids { offline: false, .. }));
    }

    #[test]
    fn areas_needs_search_or_code() {
        assert!(Cli::try_parse_from(["estat", "areas"]).is_err());
        let cli = parse(&["estat", "areas", "-s", "中央区"]);
        let Commands::Areas { column, .. } = cli.command else {
            panic!("expected areas");
        };
        assert_eq!(column, MUNICIPALITY_COLUMN);
    }
}
