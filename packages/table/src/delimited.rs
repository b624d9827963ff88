//! Delimited-text reading and writing for [`Table`].
//!
//! Reading keeps every field as text: empty fields become missing values and
//! nothing is parsed as a number. Writing emits one header row and no index
//! column; geometry cells are rendered as WKT.

use std::collections::BTreeMap;
use std::io::Write;

use wkt::ToWkt as _;

use crate::{Column, ColumnValues, Table, TableError};

/// Parses delimited text with a header row into a string-typed [`Table`].
///
/// Short records are padded with missing values and extra trailing fields
/// are ignored. Repeated header names are disambiguated as `name.1`,
/// `name.2`, ...
///
/// # Errors
///
/// Returns [`TableError::Csv`] if the text is not valid delimited data.
pub fn read_str(text: &str, delimiter: u8) -> Result<Table, TableError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = dedupe_headers(
        reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(i, h)| {
                if i == 0 {
                    h.trim_start_matches('\u{feff}').to_string()
                } else {
                    h.to_string()
                }
            })
            .collect(),
    );

    let mut values: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];

    for result in reader.records() {
        let record = result?;
        for (i, column) in values.iter_mut().enumerate() {
            let cell = record.get(i).filter(|v| !v.is_empty()).map(str::to_string);
            column.push(cell);
        }
    }

    let columns = headers
        .into_iter()
        .zip(values)
        .map(|(name, values)| Column::text(name, values))
        .collect();

    Table::new(columns)
}

fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();

    headers
        .into_iter()
        .map(|header| {
            let count = counts.entry(header.clone()).or_insert(0);
            let name = if *count == 0 {
                header
            } else {
                format!("{header}.{count}")
            };
            *count += 1;
            name
        })
        .collect()
}

/// Writes `table` as comma-separated UTF-8 text with a header row.
///
/// # Errors
///
/// Returns [`TableError::Csv`] or [`TableError::Io`] if writing fails.
pub fn write<W: Write>(table: &Table, writer: W) -> Result<(), TableError> {
    let mut writer = csv::WriterBuilder::new().from_writer(writer);

    writer.write_record(table.column_names())?;

    for row in 0..table.len() {
        let record: Vec<String> = table
            .columns()
            .iter()
            .map(|column| match column.values() {
                ColumnValues::Text(values) => values[row].clone().unwrap_or_default(),
                ColumnValues::Geometry(values) => values[row]
                    .as_ref()
                    .map(|g| g.wkt_string())
                    .unwrap_or_default(),
            })
            .collect();
        writer.write_record(&record)?;
    }

    writer.flush()?;

    Ok(())
}
