//! Reads a boundary shapefile, bare or zipped, into a [`Table`].
//!
//! Attribute columns come first in `.dbf` field order, followed by the
//! [`GEOMETRY_COLUMN`]. Every attribute value is kept as text, decoded with
//! the code page named by the `.cpg` sidecar, or Shift-JIS when there is
//! none.

use std::io::{Cursor, Read, Seek};
use std::path::Path;

use dbase::FieldValue;
use dbase::encoding::EncodingRs;
use encoding_rs::{Encoding, SHIFT_JIS, UTF_8};
use estat_table::{Column, GEOMETRY_COLUMN, Table};
use geo::MultiPolygon;
use shapefile::{Shape, ShapeReader};

use crate::BoundaryError;

/// Loads a `.shp` (with its sibling `.dbf`) or a `.zip` holding one.
///
/// # Errors
///
/// Returns [`BoundaryError::NotAFile`] if `path` is not a regular file,
/// [`BoundaryError::UnsupportedExtension`] for any other extension, or a
/// read error from the shapefile or archive.
pub fn load_boundary(path: &Path) -> Result<Table, BoundaryError> {
    log::info!("Reading {}", path.display());

    if !path.is_file() {
        return Err(BoundaryError::NotAFile {
            path: path.display().to_string(),
        });
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    match extension.as_str() {
        "shp" => load_shp(path),
        "zip" => load_zip(path),
        _ => Err(BoundaryError::UnsupportedExtension {
            path: path.display().to_string(),
        }),
    }
}

fn load_shp(path: &Path) -> Result<Table, BoundaryError> {
    let cpg_path = path.with_extension("cpg");
    let cpg = if cpg_path.is_file() {
        Some(std::fs::read(&cpg_path).map_err(|e| BoundaryError::Io {
            path: cpg_path.display().to_string(),
            source: e,
        })?)
    } else {
        None
    };

    let shapes = ShapeReader::from_path(path)?;
    let records = dbase::Reader::from_path_with_encoding(
        path.with_extension("dbf"),
        dbf_encoding(cpg.as_deref()),
    )?;
    read_shapes(shapes, records)
}

/// Reads the `.shp` and `.dbf` members into memory; nothing is extracted to
/// disk.
fn load_zip(path: &Path) -> Result<Table, BoundaryError> {
    let file = std::fs::File::open(path).map_err(|e| BoundaryError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let mut archive = zip::ZipArchive::new(file)?;

    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    let shp_name = names
        .iter()
        .find(|name| has_extension(name, "shp"))
        .ok_or_else(|| BoundaryError::ShapefileNotInArchive {
            path: path.display().to_string(),
        })?;
    let stem = &shp_name[..shp_name.len() - ".shp".len()];
    let sibling = |extension: &str| {
        names.iter().find(|name| {
            name.len() == shp_name.len() && name.starts_with(stem) && has_extension(name, extension)
        })
    };
    let dbf_name = sibling("dbf").ok_or_else(|| BoundaryError::DbfNotInArchive {
        path: path.display().to_string(),
        shp: shp_name.clone(),
    })?;
    let cpg_name = sibling("cpg");

    log::debug!("Using {shp_name} and {dbf_name} from {}", path.display());

    let shp = read_member(&mut archive, shp_name)?;
    let dbf = read_member(&mut archive, dbf_name)?;
    let cpg = cpg_name
        .map(|name| read_member(&mut archive, name))
        .transpose()?;

    let shapes = ShapeReader::new(Cursor::new(shp))?;
    let records = dbase::Reader::new_with_encoding(Cursor::new(dbf), dbf_encoding(cpg.as_deref()))?;
    read_shapes(shapes, records)
}

fn dbf_encoding(cpg: Option<&[u8]>) -> EncodingRs {
    let encoding = code_page(cpg);
    log::debug!("Reading attributes as {}", encoding.name());
    EncodingRs::from(encoding)
}

/// Attribute text encoding from `.cpg` contents. Windows code page numbers
/// and WHATWG labels are understood; anything else is read as Shift-JIS.
fn code_page(cpg: Option<&[u8]>) -> &'static Encoding {
    let Some(bytes) = cpg else {
        return SHIFT_JIS;
    };

    let label = String::from_utf8_lossy(bytes).trim().to_ascii_lowercase();
    match label.as_str() {
        "932" | "cp932" | "ms932" | "windows-932" => SHIFT_JIS,
        "65001" | "utf8" => UTF_8,
        other => Encoding::for_label(other.as_bytes()).unwrap_or_else(|| {
            log::warn!("Unknown code page {label:?}, reading attributes as Shift-JIS");
            SHIFT_JIS
        }),
    }
}

fn has_extension(name: &str, extension: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

fn read_member<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> Result<Vec<u8>, BoundaryError> {
    let mut member = archive.by_name(name)?;
    let mut bytes = Vec::new();
    member
        .read_to_end(&mut bytes)
        .map_err(|e| BoundaryError::Io {
            path: name.to_string(),
            source: e,
        })?;
    Ok(bytes)
}

fn read_shapes<T: Read + Seek, D: Read + Seek>(
    shapes: ShapeReader<T>,
    records: dbase::Reader<D>,
) -> Result<Table, BoundaryError> {
    let field_names: Vec<String> = records
        .fields()
        .iter()
        .map(|field| field.name().to_string())
        .collect();

    let mut attributes: Vec<Vec<Option<String>>> = vec![Vec::new(); field_names.len()];
    let mut geometries: Vec<Option<MultiPolygon<f64>>> = Vec::new();
    let mut skipped = 0usize;

    let mut reader = shapefile::Reader::new(shapes, records);
    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result?;

        let geometry = match shape {
            Shape::Polygon(polygon) => Some(to_multi_polygon(polygon)?),
            Shape::PolygonM(polygon) => Some(to_multi_polygon(polygon)?),
            Shape::PolygonZ(polygon) => Some(to_multi_polygon(polygon)?),
            Shape::NullShape => None,
            other => {
                skipped += 1;
                log::warn!("Skipping non-polygon shape {:?}", other.shapetype());
                continue;
            }
        };

        for (name, values) in field_names.iter().zip(attributes.iter_mut()) {
            values.push(record.get(name).and_then(field_value_to_string));
        }
        geometries.push(geometry);
    }

    log::info!(
        "Read {} shapes with {} attribute columns ({skipped} skipped)",
        geometries.len(),
        field_names.len()
    );

    let mut columns: Vec<Column> = field_names
        .into_iter()
        .zip(attributes)
        .map(|(name, values)| Column::text(name, values))
        .collect();
    columns.push(Column::geometry(GEOMETRY_COLUMN, geometries));

    Ok(Table::new(columns)?)
}

fn to_multi_polygon<P>(polygon: P) -> Result<MultiPolygon<f64>, BoundaryError>
where
    P: TryInto<MultiPolygon<f64>>,
    P::Error: std::fmt::Debug,
{
    polygon.try_into().map_err(|e| BoundaryError::Geometry {
        message: format!("{e:?}"),
    })
}

fn field_value_to_string(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Character(value) => value.clone(),
        FieldValue::Memo(value) => Some(value.clone()),
        FieldValue::Numeric(value) => value.map(|n| n.to_string()),
        FieldValue::Float(value) => value.map(|n| n.to_string()),
        FieldValue::Logical(value) => value.map(|b| b.to_string()),
        FieldValue::Integer(value) => Some(value.to_string()),
        FieldValue::Double(value) => Some(value.to_string()),
        other => Some(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use dbase::{FieldName, Record, TableWriterBuilder};
    use shapefile::{Point, Polygon, PolygonRing};

    use super::*;

    fn square(x: f64, y: f64) -> Polygon {
        Polygon::new(PolygonRing::Outer(vec![
            Point::new(x, y),
            Point::new(x, y + 1.0),
            Point::new(x + 1.0, y + 1.0),
            Point::new(x + 1.0, y),
            Point::new(x, y),
        ]))
    }

    fn write_fixture(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("h27ka13.shp");
        let table = TableWriterBuilder::new()
            .add_character_field(FieldName::try_from("KEY_CODE").unwrap(), 11)
            .add_character_field(FieldName::try_from("PREF").unwrap(), 2)
            .add_character_field(FieldName::try_from("CITY").unwrap(), 3);
        let mut writer = shapefile::Writer::from_path(&path, table).unwrap();

        for (x, key, city) in [(0.0, "13101001001", "101"), (1.0, "13101001002", "101")] {
            let mut record = Record::default();
            record.insert("KEY_CODE".to_string(), FieldValue::Character(Some(key.to_string())));
            record.insert("PREF".to_string(), FieldValue::Character(Some("13".to_string())));
            record.insert("CITY".to_string(), FieldValue::Character(Some(city.to_string())));
            writer
                .write_shape_and_record(&square(x, 0.0), &record)
                .unwrap();
        }

        drop(writer);
        path
    }

    #[test]
    fn reads_shp_with_text_attributes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path());

        let table = load_boundary(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.column_names(),
            vec!["KEY_CODE", "PREF", "CITY", GEOMETRY_COLUMN]
        );
        assert_eq!(table.text("PREF").unwrap()[0].as_deref(), Some("13"));
        assert!(table.geometry().unwrap().as_geometry().unwrap()[0].is_some());
    }

    #[test]
    fn reads_zip_without_extracting() {
        let dir = tempfile::tempdir().unwrap();
        let shp = write_fixture(dir.path());

        let zip_path = dir.path().join("A002005212015DDSWC13.zip");
        let file = std::fs::File::create(&zip_path).unwrap();
        let mut zip_writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for ext in ["shp", "shx", "dbf"] {
            let member = shp.with_extension(ext);
            zip_writer
                .start_file(member.file_name().unwrap().to_str().unwrap(), options)
                .unwrap();
            zip_writer.write_all(&std::fs::read(&member).unwrap()).unwrap();
        }
        zip_writer.finish().unwrap();

        let extracted = tempfile::tempdir().unwrap();
        std::fs::copy(&zip_path, extracted.path().join("only.zip")).unwrap();

        let table = load_boundary(&extracted.path().join("only.zip")).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.text("KEY_CODE").unwrap()[1].as_deref(),
            Some("13101001002")
        );
        assert_eq!(std::fs::read_dir(extracted.path()).unwrap().count(), 1);
    }

    #[test]
    fn zip_without_shapefile_fails() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("empty.zip");
        let mut zip_writer = zip::ZipWriter::new(std::fs::File::create(&zip_path).unwrap());
        zip_writer
            .start_file("readme.txt", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip_writer.write_all(b"nothing").unwrap();
        zip_writer.finish().unwrap();

        assert!(matches!(
            load_boundary(&zip_path),
            Err(BoundaryError::ShapefileNotInArchive { .. })
        ));
    }

    #[test]
    fn rejects_other_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("boundary.geojson");
        std::fs::write(&path, "{}").unwrap();

        assert!(matches!(
            load_boundary(&path),
            Err(BoundaryError::UnsupportedExtension { .. })
        ));
    }

    #[test]
    fn rejects_directories_and_missing_paths() {
        let dir = tempfile::tempdir().unwrap();
        let as_dir = dir.path().join("x.shp");
        std::fs::create_dir(&as_dir).unwrap();

        assert!(matches!(
            load_boundary(&as_dir),
            Err(BoundaryError::NotAFile { .. })
        ));
        assert!(matches!(
            load_boundary(&dir.path().join("missing.zip")),
            Err(BoundaryError::NotAFile { .. })
        ));
    }

    /// Writes a one-shape fixture whose `CITY_NAME` cell holds `name_bytes`
    /// verbatim, as a foreign-encoded `.dbf` would.
    fn write_named_fixture(dir: &Path, name_bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.join("h27ka13.shp");
        let placeholder = "X".repeat(name_bytes.len());
        let table = TableWriterBuilder::new()
            .add_character_field(FieldName::try_from("CITY").unwrap(), 3)
            .add_character_field(FieldName::try_from("CITY_NAME").unwrap(), 40);
        let mut writer = shapefile::Writer::from_path(&path, table).unwrap();

        let mut record = Record::default();
        record.insert("CITY".to_string(), FieldValue::Character(Some("101".to_string())));
        record.insert(
            "CITY_NAME".to_string(),
            FieldValue::Character(Some(placeholder.clone())),
        );
        writer
            .write_shape_and_record(&square(0.0, 0.0), &record)
            .unwrap();
        drop(writer);

        let dbf = path.with_extension("dbf");
        let mut bytes = std::fs::read(&dbf).unwrap();
        let at = bytes
            .windows(placeholder.len())
            .position(|window| window == placeholder.as_bytes())
            .unwrap();
        bytes[at..at + name_bytes.len()].copy_from_slice(name_bytes);
        std::fs::write(&dbf, bytes).unwrap();

        path
    }

    fn zip_members(shp: &Path, extensions: &[&str], zip_path: &Path) {
        let mut zip_writer = zip::ZipWriter::new(std::fs::File::create(zip_path).unwrap());
        for ext in extensions {
            let member = shp.with_extension(ext);
            zip_writer
                .start_file(
                    member.file_name().unwrap().to_str().unwrap(),
                    zip::write::SimpleFileOptions::default(),
                )
                .unwrap();
            zip_writer.write_all(&std::fs::read(&member).unwrap()).unwrap();
        }
        zip_writer.finish().unwrap();
    }

    #[test]
    fn names_default_to_shift_jis() {
        let dir = tempfile::tempdir().unwrap();
        let (encoded, _, _) = SHIFT_JIS.encode("千代田区");
        let path = write_named_fixture(dir.path(), &encoded);

        let table = load_boundary(&path).unwrap();
        assert_eq!(table.text("CITY_NAME").unwrap()[0].as_deref(), Some("千代田区"));
        assert_eq!(table.text("CITY").unwrap()[0].as_deref(), Some("101"));
    }

    #[test]
    fn cpg_sidecar_selects_code_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_named_fixture(dir.path(), "千代田区".as_bytes());
        std::fs::write(path.with_extension("cpg"), "UTF-8\r\n").unwrap();

        let table = load_boundary(&path).unwrap();
        assert_eq!(table.text("CITY_NAME").unwrap()[0].as_deref(), Some("千代田区"));
    }

    #[test]
    fn zipped_names_use_cpg_member_or_shift_jis() {
        let dir = tempfile::tempdir().unwrap();
        let (encoded, _, _) = SHIFT_JIS.encode("中央区");
        let shp = write_named_fixture(dir.path(), &encoded);
        let sjis_zip = dir.path().join("sjis.zip");
        zip_members(&shp, &["shp", "shx", "dbf"], &sjis_zip);

        let table = load_boundary(&sjis_zip).unwrap();
        assert_eq!(table.text("CITY_NAME").unwrap()[0].as_deref(), Some("中央区"));

        let other = tempfile::tempdir().unwrap();
        let shp = write_named_fixture(other.path(), "中央区".as_bytes());
        std::fs::write(shp.with_extension("cpg"), "65001").unwrap();
        let utf8_zip = other.path().join("utf8.zip");
        zip_members(&shp, &["shp", "shx", "dbf", "cpg"], &utf8_zip);

        let table = load_boundary(&utf8_zip).unwrap();
        assert_eq!(table.text("CITY_NAME").unwrap()[0].as_deref(), Some("中央区"));
    }

    #[test]
    fn code_page_labels() {
        assert_eq!(code_page(None), SHIFT_JIS);
        assert_eq!(code_page(Some(b"932\n")), SHIFT_JIS);
        assert_eq!(code_page(Some(b"Shift_JIS")), SHIFT_JIS);
        assert_eq!(code_page(Some(b"UTF-8")), UTF_8);
        assert_eq!(code_page(Some(b"65001")), UTF_8);
        assert_eq!(code_page(Some(b"no such page")), SHIFT_JIS);
    }

    #[test]
    fn numeric_fields_become_text() {
        assert_eq!(
            field_value_to_string(&FieldValue::Numeric(Some(13.0))).as_deref(),
            Some("13")
        );
        assert_eq!(field_value_to_string(&FieldValue::Character(None)), None);
    }
}
