//! Decoding and repair of e-Stat's CSV-like responses.
//!
//! A simple-API response is a quoted preamble (request echo, result status,
//! table info) followed by a line holding the quoted section name, after
//! which the real CSV payload starts:
//!
//! ```text
//! "RESULT"
//! "STATUS","0"
//! ...
//! "STAT_INF"
//! "TABLE_INF","STAT_CODE",...
//! ```

use std::borrow::Cow;

use estat_api_models::{Endpoint, time_code};
use estat_table::{Table, delimited};
use regex::Regex;

use crate::ApiError;

/// Decodes a response body.
///
/// Uses the charset named in `content_type` when present and recognized.
/// Otherwise the body is taken as UTF-8 if it is valid UTF-8, and as
/// Shift-JIS if not.
#[must_use]
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    if let Some(encoding) = content_type
        .and_then(charset_label)
        .and_then(|label| encoding_rs::Encoding::for_label(label.as_bytes()))
    {
        let (text, _, had_errors) = encoding.decode(bytes);
        if had_errors {
            log::warn!(
                "Response body had malformed {} sequences",
                encoding.name()
            );
        }
        return text.into_owned();
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            log::debug!("Response body is not UTF-8, decoding as Shift_JIS");
            let (text, _, _) = encoding_rs::SHIFT_JIS.decode(bytes);
            text.into_owned()
        }
    }
}

fn charset_label(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}

/// Strips everything up to and including the last line holding the quoted
/// `marker`, returning the CSV payload that follows it verbatim.
///
/// # Errors
///
/// Returns [`ApiError::UnformattableResponse`] if the marker line does not
/// occur in `body`.
pub fn repair_response<'a>(body: &'a str, marker: &str) -> Result<Cow<'a, str>, ApiError> {
    let pattern = Regex::new(&format!(r#"(?s)\A.*"{}"\r?\n(.*)"#, regex::escape(marker)))?;

    pattern
        .captures(body)
        .and_then(|captures| captures.get(1))
        .map(|payload| Cow::Borrowed(payload.as_str()))
        .ok_or_else(|| ApiError::UnformattableResponse {
            marker: marker.to_string(),
        })
}

/// Repairs a decoded response of `endpoint` and parses the payload into a
/// string-typed [`Table`].
///
/// # Errors
///
/// Returns [`ApiError::UnformattableResponse`] if the section marker is
/// missing, or [`ApiError::Table`] if the payload is not valid CSV.
pub fn parse_response(body: &str, endpoint: Endpoint) -> Result<Table, ApiError> {
    let payload = repair_response(body, endpoint.section_marker())?;
    Ok(delimited::read_str(&payload, b',')?)
}

/// Name of the time code column in `getSimpleStatsData` payloads.
pub const TIME_CODE_COLUMN: &str = "time_code";

/// Keeps the rows whose `time_code` starts with the yearly time code of
/// `year`.
///
/// # Errors
///
/// Returns [`ApiError::Table`] if the table has no `time_code` column.
pub fn filter_year(table: &Table, year: &str) -> Result<Table, ApiError> {
    let prefix = time_code(year);
    let filtered = table.filter_text(TIME_CODE_COLUMN, |code| code.starts_with(&prefix))?;

    log::info!(
        "Kept {} of {} statistics rows for time code {prefix}",
        filtered.len(),
        table.len()
    );

    Ok(filtered)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = "\"tab_code\",\"cat01_code\",\"area_code\",\"time_code\",\"unit\",\"value\"\n\
        \"020\",\"A1101\",\"13101\",\"2015100000\",\"人\",\"58406\"\n\
        \"020\",\"A1101\",\"13101\",\"2010100000\",\"人\",\"47115\"\n";

    fn raw_body() -> String {
        format!("\"RESULT\"\n\"STATUS\",\"0\"\n\"ERROR_MSG\",\"正常に終了しました。\"\n\"STAT_INF\"\n{PAYLOAD}")
    }

    #[test]
    fn repair_returns_payload_exactly() {
        let body = raw_body();
        assert_eq!(repair_response(&body, "STAT_INF").unwrap(), PAYLOAD);
    }

    #[test]
    fn repair_accepts_crlf_marker_line() {
        let body = "\"RESULT\"\r\n\"STAT_INF\"\r\na,b\r\n1,2\r\n";
        assert_eq!(repair_response(body, "STAT_INF").unwrap(), "a,b\r\n1,2\r\n");
    }

    #[test]
    fn repair_fails_without_marker() {
        let err = repair_response("\"RESULT\"\n\"STATUS\",\"100\"\n", "STAT_INF").unwrap_err();
        assert!(matches!(err, ApiError::UnformattableResponse { marker } if marker == "STAT_INF"));
    }

    #[test]
    fn repair_uses_last_marker_line() {
        let body = "\"STAT_INF\"\n\"x\"\n\"STAT_INF\"\npayload\n";
        assert_eq!(repair_response(body, "STAT_INF").unwrap(), "payload\n");
    }

    #[test]
    fn meta_info_uses_class_marker() {
        let body = "\"METADATA_INF\"\n\"CLASS_INF\"\n\"CLASS_OBJ_ID\",\"CLASS_CODE\"\n\"cat01\",\"A1101\"\n";
        let table = parse_response(body, Endpoint::MetaInfo).unwrap();
        assert_eq!(table.column_names(), vec!["CLASS_OBJ_ID", "CLASS_CODE"]);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn parsed_payload_keeps_codes_as_text() {
        let table = parse_response(&raw_body(), Endpoint::StatsData).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.text("tab_code").unwrap()[0].as_deref(), Some("020"));
    }

    #[test]
    fn year_filter_is_prefix_match() {
        let table = parse_response(&raw_body(), Endpoint::StatsData).unwrap();
        let filtered = filter_year(&table, "2015").unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.text("value").unwrap()[0].as_deref(), Some("58406"));
    }

    #[test]
    fn year_filter_keeps_sub_codes() {
        let table = delimited::read_str(
            "time_code,value\n20001000001,1\n2000100000,2\n2001100000,3\n",
            b',',
        )
        .unwrap();
        let filtered = filter_year(&table, "2000").unwrap();
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn decodes_declared_charset() {
        let (bytes, _, _) = encoding_rs::SHIFT_JIS.encode("地域");
        assert_eq!(
            decode_body(&bytes, Some("text/csv; charset=Shift_JIS")),
            "地域"
        );
    }

    #[test]
    fn decodes_undeclared_utf8_and_shift_jis() {
        assert_eq!(decode_body("地域".as_bytes(), Some("text/csv")), "地域");
        let (bytes, _, _) = encoding_rs::SHIFT_JIS.encode("地域");
        assert_eq!(decode_body(&bytes, None), "地域");
    }
}
