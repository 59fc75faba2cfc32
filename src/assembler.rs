use std::io::Read;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::catalog::{self, FieldSpec};
use crate::domain::{
    DATE_FORMAT, FieldValue, Profession, Record, RequestContext, TIME_FORMAT, format_timestamp,
};
use crate::error::PortalError;
use crate::regions::RegionSelection;

pub const COMBINED_DATETIME_HEADER: &str = "Date and Time";

// Month-first before day-first; day-first only matches once the month would exceed 12.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%m-%d-%Y %H:%M:%S%.f",
    "%m-%d-%Y %H:%M",
    "%d/%m/%Y %H:%M:%S%.f",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S%.f",
    "%d-%m-%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%m-%d-%Y", "%d/%m/%Y", "%d-%m-%Y",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];

#[derive(Debug, Clone)]
pub struct SingleEntry {
    pub region: RegionSelection,
    pub spot: String,
    pub latitude: f64,
    pub longitude: f64,
    pub profession: Profession,
    pub designation: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub measurements: Record,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchMetadata {
    pub region: RegionSelection,
    pub spot: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub profession: Profession,
    pub designation: String,
}

pub fn assemble_single(
    ctx: &RequestContext,
    entry: &SingleEntry,
    now: NaiveDateTime,
) -> Result<Record, PortalError> {
    let mut record = Record::new();
    record.insert(catalog::CONTRIBUTOR, ctx.name.as_str());
    record.insert(catalog::EMAIL, ctx.email.as_str());
    record.insert(catalog::PROFESSION, entry.profession.to_string());
    record.insert(catalog::DESIGNATION, entry.designation.as_str());
    record.insert(catalog::DATE, entry.date.format(DATE_FORMAT).to_string());
    record.insert(catalog::TIME, entry.time.format(TIME_FORMAT).to_string());
    record.insert(catalog::REGION, entry.region.compose()?);
    record.insert(catalog::SPOT, entry.spot.as_str());
    record.insert(catalog::LATITUDE, entry.latitude);
    record.insert(catalog::LONGITUDE, entry.longitude);

    for (key, value) in &entry.measurements {
        let known = catalog::by_key(key).filter(|field| field.is_measurement());
        if known.is_none() {
            return Err(PortalError::UnknownField(key.clone()));
        }
        record.insert(key.as_str(), value.clone());
    }

    record.insert(catalog::CREATED_AT, format_timestamp(now));
    Ok(record.normalize_values())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadTable {
    headers: Vec<String>,
    rows: Vec<Vec<FieldValue>>,
}

impl UploadTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<FieldValue>>) -> Self {
        Self { headers, rows }
    }

    pub fn read<R: Read>(file_name: &str, reader: R) -> Result<Self, PortalError> {
        let lower = file_name.to_lowercase();
        if lower.ends_with(".xlsx") || lower.ends_with(".xls") {
            return Err(PortalError::UnsupportedUpload(file_name.to_string()));
        }
        Self::from_csv(file_name, reader)
    }

    pub fn from_csv<R: Read>(file_name: &str, reader: R) -> Result<Self, PortalError> {
        let unreadable = |message: String| PortalError::UnreadableUpload {
            file: file_name.to_string(),
            message,
        };
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let headers = reader
            .headers()
            .map_err(|err| unreadable(err.to_string()))?
            .iter()
            .map(|header| header.trim().to_string())
            .collect::<Vec<_>>();
        if headers.iter().all(String::is_empty) {
            return Err(unreadable("missing header row".to_string()));
        }

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|err| unreadable(err.to_string()))?;
            rows.push(record.iter().map(FieldValue::from_cell).collect());
        }
        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<FieldValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn header_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|name| name == header)
    }
}

struct FieldPlan {
    key: &'static str,
    sources: Vec<usize>,
}

struct TablePlan {
    combined: Option<usize>,
    date: Option<usize>,
    time: Option<usize>,
    fields: Vec<FieldPlan>,
}

impl TablePlan {
    fn new(table: &UploadTable) -> Self {
        let first_of = |names: &[&str]| names.iter().find_map(|name| table.header_index(name));
        let date_field = catalog::by_key(catalog::DATE);
        let time_field = catalog::by_key(catalog::TIME);

        let fields = catalog::measurements()
            .filter_map(|field| {
                let sources = source_headers(field)
                    .into_iter()
                    .filter_map(|header| table.header_index(header))
                    .collect::<Vec<_>>();
                // Officially mapped fields are always present, possibly null.
                if sources.is_empty() && field.aliases.is_empty() {
                    return None;
                }
                Some(FieldPlan {
                    key: field.key,
                    sources,
                })
            })
            .collect();

        Self {
            combined: table.header_index(COMBINED_DATETIME_HEADER),
            date: date_field.and_then(|field| first_of(&[field.key, field.label])),
            time: time_field.and_then(|field| first_of(&[field.key, field.label])),
            fields,
        }
    }

    fn resolve_when(&self, row: &[FieldValue], now: NaiveDateTime) -> (NaiveDate, NaiveTime) {
        let today = now.date();
        let midnight = NaiveTime::MIN;
        if let Some(index) = self.combined {
            return match row.get(index).filter(|value| !value.is_null()) {
                None => (today, now.time()),
                Some(value) => parse_datetime(&value.to_string())
                    .map(|parsed| (parsed.date(), parsed.time()))
                    .unwrap_or((today, midnight)),
            };
        }

        let cell = |index: Option<usize>| {
            index
                .and_then(|index| row.get(index))
                .filter(|value| !value.is_null())
                .map(ToString::to_string)
        };
        let date = match cell(self.date) {
            None => today,
            Some(raw) => parse_date(&raw).unwrap_or(today),
        };
        let time = match cell(self.time) {
            None => now.time(),
            Some(raw) => parse_time(&raw).unwrap_or(midnight),
        };
        (date, time)
    }
}

pub fn source_headers(field: &FieldSpec) -> Vec<&'static str> {
    let mut headers: Vec<&'static str> = Vec::new();
    for header in field.aliases.iter().copied().chain([field.key, field.label]) {
        if !headers.contains(&header) {
            headers.push(header);
        }
    }
    headers
}

pub fn assemble_bulk(
    ctx: &RequestContext,
    batch: &BatchMetadata,
    table: &UploadTable,
    now: NaiveDateTime,
) -> Result<Vec<Record>, PortalError> {
    let region = batch.region.compose()?;
    let (default_lat, default_lon) = batch.region.default_coords();
    let latitude = batch.latitude.unwrap_or(default_lat);
    let longitude = batch.longitude.unwrap_or(default_lon);
    let created_at = format_timestamp(now);
    let plan = TablePlan::new(table);

    let records = table
        .rows()
        .iter()
        .map(|row| {
            let (date, time) = plan.resolve_when(row, now);
            let mut record = Record::new();
            record.insert(catalog::CONTRIBUTOR, ctx.name.as_str());
            record.insert(catalog::EMAIL, ctx.email.as_str());
            record.insert(catalog::REGION, region.as_str());
            record.insert(catalog::SPOT, batch.spot.as_str());
            record.insert(catalog::LATITUDE, latitude);
            record.insert(catalog::LONGITUDE, longitude);
            record.insert(catalog::PROFESSION, batch.profession.to_string());
            record.insert(catalog::DESIGNATION, batch.designation.as_str());
            record.insert(catalog::DATE, date.format(DATE_FORMAT).to_string());
            record.insert(catalog::TIME, time.format(TIME_FORMAT).to_string());

            for field in &plan.fields {
                let value = field
                    .sources
                    .iter()
                    .filter_map(|index| row.get(*index))
                    .map(|value| value.clone().normalized())
                    .find(|value| !value.is_null())
                    .unwrap_or_default();
                record.insert(field.key, value);
            }

            record.insert(catalog::CREATED_AT, created_at.as_str());
            record.normalize_values()
        })
        .collect();
    Ok(records)
}

pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_local());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| parse_date(raw).map(|date| date.and_time(NaiveTime::MIN)))
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
}

pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(raw, format).ok())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::domain::Role;

    fn ctx() -> RequestContext {
        RequestContext::new("Asha", "asha@example.org".parse().unwrap(), Role::User)
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(10, 15, 30)
            .unwrap()
    }

    fn batch() -> BatchMetadata {
        BatchMetadata {
            region: RegionSelection::new("Tamil Nadu", "Chennai Coast"),
            spot: "Marina".to_string(),
            latitude: None,
            longitude: None,
            profession: Profession::Researcher,
            designation: "Scientist".to_string(),
        }
    }

    fn table(csv: &str) -> UploadTable {
        UploadTable::from_csv("upload.csv", csv.as_bytes()).unwrap()
    }

    #[test]
    fn combined_datetime_is_split() {
        let table = table("Date and Time,WQ Temp (°C)\n2023-05-01 06:30:00,29.1\n");
        let records = assemble_bulk(&ctx(), &batch(), &table, now()).unwrap();
        assert_eq!(records[0].text("Date"), Some("2023-05-01"));
        assert_eq!(records[0].text("Time"), Some("06:30:00"));
        assert_eq!(records[0].get("Water_Temp"), Some(&FieldValue::Float(29.1)));
    }

    #[test]
    fn bad_datetime_only_defaults_its_row() {
        let table = table("Date and Time,pH\ngarbage,8.1\n,8.0\n2023-05-02 07:00:00,7.9\n");
        let records = assemble_bulk(&ctx(), &batch(), &table, now()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].text("Date"), Some("2024-03-09"));
        assert_eq!(records[0].text("Time"), Some("00:00:00"));
        assert_eq!(records[1].text("Time"), Some("10:15:30"));
        assert_eq!(records[2].text("Date"), Some("2023-05-02"));
    }

    #[test]
    fn missing_datetime_uses_batch_clock() {
        let table = table("pH\n8.1\n");
        let records = assemble_bulk(&ctx(), &batch(), &table, now()).unwrap();
        assert_eq!(records[0].text("Date"), Some("2024-03-09"));
        assert_eq!(records[0].text("Time"), Some("10:15:30"));
    }

    #[test]
    fn official_fields_always_present() {
        let table = table("pH\n8.1\n");
        let records = assemble_bulk(&ctx(), &batch(), &table, now()).unwrap();
        assert_eq!(records[0].get("Salinity"), Some(&FieldValue::Null));
        assert!(records[0].get("BOD").is_none());
    }

    #[test]
    fn typo_header_still_maps() {
        let table = table("Turbididt y (NTU)\n4.2\n");
        let records = assemble_bulk(&ctx(), &batch(), &table, now()).unwrap();
        assert_eq!(records[0].get("Turbidity"), Some(&FieldValue::Float(4.2)));
    }

    #[test]
    fn batch_coordinates_default_from_region() {
        let table = table("pH\n8.1\n");
        let records = assemble_bulk(&ctx(), &batch(), &table, now()).unwrap();
        assert_eq!(records[0].get("Latitude"), Some(&FieldValue::Float(13.0827)));
        assert_eq!(records[0].text("Main_Location"), Some("Chennai Coast"));
    }

    #[test]
    fn short_rows_read_missing_cells_as_null() {
        let table = table("pH,Sal (psu),TSS (mg/L)\n8.1,33.0,12\n8.0,33.1\n");
        assert_eq!(table.len(), 2);
        let records = assemble_bulk(&ctx(), &batch(), &table, now()).unwrap();
        assert_eq!(records[1].get("Salinity"), Some(&FieldValue::Float(33.1)));
        assert_eq!(records[1].get("TSS"), Some(&FieldValue::Null));
    }

    #[test]
    fn invalid_utf8_is_unreadable() {
        let err = UploadTable::from_csv("bad.csv", &b"pH\n\xff\xfe\n"[..]).unwrap_err();
        assert_matches!(err, PortalError::UnreadableUpload { .. });
    }

    #[test]
    fn spreadsheets_are_rejected() {
        let err = UploadTable::read("sheet.xlsx", "".as_bytes()).unwrap_err();
        assert_matches!(err, PortalError::UnsupportedUpload(_));
    }

    #[test]
    fn single_entry_rejects_unknown_fields() {
        let mut measurements = Record::new();
        measurements.insert("Moon_Phase", "full");
        let entry = SingleEntry {
            region: RegionSelection::new("Tamil Nadu", "Chennai Coast"),
            spot: "Marina".to_string(),
            latitude: 13.05,
            longitude: 80.28,
            profession: Profession::Student,
            designation: String::new(),
            date: now().date(),
            time: now().time(),
            measurements,
        };
        let err = assemble_single(&ctx(), &entry, now()).unwrap_err();
        assert_matches!(err, PortalError::UnknownField(_));
    }

    #[test]
    fn parse_supported_formats() {
        assert!(parse_datetime("2023-05-01T06:30:00").is_some());
        assert_eq!(
            parse_datetime("12/31/2023 06:30:00"),
            NaiveDate::from_ymd_opt(2023, 12, 31).and_then(|date| date.and_hms_opt(6, 30, 0))
        );
        assert_eq!(
            parse_datetime("05-01-2024 08:00"),
            NaiveDate::from_ymd_opt(2024, 5, 1).and_then(|date| date.and_hms_opt(8, 0, 0))
        );
        assert_eq!(
            parse_datetime("31/12/2023 06:30"),
            NaiveDate::from_ymd_opt(2023, 12, 31).and_then(|date| date.and_hms_opt(6, 30, 0))
        );
        assert!(parse_datetime("2023-05-01T06:30").is_some());
        assert_eq!(parse_date("13-02-2024"), NaiveDate::from_ymd_opt(2024, 2, 13));
        assert_eq!(
            parse_datetime("2023-05-01"),
            NaiveDate::from_ymd_opt(2023, 5, 1).and_then(|date| date.and_hms_opt(0, 0, 0))
        );
        assert!(parse_time("06:30").is_some());
        assert!(parse_date("yesterday").is_none());
    }
}
