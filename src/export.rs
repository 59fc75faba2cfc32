use std::io::Write;

use serde::Serialize;

use crate::catalog::{self, EXPORT_PREFIX, ExportCategory};
use crate::dataset::Dataset;
use crate::domain::FieldValue;
use crate::error::PortalError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub region: String,
    pub categories: Vec<ExportCategory>,
}

impl ExportRequest {
    pub fn new(region: impl Into<String>, categories: Vec<ExportCategory>) -> Self {
        Self {
            region: region.into(),
            categories,
        }
    }

    pub fn columns(&self) -> Vec<&'static str> {
        let mut columns: Vec<&'static str> = EXPORT_PREFIX.to_vec();
        for category in &self.categories {
            for key in category.keys() {
                if !columns.contains(&key) {
                    columns.push(key);
                }
            }
        }
        columns
    }

    pub fn file_name(&self) -> String {
        format!("NCCR_{}_Data.csv", self.region)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportTable {
    pub keys: Vec<String>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<FieldValue>>,
}

impl ExportTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), PortalError> {
        let mut writer = csv::Writer::from_writer(writer);
        writer
            .write_record(&self.headers)
            .map_err(|err| PortalError::Export(err.to_string()))?;
        for row in &self.rows {
            writer
                .write_record(row.iter().map(ToString::to_string))
                .map_err(|err| PortalError::Export(err.to_string()))?;
        }
        writer
            .flush()
            .map_err(|err| PortalError::Export(err.to_string()))
    }

    pub fn to_csv_bytes(&self) -> Result<Vec<u8>, PortalError> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer)?;
        Ok(buffer)
    }
}

pub fn export_dataset(dataset: &Dataset, request: &ExportRequest) -> ExportTable {
    let region = FieldValue::text(request.region.as_str());
    let selected = dataset
        .filter_eq(catalog::REGION, &region)
        .select(request.columns().as_slice());
    let keys = selected.columns().to_vec();
    let headers = keys
        .iter()
        .map(|key| catalog::label_for(key).to_string())
        .collect();
    ExportTable {
        keys,
        headers,
        rows: selected.rows().to_vec(),
    }
}
