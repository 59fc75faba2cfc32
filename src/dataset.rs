use serde::Serialize;

use crate::domain::{FieldValue, Record};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<FieldValue>>,
}

impl Dataset {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<FieldValue>>) -> Self {
        Self { columns, rows }
    }

    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = Record>,
    {
        let records = records.into_iter().collect::<Vec<_>>();
        let mut columns: Vec<String> = Vec::new();
        for record in &records {
            for key in record.keys() {
                if !columns.iter().any(|column| column == key) {
                    columns.push(key.to_string());
                }
            }
        }
        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|column| record.get(column).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
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

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&FieldValue> {
        let index = self.column_index(column)?;
        self.rows.get(row).and_then(|cells| cells.get(index))
    }

    pub fn rename_columns<F>(mut self, rename: F) -> Self
    where
        F: Fn(&str) -> String,
    {
        self.columns = self.columns.iter().map(|column| rename(column)).collect();
        self
    }

    pub fn filter_eq(&self, column: &str, value: &FieldValue) -> Dataset {
        let Some(index) = self.column_index(column) else {
            return Dataset::new(self.columns.clone(), Vec::new());
        };
        let rows = self
            .rows
            .iter()
            .filter(|cells| cells.get(index) == Some(value))
            .cloned()
            .collect();
        Dataset::new(self.columns.clone(), rows)
    }

    pub fn select<S: AsRef<str>>(&self, columns: &[S]) -> Dataset {
        let picked = columns
            .iter()
            .filter_map(|column| {
                self.column_index(column.as_ref())
                    .map(|index| (column.as_ref().to_string(), index))
            })
            .collect::<Vec<_>>();
        let rows = self
            .rows
            .iter()
            .map(|cells| {
                picked
                    .iter()
                    .map(|(_, index)| cells[*index].clone())
                    .collect()
            })
            .collect();
        Dataset::new(picked.into_iter().map(|(name, _)| name).collect(), rows)
    }

    pub fn records(&self) -> Vec<Record> {
        self.rows
            .iter()
            .map(|cells| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(cells.iter().cloned())
                    .collect()
            })
            .collect()
    }

    pub fn distinct_text(&self, column: &str) -> Vec<String> {
        let Some(index) = self.column_index(column) else {
            return Vec::new();
        };
        let mut values: Vec<String> = Vec::new();
        for cells in &self.rows {
            if let Some(FieldValue::Text(value)) = cells.get(index) {
                if !values.contains(value) {
                    values.push(value.clone());
                }
            }
        }
        values
    }
}
