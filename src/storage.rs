use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::sync::Mutex;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use tempfile::Builder;

use crate::domain::{FieldValue, Record};
use crate::error::PortalError;

pub const ID_COLUMN: &str = "id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Table {
    Observations,
    AccessRequests,
    ResearchPapers,
}

impl Table {
    pub const ALL: [Table; 3] = [
        Table::Observations,
        Table::AccessRequests,
        Table::ResearchPapers,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Table::Observations => "marine_data",
            Table::AccessRequests => "access_requests",
            Table::ResearchPapers => "research_papers",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

pub trait Storage: Send + Sync {
    fn insert_one(&self, table: Table, row: Record) -> Result<Record, PortalError>;
    fn insert_many(&self, table: Table, rows: Vec<Record>) -> Result<usize, PortalError>;
    fn select_all(&self, table: Table) -> Result<Vec<Record>, PortalError>;
    fn select_eq(
        &self,
        table: Table,
        filters: &[(&str, FieldValue)],
    ) -> Result<Vec<Record>, PortalError>;
    fn update_by_id(&self, table: Table, id: i64, patch: Record) -> Result<(), PortalError>;
    fn delete_by_ids(&self, table: Table, ids: &[i64]) -> Result<usize, PortalError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableData {
    pub next_id: i64,
    pub rows: Vec<Record>,
}

impl TableData {
    fn insert(&mut self, mut row: Record) -> Record {
        self.next_id = self.next_id.max(1);
        row.insert(ID_COLUMN, self.next_id);
        self.next_id += 1;
        self.rows.push(row.clone());
        row
    }

    fn select_eq(&self, filters: &[(&str, FieldValue)]) -> Vec<Record> {
        self.rows
            .iter()
            .filter(|row| {
                filters
                    .iter()
                    .all(|(column, value)| matches_value(row.get(column), value))
            })
            .cloned()
            .collect()
    }

    fn update(&mut self, id: i64, patch: Record) -> bool {
        let Some(row) = self.rows.iter_mut().find(|row| row.id() == Some(id)) else {
            return false;
        };
        for (column, value) in patch {
            if column != ID_COLUMN {
                row.insert(column, value);
            }
        }
        true
    }

    fn delete(&mut self, ids: &[i64]) -> usize {
        let before = self.rows.len();
        self.rows
            .retain(|row| row.id().map(|id| !ids.contains(&id)).unwrap_or(true));
        before - self.rows.len()
    }
}

fn matches_value(stored: Option<&FieldValue>, expected: &FieldValue) -> bool {
    match (stored, expected) {
        (Some(stored), expected) if stored == expected => true,
        (Some(stored), expected) => match (stored.as_f64(), expected.as_f64()) {
            (Some(left), Some(right)) => left == right,
            _ => false,
        },
        (None, _) => false,
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: Mutex<BTreeMap<Table, TableData>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_table<T>(
        &self,
        table: Table,
        action: impl FnOnce(&mut TableData) -> T,
    ) -> Result<T, PortalError> {
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| PortalError::Storage("memory storage lock poisoned".to_string()))?;
        Ok(action(tables.entry(table).or_default()))
    }
}

impl Storage for MemoryStorage {
    fn insert_one(&self, table: Table, row: Record) -> Result<Record, PortalError> {
        self.with_table(table, |data| data.insert(row))
    }

    fn insert_many(&self, table: Table, rows: Vec<Record>) -> Result<usize, PortalError> {
        self.with_table(table, |data| {
            let count = rows.len();
            for row in rows {
                data.insert(row);
            }
            count
        })
    }

    fn select_all(&self, table: Table) -> Result<Vec<Record>, PortalError> {
        self.with_table(table, |data| data.rows.clone())
    }

    fn select_eq(
        &self,
        table: Table,
        filters: &[(&str, FieldValue)],
    ) -> Result<Vec<Record>, PortalError> {
        self.with_table(table, |data| data.select_eq(filters))
    }

    fn update_by_id(&self, table: Table, id: i64, patch: Record) -> Result<(), PortalError> {
        let found = self.with_table(table, |data| data.update(id, patch))?;
        if !found {
            return Err(PortalError::Storage(format!("{table}: no row with id {id}")));
        }
        Ok(())
    }

    fn delete_by_ids(&self, table: Table, ids: &[i64]) -> Result<usize, PortalError> {
        self.with_table(table, |data| data.delete(ids))
    }
}

#[derive(Debug)]
pub struct FileStorage {
    root: Utf8PathBuf,
    guard: Mutex<()>,
}

impl FileStorage {
    pub fn new() -> Result<Self, PortalError> {
        let root = BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(dirs.data_dir().join("marine-portal")).ok()
            })
            .ok_or_else(|| {
                PortalError::Filesystem("unable to resolve data directory".to_string())
            })?;
        Ok(Self::new_with_root(root))
    }

    pub fn new_with_root(root: Utf8PathBuf) -> Self {
        Self {
            root,
            guard: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn table_path(&self, table: Table) -> Utf8PathBuf {
        self.root.join(format!("{}.json", table.name()))
    }

    fn load(&self, table: Table) -> Result<TableData, PortalError> {
        let path = self.table_path(table);
        if !path.as_std_path().exists() {
            return Ok(TableData::default());
        }
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| PortalError::Filesystem(err.to_string()))?;
        serde_json::from_str(&content)
            .map_err(|err| PortalError::Storage(format!("{}: {err}", path)))
    }

    fn save(&self, table: Table, data: &TableData) -> Result<(), PortalError> {
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| PortalError::Filesystem(err.to_string()))?;
        let content = serde_json::to_vec_pretty(data)
            .map_err(|err| PortalError::Storage(err.to_string()))?;
        let temp = Builder::new()
            .prefix("marine-portal-table")
            .tempfile_in(self.root.as_std_path())
            .map_err(|err| PortalError::Filesystem(err.to_string()))?;
        fs::write(temp.path(), &content).map_err(|err| PortalError::Filesystem(err.to_string()))?;
        temp.persist(self.table_path(table).as_std_path())
            .map_err(|err| PortalError::Filesystem(err.to_string()))?;
        Ok(())
    }

    fn with_table<T>(
        &self,
        table: Table,
        action: impl FnOnce(&mut TableData) -> T,
    ) -> Result<T, PortalError> {
        let _guard = self
            .guard
            .lock()
            .map_err(|_| PortalError::Storage("file storage lock poisoned".to_string()))?;
        let mut data = self.load(table)?;
        let result = action(&mut data);
        self.save(table, &data)?;
        Ok(result)
    }

    fn read_table(&self, table: Table) -> Result<TableData, PortalError> {
        let _guard = self
            .guard
            .lock()
            .map_err(|_| PortalError::Storage("file storage lock poisoned".to_string()))?;
        self.load(table)
    }
}

impl Storage for FileStorage {
    fn insert_one(&self, table: Table, row: Record) -> Result<Record, PortalError> {
        self.with_table(table, |data| data.insert(row))
    }

    fn insert_many(&self, table: Table, rows: Vec<Record>) -> Result<usize, PortalError> {
        self.with_table(table, |data| {
            let count = rows.len();
            for row in rows {
                data.insert(row);
            }
            count
        })
    }

    fn select_all(&self, table: Table) -> Result<Vec<Record>, PortalError> {
        Ok(self.read_table(table)?.rows)
    }

    fn select_eq(
        &self,
        table: Table,
        filters: &[(&str, FieldValue)],
    ) -> Result<Vec<Record>, PortalError> {
        Ok(self.read_table(table)?.select_eq(filters))
    }

    fn update_by_id(&self, table: Table, id: i64, patch: Record) -> Result<(), PortalError> {
        let found = self.with_table(table, |data| data.update(id, patch))?;
        if !found {
            return Err(PortalError::Storage(format!("{table}: no row with id {id}")));
        }
        Ok(())
    }

    fn delete_by_ids(&self, table: Table, ids: &[i64]) -> Result<usize, PortalError> {
        self.with_table(table, |data| data.delete(ids))
    }
}

impl<S: Storage + ?Sized> Storage for std::sync::Arc<S> {
    fn insert_one(&self, table: Table, row: Record) -> Result<Record, PortalError> {
        (**self).insert_one(table, row)
    }

    fn insert_many(&self, table: Table, rows: Vec<Record>) -> Result<usize, PortalError> {
        (**self).insert_many(table, rows)
    }

    fn select_all(&self, table: Table) -> Result<Vec<Record>, PortalError> {
        (**self).select_all(table)
    }

    fn select_eq(
        &self,
        table: Table,
        filters: &[(&str, FieldValue)],
    ) -> Result<Vec<Record>, PortalError> {
        (**self).select_eq(table, filters)
    }

    fn update_by_id(&self, table: Table, id: i64, patch: Record) -> Result<(), PortalError> {
        (**self).update_by_id(table, id, patch)
    }

    fn delete_by_ids(&self, table: Table, ids: &[i64]) -> Result<usize, PortalError> {
        (**self).delete_by_ids(table, ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(email: &str) -> Record {
        let mut record = Record::new();
        record.insert("email", email);
        record
    }

    #[test]
    fn ids_ascend_from_one() {
        let storage = MemoryStorage::new();
        let first = storage.insert_one(Table::Observations, row("a@x.org")).unwrap();
        let count = storage
            .insert_many(Table::Observations, vec![row("b@x.org"), row("c@x.org")])
            .unwrap();
        assert_eq!(first.id(), Some(1));
        assert_eq!(count, 2);
        let ids = storage
            .select_all(Table::Observations)
            .unwrap()
            .iter()
            .filter_map(Record::id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn tables_are_independent() {
        let storage = MemoryStorage::new();
        storage.insert_one(Table::Observations, row("a@x.org")).unwrap();
        assert!(storage.select_all(Table::AccessRequests).unwrap().is_empty());
    }

    #[test]
    fn select_update_delete() {
        let storage = MemoryStorage::new();
        storage
            .insert_many(Table::Observations, vec![row("a@x.org"), row("b@x.org")])
            .unwrap();
        let matches = storage
            .select_eq(Table::Observations, &[("email", FieldValue::text("b@x.org"))])
            .unwrap();
        assert_eq!(matches.len(), 1);

        let mut patch = Record::new();
        patch.insert("email", "z@x.org");
        storage.update_by_id(Table::Observations, 2, patch).unwrap();
        let by_id = storage
            .select_eq(Table::Observations, &[(ID_COLUMN, FieldValue::Integer(2))])
            .unwrap();
        assert_eq!(by_id[0].text("email"), Some("z@x.org"));

        assert_eq!(storage.delete_by_ids(Table::Observations, &[1, 9]).unwrap(), 1);
        assert_eq!(storage.select_all(Table::Observations).unwrap().len(), 1);
    }

    #[test]
    fn numeric_filters_ignore_int_float_split() {
        assert!(matches_value(
            Some(&FieldValue::Float(2.0)),
            &FieldValue::Integer(2)
        ));
    }
}
