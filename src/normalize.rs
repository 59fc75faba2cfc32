use crate::catalog;
use crate::dataset::Dataset;
use crate::domain::Record;

pub fn storage_key(key: &str) -> String {
    match catalog::by_key(key) {
        Some(field) => field.column.to_string(),
        // Unknown keys are kept, lower-cased, never dropped.
        None => key.to_lowercase(),
    }
}

pub fn internal_key(column: &str) -> String {
    match catalog::by_column(column) {
        Some(field) => field.key.to_string(),
        None => column.to_string(),
    }
}

// Catalog keys are placed first. An unknown key whose lower-cased form is
// already taken keeps its own spelling, or gets a numeric suffix.
pub fn to_storage(record: &Record) -> Record {
    let mut stored = Record::new();
    let (known, unknown): (Vec<_>, Vec<_>) = record
        .iter()
        .partition(|(key, _)| catalog::by_key(key).is_some());
    for (key, value) in known {
        stored.insert(storage_key(key), value.clone());
    }
    for (key, value) in unknown {
        let lowered = storage_key(key);
        let column = if !stored.contains_key(&lowered) {
            lowered
        } else {
            let candidate = std::iter::once(key.clone())
                .chain((2..).map(|n| format!("{lowered}_{n}")))
                .find(|candidate| !stored.contains_key(candidate))
                .unwrap_or_default();
            tracing::warn!(key = %key, column = %candidate, "storage column clash, key kept apart");
            candidate
        };
        stored.insert(column, value.clone());
    }
    stored
}

pub fn from_storage(record: &Record) -> Record {
    record
        .iter()
        .map(|(column, value)| (internal_key(column), value.clone()))
        .collect()
}

pub fn dataset_from_storage(dataset: Dataset) -> Dataset {
    dataset.rename_columns(internal_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FieldValue;

    #[test]
    fn known_keys_map_to_catalog_columns() {
        assert_eq!(storage_key("Water_Temp"), "water_temp");
        assert_eq!(storage_key("Main_Location"), "main_location");
        assert_eq!(internal_key("nh4_n"), "NH4_N");
        assert_eq!(internal_key("ph"), "pH");
    }

    #[test]
    fn unknown_keys_are_lowercased_and_kept() {
        let mut record = Record::new();
        record.insert("Sampler_Serial", "SN-4");
        let stored = to_storage(&record);
        assert_eq!(stored.get("sampler_serial"), Some(&FieldValue::text("SN-4")));
        assert_eq!(stored.len(), 1);

        let restored = from_storage(&stored);
        assert_eq!(restored.get("sampler_serial"), Some(&FieldValue::text("SN-4")));
        assert!(restored.get("Sampler_Serial").is_none());
    }

    #[test]
    fn case_clash_keeps_both_values() {
        let mut record = Record::new();
        record.insert("pH", 8.1);
        record.insert("PH", 7.0);
        let stored = to_storage(&record);
        assert_eq!(stored.len(), 2);
        assert_eq!(stored.get("ph"), Some(&FieldValue::Float(8.1)));
        assert_eq!(stored.get("PH"), Some(&FieldValue::Float(7.0)));
    }

    #[test]
    fn clash_with_column_spelling_gets_suffix() {
        let mut record = Record::new();
        record.insert("Water_Temp", 27.5);
        record.insert("water_temp", 26.0);
        let stored = to_storage(&record);
        assert_eq!(stored.len(), 2);
        assert_eq!(stored.get("water_temp"), Some(&FieldValue::Float(27.5)));
        assert_eq!(stored.get("water_temp_2"), Some(&FieldValue::Float(26.0)));
    }

    #[test]
    fn id_column_passes_through() {
        assert_eq!(internal_key("id"), "id");
    }

    #[test]
    fn dataset_rename_matches_per_row() {
        let mut stored = Record::new();
        stored.insert("water_temp", 27.5);
        stored.insert("do", 6.1);
        stored.insert("id", 4);
        let per_row = from_storage(&stored);
        let dataset = dataset_from_storage(Dataset::from_records(vec![stored]));
        assert_eq!(dataset.records(), vec![per_row]);
    }
}
