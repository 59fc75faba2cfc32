use assert_matches::assert_matches;

use marine_portal::catalog::{self, FIELDS};
use marine_portal::domain::{Email, FieldValue, Record, RequestContext, Role};
use marine_portal::error::PortalError;
use marine_portal::normalize::{from_storage, storage_key, to_storage};

#[test]
fn every_catalog_field_round_trips_through_storage() {
    let record = FIELDS
        .iter()
        .enumerate()
        .map(|(index, field)| (field.key, FieldValue::Integer(index as i64)))
        .collect::<Record>();

    let stored = to_storage(&record);
    assert!(stored.keys().all(|column| column == column.to_lowercase()));
    assert_eq!(from_storage(&stored), record);
}

#[test]
fn unknown_keys_fall_back_to_lowercase() {
    let mut record = Record::new();
    record.insert("Secchi_Depth", 1.5);
    let stored = to_storage(&record);
    assert!(stored.contains_key("secchi_depth"));
    assert_eq!(storage_key("Secchi_Depth"), "secchi_depth");
    assert!(from_storage(&stored).contains_key("secchi_depth"));
}

#[test]
fn nan_and_none_become_null() {
    let mut record = Record::new();
    record.insert("Water_Temp", f64::NAN);
    record.insert("Salinity", "None");
    record.insert("pH", 8.1);
    let record = record.normalize_values();
    assert!(record.get("Water_Temp").unwrap().is_null());
    assert!(record.get("Salinity").unwrap().is_null());
    assert_eq!(record.get("pH"), Some(&FieldValue::Float(8.1)));
}

#[test]
fn cells_parse_like_a_spreadsheet() {
    assert_eq!(FieldValue::from_cell(" 42 "), FieldValue::Integer(42));
    assert_eq!(FieldValue::from_cell("6.5"), FieldValue::Float(6.5));
    assert_eq!(FieldValue::from_cell("#N/A"), FieldValue::Null);
    assert_eq!(FieldValue::from_cell("\u{00A0}clear\u{00A0}"), FieldValue::text("clear"));
}

#[test]
fn email_validation() {
    let email: Email = " meera@example.org ".parse().unwrap();
    assert_eq!(email.as_str(), "meera@example.org");
    assert_matches!(
        "meera@localhost".parse::<Email>(),
        Err(PortalError::InvalidEmail(_))
    );
}

#[test]
fn user_id_is_stable_and_prefixed() {
    let ctx = RequestContext::new("Meera", "meera@example.org".parse().unwrap(), Role::User);
    let id = ctx.user_id();
    assert!(id.starts_with("NCCR-"));
    assert_eq!(id.len(), 9);
    assert_eq!(id, id.to_uppercase());
    assert_eq!(id, ctx.clone().user_id());
}

#[test]
fn labels_fall_back_to_keys() {
    assert_eq!(catalog::label_for("Turbidity"), "Turbidity (NTU)");
    assert_eq!(catalog::label_for("Secchi_Depth"), "Secchi_Depth");
}
