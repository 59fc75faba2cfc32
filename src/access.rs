use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::{Email, FieldValue, Record, format_timestamp};
use crate::error::PortalError;
use crate::storage::{ID_COLUMN, Storage, Table};

pub const USER_EMAIL: &str = "user_email";
pub const PURPOSE: &str = "purpose";
pub const STATUS: &str = "status";
pub const REQUEST_DATE: &str = "request_date";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "Pending",
            RequestStatus::Approved => "Approved",
            RequestStatus::Rejected => "Rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = PortalError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            _ => Err(PortalError::InvalidStatus(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn status(self) -> RequestStatus {
        match self {
            Decision::Approve => RequestStatus::Approved,
            Decision::Reject => RequestStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessRequest {
    pub id: i64,
    pub user_email: String,
    pub purpose: String,
    pub status: RequestStatus,
    pub request_date: Option<String>,
}

impl AccessRequest {
    pub fn from_record(record: &Record) -> Result<Self, PortalError> {
        let id = record
            .id()
            .ok_or_else(|| PortalError::Storage("access request row without id".to_string()))?;
        let status = record
            .text(STATUS)
            .ok_or_else(|| PortalError::Storage(format!("access request {id} has no status")))?
            .parse()?;
        Ok(Self {
            id,
            user_email: record.text(USER_EMAIL).unwrap_or_default().to_string(),
            purpose: record.text(PURPOSE).unwrap_or_default().to_string(),
            status,
            request_date: record.text(REQUEST_DATE).map(str::to_string),
        })
    }
}

fn parse_all(rows: Vec<Record>) -> Result<Vec<AccessRequest>, PortalError> {
    rows.iter().map(AccessRequest::from_record).collect()
}

// Records a new Pending request. The pending check and the insert are two
// separate storage calls, so concurrent submissions can both pass the check.
pub fn submit<S: Storage + ?Sized>(
    storage: &S,
    email: &Email,
    purpose: &str,
    min_purpose_chars: usize,
    now: NaiveDateTime,
) -> Result<AccessRequest, PortalError> {
    let purpose = purpose.trim();
    if purpose.chars().count() <= min_purpose_chars {
        return Err(PortalError::Validation("Purpose is too short.".to_string()));
    }

    let pending = storage.select_eq(
        Table::AccessRequests,
        &[
            (USER_EMAIL, FieldValue::text(email.as_str())),
            (STATUS, FieldValue::text(RequestStatus::Pending.as_str())),
        ],
    )?;
    if !pending.is_empty() {
        return Err(PortalError::PendingRequestExists);
    }

    let mut row = Record::new();
    row.insert(USER_EMAIL, email.as_str());
    row.insert(PURPOSE, purpose);
    row.insert(STATUS, RequestStatus::Pending.as_str());
    row.insert(REQUEST_DATE, format_timestamp(now));
    let stored = storage.insert_one(Table::AccessRequests, row)?;
    AccessRequest::from_record(&stored)
}

pub fn latest<S: Storage + ?Sized>(
    storage: &S,
    email: &Email,
) -> Result<Option<AccessRequest>, PortalError> {
    let rows = storage.select_eq(
        Table::AccessRequests,
        &[(USER_EMAIL, FieldValue::text(email.as_str()))],
    )?;
    Ok(parse_all(rows)?.into_iter().max_by_key(|request| request.id))
}

pub fn current_status<S: Storage + ?Sized>(
    storage: &S,
    email: &Email,
) -> Result<Option<RequestStatus>, PortalError> {
    Ok(latest(storage, email)?.map(|request| request.status))
}

pub fn pending<S: Storage + ?Sized>(storage: &S) -> Result<Vec<AccessRequest>, PortalError> {
    let rows = storage.select_eq(
        Table::AccessRequests,
        &[(STATUS, FieldValue::text(RequestStatus::Pending.as_str()))],
    )?;
    let mut requests = parse_all(rows)?;
    requests.sort_by_key(|request| request.id);
    Ok(requests)
}

pub fn find<S: Storage + ?Sized>(storage: &S, id: i64) -> Result<AccessRequest, PortalError> {
    let rows = storage.select_eq(Table::AccessRequests, &[(ID_COLUMN, FieldValue::Integer(id))])?;
    let row = rows.first().ok_or(PortalError::RequestNotFound(id))?;
    AccessRequest::from_record(row)
}

pub fn decide<S: Storage + ?Sized>(
    storage: &S,
    id: i64,
    decision: Decision,
) -> Result<AccessRequest, PortalError> {
    let request = find(storage, id)?;
    let target = decision.status();
    if request.status.is_terminal() {
        return Err(PortalError::InvalidTransition {
            id,
            from: request.status,
            to: target,
        });
    }
    write_status(storage, request, target)
}

pub fn override_status<S: Storage + ?Sized>(
    storage: &S,
    id: i64,
    status: RequestStatus,
) -> Result<AccessRequest, PortalError> {
    let request = find(storage, id)?;
    write_status(storage, request, status)
}

fn write_status<S: Storage + ?Sized>(
    storage: &S,
    mut request: AccessRequest,
    status: RequestStatus,
) -> Result<AccessRequest, PortalError> {
    let mut patch = Record::new();
    patch.insert(STATUS, status.as_str());
    storage.update_by_id(Table::AccessRequests, request.id, patch)?;
    request.status = status;
    Ok(request)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::NaiveDate;

    use super::*;
    use crate::storage::MemoryStorage;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn email(value: &str) -> Email {
        value.parse().unwrap()
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("approved".parse::<RequestStatus>().unwrap(), RequestStatus::Approved);
        assert_matches!(
            "maybe".parse::<RequestStatus>(),
            Err(PortalError::InvalidStatus(_))
        );
    }

    #[test]
    fn short_purpose_is_rejected() {
        let storage = MemoryStorage::new();
        let result = submit(&storage, &email("a@x.org"), "   map   ", 5, now());
        assert_matches!(result, Err(PortalError::Validation(_)));
        let result = submit(&storage, &email("a@x.org"), "short", 5, now());
        assert_matches!(result, Err(PortalError::Validation(_)));
        assert!(storage.select_all(Table::AccessRequests).unwrap().is_empty());
    }

    #[test]
    fn pending_request_blocks_another() {
        let storage = MemoryStorage::new();
        let user = email("a@x.org");
        submit(&storage, &user, "coastal salinity thesis", 5, now()).unwrap();
        let second = submit(&storage, &user, "another purpose text", 5, now());
        assert_matches!(second, Err(PortalError::PendingRequestExists));
        assert_eq!(storage.select_all(Table::AccessRequests).unwrap().len(), 1);
    }

    #[test]
    fn decided_request_allows_resubmission() {
        let storage = MemoryStorage::new();
        let user = email("a@x.org");
        let first = submit(&storage, &user, "coastal salinity thesis", 5, now()).unwrap();
        decide(&storage, first.id, Decision::Reject).unwrap();
        assert_eq!(
            current_status(&storage, &user).unwrap(),
            Some(RequestStatus::Rejected)
        );
        submit(&storage, &user, "revised salinity thesis", 5, now()).unwrap();
        assert_eq!(
            current_status(&storage, &user).unwrap(),
            Some(RequestStatus::Pending)
        );
    }

    #[test]
    fn approved_request_allows_resubmission() {
        let storage = MemoryStorage::new();
        let user = email("a@x.org");
        let first = submit(&storage, &user, "coastal salinity thesis", 5, now()).unwrap();
        decide(&storage, first.id, Decision::Approve).unwrap();
        let second = submit(&storage, &user, "follow-up mangrove survey", 5, now()).unwrap();
        assert!(second.id > first.id);
        assert_eq!(storage.select_all(Table::AccessRequests).unwrap().len(), 2);
        assert_eq!(
            current_status(&storage, &user).unwrap(),
            Some(RequestStatus::Pending)
        );
    }

    #[test]
    fn terminal_requests_cannot_be_decided_again() {
        let storage = MemoryStorage::new();
        let request = submit(&storage, &email("a@x.org"), "fisheries survey", 5, now()).unwrap();
        decide(&storage, request.id, Decision::Approve).unwrap();
        assert_matches!(
            decide(&storage, request.id, Decision::Reject),
            Err(PortalError::InvalidTransition {
                from: RequestStatus::Approved,
                to: RequestStatus::Rejected,
                ..
            })
        );
        assert_matches!(
            decide(&storage, 99, Decision::Approve),
            Err(PortalError::RequestNotFound(99))
        );
    }

    #[test]
    fn no_request_means_no_status() {
        let storage = MemoryStorage::new();
        assert_eq!(current_status(&storage, &email("a@x.org")).unwrap(), None);
    }

    #[test]
    fn pending_lists_only_open_requests() {
        let storage = MemoryStorage::new();
        let first = submit(&storage, &email("a@x.org"), "fisheries survey", 5, now()).unwrap();
        submit(&storage, &email("b@x.org"), "mangrove mapping", 5, now()).unwrap();
        decide(&storage, first.id, Decision::Approve).unwrap();
        let open = pending(&storage).unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].user_email, "b@x.org");
    }

    #[test]
    fn override_reopens_a_rejected_request() {
        let storage = MemoryStorage::new();
        let user = email("a@x.org");
        let request = submit(&storage, &user, "fisheries survey", 5, now()).unwrap();
        decide(&storage, request.id, Decision::Reject).unwrap();
        override_status(&storage, request.id, RequestStatus::Approved).unwrap();
        assert_eq!(
            current_status(&storage, &user).unwrap(),
            Some(RequestStatus::Approved)
        );
    }
}
