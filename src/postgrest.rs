use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue, USER_AGENT};

use crate::domain::{FieldValue, Record};
use crate::error::PortalError;
use crate::storage::{ID_COLUMN, Storage, Table};

const PREFER: &str = "Prefer";

#[derive(Clone)]
pub struct PostgrestStorage {
    client: Client,
    base_url: String,
}

impl PostgrestStorage {
    pub fn new(url: &str, api_key: &str) -> Result<Self, PortalError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("marine-portal/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| PortalError::StorageHttp(err.to_string()))?,
        );
        headers.insert(
            HeaderName::from_static("apikey"),
            HeaderValue::from_str(api_key)
                .map_err(|err| PortalError::StorageHttp(err.to_string()))?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|err| PortalError::StorageHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| PortalError::StorageHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
        })
    }

    pub fn table_url(&self, table: Table) -> String {
        format!("{}/rest/v1/{}", self.base_url, table.name())
    }

    fn handle_status(response: Response) -> Result<Response, PortalError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "storage request failed".to_string());
        Err(PortalError::StorageStatus { status, message })
    }

    fn send_with_retries<F>(&self, mut make_req: F) -> Result<Response, PortalError>
    where
        F: FnMut() -> RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            match make_req().send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        tracing::debug!(status, attempt, "retrying storage request");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Self::handle_status(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(PortalError::StorageHttp(err.to_string()));
                }
            }
        }
    }

    fn read_rows(response: Response) -> Result<Vec<Record>, PortalError> {
        response
            .json()
            .map_err(|err| PortalError::StorageHttp(err.to_string()))
    }
}

impl Storage for PostgrestStorage {
    fn insert_one(&self, table: Table, row: Record) -> Result<Record, PortalError> {
        let url = self.table_url(table);
        let response = self.send_with_retries(|| {
            self.client
                .post(&url)
                .header(PREFER, "return=representation")
                .json(&row)
        })?;
        Self::read_rows(response)?
            .into_iter()
            .next()
            .ok_or_else(|| PortalError::Storage(format!("{table}: insert returned no row")))
    }

    fn insert_many(&self, table: Table, rows: Vec<Record>) -> Result<usize, PortalError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let url = self.table_url(table);
        self.send_with_retries(|| {
            self.client
                .post(&url)
                .header(PREFER, "return=minimal")
                .json(&rows)
        })?;
        Ok(rows.len())
    }

    fn select_all(&self, table: Table) -> Result<Vec<Record>, PortalError> {
        self.select_eq(table, &[])
    }

    fn select_eq(
        &self,
        table: Table,
        filters: &[(&str, FieldValue)],
    ) -> Result<Vec<Record>, PortalError> {
        let url = self.table_url(table);
        let mut params = vec![
            ("select".to_string(), "*".to_string()),
            ("order".to_string(), format!("{ID_COLUMN}.asc")),
        ];
        params.extend(
            filters
                .iter()
                .map(|(column, value)| (column.to_string(), eq_filter(value))),
        );
        let response = self.send_with_retries(|| self.client.get(&url).query(&params))?;
        Self::read_rows(response)
    }

    fn update_by_id(&self, table: Table, id: i64, patch: Record) -> Result<(), PortalError> {
        let url = self.table_url(table);
        let params = [(ID_COLUMN, format!("eq.{id}"))];
        let response = self.send_with_retries(|| {
            self.client
                .patch(&url)
                .query(&params)
                .header(PREFER, "return=representation")
                .json(&patch)
        })?;
        if Self::read_rows(response)?.is_empty() {
            return Err(PortalError::Storage(format!("{table}: no row with id {id}")));
        }
        Ok(())
    }

    fn delete_by_ids(&self, table: Table, ids: &[i64]) -> Result<usize, PortalError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let url = self.table_url(table);
        let params = [(ID_COLUMN, in_filter(ids))];
        let response = self.send_with_retries(|| {
            self.client
                .delete(&url)
                .query(&params)
                .header(PREFER, "return=representation")
        })?;
        Ok(Self::read_rows(response)?.len())
    }
}

pub fn eq_filter(value: &FieldValue) -> String {
    match value {
        FieldValue::Null => "is.null".to_string(),
        other => format!("eq.{other}"),
    }
}

pub fn in_filter(ids: &[i64]) -> String {
    let joined = ids
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");
    format!("in.({joined})")
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_use_postgrest_operators() {
        assert_eq!(eq_filter(&FieldValue::text("Pending")), "eq.Pending");
        assert_eq!(eq_filter(&FieldValue::Integer(7)), "eq.7");
        assert_eq!(eq_filter(&FieldValue::Null), "is.null");
        assert_eq!(in_filter(&[3, 5, 8]), "in.(3,5,8)");
    }

    #[test]
    fn table_urls_trim_trailing_slash() {
        let storage = PostgrestStorage::new("https://example.supabase.co/", "anon").unwrap();
        assert_eq!(
            storage.table_url(Table::AccessRequests),
            "https://example.supabase.co/rest/v1/access_requests"
        );
    }

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(404));
    }
}
