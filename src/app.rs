use std::io::Read;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::access::{self, AccessRequest, Decision, RequestStatus};
use crate::assembler::{self, BatchMetadata, SingleEntry, UploadTable};
use crate::catalog;
use crate::certificate::{self, Certificate};
use crate::config::ResolvedConfig;
use crate::dataset::Dataset;
use crate::domain::{Clock, Email, FieldValue, Record, RequestContext, format_timestamp};
use crate::error::PortalError;
use crate::export::{ExportRequest, ExportTable, export_dataset};
use crate::normalize;
use crate::notify::{self, Notifier};
use crate::regions;
use crate::research::{self, ResearchDraft, ResearchItem};
use crate::storage::{Storage, Table};

#[derive(Debug, Clone, Serialize)]
pub struct SubmitResult {
    pub region: String,
    pub contributions: usize,
    pub certificate: Option<Certificate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkUploadReport {
    pub file_name: String,
    pub region: String,
    pub rows_total: usize,
    pub rows_persisted: usize,
    pub chunks_total: usize,
    pub chunks_persisted: usize,
    pub failure: Option<String>,
}

impl BulkUploadReport {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none() && self.rows_persisted == self.rows_total
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapPoint {
    pub id: Option<i64>,
    pub region: Option<String>,
    pub spot: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportResult {
    pub file_name: String,
    pub rows: usize,
    #[serde(skip)]
    pub table: ExportTable,
}

impl ExportResult {
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>, PortalError> {
        self.table.to_csv_bytes()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessRequestResult {
    pub request: AccessRequest,
    pub admin_notified: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessStatusResult {
    pub email: String,
    pub status: Option<RequestStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DecisionResult {
    pub request: AccessRequest,
    pub notified: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteResult {
    pub requested: usize,
    pub deleted: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RepairReport {
    pub scanned: usize,
    pub updated: usize,
    pub unmatched: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct Portal<S: Storage, N: Notifier, C: Clock> {
    storage: S,
    notifier: N,
    clock: C,
    config: ResolvedConfig,
}

impl<S: Storage, N: Notifier, C: Clock> Portal<S, N, C> {
    pub fn new(storage: S, notifier: N, clock: C, config: ResolvedConfig) -> Self {
        Self {
            storage,
            notifier,
            clock,
            config,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn submit_entry(
        &self,
        ctx: &RequestContext,
        entry: &SingleEntry,
    ) -> Result<SubmitResult, PortalError> {
        let now = self.clock.now();
        let record = assembler::assemble_single(ctx, entry, now)?;
        let region = record.text(catalog::REGION).unwrap_or_default().to_string();
        self.storage
            .insert_one(Table::Observations, normalize::to_storage(&record))?;
        tracing::info!(email = %ctx.email, region = %region, "observation saved");

        let contributions = self.contribution_count(&ctx.email)?;
        let certificate = certificate::issue(
            &ctx.name,
            contributions,
            self.config.certificate_threshold,
            now.date(),
        );
        Ok(SubmitResult {
            region,
            contributions,
            certificate,
        })
    }

    pub fn upload_bulk<R: Read>(
        &self,
        ctx: &RequestContext,
        batch: &BatchMetadata,
        file_name: &str,
        reader: R,
        sink: &dyn ProgressSink,
    ) -> Result<BulkUploadReport, PortalError> {
        let started = Instant::now();
        let table = UploadTable::read(file_name, reader)?;
        let records = assembler::assemble_bulk(ctx, batch, &table, self.clock.now())?;
        let region = batch.region.compose()?;
        let rows = records
            .iter()
            .map(normalize::to_storage)
            .collect::<Vec<_>>();

        let chunk_size = self.config.upload_chunk_size.max(1);
        let mut report = BulkUploadReport {
            file_name: file_name.to_string(),
            region,
            rows_total: rows.len(),
            rows_persisted: 0,
            chunks_total: rows.len().div_ceil(chunk_size),
            chunks_persisted: 0,
            failure: None,
        };
        sink.event(ProgressEvent {
            message: format!(
                "phase=Persist; rows={} chunks={}",
                report.rows_total, report.chunks_total
            ),
            elapsed: Some(started.elapsed()),
        });

        for (index, chunk) in rows.chunks(chunk_size).enumerate() {
            match self
                .storage
                .insert_many(Table::Observations, chunk.to_vec())
            {
                Ok(count) => {
                    report.rows_persisted += count;
                    report.chunks_persisted += 1;
                    sink.event(ProgressEvent {
                        message: format!(
                            "chunk {}/{} saved ({} rows)",
                            index + 1,
                            report.chunks_total,
                            count
                        ),
                        elapsed: Some(started.elapsed()),
                    });
                }
                Err(err) => {
                    tracing::warn!(
                        file = file_name,
                        chunk = index + 1,
                        persisted = report.rows_persisted,
                        error = %err,
                        "bulk upload chunk failed"
                    );
                    report.failure = Some(format!("chunk {} failed: {err}", index + 1));
                    break;
                }
            }
        }

        tracing::info!(
            file = file_name,
            rows = report.rows_total,
            persisted = report.rows_persisted,
            chunks = report.chunks_persisted,
            "bulk upload finished"
        );
        Ok(report)
    }

    pub fn fetch_dataset(&self) -> Result<Dataset, PortalError> {
        let rows = self.storage.select_all(Table::Observations)?;
        Ok(normalize::dataset_from_storage(Dataset::from_records(rows)))
    }

    pub fn map_points(&self) -> Result<Vec<MapPoint>, PortalError> {
        let points = self
            .fetch_dataset()?
            .records()
            .iter()
            .filter_map(|record| {
                let latitude = record.get(catalog::LATITUDE)?.as_f64()?;
                let longitude = record.get(catalog::LONGITUDE)?.as_f64()?;
                Some(MapPoint {
                    id: record.id(),
                    region: record.text(catalog::REGION).map(str::to_string),
                    spot: record.text(catalog::SPOT).map(str::to_string),
                    latitude,
                    longitude,
                })
            })
            .collect();
        Ok(points)
    }

    pub fn regions_with_data(&self, state: Option<&str>) -> Result<Vec<String>, PortalError> {
        let available = self.fetch_dataset()?.distinct_text(catalog::REGION);
        Ok(match state {
            Some(state) => regions::regions_in_state(state, &available),
            None => available,
        })
    }

    pub fn export(
        &self,
        ctx: &RequestContext,
        request: &ExportRequest,
    ) -> Result<ExportResult, PortalError> {
        let status = access::current_status(&self.storage, &ctx.email)?;
        if status != Some(RequestStatus::Approved) {
            let status = status
                .map(|status| status.to_string())
                .unwrap_or_else(|| "None".to_string());
            tracing::info!(email = %ctx.email, status = %status, "export refused");
            return Err(PortalError::AccessNotGranted { status });
        }
        let table = export_dataset(&self.fetch_dataset()?, request);
        tracing::info!(
            email = %ctx.email,
            region = %request.region,
            rows = table.len(),
            "export prepared"
        );
        Ok(ExportResult {
            file_name: request.file_name(),
            rows: table.len(),
            table,
        })
    }

    pub fn request_access(
        &self,
        ctx: &RequestContext,
        purpose: &str,
    ) -> Result<AccessRequestResult, PortalError> {
        let request = access::submit(
            &self.storage,
            &ctx.email,
            purpose,
            self.config.min_purpose_chars,
            self.clock.now(),
        )?;
        tracing::info!(email = %ctx.email, id = request.id, "access requested");

        let admin_notified = match &self.config.admin_email {
            Some(admin) => self.notify(
                admin.as_str(),
                notify::NEW_REQUEST_SUBJECT,
                &notify::new_request_body(ctx.email.as_str(), &request.purpose),
            ),
            None => false,
        };
        Ok(AccessRequestResult {
            request,
            admin_notified,
        })
    }

    pub fn access_status(&self, email: &Email) -> Result<AccessStatusResult, PortalError> {
        Ok(AccessStatusResult {
            email: email.to_string(),
            status: access::current_status(&self.storage, email)?,
        })
    }

    pub fn pending_requests(&self, ctx: &RequestContext) -> Result<Vec<AccessRequest>, PortalError> {
        ctx.require_admin()?;
        access::pending(&self.storage)
    }

    pub fn decide_request(
        &self,
        ctx: &RequestContext,
        id: i64,
        decision: Decision,
    ) -> Result<DecisionResult, PortalError> {
        ctx.require_admin()?;
        let request = access::decide(&self.storage, id, decision)?;
        tracing::info!(id, status = %request.status, by = %ctx.email, "access request decided");

        let notified = match decision {
            Decision::Approve => self.notify(
                &request.user_email,
                notify::APPROVAL_SUBJECT,
                &notify::approval_body(),
            ),
            Decision::Reject => false,
        };
        Ok(DecisionResult { request, notified })
    }

    pub fn override_status(
        &self,
        ctx: &RequestContext,
        id: i64,
        status: RequestStatus,
    ) -> Result<AccessRequest, PortalError> {
        ctx.require_admin()?;
        let request = access::override_status(&self.storage, id, status)?;
        tracing::warn!(id, status = %status, by = %ctx.email, "access status overridden");
        Ok(request)
    }

    pub fn delete_records(
        &self,
        ctx: &RequestContext,
        ids: &[i64],
    ) -> Result<DeleteResult, PortalError> {
        ctx.require_admin()?;
        let deleted = self.storage.delete_by_ids(Table::Observations, ids)?;
        tracing::info!(requested = ids.len(), deleted, by = %ctx.email, "observations deleted");
        Ok(DeleteResult {
            requested: ids.len(),
            deleted,
        })
    }

    pub fn repair_coordinates(&self, ctx: &RequestContext) -> Result<RepairReport, PortalError> {
        ctx.require_admin()?;
        let region_column = normalize::storage_key(catalog::REGION);
        let mut report = RepairReport::default();

        for row in self.storage.select_all(Table::Observations)? {
            report.scanned += 1;
            let (Some(id), Some(region)) = (row.id(), row.text(&region_column)) else {
                report.unmatched += 1;
                continue;
            };
            let Some((latitude, longitude)) = regions::match_coords(region) else {
                report.unmatched += 1;
                continue;
            };
            let mut patch = Record::new();
            patch.insert(normalize::storage_key(catalog::LATITUDE), latitude);
            patch.insert(normalize::storage_key(catalog::LONGITUDE), longitude);
            match self.storage.update_by_id(Table::Observations, id, patch) {
                Ok(()) => report.updated += 1,
                Err(err) => {
                    tracing::warn!(id, error = %err, "coordinate update failed");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            scanned = report.scanned,
            updated = report.updated,
            failed = report.failed,
            "coordinate repair finished"
        );
        Ok(report)
    }

    pub fn publish_research(
        &self,
        ctx: &RequestContext,
        draft: &ResearchDraft,
    ) -> Result<ResearchItem, PortalError> {
        let created_at = format_timestamp(self.clock.now());
        let record = draft.to_record(ctx, &created_at)?;
        let stored = self.storage.insert_one(Table::ResearchPapers, record)?;
        let item = ResearchItem::from_record(&stored)?;
        tracing::info!(id = item.id, official = item.official, "research item published");
        Ok(item)
    }

    pub fn research_items(&self) -> Result<Vec<ResearchItem>, PortalError> {
        let items = self
            .storage
            .select_all(Table::ResearchPapers)?
            .iter()
            .map(ResearchItem::from_record)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(research::newest_first(items))
    }

    pub fn contribution_count(&self, email: &Email) -> Result<usize, PortalError> {
        let rows = self.storage.select_eq(
            Table::Observations,
            &[(
                normalize::storage_key(catalog::EMAIL).as_str(),
                FieldValue::text(email.as_str()),
            )],
        )?;
        Ok(rows.len())
    }

    fn notify(&self, to: &str, subject: &str, body: &str) -> bool {
        match self.notifier.send(to, subject, body) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(to, subject, error = %err, "notification not delivered");
                false
            }
        }
    }
}
