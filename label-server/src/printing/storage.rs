//! redb-based storage for label records and print jobs
//!
//! The `labels_by_business_id` table is the uniqueness backstop for dedup:
//! the existence check and the insert run inside one write transaction, and
//! redb serialises write transactions.

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use shared::models::{JobFilter, JobStatus, LabelFilter, LabelRecord, LabelStatus, PrintJob};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Label records table: key = internal_id, value = JSON
const LABELS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("labels");

/// Unique index: business_id -> internal_id
const LABELS_BY_BUSINESS_ID_TABLE: TableDefinition<&str, &str> =
    TableDefinition::new("labels_by_business_id");

/// Print jobs table: key = job_id, value = JSON
const PRINT_JOBS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("print_jobs");

/// Index: (label_id, job_id) -> ()
const PRINT_JOBS_BY_LABEL_TABLE: TableDefinition<(&str, &str), ()> =
    TableDefinition::new("print_jobs_by_label");

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unique constraint violated: business_id {0} already exists")]
    UniqueViolation(String),

    #[error("Label record not found: {0}")]
    LabelNotFound(Uuid),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Decision returned by a job transition closure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobUpdate {
    /// Persist the mutated job, optionally moving its label to a new status
    Commit { label_status: Option<LabelStatus> },
    /// Leave the stored job untouched
    Abort,
}

/// Result of [`LabelStore::update_job`]
#[derive(Debug, Clone)]
pub struct JobUpdateOutcome {
    /// The stored job after the call (unchanged when aborted)
    pub job: PrintJob,
    pub committed: bool,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct StorageStats {
    pub label_count: u64,
    pub job_count: u64,
}

/// Durable store for label records and print jobs
///
/// All mutations go through `insert_label`, `insert_job` and `update_job`,
/// each of which is a single atomic transaction.
pub trait LabelStore: Send + Sync {
    fn find_label_by_business_id(&self, business_id: &str) -> StorageResult<Option<LabelRecord>>;

    /// Insert a new record; fails with `UniqueViolation` if the business id is taken
    fn insert_label(&self, record: &LabelRecord) -> StorageResult<()>;

    fn get_label(&self, id: Uuid) -> StorageResult<Option<LabelRecord>>;

    /// Newest first, filtered and paginated
    fn list_labels(&self, filter: &LabelFilter) -> StorageResult<Vec<LabelRecord>>;

    fn insert_job(&self, job: &PrintJob) -> StorageResult<()>;

    fn get_job(&self, id: Uuid) -> StorageResult<Option<PrintJob>>;

    /// Newest first, filtered and paginated
    fn list_jobs(&self, filter: &JobFilter) -> StorageResult<Vec<PrintJob>>;

    /// Every job currently in `status`, oldest first
    fn jobs_in_status(&self, status: JobStatus) -> StorageResult<Vec<PrintJob>>;

    /// Apply a transition closure to one job inside a single write
    /// transaction. Returns `None` if the job does not exist.
    fn update_job(
        &self,
        id: Uuid,
        apply: &mut dyn FnMut(&mut PrintJob) -> JobUpdate,
    ) -> StorageResult<Option<JobUpdateOutcome>>;

    fn stats(&self) -> StorageResult<StorageStats>;
}

/// Label/print job storage
#[derive(Clone)]
pub struct PrintStorage {
    db: Arc<Database>,
}

impl PrintStorage {
    /// Open or create database
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open in-memory database (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db =
            Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(LABELS_TABLE)?;
            let _ = write_txn.open_table(LABELS_BY_BUSINESS_ID_TABLE)?;
            let _ = write_txn.open_table(PRINT_JOBS_TABLE)?;
            let _ = write_txn.open_table(PRINT_JOBS_BY_LABEL_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    fn read_label(txn: &WriteTransaction, id: &str) -> StorageResult<Option<LabelRecord>> {
        let table = txn.open_table(LABELS_TABLE)?;
        let record = match table.get(id)? {
            Some(guard) => Some(serde_json::from_slice(guard.value())?),
            None => None,
        };
        Ok(record)
    }

    fn write_label(txn: &WriteTransaction, record: &LabelRecord) -> StorageResult<()> {
        let mut table = txn.open_table(LABELS_TABLE)?;
        let value = serde_json::to_vec(record)?;
        table.insert(record.internal_id.to_string().as_str(), value.as_slice())?;
        Ok(())
    }

    fn write_job(txn: &WriteTransaction, job: &PrintJob) -> StorageResult<()> {
        let mut table = txn.open_table(PRINT_JOBS_TABLE)?;
        let value = serde_json::to_vec(job)?;
        table.insert(job.job_id.to_string().as_str(), value.as_slice())?;
        Ok(())
    }

    fn all_jobs(&self) -> StorageResult<Vec<PrintJob>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PRINT_JOBS_TABLE)?;

        let mut jobs = Vec::new();
        for result in table.iter()? {
            let (_, guard) = result?;
            jobs.push(serde_json::from_slice::<PrintJob>(guard.value())?);
        }
        Ok(jobs)
    }

    /// Jobs linked to one label, oldest first
    pub fn jobs_for_label(&self, label_id: Uuid) -> StorageResult<Vec<PrintJob>> {
        let read_txn = self.db.begin_read()?;
        let idx_table = read_txn.open_table(PRINT_JOBS_BY_LABEL_TABLE)?;
        let data_table = read_txn.open_table(PRINT_JOBS_TABLE)?;

        let label_key = label_id.to_string();
        let range_start: (&str, &str) = (label_key.as_str(), "");
        let range_end: (&str, &str) = (label_key.as_str(), "\u{ffff}");

        let mut jobs = Vec::new();
        for result in idx_table.range(range_start..=range_end)? {
            let (key, _) = result?;
            let (_, job_id) = key.value();
            if let Some(guard) = data_table.get(job_id)? {
                jobs.push(serde_json::from_slice::<PrintJob>(guard.value())?);
            }
        }

        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs)
    }
}

impl LabelStore for PrintStorage {
    fn find_label_by_business_id(&self, business_id: &str) -> StorageResult<Option<LabelRecord>> {
        let read_txn = self.db.begin_read()?;
        let idx_table = read_txn.open_table(LABELS_BY_BUSINESS_ID_TABLE)?;
        let data_table = read_txn.open_table(LABELS_TABLE)?;

        let Some(id) = idx_table.get(business_id)? else {
            return Ok(None);
        };
        match data_table.get(id.value())? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    fn insert_label(&self, record: &LabelRecord) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut idx_table = txn.open_table(LABELS_BY_BUSINESS_ID_TABLE)?;
            if idx_table.get(record.business_id.as_str())?.is_some() {
                drop(idx_table);
                txn.abort()?;
                return Err(StorageError::UniqueViolation(record.business_id.clone()));
            }
            let id = record.internal_id.to_string();
            idx_table.insert(record.business_id.as_str(), id.as_str())?;
        }
        Self::write_label(&txn, record)?;
        txn.commit()?;
        Ok(())
    }

    fn get_label(&self, id: Uuid) -> StorageResult<Option<LabelRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(LABELS_TABLE)?;

        match table.get(id.to_string().as_str())? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    fn list_labels(&self, filter: &LabelFilter) -> StorageResult<Vec<LabelRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(LABELS_TABLE)?;

        let mut records: Vec<LabelRecord> = Vec::new();
        for result in table.iter()? {
            let (_, guard) = result?;
            let record: LabelRecord = serde_json::from_slice(guard.value())?;
            if filter.matches(&record) {
                records.push(record);
            }
        }

        records.sort_by_key(|r| std::cmp::Reverse(r.created_at));
        Ok(records
            .into_iter()
            .skip(filter.offset)
            .take(filter.page_size())
            .collect())
    }

    fn insert_job(&self, job: &PrintJob) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        let label_key = job.label_ref.to_string();
        if Self::read_label(&txn, &label_key)?.is_none() {
            txn.abort()?;
            return Err(StorageError::LabelNotFound(job.label_ref));
        }

        Self::write_job(&txn, job)?;
        {
            let mut idx_table = txn.open_table(PRINT_JOBS_BY_LABEL_TABLE)?;
            let job_key = job.job_id.to_string();
            idx_table.insert((label_key.as_str(), job_key.as_str()), ())?;
        }
        txn.commit()?;
        Ok(())
    }

    fn get_job(&self, id: Uuid) -> StorageResult<Option<PrintJob>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PRINT_JOBS_TABLE)?;

        match table.get(id.to_string().as_str())? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    fn list_jobs(&self, filter: &JobFilter) -> StorageResult<Vec<PrintJob>> {
        let mut jobs = match filter.label_ref {
            Some(label_id) => self.jobs_for_label(label_id)?,
            None => self.all_jobs()?,
        };
        jobs.retain(|j| filter.matches(j));
        jobs.sort_by_key(|j| std::cmp::Reverse(j.created_at));

        Ok(jobs
            .into_iter()
            .skip(filter.offset)
            .take(filter.page_size())
            .collect())
    }

    fn jobs_in_status(&self, status: JobStatus) -> StorageResult<Vec<PrintJob>> {
        let mut jobs = self.all_jobs()?;
        jobs.retain(|j| j.status == status);
        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs)
    }

    fn update_job(
        &self,
        id: Uuid,
        apply: &mut dyn FnMut(&mut PrintJob) -> JobUpdate,
    ) -> StorageResult<Option<JobUpdateOutcome>> {
        let txn = self.db.begin_write()?;
        let key = id.to_string();

        let bytes = {
            let table = txn.open_table(PRINT_JOBS_TABLE)?;
            let value = table.get(key.as_str())?;
            value.map(|guard| guard.value().to_vec())
        };
        let Some(bytes) = bytes else {
            txn.abort()?;
            return Ok(None);
        };
        let current: PrintJob = serde_json::from_slice(&bytes)?;

        let mut job = current.clone();
        let label_status = match apply(&mut job) {
            JobUpdate::Commit { label_status } => label_status,
            JobUpdate::Abort => {
                txn.abort()?;
                return Ok(Some(JobUpdateOutcome {
                    job: current,
                    committed: false,
                }));
            }
        };

        Self::write_job(&txn, &job)?;

        if let Some(status) = label_status {
            let label_key = job.label_ref.to_string();
            let mut label = Self::read_label(&txn, &label_key)?
                .ok_or(StorageError::LabelNotFound(job.label_ref))?;
            label.status = status;
            label.updated_at = job.updated_at;
            if status == LabelStatus::Printed {
                label.printed_at = Some(job.updated_at);
            }
            Self::write_label(&txn, &label)?;
        }

        txn.commit()?;
        Ok(Some(JobUpdateOutcome {
            job,
            committed: true,
        }))
    }

    fn stats(&self) -> StorageResult<StorageStats> {
        let read_txn = self.db.begin_read()?;
        let labels = read_txn.open_table(LABELS_TABLE)?;
        let jobs = read_txn.open_table(PRINT_JOBS_TABLE)?;

        Ok(StorageStats {
            label_count: labels.len()?,
            job_count: jobs.len()?,
        })
    }
}
