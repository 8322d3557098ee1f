//! Reservation stores
//!
//! - `InMemoryReservationStore` - process-local, used by tests and the
//!   `memory` backend
//! - `RocksDbReservationStore` - RocksDB with a single `reservations`
//!   column family (key: reservation id bytes, value: bincode record)

use crate::config::Config;
use crate::ports::ReservationStore;
use crate::types::{Reservation, ReservationId, ReservationUpdate};
use crate::{Error, Result};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use rocksdb::{BoundColumnFamily, ColumnFamilyDescriptor, Options, DB};
use std::sync::Arc;

/// Column family names
const CF_RESERVATIONS: &str = "reservations";

/// DashMap-backed store
#[derive(Debug, Default)]
pub struct InMemoryReservationStore {
    records: DashMap<ReservationId, Reservation>,
}

impl InMemoryReservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl ReservationStore for InMemoryReservationStore {
    async fn create_with_id(&self, id: ReservationId, record: &Reservation) -> Result<bool> {
        match self.records.entry(id) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(true)
            }
        }
    }

    async fn update(&self, id: ReservationId, update: ReservationUpdate) -> Result<bool> {
        match self.records.get_mut(&id) {
            Some(mut record) => {
                record.status = update.status;
                record.updated_at = update.updated_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn read(&self, id: ReservationId) -> Result<Option<Reservation>> {
        Ok(self.records.get(&id).map(|record| record.clone()))
    }
}

/// RocksDB-backed store
pub struct RocksDbReservationStore {
    db: Arc<DB>,
    /// Serializes read-modify-write sequences
    write_lock: Mutex<()>,
}

impl RocksDbReservationStore {
    /// Open or create database under `config.data_dir`
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors = vec![ColumnFamilyDescriptor::new(
            CF_RESERVATIONS,
            Self::cf_options_reservations(),
        )];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = ?path, "Opened reservation store");

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    fn cf_options_reservations() -> Options {
        let mut opts = Options::default();
        // Small, frequently read records
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_handle(&self) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(CF_RESERVATIONS)
            .ok_or_else(|| Error::Persistence(format!("Column family {} not found", CF_RESERVATIONS)))
    }

    fn get_record(&self, id: ReservationId) -> Result<Option<Reservation>> {
        let cf = self.cf_handle()?;
        match self.db.get_cf(&cf, id.as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    fn put_record(&self, record: &Reservation) -> Result<()> {
        let cf = self.cf_handle()?;
        let value = bincode::serialize(record)?;
        self.db.put_cf(&cf, record.id.as_bytes(), value)?;
        Ok(())
    }
}

#[async_trait]
impl ReservationStore for RocksDbReservationStore {
    async fn create_with_id(&self, id: ReservationId, record: &Reservation) -> Result<bool> {
        if record.id != id {
            return Err(Error::Validation(format!(
                "Record id {} does not match key {}",
                record.id, id
            )));
        }

        let _guard = self.write_lock.lock();
        if self.get_record(id)?.is_some() {
            return Ok(false);
        }
        self.put_record(record)?;

        tracing::debug!(reservation_id = %id, "Reservation record created");
        Ok(true)
    }

    async fn update(&self, id: ReservationId, update: ReservationUpdate) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let Some(mut record) = self.get_record(id)? else {
            return Ok(false);
        };

        record.status = update.status;
        record.updated_at = update.updated_at;
        self.put_record(&record)?;

        tracing::debug!(reservation_id = %id, status = %update.status, "Reservation record updated");
        Ok(true)
    }

    async fn read(&self, id: ReservationId) -> Result<Option<Reservation>> {
        self.get_record(id)
    }
}
