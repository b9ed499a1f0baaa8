//! Redb-backed durable catalog.
//!
//! Three tables: records keyed by project id, the listing keyed by insertion
//! sequence, and the reverse index from project id to sequence so a delete
//! does not have to scan the listing.

use std::{path::Path, sync::Arc};

use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use scanrig_proto::{ProjectId, ProjectRecord};

use super::{Catalog, CatalogError, window};

/// Table: records
/// Key: project id
/// Value: CBOR-encoded `ProjectRecord`
const RECORDS: TableDefinition<u64, &[u8]> = TableDefinition::new("records");

/// Table: listing
/// Key: insertion sequence (ascending; listing reads it in reverse)
/// Value: project id
const LISTING: TableDefinition<u64, u64> = TableDefinition::new("listing");

/// Table: listing_index
/// Key: project id
/// Value: insertion sequence
const LISTING_INDEX: TableDefinition<u64, u64> = TableDefinition::new("listing_index");

/// Durable catalog backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbCatalog {
    db: Arc<Database>,
}

impl std::fmt::Debug for RedbCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbCatalog").finish_non_exhaustive()
    }
}

fn io(e: impl std::fmt::Display) -> CatalogError {
    CatalogError::Io(e.to_string())
}

impl RedbCatalog {
    /// Open or create a catalog database at `path`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let db = Database::create(path.as_ref()).map_err(io)?;

        let txn = db.begin_write().map_err(io)?;
        {
            let _ = txn.open_table(RECORDS).map_err(io)?;
            let _ = txn.open_table(LISTING).map_err(io)?;
            let _ = txn.open_table(LISTING_INDEX).map_err(io)?;
        }
        txn.commit().map_err(io)?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl Catalog for RedbCatalog {
    fn insert(&self, record: &ProjectRecord) -> Result<(), CatalogError> {
        let mut bytes = Vec::new();
        ciborium::into_writer(record, &mut bytes)
            .map_err(|e| CatalogError::Serialization(e.to_string()))?;

        let id = record.id.get();
        let txn = self.db.begin_write().map_err(io)?;
        {
            let mut records = txn.open_table(RECORDS).map_err(io)?;
            records.insert(id, bytes.as_slice()).map_err(io)?;

            let mut index = txn.open_table(LISTING_INDEX).map_err(io)?;
            let listed = index.get(id).map_err(io)?.is_some();
            if !listed {
                let mut listing = txn.open_table(LISTING).map_err(io)?;
                let seq = match listing.last().map_err(io)? {
                    Some((key, _)) => key.value() + 1,
                    None => 0,
                };
                listing.insert(seq, id).map_err(io)?;
                index.insert(id, seq).map_err(io)?;
            }
        }
        txn.commit().map_err(io)?;

        Ok(())
    }

    fn list(&self, page: u32, per_page: u32) -> Result<Vec<ProjectId>, CatalogError> {
        let (offset, len) = window(page, per_page);

        let txn = self.db.begin_read().map_err(io)?;
        let listing = txn.open_table(LISTING).map_err(io)?;

        let mut ids = Vec::with_capacity(len.min(1024));
        for entry in listing.iter().map_err(io)?.rev().skip(offset).take(len) {
            let (_, id) = entry.map_err(io)?;
            ids.push(ProjectId::new(id.value()));
        }

        Ok(ids)
    }

    fn get(&self, id: ProjectId) -> Result<Option<ProjectRecord>, CatalogError> {
        let txn = self.db.begin_read().map_err(io)?;
        let records = txn.open_table(RECORDS).map_err(io)?;

        match records.get(id.get()).map_err(io)? {
            Some(value) => {
                let record: ProjectRecord = ciborium::from_reader(value.value())
                    .map_err(|e| CatalogError::Serialization(e.to_string()))?;
                Ok(Some(record))
            },
            None => Ok(None),
        }
    }

    fn delete(&self, id: ProjectId) -> Result<bool, CatalogError> {
        let txn = self.db.begin_write().map_err(io)?;
        let existed = {
            let mut records = txn.open_table(RECORDS).map_err(io)?;
            let had_record = records.remove(id.get()).map_err(io)?.is_some();

            let mut index = txn.open_table(LISTING_INDEX).map_err(io)?;
            let seq = index.remove(id.get()).map_err(io)?.map(|seq| seq.value());
            if let Some(seq) = seq {
                let mut listing = txn.open_table(LISTING).map_err(io)?;
                listing.remove(seq).map_err(io)?;
            }

            had_record || seq.is_some()
        };
        txn.commit().map_err(io)?;

        Ok(existed)
    }

    fn len(&self) -> Result<usize, CatalogError> {
        let txn = self.db.begin_read().map_err(io)?;
        let listing = txn.open_table(LISTING).map_err(io)?;
        let len = listing.len().map_err(io)?;
        Ok(usize::try_from(len).unwrap_or(usize::MAX))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn record(id: u64) -> ProjectRecord {
        ProjectRecord::new(ProjectId::new(id)).with_field("images", "90")
    }

    #[test]
    fn insert_then_get() {
        let dir = tempdir().unwrap();
        let catalog = RedbCatalog::open(dir.path().join("catalog.redb")).unwrap();

        catalog.insert(&record(7)).unwrap();

        assert_eq!(catalog.get(ProjectId::new(7)).unwrap(), Some(record(7)));
        assert_eq!(catalog.get(ProjectId::new(8)).unwrap(), None);
    }

    #[test]
    fn listing_is_newest_first_and_paged() {
        let dir = tempdir().unwrap();
        let catalog = RedbCatalog::open(dir.path().join("catalog.redb")).unwrap();

        for id in 1..=5 {
            catalog.insert(&record(id)).unwrap();
        }

        let page = |p| -> Vec<u64> {
            catalog.list(p, 2).unwrap().into_iter().map(ProjectId::get).collect()
        };
        assert_eq!(page(0), vec![5, 4]);
        assert_eq!(page(1), vec![3, 2]);
        assert_eq!(page(2), vec![1]);
        assert!(page(3).is_empty());
    }

    #[test]
    fn delete_removes_record_and_listing() {
        let dir = tempdir().unwrap();
        let catalog = RedbCatalog::open(dir.path().join("catalog.redb")).unwrap();

        catalog.insert(&record(1)).unwrap();
        catalog.insert(&record(2)).unwrap();

        assert!(catalog.delete(ProjectId::new(1)).unwrap());
        assert!(!catalog.delete(ProjectId::new(1)).unwrap());

        assert_eq!(catalog.list(0, 10).unwrap(), vec![ProjectId::new(2)]);
        assert_eq!(catalog.get(ProjectId::new(1)).unwrap(), None);
        assert_eq!(catalog.len().unwrap(), 1);
    }

    #[test]
    fn reinsert_keeps_single_listing_entry() {
        let dir = tempdir().unwrap();
        let catalog = RedbCatalog::open(dir.path().join("catalog.redb")).unwrap();

        catalog.insert(&record(1)).unwrap();
        catalog.insert(&record(1)).unwrap();

        assert_eq!(catalog.len().unwrap(), 1);
    }
}
