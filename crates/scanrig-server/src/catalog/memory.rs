use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, PoisonError},
};

use scanrig_proto::{ProjectId, ProjectRecord};

use super::{Catalog, CatalogError, window};

/// In-memory catalog for tests and simulation.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    inner: Arc<Mutex<MemoryCatalogInner>>,
}

#[derive(Debug, Default)]
struct MemoryCatalogInner {
    records: HashMap<ProjectId, ProjectRecord>,
    /// Newest first
    order: VecDeque<ProjectId>,
}

impl MemoryCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from raw parts.
    ///
    /// `order` is newest-first and may name ids with no record, which is how
    /// tests reproduce a delete that only half completed.
    pub fn from_parts(
        records: impl IntoIterator<Item = ProjectRecord>,
        order: Vec<ProjectId>,
    ) -> Self {
        let records = records.into_iter().map(|record| (record.id, record)).collect();
        Self {
            inner: Arc::new(Mutex::new(MemoryCatalogInner { records, order: order.into() })),
        }
    }

    /// Number of stored records, listed or not.
    pub fn record_count(&self) -> usize {
        self.lock().records.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryCatalogInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Catalog for MemoryCatalog {
    fn insert(&self, record: &ProjectRecord) -> Result<(), CatalogError> {
        let mut inner = self.lock();
        if inner.records.insert(record.id, record.clone()).is_none()
            && !inner.order.contains(&record.id)
        {
            inner.order.push_front(record.id);
        }
        Ok(())
    }

    fn list(&self, page: u32, per_page: u32) -> Result<Vec<ProjectId>, CatalogError> {
        let (offset, len) = window(page, per_page);
        Ok(self.lock().order.iter().skip(offset).take(len).copied().collect())
    }

    fn get(&self, id: ProjectId) -> Result<Option<ProjectRecord>, CatalogError> {
        Ok(self.lock().records.get(&id).cloned())
    }

    fn delete(&self, id: ProjectId) -> Result<bool, CatalogError> {
        let mut inner = self.lock();
        let had_record = inner.records.remove(&id).is_some();
        let listed = inner.order.len();
        inner.order.retain(|listed_id| *listed_id != id);
        Ok(had_record || inner.order.len() != listed)
    }

    fn len(&self) -> Result<usize, CatalogError> {
        Ok(self.lock().order.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64) -> ProjectRecord {
        ProjectRecord::new(ProjectId::new(id)).with_field("name", format!("scan {id}"))
    }

    #[test]
    fn newest_first() {
        let catalog = MemoryCatalog::new();
        for id in 1..=3 {
            catalog.insert(&record(id)).unwrap();
        }

        let ids: Vec<u64> = catalog.list(0, 10).unwrap().iter().map(|id| id.get()).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn reinsert_does_not_duplicate() {
        let catalog = MemoryCatalog::new();
        catalog.insert(&record(1)).unwrap();
        catalog.insert(&record(1).with_field("name", "renamed")).unwrap();

        assert_eq!(catalog.len().unwrap(), 1);
        let stored = catalog.get(ProjectId::new(1)).unwrap().unwrap();
        assert_eq!(stored.fields.get("name").map(String::as_str), Some("renamed"));
    }

    #[test]
    fn dangling_ids_are_listed() {
        let catalog = MemoryCatalog::from_parts(
            [record(1)],
            vec![ProjectId::new(2), ProjectId::new(1)],
        );

        assert_eq!(catalog.list(0, 10).unwrap().len(), 2);
        assert_eq!(catalog.get(ProjectId::new(2)).unwrap(), None);
        assert_eq!(catalog.record_count(), 1);
    }

    #[test]
    fn delete_removes_dangling_entry() {
        let catalog = MemoryCatalog::from_parts([], vec![ProjectId::new(9)]);

        assert!(catalog.delete(ProjectId::new(9)).unwrap());
        assert!(!catalog.delete(ProjectId::new(9)).unwrap());
        assert!(catalog.is_empty().unwrap());
    }
}
