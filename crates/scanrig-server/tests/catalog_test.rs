//! Catalog backend behavior shared by the in-memory and redb catalogs.
//!
//! Every scenario runs against both backends so they stay interchangeable.

use scanrig_proto::{ProjectId, ProjectRecord};
use scanrig_server::catalog::{Catalog, MemoryCatalog, RedbCatalog};
use tempfile::TempDir;

fn record(id: u64) -> ProjectRecord {
    ProjectRecord::new(ProjectId::new(id)).with_field("name", format!("scan {id}"))
}

fn ids(values: &[u64]) -> Vec<ProjectId> {
    values.iter().copied().map(ProjectId::new).collect()
}

/// Run `scenario` against a fresh memory catalog and a fresh redb catalog.
fn for_each_backend(scenario: impl Fn(&dyn Fn() -> Box<dyn CatalogUnderTest>)) {
    let memory = || -> Box<dyn CatalogUnderTest> { Box::new(MemoryCatalog::new()) };
    scenario(&memory);

    let redb = || -> Box<dyn CatalogUnderTest> {
        let dir = TempDir::new().unwrap();
        let catalog = RedbCatalog::open(dir.path().join("catalog.redb")).unwrap();
        Box::new((catalog, dir))
    };
    scenario(&redb);
}

/// Object-safe view of a catalog plus whatever keeps it alive.
trait CatalogUnderTest {
    fn insert(&self, record: &ProjectRecord);
    fn list(&self, page: u32, per_page: u32) -> Vec<ProjectId>;
    fn get(&self, id: u64) -> Option<ProjectRecord>;
    fn delete(&self, id: u64) -> bool;
    fn len(&self) -> usize;
}

impl CatalogUnderTest for MemoryCatalog {
    fn insert(&self, record: &ProjectRecord) {
        Catalog::insert(self, record).unwrap();
    }
    fn list(&self, page: u32, per_page: u32) -> Vec<ProjectId> {
        Catalog::list(self, page, per_page).unwrap()
    }
    fn get(&self, id: u64) -> Option<ProjectRecord> {
        Catalog::get(self, ProjectId::new(id)).unwrap()
    }
    fn delete(&self, id: u64) -> bool {
        Catalog::delete(self, ProjectId::new(id)).unwrap()
    }
    fn len(&self) -> usize {
        Catalog::len(self).unwrap()
    }
}

impl CatalogUnderTest for (RedbCatalog, TempDir) {
    fn insert(&self, record: &ProjectRecord) {
        self.0.insert(record).unwrap();
    }
    fn list(&self, page: u32, per_page: u32) -> Vec<ProjectId> {
        self.0.list(page, per_page).unwrap()
    }
    fn get(&self, id: u64) -> Option<ProjectRecord> {
        self.0.get(ProjectId::new(id)).unwrap()
    }
    fn delete(&self, id: u64) -> bool {
        self.0.delete(ProjectId::new(id)).unwrap()
    }
    fn len(&self) -> usize {
        self.0.len().unwrap()
    }
}

#[test]
fn test_listing_is_newest_first() {
    for_each_backend(|fresh| {
        let catalog = fresh();
        for id in [10, 20, 30] {
            catalog.insert(&record(id));
        }

        assert_eq!(catalog.list(0, 10), ids(&[30, 20, 10]));
        assert_eq!(catalog.len(), 3);
    });
}

#[test]
fn test_pages_are_exact_windows() {
    for_each_backend(|fresh| {
        let catalog = fresh();
        for id in 1..=7 {
            catalog.insert(&record(id));
        }

        assert_eq!(catalog.list(0, 3), ids(&[7, 6, 5]));
        assert_eq!(catalog.list(1, 3), ids(&[4, 3, 2]));
        assert_eq!(catalog.list(2, 3), ids(&[1]));
        assert!(catalog.list(3, 3).is_empty());
        assert!(catalog.list(0, 0).is_empty());
    });
}

#[test]
fn test_huge_page_number_is_empty() {
    for_each_backend(|fresh| {
        let catalog = fresh();
        catalog.insert(&record(1));

        assert!(catalog.list(u32::MAX, u32::MAX).is_empty());
    });
}

#[test]
fn test_reinsert_replaces_without_relisting() {
    for_each_backend(|fresh| {
        let catalog = fresh();
        catalog.insert(&record(1));
        catalog.insert(&record(2));
        catalog.insert(&ProjectRecord::new(ProjectId::new(1)).with_field("name", "renamed"));

        assert_eq!(catalog.list(0, 10), ids(&[2, 1]));
        let stored = catalog.get(1).unwrap();
        assert_eq!(stored.fields.get("name").map(String::as_str), Some("renamed"));
    });
}

#[test]
fn test_delete_removes_record_and_listing() {
    for_each_backend(|fresh| {
        let catalog = fresh();
        for id in [1, 2, 3] {
            catalog.insert(&record(id));
        }

        assert!(catalog.delete(2));
        assert_eq!(catalog.list(0, 10), ids(&[3, 1]));
        assert!(catalog.get(2).is_none());
        assert_eq!(catalog.len(), 2);

        assert!(!catalog.delete(2), "second delete finds nothing");
    });
}

#[test]
fn test_get_unknown_is_none() {
    for_each_backend(|fresh| {
        let catalog = fresh();
        assert!(catalog.get(404).is_none());
        assert_eq!(catalog.len(), 0);
    });
}

#[test]
fn test_memory_listing_may_name_missing_records() {
    let catalog = MemoryCatalog::from_parts([record(1)], ids(&[2, 1]));

    assert_eq!(Catalog::list(&catalog, 0, 10).unwrap(), ids(&[2, 1]));
    assert!(Catalog::get(&catalog, ProjectId::new(2)).unwrap().is_none());
    assert_eq!(catalog.record_count(), 1);
}

#[test]
fn test_redb_catalog_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("catalog.redb");

    {
        let catalog = RedbCatalog::open(&path).unwrap();
        catalog.insert(&record(5)).unwrap();
        catalog.insert(&record(9)).unwrap();
    }

    let catalog = RedbCatalog::open(&path).unwrap();
    assert_eq!(catalog.list(0, 10).unwrap(), ids(&[9, 5]));
    assert_eq!(catalog.get(ProjectId::new(5)).unwrap(), Some(record(5)));
}
