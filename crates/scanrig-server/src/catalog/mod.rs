//! Project catalog.
//!
//! An ordered listing of project ids plus keyed project records. Listing is
//! newest-first and windowed by page. Deleting a project removes both the
//! record and its listing entry, with no transactional guarantee across the
//! two: readers must tolerate listed ids whose record is gone.
//!
//! The trait is synchronous; implementations share state via Arc so clones
//! see the same catalog.

mod memory;
mod redb;

pub use memory::MemoryCatalog;
use scanrig_proto::{ProjectId, ProjectRecord};
use thiserror::Error;

pub use self::redb::RedbCatalog;

/// Errors from catalog backends.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// Backend I/O or transaction failure
    #[error("catalog I/O error: {0}")]
    Io(String),

    /// Stored record could not be encoded or decoded
    #[error("catalog serialization error: {0}")]
    Serialization(String),
}

/// Project catalog backend.
///
/// Must be Clone (the driver and the scan engine both hold one), Send + Sync
/// and synchronous.
pub trait Catalog: Clone + Send + Sync + 'static {
    /// Store `record` and list its id first.
    ///
    /// Re-inserting an existing id replaces the record without listing it
    /// twice.
    fn insert(&self, record: &ProjectRecord) -> Result<(), CatalogError>;

    /// Ids at positions `[page * per_page, page * per_page + per_page)` of
    /// the newest-first listing.
    ///
    /// Fewer than `per_page` ids are returned only at the end of the listing.
    /// May include ids whose record no longer exists.
    fn list(&self, page: u32, per_page: u32) -> Result<Vec<ProjectId>, CatalogError>;

    /// Record for `id`, or `None` if it does not exist.
    fn get(&self, id: ProjectId) -> Result<Option<ProjectRecord>, CatalogError>;

    /// Remove the record and the listing entry for `id`.
    ///
    /// Returns `true` if either existed.
    fn delete(&self, id: ProjectId) -> Result<bool, CatalogError>;

    /// Number of listed ids.
    fn len(&self) -> Result<usize, CatalogError>;

    /// Whether nothing is listed.
    fn is_empty(&self) -> Result<bool, CatalogError> {
        Ok(self.len()? == 0)
    }
}

/// Offset and length of a listing page, saturating instead of overflowing.
fn window(page: u32, per_page: u32) -> (usize, usize) {
    let offset = u64::from(page) * u64::from(per_page);
    (usize::try_from(offset).unwrap_or(usize::MAX), per_page as usize)
}
