use pushkind_common::db::{DbConnection, DbPool};
use pushkind_common::repository::errors::{RepositoryError, RepositoryResult};
use thiserror::Error;

use crate::domain::category::{Category, NewCategory, UpdateCategory};

pub mod category;

#[cfg(test)]
pub mod mock;

#[derive(Clone)]
/// Diesel-backed repository implementation that wraps an r2d2 pool.
pub struct DieselRepository {
    pool: DbPool, // r2d2::Pool is cheap to clone
}

impl DieselRepository {
    /// Create a new repository using the provided connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> RepositoryResult<DbConnection> {
        Ok(self.pool.get()?)
    }
}

/// Failure of [`CategoryWriter::update_category`].
#[derive(Debug, Error)]
pub enum CategoryUpdateError {
    #[error("category cannot be nested under itself or its descendants")]
    Cycle,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<diesel::result::Error> for CategoryUpdateError {
    fn from(err: diesel::result::Error) -> Self {
        Self::Repository(err.into())
    }
}

/// Read-only operations over category records.
pub trait CategoryReader {
    /// Flat list of the hub's categories in creation order.
    fn list_categories(&self, hub_id: i32) -> RepositoryResult<Vec<Category>>;
    fn get_category_by_id(&self, category_id: i32, hub_id: i32)
    -> RepositoryResult<Option<Category>>;
}

/// Write operations over category records.
pub trait CategoryWriter {
    fn create_category(&self, new_category: &NewCategory) -> RepositoryResult<Category>;
    /// Rewrite a category. The parent change is checked for cycles in the
    /// same transaction as the write.
    fn update_category(
        &self,
        category_id: i32,
        hub_id: i32,
        updates: &UpdateCategory,
    ) -> Result<Category, CategoryUpdateError>;
    /// Remove a category, moving its children up to its own parent.
    fn delete_category(&self, category_id: i32, hub_id: i32) -> RepositoryResult<()>;
}
