use mockall::mock;

use super::{CategoryReader, CategoryUpdateError, CategoryWriter};
use crate::domain::category::{Category, NewCategory, UpdateCategory};
use pushkind_common::repository::errors::RepositoryResult;

mock! {
    pub CategoryReader {}

    impl CategoryReader for CategoryReader {
        fn list_categories(&self, hub_id: i32) -> RepositoryResult<Vec<Category>>;
        fn get_category_by_id(&self, category_id: i32, hub_id: i32) -> RepositoryResult<Option<Category>>;
    }
}

mock! {
    pub CategoryWriter {}

    impl CategoryWriter for CategoryWriter {
        fn create_category(&self, new_category: &NewCategory) -> RepositoryResult<Category>;
        fn update_category(&self, category_id: i32, hub_id: i32, updates: &UpdateCategory) -> Result<Category, CategoryUpdateError>;
        fn delete_category(&self, category_id: i32, hub_id: i32) -> RepositoryResult<()>;
    }
}
