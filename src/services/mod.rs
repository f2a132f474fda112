pub use pushkind_common::services::errors::{ServiceError, ServiceResult};

pub mod categories;
pub mod category_tree;
