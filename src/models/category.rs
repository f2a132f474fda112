use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::domain::category::{
    Category as DomainCategory, NewCategory as DomainNewCategory,
    UpdateCategory as DomainUpdateCategory,
};

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::categories)]
pub struct Category {
    pub id: i32,
    pub hub_id: i32,
    pub parent_id: Option<i32>,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::categories)]
pub struct NewCategory<'a> {
    pub hub_id: i32,
    pub parent_id: Option<i32>,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub status: &'a str,
    pub updated_at: NaiveDateTime,
}

// `treat_none_as_null` so that clearing the parent or description is written.
#[derive(AsChangeset)]
#[diesel(table_name = crate::schema::categories, treat_none_as_null = true)]
pub struct UpdateCategory<'a> {
    pub parent_id: Option<i32>,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub status: &'a str,
    pub updated_at: NaiveDateTime,
}

impl Category {
    /// Convert the row into a domain category with the given product count.
    pub fn into_domain(self, products_count: i64) -> DomainCategory {
        DomainCategory {
            id: self.id,
            hub_id: self.hub_id,
            parent_id: self.parent_id,
            name: self.name,
            description: self.description,
            status: self.status.as_str().into(),
            products_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl From<Category> for DomainCategory {
    fn from(value: Category) -> Self {
        value.into_domain(0)
    }
}

impl<'a> From<&'a DomainNewCategory> for NewCategory<'a> {
    fn from(value: &'a DomainNewCategory) -> Self {
        Self {
            hub_id: value.hub_id,
            parent_id: value.parent_id,
            name: value.name.as_str(),
            description: value.description.as_deref(),
            status: value.status.as_str(),
            updated_at: value.updated_at,
        }
    }
}

impl<'a> From<&'a DomainUpdateCategory> for UpdateCategory<'a> {
    fn from(value: &'a DomainUpdateCategory) -> Self {
        Self {
            parent_id: value.parent_id,
            name: value.name.as_str(),
            description: value.description.as_deref(),
            status: value.status.as_str(),
            updated_at: value.updated_at,
        }
    }
}
