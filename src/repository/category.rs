use std::collections::HashMap;

use chrono::Local;
use diesel::dsl::{count_star, exists, select};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use pushkind_common::repository::errors::{RepositoryError, RepositoryResult};

use crate::domain::category::{
    Category as DomainCategory, NewCategory as DomainNewCategory,
    UpdateCategory as DomainUpdateCategory,
};
use crate::models::category::{
    Category as DbCategory, NewCategory as DbNewCategory, UpdateCategory as DbUpdateCategory,
};
use crate::repository::{CategoryReader, CategoryUpdateError, CategoryWriter, DieselRepository};
use crate::schema::{categories, products};
use crate::services::category_tree::would_create_cycle;

impl CategoryReader for DieselRepository {
    fn list_categories(&self, hub_id: i32) -> RepositoryResult<Vec<DomainCategory>> {
        let mut conn = self.conn()?;

        let rows = categories::table
            .filter(categories::hub_id.eq(hub_id))
            .order(categories::id.asc())
            .load::<DbCategory>(&mut conn)?;
        let mut counts = products_counts(&mut conn, hub_id)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let count = counts.remove(&row.id).unwrap_or_default();
                row.into_domain(count)
            })
            .collect())
    }

    fn get_category_by_id(
        &self,
        category_id: i32,
        hub_id: i32,
    ) -> RepositoryResult<Option<DomainCategory>> {
        let mut conn = self.conn()?;

        let category = categories::table
            .filter(categories::id.eq(category_id))
            .filter(categories::hub_id.eq(hub_id))
            .first::<DbCategory>(&mut conn)
            .optional()?;

        match category {
            Some(row) => {
                let count = products_count(&mut conn, hub_id, row.id)?;
                Ok(Some(row.into_domain(count)))
            }
            None => Ok(None),
        }
    }
}

impl CategoryWriter for DieselRepository {
    fn create_category(
        &self,
        new_category: &DomainNewCategory,
    ) -> RepositoryResult<DomainCategory> {
        let mut conn = self.conn()?;

        if let Some(parent_id) = new_category.parent_id {
            ensure_category_with_hub(&mut conn, new_category.hub_id, parent_id)?;
        }

        let insertable = DbNewCategory::from(new_category);

        let created = diesel::insert_into(categories::table)
            .values(&insertable)
            .get_result::<DbCategory>(&mut conn)?;

        Ok(created.into())
    }

    fn update_category(
        &self,
        category_id: i32,
        hub_id: i32,
        updates: &DomainUpdateCategory,
    ) -> Result<DomainCategory, CategoryUpdateError> {
        let mut conn = self.conn()?;

        // Immediate so that concurrent re-parents see each other's writes.
        conn.immediate_transaction::<DomainCategory, CategoryUpdateError, _>(|conn| {
            if let Some(parent_id) = updates.parent_id {
                ensure_category_with_hub(conn, hub_id, parent_id)?;

                let hub_categories: Vec<DomainCategory> = categories::table
                    .filter(categories::hub_id.eq(hub_id))
                    .order(categories::id.asc())
                    .load::<DbCategory>(conn)?
                    .into_iter()
                    .map(DomainCategory::from)
                    .collect();

                if would_create_cycle(&hub_categories, category_id, Some(parent_id)) {
                    return Err(CategoryUpdateError::Cycle);
                }
            }

            let db_updates = DbUpdateCategory::from(updates);

            let target = categories::table
                .filter(categories::id.eq(category_id))
                .filter(categories::hub_id.eq(hub_id));

            let updated = diesel::update(target)
                .set(&db_updates)
                .get_result::<DbCategory>(conn)
                .optional()?
                .ok_or(RepositoryError::NotFound)?;

            let count = products_count(conn, hub_id, updated.id)?;

            Ok(updated.into_domain(count))
        })
    }

    fn delete_category(&self, category_id: i32, hub_id: i32) -> RepositoryResult<()> {
        let mut conn = self.conn()?;

        conn.transaction::<(), RepositoryError, _>(|conn| {
            let target = categories::table
                .filter(categories::id.eq(category_id))
                .filter(categories::hub_id.eq(hub_id))
                .first::<DbCategory>(conn)
                .optional()?
                .ok_or(RepositoryError::NotFound)?;

            let now = Local::now().naive_utc();

            diesel::update(
                categories::table
                    .filter(categories::hub_id.eq(hub_id))
                    .filter(categories::parent_id.eq(Some(category_id))),
            )
            .set((
                categories::parent_id.eq(target.parent_id),
                categories::updated_at.eq(now),
            ))
            .execute(conn)?;

            diesel::update(
                products::table
                    .filter(products::hub_id.eq(hub_id))
                    .filter(products::category_id.eq(Some(category_id))),
            )
            .set((
                products::category_id.eq::<Option<i32>>(None),
                products::updated_at.eq(now),
            ))
            .execute(conn)?;

            let deleted = diesel::delete(
                categories::table
                    .filter(categories::id.eq(category_id))
                    .filter(categories::hub_id.eq(hub_id)),
            )
            .execute(conn)?;

            if deleted == 0 {
                return Err(RepositoryError::NotFound);
            }

            Ok(())
        })
    }
}

/// Product counts per category of a hub. Categories without products are absent.
fn products_counts(conn: &mut SqliteConnection, hub_id: i32) -> RepositoryResult<HashMap<i32, i64>> {
    let rows = products::table
        .filter(products::hub_id.eq(hub_id))
        .filter(products::category_id.is_not_null())
        .group_by(products::category_id)
        .select((products::category_id, count_star()))
        .load::<(Option<i32>, i64)>(conn)?;

    Ok(rows
        .into_iter()
        .filter_map(|(category_id, count)| category_id.map(|id| (id, count)))
        .collect())
}

fn products_count(
    conn: &mut SqliteConnection,
    hub_id: i32,
    category_id: i32,
) -> RepositoryResult<i64> {
    let count = products::table
        .filter(products::hub_id.eq(hub_id))
        .filter(products::category_id.eq(Some(category_id)))
        .count()
        .get_result::<i64>(conn)?;

    Ok(count)
}

fn ensure_category_with_hub(
    conn: &mut SqliteConnection,
    hub_id: i32,
    category_id: i32,
) -> RepositoryResult<()> {
    let exists = select(exists(
        categories::table
            .filter(categories::id.eq(category_id))
            .filter(categories::hub_id.eq(hub_id)),
    ))
    .get_result(conn)?;

    if exists {
        Ok(())
    } else {
        Err(RepositoryError::NotFound)
    }
}
