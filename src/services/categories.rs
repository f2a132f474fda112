use pushkind_common::domain::auth::AuthenticatedUser;
use pushkind_common::pagination::{DEFAULT_ITEMS_PER_PAGE, Paginated};
use pushkind_common::routes::check_role;
use serde::{Deserialize, Serialize};

use crate::SERVICE_ACCESS_ROLE;
use crate::cache::CategoryCache;
use crate::domain::category::{Category, CategoryTreeNode};
use crate::forms::categories::{AddCategoryForm, EditCategoryForm};
use crate::repository::{CategoryReader, CategoryUpdateError, CategoryWriter};
use crate::services::category_tree::{
    ExpandedSet, build_tree, expand_all, filter_by_search, flatten_visible, toggle_expansion,
};
use crate::services::{ServiceError, ServiceResult};

/// Query parameters accepted by the categories page.
#[derive(Debug, Default, Deserialize)]
pub struct CategoriesQuery {
    /// Optional search string entered by the user.
    pub search: Option<String>,
    /// Page requested by the UI (1-based).
    pub page: Option<usize>,
    /// Categories whose children are shown; repeated `expanded` keys.
    #[serde(default)]
    pub expanded: Vec<i32>,
    /// Expand every category that has children.
    #[serde(default)]
    pub expand_all: bool,
}

/// A visible row of the category tree.
#[derive(Debug, Serialize)]
pub struct CategoryRow {
    #[serde(flatten)]
    pub category: Category,
    /// Indentation depth.
    pub level: usize,
    pub is_expanded: bool,
    pub children_count: usize,
    /// Query string that renders the page with this row toggled.
    pub toggle_query: String,
}

/// Data required to render the categories index template.
pub struct CategoriesPageData {
    /// Visible tree rows for the requested page.
    pub rows: Paginated<CategoryRow>,
    /// Number of pages of visible rows, at least one.
    pub total_pages: usize,
    /// Every category of the hub, used by the parent selector.
    pub categories: Vec<Category>,
    /// Search query echoed back to the view when present.
    pub search: Option<String>,
    /// Categories currently expanded.
    pub expanded: Vec<i32>,
}

/// Loads the categories overview page.
pub fn load_categories<R, C>(
    repo: &R,
    cache: &C,
    user: &AuthenticatedUser,
    query: CategoriesQuery,
) -> ServiceResult<CategoriesPageData>
where
    R: CategoryReader + ?Sized,
    C: CategoryCache + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    let categories = load_flat_categories(repo, cache, user.hub_id)?;

    let search = query
        .search
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    let filtered = filter_by_search(&categories, search.as_deref().unwrap_or_default());

    let mut expanded: ExpandedSet = query.expanded.into_iter().collect();
    let mut tree = build_tree(&filtered, &expanded);
    if query.expand_all {
        expanded = expand_all(&tree);
        tree = build_tree(&filtered, &expanded);
    }

    let visible = flatten_visible(&tree);

    let per_page = DEFAULT_ITEMS_PER_PAGE;
    let total_pages = visible.len().div_ceil(per_page).max(1);
    let page = query.page.unwrap_or(1).clamp(1, total_pages);
    let start = (page - 1) * per_page;

    let rows: Vec<CategoryRow> = visible
        .iter()
        .skip(start)
        .take(per_page)
        .map(|node| {
            let toggled = toggle_expansion(&expanded, node.id());
            category_row(node, tree_query(search.as_deref(), &toggled, page))
        })
        .collect();

    Ok(CategoriesPageData {
        rows: Paginated::new(rows, page, total_pages),
        total_pages,
        categories,
        search,
        expanded: expanded.into_iter().collect(),
    })
}

/// Creates a new category for the authenticated user's hub.
pub fn create_category<R, C>(
    repo: &R,
    cache: &C,
    user: &AuthenticatedUser,
    form: AddCategoryForm,
) -> ServiceResult<Category>
where
    R: CategoryWriter + ?Sized,
    C: CategoryCache + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    let new_category = form
        .into_new_category(user.hub_id)
        .map_err(|err| ServiceError::Form(err.to_string()))?;

    let created = repo
        .create_category(&new_category)
        .map_err(ServiceError::from)?;

    cache.invalidate(user.hub_id);

    Ok(created)
}

/// Updates an existing category for the authenticated user's hub.
///
/// Moving a category under itself or one of its descendants is rejected.
pub fn modify_category<R, C>(
    repo: &R,
    cache: &C,
    user: &AuthenticatedUser,
    form: EditCategoryForm,
) -> ServiceResult<Category>
where
    R: CategoryReader + CategoryWriter + ?Sized,
    C: CategoryCache + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    let payload = form
        .into_update_category()
        .map_err(|err| ServiceError::Form(err.to_string()))?;

    let category_id = payload.category_id;

    if repo
        .get_category_by_id(category_id, user.hub_id)
        .map_err(ServiceError::from)?
        .is_none()
    {
        return Err(ServiceError::NotFound);
    }

    let updated = repo
        .update_category(category_id, user.hub_id, &payload.update)
        .map_err(|err| match err {
            CategoryUpdateError::Cycle => {
                ServiceError::Form(CategoryUpdateError::Cycle.to_string())
            }
            CategoryUpdateError::Repository(err) => ServiceError::from(err),
        })?;

    cache.invalidate(user.hub_id);

    Ok(updated)
}

/// Deletes a category for the authenticated user's hub.
pub fn remove_category<R, C>(
    repo: &R,
    cache: &C,
    user: &AuthenticatedUser,
    category_id: i32,
) -> ServiceResult<()>
where
    R: CategoryWriter + ?Sized,
    C: CategoryCache + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    repo.delete_category(category_id, user.hub_id)
        .map_err(ServiceError::from)?;

    cache.invalidate(user.hub_id);

    Ok(())
}

fn load_flat_categories<R, C>(repo: &R, cache: &C, hub_id: i32) -> ServiceResult<Vec<Category>>
where
    R: CategoryReader + ?Sized,
    C: CategoryCache + ?Sized,
{
    if let Some(categories) = cache.get(hub_id) {
        return Ok(categories);
    }

    log::debug!("Category cache miss for hub {hub_id}");

    let generation = cache.generation(hub_id);
    let categories = repo.list_categories(hub_id).map_err(ServiceError::from)?;

    cache.put(hub_id, generation, categories.clone());

    Ok(categories)
}

fn category_row(node: &CategoryTreeNode, toggle_query: String) -> CategoryRow {
    CategoryRow {
        category: node.category.clone(),
        level: node.level,
        is_expanded: node.is_expanded,
        children_count: node.children.len(),
        toggle_query,
    }
}

/// Query string for the categories page with the given state.
fn tree_query(search: Option<&str>, expanded: &ExpandedSet, page: usize) -> String {
    let mut pairs: Vec<(&str, String)> = Vec::with_capacity(expanded.len() + 2);
    if let Some(search) = search {
        pairs.push(("search", search.to_string()));
    }
    if page > 1 {
        pairs.push(("page", page.to_string()));
    }
    pairs.extend(expanded.iter().map(|id| ("expanded", id.to_string())));

    serde_html_form::to_string(&pairs).unwrap_or_else(|err| {
        log::error!("Failed to encode category tree query: {err}");
        String::new()
    })
}
