use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Publication status of a category within its hub.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CategoryStatus {
    /// Category is shown to customers.
    #[default]
    Active,
    /// Category is hidden from customers but kept for administration.
    Inactive,
}

impl CategoryStatus {
    /// Textual form used for storage and forms.
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryStatus::Active => "active",
            CategoryStatus::Inactive => "inactive",
        }
    }
}

impl From<&str> for CategoryStatus {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => CategoryStatus::Active,
            _ => CategoryStatus::Inactive,
        }
    }
}

/// Domain representation of a hierarchical category belonging to a hub.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Category {
    /// Unique identifier of the category.
    pub id: i32,
    /// Owning hub identifier.
    pub hub_id: i32,
    /// Identifier of the parent category; `None` for root categories.
    pub parent_id: Option<i32>,
    /// Human-readable name of the category.
    pub name: String,
    /// Optional description that expands upon the category name.
    pub description: Option<String>,
    /// Whether the category is active or inactive.
    pub status: CategoryStatus,
    /// Number of products attached to the category.
    pub products_count: i64,
    /// Timestamp for when the category record was created.
    pub created_at: NaiveDateTime,
    /// Timestamp for the last update to the category record.
    pub updated_at: NaiveDateTime,
}

/// Payload required to insert a new category for a hub.
#[derive(Debug, Clone)]
pub struct NewCategory {
    /// Owning hub identifier.
    pub hub_id: i32,
    /// Optional identifier of the parent category.
    pub parent_id: Option<i32>,
    /// Human-readable name of the category.
    pub name: String,
    /// Optional description that expands upon the category name.
    pub description: Option<String>,
    /// Initial status of the category.
    pub status: CategoryStatus,
    /// Timestamp captured when the category payload was created.
    pub updated_at: NaiveDateTime,
}

impl NewCategory {
    /// Build a new active category payload with the current timestamp.
    pub fn new(hub_id: i32, name: impl Into<String>) -> Self {
        Self {
            hub_id,
            parent_id: None,
            name: name.into(),
            description: None,
            status: CategoryStatus::default(),
            updated_at: Local::now().naive_utc(),
        }
    }

    /// Attach a parent identifier to the category payload.
    pub fn with_parent_id(mut self, parent_id: i32) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Attach a descriptive text to the category payload.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Override the default status.
    pub fn with_status(mut self, status: CategoryStatus) -> Self {
        self.status = status;
        self
    }
}

/// Patch data applied when updating an existing category.
///
/// Name, description, status and parent are always written: the edit form
/// submits the whole record.
#[derive(Debug, Clone)]
pub struct UpdateCategory {
    /// Updated name for the category.
    pub name: String,
    /// New description value; `None` clears the description.
    pub description: Option<String>,
    /// New status.
    pub status: CategoryStatus,
    /// New parent; `None` moves the category to the root.
    pub parent_id: Option<i32>,
    /// Timestamp captured when the patch was created.
    pub updated_at: NaiveDateTime,
}

impl UpdateCategory {
    /// Build a category update payload with the supplied values.
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        status: CategoryStatus,
        parent_id: Option<i32>,
    ) -> Self {
        Self {
            name: name.into(),
            description,
            status,
            parent_id,
            updated_at: Local::now().naive_utc(),
        }
    }
}

/// A category placed in the display tree.
///
/// Rebuilt from the flat list on every request; never stored.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CategoryTreeNode {
    /// Category data represented by this node.
    #[serde(flatten)]
    pub category: Category,
    /// Depth from the root, roots being level 0.
    pub level: usize,
    /// Children in the order they appear in the flat list.
    pub children: Vec<CategoryTreeNode>,
    /// Whether the children of this node are currently shown.
    pub is_expanded: bool,
}

impl CategoryTreeNode {
    /// Create a collapsed leaf node at the given level.
    pub fn new(category: Category, level: usize) -> Self {
        Self {
            category,
            level,
            children: Vec::new(),
            is_expanded: false,
        }
    }

    /// Attach a collection of children to the node.
    pub fn with_children(mut self, children: impl Into<Vec<CategoryTreeNode>>) -> Self {
        self.children = children.into();
        self
    }

    /// Mark the node as expanded or collapsed.
    pub fn expanded(mut self, is_expanded: bool) -> Self {
        self.is_expanded = is_expanded;
        self
    }

    pub fn id(&self) -> i32 {
        self.category.id
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        assert_eq!(CategoryStatus::from("active"), CategoryStatus::Active);
        assert_eq!(CategoryStatus::from(" Inactive "), CategoryStatus::Inactive);
        assert_eq!(CategoryStatus::from("unknown"), CategoryStatus::Inactive);
        assert_eq!(CategoryStatus::Inactive.as_str(), "inactive");
    }

    #[test]
    fn tree_node_serializes_category_fields_inline() {
        let category = Category {
            id: 7,
            hub_id: 1,
            parent_id: None,
            name: "Ropa".to_string(),
            description: None,
            status: CategoryStatus::Active,
            products_count: 3,
            created_at: NaiveDateTime::default(),
            updated_at: NaiveDateTime::default(),
        };
        let node = CategoryTreeNode::new(category, 0).expanded(true);

        let value = serde_json::to_value(&node).expect("node should serialize");

        assert_eq!(value["id"], 7);
        assert_eq!(value["name"], "Ropa");
        assert_eq!(value["status"], "active");
        assert_eq!(value["is_expanded"], true);
        assert_eq!(value["level"], 0);
    }
}
