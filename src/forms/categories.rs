use serde::Deserialize;
use thiserror::Error;
use validator::{Validate, ValidationErrors};

use crate::domain::category::{CategoryStatus, NewCategory, UpdateCategory};

/// Maximum length allowed for a category name.
const NAME_MAX_LEN: usize = 128;
const NAME_MAX_LEN_VALIDATOR: u64 = NAME_MAX_LEN as u64;

/// Maximum length allowed for a category description.
const DESCRIPTION_MAX_LEN: usize = 2048;
const DESCRIPTION_MAX_LEN_VALIDATOR: u64 = DESCRIPTION_MAX_LEN as u64;

/// Result type returned by the category form helpers.
pub type CategoryFormResult<T> = Result<T, CategoryFormError>;

/// Errors that can occur while processing category forms.
#[derive(Debug, Error)]
pub enum CategoryFormError {
    /// Validation failures from the `validator` crate.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),
    /// The provided name is empty after sanitization.
    #[error("category name cannot be empty")]
    EmptyName,
    /// Supplied identifier field could not be parsed.
    #[error("invalid {field} `{value}`")]
    InvalidIdentifier { field: &'static str, value: String },
    /// Status is neither `active` nor `inactive`.
    #[error("invalid status `{0}`")]
    InvalidStatus(String),
}

/// Form payload emitted when submitting the "Add category" form.
#[derive(Debug, Deserialize, Validate)]
pub struct AddCategoryForm {
    /// Name entered by the user.
    #[validate(length(min = 1, max = NAME_MAX_LEN_VALIDATOR))]
    pub name: String,
    /// Optional description for the category.
    #[validate(length(max = DESCRIPTION_MAX_LEN_VALIDATOR))]
    #[serde(default)]
    pub description: Option<String>,
    /// Optional parent category identifier in string form.
    #[serde(default)]
    pub parent_id: Option<String>,
    /// `active` or `inactive`; defaults to `active`.
    #[serde(default)]
    pub status: Option<String>,
}

impl AddCategoryForm {
    /// Validates and sanitizes the payload into a domain `NewCategory`.
    pub fn into_new_category(self, hub_id: i32) -> CategoryFormResult<NewCategory> {
        self.validate()?;

        let name = sanitize_name(&self.name)?;
        let description = sanitize_description(self.description);
        let parent_id = parse_optional_i32(self.parent_id, "parent category")?;
        let status = parse_status(self.status)?;

        let mut new_category = NewCategory::new(hub_id, name).with_status(status);
        if let Some(description) = description {
            new_category = new_category.with_description(description);
        }
        if let Some(parent_id) = parent_id {
            new_category = new_category.with_parent_id(parent_id);
        }

        Ok(new_category)
    }
}

/// Normalized payload produced by the "Edit category" form.
#[derive(Debug)]
pub struct EditCategoryPayload {
    /// Identifier of the category to update.
    pub category_id: i32,
    /// Patch data that should be applied to the category.
    pub update: UpdateCategory,
}

/// Form payload emitted when editing an existing category.
#[derive(Debug, Deserialize, Validate)]
pub struct EditCategoryForm {
    /// Identifier of the category to update.
    #[validate(range(min = 1))]
    pub category_id: i32,
    /// Name submitted by the user.
    #[validate(length(min = 1, max = NAME_MAX_LEN_VALIDATOR))]
    pub name: String,
    /// Optional description update.
    #[validate(length(max = DESCRIPTION_MAX_LEN_VALIDATOR))]
    #[serde(default)]
    pub description: Option<String>,
    /// New parent category; blank moves the category to the root.
    #[serde(default)]
    pub parent_id: Option<String>,
    /// `active` or `inactive`; defaults to `active`.
    #[serde(default)]
    pub status: Option<String>,
}

impl EditCategoryForm {
    /// Validates and sanitizes the payload into a domain `UpdateCategory`.
    pub fn into_update_category(self) -> CategoryFormResult<EditCategoryPayload> {
        self.validate()?;

        let EditCategoryForm {
            category_id,
            name,
            description,
            parent_id,
            status,
        } = self;

        let name = sanitize_name(&name)?;
        let description = sanitize_description(description);
        let parent_id = parse_optional_i32(parent_id, "parent category")?;
        let status = parse_status(status)?;

        Ok(EditCategoryPayload {
            category_id,
            update: UpdateCategory::new(name, description, status, parent_id),
        })
    }
}

fn sanitize_name(name: &str) -> CategoryFormResult<String> {
    let sanitized = sanitize_inline_text(name);
    if sanitized.is_empty() {
        return Err(CategoryFormError::EmptyName);
    }
    Ok(sanitized)
}

fn sanitize_description(description: Option<String>) -> Option<String> {
    description
        .as_deref()
        .map(sanitize_multiline_text)
        .filter(|value| !value.is_empty())
}

fn parse_status(value: Option<String>) -> CategoryFormResult<CategoryStatus> {
    let Some(raw) = value else {
        return Ok(CategoryStatus::default());
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "active" => Ok(CategoryStatus::Active),
        "inactive" => Ok(CategoryStatus::Inactive),
        _ => Err(CategoryFormError::InvalidStatus(raw.trim().to_string())),
    }
}

fn parse_optional_i32(
    value: Option<String>,
    field: &'static str,
) -> CategoryFormResult<Option<i32>> {
    let Some(raw) = value else {
        return Ok(None);
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    match trimmed.parse::<i32>() {
        Ok(parsed) if parsed > 0 => Ok(Some(parsed)),
        Ok(_) => Ok(None),
        Err(_) => Err(CategoryFormError::InvalidIdentifier {
            field,
            value: trimmed.to_string(),
        }),
    }
}

fn sanitize_inline_text(input: &str) -> String {
    let mut sanitized = String::with_capacity(input.len());
    let mut previous_whitespace = false;

    for ch in input.trim().chars() {
        if ch.is_whitespace() {
            if !previous_whitespace {
                sanitized.push(' ');
                previous_whitespace = true;
            }
        } else if !ch.is_control() {
            sanitized.push(ch);
            previous_whitespace = false;
        }
    }

    sanitized
}

/// Collapse each line, trim blank lines at both ends and keep at most one
/// blank line between paragraphs.
fn sanitize_multiline_text(input: &str) -> String {
    let mut result: Vec<String> = Vec::new();

    for line in input.lines().map(sanitize_inline_text) {
        let previous_empty = result.last().is_some_and(|last| last.is_empty());
        if line.is_empty() && (result.is_empty() || previous_empty) {
            continue;
        }
        result.push(line);
    }

    while result.last().is_some_and(|last| last.is_empty()) {
        result.pop();
    }

    result.join("\n")
}
