//! Node Data Structures
//!
//! This module defines the core `Node` struct and the request shapes used to
//! create and mutate nodes in a menu tree.
//!
//! # Architecture
//!
//! - **Flat records**: A node references its parent by id, never by pointer
//! - **Root sentinel**: `parent_id = None` marks a top-level node
//! - **Sibling ordering**: `(sort, id)` induces a total order among siblings
//! - **Soft deletion**: Deleted nodes never leave the store layer
//!
//! # Examples
//!
//! ```rust
//! use menutree_core::models::{NewNode, NodeUpdate};
//!
//! // Draft a top-level entry and a child entry
//! let settings = NewNode::new("Settings").with_sort(10);
//! let profile = NewNode::new("Profile")
//!     .with_parent(1)
//!     .with_route("/settings/profile");
//!
//! // Sparse update: only rename
//! let rename = NodeUpdate::new().with_name("Account");
//! assert!(!rename.is_empty());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Store-assigned node identifier
pub type NodeId = i64;

/// Maximum length (in characters) of a node name
pub const MAX_NAME_LEN: usize = 200;

/// Maximum length (in characters) of a node code
pub const MAX_CODE_LEN: usize = 200;

/// Maximum length (in characters) of a node route
pub const MAX_ROUTE_LEN: usize = 200;

/// Maximum length (in characters) of a node icon
pub const MAX_ICON_LEN: usize = 1000;

/// Validation errors for malformed request shapes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Field '{field}' is too long: {actual} characters (max {max})")]
    TooLong {
        field: String,
        max: usize,
        actual: usize,
    },

    #[error("Field '{field}' is out of range: {value} (allowed {min}..={max})")]
    OutOfRange {
        field: String,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ValidationError {
    pub fn too_long(field: impl Into<String>, max: usize, actual: usize) -> Self {
        Self::TooLong {
            field: field.into(),
            max,
            actual,
        }
    }

    pub fn out_of_range(field: impl Into<String>, value: i64, min: i64, max: i64) -> Self {
        Self::OutOfRange {
            field: field.into(),
            value,
            min,
            max,
        }
    }
}

/// A single entry of the hierarchy (e.g. one menu item).
///
/// # Fields
///
/// - `id`: Store-assigned, immutable identifier
/// - `parent_id`: Parent node id, `None` for top-level nodes
/// - `sort`: Ordering key among siblings (ties broken by `id`)
/// - `name`: Display name, unique among siblings case-insensitively
/// - `code`, `route`, `icon`: Opaque attributes with no structural meaning
/// - `is_active`: Inactive nodes are hidden from default tree reads
/// - `created_at` / `updated_at`: Set by the store on write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,

    pub parent_id: Option<NodeId>,

    pub sort: i64,

    pub name: String,

    pub code: Option<String>,

    pub route: Option<String>,

    pub icon: Option<String>,

    pub is_active: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Node {
    /// Check if this is a top-level node
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Sibling ordering key: `(sort ascending, id ascending)`
    pub fn sibling_key(&self) -> (i64, NodeId) {
        (self.sort, self.id)
    }

    /// Produce the node that results from applying a sparse update.
    ///
    /// Timestamps are left untouched; stores refresh `updated_at` themselves.
    pub fn apply_update(&self, update: &NodeUpdate) -> Node {
        let mut next = self.clone();
        if let Some(parent_id) = update.parent_id {
            next.parent_id = parent_id;
        }
        if let Some(sort) = update.sort {
            next.sort = sort;
        }
        if let Some(name) = &update.name {
            next.name = name.clone();
        }
        if let Some(code) = &update.code {
            next.code = code.clone();
        }
        if let Some(route) = &update.route {
            next.route = route.clone();
        }
        if let Some(icon) = &update.icon {
            next.icon = icon.clone();
        }
        if let Some(is_active) = update.is_active {
            next.is_active = is_active;
        }
        next
    }
}

/// Draft of a node to be inserted. The store assigns `id` and timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNode {
    #[serde(default)]
    pub parent_id: Option<NodeId>,

    #[serde(default)]
    pub sort: i64,

    pub name: String,

    #[serde(default)]
    pub code: Option<String>,

    #[serde(default)]
    pub route: Option<String>,

    #[serde(default)]
    pub icon: Option<String>,

    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl NewNode {
    /// Create an active, top-level draft with `sort = 0`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            parent_id: None,
            sort: 0,
            name: name.into(),
            code: None,
            route: None,
            icon: None,
            is_active: true,
        }
    }

    pub fn with_parent(mut self, parent_id: NodeId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_sort(mut self, sort: i64) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Validate the request shape (required fields, lengths, sort range)
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if:
    /// - `name` is blank or longer than [`MAX_NAME_LEN`]
    /// - `code`, `route` or `icon` exceed their limits
    /// - `sort` is outside `[0, max_sort]`
    pub fn validate(&self, max_sort: i64) -> Result<(), ValidationError> {
        validate_name(&self.name)?;
        validate_sort(self.sort, max_sort)?;
        validate_optional("code", self.code.as_deref(), MAX_CODE_LEN)?;
        validate_optional("route", self.route.as_deref(), MAX_ROUTE_LEN)?;
        validate_optional("icon", self.icon.as_deref(), MAX_ICON_LEN)?;
        Ok(())
    }
}

/// Accepts a plain value or `null` for a double-Option field.
///
/// - Missing field → None (don't update)
/// - null → Some(None) (clear)
/// - value → Some(Some(value))
fn deserialize_optional_field<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(Option::<T>::deserialize(deserializer)?))
}

/// Sparse update: only supplied fields are modified.
///
/// Double-option fields distinguish "leave unchanged" (`None`) from
/// "clear" (`Some(None)`). For `parent_id`, `Some(None)` moves the node to the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUpdate {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub parent_id: Option<Option<NodeId>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub code: Option<Option<String>>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub route: Option<Option<String>>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub icon: Option<Option<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl NodeUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(mut self, parent_id: Option<NodeId>) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_sort(mut self, sort: i64) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_code(mut self, code: Option<String>) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_route(mut self, route: Option<String>) -> Self {
        self.route = Some(route);
        self
    }

    pub fn with_icon(mut self, icon: Option<String>) -> Self {
        self.icon = Some(icon);
        self
    }

    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }

    /// Check if the update would change nothing
    pub fn is_empty(&self) -> bool {
        self.parent_id.is_none()
            && self.sort.is_none()
            && self.name.is_none()
            && self.code.is_none()
            && self.route.is_none()
            && self.icon.is_none()
            && self.is_active.is_none()
    }

    /// Validate the shape of every supplied field
    pub fn validate(&self, max_sort: i64) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(sort) = self.sort {
            validate_sort(sort, max_sort)?;
        }
        if let Some(code) = &self.code {
            validate_optional("code", code.as_deref(), MAX_CODE_LEN)?;
        }
        if let Some(route) = &self.route {
            validate_optional("route", route.as_deref(), MAX_ROUTE_LEN)?;
        }
        if let Some(icon) = &self.icon {
            validate_optional("icon", icon.as_deref(), MAX_ICON_LEN)?;
        }
        Ok(())
    }
}

/// One entry of a bulk reorder request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderItem {
    pub id: NodeId,
    pub sort: i64,
}

impl ReorderItem {
    pub fn new(id: NodeId, sort: i64) -> Self {
        Self { id, sort }
    }
}

pub(crate) fn validate_sort(sort: i64, max_sort: i64) -> Result<(), ValidationError> {
    if !(0..=max_sort).contains(&sort) {
        return Err(ValidationError::out_of_range("sort", sort, 0, max_sort));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::MissingField("name".to_string()));
    }
    let len = name.chars().count();
    if len > MAX_NAME_LEN {
        return Err(ValidationError::too_long("name", MAX_NAME_LEN, len));
    }
    Ok(())
}

fn validate_optional(field: &str, value: Option<&str>, max: usize) -> Result<(), ValidationError> {
    if let Some(value) = value {
        let len = value.chars().count();
        if len > max {
            return Err(ValidationError::too_long(field, max, len));
        }
    }
    Ok(())
}
