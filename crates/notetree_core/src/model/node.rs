//! Folder/document node records.
//!
//! # Responsibility
//! - Define the flat node record decoded from the `folders` and `documents`
//!   collections.
//! - Normalize and validate user-supplied node fields before writes.
//!
//! # Invariants
//! - `kind` is decided by the source collection, never by record content.
//! - Decoding never fails: malformed fields fall back to neutral defaults.
//! - Only folders carry `color`; only documents carry `content`/`tags`.

use crate::store::{Fields, Record, DOCUMENTS, FOLDERS};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const TYPE_FIELD: &str = "type";
pub const LABEL_FIELD: &str = "label";
pub const COLOR_FIELD: &str = "color";
pub const CONTENT_FIELD: &str = "content";
pub const TAGS_FIELD: &str = "tags";
pub const PARENT_ID_FIELD: &str = "parentId";
pub const ORDER_FIELD: &str = "order";

/// Color assigned by front ends when the user keeps the default.
pub const DEFAULT_FOLDER_COLOR: &str = "#43C6AC";

static COLOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("valid color regex")
});

/// Stable node identifier assigned by the store.
pub type NodeId = String;

/// Closed set of node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Container; the only kind allowed to have children.
    Folder,
    /// Leaf payload.
    Document,
}

impl NodeKind {
    /// Collection holding records of this kind.
    pub fn collection(self) -> &'static str {
        match self {
            Self::Folder => FOLDERS,
            Self::Document => DOCUMENTS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Folder => "folder",
            Self::Document => "document",
        }
    }
}

/// Errors for malformed add/edit requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Label is blank after trim.
    BlankLabel,
    /// Folder color is not `#rgb` or `#rrggbb`.
    InvalidColor(String),
    /// Required text field is blank after trim.
    BlankField(&'static str),
    /// One-based display position must be at least 1.
    InvalidPosition(u32),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankLabel => write!(f, "label must not be blank"),
            Self::InvalidColor(value) => write!(f, "invalid folder color `{value}`"),
            Self::BlankField(field) => write!(f, "field `{field}` must not be blank"),
            Self::InvalidPosition(value) => {
                write!(f, "position must be 1 or greater, got {value}")
            }
        }
    }
}

impl Error for ValidationError {}

/// Flat node record as stored, plus its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub kind: NodeKind,
    pub label: String,
    /// `None` means root-level node.
    pub parent_id: Option<NodeId>,
    /// Sibling order key. Dense and zero-based after engine-driven writes.
    pub order: i64,
    /// Folder payload.
    pub color: Option<String>,
    /// Document payload.
    pub content: Option<String>,
    /// Document payload.
    pub tags: Vec<String>,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
}

impl NodeRecord {
    /// Creates a folder record with neutral payload.
    pub fn folder(id: impl Into<NodeId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: NodeKind::Folder,
            label: label.into(),
            parent_id: None,
            order: 0,
            color: Some(DEFAULT_FOLDER_COLOR.to_string()),
            content: None,
            tags: Vec::new(),
            created_at: 0,
        }
    }

    /// Creates a document record with empty payload.
    pub fn document(id: impl Into<NodeId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: NodeKind::Document,
            label: label.into(),
            parent_id: None,
            order: 0,
            color: None,
            content: Some(String::new()),
            tags: Vec::new(),
            created_at: 0,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<NodeId>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }

    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }

    /// Decodes one stored record of the given kind.
    pub fn from_record(kind: NodeKind, record: &Record) -> Self {
        let label = match record.fields.get(LABEL_FIELD) {
            Some(Value::String(value)) => value.clone(),
            other => {
                debug!(
                    "event=node_decode module=model status=fallback field=label kind={} present={}",
                    kind.as_str(),
                    other.is_some()
                );
                String::new()
            }
        };

        let parent_id = match record.fields.get(PARENT_ID_FIELD) {
            Some(Value::String(value)) if !value.is_empty() => Some(value.clone()),
            Some(Value::String(_)) | None => None,
            Some(_) => {
                debug!(
                    "event=node_decode module=model status=fallback field=parentId kind={}",
                    kind.as_str()
                );
                None
            }
        };

        let order = match record.fields.get(ORDER_FIELD) {
            None => 0,
            Some(value) => value
                .as_i64()
                .or_else(|| value.as_f64().map(|number| number as i64))
                .unwrap_or_else(|| {
                    debug!(
                        "event=node_decode module=model status=fallback field=order kind={}",
                        kind.as_str()
                    );
                    0
                }),
        };

        let (color, content, tags) = match kind {
            NodeKind::Folder => (record.str_field(COLOR_FIELD).map(str::to_string), None, Vec::new()),
            NodeKind::Document => (
                None,
                Some(record.str_field(CONTENT_FIELD).unwrap_or_default().to_string()),
                decode_tags(record.fields.get(TAGS_FIELD)),
            ),
        };

        Self {
            id: record.id.clone(),
            kind,
            label,
            parent_id,
            order,
            color,
            content,
            tags,
            created_at: record.created_at,
        }
    }

    /// Encodes this record for `create`; the id and `createdAt` are left to
    /// the store, absent optional fields are omitted.
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert(TYPE_FIELD.to_string(), json!(self.kind.as_str()));
        fields.insert(LABEL_FIELD.to_string(), json!(self.label));
        fields.insert(ORDER_FIELD.to_string(), json!(self.order));
        if let Some(parent_id) = &self.parent_id {
            fields.insert(PARENT_ID_FIELD.to_string(), json!(parent_id));
        }
        match self.kind {
            NodeKind::Folder => {
                if let Some(color) = &self.color {
                    fields.insert(COLOR_FIELD.to_string(), json!(color));
                }
            }
            NodeKind::Document => {
                fields.insert(
                    CONTENT_FIELD.to_string(),
                    json!(self.content.clone().unwrap_or_default()),
                );
                fields.insert(TAGS_FIELD.to_string(), json!(self.tags));
            }
        }
        fields
    }
}

/// Decodes one collection snapshot into node records of one kind.
pub fn decode_nodes(kind: NodeKind, records: &[Record]) -> Vec<NodeRecord> {
    records
        .iter()
        .map(|record| NodeRecord::from_record(kind, record))
        .collect()
}

fn decode_tags(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// Trims and rejects blank labels.
pub fn normalize_label(value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::BlankLabel);
    }
    Ok(trimmed.to_string())
}

/// Trims and validates one folder color.
pub fn normalize_color(value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if !COLOR_RE.is_match(trimmed) {
        return Err(ValidationError::InvalidColor(value.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Trims tags, drops blanks and duplicates, keeps first-seen order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let trimmed = tag.trim();
        if trimmed.is_empty() || normalized.iter().any(|known| known == trimmed) {
            continue;
        }
        normalized.push(trimmed.to_string());
    }
    normalized
}

/// Splits a comma-separated tag line as typed by users.
pub fn parse_tag_line(line: &str) -> Vec<String> {
    let parts: Vec<String> = line.split(',').map(str::to_string).collect();
    normalize_tags(&parts)
}
