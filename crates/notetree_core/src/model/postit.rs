//! Free-floating post-it notes.
//!
//! Post-its live outside the folder/document hierarchy and carry no order
//! field; listings follow creation time.

use crate::store::Record;
use serde::{Deserialize, Serialize};

pub const TITLE_FIELD: &str = "title";
pub const TEXT_FIELD: &str = "text";

/// One post-it as decoded from the `postits` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostIt {
    pub id: String,
    pub title: String,
    pub text: String,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
}

impl PostIt {
    pub fn from_record(record: &Record) -> Self {
        Self {
            id: record.id.clone(),
            title: record.str_field(TITLE_FIELD).unwrap_or_default().to_string(),
            text: record.str_field(TEXT_FIELD).unwrap_or_default().to_string(),
            created_at: record.created_at,
        }
    }

    /// Case-insensitive substring match over title and text.
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&needle) || self.text.to_lowercase().contains(&needle)
    }
}
