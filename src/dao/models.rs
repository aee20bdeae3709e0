use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Fixed top-level key under which the group collection is stored.
pub const DOCUMENT_KEY: &str = "lottery-options";

/// On-disk document holding the whole group collection.
///
/// The entries are kept raw here; callers sanitize them into a
/// [`GroupCollection`](crate::state::groups::GroupCollection) before use.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistedDocument {
    /// Group name mapped to its ordered option labels.
    #[serde(rename = "lottery-options", default)]
    pub groups: IndexMap<String, Vec<String>>,
}
