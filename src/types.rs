use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InventoryItem {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub imageurl: Option<String>,
    pub comment: Option<String>,
}

/// Fields accepted on create and full-replace update.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ItemDraft {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub imageurl: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// A distinct category with the first non-null image and comment among its items.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct CategoryCandidate {
    pub category: String,
    pub imageurl: Option<String>,
    pub comment: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CategoryHit {
    pub category: String,
    pub imageurl: Option<String>,
    pub comment: Option<String>,
    pub exact_matches: usize,
    pub partial_matches: usize,
    pub score: f64,
    pub similarity: f64,
}

/// Stored row as seen by the sanitizer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct CategoryRow {
    pub id: i64,
    pub category: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct CategoryFix {
    pub id: i64,
    pub category: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BatchReport {
    pub count: usize,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginResult {
    pub token: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InventoryChanged {
    pub action: String,
    pub count: usize,
}
