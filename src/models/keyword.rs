use serde::{Deserialize, Serialize};

/// One row of the keyword list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub id: i64,
    pub keyword: String,
}
