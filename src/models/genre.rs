use serde::{Deserialize, Serialize};

use crate::utils::wire::null_as_default;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Genre {
    pub genre_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}
