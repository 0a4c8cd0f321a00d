//! Document entity (one row per stored document).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "document")]
pub struct Model {
    /// Full document path, e.g. `creators/abc/members/xyz`
    #[sea_orm(primary_key, auto_increment = false)]
    pub path: String,

    /// Path of the containing collection (denormalized for listing)
    pub collection: String,

    /// Document fields as a JSON object
    #[sea_orm(column_type = "JsonBinary")]
    pub data: Json,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
