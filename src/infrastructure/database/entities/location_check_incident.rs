// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 一次检查命中的事件
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "location_check_incidents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub check_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub incident_id: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::location_check::Entity",
        from = "Column::CheckId",
        to = "super::location_check::Column::Id",
        on_delete = "Cascade"
    )]
    LocationCheck,
}

impl Related<super::location_check::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LocationCheck.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
