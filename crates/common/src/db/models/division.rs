//! Division entity (a year and section within a school cycle)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "divisions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// e.g. "3"
    #[sea_orm(column_type = "Text")]
    pub year_label: String,

    /// e.g. "A"
    #[sea_orm(column_type = "Text")]
    pub section_label: String,

    pub cycle_year: i32,

    #[sea_orm(column_type = "Text", nullable)]
    pub curriculum: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::enrollment::Entity")]
    Enrollments,

    #[sea_orm(has_many = "super::assignment::Entity")]
    Assignments,
}

impl Related<super::enrollment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Enrollments.def()
    }
}

impl Related<super::assignment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Assignments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn label(&self) -> String {
        aula_reports::report::division_label(&self.year_label, &self.section_label)
    }
}
