//! Attendance entity.
//!
//! `subject_id` is null for the division-level record taken by the
//! preceptor, and set for records taken by a subject teacher.

use aula_reports::attendance::AttendanceStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "attendance")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub student_id: Uuid,

    pub division_id: Uuid,

    pub subject_id: Option<Uuid>,

    pub date: Date,

    /// Wire value of `AttendanceStatus`
    #[sea_orm(column_type = "Text")]
    pub status: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub observations: Option<String>,

    pub recorded_by: Option<Uuid>,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::profile::Entity",
        from = "Column::StudentId",
        to = "super::profile::Column::Id"
    )]
    Student,

    #[sea_orm(
        belongs_to = "super::subject::Entity",
        from = "Column::SubjectId",
        to = "super::subject::Column::Id"
    )]
    Subject,
}

impl Related<super::profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl Related<super::subject::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subject.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Parsed status, `None` for values written outside this service
    pub fn parsed_status(&self) -> Option<AttendanceStatus> {
        self.status.parse().ok()
    }
}
