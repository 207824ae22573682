//! Grade entity: one student, one assignment, one period

use aula_reports::{GradeValues, SupportTrack, Tier};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "grades")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub student_id: Uuid,

    pub assignment_id: Uuid,

    /// 1 or 2
    pub period: i16,

    pub partial_1: Option<f64>,
    pub partial_2: Option<f64>,
    pub partial_3: Option<f64>,
    pub partial_4: Option<f64>,

    /// Attendance percentage, 0 to 100
    pub attendance: f64,

    #[sea_orm(column_type = "Text")]
    pub observations: String,

    /// Intensification score, period 1 only
    pub intensification: Option<f64>,

    #[sea_orm(column_type = "Text", nullable)]
    pub support_notes: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub support_track_tier: Option<String>,

    // Derived on every write
    pub average: Option<f64>,

    #[sea_orm(column_type = "Text", nullable)]
    pub tier: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub support_track: Option<String>,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::assignment::Entity",
        from = "Column::AssignmentId",
        to = "super::assignment::Column::Id"
    )]
    Assignment,

    #[sea_orm(
        belongs_to = "super::profile::Entity",
        from = "Column::StudentId",
        to = "super::profile::Column::Id"
    )]
    Student,
}

impl Related<super::assignment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Assignment.def()
    }
}

impl Related<super::profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Values for the grade sheet.
    ///
    /// Derived fields are recomputed from the partials so rows written by
    /// older clients still read consistently.
    pub fn values(&self) -> GradeValues {
        let mut values = GradeValues {
            partials: [self.partial_1, self.partial_2, self.partial_3, self.partial_4],
            attendance: self.attendance,
            observations: self.observations.clone(),
            intensification: self.intensification,
            support_notes: self.support_notes.clone(),
            support_track_tier: self.support_track_tier.as_deref().and_then(Tier::from_code),
            average: self.average,
            tier: self.tier.as_deref().and_then(Tier::from_code),
            support_track: self.support_track.as_deref().and_then(SupportTrack::from_label),
        };
        values.recompute();
        values
    }
}
