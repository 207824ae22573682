//! Repository for database operations
//!
//! Every query the gateway runs goes through here. Reads use the replica
//! when one is configured, writes always go to the primary.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use aula_reports::attendance::AttendanceStatus;
use aula_reports::{AssignmentInfo, GradeValues, Student};
use chrono::{NaiveDate, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, Insert, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use std::collections::HashMap;
use uuid::Uuid;

/// Rows per INSERT statement, well under the Postgres bind parameter limit
const INSERT_CHUNK: usize = 1000;

/// One grade record to upsert; derived fields are recomputed on write
#[derive(Debug, Clone)]
pub struct GradeWrite {
    pub student_id: Uuid,
    pub assignment_id: Uuid,
    pub period: i16,
    pub values: GradeValues,
}

/// One attendance record to insert or overwrite
#[derive(Debug, Clone)]
pub struct AttendanceWrite {
    pub student_id: Uuid,
    pub division_id: Uuid,
    pub subject_id: Option<Uuid>,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub observations: Option<String>,
    pub recorded_by: Option<Uuid>,
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Divisions & Roster
    // ========================================================================

    pub async fn find_division(&self, id: Uuid) -> Result<Option<Division>> {
        DivisionEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find a division or fail with `DivisionNotFound`
    pub async fn division(&self, id: Uuid) -> Result<Division> {
        self.find_division(id)
            .await?
            .ok_or_else(|| AppError::DivisionNotFound { id: id.to_string() })
    }

    /// Students enrolled in the division for its cycle year, ordered by name
    pub async fn roster(&self, division: &Division) -> Result<Vec<Student>> {
        let profiles = ProfileEntity::find()
            .inner_join(EnrollmentEntity)
            .filter(EnrollmentColumn::DivisionId.eq(division.id))
            .filter(EnrollmentColumn::CycleYear.eq(division.cycle_year))
            .order_by_asc(ProfileColumn::FullName)
            .order_by_asc(ProfileColumn::Id)
            .all(self.read_conn())
            .await?;

        Ok(profiles.into_iter().map(Profile::into_student).collect())
    }

    /// Division each student is enrolled in for their latest cycle year
    pub async fn current_divisions(&self, student_ids: &[Uuid]) -> Result<HashMap<Uuid, Uuid>> {
        if student_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let enrollments = EnrollmentEntity::find()
            .filter(EnrollmentColumn::StudentId.is_in(student_ids.iter().copied()))
            .order_by_desc(EnrollmentColumn::CycleYear)
            .all(self.read_conn())
            .await?;

        let mut divisions = HashMap::with_capacity(student_ids.len());
        for enrollment in enrollments {
            divisions
                .entry(enrollment.student_id)
                .or_insert(enrollment.division_id);
        }
        Ok(divisions)
    }

    // ========================================================================
    // Assignments
    // ========================================================================

    pub async fn find_assignment(&self, id: Uuid) -> Result<Option<Assignment>> {
        AssignmentEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// The assignment teaching `subject_id` to `division_id`
    pub async fn find_assignment_for(&self, division_id: Uuid, subject_id: Uuid) -> Result<Option<Assignment>> {
        AssignmentEntity::find()
            .filter(AssignmentColumn::DivisionId.eq(division_id))
            .filter(AssignmentColumn::SubjectId.eq(subject_id))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Assignments of a division with subject and division labels, by subject name
    pub async fn list_assignments(&self, division: &Division) -> Result<Vec<AssignmentInfo>> {
        let rows = AssignmentEntity::find()
            .filter(AssignmentColumn::DivisionId.eq(division.id))
            .find_also_related(SubjectEntity)
            .all(self.read_conn())
            .await?;

        let teachers = self
            .profile_names(rows.iter().filter_map(|(a, _)| a.teacher_id).collect())
            .await?;

        let mut infos: Vec<AssignmentInfo> = rows
            .into_iter()
            .map(|(assignment, subject)| {
                let subject_name = subject.map(|s| s.name).unwrap_or_default();
                assignment_info(&assignment, subject_name, division, &teachers)
            })
            .collect();

        infos.sort_by(|a, b| a.materia.cmp(&b.materia).then_with(|| a.id.cmp(&b.id)));
        Ok(infos)
    }

    /// Labels for one assignment
    pub async fn describe_assignment(&self, assignment: &Assignment) -> Result<AssignmentInfo> {
        let division = self.division(assignment.division_id).await?;
        let subject = SubjectEntity::find_by_id(assignment.subject_id)
            .one(self.read_conn())
            .await?
            .map(|s| s.name)
            .unwrap_or_default();
        let teachers = self.profile_names(assignment.teacher_id.into_iter().collect()).await?;

        Ok(assignment_info(assignment, subject, &division, &teachers))
    }

    async fn profile_names(&self, ids: Vec<Uuid>) -> Result<HashMap<Uuid, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let profiles = ProfileEntity::find()
            .filter(ProfileColumn::Id.is_in(ids))
            .all(self.read_conn())
            .await?;

        Ok(profiles.into_iter().map(|p| (p.id, p.full_name)).collect())
    }

    /// Subject names keyed by id
    pub async fn subject_names(&self, ids: Vec<Uuid>) -> Result<HashMap<Uuid, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let subjects = SubjectEntity::find()
            .filter(SubjectColumn::Id.is_in(ids))
            .all(self.read_conn())
            .await?;

        Ok(subjects.into_iter().map(|s| (s.id, s.name)).collect())
    }

    // ========================================================================
    // Grades
    // ========================================================================

    /// Stored grade rows of one assignment and period
    pub async fn grades_for(&self, assignment_id: Uuid, period: i16) -> Result<Vec<Grade>> {
        GradeEntity::find()
            .filter(GradeColumn::AssignmentId.eq(assignment_id))
            .filter(GradeColumn::Period.eq(period))
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Insert or overwrite the row for (student, assignment, period).
    /// Concurrent saves resolve as last write wins.
    pub async fn upsert_grade(&self, write: &GradeWrite) -> Result<Grade> {
        grade_upsert(write)
            .exec_with_returning(self.write_conn())
            .await
            .map_err(Into::into)
    }

    /// Upsert every record in one transaction
    pub async fn upsert_grades(&self, writes: &[GradeWrite]) -> Result<Vec<Grade>> {
        let txn = self.write_conn().begin().await?;

        let mut saved = Vec::with_capacity(writes.len());
        for write in writes {
            saved.push(grade_upsert(write).exec_with_returning(&txn).await?);
        }

        txn.commit().await?;
        Ok(saved)
    }

    // ========================================================================
    // Attendance
    // ========================================================================

    /// Division-level (preceptor) records, optionally bounded by date
    pub async fn division_attendance(
        &self,
        division_id: Uuid,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<AttendanceRecord>> {
        let mut query = AttendanceEntity::find()
            .filter(AttendanceColumn::DivisionId.eq(division_id))
            .filter(AttendanceColumn::SubjectId.is_null());

        if let Some(start) = start {
            query = query.filter(AttendanceColumn::Date.gte(start));
        }
        if let Some(end) = end {
            query = query.filter(AttendanceColumn::Date.lte(end));
        }

        query
            .order_by_asc(AttendanceColumn::Date)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Every record of a division on one date, subject records included
    pub async fn attendance_on(&self, division_id: Uuid, date: NaiveDate) -> Result<Vec<AttendanceRecord>> {
        AttendanceEntity::find()
            .filter(AttendanceColumn::DivisionId.eq(division_id))
            .filter(AttendanceColumn::Date.eq(date))
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Insert or overwrite records by (student, division, date, subject).
    /// Returns the number of rows written.
    pub async fn upsert_attendance(&self, writes: &[AttendanceWrite]) -> Result<u64> {
        if writes.is_empty() {
            return Ok(0);
        }

        let txn = self.write_conn().begin().await?;

        let mut written = 0;
        for chunk in writes.chunks(INSERT_CHUNK) {
            written += attendance_upsert(chunk).exec_without_returning(&txn).await?;
        }

        txn.commit().await?;
        Ok(written)
    }
}

fn assignment_info(
    assignment: &Assignment,
    subject: String,
    division: &Division,
    teachers: &HashMap<Uuid, String>,
) -> AssignmentInfo {
    AssignmentInfo {
        id: assignment.id,
        materia_id: assignment.subject_id,
        materia: subject,
        division_id: division.id,
        anio: division.year_label.clone(),
        seccion: division.section_label.clone(),
        ciclo_lectivo: division.cycle_year,
        docente: assignment.teacher_id.and_then(|id| teachers.get(&id).cloned()),
    }
}

fn grade_active_model(write: &GradeWrite) -> GradeActiveModel {
    let mut values = write.values.clone();
    values.recompute();

    let [p1, p2, p3, p4] = values.partials;
    GradeActiveModel {
        id: Set(Uuid::new_v4()),
        student_id: Set(write.student_id),
        assignment_id: Set(write.assignment_id),
        period: Set(write.period),
        partial_1: Set(p1),
        partial_2: Set(p2),
        partial_3: Set(p3),
        partial_4: Set(p4),
        attendance: Set(values.attendance),
        observations: Set(values.observations),
        intensification: Set(values.intensification),
        support_notes: Set(values.support_notes),
        support_track_tier: Set(values.support_track_tier.map(|t| t.code().to_string())),
        average: Set(values.average),
        tier: Set(values.tier.map(|t| t.code().to_string())),
        support_track: Set(values.support_track.map(|t| t.label().to_string())),
        updated_at: Set(Utc::now().into()),
    }
}

fn grade_upsert(write: &GradeWrite) -> Insert<GradeActiveModel> {
    GradeEntity::insert(grade_active_model(write)).on_conflict(
        OnConflict::columns([GradeColumn::StudentId, GradeColumn::AssignmentId, GradeColumn::Period])
            .update_columns([
                GradeColumn::Partial1,
                GradeColumn::Partial2,
                GradeColumn::Partial3,
                GradeColumn::Partial4,
                GradeColumn::Attendance,
                GradeColumn::Observations,
                GradeColumn::Intensification,
                GradeColumn::SupportNotes,
                GradeColumn::SupportTrackTier,
                GradeColumn::Average,
                GradeColumn::Tier,
                GradeColumn::SupportTrack,
                GradeColumn::UpdatedAt,
            ])
            .to_owned(),
    )
}

fn attendance_upsert(writes: &[AttendanceWrite]) -> Insert<AttendanceActiveModel> {
    let now = Utc::now();
    let models = writes.iter().map(|w| AttendanceActiveModel {
        id: Set(Uuid::new_v4()),
        student_id: Set(w.student_id),
        division_id: Set(w.division_id),
        subject_id: Set(w.subject_id),
        date: Set(w.date),
        status: Set(w.status.as_str().to_string()),
        observations: Set(w.observations.clone()),
        recorded_by: Set(w.recorded_by),
        updated_at: Set(now.into()),
    });

    // The unique index treats NULL subjects as equal, so preceptor rows
    // conflict too.
    AttendanceEntity::insert_many(models).on_conflict(
        OnConflict::columns([
            AttendanceColumn::StudentId,
            AttendanceColumn::DivisionId,
            AttendanceColumn::Date,
            AttendanceColumn::SubjectId,
        ])
        .update_columns([
            AttendanceColumn::Status,
            AttendanceColumn::Observations,
            AttendanceColumn::RecordedBy,
            AttendanceColumn::UpdatedAt,
        ])
        .to_owned(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use aula_reports::Tier;
    use sea_orm::{DbBackend, QueryTrait};

    fn grade_write() -> GradeWrite {
        let values = GradeValues {
            partials: [Some(8.0), Some(7.0), Some(9.0), Some(6.0)],
            ..GradeValues::default()
        };
        GradeWrite {
            student_id: Uuid::new_v4(),
            assignment_id: Uuid::new_v4(),
            period: 1,
            values,
        }
    }

    #[test]
    fn test_grade_upsert_targets_composite_key() {
        let sql = grade_upsert(&grade_write()).build(DbBackend::Postgres).to_string();

        assert!(sql.starts_with("INSERT INTO \"grades\""));
        assert!(sql.contains("ON CONFLICT (\"student_id\", \"assignment_id\", \"period\") DO UPDATE SET"));
        assert!(sql.contains("\"average\" = \"excluded\".\"average\""));
        // the primary key of the first save is kept
        assert!(!sql.contains("\"id\" = \"excluded\".\"id\""));
    }

    #[test]
    fn test_same_payload_builds_same_conflict_clause() {
        let write = grade_write();
        let first = grade_upsert(&write).build(DbBackend::Postgres).to_string();
        let second = grade_upsert(&write).build(DbBackend::Postgres).to_string();

        let clause = |sql: &str| sql.split("ON CONFLICT").nth(1).map(str::to_string);
        assert!(clause(&first).is_some());
        assert_eq!(clause(&first), clause(&second));
    }

    #[test]
    fn test_derived_fields_recomputed_on_write() {
        let mut write = grade_write();
        write.values.average = Some(1.0);
        write.values.tier = Some(Tier::IncompleteMinimalSupport);

        let model = grade_active_model(&write);
        assert_eq!(model.average.clone().unwrap(), Some(7.5));
        assert_eq!(model.tier.clone().unwrap(), Some("LS".to_string()));
        assert_eq!(model.support_track.clone().unwrap(), Some("Profundización".to_string()));
    }

    #[test]
    fn test_attendance_upsert_statement() {
        let division = Uuid::new_v4();
        let writes: Vec<AttendanceWrite> = (0..3)
            .map(|_| AttendanceWrite {
                student_id: Uuid::new_v4(),
                division_id: division,
                subject_id: None,
                date: NaiveDate::from_ymd_opt(2026, 4, 6).unwrap(),
                status: AttendanceStatus::Justified,
                observations: Some("Certificado médico".to_string()),
                recorded_by: None,
            })
            .collect();

        let sql = attendance_upsert(&writes).build(DbBackend::Postgres).to_string();
        assert!(sql.contains(
            "ON CONFLICT (\"student_id\", \"division_id\", \"date\", \"subject_id\") DO UPDATE SET"
        ));
        assert!(sql.contains("'justificado'"));
        assert_eq!(sql.matches("'justificado'").count(), 3);
    }
}
