//! Grade sheet handlers

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::instrument;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{ensure_enrolled, parse_period, require};
use crate::AppState;
use aula_common::{
    auth::AuthContext,
    db::{models::{Assignment, Grade}, GradeWrite, Repository},
    errors::{AppError, Result},
    metrics,
};
use aula_reports::grading::{is_valid_score, PARTIAL_COUNT};
use aula_reports::merge::merge_grades;
use aula_reports::{AssignmentInfo, GradeEntry, GradeValues, Tier};

#[derive(Debug, Deserialize)]
pub struct SheetQuery {
    pub assignment_id: Option<Uuid>,
    pub period: Option<u8>,
}

/// Merged grade sheet: one entry per enrolled student
#[derive(Debug, Serialize)]
pub struct GradeSheet {
    pub asignacion: AssignmentInfo,
    pub cuatrimestre: i16,
    pub entries: Vec<GradeEntry>,
}

/// One grade record as sent by the editor
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_intensification_period"))]
pub struct SaveGradeRequest {
    pub student_id: Uuid,

    pub assignment_id: Uuid,

    #[validate(range(min = 1, max = 2))]
    pub period: u8,

    #[serde(default)]
    #[validate(custom(function = "validate_partials"))]
    pub partials: [Option<f64>; PARTIAL_COUNT],

    #[serde(default = "default_attendance")]
    #[validate(range(min = 0.0, max = 100.0))]
    pub attendance: f64,

    #[serde(default)]
    #[validate(length(max = 2000))]
    pub observations: String,

    #[validate(range(min = 0.0, max = 10.0))]
    pub intensification: Option<f64>,

    #[validate(length(max = 2000))]
    pub support_notes: Option<String>,

    pub support_track_tier: Option<Tier>,
}

fn default_attendance() -> f64 {
    100.0
}

fn validate_partials(partials: &[Option<f64>; PARTIAL_COUNT]) -> std::result::Result<(), ValidationError> {
    if partials.iter().flatten().all(|score| is_valid_score(*score)) {
        Ok(())
    } else {
        Err(ValidationError::new("score_range").with_message("partials must be between 0 and 10".into()))
    }
}

fn validate_intensification_period(request: &SaveGradeRequest) -> std::result::Result<(), ValidationError> {
    if request.period != 1 && request.intensification.is_some() {
        return Err(ValidationError::new("intensification_period")
            .with_message("intensification is only recorded in period 1".into()));
    }
    Ok(())
}

impl SaveGradeRequest {
    fn into_write(self) -> GradeWrite {
        let mut values = GradeValues {
            partials: self.partials,
            attendance: self.attendance,
            observations: self.observations,
            intensification: self.intensification,
            support_notes: self.support_notes.filter(|n| !n.trim().is_empty()),
            support_track_tier: self.support_track_tier,
            ..GradeValues::default()
        };
        values.recompute();

        GradeWrite {
            student_id: self.student_id,
            assignment_id: self.assignment_id,
            period: self.period as i16,
            values,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct BatchSaveRequest {
    #[validate(length(min = 1, max = 500), nested)]
    pub records: Vec<SaveGradeRequest>,
}

async fn load_assignment(repo: &Repository, id: Uuid) -> Result<Assignment> {
    repo.find_assignment(id).await?.ok_or_else(|| AppError::NotFound {
        resource_type: "assignment".to_string(),
        id: id.to_string(),
    })
}

/// Students on the roster of the assignment's division
async fn enrolled_in(repo: &Repository, assignment: &Assignment) -> Result<HashSet<Uuid>> {
    let division = repo.division(assignment.division_id).await?;
    Ok(repo.roster(&division).await?.iter().map(|s| s.id).collect())
}

/// Grade sheet of one assignment and period
#[instrument(skip(state, auth), fields(user_id = %auth.user_id))]
pub async fn get_sheet(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<SheetQuery>,
) -> Result<Json<GradeSheet>> {
    auth.require_staff()?;
    let assignment_id = require(query.assignment_id, "assignment_id")?;
    let period = parse_period(query.period, "period")?;

    let repo = Repository::new(state.db.clone());
    let assignment = load_assignment(&repo, assignment_id).await?;
    let info = repo.describe_assignment(&assignment).await?;
    let division = repo.division(assignment.division_id).await?;

    let roster = repo.roster(&division).await?;
    let stored = repo.grades_for(assignment_id, period).await?;
    let entries = merge_grades(&roster, stored.iter().map(|g| (g.student_id, g.values())));

    tracing::info!(
        assignment_id = %assignment_id,
        period,
        students = entries.len(),
        stored = stored.len(),
        "Grade sheet loaded"
    );

    Ok(Json(GradeSheet {
        asignacion: info,
        cuatrimestre: period,
        entries,
    }))
}

/// Save one grade record. Derived fields are recomputed server side.
#[instrument(skip(state, auth, request), fields(user_id = %auth.user_id))]
pub async fn save_grade(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<SaveGradeRequest>,
) -> Result<Json<Grade>> {
    request.validate()?;

    let repo = Repository::new(state.db.clone());
    let assignment = load_assignment(&repo, request.assignment_id).await?;
    auth.require_grade_writer(assignment.teacher_id)?;

    let enrolled = enrolled_in(&repo, &assignment).await?;
    ensure_enrolled(&enrolled, [request.student_id], "student_id")?;

    let saved = repo.upsert_grade(&request.into_write()).await?;
    metrics::record_grades_saved(1, "single");

    tracing::info!(
        grade_id = %saved.id,
        student_id = %saved.student_id,
        assignment_id = %saved.assignment_id,
        period = saved.period,
        "Grade saved"
    );

    Ok(Json(saved))
}

/// Save many records in one transaction
#[instrument(skip(state, auth, request), fields(user_id = %auth.user_id))]
pub async fn save_batch(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<BatchSaveRequest>,
) -> Result<Json<Vec<Grade>>> {
    request.validate()?;

    let repo = Repository::new(state.db.clone());

    let assignment_ids: HashSet<Uuid> = request.records.iter().map(|r| r.assignment_id).collect();
    for id in assignment_ids {
        let assignment = load_assignment(&repo, id).await?;
        auth.require_grade_writer(assignment.teacher_id)?;

        let enrolled = enrolled_in(&repo, &assignment).await?;
        let students = request
            .records
            .iter()
            .filter(|r| r.assignment_id == id)
            .map(|r| r.student_id);
        ensure_enrolled(&enrolled, students, "student_id")?;
    }

    let writes: Vec<GradeWrite> = request.records.into_iter().map(SaveGradeRequest::into_write).collect();
    let saved = repo.upsert_grades(&writes).await?;
    metrics::record_grades_saved(saved.len(), "batch");

    tracing::info!(count = saved.len(), "Grade batch saved");

    Ok(Json(saved))
}
