//! Attendance capture, alerts, discrepancies and mass justification

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::instrument;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{check_range, ensure_enrolled, require, DateRangeQuery};
use crate::AppState;
use aula_common::{
    auth::{AuthContext, Role},
    db::{AttendanceWrite, Repository},
    errors::{AppError, Result},
    metrics,
};
use aula_reports::attendance::{
    absence_alerts, discrepancies as find_discrepancies, overview as summarize, school_days, AttendanceOverview,
    AttendanceStatus, Discrepancy, StudentAlert,
};

/// Body of `POST /attendance`: one day of one division, optionally one subject
#[derive(Debug, Deserialize, Validate)]
pub struct CaptureRequest {
    pub division_id: Uuid,

    pub subject_id: Option<Uuid>,

    pub date: NaiveDate,

    #[validate(length(min = 1, max = 200), custom(function = "validate_unique_students"), nested)]
    pub records: Vec<CaptureRecord>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CaptureRecord {
    pub student_id: Uuid,

    pub status: AttendanceStatus,

    #[validate(length(max = 500))]
    pub observations: Option<String>,
}

fn validate_unique_students(records: &[CaptureRecord]) -> std::result::Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(records.len());
    if records.iter().all(|r| seen.insert(r.student_id)) {
        Ok(())
    } else {
        Err(ValidationError::new("duplicate_student").with_message("a student appears more than once".into()))
    }
}

#[derive(Debug, Serialize)]
pub struct CaptureResponse {
    pub written: u64,
}

/// Upsert the records of one day. Every student must be enrolled in the
/// division; teachers can only write for subjects they teach there.
#[instrument(skip(state, auth, request), fields(user_id = %auth.user_id))]
pub async fn capture(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<CaptureRequest>,
) -> Result<Json<CaptureResponse>> {
    request.validate()?;
    auth.require_attendance_writer(request.subject_id)?;

    let repo = Repository::new(state.db.clone());
    let division = repo.division(request.division_id).await?;

    if let (Role::Teacher, Some(subject_id)) = (auth.role, request.subject_id) {
        let assignment = repo
            .find_assignment_for(division.id, subject_id)
            .await?
            .ok_or_else(|| AppError::AssignmentNotFound {
                division_id: division.id.to_string(),
                subject_id: subject_id.to_string(),
            })?;
        if assignment.teacher_id != Some(auth.user_id) {
            return Err(AppError::forbidden("subject is assigned to another teacher"));
        }
    }

    let enrolled: HashSet<Uuid> = repo.roster(&division).await?.iter().map(|s| s.id).collect();
    ensure_enrolled(&enrolled, request.records.iter().map(|r| r.student_id), "records")?;

    let writes: Vec<AttendanceWrite> = request
        .records
        .into_iter()
        .map(|r| AttendanceWrite {
            student_id: r.student_id,
            division_id: division.id,
            subject_id: request.subject_id,
            date: request.date,
            status: r.status,
            observations: r.observations.filter(|o| !o.trim().is_empty()),
            recorded_by: Some(auth.user_id),
        })
        .collect();

    let written = repo.upsert_attendance(&writes).await?;
    metrics::record_attendance_written(written, "capture");

    tracing::info!(
        division_id = %division.id,
        subject_id = ?request.subject_id,
        date = %request.date,
        written,
        "Attendance captured"
    );

    Ok(Json(CaptureResponse { written }))
}

/// Roster with absence counts and risk tier, most absences first
#[instrument(skip(state, auth), fields(user_id = %auth.user_id))]
pub async fn alerts(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(division_id): Path<Uuid>,
    Query(range): Query<DateRangeQuery>,
) -> Result<Json<Vec<StudentAlert>>> {
    auth.require_staff()?;
    let (start, end) = range.checked()?;

    let repo = Repository::new(state.db.clone());
    let division = repo.division(division_id).await?;
    let roster = repo.roster(&division).await?;

    let records = repo.division_attendance(division_id, start, end).await?;
    let alerts = absence_alerts(
        &roster,
        records
            .iter()
            .filter_map(|r| r.parsed_status().map(|status| (r.student_id, status))),
    );

    Ok(Json(alerts))
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: Option<NaiveDate>,
}

/// Students whose subject records disagree with, or are missing relative
/// to, the preceptor record of a date
#[instrument(skip(state, auth), fields(user_id = %auth.user_id))]
pub async fn discrepancies(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(division_id): Path<Uuid>,
    Query(query): Query<DateQuery>,
) -> Result<Json<Vec<Discrepancy>>> {
    auth.require_staff()?;
    let date = require(query.date, "date")?;

    let repo = Repository::new(state.db.clone());
    let division = repo.division(division_id).await?;
    let roster = repo.roster(&division).await?;
    let records = repo.attendance_on(division_id, date).await?;

    let assignments = repo.list_assignments(&division).await?;
    let assigned: Vec<String> = assignments.iter().map(|a| a.materia.clone()).collect();

    let mut names: HashMap<Uuid, String> = assignments.into_iter().map(|a| (a.materia_id, a.materia)).collect();
    let unassigned: Vec<Uuid> = records
        .iter()
        .filter_map(|r| r.subject_id)
        .filter(|id| !names.contains_key(id))
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    names.extend(repo.subject_names(unassigned).await?);

    let mut division_records = Vec::new();
    let mut subject_records = Vec::new();
    for record in &records {
        let Some(status) = record.parsed_status() else {
            continue;
        };
        match record.subject_id {
            None => division_records.push((record.student_id, status)),
            Some(subject_id) => {
                let name = names
                    .get(&subject_id)
                    .cloned()
                    .unwrap_or_else(|| subject_id.to_string());
                subject_records.push((record.student_id, name, status));
            }
        }
    }

    let found = find_discrepancies(&roster, &assigned, division_records, subject_records);
    tracing::debug!(division_id = %division_id, date = %date, count = found.len(), "Discrepancies computed");

    Ok(Json(found))
}

/// Division totals over an optional range
#[instrument(skip(state, auth), fields(user_id = %auth.user_id))]
pub async fn overview(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(division_id): Path<Uuid>,
    Query(range): Query<DateRangeQuery>,
) -> Result<Json<AttendanceOverview>> {
    auth.require_staff()?;
    let (start, end) = range.checked()?;

    let repo = Repository::new(state.db.clone());
    let division = repo.division(division_id).await?;
    let enrolled: HashSet<Uuid> = repo.roster(&division).await?.iter().map(|s| s.id).collect();

    let records = repo.division_attendance(division_id, start, end).await?;
    let totals = summarize(
        records
            .iter()
            .filter(|r| enrolled.contains(&r.student_id))
            .filter_map(|r| r.parsed_status()),
    );

    Ok(Json(totals))
}

/// Body of `POST /attendance/mass-justify`
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MassJustifyRequest {
    #[validate(length(min = 1, max = 200))]
    pub student_ids: Vec<Uuid>,

    pub start_date: NaiveDate,

    pub end_date: NaiveDate,

    #[validate(length(max = 500))]
    pub observations: Option<String>,
}

impl MassJustifyRequest {
    /// School days covered by the request, bounded by `max_days`
    fn days(&self, max_days: i64) -> Result<Vec<NaiveDate>> {
        check_range(self.start_date, self.end_date)?;

        let span = (self.end_date - self.start_date).num_days() + 1;
        if span > max_days {
            return Err(AppError::validation(
                format!("range covers {} days, the maximum is {}", span, max_days),
                Some("endDate"),
            ));
        }

        let days = school_days(self.start_date, self.end_date);
        if days.is_empty() {
            return Err(AppError::validation("range contains no school days", Some("startDate")));
        }
        Ok(days)
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Mark every school day in the range as justified for each student, in
/// the division each student is currently enrolled in
#[instrument(skip(state, auth, request), fields(user_id = %auth.user_id))]
pub async fn mass_justify(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<MassJustifyRequest>,
) -> Result<Json<MessageResponse>> {
    auth.require_attendance_manager()?;
    request.validate()?;
    let days = request.days(state.config.school.mass_justify_max_days)?;

    let mut student_ids = request.student_ids.clone();
    student_ids.sort();
    student_ids.dedup();

    let repo = Repository::new(state.db.clone());
    let divisions = repo.current_divisions(&student_ids).await?;

    if let Some(missing) = student_ids.iter().find(|id| !divisions.contains_key(id)) {
        return Err(AppError::validation(
            format!("student {} has no enrollment in the current cycle", missing),
            Some("studentIds"),
        ));
    }

    let observations = request.observations.filter(|o| !o.trim().is_empty());
    let writes: Vec<AttendanceWrite> = student_ids
        .iter()
        .flat_map(|student_id| {
            let division_id = divisions[student_id];
            let observations = observations.clone();
            days.iter().map(move |date| AttendanceWrite {
                student_id: *student_id,
                division_id,
                subject_id: None,
                date: *date,
                status: AttendanceStatus::Justified,
                observations: observations.clone(),
                recorded_by: Some(auth.user_id),
            })
        })
        .collect();

    let written = repo.upsert_attendance(&writes).await?;
    metrics::record_attendance_written(written, "mass_justify");

    tracing::info!(
        students = student_ids.len(),
        days = days.len(),
        written,
        "Absences justified"
    );

    Ok(Json(MessageResponse {
        message: format!(
            "{} registros justificados para {} estudiantes ({} días hábiles)",
            written,
            student_ids.len(),
            days.len()
        ),
    }))
}
