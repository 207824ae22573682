//! Report handlers: grade report as JSON, PDF and CSV, division attendance
//! PDF and absence citations.

use axum::{
    extract::{Path, Query, State},
    response::Response,
    Json,
};
use chrono::Local;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use super::{attachment, parse_period, require, DateRangeQuery};
use crate::AppState;
use aula_common::{
    auth::AuthContext,
    db::Repository,
    errors::{AppError, Result},
    metrics,
};
use aula_reports::attendance::{overview, student_summaries};
use aula_reports::csv_report::grades_csv;
use aula_reports::merge::merge_grades;
use aula_reports::pdf::{
    attendance_pdf, citation_file_name, citation_pdf, grades_pdf, AttendanceReportHeader, Citation,
    GradeReportHeader,
};
use aula_reports::report::{build_report_rows, sanitize_file_component};
use aula_reports::ReportResponse;

const PDF: &str = "application/pdf";
const CSV: &str = "text/csv; charset=utf-8";

/// `division_id`, `materia_id` and `cuatrimestre`; `token` is read by the
/// auth extractor
#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub division_id: Option<Uuid>,
    pub materia_id: Option<Uuid>,
    pub cuatrimestre: Option<u8>,
}

struct Selection {
    division_id: Uuid,
    subject_id: Uuid,
    period: i16,
}

impl ReportQuery {
    fn selection(&self) -> Result<Selection> {
        Ok(Selection {
            division_id: require(self.division_id, "division_id")?,
            subject_id: require(self.materia_id, "materia_id")?,
            period: parse_period(self.cuatrimestre, "cuatrimestre")?,
        })
    }
}

/// Merge roster and stored grades into report rows. Second period reports
/// also load period 1 for the final average.
async fn load_report(repo: &Repository, selection: &Selection) -> Result<ReportResponse> {
    let division = repo.division(selection.division_id).await?;
    let assignment = repo
        .find_assignment_for(selection.division_id, selection.subject_id)
        .await?
        .ok_or_else(|| AppError::AssignmentNotFound {
            division_id: selection.division_id.to_string(),
            subject_id: selection.subject_id.to_string(),
        })?;

    let info = repo.describe_assignment(&assignment).await?;
    let roster = repo.roster(&division).await?;

    let stored = repo.grades_for(assignment.id, selection.period).await?;
    let entries = merge_grades(&roster, stored.iter().map(|g| (g.student_id, g.values())));

    let report = if selection.period == 2 {
        let first = repo.grades_for(assignment.id, 1).await?;
        let first_entries = merge_grades(&roster, first.iter().map(|g| (g.student_id, g.values())));
        build_report_rows(&entries, Some(first_entries.as_slice()))
    } else {
        build_report_rows(&entries, None)
    };

    Ok(ReportResponse {
        report,
        asignacion: info,
    })
}

#[instrument(skip(state, auth), fields(user_id = %auth.user_id))]
pub async fn report_json(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ReportResponse>> {
    auth.require_staff()?;
    let selection = query.selection()?;
    let start = Instant::now();

    let repo = Repository::new(state.db.clone());
    let response = load_report(&repo, &selection).await?;

    metrics::record_report("grades", "json", start.elapsed().as_secs_f64());
    Ok(Json(response))
}

#[instrument(skip(state, auth), fields(user_id = %auth.user_id))]
pub async fn report_pdf(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<ReportQuery>,
) -> Result<Response> {
    auth.require_staff()?;
    let selection = query.selection()?;
    let start = Instant::now();

    let repo = Repository::new(state.db.clone());
    let data = load_report(&repo, &selection).await?;

    let header = GradeReportHeader {
        institution: state.config.school.institution_name.clone(),
        generated_on: Local::now().date_naive(),
        division: data.asignacion.division_label(),
        subject: data.asignacion.materia.clone(),
        period: selection.period as u8,
        teacher: data.asignacion.docente.clone(),
    };
    let bytes = grades_pdf(&header, &data.report)?;

    metrics::record_report("grades", "pdf", start.elapsed().as_secs_f64());
    tracing::info!(
        assignment_id = %data.asignacion.id,
        rows = data.report.len(),
        bytes = bytes.len(),
        "Grade PDF generated"
    );

    attachment(bytes, PDF, &data.asignacion.pdf_file_name())
}

#[instrument(skip(state, auth), fields(user_id = %auth.user_id))]
pub async fn report_csv(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<ReportQuery>,
) -> Result<Response> {
    auth.require_staff()?;
    let selection = query.selection()?;
    let start = Instant::now();

    let repo = Repository::new(state.db.clone());
    let data = load_report(&repo, &selection).await?;
    let csv = grades_csv(&data.report)?;

    metrics::record_report("grades", "csv", start.elapsed().as_secs_f64());
    attachment(csv.into_bytes(), CSV, &data.asignacion.csv_file_name())
}

/// Per-student attendance of a division over a date range
#[instrument(skip(state, auth), fields(user_id = %auth.user_id))]
pub async fn attendance_report(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(division_id): Path<Uuid>,
    Query(range): Query<DateRangeQuery>,
) -> Result<Response> {
    auth.require_staff()?;
    let (start_date, end_date) = range.required()?;
    let start = Instant::now();

    let repo = Repository::new(state.db.clone());
    let division = repo.division(division_id).await?;
    let roster = repo.roster(&division).await?;
    let enrolled: HashSet<Uuid> = roster.iter().map(|s| s.id).collect();

    let records: Vec<_> = repo
        .division_attendance(division_id, Some(start_date), Some(end_date))
        .await?
        .into_iter()
        .filter(|r| enrolled.contains(&r.student_id))
        .filter_map(|r| r.parsed_status().map(|status| (r.student_id, status)))
        .collect();

    let summaries = student_summaries(&roster, records.iter().copied());
    let totals = overview(records.iter().map(|(_, status)| *status));

    let header = AttendanceReportHeader {
        institution: state.config.school.institution_name.clone(),
        generated_on: Local::now().date_naive(),
        division: division.label(),
        start_date,
        end_date,
    };
    let bytes = attendance_pdf(&header, &summaries, &totals)?;

    metrics::record_report("attendance", "pdf", start.elapsed().as_secs_f64());

    let file_name = format!(
        "Asistencia_{}{}_{}_{}.pdf",
        sanitize_file_component(&division.year_label),
        sanitize_file_component(&division.section_label),
        start_date.format("%Y%m%d"),
        end_date.format("%Y%m%d")
    );
    attachment(bytes, PDF, &file_name)
}

/// Body of `POST /reports/citation`
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CitationRequest {
    pub student_id: Uuid,

    #[validate(length(min = 1, max = 200))]
    pub student_name: String,

    pub student_dni: Option<String>,

    #[validate(length(min = 1, max = 100))]
    pub division_name: String,

    pub total_absences: u32,
}

#[instrument(skip(state, auth, request), fields(user_id = %auth.user_id))]
pub async fn citation(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<CitationRequest>,
) -> Result<Response> {
    auth.require_attendance_manager()?;
    request.validate()?;
    let start = Instant::now();

    let citation = Citation {
        institution: state.config.school.institution_name.clone(),
        student_name: request.student_name.trim().to_string(),
        dni: request.student_dni,
        division: request.division_name,
        total_absences: request.total_absences,
        issued_on: Local::now().date_naive(),
    };
    let bytes = citation_pdf(&citation)?;

    metrics::record_report("citation", "pdf", start.elapsed().as_secs_f64());
    tracing::info!(
        student_id = %request.student_id,
        absences = citation.total_absences,
        "Citation generated"
    );

    attachment(bytes, PDF, &citation_file_name(&citation.student_name))
}
