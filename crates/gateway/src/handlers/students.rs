//! Division roster

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::instrument;
use uuid::Uuid;

use crate::AppState;
use aula_common::{auth::AuthContext, db::Repository, errors::Result};
use aula_reports::merge::compare_students;
use aula_reports::Student;

/// Students enrolled in a division, alphabetically
#[instrument(skip(state, auth), fields(user_id = %auth.user_id))]
pub async fn list_students(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(division_id): Path<Uuid>,
) -> Result<Json<Vec<Student>>> {
    auth.require_staff()?;

    let repo = Repository::new(state.db.clone());
    let division = repo.division(division_id).await?;

    let mut students = repo.roster(&division).await?;
    students.sort_by(compare_students);
    students.dedup_by_key(|s| s.id);

    tracing::debug!(division_id = %division_id, count = students.len(), "Roster loaded");
    Ok(Json(students))
}
