//! Assignments of a division

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::require;
use crate::AppState;
use aula_common::{auth::AuthContext, db::Repository, errors::Result};
use aula_reports::AssignmentInfo;

#[derive(Debug, Deserialize)]
pub struct AssignmentsQuery {
    pub division_id: Option<Uuid>,
}

/// Subjects taught to a division with their labels, ordered by subject name
pub async fn list_assignments(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<AssignmentsQuery>,
) -> Result<Json<Vec<AssignmentInfo>>> {
    auth.require_staff()?;
    let division_id = require(query.division_id, "division_id")?;

    let repo = Repository::new(state.db.clone());
    let division = repo.division(division_id).await?;
    let assignments = repo.list_assignments(&division).await?;

    tracing::info!(
        division_id = %division_id,
        count = assignments.len(),
        "Listed assignments"
    );

    Ok(Json(assignments))
}
