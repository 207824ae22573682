//! Sequential export of every grade report of a division

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, instrument};
use uuid::Uuid;

use aula_reports::csv_report::grades_csv;
use aula_reports::{AssignmentInfo, ReportResponse};

/// Where assignments and their reports come from
#[async_trait]
pub trait ReportSource: Send + Sync {
    async fn assignments(&self, division_id: Uuid) -> Result<Vec<AssignmentInfo>>;

    async fn report(&self, assignment: &AssignmentInfo, period: u8) -> Result<ReportResponse>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub completed: usize,
    pub errors: usize,
}

impl ExportSummary {
    pub fn is_clean(&self) -> bool {
        self.errors == 0
    }
}

impl std::fmt::Display for ExportSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} completed, {} errors", self.completed, self.errors)
    }
}

pub struct Exporter<S> {
    source: S,
    output_dir: PathBuf,
    delay: Duration,
}

impl<S: ReportSource> Exporter<S> {
    pub fn new(source: S, output_dir: impl Into<PathBuf>, delay: Duration) -> Self {
        Self {
            source,
            output_dir: output_dir.into(),
            delay,
        }
    }

    /// Export one CSV per assignment, one at a time with `delay` between
    /// requests. A failed assignment is counted and skipped; only a failure
    /// to list assignments aborts the run.
    #[instrument(skip(self))]
    pub async fn run(&self, division_id: Uuid, period: u8) -> Result<ExportSummary> {
        let assignments = self
            .source
            .assignments(division_id)
            .await
            .context("Failed to list assignments")?;

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.output_dir.display()))?;

        info!(count = assignments.len(), "Exporting grade reports");

        let mut summary = ExportSummary::default();
        for (index, assignment) in assignments.iter().enumerate() {
            if index > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            match self.export_one(assignment, period).await {
                Ok(path) => {
                    summary.completed += 1;
                    info!(materia = %assignment.materia, path = %path.display(), "Report exported");
                }
                Err(e) => {
                    summary.errors += 1;
                    error!(materia = %assignment.materia, error = %format!("{:#}", e), "Report export failed");
                }
            }
        }

        Ok(summary)
    }

    async fn export_one(&self, assignment: &AssignmentInfo, period: u8) -> Result<PathBuf> {
        let response = self.source.report(assignment, period).await?;
        let csv = grades_csv(&response.report)?;

        let path = self.output_dir.join(response.asignacion.csv_file_name());
        write_file(&path, csv.as_bytes()).await?;
        Ok(path)
    }
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::time::Instant;
    use tokio_test::assert_ok;

    struct FakeSource {
        assignments: Vec<AssignmentInfo>,
        failing: Vec<Uuid>,
        requested: Mutex<Vec<(Uuid, Instant)>>,
    }

    impl FakeSource {
        fn new(assignments: Vec<AssignmentInfo>, failing: Vec<Uuid>) -> Self {
            Self {
                assignments,
                failing,
                requested: Mutex::new(Vec::new()),
            }
        }

        fn requested_ids(&self) -> Vec<Uuid> {
            self.requested.lock().unwrap().iter().map(|(id, _)| *id).collect()
        }
    }

    #[async_trait]
    impl ReportSource for FakeSource {
        async fn assignments(&self, _division_id: Uuid) -> Result<Vec<AssignmentInfo>> {
            Ok(self.assignments.clone())
        }

        async fn report(&self, assignment: &AssignmentInfo, _period: u8) -> Result<ReportResponse> {
            self.requested.lock().unwrap().push((assignment.id, Instant::now()));
            if self.failing.contains(&assignment.id) {
                anyhow::bail!("503 Service Unavailable");
            }
            Ok(ReportResponse {
                report: Vec::new(),
                asignacion: assignment.clone(),
            })
        }
    }

    fn assignment(subject: &str) -> AssignmentInfo {
        AssignmentInfo {
            id: Uuid::new_v4(),
            materia_id: Uuid::new_v4(),
            materia: subject.to_string(),
            division_id: Uuid::nil(),
            anio: "3".to_string(),
            seccion: "A".to_string(),
            ciclo_lectivo: 2026,
            docente: None,
        }
    }

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("aula-export-{}", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_batch() {
        let list = vec![assignment("Historia"), assignment("Lengua"), assignment("Química")];
        let source = FakeSource::new(list.clone(), vec![list[1].id]);

        let dir = scratch_dir();
        let exporter = Exporter::new(source, &dir, Duration::ZERO);
        let summary = assert_ok!(exporter.run(Uuid::nil(), 1).await);

        assert_eq!(summary, ExportSummary { completed: 2, errors: 1 });
        assert!(!summary.is_clean());
        assert_eq!(summary.to_string(), "2 completed, 1 errors");

        // Requests go out in listing order, one per assignment
        assert_eq!(exporter.source.requested_ids(), list.iter().map(|a| a.id).collect::<Vec<_>>());

        assert!(dir.join(list[0].csv_file_name()).exists());
        assert!(!dir.join(list[1].csv_file_name()).exists());
        assert!(dir.join(list[2].csv_file_name()).exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_empty_division() {
        let source = FakeSource::new(Vec::new(), Vec::new());

        let dir = scratch_dir();
        let summary = assert_ok!(
            Exporter::new(source, &dir, Duration::from_millis(800))
                .run(Uuid::nil(), 2)
                .await
        );

        assert_eq!(summary, ExportSummary::default());
        assert!(summary.is_clean());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_are_spaced_by_delay() {
        let delay = Duration::from_millis(800);
        let list = vec![assignment("Biología"), assignment("Geografía"), assignment("Inglés")];
        let source = FakeSource::new(list.clone(), Vec::new());

        let dir = scratch_dir();
        let exporter = Exporter::new(source, &dir, delay);
        let started = Instant::now();
        let summary = assert_ok!(exporter.run(Uuid::nil(), 1).await);
        let elapsed = started.elapsed();

        assert_eq!(summary, ExportSummary { completed: 3, errors: 0 });

        let requested = exporter.source.requested.lock().unwrap().clone();
        assert_eq!(requested.len(), 3);
        // No pause before the first request
        assert!(requested[0].1.duration_since(started) < delay);
        for pair in requested.windows(2) {
            assert!(pair[1].1.duration_since(pair[0].1) >= delay);
        }
        assert!(elapsed >= Duration::from_millis(1600));

        std::fs::remove_dir_all(&dir).ok();
    }
}
