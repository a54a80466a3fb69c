// src/storage/local.rs

//! Local filesystem access for consolidation.
//!
//! Loads whichever extracts exist and writes the consolidated document
//! atomically (temp file, then rename).

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{
    CommentRow, PathsConfig, RosterRow, SourceKind, SubjectSurveyRow, TeacherSurveyRow,
};

/// Extracts available to a consolidation run. `None` means absent.
#[derive(Debug, Clone, Default)]
pub struct Sources {
    pub roster: Option<Vec<RosterRow>>,
    pub subject_survey: Option<Vec<SubjectSurveyRow>>,
    pub teacher_survey: Option<Vec<TeacherSurveyRow>>,
    pub comments: Option<Vec<CommentRow>>,
    /// Rows that could not be decoded or failed validation while loading
    pub rejected_rows: usize,
}

impl Sources {
    /// Loaded row count per present source.
    pub fn row_counts(&self) -> Vec<(SourceKind, usize)> {
        [
            (SourceKind::Roster, self.roster.as_ref().map(Vec::len)),
            (SourceKind::SubjectSurvey, self.subject_survey.as_ref().map(Vec::len)),
            (SourceKind::TeacherSurvey, self.teacher_survey.as_ref().map(Vec::len)),
            (SourceKind::Comments, self.comments.as_ref().map(Vec::len)),
        ]
        .into_iter()
        .filter_map(|(kind, count)| count.map(|c| (kind, c)))
        .collect()
    }
}

/// A decoded extract and the number of rows it rejected.
struct Extract<T> {
    rows: Vec<T>,
    rejected: usize,
}

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    paths: PathsConfig,
}

impl LocalStorage {
    pub fn new(paths: PathsConfig) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &PathsConfig {
        &self.paths
    }

    /// Load every extract that exists.
    ///
    /// An unreadable optional extract is logged and treated as absent; an
    /// unreadable roster is an error.
    pub fn load_sources(&self) -> Result<Sources> {
        let mut rejected = 0;

        let roster: Option<Vec<RosterRow>> = read_extract::<RosterRow>(
            self.paths.extract(SourceKind::Roster),
            SourceKind::Roster,
        )?
        .map(|e| {
            rejected += e.rejected;
            e.rows.into_iter().map(RosterRow::normalized).collect()
        });

        let subject_survey = self
            .load_optional::<SubjectSurveyRow>(SourceKind::SubjectSurvey)
            .map(|e| {
                rejected += e.rejected;
                e.rows
            });

        let teacher_survey = self
            .load_optional::<TeacherSurveyRow>(SourceKind::TeacherSurvey)
            .map(|e| {
                rejected += e.rejected;
                e.rows
            });

        let comments = self
            .load_optional::<CommentRow>(SourceKind::Comments)
            .map(|e| {
                let before = e.rows.len();
                let rows: Vec<_> = e.rows.into_iter().filter_map(CommentRow::validated).collect();
                rejected += e.rejected + (before - rows.len());
                rows
            });

        Ok(Sources {
            roster,
            subject_survey,
            teacher_survey,
            comments,
            rejected_rows: rejected,
        })
    }

    fn load_optional<T: DeserializeOwned>(&self, kind: SourceKind) -> Option<Extract<T>> {
        let path = self.paths.extract(kind);
        match read_extract(path, kind) {
            Ok(extract) => extract,
            Err(e) => {
                log::warn!("Ignoring {} extract {}: {}", kind, path.display(), e);
                None
            }
        }
    }

    /// Write the consolidated document to the configured output path.
    pub async fn write_document<T: Serialize + ?Sized>(&self, document: &T) -> Result<()> {
        write_json(&self.paths.output, document).await
    }
}

/// Decode an extract, or `None` if the file does not exist.
fn read_extract<T: DeserializeOwned>(path: &Path, kind: SourceKind) -> Result<Option<Extract<T>>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(AppError::Io(e)),
    };
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let missing: Vec<&str> = kind
        .header()
        .iter()
        .copied()
        .filter(|column| !headers.iter().any(|h| h == *column))
        .collect();
    if !missing.is_empty() && !headers.is_empty() {
        return Err(AppError::validation(format!(
            "{} is missing columns: {}",
            path.display(),
            missing.join(", ")
        )));
    }

    let mut rows = Vec::new();
    let mut rejected = 0;
    for (idx, result) in reader.deserialize::<T>().enumerate() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => {
                rejected += 1;
                log::warn!("{}: skipping record {}: {}", path.display(), idx + 1, e);
            }
        }
    }

    log::info!("Loaded {} {} rows from {}", rows.len(), kind, path.display());
    Ok(Some(Extract { rows, rejected }))
}

/// Write JSON atomically (write to temp, then rename).
async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(&bytes).await?;
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
