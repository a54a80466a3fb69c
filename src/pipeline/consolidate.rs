// src/pipeline/consolidate.rs

//! Consolidation of the harvested extracts into one nested document.
//!
//! The roster defines every (period, subject) key. Each optional extract is
//! grouped by that key and joined onto it; keys without a group get empty
//! lists. Groups whose key the roster does not know are dropped and counted.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{AppError, Result};
use crate::models::{
    CommentEntry, Config, ConsolidatedRecord, Document, RosterRow, SourceKind, TeacherEntry,
    TeacherSurveyRow,
};
use crate::pipeline::aggregate::fold_questions;
use crate::storage::{LocalStorage, Sources};

type SubjectKey<'a> = (&'a str, &'a str);

/// Counts describing one consolidation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsolidationSummary {
    pub periods: usize,
    pub subjects: usize,
    pub teachers: usize,
    pub rows_loaded: Vec<(SourceKind, usize)>,
    pub rows_rejected: usize,
    /// Survey or comment groups with no matching roster entry
    pub unmatched_groups: usize,
}

/// A consolidated document and its summary.
#[derive(Debug, Clone)]
pub struct Consolidation {
    pub document: Document,
    pub summary: ConsolidationSummary,
}

/// Join the available extracts onto the roster.
///
/// Fails with `AppError::MissingRoster` when the roster is absent or empty.
pub fn consolidate(sources: &Sources) -> Result<Consolidation> {
    let roster = match &sources.roster {
        Some(rows) if !rows.is_empty() => rows,
        Some(_) => return Err(AppError::MissingRoster("roster extract is empty".into())),
        None => return Err(AppError::MissingRoster("roster extract not found".into())),
    };

    let mut document = Document::new();
    for row in roster {
        document
            .entry(row.period.clone())
            .or_default()
            .entry(row.subject_code.clone())
            .or_insert_with(|| {
                ConsolidatedRecord::empty(&row.period, &row.subject_code, &row.subject_name)
            });
    }

    let mut unmatched = 0;

    if let Some(rows) = &sources.subject_survey {
        for (key, group) in group_by_subject(rows, |r| (&r.period, &r.subject_code)) {
            match record_mut(&mut document, key) {
                Some(record) => {
                    record.survey = fold_questions(
                        group
                            .iter()
                            .map(|r| (r.question.as_str(), r.option.as_str(), r.vote_count)),
                    );
                }
                None => unmatched += 1,
            }
        }
    }

    if let Some(rows) = &sources.comments {
        for (key, group) in group_by_subject(rows, |r| (&r.period, &r.subject_code)) {
            match record_mut(&mut document, key) {
                Some(record) => {
                    record.comments = group
                        .iter()
                        .map(|r| CommentEntry {
                            commission: r.commission.clone(),
                            text: r.comment.clone(),
                        })
                        .collect();
                }
                None => unmatched += 1,
            }
        }
    }

    let teacher_surveys = index_teacher_surveys(sources.teacher_survey.as_deref());
    let mut joined_surveys = 0;
    for (key, group) in group_by_subject(roster, |r| (&r.period, &r.subject_code)) {
        let teachers = teachers_for(&group, key, &teacher_surveys);
        joined_surveys += teachers.iter().filter(|t| !t.survey.is_empty()).count();
        if let Some(record) = record_mut(&mut document, key) {
            record.teachers = teachers;
        }
    }
    let survey_groups = teacher_surveys.len();
    if survey_groups > joined_surveys {
        log::debug!(
            "{} teacher survey groups matched no roster teacher",
            survey_groups - joined_surveys
        );
        unmatched += survey_groups - joined_surveys;
    }

    let summary = ConsolidationSummary {
        periods: document.len(),
        subjects: document.values().map(|subjects| subjects.len()).sum(),
        teachers: document
            .values()
            .flat_map(|subjects| subjects.values())
            .map(|record| record.teachers.len())
            .sum(),
        rows_loaded: sources.row_counts(),
        rows_rejected: sources.rejected_rows,
        unmatched_groups: unmatched,
    };

    Ok(Consolidation { document, summary })
}

/// Load the configured extracts, consolidate them and write the document.
pub async fn run_consolidate(config: &Config, output: Option<PathBuf>) -> Result<ConsolidationSummary> {
    let mut paths = config.paths.clone();
    if let Some(output) = output {
        paths.output = output;
    }
    let storage = LocalStorage::new(paths);

    let sources = storage.load_sources()?;
    for (kind, count) in sources.row_counts() {
        log::info!("Source {}: {} rows", kind, count);
    }
    if sources.rejected_rows > 0 {
        log::warn!("{} rows rejected while loading extracts", sources.rejected_rows);
    }

    let consolidation = consolidate(&sources).inspect_err(|e| {
        log::error!("Consolidation aborted: {}", e);
    })?;

    storage.write_document(&consolidation.document).await?;

    let summary = consolidation.summary;
    log::info!(
        "Wrote {} ({} periods, {} subjects, {} teachers)",
        storage.paths().output.display(),
        summary.periods,
        summary.subjects,
        summary.teachers
    );
    if summary.unmatched_groups > 0 {
        log::warn!(
            "{} groups had no roster entry and were left out",
            summary.unmatched_groups
        );
    }

    Ok(summary)
}

/// Group rows by (period, subject_code), keeping row order within a group.
fn group_by_subject<'a, T>(
    rows: &'a [T],
    key: impl Fn(&'a T) -> (&'a String, &'a String),
) -> HashMap<SubjectKey<'a>, Vec<&'a T>> {
    let mut groups: HashMap<SubjectKey<'a>, Vec<&'a T>> = HashMap::new();
    for row in rows {
        let (period, code) = key(row);
        groups
            .entry((period.as_str(), code.as_str()))
            .or_default()
            .push(row);
    }
    groups
}

fn record_mut<'d>(document: &'d mut Document, key: SubjectKey<'_>) -> Option<&'d mut ConsolidatedRecord> {
    document.get_mut(key.0)?.get_mut(key.1)
}

/// Teacher survey rows keyed by (period, subject_code, teacher name).
fn index_teacher_surveys(
    rows: Option<&[TeacherSurveyRow]>,
) -> HashMap<(&str, &str, String), Vec<&TeacherSurveyRow>> {
    let mut index: HashMap<(&str, &str, String), Vec<&TeacherSurveyRow>> = HashMap::new();
    for row in rows.unwrap_or_default() {
        index
            .entry((row.period.as_str(), row.subject_code.as_str(), row.teacher_name()))
            .or_default()
            .push(row);
    }
    index
}

/// Distinct teachers of one subject, first-seen name and rank.
fn teachers_for(
    roster: &[&RosterRow],
    key: SubjectKey<'_>,
    surveys: &HashMap<(&str, &str, String), Vec<&TeacherSurveyRow>>,
) -> Vec<TeacherEntry> {
    let mut teachers: Vec<TeacherEntry> = Vec::new();
    for row in roster {
        if row.teacher_name.is_empty() || teachers.iter().any(|t| t.name == row.teacher_name) {
            continue;
        }

        let survey = surveys
            .get(&(key.0, key.1, row.teacher_name.clone()))
            .map(|rows| {
                fold_questions(
                    rows.iter()
                        .map(|r| (r.question.as_str(), r.option.as_str(), r.vote_count)),
                )
            })
            .unwrap_or_default();

        teachers.push(TeacherEntry {
            name: row.teacher_name.clone(),
            rank: row.teacher_rank.clone(),
            survey,
        });
    }
    teachers
}
