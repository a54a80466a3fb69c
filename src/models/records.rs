//! Validated extract records, one type per source kind.
//!
//! Validation happens once, here: vote counts are coerced to non-negative
//! integers, comment text is trimmed and blank comments are rejected, and a
//! missing teacher rank falls back to the unspecified default.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::models::{LeafUnit, Target};
use crate::utils::text::{UNSPECIFIED_RANK, normalize_whitespace, split_rank};

/// Coerce a raw vote count into a non-negative integer.
///
/// Non-numeric, negative or non-finite input counts as 0; fractional input
/// is truncated.
pub fn coerce_vote_count(raw: &str) -> u64 {
    let trimmed = raw.trim();
    if let Ok(n) = trimmed.parse::<u64>() {
        return n;
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return n.max(0) as u64;
    }
    match trimmed.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 => f.trunc() as u64,
        _ => {
            log::debug!("Vote count '{}' is not numeric; counting 0", raw);
            0
        }
    }
}

fn deserialize_vote_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(coerce_vote_count(&raw))
}

/// One (question, option, count) cell scraped from a survey table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyCell {
    pub question: String,
    pub option: String,
    pub raw_count: String,
}

/// Subject-level survey result row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectSurveyRow {
    pub period: String,
    pub subject_code: String,
    pub subject_name: String,
    pub question: String,
    pub option: String,
    #[serde(deserialize_with = "deserialize_vote_count")]
    pub vote_count: u64,
}

impl SubjectSurveyRow {
    pub fn from_cell(leaf: &LeafUnit, cell: SurveyCell) -> Self {
        Self {
            period: leaf.period.label.clone(),
            subject_code: leaf.subject.id.clone(),
            subject_name: leaf.subject.label.clone(),
            question: cell.question,
            option: cell.option,
            vote_count: coerce_vote_count(&cell.raw_count),
        }
    }
}

/// Teacher-level survey result row.
///
/// `teacher_id` is the raw form value, which may still carry a rank suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherSurveyRow {
    pub period: String,
    pub subject_code: String,
    pub subject_name: String,
    pub teacher_id: String,
    pub question: String,
    pub option: String,
    #[serde(deserialize_with = "deserialize_vote_count")]
    pub vote_count: u64,
}

impl TeacherSurveyRow {
    pub fn from_cell(leaf: &LeafUnit, teacher_id: &str, cell: SurveyCell) -> Self {
        Self {
            period: leaf.period.label.clone(),
            subject_code: leaf.subject.id.clone(),
            subject_name: leaf.subject.label.clone(),
            teacher_id: teacher_id.to_string(),
            question: cell.question,
            option: cell.option,
            vote_count: coerce_vote_count(&cell.raw_count),
        }
    }

    /// Teacher name with any trailing rank removed, used as the join key.
    pub fn teacher_name(&self) -> String {
        split_rank(&self.teacher_id).0
    }
}

/// Teacher census row: who teaches a subject in a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterRow {
    pub period: String,
    pub subject_code: String,
    pub subject_name: String,
    pub teacher_name: String,
    pub teacher_rank: String,
}

impl RosterRow {
    pub fn from_teacher_value(leaf: &LeafUnit, raw_value: &str) -> Self {
        let (teacher_name, teacher_rank) = split_rank(raw_value);
        Self {
            period: leaf.period.label.clone(),
            subject_code: leaf.subject.id.clone(),
            subject_name: leaf.subject.label.clone(),
            teacher_name,
            teacher_rank,
        }
    }

    /// Trim name and rank, defaulting a blank rank.
    pub fn normalized(mut self) -> Self {
        self.teacher_name = normalize_whitespace(&self.teacher_name);
        self.teacher_rank = normalize_whitespace(&self.teacher_rank);
        if self.teacher_rank.is_empty() {
            self.teacher_rank = UNSPECIFIED_RANK.to_string();
        }
        self
    }
}

/// Free-text comment left for a subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRow {
    pub period: String,
    pub subject_code: String,
    pub subject_name: String,
    pub commission: String,
    pub comment: String,
}

impl CommentRow {
    /// Build a comment row; blank text yields `None`.
    pub fn new(leaf: &LeafUnit, commission: &str, text: &str) -> Option<Self> {
        let comment = text.trim();
        if comment.is_empty() {
            return None;
        }
        Some(Self {
            period: leaf.period.label.clone(),
            subject_code: leaf.subject.id.clone(),
            subject_name: leaf.subject.label.clone(),
            commission: commission.trim().to_string(),
            comment: comment.to_string(),
        })
    }

    /// Trim fields of a loaded row; blank text yields `None`.
    pub fn validated(mut self) -> Option<Self> {
        self.comment = self.comment.trim().to_string();
        self.commission = self.commission.trim().to_string();
        (!self.comment.is_empty()).then_some(self)
    }
}

/// A row of any extract, tagged by the target that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    SubjectSurvey(SubjectSurveyRow),
    TeacherSurvey(TeacherSurveyRow),
    Roster(RosterRow),
    Comment(CommentRow),
}

impl Record {
    pub fn target(&self) -> Target {
        match self {
            Record::SubjectSurvey(_) => Target::SubjectSurvey,
            Record::TeacherSurvey(_) => Target::TeacherSurvey,
            Record::Roster(_) => Target::Roster,
            Record::Comment(_) => Target::Comments,
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Record::SubjectSurvey(row) => row.serialize(serializer),
            Record::TeacherSurvey(row) => row.serialize(serializer),
            Record::Roster(row) => row.serialize(serializer),
            Record::Comment(row) => row.serialize(serializer),
        }
    }
}
