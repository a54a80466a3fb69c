//! Consolidated document types.

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Consolidated output: period → subject code → record.
///
/// Both levels are ordered maps so repeated runs serialize identically.
pub type Document = BTreeMap<String, BTreeMap<String, ConsolidatedRecord>>;

/// Option → vote count, in first-seen order with unique keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Responses(Vec<(String, u64)>);

impl Responses {
    /// Add `count` to `option`, appending the option if unseen. Totals
    /// saturate at `u64::MAX`.
    pub fn add(&mut self, option: &str, count: u64) {
        match self.0.iter_mut().find(|(o, _)| o == option) {
            Some((_, total)) => *total = total.saturating_add(count),
            None => self.0.push((option.to_string(), count)),
        }
    }

    pub fn get(&self, option: &str) -> Option<u64> {
        self.0.iter().find(|(o, _)| o == option).map(|(_, c)| *c)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(o, c)| (o.as_str(), *c))
    }
}

impl Serialize for Responses {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (option, count) in &self.0 {
            map.serialize_entry(option, count)?;
        }
        map.end()
    }
}

/// Folded answers to one survey question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionAggregate {
    pub question: String,
    pub responses: Responses,
}

/// A comment as it appears in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentEntry {
    pub commission: String,
    #[serde(rename = "comentario")]
    pub text: String,
}

/// A roster teacher with their own survey results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeacherEntry {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "rango")]
    pub rank: String,
    #[serde(rename = "encuesta_docente")]
    pub survey: Vec<QuestionAggregate>,
}

/// Everything known about one subject in one period.
///
/// `survey`, `comments` and `teachers` are always present, possibly empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsolidatedRecord {
    #[serde(skip)]
    pub period: String,
    #[serde(skip)]
    pub subject_code: String,
    pub subject_name: String,
    pub survey: Vec<QuestionAggregate>,
    pub comments: Vec<CommentEntry>,
    pub teachers: Vec<TeacherEntry>,
}

impl ConsolidatedRecord {
    pub fn empty(period: &str, subject_code: &str, subject_name: &str) -> Self {
        Self {
            period: period.to_string(),
            subject_code: subject_code.to_string(),
            subject_name: subject_name.to_string(),
            survey: Vec::new(),
            comments: Vec::new(),
            teachers: Vec::new(),
        }
    }
}
