//! Cascade domain types: the options offered by the survey form at each
//! stage and the leaf units built from them.

use serde::{Deserialize, Serialize};

use crate::models::Target;
use crate::utils::text::{normalize_label, normalize_whitespace, split_rank};

/// Cascade stage whose options are being discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Period,
    Subject,
    Teacher,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Period => "period",
            Stage::Subject => "subject",
            Stage::Teacher => "teacher",
        }
    }
}

/// One `<option>` of a form `select`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormOption {
    pub value: String,
    pub label: String,
}

impl FormOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// A survey period (term/semester).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub id: String,
    pub label: String,
}

impl From<FormOption> for Period {
    fn from(option: FormOption) -> Self {
        Self {
            id: option.value,
            label: normalize_whitespace(&option.label),
        }
    }
}

/// A subject offered within a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub label: String,
    pub period_id: String,
}

impl Subject {
    pub fn from_option(option: FormOption, period: &Period) -> Self {
        Self {
            id: option.value,
            label: normalize_label(&option.label),
            period_id: period.id.clone(),
        }
    }
}

/// A teacher listed for a subject.
///
/// `option_value` is the raw form value the site expects back when the
/// teacher is selected; `name` and `rank` are parsed from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teacher {
    pub option_value: String,
    pub name: String,
    pub rank: String,
    pub subject_id: String,
    pub period_id: String,
}

impl Teacher {
    pub fn from_option(option: FormOption, subject: &Subject) -> Self {
        let (name, rank) = split_rank(&option.value);
        Self {
            option_value: option.value,
            name,
            rank,
            subject_id: subject.id.clone(),
            period_id: subject.period_id.clone(),
        }
    }
}

/// Form parameters for one request, in cascade order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormParams {
    pub period: Option<String>,
    pub subject: Option<String>,
    pub teacher: Option<String>,
}

impl FormParams {
    pub fn for_period(period: &Period) -> Self {
        Self {
            period: Some(period.id.clone()),
            ..Self::default()
        }
    }

    pub fn for_subject(subject: &Subject) -> Self {
        Self {
            period: Some(subject.period_id.clone()),
            subject: Some(subject.id.clone()),
            teacher: None,
        }
    }
}

/// The smallest independently fetchable extraction task.
///
/// Immutable once built; workers receive it by value and share nothing else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafUnit {
    pub target: Target,
    pub period: Period,
    pub subject: Subject,
    pub teacher: Option<Teacher>,
}

impl LeafUnit {
    pub fn params(&self) -> FormParams {
        FormParams {
            teacher: self.teacher.as_ref().map(|t| t.option_value.clone()),
            ..FormParams::for_subject(&self.subject)
        }
    }

    /// Human-readable description for logs.
    pub fn describe(&self) -> String {
        match &self.teacher {
            Some(teacher) => format!(
                "{} / {} ({}) / {}",
                self.period.label, self.subject.label, self.subject.id, teacher.name
            ),
            None => format!(
                "{} / {} ({})",
                self.period.label, self.subject.label, self.subject.id
            ),
        }
    }
}

/// Which periods a harvest covers, resolved before any work is scheduled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PeriodScope {
    #[default]
    All,
    /// Period ids or labels
    Only(Vec<String>),
}

impl PeriodScope {
    pub fn from_selectors(selectors: Vec<String>) -> Self {
        if selectors.is_empty() {
            Self::All
        } else {
            Self::Only(selectors)
        }
    }

    /// Keep the periods this scope selects, warning about selectors that
    /// match nothing.
    pub fn resolve(&self, periods: Vec<Period>) -> Vec<Period> {
        let Self::Only(selectors) = self else {
            return periods;
        };

        for selector in selectors {
            if !periods
                .iter()
                .any(|p| p.id == *selector || p.label == *selector)
            {
                log::warn!("Period '{}' not offered by the form; ignoring", selector);
            }
        }

        periods
            .into_iter()
            .filter(|p| selectors.iter().any(|s| p.id == *s || p.label == *s))
            .collect()
    }
}
