//! Harvest targets and the extract schema each one produces.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What a harvest run extracts, and therefore which extract it feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum Target {
    /// Per-subject survey results
    SubjectSurvey,
    /// Per-teacher survey results within each subject
    TeacherSurvey,
    /// Teacher census per subject (the consolidation roster)
    Roster,
    /// Free-text comments per subject
    Comments,
}

/// Consolidation names the extracts by the target that produced them.
pub type SourceKind = Target;

impl Target {
    pub const ALL: [Target; 4] = [
        Target::SubjectSurvey,
        Target::TeacherSurvey,
        Target::Roster,
        Target::Comments,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Target::SubjectSurvey => "subject-survey",
            Target::TeacherSurvey => "teacher-survey",
            Target::Roster => "teacher-roster",
            Target::Comments => "comments",
        }
    }

    /// Whether leaf units are (subject, teacher) pairs rather than subjects.
    pub fn needs_teachers(&self) -> bool {
        matches!(self, Target::TeacherSurvey)
    }

    /// Extract columns, in order.
    pub fn header(&self) -> &'static [&'static str] {
        match self {
            Target::SubjectSurvey => &[
                "period",
                "subject_code",
                "subject_name",
                "question",
                "option",
                "vote_count",
            ],
            Target::TeacherSurvey => &[
                "period",
                "subject_code",
                "subject_name",
                "teacher_id",
                "question",
                "option",
                "vote_count",
            ],
            Target::Roster => &[
                "period",
                "subject_code",
                "subject_name",
                "teacher_name",
                "teacher_rank",
            ],
            Target::Comments => &[
                "period",
                "subject_code",
                "subject_name",
                "commission",
                "comment",
            ],
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
