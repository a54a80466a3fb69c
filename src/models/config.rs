//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Target;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and pacing behavior settings
    #[serde(default)]
    pub harvest: HarvestConfig,

    /// Bounded pool size per target
    #[serde(default)]
    pub workers: WorkersConfig,

    /// Form field names and page anchors
    #[serde(default)]
    pub form: FormConfig,

    /// Extract and output locations
    #[serde(default)]
    pub paths: PathsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Load a configuration file that must exist, parse, and validate.
    pub fn load_validated(path: impl AsRef<Path>) -> Result<Self> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.harvest.user_agent.trim().is_empty() {
            return Err(AppError::validation("harvest.user_agent is empty"));
        }
        url::Url::parse(&self.harvest.url)?;
        if self.harvest.timeout_secs == 0 {
            return Err(AppError::validation("harvest.timeout_secs must be > 0"));
        }
        for target in Target::ALL {
            if self.workers.for_target(target) == 0 {
                return Err(AppError::validation(format!(
                    "workers.{} must be > 0",
                    target.as_str().replace('-', "_")
                )));
            }
        }
        let fields = [
            ("form.period_field", &self.form.period_field),
            ("form.subject_field", &self.form.subject_field),
            ("form.teacher_field", &self.form.teacher_field),
            ("form.subject_heading", &self.form.subject_heading),
            ("form.teacher_heading", &self.form.teacher_heading),
            ("form.comments_table_id", &self.form.comments_table_id),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(AppError::validation(format!("{name} is empty")));
            }
        }
        Ok(())
    }
}

/// HTTP client and pacing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Survey form endpoint
    #[serde(default = "defaults::url")]
    pub url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Referer header; falls back to `url` when unset
    #[serde(default)]
    pub referer: Option<String>,

    /// Timeout for each individual fetch, in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Delay between successive discovery calls in milliseconds
    #[serde(default = "defaults::discovery_delay")]
    pub discovery_delay_ms: u64,

    /// Delay applied by each worker after its leaf fetch in milliseconds
    #[serde(default = "defaults::leaf_delay")]
    pub leaf_delay_ms: u64,
}

impl HarvestConfig {
    pub fn referer(&self) -> &str {
        self.referer.as_deref().unwrap_or(&self.url)
    }
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            url: defaults::url(),
            user_agent: defaults::user_agent(),
            referer: None,
            timeout_secs: defaults::timeout(),
            discovery_delay_ms: defaults::discovery_delay(),
            leaf_delay_ms: defaults::leaf_delay(),
        }
    }
}

/// Worker pool size per harvest target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkersConfig {
    #[serde(default = "defaults::workers_subject_survey")]
    pub subject_survey: usize,

    #[serde(default = "defaults::workers_teacher_survey")]
    pub teacher_survey: usize,

    #[serde(default = "defaults::workers_roster")]
    pub roster: usize,

    #[serde(default = "defaults::workers_comments")]
    pub comments: usize,
}

impl WorkersConfig {
    pub fn for_target(&self, target: Target) -> usize {
        match target {
            Target::SubjectSurvey => self.subject_survey,
            Target::TeacherSurvey => self.teacher_survey,
            Target::Roster => self.roster,
            Target::Comments => self.comments,
        }
    }

    pub fn set_for_target(&mut self, target: Target, workers: usize) {
        let slot = match target {
            Target::SubjectSurvey => &mut self.subject_survey,
            Target::TeacherSurvey => &mut self.teacher_survey,
            Target::Roster => &mut self.roster,
            Target::Comments => &mut self.comments,
        };
        *slot = workers;
    }
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            subject_survey: defaults::workers_subject_survey(),
            teacher_survey: defaults::workers_teacher_survey(),
            roster: defaults::workers_roster(),
            comments: defaults::workers_comments(),
        }
    }
}

/// Form field names and the structural anchors used to locate data on a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormConfig {
    /// `select` name holding periods
    #[serde(default = "defaults::period_field")]
    pub period_field: String,

    /// `select` name holding subjects
    #[serde(default = "defaults::subject_field")]
    pub subject_field: String,

    /// `select` name holding teachers
    #[serde(default = "defaults::teacher_field")]
    pub teacher_field: String,

    /// `h3` text that opens the subject survey section
    #[serde(default = "defaults::subject_heading")]
    pub subject_heading: String,

    /// `h3` text that opens the teacher survey section
    #[serde(default = "defaults::teacher_heading")]
    pub teacher_heading: String,

    /// `id` of the comments table
    #[serde(default = "defaults::comments_table_id")]
    pub comments_table_id: String,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            period_field: defaults::period_field(),
            subject_field: defaults::subject_field(),
            teacher_field: defaults::teacher_field(),
            subject_heading: defaults::subject_heading(),
            teacher_heading: defaults::teacher_heading(),
            comments_table_id: defaults::comments_table_id(),
        }
    }
}

/// Locations of the tabular extracts and the consolidated document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "defaults::subject_survey_path")]
    pub subject_survey: PathBuf,

    #[serde(default = "defaults::teacher_survey_path")]
    pub teacher_survey: PathBuf,

    #[serde(default = "defaults::roster_path")]
    pub roster: PathBuf,

    #[serde(default = "defaults::comments_path")]
    pub comments: PathBuf,

    /// Consolidated JSON document
    #[serde(default = "defaults::output_path")]
    pub output: PathBuf,
}

impl PathsConfig {
    /// Extract location for a target.
    pub fn extract(&self, target: Target) -> &Path {
        match target {
            Target::SubjectSurvey => &self.subject_survey,
            Target::TeacherSurvey => &self.teacher_survey,
            Target::Roster => &self.roster,
            Target::Comments => &self.comments,
        }
    }

    pub fn set_extract(&mut self, target: Target, path: PathBuf) {
        let slot = match target {
            Target::SubjectSurvey => &mut self.subject_survey,
            Target::TeacherSurvey => &mut self.teacher_survey,
            Target::Roster => &mut self.roster,
            Target::Comments => &mut self.comments,
        };
        *slot = path;
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            subject_survey: defaults::subject_survey_path(),
            teacher_survey: defaults::teacher_survey_path(),
            roster: defaults::roster_path(),
            comments: defaults::comments_path(),
            output: defaults::output_path(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Harvest defaults
    pub fn url() -> String {
        "https://www1.ing.unlp.edu.ar/sitio/encuestas/index.php".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; survey-harvest/0.1)".into()
    }
    pub fn timeout() -> u64 {
        20
    }
    pub fn discovery_delay() -> u64 {
        500
    }
    pub fn leaf_delay() -> u64 {
        500
    }

    // Worker defaults
    pub fn workers_subject_survey() -> usize {
        5
    }
    pub fn workers_teacher_survey() -> usize {
        15
    }
    pub fn workers_roster() -> usize {
        30
    }
    pub fn workers_comments() -> usize {
        10
    }

    // Form defaults
    pub fn period_field() -> String {
        "anioSem".into()
    }
    pub fn subject_field() -> String {
        "cod".into()
    }
    pub fn teacher_field() -> String {
        "docente".into()
    }
    pub fn subject_heading() -> String {
        "Respuestas sobre la materia".into()
    }
    pub fn teacher_heading() -> String {
        "Respuestas sobre el docente".into()
    }
    pub fn comments_table_id() -> String {
        "tblComent".into()
    }

    // Path defaults
    pub fn subject_survey_path() -> PathBuf {
        "data/subject_survey.csv".into()
    }
    pub fn teacher_survey_path() -> PathBuf {
        "data/teacher_survey.csv".into()
    }
    pub fn roster_path() -> PathBuf {
        "data/teacher_roster.csv".into()
    }
    pub fn comments_path() -> PathBuf {
        "data/comments.csv".into()
    }
    pub fn output_path() -> PathBuf {
        "data/consolidated.json".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [harvest]
            timeout_secs = 5

            [workers]
            roster = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.harvest.timeout_secs, 5);
        assert_eq!(config.harvest.leaf_delay_ms, 500);
        assert_eq!(config.workers.for_target(Target::Roster), 8);
        assert_eq!(config.workers.for_target(Target::TeacherSurvey), 15);
        assert_eq!(config.form.period_field, "anioSem");
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = Config::default();
        config.workers.comments = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("workers.comments"));
    }

    #[test]
    fn test_overrides_touch_one_target() {
        let mut config = Config::default();
        config.workers.set_for_target(Target::Roster, 2);
        config
            .paths
            .set_extract(Target::Comments, PathBuf::from("/tmp/c.csv"));

        assert_eq!(config.workers.for_target(Target::Roster), 2);
        assert_eq!(config.workers.for_target(Target::Comments), 10);
        assert_eq!(config.paths.extract(Target::Comments), Path::new("/tmp/c.csv"));
        assert_eq!(
            config.paths.extract(Target::Roster),
            Path::new("data/teacher_roster.csv")
        );
    }

    #[test]
    fn test_referer_falls_back_to_url() {
        let config = HarvestConfig::default();
        assert_eq!(config.referer(), config.url);
    }

    #[test]
    fn test_shipped_config_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/config.toml");
        let config = Config::load(path).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.form.comments_table_id, "tblComent");
    }

    #[test]
    fn test_load_validated_rejects_broken_files() {
        let tmp = tempfile::TempDir::new().unwrap();

        let malformed = tmp.path().join("malformed.toml");
        fs::write(&malformed, "[harvest\ntimeout_secs = ").unwrap();
        assert!(matches!(
            Config::load_validated(&malformed),
            Err(AppError::Toml(_))
        ));

        let zero_timeout = tmp.path().join("zero.toml");
        fs::write(&zero_timeout, "[harvest]\ntimeout_secs = 0\n").unwrap();
        assert!(matches!(
            Config::load_validated(&zero_timeout),
            Err(AppError::Validation(_))
        ));

        let missing = tmp.path().join("missing.toml");
        assert!(matches!(Config::load_validated(&missing), Err(AppError::Io(_))));
    }

    #[test]
    fn test_load_or_default_on_missing_file() {
        let config = Config::load_or_default("does/not/exist.toml");
        assert_eq!(config.paths.output, PathBuf::from("data/consolidated.json"));
    }
}
