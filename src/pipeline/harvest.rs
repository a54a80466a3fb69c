// src/pipeline/harvest.rs

//! Cascading harvester.
//!
//! Discovery (period, then subject, then teacher) runs sequentially through
//! one session. The leaf units it yields are fetched on a bounded pool, and
//! every batch of rows goes straight to the sink.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};

use crate::error::{AppError, Result};
use crate::models::{
    Config, FormOption, FormParams, LeafUnit, Period, PeriodScope, Stage, Subject, Target,
    Teacher,
};
use crate::services::{HttpFetcher, PageFetcher};
use crate::storage::{CsvSink, ResultSink};

/// Knobs for one harvest run.
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    /// Leaf fetches in flight at once
    pub max_workers: usize,
    /// Pause before each discovery call on the sequential chain
    pub discovery_delay: Duration,
    /// Pause after each leaf fetch
    pub leaf_delay: Duration,
}

impl HarvestOptions {
    pub fn from_config(config: &Config, target: Target) -> Self {
        Self {
            max_workers: config.workers.for_target(target),
            discovery_delay: Duration::from_millis(config.harvest.discovery_delay_ms),
            leaf_delay: Duration::from_millis(config.harvest.leaf_delay_ms),
        }
    }
}

/// A unit of work that produced nothing because it failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedUnit {
    pub unit: String,
    pub reason: String,
}

/// Outcome of one harvest run.
#[derive(Debug, Clone)]
pub struct HarvestReport {
    pub target: Target,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub periods: usize,
    pub subjects: usize,
    pub leaves_total: usize,
    pub leaves_failed: usize,
    /// Leaves whose page had no data
    pub leaves_empty: usize,
    pub rows_written: usize,
    pub skipped: Vec<SkippedUnit>,
}

impl HarvestReport {
    fn new(target: Target, start_time: DateTime<Utc>) -> Self {
        Self {
            target,
            start_time,
            end_time: start_time,
            periods: 0,
            subjects: 0,
            leaves_total: 0,
            leaves_failed: 0,
            leaves_empty: 0,
            rows_written: 0,
            skipped: Vec::new(),
        }
    }

    fn skip(&mut self, unit: String, error: &AppError) {
        log::warn!("Skipping {}: {}", unit, error);
        self.skipped.push(SkippedUnit {
            unit,
            reason: error.to_string(),
        });
    }

    pub fn duration_secs(&self) -> i64 {
        (self.end_time - self.start_time).num_seconds()
    }
}

/// One harvesting algorithm for every target.
pub struct Harvester<F: PageFetcher> {
    fetcher: F,
    options: HarvestOptions,
}

impl<F: PageFetcher> Harvester<F> {
    pub fn new(fetcher: F, options: HarvestOptions) -> Self {
        Self { fetcher, options }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn options(&self) -> &HarvestOptions {
        &self.options
    }

    /// Run the first discovery stage only.
    pub async fn discover_periods(&self, session: &mut F::Session) -> Result<Vec<Period>> {
        let options = self
            .fetcher
            .fetch_options(session, Stage::Period, &FormParams::default())
            .await
            .map_err(|e| AppError::discovery(format!("period list unavailable: {e}")))?;
        Ok(options.into_iter().map(Period::from).collect())
    }

    /// Harvest `target` for every period in `scope`, appending rows to `sink`.
    ///
    /// Only a failure to list periods is an error. Every other failure is
    /// contained to its branch or leaf and recorded in the report.
    pub async fn run(
        &self,
        target: Target,
        scope: &PeriodScope,
        sink: &dyn ResultSink,
    ) -> Result<HarvestReport> {
        let mut report = HarvestReport::new(target, Utc::now());

        let mut session = self.fetcher.open_session().await?;
        let periods = scope.resolve(self.discover_periods(&mut session).await?);
        if periods.is_empty() {
            log::warn!("No periods selected; nothing to harvest");
        }
        report.periods = periods.len();

        for period in &periods {
            let leaves = self
                .discover_leaves(&mut session, target, period, &mut report)
                .await;
            log::info!(
                "Period {}: {} leaf units, {} workers",
                period.label,
                leaves.len(),
                self.options.max_workers
            );
            self.run_leaves(leaves, sink, &mut report).await;
        }

        report.end_time = Utc::now();
        Ok(report)
    }

    async fn discover_leaves(
        &self,
        session: &mut F::Session,
        target: Target,
        period: &Period,
        report: &mut HarvestReport,
    ) -> Vec<LeafUnit> {
        let unit = format!("subject list for {}", period.label);
        let subjects: Vec<Subject> = match self
            .discover(session, Stage::Subject, &FormParams::for_period(period), unit, report)
            .await
        {
            Some(options) => options
                .into_iter()
                .map(|option| Subject::from_option(option, period))
                .collect(),
            None => return Vec::new(),
        };
        log::info!("Period {}: {} subjects", period.label, subjects.len());
        report.subjects += subjects.len();

        if !target.needs_teachers() {
            return subjects
                .into_iter()
                .map(|subject| LeafUnit {
                    target,
                    period: period.clone(),
                    subject,
                    teacher: None,
                })
                .collect();
        }

        let mut leaves = Vec::new();
        for subject in subjects {
            let unit = format!("teacher list for {} / {}", period.label, subject.id);
            let Some(options) = self
                .discover(session, Stage::Teacher, &FormParams::for_subject(&subject), unit, report)
                .await
            else {
                continue;
            };

            for option in options {
                let teacher = Teacher::from_option(option, &subject);
                leaves.push(LeafUnit {
                    target,
                    period: period.clone(),
                    subject: subject.clone(),
                    teacher: Some(teacher),
                });
            }
        }
        leaves
    }

    /// One paced discovery call. `None` means the branch yields no work.
    async fn discover(
        &self,
        session: &mut F::Session,
        stage: Stage,
        params: &FormParams,
        unit: String,
        report: &mut HarvestReport,
    ) -> Option<Vec<FormOption>> {
        if !self.options.discovery_delay.is_zero() {
            tokio::time::sleep(self.options.discovery_delay).await;
        }

        match self.fetcher.fetch_options(session, stage, params).await {
            Ok(options) => Some(options),
            Err(e) if e.is_missing_anchor() => {
                log::debug!("No {} options for {}", stage.as_str(), unit);
                None
            }
            Err(e) => {
                report.skip(unit, &e);
                None
            }
        }
    }

    async fn run_leaves(&self, leaves: Vec<LeafUnit>, sink: &dyn ResultSink, report: &mut HarvestReport) {
        report.leaves_total += leaves.len();
        let workers = self.options.max_workers.max(1);
        let delay = self.options.leaf_delay;

        let mut results = stream::iter(leaves)
            .map(|leaf| async move {
                let outcome = match self.fetcher.fetch_rows(&leaf).await {
                    Ok(rows) => sink.append(&rows).await.map(|_| rows.len()),
                    Err(e) => Err(e),
                };
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                (leaf, outcome)
            })
            .buffer_unordered(workers);

        while let Some((leaf, outcome)) = results.next().await {
            match outcome {
                Ok(0) => {
                    report.leaves_empty += 1;
                    log::debug!("{}: no rows", leaf.describe());
                }
                Ok(count) => {
                    report.rows_written += count;
                    log::debug!("{}: {} rows", leaf.describe(), count);
                }
                Err(e) if e.is_missing_anchor() => {
                    report.leaves_empty += 1;
                    log::debug!("{}: {}", leaf.describe(), e);
                }
                Err(e) => {
                    report.leaves_failed += 1;
                    report.skip(leaf.describe(), &e);
                }
            }
        }
    }
}

/// List the periods the form currently offers.
pub async fn list_periods(config: &Config) -> Result<Vec<Period>> {
    let fetcher = HttpFetcher::new(config)?;
    let harvester = Harvester::new(fetcher, HarvestOptions::from_config(config, Target::SubjectSurvey));
    let mut session = harvester.fetcher().open_session().await?;
    harvester.discover_periods(&mut session).await
}

/// Harvest `target` over HTTP into its configured extract.
pub async fn run_harvest(config: &Config, target: Target, scope: &PeriodScope) -> Result<HarvestReport> {
    let path = config.paths.extract(target);
    let sink = CsvSink::open(path, target).await?;
    let harvester = Harvester::new(
        HttpFetcher::new(config)?,
        HarvestOptions::from_config(config, target),
    );

    log::info!(
        "Harvesting {} into {} ({} workers)",
        target,
        path.display(),
        harvester.options().max_workers
    );
    let report = harvester.run(target, scope, &sink).await?;

    log::info!(
        "Harvest of {} finished in {}s: {} periods, {} subjects, {} leaves, {} rows, {} empty, {} failed",
        report.target,
        report.duration_secs(),
        report.periods,
        report.subjects,
        report.leaves_total,
        report.rows_written,
        report.leaves_empty,
        report.leaves_failed
    );
    for skipped in &report.skipped {
        log::warn!("  skipped {}: {}", skipped.unit, skipped.reason);
    }

    Ok(report)
}
