// src/storage/csv_sink.rs

//! CSV extract sink.
//!
//! Opens the extract in append mode. The header is written once, before the
//! first row, and only when the file was empty or absent, so an interrupted
//! run can be resumed into the same file. A file left ending mid-row gets a
//! line break before the next batch.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{Record, Target};
use crate::storage::ResultSink;

struct SinkState {
    file: File,
    header_pending: bool,
    /// The file does not end with a line break
    line_open: bool,
    rows_written: usize,
}

impl SinkState {
    /// Everything one append writes, as a single buffer.
    fn frame(&self, header: &[u8], rows: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(header.len() + rows.len() + 1);
        if self.line_open {
            bytes.push(b'\n');
        }
        if self.header_pending {
            bytes.extend_from_slice(header);
        }
        bytes.extend_from_slice(rows);
        bytes
    }

    /// Record a failed write. `len` is the file length afterwards, if known.
    fn after_failure(&mut self, len: Option<u64>) {
        if len == Some(0) {
            return;
        }
        self.header_pending = false;
        self.line_open = true;
    }
}

/// Concurrency-safe, resumable CSV writer for one target's extract.
pub struct CsvSink {
    target: Target,
    path: PathBuf,
    state: Mutex<SinkState>,
}

impl CsvSink {
    /// Open (or create) the extract at `path` for `target` rows.
    pub async fn open(path: impl AsRef<Path>, target: Target) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .await?;
        let len = file.metadata().await?.len();
        let header_pending = len == 0;
        let line_open = len > 0 && !ends_with_newline(&mut file).await?;

        if line_open {
            log::warn!("Extract {} ends mid-row; resuming on a new line", path.display());
        } else if !header_pending {
            log::info!("Resuming extract {} (header already present)", path.display());
        }

        Ok(Self {
            target,
            path,
            state: Mutex::new(SinkState {
                file,
                header_pending,
                line_open,
                rows_written: 0,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn target(&self) -> Target {
        self.target
    }

    /// Rows appended through this sink since it was opened.
    pub async fn rows_written(&self) -> usize {
        self.state.lock().await.rows_written
    }

    fn encode_header(&self) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer.write_record(self.target.header())?;
        writer
            .into_inner()
            .map_err(|e| AppError::Io(e.into_error()))
    }

    fn encode_rows(&self, records: &[Record]) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        for record in records {
            if record.target() != self.target {
                return Err(AppError::validation(format!(
                    "{} row sent to {} extract",
                    record.target(),
                    self.target
                )));
            }
            writer.serialize(record)?;
        }
        writer
            .into_inner()
            .map_err(|e| AppError::Io(e.into_error()))
    }
}

async fn ends_with_newline(file: &mut File) -> Result<bool> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1)).await?;
    file.read_exact(&mut last).await?;
    Ok(last[0] == b'\n')
}

async fn write_batch(file: &mut File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.flush().await
}

#[async_trait]
impl ResultSink for CsvSink {
    async fn append(&self, records: &[Record]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        // Encode outside the lock; the critical section is a single write.
        let header = self.encode_header()?;
        let rows = self.encode_rows(records)?;

        let mut state = self.state.lock().await;
        let bytes = state.frame(&header, &rows);
        if let Err(e) = write_batch(&mut state.file, &bytes).await {
            let len = state.file.metadata().await.map(|m| m.len()).ok();
            state.after_failure(len);
            return Err(AppError::Io(e));
        }

        state.header_pending = false;
        state.line_open = false;
        state.rows_written += records.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::{CommentRow, RosterRow, SubjectSurveyRow};
    use tempfile::TempDir;

    const HEADER: &str = "period,subject_code,subject_name,question,option,vote_count\n";

    fn survey_row(subject: &str, option: &str, votes: u64) -> Record {
        Record::SubjectSurvey(SubjectSurveyRow {
            period: "2023-1".to_string(),
            subject_code: subject.to_string(),
            subject_name: format!("Subject, {subject}"),
            question: "Q1".to_string(),
            option: option.to_string(),
            vote_count: votes,
        })
    }

    #[tokio::test]
    async fn test_header_written_once_before_first_row() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out/subject_survey.csv");
        let sink = CsvSink::open(&path, Target::SubjectSurvey).await.unwrap();

        sink.append(&[]).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");

        sink.append(&[survey_row("101", "Yes", 3)]).await.unwrap();
        sink.append(&[survey_row("101", "No", 0)]).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            format!(
                "{HEADER}2023-1,101,\"Subject, 101\",Q1,Yes,3\n\
                 2023-1,101,\"Subject, 101\",Q1,No,0\n"
            )
        );
        assert_eq!(sink.rows_written().await, 2);
    }

    #[tokio::test]
    async fn test_resume_skips_header() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("subject_survey.csv");

        {
            let sink = CsvSink::open(&path, Target::SubjectSurvey).await.unwrap();
            sink.append(&[survey_row("101", "Yes", 3)]).await.unwrap();
        }
        let sink = CsvSink::open(&path, Target::SubjectSurvey).await.unwrap();
        sink.append(&[survey_row("102", "Yes", 1)]).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("period,subject_code").count(), 1);
        assert_eq!(content.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_resume_after_torn_row_starts_new_line() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("subject_survey.csv");
        std::fs::write(&path, format!("{HEADER}2023-1,101,Alg")).unwrap();

        let sink = CsvSink::open(&path, Target::SubjectSurvey).await.unwrap();
        sink.append(&[survey_row("102", "Yes", 1)]).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "2023-1,101,Alg");
        assert_eq!(lines[2], "2023-1,102,\"Subject, 102\",Q1,Yes,1");
    }

    #[tokio::test]
    async fn test_failed_write_leaves_next_batch_on_fresh_line() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("subject_survey.csv");
        let sink = CsvSink::open(&path, Target::SubjectSurvey).await.unwrap();
        sink.append(&[survey_row("101", "Yes", 3)]).await.unwrap();

        // A write that died halfway through a row.
        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("2023-1,102,\"Subj");
        std::fs::write(&path, &content).unwrap();
        sink.state
            .lock()
            .await
            .after_failure(Some(content.len() as u64));

        sink.append(&[survey_row("103", "No", 2)]).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.ends_with("2023-1,102,\"Subj\n2023-1,103,\"Subject, 103\",Q1,No,2\n"));
        assert_eq!(written.matches("period,subject_code").count(), 1);
    }

    #[tokio::test]
    async fn test_failure_on_empty_file_keeps_header_pending() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("subject_survey.csv");
        let sink = CsvSink::open(&path, Target::SubjectSurvey).await.unwrap();

        sink.state.lock().await.after_failure(Some(0));
        sink.append(&[survey_row("101", "Yes", 3)]).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(HEADER));
    }

    #[tokio::test]
    async fn test_rejects_rows_of_another_target() {
        let tmp = TempDir::new().unwrap();
        let sink = CsvSink::open(tmp.path().join("roster.csv"), Target::Roster)
            .await
            .unwrap();

        let roster = Record::Roster(RosterRow {
            period: "2023-1".to_string(),
            subject_code: "101".to_string(),
            subject_name: "Algebra".to_string(),
            teacher_name: "Gomez".to_string(),
            teacher_rank: "Titular".to_string(),
        });
        let comment = Record::Comment(CommentRow {
            period: "2023-1".to_string(),
            subject_code: "101".to_string(),
            subject_name: "Algebra".to_string(),
            commission: "C1".to_string(),
            comment: "Bien".to_string(),
        });

        assert!(sink.append(&[roster, comment]).await.is_err());
        assert_eq!(sink.rows_written().await, 0);
        assert_eq!(std::fs::read_to_string(sink.path()).unwrap(), "");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_do_not_interleave() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("subject_survey.csv");
        let sink = Arc::new(CsvSink::open(&path, Target::SubjectSurvey).await.unwrap());

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let sink = Arc::clone(&sink);
                tokio::spawn(async move {
                    let subject = format!("S{worker}");
                    let batch: Vec<_> = (0..50)
                        .map(|i| survey_row(&subject, &format!("opt{i}"), i))
                        .collect();
                    sink.append(&batch).await.unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().skip(1).collect();
        assert_eq!(lines.len(), 400);
        assert_eq!(content.matches("period,subject_code").count(), 1);

        // Each batch is contiguous in the file.
        for chunk in lines.chunks(50) {
            let subject = chunk[0].split(',').nth(1).unwrap();
            assert!(chunk.iter().all(|l| l.split(',').nth(1) == Some(subject)));
        }
    }
}
