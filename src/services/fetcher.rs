// src/services/fetcher.rs

//! Page fetching for the survey form.
//!
//! Discovery calls run through an explicit session that carries the form
//! state from one cascade stage to the next. Leaf calls take only immutable
//! parameters and use their own connection.

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::models::{
    CommentRow, Config, FormConfig, FormOption, FormParams, HarvestConfig, LeafUnit, Record,
    RosterRow, Stage, SubjectSurveyRow, Target, TeacherSurveyRow,
};
use crate::services::parse;
use crate::utils::http;

/// One HTTP exchange with the survey form, parsed.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// State shared by the sequential discovery chain.
    type Session: Send;

    /// Start a discovery session.
    async fn open_session(&self) -> Result<Self::Session>;

    /// Discover the options offered at `stage` given the parent selections.
    ///
    /// A page without the expected `select` yields `AppError::MissingAnchor`.
    async fn fetch_options(
        &self,
        session: &mut Self::Session,
        stage: Stage,
        params: &FormParams,
    ) -> Result<Vec<FormOption>>;

    /// Fetch and shape the rows of one leaf unit.
    async fn fetch_rows(&self, leaf: &LeafUnit) -> Result<Vec<Record>>;
}

/// Turn a leaf page body into extract rows for the leaf's target.
pub fn shape_rows(form: &FormConfig, leaf: &LeafUnit, body: &str) -> Result<Vec<Record>> {
    let rows = match leaf.target {
        Target::SubjectSurvey => parse::survey_section(body, &form.subject_heading)?
            .into_iter()
            .map(|cell| Record::SubjectSurvey(SubjectSurveyRow::from_cell(leaf, cell)))
            .collect(),
        Target::TeacherSurvey => {
            let teacher = leaf.teacher.as_ref().ok_or_else(|| {
                AppError::validation(format!("teacher leaf without teacher: {}", leaf.describe()))
            })?;
            parse::survey_section(body, &form.teacher_heading)?
                .into_iter()
                .map(|cell| {
                    Record::TeacherSurvey(TeacherSurveyRow::from_cell(
                        leaf,
                        &teacher.option_value,
                        cell,
                    ))
                })
                .collect()
        }
        Target::Roster => parse::select_options(body, &form.teacher_field, true)?
            .into_iter()
            .map(|option| Record::Roster(RosterRow::from_teacher_value(leaf, &option.value)))
            .collect(),
        Target::Comments => parse::comments(body, &form.comments_table_id)?
            .into_iter()
            .filter_map(|(commission, text)| CommentRow::new(leaf, &commission, &text))
            .map(Record::Comment)
            .collect(),
    };
    Ok(rows)
}

/// `PageFetcher` over HTTP.
pub struct HttpFetcher {
    harvest: HarvestConfig,
    form: FormConfig,
    leaf_client: Client,
}

impl HttpFetcher {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            harvest: config.harvest.clone(),
            form: config.form.clone(),
            leaf_client: http::create_leaf_client(&config.harvest)?,
        })
    }

    fn form_pairs<'a>(&'a self, params: &'a FormParams) -> Vec<(&'a str, &'a str)> {
        [
            (self.form.period_field.as_str(), params.period.as_deref()),
            (self.form.subject_field.as_str(), params.subject.as_deref()),
            (self.form.teacher_field.as_str(), params.teacher.as_deref()),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.map(|v| (field, v)))
        .collect()
    }

    async fn send(&self, request: reqwest::RequestBuilder, context: &str) -> Result<String> {
        let response = request
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| AppError::network(context, e))?;
        http::read_utf8(response)
            .await
            .map_err(|e| AppError::network(context, e))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    type Session = Client;

    async fn open_session(&self) -> Result<Client> {
        http::create_session_client(&self.harvest)
    }

    async fn fetch_options(
        &self,
        session: &mut Client,
        stage: Stage,
        params: &FormParams,
    ) -> Result<Vec<FormOption>> {
        let context = format!("{} list {:?}", stage.as_str(), params);
        let request = match stage {
            Stage::Period => session.get(&self.harvest.url),
            Stage::Subject | Stage::Teacher => {
                session.post(&self.harvest.url).form(&self.form_pairs(params))
            }
        };
        let body = self.send(request, &context).await?;

        match stage {
            Stage::Period => parse::period_options(&body, &self.form.period_field),
            Stage::Subject => parse::select_options(&body, &self.form.subject_field, true),
            Stage::Teacher => parse::select_options(&body, &self.form.teacher_field, true),
        }
    }

    async fn fetch_rows(&self, leaf: &LeafUnit) -> Result<Vec<Record>> {
        let params = leaf.params();
        let request = self
            .leaf_client
            .post(&self.harvest.url)
            .form(&self.form_pairs(&params));
        let body = self.send(request, &leaf.describe()).await?;
        shape_rows(&self.form, leaf, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Period, Subject, Teacher};

    fn leaf(target: Target, teacher: Option<&str>) -> LeafUnit {
        let period = Period {
            id: "20231".to_string(),
            label: "2023-1".to_string(),
        };
        let subject = Subject::from_option(FormOption::new("101", "Algebra (9)"), &period);
        let teacher =
            teacher.map(|t| Teacher::from_option(FormOption::new(t, t), &subject));
        LeafUnit {
            target,
            period,
            subject,
            teacher,
        }
    }

    #[test]
    fn test_form_pairs_follow_cascade() {
        let fetcher = HttpFetcher::new(&Config::default()).unwrap();
        let params = leaf(Target::TeacherSurvey, Some("Gomez (Titular)")).params();
        assert_eq!(
            fetcher.form_pairs(&params),
            vec![
                ("anioSem", "20231"),
                ("cod", "101"),
                ("docente", "Gomez (Titular)"),
            ]
        );
        assert_eq!(
            fetcher.form_pairs(&FormParams::default()),
            Vec::<(&str, &str)>::new()
        );
    }

    #[test]
    fn test_shape_roster_rows() {
        let body = r#"
            <select name="docente">
              <option value="">Seleccione</option>
              <option value="Gomez (Titular)">Gomez (Titular)</option>
              <option value="Lopez">Lopez</option>
            </select>
        "#;
        let rows = shape_rows(&FormConfig::default(), &leaf(Target::Roster, None), body).unwrap();
        let roster: Vec<_> = rows
            .into_iter()
            .map(|r| match r {
                Record::Roster(row) => (row.teacher_name, row.teacher_rank),
                other => panic!("unexpected record {other:?}"),
            })
            .collect();
        assert_eq!(
            roster,
            vec![
                ("Gomez".to_string(), "Titular".to_string()),
                ("Lopez".to_string(), "unspecified".to_string()),
            ]
        );
    }

    #[test]
    fn test_shape_teacher_rows_keep_raw_teacher_id() {
        let body = r#"
            <h3>Respuestas sobre el docente</h3>
            <div class="d-flex"><h5>Q1</h5></div>
            <table class="table">
              <thead><tr><th>Si</th></tr></thead>
              <tbody><tr><td>4</td></tr></tbody>
            </table>
        "#;
        let rows = shape_rows(
            &FormConfig::default(),
            &leaf(Target::TeacherSurvey, Some("Gomez (Titular)")),
            body,
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        let Record::TeacherSurvey(row) = &rows[0] else {
            panic!("expected teacher survey row");
        };
        assert_eq!(row.teacher_id, "Gomez (Titular)");
        assert_eq!(row.vote_count, 4);
        assert_eq!(row.subject_name, "Algebra");
    }

    #[test]
    fn test_shape_comments_drops_blank() {
        let body = r#"
            <table id="tblComent">
              <tr><th>Comision</th><th>Comentario</th></tr>
              <tr><td>C1</td><td>Bien</td></tr>
              <tr><td>C2</td><td> </td></tr>
            </table>
        "#;
        let rows = shape_rows(&FormConfig::default(), &leaf(Target::Comments, None), body).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].target(), Target::Comments);
    }

    #[test]
    fn test_shape_without_anchor_reports_missing() {
        let err = shape_rows(
            &FormConfig::default(),
            &leaf(Target::SubjectSurvey, None),
            "<html></html>",
        )
        .unwrap_err();
        assert!(err.is_missing_anchor());
    }
}
