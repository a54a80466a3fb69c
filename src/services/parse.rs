// src/services/parse.rs

//! HTML heuristics for the survey form.
//!
//! Every function takes the page body as text and returns owned data, so no
//! parsed document outlives the call.

use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{FormOption, SurveyCell};
use crate::utils::text::normalize_whitespace;

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

fn element_text(element: ElementRef<'_>) -> String {
    normalize_whitespace(&element.text().collect::<String>())
}

fn has_class(element: &ElementRef<'_>, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

/// Options of `select[name=<field>]`.
///
/// Options without a value are dropped, and so is the first option when
/// `skip_placeholder` is set.
pub fn select_options(body: &str, field: &str, skip_placeholder: bool) -> Result<Vec<FormOption>> {
    let document = Html::parse_document(body);
    let select_sel = parse_selector(&format!("select[name=\"{field}\"]"))?;
    let option_sel = parse_selector("option")?;

    let select = document
        .select(&select_sel)
        .next()
        .ok_or_else(|| AppError::missing_anchor(format!("select '{field}'"), "select"))?;

    let skip = usize::from(skip_placeholder);
    let options = select
        .select(&option_sel)
        .skip(skip)
        .filter_map(|option| {
            let value = option.value().attr("value")?.trim();
            if value.is_empty() {
                return None;
            }
            Some(FormOption::new(value, element_text(option)))
        })
        .collect();

    Ok(options)
}

/// Period options. Values containing `/` are aggregate entries, not periods.
pub fn period_options(body: &str, field: &str) -> Result<Vec<FormOption>> {
    let mut options = select_options(body, field, false)?;
    options.retain(|o| !o.value.contains('/'));
    Ok(options)
}

/// Survey cells under the `h3` titled `heading`, up to the next `h3`.
///
/// Each `div.d-flex` holds the question in its `h5`; the answers come from the
/// first following sibling `table.table`, pairing `thead th` with `tbody td`.
/// Tables whose header and value counts differ are skipped.
pub fn survey_section(body: &str, heading: &str) -> Result<Vec<SurveyCell>> {
    let document = Html::parse_document(body);
    let h3_sel = parse_selector("h3")?;
    let h5_sel = parse_selector("h5")?;
    let th_sel = parse_selector("thead th")?;
    let td_sel = parse_selector("tbody td")?;

    let title = document
        .select(&h3_sel)
        .find(|h| element_text(*h) == heading)
        .ok_or_else(|| AppError::missing_anchor(format!("section '{heading}'"), "h3"))?;

    let siblings: Vec<ElementRef<'_>> = title.next_siblings().filter_map(ElementRef::wrap).collect();
    let mut cells = Vec::new();

    for (idx, element) in siblings.iter().enumerate() {
        let name = element.value().name();
        if name == "h3" {
            break;
        }
        if name != "div" || !has_class(element, "d-flex") {
            continue;
        }
        let Some(question) = element.select(&h5_sel).next().map(element_text) else {
            continue;
        };
        let Some(table) = siblings[idx + 1..]
            .iter()
            .take_while(|s| s.value().name() != "h3")
            .find(|s| s.value().name() == "table" && has_class(s, "table"))
        else {
            continue;
        };

        let options: Vec<String> = table.select(&th_sel).map(element_text).collect();
        let counts: Vec<String> = table.select(&td_sel).map(element_text).collect();
        if options.len() != counts.len() {
            log::debug!(
                "Question '{}' has {} options but {} counts; skipping",
                question,
                options.len(),
                counts.len()
            );
            continue;
        }

        cells.extend(options.into_iter().zip(counts).map(|(option, raw_count)| {
            SurveyCell {
                question: question.clone(),
                option,
                raw_count,
            }
        }));
    }

    Ok(cells)
}

/// (commission, comment) pairs from the comments table.
///
/// The first row is the header; rows without exactly two cells are ignored.
pub fn comments(body: &str, table_id: &str) -> Result<Vec<(String, String)>> {
    let document = Html::parse_document(body);
    let table_sel = parse_selector(&format!("table[id=\"{table_id}\"]"))?;
    let tr_sel = parse_selector("tr")?;
    let td_sel = parse_selector("td")?;

    let table = document
        .select(&table_sel)
        .next()
        .ok_or_else(|| AppError::missing_anchor(format!("table '{table_id}'"), "table"))?;

    let pairs = table
        .select(&tr_sel)
        .skip(1)
        .filter_map(|row| {
            let cells: Vec<ElementRef<'_>> = row.select(&td_sel).collect();
            match cells.as_slice() {
                [commission, comment] => Some((
                    element_text(*commission),
                    comment.text().collect::<String>().trim().to_string(),
                )),
                _ => None,
            }
        })
        .collect();

    Ok(pairs)
}
