// src/pipeline/aggregate.rs

//! Folding survey rows into per-question aggregates.

use std::collections::HashMap;

use crate::models::{QuestionAggregate, Responses};

/// Fold `(question, option, count)` cells into one aggregate per question.
///
/// Questions and options keep their first-seen order. Repeated
/// (question, option) pairs are summed, so no count is ever lost.
pub fn fold_questions<'a, I>(cells: I) -> Vec<QuestionAggregate>
where
    I: IntoIterator<Item = (&'a str, &'a str, u64)>,
{
    let mut aggregates: Vec<QuestionAggregate> = Vec::new();
    let mut positions: HashMap<&'a str, usize> = HashMap::new();

    for (question, option, count) in cells {
        let idx = *positions.entry(question).or_insert_with(|| {
            aggregates.push(QuestionAggregate {
                question: question.to_string(),
                responses: Responses::default(),
            });
            aggregates.len() - 1
        });
        aggregates[idx].responses.add(option, count);
    }

    aggregates
}
