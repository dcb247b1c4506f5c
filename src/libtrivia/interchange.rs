use log::{error, info};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::libtrivia::db::{self, Category, NewQuestion, Question};
use crate::libtrivia::error::StoreError;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TriviaJson {
    pub categories: Vec<CategoryJson>,
    pub questions: Vec<QuestionJson>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CategoryJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "type")]
    pub label: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct QuestionJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub question: String,
    pub answer: String,
    pub category: i64,
    pub difficulty: i64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub categories: usize,
    pub questions: usize,
    pub skipped: usize,
}

/// Writes every category and valid question in one transaction.
///
/// With `refresh`, existing rows are deleted inside the same transaction.
/// Questions failing validation are logged and skipped; a storage fault
/// rolls the whole import back, the deletion included.
pub fn import(
    conn: &mut Connection,
    content: &TriviaJson,
    refresh: bool,
) -> Result<ImportSummary, StoreError> {
    let tx = conn.transaction()?;
    if refresh {
        db::clear(&tx)?;
    }
    let mut summary = ImportSummary::default();

    for category in &content.categories {
        Category::insert(&tx, category.id, &category.label)?;
        summary.categories += 1;
    }
    for question in &content.questions {
        match NewQuestion::new(
            question.question.clone(),
            question.answer.clone(),
            question.category,
            question.difficulty,
        ) {
            Ok(new) => {
                Question::insert_row(&tx, question.id, &new)?;
                summary.questions += 1;
            }
            Err(err) => {
                error!("[Import] Skipping question {:?}: {}", question, err);
                summary.skipped += 1;
            }
        }
    }

    tx.commit()?;
    info!(
        "[Import] Imported {} categories and {} questions ({} skipped)",
        summary.categories, summary.questions, summary.skipped
    );
    Ok(summary)
}

pub fn export(conn: &Connection) -> Result<TriviaJson, StoreError> {
    let categories = Category::get_all(conn)?
        .into_iter()
        .map(|category| CategoryJson {
            id: Some(category.id),
            label: category.label,
        })
        .collect();
    let questions = Question::get_all(conn)?
        .into_iter()
        .map(|question| QuestionJson {
            id: Some(question.id),
            question: question.text,
            answer: question.answer,
            category: question.category_id,
            difficulty: question.difficulty,
        })
        .collect();

    Ok(TriviaJson {
        categories,
        questions,
    })
}
