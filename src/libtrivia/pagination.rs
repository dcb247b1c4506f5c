use log::{debug, warn};
use rusqlite::Connection;
use std::collections::BTreeMap;

use crate::libtrivia::db::{Category, Question};
use crate::libtrivia::error::ApiError;

pub const QUESTIONS_PER_PAGE: usize = 10;

/// Which questions a listing covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    None,
    ByCategory(i64),
    BySearch(String),
}

/// One page of the filtered, id-ordered question sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub questions: Vec<Question>,
    pub total_questions: usize,
    pub categories: BTreeMap<i64, String>,
    pub current_category: i64,
}

/// Builds the id → label map. Any storage failure here is a client-visible 400.
pub fn category_map(conn: &Connection) -> Result<BTreeMap<i64, String>, ApiError> {
    match Category::get_all(conn) {
        Ok(categories) => Ok(categories
            .into_iter()
            .map(|category| (category.id, category.label))
            .collect()),
        Err(err) => {
            warn!("[Page] Cannot read categories: {}", err);
            Err(ApiError::BadRequest)
        }
    }
}

/// The `[start, end)` window of `page`, or `None` when the page lies before
/// the first row.
fn window(page: i64, page_size: usize) -> Option<(usize, usize)> {
    if page < 1 {
        return None;
    }
    let start = usize::try_from(page - 1).ok()?.checked_mul(page_size)?;
    Some((start, start.saturating_add(page_size)))
}

/// Produces page `page` of the questions selected by `filter`.
///
/// Returns `Ok(None)` when the page holds no questions, which callers report
/// as not found. An unknown category is rejected before any question is read.
pub fn paginate(
    conn: &Connection,
    page: i64,
    page_size: usize,
    filter: &Filter,
) -> Result<Option<Page>, ApiError> {
    let categories = category_map(conn)?;
    if let Filter::ByCategory(id) = filter {
        if !categories.contains_key(id) {
            debug!("[Page] Unknown category {}", id);
            return Err(ApiError::BadRequest);
        }
    }

    let questions = match filter {
        Filter::None => Question::get_all(conn)?,
        Filter::ByCategory(id) => Question::get_in_category(conn, *id)?,
        Filter::BySearch(term) => Question::search(conn, term)?,
    };
    let total_questions = questions.len();

    let selected: Vec<Question> = match window(page, page_size) {
        Some((start, end)) if start < total_questions => questions
            .into_iter()
            .skip(start)
            .take(end.min(total_questions) - start)
            .collect(),
        _ => Vec::new(),
    };
    debug!(
        "[Page] page {} of {:?}: {} of {} questions",
        page,
        filter,
        selected.len(),
        total_questions
    );
    if selected.is_empty() {
        return Ok(None);
    }

    let current_category = match filter {
        Filter::ByCategory(id) => *id,
        _ => 0,
    };
    Ok(Some(Page {
        questions: selected,
        total_questions,
        categories,
        current_category,
    }))
}
