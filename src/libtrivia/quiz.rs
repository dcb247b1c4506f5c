use log::debug;
use rand::{rng, Rng};
use rusqlite::Connection;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::libtrivia::db::Question;
use crate::libtrivia::error::StoreError;

/// Which questions a quiz draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizCategory {
    All,
    Id(i64),
}

/// Source of the index used to pick among eligible questions.
pub trait IndexPicker: Send + Sync {
    /// Returns an index in `0..len`. `len` is never zero.
    fn pick(&self, len: usize) -> usize;
}

/// Uniform picks from the thread-local generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngPicker;

impl IndexPicker for ThreadRngPicker {
    fn pick(&self, len: usize) -> usize {
        rng().random_range(0..len)
    }
}

/// Replays a fixed sequence of picks, wrapping each into range.
#[derive(Debug)]
pub struct SequencePicker {
    sequence: Vec<usize>,
    cursor: AtomicUsize,
}

impl SequencePicker {
    pub fn new(sequence: Vec<usize>) -> SequencePicker {
        SequencePicker {
            sequence,
            cursor: AtomicUsize::new(0),
        }
    }
}

impl IndexPicker for SequencePicker {
    fn pick(&self, len: usize) -> usize {
        if self.sequence.is_empty() {
            return 0;
        }
        let at = self.cursor.fetch_add(1, Ordering::Relaxed) % self.sequence.len();
        self.sequence[at] % len
    }
}

/// Picks one question of `category` whose id is not in `previous`, or `None`
/// once every such question has been served.
pub fn next_question(
    conn: &Connection,
    category: QuizCategory,
    previous: &HashSet<i64>,
    picker: &dyn IndexPicker,
) -> Result<Option<Question>, StoreError> {
    let mut candidates = Question::get_all(conn)?;
    if let QuizCategory::Id(id) = category {
        candidates.retain(|question| question.category_id == id);
    }
    candidates.retain(|question| !previous.contains(&question.id));
    debug!(
        "[Quiz] {} unseen questions for {:?} after {} previous",
        candidates.len(),
        category,
        previous.len()
    );

    if candidates.is_empty() {
        return Ok(None);
    }
    let index = picker.pick(candidates.len());
    Ok(Some(candidates.swap_remove(index)))
}
