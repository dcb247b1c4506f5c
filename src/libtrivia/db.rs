use log::{debug, error, info};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::path::Path;
use std::time::{Duration, Instant};

use crate::libtrivia::error::{StoreError, ValidationError};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub label: String,
}

/// A stored trivia question, serialized in the shape the quiz client expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Question {
    pub id: i64,
    #[serde(rename = "question")]
    pub text: String,
    pub answer: String,
    #[serde(rename = "category")]
    pub category_id: i64,
    pub difficulty: i64,
}

/// A question that passed validation and may be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuestion {
    text: String,
    answer: String,
    category_id: i64,
    difficulty: i64,
}

impl NewQuestion {
    pub const MIN_DIFFICULTY: i64 = 1;
    pub const MAX_DIFFICULTY: i64 = 5;

    pub fn new(
        text: String,
        answer: String,
        category_id: i64,
        difficulty: i64,
    ) -> Result<NewQuestion, ValidationError> {
        if text.is_empty() {
            return Err(ValidationError::MissingText);
        }
        if answer.is_empty() {
            return Err(ValidationError::MissingAnswer);
        }
        if !(Self::MIN_DIFFICULTY..=Self::MAX_DIFFICULTY).contains(&difficulty) {
            return Err(ValidationError::DifficultyOutOfRange(difficulty));
        }
        Ok(NewQuestion {
            text,
            answer,
            category_id,
            difficulty,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn category_id(&self) -> i64 {
        self.category_id
    }

    pub fn difficulty(&self) -> i64 {
        self.difficulty
    }
}

impl Category {
    pub fn get_all(connection: &Connection) -> Result<Vec<Category>, StoreError> {
        let mut statement = connection.prepare("SELECT id, type FROM categories ORDER BY id")?;
        let rows = statement.query_map([], |row| {
            Ok(Category {
                id: row.get(0)?,
                label: row.get(1)?,
            })
        })?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Inserts a category, letting SQLite pick the id when `id` is `None`.
    pub fn insert(connection: &Connection, id: Option<i64>, label: &str) -> Result<i64, StoreError> {
        match connection.execute(
            "INSERT INTO categories(id, type) VALUES (?1, ?2)",
            params![id, label],
        ) {
            Ok(_) => {
                let id = connection.last_insert_rowid();
                debug!("[DB] Created new Category {} '{}'", id, label);
                Ok(id)
            }
            Err(err) => {
                error!("[DB] Error while creating new Category: {:?}", err);
                Err(err.into())
            }
        }
    }
}

impl Question {
    const COLUMNS: &'static str = "id, question, answer, category, difficulty";

    fn from_row(row: &Row) -> rusqlite::Result<Question> {
        Ok(Question {
            id: row.get(0)?,
            text: row.get(1)?,
            answer: row.get(2)?,
            category_id: row.get(3)?,
            difficulty: row.get(4)?,
        })
    }

    pub fn get_all(connection: &Connection) -> Result<Vec<Question>, StoreError> {
        let mut statement =
            connection.prepare(&format!("SELECT {} FROM questions ORDER BY id", Self::COLUMNS))?;
        let rows = statement.query_map([], Self::from_row)?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_in_category(connection: &Connection, category_id: i64) -> Result<Vec<Question>, StoreError> {
        let mut statement = connection.prepare(&format!(
            "SELECT {} FROM questions WHERE category = :category ORDER BY id",
            Self::COLUMNS
        ))?;
        let rows = statement.query_map(&[(":category", &category_id)], Self::from_row)?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Questions whose text contains `term`, ignoring case.
    ///
    /// SQLite's `LIKE` only folds ASCII, so matching happens on the fetched rows.
    pub fn search(connection: &Connection, term: &str) -> Result<Vec<Question>, StoreError> {
        let needle = term.to_lowercase();
        let mut questions = Self::get_all(connection)?;
        questions.retain(|question| question.text.to_lowercase().contains(&needle));
        debug!("[DB] Search {:?} matched {} questions", term, questions.len());

        Ok(questions)
    }

    pub fn get_by_id(connection: &Connection, id: i64) -> Result<Option<Question>, StoreError> {
        let mut statement = connection.prepare(&format!(
            "SELECT {} FROM questions WHERE id = :id LIMIT 1",
            Self::COLUMNS
        ))?;
        let row = statement
            .query_row(&[(":id", &id)], Self::from_row)
            .optional()?;

        Ok(row)
    }

    /// Writes one row without opening a transaction of its own.
    pub(crate) fn insert_row(
        connection: &Connection,
        id: Option<i64>,
        new: &NewQuestion,
    ) -> Result<Question, StoreError> {
        match connection.execute(
            "INSERT INTO questions(id, question, answer, category, difficulty) \
            VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, new.text, new.answer, new.category_id, new.difficulty],
        ) {
            Ok(_) => {
                let id = connection.last_insert_rowid();
                debug!("[DB] Created new Question {} in Category {}", id, new.category_id);
                Ok(Question {
                    id,
                    text: new.text.clone(),
                    answer: new.answer.clone(),
                    category_id: new.category_id,
                    difficulty: new.difficulty,
                })
            }
            Err(err) => {
                error!("[DB] Error while creating new Question: {:?}", err);
                Err(err.into())
            }
        }
    }

    pub fn insert(connection: &mut Connection, new: &NewQuestion) -> Result<Question, StoreError> {
        let tx = connection.transaction()?;
        let question = Self::insert_row(&tx, None, new)?;
        tx.commit()?;

        Ok(question)
    }

    /// Deletes the question with `id`. Returns `false` when no such row exists.
    pub fn delete(connection: &mut Connection, id: i64) -> Result<bool, StoreError> {
        let tx = connection.transaction()?;
        let affected = match tx.execute("DELETE FROM questions WHERE id = ?1", params![id]) {
            Ok(affected) => affected,
            Err(err) => {
                error!("[DB] Error while deleting Question {}: {:?}", id, err);
                return Err(err.into());
            }
        };
        if affected == 0 {
            tx.rollback()?;
            debug!("[DB] No Question {} to delete", id);
            return Ok(false);
        }
        tx.commit()?;
        debug!("[DB] Deleted Question {}", id);

        Ok(true)
    }
}

/// Opens (creating if needed) the database file behind a connection pool.
pub fn create_or_open(src: &Path) -> Result<DbPool, StoreError> {
    let now = Instant::now();
    if src.exists() {
        info!("[DB] Opening existing Database at {:?}", src);
    } else {
        info!("[DB] Creating new Database at {:?}", src);
    }
    // Concurrent writers wait for the lock instead of failing straight away.
    let manager = SqliteConnectionManager::file(src)
        .with_init(|c| c.busy_timeout(Duration::from_secs(3)));
    let pool = Pool::builder().build(manager)?;
    init_db(&*pool.get()?)?;
    debug!("[DB] Opening took {} ms.", now.elapsed().as_millis());

    Ok(pool)
}

/// A pool over a single in-memory connection that is never recycled.
pub fn open_in_memory() -> Result<DbPool, StoreError> {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder()
        .max_size(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .build(manager)?;
    init_db(&*pool.get()?)?;

    Ok(pool)
}

/// Removes every row from both tables.
pub fn clear(connection: &Connection) -> Result<(), StoreError> {
    connection.execute_batch("DELETE FROM questions; DELETE FROM categories;")?;
    info!("[DB] Cleared all categories and questions");

    Ok(())
}

fn init_db(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS categories (
              id INTEGER NOT NULL PRIMARY KEY,
              type TEXT NOT NULL
            )",
        (),
    )?;
    debug!("[DB INIT] Ensured table categories");
    conn.execute(
        "CREATE TABLE IF NOT EXISTS questions (
              id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
              question TEXT NOT NULL,
              answer TEXT NOT NULL,
              category INTEGER NOT NULL,
              difficulty INTEGER NOT NULL
            )",
        (),
    )?;
    debug!("[DB INIT] Ensured table questions");
    conn.execute(
        "CREATE INDEX IF NOT EXISTS questions_category_idx ON questions(category)",
        (),
    )?;
    debug!("[DB INIT] Ensured index questions_category_idx");

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::libtrivia::interchange::{self, TriviaJson};

    pub(crate) const FIXTURE: &str = include_str!("../../fixtures/trivia.json");

    pub(crate) fn seeded_pool() -> DbPool {
        let pool = open_in_memory().unwrap();
        let content: TriviaJson = serde_json::from_str(FIXTURE).unwrap();
        interchange::import(&mut pool.get().unwrap(), &content, false).unwrap();
        pool
    }

    #[test]
    fn lists_are_ordered_by_id() {
        let pool = seeded_pool();
        let conn = pool.get().unwrap();
        let questions = Question::get_all(&conn).unwrap();
        assert_eq!(questions.len(), 19);
        assert!(questions.windows(2).all(|pair| pair[0].id < pair[1].id));
        assert_eq!(Category::get_all(&conn).unwrap().len(), 6);
    }

    #[test]
    fn filters_by_category() {
        let pool = seeded_pool();
        let conn = pool.get().unwrap();
        let ids: Vec<i64> = Question::get_in_category(&conn, 6)
            .unwrap()
            .iter()
            .map(|q| q.id)
            .collect();
        assert_eq!(ids, vec![10, 11]);
        assert!(Question::get_in_category(&conn, 42).unwrap().is_empty());
    }

    #[test]
    fn search_ignores_case() {
        let pool = seeded_pool();
        let conn = pool.get().unwrap();
        let lower = Question::search(&conn, "tom").unwrap();
        let upper = Question::search(&conn, "TOM").unwrap();
        assert_eq!(lower.len(), 1);
        assert_eq!(lower, upper);
        assert!(lower[0].text.contains("Tom Hanks"));
        assert!(Question::search(&conn, "noSearchTermMatches").unwrap().is_empty());
    }

    #[test]
    fn search_treats_wildcards_literally() {
        let pool = seeded_pool();
        let conn = pool.get().unwrap();
        assert!(Question::search(&conn, "%").unwrap().is_empty());
        assert!(Question::search(&conn, "_").unwrap().is_empty());
    }

    #[test]
    fn insert_appends_after_highest_id() {
        let pool = seeded_pool();
        let mut conn = pool.get().unwrap();
        let new = NewQuestion::new("Test question?".into(), "Test".into(), 2, 3).unwrap();
        let created = Question::insert(&mut conn, &new).unwrap();
        assert!(created.id > 23);
        let all = Question::get_all(&conn).unwrap();
        assert_eq!(all.last(), Some(&created));
    }

    #[test]
    fn delete_reports_missing_rows() {
        let pool = seeded_pool();
        let mut conn = pool.get().unwrap();
        assert!(Question::delete(&mut conn, 5).unwrap());
        assert_eq!(Question::get_by_id(&conn, 5).unwrap(), None);
        assert!(!Question::delete(&mut conn, 5).unwrap());
        assert!(!Question::delete(&mut conn, 100).unwrap());
        assert_eq!(Question::get_all(&conn).unwrap().len(), 18);
    }

    #[test]
    fn new_question_rejects_invalid_fields() {
        assert_eq!(
            NewQuestion::new("".into(), "a".into(), 1, 1),
            Err(ValidationError::MissingText)
        );
        assert_eq!(
            NewQuestion::new("q".into(), "".into(), 1, 1),
            Err(ValidationError::MissingAnswer)
        );
        assert!(NewQuestion::new(" ".into(), "  ".into(), 1, 1).is_ok());
        assert_eq!(
            NewQuestion::new("q".into(), "a".into(), 1, 0),
            Err(ValidationError::DifficultyOutOfRange(0))
        );
        assert_eq!(
            NewQuestion::new("q".into(), "a".into(), 1, 6),
            Err(ValidationError::DifficultyOutOfRange(6))
        );
        assert!(NewQuestion::new("q".into(), "a".into(), 1, 5).is_ok());
    }

    #[test]
    fn file_database_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trivia.db");
        {
            let pool = create_or_open(&path).unwrap();
            let conn = pool.get().unwrap();
            Category::insert(&conn, Some(1), "Science").unwrap();
        }
        let pool = create_or_open(&path).unwrap();
        let conn = pool.get().unwrap();
        assert_eq!(
            Category::get_all(&conn).unwrap(),
            vec![Category {
                id: 1,
                label: "Science".into()
            }]
        );
    }
}
