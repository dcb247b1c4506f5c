//! Decoding of JSON request bodies into typed requests.
//!
//! Bodies arrive as an already-parsed [`serde_json::Value`]; anything that is
//! not of a recognized shape is a [`PayloadError`].

use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::libtrivia::db::NewQuestion;
use crate::libtrivia::error::PayloadError;
use crate::libtrivia::quiz::QuizCategory;

const CREATE_FIELDS: [&str; 4] = ["question", "answer", "category", "difficulty"];

/// The two requests `POST /questions` serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionsPayload {
    Search(String),
    Create(NewQuestion),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizRequest {
    pub previous_questions: Vec<i64>,
    pub quiz_category: QuizCategory,
}

impl QuizRequest {
    pub fn previous_set(&self) -> HashSet<i64> {
        self.previous_questions.iter().copied().collect()
    }
}

fn as_object(body: &Value) -> Result<&Map<String, Value>, PayloadError> {
    body.as_object().ok_or(PayloadError::NotAnObject)
}

fn required<'a>(object: &'a Map<String, Value>, field: &'static str) -> Result<&'a Value, PayloadError> {
    match object.get(field) {
        None | Some(Value::Null) => Err(PayloadError::Missing(field)),
        Some(value) => Ok(value),
    }
}

fn required_str(object: &Map<String, Value>, field: &'static str) -> Result<String, PayloadError> {
    match required(object, field)? {
        Value::String(s) if !s.is_empty() => Ok(s.clone()),
        Value::String(_) => Err(PayloadError::Missing(field)),
        _ => Err(PayloadError::WrongType(field, "a string")),
    }
}

/// Accepts an integer, or a string holding one (form clients send `"2"`).
fn integer(value: &Value, field: &'static str) -> Result<i64, PayloadError> {
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or(PayloadError::WrongType(field, "an integer"))
}

impl QuestionsPayload {
    pub fn from_json(body: &Value) -> Result<QuestionsPayload, PayloadError> {
        let object = as_object(body)?;

        if let Some(term) = object.get("searchTerm") {
            return match term {
                Value::String(term) => Ok(QuestionsPayload::Search(term.clone())),
                _ => Err(PayloadError::WrongType("searchTerm", "a string")),
            };
        }
        if !CREATE_FIELDS.iter().any(|field| object.contains_key(*field)) {
            return Err(PayloadError::Unrecognized);
        }

        let text = required_str(object, "question")?;
        let answer = required_str(object, "answer")?;
        let category = integer(required(object, "category")?, "category")?;
        let difficulty = integer(required(object, "difficulty")?, "difficulty")?;
        Ok(QuestionsPayload::Create(NewQuestion::new(
            text, answer, category, difficulty,
        )?))
    }
}

impl QuizRequest {
    pub fn from_json(body: &Value) -> Result<QuizRequest, PayloadError> {
        let object = as_object(body)?;

        let previous_questions = match required(object, "previous_questions")? {
            Value::Array(items) => items
                .iter()
                .map(|item| integer(item, "previous_questions"))
                .collect::<Result<Vec<_>, _>>()?,
            _ => return Err(PayloadError::WrongType("previous_questions", "an array")),
        };

        let category = match required(object, "quiz_category")? {
            Value::Object(category) => required(category, "id")?,
            _ => return Err(PayloadError::WrongType("quiz_category", "an object")),
        };
        let quiz_category = match category {
            Value::String(s) if s.eq_ignore_ascii_case("all") => QuizCategory::All,
            other => match integer(other, "quiz_category.id")? {
                0 => QuizCategory::All,
                id => QuizCategory::Id(id),
            },
        };

        Ok(QuizRequest {
            previous_questions,
            quiz_category,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libtrivia::error::ValidationError;
    use serde_json::json;

    #[test]
    fn search_term_selects_search() {
        assert_eq!(
            QuestionsPayload::from_json(&json!({"searchTerm": "tom"})),
            Ok(QuestionsPayload::Search("tom".into()))
        );
        assert_eq!(
            QuestionsPayload::from_json(&json!({"searchTerm": 3})),
            Err(PayloadError::WrongType("searchTerm", "a string"))
        );
    }

    #[test]
    fn create_accepts_numeric_strings() {
        let payload = QuestionsPayload::from_json(&json!({
            "question": "Test question?",
            "answer": "Test",
            "difficulty": "3",
            "category": "2"
        }))
        .unwrap();
        let QuestionsPayload::Create(new) = payload else {
            panic!("expected a create payload");
        };
        assert_eq!(new.text(), "Test question?");
        assert_eq!(new.category_id(), 2);
        assert_eq!(new.difficulty(), 3);
    }

    #[test]
    fn create_rejects_bad_fields() {
        let base = json!({"question": "q", "answer": "a", "difficulty": 3, "category": 2});
        let with = |field: &str, value: Value| {
            let mut body = base.clone();
            body[field] = value;
            QuestionsPayload::from_json(&body)
        };
        assert_eq!(
            with("category", json!("notInt")),
            Err(PayloadError::WrongType("category", "an integer"))
        );
        assert_eq!(
            with("difficulty", json!("notInt")),
            Err(PayloadError::WrongType("difficulty", "an integer"))
        );
        assert_eq!(
            with("difficulty", json!(9)),
            Err(PayloadError::Invalid(ValidationError::DifficultyOutOfRange(9)))
        );
        assert_eq!(with("question", json!("")), Err(PayloadError::Missing("question")));
        assert_eq!(with("answer", Value::Null), Err(PayloadError::Missing("answer")));
    }

    #[test]
    fn unrelated_object_is_unrecognized() {
        assert_eq!(
            QuestionsPayload::from_json(&json!({"malformed": "json"})),
            Err(PayloadError::Unrecognized)
        );
        assert_eq!(
            QuestionsPayload::from_json(&json!(["searchTerm"])),
            Err(PayloadError::NotAnObject)
        );
    }

    #[test]
    fn quiz_request_decodes_category_forms() {
        let decode = |category: Value| {
            QuizRequest::from_json(&json!({"previous_questions": [1, 2], "quiz_category": category}))
                .map(|request| request.quiz_category)
        };
        assert_eq!(decode(json!({"id": 3})), Ok(QuizCategory::Id(3)));
        assert_eq!(decode(json!({"id": "3", "type": "History"})), Ok(QuizCategory::Id(3)));
        assert_eq!(decode(json!({"id": 0, "type": "click"})), Ok(QuizCategory::All));
        assert_eq!(decode(json!({"id": "all"})), Ok(QuizCategory::All));
        assert_eq!(decode(json!({})), Err(PayloadError::Missing("id")));
        assert_eq!(decode(json!(4)), Err(PayloadError::WrongType("quiz_category", "an object")));
    }

    #[test]
    fn quiz_request_requires_both_fields() {
        assert_eq!(
            QuizRequest::from_json(&json!({"previous_questions": [1, 2, 3]})),
            Err(PayloadError::Missing("quiz_category"))
        );
        assert_eq!(
            QuizRequest::from_json(&json!({"quiz_category": {"id": 1}})),
            Err(PayloadError::Missing("previous_questions"))
        );
        assert_eq!(
            QuizRequest::from_json(&json!({"previous_questions": ["x"], "quiz_category": {"id": 1}})),
            Err(PayloadError::WrongType("previous_questions", "an integer"))
        );
    }

    #[test]
    fn previous_questions_keep_their_order() {
        let request = QuizRequest::from_json(
            &json!({"previous_questions": [5, 9, 2], "quiz_category": {"id": 1}}),
        )
        .unwrap();
        assert_eq!(request.previous_questions, vec![5, 9, 2]);
        assert_eq!(request.previous_set(), HashSet::from([2, 5, 9]));
    }
}
