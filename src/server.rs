//! HTTP surface: routes, shared state, and the JSON error envelope.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Path, Query, State};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use log::{debug, error, info};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{json, Value};
use std::num::IntErrorKind;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::libtrivia::db::{DbPool, Question};
use crate::libtrivia::error::{ApiError, StoreError};
use crate::libtrivia::pagination::{category_map, paginate, Filter, Page};
use crate::libtrivia::payload::{QuestionsPayload, QuizRequest};
use crate::libtrivia::quiz::{next_question, IndexPicker};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub page_size: usize,
    pub picker: Arc<dyn IndexPicker>,
}

impl AppState {
    pub fn new(pool: DbPool, page_size: usize, picker: Arc<dyn IndexPicker>) -> AppState {
        AppState {
            pool,
            page_size,
            picker,
        }
    }

    /// Runs `work` on a pooled connection off the async runtime. The
    /// connection goes back to the pool when `work` returns, whatever it returns.
    async fn with_conn<T, F>(&self, work: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, ApiError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(StoreError::from)?;
            work(&mut *conn)
        })
        .await
        .map_err(|err| {
            error!("[HTTP] Blocking task failed: {}", err);
            ApiError::Internal
        })?
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Unprocessable => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "success": false,
            "error": status.as_u16(),
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!("[HTTP] Body is not JSON: {}", rejection.body_text());
        ApiError::BadRequest
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        debug!("[HTTP] Bad query string: {}", rejection.body_text());
        ApiError::BadRequest
    }
}

/// A JSON body; a wrong content type or unparsable body is a 400.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
struct AppJson<T>(T);

/// A query string; one that fails to deserialize is a 400.
#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
struct AppQuery<T>(T);

#[derive(Debug, Deserialize)]
struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    /// A missing or non-numeric page means the first page. Integers too
    /// large for `i64` saturate, so they still land past the last page.
    fn page(&self) -> i64 {
        let Some(raw) = self.page.as_deref().map(str::trim) else {
            return 1;
        };
        match raw.parse::<i64>() {
            Ok(page) => page,
            Err(err) => match err.kind() {
                IntErrorKind::PosOverflow => i64::MAX,
                IntErrorKind::NegOverflow => i64::MIN,
                _ => 1,
            },
        }
    }
}

/// Reads a non-negative integer id from the path. Anything that is not all
/// digits never names a resource; an all-digit id past `i64` yields `on_overflow`.
fn id_from_path(
    path: Result<Path<String>, PathRejection>,
    on_overflow: ApiError,
) -> Result<i64, ApiError> {
    let raw = match path {
        Ok(Path(raw)) => raw,
        Err(rejection) => {
            debug!("[HTTP] Bad id in path: {}", rejection.body_text());
            return Err(ApiError::NotFound);
        }
    };
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        debug!("[HTTP] Non-numeric id in path: {:?}", raw);
        return Err(ApiError::NotFound);
    }
    raw.parse::<i64>().map_err(|_| {
        debug!("[HTTP] Id out of range in path: {}", raw);
        on_overflow
    })
}

fn page_response(outcome: Option<Page>) -> Result<Json<Value>, ApiError> {
    let page = outcome.ok_or(ApiError::NotFound)?;
    Ok(Json(json!({
        "success": true,
        "questions": page.questions,
        "total_questions": page.total_questions,
        "categories": page.categories,
        "current_category": page.current_category,
    })))
}

async fn list_page(state: &AppState, page: i64, filter: Filter) -> Result<Json<Value>, ApiError> {
    let page_size = state.page_size;
    let outcome = state
        .with_conn(move |conn| paginate(conn, page, page_size, &filter))
        .await?;
    page_response(outcome)
}

async fn get_categories(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let categories = state.with_conn(|conn| category_map(conn)).await?;
    Ok(Json(json!({
        "success": true,
        "categories": categories,
    })))
}

async fn get_questions(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    list_page(&state, query.page(), Filter::None).await
}

async fn get_category_questions(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    // A category id nobody can have is still an unknown category.
    let id = id_from_path(path, ApiError::BadRequest)?;
    list_page(&state, query.page(), Filter::ByCategory(id)).await
}

async fn post_questions(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<PageQuery>,
    AppJson(body): AppJson<Value>,
) -> Result<Json<Value>, ApiError> {
    match QuestionsPayload::from_json(&body)? {
        QuestionsPayload::Search(term) => {
            list_page(&state, query.page(), Filter::BySearch(term)).await
        }
        QuestionsPayload::Create(new) => {
            let question = state
                .with_conn(move |conn| Ok(Question::insert(conn, &new)?))
                .await?;
            info!("[HTTP] Created question {}", question.id);
            Ok(Json(json!({
                "success": true,
                "created": question.id,
            })))
        }
    }
}

async fn delete_question(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let id = id_from_path(path, ApiError::NotFound)?;
    let deleted = state
        .with_conn(move |conn| Ok(Question::delete(conn, id)?))
        .await?;
    if !deleted {
        return Err(ApiError::NotFound);
    }
    info!("[HTTP] Deleted question {}", id);
    Ok(Json(json!({
        "success": true,
        "deleted": id,
    })))
}

async fn post_quiz(
    State(state): State<AppState>,
    AppJson(body): AppJson<Value>,
) -> Result<Json<Value>, ApiError> {
    let request = QuizRequest::from_json(&body)?;
    let previous = request.previous_set();
    let category = request.quiz_category;
    let picker = state.picker.clone();
    let question = state
        .with_conn(move |conn| Ok(next_question(conn, category, &previous, picker.as_ref())?))
        .await?;
    Ok(Json(json!({
        "success": true,
        "previousQuestions": request.previous_questions,
        "question": question,
    })))
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/categories", get(get_categories))
        .route("/categories/{id}/questions", get(get_category_questions))
        .route("/questions", get(get_questions).post(post_questions))
        .route("/questions/{id}", delete(delete_question))
        .route("/quizzes", post(post_quiz))
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(cors())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_of(raw: Option<&str>) -> i64 {
        PageQuery {
            page: raw.map(String::from),
        }
        .page()
    }

    #[test]
    fn page_parameter_forms() {
        assert_eq!(page_of(None), 1);
        assert_eq!(page_of(Some("")), 1);
        assert_eq!(page_of(Some("abc")), 1);
        assert_eq!(page_of(Some(" 3 ")), 3);
        assert_eq!(page_of(Some("-2")), -2);
        assert_eq!(page_of(Some("99999999999999999999")), i64::MAX);
        assert_eq!(page_of(Some("-99999999999999999999")), i64::MIN);
    }

    #[test]
    fn path_ids() {
        let id = |raw: &str, on_overflow| id_from_path(Ok(Path(raw.to_string())), on_overflow);
        assert!(matches!(id("42", ApiError::NotFound), Ok(42)));
        assert!(matches!(id("abc", ApiError::BadRequest), Err(ApiError::NotFound)));
        assert!(matches!(id("-1", ApiError::BadRequest), Err(ApiError::NotFound)));
        assert!(matches!(
            id("99999999999999999999", ApiError::BadRequest),
            Err(ApiError::BadRequest)
        ));
        assert!(matches!(
            id("99999999999999999999", ApiError::NotFound),
            Err(ApiError::NotFound)
        ));
    }
}
