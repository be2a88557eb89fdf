//! Request dispatching.
//!
//! The [`Dispatcher`] turns a decoded request into a [`Response`]. Requests
//! are normalised into `{category, query}` first (see [`Request`]), then the
//! category selects a handler from a fixed table:
//!
//! - `title`, `actor`, `director`, `screenplay`: a query template filled in
//!   with the request's query text.
//! - `custom`: the request's query text is run as is.
//! - `wrong_request`, `wrong_type`: a diagnostic answer, no query is run.
//!
//! A category outside of this table is answered with
//! `"The request can not be processed."`. The peer is always owed exactly one
//! response, so none of these cases are errors.
//!
//! Query text is interpolated into the templates without any escaping, which
//! keeps answers identical to existing deployments. Callers exposing the
//! server to untrusted peers must account for this.
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::{debug, trace};
use serde_json::Value;

use crate::{
    executor::{ExecutorError, QueryExecutor, Row},
    protocol::{Category, Content, Request, Response, request::strip_newlines},
};

pub const UNPROCESSABLE: &str = "The request can not be processed.";
pub const WRONG_REQUEST: &str = "Wrong request content.";
pub const WRONG_TYPE: &str = "Wrong request type. Required type: text or JSON.";

const RELEASE_DATE: &str = "release_date";
const RELEASE_DATE_FORMAT: &str = "%d-%b-%Y";

/// Outcome of a category handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Run the query and answer with its rows.
    Query(String),
    /// Answer with a fixed message.
    Reply(&'static str),
}

impl Category {
    pub fn handler(self) -> fn(&str) -> Action {
        match self {
            Category::Title => by_title,
            Category::Actor => by_actor,
            Category::Director => by_director,
            Category::Screenplay => by_screenplay,
            Category::Custom => custom,
            Category::WrongRequest => wrong_request,
            Category::WrongType => wrong_type,
        }
    }

    /// Sentinel categories never carry a query.
    pub fn is_sentinel(self) -> bool {
        matches!(self, Category::WrongRequest | Category::WrongType)
    }
}

fn by_title(title: &str) -> Action {
    Action::Query(format!(
        "SELECT * FROM movies_metadata movies
        WHERE movies.title = '{title}'"
    ))
}

fn by_actor(actor: &str) -> Action {
    Action::Query(format!(
        "SELECT title FROM movies_metadata movies
        INNER JOIN characters ON characters.movie_id = movies.id
        INNER JOIN actors ON actors.id = characters.actor_id
        WHERE actors.name = '{actor}'"
    ))
}

fn by_director(director: &str) -> Action {
    Action::Query(format!(
        "SELECT title FROM movies_metadata movies
        INNER JOIN crew ON crew.movie_id = movies.id
        INNER JOIN crew_members ON crew_members.id = crew.crew_member_id
        WHERE crew.job = 'Director'
        AND crew_members.name = '{director}'"
    ))
}

fn by_screenplay(screenplay: &str) -> Action {
    Action::Query(format!(
        "SELECT title FROM movies_metadata movies
        INNER JOIN crew ON crew.movie_id = movies.id
        INNER JOIN crew_members ON crew_members.id = crew.crew_member_id
        WHERE crew.department = 'Writing'
        AND crew_members.name = '{screenplay}'"
    ))
}

fn custom(query: &str) -> Action {
    Action::Query(strip_newlines(query))
}

fn wrong_request(_: &str) -> Action {
    Action::Reply(WRONG_REQUEST)
}

fn wrong_type(_: &str) -> Action {
    Action::Reply(WRONG_TYPE)
}

pub struct Dispatcher<E> {
    executor: E,
}

impl<E: QueryExecutor> Dispatcher<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Answer decoded request content.
    pub fn dispatch(&self, content: &Content) -> Result<Response, ExecutorError> {
        let request = Request::from(content);
        trace!("normalised request: {request:?}");
        self.handle(&request)
    }

    /// Answer a normalised request. Only executor failures are errors.
    pub fn handle(&self, request: &Request) -> Result<Response, ExecutorError> {
        let Some(category) = request.category() else {
            debug!("no handler for category {:?}", request.category);
            return Ok(Response::message(UNPROCESSABLE));
        };

        let query = match (category.is_sentinel(), request.query.as_deref()) {
            (true, query) => query.unwrap_or_default(),
            (false, Some(query)) => query,
            (false, None) => {
                debug!("{category} request without a query");
                return Ok(Response::message(UNPROCESSABLE));
            }
        };

        match category.handler()(query) {
            Action::Reply(message) => Ok(Response::message(message)),
            Action::Query(query) => {
                debug!("executing {category} query");
                let rows = self.executor.execute(&query)?;
                Ok(Response::rows(rows.into_iter().map(format_row).collect()))
            }
        }
    }
}

/// Rewrite a row's `release_date`, if present and recognisable, as `DD-Mon-YYYY`.
pub fn format_row(mut row: Row) -> Row {
    let formatted = match row.get(RELEASE_DATE) {
        Some(Value::String(raw)) => parse_date(raw),
        _ => None,
    };
    if let Some(date) = formatted {
        row.insert(
            RELEASE_DATE.to_string(),
            Value::String(date.format(RELEASE_DATE_FORMAT).to_string()),
        );
    }
    row
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::protocol::Answer;

    #[derive(Default)]
    struct FakeExecutor {
        rows: Vec<Row>,
        queries: Mutex<Vec<String>>,
        fail: bool,
    }

    impl FakeExecutor {
        fn returning(rows: Value) -> Self {
            let rows = match rows {
                Value::Array(rows) => rows
                    .into_iter()
                    .filter_map(|r| match r {
                        Value::Object(map) => Some(map),
                        _ => None,
                    })
                    .collect(),
                _ => vec![],
            };
            Self {
                rows,
                ..Default::default()
            }
        }

        fn queries(&self) -> Vec<String> {
            self.queries.lock().unwrap().clone()
        }
    }

    impl QueryExecutor for FakeExecutor {
        fn execute(&self, query: &str) -> Result<Vec<Row>, ExecutorError> {
            self.queries.lock().unwrap().push(query.to_string());
            if self.fail {
                return Err(ExecutorError::PoolPoisoned);
            }
            Ok(self.rows.clone())
        }
    }

    fn text(request: &str) -> Content {
        Content::Text(request.to_string())
    }

    #[test]
    fn custom_query_returns_rows() {
        let dispatcher = Dispatcher::new(FakeExecutor::returning(json!([{"title": "Pulp Fiction"}])));

        let response = dispatcher
            .dispatch(&text("custom, SELECT title FROM movies WHERE title='Pulp Fiction'"))
            .unwrap();

        assert_eq!(
            Content::from(response),
            Content::Json(json!({"answer": [{"title": "Pulp Fiction"}]}))
        );
        assert_eq!(
            dispatcher.executor.queries(),
            vec!["SELECT title FROM movies WHERE title='Pulp Fiction'"]
        );
    }

    #[test]
    fn director_template_contains_name() {
        let dispatcher = Dispatcher::new(FakeExecutor::default());
        dispatcher.dispatch(&text("director, Quentin Tarantino")).unwrap();

        let queries = dispatcher.executor.queries();
        assert_eq!(queries.len(), 1);
        assert!(queries[0].contains("crew.job = 'Director'"));
        assert!(queries[0].contains("crew_members.name = 'Quentin Tarantino'"));
    }

    #[test]
    fn templates_per_category() {
        assert!(matches!(
            Category::Title.handler()("Heat"),
            Action::Query(q) if q.contains("movies.title = 'Heat'")
        ));
        assert!(matches!(
            Category::Actor.handler()("Pam Grier"),
            Action::Query(q) if q.contains("actors.name = 'Pam Grier'")
        ));
        assert!(matches!(
            Category::Screenplay.handler()("Roger Avary"),
            Action::Query(q) if q.contains("crew.department = 'Writing'")
        ));
    }

    #[test]
    fn sentinels_skip_the_executor() {
        let dispatcher = Dispatcher::new(FakeExecutor::default());

        let response = dispatcher.dispatch(&text("actor")).unwrap();
        assert_eq!(response, Response::message(WRONG_REQUEST));

        let response = dispatcher.dispatch(&Content::Binary(vec![1, 2, 3])).unwrap();
        assert_eq!(response, Response::message(WRONG_TYPE));

        assert!(dispatcher.executor.queries().is_empty());
    }

    #[test]
    fn unknown_category_is_not_processed() {
        let dispatcher = Dispatcher::new(FakeExecutor::default());

        let response = dispatcher.dispatch(&text("genre, Thriller")).unwrap();
        assert_eq!(response, Response::message(UNPROCESSABLE));

        let response = dispatcher.dispatch(&Content::Json(json!({"query": "x"}))).unwrap();
        assert_eq!(response, Response::message(UNPROCESSABLE));

        assert!(dispatcher.executor.queries().is_empty());
    }

    #[test]
    fn mapping_without_query_is_not_processed() {
        let dispatcher = Dispatcher::new(FakeExecutor::default());

        let response = dispatcher.dispatch(&Content::Json(json!({"category": "custom"}))).unwrap();
        assert_eq!(response, Response::message(UNPROCESSABLE));
    }

    #[test]
    fn release_dates_are_reformatted() {
        let dispatcher = Dispatcher::new(FakeExecutor::returning(json!([
            {"title": "Pulp Fiction", "release_date": "1994-09-10"},
            {"title": "Death Proof", "release_date": "2007-04-06 00:00:00"},
            {"title": "Unreleased", "release_date": "soon"},
        ])));

        let response = dispatcher.dispatch(&text("actor, Kurt Russell")).unwrap();
        let Answer::Rows(rows) = response.answer else {
            panic!("expected rows");
        };

        assert_eq!(rows[0][RELEASE_DATE], json!("10-Sep-1994"));
        assert_eq!(rows[0]["title"], json!("Pulp Fiction"));
        assert_eq!(rows[1][RELEASE_DATE], json!("06-Apr-2007"));
        assert_eq!(rows[2][RELEASE_DATE], json!("soon"));
    }

    #[test]
    fn executor_failures_are_returned() {
        let executor = FakeExecutor {
            fail: true,
            ..Default::default()
        };
        let dispatcher = Dispatcher::new(executor);

        assert!(dispatcher.dispatch(&text("title, Heat")).is_err());
    }
}
