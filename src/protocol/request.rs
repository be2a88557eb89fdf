use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use super::Content;

/// Separator between category and query in a textual request.
pub const REQUEST_SEPARATOR: &str = ", ";

/// Commands understood by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Category {
    Title,
    Actor,
    Director,
    Screenplay,
    Custom,
    /// Textual request without a category separator.
    WrongRequest,
    /// Request content of a shape that is neither text nor a mapping.
    WrongType,
}

/// A request after normalisation, `{category, query}`.
///
/// The category is kept as sent so that a category outside of
/// [`Category`] can still be answered by the dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl Request {
    pub fn new(category: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            query: Some(query.into()),
        }
    }

    fn sentinel(category: Category) -> Self {
        Self {
            category: Some(category.to_string()),
            query: None,
        }
    }

    /// Split a textual request of the form `"<category>, <query>"`.
    pub fn parse(text: &str) -> Self {
        let text = strip_newlines(text);
        match text.split_once(REQUEST_SEPARATOR) {
            Some((category, query)) => Self::new(category, query),
            None => Self::sentinel(Category::WrongRequest),
        }
    }

    /// Resolve the category against the fixed table.
    pub fn category(&self) -> Option<Category> {
        self.category.as_deref()?.parse().ok()
    }
}

impl From<&Content> for Request {
    fn from(content: &Content) -> Self {
        match content {
            Content::Text(text) => Request::parse(text),
            Content::Json(Value::Object(map)) => Request {
                category: map.get("category").and_then(Value::as_str).map(String::from),
                query: map.get("query").and_then(scalar_text),
            },
            // The diagnostic for an unknown content type is a plain sentence
            // without a separator.
            Content::Unknown(_) => Request::sentinel(Category::WrongRequest),
            Content::Json(_) | Content::Binary(_) => Request::sentinel(Category::WrongType),
        }
    }
}

/// Query text of a mapping request. Numbers and booleans are taken in their
/// JSON form; null and nested values carry no query.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(_) | Value::Bool(_) => Some(value.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

pub fn strip_newlines(text: &str) -> String {
    text.replace('\n', "")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn split_category_and_query() {
        let request = Request::from(&Content::Text("director, Quentin Tarantino".into()));

        assert_eq!(request, Request::new("director", "Quentin Tarantino"));
        assert_eq!(request.category(), Some(Category::Director));
    }

    #[test]
    fn split_on_first_separator_only() {
        let request = Request::parse("custom, SELECT title, release_date FROM movies_metadata");
        assert_eq!(
            request.query.as_deref(),
            Some("SELECT title, release_date FROM movies_metadata")
        );
    }

    #[test]
    fn newlines_are_stripped() {
        let request = Request::parse("actor, John\n Travolta\n");
        assert_eq!(request, Request::new("actor", "John Travolta"));
    }

    #[test]
    fn missing_separator_is_wrong_request() {
        let request = Request::from(&Content::Text("actor".into()));

        assert_eq!(request.category.as_deref(), Some("wrong_request"));
        assert_eq!(request.query, None);
        assert_eq!(request.category(), Some(Category::WrongRequest));
    }

    #[test]
    fn unrecognised_shape_is_wrong_type() {
        let request = Request::from(&Content::Json(json!(["not a string or mapping"])));
        assert_eq!(request.category(), Some(Category::WrongType));

        let request = Request::from(&Content::Binary(b"title, Heat".to_vec()));
        assert_eq!(request.category(), Some(Category::WrongType));
    }

    #[test]
    fn mapping_is_taken_as_is() {
        let content = Content::Json(json!({"category": "title", "query": "Pulp Fiction"}));
        assert_eq!(Request::from(&content), Request::new("title", "Pulp Fiction"));
    }

    #[test]
    fn scalar_queries_become_text() {
        let content = Content::Json(json!({"category": "custom", "query": 1994}));
        assert_eq!(Request::from(&content), Request::new("custom", "1994"));

        let content = Content::Json(json!({"category": "title", "query": ["Heat"]}));
        assert_eq!(Request::from(&content).query, None);
    }

    #[test]
    fn unknown_content_is_wrong_request() {
        let request = Request::from(&Content::Unknown("xml".into()));
        assert_eq!(request.category(), Some(Category::WrongRequest));
    }

    #[test]
    fn unknown_category_does_not_resolve() {
        let request = Request::parse("genre, Thriller");
        assert_eq!(request.category.as_deref(), Some("genre"));
        assert_eq!(request.category(), None);
    }
}
