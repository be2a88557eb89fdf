use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Content;

/// A single result row keyed by column name.
pub type Row = Map<String, Value>;

/// Every response is a mapping `{answer: ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub answer: Answer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Message(String),
    Rows(Vec<Row>),
}

impl Response {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            answer: Answer::Message(message.into()),
        }
    }

    pub fn rows(rows: Vec<Row>) -> Self {
        Self {
            answer: Answer::Rows(rows),
        }
    }
}

impl From<Response> for Content {
    fn from(response: Response) -> Self {
        // Strings and maps with string keys always serialize.
        Content::Json(serde_json::to_value(response).unwrap_or_default())
    }
}

impl TryFrom<Content> for Response {
    type Error = Content;

    fn try_from(content: Content) -> Result<Self, Self::Error> {
        let parsed = match &content {
            Content::Json(value) => Response::deserialize(value).ok(),
            _ => None,
        };
        parsed.ok_or(content)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn message_response_content() {
        let content: Content = Response::message("Wrong request content.").into();
        assert_eq!(content, Content::Json(json!({"answer": "Wrong request content."})));
    }

    #[test]
    fn rows_response_content() {
        let mut row = Row::new();
        row.insert("title".into(), json!("Pulp Fiction"));

        let content: Content = Response::rows(vec![row]).into();
        assert_eq!(content, Content::Json(json!({"answer": [{"title": "Pulp Fiction"}]})));
    }

    #[test]
    fn response_from_json_content() {
        let response = Response::try_from(Content::Json(json!({"answer": []}))).unwrap();
        assert_eq!(response, Response::rows(vec![]));

        assert!(Response::try_from(Content::Text("answer".into())).is_err());

        let unexpected = Content::Json(json!({"result": 1}));
        assert_eq!(Response::try_from(unexpected.clone()), Err(unexpected));
    }
}
