//! CLI utilities for Kino.
//!
//! The utilities present in this module are used by the interactive client to
//! read requests from a user and turn them into frame content.
use std::io::{self, BufRead, Write};

use thiserror::Error;

use crate::protocol::{Content, ContentType};

const INSTRUCTIONS: &str = "Enter one of the phrases to download data from the server:
    title, <title>
    actor, <actor>
    director, <director>
    screenplay, <screenplay>
    custom, <custom query>
Type .exit to quit.";

#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to access terminal: {0}")]
    Io(#[from] io::Error),

    #[error("unrecognized command '{0}'")]
    UnrecognizedCommand(String),

    #[error("invalid {content_type} request: {reason}")]
    InvalidRequest {
        content_type: ContentType,
        reason: String,
    },
}

/// Possible commands from a user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Exit command `.exit`, or end of input
    Exit,
    /// Request line to send to the server
    Request(String),
}

pub fn print_instructions<W: Write>(mut writer: W) -> io::Result<()> {
    writeln!(writer, "{INSTRUCTIONS}")
}

/// Prompt user for a request or command.
pub fn prompt<R, W>(mut reader: R, mut writer: W) -> Result<Command, CliError>
where
    R: BufRead,
    W: Write,
{
    let mut s = String::default();
    write!(&mut writer, "> ")?;
    writer.flush()?;

    if reader.read_line(&mut s)? == 0 {
        return Ok(Command::Exit);
    }

    match s.trim_end() {
        ".exit" => Ok(Command::Exit),
        s if !s.starts_with('.') => Ok(Command::Request(s.to_string())),
        s => Err(CliError::UnrecognizedCommand(s.to_string())),
    }
}

/// Build request content of the requested type from a line of user input.
pub fn request_content(line: &str, content_type: &ContentType) -> Result<Content, CliError> {
    match content_type {
        ContentType::Text => Ok(Content::Text(line.to_string())),
        ContentType::Json => serde_json::from_str(line)
            .map(Content::Json)
            .map_err(|e| CliError::InvalidRequest {
                content_type: content_type.clone(),
                reason: e.to_string(),
            }),
        ContentType::Binary => Ok(Content::Binary(line.as_bytes().to_vec())),
        ContentType::Other(_) => Err(CliError::InvalidRequest {
            content_type: content_type.clone(),
            reason: "unsupported content type".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn prompt_prints_correctly() {
        let input = b".exit\n";
        let mut output = Vec::new();

        prompt(&input[..], &mut output).unwrap();

        let output = String::from_utf8(output).expect("not valid UTF-8");
        assert_eq!("> ", output);
    }

    #[test]
    fn prompt_handles_requests() {
        let input = b"actor, John Travolta\n";
        let mut output = Vec::new();

        let res = prompt(&input[..], &mut output).unwrap();
        assert_eq!(Command::Request("actor, John Travolta".to_string()), res);
    }

    #[test]
    fn prompt_exits_on_end_of_input() {
        let mut output = Vec::new();

        let res = prompt(&b""[..], &mut output).unwrap();
        assert_eq!(Command::Exit, res);
    }

    #[test]
    #[should_panic(expected = "UnrecognizedCommand")]
    fn prompt_unrecognized_command() {
        let input = b".something_wrong\n";
        let mut output = Vec::new();

        prompt(&input[..], &mut output).unwrap();
    }

    #[test]
    fn instructions_list_categories() {
        let mut output = Vec::new();
        print_instructions(&mut output).unwrap();

        let output = String::from_utf8(output).unwrap();
        for category in ["title", "actor", "director", "screenplay", "custom"] {
            assert!(output.contains(&format!("{category}, <")));
        }
    }

    #[test]
    fn json_requests_are_parsed() {
        let content =
            request_content(r#"{"category": "title", "query": "Heat"}"#, &ContentType::Json).unwrap();
        assert_eq!(content, Content::Json(json!({"category": "title", "query": "Heat"})));

        assert!(request_content("title, Heat", &ContentType::Json).is_err());
    }
}
