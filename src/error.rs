use ariadne::{Label, Report, ReportKind, Source};
use std::fmt;
use thiserror::Error;

/// Location of a character or token in the selector source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub offset: usize, // byte index into the source
    pub line: usize,   // 1-based
    pub column: usize, // 1-based, counted in chars
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Malformed selector text: unknown character, unterminated string, bad number.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} ({position})")]
pub struct LexError {
    pub message: String,
    pub position: Position,
}

/// A token stream that does not match the selector grammar.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} ({position})")]
pub struct ParseError {
    pub message: String,
    pub position: Position,
}

/// Any error raised while compiling a selector. Evaluation never fails.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectorError {
    #[error("lexical error: {0}")]
    Lex(#[from] LexError),
    #[error("syntax error: {0}")]
    Parse(#[from] ParseError),
}

impl SelectorError {
    pub fn message(&self) -> &str {
        match self {
            SelectorError::Lex(e) => &e.message,
            SelectorError::Parse(e) => &e.message,
        }
    }

    pub fn position(&self) -> Position {
        match self {
            SelectorError::Lex(e) => e.position,
            SelectorError::Parse(e) => e.position,
        }
    }
}

/// Prints `error` to stderr with the offending part of `source` underlined.
pub fn print_error(source: &str, error: &SelectorError) -> std::io::Result<()> {
    let source_name = "selector";
    let span = char_span(source, error.position().offset);
    let title = match error {
        SelectorError::Lex(_) => "Invalid selector",
        SelectorError::Parse(_) => "Selector syntax error",
    };

    Report::build(ReportKind::Error, (source_name, span.clone()))
        .with_message(title)
        .with_label(Label::new((source_name, span)).with_message(error.message()))
        .finish()
        .eprint((source_name, Source::from(source)))
}

/// ariadne indexes by char, positions are recorded in bytes.
fn char_span(source: &str, offset: usize) -> std::ops::Range<usize> {
    let start = source
        .char_indices()
        .take_while(|(idx, _)| *idx < offset)
        .count();
    let end = if offset < source.len() { start + 1 } else { start };
    start..end
}
