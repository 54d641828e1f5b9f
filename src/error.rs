use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use thiserror::Error;

/// Position in a source stream: character index plus 0-based line and column,
/// tagged with the stream name for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mark {
    pub name: Arc<str>,
    pub index: usize,
    pub line: usize,
    pub column: usize,
}

impl Mark {
    pub fn new(name: Arc<str>, index: usize, line: usize, column: usize) -> Self {
        Self { name, index, line, column }
    }
}

impl std::fmt::Display for Mark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "in \"{}\", line {}, column {}",
            self.name,
            self.line + 1,
            self.column + 1
        )
    }
}

/// Pipeline stage that raised the error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YamlErrorKind {
    Reader,
    Scanner,
    Parser,
    Composer,
    Constructor,
    Representer,
    Serializer,
    Emitter,
}

impl YamlErrorKind {
    pub fn label(&self) -> &'static str {
        match self {
            YamlErrorKind::Reader => "ReaderError",
            YamlErrorKind::Scanner => "ScannerError",
            YamlErrorKind::Parser => "ParserError",
            YamlErrorKind::Composer => "ComposerError",
            YamlErrorKind::Constructor => "ConstructorError",
            YamlErrorKind::Representer => "RepresenterError",
            YamlErrorKind::Serializer => "SerializerError",
            YamlErrorKind::Emitter => "EmitterError",
        }
    }
}

/// Complete YAML error with detailed position information
#[derive(Debug, Clone, Error)]
#[error("{}", self.format_message())]
pub struct YamlError {
    pub kind: YamlErrorKind,
    pub problem: String,
    pub problem_mark: Option<Mark>,
    pub context: Option<String>,
    pub context_mark: Option<Mark>,
    pub note: Option<String>,
    pub snippet: Option<String>,
}

impl YamlError {
    /// Create basic error
    pub fn new(kind: YamlErrorKind, problem: impl Into<String>) -> Self {
        Self {
            kind,
            problem: problem.into(),
            problem_mark: None,
            context: None,
            context_mark: None,
            note: None,
            snippet: None,
        }
    }

    /// Create error with position
    pub fn with_mark(kind: YamlErrorKind, problem: impl Into<String>, mark: Mark) -> Self {
        let mut err = Self::new(kind, problem);
        err.problem_mark = Some(mark);
        err
    }

    /// Generate the multi-line report pointing at the offending column
    pub fn format_message(&self) -> String {
        let mut parts = Vec::new();
        if let Some(context) = &self.context {
            parts.push(format!("{}: {}", self.kind.label(), context));
            if let Some(mark) = &self.context_mark {
                parts.push(format!("  {}", mark));
            }
            parts.push(self.problem.clone());
        } else {
            parts.push(format!("{}: {}", self.kind.label(), self.problem));
        }
        if let Some(mark) = &self.problem_mark {
            parts.push(format!("  {}", mark));
            if let Some(snippet) = &self.snippet {
                parts.push(format!("    {}", snippet));
                parts.push(format!("    {}^", " ".repeat(mark.column)));
            }
        }
        if let Some(note) = &self.note {
            parts.push(format!("  note: {}", note));
        }
        parts.join("\n")
    }
}

/// Crate-wide result alias
pub type YamlResult<T> = Result<T, YamlError>;

/// Builder to construct errors with full context
pub struct YamlErrorBuilder {
    error: YamlError,
}

impl YamlErrorBuilder {
    pub fn new(kind: YamlErrorKind, problem: impl Into<String>) -> Self {
        Self { error: YamlError::new(kind, problem) }
    }

    pub fn problem_mark(mut self, mark: Mark) -> Self {
        self.error.problem_mark = Some(mark);
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.error.context = Some(context.into());
        self
    }

    pub fn context_mark(mut self, mark: Mark) -> Self {
        self.error.context_mark = Some(mark);
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.error.note = Some(note.into());
        self
    }

    pub fn snippet(mut self, snippet: impl Into<String>) -> Self {
        self.error.snippet = Some(snippet.into());
        self
    }

    pub fn build(self) -> YamlError {
        self.error
    }
}

// === PER-STAGE CONSTRUCTORS ===

pub fn reader_error(problem: impl Into<String>, mark: Mark) -> YamlError {
    YamlErrorBuilder::new(YamlErrorKind::Reader, problem)
        .problem_mark(mark)
        .build()
}

pub fn scanner_error(
    context: impl Into<String>,
    context_mark: Mark,
    problem: impl Into<String>,
    problem_mark: Mark,
) -> YamlError {
    YamlErrorBuilder::new(YamlErrorKind::Scanner, problem)
        .context(context)
        .context_mark(context_mark)
        .problem_mark(problem_mark)
        .build()
}

pub fn parser_error(
    context: impl Into<String>,
    context_mark: Option<Mark>,
    problem: impl Into<String>,
    problem_mark: Mark,
) -> YamlError {
    let mut builder = YamlErrorBuilder::new(YamlErrorKind::Parser, problem)
        .context(context)
        .problem_mark(problem_mark);
    if let Some(mark) = context_mark {
        builder = builder.context_mark(mark);
    }
    builder.build()
}

pub fn composer_error(problem: impl Into<String>, mark: Mark) -> YamlError {
    YamlErrorBuilder::new(YamlErrorKind::Composer, problem)
        .problem_mark(mark)
        .build()
}

pub fn constructor_error(
    context: impl Into<String>,
    context_mark: Option<Mark>,
    problem: impl Into<String>,
    problem_mark: Option<Mark>,
) -> YamlError {
    let mut builder =
        YamlErrorBuilder::new(YamlErrorKind::Constructor, problem).context(context);
    if let Some(mark) = context_mark {
        builder = builder.context_mark(mark);
    }
    if let Some(mark) = problem_mark {
        builder = builder.problem_mark(mark);
    }
    builder.build()
}

pub fn representer_error(problem: impl Into<String>) -> YamlError {
    YamlError::new(YamlErrorKind::Representer, problem)
}

pub fn serializer_error(problem: impl Into<String>) -> YamlError {
    YamlError::new(YamlErrorKind::Serializer, problem)
}

pub fn emitter_error(problem: impl Into<String>) -> YamlError {
    YamlError::new(YamlErrorKind::Emitter, problem)
}

// === WARNINGS ===

/// Non-fatal diagnostics surfaced through a pluggable sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YamlWarning {
    /// An anchor name was assigned a second time within one document
    ReusedAnchor { anchor: String, mark: Mark },
    /// A duplicate mapping key was accepted because the caller allowed it
    DuplicateKeyFuture { key: String, mark: Option<Mark> },
}

impl std::fmt::Display for YamlWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            YamlWarning::ReusedAnchor { anchor, mark } => {
                write!(f, "ReusedAnchorWarning: anchor \"{}\" reassigned, {}", anchor, mark)
            }
            YamlWarning::DuplicateKeyFuture { key, mark } => {
                write!(f, "DuplicateKeyFutureWarning: duplicate key \"{}\"", key)?;
                if let Some(mark) = mark {
                    write!(f, ", {}", mark)?;
                }
                Ok(())
            }
        }
    }
}

/// Destination for warnings; the pipeline never stops on one
pub trait WarningSink {
    fn warn(&mut self, warning: YamlWarning);
}

/// Default sink, forwards to the `log` crate
#[derive(Debug, Default)]
pub struct LogSink;

impl WarningSink for LogSink {
    fn warn(&mut self, warning: YamlWarning) {
        log::warn!("{}", warning);
    }
}

/// Collecting sink for tests and callers that inspect warnings
#[derive(Debug, Default)]
pub struct CollectSink {
    pub warnings: Vec<YamlWarning>,
}

impl WarningSink for CollectSink {
    fn warn(&mut self, warning: YamlWarning) {
        self.warnings.push(warning);
    }
}

/// Shared sink handle threaded through the pipeline stages
pub type SharedSink = Rc<RefCell<dyn WarningSink>>;

pub fn log_sink() -> SharedSink {
    Rc::new(RefCell::new(LogSink))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mark(line: usize, column: usize) -> Mark {
        Mark::new(Arc::from("<unit test>"), 0, line, column)
    }

    #[test]
    fn report_contains_both_marks() {
        let err = scanner_error(
            "while scanning a quoted scalar",
            mark(0, 4),
            "found unexpected end of stream",
            mark(1, 0),
        );
        let text = err.to_string();
        assert!(text.starts_with("ScannerError: while scanning a quoted scalar"));
        assert!(text.contains("line 1, column 5"));
        assert!(text.contains("found unexpected end of stream"));
        assert!(text.contains("line 2, column 1"));
    }

    #[test]
    fn snippet_points_at_column() {
        let err = YamlErrorBuilder::new(YamlErrorKind::Scanner, "found character '\\t'")
            .problem_mark(mark(0, 2))
            .snippet("a:\tb")
            .build();
        let text = err.to_string();
        assert!(text.contains("    a:\tb"));
        assert!(text.contains("      ^"));
    }
}
