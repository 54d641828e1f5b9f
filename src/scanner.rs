/*!
 * ===============================================================================
 * yaml-roundtrip: Lexical Scanner
 * ===============================================================================
 *
 * Text -> Tokens. The scanner enforces YAML indentation semantics (indent
 * stack, simple-key candidates, flow nesting) and captures comments as
 * first-class tokens so the reverse pipeline can put them back.
 *
 *   +------------+    +-------------+    +-------------+    +------------+
 *   | YAML Text  | -> |   Scanner   | -> |   Tokens    | -> |   Parser   |
 *   | (Reader)   |    | (this file) |    | (VecDeque)  |    |  (Events)  |
 *   +------------+    +-------------+    +-------------+    +------------+
 */

use std::collections::{HashMap, VecDeque};

use crate::error::{scanner_error, Mark, YamlError, YamlErrorBuilder, YamlErrorKind, YamlResult};
use crate::reader::{is_break, Reader};

// ===============================================================================
// SCALAR STYLE
// ===============================================================================

/// Chomping indicator of a block scalar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Chomp {
    /// `-`: drop all trailing line breaks
    Strip,
    /// no indicator: keep a single trailing line break
    #[default]
    Clip,
    /// `+`: keep all trailing line breaks
    Keep,
}

/// Presentation style of a scalar, preserved across the round trip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarStyle {
    Plain,
    SingleQuoted,
    DoubleQuoted,
    Literal(Chomp),
    Folded(Chomp),
}

impl ScalarStyle {
    pub fn is_block(&self) -> bool {
        matches!(self, ScalarStyle::Literal(_) | ScalarStyle::Folded(_))
    }

    pub fn is_quoted(&self) -> bool {
        matches!(self, ScalarStyle::SingleQuoted | ScalarStyle::DoubleQuoted)
    }
}

// ===============================================================================
// COMMENTS
// ===============================================================================

/// One comment line (text after the `#`, verbatim) or a blank source line
#[derive(Debug, Clone, PartialEq)]
pub struct CommentToken {
    pub value: String,
    pub blank: bool,
    pub start_mark: Mark,
    pub end_mark: Mark,
}

impl CommentToken {
    pub fn comment(value: String, start_mark: Mark, end_mark: Mark) -> Self {
        Self { value, blank: false, start_mark, end_mark }
    }

    pub fn blank_line(mark: Mark) -> Self {
        Self { value: String::new(), blank: true, start_mark: mark.clone(), end_mark: mark }
    }
}

/// Two-slot comment attachment: same-line trailing comment plus the block of
/// full-line comments (and blank lines) before the token.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenComments {
    pub post: Option<CommentToken>,
    pub pre: Vec<CommentToken>,
}

impl TokenComments {
    pub fn is_empty(&self) -> bool {
        self.post.is_none() && self.pre.is_empty()
    }
}

// ===============================================================================
// TOKENS
// ===============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    StreamStart { encoding: Option<&'static str> },
    StreamEnd,
    Directive { name: String, params: Vec<String> },
    DocumentStart,
    DocumentEnd,
    BlockSequenceStart,
    BlockMappingStart,
    BlockEnd,
    FlowSequenceStart,
    FlowSequenceEnd,
    FlowMappingStart,
    FlowMappingEnd,
    BlockEntry,
    FlowEntry,
    Key,
    Value,
    Alias(String),
    Anchor(String),
    Tag { handle: Option<String>, suffix: String },
    Scalar { value: String, plain: bool, style: ScalarStyle },
    Comment(CommentToken),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub start_mark: Mark,
    pub end_mark: Mark,
    pub comment: TokenComments,
}

impl Token {
    pub fn new(kind: TokenKind, start_mark: Mark, end_mark: Mark) -> Self {
        Self { kind, start_mark, end_mark, comment: TokenComments::default() }
    }

    /// Short identifier used in error messages
    pub fn id(&self) -> &'static str {
        match &self.kind {
            TokenKind::StreamStart { .. } => "<stream start>",
            TokenKind::StreamEnd => "<stream end>",
            TokenKind::Directive { .. } => "<directive>",
            TokenKind::DocumentStart => "<document start>",
            TokenKind::DocumentEnd => "<document end>",
            TokenKind::BlockSequenceStart => "<block sequence start>",
            TokenKind::BlockMappingStart => "<block mapping start>",
            TokenKind::BlockEnd => "<block end>",
            TokenKind::FlowSequenceStart => "'['",
            TokenKind::FlowSequenceEnd => "']'",
            TokenKind::FlowMappingStart => "'{'",
            TokenKind::FlowMappingEnd => "'}'",
            TokenKind::BlockEntry => "'-'",
            TokenKind::FlowEntry => "','",
            TokenKind::Key => "'?'",
            TokenKind::Value => "':'",
            TokenKind::Alias(_) => "<alias>",
            TokenKind::Anchor(_) => "<anchor>",
            TokenKind::Tag { .. } => "<tag>",
            TokenKind::Scalar { .. } => "<scalar>",
            TokenKind::Comment(_) => "<comment>",
        }
    }

    pub fn add_post_comment(&mut self, comment: CommentToken) {
        self.comment.post = Some(comment);
    }

    pub fn add_pre_comments(&mut self, comments: Vec<CommentToken>) {
        self.comment.pre.extend(comments);
    }

    /// Move this token's comments onto `target` (normally the next token),
    /// used e.g. to shift a leading comment from a `- ` entry to the node
    /// that follows it. Slots already occupied on the target are kept.
    pub fn move_comment(&mut self, target: &mut Token) {
        if self.comment.is_empty() {
            return;
        }
        if matches!(target.kind, TokenKind::StreamEnd) {
            return;
        }
        if matches!(self.kind, TokenKind::Value) && matches!(target.kind, TokenKind::BlockEntry) {
            return;
        }
        let own = std::mem::take(&mut self.comment);
        if target.comment.post.is_none() {
            target.comment.post = own.post;
        }
        if target.comment.pre.is_empty() {
            target.comment.pre = own.pre;
        }
    }

    /// Split off the post part of the attachment, leaving pre-comments in
    /// place. The caller re-anchors the returned comment.
    pub fn split_comment(&mut self) -> Option<CommentToken> {
        self.comment.post.take()
    }
}

// ===============================================================================
// SIMPLE KEYS
// ===============================================================================

/// A token position that may still turn out to be a mapping key
#[derive(Debug, Clone)]
struct SimpleKey {
    token_number: usize,
    required: bool,
    index: usize,
    line: usize,
    column: usize,
    mark: Mark,
}

const MAX_SIMPLE_KEY_LENGTH: usize = 1024;

// ===============================================================================
// SCANNER
// ===============================================================================

pub struct Scanner {
    reader: Reader,
    done: bool,
    flow_level: usize,
    tokens: VecDeque<Token>,
    tokens_taken: usize,
    indent: i64,
    indents: Vec<i64>,
    allow_simple_key: bool,
    possible_simple_keys: HashMap<usize, SimpleKey>,
    pending_comments: Vec<CommentToken>,
    version: Option<(u32, u32)>,
}

impl Scanner {
    pub fn new(reader: Reader) -> Self {
        let mark = reader.get_mark();
        let mut scanner = Self {
            reader,
            done: false,
            flow_level: 0,
            tokens: VecDeque::new(),
            tokens_taken: 0,
            indent: -1,
            indents: Vec::new(),
            allow_simple_key: true,
            possible_simple_keys: HashMap::new(),
            pending_comments: Vec::new(),
            version: None,
        };
        scanner.tokens.push_back(Token::new(
            TokenKind::StreamStart { encoding: None },
            mark.clone(),
            mark,
        ));
        scanner
    }

    /// Preset the YAML version (a `%YAML` directive overrides it)
    pub fn set_version(&mut self, version: Option<(u32, u32)>) {
        self.version = version;
    }

    fn version_1_1(&self) -> bool {
        matches!(self.version, Some((1, minor)) if minor < 2)
    }

    // ===================================================================
    // PULL INTERFACE
    // ===================================================================

    /// Next token without consuming it
    pub fn peek_token(&mut self) -> YamlResult<Option<&Token>> {
        self.ensure_lookahead()?;
        Ok(self.tokens.front())
    }

    /// Mutable access to the next token (for comment migration)
    pub fn peek_token_mut(&mut self) -> YamlResult<Option<&mut Token>> {
        self.ensure_lookahead()?;
        Ok(self.tokens.front_mut())
    }

    /// Consume and return the next token
    pub fn get_token(&mut self) -> YamlResult<Option<Token>> {
        self.ensure_lookahead()?;
        match self.tokens.pop_front() {
            Some(token) => {
                self.tokens_taken += 1;
                Ok(Some(token))
            }
            None => Ok(None),
        }
    }

    /// A trailing same-line comment attaches to the token before it, so a
    /// token is only released once the gap after it has been scanned: keep
    /// two tokens buffered while the stream lasts.
    fn ensure_lookahead(&mut self) -> YamlResult<()> {
        while !self.done && (self.tokens.len() < 2 || self.next_simple_key_blocks()) {
            self.fetch_more_tokens()?;
        }
        Ok(())
    }

    /// True while an unresolved simple key candidate pins the front token
    fn next_simple_key_blocks(&self) -> bool {
        self.possible_simple_keys
            .values()
            .any(|key| key.token_number == self.tokens_taken)
    }

    // ===================================================================
    // FETCH DISPATCH
    // ===================================================================

    fn fetch_more_tokens(&mut self) -> YamlResult<()> {
        self.scan_to_next_token()?;
        self.stale_possible_simple_keys()?;
        let column = self.reader.get_mark().column;
        self.unwind_indent(column as i64);

        let ch = self.reader.peek(0);
        if ch == '\0' {
            return self.fetch_stream_end();
        }
        if ch == '%' && self.check_directive() {
            return self.fetch_directive();
        }
        if ch == '-' && self.check_document_indicator("---") {
            return self.fetch_document_indicator(TokenKind::DocumentStart);
        }
        if ch == '.' && self.check_document_indicator("...") {
            return self.fetch_document_indicator(TokenKind::DocumentEnd);
        }
        match ch {
            '[' => return self.fetch_flow_collection_start(TokenKind::FlowSequenceStart),
            '{' => return self.fetch_flow_collection_start(TokenKind::FlowMappingStart),
            ']' => return self.fetch_flow_collection_end(TokenKind::FlowSequenceEnd),
            '}' => return self.fetch_flow_collection_end(TokenKind::FlowMappingEnd),
            ',' => return self.fetch_flow_entry(),
            '-' if self.check_block_entry() => return self.fetch_block_entry(),
            '?' if self.check_key() => return self.fetch_key(),
            ':' if self.check_value() => return self.fetch_value(),
            '*' => return self.fetch_anchor_or_alias(false),
            '&' => return self.fetch_anchor_or_alias(true),
            '!' => return self.fetch_tag(),
            '|' if self.flow_level == 0 => return self.fetch_block_scalar('|'),
            '>' if self.flow_level == 0 => return self.fetch_block_scalar('>'),
            '\'' => return self.fetch_flow_scalar('\''),
            '"' => return self.fetch_flow_scalar('"'),
            _ => {}
        }
        if self.check_plain() {
            return self.fetch_plain();
        }
        let problem = if ch == '\t' {
            "found a tab character where an indentation space is expected".to_string()
        } else {
            format!("found character {:?} that cannot start any token", ch)
        };
        Err(YamlErrorBuilder::new(YamlErrorKind::Scanner, problem)
            .context("while scanning for the next token")
            .problem_mark(self.reader.get_mark())
            .snippet(self.reader.current_line())
            .build())
    }

    /// Append a token, attaching any pending pre-comments. Structural
    /// `BlockEnd` tokens never own comments; the block belongs to whatever
    /// real token follows.
    fn push_token(&mut self, mut token: Token) {
        if !self.pending_comments.is_empty() && !matches!(token.kind, TokenKind::BlockEnd) {
            let pending = std::mem::take(&mut self.pending_comments);
            token.add_pre_comments(pending);
        }
        self.tokens.push_back(token);
    }

    // ===================================================================
    // WHITESPACE AND COMMENTS
    // ===================================================================

    /// Skip spaces, line breaks and comments up to the next token.
    /// Same-line comments become post-comments of the previous token;
    /// full-line comments and blank lines queue up as the next token's
    /// pre-comment block.
    fn scan_to_next_token(&mut self) -> YamlResult<()> {
        loop {
            while self.reader.peek(0) == ' '
                || (self.flow_level > 0 && self.reader.peek(0) == '\t')
            {
                self.reader.forward(1);
            }
            if self.reader.peek(0) == '#' {
                let comment = self.scan_comment_line();
                if self.comment_attaches_post(&comment) {
                    if let Some(last) = self.tokens.back_mut() {
                        last.add_post_comment(comment);
                    }
                } else {
                    self.pending_comments.push(comment);
                }
                continue;
            }
            if is_break(self.reader.peek(0)) {
                self.scan_line_break();
                if self.flow_level == 0 {
                    self.allow_simple_key = true;
                    // remember blank source lines for re-emission
                    if is_break(self.reader.peek(0)) {
                        self.pending_comments
                            .push(CommentToken::blank_line(self.reader.get_mark()));
                    }
                }
                continue;
            }
            return Ok(());
        }
    }

    /// A comment is trailing when it starts on the line where the previous
    /// token started; multi-line scalars keep their own trailing comments
    /// via their header line.
    fn comment_attaches_post(&self, comment: &CommentToken) -> bool {
        match self.tokens.back() {
            Some(token) => {
                !matches!(token.kind, TokenKind::StreamStart { .. })
                    && token.start_mark.line == comment.start_mark.line
            }
            None => false,
        }
    }

    fn scan_comment_line(&mut self) -> CommentToken {
        let start_mark = self.reader.get_mark();
        self.reader.forward(1); // '#'
        let mut value = String::new();
        while !is_break(self.reader.peek(0)) && self.reader.peek(0) != '\0' {
            value.push(self.reader.peek(0));
            self.reader.forward(1);
        }
        let end_mark = self.reader.get_mark();
        CommentToken::comment(value, start_mark, end_mark)
    }

    fn scan_line_break(&mut self) -> String {
        let ch = self.reader.peek(0);
        if ch == '\r' && self.reader.peek(1) == '\n' {
            self.reader.forward(2);
            return "\n".to_string();
        }
        if is_break(ch) {
            self.reader.forward(1);
            if ch == '\r' || ch == '\n' {
                return "\n".to_string();
            }
            return ch.to_string();
        }
        String::new()
    }

    // ===================================================================
    // INDENTATION
    // ===================================================================

    fn unwind_indent(&mut self, column: i64) {
        if self.flow_level > 0 {
            return;
        }
        while self.indent > column {
            let mark = self.reader.get_mark();
            self.indent = self.indents.pop().unwrap_or(-1);
            self.push_token(Token::new(TokenKind::BlockEnd, mark.clone(), mark));
        }
    }

    fn add_indent(&mut self, column: i64) -> bool {
        if self.indent < column {
            self.indents.push(self.indent);
            self.indent = column;
            return true;
        }
        false
    }

    // ===================================================================
    // SIMPLE KEYS
    // ===================================================================

    fn save_possible_simple_key(&mut self) -> YamlResult<()> {
        let mark = self.reader.get_mark();
        let required = self.flow_level == 0 && self.indent == mark.column as i64;
        if self.allow_simple_key {
            self.remove_possible_simple_key()?;
            let token_number = self.tokens_taken + self.tokens.len();
            self.possible_simple_keys.insert(
                self.flow_level,
                SimpleKey {
                    token_number,
                    required,
                    index: mark.index,
                    line: mark.line,
                    column: mark.column,
                    mark,
                },
            );
        }
        Ok(())
    }

    fn remove_possible_simple_key(&mut self) -> YamlResult<()> {
        if let Some(key) = self.possible_simple_keys.remove(&self.flow_level) {
            if key.required {
                return Err(scanner_error(
                    "while scanning a simple key",
                    key.mark,
                    "could not find expected ':'",
                    self.reader.get_mark(),
                ));
            }
        }
        Ok(())
    }

    /// Drop candidates that can no longer be keys (next line, or too long)
    fn stale_possible_simple_keys(&mut self) -> YamlResult<()> {
        let mark = self.reader.get_mark();
        let mut stale_error: Option<YamlError> = None;
        self.possible_simple_keys.retain(|_, key| {
            if key.line == mark.line && mark.index - key.index <= MAX_SIMPLE_KEY_LENGTH {
                return true;
            }
            if key.required && stale_error.is_none() {
                stale_error = Some(scanner_error(
                    "while scanning a simple key",
                    key.mark.clone(),
                    "could not find expected ':'",
                    mark.clone(),
                ));
            }
            false
        });
        match stale_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    // ===================================================================
    // CHECKS
    // ===================================================================

    fn check_directive(&self) -> bool {
        self.reader.get_mark().column == 0
    }

    fn check_document_indicator(&self, marker: &str) -> bool {
        self.reader.get_mark().column == 0
            && self.reader.prefix(3) == marker
            && self.is_blank_or_end(3)
    }

    fn check_block_entry(&self) -> bool {
        self.flow_level == 0 && self.is_blank_or_end(1)
    }

    fn check_key(&self) -> bool {
        if self.flow_level == 0 {
            return self.is_blank_or_end(1);
        }
        // 1.1 treats any '?' in flow as a key indicator; 1.2 requires a
        // following blank or flow indicator
        self.version_1_1() || self.is_blank_or_end(1) || self.is_flow_indicator(1)
    }

    fn check_value(&self) -> bool {
        if self.flow_level == 0 {
            return self.is_blank_or_end(1);
        }
        if self.version_1_1() {
            return true;
        }
        // 1.2: ':' adjacent to a just-closed quoted key or flow collection
        // is still a value separator ({"a":1}, [a, b]:c)
        if self.is_blank_or_end(1) || self.is_flow_indicator(1) {
            return true;
        }
        matches!(
            self.tokens.back().map(|t| &t.kind),
            Some(TokenKind::Scalar { style, .. }) if style.is_quoted()
        ) || matches!(
            self.tokens.back().map(|t| &t.kind),
            Some(TokenKind::FlowSequenceEnd | TokenKind::FlowMappingEnd)
        )
    }

    fn check_plain(&self) -> bool {
        let ch = self.reader.peek(0);
        let not_indicator = !matches!(
            ch,
            '\0' | ' ' | '\t' | '\r' | '\n' | '\u{85}' | '\u{2028}' | '\u{2029}' | '-' | '?'
                | ':' | ',' | '[' | ']' | '{' | '}' | '#' | '&' | '*' | '!' | '|' | '>' | '\''
                | '"' | '%' | '@' | '`'
        );
        if not_indicator {
            return true;
        }
        if self.is_blank_or_end(1) {
            return false;
        }
        if ch == '-' {
            return true;
        }
        if self.flow_level == 0 && (ch == '?' || ch == ':') {
            return true;
        }
        // 1.2 allows ':' and '?' to open a plain scalar in flow context
        !self.version_1_1() && self.flow_level > 0 && matches!(ch, ':' | '?')
            && !self.is_flow_indicator(1)
    }

    fn is_blank_or_end(&self, offset: usize) -> bool {
        let ch = self.reader.peek(offset);
        ch == '\0' || ch == ' ' || ch == '\t' || is_break(ch)
    }

    fn is_flow_indicator(&self, offset: usize) -> bool {
        matches!(self.reader.peek(offset), ',' | '[' | ']' | '{' | '}')
    }

    // ===================================================================
    // FETCHERS
    // ===================================================================

    fn fetch_stream_end(&mut self) -> YamlResult<()> {
        self.unwind_indent(-1);
        self.remove_possible_simple_key()?;
        self.allow_simple_key = false;
        self.possible_simple_keys.clear();
        let mark = self.reader.get_mark();
        self.push_token(Token::new(TokenKind::StreamEnd, mark.clone(), mark));
        self.done = true;
        Ok(())
    }

    fn fetch_directive(&mut self) -> YamlResult<()> {
        self.unwind_indent(-1);
        self.remove_possible_simple_key()?;
        self.allow_simple_key = false;
        let token = self.scan_directive()?;
        self.push_token(token);
        Ok(())
    }

    fn fetch_document_indicator(&mut self, kind: TokenKind) -> YamlResult<()> {
        self.unwind_indent(-1);
        self.remove_possible_simple_key()?;
        self.allow_simple_key = false;
        let start_mark = self.reader.get_mark();
        self.reader.forward(3);
        let end_mark = self.reader.get_mark();
        self.push_token(Token::new(kind, start_mark, end_mark));
        Ok(())
    }

    fn fetch_flow_collection_start(&mut self, kind: TokenKind) -> YamlResult<()> {
        self.save_possible_simple_key()?;
        self.flow_level += 1;
        self.allow_simple_key = true;
        let start_mark = self.reader.get_mark();
        self.reader.forward(1);
        let end_mark = self.reader.get_mark();
        self.push_token(Token::new(kind, start_mark, end_mark));
        Ok(())
    }

    fn fetch_flow_collection_end(&mut self, kind: TokenKind) -> YamlResult<()> {
        self.remove_possible_simple_key()?;
        self.flow_level = self.flow_level.saturating_sub(1);
        self.allow_simple_key = false;
        let start_mark = self.reader.get_mark();
        self.reader.forward(1);
        let end_mark = self.reader.get_mark();
        self.push_token(Token::new(kind, start_mark, end_mark));
        Ok(())
    }

    fn fetch_flow_entry(&mut self) -> YamlResult<()> {
        self.allow_simple_key = true;
        self.remove_possible_simple_key()?;
        let start_mark = self.reader.get_mark();
        self.reader.forward(1);
        let end_mark = self.reader.get_mark();
        self.push_token(Token::new(TokenKind::FlowEntry, start_mark, end_mark));
        Ok(())
    }

    fn fetch_block_entry(&mut self) -> YamlResult<()> {
        if !self.allow_simple_key {
            return Err(YamlError::with_mark(
                YamlErrorKind::Scanner,
                "sequence entries are not allowed here",
                self.reader.get_mark(),
            ));
        }
        let column = self.reader.get_mark().column as i64;
        if self.add_indent(column) {
            let mark = self.reader.get_mark();
            self.push_token(Token::new(TokenKind::BlockSequenceStart, mark.clone(), mark));
        }
        self.allow_simple_key = true;
        self.remove_possible_simple_key()?;
        let start_mark = self.reader.get_mark();
        self.reader.forward(1);
        let end_mark = self.reader.get_mark();
        self.push_token(Token::new(TokenKind::BlockEntry, start_mark, end_mark));
        Ok(())
    }

    fn fetch_key(&mut self) -> YamlResult<()> {
        if self.flow_level == 0 {
            if !self.allow_simple_key {
                return Err(YamlError::with_mark(
                    YamlErrorKind::Scanner,
                    "mapping keys are not allowed here",
                    self.reader.get_mark(),
                ));
            }
            let column = self.reader.get_mark().column as i64;
            if self.add_indent(column) {
                let mark = self.reader.get_mark();
                self.push_token(Token::new(TokenKind::BlockMappingStart, mark.clone(), mark));
            }
        }
        self.allow_simple_key = self.flow_level == 0;
        self.remove_possible_simple_key()?;
        let start_mark = self.reader.get_mark();
        self.reader.forward(1);
        let end_mark = self.reader.get_mark();
        self.push_token(Token::new(TokenKind::Key, start_mark, end_mark));
        Ok(())
    }

    fn fetch_value(&mut self) -> YamlResult<()> {
        if let Some(key) = self.possible_simple_keys.remove(&self.flow_level) {
            // promote the remembered scalar to a key
            let insert_at = key.token_number - self.tokens_taken;
            let key_token = Token::new(TokenKind::Key, key.mark.clone(), key.mark.clone());
            self.tokens.insert(insert_at, key_token);
            if self.flow_level == 0 && self.add_indent(key.column as i64) {
                let mark = key.mark.clone();
                self.tokens.insert(
                    insert_at,
                    Token::new(TokenKind::BlockMappingStart, mark.clone(), mark),
                );
            }
            self.allow_simple_key = false;
        } else {
            if self.flow_level == 0 && !self.allow_simple_key {
                return Err(YamlError::with_mark(
                    YamlErrorKind::Scanner,
                    "mapping values are not allowed here",
                    self.reader.get_mark(),
                ));
            }
            if self.flow_level == 0 {
                let column = self.reader.get_mark().column as i64;
                if self.add_indent(column) {
                    let mark = self.reader.get_mark();
                    self.push_token(Token::new(
                        TokenKind::BlockMappingStart,
                        mark.clone(),
                        mark,
                    ));
                }
            }
            self.allow_simple_key = self.flow_level == 0;
        }
        let start_mark = self.reader.get_mark();
        self.reader.forward(1);
        let end_mark = self.reader.get_mark();
        self.push_token(Token::new(TokenKind::Value, start_mark, end_mark));
        Ok(())
    }

    fn fetch_anchor_or_alias(&mut self, is_anchor: bool) -> YamlResult<()> {
        self.save_possible_simple_key()?;
        self.allow_simple_key = false;
        let token = self.scan_anchor(is_anchor)?;
        self.push_token(token);
        Ok(())
    }

    fn fetch_tag(&mut self) -> YamlResult<()> {
        self.save_possible_simple_key()?;
        self.allow_simple_key = false;
        let token = self.scan_tag()?;
        self.push_token(token);
        Ok(())
    }

    fn fetch_block_scalar(&mut self, indicator: char) -> YamlResult<()> {
        self.allow_simple_key = true;
        self.remove_possible_simple_key()?;
        let token = self.scan_block_scalar(indicator)?;
        self.push_token(token);
        Ok(())
    }

    fn fetch_flow_scalar(&mut self, quote: char) -> YamlResult<()> {
        self.save_possible_simple_key()?;
        self.allow_simple_key = false;
        let token = self.scan_flow_scalar(quote)?;
        self.push_token(token);
        Ok(())
    }

    fn fetch_plain(&mut self) -> YamlResult<()> {
        self.save_possible_simple_key()?;
        self.allow_simple_key = false;
        let (token, trailing_blanks) = self.scan_plain()?;
        self.push_token(token);
        // blank lines consumed past the scalar belong to whatever follows
        for _ in 0..trailing_blanks {
            self.pending_comments
                .push(CommentToken::blank_line(self.reader.get_mark()));
        }
        Ok(())
    }

    // ===================================================================
    // DIRECTIVES
    // ===================================================================

    fn scan_directive(&mut self) -> YamlResult<Token> {
        let start_mark = self.reader.get_mark();
        self.reader.forward(1); // '%'
        let name = self.scan_directive_name(&start_mark)?;
        let mut params = Vec::new();
        match name.as_str() {
            "YAML" => {
                while self.reader.peek(0) == ' ' {
                    self.reader.forward(1);
                }
                let mut version = String::new();
                while matches!(self.reader.peek(0), '0'..='9' | '.') {
                    version.push(self.reader.peek(0));
                    self.reader.forward(1);
                }
                let parsed = parse_version(&version);
                if parsed.is_none() {
                    return Err(scanner_error(
                        "while scanning a YAML directive",
                        start_mark,
                        "expected a version number of the form major.minor",
                        self.reader.get_mark(),
                    ));
                }
                self.version = parsed;
                params.push(version);
            }
            "TAG" => {
                for _ in 0..2 {
                    while self.reader.peek(0) == ' ' {
                        self.reader.forward(1);
                    }
                    let mut param = String::new();
                    while !self.is_blank_or_end(0) {
                        param.push(self.reader.peek(0));
                        self.reader.forward(1);
                    }
                    if param.is_empty() {
                        return Err(scanner_error(
                            "while scanning a TAG directive",
                            start_mark,
                            "expected a handle and a prefix",
                            self.reader.get_mark(),
                        ));
                    }
                    params.push(param);
                }
            }
            _ => {
                // unknown directives are skipped to the end of the line
                while !is_break(self.reader.peek(0)) && self.reader.peek(0) != '\0' {
                    self.reader.forward(1);
                }
            }
        }
        let end_mark = self.reader.get_mark();
        self.scan_directive_ignored_line(&start_mark)?;
        Ok(Token::new(TokenKind::Directive { name, params }, start_mark, end_mark))
    }

    fn scan_directive_name(&mut self, start_mark: &Mark) -> YamlResult<String> {
        let mut name = String::new();
        while self.reader.peek(0).is_ascii_alphanumeric()
            || matches!(self.reader.peek(0), '-' | '_')
        {
            name.push(self.reader.peek(0));
            self.reader.forward(1);
        }
        if name.is_empty() {
            return Err(scanner_error(
                "while scanning a directive",
                start_mark.clone(),
                format!("expected alphabetic character, but found {:?}", self.reader.peek(0)),
                self.reader.get_mark(),
            ));
        }
        Ok(name)
    }

    fn scan_directive_ignored_line(&mut self, start_mark: &Mark) -> YamlResult<()> {
        while self.reader.peek(0) == ' ' {
            self.reader.forward(1);
        }
        if self.reader.peek(0) == '#' {
            let comment = self.scan_comment_line();
            self.pending_comments.push(comment);
        }
        let ch = self.reader.peek(0);
        if ch != '\0' && !is_break(ch) {
            return Err(scanner_error(
                "while scanning a directive",
                start_mark.clone(),
                format!("expected a comment or a line break, but found {:?}", ch),
                self.reader.get_mark(),
            ));
        }
        self.scan_line_break();
        Ok(())
    }

    // ===================================================================
    // ANCHORS, ALIASES, TAGS
    // ===================================================================

    /// Anchor names may contain anything but flow indicators and blanks;
    /// dotted names (`&Backend.Perk`) are valid.
    fn scan_anchor(&mut self, is_anchor: bool) -> YamlResult<Token> {
        let start_mark = self.reader.get_mark();
        let indicator = self.reader.peek(0);
        self.reader.forward(1);
        let mut name = String::new();
        loop {
            let ch = self.reader.peek(0);
            if ch == '\0'
                || ch == ' '
                || ch == '\t'
                || is_break(ch)
                || matches!(ch, '[' | ']' | '{' | '}' | ',')
            {
                break;
            }
            name.push(ch);
            self.reader.forward(1);
        }
        if name.is_empty() {
            let what = if indicator == '&' { "an anchor" } else { "an alias" };
            return Err(scanner_error(
                format!("while scanning {}", what),
                start_mark,
                format!("expected an anchor name, but found {:?}", self.reader.peek(0)),
                self.reader.get_mark(),
            ));
        }
        let end_mark = self.reader.get_mark();
        let kind = if is_anchor { TokenKind::Anchor(name) } else { TokenKind::Alias(name) };
        Ok(Token::new(kind, start_mark, end_mark))
    }

    fn scan_tag(&mut self) -> YamlResult<Token> {
        let start_mark = self.reader.get_mark();
        self.reader.forward(1); // '!'
        let ch = self.reader.peek(0);
        let (handle, suffix) = if ch == '<' {
            // verbatim tag !<...>
            self.reader.forward(1);
            let mut uri = String::new();
            while self.reader.peek(0) != '>' {
                if self.reader.peek(0) == '\0' || is_break(self.reader.peek(0)) {
                    return Err(scanner_error(
                        "while scanning a tag",
                        start_mark,
                        "expected '>', but found end of line",
                        self.reader.get_mark(),
                    ));
                }
                uri.push(self.reader.peek(0));
                self.reader.forward(1);
            }
            self.reader.forward(1);
            (None, uri)
        } else if self.is_blank_or_end(0) || self.is_flow_indicator(0) {
            // non-specific tag '!'
            (Some("!".to_string()), String::new())
        } else {
            // scan up to the first blank; a '!' inside separates the handle
            let mut body = String::new();
            while !self.is_blank_or_end(0) && !self.is_flow_indicator(0) {
                body.push(self.reader.peek(0));
                self.reader.forward(1);
            }
            if let Some(rest) = body.strip_prefix('!') {
                (Some("!!".to_string()), rest.to_string())
            } else if let Some(pos) = body.find('!') {
                let (head, tail) = body.split_at(pos);
                (Some(format!("!{}!", head)), tail[1..].to_string())
            } else {
                (Some("!".to_string()), body)
            }
        };
        let end_mark = self.reader.get_mark();
        Ok(Token::new(TokenKind::Tag { handle, suffix }, start_mark, end_mark))
    }

    // ===================================================================
    // BLOCK SCALARS
    // ===================================================================

    fn scan_block_scalar(&mut self, indicator: char) -> YamlResult<Token> {
        let folded = indicator == '>';
        let start_mark = self.reader.get_mark();
        self.reader.forward(1);
        let (chomp, increment) = self.scan_block_scalar_indicators(&start_mark)?;
        self.scan_block_scalar_ignored_line(&start_mark)?;

        let mut chunks = String::new();
        let min_indent = std::cmp::max(self.indent + 1, 1);
        let mut end_mark;
        let mut breaks;
        let block_indent = match increment {
            Some(inc) => {
                let indent = min_indent + inc as i64 - 1;
                let (b, mark) = self.scan_block_scalar_breaks(indent);
                breaks = b;
                end_mark = mark;
                indent
            }
            None => {
                let (b, max_indent, mark) = self.scan_block_scalar_indentation();
                breaks = b;
                end_mark = mark;
                std::cmp::max(min_indent, max_indent)
            }
        };

        let mut line_break = String::new();
        while self.reader.get_mark().column as i64 == block_indent && self.reader.peek(0) != '\0'
        {
            chunks.push_str(&breaks);
            let leading_non_space = self.reader.peek(0) != ' ' && self.reader.peek(0) != '\t';
            let mut line = String::new();
            while !is_break(self.reader.peek(0)) && self.reader.peek(0) != '\0' {
                line.push(self.reader.peek(0));
                self.reader.forward(1);
            }
            chunks.push_str(&line);
            line_break = self.scan_line_break();
            let (new_breaks, mark) = self.scan_block_scalar_breaks(block_indent);
            breaks = new_breaks;
            end_mark = mark;
            if self.reader.get_mark().column as i64 == block_indent && self.reader.peek(0) != '\0'
            {
                // folded: a single break between non-empty lines becomes a space
                if folded
                    && line_break == "\n"
                    && leading_non_space
                    && self.reader.peek(0) != ' '
                    && self.reader.peek(0) != '\t'
                {
                    if breaks.is_empty() {
                        chunks.push(' ');
                    } else {
                        chunks.push_str(&breaks);
                        breaks = String::new();
                    }
                } else {
                    chunks.push_str(&line_break);
                    chunks.push_str(&breaks);
                    breaks = String::new();
                }
            } else {
                break;
            }
        }

        match chomp {
            Chomp::Keep => {
                chunks.push_str(&line_break);
                chunks.push_str(&breaks);
            }
            Chomp::Clip => {
                chunks.push_str(&line_break);
            }
            Chomp::Strip => {}
        }

        let style = if folded { ScalarStyle::Folded(chomp) } else { ScalarStyle::Literal(chomp) };
        Ok(Token::new(
            TokenKind::Scalar { value: chunks, plain: false, style },
            start_mark,
            end_mark,
        ))
    }

    fn scan_block_scalar_indicators(
        &mut self,
        start_mark: &Mark,
    ) -> YamlResult<(Chomp, Option<u32>)> {
        let mut chomp = Chomp::Clip;
        let mut increment = None;
        let mut ch = self.reader.peek(0);
        if ch == '+' || ch == '-' {
            chomp = if ch == '+' { Chomp::Keep } else { Chomp::Strip };
            self.reader.forward(1);
            ch = self.reader.peek(0);
            if let Some(digit) = ch.to_digit(10) {
                if digit == 0 {
                    return Err(scanner_error(
                        "while scanning a block scalar",
                        start_mark.clone(),
                        "expected indentation indicator in the range 1-9, but found 0",
                        self.reader.get_mark(),
                    ));
                }
                increment = Some(digit);
                self.reader.forward(1);
            }
        } else if let Some(digit) = ch.to_digit(10) {
            if digit == 0 {
                return Err(scanner_error(
                    "while scanning a block scalar",
                    start_mark.clone(),
                    "expected indentation indicator in the range 1-9, but found 0",
                    self.reader.get_mark(),
                ));
            }
            increment = Some(digit);
            self.reader.forward(1);
            ch = self.reader.peek(0);
            if ch == '+' || ch == '-' {
                chomp = if ch == '+' { Chomp::Keep } else { Chomp::Strip };
                self.reader.forward(1);
            }
        }
        let ch = self.reader.peek(0);
        if ch != '\0' && !is_break(ch) && ch != ' ' && ch != '#' {
            return Err(scanner_error(
                "while scanning a block scalar",
                start_mark.clone(),
                format!("expected chomping or indentation indicators, but found {:?}", ch),
                self.reader.get_mark(),
            ));
        }
        Ok((chomp, increment))
    }

    fn scan_block_scalar_ignored_line(&mut self, start_mark: &Mark) -> YamlResult<()> {
        while self.reader.peek(0) == ' ' {
            self.reader.forward(1);
        }
        if self.reader.peek(0) == '#' {
            let comment = self.scan_comment_line();
            if let Some(last) = self.tokens.back_mut() {
                last.add_post_comment(comment);
            }
        }
        let ch = self.reader.peek(0);
        if ch != '\0' && !is_break(ch) {
            return Err(scanner_error(
                "while scanning a block scalar",
                start_mark.clone(),
                format!("expected a comment or a line break, but found {:?}", ch),
                self.reader.get_mark(),
            ));
        }
        self.scan_line_break();
        Ok(())
    }

    /// Leading breaks and the deepest indentation seen before content
    fn scan_block_scalar_indentation(&mut self) -> (String, i64, Mark) {
        let mut breaks = String::new();
        let mut max_indent = 0i64;
        let mut end_mark = self.reader.get_mark();
        loop {
            let ch = self.reader.peek(0);
            if is_break(ch) {
                breaks.push_str(&self.scan_line_break());
                end_mark = self.reader.get_mark();
            } else if ch == ' ' {
                self.reader.forward(1);
                let column = self.reader.get_mark().column as i64;
                if column > max_indent {
                    max_indent = column;
                }
            } else {
                break;
            }
        }
        (breaks, max_indent, end_mark)
    }

    fn scan_block_scalar_breaks(&mut self, indent: i64) -> (String, Mark) {
        let mut breaks = String::new();
        let mut end_mark = self.reader.get_mark();
        loop {
            while (self.reader.get_mark().column as i64) < indent && self.reader.peek(0) == ' ' {
                self.reader.forward(1);
            }
            if is_break(self.reader.peek(0)) {
                breaks.push_str(&self.scan_line_break());
                end_mark = self.reader.get_mark();
            } else {
                break;
            }
        }
        (breaks, end_mark)
    }

    // ===================================================================
    // QUOTED SCALARS
    // ===================================================================

    fn scan_flow_scalar(&mut self, quote: char) -> YamlResult<Token> {
        let double = quote == '"';
        let start_mark = self.reader.get_mark();
        self.reader.forward(1);
        let mut chunks = String::new();
        loop {
            self.scan_flow_scalar_non_spaces(&mut chunks, double, &start_mark)?;
            if self.reader.peek(0) == quote {
                if !double && self.reader.peek(1) == '\'' {
                    // escaped single quote
                    chunks.push('\'');
                    self.reader.forward(2);
                    continue;
                }
                self.reader.forward(1);
                break;
            }
            self.scan_flow_scalar_spaces(&mut chunks, &start_mark)?;
        }
        let end_mark = self.reader.get_mark();
        let style = if double { ScalarStyle::DoubleQuoted } else { ScalarStyle::SingleQuoted };
        Ok(Token::new(
            TokenKind::Scalar { value: chunks, plain: false, style },
            start_mark,
            end_mark,
        ))
    }

    fn scan_flow_scalar_non_spaces(
        &mut self,
        chunks: &mut String,
        double: bool,
        start_mark: &Mark,
    ) -> YamlResult<()> {
        loop {
            let ch = self.reader.peek(0);
            if ch == '\0' {
                return Err(scanner_error(
                    "while scanning a quoted scalar",
                    start_mark.clone(),
                    "found unexpected end of stream",
                    self.reader.get_mark(),
                ));
            }
            if ch == ' ' || ch == '\t' || is_break(ch) {
                return Ok(());
            }
            if double && ch == '"' {
                return Ok(());
            }
            if !double && ch == '\'' {
                return Ok(());
            }
            if double && ch == '\\' {
                self.reader.forward(1);
                let esc = self.reader.peek(0);
                if let Some(replacement) = escape_replacement(esc) {
                    chunks.push(replacement);
                    self.reader.forward(1);
                } else if let Some(length) = escape_code_length(esc) {
                    self.reader.forward(1);
                    let mut code = 0u32;
                    for k in 0..length {
                        let digit = self.reader.peek(k);
                        let Some(val) = digit.to_digit(16) else {
                            return Err(scanner_error(
                                "while scanning a double-quoted scalar",
                                start_mark.clone(),
                                format!(
                                    "expected escape sequence of {} hexadecimal numbers, but found {:?}",
                                    length, digit
                                ),
                                self.reader.get_mark(),
                            ));
                        };
                        code = code * 16 + val;
                    }
                    self.reader.forward(length);
                    match char::from_u32(code) {
                        Some(decoded) => chunks.push(decoded),
                        None => {
                            return Err(scanner_error(
                                "while scanning a double-quoted scalar",
                                start_mark.clone(),
                                format!("found invalid character code {:#x}", code),
                                self.reader.get_mark(),
                            ))
                        }
                    }
                } else if is_break(esc) {
                    // escaped line break joins lines without a space
                    self.scan_line_break();
                    let mut breaks = String::new();
                    self.collect_quoted_breaks(&mut breaks);
                    chunks.push_str(&breaks);
                } else {
                    return Err(scanner_error(
                        "while scanning a double-quoted scalar",
                        start_mark.clone(),
                        format!("found unknown escape character {:?}", esc),
                        self.reader.get_mark(),
                    ));
                }
            } else {
                chunks.push(ch);
                self.reader.forward(1);
            }
        }
    }

    fn scan_flow_scalar_spaces(
        &mut self,
        chunks: &mut String,
        start_mark: &Mark,
    ) -> YamlResult<()> {
        let mut whitespaces = String::new();
        while self.reader.peek(0) == ' ' || self.reader.peek(0) == '\t' {
            whitespaces.push(self.reader.peek(0));
            self.reader.forward(1);
        }
        let ch = self.reader.peek(0);
        if ch == '\0' {
            return Err(scanner_error(
                "while scanning a quoted scalar",
                start_mark.clone(),
                "found unexpected end of stream",
                self.reader.get_mark(),
            ));
        }
        if is_break(ch) {
            let line_break = self.scan_line_break();
            let mut breaks = String::new();
            self.collect_quoted_breaks(&mut breaks);
            if line_break == "\n" && breaks.is_empty() {
                chunks.push(' ');
            } else if breaks.is_empty() {
                chunks.push_str(&line_break);
            } else {
                chunks.push_str(&breaks);
            }
        } else {
            chunks.push_str(&whitespaces);
        }
        Ok(())
    }

    fn collect_quoted_breaks(&mut self, breaks: &mut String) {
        loop {
            while self.reader.peek(0) == ' ' || self.reader.peek(0) == '\t' {
                self.reader.forward(1);
            }
            if is_break(self.reader.peek(0)) {
                breaks.push_str(&self.scan_line_break());
            } else {
                return;
            }
        }
    }

    // ===================================================================
    // PLAIN SCALARS
    // ===================================================================

    fn scan_plain(&mut self) -> YamlResult<(Token, usize)> {
        let start_mark = self.reader.get_mark();
        let mut end_mark = start_mark.clone();
        let plain_indent = self.indent + 1;
        let mut chunks = String::new();
        let mut spaces = String::new();
        loop {
            if self.reader.peek(0) == '#' {
                break;
            }
            let mut line = String::new();
            loop {
                let ch = self.reader.peek(0);
                if ch == '\0' || ch == ' ' || ch == '\t' || is_break(ch) {
                    break;
                }
                if ch == ':' && self.is_plain_value_end(1) {
                    break;
                }
                if self.flow_level > 0 && matches!(ch, ',' | '[' | ']' | '{' | '}') {
                    break;
                }
                if self.flow_level > 0 && self.version_1_1() && ch == '?' {
                    break;
                }
                line.push(ch);
                self.reader.forward(1);
            }
            if line.is_empty() {
                break;
            }
            self.allow_simple_key = false;
            chunks.push_str(&spaces);
            chunks.push_str(&line);
            end_mark = self.reader.get_mark();
            spaces = self.scan_plain_spaces()?;
            if spaces.is_empty()
                || self.reader.peek(0) == '#'
                || (self.flow_level == 0 && (self.reader.get_mark().column as i64) < plain_indent)
            {
                break;
            }
        }
        let trailing_blanks = if self.flow_level == 0 {
            spaces.matches('\n').count()
        } else {
            0
        };
        Ok((
            Token::new(
                TokenKind::Scalar { value: chunks, plain: true, style: ScalarStyle::Plain },
                start_mark,
                end_mark,
            ),
            trailing_blanks,
        ))
    }

    /// ':' ends a plain scalar when followed by a blank (block context) or
    /// any flow indicator (flow context)
    fn is_plain_value_end(&self, offset: usize) -> bool {
        if self.is_blank_or_end(offset) {
            return true;
        }
        self.flow_level > 0 && self.is_flow_indicator(offset)
    }

    fn scan_plain_spaces(&mut self) -> YamlResult<String> {
        let mut chunks = String::new();
        let mut whitespaces = String::new();
        while self.reader.peek(0) == ' ' {
            whitespaces.push(' ');
            self.reader.forward(1);
        }
        let ch = self.reader.peek(0);
        if is_break(ch) {
            let line_break = self.scan_line_break();
            self.allow_simple_key = true;
            if self.check_document_indicator("---") || self.check_document_indicator("...") {
                return Ok(String::new());
            }
            let mut breaks = String::new();
            loop {
                let ch = self.reader.peek(0);
                if ch == ' ' {
                    self.reader.forward(1);
                } else if is_break(ch) {
                    breaks.push_str(&self.scan_line_break());
                    if self.check_document_indicator("---")
                        || self.check_document_indicator("...")
                    {
                        return Ok(String::new());
                    }
                } else {
                    break;
                }
            }
            if line_break == "\n" && breaks.is_empty() {
                chunks.push(' ');
            } else if breaks.is_empty() {
                chunks.push_str(&line_break);
            } else {
                chunks.push_str(&breaks);
            }
        } else {
            chunks.push_str(&whitespaces);
        }
        Ok(chunks)
    }
}

// ===============================================================================
// ESCAPES
// ===============================================================================

fn escape_replacement(ch: char) -> Option<char> {
    Some(match ch {
        '0' => '\0',
        'a' => '\u{7}',
        'b' => '\u{8}',
        't' | '\t' => '\t',
        'n' => '\n',
        'v' => '\u{b}',
        'f' => '\u{c}',
        'r' => '\r',
        'e' => '\u{1b}',
        ' ' => ' ',
        '"' => '"',
        '\\' => '\\',
        '/' => '/',
        'N' => '\u{85}',
        '_' => '\u{a0}',
        'L' => '\u{2028}',
        'P' => '\u{2029}',
        _ => return None,
    })
}

fn escape_code_length(ch: char) -> Option<usize> {
    match ch {
        'x' => Some(2),
        'u' => Some(4),
        'U' => Some(8),
        _ => None,
    }
}

/// Parse "major.minor" from a `%YAML` directive
pub fn parse_version(text: &str) -> Option<(u32, u32)> {
    let (major, minor) = text.split_once('.')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::Reader;

    fn scan_all(source: &str) -> Vec<Token> {
        let reader = Reader::from_str("<test>", source).unwrap();
        let mut scanner = Scanner::new(reader);
        let mut tokens = Vec::new();
        loop {
            let token = scanner.get_token().unwrap().unwrap();
            let end = matches!(token.kind, TokenKind::StreamEnd);
            tokens.push(token);
            if end {
                break;
            }
        }
        tokens
    }

    fn kinds(tokens: &[Token]) -> Vec<&'static str> {
        tokens.iter().map(|t| t.id()).collect()
    }

    #[test]
    fn simple_mapping_tokens() {
        let tokens = scan_all("a: 1\n");
        assert_eq!(
            kinds(&tokens),
            vec![
                "<stream start>",
                "<block mapping start>",
                "'?'",
                "<scalar>",
                "':'",
                "<scalar>",
                "<block end>",
                "<stream end>",
            ]
        );
    }

    #[test]
    fn block_sequence_tokens() {
        let tokens = scan_all("- a\n- b\n");
        assert_eq!(
            kinds(&tokens),
            vec![
                "<stream start>",
                "<block sequence start>",
                "'-'",
                "<scalar>",
                "'-'",
                "<scalar>",
                "<block end>",
                "<stream end>",
            ]
        );
    }

    #[test]
    fn flow_sequence_as_simple_key() {
        let tokens = scan_all("[2, 3]: a\n");
        assert_eq!(
            kinds(&tokens),
            vec![
                "<stream start>",
                "<block mapping start>",
                "'?'",
                "'['",
                "<scalar>",
                "','",
                "<scalar>",
                "']'",
                "':'",
                "<scalar>",
                "<block end>",
                "<stream end>",
            ]
        );
    }

    #[test]
    fn trailing_comment_attaches_to_previous_token() {
        let tokens = scan_all("a: 1 # inline\nb: 2\n");
        let one = tokens
            .iter()
            .find(|t| matches!(&t.kind, TokenKind::Scalar { value, .. } if value == "1"))
            .unwrap();
        let post = one.comment.post.as_ref().unwrap();
        assert_eq!(post.value, " inline");
    }

    #[test]
    fn leading_comment_attaches_to_next_token() {
        let tokens = scan_all("# head\na: 1\n");
        let key = tokens
            .iter()
            .find(|t| matches!(&t.kind, TokenKind::Scalar { value, .. } if value == "a"))
            .unwrap();
        assert_eq!(key.comment.pre.len(), 1);
        assert_eq!(key.comment.pre[0].value, " head");
    }

    #[test]
    fn block_scalar_clip_and_strip() {
        let tokens = scan_all("a: |\n  text\nb: |-\n  text\n");
        let scalars: Vec<_> = tokens
            .iter()
            .filter_map(|t| match &t.kind {
                TokenKind::Scalar { value, style, .. } if style.is_block() => {
                    Some((value.clone(), *style))
                }
                _ => None,
            })
            .collect();
        assert_eq!(scalars[0], ("text\n".to_string(), ScalarStyle::Literal(Chomp::Clip)));
        assert_eq!(scalars[1], ("text".to_string(), ScalarStyle::Literal(Chomp::Strip)));
    }

    #[test]
    fn double_quote_escapes() {
        let tokens = scan_all("\"a\\nb\\x41\"\n");
        let scalar = tokens
            .iter()
            .find_map(|t| match &t.kind {
                TokenKind::Scalar { value, .. } => Some(value.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(scalar, "a\nbA");
    }

    #[test]
    fn unterminated_quote_is_error() {
        let reader = Reader::from_str("<test>", "'abc\n").unwrap();
        let mut scanner = Scanner::new(reader);
        let err = loop {
            match scanner.get_token() {
                Ok(Some(token)) => {
                    if matches!(token.kind, TokenKind::StreamEnd) {
                        panic!("expected scanner error");
                    }
                }
                Ok(None) => panic!("expected scanner error"),
                Err(err) => break err,
            }
        };
        assert!(err.to_string().contains("while scanning a quoted scalar"));
    }

    #[test]
    fn directive_token_carries_version() {
        let tokens = scan_all("%YAML 1.1\n---\na\n");
        assert!(matches!(
            &tokens[1].kind,
            TokenKind::Directive { name, params } if name == "YAML" && params[0] == "1.1"
        ));
        assert!(matches!(tokens[2].kind, TokenKind::DocumentStart));
    }

    #[test]
    fn plain_scalar_with_colons_in_flow_1_2() {
        let tokens = scan_all("[::vector, -123]\n");
        let values: Vec<_> = tokens
            .iter()
            .filter_map(|t| match &t.kind {
                TokenKind::Scalar { value, .. } => Some(value.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(values, vec!["::vector".to_string(), "-123".to_string()]);
    }

    #[test]
    fn anchor_names_allow_full_charset() {
        let tokens = scan_all("- &dotted.words.here [a, b]\n- *dotted.words.here\n");
        assert!(tokens
            .iter()
            .any(|t| matches!(&t.kind, TokenKind::Anchor(name) if name == "dotted.words.here")));
        assert!(tokens
            .iter()
            .any(|t| matches!(&t.kind, TokenKind::Alias(name) if name == "dotted.words.here")));
    }
}
