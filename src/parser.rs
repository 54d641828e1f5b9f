/*!
 * ===============================================================================
 * yaml-roundtrip: Syntactic Parser
 * ===============================================================================
 *
 * Tokens -> Events. A deterministic pushdown state machine: block states are
 * driven by the scanner's indentation tokens, flow states mirror them with
 * ',' separators and closing brackets. Directives select the tag handles and
 * the active YAML version; comments migrate from structural tokens onto the
 * events that best anchor their re-emission.
 */

use std::collections::HashMap;

use crate::error::{parser_error, Mark, YamlResult};
use crate::scanner::{
    parse_version, ScalarStyle, Scanner, Token, TokenComments, TokenKind,
};

// ===============================================================================
// EVENTS
// ===============================================================================

/// Structured intermediate representation between tokens and nodes
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    StreamStart {
        start_mark: Mark,
        end_mark: Mark,
        encoding: Option<&'static str>,
    },
    StreamEnd {
        start_mark: Mark,
        end_mark: Mark,
    },
    DocumentStart {
        start_mark: Mark,
        end_mark: Mark,
        explicit: bool,
        version: Option<(u32, u32)>,
        tags: Option<HashMap<String, String>>,
        comment: TokenComments,
    },
    DocumentEnd {
        start_mark: Mark,
        end_mark: Mark,
        explicit: bool,
        comment: TokenComments,
    },
    Alias {
        anchor: String,
        start_mark: Mark,
        end_mark: Mark,
        comment: TokenComments,
    },
    Scalar {
        anchor: Option<String>,
        tag: Option<String>,
        /// (resolvable when plain, resolvable when quoted)
        implicit: (bool, bool),
        value: String,
        start_mark: Mark,
        end_mark: Mark,
        style: Option<ScalarStyle>,
        comment: TokenComments,
    },
    SequenceStart {
        anchor: Option<String>,
        tag: Option<String>,
        implicit: bool,
        start_mark: Mark,
        end_mark: Mark,
        flow_style: Option<bool>,
        comment: TokenComments,
    },
    SequenceEnd {
        start_mark: Mark,
        end_mark: Mark,
        comment: TokenComments,
    },
    MappingStart {
        anchor: Option<String>,
        tag: Option<String>,
        implicit: bool,
        start_mark: Mark,
        end_mark: Mark,
        flow_style: Option<bool>,
        comment: TokenComments,
    },
    MappingEnd {
        start_mark: Mark,
        end_mark: Mark,
        comment: TokenComments,
    },
}

impl Event {
    pub fn start_mark(&self) -> &Mark {
        match self {
            Event::StreamStart { start_mark, .. }
            | Event::StreamEnd { start_mark, .. }
            | Event::DocumentStart { start_mark, .. }
            | Event::DocumentEnd { start_mark, .. }
            | Event::Alias { start_mark, .. }
            | Event::Scalar { start_mark, .. }
            | Event::SequenceStart { start_mark, .. }
            | Event::SequenceEnd { start_mark, .. }
            | Event::MappingStart { start_mark, .. }
            | Event::MappingEnd { start_mark, .. } => start_mark,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Event::StreamStart { .. } => "<stream start>",
            Event::StreamEnd { .. } => "<stream end>",
            Event::DocumentStart { .. } => "<document start>",
            Event::DocumentEnd { .. } => "<document end>",
            Event::Alias { .. } => "<alias>",
            Event::Scalar { .. } => "<scalar>",
            Event::SequenceStart { .. } => "<sequence start>",
            Event::SequenceEnd { .. } => "<sequence end>",
            Event::MappingStart { .. } => "<mapping start>",
            Event::MappingEnd { .. } => "<mapping end>",
        }
    }
}

// ===============================================================================
// STATE MACHINE
// ===============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    StreamStart,
    ImplicitDocumentStart,
    DocumentStart,
    DocumentContent,
    DocumentEnd,
    BlockNode,
    BlockSequenceFirstEntry,
    BlockSequenceEntry,
    IndentlessSequenceEntry,
    BlockMappingFirstKey,
    BlockMappingKey,
    BlockMappingValue,
    FlowSequenceFirstEntry,
    FlowSequenceEntry,
    FlowSequenceEntryMappingKey,
    FlowSequenceEntryMappingValue,
    FlowSequenceEntryMappingEnd,
    FlowMappingFirstKey,
    FlowMappingKey,
    FlowMappingValue,
    FlowMappingEmptyValue,
}

const DEFAULT_TAG_HANDLES: [(&str, &str); 2] = [("!", "!"), ("!!", "tag:yaml.org,2002:")];

pub struct Parser {
    scanner: Scanner,
    state: Option<State>,
    states: Vec<State>,
    marks: Vec<Mark>,
    current_event: Option<Event>,
    yaml_version: Option<(u32, u32)>,
    default_version: Option<(u32, u32)>,
    tag_handles: HashMap<String, String>,
}

impl Parser {
    pub fn new(scanner: Scanner) -> Self {
        Self {
            scanner,
            state: Some(State::StreamStart),
            states: Vec::new(),
            marks: Vec::new(),
            current_event: None,
            yaml_version: None,
            default_version: None,
            tag_handles: HashMap::new(),
        }
    }

    /// Version used when no `%YAML` directive appears (None = 1.2 behavior)
    pub fn set_default_version(&mut self, version: Option<(u32, u32)>) {
        self.default_version = version;
        self.scanner.set_version(version);
    }

    /// Version in effect for the document being parsed
    pub fn current_version(&self) -> Option<(u32, u32)> {
        self.yaml_version.or(self.default_version)
    }

    // ===================================================================
    // PULL INTERFACE
    // ===================================================================

    pub fn peek_event(&mut self) -> YamlResult<Option<&Event>> {
        self.fill_event()?;
        Ok(self.current_event.as_ref())
    }

    pub fn get_event(&mut self) -> YamlResult<Option<Event>> {
        self.fill_event()?;
        Ok(self.current_event.take())
    }

    fn fill_event(&mut self) -> YamlResult<()> {
        if self.current_event.is_none() {
            if let Some(state) = self.state {
                let event = self.run_state(state)?;
                self.current_event = Some(event);
            }
        }
        Ok(())
    }

    fn run_state(&mut self, state: State) -> YamlResult<Event> {
        match state {
            State::StreamStart => self.parse_stream_start(),
            State::ImplicitDocumentStart => self.parse_implicit_document_start(),
            State::DocumentStart => self.parse_document_start(),
            State::DocumentContent => self.parse_document_content(),
            State::DocumentEnd => self.parse_document_end(),
            State::BlockNode => self.parse_node(true, false),
            State::BlockSequenceFirstEntry => self.parse_block_sequence_entry(true),
            State::BlockSequenceEntry => self.parse_block_sequence_entry(false),
            State::IndentlessSequenceEntry => self.parse_indentless_sequence_entry(),
            State::BlockMappingFirstKey => self.parse_block_mapping_key(true),
            State::BlockMappingKey => self.parse_block_mapping_key(false),
            State::BlockMappingValue => self.parse_block_mapping_value(),
            State::FlowSequenceFirstEntry => self.parse_flow_sequence_entry(true),
            State::FlowSequenceEntry => self.parse_flow_sequence_entry(false),
            State::FlowSequenceEntryMappingKey => self.parse_flow_sequence_entry_mapping_key(),
            State::FlowSequenceEntryMappingValue => {
                self.parse_flow_sequence_entry_mapping_value()
            }
            State::FlowSequenceEntryMappingEnd => self.parse_flow_sequence_entry_mapping_end(),
            State::FlowMappingFirstKey => self.parse_flow_mapping_key(true),
            State::FlowMappingKey => self.parse_flow_mapping_key(false),
            State::FlowMappingValue => self.parse_flow_mapping_value(false),
            State::FlowMappingEmptyValue => self.parse_flow_mapping_value(true),
        }
    }

    // ===================================================================
    // TOKEN HELPERS
    // ===================================================================

    fn next_is(&mut self, pred: fn(&TokenKind) -> bool) -> YamlResult<bool> {
        Ok(match self.scanner.peek_token()? {
            Some(token) => pred(&token.kind),
            None => false,
        })
    }

    fn take_token(&mut self) -> YamlResult<Token> {
        match self.scanner.get_token()? {
            Some(token) => Ok(token),
            None => Err(parser_error(
                "while parsing the stream",
                None,
                "unexpected end of token stream",
                self.mark_here(),
            )),
        }
    }

    fn peek_mark(&mut self) -> YamlResult<Mark> {
        Ok(match self.scanner.peek_token()? {
            Some(token) => token.start_mark.clone(),
            None => self.mark_here(),
        })
    }

    fn peek_id(&mut self) -> YamlResult<&'static str> {
        Ok(match self.scanner.peek_token()? {
            Some(token) => token.id(),
            None => "<stream end>",
        })
    }

    fn mark_here(&self) -> Mark {
        self.marks.last().cloned().unwrap_or_else(|| {
            Mark::new(std::sync::Arc::from("<stream>"), 0, 0, 0)
        })
    }

    fn pop_state(&mut self) {
        self.state = self.states.pop();
    }

    /// Shift the comments of a consumed structural token to the token that
    /// will anchor their re-emission (the following node content).
    fn migrate_comment(&mut self, token: &mut Token) -> YamlResult<()> {
        if token.comment.is_empty() {
            return Ok(());
        }
        if let Some(next) = self.scanner.peek_token_mut()? {
            token.move_comment(next);
        }
        Ok(())
    }

    // ===================================================================
    // STREAM AND DOCUMENT STATES
    // ===================================================================

    fn parse_stream_start(&mut self) -> YamlResult<Event> {
        let token = self.take_token()?;
        let encoding = match token.kind {
            TokenKind::StreamStart { encoding } => encoding,
            _ => None,
        };
        self.state = Some(State::ImplicitDocumentStart);
        Ok(Event::StreamStart {
            start_mark: token.start_mark,
            end_mark: token.end_mark,
            encoding,
        })
    }

    fn parse_implicit_document_start(&mut self) -> YamlResult<Event> {
        let explicit_next = self.next_is(|k| {
            matches!(
                k,
                TokenKind::Directive { .. } | TokenKind::DocumentStart | TokenKind::StreamEnd
            )
        })?;
        if explicit_next {
            return self.parse_document_start();
        }
        self.yaml_version = None;
        self.tag_handles = default_tag_handles();
        let mark = self.peek_mark()?;
        self.states.push(State::DocumentEnd);
        self.state = Some(State::BlockNode);
        Ok(Event::DocumentStart {
            start_mark: mark.clone(),
            end_mark: mark,
            explicit: false,
            version: None,
            tags: None,
            comment: TokenComments::default(),
        })
    }

    fn parse_document_start(&mut self) -> YamlResult<Event> {
        // skip stray '...' markers
        while self.next_is(|k| matches!(k, TokenKind::DocumentEnd))? {
            self.take_token()?;
        }
        if self.next_is(|k| matches!(k, TokenKind::StreamEnd))? {
            let token = self.take_token()?;
            self.state = None;
            return Ok(Event::StreamEnd {
                start_mark: token.start_mark,
                end_mark: token.end_mark,
            });
        }
        let start_mark = self.peek_mark()?;
        let (version, tags, mut comment) = self.process_directives()?;
        if !self.next_is(|k| matches!(k, TokenKind::DocumentStart))? {
            let found = self.peek_id()?;
            return Err(parser_error(
                "while parsing a new document",
                None,
                format!("expected '<document start>', but found {}", found),
                self.peek_mark()?,
            ));
        }
        let token = self.take_token()?;
        if comment.is_empty() {
            comment = token.comment.clone();
        }
        self.states.push(State::DocumentEnd);
        self.state = Some(State::DocumentContent);
        Ok(Event::DocumentStart {
            start_mark,
            end_mark: token.end_mark,
            explicit: true,
            version,
            tags,
            comment,
        })
    }

    fn parse_document_content(&mut self) -> YamlResult<Event> {
        let structural = self.next_is(|k| {
            matches!(
                k,
                TokenKind::Directive { .. }
                    | TokenKind::DocumentStart
                    | TokenKind::DocumentEnd
                    | TokenKind::StreamEnd
            )
        })?;
        if structural {
            let mark = self.peek_mark()?;
            self.pop_state();
            return Ok(empty_scalar(mark, TokenComments::default()));
        }
        self.parse_node(true, false)
    }

    fn parse_document_end(&mut self) -> YamlResult<Event> {
        let start_mark = self.peek_mark()?;
        let mut end_mark = start_mark.clone();
        let mut explicit = false;
        let mut comment = TokenComments::default();
        if self.next_is(|k| matches!(k, TokenKind::DocumentEnd))? {
            let token = self.take_token()?;
            end_mark = token.end_mark;
            comment = token.comment;
            explicit = true;
        }
        // trailing comments before the end of the stream belong to this
        // document
        if comment.pre.is_empty() {
            if let Some(next) = self.scanner.peek_token_mut()? {
                if matches!(next.kind, TokenKind::StreamEnd) && !next.comment.pre.is_empty() {
                    comment.pre = std::mem::take(&mut next.comment.pre);
                }
            }
        }
        self.yaml_version = None;
        self.state = Some(State::DocumentStart);
        Ok(Event::DocumentEnd { start_mark, end_mark, explicit, comment })
    }

    // ===================================================================
    // DIRECTIVES
    // ===================================================================

    #[allow(clippy::type_complexity)]
    fn process_directives(
        &mut self,
    ) -> YamlResult<(Option<(u32, u32)>, Option<HashMap<String, String>>, TokenComments)> {
        self.yaml_version = None;
        self.tag_handles = HashMap::new();
        let mut comment = TokenComments::default();
        while self.next_is(|k| matches!(k, TokenKind::Directive { .. }))? {
            let token = self.take_token()?;
            if comment.is_empty() {
                comment = token.comment.clone();
            }
            let TokenKind::Directive { name, params } = token.kind else {
                unreachable!("checked directive token");
            };
            match name.as_str() {
                "YAML" => {
                    if self.yaml_version.is_some() {
                        return Err(parser_error(
                            "while parsing a new document",
                            None,
                            "found duplicate YAML directive",
                            token.start_mark,
                        ));
                    }
                    let version = params.first().and_then(|v| parse_version(v));
                    match version {
                        Some((1, minor)) => self.yaml_version = Some((1, minor)),
                        _ => {
                            return Err(parser_error(
                                "while parsing a new document",
                                None,
                                "found incompatible YAML document (version 1.* is required)",
                                token.start_mark,
                            ))
                        }
                    }
                }
                "TAG" => {
                    let (handle, prefix) = match (params.first(), params.get(1)) {
                        (Some(h), Some(p)) => (h.clone(), p.clone()),
                        _ => {
                            return Err(parser_error(
                                "while parsing a new document",
                                None,
                                "malformed TAG directive",
                                token.start_mark,
                            ))
                        }
                    };
                    if self.tag_handles.contains_key(&handle) {
                        return Err(parser_error(
                            "while parsing a new document",
                            None,
                            format!("duplicate tag handle {:?}", handle),
                            token.start_mark,
                        ));
                    }
                    self.tag_handles.insert(handle, prefix);
                }
                _ => {}
            }
        }
        let tags = if self.tag_handles.is_empty() {
            None
        } else {
            Some(self.tag_handles.clone())
        };
        for (handle, prefix) in DEFAULT_TAG_HANDLES {
            self.tag_handles
                .entry(handle.to_string())
                .or_insert_with(|| prefix.to_string());
        }
        Ok((self.yaml_version, tags, comment))
    }

    // ===================================================================
    // NODES
    // ===================================================================

    fn parse_node(&mut self, block: bool, indentless_sequence: bool) -> YamlResult<Event> {
        if self.next_is(|k| matches!(k, TokenKind::Alias(_)))? {
            let token = self.take_token()?;
            let TokenKind::Alias(anchor) = token.kind else {
                unreachable!("checked alias token");
            };
            self.pop_state();
            return Ok(Event::Alias {
                anchor,
                start_mark: token.start_mark,
                end_mark: token.end_mark,
                comment: token.comment,
            });
        }

        let mut anchor: Option<String> = None;
        let mut tag_parts: Option<(Option<String>, String)> = None;
        let mut tag_mark: Option<Mark> = None;
        let mut start_mark: Option<Mark> = None;
        let mut end_mark: Option<Mark> = None;
        let mut comment = TokenComments::default();

        for _ in 0..2 {
            if anchor.is_none() && self.next_is(|k| matches!(k, TokenKind::Anchor(_)))? {
                let token = self.take_token()?;
                let TokenKind::Anchor(name) = token.kind else {
                    unreachable!("checked anchor token");
                };
                anchor = Some(name);
                start_mark.get_or_insert(token.start_mark);
                end_mark = Some(token.end_mark);
                merge_comments(&mut comment, token.comment);
            } else if tag_parts.is_none() && self.next_is(|k| matches!(k, TokenKind::Tag { .. }))?
            {
                let token = self.take_token()?;
                let TokenKind::Tag { handle, suffix } = token.kind else {
                    unreachable!("checked tag token");
                };
                tag_parts = Some((handle, suffix));
                tag_mark = Some(token.start_mark.clone());
                start_mark.get_or_insert(token.start_mark);
                end_mark = Some(token.end_mark);
                merge_comments(&mut comment, token.comment);
            } else {
                break;
            }
        }

        let tag = match tag_parts {
            Some((None, suffix)) => Some(suffix),
            Some((Some(handle), suffix)) => {
                if handle == "!" && suffix.is_empty() {
                    Some("!".to_string())
                } else {
                    let prefix = self.tag_handles.get(&handle).cloned().ok_or_else(|| {
                        parser_error(
                            "while parsing a node",
                            start_mark.clone(),
                            format!("found undefined tag handle {:?}", handle),
                            tag_mark.clone().unwrap_or_else(|| self.mark_here()),
                        )
                    })?;
                    Some(format!("{}{}", prefix, suffix))
                }
            }
            None => None,
        };

        let implicit_collection = tag.is_none() || tag.as_deref() == Some("!");

        if indentless_sequence && self.next_is(|k| matches!(k, TokenKind::BlockEntry))? {
            let mark = self.peek_mark()?;
            self.state = Some(State::IndentlessSequenceEntry);
            return Ok(Event::SequenceStart {
                anchor,
                tag,
                implicit: implicit_collection,
                start_mark: start_mark.unwrap_or_else(|| mark.clone()),
                end_mark: mark,
                flow_style: Some(false),
                comment,
            });
        }

        if self.next_is(|k| matches!(k, TokenKind::Scalar { .. }))? {
            let token = self.take_token()?;
            let TokenKind::Scalar { value, plain, style } = token.kind else {
                unreachable!("checked scalar token");
            };
            let implicit = if plain && tag.is_none() {
                (true, false)
            } else if tag.is_none() {
                (false, true)
            } else {
                (false, false)
            };
            merge_comments(&mut comment, token.comment);
            self.pop_state();
            return Ok(Event::Scalar {
                anchor,
                tag,
                implicit,
                value,
                start_mark: start_mark.unwrap_or(token.start_mark),
                end_mark: token.end_mark,
                style: Some(style),
                comment,
            });
        }

        if self.next_is(|k| matches!(k, TokenKind::FlowSequenceStart))? {
            let token = self.take_token()?;
            merge_comments(&mut comment, token.comment);
            self.marks.push(token.start_mark.clone());
            self.state = Some(State::FlowSequenceFirstEntry);
            return Ok(Event::SequenceStart {
                anchor,
                tag,
                implicit: implicit_collection,
                start_mark: start_mark.unwrap_or(token.start_mark),
                end_mark: token.end_mark,
                flow_style: Some(true),
                comment,
            });
        }

        if self.next_is(|k| matches!(k, TokenKind::FlowMappingStart))? {
            let token = self.take_token()?;
            merge_comments(&mut comment, token.comment);
            self.marks.push(token.start_mark.clone());
            self.state = Some(State::FlowMappingFirstKey);
            return Ok(Event::MappingStart {
                anchor,
                tag,
                implicit: implicit_collection,
                start_mark: start_mark.unwrap_or(token.start_mark),
                end_mark: token.end_mark,
                flow_style: Some(true),
                comment,
            });
        }

        if block && self.next_is(|k| matches!(k, TokenKind::BlockSequenceStart))? {
            let token = self.take_token()?;
            merge_comments(&mut comment, token.comment);
            self.marks.push(token.start_mark.clone());
            self.state = Some(State::BlockSequenceFirstEntry);
            return Ok(Event::SequenceStart {
                anchor,
                tag,
                implicit: implicit_collection,
                start_mark: start_mark.unwrap_or(token.start_mark),
                end_mark: token.end_mark,
                flow_style: Some(false),
                comment,
            });
        }

        if block && self.next_is(|k| matches!(k, TokenKind::BlockMappingStart))? {
            let token = self.take_token()?;
            merge_comments(&mut comment, token.comment);
            self.marks.push(token.start_mark.clone());
            self.state = Some(State::BlockMappingFirstKey);
            return Ok(Event::MappingStart {
                anchor,
                tag,
                implicit: implicit_collection,
                start_mark: start_mark.unwrap_or(token.start_mark),
                end_mark: token.end_mark,
                flow_style: Some(false),
                comment,
            });
        }

        if anchor.is_some() || tag.is_some() {
            // anchored or tagged empty scalar ("a: &x")
            let mark = end_mark.unwrap_or_else(|| self.mark_here());
            self.pop_state();
            return Ok(Event::Scalar {
                anchor,
                tag,
                implicit: (false, true),
                value: String::new(),
                start_mark: start_mark.unwrap_or_else(|| mark.clone()),
                end_mark: mark,
                style: Some(ScalarStyle::Plain),
                comment,
            });
        }

        let context = if block {
            "while parsing a block node"
        } else {
            "while parsing a flow node"
        };
        let found = self.peek_id()?;
        Err(parser_error(
            context,
            Some(self.mark_here()),
            format!("expected the node content, but found {}", found),
            self.peek_mark()?,
        ))
    }

    // ===================================================================
    // BLOCK COLLECTIONS
    // ===================================================================

    fn parse_block_sequence_entry(&mut self, first: bool) -> YamlResult<Event> {
        if first {
            let token = self.take_token()?; // <block sequence start>
            self.marks.push(token.start_mark);
        }
        if self.next_is(|k| matches!(k, TokenKind::BlockEntry))? {
            let mut token = self.take_token()?;
            self.migrate_comment(&mut token)?;
            let content_next = !self
                .next_is(|k| matches!(k, TokenKind::BlockEntry | TokenKind::BlockEnd))?;
            if content_next {
                self.states.push(State::BlockSequenceEntry);
                return self.parse_node(true, false);
            }
            self.state = Some(State::BlockSequenceEntry);
            return Ok(empty_scalar(token.end_mark, token.comment));
        }
        if self.next_is(|k| matches!(k, TokenKind::BlockEnd))? {
            let token = self.take_token()?;
            self.marks.pop();
            self.pop_state();
            return Ok(Event::SequenceEnd {
                start_mark: token.start_mark,
                end_mark: token.end_mark,
                comment: token.comment,
            });
        }
        let found = self.peek_id()?;
        Err(parser_error(
            "while parsing a block collection",
            self.marks.last().cloned(),
            format!("expected <block end>, but found {}", found),
            self.peek_mark()?,
        ))
    }

    fn parse_indentless_sequence_entry(&mut self) -> YamlResult<Event> {
        if self.next_is(|k| matches!(k, TokenKind::BlockEntry))? {
            let mut token = self.take_token()?;
            self.migrate_comment(&mut token)?;
            let content_next = !self.next_is(|k| {
                matches!(
                    k,
                    TokenKind::BlockEntry
                        | TokenKind::Key
                        | TokenKind::Value
                        | TokenKind::BlockEnd
                )
            })?;
            if content_next {
                self.states.push(State::IndentlessSequenceEntry);
                return self.parse_node(true, false);
            }
            self.state = Some(State::IndentlessSequenceEntry);
            return Ok(empty_scalar(token.end_mark, token.comment));
        }
        let mark = self.peek_mark()?;
        self.pop_state();
        Ok(Event::SequenceEnd {
            start_mark: mark.clone(),
            end_mark: mark,
            comment: TokenComments::default(),
        })
    }

    fn parse_block_mapping_key(&mut self, first: bool) -> YamlResult<Event> {
        if first {
            let token = self.take_token()?; // <block mapping start>
            self.marks.push(token.start_mark);
        }
        if self.next_is(|k| matches!(k, TokenKind::Key))? {
            let mut token = self.take_token()?;
            self.migrate_comment(&mut token)?;
            let content_next = !self.next_is(|k| {
                matches!(k, TokenKind::Key | TokenKind::Value | TokenKind::BlockEnd)
            })?;
            if content_next {
                self.states.push(State::BlockMappingValue);
                return self.parse_node(true, true);
            }
            self.state = Some(State::BlockMappingValue);
            return Ok(empty_scalar(token.end_mark, token.comment));
        }
        if self.next_is(|k| matches!(k, TokenKind::BlockEnd))? {
            let token = self.take_token()?;
            self.marks.pop();
            self.pop_state();
            return Ok(Event::MappingEnd {
                start_mark: token.start_mark,
                end_mark: token.end_mark,
                comment: token.comment,
            });
        }
        let found = self.peek_id()?;
        Err(parser_error(
            "while parsing a block mapping",
            self.marks.last().cloned(),
            format!("expected <block end>, but found {}", found),
            self.peek_mark()?,
        ))
    }

    fn parse_block_mapping_value(&mut self) -> YamlResult<Event> {
        if self.next_is(|k| matches!(k, TokenKind::Value))? {
            let mut token = self.take_token()?;
            let empty_value = self.next_is(|k| {
                matches!(k, TokenKind::Key | TokenKind::Value | TokenKind::BlockEnd)
            })?;
            if empty_value {
                // the ':' comments describe the missing value
                self.state = Some(State::BlockMappingKey);
                return Ok(empty_scalar(token.end_mark, token.comment));
            }
            self.migrate_comment(&mut token)?;
            self.states.push(State::BlockMappingKey);
            return self.parse_node(true, true);
        }
        let mark = self.peek_mark()?;
        self.state = Some(State::BlockMappingKey);
        Ok(empty_scalar(mark, TokenComments::default()))
    }

    // ===================================================================
    // FLOW COLLECTIONS
    // ===================================================================

    fn parse_flow_sequence_entry(&mut self, first: bool) -> YamlResult<Event> {
        if first {
            let token = self.take_token()?; // '['
            self.marks.push(token.start_mark);
        }
        if !self.next_is(|k| matches!(k, TokenKind::FlowSequenceEnd))? {
            if !first {
                if self.next_is(|k| matches!(k, TokenKind::FlowEntry))? {
                    self.take_token()?;
                } else {
                    let found = self.peek_id()?;
                    return Err(parser_error(
                        "while parsing a flow sequence",
                        self.marks.last().cloned(),
                        format!("expected ',' or ']', but found {}", found),
                        self.peek_mark()?,
                    ));
                }
            }
            if self.next_is(|k| matches!(k, TokenKind::Key))? {
                let token = self.take_token()?;
                self.state = Some(State::FlowSequenceEntryMappingKey);
                return Ok(Event::MappingStart {
                    anchor: None,
                    tag: None,
                    implicit: true,
                    start_mark: token.start_mark,
                    end_mark: token.end_mark,
                    flow_style: Some(true),
                    comment: token.comment,
                });
            }
            if !self.next_is(|k| matches!(k, TokenKind::FlowSequenceEnd))? {
                self.states.push(State::FlowSequenceEntry);
                return self.parse_node(false, false);
            }
        }
        let token = self.take_token()?; // ']'
        self.marks.pop();
        self.pop_state();
        Ok(Event::SequenceEnd {
            start_mark: token.start_mark,
            end_mark: token.end_mark,
            comment: token.comment,
        })
    }

    fn parse_flow_sequence_entry_mapping_key(&mut self) -> YamlResult<Event> {
        let empty = self.next_is(|k| {
            matches!(k, TokenKind::Value | TokenKind::FlowEntry | TokenKind::FlowSequenceEnd)
        })?;
        if empty {
            let mark = self.peek_mark()?;
            self.state = Some(State::FlowSequenceEntryMappingValue);
            return Ok(empty_scalar(mark, TokenComments::default()));
        }
        self.states.push(State::FlowSequenceEntryMappingValue);
        self.parse_node(false, false)
    }

    fn parse_flow_sequence_entry_mapping_value(&mut self) -> YamlResult<Event> {
        if self.next_is(|k| matches!(k, TokenKind::Value))? {
            let token = self.take_token()?;
            let empty = self.next_is(|k| {
                matches!(k, TokenKind::FlowEntry | TokenKind::FlowSequenceEnd)
            })?;
            if !empty {
                self.states.push(State::FlowSequenceEntryMappingEnd);
                return self.parse_node(false, false);
            }
            self.state = Some(State::FlowSequenceEntryMappingEnd);
            return Ok(empty_scalar(token.end_mark, TokenComments::default()));
        }
        let mark = self.peek_mark()?;
        self.state = Some(State::FlowSequenceEntryMappingEnd);
        Ok(empty_scalar(mark, TokenComments::default()))
    }

    fn parse_flow_sequence_entry_mapping_end(&mut self) -> YamlResult<Event> {
        let mark = self.peek_mark()?;
        self.state = Some(State::FlowSequenceEntry);
        Ok(Event::MappingEnd {
            start_mark: mark.clone(),
            end_mark: mark,
            comment: TokenComments::default(),
        })
    }

    fn parse_flow_mapping_key(&mut self, first: bool) -> YamlResult<Event> {
        if first {
            let token = self.take_token()?; // '{'
            self.marks.push(token.start_mark);
        }
        if !self.next_is(|k| matches!(k, TokenKind::FlowMappingEnd))? {
            if !first {
                if self.next_is(|k| matches!(k, TokenKind::FlowEntry))? {
                    self.take_token()?;
                } else {
                    let found = self.peek_id()?;
                    return Err(parser_error(
                        "while parsing a flow mapping",
                        self.marks.last().cloned(),
                        format!("expected ',' or '}}', but found {}", found),
                        self.peek_mark()?,
                    ));
                }
            }
            if self.next_is(|k| matches!(k, TokenKind::Key))? {
                self.take_token()?;
                let empty = self.next_is(|k| {
                    matches!(
                        k,
                        TokenKind::Value | TokenKind::FlowEntry | TokenKind::FlowMappingEnd
                    )
                })?;
                if !empty {
                    self.states.push(State::FlowMappingValue);
                    return self.parse_node(false, false);
                }
                let mark = self.peek_mark()?;
                self.state = Some(State::FlowMappingValue);
                return Ok(empty_scalar(mark, TokenComments::default()));
            }
            if !self.next_is(|k| matches!(k, TokenKind::FlowMappingEnd))? {
                self.states.push(State::FlowMappingEmptyValue);
                return self.parse_node(false, false);
            }
        }
        let token = self.take_token()?; // '}'
        self.marks.pop();
        self.pop_state();
        Ok(Event::MappingEnd {
            start_mark: token.start_mark,
            end_mark: token.end_mark,
            comment: token.comment,
        })
    }

    fn parse_flow_mapping_value(&mut self, empty: bool) -> YamlResult<Event> {
        if empty {
            let mark = self.peek_mark()?;
            self.state = Some(State::FlowMappingKey);
            return Ok(empty_scalar(mark, TokenComments::default()));
        }
        if self.next_is(|k| matches!(k, TokenKind::Value))? {
            let token = self.take_token()?;
            let no_content = self.next_is(|k| {
                matches!(k, TokenKind::FlowEntry | TokenKind::FlowMappingEnd)
            })?;
            if !no_content {
                self.states.push(State::FlowMappingKey);
                return self.parse_node(false, false);
            }
            self.state = Some(State::FlowMappingKey);
            return Ok(empty_scalar(token.end_mark, TokenComments::default()));
        }
        let mark = self.peek_mark()?;
        self.state = Some(State::FlowMappingKey);
        Ok(empty_scalar(mark, TokenComments::default()))
    }
}

// ===============================================================================
// HELPERS
// ===============================================================================

fn default_tag_handles() -> HashMap<String, String> {
    DEFAULT_TAG_HANDLES
        .iter()
        .map(|(h, p)| (h.to_string(), p.to_string()))
        .collect()
}

fn empty_scalar(mark: Mark, comment: TokenComments) -> Event {
    Event::Scalar {
        anchor: None,
        tag: None,
        implicit: (true, false),
        value: String::new(),
        start_mark: mark.clone(),
        end_mark: mark,
        style: Some(ScalarStyle::Plain),
        comment,
    }
}

fn merge_comments(into: &mut TokenComments, from: TokenComments) {
    if into.post.is_none() {
        into.post = from.post;
    }
    into.pre.extend(from.pre);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::Reader;

    fn parse_all(source: &str) -> Vec<Event> {
        let reader = Reader::from_str("<test>", source).unwrap();
        let mut parser = Parser::new(Scanner::new(reader));
        let mut events = Vec::new();
        while let Some(event) = parser.get_event().unwrap() {
            events.push(event);
        }
        events
    }

    fn ids(events: &[Event]) -> Vec<&'static str> {
        events.iter().map(|e| e.id()).collect()
    }

    #[test]
    fn mapping_event_stream() {
        let events = parse_all("a: 1\n");
        assert_eq!(
            ids(&events),
            vec![
                "<stream start>",
                "<document start>",
                "<mapping start>",
                "<scalar>",
                "<scalar>",
                "<mapping end>",
                "<document end>",
                "<stream end>",
            ]
        );
    }

    #[test]
    fn flow_sequence_in_block_mapping() {
        let events = parse_all("key: [1, 2]\n");
        assert_eq!(
            ids(&events),
            vec![
                "<stream start>",
                "<document start>",
                "<mapping start>",
                "<scalar>",
                "<sequence start>",
                "<scalar>",
                "<scalar>",
                "<sequence end>",
                "<mapping end>",
                "<document end>",
                "<stream end>",
            ]
        );
        let flow = events.iter().find_map(|e| match e {
            Event::SequenceStart { flow_style, .. } => Some(*flow_style),
            _ => None,
        });
        assert_eq!(flow, Some(Some(true)));
    }

    #[test]
    fn anchor_and_alias_events() {
        let events = parse_all("a: &x 1\nb: *x\n");
        assert!(events.iter().any(|e| matches!(
            e,
            Event::Scalar { anchor: Some(a), .. } if a == "x"
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            Event::Alias { anchor, .. } if anchor == "x"
        )));
    }

    #[test]
    fn explicit_document_version() {
        let events = parse_all("%YAML 1.1\n---\n- a\n");
        assert!(events.iter().any(|e| matches!(
            e,
            Event::DocumentStart { explicit: true, version: Some((1, 1)), .. }
        )));
    }

    #[test]
    fn duplicate_yaml_directive_rejected() {
        let reader = Reader::from_str("<test>", "%YAML 1.1\n%YAML 1.1\n---\na\n").unwrap();
        let mut parser = Parser::new(Scanner::new(reader));
        let mut err = None;
        loop {
            match parser.get_event() {
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(e) => {
                    err = Some(e);
                    break;
                }
            }
        }
        assert!(err.unwrap().to_string().contains("duplicate YAML directive"));
    }

    #[test]
    fn secondary_tag_handle_resolved() {
        let events = parse_all("!!str 1\n");
        assert!(events.iter().any(|e| matches!(
            e,
            Event::Scalar { tag: Some(t), .. } if t == "tag:yaml.org,2002:str"
        )));
    }

    #[test]
    fn tag_directive_declares_handle() {
        let events = parse_all("%TAG !e! tag:example.com,2000:app/\n---\n!e!thing x\n");
        assert!(events.iter().any(|e| matches!(
            e,
            Event::Scalar { tag: Some(t), .. } if t == "tag:example.com,2000:app/thing"
        )));
    }

    #[test]
    fn undefined_handle_is_parser_error() {
        let reader = Reader::from_str("<test>", "!x!foo 1\n").unwrap();
        let mut parser = Parser::new(Scanner::new(reader));
        let mut err = None;
        loop {
            match parser.get_event() {
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(e) => {
                    err = Some(e);
                    break;
                }
            }
        }
        assert!(err.unwrap().to_string().contains("undefined tag handle"));
    }

    #[test]
    fn value_colon_in_flow_is_error_under_1_1() {
        let reader = Reader::from_str("<test>", "%YAML 1.1\n---\n[::vector]\n").unwrap();
        let mut parser = Parser::new(Scanner::new(reader));
        let mut err = None;
        loop {
            match parser.get_event() {
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(e) => {
                    err = Some(e);
                    break;
                }
            }
        }
        assert!(err.is_some());
    }

    #[test]
    fn leading_comment_lands_on_sequence_start() {
        let events = parse_all("# note\n- a\n");
        let comment = events
            .iter()
            .find_map(|e| match e {
                Event::SequenceStart { comment, .. } => Some(comment.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(comment.pre.len(), 1);
        assert_eq!(comment.pre[0].value, " note");
    }

    #[test]
    fn entry_comment_migrates_to_following_item() {
        let events = parse_all("- a\n# note\n- b\n");
        let comment = events
            .iter()
            .find_map(|e| match e {
                Event::Scalar { value, comment, .. } if value == "b" => Some(comment.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(comment.pre.len(), 1);
        assert_eq!(comment.pre[0].value, " note");
    }
}
