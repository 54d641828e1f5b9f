/*!
 * ===============================================================================
 * yaml-roundtrip: Composer
 * ===============================================================================
 *
 * Events -> Node graph. Nodes live in an arena and are addressed by integer
 * handles, so aliases are plain edges and cyclic documents need no special
 * ownership treatment. Collection nodes are allocated when their Start event
 * arrives and filled in place, which lets an anchor bind before its children
 * compose (an alias may legally point at an ancestor).
 */

use std::collections::HashMap;

use crate::error::{composer_error, Mark, SharedSink, YamlResult, YamlWarning};
use crate::parser::{Event, Parser};
use crate::resolver::{Resolver, TAG_MAP, TAG_SEQ, TAG_STR};
use crate::scanner::{CommentToken, ScalarStyle, TokenComments};

// ===============================================================================
// NODES
// ===============================================================================

/// Arena handle; aliases store the handle of the node they share
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// Comments gathered on a node from its surrounding tokens
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeComments {
    /// own-line comments (and blank lines) before the node
    pub pre: Vec<CommentToken>,
    /// trailing comment on the node's first line
    pub post: Option<CommentToken>,
    /// comments between the last child and the end of a collection
    pub end: Vec<CommentToken>,
    /// own-line comments after the node (trailing document comments)
    pub after: Vec<CommentToken>,
}

impl NodeComments {
    pub fn from_token_comments(comment: TokenComments) -> Self {
        Self { pre: comment.pre, post: comment.post, end: Vec::new(), after: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.pre.is_empty() && self.post.is_none() && self.end.is_empty() && self.after.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Scalar { value: String, style: ScalarStyle },
    Sequence { items: Vec<NodeId>, flow_style: Option<bool> },
    Mapping { pairs: Vec<(NodeId, NodeId)>, flow_style: Option<bool> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    /// always resolved: explicit, or inferred by the implicit table
    pub tag: String,
    pub anchor: Option<String>,
    /// emit the anchor even when nothing references the node
    pub anchor_always: bool,
    pub comment: NodeComments,
    pub start_mark: Mark,
    pub end_mark: Mark,
}

impl Node {
    pub fn id(&self) -> &'static str {
        match self.kind {
            NodeKind::Scalar { .. } => "scalar",
            NodeKind::Sequence { .. } => "sequence",
            NodeKind::Mapping { .. } => "mapping",
        }
    }

    pub fn scalar_value(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Scalar { value, .. } => Some(value),
            _ => None,
        }
    }
}

/// Owns every node of one document
#[derive(Debug, Default, Clone)]
pub struct NodeArena {
    nodes: Vec<Node>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// One composed document: arena, root handle and document-level framing
#[derive(Debug, Clone)]
pub struct Document {
    pub arena: NodeArena,
    pub root: NodeId,
    pub version: Option<(u32, u32)>,
    pub tags: Option<HashMap<String, String>>,
    pub explicit_start: bool,
    pub explicit_end: bool,
    /// comments after the last node, before the document ended
    pub end_comments: Vec<CommentToken>,
}

// ===============================================================================
// COMPOSER
// ===============================================================================

pub struct Composer {
    parser: Parser,
    resolver: Resolver,
    sink: SharedSink,
    anchors: HashMap<String, NodeId>,
    stream_started: bool,
    stream_done: bool,
}

impl Composer {
    pub fn new(parser: Parser, resolver: Resolver, sink: SharedSink) -> Self {
        Self {
            parser,
            resolver,
            sink,
            anchors: HashMap::new(),
            stream_started: false,
            stream_done: false,
        }
    }

    pub fn parser_mut(&mut self) -> &mut Parser {
        &mut self.parser
    }

    /// True when another document is available
    pub fn check_document(&mut self) -> YamlResult<bool> {
        self.start_stream()?;
        if self.stream_done {
            return Ok(false);
        }
        match self.parser.peek_event()? {
            Some(Event::StreamEnd { .. }) | None => {
                self.parser.get_event()?;
                self.stream_done = true;
                Ok(false)
            }
            Some(_) => Ok(true),
        }
    }

    /// Compose every remaining document
    pub fn compose_all(&mut self) -> YamlResult<Vec<Document>> {
        let mut documents = Vec::new();
        while self.check_document()? {
            if let Some(document) = self.compose_document()? {
                documents.push(document);
            }
        }
        Ok(documents)
    }

    /// Compose one document and fail if the stream holds another
    pub fn compose_single_document(&mut self) -> YamlResult<Option<Document>> {
        let document = if self.check_document()? {
            self.compose_document()?
        } else {
            None
        };
        if self.check_document()? {
            let mark = self
                .parser
                .peek_event()?
                .map(|event| event.start_mark().clone())
                .unwrap_or_else(|| Mark::new(std::sync::Arc::from("<stream>"), 0, 0, 0));
            return Err(composer_error(
                "expected a single document in the stream, but found another document",
                mark,
            ));
        }
        Ok(document)
    }

    fn start_stream(&mut self) -> YamlResult<()> {
        if !self.stream_started {
            if let Some(Event::StreamStart { .. }) = self.parser.peek_event()? {
                self.parser.get_event()?;
            }
            self.stream_started = true;
        }
        Ok(())
    }

    /// Build the node graph for the next document
    pub fn compose_document(&mut self) -> YamlResult<Option<Document>> {
        self.start_stream()?;
        let Some(Event::DocumentStart { explicit, comment, .. }) = self.parser.get_event()?
        else {
            return Ok(None);
        };
        let explicit_start = explicit;
        let doc_comment = comment;

        let mut arena = NodeArena::new();
        let root = self.compose_node(&mut arena)?;

        // leading stream comments belong to the root node
        if !doc_comment.pre.is_empty() {
            let node = arena.get_mut(root);
            let mut pre = doc_comment.pre;
            pre.append(&mut node.comment.pre);
            node.comment.pre = pre;
        }

        let version = self.parser.current_version();
        let (explicit_end, end_comments) = match self.parser.get_event()? {
            Some(Event::DocumentEnd { explicit, comment, .. }) => (explicit, comment.pre),
            _ => (false, Vec::new()),
        };

        self.anchors.clear();
        Ok(Some(Document {
            arena,
            root,
            version,
            tags: None,
            explicit_start,
            explicit_end,
            end_comments,
        }))
    }

    // ===================================================================
    // NODE COMPOSITION
    // ===================================================================

    fn compose_node(&mut self, arena: &mut NodeArena) -> YamlResult<NodeId> {
        let event = match self.parser.get_event()? {
            Some(event) => event,
            None => {
                return Err(composer_error(
                    "expected a node event, but the stream ended",
                    Mark::new(std::sync::Arc::from("<stream>"), 0, 0, 0),
                ))
            }
        };
        match event {
            Event::Alias { anchor, start_mark, .. } => match self.anchors.get(&anchor) {
                Some(&id) => Ok(id),
                None => Err(composer_error(
                    format!("found undefined alias {:?}", anchor),
                    start_mark,
                )),
            },
            Event::Scalar {
                anchor,
                tag,
                implicit,
                value,
                start_mark,
                end_mark,
                style,
                comment,
            } => {
                let tag = match tag {
                    Some(tag) if tag != "!" => tag,
                    _ => {
                        if implicit.0 {
                            self.resolver
                                .resolve_scalar(&value, self.parser.current_version())
                        } else {
                            TAG_STR.to_string()
                        }
                    }
                };
                let node = Node {
                    kind: NodeKind::Scalar {
                        value,
                        style: style.unwrap_or(ScalarStyle::Plain),
                    },
                    tag,
                    anchor: anchor.clone(),
                    anchor_always: false,
                    comment: NodeComments::from_token_comments(comment),
                    start_mark,
                    end_mark,
                };
                let id = arena.alloc(node);
                self.bind_anchor(anchor, id, arena);
                Ok(id)
            }
            Event::SequenceStart { anchor, tag, start_mark, flow_style, comment, .. } => {
                let tag = match tag {
                    Some(tag) if tag != "!" => tag,
                    _ => TAG_SEQ.to_string(),
                };
                let id = arena.alloc(Node {
                    kind: NodeKind::Sequence { items: Vec::new(), flow_style },
                    tag,
                    anchor: anchor.clone(),
                    anchor_always: false,
                    comment: NodeComments::from_token_comments(comment),
                    start_mark: start_mark.clone(),
                    end_mark: start_mark,
                });
                self.bind_anchor(anchor, id, arena);
                loop {
                    match self.parser.peek_event()? {
                        Some(Event::SequenceEnd { .. }) => break,
                        Some(_) => {
                            let item = self.compose_node(arena)?;
                            let NodeKind::Sequence { items, .. } = &mut arena.get_mut(id).kind
                            else {
                                unreachable!("sequence node changed kind");
                            };
                            items.push(item);
                        }
                        None => break,
                    }
                }
                if let Some(Event::SequenceEnd { end_mark, comment, .. }) =
                    self.parser.get_event()?
                {
                    let node = arena.get_mut(id);
                    node.end_mark = end_mark;
                    node.comment.end = comment.pre;
                    // trailing comment after a closing ']' stays with the node
                    if node.comment.post.is_none() {
                        node.comment.post = comment.post;
                    }
                }
                Ok(id)
            }
            Event::MappingStart { anchor, tag, start_mark, flow_style, comment, .. } => {
                let tag = match tag {
                    Some(tag) if tag != "!" => tag,
                    _ => TAG_MAP.to_string(),
                };
                let id = arena.alloc(Node {
                    kind: NodeKind::Mapping { pairs: Vec::new(), flow_style },
                    tag,
                    anchor: anchor.clone(),
                    anchor_always: false,
                    comment: NodeComments::from_token_comments(comment),
                    start_mark: start_mark.clone(),
                    end_mark: start_mark,
                });
                self.bind_anchor(anchor, id, arena);
                loop {
                    match self.parser.peek_event()? {
                        Some(Event::MappingEnd { .. }) => break,
                        Some(_) => {
                            let key = self.compose_node(arena)?;
                            let value = self.compose_node(arena)?;
                            let NodeKind::Mapping { pairs, .. } = &mut arena.get_mut(id).kind
                            else {
                                unreachable!("mapping node changed kind");
                            };
                            pairs.push((key, value));
                        }
                        None => break,
                    }
                }
                if let Some(Event::MappingEnd { end_mark, comment, .. }) =
                    self.parser.get_event()?
                {
                    let node = arena.get_mut(id);
                    node.end_mark = end_mark;
                    node.comment.end = comment.pre;
                    // trailing comment after a closing '}' stays with the node
                    if node.comment.post.is_none() {
                        node.comment.post = comment.post;
                    }
                }
                Ok(id)
            }
            other => Err(composer_error(
                format!("expected a node event, but found {}", other.id()),
                other.start_mark().clone(),
            )),
        }
    }

    /// Bind an anchor to a node; reassignment warns and rebinds, so later
    /// aliases see the most recent definition.
    fn bind_anchor(&mut self, anchor: Option<String>, id: NodeId, arena: &NodeArena) {
        if let Some(name) = anchor {
            if self.anchors.contains_key(&name) {
                self.sink.borrow_mut().warn(YamlWarning::ReusedAnchor {
                    anchor: name.clone(),
                    mark: arena.get(id).start_mark.clone(),
                });
            }
            self.anchors.insert(name, id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollectSink;
    use crate::reader::Reader;
    use crate::scanner::Scanner;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn composer_for(source: &str) -> (Composer, Rc<RefCell<CollectSink>>) {
        let sink = Rc::new(RefCell::new(CollectSink::default()));
        let shared: SharedSink = sink.clone();
        let reader = Reader::from_str("<test>", source).unwrap();
        let parser = Parser::new(Scanner::new(reader));
        (Composer::new(parser, Resolver::new(), shared), sink)
    }

    #[test]
    fn composes_mapping_with_resolved_tags() {
        let (mut composer, _) = composer_for("a: 1\nb: true\nc: x\n");
        let doc = composer.compose_document().unwrap().unwrap();
        let root = doc.arena.get(doc.root);
        assert_eq!(root.tag, TAG_MAP);
        let NodeKind::Mapping { pairs, .. } = &root.kind else {
            panic!("expected mapping root");
        };
        assert_eq!(pairs.len(), 3);
        let tags: Vec<_> = pairs
            .iter()
            .map(|(_, v)| doc.arena.get(*v).tag.clone())
            .collect();
        assert_eq!(
            tags,
            vec![
                "tag:yaml.org,2002:int".to_string(),
                "tag:yaml.org,2002:bool".to_string(),
                "tag:yaml.org,2002:str".to_string(),
            ]
        );
    }

    #[test]
    fn alias_shares_the_node() {
        let (mut composer, _) = composer_for("a: &x\n  b: 1\nd: *x\n");
        let doc = composer.compose_document().unwrap().unwrap();
        let NodeKind::Mapping { pairs, .. } = &doc.arena.get(doc.root).kind else {
            panic!("expected mapping root");
        };
        assert_eq!(pairs[0].1, pairs[1].1);
    }

    #[test]
    fn alias_before_anchor_is_error() {
        let (mut composer, _) = composer_for("d: *x\na: &x 1\n");
        let err = composer.compose_document().unwrap_err();
        assert!(err.to_string().contains("undefined alias"));
    }

    #[test]
    fn reused_anchor_warns_and_rebinds() {
        let (mut composer, sink) = composer_for("- &a 1\n- *a\n- &a 2\n- *a\n");
        let doc = composer.compose_document().unwrap().unwrap();
        assert_eq!(sink.borrow().warnings.len(), 1);
        let NodeKind::Sequence { items, .. } = &doc.arena.get(doc.root).kind else {
            panic!("expected sequence root");
        };
        // first alias binds to the first definition, second to the rebound one
        assert_eq!(items[1], items[0]);
        assert_eq!(items[3], items[2]);
        assert_ne!(items[0], items[2]);
    }

    #[test]
    fn cyclic_alias_to_ancestor_composes() {
        let (mut composer, _) = composer_for("&root\na: *root\n");
        let doc = composer.compose_document().unwrap().unwrap();
        let NodeKind::Mapping { pairs, .. } = &doc.arena.get(doc.root).kind else {
            panic!("expected mapping root");
        };
        assert_eq!(pairs[0].1, doc.root);
    }

    #[test]
    fn single_document_api_rejects_second_document() {
        let (mut composer, _) = composer_for("a: 1\n---\nb: 2\n");
        let err = composer.compose_single_document().unwrap_err();
        assert!(err.to_string().contains("single document"));
    }

    #[test]
    fn compose_all_returns_each_document() {
        let (mut composer, _) = composer_for("a: 1\n---\nb: 2\n...\n");
        let docs = composer.compose_all().unwrap();
        assert_eq!(docs.len(), 2);
        assert!(!docs[0].explicit_start);
        assert!(docs[1].explicit_start);
        assert!(docs[1].explicit_end);
    }
}
