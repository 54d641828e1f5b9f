/*!
 * ===============================================================================
 * yaml-roundtrip: Serializer
 * ===============================================================================
 *
 * Node graph -> Events. A prescan counts how often each arena node is
 * reachable; nodes seen more than once (or flagged always-dump) get an
 * anchor, keeping their recorded name when they have one and drawing fresh
 * `id%03d` names otherwise. Re-encounters emit aliases.
 */

use std::collections::{HashMap, HashSet};

use crate::composer::{Document, NodeId, NodeKind};
use crate::error::{serializer_error, YamlResult};
use crate::parser::Event;
use crate::resolver::{Resolver, TAG_MAP, TAG_SEQ, TAG_STR};
use crate::scanner::TokenComments;

/// Generated anchor names follow this shape, counting from id001
pub const ANCHOR_TEMPLATE: &str = "id%03d";

/// True for names the generator could have produced (three or more digits
/// after `id`, but not the literal `id000`); such anchors are dropped on
/// construction and renumbered densely on output.
pub fn templated_id(name: &str) -> bool {
    let Some(digits) = name.strip_prefix("id") else {
        return false;
    };
    digits.len() >= 3 && digits.bytes().all(|b| b.is_ascii_digit()) && digits != "000"
}

pub struct Serializer {
    resolver: Resolver,
    version: Option<(u32, u32)>,
    explicit_start: bool,
    explicit_end: bool,
    refs: HashMap<usize, usize>,
    anchors: HashMap<usize, Option<String>>,
    serialized: HashSet<usize>,
    used_names: HashSet<String>,
    last_anchor_id: usize,
}

impl Serializer {
    pub fn new(resolver: Resolver) -> Self {
        Self {
            resolver,
            version: None,
            explicit_start: false,
            explicit_end: false,
            refs: HashMap::new(),
            anchors: HashMap::new(),
            serialized: HashSet::new(),
            used_names: HashSet::new(),
            last_anchor_id: 0,
        }
    }

    pub fn with_version(mut self, version: Option<(u32, u32)>) -> Self {
        self.version = version;
        self
    }

    pub fn with_explicit_start(mut self, explicit: bool) -> Self {
        self.explicit_start = explicit;
        self
    }

    pub fn with_explicit_end(mut self, explicit: bool) -> Self {
        self.explicit_end = explicit;
        self
    }

    /// Serialize a full stream of documents
    pub fn serialize_stream(&mut self, documents: &[Document]) -> YamlResult<Vec<Event>> {
        let mut events = Vec::new();
        let mark = dump_mark();
        events.push(Event::StreamStart {
            start_mark: mark.clone(),
            end_mark: mark.clone(),
            encoding: None,
        });
        for (index, document) in documents.iter().enumerate() {
            // a second document always needs an explicit start marker
            let force_explicit = index > 0;
            self.serialize_document(document, force_explicit, &mut events)?;
        }
        events.push(Event::StreamEnd { start_mark: mark.clone(), end_mark: mark });
        Ok(events)
    }

    fn serialize_document(
        &mut self,
        document: &Document,
        force_explicit: bool,
        events: &mut Vec<Event>,
    ) -> YamlResult<()> {
        self.refs.clear();
        self.anchors.clear();
        self.serialized.clear();
        self.used_names.clear();
        self.last_anchor_id = 0;

        self.count_refs(document, document.root);
        self.reserve_names(document);

        let mark = dump_mark();
        events.push(Event::DocumentStart {
            start_mark: mark.clone(),
            end_mark: mark.clone(),
            explicit: self.explicit_start || force_explicit,
            version: self.version,
            tags: document.tags.clone(),
            comment: TokenComments::default(),
        });
        self.serialize_node(document, document.root, events)?;
        let mut end_comment = TokenComments::default();
        end_comment.pre = document.arena.get(document.root).comment.after.clone();
        end_comment.pre.extend(document.end_comments.iter().cloned());
        events.push(Event::DocumentEnd {
            start_mark: mark.clone(),
            end_mark: mark,
            explicit: self.explicit_end,
            comment: end_comment,
        });
        Ok(())
    }

    // ===================================================================
    // ANCHOR ASSIGNMENT
    // ===================================================================

    fn count_refs(&mut self, document: &Document, id: NodeId) {
        let count = self.refs.entry(id.0).or_insert(0);
        *count += 1;
        if *count > 1 {
            return;
        }
        match &document.arena.get(id).kind {
            NodeKind::Scalar { .. } => {}
            NodeKind::Sequence { items, .. } => {
                for &item in items {
                    self.count_refs(document, item);
                }
            }
            NodeKind::Mapping { pairs, .. } => {
                for &(key, value) in pairs {
                    self.count_refs(document, key);
                    self.count_refs(document, value);
                }
            }
        }
    }

    /// Pre-claim the explicit anchor names that will be emitted, so
    /// generated names cannot collide with them
    fn reserve_names(&mut self, document: &Document) {
        for (&id, &count) in &self.refs {
            let node = document.arena.get(NodeId(id));
            if count > 1 || node.anchor_always {
                if let Some(name) = &node.anchor {
                    self.used_names.insert(name.clone());
                }
            }
        }
    }

    fn anchor_for(&mut self, document: &Document, id: NodeId) -> Option<String> {
        let node = document.arena.get(id);
        let referenced = self.refs.get(&id.0).copied().unwrap_or(0) > 1;
        if !referenced && !node.anchor_always {
            return None;
        }
        let name = match &node.anchor {
            Some(name) => name.clone(),
            None => self.generate_anchor(),
        };
        self.anchors.insert(id.0, Some(name.clone()));
        Some(name)
    }

    fn generate_anchor(&mut self) -> String {
        loop {
            self.last_anchor_id += 1;
            let name = format!("id{:03}", self.last_anchor_id);
            if self.used_names.insert(name.clone()) {
                return name;
            }
        }
    }

    // ===================================================================
    // NODE SERIALIZATION
    // ===================================================================

    fn serialize_node(
        &mut self,
        document: &Document,
        id: NodeId,
        events: &mut Vec<Event>,
    ) -> YamlResult<()> {
        if self.serialized.contains(&id.0) {
            let name = self
                .anchors
                .get(&id.0)
                .cloned()
                .flatten()
                .ok_or_else(|| {
                    serializer_error("node revisited without an assigned anchor")
                })?;
            let mark = dump_mark();
            events.push(Event::Alias {
                anchor: name,
                start_mark: mark.clone(),
                end_mark: mark,
                comment: TokenComments::default(),
            });
            return Ok(());
        }
        self.serialized.insert(id.0);
        let anchor = self.anchor_for(document, id);
        let node = document.arena.get(id);
        let comment = TokenComments {
            post: node.comment.post.clone(),
            pre: node.comment.pre.clone(),
        };
        match &node.kind {
            NodeKind::Scalar { value, style } => {
                let plain_ok =
                    node.tag == self.resolver.resolve_scalar(value, self.version);
                let quoted_ok = node.tag == TAG_STR;
                events.push(Event::Scalar {
                    anchor,
                    tag: Some(node.tag.clone()),
                    implicit: (plain_ok, quoted_ok),
                    value: value.clone(),
                    start_mark: node.start_mark.clone(),
                    end_mark: node.end_mark.clone(),
                    style: Some(*style),
                    comment,
                });
            }
            NodeKind::Sequence { items, flow_style } => {
                events.push(Event::SequenceStart {
                    anchor,
                    tag: Some(node.tag.clone()),
                    implicit: node.tag == TAG_SEQ,
                    start_mark: node.start_mark.clone(),
                    end_mark: node.end_mark.clone(),
                    flow_style: *flow_style,
                    comment,
                });
                let items = items.clone();
                for item in items {
                    self.serialize_node(document, item, events)?;
                }
                let mark = dump_mark();
                let mut end_comment = TokenComments::default();
                end_comment.pre = document.arena.get(id).comment.end.clone();
                events.push(Event::SequenceEnd {
                    start_mark: mark.clone(),
                    end_mark: mark,
                    comment: end_comment,
                });
            }
            NodeKind::Mapping { pairs, flow_style } => {
                events.push(Event::MappingStart {
                    anchor,
                    tag: Some(node.tag.clone()),
                    implicit: node.tag == TAG_MAP,
                    start_mark: node.start_mark.clone(),
                    end_mark: node.end_mark.clone(),
                    flow_style: *flow_style,
                    comment,
                });
                let pairs = pairs.clone();
                for (key, value) in pairs {
                    self.serialize_node(document, key, events)?;
                    self.serialize_node(document, value, events)?;
                }
                let mark = dump_mark();
                let mut end_comment = TokenComments::default();
                end_comment.pre = document.arena.get(id).comment.end.clone();
                events.push(Event::MappingEnd {
                    start_mark: mark.clone(),
                    end_mark: mark,
                    comment: end_comment,
                });
            }
        }
        Ok(())
    }
}

fn dump_mark() -> crate::error::Mark {
    crate::error::Mark::new(std::sync::Arc::from("<dump>"), 0, 0, 0)
}
