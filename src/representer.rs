/*!
 * ===============================================================================
 * yaml-roundtrip: Round-Trip Representer
 * ===============================================================================
 *
 * Values -> Nodes. Preserved metadata wins: recorded scalar styles and
 * source text, flow/block choice, anchors and merge lists are consulted
 * before any default styling. Shared containers (same `Rc`) map to the same
 * arena node, which the serializer later turns into anchors and aliases.
 */

use std::collections::HashMap;
use std::rc::Rc;

use base64::{engine::general_purpose, Engine as _};

use crate::composer::{Document, Node, NodeArena, NodeComments, NodeId, NodeKind};
use crate::error::{representer_error, Mark, YamlResult};
use crate::resolver::{
    TAG_BINARY, TAG_BOOL, TAG_FLOAT, TAG_INT, TAG_MAP, TAG_MERGE, TAG_NULL, TAG_SEQ, TAG_SET,
    TAG_STR, TAG_TIMESTAMP,
};
use crate::scanner::{CommentToken, ScalarStyle};
use crate::value::{
    CommentBundle, CommentLine, IntRadix, Map, Scalar, ScalarValue, Timestamp, Value,
};

// ===============================================================================
// REGISTRY
// ===============================================================================

pub type RepresentFn = dyn Fn(&mut Representer<'_>, &Value) -> YamlResult<NodeId>;

/// Representers indexed by value kind or explicit tag, with prefix-matched
/// multi-representers as fallback. Instances start from the shared
/// round-trip default table.
#[derive(Clone)]
pub struct RepresenterRegistry {
    by_kind: HashMap<String, Rc<RepresentFn>>,
    multi: Vec<(String, Rc<RepresentFn>)>,
}

impl RepresenterRegistry {
    pub fn round_trip_default() -> Self {
        let mut registry = Self { by_kind: HashMap::new(), multi: Vec::new() };
        registry.put("null", represent_scalar);
        registry.put("bool", represent_scalar);
        registry.put("int", represent_scalar);
        registry.put("float", represent_scalar);
        registry.put("str", represent_scalar);
        registry.put("binary", represent_scalar);
        registry.put("timestamp", represent_scalar);
        registry.put("seq", represent_seq);
        registry.put("map", represent_map);
        registry.put("set", represent_set);
        registry
    }

    fn put(&mut self, kind: &str, f: fn(&mut Representer<'_>, &Value) -> YamlResult<NodeId>) {
        self.by_kind.insert(kind.to_string(), Rc::new(f));
    }

    /// Register a node factory for a value kind or explicit tag
    pub fn add_representer(
        &mut self,
        kind: &str,
        f: impl Fn(&mut Representer<'_>, &Value) -> YamlResult<NodeId> + 'static,
    ) {
        self.by_kind.insert(kind.to_string(), Rc::new(f));
    }

    /// Register a factory for every tag sharing a prefix
    pub fn add_multi_representer(
        &mut self,
        prefix: &str,
        f: impl Fn(&mut Representer<'_>, &Value) -> YamlResult<NodeId> + 'static,
    ) {
        self.multi.push((prefix.to_string(), Rc::new(f)));
    }

    fn lookup(&self, value: &Value) -> Option<Rc<RepresentFn>> {
        if let Some(tag) = value.explicit_tag() {
            if let Some(f) = self.by_kind.get(&tag) {
                return Some(Rc::clone(f));
            }
            for (prefix, f) in &self.multi {
                if tag.starts_with(prefix.as_str()) {
                    return Some(Rc::clone(f));
                }
            }
        }
        self.by_kind.get(value.kind()).map(Rc::clone)
    }
}

// ===============================================================================
// REPRESENTER
// ===============================================================================

pub struct Representer<'a> {
    registry: &'a RepresenterRegistry,
    pub arena: NodeArena,
    represented: HashMap<usize, NodeId>,
    default_flow_style: Option<bool>,
    preserve_quotes: bool,
}

/// Build the node graph for one value
pub fn represent_document(
    value: &Value,
    registry: &RepresenterRegistry,
    default_flow_style: Option<bool>,
    preserve_quotes: bool,
) -> YamlResult<Document> {
    let mut representer = Representer {
        registry,
        arena: NodeArena::new(),
        represented: HashMap::new(),
        default_flow_style,
        preserve_quotes,
    };
    let root = representer.represent_value(value)?;
    Ok(Document {
        arena: representer.arena,
        root,
        version: None,
        tags: None,
        explicit_start: false,
        explicit_end: false,
        end_comments: Vec::new(),
    })
}

impl<'a> Representer<'a> {
    pub fn represent_value(&mut self, value: &Value) -> YamlResult<NodeId> {
        let (id, _) = self.represent_child(value)?;
        Ok(id)
    }

    /// Represent a value, reusing the node when the same shared container
    /// was seen before. Returns the node and whether it is new.
    fn represent_child(&mut self, value: &Value) -> YamlResult<(NodeId, bool)> {
        if let Some(identity) = container_identity(value) {
            if let Some(&id) = self.represented.get(&identity) {
                return Ok((id, false));
            }
        }
        let f = self
            .registry
            .lookup(value)
            .ok_or_else(|| representer_error(format!("cannot represent a {} value", value.kind())))?;
        let id = f(self, value)?;
        Ok((id, true))
    }

    pub fn default_flow_style(&self) -> Option<bool> {
        self.default_flow_style
    }

    pub fn alloc(&mut self, node: Node) -> NodeId {
        self.arena.alloc(node)
    }

    /// Pre-register a container node before its children are represented,
    /// so cyclic values resolve to the node under construction
    fn register(&mut self, value: &Value, id: NodeId) {
        if let Some(identity) = container_identity(value) {
            self.represented.insert(identity, id);
        }
    }

    /// Build a scalar node; public so custom representers can delegate
    pub fn represent_scalar_text(
        &mut self,
        tag: &str,
        text: String,
        style: ScalarStyle,
    ) -> NodeId {
        let mark = dump_mark();
        self.alloc(Node {
            kind: NodeKind::Scalar { value: text, style },
            tag: tag.to_string(),
            anchor: None,
            anchor_always: false,
            comment: NodeComments::default(),
            start_mark: mark.clone(),
            end_mark: mark,
        })
    }
}

fn container_identity(value: &Value) -> Option<usize> {
    match value {
        Value::Scalar(_) => None,
        Value::Seq(rc) => Some(Rc::as_ptr(rc) as usize),
        Value::Map(rc) => Some(Rc::as_ptr(rc) as usize),
        Value::Set(rc) => Some(Rc::as_ptr(rc) as usize),
    }
}

fn dump_mark() -> Mark {
    Mark::new(std::sync::Arc::from("<dump>"), 0, 0, 0)
}

// ===============================================================================
// COMMENT CONVERSION
// ===============================================================================

fn comment_token(line: &CommentLine) -> CommentToken {
    let mark = Mark::new(
        std::sync::Arc::from("<dump>"),
        0,
        0,
        line.column.unwrap_or(0),
    );
    CommentToken {
        value: line.text.clone(),
        blank: line.blank,
        start_mark: mark.clone(),
        end_mark: mark,
    }
}

fn comment_tokens(lines: &[CommentLine]) -> Vec<CommentToken> {
    lines.iter().map(comment_token).collect()
}

fn node_comments(bundle: &CommentBundle) -> NodeComments {
    NodeComments {
        pre: comment_tokens(&bundle.before),
        post: bundle.inline.as_ref().map(comment_token),
        end: comment_tokens(&bundle.end),
        after: comment_tokens(&bundle.after),
    }
}

/// Entry-slot comments attach to the freshly built child nodes; shared
/// (aliased) nodes keep the comments of their first occurrence.
fn attach_entry_comments(
    arena: &mut NodeArena,
    key_id: NodeId,
    value_id: Option<(NodeId, bool)>,
    comment: &CommentBundle,
    pending_before: &mut Vec<CommentLine>,
) {
    let key_node = arena.get_mut(key_id);
    let mut before = std::mem::take(pending_before);
    before.extend(comment.before.iter().cloned());
    key_node.comment.pre = comment_tokens(&before);
    if let Some(inline) = &comment.inline {
        match value_id {
            Some((value_id, true)) => {
                arena.get_mut(value_id).comment.post = Some(comment_token(inline));
            }
            _ => {
                arena.get_mut(key_id).comment.post = Some(comment_token(inline));
            }
        }
    }
    *pending_before = comment.after.clone();
}

// ===============================================================================
// SCALARS
// ===============================================================================

fn represent_scalar(r: &mut Representer<'_>, value: &Value) -> YamlResult<NodeId> {
    let Value::Scalar(scalar) = value else {
        return Err(representer_error("scalar representer on non-scalar value"));
    };
    let (core_tag, text) = scalar_text(scalar);
    let tag = scalar.tag.clone().unwrap_or_else(|| core_tag.to_string());
    let style = if r.preserve_quotes || !scalar.style.is_quoted() {
        scalar.style
    } else {
        ScalarStyle::Plain
    };
    let id = r.represent_scalar_text(&tag, text, style);
    let node = r.arena.get_mut(id);
    if let Some(anchor) = &scalar.anchor {
        node.anchor = Some(anchor.name.clone());
        node.anchor_always = anchor.always_dump;
    }
    node.comment = node_comments(&scalar.comment);
    Ok(id)
}

/// Core tag and output text for a scalar, preferring the recorded source
/// text, then the recorded format hint
fn scalar_text(scalar: &Scalar) -> (&'static str, String) {
    match &scalar.value {
        ScalarValue::Null => (TAG_NULL, scalar.src.clone().unwrap_or_default()),
        ScalarValue::Bool(b) => (
            TAG_BOOL,
            scalar.src.clone().unwrap_or_else(|| b.to_string()),
        ),
        ScalarValue::Int { value, radix } => (
            TAG_INT,
            scalar.src.clone().unwrap_or_else(|| render_int(*value, *radix)),
        ),
        ScalarValue::Float(v) => (
            TAG_FLOAT,
            scalar.src.clone().unwrap_or_else(|| render_float(*v)),
        ),
        ScalarValue::Str(s) => (TAG_STR, s.clone()),
        ScalarValue::Binary(bytes) => (
            TAG_BINARY,
            scalar
                .src
                .clone()
                .unwrap_or_else(|| general_purpose::STANDARD.encode(bytes)),
        ),
        ScalarValue::Timestamp(ts) => (
            TAG_TIMESTAMP,
            scalar.src.clone().unwrap_or_else(|| render_timestamp(ts)),
        ),
    }
}

fn render_int(value: i64, radix: IntRadix) -> String {
    match radix {
        IntRadix::Dec => value.to_string(),
        IntRadix::Hex => {
            if value < 0 {
                format!("-0x{:x}", -(value as i128))
            } else {
                format!("0x{:x}", value)
            }
        }
        IntRadix::Oct => {
            if value < 0 {
                format!("-0o{:o}", -(value as i128))
            } else {
                format!("0o{:o}", value)
            }
        }
        IntRadix::Bin => {
            if value < 0 {
                format!("-0b{:b}", -(value as i128))
            } else {
                format!("0b{:b}", value)
            }
        }
        IntRadix::Sexagesimal => {
            let sign = if value < 0 { "-" } else { "" };
            let mut rest = value.unsigned_abs();
            let mut parts = Vec::new();
            while rest >= 60 {
                parts.push(format!("{:02}", rest % 60));
                rest /= 60;
            }
            parts.push(rest.to_string());
            parts.reverse();
            format!("{}{}", sign, parts.join(":"))
        }
    }
}

fn render_float(value: f64) -> String {
    if value.is_nan() {
        return ".nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { ".inf" } else { "-.inf" }.to_string();
    }
    let text = value.to_string();
    if text.contains('.') || text.contains('e') || text.contains('E') {
        text
    } else {
        format!("{}.0", text)
    }
}

fn render_timestamp(ts: &Timestamp) -> String {
    match ts {
        Timestamp::Date(date) => date.format("%Y-%m-%d").to_string(),
        Timestamp::Naive(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
        Timestamp::Zoned(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.f%:z").to_string(),
    }
}

// ===============================================================================
// COLLECTIONS
// ===============================================================================

fn represent_seq(r: &mut Representer<'_>, value: &Value) -> YamlResult<NodeId> {
    let Value::Seq(rc) = value else {
        return Err(representer_error("sequence representer on non-sequence value"));
    };
    let seq = rc.borrow();
    let mark = dump_mark();
    let id = r.alloc(Node {
        kind: NodeKind::Sequence {
            items: Vec::new(),
            flow_style: seq.flow_style.or(r.default_flow_style),
        },
        tag: seq.tag.clone().unwrap_or_else(|| TAG_SEQ.to_string()),
        anchor: seq.anchor.as_ref().map(|a| a.name.clone()),
        anchor_always: seq.anchor.as_ref().map(|a| a.always_dump).unwrap_or(false),
        comment: node_comments(&seq.comment),
        start_mark: mark.clone(),
        end_mark: mark,
    });
    r.register(value, id);
    let mut pending_before: Vec<CommentLine> = Vec::new();
    for item in &seq.items {
        let (child, new) = r.represent_child(&item.value)?;
        if new {
            let mut before = std::mem::take(&mut pending_before);
            before.extend(item.comment.before.iter().cloned());
            let child_node = r.arena.get_mut(child);
            let mut pre = comment_tokens(&before);
            pre.append(&mut child_node.comment.pre);
            child_node.comment.pre = pre;
            if let Some(inline) = &item.comment.inline {
                child_node.comment.post = Some(comment_token(inline));
            }
            pending_before = item.comment.after.clone();
        }
        let NodeKind::Sequence { items, .. } = &mut r.arena.get_mut(id).kind else {
            unreachable!("sequence node changed kind");
        };
        items.push(child);
    }
    if !pending_before.is_empty() {
        let node = r.arena.get_mut(id);
        let mut extra = comment_tokens(&pending_before);
        extra.append(&mut node.comment.end);
        node.comment.end = extra;
    }
    Ok(id)
}

fn represent_map(r: &mut Representer<'_>, value: &Value) -> YamlResult<NodeId> {
    let Value::Map(rc) = value else {
        return Err(representer_error("mapping representer on non-mapping value"));
    };
    let map = rc.borrow();
    if map.tag.as_deref() == Some(crate::resolver::TAG_OMAP) {
        return represent_omap(r, value, &map);
    }
    let mark = dump_mark();
    let id = r.alloc(Node {
        kind: NodeKind::Mapping {
            pairs: Vec::new(),
            flow_style: map.flow_style.or(r.default_flow_style),
        },
        tag: map.tag.clone().unwrap_or_else(|| TAG_MAP.to_string()),
        anchor: map.anchor.as_ref().map(|a| a.name.clone()),
        anchor_always: map.anchor.as_ref().map(|a| a.always_dump).unwrap_or(false),
        comment: node_comments(&map.comment),
        start_mark: mark.clone(),
        end_mark: mark,
    });
    r.register(value, id);

    let mut pending_before: Vec<CommentLine> = Vec::new();
    let mut merge_cursor = 0usize;
    let entries = map.entries();
    for position in 0..=entries.len() {
        // merge records interleave with own entries at their recorded index
        while merge_cursor < map.merges.len() && map.merges[merge_cursor].index == position {
            let merge = &map.merges[merge_cursor];
            merge_cursor += 1;
            let key_id =
                r.represent_scalar_text(TAG_MERGE, "<<".to_string(), ScalarStyle::Plain);
            let value_id = if merge.maps.len() == 1 {
                let target = Value::Map(Rc::clone(&merge.maps[0]));
                let (vid, _) = r.represent_child(&target)?;
                vid
            } else {
                let mark = dump_mark();
                let seq_id = r.alloc(Node {
                    kind: NodeKind::Sequence { items: Vec::new(), flow_style: Some(true) },
                    tag: TAG_SEQ.to_string(),
                    anchor: None,
                    anchor_always: false,
                    comment: NodeComments::default(),
                    start_mark: mark.clone(),
                    end_mark: mark,
                });
                for target in &merge.maps {
                    let (vid, _) = r.represent_child(&Value::Map(Rc::clone(target)))?;
                    let NodeKind::Sequence { items, .. } = &mut r.arena.get_mut(seq_id).kind
                    else {
                        unreachable!("merge sequence changed kind");
                    };
                    items.push(vid);
                }
                seq_id
            };
            attach_entry_comments(
                &mut r.arena,
                key_id,
                None,
                &merge.comment,
                &mut pending_before,
            );
            let NodeKind::Mapping { pairs, .. } = &mut r.arena.get_mut(id).kind else {
                unreachable!("mapping node changed kind");
            };
            pairs.push((key_id, value_id));
        }
        if position == entries.len() {
            break;
        }
        let entry = &entries[position];
        let (key_id, _) = r.represent_child(&entry.key_value)?;
        let value_child = r.represent_child(&entry.value)?;
        attach_entry_comments(
            &mut r.arena,
            key_id,
            Some(value_child),
            &entry.comment,
            &mut pending_before,
        );
        let NodeKind::Mapping { pairs, .. } = &mut r.arena.get_mut(id).kind else {
            unreachable!("mapping node changed kind");
        };
        pairs.push((key_id, value_child.0));
    }
    if !pending_before.is_empty() {
        let node = r.arena.get_mut(id);
        let mut extra = comment_tokens(&pending_before);
        extra.append(&mut node.comment.end);
        node.comment.end = extra;
    }
    Ok(id)
}

/// `!!omap` re-emits as a sequence of single-pair mappings
fn represent_omap(
    r: &mut Representer<'_>,
    value: &Value,
    map: &Map,
) -> YamlResult<NodeId> {
    let mark = dump_mark();
    let id = r.alloc(Node {
        kind: NodeKind::Sequence {
            items: Vec::new(),
            flow_style: map.flow_style.or(r.default_flow_style),
        },
        tag: crate::resolver::TAG_OMAP.to_string(),
        anchor: map.anchor.as_ref().map(|a| a.name.clone()),
        anchor_always: map.anchor.as_ref().map(|a| a.always_dump).unwrap_or(false),
        comment: node_comments(&map.comment),
        start_mark: mark.clone(),
        end_mark: mark,
    });
    r.register(value, id);
    for entry in map.entries() {
        let (key_id, _) = r.represent_child(&entry.key_value)?;
        let (value_id, _) = r.represent_child(&entry.value)?;
        let mark = dump_mark();
        let pair_id = r.alloc(Node {
            kind: NodeKind::Mapping {
                pairs: vec![(key_id, value_id)],
                flow_style: Some(false),
            },
            tag: TAG_MAP.to_string(),
            anchor: None,
            anchor_always: false,
            comment: NodeComments::default(),
            start_mark: mark.clone(),
            end_mark: mark,
        });
        let NodeKind::Sequence { items, .. } = &mut r.arena.get_mut(id).kind else {
            unreachable!("omap sequence changed kind");
        };
        items.push(pair_id);
    }
    Ok(id)
}

fn represent_set(r: &mut Representer<'_>, value: &Value) -> YamlResult<NodeId> {
    let Value::Set(rc) = value else {
        return Err(representer_error("set representer on non-set value"));
    };
    let set = rc.borrow();
    let mark = dump_mark();
    let id = r.alloc(Node {
        kind: NodeKind::Mapping {
            pairs: Vec::new(),
            flow_style: set.flow_style.or(r.default_flow_style),
        },
        tag: TAG_SET.to_string(),
        anchor: set.anchor.as_ref().map(|a| a.name.clone()),
        anchor_always: set.anchor.as_ref().map(|a| a.always_dump).unwrap_or(false),
        comment: node_comments(&set.comment),
        start_mark: mark.clone(),
        end_mark: mark,
    });
    r.register(value, id);
    let mut pending_before: Vec<CommentLine> = Vec::new();
    for entry in set.entries() {
        let (key_id, _) = r.represent_child(&entry.key_value)?;
        let null_id = r.represent_scalar_text(TAG_NULL, String::new(), ScalarStyle::Plain);
        attach_entry_comments(&mut r.arena, key_id, None, &entry.comment, &mut pending_before);
        let NodeKind::Mapping { pairs, .. } = &mut r.arena.get_mut(id).kind else {
            unreachable!("set node changed kind");
        };
        pairs.push((key_id, null_id));
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Seq;

    fn represent(value: &Value) -> Document {
        let registry = RepresenterRegistry::round_trip_default();
        represent_document(value, &registry, None, true).unwrap()
    }

    #[test]
    fn shared_containers_share_nodes() {
        let inner = Value::new_seq(Seq::new());
        let mut outer = Seq::new();
        outer.push(inner.clone());
        outer.push(inner);
        let doc = represent(&Value::new_seq(outer));
        let NodeKind::Sequence { items, .. } = &doc.arena.get(doc.root).kind else {
            panic!("expected sequence root");
        };
        assert_eq!(items[0], items[1]);
    }

    #[test]
    fn int_radix_renders_without_source() {
        assert_eq!(render_int(26, IntRadix::Hex), "0x1a");
        assert_eq!(render_int(15, IntRadix::Oct), "0o17");
        assert_eq!(render_int(5, IntRadix::Bin), "0b101");
        assert_eq!(render_int(45296, IntRadix::Sexagesimal), "12:34:56");
        assert_eq!(render_int(-7, IntRadix::Dec), "-7");
    }

    #[test]
    fn float_rendering_keeps_float_shape() {
        assert_eq!(render_float(3.5), "3.5");
        assert_eq!(render_float(3.0), "3.0");
        assert_eq!(render_float(f64::INFINITY), ".inf");
        assert_eq!(render_float(f64::NEG_INFINITY), "-.inf");
        assert_eq!(render_float(f64::NAN), ".nan");
    }

    #[test]
    fn merge_entries_reappear_in_pairs() {
        let mut base = Map::new();
        base.insert_str("x", Value::Scalar(Scalar::int(1)));
        base.set_anchor("BASE", false);
        let base = Rc::new(std::cell::RefCell::new(base));
        let mut map = Map::new();
        map.add_merge(0, Rc::clone(&base));
        map.insert_str("r", Value::Scalar(Scalar::int(10)));
        let doc = represent(&Value::new_map(map));
        let NodeKind::Mapping { pairs, .. } = &doc.arena.get(doc.root).kind else {
            panic!("expected mapping root");
        };
        assert_eq!(pairs.len(), 2);
        let merge_key = doc.arena.get(pairs[0].0);
        assert_eq!(merge_key.scalar_value(), Some("<<"));
        assert_eq!(merge_key.tag, TAG_MERGE);
    }
}
