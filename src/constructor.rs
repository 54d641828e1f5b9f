/*!
 * ===============================================================================
 * yaml-roundtrip: Round-Trip Constructor
 * ===============================================================================
 *
 * Nodes -> annotated values. Containers are built in two phases: the shell
 * is published first (so aliases into a node's own subtree resolve to the
 * same instance), then a queued populate step fills it. The queue drains in
 * insertion order before a document root is returned, which gives cycle
 * support without coroutines.
 */

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use std::sync::OnceLock;

use crate::composer::{Document, Node, NodeId, NodeKind};
use crate::error::{constructor_error, SharedSink, YamlResult, YamlWarning};
use crate::resolver::{
    TAG_BINARY, TAG_BOOL, TAG_FLOAT, TAG_INT, TAG_MAP, TAG_MERGE, TAG_NULL, TAG_OMAP,
    TAG_PAIRS, TAG_SEQ, TAG_SET, TAG_STR, TAG_TIMESTAMP, TAG_VALUE,
};
use crate::serializer::templated_id;
use crate::value::{
    CommentBundle, CommentLine, IntRadix, Map, MapEntry, MergeEntry, Scalar, ScalarValue, Seq,
    SeqItem, Set, Timestamp, Value,
};

// ===============================================================================
// REGISTRY
// ===============================================================================

pub type ConstructFn = dyn Fn(&mut RoundTripConstructor<'_>, NodeId) -> YamlResult<Value>;
pub type MultiConstructFn =
    dyn Fn(&mut RoundTripConstructor<'_>, &str, NodeId) -> YamlResult<Value>;

/// Tag-indexed constructor table with prefix-matched multi-constructors.
/// Instances start from the shared round-trip default table.
#[derive(Clone)]
pub struct ConstructorRegistry {
    constructors: HashMap<String, Rc<ConstructFn>>,
    multi: Vec<(String, Rc<MultiConstructFn>)>,
}

impl ConstructorRegistry {
    pub fn round_trip_default() -> Self {
        let mut registry = Self { constructors: HashMap::new(), multi: Vec::new() };
        registry.put(TAG_NULL, construct_yaml_null);
        registry.put(TAG_BOOL, construct_yaml_bool);
        registry.put(TAG_INT, construct_yaml_int);
        registry.put(TAG_FLOAT, construct_yaml_float);
        registry.put(TAG_STR, construct_yaml_str);
        registry.put(TAG_VALUE, construct_yaml_str);
        registry.put(TAG_MERGE, construct_yaml_str);
        registry.put(TAG_BINARY, construct_yaml_binary);
        registry.put(TAG_TIMESTAMP, construct_yaml_timestamp);
        registry.put(TAG_SEQ, construct_yaml_seq);
        registry.put(TAG_MAP, construct_yaml_map);
        registry.put(TAG_OMAP, construct_yaml_omap);
        registry.put(TAG_PAIRS, construct_yaml_pairs);
        registry.put(TAG_SET, construct_yaml_set);
        registry
    }

    fn put(
        &mut self,
        tag: &str,
        f: fn(&mut RoundTripConstructor<'_>, NodeId) -> YamlResult<Value>,
    ) {
        self.constructors.insert(tag.to_string(), Rc::new(f));
    }

    /// Register a value factory for an exact tag
    pub fn add_constructor(
        &mut self,
        tag: &str,
        f: impl Fn(&mut RoundTripConstructor<'_>, NodeId) -> YamlResult<Value> + 'static,
    ) {
        self.constructors.insert(tag.to_string(), Rc::new(f));
    }

    /// Register a factory for every tag sharing a prefix; the factory
    /// receives the remainder of the tag
    pub fn add_multi_constructor(
        &mut self,
        prefix: &str,
        f: impl Fn(&mut RoundTripConstructor<'_>, &str, NodeId) -> YamlResult<Value> + 'static,
    ) {
        self.multi.push((prefix.to_string(), Rc::new(f)));
    }

    fn lookup(&self, tag: &str) -> Option<Dispatch> {
        if let Some(f) = self.constructors.get(tag) {
            return Some(Dispatch::Exact(Rc::clone(f)));
        }
        for (prefix, f) in &self.multi {
            if let Some(suffix) = tag.strip_prefix(prefix.as_str()) {
                return Some(Dispatch::Multi(suffix.to_string(), Rc::clone(f)));
            }
        }
        None
    }
}

enum Dispatch {
    Exact(Rc<ConstructFn>),
    Multi(String, Rc<MultiConstructFn>),
}

// ===============================================================================
// CONSTRUCTOR
// ===============================================================================

type DeferredStep<'a> = Box<dyn FnOnce(&mut RoundTripConstructor<'a>) -> YamlResult<()> + 'a>;

pub struct RoundTripConstructor<'a> {
    doc: &'a Document,
    registry: &'a ConstructorRegistry,
    allow_duplicate_keys: bool,
    sink: SharedSink,
    constructed: HashMap<usize, Value>,
    recursive: HashSet<usize>,
    deferred: Vec<DeferredStep<'a>>,
}

/// Materialize one composed document into an annotated value
pub fn construct_document(
    doc: &Document,
    registry: &ConstructorRegistry,
    allow_duplicate_keys: bool,
    sink: SharedSink,
) -> YamlResult<Value> {
    let mut constructor = RoundTripConstructor {
        doc,
        registry,
        allow_duplicate_keys,
        sink,
        constructed: HashMap::new(),
        recursive: HashSet::new(),
        deferred: Vec::new(),
    };
    let mut root = constructor.construct_object(doc.root)?;
    constructor.drain_deferred(0)?;

    // containers own their comments; a scalar root has no parent slot, so
    // its node comments land here, and trailing document comments follow
    // the root either way
    let root_node = doc.arena.get(doc.root);
    match &mut root {
        Value::Scalar(scalar) => {
            let mut bundle = bundle_from_node(root_node);
            for token in &doc.end_comments {
                bundle.after.push(CommentLine::from(token));
            }
            if !bundle.is_empty() {
                merge_bundle(&mut scalar.comment, bundle);
            }
        }
        other => {
            if !doc.end_comments.is_empty() {
                let mut bundle = CommentBundle::default();
                for token in &doc.end_comments {
                    bundle.after.push(CommentLine::from(token));
                }
                attach_bundle(other, bundle);
            }
        }
    }
    Ok(root)
}

impl<'a> RoundTripConstructor<'a> {
    pub fn document(&self) -> &'a Document {
        self.doc
    }

    pub fn node(&self, id: NodeId) -> &'a Node {
        self.doc.arena.get(id)
    }

    /// Scalar text of a node, for custom constructors
    pub fn scalar_text(&self, id: NodeId) -> YamlResult<String> {
        let node = self.node(id);
        match node.scalar_value() {
            Some(text) => Ok(text.to_string()),
            None => Err(constructor_error(
                "while constructing a scalar",
                None,
                format!("expected a scalar node, but found {}", node.id()),
                Some(node.start_mark.clone()),
            )),
        }
    }

    pub fn construct_object(&mut self, id: NodeId) -> YamlResult<Value> {
        if let Some(value) = self.constructed.get(&id.0) {
            return Ok(value.clone());
        }
        if self.recursive.contains(&id.0) {
            let node = self.node(id);
            return Err(constructor_error(
                "while constructing a document",
                None,
                "found unconstructable recursive node",
                Some(node.start_mark.clone()),
            ));
        }
        self.recursive.insert(id.0);
        let tag = self.node(id).tag.clone();
        let value = match self.registry.lookup(&tag) {
            Some(Dispatch::Exact(f)) => f(self, id)?,
            Some(Dispatch::Multi(suffix, f)) => f(self, &suffix, id)?,
            None => self.construct_unknown(id)?,
        };
        self.constructed.insert(id.0, value.clone());
        self.recursive.remove(&id.0);
        Ok(value)
    }

    /// Construct a node and fully populate it (container keys need their
    /// contents before they can be hashed)
    pub fn construct_object_deep(&mut self, id: NodeId) -> YamlResult<Value> {
        let watermark = self.deferred.len();
        let value = self.construct_object(id)?;
        self.drain_deferred(watermark)?;
        Ok(value)
    }

    /// Build the mapping content of a node directly, for custom
    /// constructors that interpret tagged mappings themselves
    pub fn construct_mapping(&mut self, id: NodeId) -> YamlResult<Value> {
        let watermark = self.deferred.len();
        let value = construct_yaml_map(self, id)?;
        self.drain_deferred(watermark)?;
        Ok(value)
    }

    /// Build the sequence content of a node directly
    pub fn construct_sequence(&mut self, id: NodeId) -> YamlResult<Value> {
        let watermark = self.deferred.len();
        let value = construct_yaml_seq(self, id)?;
        self.drain_deferred(watermark)?;
        Ok(value)
    }

    fn drain_deferred(&mut self, watermark: usize) -> YamlResult<()> {
        while self.deferred.len() > watermark {
            let steps = self.deferred.split_off(watermark);
            for step in steps {
                step(self)?;
            }
        }
        Ok(())
    }

    fn defer(&mut self, step: DeferredStep<'a>) {
        self.deferred.push(step);
    }

    /// Publish a container shell under its node id so reentrant lookups
    /// during population return the same instance
    fn publish(&mut self, id: NodeId, value: Value) {
        self.constructed.insert(id.0, value);
    }

    /// Tags without a registered constructor are preserved as explicitly
    /// tagged values, so unknown-tagged documents still round-trip
    fn construct_unknown(&mut self, id: NodeId) -> YamlResult<Value> {
        let node = self.node(id);
        let tag = node.tag.clone();
        match &node.kind {
            NodeKind::Scalar { value, style } => {
                let mut scalar = Scalar::new(ScalarValue::Str(value.clone()), *style);
                scalar.src = Some(value.clone());
                scalar.tag = Some(tag);
                scalar.anchor = keep_anchor(node);
                Ok(Value::Scalar(scalar))
            }
            NodeKind::Sequence { .. } => {
                let value = construct_yaml_seq(self, id)?;
                if let Value::Seq(seq) = &value {
                    seq.borrow_mut().tag = Some(tag);
                }
                Ok(value)
            }
            NodeKind::Mapping { .. } => {
                let value = construct_yaml_map(self, id)?;
                if let Value::Map(map) = &value {
                    map.borrow_mut().tag = Some(tag);
                }
                Ok(value)
            }
        }
    }

    // ===================================================================
    // MAPPING POPULATION
    // ===================================================================

    /// Split `<<` entries from the pair list without flattening: each one
    /// becomes a merge record pointing at the constructed mapping(s).
    fn flatten_mapping(
        &mut self,
        id: NodeId,
    ) -> YamlResult<(Vec<(NodeId, NodeId)>, Vec<MergeEntry>)> {
        let node = self.node(id);
        let NodeKind::Mapping { pairs, .. } = &node.kind else {
            return Err(constructor_error(
                "while constructing a mapping",
                None,
                format!("expected a mapping node, but found {}", node.id()),
                Some(node.start_mark.clone()),
            ));
        };
        let pairs = pairs.clone();
        let node_mark = node.start_mark.clone();
        let mut own = Vec::new();
        let mut merges = Vec::new();
        for (key_id, value_id) in pairs {
            let key_node = self.node(key_id);
            if key_node.tag != TAG_MERGE {
                own.push((key_id, value_id));
                continue;
            }
            let mut entry = MergeEntry { index: own.len(), ..MergeEntry::default() };
            entry.comment.before = lines_from(&key_node.comment.pre);
            let value_node = self.node(value_id);
            if let Some(post) = &value_node.comment.post {
                entry.comment.inline = Some(CommentLine::from(post));
            }
            match &value_node.kind {
                NodeKind::Mapping { .. } => {
                    entry.maps.push(self.constructed_map(value_id, &node_mark)?);
                }
                NodeKind::Sequence { items, .. } => {
                    for item in items.clone() {
                        let item_node = self.node(item);
                        if !matches!(item_node.kind, NodeKind::Mapping { .. }) {
                            return Err(constructor_error(
                                "while constructing a mapping",
                                Some(node_mark.clone()),
                                format!(
                                    "expected a mapping for merging, but found {}",
                                    item_node.id()
                                ),
                                Some(item_node.start_mark.clone()),
                            ));
                        }
                        entry.maps.push(self.constructed_map(item, &node_mark)?);
                    }
                }
                _ => {
                    return Err(constructor_error(
                        "while constructing a mapping",
                        Some(node_mark.clone()),
                        format!(
                            "expected a mapping or list of mappings for merging, but found {}",
                            value_node.id()
                        ),
                        Some(value_node.start_mark.clone()),
                    ))
                }
            }
            merges.push(entry);
        }
        Ok((own, merges))
    }

    fn constructed_map(
        &mut self,
        id: NodeId,
        context_mark: &crate::error::Mark,
    ) -> YamlResult<Rc<std::cell::RefCell<Map>>> {
        let value = self.construct_object(id)?;
        match value.as_map() {
            Some(map) => Ok(map),
            None => Err(constructor_error(
                "while constructing a mapping",
                Some(context_mark.clone()),
                "merge target did not construct to a mapping",
                Some(self.node(id).start_mark.clone()),
            )),
        }
    }

    fn populate_mapping(&mut self, id: NodeId, map: Rc<std::cell::RefCell<Map>>) -> YamlResult<()> {
        let (own, merges) = self.flatten_mapping(id)?;
        for entry in merges {
            map.borrow_mut().add_merge_group(entry);
        }
        let node_mark = self.node(id).start_mark.clone();
        for (key_id, value_id) in own {
            let key_first = !self.constructed.contains_key(&key_id.0);
            let key_value = self.construct_object_deep(key_id)?;
            let Some(key) = key_value.to_key() else {
                return Err(constructor_error(
                    "while constructing a mapping",
                    Some(node_mark.clone()),
                    "found unhashable key",
                    Some(self.node(key_id).start_mark.clone()),
                ));
            };
            if map.borrow().contains_own(&key) {
                if !self.allow_duplicate_keys {
                    return Err(constructor_error(
                        "while constructing a mapping",
                        Some(node_mark.clone()),
                        format!("found duplicate key \"{}\"", key),
                        Some(self.node(key_id).start_mark.clone()),
                    ));
                }
                self.sink.borrow_mut().warn(YamlWarning::DuplicateKeyFuture {
                    key: key.to_string(),
                    mark: Some(self.node(key_id).start_mark.clone()),
                });
            }
            let value_first = !self.constructed.contains_key(&value_id.0);
            let value = self.construct_object(value_id)?;
            let key_node = self.node(key_id);
            let value_node = self.node(value_id);
            let value_is_scalar = matches!(value_node.kind, NodeKind::Scalar { .. });
            let mut comment = CommentBundle::default();
            if key_first {
                comment.before = lines_from(&key_node.comment.pre);
            }
            // container values carry their own bundle; the entry slot only
            // decorates scalar values, and an aliased value keeps the
            // comments of its anchor site
            if value_is_scalar && value_first {
                comment.inline = value_node
                    .comment
                    .post
                    .as_ref()
                    .or(key_node.comment.post.as_ref())
                    .map(CommentLine::from);
                comment.after = lines_from(&value_node.comment.pre);
            } else if !value_is_scalar {
                comment.inline = key_node.comment.post.as_ref().map(CommentLine::from);
            }
            let line_col =
                Some((key_node.start_mark.line, key_node.start_mark.column));
            map.borrow_mut().insert_entry(MapEntry {
                key,
                key_value,
                value,
                comment,
                line_col,
            });
        }
        Ok(())
    }
}

// ===============================================================================
// COMMENT AND ANCHOR TRANSFER
// ===============================================================================

fn lines_from(tokens: &[crate::scanner::CommentToken]) -> Vec<CommentLine> {
    tokens.iter().map(CommentLine::from).collect()
}

fn bundle_from_node(node: &Node) -> CommentBundle {
    let mut bundle = CommentBundle::default();
    bundle.before = lines_from(&node.comment.pre);
    bundle.inline = node.comment.post.as_ref().map(CommentLine::from);
    bundle
}

fn attach_bundle(value: &Value, bundle: CommentBundle) {
    match value {
        Value::Scalar(_) => {}
        Value::Seq(seq) => {
            let mut seq = seq.borrow_mut();
            merge_bundle(&mut seq.comment, bundle);
        }
        Value::Map(map) => {
            let mut map = map.borrow_mut();
            merge_bundle(&mut map.comment, bundle);
        }
        Value::Set(set) => {
            let mut set = set.borrow_mut();
            merge_bundle(&mut set.comment, bundle);
        }
    }
}

fn merge_bundle(into: &mut CommentBundle, from: CommentBundle) {
    let mut before = from.before;
    before.append(&mut into.before);
    into.before = before;
    if into.inline.is_none() {
        into.inline = from.inline;
    }
    into.after.extend(from.after);
    into.end.extend(from.end);
}

/// Anchors matching the generator template are dropped; the serializer will
/// renumber them densely on output
fn keep_anchor(node: &Node) -> Option<crate::value::Anchor> {
    node.anchor.as_ref().and_then(|name| {
        if templated_id(name) {
            None
        } else {
            Some(crate::value::Anchor::new(name.clone()))
        }
    })
}

// ===============================================================================
// SCALAR CONSTRUCTORS
// ===============================================================================

fn scalar_node<'a>(
    c: &RoundTripConstructor<'a>,
    id: NodeId,
    what: &str,
) -> YamlResult<(&'a Node, String, crate::scanner::ScalarStyle)> {
    let node = c.node(id);
    match &node.kind {
        NodeKind::Scalar { value, style } => Ok((node, value.clone(), *style)),
        _ => Err(constructor_error(
            format!("while constructing {}", what),
            None,
            format!("expected a scalar node, but found {}", node.id()),
            Some(node.start_mark.clone()),
        )),
    }
}

fn finish_scalar(node: &Node, text: String, value: ScalarValue) -> Value {
    let NodeKind::Scalar { style, .. } = node.kind else {
        unreachable!("scalar constructor on non-scalar node");
    };
    let mut scalar = Scalar::new(value, style);
    scalar.src = Some(text);
    scalar.anchor = keep_anchor(node);
    Value::Scalar(scalar)
}

fn construct_yaml_null(c: &mut RoundTripConstructor<'_>, id: NodeId) -> YamlResult<Value> {
    let (node, text, _) = scalar_node(c, id, "a null value")?;
    Ok(finish_scalar(node, text, ScalarValue::Null))
}

fn construct_yaml_bool(c: &mut RoundTripConstructor<'_>, id: NodeId) -> YamlResult<Value> {
    let (node, text, _) = scalar_node(c, id, "a boolean")?;
    let truthy = matches!(
        text.to_lowercase().as_str(),
        "yes" | "y" | "true" | "on"
    );
    Ok(finish_scalar(node, text, ScalarValue::Bool(truthy)))
}

fn construct_yaml_int(c: &mut RoundTripConstructor<'_>, id: NodeId) -> YamlResult<Value> {
    let (node, text, _) = scalar_node(c, id, "an integer")?;
    let version_1_1 = matches!(c.doc.version, Some((1, minor)) if minor < 2);
    let cleaned = text.replace('_', "");
    let (sign, body) = split_sign(&cleaned);
    let parsed: Option<(i64, IntRadix)> = if body == "0" {
        Some((0, IntRadix::Dec))
    } else if let Some(rest) = body.strip_prefix("0b") {
        i64::from_str_radix(rest, 2).ok().map(|v| (v, IntRadix::Bin))
    } else if let Some(rest) = body.strip_prefix("0x") {
        i64::from_str_radix(rest, 16).ok().map(|v| (v, IntRadix::Hex))
    } else if let Some(rest) = body.strip_prefix("0o") {
        i64::from_str_radix(rest, 8).ok().map(|v| (v, IntRadix::Oct))
    } else if body.starts_with('0') && body.len() > 1 && version_1_1 {
        // 1.1 treats a leading zero as octal; 1.2 reads it as decimal
        i64::from_str_radix(&body[1..], 8).ok().map(|v| (v, IntRadix::Oct))
    } else if body.contains(':') {
        parse_sexagesimal_int(body).map(|v| (v, IntRadix::Sexagesimal))
    } else {
        body.parse::<i64>().ok().map(|v| (v, IntRadix::Dec))
    };
    match parsed {
        Some((value, radix)) => Ok(finish_scalar(
            node,
            text,
            ScalarValue::Int { value: sign * value, radix },
        )),
        None => Err(constructor_error(
            "while constructing an integer",
            None,
            format!("could not parse integer {:?}", text),
            Some(node.start_mark.clone()),
        )),
    }
}

fn construct_yaml_float(c: &mut RoundTripConstructor<'_>, id: NodeId) -> YamlResult<Value> {
    let (node, text, _) = scalar_node(c, id, "a float")?;
    let cleaned = text.replace('_', "").to_lowercase();
    let (sign, body) = split_sign(&cleaned);
    let parsed: Option<f64> = if body == ".inf" {
        Some(f64::INFINITY)
    } else if body == ".nan" {
        Some(f64::NAN)
    } else if body.contains(':') {
        parse_sexagesimal_float(body)
    } else {
        body.parse::<f64>().ok()
    };
    match parsed {
        Some(value) => Ok(finish_scalar(
            node,
            text,
            ScalarValue::Float(sign as f64 * value),
        )),
        None => Err(constructor_error(
            "while constructing a float",
            None,
            format!("could not parse float {:?}", text),
            Some(node.start_mark.clone()),
        )),
    }
}

fn construct_yaml_str(c: &mut RoundTripConstructor<'_>, id: NodeId) -> YamlResult<Value> {
    let (node, text, _) = scalar_node(c, id, "a string")?;
    Ok(finish_scalar(node, text.clone(), ScalarValue::Str(text)))
}

fn construct_yaml_binary(c: &mut RoundTripConstructor<'_>, id: NodeId) -> YamlResult<Value> {
    let (node, text, _) = scalar_node(c, id, "binary data")?;
    let cleaned: String = text.chars().filter(|ch| !ch.is_whitespace()).collect();
    match general_purpose::STANDARD.decode(cleaned.as_bytes()) {
        Ok(bytes) => Ok(finish_scalar(node, text, ScalarValue::Binary(bytes))),
        Err(err) => Err(constructor_error(
            "while constructing binary data",
            None,
            format!("failed to decode base64 data: {}", err),
            Some(node.start_mark.clone()),
        )),
    }
}

fn timestamp_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?x)^
            (?P<year>[0-9][0-9][0-9][0-9])
            -(?P<month>[0-9][0-9]?)
            -(?P<day>[0-9][0-9]?)
            (?:(?:[Tt]|[\ \t]+)
            (?P<hour>[0-9][0-9]?)
            :(?P<minute>[0-9][0-9])
            :(?P<second>[0-9][0-9])
            (?:\.(?P<fraction>[0-9]*))?
            (?:[\ \t]*(?P<tz>Z|(?P<tz_sign>[-+])(?P<tz_hour>[0-9][0-9]?)
            (?::(?P<tz_minute>[0-9][0-9]))?))?)?$",
        )
        .expect("timestamp pattern")
    })
}

fn construct_yaml_timestamp(c: &mut RoundTripConstructor<'_>, id: NodeId) -> YamlResult<Value> {
    let (node, text, _) = scalar_node(c, id, "a timestamp")?;
    let mark = node.start_mark.clone();
    let bad = |what: &str| {
        constructor_error(
            "while constructing a timestamp",
            None,
            format!("could not parse timestamp {:?}: {}", text, what),
            Some(mark.clone()),
        )
    };
    let caps = timestamp_regex()
        .captures(text.trim())
        .ok_or_else(|| bad("pattern mismatch"))?;
    let year: i32 = caps["year"].parse().map_err(|_| bad("year"))?;
    let month: u32 = caps["month"].parse().map_err(|_| bad("month"))?;
    let day: u32 = caps["day"].parse().map_err(|_| bad("day"))?;
    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| bad("invalid date"))?;
    let timestamp = if caps.name("hour").is_none() {
        Timestamp::Date(date)
    } else {
        let hour: u32 = caps["hour"].parse().map_err(|_| bad("hour"))?;
        let minute: u32 = caps["minute"].parse().map_err(|_| bad("minute"))?;
        let second: u32 = caps["second"].parse().map_err(|_| bad("second"))?;
        let micros: u32 = match caps.name("fraction") {
            Some(fraction) => {
                let mut digits = fraction.as_str().to_string();
                digits.truncate(6);
                while digits.len() < 6 {
                    digits.push('0');
                }
                digits.parse().map_err(|_| bad("fraction"))?
            }
            None => 0,
        };
        let time = NaiveTime::from_hms_micro_opt(hour, minute, second, micros)
            .ok_or_else(|| bad("invalid time"))?;
        let naive = NaiveDateTime::new(date, time);
        match caps.name("tz_sign") {
            Some(sign) => {
                let tz_hour: i32 = caps["tz_hour"].parse().map_err(|_| bad("timezone"))?;
                let tz_minute: i32 = caps
                    .name("tz_minute")
                    .map(|m| m.as_str().parse())
                    .transpose()
                    .map_err(|_| bad("timezone"))?
                    .unwrap_or(0);
                let mut offset = tz_hour * 3600 + tz_minute * 60;
                if sign.as_str() == "-" {
                    offset = -offset;
                }
                let offset =
                    FixedOffset::east_opt(offset).ok_or_else(|| bad("timezone range"))?;
                let zoned: DateTime<FixedOffset> = DateTime::from_naive_utc_and_offset(
                    naive - chrono::Duration::seconds(offset.local_minus_utc() as i64),
                    offset,
                );
                Timestamp::Zoned(zoned)
            }
            None if caps.name("tz").is_some() => {
                let offset = FixedOffset::east_opt(0).expect("zero offset");
                Timestamp::Zoned(DateTime::from_naive_utc_and_offset(naive, offset))
            }
            None => Timestamp::Naive(naive),
        }
    };
    Ok(finish_scalar(node, text, ScalarValue::Timestamp(timestamp)))
}

fn split_sign(text: &str) -> (i64, &str) {
    if let Some(rest) = text.strip_prefix('-') {
        (-1, rest)
    } else if let Some(rest) = text.strip_prefix('+') {
        (1, rest)
    } else {
        (1, text)
    }
}

fn parse_sexagesimal_int(text: &str) -> Option<i64> {
    let mut value: i64 = 0;
    for part in text.split(':') {
        value = value.checked_mul(60)?.checked_add(part.parse::<i64>().ok()?)?;
    }
    Some(value)
}

fn parse_sexagesimal_float(text: &str) -> Option<f64> {
    let mut value: f64 = 0.0;
    for part in text.split(':') {
        value = value * 60.0 + part.parse::<f64>().ok()?;
    }
    Some(value)
}

// ===============================================================================
// COLLECTION CONSTRUCTORS (two-phase)
// ===============================================================================

fn construct_yaml_seq(c: &mut RoundTripConstructor<'_>, id: NodeId) -> YamlResult<Value> {
    let node = c.node(id);
    let NodeKind::Sequence { flow_style, .. } = node.kind else {
        return Err(constructor_error(
            "while constructing a sequence",
            None,
            format!("expected a sequence node, but found {}", node.id()),
            Some(node.start_mark.clone()),
        ));
    };
    let mut seq = Seq::new();
    seq.flow_style = flow_style;
    seq.anchor = keep_anchor(node);
    seq.line_col = Some((node.start_mark.line, node.start_mark.column));
    seq.comment.before = lines_from(&node.comment.pre);
    seq.comment.inline = node.comment.post.as_ref().map(CommentLine::from);
    seq.comment.end = lines_from(&node.comment.end);
    let value = Value::new_seq(seq);
    c.publish(id, value.clone());
    let shell = value.as_seq().expect("fresh sequence shell");
    c.defer(Box::new(move |c| {
        let NodeKind::Sequence { items, .. } = &c.node(id).kind else {
            unreachable!("sequence node changed kind");
        };
        for item_id in items.clone() {
            let first_time = !c.constructed.contains_key(&item_id.0);
            let item_value = c.construct_object(item_id)?;
            let item_node = c.node(item_id);
            let mut comment = CommentBundle::default();
            // container items carry their own bundle; aliased items keep
            // the comments of their anchor site
            if first_time && matches!(item_node.kind, NodeKind::Scalar { .. }) {
                comment.before = lines_from(&item_node.comment.pre);
                comment.inline = item_node.comment.post.as_ref().map(CommentLine::from);
            }
            shell.borrow_mut().items.push(SeqItem {
                value: item_value,
                comment,
                line_col: Some((item_node.start_mark.line, item_node.start_mark.column)),
            });
        }
        Ok(())
    }));
    Ok(value)
}

fn construct_yaml_map(c: &mut RoundTripConstructor<'_>, id: NodeId) -> YamlResult<Value> {
    let node = c.node(id);
    let NodeKind::Mapping { flow_style, .. } = node.kind else {
        return Err(constructor_error(
            "while constructing a mapping",
            None,
            format!("expected a mapping node, but found {}", node.id()),
            Some(node.start_mark.clone()),
        ));
    };
    let mut map = Map::new();
    map.flow_style = flow_style;
    map.anchor = keep_anchor(node);
    map.line_col = Some((node.start_mark.line, node.start_mark.column));
    map.comment.before = lines_from(&node.comment.pre);
    map.comment.inline = node.comment.post.as_ref().map(CommentLine::from);
    map.comment.end = lines_from(&node.comment.end);
    let value = Value::new_map(map);
    c.publish(id, value.clone());
    let shell = value.as_map().expect("fresh mapping shell");
    c.defer(Box::new(move |c| c.populate_mapping(id, shell)));
    Ok(value)
}

fn construct_yaml_omap(c: &mut RoundTripConstructor<'_>, id: NodeId) -> YamlResult<Value> {
    let node = c.node(id);
    let NodeKind::Sequence { flow_style, .. } = node.kind else {
        return Err(constructor_error(
            "while constructing an ordered map",
            None,
            format!("expected a sequence, but found {}", node.id()),
            Some(node.start_mark.clone()),
        ));
    };
    let mut map = Map::new();
    map.tag = Some(TAG_OMAP.to_string());
    map.flow_style = flow_style;
    map.anchor = keep_anchor(node);
    map.line_col = Some((node.start_mark.line, node.start_mark.column));
    map.comment.before = lines_from(&node.comment.pre);
    map.comment.inline = node.comment.post.as_ref().map(CommentLine::from);
    let value = Value::new_map(map);
    c.publish(id, value.clone());
    let shell = value.as_map().expect("fresh omap shell");
    c.defer(Box::new(move |c| {
        let node_mark = c.node(id).start_mark.clone();
        let NodeKind::Sequence { items, .. } = &c.node(id).kind else {
            unreachable!("omap node changed kind");
        };
        for item_id in items.clone() {
            let item_node = c.node(item_id);
            let NodeKind::Mapping { pairs, .. } = &item_node.kind else {
                return Err(constructor_error(
                    "while constructing an ordered map",
                    Some(node_mark.clone()),
                    format!("expected a mapping of length 1, but found {}", item_node.id()),
                    Some(item_node.start_mark.clone()),
                ));
            };
            if pairs.len() != 1 {
                return Err(constructor_error(
                    "while constructing an ordered map",
                    Some(node_mark.clone()),
                    format!("expected a single mapping item, but found {} items", pairs.len()),
                    Some(item_node.start_mark.clone()),
                ));
            }
            let (key_id, value_id) = pairs[0];
            let key_value = c.construct_object_deep(key_id)?;
            let Some(key) = key_value.to_key() else {
                return Err(constructor_error(
                    "while constructing an ordered map",
                    Some(node_mark.clone()),
                    "found unhashable key",
                    Some(c.node(key_id).start_mark.clone()),
                ));
            };
            if shell.borrow().contains_own(&key) {
                return Err(constructor_error(
                    "while constructing an ordered map",
                    Some(node_mark.clone()),
                    format!("found duplicate key \"{}\"", key),
                    Some(c.node(key_id).start_mark.clone()),
                ));
            }
            let item_value = c.construct_object(value_id)?;
            let key_node = c.node(key_id);
            let line_col = Some((key_node.start_mark.line, key_node.start_mark.column));
            shell.borrow_mut().insert_entry(MapEntry {
                key,
                key_value,
                value: item_value,
                comment: CommentBundle::default(),
                line_col,
            });
        }
        Ok(())
    }));
    Ok(value)
}

fn construct_yaml_pairs(c: &mut RoundTripConstructor<'_>, id: NodeId) -> YamlResult<Value> {
    let node = c.node(id);
    if !matches!(node.kind, NodeKind::Sequence { .. }) {
        return Err(constructor_error(
            "while constructing pairs",
            None,
            format!("expected a sequence, but found {}", node.id()),
            Some(node.start_mark.clone()),
        ));
    }
    let value = construct_yaml_seq(c, id)?;
    if let Value::Seq(seq) = &value {
        seq.borrow_mut().tag = Some(TAG_PAIRS.to_string());
    }
    Ok(value)
}

fn construct_yaml_set(c: &mut RoundTripConstructor<'_>, id: NodeId) -> YamlResult<Value> {
    let node = c.node(id);
    let NodeKind::Mapping { flow_style, .. } = node.kind else {
        return Err(constructor_error(
            "while constructing a set",
            None,
            format!("expected a mapping node, but found {}", node.id()),
            Some(node.start_mark.clone()),
        ));
    };
    let mut set = Set::new();
    set.flow_style = flow_style;
    set.anchor = keep_anchor(node);
    set.line_col = Some((node.start_mark.line, node.start_mark.column));
    set.comment.before = lines_from(&node.comment.pre);
    set.comment.inline = node.comment.post.as_ref().map(CommentLine::from);
    let value = Value::new_set(set);
    c.publish(id, value.clone());
    let shell = value.as_set().expect("fresh set shell");
    c.defer(Box::new(move |c| {
        let NodeKind::Mapping { pairs, .. } = &c.node(id).kind else {
            unreachable!("set node changed kind");
        };
        for (key_id, _) in pairs.clone() {
            let key_value = c.construct_object_deep(key_id)?;
            let key_node = c.node(key_id);
            let mut comment = CommentBundle::default();
            comment.before = lines_from(&key_node.comment.pre);
            comment.inline = key_node.comment.post.as_ref().map(CommentLine::from);
            let mut shell = shell.borrow_mut();
            if !shell.add(key_value) {
                if let Some(entry) = shell.entries_mut().last_mut() {
                    entry.comment = comment;
                }
            }
        }
        Ok(())
    }));
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::Composer;
    use crate::error::CollectSink;
    use crate::parser::Parser;
    use crate::reader::Reader;
    use crate::resolver::Resolver;
    use crate::scanner::Scanner;
    use crate::value::Key;
    use std::cell::RefCell;

    fn load(source: &str) -> Value {
        try_load(source).unwrap()
    }

    fn try_load(source: &str) -> YamlResult<Value> {
        let sink: SharedSink = Rc::new(RefCell::new(CollectSink::default()));
        let reader = Reader::from_str("<test>", source)?;
        let parser = Parser::new(Scanner::new(reader));
        let mut composer = Composer::new(parser, Resolver::new(), Rc::clone(&sink));
        let doc = composer.compose_single_document()?.expect("document");
        let registry = ConstructorRegistry::round_trip_default();
        construct_document(&doc, &registry, false, sink)
    }

    #[test]
    fn scalars_resolve_to_typed_values() {
        let value = load("- 42\n- 3.5\n- true\n- ~\n- text\n");
        assert_eq!(value.idx(0).unwrap().as_i64(), Some(42));
        assert_eq!(value.idx(1).unwrap().as_f64(), Some(3.5));
        assert_eq!(value.idx(2).unwrap().as_bool(), Some(true));
        assert!(value.idx(3).unwrap().is_null());
        assert_eq!(value.idx(4).unwrap().as_str(), Some("text"));
    }

    #[test]
    fn int_radix_recorded() {
        let value = load("- 0x1A\n- 0b101\n- 0o17\n- 10\n");
        let radix = |i: usize| match value.idx(i).unwrap() {
            Value::Scalar(Scalar { value: ScalarValue::Int { radix, .. }, .. }) => radix,
            other => panic!("expected int, got {:?}", other),
        };
        assert_eq!(radix(0), IntRadix::Hex);
        assert_eq!(radix(1), IntRadix::Bin);
        assert_eq!(radix(2), IntRadix::Oct);
        assert_eq!(radix(3), IntRadix::Dec);
        assert_eq!(value.idx(0).unwrap().as_i64(), Some(26));
        assert_eq!(value.idx(1).unwrap().as_i64(), Some(5));
        assert_eq!(value.idx(2).unwrap().as_i64(), Some(15));
    }

    #[test]
    fn merge_keys_stay_unflattened_but_visible() {
        let value = load(
            "a: &CENTER\n  x: 1\n  y: 2\nb:\n  <<: *CENTER\n  r: 10\n",
        );
        let b = value.get_str("b").unwrap();
        assert_eq!(b.get_str("x").unwrap().as_i64(), Some(1));
        assert_eq!(b.get_str("y").unwrap().as_i64(), Some(2));
        assert_eq!(b.get_str("r").unwrap().as_i64(), Some(10));
        let map = b.as_map().unwrap();
        let map = map.borrow();
        assert_eq!(map.own_len(), 1);
        assert!(map.has_merges());
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let err = try_load("a: 1\na: 2\n").unwrap_err();
        assert!(err.to_string().contains("duplicate key"));
    }

    #[test]
    fn duplicate_key_through_alias_is_rejected() {
        let err = try_load("&anchor foo:\n  foo: bar\n  *anchor : dup\n  baz: bat\n  *anchor : dup\n");
        assert!(err.unwrap_err().to_string().contains("duplicate key"));
    }

    #[test]
    fn recursive_sequence_constructs_shared_cell() {
        let value = load("&a\n- 1\n- *a\n");
        let seq = value.as_seq().unwrap();
        let inner = {
            let borrowed = seq.borrow();
            borrowed.items[1].value.clone()
        };
        let inner = inner.as_seq().unwrap();
        assert!(Rc::ptr_eq(&seq, &inner));
    }

    #[test]
    fn templated_anchor_dropped_explicit_kept() {
        let value = load("a: &id002\n  b: 1\nd: *id002\ne: &etemplate\n  b: 1\nf: *etemplate\n");
        let d = value.get_str("d").unwrap().as_map().unwrap();
        assert!(d.borrow().anchor.is_none());
        let e = value.get_str("e").unwrap().as_map().unwrap();
        let anchor = e.borrow().anchor.clone().unwrap();
        assert_eq!(anchor.name, "etemplate");
        assert!(!anchor.always_dump);
    }

    #[test]
    fn flow_sequence_key_becomes_tuple() {
        let value = load("[2, 3, 4]:\n  a: Hello\n");
        let key = Key::Seq(vec![Key::Int(2), Key::Int(3), Key::Int(4)]);
        let inner = value.get(&key).unwrap();
        assert_eq!(inner.get_str("a").unwrap().as_str(), Some("Hello"));
    }

    #[test]
    fn timestamp_forms() {
        let value = load("- 2002-12-14\n- 2001-12-15 02:59:43.1Z\n");
        let Value::Scalar(Scalar { value: ScalarValue::Timestamp(Timestamp::Date(d)), .. }) =
            value.idx(0).unwrap()
        else {
            panic!("expected date");
        };
        assert_eq!(d, NaiveDate::from_ymd_opt(2002, 12, 14).unwrap());
        assert!(matches!(
            value.idx(1).unwrap(),
            Value::Scalar(Scalar { value: ScalarValue::Timestamp(Timestamp::Zoned(_)), .. })
        ));
    }

    #[test]
    fn binary_decoded() {
        let value = load("!!binary \"aGVsbG8=\"\n");
        let Value::Scalar(Scalar { value: ScalarValue::Binary(bytes), .. }) = value else {
            panic!("expected binary");
        };
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn set_preserves_order() {
        let value = load("!!set\n? a\n? b\n? c\n");
        let set = value.as_set().unwrap();
        let keys: Vec<_> = set.borrow().entries().iter().map(|e| e.key.clone()).collect();
        assert_eq!(keys, vec![Key::str("a"), Key::str("b"), Key::str("c")]);
    }

    #[test]
    fn omap_constructs_ordered_mapping() {
        let value = load("!!omap\n- a: 1\n- b: 2\n");
        let map = value.as_map().unwrap();
        let map = map.borrow();
        assert_eq!(map.keys(), vec![Key::str("a"), Key::str("b")]);
        assert_eq!(map.tag.as_deref(), Some(TAG_OMAP));
    }

    #[test]
    fn unknown_tag_preserved() {
        let value = load("- !Ref One\n");
        let item = value.idx(0).unwrap();
        let scalar = item.as_scalar().unwrap();
        assert_eq!(scalar.tag.as_deref(), Some("!Ref"));
        assert_eq!(scalar.value, ScalarValue::Str("One".to_string()));
    }

    #[test]
    fn version_1_1_values() {
        let value = load("%YAML 1.1\n---\n- 012\n- on\n- 12:34:56\n");
        assert_eq!(value.idx(0).unwrap().as_i64(), Some(10));
        assert_eq!(value.idx(1).unwrap().as_bool(), Some(true));
        assert_eq!(value.idx(2).unwrap().as_i64(), Some(45296));
    }

    #[test]
    fn version_1_2_same_scalars_stay_strings() {
        let value = load("- 012\n- on\n- 12:34:56\n");
        assert_eq!(value.idx(0).unwrap().as_i64(), Some(12));
        assert_eq!(value.idx(1).unwrap().as_str(), Some("on"));
        assert_eq!(value.idx(2).unwrap().as_str(), Some("12:34:56"));
    }
}
