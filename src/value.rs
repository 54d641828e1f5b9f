/*!
 * ===============================================================================
 * yaml-roundtrip: Round-Trip Value Model
 * ===============================================================================
 *
 * The containers handed to callers. Unlike plain data types they carry the
 * stylistic record of the source stream: comments, scalar styles and source
 * text, anchors, flow/block choice, key order, and unflattened merge lists.
 * Containers sit behind `Rc<RefCell<..>>` so aliases produce shared (possibly
 * cyclic) values and the two-phase constructor can publish a shell before
 * populating it.
 */

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};

use crate::scanner::{CommentToken, ScalarStyle};

// ===============================================================================
// COMMENTS
// ===============================================================================

/// One comment line or a blank source line, with its original column so
/// unedited documents re-emit at the captured position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentLine {
    pub text: String,
    pub blank: bool,
    pub column: Option<usize>,
}

impl CommentLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), blank: false, column: None }
    }

    pub fn blank_line() -> Self {
        Self { text: String::new(), blank: true, column: None }
    }
}

impl From<&CommentToken> for CommentLine {
    fn from(token: &CommentToken) -> Self {
        Self {
            text: token.value.clone(),
            blank: token.blank,
            column: Some(token.start_mark.column),
        }
    }
}

/// Comment placement slots around a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentSlot {
    Before,
    Inline,
    After,
    End,
}

/// Dedicated comment carrier attached to every value slot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentBundle {
    /// own-line comments (and blank lines) before the item
    pub before: Vec<CommentLine>,
    /// trailing comment on the item's own line
    pub inline: Option<CommentLine>,
    /// own-line comments after the item
    pub after: Vec<CommentLine>,
    /// comments at the end of a collection, before it closes
    pub end: Vec<CommentLine>,
}

impl CommentBundle {
    pub fn is_empty(&self) -> bool {
        self.before.is_empty()
            && self.inline.is_none()
            && self.after.is_empty()
            && self.end.is_empty()
    }

    pub fn add(&mut self, slot: CommentSlot, line: CommentLine) {
        match slot {
            CommentSlot::Before => self.before.push(line),
            CommentSlot::Inline => self.inline = Some(line),
            CommentSlot::After => self.after.push(line),
            CommentSlot::End => self.end.push(line),
        }
    }
}

// ===============================================================================
// ANCHORS
// ===============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub name: String,
    /// emit the anchor even when nothing references it
    pub always_dump: bool,
}

impl Anchor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), always_dump: false }
    }
}

// ===============================================================================
// SCALARS
// ===============================================================================

/// Radix a YAML integer was written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntRadix {
    #[default]
    Dec,
    Hex,
    Oct,
    Bin,
    Sexagesimal,
}

/// Timestamp forms (`!!timestamp`)
#[derive(Debug, Clone, PartialEq)]
pub enum Timestamp {
    Date(NaiveDate),
    Naive(NaiveDateTime),
    Zoned(DateTime<FixedOffset>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Int { value: i64, radix: IntRadix },
    Float(f64),
    Str(String),
    Binary(Vec<u8>),
    Timestamp(Timestamp),
}

/// A scalar together with everything needed to write it back unchanged
#[derive(Debug, Clone, PartialEq)]
pub struct Scalar {
    pub value: ScalarValue,
    pub style: ScalarStyle,
    /// original source text; the representer re-emits it verbatim
    pub src: Option<String>,
    /// explicit non-core tag (`!Ref`, `!!binary`, ...)
    pub tag: Option<String>,
    pub anchor: Option<Anchor>,
    pub comment: CommentBundle,
}

impl Scalar {
    pub fn new(value: ScalarValue, style: ScalarStyle) -> Self {
        Self { value, style, src: None, tag: None, anchor: None, comment: CommentBundle::default() }
    }

    pub fn str(value: impl Into<String>) -> Self {
        Self::new(ScalarValue::Str(value.into()), ScalarStyle::Plain)
    }

    pub fn int(value: i64) -> Self {
        Self::new(ScalarValue::Int { value, radix: IntRadix::Dec }, ScalarStyle::Plain)
    }

    pub fn bool_(value: bool) -> Self {
        Self::new(ScalarValue::Bool(value), ScalarStyle::Plain)
    }

    pub fn null() -> Self {
        Self::new(ScalarValue::Null, ScalarStyle::Plain)
    }

    pub fn float(value: f64) -> Self {
        Self::new(ScalarValue::Float(value), ScalarStyle::Plain)
    }

    pub fn with_src(mut self, src: impl Into<String>) -> Self {
        self.src = Some(src.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

// ===============================================================================
// KEYS
// ===============================================================================

/// Hashable form of a mapping key; sequences become tuples of keys
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Null,
    Bool(bool),
    Int(i64),
    /// bit pattern, so float keys stay hashable
    Float(u64),
    Str(String),
    Seq(Vec<Key>),
}

impl Key {
    pub fn str(value: impl Into<String>) -> Self {
        Key::Str(value.into())
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Null => write!(f, "~"),
            Key::Bool(b) => write!(f, "{}", b),
            Key::Int(i) => write!(f, "{}", i),
            Key::Float(bits) => write!(f, "{}", f64::from_bits(*bits)),
            Key::Str(s) => write!(f, "{}", s),
            Key::Seq(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

// ===============================================================================
// VALUES
// ===============================================================================

#[derive(Debug, Clone)]
pub enum Value {
    Scalar(Scalar),
    Seq(Rc<RefCell<Seq>>),
    Map(Rc<RefCell<Map>>),
    Set(Rc<RefCell<Set>>),
}

/// Bound on merge/key recursion so pathological self-references stay finite
const MAX_DEPTH: usize = 128;

impl Value {
    pub fn new_seq(seq: Seq) -> Self {
        Value::Seq(Rc::new(RefCell::new(seq)))
    }

    pub fn new_map(map: Map) -> Self {
        Value::Map(Rc::new(RefCell::new(map)))
    }

    pub fn new_set(set: Set) -> Self {
        Value::Set(Rc::new(RefCell::new(set)))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Scalar(Scalar { value: ScalarValue::Null, .. }))
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(Scalar { value: ScalarValue::Str(s), .. }) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Scalar(Scalar { value: ScalarValue::Int { value, .. }, .. }) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Scalar(Scalar { value: ScalarValue::Bool(b), .. }) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Scalar(Scalar { value: ScalarValue::Float(v), .. }) => Some(*v),
            Value::Scalar(Scalar { value: ScalarValue::Int { value, .. }, .. }) => {
                Some(*value as f64)
            }
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<Rc<RefCell<Map>>> {
        match self {
            Value::Map(m) => Some(Rc::clone(m)),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<Rc<RefCell<Seq>>> {
        match self {
            Value::Seq(s) => Some(Rc::clone(s)),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<Rc<RefCell<Set>>> {
        match self {
            Value::Set(s) => Some(Rc::clone(s)),
            _ => None,
        }
    }

    /// Sequence item by index
    pub fn idx(&self, index: usize) -> Option<Value> {
        match self {
            Value::Seq(seq) => seq.borrow().items.get(index).map(|item| item.value.clone()),
            _ => None,
        }
    }

    /// Mapping lookup by string key (own keys first, then merges)
    pub fn get_str(&self, key: &str) -> Option<Value> {
        self.get(&Key::str(key))
    }

    pub fn get(&self, key: &Key) -> Option<Value> {
        match self {
            Value::Map(map) => map.borrow().lookup(key),
            _ => None,
        }
    }

    /// Hashable key form; collections convert recursively, mappings do not
    /// hash
    pub fn to_key(&self) -> Option<Key> {
        self.to_key_depth(0)
    }

    fn to_key_depth(&self, depth: usize) -> Option<Key> {
        if depth > MAX_DEPTH {
            return None;
        }
        match self {
            Value::Scalar(scalar) => Some(match &scalar.value {
                ScalarValue::Null => Key::Null,
                ScalarValue::Bool(b) => Key::Bool(*b),
                ScalarValue::Int { value, .. } => Key::Int(*value),
                ScalarValue::Float(v) => Key::Float(v.to_bits()),
                ScalarValue::Str(s) => Key::Str(s.clone()),
                ScalarValue::Binary(_) | ScalarValue::Timestamp(_) => return None,
            }),
            Value::Seq(seq) => {
                let seq = seq.borrow();
                let mut keys = Vec::with_capacity(seq.items.len());
                for item in &seq.items {
                    keys.push(item.value.to_key_depth(depth + 1)?);
                }
                Some(Key::Seq(keys))
            }
            Value::Map(_) | Value::Set(_) => None,
        }
    }

    /// Registry label for representer dispatch
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Scalar(scalar) => match &scalar.value {
                ScalarValue::Null => "null",
                ScalarValue::Bool(_) => "bool",
                ScalarValue::Int { .. } => "int",
                ScalarValue::Float(_) => "float",
                ScalarValue::Str(_) => "str",
                ScalarValue::Binary(_) => "binary",
                ScalarValue::Timestamp(_) => "timestamp",
            },
            Value::Seq(_) => "seq",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
        }
    }

    /// Explicit tag carried by the value, if any
    pub fn explicit_tag(&self) -> Option<String> {
        match self {
            Value::Scalar(scalar) => scalar.tag.clone(),
            Value::Seq(seq) => seq.borrow().tag.clone(),
            Value::Map(map) => map.borrow().tag.clone(),
            Value::Set(_) => None,
        }
    }
}

// ===============================================================================
// SEQUENCES
// ===============================================================================

#[derive(Debug, Clone)]
pub struct SeqItem {
    pub value: Value,
    pub comment: CommentBundle,
    pub line_col: Option<(usize, usize)>,
}

impl SeqItem {
    pub fn new(value: Value) -> Self {
        Self { value, comment: CommentBundle::default(), line_col: None }
    }
}

/// Ordered sequence with per-index decorations
#[derive(Debug, Clone, Default)]
pub struct Seq {
    pub items: Vec<SeqItem>,
    pub tag: Option<String>,
    pub anchor: Option<Anchor>,
    pub flow_style: Option<bool>,
    pub comment: CommentBundle,
    pub line_col: Option<(usize, usize)>,
}

impl Seq {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: Value) {
        self.items.push(SeqItem::new(value));
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn set_anchor(&mut self, name: impl Into<String>, always_dump: bool) {
        self.anchor = Some(Anchor { name: name.into(), always_dump });
    }

    pub fn add_comment(&mut self, slot: CommentSlot, line: CommentLine) {
        self.comment.add(slot, line);
    }
}

// ===============================================================================
// MAPPINGS
// ===============================================================================

#[derive(Debug, Clone)]
pub struct MapEntry {
    /// hashable lookup form
    pub key: Key,
    /// full key value, preserving style/quoting of the key as written
    pub key_value: Value,
    pub value: Value,
    pub comment: CommentBundle,
    /// (line, column) of the key as it appeared
    pub line_col: Option<(usize, usize)>,
}

/// One `<<` line: the own-entry position it appeared at, the mappings it
/// references (several for `<<: [*a, *b]`), and its comments
#[derive(Debug, Clone, Default)]
pub struct MergeEntry {
    pub index: usize,
    pub maps: Vec<Rc<RefCell<Map>>>,
    pub comment: CommentBundle,
}

/// Ordered mapping that keeps `<<` merges unflattened: lookups consult own
/// entries first, then the merge list left to right.
#[derive(Debug, Clone, Default)]
pub struct Map {
    entries: Vec<MapEntry>,
    index: HashMap<Key, usize>,
    /// merge records in document order
    pub merges: Vec<MergeEntry>,
    pub tag: Option<String>,
    pub anchor: Option<Anchor>,
    pub flow_style: Option<bool>,
    pub comment: CommentBundle,
    pub line_col: Option<(usize, usize)>,
}

impl Map {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append if the key is new, else update in place keeping the position.
    /// Returns true when the key already existed.
    pub fn insert(&mut self, key_value: Value, value: Value) -> bool {
        let Some(key) = key_value.to_key() else {
            return false;
        };
        self.insert_entry(MapEntry {
            key,
            key_value,
            value,
            comment: CommentBundle::default(),
            line_col: None,
        })
    }

    pub fn insert_entry(&mut self, entry: MapEntry) -> bool {
        if let Some(&pos) = self.index.get(&entry.key) {
            let slot = &mut self.entries[pos];
            slot.value = entry.value;
            slot.key_value = entry.key_value;
            if !entry.comment.is_empty() {
                slot.comment = entry.comment;
            }
            if entry.line_col.is_some() {
                slot.line_col = entry.line_col;
            }
            return true;
        }
        self.index.insert(entry.key.clone(), self.entries.len());
        self.entries.push(entry);
        false
    }

    /// Convenience for building mappings in code
    pub fn insert_str(&mut self, key: &str, value: Value) {
        self.insert(Value::Scalar(Scalar::str(key)), value);
    }

    /// Own entry for a key (merged entries are not returned)
    pub fn own_entry(&self, key: &Key) -> Option<&MapEntry> {
        self.index.get(key).map(|&pos| &self.entries[pos])
    }

    pub fn own_entry_mut(&mut self, key: &Key) -> Option<&mut MapEntry> {
        let pos = *self.index.get(key)?;
        Some(&mut self.entries[pos])
    }

    pub fn entries(&self) -> &[MapEntry] {
        &self.entries
    }

    pub fn contains_own(&self, key: &Key) -> bool {
        self.index.contains_key(key)
    }

    /// Remove an own key; keys visible through merges remain visible
    pub fn delete(&mut self, key: &Key) -> bool {
        let Some(pos) = self.index.remove(key) else {
            return false;
        };
        self.entries.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        // merge insertion points after the removed entry shift down
        for merge in &mut self.merges {
            if merge.index > pos {
                merge.index -= 1;
            }
        }
        true
    }

    /// Own keys first, then merge lists left to right
    pub fn lookup(&self, key: &Key) -> Option<Value> {
        self.lookup_depth(key, 0)
    }

    fn lookup_depth(&self, key: &Key, depth: usize) -> Option<Value> {
        if depth > MAX_DEPTH {
            return None;
        }
        if let Some(entry) = self.own_entry(key) {
            return Some(entry.value.clone());
        }
        for merge in &self.merges {
            for merged in &merge.maps {
                if let Some(value) = merged.borrow().lookup_depth(key, depth + 1) {
                    return Some(value);
                }
            }
        }
        None
    }

    /// Every visible key exactly once: own keys, then unshadowed merged keys
    pub fn keys(&self) -> Vec<Key> {
        let mut seen: Vec<Key> = Vec::new();
        self.collect_keys(&mut seen, 0);
        seen
    }

    fn collect_keys(&self, seen: &mut Vec<Key>, depth: usize) {
        if depth > MAX_DEPTH {
            return;
        }
        for entry in &self.entries {
            if !seen.contains(&entry.key) {
                seen.push(entry.key.clone());
            }
        }
        for merge in &self.merges {
            for merged in &merge.maps {
                merged.borrow().collect_keys(seen, depth + 1);
            }
        }
    }

    /// (key, value) pairs in visible-key order
    pub fn items(&self) -> Vec<(Key, Value)> {
        self.keys()
            .into_iter()
            .filter_map(|key| self.lookup(&key).map(|value| (key, value)))
            .collect()
    }

    /// Number of distinct visible keys
    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.merges.is_empty()
    }

    /// Number of own entries, ignoring merges
    pub fn own_len(&self) -> usize {
        self.entries.len()
    }

    pub fn add_merge(&mut self, position: usize, map: Rc<RefCell<Map>>) {
        self.merges.push(MergeEntry {
            index: position,
            maps: vec![map],
            comment: CommentBundle::default(),
        });
    }

    pub fn add_merge_group(&mut self, entry: MergeEntry) {
        self.merges.push(entry);
    }

    pub fn has_merges(&self) -> bool {
        !self.merges.is_empty()
    }

    pub fn set_anchor(&mut self, name: impl Into<String>, always_dump: bool) {
        self.anchor = Some(Anchor { name: name.into(), always_dump });
    }

    pub fn add_comment(&mut self, slot: CommentSlot, line: CommentLine) {
        self.comment.add(slot, line);
    }

    pub fn add_key_comment(&mut self, key: &Key, slot: CommentSlot, line: CommentLine) {
        if let Some(entry) = self.own_entry_mut(key) {
            entry.comment.add(slot, line);
        }
    }
}

// ===============================================================================
// SETS
// ===============================================================================

#[derive(Debug, Clone)]
pub struct SetEntry {
    pub key: Key,
    pub key_value: Value,
    pub comment: CommentBundle,
}

/// Ordered set (`!!set`), a mapping with null values underneath
#[derive(Debug, Clone, Default)]
pub struct Set {
    entries: Vec<SetEntry>,
    pub anchor: Option<Anchor>,
    pub flow_style: Option<bool>,
    pub comment: CommentBundle,
    pub line_col: Option<(usize, usize)>,
}

impl Set {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the element was already present
    pub fn add(&mut self, key_value: Value) -> bool {
        let Some(key) = key_value.to_key() else {
            return false;
        };
        if self.entries.iter().any(|e| e.key == key) {
            return true;
        }
        self.entries.push(SetEntry { key, key_value, comment: CommentBundle::default() });
        false
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.entries.iter().any(|e| e.key == *key)
    }

    pub fn entries(&self) -> &[SetEntry] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [SetEntry] {
        &mut self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn set_anchor(&mut self, name: impl Into<String>, always_dump: bool) {
        self.anchor = Some(Anchor { name: name.into(), always_dump });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_with(entries: &[(&str, i64)]) -> Rc<RefCell<Map>> {
        let mut map = Map::new();
        for (k, v) in entries {
            map.insert_str(k, Value::Scalar(Scalar::int(*v)));
        }
        Rc::new(RefCell::new(map))
    }

    #[test]
    fn own_keys_shadow_merged_keys() {
        let base = map_with(&[("x", 1), ("y", 2)]);
        let mut map = Map::new();
        map.insert_str("x", Value::Scalar(Scalar::int(10)));
        map.add_merge(1, Rc::clone(&base));
        map.insert_str("r", Value::Scalar(Scalar::int(3)));

        assert_eq!(map.lookup(&Key::str("x")).unwrap().as_i64(), Some(10));
        assert_eq!(map.lookup(&Key::str("y")).unwrap().as_i64(), Some(2));
        assert_eq!(map.lookup(&Key::str("r")).unwrap().as_i64(), Some(3));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn merge_lists_resolve_left_to_right() {
        let first = map_with(&[("a", 1)]);
        let second = map_with(&[("a", 100), ("b", 2)]);
        let mut map = Map::new();
        map.add_merge(0, first);
        map.add_merge(0, second);

        assert_eq!(map.lookup(&Key::str("a")).unwrap().as_i64(), Some(1));
        assert_eq!(map.lookup(&Key::str("b")).unwrap().as_i64(), Some(2));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn delete_keeps_merged_keys_visible() {
        let base = map_with(&[("d", 4)]);
        let mut map = Map::new();
        map.insert_str("d", Value::Scalar(Scalar::int(40)));
        map.insert_str("m", Value::Scalar(Scalar::int(6)));
        map.add_merge(0, base);

        assert_eq!(map.lookup(&Key::str("d")).unwrap().as_i64(), Some(40));
        assert!(map.delete(&Key::str("d")));
        // the merged value shines through after the own key is gone
        assert_eq!(map.lookup(&Key::str("d")).unwrap().as_i64(), Some(4));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn iterate_yields_each_visible_key_once() {
        let mx = map_with(&[("a", 1), ("b", 2), ("c", 3)]);
        let my = map_with(&[("a", 10), ("b", 20), ("d", 40)]);
        let mut map = Map::new();
        map.insert_str("a", Value::Scalar(Scalar::int(0)));
        map.add_merge(1, mx);
        map.insert_str("m", Value::Scalar(Scalar::int(6)));
        map.add_merge(2, my);

        let keys = map.keys();
        assert_eq!(
            keys,
            vec![Key::str("a"), Key::str("m"), Key::str("b"), Key::str("c"), Key::str("d")]
        );
        assert_eq!(map.len(), 5);
    }

    #[test]
    fn insert_existing_key_keeps_position() {
        let mut map = Map::new();
        map.insert_str("a", Value::Scalar(Scalar::int(1)));
        map.insert_str("b", Value::Scalar(Scalar::int(2)));
        map.insert_str("a", Value::Scalar(Scalar::int(9)));
        let keys = map.keys();
        assert_eq!(keys, vec![Key::str("a"), Key::str("b")]);
        assert_eq!(map.lookup(&Key::str("a")).unwrap().as_i64(), Some(9));
    }

    #[test]
    fn sequence_value_becomes_tuple_key() {
        let mut seq = Seq::new();
        seq.push(Value::Scalar(Scalar::int(2)));
        seq.push(Value::Scalar(Scalar::int(3)));
        let key = Value::new_seq(seq).to_key().unwrap();
        assert_eq!(key, Key::Seq(vec![Key::Int(2), Key::Int(3)]));
    }

    #[test]
    fn map_value_is_not_hashable() {
        let map = Value::new_map(Map::new());
        assert!(map.to_key().is_none());
    }
}
