/*!
 * ===============================================================================
 * yaml-roundtrip: Round-Trip YAML 1.1/1.2 Processor
 * ===============================================================================
 *
 * Reads textual YAML into a comment-annotated value graph and writes it back
 * preserving the stylistic record of the source stream: comments, quoting
 * style, flow/block choice, anchor names, merge keys, and key order.
 *
 * PIPELINE ARCHITECTURE:
 *
 *   load:
 *   +----------+   +---------+   +--------+   +----------+   +-------------+
 *   |  Reader  |-> | Scanner |-> | Parser |-> | Composer |-> | Constructor |
 *   | (chars)  |   | (tokens)|   |(events)|   | (nodes)  |   |  (values)   |
 *   +----------+   +---------+   +--------+   +----------+   +-------------+
 *
 *   dump:
 *   +-------------+   +------------+   +---------+
 *   | Representer |-> | Serializer |-> | Emitter |
 *   |  (nodes)    |   |  (events)  |   | (text)  |
 *   +-------------+   +------------+   +---------+
 *
 * Both directions share the node arena and the event vocabulary, so every
 * event sequence the composer accepts can also be produced by the
 * serializer.
 */

pub mod composer; // events -> node graph, anchor table
pub mod constructor; // nodes -> annotated values
pub mod emitter; // events -> text
pub mod error; // error carrier, marks, warning sink
pub mod high_level; // Yaml handle: config + registries
pub mod parser; // tokens -> events
pub mod reader; // bytes -> chars, encoding detection
pub mod representer; // values -> nodes
pub mod resolver; // implicit tag resolution
pub mod scanner; // text -> tokens, comment capture
pub mod serializer; // nodes -> events, anchor assignment
pub mod value; // round-trip value model

pub use composer::{Composer, Document, Node, NodeArena, NodeComments, NodeId, NodeKind};
pub use constructor::{construct_document, ConstructorRegistry, RoundTripConstructor};
pub use emitter::Emitter;
pub use error::{
    CollectSink, LogSink, Mark, SharedSink, WarningSink, YamlError, YamlErrorKind, YamlResult,
    YamlWarning,
};
pub use high_level::{OutputEncoding, Yaml, YamlConfig};
pub use parser::{Event, Parser};
pub use reader::Reader;
pub use representer::{represent_document, Representer, RepresenterRegistry};
pub use resolver::Resolver;
pub use scanner::{Chomp, CommentToken, ScalarStyle, Scanner, Token, TokenComments, TokenKind};
pub use serializer::{templated_id, Serializer, ANCHOR_TEMPLATE};
pub use value::{
    Anchor, CommentBundle, CommentLine, CommentSlot, IntRadix, Key, Map, MapEntry, MergeEntry,
    Scalar, ScalarValue, Seq, SeqItem, Set, Timestamp, Value,
};
