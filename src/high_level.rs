/*!
 * ===============================================================================
 * yaml-roundtrip: High-Level Entry Points
 * ===============================================================================
 *
 * The `Yaml` handle bundles the caller-facing configuration with
 * per-instance constructor/representer/resolver registries and drives both
 * pipelines:
 *
 *   load:  Reader -> Scanner -> Parser -> Composer -> Constructor -> Value
 *   dump:  Value -> Representer -> Serializer -> Emitter -> text
 */

use std::rc::Rc;

use regex::Regex;

use crate::composer::{Composer, NodeId};
use crate::constructor::{construct_document, ConstructorRegistry, RoundTripConstructor};
use crate::emitter::Emitter;
use crate::error::{log_sink, SharedSink, YamlResult};
use crate::parser::Parser;
use crate::reader::Reader;
use crate::representer::{represent_document, Representer, RepresenterRegistry};
use crate::resolver::Resolver;
use crate::scanner::Scanner;
use crate::serializer::Serializer;
use crate::value::{Scalar, Value};

// ===============================================================================
// CONFIGURATION
// ===============================================================================

/// Caller-facing configuration, one field per documented option
#[derive(Debug, Clone)]
pub struct YamlConfig {
    /// resolver table selection and `%YAML` directive emission (None = 1.2)
    pub version: Option<(u32, u32)>,
    /// keep original quote styles on round trip
    pub preserve_quotes: bool,
    /// block indent width
    pub indent: usize,
    /// extra indent for the `-` of block sequences
    pub block_seq_indent: usize,
    /// soft line width for the emitter
    pub width: usize,
    /// collection style when none was recorded
    pub default_flow_style: Option<bool>,
    /// force a leading `---`
    pub explicit_start: bool,
    /// force a trailing `...`
    pub explicit_end: bool,
    /// downgrade duplicate-key errors to warnings
    pub allow_duplicate_keys: bool,
    /// when false, non-ASCII characters are escaped
    pub allow_unicode: bool,
}

impl Default for YamlConfig {
    fn default() -> Self {
        Self {
            version: None,
            preserve_quotes: true,
            indent: 2,
            block_seq_indent: 0,
            width: 80,
            default_flow_style: None,
            explicit_start: false,
            explicit_end: false,
            allow_duplicate_keys: false,
            allow_unicode: true,
        }
    }
}

impl YamlConfig {
    pub fn with_version(mut self, version: Option<(u32, u32)>) -> Self {
        self.version = version;
        self
    }

    pub fn with_preserve_quotes(mut self, preserve: bool) -> Self {
        self.preserve_quotes = preserve;
        self
    }

    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    pub fn with_block_seq_indent(mut self, indent: usize) -> Self {
        self.block_seq_indent = indent;
        self
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    pub fn with_default_flow_style(mut self, style: Option<bool>) -> Self {
        self.default_flow_style = style;
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

    pub fn with_allow_duplicate_keys(mut self, allow: bool) -> Self {
        self.allow_duplicate_keys = allow;
        self
    }

    pub fn with_allow_unicode(mut self, allow: bool) -> Self {
        self.allow_unicode = allow;
        self
    }
}

/// Output byte encodings; the BOM is optional for UTF-8
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
}

// ===============================================================================
// YAML HANDLE
// ===============================================================================

/// Round-trip processor handle: configuration plus per-instance registries
pub struct Yaml {
    pub config: YamlConfig,
    resolver: Resolver,
    constructors: ConstructorRegistry,
    representers: RepresenterRegistry,
    sink: SharedSink,
}

impl Default for Yaml {
    fn default() -> Self {
        Self::new()
    }
}

impl Yaml {
    pub fn new() -> Self {
        Self::with_config(YamlConfig::default())
    }

    pub fn with_config(config: YamlConfig) -> Self {
        Self {
            config,
            resolver: Resolver::new(),
            constructors: ConstructorRegistry::round_trip_default(),
            representers: RepresenterRegistry::round_trip_default(),
            sink: log_sink(),
        }
    }

    /// Replace the warning destination (default: the `log` crate)
    pub fn set_warning_sink(&mut self, sink: SharedSink) {
        self.sink = sink;
    }

    // ===================================================================
    // REGISTRATION HOOKS
    // ===================================================================

    pub fn add_constructor(
        &mut self,
        tag: &str,
        f: impl Fn(&mut RoundTripConstructor<'_>, NodeId) -> YamlResult<Value> + 'static,
    ) {
        self.constructors.add_constructor(tag, f);
    }

    pub fn add_multi_constructor(
        &mut self,
        prefix: &str,
        f: impl Fn(&mut RoundTripConstructor<'_>, &str, NodeId) -> YamlResult<Value> + 'static,
    ) {
        self.constructors.add_multi_constructor(prefix, f);
    }

    pub fn add_representer(
        &mut self,
        kind: &str,
        f: impl Fn(&mut Representer<'_>, &Value) -> YamlResult<NodeId> + 'static,
    ) {
        self.representers.add_representer(kind, f);
    }

    pub fn add_multi_representer(
        &mut self,
        prefix: &str,
        f: impl Fn(&mut Representer<'_>, &Value) -> YamlResult<NodeId> + 'static,
    ) {
        self.representers.add_multi_representer(prefix, f);
    }

    pub fn add_implicit_resolver(&mut self, tag: &str, regex: Regex, first_chars: Option<&str>) {
        self.resolver.add_implicit_resolver(tag, regex, first_chars);
    }

    // ===================================================================
    // LOADING
    // ===================================================================

    fn composer_for(&self, reader: Reader) -> Composer {
        let mut scanner = Scanner::new(reader);
        scanner.set_version(self.config.version);
        let mut parser = Parser::new(scanner);
        parser.set_default_version(self.config.version);
        Composer::new(parser, self.resolver.clone(), Rc::clone(&self.sink))
    }

    /// Load a single document; a second document in the stream is an error
    pub fn load_str(&self, source: &str) -> YamlResult<Value> {
        let reader = Reader::from_str("<unicode string>", source)?;
        let mut composer = self.composer_for(reader);
        match composer.compose_single_document()? {
            Some(document) => construct_document(
                &document,
                &self.constructors,
                self.config.allow_duplicate_keys,
                Rc::clone(&self.sink),
            ),
            None => Ok(Value::Scalar(Scalar::null())),
        }
    }

    /// Load every document in the stream
    pub fn load_all_str(&self, source: &str) -> YamlResult<Vec<Value>> {
        let reader = Reader::from_str("<unicode string>", source)?;
        let mut composer = self.composer_for(reader);
        let documents = composer.compose_all()?;
        documents
            .iter()
            .map(|document| {
                construct_document(
                    document,
                    &self.constructors,
                    self.config.allow_duplicate_keys,
                    Rc::clone(&self.sink),
                )
            })
            .collect()
    }

    /// Load from raw bytes, sniffing the BOM for UTF-8/16
    pub fn load_bytes(&self, bytes: &[u8]) -> YamlResult<Value> {
        let reader = Reader::from_bytes("<byte string>", bytes)?;
        let mut composer = self.composer_for(reader);
        match composer.compose_single_document()? {
            Some(document) => construct_document(
                &document,
                &self.constructors,
                self.config.allow_duplicate_keys,
                Rc::clone(&self.sink),
            ),
            None => Ok(Value::Scalar(Scalar::null())),
        }
    }

    // ===================================================================
    // DUMPING
    // ===================================================================

    pub fn dump_str(&self, value: &Value) -> YamlResult<String> {
        self.dump_all_str(std::slice::from_ref(value))
    }

    pub fn dump_all_str(&self, values: &[Value]) -> YamlResult<String> {
        let mut documents = Vec::with_capacity(values.len());
        for value in values {
            documents.push(represent_document(
                value,
                &self.representers,
                self.config.default_flow_style,
                self.config.preserve_quotes,
            )?);
        }
        let mut serializer = Serializer::new(self.resolver.clone())
            .with_version(self.config.version)
            .with_explicit_start(self.config.explicit_start)
            .with_explicit_end(self.config.explicit_end);
        let events = serializer.serialize_stream(&documents)?;
        let mut emitter = Emitter::new()
            .with_indent(self.config.indent)
            .with_block_seq_indent(self.config.block_seq_indent)
            .with_width(self.config.width)
            .with_allow_unicode(self.config.allow_unicode);
        emitter.emit(events)
    }

    /// Dump to bytes in the selected encoding, optionally with a BOM
    pub fn dump_bytes(
        &self,
        value: &Value,
        encoding: OutputEncoding,
        bom: bool,
    ) -> YamlResult<Vec<u8>> {
        let text = self.dump_str(value)?;
        let mut out = Vec::with_capacity(text.len() + 4);
        match encoding {
            OutputEncoding::Utf8 => {
                if bom {
                    out.extend_from_slice(&[0xEF, 0xBB, 0xBF]);
                }
                out.extend_from_slice(text.as_bytes());
            }
            OutputEncoding::Utf16Le => {
                out.extend_from_slice(&[0xFF, 0xFE]);
                for unit in text.encode_utf16() {
                    out.extend_from_slice(&unit.to_le_bytes());
                }
            }
            OutputEncoding::Utf16Be => {
                out.extend_from_slice(&[0xFE, 0xFF]);
                for unit in text.encode_utf16() {
                    out.extend_from_slice(&unit.to_be_bytes());
                }
            }
        }
        Ok(out)
    }
}
