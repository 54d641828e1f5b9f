/*!
 * ===============================================================================
 * yaml-roundtrip: Emitter
 * ===============================================================================
 *
 * Events -> text. Events arrive in document order, so the emitter walks the
 * stream with one recursive descent per collection: block mappings and
 * sequences write line-oriented entries, flow collections write bracketed
 * forms with width-aware wrapping. Recorded styles are honored unless the
 * context makes them impossible, comments are placed from the slots the
 * events carry, and tags are suppressed when the implicit resolver would
 * re-derive them.
 */

use std::iter::Peekable;
use std::vec::IntoIter;

use crate::error::{emitter_error, YamlResult};
use crate::parser::Event;
use crate::scanner::{Chomp, CommentToken, ScalarStyle};

type Events = Peekable<IntoIter<Event>>;

pub struct Emitter {
    indent_size: usize,
    block_seq_indent: usize,
    width: usize,
    allow_unicode: bool,
    out: String,
    column: usize,
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Emitter {
    pub fn new() -> Self {
        Self {
            indent_size: 2,
            block_seq_indent: 0,
            width: 80,
            allow_unicode: true,
            out: String::new(),
            column: 0,
        }
    }

    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent_size = indent.clamp(1, 10);
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

    pub fn with_allow_unicode(mut self, allow: bool) -> Self {
        self.allow_unicode = allow;
        self
    }

    // ===================================================================
    // STREAM
    // ===================================================================

    pub fn emit(&mut self, events: Vec<Event>) -> YamlResult<String> {
        self.out.clear();
        self.column = 0;
        let mut it = events.into_iter().peekable();
        match it.next() {
            Some(Event::StreamStart { .. }) => {}
            other => {
                return Err(emitter_error(format!(
                    "expected <stream start>, but got {}",
                    other.map(|e| e.id()).unwrap_or("nothing")
                )))
            }
        }
        loop {
            match it.peek() {
                None => break,
                Some(Event::StreamEnd { .. }) => {
                    it.next();
                    break;
                }
                Some(Event::DocumentStart { .. }) => self.emit_document(&mut it)?,
                Some(other) => {
                    return Err(emitter_error(format!(
                        "expected <document start>, but got {}",
                        other.id()
                    )))
                }
            }
        }
        Ok(std::mem::take(&mut self.out))
    }

    fn emit_document(&mut self, it: &mut Events) -> YamlResult<()> {
        let Some(Event::DocumentStart { explicit, version, comment, .. }) = it.next() else {
            return Err(emitter_error("expected <document start>"));
        };
        self.write_comment_block(&comment.pre, 0);
        if explicit {
            if let Some((major, minor)) = version {
                self.write(&format!("%YAML {}.{}", major, minor));
                self.line_break();
            }
            self.write("---");
            // scalars and flow roots share the marker line
            let same_line = matches!(
                it.peek(),
                Some(Event::Scalar { .. })
                    | Some(Event::Alias { .. })
                    | Some(Event::SequenceStart { flow_style: Some(true), .. })
                    | Some(Event::MappingStart { flow_style: Some(true), .. })
            );
            if !same_line {
                self.line_break();
            }
        }
        self.emit_root(it)?;
        let Some(Event::DocumentEnd { explicit, comment, .. }) = it.next() else {
            return Err(emitter_error("expected <document end>"));
        };
        self.write_comment_block(&comment.pre, 0);
        if explicit {
            if self.column > 0 {
                self.line_break();
            }
            self.write("...");
            self.line_break();
        }
        Ok(())
    }

    fn emit_root(&mut self, it: &mut Events) -> YamlResult<()> {
        let event = it
            .next()
            .ok_or_else(|| emitter_error("expected the document content"))?;
        match event {
            Event::Scalar { anchor, tag, implicit, value, style, comment, .. } => {
                self.write_comment_block(&comment.pre, 0);
                let chosen = self.choose_scalar_style(&value, style, implicit, false);
                let tag_text = format_tag(tag.as_deref(), implicit, chosen);
                let mut first = self.column == 0;
                if let Some(a) = &anchor {
                    self.write_spaced(&format!("&{}", a), &mut first);
                }
                if let Some(t) = &tag_text {
                    self.write_spaced(t, &mut first);
                }
                if !value.is_empty() || chosen != ScalarStyle::Plain {
                    let text = self.render_inline_scalar(&value, chosen, false);
                    self.write_spaced(&text, &mut first);
                }
                if let Some(post) = &comment.post {
                    self.write_inline_comment(post);
                }
                if self.column > 0 {
                    self.line_break();
                }
                Ok(())
            }
            Event::Alias { anchor, .. } => {
                if self.column > 0 {
                    self.write(" ");
                }
                self.write(&format!("*{}", anchor));
                self.line_break();
                Ok(())
            }
            Event::SequenceStart { anchor, tag, implicit, flow_style, comment, .. } => {
                let tag_text = collection_tag(tag.as_deref(), implicit);
                if flow_style == Some(true) {
                    let mut first = self.column == 0;
                    if let Some(a) = &anchor {
                        self.write_spaced(&format!("&{}", a), &mut first);
                    }
                    if let Some(t) = &tag_text {
                        self.write_spaced(t, &mut first);
                    }
                    if !first {
                        self.write(" ");
                    }
                    self.emit_flow_sequence(it, 0)?;
                    if let Some(post) = &comment.post {
                        self.write_inline_comment(post);
                    }
                    self.line_break();
                    Ok(())
                } else {
                    self.write_comment_block(&comment.pre, 0);
                    let mut first = true;
                    if let Some(a) = &anchor {
                        self.write_spaced(&format!("&{}", a), &mut first);
                    }
                    if let Some(t) = &tag_text {
                        self.write_spaced(t, &mut first);
                    }
                    if let Some(post) = &comment.post {
                        self.write_inline_comment(post);
                    }
                    if self.column > 0 {
                        self.line_break();
                    }
                    self.emit_block_sequence(it, self.block_seq_indent, false)
                }
            }
            Event::MappingStart { anchor, tag, implicit, flow_style, comment, .. } => {
                let tag_text = collection_tag(tag.as_deref(), implicit);
                if flow_style == Some(true) {
                    let mut first = self.column == 0;
                    if let Some(a) = &anchor {
                        self.write_spaced(&format!("&{}", a), &mut first);
                    }
                    if let Some(t) = &tag_text {
                        self.write_spaced(t, &mut first);
                    }
                    if !first {
                        self.write(" ");
                    }
                    self.emit_flow_mapping(it, 0)?;
                    if let Some(post) = &comment.post {
                        self.write_inline_comment(post);
                    }
                    self.line_break();
                    Ok(())
                } else {
                    self.write_comment_block(&comment.pre, 0);
                    let mut first = true;
                    if let Some(a) = &anchor {
                        self.write_spaced(&format!("&{}", a), &mut first);
                    }
                    if let Some(t) = &tag_text {
                        self.write_spaced(t, &mut first);
                    }
                    if let Some(post) = &comment.post {
                        self.write_inline_comment(post);
                    }
                    if self.column > 0 {
                        self.line_break();
                    }
                    self.emit_block_mapping(it, 0, false)
                }
            }
            other => Err(emitter_error(format!(
                "expected the document content, but got {}",
                other.id()
            ))),
        }
    }

    // ===================================================================
    // BLOCK COLLECTIONS
    // ===================================================================

    fn emit_block_sequence(
        &mut self,
        it: &mut Events,
        indent: usize,
        first_inline: bool,
    ) -> YamlResult<()> {
        let mut first = true;
        loop {
            if let Some(Event::SequenceEnd { .. }) = it.peek() {
                let Some(Event::SequenceEnd { comment, .. }) = it.next() else {
                    unreachable!("peeked sequence end");
                };
                self.write_comment_block(&comment.pre, indent);
                return Ok(());
            }
            let event = it
                .next()
                .ok_or_else(|| emitter_error("unexpected end of events in a sequence"))?;
            let inline_now = first_inline && first;
            first = false;
            if !inline_now {
                self.write_comment_block(event_pre(&event), indent);
                self.write_indent(indent);
            }
            self.write("-");
            self.emit_block_child(it, event, indent)?;
        }
    }

    fn emit_block_mapping(
        &mut self,
        it: &mut Events,
        indent: usize,
        first_inline: bool,
    ) -> YamlResult<()> {
        let mut first = true;
        loop {
            if let Some(Event::MappingEnd { .. }) = it.peek() {
                let Some(Event::MappingEnd { comment, .. }) = it.next() else {
                    unreachable!("peeked mapping end");
                };
                self.write_comment_block(&comment.pre, indent);
                return Ok(());
            }
            let key_event = it
                .next()
                .ok_or_else(|| emitter_error("unexpected end of events in a mapping"))?;
            let inline_now = first_inline && first;
            first = false;
            if !inline_now {
                self.write_comment_block(event_pre(&key_event), indent);
                self.write_indent(indent);
            }
            let key_post = self.emit_mapping_key(it, key_event, indent)?;
            self.write(":");
            let value_event = it
                .next()
                .ok_or_else(|| emitter_error("mapping key without a value event"))?;
            self.emit_block_child_value(it, value_event, indent, key_post)?;
        }
    }

    /// Key position: scalars, aliases and flow collections stay inline;
    /// block collections fall back to the explicit `? ` form. Returns the
    /// key's trailing comment for reuse on the entry line.
    fn emit_mapping_key(
        &mut self,
        it: &mut Events,
        event: Event,
        indent: usize,
    ) -> YamlResult<Option<CommentToken>> {
        match event {
            Event::Scalar { anchor, tag, implicit, value, style, comment, .. } => {
                let chosen = self.choose_scalar_style(&value, style, implicit, false);
                let tag_text = format_tag(tag.as_deref(), implicit, chosen);
                let mut first = true;
                if let Some(a) = &anchor {
                    self.write_spaced(&format!("&{}", a), &mut first);
                }
                if let Some(t) = &tag_text {
                    self.write_spaced(t, &mut first);
                }
                let text = self.render_inline_scalar(&value, chosen, false);
                if !text.is_empty() {
                    self.write_spaced(&text, &mut first);
                } else if !first {
                    // anchored empty key still needs the separating space
                    self.write(" ");
                }
                Ok(comment.post)
            }
            Event::Alias { anchor, comment, .. } => {
                // an alias key requires a space before the colon
                self.write(&format!("*{} ", anchor));
                Ok(comment.post)
            }
            Event::SequenceStart { flow_style, comment, .. }
                if flow_style == Some(true) =>
            {
                self.emit_flow_sequence(it, indent)?;
                Ok(comment.post)
            }
            Event::MappingStart { flow_style, comment, .. } if flow_style == Some(true) => {
                self.emit_flow_mapping(it, indent)?;
                Ok(comment.post)
            }
            Event::SequenceStart { comment, .. } => {
                self.write("? ");
                self.emit_block_sequence(it, indent + self.indent_size, true)?;
                self.write_indent(indent);
                Ok(comment.post)
            }
            Event::MappingStart { comment, .. } => {
                self.write("? ");
                self.emit_block_mapping(it, indent + self.indent_size, true)?;
                self.write_indent(indent);
                Ok(comment.post)
            }
            other => Err(emitter_error(format!(
                "expected a mapping key, but got {}",
                other.id()
            ))),
        }
    }

    /// Value position after a ':'
    fn emit_block_child_value(
        &mut self,
        it: &mut Events,
        event: Event,
        indent: usize,
        key_post: Option<CommentToken>,
    ) -> YamlResult<()> {
        match event {
            Event::Scalar { anchor, tag, implicit, value, style, comment, .. } => {
                let chosen = self.choose_scalar_style(&value, style, implicit, false);
                let tag_text = format_tag(tag.as_deref(), implicit, chosen);
                if let Some(a) = &anchor {
                    self.write(&format!(" &{}", a));
                }
                if let Some(t) = &tag_text {
                    self.write(&format!(" {}", t));
                }
                let inline = comment.post.or(key_post);
                if chosen.is_block() {
                    self.write(" ");
                    self.write_block_scalar(&value, chosen, indent, inline.as_ref());
                    self.write_comment_block(&comment.pre, indent + self.indent_size);
                    return Ok(());
                }
                if !(value.is_empty() && chosen == ScalarStyle::Plain) {
                    self.write(" ");
                    let text = self.render_inline_scalar(&value, chosen, false);
                    self.write(&text);
                }
                if let Some(post) = &inline {
                    self.write_inline_comment(post);
                }
                self.line_break();
                // own-line comments that followed the key line
                self.write_comment_block(&comment.pre, indent + self.indent_size);
                Ok(())
            }
            Event::Alias { anchor, comment, .. } => {
                self.write(&format!(" *{}", anchor));
                if let Some(post) = comment.post.or(key_post).as_ref() {
                    self.write_inline_comment(post);
                }
                self.line_break();
                Ok(())
            }
            Event::SequenceStart { anchor, tag, implicit, flow_style, comment, .. } => {
                let tag_text = collection_tag(tag.as_deref(), implicit);
                if let Some(a) = &anchor {
                    self.write(&format!(" &{}", a));
                }
                if let Some(t) = &tag_text {
                    self.write(&format!(" {}", t));
                }
                if flow_style == Some(true) {
                    self.write(" ");
                    self.emit_flow_sequence(it, indent)?;
                    if let Some(post) = comment.post.or(key_post).as_ref() {
                        self.write_inline_comment(post);
                    }
                    self.line_break();
                    return Ok(());
                }
                if let Some(post) = comment.post.or(key_post).as_ref() {
                    self.write_inline_comment(post);
                }
                self.line_break();
                self.write_comment_block(&comment.pre, indent + self.block_seq_indent);
                self.emit_block_sequence(it, indent + self.block_seq_indent, false)
            }
            Event::MappingStart { anchor, tag, implicit, flow_style, comment, .. } => {
                let tag_text = collection_tag(tag.as_deref(), implicit);
                if let Some(a) = &anchor {
                    self.write(&format!(" &{}", a));
                }
                if let Some(t) = &tag_text {
                    self.write(&format!(" {}", t));
                }
                if flow_style == Some(true) {
                    self.write(" ");
                    self.emit_flow_mapping(it, indent)?;
                    if let Some(post) = comment.post.or(key_post).as_ref() {
                        self.write_inline_comment(post);
                    }
                    self.line_break();
                    return Ok(());
                }
                if let Some(post) = comment.post.or(key_post).as_ref() {
                    self.write_inline_comment(post);
                }
                self.line_break();
                self.write_comment_block(&comment.pre, indent + self.indent_size);
                self.emit_block_mapping(it, indent + self.indent_size, false)
            }
            other => Err(emitter_error(format!(
                "expected a mapping value, but got {}",
                other.id()
            ))),
        }
    }

    /// Sequence entry after a '-'
    fn emit_block_child(
        &mut self,
        it: &mut Events,
        event: Event,
        indent: usize,
    ) -> YamlResult<()> {
        match event {
            Event::Scalar { anchor, tag, implicit, value, style, comment, .. } => {
                let chosen = self.choose_scalar_style(&value, style, implicit, false);
                let tag_text = format_tag(tag.as_deref(), implicit, chosen);
                if let Some(a) = &anchor {
                    self.write(&format!(" &{}", a));
                }
                if let Some(t) = &tag_text {
                    self.write(&format!(" {}", t));
                }
                if chosen.is_block() {
                    self.write(" ");
                    self.write_block_scalar(&value, chosen, indent, comment.post.as_ref());
                    return Ok(());
                }
                if !(value.is_empty() && chosen == ScalarStyle::Plain) {
                    self.write(" ");
                    let text = self.render_inline_scalar(&value, chosen, false);
                    self.write(&text);
                }
                if let Some(post) = &comment.post {
                    self.write_inline_comment(post);
                }
                self.line_break();
                Ok(())
            }
            Event::Alias { anchor, comment, .. } => {
                self.write(&format!(" *{}", anchor));
                if let Some(post) = &comment.post {
                    self.write_inline_comment(post);
                }
                self.line_break();
                Ok(())
            }
            Event::SequenceStart { anchor, tag, implicit, flow_style, comment, .. } => {
                let tag_text = collection_tag(tag.as_deref(), implicit);
                if let Some(a) = &anchor {
                    self.write(&format!(" &{}", a));
                }
                if let Some(t) = &tag_text {
                    self.write(&format!(" {}", t));
                }
                if flow_style == Some(true) {
                    self.write(" ");
                    self.emit_flow_sequence(it, indent)?;
                    if let Some(post) = &comment.post {
                        self.write_inline_comment(post);
                    }
                    self.line_break();
                    return Ok(());
                }
                let compact = anchor.is_none() && anchor_tag_absent(&tag_text)
                    && comment.post.is_none() && !next_has_pre_comments(it);
                if compact {
                    self.write(" ");
                    self.emit_block_sequence(it, indent + 2, true)
                } else {
                    if let Some(post) = &comment.post {
                        self.write_inline_comment(post);
                    }
                    self.line_break();
                    self.emit_block_sequence(it, indent + 2, false)
                }
            }
            Event::MappingStart { anchor, tag, implicit, flow_style, comment, .. } => {
                let tag_text = collection_tag(tag.as_deref(), implicit);
                if let Some(a) = &anchor {
                    self.write(&format!(" &{}", a));
                }
                if let Some(t) = &tag_text {
                    self.write(&format!(" {}", t));
                }
                if flow_style == Some(true) {
                    self.write(" ");
                    self.emit_flow_mapping(it, indent)?;
                    if let Some(post) = &comment.post {
                        self.write_inline_comment(post);
                    }
                    self.line_break();
                    return Ok(());
                }
                let compact = anchor.is_none() && anchor_tag_absent(&tag_text)
                    && comment.post.is_none() && !next_has_pre_comments(it);
                if compact {
                    self.write(" ");
                    self.emit_block_mapping(it, indent + 2, true)
                } else {
                    if let Some(post) = &comment.post {
                        self.write_inline_comment(post);
                    }
                    self.line_break();
                    self.emit_block_mapping(it, indent + 2, false)
                }
            }
            other => Err(emitter_error(format!(
                "expected a sequence entry, but got {}",
                other.id()
            ))),
        }
    }

    // ===================================================================
    // FLOW COLLECTIONS
    // ===================================================================

    fn emit_flow_sequence(&mut self, it: &mut Events, indent: usize) -> YamlResult<()> {
        self.write("[");
        let mut first = true;
        loop {
            if let Some(Event::SequenceEnd { .. }) = it.peek() {
                it.next();
                self.write("]");
                return Ok(());
            }
            if !first {
                self.write(",");
                if self.column > self.width {
                    self.line_break();
                    self.write_spaces(indent + self.indent_size);
                } else {
                    self.write(" ");
                }
            }
            first = false;
            let event = it
                .next()
                .ok_or_else(|| emitter_error("unexpected end of events in a flow sequence"))?;
            self.emit_flow_item(it, event, indent)?;
        }
    }

    fn emit_flow_mapping(&mut self, it: &mut Events, indent: usize) -> YamlResult<()> {
        self.write("{");
        let mut first = true;
        loop {
            if let Some(Event::MappingEnd { .. }) = it.peek() {
                it.next();
                self.write("}");
                return Ok(());
            }
            if !first {
                self.write(",");
                if self.column > self.width {
                    self.line_break();
                    self.write_spaces(indent + self.indent_size);
                } else {
                    self.write(" ");
                }
            }
            first = false;
            let key_event = it
                .next()
                .ok_or_else(|| emitter_error("unexpected end of events in a flow mapping"))?;
            self.emit_flow_item(it, key_event, indent)?;
            self.write(":");
            let value_event = it
                .next()
                .ok_or_else(|| emitter_error("flow mapping key without a value event"))?;
            let empty_scalar = matches!(
                &value_event,
                Event::Scalar { value, tag, anchor, .. }
                    if value.is_empty() && tag_is_implicit_null(tag) && anchor.is_none()
            );
            if !empty_scalar {
                self.write(" ");
                self.emit_flow_item(it, value_event, indent)?;
            }
        }
    }

    fn emit_flow_item(&mut self, it: &mut Events, event: Event, indent: usize) -> YamlResult<()> {
        match event {
            Event::Scalar { anchor, tag, implicit, value, style, .. } => {
                let chosen = self.choose_scalar_style(&value, style, implicit, true);
                let tag_text = format_tag(tag.as_deref(), implicit, chosen);
                let mut first = true;
                if let Some(a) = &anchor {
                    self.write_spaced(&format!("&{}", a), &mut first);
                }
                if let Some(t) = &tag_text {
                    self.write_spaced(t, &mut first);
                }
                let text = self.render_inline_scalar(&value, chosen, true);
                if !text.is_empty() {
                    self.write_spaced(&text, &mut first);
                }
                Ok(())
            }
            Event::Alias { anchor, .. } => {
                self.write(&format!("*{}", anchor));
                Ok(())
            }
            Event::SequenceStart { anchor, tag, implicit, .. } => {
                let tag_text = collection_tag(tag.as_deref(), implicit);
                let mut first = true;
                if let Some(a) = &anchor {
                    self.write_spaced(&format!("&{}", a), &mut first);
                }
                if let Some(t) = &tag_text {
                    self.write_spaced(t, &mut first);
                }
                if !first {
                    self.write(" ");
                }
                self.emit_flow_sequence(it, indent)
            }
            Event::MappingStart { anchor, tag, implicit, .. } => {
                let tag_text = collection_tag(tag.as_deref(), implicit);
                let mut first = true;
                if let Some(a) = &anchor {
                    self.write_spaced(&format!("&{}", a), &mut first);
                }
                if let Some(t) = &tag_text {
                    self.write_spaced(t, &mut first);
                }
                if !first {
                    self.write(" ");
                }
                self.emit_flow_mapping(it, indent)
            }
            other => Err(emitter_error(format!(
                "expected a flow node, but got {}",
                other.id()
            ))),
        }
    }

    // ===================================================================
    // SCALAR STYLING
    // ===================================================================

    /// Requested style, downgraded only when the context or content makes
    /// it impossible: plain falls back to single then double quotes, block
    /// styles fall back to double quotes in flow context.
    fn choose_scalar_style(
        &self,
        value: &str,
        style: Option<ScalarStyle>,
        implicit: (bool, bool),
        flow: bool,
    ) -> ScalarStyle {
        let requested = style.unwrap_or(ScalarStyle::Plain);
        match requested {
            ScalarStyle::Plain => {
                if value.is_empty() {
                    return ScalarStyle::Plain;
                }
                // plain is fine when the resolver re-derives the tag, or
                // when an explicit tag is going to be written anyway; a
                // plain rendition that would resolve to another type must
                // be quoted instead
                let type_safe = implicit.0 || !implicit.1;
                if type_safe && allow_plain(value, flow) {
                    ScalarStyle::Plain
                } else if allow_single(value) {
                    ScalarStyle::SingleQuoted
                } else {
                    ScalarStyle::DoubleQuoted
                }
            }
            ScalarStyle::SingleQuoted => {
                if allow_single(value) {
                    ScalarStyle::SingleQuoted
                } else {
                    ScalarStyle::DoubleQuoted
                }
            }
            ScalarStyle::DoubleQuoted => ScalarStyle::DoubleQuoted,
            ScalarStyle::Literal(chomp) => {
                if flow || value.is_empty() {
                    ScalarStyle::DoubleQuoted
                } else {
                    ScalarStyle::Literal(chomp)
                }
            }
            ScalarStyle::Folded(chomp) => {
                if flow || value.is_empty() {
                    ScalarStyle::DoubleQuoted
                } else {
                    ScalarStyle::Folded(chomp)
                }
            }
        }
    }

    /// Render a non-block scalar to its textual form
    fn render_inline_scalar(&self, value: &str, style: ScalarStyle, _flow: bool) -> String {
        match style {
            ScalarStyle::Plain => value.to_string(),
            ScalarStyle::SingleQuoted => format!("'{}'", value.replace('\'', "''")),
            ScalarStyle::DoubleQuoted => format!("\"{}\"", self.escape_double(value)),
            ScalarStyle::Literal(_) | ScalarStyle::Folded(_) => {
                // handled by write_block_scalar
                value.to_string()
            }
        }
    }

    fn escape_double(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len() + 2);
        for ch in value.chars() {
            match ch {
                '"' => out.push_str("\\\""),
                '\\' => out.push_str("\\\\"),
                '\0' => out.push_str("\\0"),
                '\u{7}' => out.push_str("\\a"),
                '\u{8}' => out.push_str("\\b"),
                '\t' => out.push_str("\\t"),
                '\n' => out.push_str("\\n"),
                '\u{b}' => out.push_str("\\v"),
                '\u{c}' => out.push_str("\\f"),
                '\r' => out.push_str("\\r"),
                '\u{1b}' => out.push_str("\\e"),
                '\u{85}' => out.push_str("\\N"),
                '\u{a0}' => out.push_str("\\_"),
                '\u{2028}' => out.push_str("\\L"),
                '\u{2029}' => out.push_str("\\P"),
                ch if (ch as u32) < 0x20 => {
                    out.push_str(&format!("\\x{:02x}", ch as u32));
                }
                ch if !ch.is_ascii() && !self.allow_unicode => {
                    let code = ch as u32;
                    if code <= 0xFFFF {
                        out.push_str(&format!("\\u{:04x}", code));
                    } else {
                        out.push_str(&format!("\\U{:08x}", code));
                    }
                }
                ch => out.push(ch),
            }
        }
        out
    }

    /// Literal and folded scalars: header with derived hints, then the body
    fn write_block_scalar(
        &mut self,
        value: &str,
        style: ScalarStyle,
        indent: usize,
        inline_comment: Option<&CommentToken>,
    ) {
        let folded = matches!(style, ScalarStyle::Folded(_));
        let child = indent + self.indent_size;
        let mut header = String::from(if folded { ">" } else { "|" });
        if value.starts_with(' ') || value.starts_with('\n') {
            header.push_str(&self.indent_size.to_string());
        }
        match derive_chomp(value) {
            Chomp::Strip => header.push('-'),
            Chomp::Keep => header.push('+'),
            Chomp::Clip => {}
        }
        self.write(&header);
        if let Some(comment) = inline_comment {
            self.write_inline_comment(comment);
        }
        self.line_break();

        let lines: Vec<&str> = value.split('\n').collect();
        let count = lines.len();
        for (i, line) in lines.into_iter().enumerate() {
            if i + 1 == count && line.is_empty() {
                break;
            }
            if line.is_empty() {
                self.line_break();
            } else if folded && !line.starts_with(' ') {
                self.write_spaces(child);
                self.write_folded_line(line, child);
                self.line_break();
            } else {
                self.write_spaces(child);
                self.write(line);
                self.line_break();
            }
        }
    }

    /// Fold one logical folded-scalar line at single-space boundaries
    fn write_folded_line(&mut self, line: &str, indent: usize) {
        for (space_run, word) in split_words(line) {
            if space_run == " "
                && self.column > indent
                && self.column + 1 + word.len() > self.width
            {
                self.line_break();
                self.write_spaces(indent);
            } else {
                self.write(space_run);
            }
            self.write(word);
        }
    }

    // ===================================================================
    // COMMENTS
    // ===================================================================

    fn write_comment_block(&mut self, comments: &[CommentToken], indent: usize) {
        for comment in comments {
            if self.column > 0 {
                self.line_break();
            }
            if comment.blank {
                self.line_break();
                continue;
            }
            let column = std::cmp::max(comment.start_mark.column, indent);
            self.write_spaces(column);
            self.write("#");
            self.write(&comment.value);
            self.line_break();
        }
    }

    fn write_inline_comment(&mut self, comment: &CommentToken) {
        self.write("  #");
        self.write(&comment.value);
    }

    // ===================================================================
    // LOW-LEVEL WRITING
    // ===================================================================

    fn write(&mut self, text: &str) {
        for ch in text.chars() {
            if ch == '\n' {
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
        self.out.push_str(text);
    }

    fn write_spaces(&mut self, n: usize) {
        for _ in 0..n {
            self.out.push(' ');
        }
        self.column += n;
    }

    fn write_spaced(&mut self, text: &str, first: &mut bool) {
        if *first {
            *first = false;
        } else {
            self.write(" ");
        }
        self.write(text);
    }

    fn line_break(&mut self) {
        self.out.push('\n');
        self.column = 0;
    }

    fn write_indent(&mut self, indent: usize) {
        if self.column > 0 {
            self.line_break();
        }
        self.write_spaces(indent);
    }
}

// ===============================================================================
// HELPERS
// ===============================================================================

fn event_pre(event: &Event) -> &[CommentToken] {
    match event {
        Event::Scalar { comment, .. }
        | Event::Alias { comment, .. }
        | Event::SequenceStart { comment, .. }
        | Event::MappingStart { comment, .. }
        | Event::SequenceEnd { comment, .. }
        | Event::MappingEnd { comment, .. }
        | Event::DocumentStart { comment, .. }
        | Event::DocumentEnd { comment, .. } => &comment.pre,
        _ => &[],
    }
}

fn next_has_pre_comments(it: &mut Events) -> bool {
    it.peek().map(|event| !event_pre(event).is_empty()).unwrap_or(false)
}

fn anchor_tag_absent(tag_text: &Option<String>) -> bool {
    tag_text.is_none()
}

fn tag_is_implicit_null(tag: &Option<String>) -> bool {
    matches!(tag.as_deref(), None | Some(crate::resolver::TAG_NULL))
}

/// Shorten a resolved tag for output; suppression happens in format_tag
fn shorten_tag(tag: &str) -> String {
    if let Some(suffix) = tag.strip_prefix("tag:yaml.org,2002:") {
        format!("!!{}", suffix)
    } else if tag.starts_with('!') {
        tag.to_string()
    } else {
        format!("!<{}>", tag)
    }
}

/// Tag text for a scalar, suppressed when the implicit resolver would
/// re-derive it from the chosen style
fn format_tag(tag: Option<&str>, implicit: (bool, bool), style: ScalarStyle) -> Option<String> {
    let tag = tag?;
    let suppress = if style == ScalarStyle::Plain { implicit.0 } else { implicit.1 };
    if suppress {
        return None;
    }
    Some(shorten_tag(tag))
}

fn collection_tag(tag: Option<&str>, implicit: bool) -> Option<String> {
    let tag = tag?;
    if implicit {
        return None;
    }
    Some(shorten_tag(tag))
}

fn derive_chomp(value: &str) -> Chomp {
    if !value.ends_with('\n') {
        Chomp::Strip
    } else if value.len() == 1 || value.ends_with("\n\n") {
        Chomp::Keep
    } else {
        Chomp::Clip
    }
}

/// Split text into (space-run, word) pairs; the space run before the first
/// word is empty
fn split_words(text: &str) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();
    let bytes = text.as_bytes();
    let mut pos = 0;
    while pos < bytes.len() {
        let space_start = pos;
        while pos < bytes.len() && bytes[pos] == b' ' {
            pos += 1;
        }
        let word_start = pos;
        while pos < bytes.len() && bytes[pos] != b' ' {
            pos += 1;
        }
        pairs.push((&text[space_start..word_start], &text[word_start..pos]));
    }
    pairs
}

/// Mirror of the scanner's plain-scalar rules: text that would not rescan
/// as the same plain scalar must be quoted
fn allow_plain(value: &str, flow: bool) -> bool {
    if value.is_empty() || value.contains('\n') {
        return false;
    }
    if value.starts_with(' ') || value.ends_with(' ') || value.starts_with('\t') {
        return false;
    }
    let first = value.chars().next().unwrap_or('\0');
    let second = value.chars().nth(1);
    let second_blank = matches!(second, None | Some(' ') | Some('\t'));
    match first {
        ',' | '[' | ']' | '{' | '}' | '#' | '&' | '*' | '!' | '|' | '>' | '\'' | '"' | '%'
        | '@' | '`' => return false,
        '-' | '?' | ':' if second_blank => return false,
        ':' | '?'
            if flow
                && matches!(
                    second,
                    Some(',') | Some('[') | Some(']') | Some('{') | Some('}')
                ) =>
        {
            return false
        }
        _ => {}
    }
    if value.ends_with(':') {
        return false;
    }
    if value.contains(": ") || value.contains(" #") || value.contains(":\t") {
        return false;
    }
    if flow {
        if value.contains(['[', ']', '{', '}', ',']) {
            return false;
        }
        // ':' followed by a blank would end the scalar early
        if let Some(pos) = value.find(':') {
            let rest = &value[pos + 1..];
            if rest.starts_with(' ') || rest.is_empty() {
                return false;
            }
        }
    }
    true
}

fn allow_single(value: &str) -> bool {
    !value.contains('\n') && !value.contains('\u{85}')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_analysis() {
        assert!(allow_plain("hello", false));
        assert!(allow_plain("-123", false));
        assert!(allow_plain("http://example.com/foo#bar", false));
        assert!(!allow_plain("- item", false));
        assert!(!allow_plain("a: b", false));
        assert!(!allow_plain("a #b", false));
        assert!(!allow_plain(" padded", false));
        assert!(!allow_plain("line\nbreak", false));
        assert!(!allow_plain("[1]", false));
        assert!(allow_plain("::vector", true));
        assert!(!allow_plain("a, b", true));
    }

    #[test]
    fn tag_shortening() {
        assert_eq!(shorten_tag("tag:yaml.org,2002:str"), "!!str");
        assert_eq!(shorten_tag("!Ref"), "!Ref");
        assert_eq!(shorten_tag("tag:example.com,2000:app/thing"), "!<tag:example.com,2000:app/thing>");
    }

    #[test]
    fn chomp_derivation() {
        assert_eq!(derive_chomp("text"), Chomp::Strip);
        assert_eq!(derive_chomp("text\n"), Chomp::Clip);
        assert_eq!(derive_chomp("text\n\n"), Chomp::Keep);
        assert_eq!(derive_chomp("\n"), Chomp::Keep);
    }

    #[test]
    fn double_escapes() {
        let emitter = Emitter::new();
        assert_eq!(emitter.escape_double("a\nb"), "a\\nb");
        assert_eq!(emitter.escape_double("tab\there"), "tab\\there");
        assert_eq!(emitter.escape_double("quote\"q"), "quote\\\"q");
    }
}
