use indoc::indoc;
use pretty_assertions::assert_eq;
use yaml_roundtrip::{Yaml, YamlConfig};

fn round_trip(source: &str) {
    let yaml = Yaml::new();
    let value = yaml.load_str(source).unwrap();
    assert_eq!(yaml.dump_str(&value).unwrap(), source);
}

/// emit(parse(emit(parse(s)))) == emit(parse(s))
fn second_pass_fixed_point(source: &str) -> String {
    let yaml = Yaml::new();
    let first = yaml.dump_str(&yaml.load_str(source).unwrap()).unwrap();
    let second = yaml.dump_str(&yaml.load_str(&first).unwrap()).unwrap();
    assert_eq!(second, first);
    first
}

#[test]
fn simple_mapping() {
    round_trip("a: 1\nb: two\n");
}

#[test]
fn simple_sequence() {
    round_trip("- a\n- b\n- c\n");
}

#[test]
fn nested_collections() {
    round_trip(indoc! {"
        outer:
          inner:
            x: 1
          list:
          - a
          - b
        scalars:
        - 42
        - 3.5
        - true
        - null
    "});
}

#[test]
fn quote_styles_preserved() {
    round_trip(indoc! {"
        plain: word
        single: 'quoted'
        double: \"escaped\"
    "});
}

#[test]
fn quoted_scalar_that_looks_like_a_number() {
    round_trip("version: '012345678'\n");
}

#[test]
fn flow_collections() {
    round_trip(indoc! {"
        seq: [1, 2, 3]
        map: {a: 1, b: 2}
        nested: [[1, 2], {k: v}]
    "});
}

#[test]
fn block_scalars() {
    round_trip(indoc! {"
        literal: |
          line one
          line two
        folded: >
          folded text here
        stripped: |-
          no trailing newline
    "});
}

#[test]
fn block_scalar_keep_chomping() {
    round_trip("kept: |+\n  text\n\n");
}

#[test]
fn inline_comment() {
    round_trip("a: 1  # inline\nb: 2\n");
}

#[test]
fn leading_and_between_comments() {
    round_trip(indoc! {"
        # leading comment
        key: value  # inline
        # comment between entries
        other: thing
    "});
}

#[test]
fn blank_lines_preserved() {
    round_trip(indoc! {"
        a: 1

        b: 2
    "});
}

#[test]
fn blank_line_before_comment() {
    round_trip(indoc! {"
        a: 1

        # after a blank line
        b: 2
    "});
}

#[test]
fn trailing_document_comment() {
    round_trip("a: 1\n# trailing comment\n");
}

#[test]
fn comment_before_sequence_item() {
    round_trip(indoc! {"
        - one
        # note about two
        - two
    "});
}

#[test]
fn comment_above_mapping_item_in_sequence() {
    round_trip(indoc! {"
        # first block
        - x: 1
          y: 2
        # second block
        - x: 3
    "});
}

#[test]
fn sequence_of_mappings_compact() {
    round_trip(indoc! {"
        - name: one
          id: 1
        - name: two
          id: 2
    "});
}

#[test]
fn number_formats_preserved() {
    round_trip(indoc! {"
        hex: 0x1A
        octal: 0o17
        binary: 0b101
        plain: 42
        float: 3.5
        exp: 1e3
        inf: .inf
        neg_inf: -.inf
        not_a_number: .nan
    "});
}

#[test]
fn timestamps_preserved() {
    round_trip(indoc! {"
        date: 2002-12-14
        stamp: 2001-12-15T02:59:43.1Z
    "});
}

#[test]
fn binary_preserved() {
    round_trip("data: !!binary aGVsbG8=\n");
}

#[test]
fn empty_values() {
    round_trip("a:\nb: 1\n");
}

#[test]
fn omap_round_trip() {
    round_trip("!!omap\n- a: 1\n- b: 2\n");
}

#[test]
fn set_normalizes_to_mapping_form() {
    let yaml = Yaml::new();
    let value = yaml.load_str("!!set\n? a\n? b\n").unwrap();
    assert_eq!(yaml.dump_str(&value).unwrap(), "!!set\na:\nb:\n");
    let reloaded = yaml.load_str("!!set\na:\nb:\n").unwrap();
    let set = reloaded.as_set().unwrap();
    assert_eq!(set.borrow().len(), 2);
}

#[test]
fn multi_document_stream() {
    let yaml = Yaml::new();
    let values = yaml.load_all_str("a: 1\n---\nb: 2\n").unwrap();
    assert_eq!(values.len(), 2);
    assert_eq!(yaml.dump_all_str(&values).unwrap(), "a: 1\n---\nb: 2\n");
}

#[test]
fn explicit_markers_from_config() {
    let yaml = Yaml::with_config(
        YamlConfig::default().with_explicit_start(true).with_explicit_end(true),
    );
    let value = yaml.load_str("a: 1\n").unwrap();
    assert_eq!(yaml.dump_str(&value).unwrap(), "---\na: 1\n...\n");
}

#[test]
fn flow_sequence_key_round_trips() {
    let yaml = Yaml::with_config(
        YamlConfig::default()
            .with_version(Some((1, 2)))
            .with_explicit_start(true),
    );
    let source = "%YAML 1.2\n---\n[2, 3, 4]:\n  a: Hello\n";
    let value = yaml.load_str(source).unwrap();
    assert_eq!(yaml.dump_str(&value).unwrap(), source);
}

#[test]
fn spacing_normalizes_then_stabilizes() {
    let out = second_pass_fixed_point("- abc\n-  ghi # some comment\n- klm\n");
    assert_eq!(out, "- abc\n- ghi  # some comment\n- klm\n");
}

#[test]
fn wide_indent_with_block_seq_indent() {
    let yaml = Yaml::with_config(
        YamlConfig::default().with_indent(4).with_block_seq_indent(2),
    );
    let value = yaml.load_str("AList:\n- one\n- two\n").unwrap();
    assert_eq!(
        yaml.dump_str(&value).unwrap(),
        "AList:\n  - one\n  - two\n"
    );
}

#[test]
fn unicode_escaping_when_disallowed() {
    let yaml = Yaml::with_config(YamlConfig::default().with_allow_unicode(false));
    let value = yaml.load_str("name: \"caf\u{e9}\"\n").unwrap();
    assert_eq!(yaml.dump_str(&value).unwrap(), "name: \"caf\\u00e9\"\n");
}
