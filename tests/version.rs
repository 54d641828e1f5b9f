use std::cell::RefCell;
use std::rc::Rc;

use indoc::indoc;
use pretty_assertions::assert_eq;
use yaml_roundtrip::{CollectSink, Value, Yaml, YamlConfig, YamlWarning};

fn load(source: &str) -> Value {
    Yaml::new().load_str(source).unwrap()
}

fn load_with_version(source: &str, version: (u32, u32)) -> Value {
    Yaml::with_config(YamlConfig::default().with_version(Some(version)))
        .load_str(source)
        .unwrap()
}

const VERSIONED_SCALARS: &str = indoc! {"
    - 12:34:56
    - 012
    - 012345678
    - 0o12
    - on
    - off
    - yes
    - no
    - true
"};

#[test]
fn explicit_1_2_directive() {
    let value = load(&format!("%YAML 1.2\n---\n{}", VERSIONED_SCALARS));
    assert_eq!(value.idx(0).unwrap().as_str(), Some("12:34:56"));
    assert_eq!(value.idx(1).unwrap().as_i64(), Some(12));
    assert_eq!(value.idx(2).unwrap().as_str(), Some("012345678"));
    assert_eq!(value.idx(3).unwrap().as_i64(), Some(10));
    assert_eq!(value.idx(4).unwrap().as_str(), Some("on"));
    assert_eq!(value.idx(5).unwrap().as_str(), Some("off"));
    assert_eq!(value.idx(6).unwrap().as_str(), Some("yes"));
    assert_eq!(value.idx(7).unwrap().as_str(), Some("no"));
    assert_eq!(value.idx(8).unwrap().as_bool(), Some(true));
}

#[test]
fn explicit_1_1_directive() {
    let value = load(&format!("%YAML 1.1\n---\n{}", VERSIONED_SCALARS));
    assert_eq!(value.idx(0).unwrap().as_i64(), Some(45296));
    assert_eq!(value.idx(1).unwrap().as_i64(), Some(10));
    assert_eq!(value.idx(2).unwrap().as_str(), Some("012345678"));
    assert_eq!(value.idx(3).unwrap().as_str(), Some("0o12"));
    assert_eq!(value.idx(4).unwrap().as_bool(), Some(true));
    assert_eq!(value.idx(5).unwrap().as_bool(), Some(false));
    assert_eq!(value.idx(6).unwrap().as_bool(), Some(true));
    assert_eq!(value.idx(7).unwrap().as_bool(), Some(false));
    assert_eq!(value.idx(8).unwrap().as_bool(), Some(true));
}

#[test]
fn implicit_default_is_1_2() {
    let value = load(VERSIONED_SCALARS);
    assert_eq!(value.idx(0).unwrap().as_str(), Some("12:34:56"));
    assert_eq!(value.idx(1).unwrap().as_i64(), Some(12));
    assert_eq!(value.idx(4).unwrap().as_str(), Some("on"));
}

#[test]
fn configured_version_1_1() {
    let value = load_with_version(
        indoc! {"
            - 12:34:56
            - 12:34:56.78
            - 012
            - 012345678
            - 0o12
            - on
        "},
        (1, 1),
    );
    assert_eq!(value.idx(0).unwrap().as_i64(), Some(45296));
    assert_eq!(value.idx(1).unwrap().as_f64(), Some(45296.78));
    assert_eq!(value.idx(2).unwrap().as_i64(), Some(10));
    assert_eq!(value.idx(3).unwrap().as_str(), Some("012345678"));
    assert_eq!(value.idx(4).unwrap().as_str(), Some("0o12"));
    assert_eq!(value.idx(5).unwrap().as_bool(), Some(true));
}

#[test]
fn scenario_version_switch_values() {
    let value = load("%YAML 1.1\n---\n- 012\n- on\n- 12:34:56\n");
    assert_eq!(value.idx(0).unwrap().as_i64(), Some(10));
    assert_eq!(value.idx(1).unwrap().as_bool(), Some(true));
    assert_eq!(value.idx(2).unwrap().as_i64(), Some(45296));

    let value = load("- 012\n- on\n- 12:34:56\n");
    assert_eq!(value.idx(0).unwrap().as_i64(), Some(12));
    assert_eq!(value.idx(1).unwrap().as_str(), Some("on"));
    assert_eq!(value.idx(2).unwrap().as_str(), Some("12:34:56"));
}

// the issue-62 inputs: directive contexts must fail loudly under 1.1 rules

#[test]
fn flow_colon_scalar_is_error_under_1_1() {
    let yaml = Yaml::new();
    let source = "%YAML 1.1\n---\n\
        [::vector, \": - ()\", \"Down, down and away!\", -456, http://example.com/foo#bar]\n";
    assert!(yaml.load_str(source).is_err());
}

#[test]
fn flow_colon_scalar_round_trips_under_1_2() {
    let yaml = Yaml::new();
    let source =
        "[::vector, \": - ()\", \"Down, down and away!\", -456, http://example.com/foo#bar]\n";
    let value = yaml.load_str(source).unwrap();
    assert_eq!(value.idx(0).unwrap().as_str(), Some("::vector"));
    assert_eq!(value.idx(3).unwrap().as_i64(), Some(-456));
    assert_eq!(
        value.idx(4).unwrap().as_str(),
        Some("http://example.com/foo#bar")
    );
    assert_eq!(yaml.dump_str(&value).unwrap(), source);
}

#[test]
fn flow_question_mark_is_error_under_1_1() {
    let yaml = Yaml::new();
    let source = "%YAML 1.1\n---\n[random plain value that contains a ? character]\n";
    assert!(yaml.load_str(source).is_err());
}

#[test]
fn flow_question_mark_parses_under_1_2() {
    let yaml = Yaml::new();
    let source = "[random plain value that contains a ? character]\n";
    let value = yaml.load_str(source).unwrap();
    assert_eq!(
        value.idx(0).unwrap().as_str(),
        Some("random plain value that contains a ? character")
    );
    assert_eq!(yaml.dump_str(&value).unwrap(), source);
}

#[test]
fn duplicate_yaml_directive_is_parser_error() {
    let yaml = Yaml::new();
    let err = yaml.load_str("%YAML 1.1\n%YAML 1.1\n---\na: 1\n").unwrap_err();
    assert!(err.to_string().contains("duplicate YAML directive"));
}

// duplicate keys: hard error by default, warning when allowed

#[test]
fn duplicate_key_is_error() {
    let yaml = Yaml::new();
    let err = yaml.load_str("a: 1\na: 2\n").unwrap_err();
    assert!(err.to_string().contains("duplicate key"));
}

#[test]
fn duplicate_key_via_alias_is_error() {
    let yaml = Yaml::new();
    let err = yaml
        .load_str(indoc! {"
            &anchor foo:
              foo: bar
              *anchor : duplicate key
              baz: bat
              *anchor : duplicate key
        "})
        .unwrap_err();
    assert!(err.to_string().contains("duplicate key"));
}

#[test]
fn allow_duplicate_keys_downgrades_to_warning() {
    let mut yaml =
        Yaml::with_config(YamlConfig::default().with_allow_duplicate_keys(true));
    let sink = Rc::new(RefCell::new(CollectSink::default()));
    yaml.set_warning_sink(sink.clone());
    let value = yaml.load_str("a: 1\na: 2\n").unwrap();
    // the later occurrence wins, the earlier position is kept
    assert_eq!(value.get_str("a").unwrap().as_i64(), Some(2));
    assert!(matches!(
        &sink.borrow().warnings[0],
        YamlWarning::DuplicateKeyFuture { key, .. } if key == "a"
    ));
}

#[test]
fn version_directive_round_trips_with_explicit_start() {
    let yaml = Yaml::with_config(
        YamlConfig::default()
            .with_version(Some((1, 1)))
            .with_explicit_start(true),
    );
    let source = "%YAML 1.1\n---\n- yes\n- no\n";
    let value = yaml.load_str(source).unwrap();
    assert_eq!(value.idx(0).unwrap().as_bool(), Some(true));
    assert_eq!(yaml.dump_str(&value).unwrap(), source);
}
