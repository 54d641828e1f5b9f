use std::cell::RefCell;
use std::rc::Rc;

use indoc::indoc;
use pretty_assertions::assert_eq;
use yaml_roundtrip::{
    CollectSink, Map, Scalar, Value, Yaml, YamlErrorKind, YamlWarning,
};

fn round_trip(source: &str) {
    let yaml = Yaml::new();
    let value = yaml.load_str(source).unwrap();
    assert_eq!(yaml.dump_str(&value).unwrap(), source);
}

#[test]
fn anchor_id_renumber() {
    let yaml = Yaml::new();
    let value = yaml
        .load_str(indoc! {"
            a: &id002
              b: 1
              c: 2
            d: *id002
        "})
        .unwrap();
    assert_eq!(
        yaml.dump_str(&value).unwrap(),
        indoc! {"
            a: &id001
              b: 1
              c: 2
            d: *id001
        "}
    );
}

#[test]
fn anchor_assigned_on_value() {
    let yaml = Yaml::new();
    let value = yaml
        .load_str(indoc! {"
            a: &id002
              b: 1
              c: 2
            d: *id002
            e: &etemplate
              b: 1
              c: 2
            f: *etemplate
        "})
        .unwrap();
    // the templated anchor is dropped, the explicit one is kept
    let d = value.get_str("d").unwrap().as_map().unwrap();
    assert!(d.borrow().anchor.is_none());
    let e = value.get_str("e").unwrap().as_map().unwrap();
    let anchor = e.borrow().anchor.clone().unwrap();
    assert_eq!(anchor.name, "etemplate");
    assert!(!anchor.always_dump);
}

#[test]
fn anchor_id_retained() {
    let yaml = Yaml::new();
    let value = yaml
        .load_str(indoc! {"
            a: &id002
              b: 1
              c: 2
            d: *id002
            e: &etemplate
              b: 1
              c: 2
            f: *etemplate
        "})
        .unwrap();
    assert_eq!(
        yaml.dump_str(&value).unwrap(),
        indoc! {"
            a: &id001
              b: 1
              c: 2
            d: *id001
            e: &etemplate
              b: 1
              c: 2
            f: *etemplate
        "}
    );
}

#[test]
fn alias_before_anchor_is_composer_error() {
    let yaml = Yaml::new();
    let err = yaml
        .load_str(indoc! {"
            d: *id002
            a: &id002
              b: 1
              c: 2
        "})
        .unwrap_err();
    assert_eq!(err.kind, YamlErrorKind::Composer);
    assert!(err.to_string().contains("undefined alias"));
}

#[test]
fn anchor_on_sequence_preserved() {
    let yaml = Yaml::new();
    let value = yaml
        .load_str(indoc! {"
            nut1: &alice
            - 1
            - 2
            nut2: &blake
            - some data
            - *alice
            nut3:
            - *blake
            - *alice
        "})
        .unwrap();
    let nut1 = value.get_str("nut1").unwrap().as_seq().unwrap();
    let anchor = nut1.borrow().anchor.clone().unwrap();
    assert_eq!(anchor.name, "alice");
    // aliases share the cell
    let nut3 = value.get_str("nut3").unwrap().as_seq().unwrap();
    let shared = nut3.borrow().items[1].value.as_seq().unwrap();
    assert!(Rc::ptr_eq(&nut1, &shared));
}

#[test]
fn added_anchor_with_always_dump() {
    let mut inner = Map::new();
    inner.insert_str("c", Value::Scalar(Scalar::int(3)));
    inner.set_anchor("xyz", true);
    let mut data = Map::new();
    data.insert_str("a", Value::new_map(inner));
    data.insert_str("b", Value::Scalar(Scalar::int(2)));
    data.set_anchor("klm", true);

    let yaml = Yaml::new();
    assert_eq!(
        yaml.dump_str(&Value::new_map(data)).unwrap(),
        indoc! {"
            &klm
            a: &xyz
              c: 3
            b: 2
        "}
    );
}

#[test]
fn reused_anchor_warns_and_rebinds() {
    let mut yaml = Yaml::new();
    let sink = Rc::new(RefCell::new(CollectSink::default()));
    yaml.set_warning_sink(sink.clone());
    let value = yaml
        .load_str(indoc! {"
            - &a
              x: 1
            - <<: *a
            - &a
              x: 2
            - <<: *a
        "})
        .unwrap();
    let collected = sink.borrow();
    assert_eq!(collected.warnings.len(), 1);
    assert!(matches!(
        &collected.warnings[0],
        YamlWarning::ReusedAnchor { anchor, .. } if anchor == "a"
    ));
    drop(collected);
    // each alias binds to the most recent definition before it
    assert_eq!(value.idx(1).unwrap().get_str("x").unwrap().as_i64(), Some(1));
    assert_eq!(value.idx(3).unwrap().get_str("x").unwrap().as_i64(), Some(2));
}

#[test]
fn default_sink_logs_warnings() {
    let _ = env_logger::builder().is_test(true).try_init();
    let yaml = Yaml::new();
    // the default sink routes the reused-anchor warning to the log crate
    yaml.load_str("- &a 1\n- *a\n- &a 2\n").unwrap();
}

#[test]
fn anchor_defined_three_times_warns_twice() {
    let mut yaml = Yaml::new();
    let sink = Rc::new(RefCell::new(CollectSink::default()));
    yaml.set_warning_sink(sink.clone());
    yaml.load_str("- &a 1\n- *a\n- &a 2\n- *a\n- &a 3\n- *a\n").unwrap();
    assert_eq!(sink.borrow().warnings.len(), 2);
}

#[test]
fn full_charset_anchor_names() {
    round_trip(indoc! {"
        - &Backend.Civilizations.RacialPerk
          items:
          - key: perk_population_growth_modifier
        - *Backend.Civilizations.RacialPerk
    "});
}

#[test]
fn dotted_anchor_on_flow_sequence() {
    let yaml = Yaml::new();
    let value = yaml
        .load_str("- &dotted.words.here [a, b]\n- *dotted.words.here\n")
        .unwrap();
    let first = value.idx(0).unwrap().as_seq().unwrap();
    assert_eq!(first.borrow().anchor.clone().unwrap().name, "dotted.words.here");
    assert_eq!(
        yaml.dump_str(&value).unwrap(),
        "- &dotted.words.here [a, b]\n- *dotted.words.here\n"
    );
}

#[test]
fn recursive_document_constructs_and_dumps() {
    let yaml = Yaml::new();
    let value = yaml.load_str("&root\na: *root\n").unwrap();
    let map = value.as_map().unwrap();
    let inner = map.borrow().lookup(&yaml_roundtrip::Key::str("a")).unwrap();
    assert!(Rc::ptr_eq(&map, &inner.as_map().unwrap()));
    assert_eq!(yaml.dump_str(&value).unwrap(), "&root\na: *root\n");
}
