use indoc::indoc;
use pretty_assertions::assert_eq;
use yaml_roundtrip::{Key, Value, Yaml};

const MERGE_YAML: &str = indoc! {"
    - &CENTER {x: 1, y: 2}
    - &LEFT {x: 0, y: 2}
    - &BIG {r: 10}
    - &SMALL {r: 1}
    # All the following maps are equal:
    # Explicit keys
    - x: 1
      y: 2
      r: 10
      label: center/small
    # Merge one map
    - <<: *CENTER
      r: 10
      label: center/medium
    # Merge multiple maps
    - <<: [*CENTER, *BIG]
      label: center/big
    # Override
    - <<: [*BIG, *LEFT, *SMALL]
      x: 1
      label: center/huge
"};

fn load(source: &str) -> Value {
    Yaml::new().load_str(source).unwrap()
}

#[test]
fn merged_maps_agree_with_explicit_one() {
    let data = load(MERGE_YAML);
    let explicit = data.idx(4).unwrap();
    for other in [5usize, 6, 7] {
        let merged = data.idx(other).unwrap();
        for key in ["x", "y", "r"] {
            assert_eq!(
                merged.get_str(key).unwrap().as_i64(),
                explicit.get_str(key).unwrap().as_i64(),
                "key {} of item {}",
                key,
                other
            );
        }
    }
}

#[test]
fn merge_round_trips_verbatim() {
    let yaml = Yaml::new();
    let value = yaml.load_str(MERGE_YAML).unwrap();
    assert_eq!(yaml.dump_str(&value).unwrap(), MERGE_YAML);
}

#[test]
fn merge_is_recorded_not_flattened() {
    let data = load(indoc! {"
        k: &level_2 {a: 1, b: 2}
        l: &level_1 {a: 10, c: 3}
        m:
          <<: *level_1
          c: 30
          d: 40
    "});
    let m = data.get_str("m").unwrap().as_map().unwrap();
    let m = m.borrow();
    assert!(m.has_merges());
    assert_eq!(m.own_len(), 2);
    assert_eq!(m.len(), 4);
    assert_eq!(m.lookup(&Key::str("a")).unwrap().as_i64(), Some(10));
    assert_eq!(m.lookup(&Key::str("c")).unwrap().as_i64(), Some(30));
}

const KEYS_VALUES_YAML: &str = indoc! {"
    - &mx
      a: x1
      b: x2
      c: x3
    - &my
      a: y1
      b: y2  # masked by the one in &mx
      d: y4
    - a: 1
      <<: *mx
      m: 6
      <<: *my
"};

#[test]
fn merge_visibility_counts() {
    let data = load(KEYS_VALUES_YAML);
    let map = data.idx(2).unwrap().as_map().unwrap();
    let map = map.borrow();
    assert_eq!(map.len(), 5);
    assert_eq!(
        map.keys(),
        vec![
            Key::str("a"),
            Key::str("m"),
            Key::str("b"),
            Key::str("c"),
            Key::str("d"),
        ]
    );
    assert_eq!(map.items().len(), 5);
}

#[test]
fn merge_lookup_precedence() {
    let data = load(KEYS_VALUES_YAML);
    let map = data.idx(2).unwrap();
    // own key wins
    assert_eq!(map.get_str("a").unwrap().as_i64(), Some(1));
    // first merge wins over the second
    assert_eq!(map.get_str("b").unwrap().as_str(), Some("x2"));
    assert_eq!(map.get_str("c").unwrap().as_str(), Some("x3"));
    // only the second merge has d
    assert_eq!(map.get_str("d").unwrap().as_str(), Some("y4"));
    assert_eq!(map.get_str("m").unwrap().as_i64(), Some(6));
}

#[test]
fn delete_own_key_keeps_merged_view() {
    let data = load(KEYS_VALUES_YAML);
    let map = data.idx(2).unwrap().as_map().unwrap();
    assert_eq!(map.borrow().len(), 5);
    // deleting an own key that has no merged counterpart shrinks the view
    assert!(map.borrow_mut().delete(&Key::str("m")));
    assert_eq!(map.borrow().len(), 4);
    // deleting an own key shadowing a merged one re-exposes the merged value
    assert!(map.borrow_mut().delete(&Key::str("a")));
    assert_eq!(map.borrow().len(), 4);
    assert_eq!(
        map.borrow().lookup(&Key::str("a")).unwrap().as_str(),
        Some("x1")
    );
    // merged-only keys cannot be deleted
    assert!(!map.borrow_mut().delete(&Key::str("d")));
}

#[test]
fn nested_merge_round_trips() {
    let yaml = Yaml::new();
    let source = indoc! {"
        a:
          <<: &content
            1: plugh
            2: plover
          0: xyzzy
        b:
          <<: *content
    "};
    let value = yaml.load_str(source).unwrap();
    let a = value.get_str("a").unwrap();
    assert_eq!(a.get(&Key::Int(1)).unwrap().as_str(), Some("plugh"));
    assert_eq!(a.get(&Key::Int(0)).unwrap().as_str(), Some("xyzzy"));
    let b = value.get_str("b").unwrap();
    assert_eq!(b.get(&Key::Int(2)).unwrap().as_str(), Some("plover"));
    assert_eq!(yaml.dump_str(&value).unwrap(), source);
}

#[test]
fn nested_merge_with_sequence_of_targets() {
    let data = load(indoc! {"
        a:
          <<: &content
            <<: &y2
              1: plugh
            2: plover
          0: xyzzy
        b:
          <<: [*content, *y2]
    "});
    let b = data.get_str("b").unwrap();
    assert_eq!(b.get(&Key::Int(1)).unwrap().as_str(), Some("plugh"));
    assert_eq!(b.get(&Key::Int(2)).unwrap().as_str(), Some("plover"));
}

#[test]
fn merge_chain_lookup() {
    // reported against the original as issue 130
    let data = load(indoc! {"
        components:
          server: &server_component
            type: spark.server:ServerComponent
            host: 0.0.0.0
            port: 8000
          shell: &shell_component
            type: spark.shell:ShellComponent
        services:
          server: &server_service
            <<: *server_component
          shell: &shell_service
            <<: *shell_component
            components:
              server: {<<: *server_service}
        "});
    let port = data
        .get_str("services")
        .and_then(|s| s.get_str("shell"))
        .and_then(|s| s.get_str("components"))
        .and_then(|s| s.get_str("server"))
        .and_then(|s| s.get_str("port"))
        .and_then(|v| v.as_i64());
    assert_eq!(port, Some(8000));
}

#[test]
fn scenario_merge_center() {
    let yaml = Yaml::new();
    let source = indoc! {"
        base: &CENTER
          x: 1
          y: 2
        derived:
          <<: *CENTER
          r: 10
    "};
    let value = yaml.load_str(source).unwrap();
    let derived = value.get_str("derived").unwrap();
    assert_eq!(derived.get_str("x").unwrap().as_i64(), Some(1));
    assert_eq!(derived.get_str("y").unwrap().as_i64(), Some(2));
    assert_eq!(derived.get_str("r").unwrap().as_i64(), Some(10));
    assert_eq!(yaml.dump_str(&value).unwrap(), source);
}
