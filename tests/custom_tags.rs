use indoc::indoc;
use pretty_assertions::assert_eq;
use regex::Regex;
use yaml_roundtrip::{Scalar, ScalarStyle, ScalarValue, Value, Yaml, YamlConfig};

#[test]
fn unknown_tags_are_preserved_without_registration() {
    let yaml = Yaml::new();
    let source = indoc! {"
        AList:
        - !Ref One
        - !Ref 'Two'
        BList: [!Ref Three, !Ref \"Four\"]
        CList:
        - Five Six
        - 'Seven Eight'
    "};
    let value = yaml.load_str(source).unwrap();
    let alist = value.get_str("AList").unwrap();
    let first = alist.idx(0).unwrap();
    assert_eq!(first.as_scalar().unwrap().tag.as_deref(), Some("!Ref"));
    assert_eq!(first.as_str(), Some("One"));
    // the quoting choice survives per entry
    assert_eq!(
        alist.idx(1).unwrap().as_scalar().unwrap().style,
        ScalarStyle::SingleQuoted
    );
    assert_eq!(yaml.dump_str(&value).unwrap(), source);
}

#[test]
fn custom_tags_with_wide_indent() {
    let yaml = Yaml::with_config(
        YamlConfig::default().with_indent(4).with_block_seq_indent(2),
    );
    let value = yaml
        .load_str("AList:\n  - !Ref One\n  - !Ref 'Two'\n")
        .unwrap();
    assert_eq!(
        yaml.dump_str(&value).unwrap(),
        "AList:\n  - !Ref One\n  - !Ref 'Two'\n"
    );
}

#[test]
fn registered_constructor_builds_custom_value() {
    let mut yaml = Yaml::new();
    yaml.add_constructor("!dice", |c, node| {
        let text = c.scalar_text(node)?;
        let (a, b) = text.split_once('d').unwrap_or(("0", "0"));
        let mut scalar = Scalar::str(format!("{}d{}", a, b)).with_tag("!dice");
        scalar.src = Some(text);
        Ok(Value::Scalar(scalar))
    });
    let value = yaml.load_str("initial hit points: !dice 8d4\n").unwrap();
    let dice = value.get_str("initial hit points").unwrap();
    assert_eq!(dice.as_scalar().unwrap().tag.as_deref(), Some("!dice"));
    assert_eq!(dice.as_str(), Some("8d4"));
    assert_eq!(
        yaml.dump_str(&value).unwrap(),
        "initial hit points: !dice 8d4\n"
    );
}

#[test]
fn implicit_resolver_infers_custom_tag() {
    let mut yaml = Yaml::new();
    yaml.add_implicit_resolver(
        "!dice",
        Regex::new(r"^\d+d\d+$").unwrap(),
        Some("0123456789"),
    );
    yaml.add_constructor("!dice", |c, node| {
        let text = c.scalar_text(node)?;
        Ok(Value::Scalar(Scalar::str(text.clone()).with_tag("!dice").with_src(text)))
    });
    let value = yaml.load_str("damage: 5d10\n").unwrap();
    let damage = value.get_str("damage").unwrap();
    assert_eq!(damage.as_scalar().unwrap().tag.as_deref(), Some("!dice"));
    // the tag is implicit again on output, so no tag is written
    assert_eq!(yaml.dump_str(&value).unwrap(), "damage: 5d10\n");
}

#[test]
fn multi_constructor_receives_suffix() {
    let mut yaml = Yaml::new();
    yaml.add_multi_constructor("!obj:", |c, suffix, node| {
        let mapping = c.construct_mapping(node)?;
        let mut scalar = Scalar::str(suffix).with_tag(format!("!obj:{}", suffix));
        if let Some(map) = mapping.as_map() {
            let n = map.borrow().own_len();
            scalar.value = ScalarValue::Str(format!("{}#{}", suffix, n));
        }
        Ok(Value::Scalar(scalar))
    });
    let value = yaml.load_str("!obj:x.2\na: 1\n").unwrap();
    assert_eq!(value.as_str(), Some("x.2#1"));
}

#[test]
fn registered_representer_overrides_rendering() {
    let mut yaml = Yaml::with_config(YamlConfig::default().with_version(Some((1, 1))));
    yaml.add_representer("bool", |r, value| {
        let text = if value.as_bool().unwrap_or(false) { "yes" } else { "no" };
        Ok(r.represent_scalar_text(
            "tag:yaml.org,2002:bool",
            text.to_string(),
            ScalarStyle::Plain,
        ))
    });
    let value = yaml.load_str("a: true\nb: false\n").unwrap();
    assert_eq!(yaml.dump_str(&value).unwrap(), "a: yes\nb: no\n");
}

#[test]
fn multi_representer_matches_tag_prefix() {
    let mut yaml = Yaml::new();
    yaml.add_multi_representer("!unit/", |r, value| {
        let scalar = value.as_scalar().expect("unit values are scalars");
        let text = scalar.src.clone().unwrap_or_default();
        Ok(r.represent_scalar_text(
            scalar.tag.as_deref().unwrap_or("!unit/"),
            text,
            ScalarStyle::Plain,
        ))
    });
    let value = yaml.load_str("w: !unit/kg 70\nh: !unit/m 1.8\n").unwrap();
    assert_eq!(yaml.dump_str(&value).unwrap(), "w: !unit/kg 70\nh: !unit/m 1.8\n");
}
