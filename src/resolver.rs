use regex::Regex;

// ===============================================================================
// CORE TAGS
// ===============================================================================

pub const TAG_NULL: &str = "tag:yaml.org,2002:null";
pub const TAG_BOOL: &str = "tag:yaml.org,2002:bool";
pub const TAG_INT: &str = "tag:yaml.org,2002:int";
pub const TAG_FLOAT: &str = "tag:yaml.org,2002:float";
pub const TAG_STR: &str = "tag:yaml.org,2002:str";
pub const TAG_BINARY: &str = "tag:yaml.org,2002:binary";
pub const TAG_TIMESTAMP: &str = "tag:yaml.org,2002:timestamp";
pub const TAG_MERGE: &str = "tag:yaml.org,2002:merge";
pub const TAG_VALUE: &str = "tag:yaml.org,2002:value";
pub const TAG_SEQ: &str = "tag:yaml.org,2002:seq";
pub const TAG_MAP: &str = "tag:yaml.org,2002:map";
pub const TAG_SET: &str = "tag:yaml.org,2002:set";
pub const TAG_OMAP: &str = "tag:yaml.org,2002:omap";
pub const TAG_PAIRS: &str = "tag:yaml.org,2002:pairs";

/// One implicit-resolution rule: a tag, its pattern, and the characters a
/// matching scalar may start with (fast path before the regex runs)
#[derive(Debug, Clone)]
struct ResolverRule {
    tag: String,
    regex: Regex,
    first: Option<Vec<char>>,
}

impl ResolverRule {
    fn matches(&self, value: &str) -> bool {
        if let Some(first) = &self.first {
            match value.chars().next() {
                Some(ch) => {
                    if !first.contains(&ch) {
                        return false;
                    }
                }
                None => {
                    // only rules without a first-character set, or with an
                    // explicit empty marker, see the empty scalar
                    if !first.contains(&'\0') {
                        return false;
                    }
                }
            }
        }
        self.regex.is_match(value)
    }
}

/// Implicit tag resolution for plain scalars. Two built-in tables (YAML 1.1
/// and 1.2 core), selected per document by the active version; caller-added
/// rules apply to both and are consulted first.
#[derive(Debug, Clone)]
pub struct Resolver {
    rules_1_1: Vec<ResolverRule>,
    rules_1_2: Vec<ResolverRule>,
    custom: Vec<ResolverRule>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            rules_1_1: rules_1_1(),
            rules_1_2: rules_1_2(),
            custom: Vec::new(),
        }
    }

    /// Register an additional implicit resolver, consulted before the
    /// built-in table.
    pub fn add_implicit_resolver(&mut self, tag: &str, regex: Regex, first_chars: Option<&str>) {
        self.custom.push(ResolverRule {
            tag: tag.to_string(),
            regex,
            first: first_chars.map(|s| s.chars().collect()),
        });
    }

    /// Tag for a plain scalar under the given version (None = 1.2 behavior)
    pub fn resolve_scalar(&self, value: &str, version: Option<(u32, u32)>) -> String {
        for rule in &self.custom {
            if rule.matches(value) {
                return rule.tag.clone();
            }
        }
        let table = if is_1_1(version) { &self.rules_1_1 } else { &self.rules_1_2 };
        for rule in table {
            if rule.matches(value) {
                return rule.tag.clone();
            }
        }
        TAG_STR.to_string()
    }
}

fn is_1_1(version: Option<(u32, u32)>) -> bool {
    matches!(version, Some((1, minor)) if minor < 2)
}

fn rule(tag: &str, pattern: &str, first: Option<&str>) -> ResolverRule {
    ResolverRule {
        tag: tag.to_string(),
        regex: Regex::new(pattern).expect("builtin resolver pattern"),
        first: first.map(|s| s.chars().collect()),
    }
}

/// YAML 1.1 table: the extended bool set, leading-zero octals, sexagesimals
fn rules_1_1() -> Vec<ResolverRule> {
    vec![
        rule(
            TAG_BOOL,
            r"^(?:yes|Yes|YES|no|No|NO|true|True|TRUE|false|False|FALSE|on|On|ON|off|Off|OFF|y|Y|n|N)$",
            Some("yYnNtTfFoO"),
        ),
        rule(
            TAG_INT,
            r"^(?:[-+]?0b[0-1_]+|[-+]?0[0-7_]+|[-+]?(?:0|[1-9][0-9_]*)|[-+]?0x[0-9a-fA-F_]+|[-+]?[1-9][0-9_]*(?::[0-5]?[0-9])+)$",
            Some("-+0123456789"),
        ),
        rule(
            TAG_FLOAT,
            r"^(?:[-+]?(?:[0-9][0-9_]*\.[0-9_]*|\.[0-9][0-9_]*)(?:[eE][-+]?[0-9]+)?|[-+]?[0-9][0-9_]*[eE][-+]?[0-9]+|[-+]?[0-9][0-9_]*(?::[0-5]?[0-9])+\.[0-9_]*|[-+]?\.(?:inf|Inf|INF)|\.(?:nan|NaN|NAN))$",
            Some("-+0123456789."),
        ),
        rule(TAG_NULL, r"^(?:~|null|Null|NULL|)$", Some("~nN\0")),
        rule(TAG_MERGE, r"^(?:<<)$", Some("<")),
        rule(TAG_VALUE, r"^(?:=)$", Some("=")),
        rule(
            TAG_TIMESTAMP,
            timestamp_pattern(),
            Some("0123456789"),
        ),
    ]
}

/// YAML 1.2 core table: true/false only, 0o octals, no sexagesimals
fn rules_1_2() -> Vec<ResolverRule> {
    vec![
        rule(
            TAG_BOOL,
            r"^(?:true|True|TRUE|false|False|FALSE)$",
            Some("tTfF"),
        ),
        rule(
            TAG_INT,
            r"^(?:[-+]?0b[0-1_]+|[-+]?0o?[0-7_]+|[-+]?(?:0|[1-9][0-9_]*)|[-+]?0x[0-9a-fA-F_]+)$",
            Some("-+0123456789"),
        ),
        rule(
            TAG_FLOAT,
            r"^(?:[-+]?(?:[0-9][0-9_]*\.[0-9_]*|\.[0-9][0-9_]*)(?:[eE][-+]?[0-9]+)?|[-+]?[0-9][0-9_]*[eE][-+]?[0-9]+|[-+]?\.(?:inf|Inf|INF)|\.(?:nan|NaN|NAN))$",
            Some("-+0123456789."),
        ),
        rule(TAG_NULL, r"^(?:~|null|Null|NULL|)$", Some("~nN\0")),
        rule(TAG_MERGE, r"^(?:<<)$", Some("<")),
        rule(TAG_VALUE, r"^(?:=)$", Some("=")),
        rule(
            TAG_TIMESTAMP,
            timestamp_pattern(),
            Some("0123456789"),
        ),
    ]
}

fn timestamp_pattern() -> &'static str {
    r"^(?:[0-9][0-9][0-9][0-9]-[0-9][0-9]-[0-9][0-9]|[0-9][0-9][0-9][0-9]-[0-9][0-9]?-[0-9][0-9]?(?:[Tt]|[ \t]+)[0-9][0-9]?:[0-9][0-9]:[0-9][0-9](?:\.[0-9]*)?(?:[ \t]*(?:Z|[-+][0-9][0-9]?(?::[0-9][0-9])?))?)$"
}

#[cfg(test)]
mod tests {
    use super::*;

    const V11: Option<(u32, u32)> = Some((1, 1));
    const V12: Option<(u32, u32)> = None;

    #[test]
    fn version_switching_bools_and_octals() {
        let resolver = Resolver::new();
        assert_eq!(resolver.resolve_scalar("on", V11), TAG_BOOL);
        assert_eq!(resolver.resolve_scalar("on", V12), TAG_STR);
        assert_eq!(resolver.resolve_scalar("yes", V11), TAG_BOOL);
        assert_eq!(resolver.resolve_scalar("yes", V12), TAG_STR);
        assert_eq!(resolver.resolve_scalar("true", V11), TAG_BOOL);
        assert_eq!(resolver.resolve_scalar("true", V12), TAG_BOOL);
        assert_eq!(resolver.resolve_scalar("012", V11), TAG_INT);
        assert_eq!(resolver.resolve_scalar("012", V12), TAG_INT);
        assert_eq!(resolver.resolve_scalar("0o12", V11), TAG_STR);
        assert_eq!(resolver.resolve_scalar("0o12", V12), TAG_INT);
        assert_eq!(resolver.resolve_scalar("012345678", V11), TAG_STR);
        assert_eq!(resolver.resolve_scalar("012345678", V12), TAG_STR);
    }

    #[test]
    fn sexagesimal_only_in_1_1() {
        let resolver = Resolver::new();
        assert_eq!(resolver.resolve_scalar("12:34:56", V11), TAG_INT);
        assert_eq!(resolver.resolve_scalar("12:34:56", V12), TAG_STR);
        assert_eq!(resolver.resolve_scalar("12:34:56.78", V11), TAG_FLOAT);
        assert_eq!(resolver.resolve_scalar("12:34:56.78", V12), TAG_STR);
    }

    #[test]
    fn null_and_empty() {
        let resolver = Resolver::new();
        assert_eq!(resolver.resolve_scalar("", V12), TAG_NULL);
        assert_eq!(resolver.resolve_scalar("~", V12), TAG_NULL);
        assert_eq!(resolver.resolve_scalar("null", V12), TAG_NULL);
    }

    #[test]
    fn floats_and_specials() {
        let resolver = Resolver::new();
        assert_eq!(resolver.resolve_scalar("3.14", V12), TAG_FLOAT);
        assert_eq!(resolver.resolve_scalar("-.inf", V12), TAG_FLOAT);
        assert_eq!(resolver.resolve_scalar(".nan", V12), TAG_FLOAT);
        assert_eq!(resolver.resolve_scalar("1e3", V12), TAG_FLOAT);
    }

    #[test]
    fn merge_indicator() {
        let resolver = Resolver::new();
        assert_eq!(resolver.resolve_scalar("<<", V11), TAG_MERGE);
        assert_eq!(resolver.resolve_scalar("<<", V12), TAG_MERGE);
    }

    #[test]
    fn timestamps() {
        let resolver = Resolver::new();
        assert_eq!(resolver.resolve_scalar("2002-12-14", V12), TAG_TIMESTAMP);
        assert_eq!(
            resolver.resolve_scalar("2001-12-15T02:59:43.1Z", V12),
            TAG_TIMESTAMP
        );
        assert_eq!(resolver.resolve_scalar("2001-12-14 21:59:43.10 -5", V12), TAG_TIMESTAMP);
    }

    #[test]
    fn custom_resolver_takes_precedence() {
        let mut resolver = Resolver::new();
        resolver.add_implicit_resolver("!dice", Regex::new(r"^\d+d\d+$").unwrap(), None);
        assert_eq!(resolver.resolve_scalar("8d4", V12), "!dice");
        assert_eq!(resolver.resolve_scalar("8", V12), TAG_INT);
    }
}
