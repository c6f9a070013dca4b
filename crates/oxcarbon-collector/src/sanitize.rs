use oxcarbon_common::config::ReplaceRule;

/// Placeholder in raw sample paths that is replaced by the plugin's host label.
pub const HOST_PLACEHOLDER: &str = "{host}";

/// Turns a raw plugin-local path into a wire-safe metric path.
///
/// `{host}` is replaced by `node_host_name`, then each rule is applied in
/// order. Finally `/` and `\` become segment separators, any character
/// outside `[A-Za-z0-9_:-]` becomes `_`, and empty segments are dropped.
///
/// # Examples
///
/// ```
/// use oxcarbon_collector::sanitize::sanitize;
///
/// assert_eq!(sanitize("{host}.disk free/C:", "web01", &[]), "web01.disk_free.C:");
/// ```
pub fn sanitize(raw: &str, node_host_name: &str, rules: &[ReplaceRule]) -> String {
    let mut path = raw.replace(HOST_PLACEHOLDER, node_host_name);
    for rule in rules {
        path = rule
            .find
            .replace_all(&path, rule.replace_with.as_str())
            .into_owned();
    }

    path.split(['.', '/', '\\'])
        .filter(|segment| !segment.is_empty())
        .map(clean_segment)
        .collect::<Vec<_>>()
        .join(".")
}

fn clean_segment(segment: &str) -> String {
    segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ':') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    fn rule(find: &str, replace_with: &str) -> ReplaceRule {
        ReplaceRule {
            find: Regex::new(find).unwrap(),
            replace_with: replace_with.to_string(),
        }
    }

    #[test]
    fn plain_path_is_unchanged() {
        assert_eq!(sanitize("cpu.pct", "host1", &[]), "cpu.pct");
    }

    #[test]
    fn host_placeholder_is_substituted() {
        assert_eq!(sanitize("{host}.memory.used", "web01", &[]), "web01.memory.used");
    }

    #[test]
    fn rules_apply_in_order() {
        let rules = [rule("processor", "cpu"), rule("cpu", "core")];
        assert_eq!(sanitize("processor.time", "h", &rules), "core.time");

        let reversed = [rule("cpu", "core"), rule("processor", "cpu")];
        assert_eq!(sanitize("processor.time", "h", &reversed), "cpu.time");
    }

    #[test]
    fn rules_support_group_references() {
        let rules = [rule(r"\((\w+)\)", "$1")];
        assert_eq!(sanitize("processor(_total).time", "h", &rules), "processor_total.time");
    }

    #[test]
    fn unsafe_characters_and_separators() {
        assert_eq!(
            sanitize(r"\\SRV\processor time/% idle", "h", &[]),
            "SRV.processor_time.__idle"
        );
        assert_eq!(sanitize("a..b.", "h", &[]), "a.b");
        assert_eq!(sanitize("...", "h", &[]), "");
    }
}
