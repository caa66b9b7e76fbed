//! Template Renderer - Handles personalization of email content

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Variables available to a template
pub type TemplateVars = HashMap<String, String>;

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // {{ key }} must be tried before {key} so the double form is consumed whole
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}|\{([A-Za-z0-9_.\-]+)\}|\[([A-Za-z0-9_.\-]+)\]")
            .expect("placeholder pattern is valid")
    })
}

/// Template renderer for personalizing email content
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateRenderer;

impl TemplateRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Replace `{{key}}`, `{key}` and `[key]` placeholders with values from
    /// `vars`. Placeholders without a value are left as written.
    pub fn render(&self, content: &str, vars: &TemplateVars) -> String {
        placeholder_regex()
            .replace_all(content, |caps: &Captures| {
                let key = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .or_else(|| caps.get(3))
                    .map(|m| m.as_str())
                    .unwrap_or_default();

                match vars.get(key) {
                    Some(value) => value.clone(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// Subject source of a scheduled email and the variables parsed from
    /// its custom subject.
    ///
    /// A custom subject containing `:` is read as `key:value` pairs for the
    /// template subject; any other custom subject replaces it outright. The
    /// returned subject is still unrendered: callers render it exactly once,
    /// with the pairs merged into their own variables.
    pub fn resolve_subject(
        &self,
        template_subject: &str,
        custom_subject: Option<&str>,
    ) -> (String, TemplateVars) {
        match custom_subject {
            None => (template_subject.to_string(), TemplateVars::new()),
            Some(custom) if custom.contains(':') => {
                (template_subject.to_string(), parse_subject_pairs(custom))
            }
            Some(custom) => (custom.to_string(), TemplateVars::new()),
        }
    }
}

/// Parse `key:value, key2:value2`. Splits on the first colon of each pair,
/// trims both sides and drops pairs with no colon or a key that no
/// placeholder could name (empty, or containing spaces or brackets).
pub fn parse_subject_pairs(input: &str) -> TemplateVars {
    input
        .split(',')
        .filter_map(|pair| pair.split_once(':'))
        .map(|(k, v)| (k.trim(), v.trim()))
        .filter(|(k, _)| is_placeholder_key(k))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Keys accepted inside `[..]`, `{..}` and `{{..}}`
fn is_placeholder_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vars(pairs: &[(&str, &str)]) -> TemplateVars {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_square_brackets() {
        let renderer = TemplateRenderer::new();
        assert_eq!(
            renderer.render("Hello [name]", &vars(&[("name", "Ana")])),
            "Hello Ana"
        );
        assert_eq!(renderer.render("Hello [name]", &TemplateVars::new()), "Hello [name]");
    }

    #[test]
    fn test_render_all_styles_together() {
        let renderer = TemplateRenderer::new();
        let result = renderer.render(
            "{{ first_name }} / {last_name} / [email] / {{missing}}",
            &vars(&[
                ("first_name", "Ana"),
                ("last_name", "Silva"),
                ("email", "ana@example.com"),
            ]),
        );
        assert_eq!(result, "Ana / Silva / ana@example.com / {{missing}}");
    }

    #[test]
    fn test_render_values_are_not_rescanned() {
        let renderer = TemplateRenderer::new();
        let result = renderer.render("[a]", &vars(&[("a", "[b]"), ("b", "x")]));
        assert_eq!(result, "[b]");
    }

    #[test]
    fn test_resolve_subject_without_custom() {
        let renderer = TemplateRenderer::new();
        let (subject, pairs) = renderer.resolve_subject("Welcome [name]", None);
        assert_eq!(subject, "Welcome [name]");
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_resolve_subject_with_pairs() {
        let renderer = TemplateRenderer::new();
        let (subject, pairs) =
            renderer.resolve_subject("Course {course} due {due}", Some("course: Safety 101, due:Friday"));
        assert_eq!(subject, "Course {course} due {due}");
        assert_eq!(pairs.get("course").map(String::as_str), Some("Safety 101"));
        assert_eq!(renderer.render(&subject, &pairs), "Course Safety 101 due Friday");
    }

    #[test]
    fn test_resolve_subject_pair_values_render_once() {
        let renderer = TemplateRenderer::new();
        let (subject, mut merged) = renderer.resolve_subject("Note: {topic}", Some("topic: [name]"));
        merged.insert("name".to_string(), "Ana".to_string());
        assert_eq!(renderer.render(&subject, &merged), "Note: [name]");
    }

    #[test]
    fn test_resolve_subject_literal() {
        let renderer = TemplateRenderer::new();
        let (subject, _) = renderer.resolve_subject("Template", Some("Quarterly reminder"));
        assert_eq!(subject, "Quarterly reminder");
    }

    #[test]
    fn test_parse_subject_pairs_edge_cases() {
        let pairs = parse_subject_pairs("url:https://x.test/a, nocolon, :empty, k : v ");
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs.get("url").map(String::as_str), Some("https://x.test/a"));
        assert_eq!(pairs.get("k").map(String::as_str), Some("v"));
    }

    #[test]
    fn test_parse_subject_pairs_skips_unusable_keys() {
        let pairs = parse_subject_pairs("course name: Safety, {x}: y, course_name: Safety 101");
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs.get("course_name").map(String::as_str), Some("Safety 101"));
    }
}
