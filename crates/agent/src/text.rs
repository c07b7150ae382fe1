//! String helpers for streamed tool arguments and plan file names.

use crate::partial_json::ArraySummary;
use regex::Regex;
use std::sync::LazyLock;

const MAX_SLUG_LEN: usize = 50;
const FALLBACK_SLUG: &str = "test-plan";

static DESCRIPTIVE_PLAN_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"-(unit|integration|e2e|mixed)-\d+-suites?\.md$").expect("valid plan file regex")
});

/// Reverse JSON string escaping for `\n`, `\t`, `\"` and `\\`.
///
/// Escaped backslashes are parked on a placeholder first so that `\\n`
/// becomes a backslash followed by `n`, not a newline.
pub fn unescape_json_string(raw: &str) -> String {
    const PLACEHOLDER: char = '\u{0}';
    raw.replace("\\\\", &PLACEHOLDER.to_string())
        .replace("\\n", "\n")
        .replace("\\t", "\t")
        .replace("\\\"", "\"")
        .replace(PLACEHOLDER, "\\")
}

/// Derive a filesystem-safe slug from a plan name.
///
/// Lowercase ASCII alphanumerics separated by single hyphens, at most 50
/// characters. Idempotent.
pub fn sanitize_plan_name(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    slug.truncate(MAX_SLUG_LEN);
    slug.trim_end_matches('-').to_string()
}

fn slug_or_fallback(slug: &str) -> &str {
    if slug.is_empty() { FALLBACK_SLUG } else { slug }
}

/// `{dir}/{slug}.md`
pub fn placeholder_plan_path(dir: &str, slug: &str) -> String {
    format!("{}/{}.md", dir.trim_end_matches('/'), slug_or_fallback(slug))
}

/// `{dir}/{slug}-{type}-{count}-{suite|suites}.md`
pub fn descriptive_plan_path(dir: &str, slug: &str, summary: &ArraySummary) -> String {
    let noun = if summary.count == 1 { "suite" } else { "suites" };
    format!(
        "{}/{}-{}-{}-{}.md",
        dir.trim_end_matches('/'),
        slug_or_fallback(slug),
        summary.dominant_category,
        summary.count,
        noun
    )
}

pub fn is_descriptive_plan_path(path: &str) -> bool {
    DESCRIPTIVE_PLAN_FILE.is_match(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unescape_roundtrips_json_escaping() {
        let original = "line one\n\tsays \"hi\" to C:\\path\\n";
        let encoded = serde_json::to_string(original).unwrap();
        let raw = &encoded[1..encoded.len() - 1];
        assert_eq!(unescape_json_string(raw), original);
    }

    #[test]
    fn escaped_backslash_before_n_is_not_newline() {
        assert_eq!(unescape_json_string(r"a\\nb"), "a\\nb");
    }

    #[test]
    fn sanitize_basic() {
        assert_eq!(sanitize_plan_name("Auth Service: Login & Logout!"), "auth-service-login-logout");
        assert_eq!(sanitize_plan_name("  --Hello__World--  "), "hello-world");
        assert_eq!(sanitize_plan_name("!!!"), "");
    }

    #[test]
    fn sanitize_truncates_without_trailing_hyphen() {
        let name = format!("{} tail", "a".repeat(49));
        let slug = sanitize_plan_name(&name);
        assert_eq!(slug, "a".repeat(49));
        assert!(slug.len() <= 50);
    }

    #[test]
    fn sanitize_is_idempotent_and_well_formed() {
        let shape = Regex::new(r"^[a-z0-9]*(-[a-z0-9]+)*$").unwrap();
        let inputs = vec![
            "Test Plan for UserService".to_string(),
            "ÉCOLE — élève".to_string(),
            "x-".repeat(40),
            "a".repeat(80),
            String::new(),
        ];
        for input in inputs {
            let once = sanitize_plan_name(&input);
            assert_eq!(sanitize_plan_name(&once), once, "not idempotent for {input:?}");
            assert!(once.len() <= 50);
            assert!(shape.is_match(&once), "bad slug {once:?}");
        }
    }

    #[test]
    fn plan_paths() {
        let summary = ArraySummary {
            count: 1,
            dominant_category: "unit".into(),
        };
        assert_eq!(placeholder_plan_path(".clive/plans", "auth"), ".clive/plans/auth.md");
        let descriptive = descriptive_plan_path(".clive/plans/", "auth", &summary);
        assert_eq!(descriptive, ".clive/plans/auth-unit-1-suite.md");
        assert!(is_descriptive_plan_path(&descriptive));
        assert!(!is_descriptive_plan_path(".clive/plans/auth.md"));

        let many = ArraySummary {
            count: 3,
            dominant_category: "mixed".into(),
        };
        assert_eq!(
            descriptive_plan_path(".clive/plans", "auth", &many),
            ".clive/plans/auth-mixed-3-suites.md"
        );
    }

    #[test]
    fn empty_slug_falls_back() {
        assert_eq!(placeholder_plan_path(".clive/plans", ""), ".clive/plans/test-plan.md");
    }
}
