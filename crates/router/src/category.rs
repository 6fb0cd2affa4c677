use orchestrator_core::Task;

/// Keyword table used when a task has no explicit `type`. Mirrors the
/// lowercase-substring keyword scan the planning layer used for task
/// classification, generalized to the router's small fixed category set
/// rather than the open-ended component extraction it was built for.
const KEYWORD_CATEGORIES: &[(&str, &[&str])] = &[
    ("architecture", &["architecture", "design", "schema", "system design"]),
    ("testing", &["test", "testing", "unit test", "regression", "qa"]),
    ("analysis", &["analyze", "analysis", "investigate", "review"]),
    ("implementation", &["implement", "build", "develop", "create", "write code"]),
    ("deployment", &["deploy", "release", "rollout", "provision"]),
    ("documentation", &["document", "docs", "readme", "changelog"]),
];

/// Derives the routing category: the explicit `task.type` when set,
/// otherwise the first keyword-table category whose keyword appears in
/// the prompt, falling back to `"general"`.
pub fn derive_category(task: &Task) -> String {
    if let Some(category) = task.category() {
        return category.to_string();
    }
    let prompt_lower = task.prompt.to_lowercase();
    for (category, keywords) in KEYWORD_CATEGORIES {
        if keywords.iter().any(|kw| prompt_lower.contains(kw)) {
            return category.to_string();
        }
    }
    "general".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_core::Priority;

    #[test]
    fn explicit_type_wins_over_keywords() {
        let task = Task::new(None, Some("custom".into()), "design the schema".into(), Priority::Normal, 3).unwrap();
        assert_eq!(derive_category(&task), "custom");
    }

    #[test]
    fn keyword_scan_finds_architecture() {
        let task = Task::new(None, None, "Design a new system architecture for X".into(), Priority::Normal, 3).unwrap();
        assert_eq!(derive_category(&task), "architecture");
    }

    #[test]
    fn unmatched_prompt_falls_back_to_general() {
        let task = Task::new(None, None, "do the thing".into(), Priority::Normal, 3).unwrap();
        assert_eq!(derive_category(&task), "general");
    }
}
