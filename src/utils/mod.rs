use strsim::jaro_winkler;

/// Truncate to at most `limit` characters, never splitting a code point.
/// An ellipsis is appended when anything was cut.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", text[..cut].trim_end()),
        None => text.to_string(),
    }
}

/// Lowercase ASCII slug: alphanumerics kept, every other run collapsed to a
/// single hyphen.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for c in text.chars() {
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

    slug
}

/// Academic season label, e.g. 2024 -> "2023-24".
pub fn season_label(year: i32) -> String {
    format!("{}-{:02}", year - 1, year.rem_euclid(100))
}

/// Format a metric value for display
pub fn format_metric(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1}", v),
        None => "-".to_string(),
    }
}

/// Closest names to `query`, best first.
pub fn suggest_names<'a>(query: &str, names: impl IntoIterator<Item = &'a str>, limit: usize) -> Vec<&'a str> {
    let query = query.trim().to_lowercase();
    let mut scored: Vec<(f64, &str)> = names
        .into_iter()
        .map(|name| (jaro_winkler(&query, &name.to_lowercase()), name))
        .filter(|(score, _)| *score >= 0.7)
        .collect();

    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));
    scored.dedup_by(|a, b| a.1 == b.1);
    scored.into_iter().take(limit).map(|(_, name)| name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("abcdef", 3), "abc...");
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo...");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Seeds & \"Upsets\""), "seeds-upsets");
        assert_eq!(slugify("  March Madness 2024!  "), "march-madness-2024");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn test_season_label() {
        assert_eq!(season_label(2024), "2023-24");
        assert_eq!(season_label(2000), "1999-00");
    }

    #[test]
    fn test_suggest_names() {
        let names = ["Houston", "Duke", "Purdue", "Houston Christian"];
        let suggestions = suggest_names("Houstn", names, 2);
        assert_eq!(suggestions[0], "Houston");
        assert!(suggest_names("zzzz", names, 3).is_empty());
    }
}
