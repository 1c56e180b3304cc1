use super::filter::FilterRule;

/// Tokens that carry no role meaning in German job titles.
const NOISE_TOKENS: &[&str] = &[
    "m", "w", "d", "f", "x", "gn", "in", "/", "working", "student", "werkstudent", "werkstudentin",
];

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

/// Words of `role` that a matching title must contain: everything except
/// include terms and gender or status markers.
pub fn significant_terms(role: &str, rule: &FilterRule) -> Vec<String> {
    let include_words: Vec<String> = rule.include_terms().flat_map(tokens).collect();
    let mut terms: Vec<String> = Vec::new();
    for token in tokens(role) {
        if NOISE_TOKENS.contains(&token.as_str())
            || include_words.contains(&token)
            || terms.contains(&token)
        {
            continue;
        }
        terms.push(token);
    }
    terms
}

/// Strict match of a found title against the role it was searched under.
/// A role with no significant terms matches any title.
pub fn title_matches_role(title: &str, terms: &[String]) -> bool {
    let title = title.to_lowercase();
    terms.iter().all(|term| title.contains(term.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_significant_terms_drop_markers() {
        let rule = FilterRule::default();
        assert_eq!(
            significant_terms("Werkstudent Data Analyst (m/w/d)", &rule),
            vec!["data", "analyst"]
        );
        assert!(significant_terms("Working Student", &rule).is_empty());
    }

    #[test]
    fn test_title_must_contain_every_term() {
        let rule = FilterRule::default();
        let terms = significant_terms("Werkstudent Data Analyst", &rule);
        assert!(title_matches_role("Werkstudent (m/w/d) Data-Analyst Marketing", &terms));
        assert!(!title_matches_role("Werkstudent Data Engineer", &terms));
        assert!(title_matches_role("anything", &[]));
    }
}
