//! Recruiter listings often name the real employer only in the description
//! ("bei Acme GmbH", "Acme sucht", "working at Acme"). The career-page search
//! works much better with that name than with the agency's.

use lazy_static::lazy_static;
use regex::Regex;

const NAME: &str = r"[A-ZÄÖÜ][\p{L}\d&.\-]+(?:\s+[A-ZÄÖÜ][\p{L}\d&.\-]*){0,3}";

const LEGAL_FORMS: &[&str] = &["gmbh", "ag", "inc", "inc.", "ltd", "ltd.", "se", "kg", "mbh", "co.", "kgaa"];

/// Capitalised words that follow the trigger phrases without being a name.
const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "our", "us", "you", "we", "your", "die", "der", "das", "den", "dem", "des",
    "ein", "eine", "einen", "einem", "wir", "uns", "unser", "unsere", "unseren", "unserem", "sie",
    "ihnen", "ihre", "ihr", "du", "dich", "dir", "dein", "deine", "euch", "fragen", "interesse",
    "bewerbung", "mehr", "werkstudent", "werkstudenten", "werkstudentin", "working", "student",
    "students", "jobs", "job", "karriere", "career", "careers", "team", "teams", "als", "and", "und",
];

lazy_static! {
    static ref PATTERNS: Vec<Regex> = vec![
        Regex::new(&format!(r"\b(?i:bei|für|at|von|for|welcome to)\s+({NAME})")).unwrap(),
        Regex::new(&format!(r"({NAME})\s+(?i:sucht|is hiring|seeks|employs)\b")).unwrap(),
    ];
}

/// First employer named in `description` that is not `listed_company`.
pub fn extract(description: &str, listed_company: &str) -> Option<String> {
    let text = description.split_whitespace().collect::<Vec<_>>().join(" ");
    let listed = strip_legal_forms(listed_company);

    PATTERNS
        .iter()
        .flat_map(|pattern| pattern.captures_iter(&text))
        .filter_map(|caps| caps.get(1).and_then(|m| clean_name(m.as_str())))
        .find(|name| {
            let candidate = strip_legal_forms(name);
            !candidate.contains(&listed) && !listed.contains(&candidate)
        })
}

/// Drops leading stop words and cuts the name at the first stop word after it.
fn clean_name(raw: &str) -> Option<String> {
    let words: Vec<&str> = raw
        .split_whitespace()
        .map(|w| w.trim_end_matches([',', '.', ':', ';']))
        .skip_while(|w| is_stop_word(w))
        .take_while(|w| !is_stop_word(w))
        .collect();
    let name = words.join(" ");
    (name.chars().count() > 2).then_some(name)
}

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word.to_lowercase().as_str())
}

fn strip_legal_forms(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .filter(|w| !LEGAL_FORMS.contains(&w.as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finds_employer_after_preposition() {
        let description = "Für unseren Kunden, die Nordlicht Energie GmbH, suchen wir... \
                           Deine Aufgaben bei Nordlicht Energie GmbH umfassen Datenanalyse.";
        assert_eq!(
            extract(description, "Hays AG").as_deref(),
            Some("Nordlicht Energie GmbH")
        );
    }

    #[test]
    fn test_finds_employer_before_verb() {
        let description = "Die Rheinwerk Logistik sucht ab sofort Verstärkung.";
        assert_eq!(
            extract(description, "Randstad").as_deref(),
            Some("Rheinwerk Logistik")
        );
    }

    #[test]
    fn test_ignores_the_listed_company() {
        let description = "Working at Acme means flexible hours. Bewirb dich bei Acme GmbH!";
        assert_eq!(extract(description, "ACME GmbH"), None);
    }

    #[test]
    fn test_ignores_pronouns_and_filler() {
        let description = "Bei Fragen melde dich gerne. Wir freuen uns auf Ihre Bewerbung für Uns.";
        assert_eq!(extract(description, "Acme"), None);
    }

    #[test]
    fn test_empty_description() {
        assert_eq!(extract("", "Acme"), None);
    }
}
