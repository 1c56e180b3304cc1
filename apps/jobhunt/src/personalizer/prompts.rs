/// Ask for role types that suit the CV.
///
/// Placeholders: `{count}`, `{resume}`.
pub const SUGGEST_TITLES_PROMPT_TEMPLATE: &str = r#"Analyze the resume below for a candidate seeking Werkstudent (working student) positions in Germany, primarily in the Köln/Düsseldorf/Bonn region.

Based on the skills (especially programming languages, frameworks and tools), projects and experience, suggest {count} specific types of Werkstudent roles this candidate is well suited for.

Examples of role types:
- Werkstudent Softwareentwicklung Python
- Werkstudent Webentwicklung Frontend
- Werkstudent Data Analysis
- Werkstudent IT-Support
- Werkstudent DevOps
- Werkstudent Machine Learning

Tailor the suggestions to the skills found in the resume.

Return ONLY a comma-separated list of role types, each starting with "Werkstudent".
Example: Werkstudent Softwareentwicklung Python, Werkstudent Data Analysis, Werkstudent Webentwicklung Frontend

--- START RESUME ---
{resume}
--- END RESUME ---"#;
