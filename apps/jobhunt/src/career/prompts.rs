/// Ask the model to pick the official application page among pre-ranked search hits.
///
/// Placeholders: `{company}`, `{title}`, `{candidates}` (numbered list of
/// url, page title and snippet).
pub const RANK_CANDIDATES_PROMPT_TEMPLATE: &str = r#"A candidate wants to apply for the position "{title}" at the company "{company}" in Germany.

Below are web search results. Pick the ONE url that is most likely the company's own
career page or applicant-tracking-system page for this position (or, failing that, the
company's general job listing page). Job boards and aggregators are NOT acceptable.

Search results:
{candidates}

Return a JSON object with exactly these fields:
{
  "url": the chosen url copied exactly from the list above, or null if none fits,
  "confidence": a number between 0.0 and 1.0
}

Rules:
- Only choose a url that appears in the list above
- Prefer pages on the company's own domain or a known ATS (Personio, Workday, Greenhouse, Lever, SmartRecruiters, Softgarden, JOIN)
- Use a confidence below 0.5 if the company name does not clearly match the page
- Return null when no result belongs to the hiring company"#;
