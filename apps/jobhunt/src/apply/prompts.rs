/// Placeholder text for a document upload the candidate has no file for.
///
/// Placeholders: `{document}` (German document name), `{company}`, `{title}`,
/// `{field}` (label of the upload field).
pub const PLACEHOLDER_DOCUMENT_PROMPT_TEMPLATE: &str = r#"Write short placeholder text in German for the document "{document}".
It will be uploaded as a PDF to the application form field "{field}" for the position
"{title}" at {company}, because the applicant does not have this document ready.

Start with the line "[Platzhalter {document}]", then write 2-3 polite sentences stating that
the actual document will be submitted on request. End with "Mit freundlichen Grüßen".
Do not invent qualifications, dates or names."#;
