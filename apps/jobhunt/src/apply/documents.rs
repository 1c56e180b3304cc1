use std::path::{Path, PathBuf};

use async_trait::async_trait;
use encoding_rs::WINDOWS_1252;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use tracing::info;
use uuid::Uuid;

use super::prompts::PLACEHOLDER_DOCUMENT_PROMPT_TEMPLATE;
use crate::errors::CollaboratorError;
use crate::llm_client::{prompts::PLAIN_TEXT_SYSTEM, LlmClient, DOCUMENT_TOKENS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Resume,
    CoverLetter,
    Other,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Resume => "resume",
            DocumentKind::CoverLetter => "cover_letter",
            DocumentKind::Other => "other_document",
        }
    }

    fn german_name(&self) -> &'static str {
        match self {
            DocumentKind::Resume => "Lebenslauf",
            DocumentKind::CoverLetter => "Anschreiben",
            DocumentKind::Other => "Unterlage",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlaceholderContext {
    pub company: String,
    pub job_title: String,
    /// Label of the upload field the document is for.
    pub field_label: String,
}

/// Produces a stand-in document for a required upload and returns its path.
///
/// Carried in `AppState` as `Arc<dyn PlaceholderGenerator>`.
#[async_trait]
pub trait PlaceholderGenerator: Send + Sync {
    async fn generate(
        &self,
        kind: DocumentKind,
        context: &PlaceholderContext,
    ) -> Result<PathBuf, CollaboratorError>;
}

/// Asks Claude for a short German placeholder text and renders it as a PDF
/// under `<output>/generated_documents`.
pub struct LlmPlaceholderGenerator {
    llm: Option<LlmClient>,
    dir: PathBuf,
}

impl LlmPlaceholderGenerator {
    pub fn new(llm: Option<LlmClient>, output_dir: &Path) -> Self {
        Self {
            llm,
            dir: output_dir.join("generated_documents"),
        }
    }
}

#[async_trait]
impl PlaceholderGenerator for LlmPlaceholderGenerator {
    async fn generate(
        &self,
        kind: DocumentKind,
        context: &PlaceholderContext,
    ) -> Result<PathBuf, CollaboratorError> {
        let llm = self
            .llm
            .as_ref()
            .ok_or(CollaboratorError::NotConfigured("LLM placeholder documents"))?;

        let prompt = PLACEHOLDER_DOCUMENT_PROMPT_TEMPLATE
            .replace("{document}", kind.german_name())
            .replace("{company}", &context.company)
            .replace("{title}", &context.job_title)
            .replace("{field}", &context.field_label);
        let text = llm
            .call_text_with_budget(&prompt, PLAIN_TEXT_SYSTEM, DOCUMENT_TOKENS)
            .await?;

        let path = self.dir.join(placeholder_file_name(kind, &context.company));
        write_text_pdf(&path, &text).await?;
        info!(path = %path.display(), kind = kind.as_str(), "Generated placeholder document");
        Ok(path)
    }
}

pub fn placeholder_file_name(kind: DocumentKind, company: &str) -> String {
    let company: String = company
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    let company = company.trim_matches('_');
    let suffix = &Uuid::new_v4().simple().to_string()[..8];
    format!("placeholder_{}_{company}_{suffix}.pdf", kind.as_str())
}

// ────────────────────────────────────────────────────────────────────────────
// PDF rendering
// ────────────────────────────────────────────────────────────────────────────

// A4 in points.
const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 56;
const FONT_SIZE: i64 = 10;
const LEADING: i64 = 14;
const LINES_PER_PAGE: usize = ((PAGE_HEIGHT - 2 * MARGIN) / LEADING) as usize;
/// Characters per line at 10 pt Helvetica inside the margins.
const WRAP_AT: usize = 95;

pub async fn write_text_pdf(path: &Path, text: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes =
        render_pdf(text).map_err(|e| std::io::Error::other(format!("PDF rendering: {e}")))?;
    tokio::fs::write(path, bytes).await
}

/// A4 pages in Helvetica (WinAnsi). Text that does not fit on one page
/// continues on the next.
pub fn render_pdf(text: &str) -> Result<Vec<u8>, lopdf::Error> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for lines in paginate(text) {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), FONT_SIZE.into()]),
            Operation::new("TL", vec![LEADING.into()]),
            Operation::new("Td", vec![MARGIN.into(), (PAGE_HEIGHT - MARGIN).into()]),
        ];
        for line in &lines {
            operations.push(Operation::new("Tj", vec![Object::string_literal(win_ansi(line))]));
            operations.push(Operation::new("T*", vec![]));
        }
        operations.push(Operation::new("ET", vec![]));

        let content = Content { operations }.encode()?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => media_box(),
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

fn media_box() -> Vec<Object> {
    vec![0_i64.into(), 0_i64.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()]
}

/// Windows-1252 bytes for the WinAnsi font encoding. Characters it cannot
/// represent become `?`.
fn win_ansi(line: &str) -> Vec<u8> {
    let mut buf = [0u8; 4];
    line.chars()
        .map(|c| {
            let (bytes, _, unmappable) = WINDOWS_1252.encode(c.encode_utf8(&mut buf));
            match bytes.first() {
                Some(&b) if !unmappable && bytes.len() == 1 => b,
                _ => b'?',
            }
        })
        .collect()
}

/// Wrapped lines split into page-sized chunks. Always at least one page.
fn paginate(text: &str) -> Vec<Vec<String>> {
    let lines = wrap(text);
    if lines.is_empty() {
        return vec![Vec::new()];
    }
    lines
        .chunks(LINES_PER_PAGE)
        .map(<[String]>::to_vec)
        .collect()
}

fn wrap(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            if !line.is_empty() && line.chars().count() + 1 + word.chars().count() > WRAP_AT {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_text_continues_on_new_pages() {
        let text: String = (1..=120).map(|n| format!("Zeile {n}\n")).collect();
        let pages = paginate(&text);
        assert_eq!(pages.len(), 120_usize.div_ceil(LINES_PER_PAGE));
        assert_eq!(pages.iter().map(Vec::len).sum::<usize>(), 120);
        assert_eq!(pages.last().and_then(|p| p.last()).map(String::as_str), Some("Zeile 120"));
    }

    #[test]
    fn test_empty_text_is_one_blank_page() {
        let pages = paginate("");
        assert_eq!(pages.len(), 1);
        assert!(pages[0].is_empty());
    }

    #[test]
    fn test_text_is_encoded_as_win_ansi() {
        assert_eq!(win_ansi("Grüße"), b"Gr\xfc\xdfe".to_vec());
        assert_eq!(win_ansi("500 €"), b"500 \x80".to_vec());
        assert_eq!(win_ansi("a → b"), b"a ? b".to_vec());
    }

    #[test]
    fn test_long_paragraphs_wrap() {
        let text = "wort ".repeat(60);
        let lines = wrap(&text);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| l.chars().count() <= WRAP_AT));
    }

    #[test]
    fn test_rendered_pdf_keeps_every_line() {
        let text: String = (1..=80)
            .map(|n| format!("Zeile {n} Grüße aus Köln\n"))
            .collect();
        let pdf = render_pdf(&text).unwrap();
        assert!(pdf.starts_with(b"%PDF-"));

        let extracted = pdf_extract::extract_text_from_mem(&pdf).unwrap();
        assert!(extracted.contains("Zeile 1 "));
        assert!(extracted.contains("Zeile 80"));
    }

    #[test]
    fn test_file_name_is_filesystem_safe() {
        let name = placeholder_file_name(DocumentKind::CoverLetter, "Müller & Söhne GmbH");
        assert!(name.starts_with("placeholder_cover_letter_m_ller___s_hne_gmbh_"));
        assert!(name.ends_with(".pdf"));
    }

    #[tokio::test]
    async fn test_writes_pdf_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("generated_documents").join("doc.pdf");
        write_text_pdf(&path, "Platzhalter").await.unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }

    #[tokio::test]
    async fn test_without_llm_is_not_configured() {
        let dir = tempfile::tempdir().unwrap();
        let generator = LlmPlaceholderGenerator::new(None, dir.path());
        let context = PlaceholderContext {
            company: "Acme".into(),
            job_title: "Werkstudent".into(),
            field_label: "Zeugnisse".into(),
        };
        let err = generator.generate(DocumentKind::Other, &context).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::NotConfigured(_)));
    }
}
