use std::path::Path;

use tracing::info;

use crate::errors::AppError;

/// Plain text of the CV at `path`. PDFs go through `pdf-extract`; anything
/// else is read as UTF-8 text. A document without any text is unreadable.
pub async fn extract_text(path: &Path) -> Result<String, AppError> {
    let unreadable = |reason: String| AppError::CvUnreadable {
        path: path.to_path_buf(),
        reason,
    };

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| unreadable(e.to_string()))?;

    let is_pdf = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        || bytes.starts_with(b"%PDF");

    let text = if is_pdf {
        tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|e| unreadable(format!("extraction task failed: {e}")))?
            .map_err(|e| unreadable(format!("not a readable PDF: {e}")))?
    } else {
        String::from_utf8(bytes).map_err(|_| unreadable("not UTF-8 text".into()))?
    };

    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(unreadable("document contains no text".into()));
    }
    info!(path = %path.display(), chars = text.chars().count(), "Extracted CV text");
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_plain_text_cv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cv.txt");
        std::fs::write(&path, "  Ann Becker\nPython, SQL, Power BI\n").unwrap();
        assert_eq!(
            extract_text(&path).await.unwrap(),
            "Ann Becker\nPython, SQL, Power BI"
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_unreadable() {
        let err = extract_text(Path::new("/definitely/not/here.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::CvUnreadable { .. }));
        assert_eq!(err.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_empty_document_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cv.txt");
        std::fs::write(&path, "   \n").unwrap();
        let err = extract_text(&path).await.unwrap_err();
        assert!(err.to_string().contains("no text"));
    }

    #[tokio::test]
    async fn test_corrupt_pdf_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cv.pdf");
        std::fs::write(&path, b"%PDF-1.4 truncated").unwrap();
        assert!(matches!(
            extract_text(&path).await,
            Err(AppError::CvUnreadable { .. })
        ));
    }
}
