use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::process::Command;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Ppt,
    Pptx,
    Doc,
    Docx,
    Txt,
}

impl DocumentKind {
    pub fn from_filename(filename: &str) -> Result<Self> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Ok(Self::Pdf),
            "ppt" => Ok(Self::Ppt),
            "pptx" => Ok(Self::Pptx),
            "doc" => Ok(Self::Doc),
            "docx" => Ok(Self::Docx),
            "txt" => Ok(Self::Txt),
            _ => Err(Error::BadRequest(
                "Unsupported file type. Please upload PDF, PPT, PPTX, DOC, DOCX or TXT".into(),
            )),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Ppt => "ppt",
            Self::Pptx => "pptx",
            Self::Doc => "doc",
            Self::Docx => "docx",
            Self::Txt => "txt",
        }
    }

    /// PDF and the zip-based office formats carry a recognisable signature.
    pub fn check_signature(&self, bytes: &[u8]) -> Result<()> {
        let ok = match self {
            Self::Pdf => bytes.starts_with(b"%PDF"),
            Self::Pptx | Self::Docx => bytes.starts_with(b"PK"),
            Self::Ppt | Self::Doc | Self::Txt => true,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::BadRequest(format!(
                "File content does not look like a .{} document",
                self.extension()
            )))
        }
    }
}

pub struct ExtractService;

impl ExtractService {
    pub async fn extract_text(filename: &str, bytes: &[u8]) -> Result<String> {
        let kind = DocumentKind::from_filename(filename)?;
        kind.check_signature(bytes)?;

        if kind == DocumentKind::Txt {
            return Ok(String::from_utf8_lossy(bytes).into_owned());
        }

        let work_dir = PathBuf::from(format!("/tmp/quizzify_extract_{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&work_dir).await?;
        let result = Self::extract_in(&work_dir, kind, bytes).await;
        let _ = fs::remove_dir_all(&work_dir).await;
        result
    }

    async fn extract_in(work_dir: &Path, kind: DocumentKind, bytes: &[u8]) -> Result<String> {
        let input = work_dir.join(format!("upload.{}", kind.extension()));
        fs::write(&input, bytes).await?;

        let pdf = if kind == DocumentKind::Pdf {
            input
        } else {
            Self::convert_to_pdf(&input, work_dir).await?
        };
        Self::pdf_to_text(&pdf).await
    }

    pub async fn pdf_to_text(pdf: &Path) -> Result<String> {
        let out = Command::new("pdftotext")
            .arg("-layout")
            .arg(pdf)
            .arg("-")
            .output()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to run pdftotext: {}", e))?;
        if !out.status.success() {
            return Err(anyhow::anyhow!(
                "pdftotext failed: {}",
                String::from_utf8_lossy(&out.stderr)
            )
            .into());
        }
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }

    /// Converts `input` with headless LibreOffice and returns the produced PDF path.
    pub async fn convert_to_pdf(input: &Path, out_dir: &Path) -> Result<PathBuf> {
        let out = Command::new("libreoffice")
            .arg("--headless")
            .arg("--norestore")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(out_dir)
            .arg(input)
            .output()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to run libreoffice: {}", e))?;
        if !out.status.success() {
            return Err(anyhow::anyhow!(
                "LibreOffice PDF conversion failed: {}",
                String::from_utf8_lossy(&out.stderr)
            )
            .into());
        }

        let mut entries = fs::read_dir(out_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let p = entry.path();
            if p.extension().and_then(|e| e.to_str()) == Some("pdf") {
                return Ok(p);
            }
        }
        Err(Error::Internal("LibreOffice produced no PDF output".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_case_insensitive() {
        assert_eq!(DocumentKind::from_filename("Notes.PDF").unwrap(), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_filename("a.b.docx").unwrap(), DocumentKind::Docx);
        assert!(DocumentKind::from_filename("image.png").is_err());
        assert!(DocumentKind::from_filename("noext").is_err());
    }

    #[test]
    fn signatures_are_checked() {
        assert!(DocumentKind::Pdf.check_signature(b"%PDF-1.7").is_ok());
        assert!(DocumentKind::Pdf.check_signature(b"PK\x03\x04").is_err());
        assert!(DocumentKind::Docx.check_signature(b"PK\x03\x04").is_ok());
        assert!(DocumentKind::Pptx.check_signature(b"%PDF").is_err());
        assert!(DocumentKind::Txt.check_signature(b"anything").is_ok());
    }

    #[tokio::test]
    async fn text_files_are_decoded_lossily() {
        let text = ExtractService::extract_text("notes.txt", b"hello \xffworld")
            .await
            .unwrap();
        assert!(text.starts_with("hello "));
        assert!(text.ends_with("world"));
    }
}
