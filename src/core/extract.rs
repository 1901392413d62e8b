use crate::domain::model::{DocumentKind, ExtractedDocument, ExtractionMethod};
use crate::domain::ports::OcrProvider;
use crate::utils::error::{ExtractorError, Result};
use regex::Regex;
use std::io::{Cursor, Read};
use std::sync::OnceLock;

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// 依 magic bytes → 宣告的 MIME → 副檔名 判斷文件類型
pub fn detect_kind(bytes: &[u8], mime_type: Option<&str>, name: &str) -> DocumentKind {
    if let Some(kind) = kind_from_magic(bytes) {
        return kind;
    }

    if let Some(mime) = mime_type.map(|m| m.trim().to_ascii_lowercase()) {
        if mime == "application/pdf" {
            return DocumentKind::Pdf;
        }
        if mime == DOCX_MIME {
            return DocumentKind::Docx;
        }
        if mime.starts_with("image/") {
            return DocumentKind::Image;
        }
    }

    let extension = name
        .split('?')
        .next()
        .unwrap_or(name)
        .rsplit('.')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    match extension.as_str() {
        "pdf" => DocumentKind::Pdf,
        "docx" => DocumentKind::Docx,
        "png" | "jpg" | "jpeg" | "gif" | "tif" | "tiff" | "bmp" | "webp" => DocumentKind::Image,
        _ => DocumentKind::Text,
    }
}

fn kind_from_magic(bytes: &[u8]) -> Option<DocumentKind> {
    if has_pdf_header(bytes) {
        return Some(DocumentKind::Pdf);
    }
    if bytes.starts_with(&[0x50, 0x4B, 0x03, 0x04]) && is_docx_archive(bytes) {
        return Some(DocumentKind::Docx);
    }
    image_mime(bytes).map(|_| DocumentKind::Image)
}

/// `%PDF-` 必須在檔頭，只允許前面有 BOM 或空白
fn has_pdf_header(bytes: &[u8]) -> bool {
    let without_bom = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    let start = without_bom
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(without_bom.len());
    without_bom[start..].starts_with(b"%PDF-")
}

fn is_docx_archive(bytes: &[u8]) -> bool {
    zip::ZipArchive::new(Cursor::new(bytes))
        .map(|mut archive| {
            let found = archive.by_name("word/document.xml").is_ok();
            found
        })
        .unwrap_or(false)
}

fn image_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
        Some("image/tiff")
    } else if bytes.starts_with(b"BM") {
        Some("image/bmp")
    } else {
        None
    }
}

/// OCR 供應商需要的 MIME
fn ocr_mime(kind: DocumentKind, bytes: &[u8], declared: Option<&str>) -> String {
    match kind {
        DocumentKind::Pdf => "application/pdf".to_string(),
        _ => image_mime(bytes)
            .map(str::to_string)
            .or_else(|| declared.map(str::to_string))
            .unwrap_or_else(|| "application/octet-stream".to_string()),
    }
}

/// 非空白字元數，用來判斷 PDF 是否只有掃描影像
pub fn meaningful_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

pub fn placeholder_text(name: &str) -> String {
    format!("[No text could be extracted from {}]", name)
}

/// PDF 原生文字層。pdf-extract 是同步且可能 panic，放到 blocking 執行緒
pub async fn extract_pdf_text(name: &str, bytes: &[u8]) -> Result<String> {
    let owned = bytes.to_vec();
    let joined = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&owned))
        .await
        .map_err(|e| ExtractorError::ExtractionError {
            name: name.to_string(),
            message: format!("PDF parser aborted: {}", e),
        })?;

    joined.map_err(|e| ExtractorError::ExtractionError {
        name: name.to_string(),
        message: format!("PDF parsing failed: {}", e),
    })
}

pub fn extract_docx_text(name: &str, bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|_| ExtractorError::ExtractionError {
            name: name.to_string(),
            message: "archive has no word/document.xml".to_string(),
        })?
        .read_to_string(&mut xml)?;

    Ok(docx_xml_to_text(&xml))
}

fn docx_token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>|</w:p>|<w:tab\s*/>|<w:(?:br|cr)(?:\s[^>]*)?/>")
            .expect("static docx pattern")
    })
}

fn docx_xml_to_text(xml: &str) -> String {
    let mut text = String::new();
    for caps in docx_token_pattern().captures_iter(xml) {
        if let Some(run) = caps.get(1) {
            text.push_str(&decode_xml_entities(run.as_str()));
            continue;
        }
        let token = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        if token.starts_with("<w:tab") {
            text.push('\t');
        } else {
            text.push('\n');
        }
    }
    text.trim().to_string()
}

fn decode_xml_entities(raw: &str) -> String {
    static ENTITY: OnceLock<Regex> = OnceLock::new();
    let pattern = ENTITY.get_or_init(|| {
        Regex::new(r"&(amp|lt|gt|quot|apos|#[0-9]+|#x[0-9A-Fa-f]+);").expect("static entity pattern")
    });

    pattern
        .replace_all(raw, |caps: &regex::Captures| {
            let entity = &caps[1];
            match entity {
                "amp" => "&".to_string(),
                "lt" => "<".to_string(),
                "gt" => ">".to_string(),
                "quot" => "\"".to_string(),
                "apos" => "'".to_string(),
                numeric => {
                    let code = match numeric.strip_prefix("#x") {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => numeric[1..].parse::<u32>().ok(),
                    };
                    code.and_then(char::from_u32)
                        .map(String::from)
                        .unwrap_or_else(|| caps[0].to_string())
                }
            }
        })
        .into_owned()
}

/// 純文字：去 BOM，支援 UTF-16 BOM，其餘以 lossy UTF-8 解碼
pub fn decode_plain_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    String::from_utf8_lossy(bytes).into_owned()
}

/// 文字抽取與 OCR 後援鏈。任何失敗都只會寫進 notes，最後退回 placeholder
pub struct TextExtractor {
    ocr_chain: Vec<Box<dyn OcrProvider>>,
    min_text_chars: usize,
}

impl TextExtractor {
    pub fn new(ocr_chain: Vec<Box<dyn OcrProvider>>, min_text_chars: usize) -> Self {
        Self {
            ocr_chain,
            min_text_chars,
        }
    }

    pub async fn extract(
        &self,
        name: &str,
        bytes: &[u8],
        mime_type: Option<&str>,
        force_ocr: bool,
    ) -> ExtractedDocument {
        let kind = detect_kind(bytes, mime_type, name);
        let mut notes = Vec::new();
        tracing::debug!("Extracting {} as {:?}", name, kind);

        let outcome = match kind {
            DocumentKind::Pdf => self.extract_pdf(name, bytes, force_ocr, &mut notes).await,
            DocumentKind::Docx => match extract_docx_text(name, bytes) {
                Ok(text) if meaningful_chars(&text) > 0 => Some((text, ExtractionMethod::Docx)),
                Ok(_) => {
                    notes.push(format!("[{}] DOCX contains no text", name));
                    None
                }
                Err(e) => {
                    notes.push(format!("[{}] {}", name, e));
                    None
                }
            },
            DocumentKind::Image => {
                let mime = ocr_mime(kind, bytes, mime_type);
                self.run_ocr(name, bytes, &mime, &mut notes).await
            }
            DocumentKind::Text => {
                let text = decode_plain_text(bytes);
                if meaningful_chars(&text) > 0 {
                    Some((text, ExtractionMethod::PlainText))
                } else {
                    notes.push(format!("[{}] file is blank", name));
                    None
                }
            }
        };

        match outcome {
            Some((text, method)) => {
                tracing::info!(
                    "📄 {} ({:?}): {} chars via {:?}",
                    name,
                    kind,
                    meaningful_chars(&text),
                    method
                );
                ExtractedDocument {
                    name: name.to_string(),
                    kind,
                    method,
                    text,
                    notes,
                }
            }
            None => {
                tracing::warn!(
                    "⚠️ {} ({:?}): no text extracted, using placeholder",
                    name,
                    kind
                );
                notes.push(format!("[{}] no text could be extracted", name));
                ExtractedDocument {
                    name: name.to_string(),
                    kind,
                    method: ExtractionMethod::Placeholder,
                    text: placeholder_text(name),
                    notes,
                }
            }
        }
    }

    async fn extract_pdf(
        &self,
        name: &str,
        bytes: &[u8],
        force_ocr: bool,
        notes: &mut Vec<String>,
    ) -> Option<(String, ExtractionMethod)> {
        let native = if force_ocr {
            notes.push(format!("[{}] OCR forced, native PDF text skipped", name));
            None
        } else {
            match extract_pdf_text(name, bytes).await {
                Ok(text) => Some(text),
                Err(e) => {
                    tracing::warn!("{}", e);
                    notes.push(format!("[{}] {}", name, e));
                    None
                }
            }
        };

        let native_chars = native.as_deref().map(meaningful_chars).unwrap_or(0);
        if native_chars >= self.min_text_chars {
            return native.map(|text| (text, ExtractionMethod::NativePdf));
        }
        if native.is_some() {
            notes.push(format!(
                "[{}] PDF text layer has only {} characters, trying OCR",
                name, native_chars
            ));
        }

        if let Some(found) = self.run_ocr(name, bytes, "application/pdf", notes).await {
            return Some(found);
        }

        // OCR 全部失敗時，短的原生文字總比 placeholder 好
        native
            .filter(|_| native_chars > 0)
            .map(|text| (text, ExtractionMethod::NativePdf))
    }

    async fn run_ocr(
        &self,
        name: &str,
        bytes: &[u8],
        mime_type: &str,
        notes: &mut Vec<String>,
    ) -> Option<(String, ExtractionMethod)> {
        if self.ocr_chain.is_empty() {
            notes.push(format!("[{}] no OCR provider configured", name));
            return None;
        }

        for provider in &self.ocr_chain {
            tracing::info!("🔍 {}: running OCR via {}", name, provider.name());
            match provider.recognize(bytes, mime_type).await {
                Ok(text) if meaningful_chars(&text) > 0 => {
                    return Some((text, provider.method()));
                }
                Ok(_) => {
                    tracing::warn!("{} returned no text for {}", provider.name(), name);
                    notes.push(format!("[{}] {} returned no text", name, provider.name()));
                }
                Err(e) => {
                    tracing::warn!("OCR fallback for {}: {}", name, e);
                    notes.push(format!("[{}] {}", name, e));
                }
            }
        }
        None
    }
}
