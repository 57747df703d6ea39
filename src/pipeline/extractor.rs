// src/pipeline/extractor.rs

//! Plain-text extraction for uploaded documents.
//!
//! Dispatch is by file extension only. Each format has its own line policy:
//! * PDF: every page contributes its text plus `\n`, blank pages included.
//! * DOCX: body paragraphs joined with `\n`, empty paragraphs included.
//! * PPTX: text-bearing shapes joined with `\n`, empty shapes skipped.

use std::{
    collections::HashMap,
    fmt,
    fs::File,
    io::{BufReader, Read},
    path::{Path, PathBuf},
    sync::LazyLock,
};

use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};
use regex::Regex;
use zip::{ZipArchive, result::ZipError};

static SLIDE_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ppt/slides/slide(\d+)\.xml$").expect("static regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Pptx,
}

impl DocumentFormat {
    /// Parses an extension without the leading dot, case-insensitively.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "pptx" => Some(Self::Pptx),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ExtractionError> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        Self::from_extension(extension).ok_or_else(|| {
            ExtractionError::UnsupportedFormat(if extension.is_empty() {
                "(none)".to_string()
            } else {
                format!(".{}", extension.to_ascii_lowercase())
            })
        })
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Pptx => "pptx",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.extension().to_ascii_uppercase())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("Error extracting text from {format}: {cause}")]
    ParseFailure {
        format: DocumentFormat,
        cause: String,
    },
}

#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub source_path: PathBuf,
    pub format: DocumentFormat,
    pub text: String,
}

/// Low-level failures of the format readers, flattened into
/// `ExtractionError::ParseFailure` at the module boundary.
#[derive(Debug, thiserror::Error)]
enum SourceError {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Pdf(#[from] lopdf::Error),
    #[error("{0}")]
    Zip(#[from] ZipError),
    #[error("{0}")]
    Xml(#[from] quick_xml::Error),
    #[error("{0}")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),
    #[error("missing document part '{0}'")]
    MissingPart(String),
}

/// Extracts the text of the document at `path`.
pub fn extract_text(path: &Path) -> Result<String, ExtractionError> {
    extract_document(path).map(|doc| doc.text)
}

#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn extract_document(path: &Path) -> Result<ExtractedDocument, ExtractionError> {
    let format = DocumentFormat::from_path(path).inspect_err(|e| tracing::error!("{e}"))?;

    let result = match format {
        DocumentFormat::Pdf => extract_pdf(path),
        DocumentFormat::Docx => extract_docx(path),
        DocumentFormat::Pptx => extract_pptx(path),
    };

    match result {
        Ok(text) => {
            tracing::info!(%format, chars = text.len(), "Successfully extracted text");
            Ok(ExtractedDocument {
                source_path: path.to_path_buf(),
                format,
                text,
            })
        }
        Err(e) => {
            tracing::error!(%format, "Error extracting text from document: {e}");
            Err(ExtractionError::ParseFailure {
                format,
                cause: e.to_string(),
            })
        }
    }
}

fn extract_pdf(path: &Path) -> Result<String, SourceError> {
    let document = lopdf::Document::load(path)?;
    let mut text = String::new();

    for page_number in document.get_pages().keys() {
        let page_text = document.extract_text(&[*page_number])?;
        // lopdf closes every text object with a newline; the page separator is ours.
        text.push_str(page_text.trim_end_matches(['\n', '\r']));
        text.push('\n');
    }

    Ok(text)
}

fn open_archive(path: &Path) -> Result<ZipArchive<BufReader<File>>, SourceError> {
    let file = File::open(path)?;
    Ok(ZipArchive::new(BufReader::new(file))?)
}

fn read_part<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, SourceError> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut xml = String::new();
    entry.read_to_string(&mut xml)?;
    Ok(Some(xml))
}

fn require_part<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<String, SourceError> {
    read_part(archive, name)?.ok_or_else(|| SourceError::MissingPart(name.to_string()))
}

fn local_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

fn attribute_value(element: &BytesStart<'_>, key: &str) -> Result<Option<String>, SourceError> {
    for attr in element.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == key.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// True when the open-element stack ends with `suffix` (local names).
fn stack_ends_with(stack: &[String], suffix: &[&str]) -> bool {
    stack.len() >= suffix.len()
        && stack[stack.len() - suffix.len()..]
            .iter()
            .zip(suffix)
            .all(|(open, want)| open == want)
}

fn extract_docx(path: &Path) -> Result<String, SourceError> {
    let mut archive = open_archive(path)?;
    let xml = require_part(&mut archive, "word/document.xml")?;
    docx_paragraphs(&xml).map(|paragraphs| paragraphs.join("\n"))
}

/// Collects the text of the top-level body paragraphs of `word/document.xml`.
fn docx_paragraphs(xml: &str) -> Result<Vec<String>, SourceError> {
    // A run counts when it sits directly in a body paragraph or in a hyperlink inside one.
    fn in_body_run(stack: &[String]) -> bool {
        stack_ends_with(stack, &["body", "p", "r"])
            || stack_ends_with(stack, &["body", "p", "hyperlink", "r"])
    }

    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<String> = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = local_name(&e);
                if name == "p" && stack_ends_with(&stack, &["body"]) {
                    current.clear();
                }
                stack.push(name);
            }
            Event::End(_) => {
                let closed = stack.pop();
                if closed.as_deref() == Some("p") && stack_ends_with(&stack, &["body"]) {
                    paragraphs.push(std::mem::take(&mut current));
                }
            }
            Event::Empty(e) => {
                match local_name(&e).as_str() {
                    "p" if stack_ends_with(&stack, &["body"]) => paragraphs.push(String::new()),
                    "tab" | "ptab" if in_body_run(&stack) => current.push('\t'),
                    "br" | "cr" if in_body_run(&stack) => current.push('\n'),
                    "noBreakHyphen" if in_body_run(&stack) => current.push('-'),
                    _ => {}
                }
            }
            Event::Text(t) => {
                if stack.last().map(String::as_str) == Some("t") && in_body_run(&stack[..stack.len() - 1]) {
                    current.push_str(&t.unescape()?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs)
}

fn extract_pptx(path: &Path) -> Result<String, SourceError> {
    let mut archive = open_archive(path)?;
    let mut fragments = Vec::new();

    for part in slide_parts(&mut archive)? {
        let xml = require_part(&mut archive, &part)?;
        fragments.extend(slide_shape_texts(&xml)?);
    }

    Ok(fragments.join("\n"))
}

/// Slide part names in presentation order.
///
/// Order comes from `p:sldIdLst` resolved through the presentation
/// relationships; archives without that information fall back to the
/// numeric order of `ppt/slides/slideN.xml`.
fn slide_parts<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<Vec<String>, SourceError> {
    let presentation = require_part(archive, "ppt/presentation.xml")?;
    let slide_ids = presentation_slide_rel_ids(&presentation)?;

    if !slide_ids.is_empty() {
        if let Some(rels) = read_part(archive, "ppt/_rels/presentation.xml.rels")? {
            let targets = relationship_targets(&rels)?;
            let ordered: Option<Vec<String>> = slide_ids
                .iter()
                .map(|id| targets.get(id).map(|target| resolve_ppt_target(target)))
                .collect();
            if let Some(parts) = ordered {
                return Ok(parts);
            }
        }
    }

    let mut numbered: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let number = SLIDE_PART.captures(name)?.get(1)?.as_str().parse().ok()?;
            Some((number, name.to_string()))
        })
        .collect();
    numbered.sort_by_key(|(number, _)| *number);

    Ok(numbered.into_iter().map(|(_, name)| name).collect())
}

fn resolve_ppt_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("ppt/{}", target.trim_start_matches("./")),
    }
}

/// Relationship ids (`r:id`) of `p:sldId` entries, in list order.
fn presentation_slide_rel_ids(xml: &str) -> Result<Vec<String>, SourceError> {
    let mut reader = Reader::from_str(xml);
    let mut ids = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sldId" => {
                for attr in e.attributes() {
                    let attr = attr?;
                    if attr.key.local_name().as_ref() == b"id" && attr.key.prefix().is_some() {
                        ids.push(attr.unescape_value()?.into_owned());
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(ids)
}

fn relationship_targets(xml: &str) -> Result<HashMap<String, String>, SourceError> {
    let mut reader = Reader::from_str(xml);
    let mut targets = HashMap::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let id = attribute_value(&e, "Id")?;
                let target = attribute_value(&e, "Target")?;
                if let (Some(id), Some(target)) = (id, target) {
                    targets.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(targets)
}

/// Text of every top-level text-bearing shape on one slide, skipping empty ones.
fn slide_shape_texts(xml: &str) -> Result<Vec<String>, SourceError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<String> = Vec::new();
    let mut texts = Vec::new();
    let mut shape: Option<Vec<String>> = None;
    let mut paragraph = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = local_name(&e);
                if name == "sp" && stack_ends_with(&stack, &["spTree"]) {
                    shape = Some(Vec::new());
                } else if name == "p" && shape.is_some() && stack_ends_with(&stack, &["txBody"]) {
                    paragraph.clear();
                }
                stack.push(name);
            }
            Event::End(_) => {
                let closed = stack.pop();
                match closed.as_deref() {
                    Some("p") if stack_ends_with(&stack, &["txBody"]) => {
                        if let Some(paragraphs) = shape.as_mut() {
                            paragraphs.push(std::mem::take(&mut paragraph));
                        }
                    }
                    Some("sp") if stack_ends_with(&stack, &["spTree"]) => {
                        if let Some(paragraphs) = shape.take() {
                            let text = paragraphs.join("\n");
                            if !text.is_empty() {
                                texts.push(text);
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => {
                if shape.is_some() {
                    match local_name(&e).as_str() {
                        "p" if stack_ends_with(&stack, &["txBody"]) => {
                            if let Some(paragraphs) = shape.as_mut() {
                                paragraphs.push(String::new());
                            }
                        }
                        "br" if stack_ends_with(&stack, &["txBody", "p"]) => paragraph.push('\n'),
                        _ => {}
                    }
                }
            }
            Event::Text(t) => {
                if shape.is_some()
                    && (stack_ends_with(&stack, &["p", "r", "t"])
                        || stack_ends_with(&stack, &["p", "fld", "t"]))
                {
                    paragraph.push_str(&t.unescape()?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(texts)
}
