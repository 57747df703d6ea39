// src/utils/pdf.rs

use std::{
    collections::BTreeMap,
    fmt::Write as _,
    path::{Path, PathBuf},
};

use lopdf::{
    Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary,
    content::{Content, Operation},
};
use ttf_parser::{Face, GlyphId};

use crate::{error::AppError, pipeline::GeneratedQuestion};

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 56;
const WRAP_WIDTH: usize = 60;

const TITLE: &str = "Exam Questions";
const TITLE_SIZE: i64 = 16;
const BODY_SIZE: i64 = 12;
const LINE_HEIGHT: i64 = 16;

const ENCODING: &str = "WinAnsiEncoding";

/// Unicode font used for exports when `PDF_FONT_PATH` is not set.
pub const DEFAULT_FONT_PATH: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

#[derive(Debug, thiserror::Error)]
pub enum FontError {
    #[error("failed to read font {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{} is not a usable TrueType font: {reason}", .path.display())]
    Invalid { path: PathBuf, reason: String },
}

/// A TrueType font embedded into exports as a Type0/Identity-H font.
#[derive(Debug)]
pub struct PdfFont {
    base_name: String,
    data: Vec<u8>,
}

impl PdfFont {
    pub fn load(path: &Path) -> Result<Self, FontError> {
        let data = std::fs::read(path).map_err(|source| FontError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Face::parse(&data, 0).map_err(|e| FontError::Invalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let base_name: String = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect();

        Ok(Self {
            base_name: if base_name.is_empty() {
                "EmbeddedFont".to_string()
            } else {
                base_name
            },
            data,
        })
    }

    fn face(&self) -> Result<Face<'_>, AppError> {
        Face::parse(&self.data, 0)
            .map_err(|e| AppError::InternalServerError(format!("font parse failed: {e}")))
    }
}

/// Renders question lists as printable exam sheets.
///
/// With an embedded font any character the font covers is printed. Without
/// one, the standard Helvetica fonts limit text to WinAnsi.
/// Either way, text the font cannot show is rejected rather than dropped.
#[derive(Debug, Default)]
pub struct PdfRenderer {
    font: Option<PdfFont>,
}

impl PdfRenderer {
    pub fn standard() -> Self {
        Self { font: None }
    }

    pub fn with_font(font: PdfFont) -> Self {
        Self { font: Some(font) }
    }

    /// Loads the font at `path`, falling back to the standard fonts when it
    /// is absent or unreadable.
    pub fn from_font_path(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            tracing::info!("PDF export uses standard fonts (WinAnsi only)");
            return Self::standard();
        };
        match PdfFont::load(path) {
            Ok(font) => {
                tracing::info!(font = %path.display(), "PDF export font loaded");
                Self::with_font(font)
            }
            Err(e) => {
                tracing::warn!("{e}; PDF export falls back to standard fonts (WinAnsi only)");
                Self::standard()
            }
        }
    }

    pub fn has_embedded_font(&self) -> bool {
        self.font.is_some()
    }

    /// Each option is lettered (A, B, ...); the correct one carries a
    /// trailing `*`. Text is wrapped at 60 characters.
    pub fn render(&self, questions: &[GeneratedQuestion]) -> Result<Vec<u8>, AppError> {
        let pages = paginate(layout(questions));

        match &self.font {
            None => {
                reject_unsupported(&pages, |c| {
                    Document::encode_text(Some(ENCODING), c.encode_utf8(&mut [0; 4])).len() == 1
                })?;
                let mut doc = Document::with_version("1.5");
                let regular_id = doc.add_object(standard_font("Helvetica"));
                let bold_id = doc.add_object(standard_font("Helvetica-Bold"));
                write_document(doc, &pages, (regular_id, bold_id), |text| {
                    Object::string_literal(Document::encode_text(Some(ENCODING), text))
                })
            }
            Some(font) => {
                let face = font.face()?;
                reject_unsupported(&pages, |c| face.glyph_index(c).is_some())?;

                let mut used: BTreeMap<u16, char> = BTreeMap::new();
                let mut doc = Document::with_version("1.5");
                let font_id = doc.new_object_id();
                let content = pages
                    .iter()
                    .map(|page| {
                        page_operations(page, |text| {
                            let mut bytes = Vec::with_capacity(text.len() * 2);
                            for c in text.chars() {
                                let GlyphId(gid) = face.glyph_index(c).unwrap_or(GlyphId(0));
                                used.entry(gid).or_insert(c);
                                bytes.extend_from_slice(&gid.to_be_bytes());
                            }
                            Object::String(bytes, StringFormat::Hexadecimal)
                        })
                    })
                    .collect::<Vec<_>>();

                let type0 = embedded_font(&mut doc, font, &face, &used)?;
                doc.objects.insert(font_id, Object::Dictionary(type0));
                finish_document(doc, content, (font_id, font_id))
            }
        }
    }
}

/// Fails with the list of distinct characters `supported` refuses, in order
/// of first appearance.
fn reject_unsupported(pages: &[Vec<Block>], supported: impl Fn(char) -> bool) -> Result<(), AppError> {
    let mut missing: Vec<char> = Vec::new();
    for block in pages.iter().flatten() {
        if let Block::Line { text, .. } = block {
            for c in text.chars() {
                if !supported(c) && !missing.contains(&c) {
                    missing.push(c);
                }
            }
        }
    }

    if missing.is_empty() {
        return Ok(());
    }
    let listed: Vec<String> = missing.iter().map(|c| format!("'{c}'")).collect();
    Err(AppError::BadRequest(format!(
        "Questions contain characters the PDF font cannot render: {}",
        listed.join(", ")
    )))
}

fn standard_font(base_font: &str) -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base_font,
        "Encoding" => ENCODING,
    }
}

fn scaled(value: impl Into<i64>, units_per_em: i64) -> i64 {
    value.into() * 1000 / units_per_em
}

/// Builds the Type0 font dictionary, adding the descendant CID font,
/// descriptor, font program and ToUnicode map to `doc`.
fn embedded_font(
    doc: &mut Document,
    font: &PdfFont,
    face: &Face<'_>,
    used: &BTreeMap<u16, char>,
) -> Result<Dictionary, AppError> {
    let upem = i64::from(face.units_per_em().max(1));
    let bbox = face.global_bounding_box();

    let mut program = Stream::new(
        dictionary! { "Length1" => font.data.len() as i64 },
        font.data.clone(),
    );
    program
        .compress()
        .map_err(|e| AppError::InternalServerError(format!("font compression failed: {e}")))?;
    let program_id = doc.add_object(program);

    let descriptor_id = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => font.base_name.as_str(),
        "Flags" => 32,
        "FontBBox" => vec![
            scaled(bbox.x_min, upem).into(),
            scaled(bbox.y_min, upem).into(),
            scaled(bbox.x_max, upem).into(),
            scaled(bbox.y_max, upem).into(),
        ],
        "ItalicAngle" => 0,
        "Ascent" => scaled(face.ascender(), upem),
        "Descent" => scaled(face.descender(), upem),
        "CapHeight" => scaled(face.capital_height().unwrap_or(face.ascender()), upem),
        "StemV" => 80,
        "FontFile2" => program_id,
    });

    let mut widths: Vec<Object> = Vec::with_capacity(used.len() * 2);
    for gid in used.keys() {
        let advance = face.glyph_hor_advance(GlyphId(*gid)).unwrap_or(0);
        widths.push(Object::Integer(i64::from(*gid)));
        widths.push(Object::Array(vec![Object::Integer(scaled(advance, upem))]));
    }

    let cid_font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType2",
        "BaseFont" => font.base_name.as_str(),
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Identity"),
            "Supplement" => 0,
        },
        "FontDescriptor" => descriptor_id,
        "CIDToGIDMap" => "Identity",
        "DW" => 1000,
        "W" => widths,
    });

    let to_unicode_id = doc.add_object(Stream::new(dictionary! {}, to_unicode_cmap(used)));

    Ok(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => font.base_name.as_str(),
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![cid_font_id.into()],
        "ToUnicode" => to_unicode_id,
    })
}

/// ToUnicode CMap mapping two-byte glyph codes back to text.
fn to_unicode_cmap(used: &BTreeMap<u16, char>) -> Vec<u8> {
    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );

    let entries: Vec<(&u16, &char)> = used.iter().collect();
    // A bfchar section holds at most 100 entries.
    for chunk in entries.chunks(100) {
        let _ = writeln!(cmap, "{} beginbfchar", chunk.len());
        for (gid, c) in chunk {
            let mut units = [0u16; 2];
            let utf16: String = c
                .encode_utf16(&mut units)
                .iter()
                .map(|unit| format!("{unit:04X}"))
                .collect();
            let _ = writeln!(cmap, "<{gid:04X}> <{utf16}>");
        }
        cmap.push_str("endbfchar\n");
    }

    cmap.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    cmap.into_bytes()
}

fn write_document(
    doc: Document,
    pages: &[Vec<Block>],
    fonts: (ObjectId, ObjectId),
    mut encode: impl FnMut(&str) -> Object,
) -> Result<Vec<u8>, AppError> {
    let content = pages
        .iter()
        .map(|page| page_operations(page, &mut encode))
        .collect();
    finish_document(doc, content, fonts)
}

/// Adds pages, resources and catalog, then serializes the document.
fn finish_document(
    mut doc: Document,
    content: Vec<Vec<Operation>>,
    (regular_id, bold_id): (ObjectId, ObjectId),
) -> Result<Vec<u8>, AppError> {
    let pages_id = doc.new_object_id();
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            Style::Regular.resource_name() => regular_id,
            Style::Bold.resource_name() => bold_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(content.len());
    for operations in content {
        let encoded = Content { operations }
            .encode()
            .map_err(|e| AppError::InternalServerError(format!("PDF encoding failed: {e}")))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| AppError::InternalServerError(format!("PDF write failed: {e}")))?;
    Ok(buffer)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Regular,
    Bold,
}

impl Style {
    fn resource_name(self) -> &'static str {
        match self {
            Style::Regular => "F1",
            Style::Bold => "F2",
        }
    }
}

/// One laid-out line or a vertical gap.
#[derive(Debug, PartialEq)]
enum Block {
    Line { text: String, style: Style, size: i64 },
    Gap(i64),
}

fn layout(questions: &[GeneratedQuestion]) -> Vec<Block> {
    let mut blocks = vec![
        Block::Line {
            text: TITLE.to_string(),
            style: Style::Bold,
            size: TITLE_SIZE,
        },
        Block::Gap(LINE_HEIGHT),
    ];

    for (number, question) in questions.iter().enumerate() {
        let heading = format!("Question {}: {}", number + 1, question.question);
        blocks.extend(wrap(&heading, WRAP_WIDTH).into_iter().map(|text| Block::Line {
            text,
            style: Style::Bold,
            size: BODY_SIZE,
        }));
        blocks.push(Block::Gap(LINE_HEIGHT / 3));

        for (i, option) in question.options.iter().enumerate() {
            let marker = if option.is_correct { "*" } else { "" };
            let text = format!("{}. {}{marker}", option_letter(i), option.text);
            blocks.extend(wrap(&text, WRAP_WIDTH).into_iter().map(|text| Block::Line {
                text,
                style: Style::Regular,
                size: BODY_SIZE,
            }));
        }
        blocks.push(Block::Gap(LINE_HEIGHT / 2));
    }

    blocks
}

fn option_letter(index: usize) -> char {
    (b'A'..=b'Z')
        .nth(index)
        .map(char::from)
        .unwrap_or('?')
}

/// Splits blocks into pages by vertical space. Gaps never start a page.
fn paginate(blocks: Vec<Block>) -> Vec<Vec<Block>> {
    let usable = PAGE_HEIGHT - 2 * MARGIN;
    let mut pages = vec![Vec::new()];
    let mut used = 0;

    for block in blocks {
        let height = match &block {
            Block::Line { size, .. } => (*size).max(LINE_HEIGHT),
            Block::Gap(h) => *h,
        };
        if used + height > usable {
            if matches!(block, Block::Gap(_)) {
                continue;
            }
            pages.push(Vec::new());
            used = 0;
        }
        used += height;
        if let Some(page) = pages.last_mut() {
            page.push(block);
        }
    }

    pages
}

fn page_operations(blocks: &[Block], mut encode: impl FnMut(&str) -> Object) -> Vec<Operation> {
    let mut operations = Vec::new();
    let mut y = PAGE_HEIGHT - MARGIN;

    for block in blocks {
        match block {
            Block::Gap(h) => y -= h,
            Block::Line { text, style, size } => {
                y -= (*size).max(LINE_HEIGHT);
                operations.extend([
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec![style.resource_name().into(), (*size).into()]),
                    Operation::new("Td", vec![MARGIN.into(), y.into()]),
                    Operation::new("Tj", vec![encode(text)]),
                    Operation::new("ET", vec![]),
                ]);
            }
        }
    }

    if operations.is_empty() {
        operations.extend([Operation::new("q", vec![]), Operation::new("Q", vec![])]);
    }
    operations
}

/// Greedy word wrap at `width` characters; words longer than a line are
/// broken.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();

        while word.len() > width {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }

        let needed = if current_len == 0 { word.len() } else { current_len + 1 + word.len() };
        if needed > width {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.extend(word.iter());
        current_len += word.len();
    }

    if current_len > 0 || lines.is_empty() {
        lines.push(current);
    }
    lines
}
