use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use html2text::from_read;
use pulldown_cmark::{html, Parser};
use quick_xml::events::Event;
use quick_xml::Reader;
use zip::ZipArchive;

use crate::error::{DocQaError, Result};

pub const SUPPORTED_EXTENSIONS: [&str; 8] =
    ["txt", "text", "md", "markdown", "html", "htm", "pdf", "docx"];

/// Reads a source file into plain text.
pub trait TextExtractor {
    fn extract(&self, path: &Path) -> Result<String>;
}

/// Extension-dispatching extractor for the formats in [`SUPPORTED_EXTENSIONS`].
#[derive(Debug, Default, Clone, Copy)]
pub struct FileExtractor;

impl FileExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn supports(path: &Path) -> bool {
        extension(path)
            .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
    }
}

impl TextExtractor for FileExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        match extension(path).as_deref() {
            Some("txt") | Some("text") => read_text_lossy(path),
            Some("md") | Some("markdown") => Ok(markdown_to_text(&read_text_lossy(path)?)),
            Some("html") | Some("htm") => Ok(html_to_plaintext(&read_text_lossy(path)?)),
            Some("pdf") => pdf_to_text(path),
            Some("docx") => docx_to_text(path),
            _ => Err(DocQaError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
}

fn read_text_lossy(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).to_string())
}

fn markdown_to_text(md: &str) -> String {
    let mut html_buf = String::new();
    html::push_html(&mut html_buf, Parser::new(md));
    html_to_plaintext(&html_buf)
}

fn html_to_plaintext(html_src: &str) -> String {
    from_read(html_src.as_bytes(), 100)
}

fn pdf_to_text(path: &Path) -> Result<String> {
    let pages = pdf_extract::extract_text_by_pages(path)
        .map_err(|e| DocQaError::Pdf(format!("{}: {e}", path.display())))?;
    let mut text = String::new();
    for page in pages.iter().filter(|page| !page.is_empty()) {
        text.push_str(page);
        text.push('\n');
    }
    Ok(text)
}

fn docx_to_text(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file)?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")?
        .read_to_string(&mut xml)?;
    document_xml_to_text(&xml)
}

/// One output line per `w:p` paragraph, built from its `w:t` runs.
fn document_xml_to_text(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_run_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"w:t" => in_run_text = true,
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"w:t" => in_run_text = false,
                b"w:p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"w:tab" => current.push('\t'),
                b"w:br" | b"w:cr" => current.push('\n'),
                b"w:p" => paragraphs.push(String::new()),
                _ => {}
            },
            Ok(Event::Text(e)) if in_run_text => {
                let text = e
                    .unescape()
                    .map_err(|err| DocQaError::Docx(err.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(DocQaError::Docx(err.to_string())),
            _ => {}
        }
        buf.clear();
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }
    Ok(paragraphs.join("\n"))
}
