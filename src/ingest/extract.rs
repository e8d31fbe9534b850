//! Per-format text and metadata extraction
//!
//! Every handler takes raw bytes and returns an [`Extracted`]. Handlers never
//! panic; a failure is a message the ingestor wraps into a typed error.

use crate::chunk::PAGE_BREAK;
use crate::document::{code_language, DocumentFormat};
use quick_xml::events::Event;
use quick_xml::Reader;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::io::{Cursor, Read};

/// Largest zip entry read from a Word document
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

const HTTP_METHODS: [&str; 8] = ["get", "put", "post", "delete", "patch", "head", "options", "trace"];

/// Metadata and body text pulled out of one source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extracted {
    pub title: Option<String>,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub text: String,
}

/// Extracts `bytes` as `format`; `extension` is the lowercased file
/// extension, possibly empty
pub fn extract(format: DocumentFormat, bytes: &[u8], extension: &str) -> Result<Extracted, String> {
    match format {
        DocumentFormat::Pdf => extract_pdf(bytes),
        DocumentFormat::Markdown => Ok(extract_markdown(&decode(bytes))),
        DocumentFormat::Html => Ok(extract_html(&decode(bytes))),
        DocumentFormat::Word => extract_docx(bytes),
        DocumentFormat::Plaintext => Ok(Extracted {
            text: decode(bytes),
            ..Extracted::default()
        }),
        DocumentFormat::Code => Ok(Extracted {
            tags: code_language(extension)
                .map(|lang| vec![lang.to_string()])
                .unwrap_or_default(),
            text: decode(bytes),
            ..Extracted::default()
        }),
        DocumentFormat::StructuredApiSpec => extract_api_spec(bytes),
        DocumentFormat::Image => Ok(Extracted {
            tags: std::iter::once("image".to_string())
                .chain((!extension.is_empty()).then(|| extension.to_string()))
                .collect(),
            ..Extracted::default()
        }),
    }
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn non_blank(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ===== HTML =====

pub fn extract_html(html: &str) -> Extracted {
    let document = Html::parse_document(html);

    let title = first_text(&document, "title");
    let author = meta_content(&document, "author");
    let tags = meta_content(&document, "keywords")
        .map(|keywords| {
            keywords
                .split(',')
                .filter_map(non_blank)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    Extracted {
        title,
        author,
        tags,
        text: html_body_text(&document),
    }
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| non_blank(&collapse_whitespace(&el.text().collect::<String>())))
}

fn meta_content(document: &Html, name: &str) -> Option<String> {
    let selector = Selector::parse(&format!("meta[name='{}'][content]", name)).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .and_then(non_blank)
}

/// Headings become `#` lines; paragraphs, list items and preformatted
/// blocks become blank-line separated blocks
fn html_body_text(document: &Html) -> String {
    let Ok(selector) = Selector::parse("h1, h2, h3, h4, h5, h6, p, li, pre") else {
        return String::new();
    };

    let mut blocks = Vec::new();
    for element in document.select(&selector) {
        if inside_block(&element) {
            continue;
        }

        let name = element.value().name();
        let raw: String = element.text().collect();
        let block = match name {
            "pre" => {
                let code = raw.trim_matches('\n').trim_end();
                if code.trim().is_empty() {
                    continue;
                }
                format!("```\n{}\n```", code)
            }
            _ => {
                let text = collapse_whitespace(&raw);
                if text.is_empty() {
                    continue;
                }
                match heading_level(name) {
                    Some(level) => format!("{} {}", "#".repeat(level), text),
                    None if name == "li" => format!("- {}", text),
                    None => text,
                }
            }
        };
        blocks.push(block);
    }

    if blocks.is_empty() {
        return first_text(document, "body").unwrap_or_default();
    }
    blocks.join("\n\n")
}

/// Nested blocks are already covered by their enclosing list item or pre
fn inside_block(element: &ElementRef) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| matches!(ancestor.value().name(), "li" | "pre"))
}

fn heading_level(name: &str) -> Option<usize> {
    match name {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

// ===== Markdown =====

pub fn extract_markdown(content: &str) -> Extracted {
    let content = content.trim_start_matches('\u{feff}');

    if let Some((front_matter, body)) = split_front_matter(content) {
        if let Ok(serde_yaml::Value::Mapping(map)) = serde_yaml::from_str(front_matter) {
            let get = |key: &str| map.get(serde_yaml::Value::String(key.to_string()));
            let title = get("title").and_then(|v| v.as_str()).and_then(non_blank);
            let author = get("author").and_then(|v| v.as_str()).and_then(non_blank);
            let tags = match get("tags") {
                Some(serde_yaml::Value::Sequence(seq)) => seq
                    .iter()
                    .filter_map(|v| v.as_str())
                    .filter_map(non_blank)
                    .collect(),
                Some(serde_yaml::Value::String(s)) => s.split(',').filter_map(non_blank).collect(),
                _ => Vec::new(),
            };
            return Extracted {
                title: title.or_else(|| first_heading(body)),
                author,
                tags,
                text: body.to_string(),
            };
        }
    }

    Extracted {
        title: first_heading(content),
        text: content.to_string(),
        ..Extracted::default()
    }
}

/// Splits `---` delimited front matter from the body
fn split_front_matter(content: &str) -> Option<(&str, &str)> {
    let rest = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let body = &rest[offset + line.len()..];
            return Some((&rest[..offset], body));
        }
        offset += line.len();
    }
    None
}

fn first_heading(content: &str) -> Option<String> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("# "))
        .and_then(non_blank)
}

// ===== PDF =====

/// pdf-extract panics on some malformed files, so the call is isolated
fn extract_pdf(bytes: &[u8]) -> Result<Extracted, String> {
    let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
        .map_err(|_| "PDF parser panicked on malformed input".to_string())?
        .map_err(|e| e.to_string())?;
    Ok(Extracted {
        text: pages.join(&PAGE_BREAK.to_string()),
        ..Extracted::default()
    })
}

// ===== Word =====

fn extract_docx(bytes: &[u8]) -> Result<Extracted, String> {
    if !bytes.starts_with(b"PK") {
        return Err("not a zip container; legacy .doc files are not supported".to_string());
    }

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| e.to_string())?;

    let body_xml = read_zip_entry(&mut archive, "word/document.xml")?
        .ok_or_else(|| "word/document.xml not found".to_string())?;
    let paragraphs = docx_paragraphs(&body_xml)?;

    let (title, author) = match read_zip_entry(&mut archive, "docProps/core.xml")? {
        Some(core) => core_properties(&core)?,
        None => (None, None),
    };

    Ok(Extracted {
        title,
        author,
        tags: Vec::new(),
        text: paragraphs.join("\n\n"),
    })
}

fn read_zip_entry(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Option<Vec<u8>>, String> {
    let entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.to_string()),
    };

    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(|e| e.to_string())?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(format!("{} exceeds size limit", name));
    }
    Ok(Some(out))
}

/// Text of every non-empty `w:p`, runs concatenated
fn docx_paragraphs(xml: &[u8]) -> Result<Vec<String>, String> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    if let Some(p) = non_blank(&current) {
                        paragraphs.push(p);
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"tab" => current.push('\t'),
            Ok(Event::Text(t)) if in_text => {
                current.push_str(&t.unescape().map_err(|e| e.to_string())?);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs)
}

/// `dc:title` and `dc:creator` from `docProps/core.xml`
fn core_properties(xml: &[u8]) -> Result<(Option<String>, Option<String>), String> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut field: Option<&'static str> = None;
    let (mut title, mut creator) = (None, None);

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                field = match e.local_name().as_ref() {
                    b"title" => Some("title"),
                    b"creator" => Some("creator"),
                    _ => None,
                };
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(|e| e.to_string())?;
                match field {
                    Some("title") => title = non_blank(&text),
                    Some("creator") => creator = non_blank(&text),
                    _ => {}
                }
            }
            Ok(Event::End(_)) => field = None,
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }

    Ok((title, creator))
}

// ===== Structured API specs =====

fn extract_api_spec(bytes: &[u8]) -> Result<Extracted, String> {
    let spec: Value = match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(json_err) => serde_yaml::from_slice(bytes)
            .map_err(|yaml_err| format!("neither JSON ({}) nor YAML ({})", json_err, yaml_err))?,
    };

    let version_tag = ["openapi", "swagger"].iter().find_map(|key| {
        spec.get(*key).map(|v| {
            let version = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.to_string(), version)
        })
    });

    let Some((kind, version)) = version_tag else {
        return Ok(Extracted {
            text: serde_json::to_string_pretty(&spec).map_err(|e| e.to_string())?,
            ..Extracted::default()
        });
    };

    let info = spec.get("info");
    let title = info
        .and_then(|i| i.get("title"))
        .and_then(Value::as_str)
        .and_then(non_blank);
    let author = info
        .and_then(|i| i.get("contact"))
        .and_then(|c| c.get("name"))
        .and_then(Value::as_str)
        .and_then(non_blank);

    let mut blocks = Vec::new();
    if let Some(description) = info
        .and_then(|i| i.get("description"))
        .and_then(Value::as_str)
        .and_then(non_blank)
    {
        blocks.push(description);
    }

    if let Some(Value::Object(paths)) = spec.get("paths") {
        for (path, item) in paths {
            for method in HTTP_METHODS {
                let Some(operation) = item.get(method) else {
                    continue;
                };
                let mut lines = vec![format!("{} {}", method.to_uppercase(), path)];
                for key in ["summary", "description"] {
                    if let Some(text) = operation.get(key).and_then(Value::as_str).and_then(non_blank) {
                        lines.push(text);
                    }
                }
                blocks.push(lines.join("\n"));
            }
        }
    }

    Ok(Extracted {
        title,
        author,
        tags: vec![kind, version],
        text: blocks.join("\n\n"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_html_metadata_and_body() {
        let html = r#"<html><head>
            <title> Getting   Started </title>
            <meta name="author" content="Docs Team">
            <meta name="keywords" content="rust, async , ">
            <script>var x = 1;</script>
          </head><body>
            <nav><a href="/">Home</a></nav>
            <h1>Install</h1>
            <p>Run the
               installer.</p>
            <ul><li>Linux <p>nested</p></li><li>macOS</li></ul>
            <pre>fn main() {

    run();
}</pre>
          </body></html>"#;

        let extracted = extract_html(html);
        assert_eq!(extracted.title.as_deref(), Some("Getting Started"));
        assert_eq!(extracted.author.as_deref(), Some("Docs Team"));
        assert_eq!(extracted.tags, vec!["rust", "async"]);
        assert_eq!(
            extracted.text,
            "# Install\n\nRun the installer.\n\n- Linux nested\n\n- macOS\n\n```\nfn main() {\n\n    run();\n}\n```"
        );
        assert!(!extracted.text.contains("var x"));
    }

    #[test]
    fn test_html_without_blocks_uses_body_text() {
        let extracted = extract_html("<html><body><div>Just  a div</div></body></html>");
        assert_eq!(extracted.text, "Just a div");
        assert_eq!(extracted.title, None);
    }

    #[test]
    fn test_markdown_front_matter() {
        let md = "---\ntitle: Router Guide\nauthor: Ada\ntags: [routing, http]\n---\n# Heading\nBody.\n";
        let extracted = extract_markdown(md);
        assert_eq!(extracted.title.as_deref(), Some("Router Guide"));
        assert_eq!(extracted.author.as_deref(), Some("Ada"));
        assert_eq!(extracted.tags, vec!["routing", "http"]);
        assert_eq!(extracted.text, "# Heading\nBody.\n");
    }

    #[test]
    fn test_markdown_heading_title() {
        let extracted = extract_markdown("Intro\n\n# The Title\n\ntext");
        assert_eq!(extracted.title.as_deref(), Some("The Title"));
        assert_eq!(extracted.author, None);

        let extracted = extract_markdown("no heading at all");
        assert_eq!(extracted.title, None);
    }

    #[test]
    fn test_unterminated_front_matter_is_body() {
        let extracted = extract_markdown("---\ntitle: x\nno end");
        assert_eq!(extracted.text, "---\ntitle: x\nno end");
    }

    #[test]
    fn test_openapi_operations() {
        let spec = r#"
openapi: 3.0.1
info:
  title: Pet Store
  description: Pets as a service.
  contact:
    name: API Team
paths:
  /pets:
    get:
      summary: List pets
    post:
      summary: Create a pet
  /pets/{id}:
    delete:
      description: Remove a pet
"#;
        let extracted = extract(DocumentFormat::StructuredApiSpec, spec.as_bytes(), "yaml").unwrap();
        assert_eq!(extracted.title.as_deref(), Some("Pet Store"));
        assert_eq!(extracted.author.as_deref(), Some("API Team"));
        assert_eq!(extracted.tags, vec!["openapi", "3.0.1"]);
        assert_eq!(
            extracted.text,
            "Pets as a service.\n\nGET /pets\nList pets\n\nPOST /pets\nCreate a pet\n\nDELETE /pets/{id}\nRemove a pet"
        );
    }

    #[test]
    fn test_plain_json_is_pretty_printed() {
        let extracted =
            extract(DocumentFormat::StructuredApiSpec, br#"{"name":"x","n":1}"#, "json").unwrap();
        assert!(extracted.tags.is_empty());
        assert!(extracted.text.contains("\"name\": \"x\""));
    }

    #[test]
    fn test_invalid_api_spec_fails() {
        let err = extract(DocumentFormat::StructuredApiSpec, b"{ not: [valid", "json").unwrap_err();
        assert!(err.contains("YAML"));
    }

    #[test]
    fn test_code_and_image_tags() {
        let code = extract(DocumentFormat::Code, b"print(1)", "py").unwrap();
        assert_eq!(code.tags, vec!["python"]);
        assert_eq!(code.text, "print(1)");

        let image = extract(DocumentFormat::Image, &[0x89, 0x50], "png").unwrap();
        assert_eq!(image.tags, vec!["image", "png"]);
        assert!(image.text.is_empty());
    }

    #[test]
    fn test_legacy_doc_is_rejected() {
        let err = extract(DocumentFormat::Word, b"\xD0\xCF\x11\xE0binary", "doc").unwrap_err();
        assert!(err.contains("legacy .doc"));
    }

    fn docx_bytes(document_xml: &str, core_xml: Option<&str>) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut cursor);
            let options = zip::write::SimpleFileOptions::default();
            zip.start_file("word/document.xml", options).unwrap();
            zip.write_all(document_xml.as_bytes()).unwrap();
            if let Some(core) = core_xml {
                zip.start_file("docProps/core.xml", options).unwrap();
                zip.write_all(core.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_docx_paragraphs_and_core_properties() {
        let document = r#"<?xml version="1.0"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p><w:r><w:t>Hello </w:t></w:r><w:r><w:t>world</w:t></w:r></w:p>
<w:p></w:p>
<w:p><w:r><w:t>Second &amp; last</w:t></w:r></w:p>
</w:body></w:document>"#;
        let core = r#"<?xml version="1.0"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/">
<dc:title>Design Notes</dc:title><dc:creator>Grace</dc:creator></cp:coreProperties>"#;

        let extracted = extract(DocumentFormat::Word, &docx_bytes(document, Some(core)), "docx").unwrap();
        assert_eq!(extracted.text, "Hello world\n\nSecond & last");
        assert_eq!(extracted.title.as_deref(), Some("Design Notes"));
        assert_eq!(extracted.author.as_deref(), Some("Grace"));
    }

    #[test]
    fn test_docx_without_core_properties() {
        let document = r#"<w:document xmlns:w="x"><w:body><w:p><w:r><w:t>Only</w:t></w:r></w:p></w:body></w:document>"#;
        let extracted = extract(DocumentFormat::Word, &docx_bytes(document, None), "docx").unwrap();
        assert_eq!(extracted.text, "Only");
        assert_eq!(extracted.title, None);
    }

    #[test]
    fn test_corrupt_pdf_is_error_not_panic() {
        assert!(extract(DocumentFormat::Pdf, b"%PDF-1.4 garbage", "pdf").is_err());
    }
}
