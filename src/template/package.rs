//! In-memory OPC package: ordered parts, content types and relationships.

use std::io::{Cursor, Read, Write};

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::PackageError;

pub type Result<T> = std::result::Result<T, PackageError>;

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub const ROOT_RELS_PART: &str = "_rels/.rels";

/// Most bytes a template may unpack to.
pub const MAX_UNPACKED_BYTES: u64 = 128 * 1024 * 1024;

/// Relationship type URIs.
pub mod rel_type {
    pub const OFFICE_DOCUMENT: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
    pub const SLIDE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
    pub const SLIDE_LAYOUT: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";
    pub const SLIDE_MASTER: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster";
    pub const NOTES_SLIDE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/notesSlide";
    pub const NOTES_MASTER: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/notesMaster";
    pub const THEME: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme";
    pub const IMAGE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
}

/// Content type strings.
pub mod content_type {
    pub const PRESENTATION_MAIN: &str =
        "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml";
    pub const TEMPLATE_MAIN: &str =
        "application/vnd.openxmlformats-officedocument.presentationml.template.main+xml";
    pub const SLIDE: &str = "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";
    pub const NOTES_SLIDE: &str =
        "application/vnd.openxmlformats-officedocument.presentationml.notesSlide+xml";
    pub const NOTES_MASTER: &str =
        "application/vnd.openxmlformats-officedocument.presentationml.notesMaster+xml";
    pub const THEME: &str = "application/vnd.openxmlformats-officedocument.theme+xml";
}

#[derive(Debug)]
struct PartEntry {
    name: String,
    data: Vec<u8>,
}

/// All parts of a package, kept in archive order.
#[derive(Debug)]
pub struct Package {
    parts: Vec<PartEntry>,
}

impl Package {
    /// Reads every entry of a ZIP archive into memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes_limited(bytes, MAX_UNPACKED_BYTES)
    }

    /// Like [`Package::from_bytes`], failing once the entries unpack to more
    /// than `limit` bytes in total.
    pub fn from_bytes_limited(bytes: &[u8], limit: u64) -> Result<Self> {
        let too_large = || PackageError::InvalidFormat(format!("archive unpacks to more than {limit} bytes"));

        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut parts = Vec::with_capacity(archive.len());
        let mut remaining = limit;
        for i in 0..archive.len() {
            let file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            // Declared size first, then what actually comes out
            if file.size() > remaining {
                return Err(too_large());
            }
            let name = file.name().trim_start_matches('/').to_string();
            let mut data = Vec::with_capacity(file.size() as usize);
            file.take(remaining + 1).read_to_end(&mut data)?;
            remaining = remaining
                .checked_sub(data.len() as u64)
                .ok_or_else(too_large)?;
            parts.push(PartEntry { name, data });
        }
        if !parts.iter().any(|p| p.name == CONTENT_TYPES_PART) {
            return Err(PackageError::PartNotFound(CONTENT_TYPES_PART.into()));
        }
        Ok(Self { parts })
    }

    /// Serializes the package to a deflated ZIP archive.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        // Content types conventionally come first
        let ordered = self
            .parts
            .iter()
            .filter(|p| p.name == CONTENT_TYPES_PART)
            .chain(self.parts.iter().filter(|p| p.name != CONTENT_TYPES_PART));
        for part in ordered {
            writer.start_file(part.name.as_str(), options)?;
            writer.write_all(&part.data)?;
        }
        Ok(writer.finish()?.into_inner())
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.data.as_slice())
    }

    pub fn require(&self, name: &str) -> Result<&[u8]> {
        self.get(name)
            .ok_or_else(|| PackageError::PartNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Inserts or replaces a part.
    pub fn set(&mut self, name: &str, data: Vec<u8>) {
        match self.parts.iter_mut().find(|p| p.name == name) {
            Some(part) => part.data = data,
            None => self.parts.push(PartEntry {
                name: name.to_string(),
                data,
            }),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
        let pos = self.parts.iter().position(|p| p.name == name)?;
        Some(self.parts.remove(pos).data)
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|p| p.name.as_str())
    }

    /// First free name of the form `{prefix}{n}{suffix}`, counting from 1.
    pub fn next_free_name(&self, prefix: &str, suffix: &str) -> String {
        (1..)
            .map(|n| format!("{prefix}{n}{suffix}"))
            .find(|candidate| !self.contains(candidate))
            .unwrap_or_else(|| format!("{prefix}0{suffix}"))
    }

    /// Relationships of `part`, empty when the part has no rels file.
    pub fn relationships(&self, part: &str) -> Result<Relationships> {
        match self.get(&rels_path(part)) {
            Some(xml) => Relationships::parse(xml),
            None => Ok(Relationships::default()),
        }
    }

    pub fn set_relationships(&mut self, part: &str, rels: &Relationships) {
        self.set(&rels_path(part), rels.to_xml().into_bytes());
    }

    pub fn content_types(&self) -> Result<ContentTypes> {
        ContentTypes::parse(self.require(CONTENT_TYPES_PART)?)
    }

    pub fn set_content_types(&mut self, types: &ContentTypes) {
        self.set(CONTENT_TYPES_PART, types.to_xml().into_bytes());
    }

    /// Name of the main presentation part, found through the root relationships.
    pub fn main_part_name(&self) -> Result<String> {
        let rels = self.relationships_at(ROOT_RELS_PART)?;
        rels.find_by_type(rel_type::OFFICE_DOCUMENT)
            .map(|r| resolve_target("", &r.target))
            .ok_or_else(|| PackageError::InvalidFormat("no main document relationship".into()))
    }

    fn relationships_at(&self, rels_part: &str) -> Result<Relationships> {
        Relationships::parse(self.require(rels_part)?)
    }
}

/// `ppt/slides/slide1.xml` -> `ppt/slides/_rels/slide1.xml.rels`
pub fn rels_path(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Directory portion of a part name, without trailing slash.
pub fn part_dir(part: &str) -> &str {
    part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Resolves a relationship target against the source part's directory.
pub fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for seg in target.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Relative target from a directory to a part, as written in rels files.
pub fn relative_target(from_dir: &str, to_part: &str) -> String {
    let from: Vec<&str> = from_dir.split('/').filter(|s| !s.is_empty()).collect();
    let to: Vec<&str> = to_part.split('/').filter(|s| !s.is_empty()).collect();
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();
    let mut out: Vec<&str> = vec![".."; from.len() - common];
    out.extend(&to[common..]);
    out.join("/")
}

/// Reads an attribute by local name, unescaped.
pub(crate) fn attr(e: &BytesStart<'_>, local: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == local)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

/// Contents of one `.rels` part.
#[derive(Debug, Clone, Default)]
pub struct Relationships {
    rels: Vec<Relationship>,
}

impl Relationships {
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);
        let mut rels = Vec::new();
        loop {
            match reader.read_event()? {
                Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                    let (Some(id), Some(rel_type), Some(target)) =
                        (attr(&e, b"Id"), attr(&e, b"Type"), attr(&e, b"Target"))
                    else {
                        continue;
                    };
                    let external = attr(&e, b"TargetMode").as_deref() == Some("External");
                    rels.push(Relationship {
                        id,
                        rel_type,
                        target,
                        external,
                    });
                }
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(Self { rels })
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(256 + self.rels.len() * 160);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        for rel in &self.rels {
            xml.push_str(&format!(
                r#"<Relationship Id="{}" Type="{}" Target="{}""#,
                escape(rel.id.as_str()),
                escape(rel.rel_type.as_str()),
                escape(rel.target.as_str())
            ));
            if rel.external {
                xml.push_str(r#" TargetMode="External""#);
            }
            xml.push_str("/>");
        }
        xml.push_str("</Relationships>");
        xml
    }

    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.rels.iter().find(|r| r.id == id)
    }

    pub fn find_by_type(&self, rel_type: &str) -> Option<&Relationship> {
        self.rels.iter().find(|r| r.rel_type == rel_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.rels.iter()
    }

    /// Adds an internal relationship under a fresh `rIdN` and returns the id.
    pub fn add(&mut self, rel_type: &str, target: &str) -> String {
        let next = self
            .rels
            .iter()
            .filter_map(|r| r.id.strip_prefix("rId")?.parse::<u32>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        let id = format!("rId{next}");
        self.rels.push(Relationship {
            id: id.clone(),
            rel_type: rel_type.to_string(),
            target: target.to_string(),
            external: false,
        });
        id
    }

    pub fn remove(&mut self, id: &str) -> Option<Relationship> {
        let pos = self.rels.iter().position(|r| r.id == id)?;
        Some(self.rels.remove(pos))
    }

    pub fn len(&self) -> usize {
        self.rels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }
}

/// `[Content_Types].xml`: extension defaults and per-part overrides.
#[derive(Debug, Clone, Default)]
pub struct ContentTypes {
    defaults: Vec<(String, String)>,
    overrides: Vec<(String, String)>,
}

impl ContentTypes {
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);
        let mut types = Self::default();
        loop {
            match reader.read_event()? {
                Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                    b"Default" => {
                        if let (Some(ext), Some(ct)) = (attr(&e, b"Extension"), attr(&e, b"ContentType")) {
                            types.defaults.push((ext.to_ascii_lowercase(), ct));
                        }
                    }
                    b"Override" => {
                        if let (Some(name), Some(ct)) = (attr(&e, b"PartName"), attr(&e, b"ContentType")) {
                            types
                                .overrides
                                .push((name.trim_start_matches('/').to_string(), ct));
                        }
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(types)
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(512 + self.overrides.len() * 160);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#);
        for (ext, ct) in &self.defaults {
            xml.push_str(&format!(
                r#"<Default Extension="{}" ContentType="{}"/>"#,
                escape(ext.as_str()),
                escape(ct.as_str())
            ));
        }
        for (name, ct) in &self.overrides {
            xml.push_str(&format!(
                r#"<Override PartName="/{}" ContentType="{}"/>"#,
                escape(name.as_str()),
                escape(ct.as_str())
            ));
        }
        xml.push_str("</Types>");
        xml
    }

    /// Content type of `part`, override first, then extension default.
    pub fn get(&self, part: &str) -> Option<&str> {
        if let Some((_, ct)) = self.overrides.iter().find(|(n, _)| n == part) {
            return Some(ct);
        }
        let ext = part.rsplit_once('.')?.1.to_ascii_lowercase();
        self.defaults
            .iter()
            .find(|(e, _)| *e == ext)
            .map(|(_, ct)| ct.as_str())
    }

    pub fn set_override(&mut self, part: &str, content_type: &str) {
        match self.overrides.iter_mut().find(|(n, _)| n == part) {
            Some(entry) => entry.1 = content_type.to_string(),
            None => self
                .overrides
                .push((part.to_string(), content_type.to_string())),
        }
    }

    pub fn remove_override(&mut self, part: &str) {
        self.overrides.retain(|(n, _)| n != part);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rels_paths() {
        assert_eq!(rels_path("ppt/slides/slide1.xml"), "ppt/slides/_rels/slide1.xml.rels");
        assert_eq!(rels_path("ppt/presentation.xml"), "ppt/_rels/presentation.xml.rels");
    }

    #[test]
    fn resolves_relative_and_absolute_targets() {
        assert_eq!(resolve_target("ppt/slides", "../media/image1.png"), "ppt/media/image1.png");
        assert_eq!(resolve_target("ppt", "slides/slide2.xml"), "ppt/slides/slide2.xml");
        assert_eq!(resolve_target("", "ppt/presentation.xml"), "ppt/presentation.xml");
        assert_eq!(resolve_target("ppt/slides", "/ppt/media/a.jpeg"), "ppt/media/a.jpeg");
    }

    #[test]
    fn relative_targets_walk_up() {
        assert_eq!(relative_target("ppt/slides", "ppt/media/image3.png"), "../media/image3.png");
        assert_eq!(relative_target("ppt", "ppt/slides/slide1.xml"), "slides/slide1.xml");
        assert_eq!(
            relative_target("ppt/notesSlides", "ppt/slides/slide4.xml"),
            "../slides/slide4.xml"
        );
    }

    #[test]
    fn relationships_roundtrip_and_fresh_ids() {
        let xml = br#"<?xml version="1.0"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="t/slideLayout" Target="../slideLayouts/slideLayout2.xml"/><Relationship Id="rId7" Type="t/hyperlink" Target="https://a.example/?x=1&amp;y=2" TargetMode="External"/></Relationships>"#;
        let mut rels = Relationships::parse(xml).unwrap();
        assert_eq!(rels.len(), 2);
        assert!(rels.get("rId7").unwrap().external);
        assert_eq!(rels.get("rId7").unwrap().target, "https://a.example/?x=1&y=2");
        assert_eq!(rels.add("t/image", "../media/image1.png"), "rId8");

        let reparsed = Relationships::parse(rels.to_xml().as_bytes()).unwrap();
        assert_eq!(reparsed.len(), 3);
        assert_eq!(reparsed.get("rId7").unwrap().target, "https://a.example/?x=1&y=2");
    }

    #[test]
    fn content_type_lookup_prefers_override() {
        let xml = br#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="PNG" ContentType="image/png"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/ppt/presentation.xml" ContentType="main"/></Types>"#;
        let mut types = ContentTypes::parse(xml).unwrap();
        assert_eq!(types.get("ppt/presentation.xml"), Some("main"));
        assert_eq!(types.get("ppt/media/image1.png"), Some("image/png"));
        assert_eq!(types.get("ppt/other.xml"), Some("application/xml"));
        types.set_override("ppt/slides/slide1.xml", content_type::SLIDE);
        types.remove_override("ppt/presentation.xml");
        let reparsed = ContentTypes::parse(types.to_xml().as_bytes()).unwrap();
        assert_eq!(reparsed.get("ppt/slides/slide1.xml"), Some(content_type::SLIDE));
        assert_eq!(reparsed.get("ppt/presentation.xml"), Some("application/xml"));
    }

    #[test]
    fn garbage_is_not_a_package() {
        assert!(Package::from_bytes(b"definitely not a zip").is_err());
    }

    fn deflated(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn unpacked_size_is_capped() {
        let types = br#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#.to_vec();
        let bomb = deflated(&[
            (CONTENT_TYPES_PART, types.clone()),
            ("ppt/media/zeros.bin", vec![0u8; 4 * 1024 * 1024]),
        ]);
        assert!(bomb.len() < 64 * 1024);

        let err = Package::from_bytes_limited(&bomb, 1024 * 1024).unwrap_err();
        assert!(matches!(err, PackageError::InvalidFormat(_)), "{err}");

        // Several entries that each fit but add up past the limit
        let spread = deflated(&[
            (CONTENT_TYPES_PART, types.clone()),
            ("a.bin", vec![0u8; 600 * 1024]),
            ("b.bin", vec![0u8; 600 * 1024]),
        ]);
        assert!(Package::from_bytes_limited(&spread, 1024 * 1024).is_err());

        let small = deflated(&[(CONTENT_TYPES_PART, types), ("a.bin", vec![0u8; 1024])]);
        let package = Package::from_bytes_limited(&small, 1024 * 1024).unwrap();
        assert_eq!(package.get("a.bin").map(<[u8]>::len), Some(1024));
    }
}
