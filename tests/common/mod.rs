#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{Cursor, Write};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use pptx_forge::error::ProviderError;
use pptx_forge::providers::TextGenerator;
use pptx_forge::template::images::Frame;
use pptx_forge::template::inventory;
use pptx_forge::template::package::Package;
use pptx_forge::template::presentation;

const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

pub const API_KEY: &str = "sk-test-0123456789abcdefghijklmnop";

/// A layout to put in a generated template.
#[derive(Clone)]
pub struct LayoutSpec {
    pub name: String,
    pub title: bool,
    pub body: bool,
    /// Body placeholder position as x, y, cx, cy; inherited when `None`
    pub body_frame: Option<[i64; 4]>,
}

pub fn layout(name: &str, title: bool, body: bool) -> LayoutSpec {
    LayoutSpec {
        name: name.to_string(),
        title,
        body,
        body_frame: None,
    }
}

impl LayoutSpec {
    pub fn with_body_frame(mut self, frame: [i64; 4]) -> Self {
        self.body_frame = Some(frame);
        self
    }
}

fn xfrm([x, y, cx, cy]: [i64; 4]) -> String {
    format!(r#"<a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#)
}

/// Builds small but structurally complete templates in memory.
#[derive(Clone)]
pub struct TemplateBuilder {
    layouts: Vec<LayoutSpec>,
    pictures: Vec<Vec<u8>>,
    // picture indices shown on each existing slide
    slides: Vec<Vec<usize>>,
    notes_master: bool,
    notes_master_listed: bool,
    potx: bool,
    slide_size: (i64, i64),
    master_body_frame: Option<[i64; 4]>,
}

impl Default for TemplateBuilder {
    fn default() -> Self {
        Self {
            layouts: vec![
                layout("Title Slide", true, true),
                layout("Title and Content", true, true),
                layout("Section Header", true, true),
                layout("Title Only", true, false),
                layout("Blank", false, false),
            ],
            pictures: Vec::new(),
            slides: Vec::new(),
            notes_master: false,
            notes_master_listed: true,
            potx: false,
            slide_size: (12_192_000, 6_858_000),
            master_body_frame: None,
        }
    }
}

impl TemplateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layouts(mut self, layouts: Vec<LayoutSpec>) -> Self {
        self.layouts = layouts;
        self
    }

    /// Adds `count` distinct pictures, all shown on one existing slide.
    pub fn pictures(mut self, count: usize) -> Self {
        let first = self.pictures.len();
        for i in 0..count {
            self.pictures.push(picture_bytes(first + i));
        }
        self.slides.push((first..first + count).collect());
        self
    }

    /// Adds an existing slide that shows the given pictures.
    pub fn slide_with(mut self, pictures: Vec<usize>) -> Self {
        self.slides.push(pictures);
        self
    }

    pub fn notes_master(mut self) -> Self {
        self.notes_master = true;
        self
    }

    /// A notes master that is related but left out of `notesMasterIdLst`.
    pub fn unlisted_notes_master(mut self) -> Self {
        self.notes_master = true;
        self.notes_master_listed = false;
        self
    }

    /// Gives the slide master a body placeholder at `frame`.
    pub fn master_body_frame(mut self, frame: [i64; 4]) -> Self {
        self.master_body_frame = Some(frame);
        self
    }

    pub fn potx(mut self) -> Self {
        self.potx = true;
        self
    }

    pub fn picture_bytes(&self) -> &[Vec<u8>] {
        &self.pictures
    }

    pub fn build(&self) -> Vec<u8> {
        let mut parts: Vec<(String, String)> = Vec::new();
        let layout_count = self.layouts.len();

        // content types
        let mut types = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/>"#,
        );
        let main_type = if self.potx {
            "application/vnd.openxmlformats-officedocument.presentationml.template.main+xml"
        } else {
            "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"
        };
        types.push_str(&format!(
            r#"<Override PartName="/ppt/presentation.xml" ContentType="{main_type}"/>"#
        ));
        types.push_str(r#"<Override PartName="/ppt/slideMasters/slideMaster1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml"/>"#);
        types.push_str(r#"<Override PartName="/ppt/theme/theme1.xml" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/>"#);
        for i in 1..=layout_count {
            types.push_str(&format!(
                r#"<Override PartName="/ppt/slideLayouts/slideLayout{i}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"/>"#
            ));
        }
        for i in 1..=self.slides.len() {
            types.push_str(&format!(
                r#"<Override PartName="/ppt/slides/slide{i}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>"#
            ));
        }
        if self.notes_master {
            types.push_str(r#"<Override PartName="/ppt/notesMasters/notesMaster1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.notesMaster+xml"/>"#);
            if !self.slides.is_empty() {
                types.push_str(r#"<Override PartName="/ppt/notesSlides/notesSlide1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.notesSlide+xml"/>"#);
            }
        }
        types.push_str("</Types>");
        parts.push(("[Content_Types].xml".into(), types));

        parts.push((
            "_rels/.rels".into(),
            rels(&[("rId1", "officeDocument", "ppt/presentation.xml")]),
        ));

        // presentation
        let mut pres = format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:presentation {NS}>"#);
        pres.push_str(r#"<p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst>"#);
        if self.notes_master && self.notes_master_listed {
            pres.push_str(r#"<p:notesMasterIdLst><p:notesMasterId r:id="rId3"/></p:notesMasterIdLst>"#);
        }
        if !self.slides.is_empty() {
            pres.push_str("<p:sldIdLst>");
            for i in 0..self.slides.len() {
                pres.push_str(&format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 256 + i, 10 + i));
            }
            pres.push_str("</p:sldIdLst>");
        }
        pres.push_str(&format!(
            r#"<p:sldSz cx="{}" cy="{}"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#,
            self.slide_size.0, self.slide_size.1
        ));
        parts.push(("ppt/presentation.xml".into(), pres));

        let mut pres_rels: Vec<(String, &str, String)> = vec![
            ("rId1".into(), "slideMaster", "slideMasters/slideMaster1.xml".into()),
            ("rId2".into(), "theme", "theme/theme1.xml".into()),
        ];
        if self.notes_master {
            pres_rels.push(("rId3".into(), "notesMaster", "notesMasters/notesMaster1.xml".into()));
        }
        for i in 0..self.slides.len() {
            pres_rels.push((format!("rId{}", 10 + i), "slide", format!("slides/slide{}.xml", i + 1)));
        }
        parts.push(("ppt/_rels/presentation.xml.rels".into(), owned_rels(&pres_rels)));

        // master
        let master_shapes = match self.master_body_frame {
            Some(frame) => format!(
                r#"<p:spTree><p:sp><p:nvSpPr><p:cNvPr id="3" name="Text Placeholder 2"/><p:cNvSpPr/><p:nvPr><p:ph type="body" idx="1"/></p:nvPr></p:nvSpPr><p:spPr>{}</p:spPr></p:sp></p:spTree>"#,
                xfrm(frame)
            ),
            None => "<p:spTree/>".to_string(),
        };
        let mut master = format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sldMaster {NS}><p:cSld>{master_shapes}</p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:sldLayoutIdLst>"#);
        for i in 1..=layout_count {
            master.push_str(&format!(r#"<p:sldLayoutId id="{}" r:id="rId{i}"/>"#, 2147483648u64 + i as u64));
        }
        master.push_str("</p:sldLayoutIdLst></p:sldMaster>");
        parts.push(("ppt/slideMasters/slideMaster1.xml".into(), master));

        let mut master_rels: Vec<(String, &str, String)> = (1..=layout_count)
            .map(|i| (format!("rId{i}"), "slideLayout", format!("../slideLayouts/slideLayout{i}.xml")))
            .collect();
        master_rels.push((format!("rId{}", layout_count + 1), "theme", "../theme/theme1.xml".into()));
        parts.push(("ppt/slideMasters/_rels/slideMaster1.xml.rels".into(), owned_rels(&master_rels)));

        // layouts
        for (i, spec) in self.layouts.iter().enumerate() {
            let mut xml = format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sldLayout {NS}><p:cSld name="{}"><p:spTree>"#,
                spec.name
            );
            if spec.title {
                xml.push_str(r#"<p:sp><p:nvSpPr><p:cNvPr id="2" name="Title 1"/><p:cNvSpPr/><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr><p:spPr/></p:sp>"#);
            }
            if spec.body {
                let sp_pr = match spec.body_frame {
                    Some(frame) => format!("<p:spPr>{}</p:spPr>", xfrm(frame)),
                    None => "<p:spPr/>".to_string(),
                };
                xml.push_str(&format!(
                    r#"<p:sp><p:nvSpPr><p:cNvPr id="3" name="Content Placeholder 2"/><p:cNvSpPr/><p:nvPr><p:ph idx="1"/></p:nvPr></p:nvSpPr>{sp_pr}</p:sp>"#
                ));
            }
            xml.push_str(r#"<p:sp><p:nvSpPr><p:cNvPr id="4" name="Slide Number"/><p:cNvSpPr/><p:nvPr><p:ph type="sldNum" sz="quarter" idx="12"/></p:nvPr></p:nvSpPr><p:spPr/></p:sp>"#);
            xml.push_str("</p:spTree></p:cSld></p:sldLayout>");
            parts.push((format!("ppt/slideLayouts/slideLayout{}.xml", i + 1), xml));
            parts.push((
                format!("ppt/slideLayouts/_rels/slideLayout{}.xml.rels", i + 1),
                rels(&[("rId1", "slideMaster", "../slideMasters/slideMaster1.xml")]),
            ));
        }

        parts.push((
            "ppt/theme/theme1.xml".into(),
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Test Theme"><a:themeElements/></a:theme>"#.into(),
        ));

        if self.notes_master {
            parts.push((
                "ppt/notesMasters/notesMaster1.xml".into(),
                pptx_forge::template::xml::notes_master_xml(),
            ));
            parts.push((
                "ppt/notesMasters/_rels/notesMaster1.xml.rels".into(),
                rels(&[("rId1", "theme", "../theme/theme1.xml")]),
            ));
        }

        // existing slides
        for (s, shown) in self.slides.iter().enumerate() {
            let mut xml = format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sld {NS}><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>"#
            );
            xml.push_str(&format!(
                r#"<p:sp><p:nvSpPr><p:cNvPr id="2" name="Title 1"/><p:cNvSpPr/><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:p><a:r><a:t>OLD SLIDE {}</a:t></a:r></a:p></p:txBody></p:sp>"#,
                s + 1
            ));
            let mut slide_rels: Vec<(String, &str, String)> =
                vec![("rId1".into(), "slideLayout", "../slideLayouts/slideLayout1.xml".into())];
            for (k, picture) in shown.iter().enumerate() {
                let rid = format!("rId{}", k + 2);
                xml.push_str(&format!(
                    r#"<p:pic><p:nvPicPr><p:cNvPr id="{}" name="Picture {}"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="{rid}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{}" cy="1000000"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#,
                    k + 3,
                    k + 1,
                    1_000_000 + 500_000 * (*picture as i64 % 3)
                ));
                slide_rels.push((rid, "image", format!("../media/image{}.png", picture + 1)));
            }
            xml.push_str("</p:spTree></p:cSld></p:sld>");
            if self.notes_master && s == 0 {
                slide_rels.push((
                    format!("rId{}", shown.len() + 2),
                    "notesSlide",
                    "../notesSlides/notesSlide1.xml".into(),
                ));
                parts.push((
                    "ppt/notesSlides/notesSlide1.xml".into(),
                    pptx_forge::template::xml::notes_slide_xml("OLD NOTES").unwrap_or_default(),
                ));
                parts.push((
                    "ppt/notesSlides/_rels/notesSlide1.xml.rels".into(),
                    rels(&[
                        ("rId1", "notesMaster", "../notesMasters/notesMaster1.xml"),
                        ("rId2", "slide", "../slides/slide1.xml"),
                    ]),
                ));
            }
            parts.push((format!("ppt/slides/slide{}.xml", s + 1), xml));
            parts.push((
                format!("ppt/slides/_rels/slide{}.xml.rels", s + 1),
                owned_rels(&slide_rels),
            ));
        }

        let mut binary: Vec<(String, Vec<u8>)> =
            parts.into_iter().map(|(n, x)| (n, x.into_bytes())).collect();
        for (i, bytes) in self.pictures.iter().enumerate() {
            binary.push((format!("ppt/media/image{}.png", i + 1), bytes.clone()));
        }
        zip_parts(&binary)
    }
}

/// Distinct fake image payload for picture `i`.
pub fn picture_bytes(i: usize) -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend(std::iter::repeat_n(i as u8, 64 + i));
    bytes
}

pub fn zip_parts(parts: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, data) in parts {
        writer.start_file(name.as_str(), options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn rels(entries: &[(&str, &str, &str)]) -> String {
    let owned: Vec<(String, &str, String)> = entries
        .iter()
        .map(|(id, kind, target)| (id.to_string(), *kind, target.to_string()))
        .collect();
    owned_rels(&owned)
}

fn owned_rels(entries: &[(String, &str, String)]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for (id, kind, target) in entries {
        xml.push_str(&format!(
            r#"<Relationship Id="{id}" Type="{REL_NS}/{kind}" Target="{target}"/>"#
        ));
    }
    xml.push_str("</Relationships>");
    xml
}

/// Output deck opened for assertions.
pub struct Deck {
    pub package: Package,
    pub main_part: String,
    pub slide_parts: Vec<String>,
}

impl Deck {
    pub fn open(bytes: &[u8]) -> Self {
        let package = Package::from_bytes(bytes).unwrap();
        let main_part = package.main_part_name().unwrap();
        let info = presentation::read_info(package.get(&main_part).unwrap()).unwrap();
        let slide_parts = inventory::slide_parts(&package, &main_part, &info).unwrap();
        Self {
            package,
            main_part,
            slide_parts,
        }
    }

    pub fn slide_xml(&self, index: usize) -> String {
        self.text(&self.slide_parts[index])
    }

    pub fn text(&self, part: &str) -> String {
        String::from_utf8(self.package.get(part).unwrap().to_vec()).unwrap()
    }

    pub fn slide_rels(&self, index: usize) -> pptx_forge::template::package::Relationships {
        self.package.relationships(&self.slide_parts[index]).unwrap()
    }

    /// Position of the first picture on a slide.
    pub fn picture_frame(&self, index: usize) -> Option<Frame> {
        let xml = self.slide_xml(index);
        let pic = &xml[xml.find("<p:pic>")?..];
        let number = |key: &str| -> i64 {
            let start = pic.find(key).unwrap() + key.len();
            pic[start..].split('"').next().unwrap().parse().unwrap()
        };
        Some(Frame {
            x: number(r#" x=""#),
            y: number(r#" y=""#),
            cx: number(r#" cx=""#),
            cy: number(r#" cy=""#),
        })
    }

    pub fn contains_text_anywhere(&self, needle: &str) -> bool {
        self.package
            .part_names()
            .filter(|n| n.ends_with(".xml"))
            .any(|n| self.text(n).contains(needle))
    }
}

/// Provider that replays canned replies and counts calls.
pub struct Scripted {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    calls: AtomicUsize,
}

impl Scripted {
    pub fn new(replies: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn replying(reply: &str) -> Self {
        Self::new(vec![Ok(reply.to_string())])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for Scripted {
    async fn generate(&self, _prompt: &str, _model: Option<&str>) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ProviderError::MalformedResponse))
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}
