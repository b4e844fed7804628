//! Read-only view of what a template offers: layouts and reusable pictures.

use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use super::images::Frame;
use super::package::{Package, Result, attr, part_dir, rel_type, resolve_target};
use super::presentation::PresentationInfo;

/// Placeholder kinds the renderer fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderRole {
    Title,
    Body,
}

/// A placeholder as declared on a layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub role: PlaceholderRole,
    /// Raw `type` attribute (`title`, `ctrTitle`, `body`, `obj`...), if any
    pub ph_type: Option<String>,
    pub idx: Option<u32>,
    /// Position declared by the layout, or inherited from its master
    pub frame: Option<Frame>,
}

// Office 16:9 title and content placeholders, scaled to other slide sizes
const REFERENCE_SLIDE: (i64, i64) = (12_192_000, 6_858_000);
const REFERENCE_TITLE: (i64, i64, i64, i64) = (838_200, 365_125, 10_515_600, 1_325_563);
const REFERENCE_BODY: (i64, i64, i64, i64) = (838_200, 1_825_625, 10_515_600, 4_351_338);

impl Placeholder {
    /// Where the placeholder sits on a slide of the given size.
    ///
    /// Falls back to PowerPoint's default geometry when neither the layout
    /// nor its master says.
    pub fn frame_on(&self, slide_cx: i64, slide_cy: i64) -> Frame {
        self.frame.unwrap_or_else(|| {
            let (x, y, cx, cy) = match self.role {
                PlaceholderRole::Title => REFERENCE_TITLE,
                PlaceholderRole::Body => REFERENCE_BODY,
            };
            Frame {
                x: x * slide_cx / REFERENCE_SLIDE.0,
                y: y * slide_cy / REFERENCE_SLIDE.1,
                cx: cx * slide_cx / REFERENCE_SLIDE.0,
                cy: cy * slide_cy / REFERENCE_SLIDE.1,
            }
        })
    }
}

/// One slide layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutInfo {
    pub name: String,
    pub part_name: String,
    pub title: Option<Placeholder>,
    pub body: Option<Placeholder>,
}

/// A picture found on one of the template's slides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplatePicture {
    /// 0-based index of the slide it was found on
    pub slide_index: usize,
    /// Media part holding the bytes
    pub part_name: String,
    pub bytes: Vec<u8>,
    /// Size on the original slide, in EMU, when declared
    pub extent: Option<(i64, i64)>,
}

/// Layouts and pictures of an uploaded template.
#[derive(Debug, Clone, Default)]
pub struct TemplateInventory {
    pub layouts: Vec<LayoutInfo>,
    pub pictures: Vec<TemplatePicture>,
}

impl TemplateInventory {
    pub fn layout_names(&self) -> Vec<&str> {
        self.layouts.iter().map(|l| l.name.as_str()).collect()
    }
}

/// Builds the inventory from an opened package.
pub fn build(
    package: &Package,
    main_part: &str,
    info: &PresentationInfo,
) -> Result<TemplateInventory> {
    let mut layouts = collect_layouts(package, main_part, info)?;
    inherit_master_frames(package, &mut layouts)?;
    let slide_parts = slide_parts(package, main_part, info)?;

    let mut pictures = Vec::new();
    for (slide_index, slide_part) in slide_parts.iter().enumerate() {
        pictures.extend(collect_pictures(package, slide_part, slide_index)?);
    }
    debug!(layouts = layouts.len(), pictures = pictures.len(), "template inventoried");

    Ok(TemplateInventory { layouts, pictures })
}

/// Existing slide part names, in presentation order.
pub fn slide_parts(package: &Package, main_part: &str, info: &PresentationInfo) -> Result<Vec<String>> {
    let rels = package.relationships(main_part)?;
    let base = part_dir(main_part);
    Ok(info
        .slide_rel_ids
        .iter()
        .filter_map(|rid| rels.get(rid))
        .map(|rel| resolve_target(base, &rel.target))
        .filter(|part| package.contains(part))
        .collect())
}

// Layouts in master order, each master in its sldLayoutIdLst order
fn collect_layouts(
    package: &Package,
    main_part: &str,
    info: &PresentationInfo,
) -> Result<Vec<LayoutInfo>> {
    let pres_rels = package.relationships(main_part)?;
    let base = part_dir(main_part);

    let mut layout_parts: Vec<String> = Vec::new();
    for master_rid in &info.master_rel_ids {
        let Some(rel) = pres_rels.get(master_rid) else {
            continue;
        };
        let master_part = resolve_target(base, &rel.target);
        let Some(master_xml) = package.get(&master_part) else {
            continue;
        };
        let master_rels = package.relationships(&master_part)?;
        for layout_rid in layout_rel_ids(master_xml)? {
            if let Some(layout_rel) = master_rels.get(&layout_rid) {
                let part = resolve_target(part_dir(&master_part), &layout_rel.target);
                if !layout_parts.contains(&part) {
                    layout_parts.push(part);
                }
            }
        }
    }

    // Masters without a layout list: fall back to part-name order
    if layout_parts.is_empty() {
        let mut found: Vec<(u32, String)> = package
            .part_names()
            .filter(|n| n.starts_with("ppt/slideLayouts/slideLayout") && n.ends_with(".xml"))
            .map(|n| (trailing_number(n), n.to_string()))
            .collect();
        found.sort();
        layout_parts = found.into_iter().map(|(_, n)| n).collect();
    }

    layout_parts
        .into_iter()
        .filter_map(|part| package.get(&part).map(|xml| (part.clone(), xml)))
        .map(|(part, xml)| parse_layout(&part, xml))
        .collect()
}

fn trailing_number(name: &str) -> u32 {
    let stem = name.trim_end_matches(".xml");
    let digits = stem.len() - stem.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    stem[stem.len() - digits..].parse().unwrap_or(u32::MAX)
}

fn layout_rel_ids(master_xml: &[u8]) -> Result<Vec<String>> {
    let mut reader = Reader::from_reader(master_xml);
    reader.config_mut().trim_text(true);
    let mut ids = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sldLayoutId" => {
                if let Some(rid) = prefixed_id(&e) {
                    ids.push(rid);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(ids)
}

fn prefixed_id(e: &BytesStart<'_>) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.prefix().is_some() && a.key.local_name().as_ref() == b"id")
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

// Layout placeholders without their own xfrm take the master's
fn inherit_master_frames(package: &Package, layouts: &mut [LayoutInfo]) -> Result<()> {
    let mut masters: HashMap<String, MasterFrames> = HashMap::new();
    for layout in layouts.iter_mut() {
        let rels = package.relationships(&layout.part_name)?;
        let Some(rel) = rels.find_by_type(rel_type::SLIDE_MASTER) else {
            continue;
        };
        let master_part = resolve_target(part_dir(&layout.part_name), &rel.target);
        if !masters.contains_key(&master_part) {
            let frames = match package.get(&master_part) {
                Some(xml) => parse_master_frames(xml)?,
                None => MasterFrames::default(),
            };
            masters.insert(master_part.clone(), frames);
        }
        let Some(frames) = masters.get(&master_part) else {
            continue;
        };
        if let Some(ph) = layout.title.as_mut() {
            ph.frame = ph.frame.or(frames.title);
        }
        if let Some(ph) = layout.body.as_mut() {
            ph.frame = ph.frame.or(frames.body);
        }
    }
    Ok(())
}

/// Title and body placeholder positions on a slide master.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MasterFrames {
    pub title: Option<Frame>,
    pub body: Option<Frame>,
}

pub fn parse_master_frames(xml: &[u8]) -> Result<MasterFrames> {
    let (_, shapes) = scan_placeholders(xml)?;
    let mut frames = MasterFrames::default();
    for shape in shapes {
        let slot = match classify(shape.ph_type.as_deref()) {
            Some(PlaceholderRole::Title) => &mut frames.title,
            Some(PlaceholderRole::Body) => &mut frames.body,
            None => continue,
        };
        if slot.is_none() {
            *slot = shape.frame;
        }
    }
    Ok(frames)
}

/// Reads a layout's name and its title/body placeholders.
pub fn parse_layout(part_name: &str, xml: &[u8]) -> Result<LayoutInfo> {
    let (mut name, shapes) = scan_placeholders(xml)?;

    let mut title = None;
    let mut body = None;
    for shape in shapes {
        let placeholder = |role| Placeholder {
            role,
            ph_type: shape.ph_type.clone(),
            idx: shape.idx,
            frame: shape.frame,
        };
        match classify(shape.ph_type.as_deref()) {
            Some(PlaceholderRole::Title) if title.is_none() => {
                title = Some(placeholder(PlaceholderRole::Title));
            }
            Some(PlaceholderRole::Body) if body.is_none() => {
                body = Some(placeholder(PlaceholderRole::Body));
            }
            _ => {}
        }
    }

    if name.is_empty() {
        name = part_name
            .rsplit('/')
            .next()
            .unwrap_or(part_name)
            .trim_end_matches(".xml")
            .to_string();
    }

    Ok(LayoutInfo {
        name,
        part_name: part_name.to_string(),
        title,
        body,
    })
}

// A placeholder shape of a layout or master
struct PlaceholderShape {
    ph_type: Option<String>,
    idx: Option<u32>,
    frame: Option<Frame>,
}

// The `cSld` name plus every top-level placeholder shape, in document order
fn scan_placeholders(xml: &[u8]) -> Result<(String, Vec<PlaceholderShape>)> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut name = String::new();
    let mut shapes = Vec::new();
    let mut sp_depth = 0usize;
    let mut in_sp_pr = false;
    let mut in_xfrm = false;
    let mut ph: Option<(Option<String>, Option<u32>)> = None;
    let mut off: Option<(i64, i64)> = None;
    let mut ext: Option<(i64, i64)> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"cSld" => name = attr(&e, b"name").unwrap_or_default(),
                b"sp" => {
                    sp_depth += 1;
                    if sp_depth == 1 {
                        ph = None;
                        off = None;
                        ext = None;
                    }
                }
                b"ph" if sp_depth > 0 => ph = Some(ph_attrs(&e)),
                b"spPr" if sp_depth > 0 => in_sp_pr = true,
                b"xfrm" if in_sp_pr => in_xfrm = true,
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"cSld" => name = attr(&e, b"name").unwrap_or_default(),
                b"ph" if sp_depth > 0 => ph = Some(ph_attrs(&e)),
                b"off" if in_xfrm => off = pair(&e, b"x", b"y"),
                b"ext" if in_xfrm => ext = pair(&e, b"cx", b"cy"),
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"xfrm" => in_xfrm = false,
                b"spPr" => in_sp_pr = false,
                b"sp" if sp_depth > 0 => {
                    sp_depth -= 1;
                    if sp_depth == 0 {
                        if let Some((ph_type, idx)) = ph.take() {
                            let frame = match (off, ext) {
                                (Some((x, y)), Some((cx, cy))) if cx > 0 && cy > 0 => {
                                    Some(Frame { x, y, cx, cy })
                                }
                                _ => None,
                            };
                            shapes.push(PlaceholderShape { ph_type, idx, frame });
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok((name, shapes))
}

fn ph_attrs(e: &BytesStart<'_>) -> (Option<String>, Option<u32>) {
    (attr(e, b"type"), attr(e, b"idx").and_then(|v| v.parse().ok()))
}

fn pair(e: &BytesStart<'_>, a: &[u8], b: &[u8]) -> Option<(i64, i64)> {
    let a = attr(e, a)?.parse().ok()?;
    let b = attr(e, b)?.parse().ok()?;
    Some((a, b))
}

// A missing type means "obj", which takes body content
fn classify(ph_type: Option<&str>) -> Option<PlaceholderRole> {
    match ph_type {
        Some("title") | Some("ctrTitle") => Some(PlaceholderRole::Title),
        None | Some("body") | Some("obj") => Some(PlaceholderRole::Body),
        _ => None,
    }
}

/// Every embedded picture on one slide, in document order.
pub fn collect_pictures(
    package: &Package,
    slide_part: &str,
    slide_index: usize,
) -> Result<Vec<TemplatePicture>> {
    let xml = package.require(slide_part)?;
    let rels = package.relationships(slide_part)?;
    let base = part_dir(slide_part);

    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut pictures = Vec::new();
    let mut pic_depth = 0usize;
    let mut sp_pr_depth = 0usize;
    let mut embed: Option<String> = None;
    let mut extent: Option<(i64, i64)> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"pic" => {
                    pic_depth += 1;
                    if pic_depth == 1 {
                        embed = None;
                        extent = None;
                    }
                }
                b"spPr" if pic_depth > 0 => sp_pr_depth += 1,
                b"blip" if pic_depth > 0 => embed = embed.or_else(|| prefixed_attr(&e, b"embed")),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"blip" if pic_depth > 0 => embed = embed.or_else(|| prefixed_attr(&e, b"embed")),
                b"ext" if pic_depth > 0 && sp_pr_depth > 0 && extent.is_none() => {
                    let cx = attr(&e, b"cx").and_then(|v| v.parse().ok());
                    let cy = attr(&e, b"cy").and_then(|v| v.parse().ok());
                    if let (Some(cx), Some(cy)) = (cx, cy) {
                        extent = Some((cx, cy));
                    }
                }
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"spPr" if sp_pr_depth > 0 => sp_pr_depth -= 1,
                b"pic" if pic_depth > 0 => {
                    pic_depth -= 1;
                    if pic_depth == 0 {
                        let resolved = embed
                            .take()
                            .and_then(|rid| rels.get(&rid).filter(|r| r.rel_type == rel_type::IMAGE && !r.external).cloned())
                            .map(|rel| resolve_target(base, &rel.target));
                        if let Some(part_name) = resolved {
                            if let Some(bytes) = package.get(&part_name) {
                                pictures.push(TemplatePicture {
                                    slide_index,
                                    part_name,
                                    bytes: bytes.to_vec(),
                                    extent: extent.take(),
                                });
                            }
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(pictures)
}

fn prefixed_attr(e: &BytesStart<'_>, local: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.prefix().is_some() && a.key.local_name().as_ref() == local)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}
