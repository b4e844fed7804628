//! Reading and rewriting the main `presentation.xml` part.

use std::io::Write;

use quick_xml::events::Event;
use quick_xml::{Reader, Writer};

use super::package::{Result, attr};

// Default slide size (10in x 7.5in) when sldSz is absent
const DEFAULT_SLIDE_CX: i64 = 9_144_000;
const DEFAULT_SLIDE_CY: i64 = 6_858_000;

// First id PowerPoint hands out for slides
const FIRST_SLIDE_ID: u32 = 256;

// p14 section list extension, which names slides by id
const SECTION_LIST_EXT_URI: &str = "{521415D9-36F7-43E2-AB2F-B90AF26B5E84}";

/// Facts pulled from `presentation.xml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationInfo {
    /// `r:id`s of slide masters, in order
    pub master_rel_ids: Vec<String>,
    /// `r:id`s of slides, in `sldIdLst` order
    pub slide_rel_ids: Vec<String>,
    pub has_notes_master: bool,
    pub slide_cx: i64,
    pub slide_cy: i64,
}

pub fn read_info(xml: &[u8]) -> Result<PresentationInfo> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut info = PresentationInfo {
        master_rel_ids: Vec::new(),
        slide_rel_ids: Vec::new(),
        has_notes_master: false,
        slide_cx: DEFAULT_SLIDE_CX,
        slide_cy: DEFAULT_SLIDE_CY,
    };

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"sldMasterId" => info.master_rel_ids.extend(r_id(&e)),
                b"sldId" => info.slide_rel_ids.extend(r_id(&e)),
                b"notesMasterId" => info.has_notes_master = true,
                b"sldSz" => {
                    if let Some(cx) = attr(&e, b"cx").and_then(|v| v.parse().ok()) {
                        info.slide_cx = cx;
                    }
                    if let Some(cy) = attr(&e, b"cy").and_then(|v| v.parse().ok()) {
                        info.slide_cy = cy;
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(info)
}

// `r:id` attribute; `id` alone is the numeric slide/master id
fn r_id(e: &quick_xml::events::BytesStart<'_>) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.prefix().is_some() && a.key.local_name().as_ref() == b"id")
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// What to change while rewriting `presentation.xml`.
#[derive(Debug, Default)]
pub struct PresentationEdit {
    /// Relationship ids of the new slides, in order
    pub slide_rel_ids: Vec<String>,
    /// Relationship id of a notes master to register, if one was added
    pub notes_master_rel_id: Option<String>,
}

// Root children that may precede sldIdLst
const BEFORE_SLIDE_LIST: &[&[u8]] = &[b"sldMasterIdLst", b"notesMasterIdLst", b"handoutMasterIdLst"];
const BEFORE_NOTES_MASTER_LIST: &[&[u8]] = &[b"sldMasterIdLst"];

/// Replaces the slide list, drops custom shows and section lists that point
/// at removed slides, and optionally registers a notes master.
pub fn rewrite(xml: &[u8], edit: &PresentationEdit) -> Result<Vec<u8>> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + 256));

    let mut depth = 0usize;
    let mut prefix = String::new();
    let mut notes_master_pending = edit.notes_master_rel_id.is_some();
    let mut slide_list_pending = true;
    let mut in_root_ext_list = false;

    loop {
        let event = reader.read_event()?;
        match &event {
            Event::Start(e) | Event::Empty(e) => {
                let is_start = matches!(event, Event::Start(_));
                let local = e.local_name();
                let local = local.as_ref();

                if depth == 0 {
                    if let Some(p) = e.name().prefix() {
                        prefix = format!("{}:", std::str::from_utf8(p.as_ref())?);
                    }
                } else if depth == 1 {
                    if local == b"notesMasterIdLst" {
                        notes_master_pending = false;
                    }
                    if notes_master_pending && !BEFORE_NOTES_MASTER_LIST.contains(&local) {
                        if let Some(id) = &edit.notes_master_rel_id {
                            write_notes_master_list(writer.get_mut(), &prefix, id)?;
                        }
                        notes_master_pending = false;
                    }
                    if slide_list_pending && !BEFORE_SLIDE_LIST.contains(&local) {
                        write_slide_list(writer.get_mut(), &prefix, &edit.slide_rel_ids)?;
                        slide_list_pending = false;
                    }
                    if local == b"sldIdLst" || local == b"custShowLst" {
                        if is_start {
                            reader.read_to_end(e.name())?;
                        }
                        continue;
                    }
                    in_root_ext_list = local == b"extLst" && is_start;
                } else if depth == 2
                    && in_root_ext_list
                    && local == b"ext"
                    && attr(e, b"uri").as_deref() == Some(SECTION_LIST_EXT_URI)
                {
                    if is_start {
                        reader.read_to_end(e.name())?;
                    }
                    continue;
                }

                if is_start {
                    depth += 1;
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 1 {
                    in_root_ext_list = false;
                }
                if depth == 0 {
                    if let Some(id) = edit.notes_master_rel_id.as_ref().filter(|_| notes_master_pending) {
                        write_notes_master_list(writer.get_mut(), &prefix, id)?;
                        notes_master_pending = false;
                    }
                    if slide_list_pending {
                        write_slide_list(writer.get_mut(), &prefix, &edit.slide_rel_ids)?;
                        slide_list_pending = false;
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        writer.write_event(event)?;
    }

    Ok(writer.into_inner())
}

fn write_slide_list(out: &mut Vec<u8>, prefix: &str, rel_ids: &[String]) -> Result<()> {
    if rel_ids.is_empty() {
        return Ok(());
    }
    write!(out, "<{prefix}sldIdLst>")?;
    for (i, rid) in rel_ids.iter().enumerate() {
        write!(out, r#"<{prefix}sldId id="{}" r:id="{rid}"/>"#, FIRST_SLIDE_ID + i as u32)?;
    }
    write!(out, "</{prefix}sldIdLst>")?;
    Ok(())
}

fn write_notes_master_list(out: &mut Vec<u8>, prefix: &str, rel_id: &str) -> Result<()> {
    write!(
        out,
        r#"<{prefix}notesMasterIdLst><{prefix}notesMasterId r:id="{rel_id}"/></{prefix}notesMasterIdLst>"#
    )?;
    Ok(())
}
