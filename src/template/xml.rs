//! XML writers for generated slides, notes slides and the notes master.

use std::fmt::Write as FmtWrite;

use quick_xml::escape::escape;

use super::images::{EMU_PER_INCH, Frame};
use super::inventory::Placeholder;
use super::package::Result;

const NS_DECLS: &str = concat!(
    r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
    r#"xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#
);

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

// Titles longer than this get a smaller font
const LONG_TITLE_CHARS: usize = 70;
const LONG_TITLE_SIZE: u32 = 2000;
// Bullets longer than this get a smaller font
const LONG_BULLET_CHARS: usize = 80;
const LONG_BULLET_SIZE: u32 = 1600;

/// How the title reaches the slide.
#[derive(Debug, Clone, Copy)]
pub enum TitleTarget<'a> {
    Placeholder(&'a Placeholder),
    /// Layout has no title placeholder; use a free text box
    TextBox,
}

/// Everything needed to write one slide.
#[derive(Debug, Clone)]
pub struct SlideContent<'a> {
    pub title: &'a str,
    pub title_target: TitleTarget<'a>,
    /// Only written when there is a body placeholder
    pub bullets: &'a [String],
    pub body: Option<&'a Placeholder>,
    /// Relationship id of the image plus where it goes
    pub picture: Option<(&'a str, Frame)>,
    pub slide_cx: i64,
}

/// Where a text box title goes on a slide `slide_cx` wide.
pub fn title_box_frame(slide_cx: i64) -> Frame {
    Frame {
        x: EMU_PER_INCH,
        y: EMU_PER_INCH / 2,
        cx: (slide_cx - 2 * EMU_PER_INCH).max(EMU_PER_INCH),
        cy: EMU_PER_INCH,
    }
}

/// Generates `ppt/slides/slideN.xml`.
pub fn slide_xml(content: &SlideContent<'_>) -> Result<String> {
    let mut xml = String::with_capacity(4096);
    xml.push_str(XML_DECL);
    write!(xml, "<p:sld {NS_DECLS}>")?;
    xml.push_str("<p:cSld>");
    xml.push_str("<p:spTree>");
    write_group_props(&mut xml);

    let mut next_id = 2u32;

    let title_size = (content.title.chars().count() > LONG_TITLE_CHARS).then_some(LONG_TITLE_SIZE);
    match content.title_target {
        TitleTarget::Placeholder(ph) => {
            write_placeholder_shape(&mut xml, next_id, "Title", ph, &[(content.title, title_size)])?;
        }
        TitleTarget::TextBox => {
            let frame = title_box_frame(content.slide_cx);
            write_text_box(&mut xml, next_id, "Title", frame, content.title, title_size)?;
        }
    }
    next_id += 1;

    if let Some(body) = content.body.filter(|_| !content.bullets.is_empty()) {
        let paragraphs: Vec<(&str, Option<u32>)> = content
            .bullets
            .iter()
            .map(|b| {
                let size = (b.chars().count() > LONG_BULLET_CHARS).then_some(LONG_BULLET_SIZE);
                (b.as_str(), size)
            })
            .collect();
        write_placeholder_shape(&mut xml, next_id, "Content Placeholder", body, &paragraphs)?;
        next_id += 1;
    }

    if let Some((rel_id, frame)) = content.picture {
        write_picture(&mut xml, next_id, rel_id, frame)?;
    }

    xml.push_str("</p:spTree>");
    xml.push_str("</p:cSld>");
    xml.push_str(r#"<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr>"#);
    xml.push_str("</p:sld>");
    Ok(xml)
}

/// Generates a notes slide; each line of `notes` becomes a paragraph.
pub fn notes_slide_xml(notes: &str) -> Result<String> {
    let mut xml = String::with_capacity(2048);
    xml.push_str(XML_DECL);
    write!(xml, "<p:notes {NS_DECLS}>")?;
    xml.push_str("<p:cSld>");
    xml.push_str("<p:spTree>");
    write_group_props(&mut xml);

    xml.push_str("<p:sp>");
    xml.push_str("<p:nvSpPr>");
    xml.push_str(r#"<p:cNvPr id="2" name="Slide Image Placeholder 1"/>"#);
    xml.push_str(r#"<p:cNvSpPr><a:spLocks noGrp="1" noRot="1" noChangeAspect="1"/></p:cNvSpPr>"#);
    xml.push_str(r#"<p:nvPr><p:ph type="sldImg"/></p:nvPr>"#);
    xml.push_str("</p:nvSpPr>");
    xml.push_str("<p:spPr/>");
    xml.push_str("</p:sp>");

    xml.push_str("<p:sp>");
    xml.push_str("<p:nvSpPr>");
    xml.push_str(r#"<p:cNvPr id="3" name="Notes Placeholder 2"/>"#);
    xml.push_str(r#"<p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr>"#);
    xml.push_str(r#"<p:nvPr><p:ph type="body" idx="1"/></p:nvPr>"#);
    xml.push_str("</p:nvSpPr>");
    xml.push_str("<p:spPr/>");
    xml.push_str("<p:txBody><a:bodyPr/><a:lstStyle/>");
    for line in notes.lines() {
        write_paragraph(&mut xml, line, None)?;
    }
    if notes.lines().next().is_none() {
        xml.push_str("<a:p/>");
    }
    xml.push_str("</p:txBody>");
    xml.push_str("</p:sp>");

    xml.push_str("</p:spTree>");
    xml.push_str("</p:cSld>");
    xml.push_str(r#"<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr>"#);
    xml.push_str("</p:notes>");
    Ok(xml)
}

/// Minimal notes master for templates that ship without one.
pub fn notes_master_xml() -> String {
    let mut xml = String::with_capacity(2048);
    xml.push_str(XML_DECL);
    xml.push_str("<p:notesMaster ");
    xml.push_str(NS_DECLS);
    xml.push('>');
    xml.push_str("<p:cSld>");
    xml.push_str(r#"<p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg>"#);
    xml.push_str("<p:spTree>");
    write_group_props(&mut xml);

    xml.push_str("<p:sp><p:nvSpPr>");
    xml.push_str(r#"<p:cNvPr id="2" name="Slide Image Placeholder 1"/>"#);
    xml.push_str(r#"<p:cNvSpPr><a:spLocks noGrp="1" noRot="1" noChangeAspect="1"/></p:cNvSpPr>"#);
    xml.push_str(r#"<p:nvPr><p:ph type="sldImg" idx="2"/></p:nvPr>"#);
    xml.push_str("</p:nvSpPr>");
    xml.push_str(r#"<p:spPr><a:xfrm><a:off x="1143000" y="685800"/><a:ext cx="4572000" cy="3429000"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/></p:spPr>"#);
    xml.push_str("</p:sp>");

    xml.push_str("<p:sp><p:nvSpPr>");
    xml.push_str(r#"<p:cNvPr id="3" name="Notes Placeholder 2"/>"#);
    xml.push_str(r#"<p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr>"#);
    xml.push_str(r#"<p:nvPr><p:ph type="body" sz="quarter" idx="3"/></p:nvPr>"#);
    xml.push_str("</p:nvSpPr>");
    xml.push_str(r#"<p:spPr><a:xfrm><a:off x="685800" y="4343400"/><a:ext cx="5486400" cy="4114800"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr>"#);
    xml.push_str(r#"<p:txBody><a:bodyPr/><a:lstStyle/><a:p><a:endParaRPr lang="en-US"/></a:p></p:txBody>"#);
    xml.push_str("</p:sp>");

    xml.push_str("</p:spTree>");
    xml.push_str("</p:cSld>");
    xml.push_str(r#"<p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/>"#);
    xml.push_str("<p:notesStyle>");
    xml.push_str(r#"<a:lvl1pPr marL="0" algn="l" defTabSz="914400" rtl="0" eaLnBrk="1" latinLnBrk="0" hangingPunct="1">"#);
    xml.push_str(r#"<a:defRPr sz="1200" kern="1200"><a:solidFill><a:schemeClr val="tx1"/></a:solidFill><a:latin typeface="+mn-lt"/><a:ea typeface="+mn-ea"/><a:cs typeface="+mn-cs"/></a:defRPr>"#);
    xml.push_str("</a:lvl1pPr>");
    xml.push_str("</p:notesStyle>");
    xml.push_str("</p:notesMaster>");
    xml
}

fn write_group_props(xml: &mut String) {
    xml.push_str("<p:nvGrpSpPr>");
    xml.push_str(r#"<p:cNvPr id="1" name=""/>"#);
    xml.push_str("<p:cNvGrpSpPr/>");
    xml.push_str("<p:nvPr/>");
    xml.push_str("</p:nvGrpSpPr>");
    xml.push_str("<p:grpSpPr>");
    xml.push_str(r#"<a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm>"#);
    xml.push_str("</p:grpSpPr>");
}

// Shape bound to a layout placeholder; position is inherited from the layout
fn write_placeholder_shape(
    xml: &mut String,
    id: u32,
    name: &str,
    ph: &Placeholder,
    paragraphs: &[(&str, Option<u32>)],
) -> Result<()> {
    xml.push_str("<p:sp>");
    xml.push_str("<p:nvSpPr>");
    write!(xml, r#"<p:cNvPr id="{id}" name="{name} {}"/>"#, id - 1)?;
    xml.push_str(r#"<p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr>"#);
    xml.push_str("<p:nvPr><p:ph");
    if let Some(t) = &ph.ph_type {
        write!(xml, r#" type="{}""#, escape(t.as_str()))?;
    }
    if let Some(idx) = ph.idx {
        write!(xml, r#" idx="{idx}""#)?;
    }
    xml.push_str("/></p:nvPr>");
    xml.push_str("</p:nvSpPr>");
    xml.push_str("<p:spPr/>");
    xml.push_str("<p:txBody><a:bodyPr/><a:lstStyle/>");
    for (text, size) in paragraphs {
        write_paragraph(xml, text, *size)?;
    }
    xml.push_str("</p:txBody>");
    xml.push_str("</p:sp>");
    Ok(())
}

fn write_text_box(
    xml: &mut String,
    id: u32,
    name: &str,
    frame: Frame,
    text: &str,
    size: Option<u32>,
) -> Result<()> {
    xml.push_str("<p:sp>");
    xml.push_str("<p:nvSpPr>");
    write!(xml, r#"<p:cNvPr id="{id}" name="{name} {}"/>"#, id - 1)?;
    xml.push_str(r#"<p:cNvSpPr txBox="1"/>"#);
    xml.push_str("<p:nvPr/>");
    xml.push_str("</p:nvSpPr>");
    xml.push_str("<p:spPr>");
    write_xfrm(xml, frame)?;
    xml.push_str(r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/>"#);
    xml.push_str("</p:spPr>");
    xml.push_str(r#"<p:txBody><a:bodyPr wrap="square" rtlCol="0"><a:normAutofit/></a:bodyPr><a:lstStyle/>"#);
    write_paragraph(xml, text, size.or(Some(2800)))?;
    xml.push_str("</p:txBody>");
    xml.push_str("</p:sp>");
    Ok(())
}

fn write_picture(xml: &mut String, id: u32, rel_id: &str, frame: Frame) -> Result<()> {
    xml.push_str("<p:pic>");
    xml.push_str("<p:nvPicPr>");
    write!(xml, r#"<p:cNvPr id="{id}" name="Picture {}"/>"#, id - 1)?;
    xml.push_str(r#"<p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr>"#);
    xml.push_str("<p:nvPr/>");
    xml.push_str("</p:nvPicPr>");
    xml.push_str("<p:blipFill>");
    write!(xml, r#"<a:blip r:embed="{}"/>"#, escape(rel_id))?;
    xml.push_str("<a:stretch><a:fillRect/></a:stretch>");
    xml.push_str("</p:blipFill>");
    xml.push_str("<p:spPr>");
    write_xfrm(xml, frame)?;
    xml.push_str(r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom>"#);
    xml.push_str("</p:spPr>");
    xml.push_str("</p:pic>");
    Ok(())
}

fn write_xfrm(xml: &mut String, frame: Frame) -> Result<()> {
    write!(
        xml,
        r#"<a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></a:xfrm>"#,
        frame.x, frame.y, frame.cx, frame.cy
    )?;
    Ok(())
}

fn write_paragraph(xml: &mut String, text: &str, size: Option<u32>) -> Result<()> {
    xml.push_str("<a:p><a:r>");
    match size {
        Some(sz) => write!(xml, r#"<a:rPr lang="en-US" sz="{sz}" dirty="0"/>"#)?,
        None => xml.push_str(r#"<a:rPr lang="en-US" dirty="0"/>"#),
    }
    let clean = xml_chars(text);
    write!(xml, "<a:t>{}</a:t>", escape(clean.as_str()))?;
    xml.push_str("</a:r></a:p>");
    Ok(())
}

// Drops characters XML 1.0 cannot carry
fn xml_chars(text: &str) -> String {
    text.chars()
        .filter(|&c| matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}'))
        .collect()
}
