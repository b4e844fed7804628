//! Rendering a slide plan into an uploaded PowerPoint template.
//!
//! The template's masters, layouts, theme and media are kept as they are.
//! Its existing slides are inventoried for pictures and then replaced by one
//! generated slide per plan entry.

pub mod images;
pub mod inventory;
pub mod layout;
pub mod package;
pub mod presentation;
pub mod xml;

use std::fmt;

use tracing::{debug, info, instrument, warn};

use crate::error::AppError;
use crate::models::{MAX_SLIDES, SlidePlanEntry};
use crate::prompt::truncate_chars;

pub use images::{AccentPosition, ImagePolicy};
pub use inventory::TemplateInventory;
pub use layout::MatchKind;

use images::{Frame, PictureCursor, accent_frame};
use package::{
    ContentTypes, Package, Relationships, content_type, part_dir, rel_type, relative_target,
    resolve_target,
};
use presentation::{PresentationEdit, PresentationInfo};
use xml::{SlideContent, TitleTarget};

// Longest title written to a slide
pub const MAX_TITLE_CHARS: usize = 200;
// Most bullets written to one slide
pub const MAX_BULLETS_PER_SLIDE: usize = 12;

/// A non-fatal degradation that happened while rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderNotice {
    /// Plan had more entries than a deck may hold
    EntriesTruncated { dropped: usize },
    /// Layout has no body placeholder
    BulletsOmitted { slide: usize, count: usize },
    BulletsTruncated { slide: usize, dropped: usize },
    /// Layout has no title placeholder; a text box was used
    TitleTextBox { slide: usize },
    LayoutHintUnmatched { slide: usize, hint: String },
    /// Template slides held no reusable pictures
    NoPictures,
    /// No free space beside the filled placeholders for a picture
    PictureSkipped { slide: usize },
    NotesMasterCreated,
    /// Notes were requested but the template has no theme to build a notes master from
    NotesSkipped,
}

impl fmt::Display for RenderNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderNotice::EntriesTruncated { dropped } => {
                write!(f, "{dropped} plan entries beyond {MAX_SLIDES} were not rendered")
            }
            RenderNotice::BulletsOmitted { slide, count } => {
                write!(f, "slide {}: layout has no body, {count} bullets omitted", slide + 1)
            }
            RenderNotice::BulletsTruncated { slide, dropped } => {
                write!(f, "slide {}: {dropped} bullets over the limit dropped", slide + 1)
            }
            RenderNotice::TitleTextBox { slide } => {
                write!(f, "slide {}: layout has no title placeholder, used a text box", slide + 1)
            }
            RenderNotice::LayoutHintUnmatched { slide, hint } => {
                write!(f, "slide {}: no layout matched \"{hint}\", used the default", slide + 1)
            }
            RenderNotice::NoPictures => f.write_str("template has no pictures to reuse"),
            RenderNotice::PictureSkipped { slide } => {
                write!(f, "slide {}: no room for a picture beside the content", slide + 1)
            }
            RenderNotice::NotesMasterCreated => f.write_str("added a notes master for speaker notes"),
            RenderNotice::NotesSkipped => f.write_str("speaker notes skipped, template has no theme"),
        }
    }
}

/// A template picture placed on a generated slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PicturePlacement {
    pub slide: usize,
    /// Index into the inventory's pictures
    pub picture: usize,
    pub position: AccentPosition,
    pub frame: Frame,
}

/// Knobs for one render.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub include_notes: bool,
    pub image_policy: ImagePolicy,
}

/// The output package plus what happened while producing it.
#[derive(Debug, Clone)]
pub struct RenderedDeck {
    pub bytes: Vec<u8>,
    pub slide_count: usize,
    pub layouts_used: Vec<String>,
    pub placements: Vec<PicturePlacement>,
    pub notices: Vec<RenderNotice>,
}

/// An opened, inventoried template ready to render into.
pub struct Template {
    package: Package,
    main_part: String,
    info: PresentationInfo,
    inventory: TemplateInventory,
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("main_part", &self.main_part)
            .field("layouts", &self.inventory.layouts.len())
            .field("pictures", &self.inventory.pictures.len())
            .finish()
    }
}

/// Opens `template` and renders `plan` into it.
pub fn render_deck(
    template: &[u8],
    plan: &[SlidePlanEntry],
    options: &RenderOptions,
) -> Result<RenderedDeck, AppError> {
    Template::open(template)?.render(plan, options)
}

impl Template {
    /// Reads and inventories an uploaded `.pptx` or `.potx`.
    #[instrument(skip_all, fields(bytes = bytes.len()))]
    pub fn open(bytes: &[u8]) -> Result<Self, AppError> {
        let (package, main_part, info, inventory) = Self::read(bytes).map_err(|err| {
            warn!(error = %err, "template unreadable");
            AppError::TemplateRead(
                "The template could not be read. Upload a valid .pptx or .potx file.".into(),
            )
        })?;

        if inventory.layouts.is_empty() {
            return Err(AppError::TemplateRead(
                "The template has no slide layouts to build slides from.".into(),
            ));
        }

        debug!(
            layouts = ?inventory.layout_names(),
            pictures = inventory.pictures.len(),
            "template opened"
        );
        Ok(Self {
            package,
            main_part,
            info,
            inventory,
        })
    }

    fn read(
        bytes: &[u8],
    ) -> package::Result<(Package, String, PresentationInfo, TemplateInventory)> {
        let package = Package::from_bytes(bytes)?;
        let main_part = package.main_part_name()?;
        let info = presentation::read_info(package.require(&main_part)?)?;
        let inventory = inventory::build(&package, &main_part, &info)?;
        Ok((package, main_part, info, inventory))
    }

    pub fn inventory(&self) -> &TemplateInventory {
        &self.inventory
    }

    pub fn slide_size(&self) -> (i64, i64) {
        (self.info.slide_cx, self.info.slide_cy)
    }

    /// Replaces the template's slides with `plan` and serializes the result.
    #[instrument(skip_all, fields(entries = plan.len(), include_notes = options.include_notes))]
    pub fn render(
        mut self,
        plan: &[SlidePlanEntry],
        options: &RenderOptions,
    ) -> Result<RenderedDeck, AppError> {
        if plan.is_empty() {
            return Err(AppError::PlanGeneration(
                "The slide plan is empty, nothing to render.".into(),
            ));
        }
        let deck = self.write_deck(plan, options).map_err(|err| {
            warn!(error = %err, "rendering failed");
            AppError::Render("The presentation could not be written.".into())
        })?;
        info!(
            slides = deck.slide_count,
            pictures = deck.placements.len(),
            notices = deck.notices.len(),
            bytes = deck.bytes.len(),
            "deck rendered"
        );
        Ok(deck)
    }

    fn write_deck(
        &mut self,
        plan: &[SlidePlanEntry],
        options: &RenderOptions,
    ) -> package::Result<RenderedDeck> {
        let mut notices = Vec::new();
        let entries = &plan[..plan.len().min(MAX_SLIDES)];
        if plan.len() > entries.len() {
            notices.push(RenderNotice::EntriesTruncated {
                dropped: plan.len() - entries.len(),
            });
        }

        let main_part = self.main_part.clone();
        let mut types = self.package.content_types()?;
        let mut pres_rels = self.package.relationships(&main_part)?;

        self.purge_slides(&mut types, &mut pres_rels)?;

        let wants_notes = options.include_notes
            && entries
                .iter()
                .any(|e| e.notes.as_deref().is_some_and(|n| !n.trim().is_empty()));
        let (notes_master, notes_master_rel_id) = if wants_notes {
            self.ensure_notes_master(&mut types, &mut pres_rels, &mut notices)?
        } else {
            (None, None)
        };

        let pictures = &self.inventory.pictures;
        if pictures.is_empty() {
            notices.push(RenderNotice::NoPictures);
        }
        let mut cursor = PictureCursor::new(pictures.len());
        let policy = &options.image_policy;

        let mut slide_rel_ids = Vec::with_capacity(entries.len());
        let mut layouts_used = Vec::with_capacity(entries.len());
        let mut placements = Vec::new();

        for (index, entry) in entries.iter().enumerate() {
            let choice = layout::match_layout(&self.inventory.layouts, entry.layout.as_deref());
            let chosen = &self.inventory.layouts[choice.index];
            if choice.kind == MatchKind::Unmatched {
                if let Some(hint) = &entry.layout {
                    notices.push(RenderNotice::LayoutHintUnmatched {
                        slide: index,
                        hint: truncate_chars(hint, 60).to_string(),
                    });
                }
            }

            let title = truncate_chars(entry.title.trim(), MAX_TITLE_CHARS);
            let title_target = match &chosen.title {
                Some(ph) => TitleTarget::Placeholder(ph),
                None => {
                    notices.push(RenderNotice::TitleTextBox { slide: index });
                    TitleTarget::TextBox
                }
            };

            let bullets = &entry.bullets[..entry.bullets.len().min(MAX_BULLETS_PER_SLIDE)];
            if entry.bullets.len() > bullets.len() {
                notices.push(RenderNotice::BulletsTruncated {
                    slide: index,
                    dropped: entry.bullets.len() - bullets.len(),
                });
            }
            if chosen.body.is_none() && !bullets.is_empty() {
                notices.push(RenderNotice::BulletsOmitted {
                    slide: index,
                    count: bullets.len(),
                });
            }

            let slide_part = self.package.next_free_name("ppt/slides/slide", ".xml");
            let slide_dir = part_dir(&slide_part).to_string();
            let mut slide_rels = Relationships::default();
            slide_rels.add(
                rel_type::SLIDE_LAYOUT,
                &relative_target(&slide_dir, &chosen.part_name),
            );

            let mut picture = None;
            if policy.wants_picture(index, bullets.len()) {
                if let Some((picture_index, position)) = cursor.peek() {
                    let (slide_cx, slide_cy) = (self.info.slide_cx, self.info.slide_cy);
                    let mut occupied = vec![match &chosen.title {
                        Some(ph) => ph.frame_on(slide_cx, slide_cy),
                        None => xml::title_box_frame(slide_cx),
                    }];
                    if let Some(body) = chosen.body.as_ref().filter(|_| !bullets.is_empty()) {
                        occupied.push(body.frame_on(slide_cx, slide_cy));
                    }

                    let source = &pictures[picture_index];
                    match accent_frame(policy, position, slide_cx, slide_cy, source.extent, &occupied) {
                        Some(frame) => {
                            cursor.advance();
                            let rel_id = slide_rels.add(
                                rel_type::IMAGE,
                                &relative_target(&slide_dir, &source.part_name),
                            );
                            placements.push(PicturePlacement {
                                slide: index,
                                picture: picture_index,
                                position,
                                frame,
                            });
                            picture = Some((rel_id, frame));
                        }
                        None => {
                            debug!(slide = index, "no free space for a picture");
                            notices.push(RenderNotice::PictureSkipped { slide: index });
                        }
                    }
                }
            }

            let slide_xml = xml::slide_xml(&SlideContent {
                title,
                title_target,
                bullets,
                body: chosen.body.as_ref(),
                picture: picture.as_ref().map(|(id, frame)| (id.as_str(), *frame)),
                slide_cx: self.info.slide_cx,
            })?;
            self.package.set(&slide_part, slide_xml.into_bytes());
            types.set_override(&slide_part, content_type::SLIDE);

            let notes = entry
                .notes
                .as_deref()
                .map(str::trim)
                .filter(|n| options.include_notes && !n.is_empty());
            if let (Some(notes), Some(master)) = (notes, notes_master.as_deref()) {
                let notes_part = self.package.next_free_name("ppt/notesSlides/notesSlide", ".xml");
                let notes_dir = part_dir(&notes_part).to_string();
                self.package
                    .set(&notes_part, xml::notes_slide_xml(notes)?.into_bytes());
                types.set_override(&notes_part, content_type::NOTES_SLIDE);

                let mut notes_rels = Relationships::default();
                notes_rels.add(rel_type::NOTES_MASTER, &relative_target(&notes_dir, master));
                notes_rels.add(rel_type::SLIDE, &relative_target(&notes_dir, &slide_part));
                self.package.set_relationships(&notes_part, &notes_rels);

                slide_rels.add(rel_type::NOTES_SLIDE, &relative_target(&slide_dir, &notes_part));
            }

            self.package.set_relationships(&slide_part, &slide_rels);
            let rel_id = pres_rels.add(
                rel_type::SLIDE,
                &relative_target(part_dir(&main_part), &slide_part),
            );
            slide_rel_ids.push(rel_id);
            layouts_used.push(chosen.name.clone());
        }

        let edit = PresentationEdit {
            slide_rel_ids,
            notes_master_rel_id,
        };
        let rewritten = presentation::rewrite(self.package.require(&main_part)?, &edit)?;
        self.package.set(&main_part, rewritten);
        self.package.set_relationships(&main_part, &pres_rels);

        // .potx uploads come back as regular presentations
        if types.get(&main_part) == Some(content_type::TEMPLATE_MAIN) {
            types.set_override(&main_part, content_type::PRESENTATION_MAIN);
        }
        self.package.set_content_types(&types);

        let bytes = self.package.to_bytes()?;
        Ok(RenderedDeck {
            bytes,
            slide_count: entries.len(),
            layouts_used,
            placements,
            notices,
        })
    }

    // Drops the template's slides and their notes slides. Media stays.
    fn purge_slides(
        &mut self,
        types: &mut ContentTypes,
        pres_rels: &mut Relationships,
    ) -> package::Result<()> {
        let base = part_dir(&self.main_part).to_string();
        let slide_rels: Vec<(String, String)> = pres_rels
            .iter()
            .filter(|r| r.rel_type == rel_type::SLIDE)
            .map(|r| (r.id.clone(), resolve_target(&base, &r.target)))
            .collect();

        for (rel_id, slide_part) in slide_rels {
            let rels = self.package.relationships(&slide_part)?;
            let slide_dir = part_dir(&slide_part).to_string();
            for notes in rels.iter().filter(|r| r.rel_type == rel_type::NOTES_SLIDE) {
                let notes_part = resolve_target(&slide_dir, &notes.target);
                self.remove_part(types, &notes_part);
            }
            self.remove_part(types, &slide_part);
            pres_rels.remove(&rel_id);
        }
        Ok(())
    }

    fn remove_part(&mut self, types: &mut ContentTypes, part: &str) {
        self.package.remove(part);
        self.package.remove(&package::rels_path(part));
        types.remove_override(part);
    }

    // Existing notes master, or a new one sharing a copy of the first master's theme
    fn ensure_notes_master(
        &mut self,
        types: &mut ContentTypes,
        pres_rels: &mut Relationships,
        notices: &mut Vec<RenderNotice>,
    ) -> package::Result<(Option<String>, Option<String>)> {
        let base = part_dir(&self.main_part).to_string();
        if let Some(rel) = pres_rels.find_by_type(rel_type::NOTES_MASTER) {
            let part = resolve_target(&base, &rel.target);
            if self.package.contains(&part) {
                // Related but missing from notesMasterIdLst: register it
                let list_entry = (!self.info.has_notes_master).then(|| rel.id.clone());
                return Ok((Some(part), list_entry));
            }
        }

        let Some(theme_source) = self.find_theme()? else {
            notices.push(RenderNotice::NotesSkipped);
            return Ok((None, None));
        };
        let theme_bytes = self.package.require(&theme_source)?.to_vec();

        let theme_part = self.package.next_free_name("ppt/theme/theme", ".xml");
        self.package.set(&theme_part, theme_bytes);
        types.set_override(&theme_part, content_type::THEME);

        let master_part = self
            .package
            .next_free_name("ppt/notesMasters/notesMaster", ".xml");
        self.package
            .set(&master_part, xml::notes_master_xml().into_bytes());
        types.set_override(&master_part, content_type::NOTES_MASTER);

        let mut master_rels = Relationships::default();
        master_rels.add(
            rel_type::THEME,
            &relative_target(part_dir(&master_part), &theme_part),
        );
        self.package.set_relationships(&master_part, &master_rels);

        let rel_id = pres_rels.add(rel_type::NOTES_MASTER, &relative_target(&base, &master_part));
        notices.push(RenderNotice::NotesMasterCreated);
        debug!(part = %master_part, "notes master created");
        Ok((Some(master_part), Some(rel_id)))
    }

    fn find_theme(&self) -> package::Result<Option<String>> {
        let base = part_dir(&self.main_part);
        let pres_rels = self.package.relationships(&self.main_part)?;
        for master_rid in &self.info.master_rel_ids {
            let Some(rel) = pres_rels.get(master_rid) else {
                continue;
            };
            let master_part = resolve_target(base, &rel.target);
            let master_rels = self.package.relationships(&master_part)?;
            if let Some(theme) = master_rels.find_by_type(rel_type::THEME) {
                let part = resolve_target(part_dir(&master_part), &theme.target);
                if self.package.contains(&part) {
                    return Ok(Some(part));
                }
            }
        }
        Ok(self
            .package
            .part_names()
            .find(|n| n.starts_with("ppt/theme/") && n.ends_with(".xml"))
            .map(str::to_string))
    }
}
