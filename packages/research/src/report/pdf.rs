//! PDF rendering with genpdf.
//!
//! Layout: title and question header, one section per source in rank order
//! (heading, summary paragraphs, citation line), then the numbered source
//! list.

use genpdf::elements::{Break, Paragraph};
use genpdf::fonts::{FontData, FontFamily};
use genpdf::style::{Style, StyledString};
use genpdf::{Document, SimplePageDecorator};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::ReportError;
use crate::types::report::Report;

/// Font family shipped with the crate under `fonts/` (DejaVu Sans).
pub const BUNDLED_FONT_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/fonts");
pub const BUNDLED_FONT_FAMILY: &str = "DejaVuSans";

/// Font directories and family names tried in order.
const FONT_CANDIDATES: &[(&str, &str)] = &[
    (BUNDLED_FONT_DIR, BUNDLED_FONT_FAMILY),
    ("./fonts", BUNDLED_FONT_FAMILY),
    ("/usr/share/fonts/truetype/liberation", "LiberationSans"),
    ("/usr/share/fonts/liberation-sans", "LiberationSans"),
    ("/usr/share/fonts/liberation", "LiberationSans"),
    ("/usr/share/fonts/TTF", "LiberationSans"),
    ("/usr/share/fonts/truetype/dejavu", "DejaVuSans"),
    ("/usr/share/fonts/TTF", "DejaVuSans"),
    ("/Library/Fonts", "Arial"),
];

/// File suffixes of the regular, bold, italic and bold-italic faces.
/// Distributions ship DejaVu with the second scheme.
const FACE_SUFFIXES: &[[&str; 4]] = &[
    ["-Regular", "-Bold", "-Italic", "-BoldItalic"],
    ["", "-Bold", "-Oblique", "-BoldOblique"],
];

type Fonts = FontFamily<FontData>;

/// Renders reports to PDF.
#[derive(Debug, Clone, Default)]
pub struct PdfRenderer {
    font: Option<(PathBuf, String)>,
}

impl PdfRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific font family instead of searching the system.
    pub fn with_font(mut self, dir: impl Into<PathBuf>, family: impl Into<String>) -> Self {
        self.font = Some((dir.into(), family.into()));
        self
    }

    /// Fail early when no font family can be loaded.
    pub fn check_font(&self) -> Result<(), ReportError> {
        self.load_font().map(|_| ())
    }

    fn load_font(&self) -> Result<Fonts, ReportError> {
        let mut searched = Vec::new();

        if let Some((dir, family)) = &self.font {
            if let Some(font) = load_family(dir, family) {
                return Ok(font);
            }
            debug!(dir = %dir.display(), family = %family, "Configured font unusable");
            searched.push(format!("{}/{}", dir.display(), family));
        }

        for (dir, family) in FONT_CANDIDATES {
            if let Some(font) = load_family(Path::new(dir), family) {
                debug!(dir = %dir, family = %family, "Using font");
                return Ok(font);
            }
            searched.push(format!("{dir}/{family}"));
        }

        Err(ReportError::FontUnavailable {
            searched: searched.join(", "),
        })
    }

    /// Render the report into PDF bytes.
    pub fn render(&self, report: &Report) -> Result<Vec<u8>, ReportError> {
        let font = self.load_font()?;

        let mut doc = Document::new(font);
        doc.set_title(clean(&report.title));
        doc.set_font_size(11);
        doc.set_line_spacing(1.25);

        let mut decorator = SimplePageDecorator::new();
        decorator.set_margins(20);
        doc.set_page_decorator(decorator);

        doc.push(Paragraph::new(StyledString::new(
            clean(&report.title),
            Style::new().bold().with_font_size(18),
        )));
        doc.push(Break::new(0.5));
        doc.push(Paragraph::new(StyledString::new(
            format!("Question: {}", clean(&report.query)),
            Style::new().italic(),
        )));
        doc.push(Paragraph::new(StyledString::new(
            format!(
                "Generated {} from {} sources",
                report.generated_at.format("%Y-%m-%d %H:%M UTC"),
                report.citations.len()
            ),
            Style::new().with_font_size(9),
        )));
        doc.push(Break::new(1.5));

        for (i, section) in report.sections.iter().enumerate() {
            doc.push(Paragraph::new(StyledString::new(
                format!("{}. {}", i + 1, clean(&section.heading)),
                Style::new().bold().with_font_size(14),
            )));
            doc.push(Break::new(0.5));

            for paragraph in paragraphs(&section.body) {
                doc.push(Paragraph::new(paragraph));
                doc.push(Break::new(0.5));
            }

            if let Some(citation) = report.citation(section.citation) {
                doc.push(Paragraph::new(StyledString::new(
                    clean(&citation.line()),
                    Style::new().italic().with_font_size(9),
                )));
            }
            doc.push(Break::new(1.5));
        }

        doc.push(Paragraph::new(StyledString::new(
            "Sources",
            Style::new().bold().with_font_size(14),
        )));
        doc.push(Break::new(0.5));
        for citation in &report.citations {
            doc.push(Paragraph::new(StyledString::new(
                clean(&citation.line()),
                Style::new().with_font_size(9),
            )));
        }

        let mut bytes = Vec::new();
        doc.render(&mut bytes)
            .map_err(|e| ReportError::Render(e.to_string()))?;
        Ok(bytes)
    }

    /// Render and write the PDF, creating parent directories as needed.
    ///
    /// Rendering runs on the blocking pool.
    pub async fn write(&self, report: &Report, path: &Path) -> Result<(), ReportError> {
        let renderer = self.clone();
        let owned = report.clone();
        let bytes = tokio::task::spawn_blocking(move || renderer.render(&owned))
            .await
            .map_err(|e| ReportError::Render(format!("render task failed: {e}")))??;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, &bytes).await?;

        info!(path = %path.display(), bytes = bytes.len(), "PDF report written");
        Ok(())
    }
}

fn load_family(dir: &Path, family: &str) -> Option<Fonts> {
    FACE_SUFFIXES
        .iter()
        .find_map(|suffixes| load_faces(dir, family, suffixes).ok())
}

fn load_faces(dir: &Path, family: &str, suffixes: &[&str; 4]) -> Result<Fonts, genpdf::error::Error> {
    let load = |suffix: &str| FontData::load(dir.join(format!("{family}{suffix}.ttf")), None);
    Ok(FontFamily {
        regular: load(suffixes[0])?,
        bold: load(suffixes[1])?,
        italic: load(suffixes[2])?,
        bold_italic: load(suffixes[3])?,
    })
}

/// Drop control characters the PDF text layer cannot show.
fn clean(text: &str) -> String {
    text.chars()
        .map(|c| if c == '\t' { ' ' } else { c })
        .filter(|c| !c.is_control())
        .collect()
}

/// Split summary text into paragraphs at line breaks.
fn paragraphs(body: &str) -> Vec<String> {
    body.lines()
        .map(|l| clean(l.trim()))
        .filter(|l| !l.is_empty())
        .collect()
}
