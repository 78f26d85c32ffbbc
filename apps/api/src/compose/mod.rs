//! Markup Compositor — turns a `DocumentPayload` plus a theme selection into one
//! self-contained HTML document.
//!
//! Layouts and section fragments are askama templates under `templates/`;
//! `view` prepares the plain-text view model they render.
//!
//! Guarantees:
//! - inline styles only; no stylesheet, font or image fetches (photos must be data URIs)
//! - an optional section appears iff its collection is non-empty, in caller order
//! - every payload string is escaped by the template engine
//! - deterministic: no clocks, no randomness, no map iteration

pub mod view;

use askama::Template;

use crate::compose::view::DocumentView;
use crate::models::payload::DocumentPayload;
use crate::templates::{LayoutArchetype, Palette, ThemeSelection};

/// A complete HTML document ready for the render engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markup(String);

impl Markup {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Returns a copy with an extra `<style>` block appended to `<head>`.
    pub fn with_head_style(&self, css: &str) -> Markup {
        let style = format!("<style>{css}</style>");
        match self.0.find("</head>") {
            Some(idx) => {
                let mut out = String::with_capacity(self.0.len() + style.len());
                out.push_str(&self.0[..idx]);
                out.push_str(&style);
                out.push_str(&self.0[idx..]);
                Markup(out)
            }
            None => Markup(format!("{style}{}", self.0)),
        }
    }
}

impl From<String> for Markup {
    fn from(html: String) -> Self {
        Markup(html)
    }
}

#[derive(Template)]
#[template(path = "styles.css", escape = "none")]
struct Stylesheet<'a> {
    archetype: LayoutArchetype,
    palette: &'a Palette,
}

#[derive(Template)]
#[template(path = "layouts/banner.html")]
struct BannerLayout<'a> {
    doc: &'a DocumentView,
    css: &'a str,
    template: &'a str,
    theme: &'a str,
}

#[derive(Template)]
#[template(path = "layouts/centered.html")]
struct CenteredLayout<'a> {
    doc: &'a DocumentView,
    css: &'a str,
    template: &'a str,
    theme: &'a str,
}

#[derive(Template)]
#[template(path = "layouts/sidebar.html")]
struct SidebarLayout<'a> {
    doc: &'a DocumentView,
    css: &'a str,
    template: &'a str,
    theme: &'a str,
}

#[derive(Template)]
#[template(path = "layouts/minimal.html")]
struct MinimalLayout<'a> {
    doc: &'a DocumentView,
    css: &'a str,
    template: &'a str,
    theme: &'a str,
}

#[derive(Template)]
#[template(path = "layouts/split.html")]
struct SplitLayout<'a> {
    doc: &'a DocumentView,
    css: &'a str,
    template: &'a str,
    theme: &'a str,
}

/// Inline stylesheet for an archetype/palette pair.
pub fn stylesheet(archetype: LayoutArchetype, palette: &Palette) -> askama::Result<String> {
    Stylesheet { archetype, palette }.render()
}

/// Composes the final document. The payload must already have passed
/// `DocumentPayload::validate`.
pub fn compose(payload: &DocumentPayload, selection: &ThemeSelection) -> askama::Result<Markup> {
    let archetype = selection.template.archetype;
    let view = DocumentView::from_payload(payload);
    let css = stylesheet(archetype, &selection.palette)?;

    let doc = &view;
    let css = css.as_str();
    let template = selection.template.name;
    let theme = selection.theme;
    let html = match archetype {
        LayoutArchetype::Banner => BannerLayout { doc, css, template, theme }.render(),
        LayoutArchetype::Centered => CenteredLayout { doc, css, template, theme }.render(),
        LayoutArchetype::Sidebar => SidebarLayout { doc, css, template, theme }.render(),
        LayoutArchetype::Minimal => MinimalLayout { doc, css, template, theme }.render(),
        LayoutArchetype::Split => SplitLayout { doc, css, template, theme }.render(),
    }?;

    Ok(Markup(html))
}
