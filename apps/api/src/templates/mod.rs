//! Template Registry — the static catalog of resume templates and color themes.
//!
//! Pure data. Lookups fail closed: an unknown template, or a theme the template
//! does not permit, is a client error raised before any job exists.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("Unknown template '{0}'")]
    UnknownTemplate(String),

    #[error("Theme '{theme}' is not available for template '{template}' (allowed: {allowed})")]
    ThemeNotPermitted {
        template: String,
        theme: String,
        allowed: String,
    },
}

/// Composition strategy selector. Each archetype arranges the same sections differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutArchetype {
    /// Full-width colored header band above a single column.
    Banner,
    /// Serif type, centered header, rule-separated sections.
    Centered,
    /// Colored left column for contact, skills and languages.
    Sidebar,
    /// No color blocks; accent only on headings.
    Minimal,
    /// Contact block beside the name, two-column lower body.
    Split,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Palette {
    pub primary: &'static str,
    pub secondary: &'static str,
    pub accent: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub name: &'static str,
    pub description: &'static str,
    pub archetype: LayoutArchetype,
    /// Permitted theme names; the first entry is the default.
    pub themes: &'static [&'static str],
}

impl Template {
    pub fn default_theme(&self) -> &'static str {
        self.themes[0]
    }
}

/// A validated template + theme pair, ready for the compositor.
#[derive(Debug, Clone)]
pub struct ThemeSelection {
    pub template: &'static Template,
    pub theme: &'static str,
    pub palette: Palette,
}

static TEMPLATES: &[Template] = &[
    Template {
        name: "modern",
        description: "Bold colored header band with a clean single-column body",
        archetype: LayoutArchetype::Banner,
        themes: &["blue", "green", "purple", "teal"],
    },
    Template {
        name: "classic",
        description: "Traditional serif layout with a centered header",
        archetype: LayoutArchetype::Centered,
        themes: &["navy", "black", "burgundy"],
    },
    Template {
        name: "creative",
        description: "Two-column layout with a colored sidebar",
        archetype: LayoutArchetype::Sidebar,
        themes: &["purple", "orange", "teal", "pink"],
    },
    Template {
        name: "minimal",
        description: "Understated typography with accent-colored headings",
        archetype: LayoutArchetype::Minimal,
        themes: &["gray", "black", "blue"],
    },
    Template {
        name: "professional",
        description: "Executive layout with a side-by-side contact block",
        archetype: LayoutArchetype::Split,
        themes: &["navy", "blue", "green", "gray"],
    },
];

static PALETTES: &[(&str, Palette)] = &[
    ("blue", Palette { primary: "#2563eb", secondary: "#1e3a8a", accent: "#dbeafe" }),
    ("green", Palette { primary: "#059669", secondary: "#064e3b", accent: "#d1fae5" }),
    ("purple", Palette { primary: "#7c3aed", secondary: "#4c1d95", accent: "#ede9fe" }),
    ("teal", Palette { primary: "#0d9488", secondary: "#134e4a", accent: "#ccfbf1" }),
    ("navy", Palette { primary: "#1e3a5f", secondary: "#0f172a", accent: "#e2e8f0" }),
    ("black", Palette { primary: "#111827", secondary: "#374151", accent: "#f3f4f6" }),
    ("burgundy", Palette { primary: "#881337", secondary: "#4c0519", accent: "#ffe4e6" }),
    ("orange", Palette { primary: "#ea580c", secondary: "#7c2d12", accent: "#ffedd5" }),
    ("pink", Palette { primary: "#db2777", secondary: "#831843", accent: "#fce7f3" }),
    ("gray", Palette { primary: "#4b5563", secondary: "#1f2937", accent: "#f3f4f6" }),
];

pub fn list_templates() -> &'static [Template] {
    TEMPLATES
}

pub fn find_template(name: &str) -> Result<&'static Template, RegistryError> {
    TEMPLATES
        .iter()
        .find(|t| t.name == name)
        .ok_or_else(|| RegistryError::UnknownTemplate(name.to_string()))
}

/// Resolves a template/theme pair to a palette. `theme = None` picks the
/// template's default theme.
pub fn resolve_theme(
    template_name: &str,
    theme_name: Option<&str>,
) -> Result<ThemeSelection, RegistryError> {
    let template = find_template(template_name)?;
    let requested = theme_name.unwrap_or_else(|| template.default_theme());

    let theme = template
        .themes
        .iter()
        .copied()
        .find(|t| *t == requested)
        .ok_or_else(|| RegistryError::ThemeNotPermitted {
            template: template.name.to_string(),
            theme: requested.to_string(),
            allowed: template.themes.join(", "),
        })?;

    // Every catalog theme has a palette (checked in tests).
    let palette = palette_for(theme).ok_or_else(|| RegistryError::ThemeNotPermitted {
        template: template.name.to_string(),
        theme: theme.to_string(),
        allowed: template.themes.join(", "),
    })?;

    Ok(ThemeSelection {
        template,
        theme,
        palette,
    })
}

fn palette_for(theme: &str) -> Option<Palette> {
    PALETTES
        .iter()
        .find(|(name, _)| *name == theme)
        .map(|(_, palette)| *palette)
}
