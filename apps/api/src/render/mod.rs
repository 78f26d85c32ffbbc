//! Render Engine — converts composed markup into the bytes of a finished document.
//!
//! `Renderer` is the seam: `ChromiumRenderer` drives a headless browser for PDF,
//! `MarkupRenderer` returns the markup itself for HTML output. The orchestrator
//! holds them as `Arc<dyn Renderer>` and wraps every call in its own timeout.

pub mod chromium;
pub mod markup;

use std::str::FromStr;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

use crate::compose::Markup;

pub use chromium::ChromiumRenderer;
pub use markup::MarkupRenderer;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to launch browser '{binary}': {source}")]
    Launch {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("browser exited with {status}: {stderr}")]
    BrowserExited { status: String, stderr: String },

    #[error("browser produced no output file")]
    MissingOutput,

    #[error("browser output is not a PDF document")]
    InvalidOutput,

    #[error("render scratch I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum PageSize {
    #[default]
    A4,
    Letter,
    Legal,
    A3,
    A5,
    Tabloid,
}

impl PageSize {
    /// Value for the CSS `@page { size }` descriptor.
    pub fn css_size(self) -> &'static str {
        match self {
            PageSize::A4 => "A4",
            PageSize::Letter => "letter",
            PageSize::Legal => "legal",
            PageSize::A3 => "A3",
            PageSize::A5 => "A5",
            PageSize::Tabloid => "11in 17in",
        }
    }
}

impl FromStr for PageSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a4" => Ok(PageSize::A4),
            "letter" => Ok(PageSize::Letter),
            "legal" => Ok(PageSize::Legal),
            "a3" => Ok(PageSize::A3),
            "a5" => Ok(PageSize::A5),
            "tabloid" => Ok(PageSize::Tabloid),
            other => Err(format!("unsupported page size '{other}'")),
        }
    }
}

/// Page margins in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Margins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Margins {
    pub fn uniform(mm: f32) -> Self {
        Self {
            top: mm,
            right: mm,
            bottom: mm,
            left: mm,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageOptions {
    pub page_size: PageSize,
    pub margins: Margins,
    /// Keep background colors and images in the output.
    pub print_background: bool,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            page_size: PageSize::A4,
            margins: Margins::uniform(10.0),
            print_background: true,
        }
    }
}

impl PageOptions {
    /// Print stylesheet carrying page geometry and background fidelity.
    /// Chromium's `--print-to-pdf` honours `@page` and `print-color-adjust`.
    pub fn print_css(&self) -> String {
        let m = &self.margins;
        let adjust = if self.print_background {
            "exact"
        } else {
            "economy"
        };
        format!(
            "@page{{size:{};margin:{}mm {}mm {}mm {}mm}}\
             html,body{{-webkit-print-color-adjust:{adjust};print-color-adjust:{adjust}}}",
            self.page_size.css_size(),
            m.top,
            m.right,
            m.bottom,
            m.left,
        )
    }
}

#[async_trait]
pub trait Renderer: Send + Sync {
    /// Short backend name, reported by the health endpoint.
    fn name(&self) -> &'static str;

    async fn render(&self, markup: &Markup, options: &PageOptions) -> Result<Bytes, RenderError>;
}
