use async_trait::async_trait;
use bytes::Bytes;

use crate::compose::Markup;
use crate::render::{PageOptions, RenderError, Renderer};

/// HTML output: the composed document itself, with the print stylesheet
/// attached so printing it from a browser keeps the page geometry.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupRenderer;

#[async_trait]
impl Renderer for MarkupRenderer {
    fn name(&self) -> &'static str {
        "markup"
    }

    async fn render(&self, markup: &Markup, options: &PageOptions) -> Result<Bytes, RenderError> {
        let styled = markup.with_head_style(&options.print_css());
        Ok(Bytes::from(styled.into_string()))
    }
}
