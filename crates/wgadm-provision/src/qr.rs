//! QR representations of client configs, for import by mobile clients.

use qrcode::render::svg;
use qrcode::QrCode;

use crate::error::{ProvisionError, Result};

/// A client config rendered as a QR code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedQr {
    /// Standalone SVG document.
    pub svg: String,
    /// Text rendering for a terminal.
    pub terminal: String,
}

/// Renders text as a QR code.
pub trait QrRenderer {
    /// Renders `data` in every supported form.
    fn render(&self, data: &str) -> Result<RenderedQr>;
}

/// [`QrRenderer`] backed by the `qrcode` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct QrCodeRenderer;

impl QrRenderer for QrCodeRenderer {
    fn render(&self, data: &str) -> Result<RenderedQr> {
        let code = QrCode::new(data.as_bytes()).map_err(|e| ProvisionError::Qr(e.to_string()))?;

        let svg = code
            .render::<svg::Color<'_>>()
            .min_dimensions(256, 256)
            .dark_color(svg::Color("#000000"))
            .light_color(svg::Color("#ffffff"))
            .build();

        // Two characters per module keeps the code roughly square in a terminal.
        let terminal = code
            .render::<char>()
            .module_dimensions(2, 1)
            .build();

        Ok(RenderedQr { svg, terminal })
    }
}
