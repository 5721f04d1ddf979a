//! QR code rendering for pairing addresses.
//!
//! The QR payload is the pairing string itself (see [`crate::pairing`]), so
//! a scanner only has to run [`crate::pairing::decode_address`] on what it
//! reads.
//!
//! ## Example
//!
//! ```rust,ignore
//! use lanbeam_core::{pairing, qr};
//!
//! let text = pairing::encode_address("192.168.1.20", 4000, "Laptop");
//! println!("{}", qr::render_ascii(&text)?);
//! ```

use qrcode::render::{svg, unicode};
use qrcode::{EcLevel, QrCode};

use crate::error::{Error, Result};

fn build(text: &str) -> Result<QrCode> {
    QrCode::with_error_correction_level(text, EcLevel::M)
        .map_err(|e| Error::Internal(format!("Failed to generate QR code: {e}")))
}

/// Render a QR code as Unicode half blocks for terminal display.
///
/// # Errors
///
/// Returns an error if the text does not fit in a QR code.
pub fn render_ascii(text: &str) -> Result<String> {
    let rendered = build(text)?
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .build();

    Ok(rendered)
}

/// Render a QR code as an SVG document.
///
/// # Errors
///
/// Returns an error if the text does not fit in a QR code.
pub fn render_svg(text: &str) -> Result<String> {
    let svg_string = build(text)?
        .render::<svg::Color>()
        .min_dimensions(200, 200)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build();

    Ok(svg_string)
}
