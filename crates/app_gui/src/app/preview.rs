//! Thumbnail of the selected fingerprint.

use anyhow::Context;
use eframe::egui;
use image::RgbaImage;
use std::path::Path;

pub(crate) const PREVIEW_SIZE: u32 = 200;

/// Decode `path` into a texture no larger than [`PREVIEW_SIZE`] on either side.
pub(crate) fn load_preview(ctx: &egui::Context, path: &Path) -> Option<egui::TextureHandle> {
    match decode_thumbnail(path) {
        Ok(thumb) => {
            let (w, h) = thumb.dimensions();
            let size = [w as usize, h as usize];
            let pixels = thumb.into_raw();
            let color = egui::ColorImage::from_rgba_unmultiplied(size, &pixels);
            let name = format!("preview:{}", path.display());
            Some(ctx.load_texture(name, color, egui::TextureOptions::LINEAR))
        }
        Err(e) => {
            tracing::warn!("Failed to load preview: {e:#}");
            None
        }
    }
}

fn decode_thumbnail(path: &Path) -> anyhow::Result<RgbaImage> {
    let img = image::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    Ok(img.thumbnail(PREVIEW_SIZE, PREVIEW_SIZE).to_rgba8())
}

/// Rectangle of `size` centered inside `area`, shrunk to fit if needed.
pub(crate) fn centered_fit(area: egui::Rect, size: egui::Vec2) -> egui::Rect {
    let scale = (area.width() / size.x).min(area.height() / size.y).min(1.0);
    egui::Rect::from_center_size(area.center(), size * scale)
}
