use eframe::egui::{Color32, Pos2, Rect, Vec2};

pub(super) const ACCENT: Color32 = Color32::from_rgb(239, 108, 77);
pub(super) const BACKGROUND: Color32 = Color32::from_rgb(244, 242, 237);
pub(super) const MUTED_LINK: Color32 = Color32::from_rgb(43, 90, 87);
pub(super) const NODE_OUTLINE: Color32 = Color32::from_rgb(16, 37, 36);
pub(super) const PARTICLE_HIGHLIGHT: Color32 = Color32::from_rgb(255, 245, 238);

const LAYER_HUE_START: f32 = 185.0;
const LAYER_HUE_END: f32 = 35.0;
const LAYER_SATURATION: f32 = 0.45;
const LAYER_LIGHTNESS: f32 = 0.42;

pub(super) fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let inverse = 1.0 - amount;

    Color32::from_rgb(
        ((base.r() as f32 * inverse) + (overlay.r() as f32 * amount)) as u8,
        ((base.g() as f32 * inverse) + (overlay.g() as f32 * amount)) as u8,
        ((base.b() as f32 * inverse) + (overlay.b() as f32 * amount)) as u8,
    )
}

pub(super) fn with_alpha(color: Color32, alpha: f32) -> Color32 {
    Color32::from_rgba_unmultiplied(
        color.r(),
        color.g(),
        color.b(),
        (alpha.clamp(0.0, 1.0) * 255.0) as u8,
    )
}

/// Base color for a layer ordinal: a hue sweep from teal toward amber across
/// the known layer sequence, fixed saturation and lightness. Computed once at
/// node creation, not per frame.
pub(super) fn layer_color(layer_index: usize, layer_count: usize) -> Color32 {
    let span = (layer_count.max(2) - 1) as f32;
    let t = (layer_index as f32 / span).clamp(0.0, 1.0);
    let hue = LAYER_HUE_START + (LAYER_HUE_END - LAYER_HUE_START) * t;
    hsl_to_rgb(hue / 360.0, LAYER_SATURATION, LAYER_LIGHTNESS)
}

fn hsl_to_rgb(h: f32, s: f32, l: f32) -> Color32 {
    if s == 0.0 {
        let gray = (l * 255.0).round() as u8;
        return Color32::from_rgb(gray, gray, gray);
    }

    fn hue_to_channel(p: f32, q: f32, t: f32) -> f32 {
        let mut t = t;
        if t < 0.0 {
            t += 1.0;
        }
        if t > 1.0 {
            t -= 1.0;
        }
        if t < 1.0 / 6.0 {
            return p + (q - p) * 6.0 * t;
        }
        if t < 1.0 / 2.0 {
            return q;
        }
        if t < 2.0 / 3.0 {
            return p + (q - p) * (2.0 / 3.0 - t) * 6.0;
        }
        p
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;

    Color32::from_rgb(
        (hue_to_channel(p, q, h + 1.0 / 3.0) * 255.0).round() as u8,
        (hue_to_channel(p, q, h) * 255.0).round() as u8,
        (hue_to_channel(p, q, h - 1.0 / 3.0) * 255.0).round() as u8,
    )
}

pub(super) fn world_to_screen(rect: Rect, center: Vec2, zoom: f32, world: Vec2) -> Pos2 {
    rect.center() + (world - center) * zoom
}

pub(super) fn screen_to_world(rect: Rect, center: Vec2, zoom: f32, screen: Pos2) -> Vec2 {
    (screen - rect.center()) / zoom + center
}

#[cfg(test)]
mod tests {
    use super::*;
    use eframe::egui::{pos2, vec2};

    #[test]
    fn blend_interpolates_between_endpoints() {
        let base = Color32::from_rgb(0, 0, 0);
        let overlay = Color32::from_rgb(200, 100, 50);

        assert_eq!(blend_color(base, overlay, 0.0), base);
        assert_eq!(blend_color(base, overlay, 1.0), overlay);
        let half = blend_color(base, overlay, 0.5);
        assert_eq!(half.r(), 100);
        assert_eq!(half.g(), 50);
        assert_eq!(half.b(), 25);
    }

    #[test]
    fn layer_palette_sweeps_teal_to_amber() {
        let first = layer_color(0, 8);
        let last = layer_color(7, 8);

        // Hue 185 is blue-green: more blue/green than red.
        assert!(first.b() > first.r());
        // Hue 35 is amber: more red than blue.
        assert!(last.r() > last.b());

        // Out-of-range ordinals clamp instead of wrapping.
        assert_eq!(layer_color(12, 8), last);
    }

    #[test]
    fn transforms_round_trip() {
        let rect = Rect::from_min_size(pos2(0.0, 0.0), vec2(800.0, 600.0));
        let center = vec2(12.0, -40.0);
        let zoom = 1.7;

        let world = vec2(33.0, 21.0);
        let screen = world_to_screen(rect, center, zoom, world);
        let back = screen_to_world(rect, center, zoom, screen);

        assert!((back - world).length() < 1e-4);
    }
}
