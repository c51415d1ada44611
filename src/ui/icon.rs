#[cfg(any(target_os = "windows", target_os = "macos"))]
use anyhow::{Result, anyhow};
#[cfg(any(target_os = "windows", target_os = "macos"))]
use tray_icon::Icon;

use crate::resolver::{IconKind, VisualState};

pub const ICON_SIZE: u32 = 32;

const ALERT_COLOR: [u8; 3] = [255, 196, 0];

/// Fill color of the status dot.
pub fn icon_color(kind: IconKind) -> [u8; 3] {
    match kind {
        IconKind::Neutral => [120, 144, 156],
        IconKind::Stopped => [229, 57, 53],
        IconKind::Starting => [251, 140, 0],
        IconKind::Running => [67, 160, 71],
    }
}

/// Draws the tray icon as RGBA: a status dot, plus a badge in the top-right
/// corner when updates are available.
pub fn render_rgba(state: VisualState, size: u32) -> Vec<u8> {
    let s = size as f32;
    let dot = (s / 2.0, s / 2.0, s * 0.42);
    let badge = (s * 0.78, s * 0.22, s * 0.2);
    let dot_color = icon_color(state.kind);

    let mut rgba = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let (px, py) = (x as f32 + 0.5, y as f32 + 0.5);
            let mut pixel = [0u8; 4];
            let dot_cover = coverage(px, py, dot);
            if dot_cover > 0.0 {
                pixel = blend(pixel, dot_color, dot_cover);
            }
            if state.alert {
                let badge_cover = coverage(px, py, badge);
                if badge_cover > 0.0 {
                    pixel = blend(pixel, ALERT_COLOR, badge_cover);
                }
            }
            rgba.extend_from_slice(&pixel);
        }
    }
    rgba
}

/// Anti-aliased coverage of a circle `(cx, cy, r)` at a pixel center.
fn coverage(px: f32, py: f32, (cx, cy, r): (f32, f32, f32)) -> f32 {
    let d = ((px - cx).powi(2) + (py - cy).powi(2)).sqrt();
    (r + 0.5 - d).clamp(0.0, 1.0)
}

fn blend(under: [u8; 4], color: [u8; 3], cover: f32) -> [u8; 4] {
    let a = cover;
    let mix = |c: u8, u: u8| (c as f32 * a + u as f32 * (1.0 - a)).round() as u8;
    let alpha = (255.0 * a + under[3] as f32 * (1.0 - a)).round() as u8;
    [
        mix(color[0], under[0]),
        mix(color[1], under[1]),
        mix(color[2], under[2]),
        alpha,
    ]
}

#[cfg(any(target_os = "windows", target_os = "macos"))]
pub fn create_icon(state: VisualState) -> Result<Icon> {
    Icon::from_rgba(render_rgba(state, ICON_SIZE), ICON_SIZE, ICON_SIZE)
        .map_err(|e| anyhow!("failed to create icon: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(rgba: &[u8], size: u32, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * size + x) * 4) as usize;
        [rgba[i], rgba[i + 1], rgba[i + 2], rgba[i + 3]]
    }

    #[test]
    fn dot_uses_state_color() {
        let rgba = render_rgba(VisualState::new(IconKind::Stopped, false), ICON_SIZE);
        assert_eq!(rgba.len(), (ICON_SIZE * ICON_SIZE * 4) as usize);
        let [r, g, b, a] = pixel(&rgba, ICON_SIZE, 16, 16);
        assert_eq!([r, g, b], icon_color(IconKind::Stopped));
        assert_eq!(a, 255);
    }

    #[test]
    fn corners_are_transparent() {
        let rgba = render_rgba(VisualState::new(IconKind::Running, false), ICON_SIZE);
        assert_eq!(pixel(&rgba, ICON_SIZE, 0, ICON_SIZE - 1)[3], 0);
        assert_eq!(pixel(&rgba, ICON_SIZE, 0, 0)[3], 0);
    }

    #[test]
    fn alert_adds_badge() {
        let plain = render_rgba(VisualState::new(IconKind::Neutral, false), ICON_SIZE);
        let alert = render_rgba(VisualState::new(IconKind::Neutral, true), ICON_SIZE);
        assert_ne!(plain, alert);
        let [r, g, b, _] = pixel(&alert, ICON_SIZE, 25, 7);
        assert_eq!([r, g, b], ALERT_COLOR);
    }
}
