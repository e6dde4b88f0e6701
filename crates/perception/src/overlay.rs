//! Mark overlay compositing: boxes + labels drawn onto the screenshot
//! image in draw order (§4.4 step 4).

use ab_glyph::{FontArc, PxScale};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use sa_domain::som::{MarkEntry, NodeType, SomMap};

/// Paths checked, in order, for a label font. `SA_OVERLAY_FONT_PATH`
/// wins when set; otherwise the common DejaVu/Arial install locations
/// on Linux and macOS are tried. Returns `None` if none resolve — boxes
/// still draw without index labels in that case.
fn font_candidates() -> Vec<String> {
    let mut candidates = Vec::new();
    if let Ok(path) = std::env::var("SA_OVERLAY_FONT_PATH") {
        candidates.push(path);
    }
    candidates.extend([
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf".to_string(),
        "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf".to_string(),
        "/usr/share/fonts/TTF/DejaVuSans.ttf".to_string(),
        "/System/Library/Fonts/Supplemental/Arial.ttf".to_string(),
        "/System/Library/Fonts/Supplemental/Arial Bold.ttf".to_string(),
    ]);
    candidates
}

pub fn resolve_font() -> Option<FontArc> {
    for path in font_candidates() {
        if let Ok(bytes) = std::fs::read(&path) {
            if let Ok(font) = FontArc::try_from_vec(bytes) {
                return Some(font);
            }
        }
    }
    None
}

const CLICKABLE_COLOR: Rgba<u8> = Rgba([220, 20, 20, 220]);
const SCROLLABLE_COLOR: Rgba<u8> = Rgba([20, 180, 20, 220]);
const LABEL_BG: Rgba<u8> = Rgba([0, 0, 0, 190]);
const LABEL_FG: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Draw order ascending by mark index (§4.4 step 3): boxes assigned a
/// smaller index were selected as smaller, so they draw last and stay on
/// top of larger, earlier-drawn ones.
pub fn draw_order(marks: &SomMap) -> Vec<String> {
    let mut keys: Vec<String> = marks.keys().cloned().collect();
    keys.sort_by_key(|k| k.parse::<u32>().unwrap_or(u32::MAX));
    keys
}

/// Composite every mark onto `image`. `font` is optional — without one,
/// boxes and label backgrounds still draw, just without the index text.
pub fn render(image: &mut RgbaImage, marks: &SomMap, font: Option<&FontArc>) {
    for mark in draw_order(marks) {
        let Some(entry) = marks.get(&mark) else {
            continue;
        };
        draw_one(image, &mark, entry, font);
    }
}

fn draw_one(image: &mut RgbaImage, label: &str, entry: &MarkEntry, font: Option<&FontArc>) {
    let color = match entry.node_type {
        NodeType::Clickable => CLICKABLE_COLOR,
        NodeType::Scrollable => SCROLLABLE_COLOR,
    };
    let [[x1, y1], [x2, y2]] = entry.bounds;
    let width = (x2 - x1).max(1) as u32;
    let height = (y2 - y1).max(1) as u32;
    let rect = Rect::at(x1 as i32, y1 as i32).of_size(width, height);
    draw_hollow_rect_mut(image, rect, color);

    // Clickable labels sit top-left, scrollable labels top-right, per
    // §4.4 step 4.
    let label_width = 14 + 10 * label.chars().count() as i32;
    let label_x = match entry.node_type {
        NodeType::Clickable => x1 as i32,
        NodeType::Scrollable => (x2 as i32 - label_width).max(x1 as i32),
    };
    let label_rect = Rect::at(label_x, y1 as i32).of_size(label_width.max(1) as u32, 18);
    draw_filled_rect_mut(image, label_rect, LABEL_BG);

    if let Some(font) = font {
        draw_text_mut(
            image,
            LABEL_FG,
            label_x + 2,
            y1 as i32,
            PxScale::from(16.0),
            font,
            label,
        );
    }
}
