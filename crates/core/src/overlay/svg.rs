use std::fmt::Write;

use crate::overlay::projector::{OverlayTree, Shape};

fn hex(rgb: [u8; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2])
}

/// Serialize an overlay as a standalone SVG document sized to its view box.
pub fn render(tree: &OverlayTree) -> String {
    let (w, h) = tree.view_box;
    let mut out = String::new();
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#
    );
    if tree.flip_horizontal {
        let _ = writeln!(out, r#"  <g transform="translate({w}, 0) scale(-1, 1)">"#);
    } else {
        out.push_str("  <g>\n");
    }

    for shape in &tree.shapes {
        match shape {
            Shape::Rect {
                x,
                y,
                width,
                height,
                fill,
                opacity,
            } => {
                let _ = writeln!(
                    out,
                    r#"    <rect x="{x}" y="{y}" width="{width}" height="{height}" fill="{}" fill-opacity="{opacity}"/>"#,
                    hex(*fill)
                );
            }
            Shape::Circle { cx, cy, r, fill } => {
                let _ = writeln!(
                    out,
                    r#"    <circle cx="{cx}" cy="{cy}" r="{r}" fill="{}"/>"#,
                    hex(*fill)
                );
            }
        }
    }

    out.push_str("  </g>\n</svg>\n");
    out
}
