use iced::mouse;
use iced::widget::canvas::{self, Frame, Geometry, Path};
use iced::{Color, Rectangle, Renderer, Size, Theme};

use facemark_core::detection::domain::observation::Point;
use facemark_core::overlay::projector::{OverlayTree, Shape};

/// Transparent canvas layer that draws an [`OverlayTree`] stretched over
/// its bounds.
pub struct OverlayCanvas<'a> {
    tree: &'a OverlayTree,
}

impl<'a> OverlayCanvas<'a> {
    pub fn new(tree: &'a OverlayTree) -> Self {
        Self { tree }
    }
}

impl<Message> canvas::Program<Message> for OverlayCanvas<'_> {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        let surface = (bounds.width, bounds.height);
        let (sx, sy) = self.tree.scale(surface);

        for shape in &self.tree.shapes {
            match *shape {
                Shape::Rect {
                    x,
                    y,
                    width,
                    height,
                    fill,
                    opacity,
                } => {
                    // Mirroring moves the left edge to the right.
                    let left = if self.tree.flip_horizontal { x + width } else { x };
                    let origin = self.tree.to_surface(Point::new(left, y), surface);
                    let path = Path::rectangle(
                        iced::Point::new(origin.x, origin.y),
                        Size::new(width * sx, height * sy),
                    );
                    frame.fill(&path, color(fill, opacity));
                }
                Shape::Circle { cx, cy, r, fill } => {
                    let center = self.tree.to_surface(Point::new(cx, cy), surface);
                    let path = Path::circle(iced::Point::new(center.x, center.y), r * sx.min(sy));
                    frame.fill(&path, color(fill, 1.0));
                }
            }
        }

        vec![frame.into_geometry()]
    }
}

fn color(rgb: [u8; 3], alpha: f32) -> Color {
    Color::from_rgba8(rgb[0], rgb[1], rgb[2], alpha)
}
