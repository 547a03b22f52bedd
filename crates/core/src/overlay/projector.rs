use serde::Serialize;

use crate::detection::domain::observation::{DetectionResult, Point};
use crate::shared::constants::{
    FACE_BOX_OPACITY, INPUT_TENSOR_HEIGHT, INPUT_TENSOR_WIDTH, LANDMARK_RADIUS,
};
use crate::shared::platform::PlatformFamily;

pub const WHITE: [u8; 3] = [255, 255, 255];
pub const BLUE: [u8; 3] = [0, 0, 255];

/// How detections are turned into drawable shapes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayConfig {
    pub view_width: f32,
    pub view_height: f32,
    pub flip_horizontal: bool,
    pub landmark_radius: f32,
    pub box_opacity: f32,
}

impl OverlayConfig {
    pub fn for_platform(family: PlatformFamily) -> Self {
        Self {
            view_width: INPUT_TENSOR_WIDTH as f32,
            view_height: INPUT_TENSOR_HEIGHT as f32,
            flip_horizontal: family.mirrors_overlay(),
            landmark_radius: LANDMARK_RADIUS,
            box_opacity: FACE_BOX_OPACITY,
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self::for_platform(PlatformFamily::current())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Shape {
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        fill: [u8; 3],
        opacity: f32,
    },
    Circle {
        cx: f32,
        cy: f32,
        r: f32,
        fill: [u8; 3],
    },
}

/// Shapes in detector-tensor coordinates, plus how to place them on screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayTree {
    pub view_box: (f32, f32),
    pub flip_horizontal: bool,
    pub shapes: Vec<Shape>,
}

impl OverlayTree {
    pub fn empty(config: &OverlayConfig) -> Self {
        Self {
            view_box: (config.view_width, config.view_height),
            flip_horizontal: config.flip_horizontal,
            shapes: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn rects(&self) -> impl Iterator<Item = &Shape> {
        self.shapes.iter().filter(|s| matches!(s, Shape::Rect { .. }))
    }

    pub fn circles(&self) -> impl Iterator<Item = &Shape> {
        self.shapes.iter().filter(|s| matches!(s, Shape::Circle { .. }))
    }

    /// Map a view-box point onto a surface of `(width, height)` pixels.
    ///
    /// The view box is stretched to fill the surface. When flipped, x is
    /// reflected about the view box before scaling.
    pub fn to_surface(&self, point: Point, surface: (f32, f32)) -> Point {
        let sx = surface.0 / self.view_box.0;
        let sy = surface.1 / self.view_box.1;
        let x = if self.flip_horizontal {
            self.view_box.0 - point.x
        } else {
            point.x
        };
        Point::new(x * sx, point.y * sy)
    }

    /// Surface scale factors `(sx, sy)` for `(width, height)` pixels.
    pub fn scale(&self, surface: (f32, f32)) -> (f32, f32) {
        (surface.0 / self.view_box.0, surface.1 / self.view_box.1)
    }
}

/// Build the overlay for the latest detection result.
///
/// Only the first observation is drawn: one translucent box and one dot per
/// landmark. No result, or a result without faces, yields an empty tree.
pub fn project(result: Option<&DetectionResult>, config: &OverlayConfig) -> OverlayTree {
    let mut tree = OverlayTree::empty(config);
    let Some(face) = result.and_then(DetectionResult::first) else {
        return tree;
    };

    tree.shapes.push(Shape::Rect {
        x: face.top_left.x,
        y: face.top_left.y,
        width: face.width(),
        height: face.height(),
        fill: WHITE,
        opacity: config.box_opacity,
    });
    tree.shapes.extend(face.landmarks.iter().map(|p| Shape::Circle {
        cx: p.x,
        cy: p.y,
        r: config.landmark_radius,
        fill: BLUE,
    }));
    tree
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::observation::Observation;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn observation(tl: (f32, f32), br: (f32, f32), landmarks: &[(f32, f32)]) -> Observation {
        Observation {
            top_left: tl.into(),
            bottom_right: br.into(),
            landmarks: landmarks.iter().copied().map(Point::from).collect(),
            probability: 0.9,
        }
    }

    fn config(flip: bool) -> OverlayConfig {
        OverlayConfig {
            flip_horizontal: flip,
            ..OverlayConfig::for_platform(PlatformFamily::Apple)
        }
    }

    #[test]
    fn test_single_face_yields_box_and_landmarks() {
        let result = DetectionResult::new(vec![observation(
            (10.0, 20.0),
            (50.0, 80.0),
            &[(15.0, 25.0), (45.0, 75.0)],
        )]);

        let tree = project(Some(&result), &config(false));

        let rects: Vec<_> = tree.rects().collect();
        assert_eq!(rects.len(), 1);
        assert_eq!(
            rects[0],
            &Shape::Rect {
                x: 10.0,
                y: 20.0,
                width: 40.0,
                height: 60.0,
                fill: WHITE,
                opacity: 0.2,
            }
        );
        let centers: Vec<_> = tree
            .circles()
            .map(|s| match s {
                Shape::Circle { cx, cy, r, fill } => {
                    assert_eq!(*r, 2.0);
                    assert_eq!(*fill, BLUE);
                    (*cx, *cy)
                }
                Shape::Rect { .. } => unreachable!(),
            })
            .collect();
        assert_eq!(centers, vec![(15.0, 25.0), (45.0, 75.0)]);
    }

    #[test]
    fn test_no_result_is_empty() {
        assert!(project(None, &config(false)).is_empty());
    }

    #[test]
    fn test_zero_observations_is_empty() {
        let tree = project(Some(&DetectionResult::empty()), &config(false));
        assert!(tree.is_empty());
        assert_eq!(tree.view_box, (152.0, 200.0));
    }

    #[test]
    fn test_only_first_observation_drawn() {
        let result = DetectionResult::new(vec![
            observation((0.0, 0.0), (10.0, 10.0), &[(5.0, 5.0)]),
            observation((100.0, 100.0), (140.0, 190.0), &[(110.0, 120.0), (130.0, 150.0)]),
        ]);

        let tree = project(Some(&result), &config(false));

        assert_eq!(tree.rects().count(), 1);
        assert_eq!(tree.circles().count(), 1);
        assert!(matches!(tree.shapes[0], Shape::Rect { x, width, .. } if x == 0.0 && width == 10.0));
    }

    #[rstest]
    #[case::mirrored(true, 152.0 - 15.0)]
    #[case::unmirrored(false, 15.0)]
    fn test_flip_reflects_x(#[case] flip: bool, #[case] expected_x: f32) {
        let result = DetectionResult::new(vec![observation((10.0, 20.0), (50.0, 80.0), &[(15.0, 25.0)])]);
        let tree = project(Some(&result), &config(flip));

        assert_eq!(tree.flip_horizontal, flip);
        let p = tree.to_surface(Point::new(15.0, 25.0), (152.0, 200.0));
        assert_relative_eq!(p.x, expected_x);
        assert_relative_eq!(p.y, 25.0);
    }

    #[test]
    fn test_to_surface_scales_to_fill() {
        let tree = OverlayTree::empty(&config(true));
        let p = tree.to_surface(Point::new(38.0, 50.0), (608.0, 400.0));
        assert_relative_eq!(p.x, (152.0 - 38.0) * 4.0);
        assert_relative_eq!(p.y, 100.0);
        assert_eq!(tree.scale((608.0, 400.0)), (4.0, 2.0));
    }

    #[rstest]
    #[case::apple(PlatformFamily::Apple, false)]
    #[case::other(PlatformFamily::Other, true)]
    fn test_platform_controls_flip(#[case] family: PlatformFamily, #[case] flip: bool) {
        let cfg = OverlayConfig::for_platform(family);
        assert_eq!(cfg.flip_horizontal, flip);
        assert_eq!((cfg.view_width, cfg.view_height), (152.0, 200.0));
    }
}
