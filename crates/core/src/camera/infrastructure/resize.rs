use image::imageops::FilterType;
use image::RgbImage;

use crate::camera::domain::camera_config::{ResizeMethod, ResizeTarget};
use crate::camera::domain::frame_source::CameraError;
use crate::shared::frame::Frame;

/// Shrink an RGB frame to the detector input resolution.
///
/// The output keeps the source frame's sequence number.
pub fn resize_frame(
    frame: &Frame,
    target: ResizeTarget,
    method: ResizeMethod,
) -> Result<Frame, CameraError> {
    if frame.channels() != 3 || target.depth != 3 {
        return Err(CameraError::Decode(format!(
            "expected 3-channel frames, got {} -> {}",
            frame.channels(),
            target.depth
        )));
    }
    if frame.width() == 0 || frame.height() == 0 {
        return Err(CameraError::Decode("empty frame".into()));
    }

    let data = match method {
        ResizeMethod::Filtered => filtered(frame, target)?,
        ResizeMethod::Nearest => nearest(frame, target),
    };
    Ok(Frame::new(
        data,
        target.width,
        target.height,
        target.depth,
        frame.sequence(),
    ))
}

fn filtered(frame: &Frame, target: ResizeTarget) -> Result<Vec<u8>, CameraError> {
    let img = RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
        .ok_or_else(|| CameraError::Decode("frame buffer does not match dimensions".into()))?;
    let resized = image::imageops::resize(&img, target.width, target.height, FilterType::Triangle);
    Ok(resized.into_raw())
}

fn nearest(frame: &Frame, target: ResizeTarget) -> Vec<u8> {
    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let (tw, th) = (target.width as usize, target.height as usize);

    let mut out = Vec::with_capacity(tw * th * 3);
    for y in 0..th {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / th as f64) as usize).min(src_h - 1);
        for x in 0..tw {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / tw as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                out.push(src[[src_y, src_x, c]]);
            }
        }
    }
    out
}
