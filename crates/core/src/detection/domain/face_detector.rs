use crate::detection::domain::observation::DetectionResult;
use crate::shared::frame_tensor::FrameTensor;

/// Domain interface for face detection.
///
/// Implementations may hold mutable inference state, hence `&mut self`.
/// Coordinates in the result are expressed in the tensor's pixel space.
pub trait FaceDetector: Send {
    fn estimate_faces(
        &mut self,
        tensor: &FrameTensor,
    ) -> Result<DetectionResult, Box<dyn std::error::Error>>;
}
