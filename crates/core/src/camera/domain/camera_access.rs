/// Host permission gate for camera access.
pub trait CameraAccess: Send {
    /// Ask the host OS for camera access, blocking until it answers.
    fn request_permission(&self) -> bool;
}

/// Access policy for hosts that never prompt (still images, tests).
pub struct AlwaysGranted;

impl CameraAccess for AlwaysGranted {
    fn request_permission(&self) -> bool {
        true
    }
}
