pub mod backend;
pub mod onnx_blazeface_detector;
