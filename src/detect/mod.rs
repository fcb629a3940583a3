pub mod annotate;
mod backend;
mod backends;
pub mod decode;
mod registry;
mod result;

pub use backend::Detector;
pub use backends::StubDetector;
#[cfg(feature = "backend-tract")]
pub use backends::TractDetector;
pub use registry::{open_detector, shared, SharedDetector, BACKEND_NAMES};
pub use result::{BoundingBox, Detection, DetectionOutput};
