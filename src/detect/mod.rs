mod backend;
mod backends;
mod threaded;

pub use backend::{Detector, DetectorBackend};
pub use backends::motion::MOTION_ENTITY_ID;
pub use backends::{MotionBackend, NullBackend};
pub use threaded::ThreadedDetector;
