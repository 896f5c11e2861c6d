pub mod motion;
pub mod null;

pub use motion::MotionBackend;
pub use null::NullBackend;
