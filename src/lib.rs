mod app;
mod detection;
mod labels;
mod model_service;
mod ort_service;
mod server;
mod service;
mod weights;

pub mod config;
pub mod framing;

pub use app::start_app;
pub use detection::{Detection, DetectionError, ErrorReply};
pub use model_service::ModelService;
pub use server::{ReplyServer, ServerError};
