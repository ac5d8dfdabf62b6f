mod candle;
mod client;
mod model;
mod types;
mod vocab;

pub use candle::{CandleEngine, CandleLoader};
pub use client::{EngineLoader, InferenceEngine};
pub use types::*;
