//! Signal analysis stages, from order-book microstructure to validation.

pub mod context;
pub mod entry;
pub mod order_book;
pub mod pipeline;
pub mod risk;
pub mod validator;
pub mod volume_profile;

pub use context::{ContextConfig, IchimokuBias, Sentiment, WaveOverlay};
pub use entry::EntryConfig;
pub use order_book::{BookAnalysis, OrderBookConfig};
pub use pipeline::{Evaluation, Outcome, Pipeline, PipelineConfig};
pub use risk::{RiskConfig, RiskPlan};
pub use validator::{Rejection, ValidatorConfig};
pub use volume_profile::{VolumeNode, VolumeProfile, VolumeProfileConfig};
