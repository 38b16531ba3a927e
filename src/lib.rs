//! Beat-synchronised light-show sequence synthesis.
//!
//! A layout (fixtures + optional groups) is resolved into a tree, a timing
//! analysis is normalized into a timeline, and the synthesizer emits one
//! gap-free effect span sequence per fixture.

pub mod analysis;
pub mod config;
pub mod describe;
pub mod error;
pub mod import;
pub mod layout;
pub mod model;
pub mod pipeline;
pub mod plan;
pub mod synth;
pub mod timing;

pub use config::{load_config, GeneratorConfig};
pub use error::SynthError;
pub use pipeline::{GenerationOutput, SequenceGenerator};
pub use synth::{EffectTimelineSynthesizer, GenerationOptions};
pub use timing::{TimingNormalizer, TimingOptions, TimingSource};
