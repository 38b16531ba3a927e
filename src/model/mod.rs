pub mod analysis;
pub mod color;
pub mod fixture;
pub mod timeline;

// Re-export commonly used types at the model level.
pub use analysis::{seconds_to_ms, Timeline, TimingOrigin, TimingResult};
pub use color::Color;
pub use fixture::{
    Fixture, GroupDecl, GroupOrigin, LayoutTree, NodeId, NodeKind, TreeNode, ROOT_NAME,
};
pub use timeline::{
    param, EffectKind, EffectParams, EffectSpan, FixtureTimeline, SequenceSummary,
    SynthesizedSequence, TimingTrack,
};
