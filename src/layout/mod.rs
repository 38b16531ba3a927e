pub mod names;
pub mod recommend;
pub mod resolver;

pub use names::{normalize, NameMatcher, SuffixKind, SuffixMatch, SuffixMatcher};
pub use recommend::{GroupRecommendation, GroupRecommender, RecommendReason, RecommendSettings};
pub use resolver::{LayoutTreeResolver, ResolvedLayout, SYNTHESIZED_GROUP_SUFFIX};
