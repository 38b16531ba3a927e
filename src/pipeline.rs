//! End-to-end generation: layout + timing + options → synthesized sequence.

use serde::Serialize;
use tracing::info;

use crate::config::GeneratorConfig;
use crate::error::SynthError;
use crate::import::ParsedLayout;
use crate::layout::{GroupRecommendation, GroupRecommender, LayoutTreeResolver, NameMatcher, ResolvedLayout};
use crate::model::{SequenceSummary, SynthesizedSequence};
use crate::plan::{HousePlan, IntentPlanner};
use crate::synth::{EffectTimelineSynthesizer, GenerationOptions};
use crate::timing::{TimingNormalizer, TimingSource};

/// Result of one generation request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutput {
    pub summary: SequenceSummary,
    pub sequence: SynthesizedSequence,
    /// Entries skipped while resolving the layout.
    pub warnings: Vec<String>,
}

/// All pipeline stages, built once from a config and reusable across
/// requests. Holds no per-request state.
pub struct SequenceGenerator {
    resolver: LayoutTreeResolver,
    recommender: GroupRecommender,
    normalizer: TimingNormalizer,
    synthesizer: EffectTimelineSynthesizer,
    planner: IntentPlanner,
}

impl Default for SequenceGenerator {
    fn default() -> Self {
        Self::new(&GeneratorConfig::default())
    }
}

impl SequenceGenerator {
    pub fn new(config: &GeneratorConfig) -> Self {
        Self {
            resolver: LayoutTreeResolver::new(NameMatcher::default()),
            recommender: GroupRecommender::new(config.recommend.clone()),
            normalizer: TimingNormalizer::new(config.timing.fallback_bpm),
            synthesizer: EffectTimelineSynthesizer::new(config.style.clone()),
            planner: IntentPlanner::new(NameMatcher::default()),
        }
    }

    pub fn resolve(&self, layout: &ParsedLayout) -> ResolvedLayout {
        let mut resolved = self.resolver.resolve(&layout.fixtures, &layout.groups);
        let mut warnings = layout.warnings.clone();
        warnings.append(&mut resolved.warnings);
        resolved.warnings = warnings;
        resolved
    }

    pub fn recommend(&self, layout: &ParsedLayout) -> Vec<GroupRecommendation> {
        self.recommender.recommend(&self.resolve(layout).tree)
    }

    /// Run the whole pipeline. A `plan` is only expanded when the options
    /// carry no explicit intents.
    pub fn generate(
        &self,
        layout: &ParsedLayout,
        timing: &TimingSource,
        options: &GenerationOptions,
        plan: Option<&HousePlan>,
    ) -> Result<GenerationOutput, SynthError> {
        let resolved = self.resolve(layout);
        if resolved.tree.fixtures().is_empty() {
            return Err(SynthError::EmptyLayout);
        }
        let timeline = self.normalizer.normalize(timing, &options.timing)?;

        let has_intents = options.intents.as_ref().is_some_and(|i| !i.is_empty());
        let planned;
        let options = match plan {
            Some(plan) if !has_intents => {
                let intents = self.planner.plan_for_tree(plan, &timeline, &resolved.tree);
                planned = GenerationOptions {
                    intents: Some(intents),
                    ..options.clone()
                };
                &planned
            }
            _ => options,
        };

        let sequence = self.synthesizer.synthesize(&resolved.tree, &timeline, options)?;
        let summary = sequence.summary(timeline.origin());
        info!(
            fixtures = summary.fixture_count,
            spans = summary.span_count,
            warnings = resolved.warnings.len(),
            "generation complete"
        );
        Ok(GenerationOutput {
            summary,
            sequence,
            warnings: resolved.warnings,
        })
    }
}
