use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{Fixture, LayoutTree};

/// Why a recommendation was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecommendReason {
    KeywordMatch,
    PrefixFamily,
    SizeLarge,
    SizeSmall,
}

/// A proposed fixture grouping. Advisory only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecommendation {
    pub name: String,
    pub members: BTreeSet<String>,
    pub reason: RecommendReason,
}

/// Tunables for `GroupRecommender`. Every field has a default so a partial
/// config section only overrides what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecommendSettings {
    /// category → keywords, matched case-insensitively as substrings
    pub keywords: IndexMap<String, Vec<String>>,
    pub large_min_nodes: u32,
    pub large_min_strings: u32,
    /// fixtures with `0 < nodes < small_max_nodes` are small
    pub small_max_nodes: u32,
    pub min_members: usize,
}

impl Default for RecommendSettings {
    fn default() -> Self {
        let table: [(&str, &[&str]); 8] = [
            ("mega_tree", &["mega", "megatree", "tree"]),
            ("arches", &["arch", "arches"]),
            ("matrix", &["matrix", "panel", "screen"]),
            ("windows", &["window", "windows"]),
            ("roofline", &["roof", "eaves", "gutter", "ridge"]),
            ("garland", &["garland", "swag"]),
            ("spinner", &["spinner", "starburst"]),
            ("stars", &["star", "stars"]),
        ];
        Self {
            keywords: table
                .iter()
                .map(|(cat, words)| {
                    (
                        (*cat).to_string(),
                        words.iter().map(|w| (*w).to_string()).collect(),
                    )
                })
                .collect(),
            large_min_nodes: 500,
            large_min_strings: 24,
            small_max_nodes: 200,
            min_members: 2,
        }
    }
}

/// Proposes candidate groups over a resolved tree. The three heuristics are
/// independent, so a fixture may show up in several recommendations.
#[derive(Debug, Clone, Default)]
pub struct GroupRecommender {
    settings: RecommendSettings,
}

impl GroupRecommender {
    pub fn new(settings: RecommendSettings) -> Self {
        Self { settings }
    }

    pub fn recommend(&self, tree: &LayoutTree) -> Vec<GroupRecommendation> {
        let fixtures = tree.fixtures();
        let mut out: IndexMap<String, GroupRecommendation> = IndexMap::new();
        let candidates = self
            .keyword_groups(&fixtures)
            .into_iter()
            .chain(self.prefix_families(&fixtures))
            .chain(self.size_classes(&fixtures));
        for rec in candidates {
            // Later heuristics replace earlier ones with the same name.
            out.insert(rec.name.clone(), rec);
        }
        debug!(count = out.len(), "group recommendations");
        out.into_values().collect()
    }

    fn keyword_groups(&self, fixtures: &[&Fixture]) -> Vec<GroupRecommendation> {
        let lowered: Vec<(String, &str)> = fixtures
            .iter()
            .map(|f| (f.name.to_lowercase(), f.name.as_str()))
            .collect();
        self.settings
            .keywords
            .iter()
            .filter_map(|(category, words)| {
                let members: BTreeSet<String> = lowered
                    .iter()
                    .filter(|(low, _)| words.iter().any(|w| low.contains(&w.to_lowercase())))
                    .map(|(_, name)| (*name).to_string())
                    .collect();
                self.accept(category.clone(), members, RecommendReason::KeywordMatch)
            })
            .collect()
    }

    fn prefix_families(&self, fixtures: &[&Fixture]) -> Vec<GroupRecommendation> {
        let mut families: IndexMap<String, BTreeSet<String>> = IndexMap::new();
        for fixture in fixtures {
            let normalized = fixture.name.replace(':', "-");
            let mut parts = normalized.split('-');
            let (Some(first), Some(_)) = (parts.next(), parts.next()) else {
                continue;
            };
            let prefix = first.trim();
            if prefix.is_empty() {
                continue;
            }
            families
                .entry(prefix.to_string())
                .or_default()
                .insert(fixture.name.clone());
        }
        families
            .into_iter()
            .filter_map(|(prefix, members)| {
                self.accept(format!("{prefix}_family"), members, RecommendReason::PrefixFamily)
            })
            .collect()
    }

    fn size_classes(&self, fixtures: &[&Fixture]) -> Vec<GroupRecommendation> {
        let s = &self.settings;
        let large: BTreeSet<String> = fixtures
            .iter()
            .filter(|f| {
                f.node_count.is_some_and(|n| n >= s.large_min_nodes)
                    || f.string_count.is_some_and(|n| n >= s.large_min_strings)
            })
            .map(|f| f.name.clone())
            .collect();
        let small: BTreeSet<String> = fixtures
            .iter()
            .filter(|f| f.node_count.is_some_and(|n| n > 0 && n < s.small_max_nodes))
            .map(|f| f.name.clone())
            .collect();
        [
            self.accept("large_props".into(), large, RecommendReason::SizeLarge),
            self.accept("small_props".into(), small, RecommendReason::SizeSmall),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    fn accept(
        &self,
        name: String,
        members: BTreeSet<String>,
        reason: RecommendReason,
    ) -> Option<GroupRecommendation> {
        (members.len() >= self.settings.min_members).then_some(GroupRecommendation {
            name,
            members,
            reason,
        })
    }
}
