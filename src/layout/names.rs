//! Name normalization and fuzzy matching for fixture and group names.
//!
//! Layout exports name things inconsistently (`MegaTree-Left`, `megatree:2`,
//! `Focal Tree` vs `Focal_Tree`), so matching is done on a normalized form and
//! positional suffixes are recognised through a small table of matchers.

use indexmap::IndexMap;

/// Characters that may separate a base name from its suffix.
pub const SUFFIX_SEPARATORS: [char; 4] = ['-', ':', '_', ' '];

/// Lower-case and strip everything that is not alphanumeric (Unicode-aware).
pub fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Which family a recognised suffix belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuffixKind {
    Numeric,
    Positional,
}

/// One entry of the suffix table. New naming conventions are supported by
/// adding a matcher, not by touching resolution logic.
pub trait SuffixMatcher: Send + Sync {
    fn kind(&self) -> SuffixKind;

    /// `suffix` is already lower-cased.
    fn matches(&self, suffix: &str) -> bool;
}

/// `-1`, `:02`, ...
pub struct DigitSuffix;

impl SuffixMatcher for DigitSuffix {
    fn kind(&self) -> SuffixKind {
        SuffixKind::Numeric
    }

    fn matches(&self, suffix: &str) -> bool {
        !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit())
    }
}

/// A fixed word list such as left/right/top/bottom.
pub struct WordSuffix {
    words: Vec<String>,
}

impl WordSuffix {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            words: words.into_iter().map(|w| w.as_ref().to_lowercase()).collect(),
        }
    }

    pub fn positional() -> Self {
        Self::new(["left", "right", "top", "bottom", "inner", "outer"])
    }
}

impl SuffixMatcher for WordSuffix {
    fn kind(&self) -> SuffixKind {
        SuffixKind::Positional
    }

    fn matches(&self, suffix: &str) -> bool {
        self.words.iter().any(|w| w == suffix)
    }
}

/// Result of splitting `<base><sep><suffix>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuffixMatch<'a> {
    pub base: &'a str,
    pub suffix: &'a str,
    pub kind: SuffixKind,
}

/// Stateless name utilities configured with a suffix matcher table.
pub struct NameMatcher {
    matchers: Vec<Box<dyn SuffixMatcher>>,
}

impl Default for NameMatcher {
    fn default() -> Self {
        Self::new(vec![
            Box::new(DigitSuffix),
            Box::new(WordSuffix::positional()),
        ])
    }
}

impl NameMatcher {
    pub fn new(matchers: Vec<Box<dyn SuffixMatcher>>) -> Self {
        Self { matchers }
    }

    /// Register an extra suffix convention.
    pub fn with_matcher(mut self, matcher: Box<dyn SuffixMatcher>) -> Self {
        self.matchers.push(matcher);
        self
    }

    /// Split `name` at its last separator if what follows is a known suffix.
    pub fn looks_like_suffix<'a>(&self, name: &'a str) -> Option<SuffixMatch<'a>> {
        let trimmed = name.trim();
        let sep = trimmed.rfind(SUFFIX_SEPARATORS)?;
        let base = trimmed.get(..sep)?.trim_end_matches(SUFFIX_SEPARATORS);
        let suffix = trimmed.get(sep + 1..)?;
        if base.is_empty() || suffix.is_empty() {
            return None;
        }
        let lowered = suffix.to_lowercase();
        self.matchers
            .iter()
            .find(|m| m.matches(&lowered))
            .map(|m| SuffixMatch {
                base,
                suffix,
                kind: m.kind(),
            })
    }

    /// First haystack entry whose normalized form contains the normalized
    /// needle. The whole needle is tried first, then its comma/slash/dash
    /// separated segments from longest to shortest.
    pub fn fuzzy_contains<'h, S: AsRef<str>>(&self, needle: &str, haystack: &'h [S]) -> Option<&'h str> {
        let normalized_haystack: Vec<(String, &str)> = haystack
            .iter()
            .map(|h| (normalize(h.as_ref()), h.as_ref()))
            .collect();

        candidates(needle).into_iter().find_map(|candidate| {
            normalized_haystack
                .iter()
                .find(|(norm, _)| norm.contains(&candidate))
                .map(|(_, original)| *original)
        })
    }

    /// Map each style-group label onto a layout group name. Unmatched labels
    /// are left out of the result.
    pub fn map_style_groups<L: AsRef<str>, G: AsRef<str>>(
        &self,
        labels: &[L],
        layout_groups: &[G],
    ) -> IndexMap<String, String> {
        labels
            .iter()
            .filter_map(|label| {
                self.fuzzy_contains(label.as_ref(), layout_groups)
                    .map(|g| (label.as_ref().to_string(), g.to_string()))
            })
            .collect()
    }
}

fn candidates(needle: &str) -> Vec<String> {
    let mut segments: Vec<&str> = needle
        .split([',', '/', '-'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    segments.sort_by_key(|s| std::cmp::Reverse(s.chars().count()));

    let mut out: Vec<String> = Vec::with_capacity(segments.len() + 1);
    for candidate in std::iter::once(needle).chain(segments) {
        let norm = normalize(candidate);
        if !norm.is_empty() && !out.contains(&norm) {
            out.push(norm);
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_punctuation_and_case() {
        assert_eq!(normalize("Mega-Tree: Left!"), "megatreeleft");
        assert_eq!(normalize("Focal_Tree"), "focaltree");
        assert_eq!(normalize("Étoile 2"), "étoile2");
    }

    #[test]
    fn recognises_numeric_and_positional_suffixes() {
        let m = NameMatcher::default();
        let hit = m.looks_like_suffix("MegaTree-Left").unwrap();
        assert_eq!(hit.base, "MegaTree");
        assert_eq!(hit.suffix, "Left");
        assert_eq!(hit.kind, SuffixKind::Positional);

        let hit = m.looks_like_suffix("Arch:2").unwrap();
        assert_eq!(hit.base, "Arch");
        assert_eq!(hit.kind, SuffixKind::Numeric);

        assert_eq!(m.looks_like_suffix("Window OUTER").unwrap().base, "Window");
    }

    #[test]
    fn rejects_names_without_known_suffix() {
        let m = NameMatcher::default();
        assert!(m.looks_like_suffix("MegaTree").is_none());
        assert!(m.looks_like_suffix("MegaTree_GROUP").is_none());
        assert!(m.looks_like_suffix("-1").is_none());
        assert!(m.looks_like_suffix("Tree-").is_none());
    }

    #[test]
    fn extra_matchers_extend_the_table() {
        let m = NameMatcher::default().with_matcher(Box::new(WordSuffix::new(["Center"])));
        assert_eq!(m.looks_like_suffix("Star_center").unwrap().base, "Star");
    }

    #[test]
    fn fuzzy_contains_tries_whole_needle_then_segments() {
        let m = NameMatcher::default();
        let groups = ["Focal Tree", "Garage"];
        assert_eq!(m.fuzzy_contains("Focal_Tree", &groups), Some("Focal Tree"));
        assert_eq!(m.fuzzy_contains("Garage/Porch", &groups), Some("Garage"));
        assert_eq!(m.fuzzy_contains("Other", &groups), None);
    }

    #[test]
    fn map_style_groups_omits_unmatched() {
        let m = NameMatcher::default();
        let mapping = m.map_style_groups(&["Focal_Tree", "Garage/Porch", "Other"], &["Focal Tree", "Garage"]);
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping["Focal_Tree"], "Focal Tree");
        assert_eq!(mapping["Garage/Porch"], "Garage");
    }
}
