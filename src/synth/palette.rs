use tracing::warn;

use crate::model::Color;

/// Color rotation for one generation run. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Color>,
}

impl Palette {
    /// Build from request entries. Malformed entries are dropped one by one;
    /// if nothing usable remains, `fallback` is used.
    pub fn resolve<S: AsRef<str>>(entries: Option<&[S]>, fallback: &[Color]) -> Self {
        let parsed: Vec<Color> = entries
            .unwrap_or_default()
            .iter()
            .filter_map(|entry| {
                let entry = entry.as_ref();
                let color = Color::from_hex(entry);
                if color.is_none() {
                    warn!(entry, "dropping malformed palette entry");
                }
                color
            })
            .collect();
        if !parsed.is_empty() {
            return Self { colors: parsed };
        }
        if fallback.is_empty() {
            return Self {
                colors: vec![Color::WHITE],
            };
        }
        Self {
            colors: fallback.to_vec(),
        }
    }

    /// Color for beat position `index`, cycling.
    pub fn at(&self, index: usize) -> Color {
        self.colors
            .get(index % self.colors.len().max(1))
            .copied()
            .unwrap_or(Color::WHITE)
    }

    pub fn first(&self) -> Color {
        self.at(0)
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }
}
