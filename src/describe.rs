use crate::layout::GroupRecommendation;
use crate::model::{GroupOrigin, LayoutTree, NodeId, NodeKind, SequenceSummary, SynthesizedSequence};

/// Indented text rendering of the resolved tree, one node per line.
pub fn describe_tree(tree: &LayoutTree) -> String {
    let mut lines = vec![format!(
        "Layout: {} fixtures, {} groups",
        tree.fixtures().len(),
        tree.groups().count()
    )];
    for child in tree.children(tree.root()) {
        describe_node(tree, child.id, 1, &mut lines);
    }
    lines.join("\n")
}

fn describe_node(tree: &LayoutTree, id: NodeId, depth: usize, lines: &mut Vec<String>) {
    let Some(node) = tree.node(id) else {
        return;
    };
    let indent = "  ".repeat(depth);
    match &node.kind {
        NodeKind::Fixture(f) => {
            let mut detail = Vec::new();
            if let Some(s) = f.string_count {
                detail.push(format!("{s} strings"));
            }
            if let Some(n) = f.node_count {
                detail.push(format!("{n} nodes"));
            }
            if detail.is_empty() {
                lines.push(format!("{indent}- {}", f.name));
            } else {
                lines.push(format!("{indent}- {} ({})", f.name, detail.join(", ")));
            }
        }
        NodeKind::Group {
            name,
            origin,
            children,
        } => {
            let tag = match origin {
                GroupOrigin::Synthesized => " [inferred]",
                GroupOrigin::Declared | GroupOrigin::Root => "",
            };
            lines.push(format!("{indent}+ {name}{tag} ({} members)", children.len()));
            for child in children {
                describe_node(tree, *child, depth + 1, lines);
            }
        }
    }
}

pub fn describe_recommendations(recs: &[GroupRecommendation]) -> String {
    if recs.is_empty() {
        return "No group recommendations".to_string();
    }
    let mut lines = vec![format!("Recommendations ({})", recs.len())];
    for rec in recs {
        let members: Vec<&str> = rec.members.iter().map(String::as_str).collect();
        lines.push(format!("  - {} ({:?}): {}", rec.name, rec.reason, members.join(", ")));
    }
    lines.join("\n")
}

#[allow(clippy::cast_precision_loss)]
pub fn describe_summary(summary: &SequenceSummary, sequence: &SynthesizedSequence) -> String {
    let mut lines = vec![format!(
        "Sequence: {:.1}s, {} beats, {} downbeats, {} sections ({:?} timing)",
        summary.duration_ms as f64 / 1000.0,
        summary.beat_count,
        summary.downbeat_count,
        summary.section_count,
        summary.timing_origin
    )];
    lines.push(format!(
        "Fixtures ({}), {} spans",
        summary.fixture_count, summary.span_count
    ));
    for f in &sequence.fixtures {
        let first = f.spans.first().map_or("-", |s| s.effect.as_str());
        lines.push(format!("  - {} ({} spans, starts with {first})", f.fixture_name, f.spans.len()));
    }
    lines.join("\n")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::layout::LayoutTreeResolver;
    use crate::model::Fixture;

    #[test]
    fn tree_description_marks_inferred_groups() {
        let fixtures = [
            Fixture::new("Arch").with_nodes(50),
            Fixture::new("Arch-2").with_nodes(50),
            Fixture::new("Star"),
        ];
        let tree = LayoutTreeResolver::default().resolve(&fixtures, &[]).tree;
        let text = describe_tree(&tree);
        assert!(text.starts_with("Layout: 3 fixtures, 1 groups"));
        assert!(text.contains("  + Arch_GROUP [inferred] (2 members)"));
        assert!(text.contains("    - Arch-2 (50 nodes)"));
        assert!(text.contains("  - Star"));
    }
}
