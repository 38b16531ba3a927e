use std::collections::HashMap;

use tracing::{debug, warn};

use crate::model::{Fixture, GroupDecl, GroupOrigin, LayoutTree, NodeId, NodeKind, TreeNode};

use super::names::NameMatcher;

/// Suffix appended to the base name of an inferred group.
pub const SYNTHESIZED_GROUP_SUFFIX: &str = "_GROUP";

/// Output of `LayoutTreeResolver::resolve`: the tree plus everything that was
/// skipped on the way.
#[derive(Debug, Clone)]
pub struct ResolvedLayout {
    pub tree: LayoutTree,
    pub warnings: Vec<String>,
}

/// Rebuilds a fixture/group hierarchy from a flat, inconsistently tagged
/// fixture list.
///
/// Resolution order:
/// 1. index fixtures by name (first occurrence wins)
/// 2. attach members of declared groups (unresolved references are skipped)
/// 3. for fixtures outside declared groups, infer `<base>_GROUP` from name
///    suffixes (declared members, bases included, are never moved)
/// 4. hang every remaining top-level node off the root, in source order
#[derive(Default)]
pub struct LayoutTreeResolver {
    matcher: NameMatcher,
}

impl LayoutTreeResolver {
    pub fn new(matcher: NameMatcher) -> Self {
        Self { matcher }
    }

    pub fn resolve(&self, fixtures: &[Fixture], groups: &[GroupDecl]) -> ResolvedLayout {
        let mut tree = LayoutTree::new();
        let mut warnings = Vec::new();
        let mut warn_skip = |msg: String| {
            warn!("{msg}");
            warnings.push(msg);
        };

        // 1. Fixtures, first-seen wins.
        let mut fixture_ids: Vec<NodeId> = Vec::with_capacity(fixtures.len());
        let mut source_pos: HashMap<NodeId, usize> = HashMap::new();
        for (pos, fixture) in fixtures.iter().enumerate() {
            let name = fixture.name.trim();
            if name.is_empty() {
                warn_skip(format!("Skipping fixture #{pos} with empty name"));
                continue;
            }
            if tree.id_of(name).is_some() {
                debug!(fixture = name, "duplicate fixture name, keeping first");
                continue;
            }
            let mut fixture = fixture.clone();
            fixture.name = name.to_string();
            let id = tree.push(NodeKind::Fixture(fixture));
            fixture_ids.push(id);
            source_pos.insert(id, pos);
        }

        // 2. Declared groups. Create all of them first so members may
        //    reference groups declared later.
        let mut declared: Vec<(NodeId, &GroupDecl)> = Vec::with_capacity(groups.len());
        for decl in groups {
            let name = decl.name.trim();
            if name.is_empty() {
                warn_skip("Skipping group with empty name".to_string());
                continue;
            }
            if tree.id_of(name).is_some() {
                warn_skip(format!("Skipping group '{name}': name already in use"));
                continue;
            }
            let id = tree.push(NodeKind::Group {
                name: name.to_string(),
                origin: GroupOrigin::Declared,
                children: Vec::new(),
            });
            declared.push((id, decl));
        }
        for (group_id, decl) in &declared {
            for member in &decl.member_refs {
                let member = member.trim();
                if member.is_empty() {
                    continue;
                }
                match tree.id_of(member) {
                    None => warn_skip(format!(
                        "Group '{}' references unknown member '{member}'",
                        decl.name.trim()
                    )),
                    Some(child) => {
                        if !tree.attach(*group_id, child) {
                            debug!(group = decl.name.trim(), member, "member already placed");
                        }
                    }
                }
            }
        }

        // 3. Name-pattern inference. Every fixture outside a declared group
        //    joins `<base>_GROUP`; bases follow in a second pass so the result
        //    does not depend on source order.
        let mut synthesized: Vec<NodeId> = Vec::new();
        let mut group_base: HashMap<NodeId, NodeId> = HashMap::new();
        for &id in &fixture_ids {
            if tree.node(id).is_some_and(|n| n.parent.is_some()) {
                continue;
            }
            let Some(name) = tree.node(id).map(|n| n.name().to_string()) else {
                continue;
            };
            let Some(hit) = self.matcher.looks_like_suffix(&name) else {
                continue;
            };
            let Some(base_id) = find_base_fixture(&tree, &fixture_ids, hit.base, id) else {
                continue;
            };
            let Some(base_name) = tree.node(base_id).map(|n| n.name().to_string()) else {
                continue;
            };
            let group_name = format!("{base_name}{SYNTHESIZED_GROUP_SUFFIX}");
            let group_id = match tree.lookup(&group_name) {
                Some(existing) if existing.origin() == Some(GroupOrigin::Synthesized) => {
                    existing.id
                }
                Some(_) => {
                    warn_skip(format!(
                        "Cannot synthesize '{group_name}': name already in use"
                    ));
                    continue;
                }
                None => {
                    let gid = tree.push(NodeKind::Group {
                        name: group_name,
                        origin: GroupOrigin::Synthesized,
                        children: Vec::new(),
                    });
                    synthesized.push(gid);
                    group_base.insert(gid, base_id);
                    gid
                }
            };
            tree.attach(group_id, id);
            debug!(fixture = %name, base = hit.base, suffix = hit.suffix, kind = ?hit.kind, "inferred group membership");
        }

        // A loose base joins its own group. A base that is itself a suffixed
        // member of another inferred group takes its group along with it.
        // Bases inside a declared group stay where the layout put them.
        for &gid in &synthesized {
            let Some(&base_id) = group_base.get(&gid) else {
                continue;
            };
            let base_parent = tree.node(base_id).and_then(|n| n.parent);
            match base_parent.and_then(|p| tree.node(p)).and_then(TreeNode::origin) {
                None => {
                    tree.attach(gid, base_id);
                }
                Some(GroupOrigin::Synthesized) => {
                    if let Some(outer) = base_parent {
                        tree.detach(base_id);
                        tree.attach(outer, gid);
                        tree.attach(gid, base_id);
                    }
                }
                Some(GroupOrigin::Declared | GroupOrigin::Root) => {
                    debug!(base = base_id.0, "base fixture kept in declared group");
                }
            }
        }
        let position = |n: &TreeNode| {
            let key = group_base.get(&n.id).copied().unwrap_or(n.id);
            source_pos.get(&key).copied()
        };
        for &gid in &synthesized {
            tree.sort_children_by_key(gid, position);
        }

        // 4. Everything still loose goes under the root, in order of first
        //    appearance in the source list.
        let root = tree.root();
        for &id in &fixture_ids {
            let top = topmost(&tree, id);
            tree.attach(root, top);
        }
        for &(gid, _) in &declared {
            tree.attach(root, gid);
        }

        debug!(
            fixtures = fixture_ids.len(),
            declared = declared.len(),
            synthesized = synthesized.len(),
            "layout resolved"
        );
        ResolvedLayout { tree, warnings }
    }
}

/// Resolve the base of a suffixed name to another fixture: exact name first,
/// then case-insensitive.
fn find_base_fixture(
    tree: &LayoutTree,
    fixture_ids: &[NodeId],
    base: &str,
    exclude: NodeId,
) -> Option<NodeId> {
    let exact = tree
        .lookup(base)
        .filter(|n| !n.is_group() && n.id != exclude)
        .map(|n| n.id);
    exact.or_else(|| {
        let lowered = base.to_lowercase();
        fixture_ids
            .iter()
            .copied()
            .filter(|id| *id != exclude)
            .find(|id| {
                tree.node(*id)
                    .is_some_and(|n| n.name().to_lowercase() == lowered)
            })
    })
}

fn topmost(tree: &LayoutTree, id: NodeId) -> NodeId {
    let mut current = id;
    while let Some(parent) = tree.node(current).and_then(|n| n.parent) {
        current = parent;
    }
    current
}
