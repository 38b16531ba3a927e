use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, warn};

use crate::error::SynthError;
use crate::model::{Fixture, GroupDecl};

/// Flat layout as read from an xLights-style XML export. Nothing is resolved
/// yet: duplicate fixture names and dangling group members are passed through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedLayout {
    pub fixtures: Vec<Fixture>,
    pub groups: Vec<GroupDecl>,
    pub warnings: Vec<String>,
}

const NAME_KEYS: &[&str] = &["name", "Model"];
const STRING_KEYS: &[&str] = &["StringCount", "strings", "Strings"];
const NODE_KEYS: &[&str] = &["Nodes", "nodes", "NodeCount"];

pub fn parse_layout_file(path: &Path) -> Result<ParsedLayout, SynthError> {
    let file = File::open(path)?;
    let layout = parse_layout_reader(BufReader::with_capacity(64 * 1024, file))?;
    debug!(
        path = %path.display(),
        fixtures = layout.fixtures.len(),
        groups = layout.groups.len(),
        "layout parsed"
    );
    Ok(layout)
}

pub fn parse_layout_str(xml: &str) -> Result<ParsedLayout, SynthError> {
    parse_layout_reader(xml.as_bytes())
}

pub fn parse_layout_reader<R: BufRead>(reader: R) -> Result<ParsedLayout, SynthError> {
    let mut xml = Reader::from_reader(reader);
    xml.config_mut().trim_text(true);

    let mut layout = ParsedLayout::default();
    let mut buf = Vec::with_capacity(4096);
    // Groups are never nested in the export; members attach to the open one.
    let mut open_group: Option<GroupDecl> = None;

    loop {
        match xml.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(ref e) => match e.name().as_ref() {
                b"model" => layout.push_model(e),
                b"group" | b"modelGroup" => {
                    if let Some(unclosed) = open_group.take() {
                        layout.push_group(unclosed);
                    }
                    open_group = layout.read_group(e);
                }
                b"member" => layout.push_member(e, open_group.as_mut()),
                _ => {}
            },
            Event::Empty(ref e) => match e.name().as_ref() {
                b"model" => layout.push_model(e),
                b"group" | b"modelGroup" => {
                    if let Some(group) = layout.read_group(e) {
                        layout.push_group(group);
                    }
                }
                b"member" => layout.push_member(e, open_group.as_mut()),
                _ => {}
            },
            Event::End(ref e) => {
                if matches!(e.name().as_ref(), b"group" | b"modelGroup") {
                    if let Some(group) = open_group.take() {
                        layout.push_group(group);
                    }
                }
            }
            _ => {}
        }
        buf.clear();
    }
    if let Some(group) = open_group {
        layout.push_group(group);
    }
    Ok(layout)
}

impl ParsedLayout {
    fn warn(&mut self, message: String) {
        warn!("{message}");
        self.warnings.push(message);
    }

    fn push_model(&mut self, e: &BytesStart<'_>) {
        let Some(name) = attr(e, NAME_KEYS).filter(|n| !n.trim().is_empty()) else {
            self.warn(format!("Skipping model #{} without a name", self.fixtures.len() + 1));
            return;
        };
        let name = name.trim().to_string();
        let string_count = self.count(e, STRING_KEYS, &name);
        let node_count = self.count(e, NODE_KEYS, &name);
        self.fixtures.push(Fixture {
            name,
            string_count,
            node_count,
        });
    }

    fn count(&mut self, e: &BytesStart<'_>, keys: &[&str], model: &str) -> Option<u32> {
        let raw = attr(e, keys)?;
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match raw.parse::<u32>() {
            Ok(n) => Some(n),
            Err(_) => {
                self.warn(format!("Model '{model}': ignoring unparseable count '{raw}'"));
                None
            }
        }
    }

    fn read_group(&mut self, e: &BytesStart<'_>) -> Option<GroupDecl> {
        let Some(name) = attr(e, &["name"]).filter(|n| !n.trim().is_empty()) else {
            self.warn("Skipping group without a name".to_string());
            return None;
        };
        let member_refs = attr(e, &["models"])
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Some(GroupDecl {
            name: name.trim().to_string(),
            member_refs,
        })
    }

    fn push_member(&mut self, e: &BytesStart<'_>, group: Option<&mut GroupDecl>) {
        let Some(group) = group else {
            return;
        };
        match attr(e, &["name"]).map(|n| n.trim().to_string()) {
            Some(name) if !name.is_empty() => group.member_refs.push(name),
            _ => self.warn(format!("Group '{}': member without a name", group.name)),
        }
    }

    fn push_group(&mut self, group: GroupDecl) {
        self.groups.push(group);
    }
}

/// First present attribute among `keys`, unescaped.
fn attr(e: &BytesStart<'_>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        e.attributes()
            .flatten()
            .find(|a| a.key.as_ref() == key.as_bytes())
            .map(|a| {
                a.unescape_value()
                    .map(|v| v.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&a.value).into_owned())
            })
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const LAYOUT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xrgb>
  <models>
    <model name="MegaTree" StringCount="16" Nodes="800"/>
    <model name="MegaTree-Left" strings="5"></model>
    <model Model="Arch &amp; Co" nodes="50"/>
    <model StringCount="2"/>
    <model name="Candy" Nodes="lots"/>
    <model name="MegaTree" StringCount="1"/>
  </models>
  <modelGroups>
    <modelGroup name="Arches" models="Arch &amp; Co, Candy,"/>
    <group name="Trees">
      <member name="MegaTree"/>
      <member name="MegaTree-Left"/>
    </group>
  </modelGroups>
</xrgb>"#;

    #[test]
    fn parses_models_with_alternate_attribute_names() {
        let layout = parse_layout_str(LAYOUT).unwrap();
        let names: Vec<_> = layout.fixtures.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["MegaTree", "MegaTree-Left", "Arch & Co", "Candy", "MegaTree"]);
        assert_eq!(layout.fixtures[0].string_count, Some(16));
        assert_eq!(layout.fixtures[0].node_count, Some(800));
        assert_eq!(layout.fixtures[1].string_count, Some(5));
        assert_eq!(layout.fixtures[2].node_count, Some(50));
        assert_eq!(layout.fixtures[3].node_count, None);
    }

    #[test]
    fn parses_both_group_forms() {
        let layout = parse_layout_str(LAYOUT).unwrap();
        assert_eq!(layout.groups.len(), 2);
        assert_eq!(layout.groups[0].name, "Arches");
        assert_eq!(layout.groups[0].member_refs, ["Arch & Co", "Candy"]);
        assert_eq!(layout.groups[1].name, "Trees");
        assert_eq!(layout.groups[1].member_refs, ["MegaTree", "MegaTree-Left"]);
    }

    #[test]
    fn bad_entries_become_warnings() {
        let layout = parse_layout_str(LAYOUT).unwrap();
        // nameless model + unparseable node count
        assert_eq!(layout.warnings.len(), 2);
        assert!(layout.warnings[1].contains("lots"));
    }

    #[test]
    fn malformed_xml_is_an_error() {
        let err = parse_layout_str("<xrgb><model name=\"A\"></xrgb>");
        assert!(matches!(err, Err(SynthError::Xml(_))));
    }

    #[test]
    fn reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("xlights_rgbeffects.xml");
        std::fs::write(&path, LAYOUT).unwrap();
        let layout = parse_layout_file(&path).unwrap();
        assert_eq!(layout.fixtures.len(), 5);
    }
}
