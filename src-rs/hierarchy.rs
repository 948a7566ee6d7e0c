use std::collections::VecDeque;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use crate::error::HierarchyError;
use crate::geometry::Rect;

/// Elements whose package or resource id contains this belong to the
/// system chrome (status bar, navigation bar) and never reach the pipeline.
pub const SYSTEM_CHROME_MARKER: &str = "com.android.systemui";

pub const INPUT_FIELD_CLASSES: [&str; 2] = [
    "android.widget.EditText",
    "android.widget.AutoCompleteTextView",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UiElement {
    pub package: String,
    pub class_name: String,
    pub resource_id: String,
    pub text: String,
    pub content_desc: String,
    pub bounds: String,
}

impl UiElement {
    pub fn rect(&self) -> Rect {
        Rect::parse_lenient(&self.bounds)
    }

    pub fn is_system_chrome(&self) -> bool {
        self.package.contains(SYSTEM_CHROME_MARKER)
            || self.resource_id.contains(SYSTEM_CHROME_MARKER)
    }

    pub fn is_input_field(&self) -> bool {
        INPUT_FIELD_CLASSES.contains(&self.class_name.as_str())
    }

    pub fn summary(&self) -> ComponentSummary {
        ComponentSummary {
            id: non_empty(&self.resource_id),
            text: non_empty(&self.text),
            label: non_empty(&self.content_desc),
            app_name: non_empty(&self.package),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComponentSummary {
    pub id: Option<String>,
    pub text: Option<String>,
    pub label: Option<String>,
    pub app_name: Option<String>,
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawNode")]
pub enum UiNode {
    /// Container attributes are dropped; only leaves reach the pipeline.
    Internal { children: Vec<UiNode> },
    Leaf(UiElement),
}

impl UiNode {
    fn from_parts(element: UiElement, children: Vec<UiNode>) -> Self {
        if children.is_empty() {
            UiNode::Leaf(element)
        } else {
            UiNode::Internal { children }
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawNode {
    #[serde(rename = "@package", alias = "package", default)]
    package: Option<String>,
    #[serde(rename = "@class", alias = "class", default)]
    class: Option<String>,
    #[serde(rename = "@resource-id", alias = "resource-id", alias = "resource_id", default)]
    resource_id: Option<String>,
    #[serde(rename = "@text", alias = "text", default)]
    text: Option<String>,
    #[serde(rename = "@content-desc", alias = "content-desc", alias = "content_desc", default)]
    content_desc: Option<String>,
    #[serde(rename = "@bounds", alias = "bounds", default)]
    bounds: Option<String>,
    #[serde(default, alias = "children")]
    node: Option<RawChildren>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawChildren {
    Many(Vec<UiNode>),
    One(Box<UiNode>),
}

impl From<RawNode> for UiNode {
    fn from(raw: RawNode) -> Self {
        let element = UiElement {
            package: raw.package.unwrap_or_default(),
            class_name: raw.class.unwrap_or_default(),
            resource_id: raw.resource_id.unwrap_or_default(),
            text: raw.text.unwrap_or_default(),
            content_desc: raw.content_desc.unwrap_or_default(),
            bounds: raw.bounds.unwrap_or_default(),
        };
        let children = match raw.node {
            Some(RawChildren::Many(nodes)) => nodes,
            Some(RawChildren::One(node)) => vec![*node],
            None => Vec::new(),
        };
        UiNode::from_parts(element, children)
    }
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    hierarchy: Option<UiNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hierarchy {
    root: Option<UiNode>,
}

impl Hierarchy {
    /// Accepts the XML printed by `uiautomator dump` or its xmltodict-style
    /// JSON rendering.
    pub fn parse(raw: &str) -> Result<Self, HierarchyError> {
        let trimmed = raw.trim_start();
        if trimmed.trim_end().is_empty() {
            return Err(HierarchyError::Empty);
        }
        if trimmed.starts_with('<') {
            return parse_xml(trimmed);
        }
        let document: RawDocument = serde_json::from_str(raw)?;
        Ok(Self {
            root: document.hierarchy,
        })
    }

    #[cfg(test)]
    pub fn from_root(root: UiNode) -> Self {
        Self { root: Some(root) }
    }

    /// Breadth-first list of leaf elements, system chrome removed.
    pub fn leaves(&self) -> Vec<&UiElement> {
        let mut out = Vec::new();
        let mut queue: VecDeque<&UiNode> = self.root.iter().collect();
        while let Some(node) = queue.pop_front() {
            match node {
                UiNode::Internal { children, .. } => queue.extend(children.iter()),
                UiNode::Leaf(element) => {
                    if !element.is_system_chrome() {
                        out.push(element);
                    }
                }
            }
        }
        out
    }
}

/// Every `<node>` becomes a `UiNode`; the `<hierarchy>` wrapper and anything
/// after it (uiautomator appends a "dumped to" line) are ignored.
fn parse_xml(raw: &str) -> Result<Hierarchy, HierarchyError> {
    let mut reader = Reader::from_str(raw);
    let mut open: Vec<(UiElement, Vec<UiNode>)> = Vec::new();
    let mut top: Vec<UiNode> = Vec::new();

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(tag) if tag.name().as_ref() == b"node" => {
                open.push((xml_element(&tag)?, Vec::new()));
            }
            Event::Empty(tag) if tag.name().as_ref() == b"node" => {
                let node = UiNode::Leaf(xml_element(&tag)?);
                attach(&mut open, &mut top, node);
            }
            Event::End(tag) if tag.name().as_ref() == b"node" => {
                let Some((element, children)) = open.pop() else {
                    return Err(HierarchyError::Xml("unexpected </node>".to_string()));
                };
                attach(&mut open, &mut top, UiNode::from_parts(element, children));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !open.is_empty() {
        return Err(HierarchyError::Xml(format!(
            "{} node element(s) left open",
            open.len()
        )));
    }
    Ok(Hierarchy {
        root: (!top.is_empty()).then(|| UiNode::Internal { children: top }),
    })
}

fn attach(open: &mut [(UiElement, Vec<UiNode>)], top: &mut Vec<UiNode>, node: UiNode) {
    match open.last_mut() {
        Some((_, children)) => children.push(node),
        None => top.push(node),
    }
}

fn xml_element(tag: &BytesStart<'_>) -> Result<UiElement, HierarchyError> {
    let mut element = UiElement::default();
    for attr in tag.attributes() {
        let attr = attr.map_err(xml_error)?;
        let value = attr.unescape_value().map_err(xml_error)?.into_owned();
        match attr.key.as_ref() {
            b"package" => element.package = value,
            b"class" => element.class_name = value,
            b"resource-id" => element.resource_id = value,
            b"text" => element.text = value,
            b"content-desc" => element.content_desc = value,
            b"bounds" => element.bounds = value,
            _ => {}
        }
    }
    Ok(element)
}

fn xml_error(err: impl std::fmt::Display) -> HierarchyError {
    HierarchyError::Xml(err.to_string())
}

/// Input fields that still need a hint: editable classes without a content
/// description of their own.
pub fn select_input_fields<'a>(leaves: &[&'a UiElement]) -> Vec<&'a UiElement> {
    leaves
        .iter()
        .copied()
        .filter(|element| element.is_input_field() && element.content_desc.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN_SCREEN: &str = r#"{
      "hierarchy": {
        "@rotation": "0",
        "node": [
          {
            "@package": "com.android.systemui",
            "@class": "android.widget.FrameLayout",
            "@bounds": "[0,0][1080,80]",
            "node": {
              "@package": "com.android.systemui",
              "@class": "android.widget.TextView",
              "@resource-id": "com.android.systemui:id/clock",
              "@text": "9:41",
              "@bounds": "[20,10][120,70]"
            }
          },
          {
            "@package": "com.example.shop",
            "@class": "android.widget.LinearLayout",
            "@bounds": "[0,80][1080,2000]",
            "node": [
              {
                "@package": "com.example.shop",
                "@class": "android.widget.TextView",
                "@resource-id": "com.example.shop:id/email_label",
                "@text": "Email",
                "@content-desc": "",
                "@bounds": "[100,150][300,195]"
              },
              {
                "@package": "com.example.shop",
                "@class": "android.widget.EditText",
                "@resource-id": "com.example.shop:id/email_input",
                "@text": "",
                "@content-desc": "",
                "@bounds": "[100,200][300,250]"
              },
              {
                "@package": "com.example.shop",
                "@class": "android.widget.FrameLayout",
                "@bounds": "[0,300][1080,600]",
                "node": [
                  {
                    "@package": "com.example.shop",
                    "@class": "android.widget.AutoCompleteTextView",
                    "@resource-id": "com.example.shop:id/city",
                    "@bounds": "[100,320][600,380]"
                  },
                  {
                    "@package": "com.example.shop",
                    "@class": "android.widget.EditText",
                    "@resource-id": "com.example.shop:id/password",
                    "@content-desc": "Password",
                    "@bounds": "[100,400][600,460]"
                  }
                ]
              },
              {
                "@package": "com.example.shop",
                "@class": "android.widget.Button",
                "@resource-id": "com.example.shop:id/submit",
                "@text": "Sign in",
                "@bounds": "[900,1900][1000,1950]"
              }
            ]
          }
        ]
      }
    }"#;

    // Trimmed `adb exec-out uiautomator dump /dev/tty` output, trailer included.
    const LOGIN_SCREEN_XML: &str = concat!(
        "<?xml version='1.0' encoding='UTF-8' standalone='yes' ?>",
        "<hierarchy rotation=\"0\">",
        "<node index=\"0\" text=\"\" resource-id=\"\" class=\"android.widget.FrameLayout\" ",
        "package=\"com.android.systemui\" content-desc=\"\" checkable=\"false\" checked=\"false\" ",
        "clickable=\"false\" enabled=\"true\" focusable=\"false\" focused=\"false\" ",
        "scrollable=\"false\" long-clickable=\"false\" password=\"false\" selected=\"false\" ",
        "bounds=\"[0,0][1080,80]\">",
        "<node index=\"0\" text=\"9:41\" resource-id=\"com.android.systemui:id/clock\" ",
        "class=\"android.widget.TextView\" package=\"com.android.systemui\" content-desc=\"\" ",
        "bounds=\"[20,10][120,70]\" />",
        "</node>",
        "<node index=\"1\" text=\"\" resource-id=\"\" class=\"android.widget.LinearLayout\" ",
        "package=\"com.example.shop\" content-desc=\"\" bounds=\"[0,80][1080,2000]\">",
        "<node index=\"0\" text=\"Email &amp; phone\" resource-id=\"com.example.shop:id/email_label\" ",
        "class=\"android.widget.TextView\" package=\"com.example.shop\" content-desc=\"\" ",
        "checkable=\"false\" clickable=\"false\" enabled=\"true\" bounds=\"[100,150][300,195]\" />",
        "<node index=\"1\" text=\"\" resource-id=\"com.example.shop:id/email_input\" ",
        "class=\"android.widget.EditText\" package=\"com.example.shop\" content-desc=\"\" ",
        "checkable=\"false\" clickable=\"true\" enabled=\"true\" focusable=\"true\" ",
        "focused=\"true\" password=\"false\" bounds=\"[100,200][300,250]\" />",
        "<node index=\"2\" text=\"\" resource-id=\"\" class=\"android.widget.FrameLayout\" ",
        "package=\"com.example.shop\" content-desc=\"\" bounds=\"[0,300][1080,600]\">",
        "<node index=\"0\" text=\"\" resource-id=\"com.example.shop:id/city\" ",
        "class=\"android.widget.AutoCompleteTextView\" package=\"com.example.shop\" ",
        "content-desc=\"\" bounds=\"[100,320][600,380]\" />",
        "<node index=\"1\" text=\"\" resource-id=\"com.example.shop:id/password\" ",
        "class=\"android.widget.EditText\" package=\"com.example.shop\" ",
        "content-desc=\"Password\" password=\"true\" bounds=\"[100,400][600,460]\" />",
        "</node>",
        "<node index=\"3\" text=\"Sign in\" resource-id=\"com.example.shop:id/submit\" ",
        "class=\"android.widget.Button\" package=\"com.example.shop\" content-desc=\"\" ",
        "bounds=\"[900,1900][1000,1950]\" />",
        "</node>",
        "</hierarchy>",
        "UI hierchary dumped to: /dev/tty\n",
    );

    fn ids(elements: &[&UiElement]) -> Vec<String> {
        elements.iter().map(|e| e.resource_id.clone()).collect()
    }

    #[test]
    fn flattens_breadth_first_without_system_chrome() {
        let hierarchy = Hierarchy::parse(LOGIN_SCREEN).unwrap();
        let leaves = hierarchy.leaves();
        assert_eq!(
            ids(&leaves),
            vec![
                "com.example.shop:id/email_label",
                "com.example.shop:id/email_input",
                "com.example.shop:id/submit",
                "com.example.shop:id/city",
                "com.example.shop:id/password",
            ]
        );
        assert!(leaves.iter().all(|leaf| !leaf.is_system_chrome()));
    }

    #[test]
    fn flattening_is_repeatable() {
        let hierarchy = Hierarchy::parse(LOGIN_SCREEN).unwrap();
        assert_eq!(hierarchy.leaves(), hierarchy.leaves());
        let again = Hierarchy::parse(LOGIN_SCREEN).unwrap();
        assert_eq!(hierarchy.leaves(), again.leaves());
    }

    #[test]
    fn selects_unlabeled_input_fields() {
        let hierarchy = Hierarchy::parse(LOGIN_SCREEN).unwrap();
        let fields = select_input_fields(&hierarchy.leaves());
        assert_eq!(
            ids(&fields),
            vec!["com.example.shop:id/email_input", "com.example.shop:id/city"]
        );
    }

    #[test]
    fn missing_root_is_empty() {
        let hierarchy = Hierarchy::parse(r#"{"other": 1}"#).unwrap();
        assert!(hierarchy.leaves().is_empty());
        assert!(matches!(Hierarchy::parse("  "), Err(HierarchyError::Empty)));
        assert!(matches!(
            Hierarchy::parse("[1, 2"),
            Err(HierarchyError::Decode(_))
        ));
        let bare = Hierarchy::parse("<hierarchy rotation=\"0\"/>").unwrap();
        assert!(bare.leaves().is_empty());
    }

    #[test]
    fn reads_uiautomator_xml_dump() {
        let hierarchy = Hierarchy::parse(LOGIN_SCREEN_XML).unwrap();
        let leaves = hierarchy.leaves();
        assert_eq!(
            ids(&leaves),
            vec![
                "com.example.shop:id/email_label",
                "com.example.shop:id/email_input",
                "com.example.shop:id/submit",
                "com.example.shop:id/city",
                "com.example.shop:id/password",
            ]
        );
        assert_eq!(leaves[0].text, "Email & phone");
        assert_eq!(leaves[1].class_name, "android.widget.EditText");
        assert_eq!(leaves[1].rect(), Rect::new(100, 200, 300, 250));
        assert_eq!(leaves[4].content_desc, "Password");

        let fields = select_input_fields(&leaves);
        assert_eq!(
            ids(&fields),
            vec!["com.example.shop:id/email_input", "com.example.shop:id/city"]
        );
    }

    #[test]
    fn xml_and_json_dumps_flatten_alike() {
        let from_xml = Hierarchy::parse(LOGIN_SCREEN_XML).unwrap();
        let from_json = Hierarchy::parse(LOGIN_SCREEN).unwrap();
        let xml_ids = ids(&from_xml.leaves());
        assert_eq!(xml_ids, ids(&from_json.leaves()));
    }

    #[test]
    fn broken_xml_is_rejected() {
        let unclosed = "<hierarchy><node class=\"android.widget.FrameLayout\" bounds=\"[0,0][1,1]\">";
        assert!(matches!(Hierarchy::parse(unclosed), Err(HierarchyError::Xml(_))));

        let mismatched = "<hierarchy><node class=\"a\"></hierarchy>";
        assert!(matches!(Hierarchy::parse(mismatched), Err(HierarchyError::Xml(_))));
    }

    #[test]
    fn childless_root_is_a_leaf() {
        let hierarchy =
            Hierarchy::parse(r#"{"hierarchy": {"class": "android.widget.EditText", "node": []}}"#)
                .unwrap();
        let leaves = hierarchy.leaves();
        assert_eq!(leaves.len(), 1);
        assert!(leaves[0].is_input_field());
    }

    #[test]
    fn deep_trees_flatten_without_recursion() {
        let mut node = UiNode::Leaf(UiElement {
            resource_id: "deepest".to_string(),
            ..UiElement::default()
        });
        for _ in 0..2_000 {
            node = UiNode::Internal {
                children: vec![node],
            };
        }
        let hierarchy = Hierarchy::from_root(node);
        let leaves = hierarchy.leaves();
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].resource_id, "deepest");
    }

    #[test]
    fn summary_drops_empty_attributes() {
        let element = UiElement {
            package: "com.example.shop".to_string(),
            resource_id: "com.example.shop:id/email_label".to_string(),
            text: "Email".to_string(),
            ..UiElement::default()
        };
        assert_eq!(
            element.summary(),
            ComponentSummary {
                id: Some("com.example.shop:id/email_label".to_string()),
                text: Some("Email".to_string()),
                label: None,
                app_name: Some("com.example.shop".to_string()),
            }
        );
    }
}
