//! XML text to [`TreeNode`] conversion
//!
//! Parsing is delegated to `quick-xml`'s pull reader. Namespace prefixes are
//! dropped from element and attribute names (`lis:person` becomes `person`),
//! while `xmlns` declarations are kept as attributes so dialect detection can
//! still look at them.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::fs;
use std::path::Path;
use tracing::{debug, trace};

use super::TreeNode;
use crate::error::{Result, SyncError};

/// Parse an XML document into its root node
pub fn parse_document(xml: &str) -> Result<TreeNode> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    // Open elements, innermost last
    let mut stack: Vec<TreeNode> = Vec::new();
    let mut root: Option<TreeNode> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                stack.push(open_element(&start)?);
            }
            Event::Empty(start) => {
                let node = open_element(&start)?;
                attach(node, &mut stack, &mut root);
            }
            Event::End(_) => {
                if let Some(node) = stack.pop() {
                    attach(node, &mut stack, &mut root);
                }
            }
            Event::Text(text) => {
                let text = text.unescape()?;
                append_text(&mut stack, &text);
            }
            Event::CData(cdata) => {
                let text = String::from_utf8_lossy(&cdata.into_inner()).into_owned();
                append_text(&mut stack, &text);
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions and doctypes carry no data
            _ => {}
        }
    }

    let root = root.ok_or_else(|| SyncError::Parse {
        file: "<input>".into(),
        message: "document has no root element".to_string(),
    })?;
    trace!("Parsed XML document with root <{}>", root.name());
    Ok(root)
}

/// Read and parse an XML file
pub fn parse_file(path: &Path) -> Result<TreeNode> {
    debug!("Loading XML file: {}", path.display());

    let content = fs::read_to_string(path)?;
    parse_document(&content).map_err(|e| SyncError::Parse {
        file: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn open_element(start: &BytesStart<'_>) -> Result<TreeNode> {
    let local = start.local_name();
    let mut node = TreeNode::new(&String::from_utf8_lossy(local.as_ref()));

    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = attr.key;
        let name = if key.as_ref().starts_with(b"xmlns") {
            String::from_utf8_lossy(key.as_ref()).into_owned()
        } else {
            String::from_utf8_lossy(key.local_name().as_ref()).into_owned()
        };
        let value = attr.unescape_value()?;
        node.set_attribute(&name, value.as_ref());
    }

    Ok(node)
}

fn attach(node: TreeNode, stack: &mut [TreeNode], root: &mut Option<TreeNode>) {
    match stack.last_mut() {
        Some(parent) => parent.push_child(node),
        None => {
            if root.is_none() {
                *root = Some(node);
            }
        }
    }
}

fn append_text(stack: &mut [TreeNode], text: &str) {
    if let Some(current) = stack.last_mut() {
        let joined = match current.value() {
            Some(existing) => format!("{existing}{text}"),
            None => text.to_string(),
        };
        current.set_value(joined);
    }
}
