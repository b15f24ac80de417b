//! Model browser tree ids
//!
//! Every node of the hub → project → folder → item tree carries a
//! `|`-separated id that holds everything needed to expand it:
//!
//! - `hub|{hub}`
//! - `prj|{hub}|{project}`
//! - `fld|{hub}|{project}|{folder}`
//! - `itm|{hub}|{project}|{item}|{urn}`
//!
//! Selecting an `itm` node yields a [`Selection`] identifying the model to
//! load in the viewer and to ask the chatbot about.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Serialize;

use crate::{Error, Result};

/// Id of a node in the model browser tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TreeNodeId {
    Hub {
        hub: String,
    },
    Project {
        hub: String,
        project: String,
    },
    Folder {
        hub: String,
        project: String,
        folder: String,
    },
    Item {
        hub: String,
        project: String,
        item: String,
        urn: String,
    },
}

impl TreeNodeId {
    /// Whether the node can be expanded.
    pub fn has_children(&self) -> bool {
        !matches!(self, TreeNodeId::Item { .. })
    }

    /// The selection for an item node; `None` for containers.
    pub fn selection(&self) -> Result<Option<Selection>> {
        match self {
            TreeNodeId::Item {
                hub,
                project,
                item,
                urn,
            } => Ok(Some(Selection {
                hub_id: hub.clone(),
                project_id: project.clone(),
                item_id: item.clone(),
                version_id: decode_version_id(urn)?,
                urn: urn.clone(),
            })),
            _ => Ok(None),
        }
    }
}

impl fmt::Display for TreeNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeNodeId::Hub { hub } => write!(f, "hub|{hub}"),
            TreeNodeId::Project { hub, project } => write!(f, "prj|{hub}|{project}"),
            TreeNodeId::Folder {
                hub,
                project,
                folder,
            } => write!(f, "fld|{hub}|{project}|{folder}"),
            TreeNodeId::Item {
                hub,
                project,
                item,
                urn,
            } => write!(f, "itm|{hub}|{project}|{item}|{urn}"),
        }
    }
}

impl FromStr for TreeNodeId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('|').collect();
        if parts.iter().skip(1).any(|p| p.is_empty()) {
            return Err(Error::InvalidNodeId(s.to_string()));
        }
        let owned = |i: usize| parts[i].to_string();
        match parts.as_slice() {
            ["hub", _] => Ok(TreeNodeId::Hub { hub: owned(1) }),
            ["prj", _, _] => Ok(TreeNodeId::Project {
                hub: owned(1),
                project: owned(2),
            }),
            ["fld", _, _, _] => Ok(TreeNodeId::Folder {
                hub: owned(1),
                project: owned(2),
                folder: owned(3),
            }),
            ["itm", _, _, _, _] => Ok(TreeNodeId::Item {
                hub: owned(1),
                project: owned(2),
                item: owned(3),
                urn: owned(4),
            }),
            _ => Err(Error::InvalidNodeId(s.to_string())),
        }
    }
}

/// A node as shown in the browser tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub id: TreeNodeId,
    pub label: String,
}

/// A selected design: what the viewer loads and the chatbot is asked about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub hub_id: String,
    pub project_id: String,
    pub item_id: String,
    pub version_id: String,
    pub urn: String,
}

/// Decode the version id a derivative URN was encoded from.
///
/// URNs are base64url of the version id, usually unpadded. Standard-alphabet
/// input and trailing padding are accepted too.
pub fn decode_version_id(urn: &str) -> Result<String> {
    let normalized: String = urn
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '/' => '_',
            '+' => '-',
            other => other,
        })
        .collect();
    let bytes = URL_SAFE_NO_PAD
        .decode(normalized.as_bytes())
        .map_err(|e| Error::InvalidUrn(format!("{urn}: {e}")))?;
    String::from_utf8(bytes).map_err(|e| Error::InvalidUrn(format!("{urn}: {e}")))
}
