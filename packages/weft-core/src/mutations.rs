use crate::dom::NodeId;
use serde::{Deserialize, Serialize};
use slotmap::Key;

/// One recorded write against the DOM tree. A host adapter replays these onto
/// a real document; ids are stable for the life of the node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Mutation {
    CreateElement {
        name: String,
        ns: Option<String>,
        id: u64,
    },
    CreateTextNode {
        value: String,
        id: u64,
    },
    /// Comments: slot anchors and template placeholders.
    CreatePlaceholder {
        id: u64,
    },
    CreateFragment {
        id: u64,
    },
    InsertBefore {
        parent: u64,
        id: u64,
        reference: Option<u64>,
    },
    Remove {
        id: u64,
    },
    /// The node and its subtree are gone for good.
    FreeNode {
        id: u64,
    },
    SetText {
        value: String,
        id: u64,
    },
    SetAttribute {
        name: String,
        value: String,
        id: u64,
        ns: Option<String>,
    },
    RemoveAttribute {
        name: String,
        id: u64,
        ns: Option<String>,
    },
    SetProperty {
        name: String,
        value: serde_json::Value,
        id: u64,
    },
    CallMethod {
        name: String,
        args: Vec<serde_json::Value>,
        id: u64,
    },
    NewEventListener {
        name: String,
        id: u64,
    },
    RemoveEventListener {
        name: String,
        id: u64,
    },
    AttachShadow {
        host: u64,
        id: u64,
    },
}

pub(crate) fn ffi(id: NodeId) -> u64 {
    id.data().as_ffi()
}
