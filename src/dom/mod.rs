//! Single-threaded document model.
//!
//! The framework binds to this model the way a page binds to a browser DOM:
//! elements with attributes and dynamic properties, text and comment nodes,
//! fragments, open shadow roots, `template` content, per-node event
//! listeners, CSS selector matching and HTML fragment parsing (`selectors`
//! and `html5ever`).
//!
//! ```ignore
//! let doc = Node::document();
//! let host = Node::element("cian-input");
//! doc.append_child(&host)?;
//! let shadow = host.attach_shadow()?;
//! shadow.set_inner_html("<input type=text>")?;
//! assert!(shadow.query_selector("input")?.is_some());
//! ```

mod markup;
mod node;
pub mod selector;

pub use node::{DomEvent, Node, NodeKind};
pub(crate) use node::WeakNode;
pub use selector::Selector;
pub use serde_json::Value;
