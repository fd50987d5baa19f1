//! HTML fragment parsing and serialization on top of `html5ever`.
//!
//! Parsing drives the html5ever tree builder straight onto [`Node`]s through
//! a [`TreeSink`], so implied end tags, foster parenting and `template`
//! content follow the HTML parsing algorithm. Serialization walks the tree
//! through html5ever's serializer, which owns escaping, void elements and
//! raw-text elements.

use std::borrow::Cow;
use std::io;
use std::rc::Rc;

use html5ever::serialize::{Serialize, SerializeOpts, Serializer, TraversalScope};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::tree_builder::{ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::{Attribute, LocalName, ParseOpts, QualName, ns};

use super::node::{Node, NodeKind};

fn html_name(tag: &str) -> QualName {
    QualName::new(None, ns!(html), LocalName::from(tag))
}

// =============================================================================
// Parsing
// =============================================================================

/// Parse `html` as the children of a `context` element into a detached
/// fragment. Parsing never fails; recoverable errors are logged at `trace`.
pub(super) fn parse_fragment(html: &str, context: &str) -> Node {
    let sink = DomSink::new();
    let root = html5ever::parse_fragment(sink, ParseOpts::default(), html_name(context), Vec::new(), false)
        .one(html);

    // The tree builder puts an `html` element under the root and parses into it.
    let fragment = Node::fragment();
    if let Some(html) = root.first_child() {
        for child in html.child_nodes() {
            if let Err(err) = fragment.append_child(&child) {
                tracing::warn!(error = %err, "dropped parsed node");
            }
        }
    }
    fragment
}

/// A tree-builder handle: the node, plus its qualified name for elements.
#[derive(Clone)]
struct SinkNode {
    node: Node,
    name: Option<Rc<QualName>>,
}

impl SinkNode {
    fn plain(node: Node) -> Self {
        Self { node, name: None }
    }
}

struct DomSink {
    root: SinkNode,
    fallback: QualName,
}

impl DomSink {
    fn new() -> Self {
        Self {
            root: SinkNode::plain(Node::fragment()),
            fallback: html_name("div"),
        }
    }

    fn insert(parent: &Node, child: NodeOrText<SinkNode>, before: Option<&Node>) {
        let node = match child {
            NodeOrText::AppendNode(handle) => handle.node,
            NodeOrText::AppendText(text) => {
                let adjacent = match before {
                    Some(sibling) => sibling.previous_sibling(),
                    None => parent.last_child(),
                };
                if let Some(previous) = adjacent.filter(|n| n.kind() == NodeKind::Text) {
                    let mut merged = previous.text_content();
                    merged.push_str(&text);
                    if previous.set_text_content(&merged).is_ok() {
                        return;
                    }
                }
                Node::text(&text)
            }
        };
        if let Err(err) = parent.insert_before(&node, before) {
            tracing::warn!(error = %err, parent = %parent.tag_name(), "parser insertion rejected");
        }
    }
}

impl TreeSink for DomSink {
    type Handle = SinkNode;
    type Output = Node;
    type ElemName<'a> = &'a QualName;

    fn finish(self) -> Node {
        self.root.node
    }

    fn parse_error(&self, msg: Cow<'static, str>) {
        tracing::trace!(%msg, "html parse error");
    }

    fn get_document(&self) -> SinkNode {
        self.root.clone()
    }

    fn elem_name<'a>(&'a self, target: &'a SinkNode) -> &'a QualName {
        target.name.as_deref().unwrap_or(&self.fallback)
    }

    fn create_element(&self, name: QualName, attrs: Vec<Attribute>, _flags: ElementFlags) -> SinkNode {
        let node = Node::element(&name.local);
        for attr in attrs {
            node.set_attribute(&attr.name.local, &attr.value);
        }
        SinkNode {
            node,
            name: Some(Rc::new(name)),
        }
    }

    fn create_comment(&self, text: StrTendril) -> SinkNode {
        SinkNode::plain(Node::comment(&text))
    }

    fn create_pi(&self, _target: StrTendril, data: StrTendril) -> SinkNode {
        SinkNode::plain(Node::comment(&data))
    }

    fn append(&self, parent: &SinkNode, child: NodeOrText<SinkNode>) {
        Self::insert(&parent.node, child, None);
    }

    fn append_based_on_parent_node(
        &self,
        element: &SinkNode,
        prev_element: &SinkNode,
        child: NodeOrText<SinkNode>,
    ) {
        if element.node.parent().is_some() {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(&self, _name: StrTendril, _public_id: StrTendril, _system_id: StrTendril) {}

    fn get_template_contents(&self, target: &SinkNode) -> SinkNode {
        SinkNode::plain(target.node.template_content().unwrap_or_else(|| target.node.clone()))
    }

    fn same_node(&self, x: &SinkNode, y: &SinkNode) -> bool {
        x.node == y.node
    }

    fn set_quirks_mode(&self, _mode: QuirksMode) {}

    fn append_before_sibling(&self, sibling: &SinkNode, new_node: NodeOrText<SinkNode>) {
        let Some(parent) = sibling.node.parent() else {
            return;
        };
        Self::insert(&parent, new_node, Some(&sibling.node));
    }

    fn add_attrs_if_missing(&self, target: &SinkNode, attrs: Vec<Attribute>) {
        for attr in attrs {
            if !target.node.has_attribute(&attr.name.local) {
                target.node.set_attribute(&attr.name.local, &attr.value);
            }
        }
    }

    fn remove_from_parent(&self, target: &SinkNode) {
        if let Err(err) = target.node.remove() {
            tracing::warn!(error = %err, "parser removal rejected");
        }
    }

    fn reparent_children(&self, node: &SinkNode, new_parent: &SinkNode) {
        for child in node.node.child_nodes() {
            if let Err(err) = new_parent.node.append_child(&child) {
                tracing::warn!(error = %err, "parser reparent rejected");
            }
        }
    }

    fn allow_declarative_shadow_roots(&self, _intended_parent: &SinkNode) -> bool {
        false
    }
}

// =============================================================================
// Serialization
// =============================================================================

/// Serialize `node` including itself.
pub(super) fn serialize(node: &Node) -> String {
    write_html(node, TraversalScope::IncludeNode)
}

/// Serialize the children of `node`.
pub(super) fn serialize_children(node: &Node) -> String {
    let parent = node.is_element().then(|| html_name(&node.tag_name()));
    write_html(node, TraversalScope::ChildrenOnly(parent))
}

fn write_html(node: &Node, traversal_scope: TraversalScope) -> String {
    let mut out = Vec::new();
    let opts = SerializeOpts {
        scripting_enabled: false,
        traversal_scope,
        create_missing_parent: false,
    };
    if let Err(err) = html5ever::serialize(&mut out, &Markup(node), opts) {
        tracing::error!(error = %err, "html serialization failed");
    }
    String::from_utf8_lossy(&out).into_owned()
}

struct Markup<'a>(&'a Node);

impl Markup<'_> {
    fn children<S: Serializer>(node: &Node, serializer: &mut S) -> io::Result<()> {
        for child in node.child_nodes() {
            Markup(&child).serialize(serializer, TraversalScope::IncludeNode)?;
        }
        Ok(())
    }
}

impl Serialize for Markup<'_> {
    fn serialize<S: Serializer>(&self, serializer: &mut S, traversal_scope: TraversalScope) -> io::Result<()> {
        let node = self.0;
        if let TraversalScope::ChildrenOnly(_) = traversal_scope {
            let content = node.template_content().unwrap_or_else(|| node.clone());
            return Self::children(&content, serializer);
        }
        match node.kind() {
            NodeKind::Element => {
                let name = html_name(&node.tag_name());
                let attrs: Vec<(QualName, String)> = node
                    .attributes()
                    .into_iter()
                    .map(|(key, value)| (QualName::new(None, ns!(), LocalName::from(key)), value))
                    .collect();
                serializer.start_elem(name.clone(), attrs.iter().map(|(key, value)| (key, value.as_str())))?;
                let content = node.template_content().unwrap_or_else(|| node.clone());
                Self::children(&content, serializer)?;
                serializer.end_elem(name)
            }
            NodeKind::Text => serializer.write_text(&node.text_content()),
            NodeKind::Comment => serializer.write_comment(&node.text_content()),
            _ => Self::children(node, serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(html: &str) -> Node {
        parse_fragment(html, "body")
    }

    #[test]
    fn test_parse_nested_elements() {
        let fragment = parse("<div class='a'><span>hi</span> there</div>");
        let div = fragment.first_child().unwrap();
        assert_eq!(div.tag_name(), "div");
        assert_eq!(div.get_attribute("class").as_deref(), Some("a"));
        assert_eq!(div.text_content(), "hi there");
    }

    #[test]
    fn test_void_and_self_closing() {
        let fragment = parse("<input value=x><br/><link rel=stylesheet href=\"a.css\">text");
        let tags: Vec<String> = fragment.child_nodes().iter().map(Node::tag_name).collect();
        assert_eq!(tags, vec!["input", "br", "link", ""]);
        assert_eq!(fragment.child_nodes()[0].child_count(), 0);
    }

    #[test]
    fn test_boolean_attributes() {
        let fragment = parse("<input disabled checked=\"\">");
        let input = fragment.first_child().unwrap();
        assert_eq!(input.get_attribute("disabled").as_deref(), Some(""));
        assert!(input.has_attribute("checked"));
    }

    #[test]
    fn test_raw_text_style() {
        let fragment = parse("<style>a > b { color: red }</style><p>x</p>");
        let style = fragment.first_child().unwrap();
        assert_eq!(style.text_content(), "a > b { color: red }");
        assert_eq!(fragment.child_count(), 2);
        assert_eq!(serialize(&style), "<style>a > b { color: red }</style>");
        assert_eq!(serialize_children(&style), "a > b { color: red }");
    }

    #[test]
    fn test_template_content_is_separate() {
        let fragment = parse("<template id=row><li>item</li></template>");
        let template = fragment.first_child().unwrap();
        assert_eq!(template.child_count(), 0);
        let content = template.template_content().unwrap();
        assert_eq!(content.first_child().unwrap().tag_name(), "li");
        assert_eq!(serialize(&template), "<template id=\"row\"><li>item</li></template>");
    }

    #[test]
    fn test_entities() {
        let fragment = parse("<p title=\"a &quot;b&quot;\">1 &lt; 2 &amp;&amp; &#65;&#x42; &bogus;</p>");
        let p = fragment.first_child().unwrap();
        assert_eq!(p.get_attribute("title").as_deref(), Some("a \"b\""));
        assert_eq!(p.text_content(), "1 < 2 && AB &bogus;");
    }

    #[test]
    fn test_stray_end_tags_and_unclosed() {
        let fragment = parse("</b><div><p>one</div>two");
        assert_eq!(serialize_children(&fragment), "<div><p>one</p></div>two");
    }

    #[test]
    fn test_implied_end_tags() {
        let fragment = parse("<ul><li>a<li>b</ul><p>x<p>y");
        let tags: Vec<String> = fragment.child_nodes().iter().map(Node::tag_name).collect();
        assert_eq!(tags, vec!["ul", "p", "p"]);
        assert_eq!(fragment.first_child().unwrap().child_count(), 2);
        assert_eq!(
            serialize_children(&fragment),
            "<ul><li>a</li><li>b</li></ul><p>x</p><p>y</p>"
        );
    }

    #[test]
    fn test_context_element() {
        let fragment = parse_fragment("<tr><td>1</td></tr>", "tbody");
        let tr = fragment.first_child().unwrap();
        assert_eq!(tr.tag_name(), "tr");
        assert_eq!(tr.first_child().unwrap().tag_name(), "td");
    }

    #[test]
    fn test_comments_and_doctype() {
        let fragment = parse("<!doctype html><!-- note --><p>x</p>");
        assert_eq!(fragment.child_count(), 2);
        assert_eq!(fragment.first_child().unwrap().kind(), NodeKind::Comment);
        assert_eq!(serialize_children(&fragment), "<!-- note --><p>x</p>");
    }

    #[test]
    fn test_adjacent_text_is_merged() {
        let fragment = parse("a < b");
        assert_eq!(fragment.child_count(), 1);
        assert_eq!(fragment.text_content(), "a < b");
    }

    #[test]
    fn test_serialize_escapes() {
        let p = Node::element("p");
        p.set_attribute("title", "\"q\" & co");
        p.append_child(&Node::text("<tag>")).unwrap();
        assert_eq!(serialize(&p), "<p title=\"&quot;q&quot; &amp; co\">&lt;tag&gt;</p>");
    }
}
