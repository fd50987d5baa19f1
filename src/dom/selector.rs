//! CSS selectors for `query_selector` and `matches`, backed by the
//! `selectors` crate.
//!
//! Nodes are exposed to the matcher through [`ElementView`]. Its
//! `parent_element` stops at shadow roots, so a shadow root acts as a
//! boundary the same way it does in a browser. Pseudo-classes that need
//! user-action state never match.

use std::fmt;

use cssparser::ToCss;
use html5ever::{LocalName, Namespace, ns};
use precomputed_hash::PrecomputedHash;
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::bloom::BloomFilter;
use selectors::matching::{
    self, MatchingContext, MatchingForInvalidation, MatchingMode, NeedsSelectorFlags, QuirksMode,
    SelectorCaches,
};
use selectors::parser::{self, ParseRelative, SelectorList, SelectorParseErrorKind};
use selectors::{Element, OpaqueElement};

use crate::error::SelectorError;

use super::{Node, NodeKind};

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    list: SelectorList<DomImpl>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        if source.trim().is_empty() {
            return Err(SelectorError::Empty);
        }
        let mut input = cssparser::ParserInput::new(source);
        let mut parser = cssparser::Parser::new(&mut input);
        let list = SelectorList::parse(&DomParser, &mut parser, ParseRelative::No).map_err(|err| {
            SelectorError::Invalid {
                selector: source.to_string(),
                column: err.location.column,
                reason: format!("{:?}", err.kind),
            }
        })?;
        Ok(Self {
            source: source.to_string(),
            list,
        })
    }

    /// Whether `node` matches any selector of the list. Non-elements never match.
    pub fn matches(&self, node: &Node) -> bool {
        if !node.is_element() {
            return false;
        }
        let element = ElementView(node.clone());
        let mut caches = SelectorCaches::default();
        let mut context = MatchingContext::new(
            MatchingMode::Normal,
            None,
            &mut caches,
            QuirksMode::NoQuirks,
            NeedsSelectorFlags::No,
            MatchingForInvalidation::No,
        );
        self.list
            .slice()
            .iter()
            .any(|selector| matching::matches_selector(selector, 0, None, &element, &mut context))
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

// =============================================================================
// Selector vocabulary
// =============================================================================

struct DomParser;

impl<'i> parser::Parser<'i> for DomParser {
    type Impl = DomImpl;
    type Error = SelectorParseErrorKind<'i>;

    fn parse_is_and_where(&self) -> bool {
        true
    }

    fn parse_has(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DomImpl;

impl parser::SelectorImpl for DomImpl {
    type AttrValue = CssString;
    type Identifier = CssName;
    type LocalName = CssName;
    type NamespacePrefix = CssName;
    type NamespaceUrl = Namespace;
    type BorrowedNamespaceUrl = Namespace;
    type BorrowedLocalName = CssName;
    type NonTSPseudoClass = NoPseudoClass;
    type PseudoElement = NoPseudoElement;
    type ExtraMatchingData<'a> = ();
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CssString(String);

impl From<&str> for CssString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for CssString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl ToCss for CssString {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        cssparser::serialize_string(&self.0, dest)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct CssName(LocalName);

impl From<&str> for CssName {
    fn from(value: &str) -> Self {
        Self(LocalName::from(value))
    }
}

impl ToCss for CssName {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        cssparser::serialize_identifier(&self.0, dest)
    }
}

impl PrecomputedHash for CssName {
    fn precomputed_hash(&self) -> u32 {
        self.0.precomputed_hash()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NoPseudoClass {}

impl parser::NonTSPseudoClass for NoPseudoClass {
    type Impl = DomImpl;

    fn is_active_or_hover(&self) -> bool {
        false
    }

    fn is_user_action_state(&self) -> bool {
        false
    }
}

impl ToCss for NoPseudoClass {
    fn to_css<W: fmt::Write>(&self, _dest: &mut W) -> fmt::Result {
        match *self {}
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NoPseudoElement {}

impl parser::PseudoElement for NoPseudoElement {
    type Impl = DomImpl;
}

impl ToCss for NoPseudoElement {
    fn to_css<W: fmt::Write>(&self, _dest: &mut W) -> fmt::Result {
        match *self {}
    }
}

// =============================================================================
// Element view
// =============================================================================

/// An element node as seen by the matcher.
#[derive(Debug, Clone)]
struct ElementView(Node);

impl ElementView {
    fn wrap(node: Node) -> Option<Self> {
        node.is_element().then_some(Self(node))
    }

    fn element_sibling(&self, step: fn(&Node) -> Option<Node>) -> Option<Self> {
        let mut current = step(&self.0);
        while let Some(node) = current {
            if node.is_element() {
                return Some(Self(node));
            }
            current = step(&node);
        }
        None
    }
}

impl Element for ElementView {
    type Impl = DomImpl;

    fn opaque(&self) -> OpaqueElement {
        OpaqueElement::from_non_null_ptr(self.0.identity())
    }

    fn parent_element(&self) -> Option<Self> {
        self.0.parent_element().map(Self)
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        self.0.parent().is_some_and(|parent| parent.kind() == NodeKind::ShadowRoot)
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        None
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        self.element_sibling(Node::previous_sibling)
    }

    fn next_sibling_element(&self) -> Option<Self> {
        self.element_sibling(Node::next_sibling)
    }

    fn first_element_child(&self) -> Option<Self> {
        self.0.child_nodes().into_iter().find_map(Self::wrap)
    }

    fn is_html_element_in_html_document(&self) -> bool {
        true
    }

    fn has_local_name(&self, name: &CssName) -> bool {
        self.0.tag_name() == *name.0
    }

    fn has_namespace(&self, namespace: &Namespace) -> bool {
        *namespace == ns!(html)
    }

    fn is_same_type(&self, other: &Self) -> bool {
        self.0.tag_name() == other.0.tag_name()
    }

    fn attr_matches(
        &self,
        ns: &NamespaceConstraint<&Namespace>,
        local_name: &CssName,
        operation: &AttrSelectorOperation<&CssString>,
    ) -> bool {
        if let NamespaceConstraint::Specific(url) = ns {
            if !url.is_empty() {
                return false;
            }
        }
        self.0
            .get_attribute(&local_name.0)
            .is_some_and(|value| operation.eval_str(&value))
    }

    fn match_non_ts_pseudo_class(&self, pc: &NoPseudoClass, _context: &mut MatchingContext<'_, DomImpl>) -> bool {
        match *pc {}
    }

    fn match_pseudo_element(&self, pe: &NoPseudoElement, _context: &mut MatchingContext<'_, DomImpl>) -> bool {
        match *pe {}
    }

    fn apply_selector_flags(&self, _flags: matching::ElementSelectorFlags) {}

    fn is_link(&self) -> bool {
        self.0.tag_name() == "a" && self.0.has_attribute("href")
    }

    fn is_html_slot_element(&self) -> bool {
        self.0.tag_name() == "slot"
    }

    fn has_id(&self, id: &CssName, case_sensitivity: CaseSensitivity) -> bool {
        self.0
            .get_attribute("id")
            .is_some_and(|value| case_sensitivity.eq(id.0.as_bytes(), value.as_bytes()))
    }

    fn has_class(&self, name: &CssName, case_sensitivity: CaseSensitivity) -> bool {
        self.0.get_attribute("class").is_some_and(|classes| {
            classes
                .split_ascii_whitespace()
                .any(|class| case_sensitivity.eq(name.0.as_bytes(), class.as_bytes()))
        })
    }

    fn has_custom_state(&self, _name: &CssName) -> bool {
        false
    }

    fn imported_part(&self, _name: &CssName) -> Option<CssName> {
        None
    }

    fn is_part(&self, _name: &CssName) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        !self.0.child_nodes().iter().any(|child| match child.kind() {
            NodeKind::Element => true,
            NodeKind::Text => !child.text_content().is_empty(),
            _ => false,
        })
    }

    fn is_root(&self) -> bool {
        self.0.parent().is_some_and(|parent| parent.kind() == NodeKind::Document)
    }

    fn add_element_unique_hashes(&self, _filter: &mut BloomFilter) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn el(tag: &str, attrs: &[(&str, &str)]) -> Node {
        let node = Node::element(tag);
        for (k, v) in attrs {
            node.set_attribute(k, v);
        }
        node
    }

    #[test]
    fn test_compound_matching() {
        let link = el("link", &[("href", "a.css"), ("class", "x y"), ("id", "main")]);

        for sel in ["link", "*", "link[href]", "#main", ".x.y", "link#main.y[href=\"a.css\"]"] {
            assert!(Selector::parse(sel).unwrap().matches(&link), "{sel}");
        }
        for sel in ["a", "link[rel]", ".z", "#other", "[href=b\\.css]"] {
            assert!(!Selector::parse(sel).unwrap().matches(&link), "{sel}");
        }
    }

    #[test]
    fn test_attribute_operators() {
        let node = el("div", &[("data-tags", "red green blue"), ("lang", "en-US")]);
        for sel in ["[data-tags~=green]", "[lang^=en]", "[lang$=US]", "[lang*='n-U']", "[lang|=en]", "[lang=EN-us i]"] {
            assert!(Selector::parse(sel).unwrap().matches(&node), "{sel}");
        }
        assert!(!Selector::parse("[data-tags~=gre]").unwrap().matches(&node));
    }

    #[test]
    fn test_combinators() {
        let root = el("section", &[]);
        let list = el("ul", &[("class", "items")]);
        let item = el("li", &[]);
        let span = el("span", &[]);
        root.append_child(&list).unwrap();
        list.append_child(&item).unwrap();
        item.append_child(&span).unwrap();

        assert!(Selector::parse("section span").unwrap().matches(&span));
        assert!(Selector::parse(".items > li > span").unwrap().matches(&span));
        assert!(!Selector::parse("section > span").unwrap().matches(&span));
        assert!(Selector::parse("p, li").unwrap().matches(&item));
        assert!(Selector::parse("section:has(span)").unwrap().matches(&root));
    }

    #[test]
    fn test_sibling_and_structural() {
        let root = el("ul", &[]);
        root.set_inner_html("<li>a</li> text <li class=b>b</li><li></li>").unwrap();
        let items = root.query_selector_all("li").unwrap();

        assert!(Selector::parse("li + .b").unwrap().matches(&items[1]));
        assert!(Selector::parse("li ~ li:last-child").unwrap().matches(&items[2]));
        assert!(Selector::parse("li:first-child").unwrap().matches(&items[0]));
        assert!(Selector::parse(":empty").unwrap().matches(&items[2]));
        assert!(!Selector::parse(":empty").unwrap().matches(&items[0]));
    }

    #[test]
    fn test_shadow_root_is_a_boundary() {
        let host = el("x-host", &[]);
        let shadow = host.attach_shadow().unwrap();
        let inner = el("span", &[]);
        shadow.append_child(&inner).unwrap();

        assert!(Selector::parse("span").unwrap().matches(&inner));
        assert!(!Selector::parse("x-host span").unwrap().matches(&inner));
    }

    #[test]
    fn test_non_elements_never_match() {
        assert!(!Selector::parse("*").unwrap().matches(&Node::text("x")));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Selector::parse("  "), Err(SelectorError::Empty));
        for source in ["a >", "[href", "a!", "li:hover-ish"] {
            assert!(
                matches!(Selector::parse(source), Err(SelectorError::Invalid { ref selector, .. }) if selector == source),
                "{source}"
            );
        }
    }
}
