//! Property tests for the reactive core and list projection.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use proptest::prelude::*;
use spark_elements::{
    ComputedProperty, Destroy, ElementRef, ListRenderer, ListRendererOptions, Loader,
    LoaderOptions, Node, Nodes, Property, StringTemplate, TextContentRenderer,
};

fn value_strategy() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(-1_000i64..1_000, 0..40)
}

fn list_strategy() -> impl Strategy<Value = Vec<Vec<String>>> {
    prop::collection::vec(prop::collection::vec("[a-z]{0,6}", 0..8), 1..12)
}

proptest! {
    /// Every `set` notifies each listener exactly once with the new value,
    /// equal values included.
    #[test]
    fn notification_per_set(values in value_strategy()) {
        let property = Property::new(0i64);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        property.on_changed(move |v| seen_clone.borrow_mut().push(*v));

        for v in &values {
            property.set(*v);
        }
        prop_assert_eq!(&*seen.borrow(), &values);
        prop_assert_eq!(property.get(), values.last().copied().unwrap_or(0));
    }

    /// A computed value always equals its function over the current sources.
    #[test]
    fn computed_tracks_sources(
        ops in prop::collection::vec((0usize..3, -100i64..100), 0..60)
    ) {
        let sources = [Property::new(1i64), Property::new(2i64), Property::new(3i64)];
        let sum = ComputedProperty::from_all(&sources, |values| values.iter().sum::<i64>());
        let product = ComputedProperty::from2(&sources[0], &sources[2], |a, c| a * c);
        let notified = Rc::new(Cell::new(0usize));
        let notified_clone = notified.clone();
        sum.on_changed(move |_| notified_clone.set(notified_clone.get() + 1));

        for (index, value) in &ops {
            sources[*index].set(*value);
            let current: Vec<i64> = sources.iter().map(Property::get).collect();
            prop_assert_eq!(sum.get(), current.iter().sum::<i64>());
            prop_assert_eq!(product.get(), current[0] * current[2]);
        }
        prop_assert_eq!(notified.get(), ops.len());
    }

    /// The projected children always mirror the list, and nodes are only
    /// created when the list grows past its previous high-water mark.
    #[test]
    fn list_projection_mirrors_values(lists in list_strategy()) {
        let ul = Node::element("ul");
        let list: Property<Vec<String>> = Property::new(Vec::new());
        let created = Rc::new(Cell::new(0usize));
        let template: Rc<dyn Loader> = Rc::new(
            StringTemplate::new("<li></li>", LoaderOptions::new()).unwrap(),
        );
        let created_clone = created.clone();
        let renderer = ListRenderer::new(ListRendererOptions {
            root: ElementRef::new(ul.clone()),
            template,
            list: list.clone(),
            item_renderer: Box::new(move |nodes: Rc<Nodes>, property: Property<String>| -> Rc<dyn Destroy> {
                created_clone.set(created_clone.get() + 1);
                TextContentRenderer::new(nodes.lazy_ref("li"), property)
            }),
        });

        let mut expected_created = 0;
        let mut current_len = 0;
        for values in &lists {
            list.set(values.clone());
            if values.len() > current_len {
                expected_created += values.len() - current_len;
            }
            current_len = values.len();

            let texts: Vec<String> = ul.child_nodes().iter().map(Node::text_content).collect();
            prop_assert_eq!(&texts, values);
            prop_assert_eq!(renderer.len(), values.len());
            prop_assert_eq!(created.get(), expected_created);
        }
    }
}
