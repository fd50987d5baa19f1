//! # spark-elements
//!
//! Reactive custom-element framework for Rust.
//!
//! ## Architecture
//!
//! Components own observable [`Property`] cells and wire them to DOM nodes
//! through links and renderers. A [`ShadowDomRenderer`] populates the shadow
//! tree, which resolves every [`LazyRef`] scoped to it and unblocks the
//! links and renderers waiting on those references:
//! ```text
//! Property → Link/Renderer → LazyRef → ShadowDomRenderer::render → "rendered" → "ready"
//! ```
//!
//! Everything is single-threaded and synchronous: a `set` has notified every
//! listener, and every bound node is updated, before it returns. Only asset
//! loading is asynchronous.
//!
//! ## Modules
//!
//! - [`events`] - Named publish/subscribe channel
//! - [`reactive`] - Property and ComputedProperty
//! - [`refs`] - ElementRef, LazyRef, Nodes
//! - [`renderer`] - Shadow, text, conditional and list renderers
//! - [`links`] - DownLink, UpLink, TwoWayLink
//! - [`loaders`] - Template and style loaders
//! - [`registry`] - Custom element definitions and module init
//! - [`dom`] - The document model everything binds to
//! - [`fetch`] - Asset fetchers for remote loaders
//! - [`config`] / [`logging`] - Platform configuration and tracing setup

pub mod config;
pub mod dom;
pub mod error;
pub mod events;
pub mod fetch;
pub mod links;
pub mod loaders;
pub mod logging;
pub mod reactive;
pub mod refs;
pub mod registry;
pub mod renderer;

pub use config::{PlatformConfig, UrlRewrite};
pub use dom::{DomEvent, Node, NodeKind, Selector};
pub use error::{PlatformError, Result, SelectorError};
pub use events::{EventChannel, ListenerId, ListenerOptions};
pub use fetch::{Fetch, FileFetcher, MapFetcher, RewritingFetcher};
#[cfg(feature = "http")]
pub use fetch::ReqwestFetcher;
pub use links::{
    DownLink, DownLinkOptions, LinkTarget, TwoWayLink, TwoWayLinkOptions, UpLink, UpLinkOptions,
    ValueGetter,
};
pub use loaders::{
    Loader, LoaderOptions, RemoteStyle, RemoteTemplate, StringStyle, StringTemplate, Template,
};
pub use reactive::{ComputedProperty, Observable, Property};
pub use refs::{ElementRef, LazyRef, Nodes, Reference, RenderRoot};
pub use registry::{Component, ModuleInit, define, register};
pub use renderer::{
    CondRenderer, Destroy, ItemRenderer, ListRenderer, ListRendererOptions, ShadowDomRenderer,
    TextContentRenderer,
};
