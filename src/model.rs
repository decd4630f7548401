//! Core types for the relationship index.
//!
//! Defines the identities the index is keyed on (contexts, sources,
//! elements), the closed set of relationship kinds, and the compiled-unit
//! input handed over by the external analyzer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identity of one analysis context (a project or package).
///
/// Contexts group sources; removing a context retracts everything
/// contributed by any source inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextId(String);

impl ContextId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one compilation input (a file path within a context).
///
/// Sources are the unit of incremental removal: every relationship record
/// contributed while indexing a source is tagged with it, so re-indexing or
/// deleting that source retracts exactly its own records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Source {
    /// Path of the compilation input, relative to its context.
    pub path: String,
}

impl Source {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}

/// A position at which a relationship holds: source, offset, and length.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// The source containing the relationship site.
    pub source: Source,
    /// Byte offset of the site within the source.
    pub offset: u32,
    /// Length of the site in bytes.
    pub length: u32,
}

impl Location {
    pub fn new(source: Source, offset: u32, length: u32) -> Self {
        Self {
            source,
            offset,
            length,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}+{}", self.source, self.offset, self.length)
    }
}

/// The kind of a declared program element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    /// A class or type declaration.
    Class,
    /// A method (function inside a class).
    Method,
    /// A field inside a class.
    Field,
    /// A free function.
    Function,
    /// A variable (local or top-level).
    Variable,
    /// A getter accessor.
    Getter,
    /// A setter accessor.
    Setter,
    /// A constructor.
    Constructor,
    /// A library / compilation-unit root element.
    Library,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementKind::Class => write!(f, "class"),
            ElementKind::Method => write!(f, "method"),
            ElementKind::Field => write!(f, "field"),
            ElementKind::Function => write!(f, "function"),
            ElementKind::Variable => write!(f, "variable"),
            ElementKind::Getter => write!(f, "getter"),
            ElementKind::Setter => write!(f, "setter"),
            ElementKind::Constructor => write!(f, "constructor"),
            ElementKind::Library => write!(f, "library"),
        }
    }
}

/// Identity of a declared program element.
///
/// The identity key is the whole struct: kind, enclosing-element chain, name,
/// declaring source, and declaration offset. Elements are produced by the
/// external analyzer and shared into the index as `Arc<Element>`; the store
/// references them, it never owns them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Element {
    /// What kind of element this is.
    pub kind: ElementKind,
    /// Names of the enclosing elements, outermost first (empty for
    /// top-level declarations).
    pub enclosing: Vec<String>,
    /// The declared name.
    pub name: String,
    /// The source this element is declared in.
    pub source: Source,
    /// Byte offset of the declaration within its source.
    pub offset: u32,
}

impl Element {
    /// A top-level element (no enclosing chain).
    pub fn top_level(kind: ElementKind, name: impl Into<String>, source: Source, offset: u32) -> Self {
        Self {
            kind,
            enclosing: Vec::new(),
            name: name.into(),
            source,
            offset,
        }
    }

    /// An element nested inside other declarations, outermost first.
    pub fn member(
        kind: ElementKind,
        enclosing: Vec<String>,
        name: impl Into<String>,
        source: Source,
        offset: u32,
    ) -> Self {
        Self {
            kind,
            enclosing,
            name: name.into(),
            source,
            offset,
        }
    }

    /// Dotted name including the enclosing chain, e.g. `"Shape.area"`.
    pub fn qualified_name(&self) -> String {
        if self.enclosing.is_empty() {
            return self.name.clone();
        }
        let mut qualified = self.enclosing.join(".");
        qualified.push('.');
        qualified.push_str(&self.name);
        qualified
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.qualified_name())
    }
}

/// How an element relates to a location. A fixed, closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    /// The element is referenced (named) at the location.
    ReferencedBy,
    /// The element is invoked at the location.
    InvokedBy,
    /// The class element is extended by the declaration at the location.
    ExtendedBy,
    /// The class element is implemented by the declaration at the location.
    ImplementedBy,
    /// The class element is mixed into the declaration at the location.
    MixedInBy,
    /// The member element is overridden by the declaration at the location.
    OverriddenBy,
    /// The variable or field element is read at the location.
    ReadBy,
    /// The variable or field element is written at the location.
    WrittenBy,
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationshipKind::ReferencedBy => write!(f, "is-referenced-by"),
            RelationshipKind::InvokedBy => write!(f, "is-invoked-by"),
            RelationshipKind::ExtendedBy => write!(f, "is-extended-by"),
            RelationshipKind::ImplementedBy => write!(f, "is-implemented-by"),
            RelationshipKind::MixedInBy => write!(f, "is-mixed-in-by"),
            RelationshipKind::OverriddenBy => write!(f, "is-overridden-by"),
            RelationshipKind::ReadBy => write!(f, "is-read-by"),
            RelationshipKind::WrittenBy => write!(f, "is-written-by"),
        }
    }
}

/// One relationship discovered by the analyzer while resolving a unit.
/// Intermediate representation; becomes a store record when the unit is
/// indexed.
#[derive(Debug, Clone)]
pub struct DiscoveredRelationship {
    /// The element the relationship is about.
    pub subject: Arc<Element>,
    /// How the subject relates to the location.
    pub kind: RelationshipKind,
    /// Where the relationship holds.
    pub location: Location,
}

/// The analyzer's output for one compilation input.
///
/// The index treats this as opaque: it never parses or resolves source
/// itself. A unit whose `root` is `None` failed resolution and is skipped
/// when indexed.
#[derive(Debug, Clone)]
pub struct CompiledUnit {
    /// The source this unit was compiled from.
    pub source: Source,
    /// Root element of the unit, `None` if resolution failed.
    pub root: Option<Arc<Element>>,
    /// Relationships discovered within the unit.
    pub relationships: Vec<DiscoveredRelationship>,
}

impl CompiledUnit {
    pub fn new(
        source: Source,
        root: Option<Arc<Element>>,
        relationships: Vec<DiscoveredRelationship>,
    ) -> Self {
        Self {
            source,
            root,
            relationships,
        }
    }

    /// A unit that failed resolution; indexing it is a no-op.
    pub fn unresolved(source: Source) -> Self {
        Self {
            source,
            root: None,
            relationships: Vec::new(),
        }
    }
}

/// Selects sources for bulk retraction.
///
/// Either an explicit list or an arbitrary predicate; the predicate form
/// supports "everything under this directory" style removals.
#[derive(Clone)]
pub enum SourceFilter {
    /// Exactly these sources.
    List(Vec<Source>),
    /// Every source the predicate accepts.
    Matching(Arc<dyn Fn(&Source) -> bool + Send + Sync>),
}

impl SourceFilter {
    /// Sources whose path starts with the given prefix.
    pub fn path_prefix(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        SourceFilter::Matching(Arc::new(move |source| source.path.starts_with(&prefix)))
    }

    pub fn matches(&self, source: &Source) -> bool {
        match self {
            SourceFilter::List(sources) => sources.contains(source),
            SourceFilter::Matching(predicate) => predicate(source),
        }
    }
}

impl fmt::Debug for SourceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFilter::List(sources) => f.debug_tuple("List").field(sources).finish(),
            SourceFilter::Matching(_) => f.write_str("Matching(<predicate>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> Source {
        Source::new("lib/shapes.dart")
    }

    #[test]
    fn test_element_qualified_name() {
        let top = Element::top_level(ElementKind::Class, "Shape", source(), 0);
        assert_eq!(top.qualified_name(), "Shape");

        let method = Element::member(
            ElementKind::Method,
            vec!["Shape".to_string()],
            "area",
            source(),
            42,
        );
        assert_eq!(method.qualified_name(), "Shape.area");
        assert_eq!(method.to_string(), "method Shape.area");
    }

    #[test]
    fn test_element_identity_includes_declaration_site() {
        // Same name and kind at different offsets are different elements.
        let a = Element::top_level(ElementKind::Function, "main", source(), 0);
        let b = Element::top_level(ElementKind::Function, "main", source(), 100);
        assert_ne!(a, b);

        let a2 = Element::top_level(ElementKind::Function, "main", source(), 0);
        assert_eq!(a, a2);
    }

    #[test]
    fn test_relationship_kind_display() {
        assert_eq!(RelationshipKind::ReferencedBy.to_string(), "is-referenced-by");
        assert_eq!(RelationshipKind::OverriddenBy.to_string(), "is-overridden-by");
    }

    #[test]
    fn test_source_filter_list() {
        let filter = SourceFilter::List(vec![Source::new("a.dart"), Source::new("b.dart")]);
        assert!(filter.matches(&Source::new("a.dart")));
        assert!(!filter.matches(&Source::new("c.dart")));
    }

    #[test]
    fn test_source_filter_path_prefix() {
        let filter = SourceFilter::path_prefix("lib/");
        assert!(filter.matches(&Source::new("lib/shapes.dart")));
        assert!(!filter.matches(&Source::new("test/shapes_test.dart")));
    }

    #[test]
    fn test_unresolved_unit_has_no_root() {
        let unit = CompiledUnit::unresolved(source());
        assert!(unit.root.is_none());
        assert!(unit.relationships.is_empty());
    }

    #[test]
    fn test_location_serde_shape() {
        let loc = Location::new(source(), 10, 4);
        let json = serde_json::to_value(&loc).expect("location serializes");
        assert_eq!(json["source"]["path"], "lib/shapes.dart");
        assert_eq!(json["offset"], 10);
        assert_eq!(json["length"], 4);
    }

    #[test]
    fn test_element_kind_serde_snake_case() {
        let json = serde_json::to_string(&ElementKind::Constructor).expect("kind serializes");
        assert_eq!(json, "\"constructor\"");
    }
}
