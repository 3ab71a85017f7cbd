//! Languages, grammars and the resolver that connects them
//!
//! A grammar is an explicit table rather than a class hierarchy:
//!
//! - a production map from type name to [`Rule`]
//! - the set of concrete node types
//! - a cover map from each cover type to the concrete types it admits
//! - the set of types allowed to match zero-width input
//! - static attributes and unbound attribute names per type
//!
//! Languages pair a grammar with a canonical URL and name their dependencies. Composition
//! happens through explicit dependency lookup, so the languages reachable from a root form
//! a DAG that the [`Resolver`] walks once and indexes by URL.

use super::error::{VmError, VmResult};
use super::production::Rule;
use super::tag::Attributes;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct Grammar {
    productions: HashMap<String, Rule>,
    nodes: HashSet<String>,
    covers: HashMap<String, HashSet<String>>,
    emptyables: HashSet<String>,
    attributes: HashMap<String, Attributes>,
    unbound_attributes: HashMap<String, Vec<String>>,
}

impl Grammar {
    pub fn builder() -> GrammarBuilder {
        GrammarBuilder::default()
    }

    /// Concrete node types emit `OpenNode`/`CloseNode` tags.
    pub fn is_node(&self, node_type: &str) -> bool {
        self.nodes.contains(node_type) && !self.is_cover(node_type)
    }

    /// Cover types classify but forward to one concrete node.
    pub fn is_cover(&self, node_type: &str) -> bool {
        self.covers.contains_key(node_type)
    }

    pub fn is_emptyable(&self, node_type: &str) -> bool {
        self.emptyables.contains(node_type)
    }

    pub fn production(&self, node_type: &str) -> Option<&Rule> {
        self.productions.get(node_type)
    }

    pub fn attributes_for(&self, node_type: &str) -> Attributes {
        self.attributes.get(node_type).cloned().unwrap_or_default()
    }

    pub fn unbound_attributes_for(&self, node_type: &str) -> Vec<String> {
        self.unbound_attributes
            .get(node_type)
            .cloned()
            .unwrap_or_default()
    }
}

impl fmt::Debug for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut productions: Vec<_> = self.productions.keys().collect();
        productions.sort();
        let mut nodes: Vec<_> = self.nodes.iter().collect();
        nodes.sort();
        let mut covers: Vec<_> = self.covers.keys().collect();
        covers.sort();
        f.debug_struct("Grammar")
            .field("productions", &productions)
            .field("nodes", &nodes)
            .field("covers", &covers)
            .finish()
    }
}

/// Builder for grammar tables.
#[derive(Default)]
pub struct GrammarBuilder {
    grammar: Grammar,
}

impl GrammarBuilder {
    /// Declare a concrete node type.
    pub fn node(mut self, node_type: &str) -> Self {
        self.grammar.nodes.insert(node_type.to_string());
        self
    }

    /// Declare a cover type and the concrete types it admits.
    pub fn cover<I, S>(mut self, cover: &str, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let members = members.into_iter().map(Into::into).collect();
        self.grammar.covers.insert(cover.to_string(), members);
        self
    }

    pub fn emptyable(mut self, node_type: &str) -> Self {
        self.grammar.emptyables.insert(node_type.to_string());
        self
    }

    pub fn production(mut self, node_type: &str, rule: Rule) -> Self {
        self.grammar.productions.insert(node_type.to_string(), rule);
        self
    }

    pub fn attribute(mut self, node_type: &str, key: &str, value: serde_json::Value) -> Self {
        self.grammar
            .attributes
            .entry(node_type.to_string())
            .or_default()
            .insert(key.to_string(), value);
        self
    }

    pub fn unbound_attribute(mut self, node_type: &str, key: &str) -> Self {
        self.grammar
            .unbound_attributes
            .entry(node_type.to_string())
            .or_default()
            .push(key.to_string());
        self
    }

    pub fn build(self) -> Grammar {
        self.grammar
    }
}

/// A grammar bound to a canonical URL, plus named dependencies on other languages.
#[derive(Debug)]
pub struct Language {
    pub canonical_url: String,
    pub grammar: Grammar,
    dependencies: BTreeMap<String, Arc<Language>>,
}

impl Language {
    pub fn new(canonical_url: impl Into<String>, grammar: Grammar) -> Self {
        Self {
            canonical_url: canonical_url.into(),
            grammar,
            dependencies: BTreeMap::new(),
        }
    }

    pub fn with_dependency(mut self, name: impl Into<String>, language: Arc<Language>) -> Self {
        self.dependencies.insert(name.into(), language);
        self
    }

    pub fn dependency(&self, name: &str) -> Option<&Arc<Language>> {
        self.dependencies.get(name)
    }

    pub fn dependencies(&self) -> impl Iterator<Item = (&String, &Arc<Language>)> {
        self.dependencies.iter()
    }

    pub fn production(&self, node_type: &str) -> VmResult<&Rule> {
        self.grammar
            .production(node_type)
            .ok_or_else(|| VmError::UnknownProduction {
                language: self.canonical_url.clone(),
                node_type: node_type.to_string(),
            })
    }
}

/// Index of every language reachable from a root language.
#[derive(Debug, Clone)]
pub struct Resolver {
    root: Arc<Language>,
    by_url: HashMap<String, Arc<Language>>,
}

impl Resolver {
    pub fn new(root: Arc<Language>) -> Self {
        let mut by_url = HashMap::new();
        let mut pending = vec![Arc::clone(&root)];

        while let Some(language) = pending.pop() {
            if by_url.contains_key(&language.canonical_url) {
                continue;
            }
            for (_, dependency) in language.dependencies() {
                pending.push(Arc::clone(dependency));
            }
            by_url.insert(language.canonical_url.clone(), language);
        }

        Self { root, by_url }
    }

    pub fn root(&self) -> &Arc<Language> {
        &self.root
    }

    pub fn get(&self, canonical_url: &str) -> Option<&Arc<Language>> {
        self.by_url.get(canonical_url)
    }

    pub fn languages(&self) -> impl Iterator<Item = &Arc<Language>> {
        self.by_url.values()
    }

    /// Resolve `reference` against a language scope, innermost language last.
    ///
    /// `None` means the innermost language. Otherwise each language in the scope is tried
    /// from the inside out, by canonical URL and then by dependency name, before falling
    /// back to an absolute lookup.
    pub fn resolve(
        &self,
        scope: &[Arc<Language>],
        reference: Option<&str>,
    ) -> VmResult<Arc<Language>> {
        let current = scope.last().unwrap_or(&self.root);

        let Some(reference) = reference else {
            return Ok(Arc::clone(current));
        };

        for language in scope.iter().rev() {
            if language.canonical_url == reference {
                return Ok(Arc::clone(language));
            }
            if let Some(dependency) = language.dependency(reference) {
                return Ok(Arc::clone(dependency));
            }
        }

        self.by_url
            .get(reference)
            .cloned()
            .ok_or_else(|| VmError::UnresolvableLanguage {
                from: current.canonical_url.clone(),
                reference: reference.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::production::Script;

    fn leaf() -> Arc<Language> {
        let grammar = Grammar::builder().node("Number").build();
        Arc::new(Language::new("https://example.org/digits", grammar))
    }

    fn root(dependency: Arc<Language>) -> Arc<Language> {
        let grammar = Grammar::builder()
            .node("Sum")
            .cover("Expression", ["Sum"])
            .emptyable("Sum")
            .production("Sum", Script::rule(Vec::new()))
            .build();
        Arc::new(
            Language::new("https://example.org/sums", grammar).with_dependency("digits", dependency),
        )
    }

    #[test]
    fn classifies_nodes_and_covers() {
        let language = root(leaf());
        let grammar = &language.grammar;
        assert!(grammar.is_node("Sum"));
        assert!(!grammar.is_node("Expression"));
        assert!(grammar.is_cover("Expression"));
        assert!(grammar.is_emptyable("Sum"));
        assert!(!grammar.is_emptyable("Expression"));
    }

    #[test]
    fn resolves_dependencies_by_name_and_url() {
        let language = root(leaf());
        let resolver = Resolver::new(Arc::clone(&language));
        let scope = vec![Arc::clone(&language)];

        let by_name = resolver.resolve(&scope, Some("digits")).unwrap();
        assert_eq!(by_name.canonical_url, "https://example.org/digits");

        let by_url = resolver
            .resolve(&scope, Some("https://example.org/digits"))
            .unwrap();
        assert!(Arc::ptr_eq(&by_name, &by_url));

        let current = resolver.resolve(&scope, None).unwrap();
        assert!(Arc::ptr_eq(&current, &language));
    }

    #[test]
    fn outer_scope_anchors_relative_lookups() {
        let digits = leaf();
        let language = root(Arc::clone(&digits));
        let resolver = Resolver::new(Arc::clone(&language));

        // Inside digits, "digits" is not a dependency, but the enclosing scope knows it.
        let scope = vec![Arc::clone(&language), Arc::clone(&digits)];
        let resolved = resolver.resolve(&scope, Some("digits")).unwrap();
        assert!(Arc::ptr_eq(&resolved, &digits));
    }

    #[test]
    fn unknown_language_is_an_error() {
        let language = root(leaf());
        let resolver = Resolver::new(Arc::clone(&language));
        let err = resolver.resolve(&[language], Some("regex")).unwrap_err();
        assert!(matches!(err, VmError::UnresolvableLanguage { .. }));
    }

    #[test]
    fn missing_production_is_an_error() {
        let language = leaf();
        assert!(matches!(
            language.production("Number"),
            Err(VmError::UnknownProduction { .. })
        ));
    }
}
