//! Lexical scopes and declarations
//!
//! Scopes mirror lexical nesting (root, block, function parameters) and are
//! retained whole after analysis so the interpreter can resolve the same
//! names the analyzer did.

use std::collections::HashMap;

use crate::frontend::ast::NodeId;

/// Index of a scope inside a [`ScopeTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

/// Index of a declaration inside a [`DeclTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub u32);

/// Kind of declared entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Var,
    Param,
    TemplateParam,
    Fun,
    Struct,
    BuiltinType,
    BuiltinFun,
}

impl DeclKind {
    /// What this declaration declares, for diagnostics.
    pub fn declared_thing(&self) -> &'static str {
        match self {
            Self::Var => "variable",
            Self::Param => "parameter",
            Self::TemplateParam => "template parameter",
            Self::Fun => "function",
            Self::Struct => "struct",
            Self::BuiltinType => "built-in type",
            Self::BuiltinFun => "built-in function",
        }
    }

    pub fn is_type(&self) -> bool {
        matches!(self, Self::Struct | Self::BuiltinType | Self::TemplateParam)
    }
}

/// A named entity: variable, parameter, template parameter, function,
/// struct, or compiler builtin.
#[derive(Debug, Clone)]
pub struct Decl {
    pub name: String,
    pub kind: DeclKind,
    /// The AST node that introduced the declaration (synthetic for
    /// builtins).
    pub node: NodeId,
    /// The scope owning the declaration.
    pub scope: ScopeId,
}

/// Arena of all declarations made during one analysis.
#[derive(Debug, Default)]
pub struct DeclTable {
    decls: Vec<Decl>,
}

impl DeclTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &str, kind: DeclKind, node: NodeId, scope: ScopeId) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        self.decls.push(Decl {
            name: name.to_string(),
            kind,
            node,
            scope,
        });
        id
    }

    pub fn get(&self, id: DeclId) -> &Decl {
        &self.decls[id.0 as usize]
    }
}

#[derive(Debug)]
struct ScopeData {
    /// The AST node that introduced this scope.
    node: NodeId,
    parent: Option<ScopeId>,
    declarations: HashMap<String, DeclId>,
}

/// Tree of lexical scopes.
#[derive(Debug, Default)]
pub struct ScopeTree {
    scopes: Vec<ScopeData>,
}

/// Does `name` match the template-parameter pattern (`T`, `T1`, `T2`, ...)?
pub fn is_placeholder_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next() == Some('T') && chars.as_str().chars().all(|c| c.is_ascii_digit())
}

impl ScopeTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new scope under `parent` (`None` for the root scope).
    pub fn push(&mut self, node: NodeId, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(ScopeData {
            node,
            parent,
            declarations: HashMap::new(),
        });
        id
    }

    pub fn node(&self, scope: ScopeId) -> NodeId {
        self.scopes[scope.0 as usize].node
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope.0 as usize].parent
    }

    /// Add a declaration to `scope`. A name already present in the same
    /// scope is a semantic error, reported by the caller; the existing
    /// declaration is returned untouched.
    pub fn declare(&mut self, scope: ScopeId, name: &str, decl: DeclId) -> Result<(), DeclId> {
        let declarations = &mut self.scopes[scope.0 as usize].declarations;
        if let Some(&existing) = declarations.get(name) {
            return Err(existing);
        }
        declarations.insert(name.to_string(), decl);
        Ok(())
    }

    /// Look `name` up in `scope` and its ancestors. An unresolved name
    /// matching the template-parameter pattern falls back to the reserved
    /// `Template` declaration.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<(ScopeId, DeclId)> {
        if let Some(found) = self.lookup_plain(scope, name) {
            return Some(found);
        }
        if is_placeholder_name(name) {
            return self.lookup_plain(scope, "Template");
        }
        None
    }

    fn lookup_plain(&self, scope: ScopeId, name: &str) -> Option<(ScopeId, DeclId)> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let data = &self.scopes[id.0 as usize];
            if let Some(&decl) = data.declarations.get(name) {
                return Some((id, decl));
            }
            current = data.parent;
        }
        None
    }

    /// Look `name` up in `scope` only.
    pub fn lookup_local(&self, scope: ScopeId, name: &str) -> Option<DeclId> {
        self.scopes[scope.0 as usize].declarations.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(n: u32) -> NodeId {
        NodeId(n)
    }

    #[test]
    fn test_lookup_walks_parents() {
        let mut scopes = ScopeTree::new();
        let mut decls = DeclTable::new();
        let root = scopes.push(node(0), None);
        let inner = scopes.push(node(1), Some(root));

        let x = decls.add("x", DeclKind::Var, node(2), root);
        scopes.declare(root, "x", x).unwrap();

        assert_eq!(scopes.lookup(inner, "x"), Some((root, x)));
        assert_eq!(scopes.lookup(inner, "y"), None);
        assert_eq!(scopes.lookup_local(inner, "x"), None);
    }

    #[test]
    fn test_shadowing_across_scopes_is_allowed() {
        let mut scopes = ScopeTree::new();
        let mut decls = DeclTable::new();
        let root = scopes.push(node(0), None);
        let inner = scopes.push(node(1), Some(root));

        let outer_x = decls.add("x", DeclKind::Var, node(2), root);
        let inner_x = decls.add("x", DeclKind::Var, node(3), inner);
        scopes.declare(root, "x", outer_x).unwrap();
        scopes.declare(inner, "x", inner_x).unwrap();

        assert_eq!(scopes.lookup(inner, "x"), Some((inner, inner_x)));
        assert_eq!(scopes.lookup(root, "x"), Some((root, outer_x)));
    }

    #[test]
    fn test_duplicate_in_same_scope_is_rejected() {
        let mut scopes = ScopeTree::new();
        let mut decls = DeclTable::new();
        let root = scopes.push(node(0), None);
        let first = decls.add("x", DeclKind::Var, node(1), root);
        let second = decls.add("x", DeclKind::Var, node(2), root);
        scopes.declare(root, "x", first).unwrap();
        assert_eq!(scopes.declare(root, "x", second), Err(first));
    }

    #[test]
    fn test_placeholder_name_pattern() {
        assert!(is_placeholder_name("T"));
        assert!(is_placeholder_name("T1"));
        assert!(is_placeholder_name("T42"));
        assert!(!is_placeholder_name("Template"));
        assert!(!is_placeholder_name("A1"));
        assert!(!is_placeholder_name("t"));
    }

    #[test]
    fn test_unresolved_placeholder_falls_back_to_template() {
        let mut scopes = ScopeTree::new();
        let mut decls = DeclTable::new();
        let root = scopes.push(node(0), None);
        let template = decls.add("Template", DeclKind::BuiltinType, node(1), root);
        scopes.declare(root, "Template", template).unwrap();

        assert_eq!(scopes.lookup(root, "T"), Some((root, template)));
        assert_eq!(scopes.lookup(root, "T7"), Some((root, template)));
        assert_eq!(scopes.lookup(root, "A7"), None);
    }
}
