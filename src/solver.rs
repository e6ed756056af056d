//! Dependency-driven attribute solver
//!
//! Typing rules are registered against facts ("attributes") of AST nodes
//! and fire once every fact they depend on exists. `run` drives the
//! pending rules to a fixpoint with an explicit worklist; a registration
//! whose dependencies never resolve becomes an unresolved-attribute error
//! tied to the root missing fact, and rules downstream of a failed fact
//! are cancelled silently so one cause yields one diagnostic.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::frontend::ast::{Ast, NodeId};
use crate::frontend::generics::GenericTable;
use crate::frontend::scopes::{DeclId, DeclTable, ScopeId, ScopeTree};
use crate::types::Type;
use crate::utils::{ErrorKind, Span};

/// Attribute names. One terminal state (value or failure) exists per
/// `(node, attr)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attr {
    /// Static type of an expression or declaration
    Type,
    /// The type denoted by a type-syntax node
    Value,
    /// Declaration referenced by a reference node
    Decl,
    /// Scope attached to a node
    Scope,
    /// Completion flag: execution unconditionally leaves the function
    Returns,
    /// The instantiated type a struct declaration declares
    Declared,
}

impl fmt::Display for Attr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Attr::Type => "type",
            Attr::Value => "value",
            Attr::Decl => "decl",
            Attr::Scope => "scope",
            Attr::Returns => "returns",
            Attr::Declared => "declared",
        };
        write!(f, "{name}")
    }
}

/// Key of one fact.
pub type AttrKey = (NodeId, Attr);

/// The type(s) computed for an expression: a single concrete type, or one
/// type per instantiation site of the enclosing generic declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum Typing {
    Resolved(Type),
    Instantiated(Vec<Type>),
}

impl Typing {
    /// The single resolved type, if this is not a per-instantiation list.
    pub fn resolved(&self) -> Option<&Type> {
        match self {
            Typing::Resolved(ty) => Some(ty),
            Typing::Instantiated(_) => None,
        }
    }

    /// The single resolved type; attributes that are single by
    /// construction (type-node values, declaration types) use this.
    pub fn single(&self) -> &Type {
        match self {
            Typing::Resolved(ty) => ty,
            Typing::Instantiated(_) => {
                panic!("expected a resolved type, found a per-instantiation list")
            }
        }
    }

    pub fn is_instantiated(&self) -> bool {
        matches!(self, Typing::Instantiated(_))
    }
}

/// A published fact value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Types(Typing),
    Decl(DeclId),
    Scope(ScopeId),
    Bool(bool),
}

impl Value {
    pub fn as_typing(&self) -> &Typing {
        match self {
            Value::Types(t) => t,
            other => panic!("attribute holds {other:?}, not a typing"),
        }
    }

    pub fn as_decl(&self) -> DeclId {
        match self {
            Value::Decl(d) => *d,
            other => panic!("attribute holds {other:?}, not a declaration"),
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            other => panic!("attribute holds {other:?}, not a flag"),
        }
    }
}

/// A semantic error: message kind plus the offending node. Collected,
/// never thrown.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticError {
    pub kind: ErrorKind,
    pub node: NodeId,
    pub span: Span,
}

impl fmt::Display for SemanticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind, self.span)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Set(Value),
    Failed,
}

/// Shared read-only state the rules evaluate against.
pub struct Context<'a> {
    pub ast: &'a Ast,
    pub scopes: &'a ScopeTree,
    pub decls: &'a DeclTable,
    pub generics: &'a GenericTable,
}

type Compute = Box<dyn FnOnce(&mut RuleCx<'_>)>;

struct Rule {
    targets: Vec<AttrKey>,
    deps: Vec<AttrKey>,
    compute: Compute,
}

/// The attribute solver.
#[derive(Default)]
pub struct Solver {
    values: HashMap<AttrKey, Slot>,
    pending: Vec<Rule>,
    errors: Vec<SemanticError>,
}

/// Context handed to a firing rule: read dependencies, publish facts,
/// record diagnostics, register follow-up rules.
pub struct RuleCx<'a> {
    pub cx: &'a Context<'a>,
    values: &'a HashMap<AttrKey, Slot>,
    sets: Vec<(AttrKey, Value)>,
    errors: Vec<SemanticError>,
    failed: Vec<AttrKey>,
    rules: Vec<Rule>,
}

impl<'a> RuleCx<'a> {
    /// Read a dependency fact. The scheduler guarantees presence.
    pub fn get(&self, node: NodeId, attr: Attr) -> &Value {
        match self.values.get(&(node, attr)) {
            Some(Slot::Set(value)) => value,
            _ => panic!("rule fired without its dependency ({node:?}, {attr})"),
        }
    }

    pub fn get_typing(&self, node: NodeId) -> &Typing {
        self.get(node, Attr::Type).as_typing()
    }

    pub fn set(&mut self, node: NodeId, attr: Attr, value: Value) {
        self.sets.push(((node, attr), value));
    }

    pub fn set_type(&mut self, node: NodeId, ty: Type) {
        self.set(node, Attr::Type, Value::Types(Typing::Resolved(ty)));
    }

    pub fn set_typing(&mut self, node: NodeId, typing: Typing) {
        self.set(node, Attr::Type, Value::Types(typing));
    }

    /// Record a diagnostic against `node`.
    pub fn error(&mut self, kind: ErrorKind, node: NodeId) {
        let span = self.cx.ast.span(node);
        self.errors.push(SemanticError { kind, node, span });
    }

    /// Record a diagnostic and mark the given attribute slots failed, so
    /// rules depending on them are cancelled instead of re-reported.
    pub fn error_for(&mut self, kind: ErrorKind, node: NodeId, failed: &[AttrKey]) {
        self.error(kind, node);
        self.failed.extend_from_slice(failed);
    }

    /// Mark an attribute slot failed without recording a diagnostic.
    pub fn fail(&mut self, node: NodeId, attr: Attr) {
        self.failed.push((node, attr));
    }

    /// Register a follow-up rule.
    pub fn rule(
        &mut self,
        targets: Vec<AttrKey>,
        deps: Vec<AttrKey>,
        compute: impl FnOnce(&mut RuleCx<'_>) + 'static,
    ) {
        self.rules.push(Rule {
            targets,
            deps,
            compute: Box::new(compute),
        });
    }
}

impl Solver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a fact immediately. Republishing an identical value is a
    /// no-op; conflicting republication is a bug in the registering code.
    pub fn set(&mut self, node: NodeId, attr: Attr, value: Value) {
        let key = (node, attr);
        match self.values.get(&key) {
            None => {
                self.values.insert(key, Slot::Set(value));
            }
            Some(Slot::Set(existing)) => {
                debug_assert!(
                    *existing == value,
                    "conflicting fact for ({key:?}): {existing:?} vs {value:?}"
                );
            }
            Some(Slot::Failed) => {}
        }
    }

    pub fn set_type(&mut self, node: NodeId, ty: Type) {
        self.set(node, Attr::Type, Value::Types(Typing::Resolved(ty)));
    }

    /// Schedule `compute` to run once every dependency fact exists.
    pub fn rule(
        &mut self,
        targets: Vec<AttrKey>,
        deps: Vec<AttrKey>,
        compute: impl FnOnce(&mut RuleCx<'_>) + 'static,
    ) {
        self.pending.push(Rule {
            targets,
            deps,
            compute: Box::new(compute),
        });
    }

    /// Record a diagnostic from the scan phase.
    pub fn error(&mut self, kind: ErrorKind, node: NodeId, span: Span) {
        self.push_error(SemanticError { kind, node, span });
    }

    /// Record a diagnostic and mark attribute slots failed.
    pub fn error_for(&mut self, kind: ErrorKind, node: NodeId, span: Span, failed: &[AttrKey]) {
        self.push_error(SemanticError { kind, node, span });
        for key in failed {
            self.mark_failed(*key);
        }
    }

    pub fn errors(&self) -> &[SemanticError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<SemanticError> {
        self.errors
    }

    /// Has the fact been published (not failed)?
    pub fn has(&self, node: NodeId, attr: Attr) -> bool {
        matches!(self.values.get(&(node, attr)), Some(Slot::Set(_)))
    }

    /// Read a published fact after (or during) solving.
    pub fn value(&self, node: NodeId, attr: Attr) -> Option<&Value> {
        match self.values.get(&(node, attr)) {
            Some(Slot::Set(value)) => Some(value),
            _ => None,
        }
    }

    pub fn typing(&self, node: NodeId) -> Option<&Typing> {
        self.value(node, Attr::Type).map(Value::as_typing)
    }

    fn push_error(&mut self, error: SemanticError) {
        if !self.errors.contains(&error) {
            self.errors.push(error);
        }
    }

    fn mark_failed(&mut self, key: AttrKey) {
        self.values.entry(key).or_insert(Slot::Failed);
    }

    fn dep_failed(&self, rule: &Rule) -> bool {
        rule.deps
            .iter()
            .any(|key| matches!(self.values.get(key), Some(Slot::Failed)))
    }

    fn dep_ready(&self, rule: &Rule) -> bool {
        rule.deps
            .iter()
            .all(|key| matches!(self.values.get(key), Some(Slot::Set(_))))
    }

    fn fire(&mut self, rule: Rule, cx: &Context) {
        let mut rcx = RuleCx {
            cx,
            values: &self.values,
            sets: Vec::new(),
            errors: Vec::new(),
            failed: Vec::new(),
            rules: Vec::new(),
        };
        (rule.compute)(&mut rcx);
        let RuleCx {
            sets,
            errors,
            failed,
            rules,
            ..
        } = rcx;
        for ((node, attr), value) in sets {
            self.set(node, attr, value);
        }
        for error in errors {
            self.push_error(error);
        }
        for key in failed {
            self.mark_failed(key);
        }
        self.pending.extend(rules);
    }

    /// Drive all pending rules to a fixpoint, then report rules that can
    /// never fire.
    pub fn run(&mut self, cx: &Context) {
        let mut sweeps = 0usize;
        loop {
            let mut progress = false;
            let rules = std::mem::take(&mut self.pending);
            let mut waiting = Vec::new();
            for rule in rules {
                if self.dep_failed(&rule) {
                    for target in &rule.targets {
                        self.mark_failed(*target);
                    }
                    progress = true;
                } else if self.dep_ready(&rule) {
                    self.fire(rule, cx);
                    progress = true;
                } else {
                    waiting.push(rule);
                }
            }
            waiting.extend(self.pending.drain(..));
            self.pending = waiting;
            sweeps += 1;
            log::debug!(
                "solver sweep {sweeps}: {} rules waiting, {} errors",
                self.pending.len(),
                self.errors.len()
            );
            if !progress {
                break;
            }
        }
        self.report_unresolved(cx);
    }

    /// After fixpoint: cancel rules downstream of failures, and report the
    /// root missing facts of everything left.
    fn report_unresolved(&mut self, cx: &Context) {
        loop {
            // failure cascade, silent
            loop {
                let mut changed = false;
                let rules = std::mem::take(&mut self.pending);
                let mut keep = Vec::new();
                for rule in rules {
                    if self.dep_failed(&rule) {
                        for target in &rule.targets {
                            self.mark_failed(*target);
                        }
                        changed = true;
                    } else {
                        keep.push(rule);
                    }
                }
                self.pending = keep;
                if !changed {
                    break;
                }
            }
            if self.pending.is_empty() {
                break;
            }

            // every remaining rule waits on a fact nothing has produced;
            // report only root causes (facts no waiting rule would supply)
            let targeted: HashSet<AttrKey> = self
                .pending
                .iter()
                .flat_map(|rule| rule.targets.iter().copied())
                .collect();
            let mut roots: Vec<AttrKey> = Vec::new();
            for rule in &self.pending {
                for dep in &rule.deps {
                    if self.values.get(dep).is_none()
                        && !targeted.contains(dep)
                        && !roots.contains(dep)
                    {
                        roots.push(*dep);
                    }
                }
            }
            if roots.is_empty() {
                // dependency cycle: break it at the first missing fact
                if let Some(dep) = self
                    .pending
                    .iter()
                    .flat_map(|rule| rule.deps.iter())
                    .find(|key| self.values.get(key).is_none())
                {
                    roots.push(*dep);
                } else {
                    break;
                }
            }
            for (node, attr) in roots {
                self.push_error(SemanticError {
                    kind: ErrorKind::UnresolvedAttribute {
                        attr: attr.to_string(),
                        what: cx.ast.contents(node),
                    },
                    node,
                    span: cx.ast.span(node),
                });
                self.mark_failed((node, attr));
            }
        }
    }
}
