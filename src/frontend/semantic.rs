//! Semantic analysis for Quill
//!
//! Performs:
//! - Scope construction and name resolution (forward-reference tolerant)
//! - Type computation for every declaration and expression
//! - Generic (template) instantiation per call site
//! - Control-flow completeness and the remaining language rules
//!
//! The entry point is [`analyze`]: one pre-order, left-to-right scan
//! registers scopes and declarations eagerly and queues typing rules on the
//! attribute solver; the solver then drives all rules to a fixpoint.

use std::collections::HashSet;

use crate::frontend::ast::{Ast, BinaryOp, Node, NodeId, UnaryOp};
use crate::frontend::generics::{make_bindings, template_arg_type, GenericTable};
use crate::frontend::scopes::{
    is_placeholder_name, DeclId, DeclKind, DeclTable, ScopeId, ScopeTree,
};
use crate::solver::{Attr, AttrKey, Context, RuleCx, SemanticError, Solver, Typing, Value};
use crate::types::{common_supertype, Primitive, Type};
use crate::utils::ErrorKind;

// ==================== Analysis Result ====================

/// The fully annotated result of one pass: every fact the interpreter
/// needs, plus the collected diagnostics.
pub struct Analysis {
    solver: Solver,
    pub scopes: ScopeTree,
    pub decls: DeclTable,
    pub generics: GenericTable,
}

impl Analysis {
    pub fn errors(&self) -> &[SemanticError] {
        self.solver.errors()
    }

    pub fn ok(&self) -> bool {
        self.solver.errors().is_empty()
    }

    /// Report every collected error through `f`.
    pub fn report_errors(&self, mut f: impl FnMut(&SemanticError)) {
        for error in self.solver.errors() {
            f(error);
        }
    }

    /// The computed type(s) of an expression or declaration.
    pub fn typing(&self, node: NodeId) -> Option<&Typing> {
        self.solver.typing(node)
    }

    pub fn value(&self, node: NodeId, attr: Attr) -> Option<&Value> {
        self.solver.value(node, attr)
    }

    /// The completion flag of a block/if/return statement.
    pub fn returns(&self, node: NodeId) -> Option<bool> {
        match self.solver.value(node, Attr::Returns) {
            Some(Value::Bool(b)) => Some(*b),
            _ => None,
        }
    }
}

/// Run semantic analysis over a parsed tree.
pub fn analyze(ast: &Ast) -> Analysis {
    let analyzer = Analyzer::new(ast);
    let analysis = analyzer.run();
    log::debug!(
        "analysis finished: {} nodes, {} errors",
        ast.len(),
        analysis.errors().len()
    );
    analysis
}

// ==================== Builtins ====================

/// A builtin declared in the root scope. Builtins live on synthetic node
/// ids outside the tree.
struct BuiltinSeed {
    name: &'static str,
    kind: DeclKind,
    node: NodeId,
    ty: Type,
    declared: Option<Type>,
}

fn builtin_seeds() -> Vec<BuiltinSeed> {
    let types = [
        ("Int", Type::int()),
        ("Float", Type::float()),
        ("Bool", Type::bool()),
        ("String", Type::string()),
        ("Void", Type::void()),
        ("Type", Type::TypeOfType),
        ("Template", Type::template()),
    ];
    let mut seeds: Vec<BuiltinSeed> = types
        .into_iter()
        .enumerate()
        .map(|(i, (name, declared))| BuiltinSeed {
            name,
            kind: DeclKind::BuiltinType,
            node: NodeId(u32::MAX - i as u32),
            ty: Type::TypeOfType,
            declared: Some(declared),
        })
        .collect();
    seeds.push(BuiltinSeed {
        name: "print",
        kind: DeclKind::BuiltinFun,
        node: NodeId(u32::MAX - seeds.len() as u32),
        ty: Type::Fun {
            ret: Box::new(Type::string()),
            params: vec![Type::string()],
        },
        declared: None,
    });
    seeds
}

// ==================== Analyzer ====================

/// The function declaration enclosing the current scan position.
struct FunCtx {
    decl: DeclId,
    ret_ty: NodeId,
}

struct Analyzer<'a> {
    ast: &'a Ast,
    solver: Solver,
    scopes: ScopeTree,
    decls: DeclTable,
    generics: GenericTable,
    /// Current scope during the scan.
    scope: Option<ScopeId>,
    /// Context for type inference of empty array literals: the enclosing
    /// `var` declaration or function call.
    inference: Option<NodeId>,
    funs: Vec<FunCtx>,
    /// Function and struct names, program-wide.
    program_names: HashSet<String>,
}

impl<'a> Analyzer<'a> {
    fn new(ast: &'a Ast) -> Self {
        Self {
            ast,
            solver: Solver::new(),
            scopes: ScopeTree::new(),
            decls: DeclTable::new(),
            generics: GenericTable::new(),
            scope: None,
            inference: None,
            funs: Vec::new(),
            program_names: HashSet::new(),
        }
    }

    fn run(mut self) -> Analysis {
        if let Some(root) = self.ast.root() {
            self.scan(root);
        }
        let Analyzer {
            ast,
            mut solver,
            scopes,
            decls,
            generics,
            ..
        } = self;
        {
            let cx = Context {
                ast,
                scopes: &scopes,
                decls: &decls,
                generics: &generics,
            };
            solver.run(&cx);
        }
        Analysis {
            solver,
            scopes,
            decls,
            generics,
        }
    }

    // ==================== Scan Helpers ====================

    fn cur(&self) -> ScopeId {
        self.scope.expect("scan outside any scope")
    }

    fn error(&mut self, kind: ErrorKind, node: NodeId) {
        let span = self.ast.span(node);
        self.solver.error(kind, node, span);
    }

    /// Declare a name in the current scope, reporting a redeclaration.
    fn declare(&mut self, name: &str, kind: DeclKind, node: NodeId) -> DeclId {
        let scope = self.cur();
        let decl = self.decls.add(name, kind, node, scope);
        if self.scopes.declare(scope, name, decl).is_err() {
            self.error(
                ErrorKind::Redeclaration {
                    name: name.to_string(),
                },
                node,
            );
        }
        decl
    }

    /// Resolve the declaration a call expression targets, if it is already
    /// known at this point of the scan (functions declared later resolve
    /// deferred, without template recording).
    fn callee_decl(&self, scope: ScopeId, callee: NodeId) -> Option<DeclId> {
        match self.ast.kind(callee) {
            Node::Ref { name } => {
                let (_, decl) = self.scopes.lookup(scope, name)?;
                matches!(
                    self.decls.get(decl).kind,
                    DeclKind::Fun | DeclKind::BuiltinFun
                )
                .then_some(decl)
            }
            Node::CtorRef { target } => {
                let Node::Ref { name } = self.ast.kind(*target) else {
                    return None;
                };
                let (_, decl) = self.scopes.lookup(scope, name)?;
                (self.decls.get(decl).kind == DeclKind::Struct).then_some(decl)
            }
            _ => None,
        }
    }

    fn clause_names(&self, template_params: &Option<Vec<NodeId>>) -> Vec<String> {
        template_params
            .as_ref()
            .map(|tps| {
                tps.iter()
                    .filter_map(|tp| match self.ast.kind(*tp) {
                        Node::TemplateParam { name } => Some(name.clone()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn decl_template_names(&self, decl: DeclId) -> Vec<String> {
        let node = self.decls.get(decl).node;
        match self.ast.kind(node) {
            Node::FunDecl {
                template_params, ..
            }
            | Node::StructDecl {
                template_params, ..
            } => self.clause_names(template_params),
            _ => Vec::new(),
        }
    }

    // ==================== Scan Dispatch ====================

    fn scan(&mut self, node: NodeId) {
        match self.ast.kind(node).clone() {
            Node::IntLit(_) => self.solver.set_type(node, Type::int()),
            Node::FloatLit(_) => self.solver.set_type(node, Type::float()),
            Node::StrLit(_) => self.solver.set_type(node, Type::string()),
            Node::BoolLit(_) => self.solver.set_type(node, Type::bool()),
            Node::NullLit => self.solver.set_type(node, Type::null()),
            Node::Ref { name } => self.reference(node, &name),
            Node::CtorRef { target } => {
                self.scan(target);
                self.ctor_ref(node, target);
            }
            Node::ArrayLit { elems } => self.array_lit(node, &elems),
            Node::Paren { expr } => {
                self.scan(expr);
                let scope = self.cur();
                self.solver.set(node, Attr::Scope, Value::Scope(scope));
                self.solver
                    .rule(vec![(node, Attr::Type)], vec![(expr, Attr::Type)], move |r| {
                        let typing = r.get_typing(expr).clone();
                        r.set_typing(node, typing);
                    });
            }
            Node::FieldAccess { object, field } => {
                self.scan(object);
                self.field_access(node, object, &field);
            }
            Node::ArrayAccess { array, index } => {
                self.scan(array);
                self.scan(index);
                self.array_access(node, array, index);
            }
            Node::Call {
                callee,
                template_args,
                args,
            } => self.call(node, callee, &template_args, &args),
            Node::Unary { op, operand } => {
                self.scan(operand);
                self.unary(node, op, operand);
            }
            Node::Binary {
                op,
                broadcast,
                left,
                right,
            } => self.binary(node, op, broadcast, left, right),
            Node::Assign { target, value } => self.assign(node, target, value),
            Node::SimpleType { name } => self.simple_type(node, &name),
            Node::ArrayType { elem } => {
                self.scan(elem);
                self.solver.rule(
                    vec![(node, Attr::Value)],
                    vec![(elem, Attr::Value)],
                    move |r| {
                        let elem_ty = value_type(r, elem);
                        r.set(
                            node,
                            Attr::Value,
                            Value::Types(Typing::Resolved(Type::array_of(elem_ty))),
                        );
                    },
                );
            }
            Node::TemplateType { name } => {
                self.solver.set(
                    node,
                    Attr::Value,
                    Value::Types(Typing::Resolved(Type::placeholder(&name))),
                );
            }
            Node::Root { stmts } => self.root(node, &stmts),
            Node::Block { stmts } => self.block(node, &stmts),
            Node::VarDecl { name, ty, init } => self.var_decl(node, &name, ty, init),
            Node::FieldDecl { ty, .. } => {
                self.scan(ty);
                self.solver
                    .rule(vec![(node, Attr::Type)], vec![(ty, Attr::Value)], move |r| {
                        let t = value_type(r, ty);
                        r.set_type(node, t);
                    });
            }
            Node::Param { name, ty } => self.param(node, &name, ty),
            Node::TemplateParam { name } => self.template_param(node, &name),
            Node::FunDecl {
                name,
                template_params,
                params,
                ret,
                body,
            } => self.fun_decl(node, &name, &template_params, &params, ret, body),
            Node::StructDecl {
                name,
                template_params,
                fields,
            } => self.struct_decl(node, &name, &template_params, &fields),
            Node::If {
                cond,
                then_branch,
                else_branch,
            } => self.if_stmt(node, cond, then_branch, else_branch),
            Node::While { cond, body } => {
                self.scan(cond);
                self.scan(body);
                self.condition_rule(cond, "while");
            }
            Node::Return { expr } => self.return_stmt(node, expr),
            Node::ExprStmt { expr } => self.scan(expr),
        }
    }

    // ==================== Expressions ====================

    fn reference(&mut self, node: NodeId, name: &str) {
        let scope = self.cur();

        // Try to look up immediately. This must succeed for variables, but
        // not necessarily for functions or types.
        if let Some((found_scope, decl)) = self.scopes.lookup(scope, name) {
            self.solver.set(node, Attr::Decl, Value::Decl(decl));
            self.solver.set(node, Attr::Scope, Value::Scope(found_scope));
            let decl_node = self.decls.get(decl).node;
            self.solver
                .rule(vec![(node, Attr::Type)], vec![(decl_node, Attr::Type)], move |r| {
                    let typing = r.get_typing(decl_node).clone();
                    r.set_typing(node, typing);
                });
            return;
        }

        // Re-lookup after the whole tree has been scanned.
        let name = name.to_string();
        self.solver.rule(
            vec![(node, Attr::Decl), (node, Attr::Scope)],
            vec![],
            move |r| match r.cx.scopes.lookup(scope, &name) {
                None => r.error_for(
                    ErrorKind::UnresolvedReference { name: name.clone() },
                    node,
                    &[(node, Attr::Decl), (node, Attr::Scope), (node, Attr::Type)],
                ),
                Some((found_scope, decl)) => {
                    r.set(node, Attr::Scope, Value::Scope(found_scope));
                    r.set(node, Attr::Decl, Value::Decl(decl));
                    let info = r.cx.decls.get(decl);
                    if info.kind == DeclKind::Var {
                        r.error_for(
                            ErrorKind::UsedBeforeDeclaration { name: name.clone() },
                            node,
                            &[(node, Attr::Type)],
                        );
                    } else {
                        let decl_node = info.node;
                        r.rule(
                            vec![(node, Attr::Type)],
                            vec![(decl_node, Attr::Type)],
                            move |r| {
                                let typing = r.get_typing(decl_node).clone();
                                r.set_typing(node, typing);
                            },
                        );
                    }
                }
            },
        );
    }

    fn ctor_ref(&mut self, node: NodeId, target: NodeId) {
        self.solver
            .rule(vec![(node, Attr::Type)], vec![(target, Attr::Decl)], move |r| {
                let decl = r.get(target, Attr::Decl).as_decl();
                let info = r.cx.decls.get(decl);
                if info.kind != DeclKind::Struct {
                    r.error_for(
                        ErrorKind::ConstructorOnNonStruct {
                            what: info.name.clone(),
                        },
                        node,
                        &[(node, Attr::Type)],
                    );
                    return;
                }
                let decl_node = info.node;
                let Node::StructDecl { fields, .. } = r.cx.ast.kind(decl_node) else {
                    r.fail(node, Attr::Type);
                    return;
                };
                let fields = fields.clone();
                let mut deps = vec![(decl_node, Attr::Declared)];
                deps.extend(fields.iter().map(|f| (*f, Attr::Type)));
                r.rule(vec![(node, Attr::Type)], deps, move |r| {
                    let declared = r.get(decl_node, Attr::Declared).as_typing().single().clone();
                    let params = fields
                        .iter()
                        .map(|f| r.get_typing(*f).single().clone())
                        .collect();
                    r.set_type(
                        node,
                        Type::Fun {
                            ret: Box::new(declared),
                            params,
                        },
                    );
                });
            });
    }

    fn array_lit(&mut self, node: NodeId, elems: &[NodeId]) {
        if elems.is_empty() {
            // Empty array: the desired type comes from the context.
            match self.inference.map(|ctx| (ctx, self.ast.kind(ctx).clone())) {
                Some((ctx, Node::VarDecl { .. })) => {
                    self.solver
                        .rule(vec![(node, Attr::Type)], vec![(ctx, Attr::Type)], move |r| {
                            let typing = r.get_typing(ctx).clone();
                            r.set_typing(node, typing);
                        });
                }
                Some((_, Node::Call { callee, args, .. })) => {
                    if let Some(index) = args.iter().position(|a| *a == node) {
                        self.solver.rule(
                            vec![(node, Attr::Type)],
                            vec![(callee, Attr::Type)],
                            move |r| {
                                let callee_typing = r.get_typing(callee).clone();
                                match callee_typing {
                                    Typing::Resolved(Type::Fun { params, .. })
                                        if index < params.len() =>
                                    {
                                        r.set_type(node, params[index].clone());
                                    }
                                    _ => r.fail(node, Attr::Type),
                                }
                            },
                        );
                    }
                }
                _ => {} // no context: the type stays unresolved
            }
            return;
        }

        for &elem in elems {
            self.scan(elem);
        }

        // under a declared Template[] type, heterogeneous literals are
        // generic arrays rather than errors
        let template_target = match self.inference.map(|ctx| self.ast.kind(ctx)) {
            Some(Node::VarDecl { ty, .. }) => self.ast.contents(*ty) == "Template[]",
            _ => false,
        };

        let elems = elems.to_vec();
        let deps: Vec<AttrKey> = elems.iter().map(|e| (*e, Attr::Type)).collect();
        self.solver.rule(vec![(node, Attr::Type)], deps, move |r| {
            let mut supertype: Option<Type> = None;
            let mut incompatible = false;
            let mut void_elems = Vec::new();
            for &elem in &elems {
                let ty = match r.get_typing(elem) {
                    Typing::Resolved(t) => t.clone(),
                    Typing::Instantiated(_) => Type::template(),
                };
                if ty.is_void() {
                    // report, but compute a type from the other elements
                    void_elems.push(elem);
                    continue;
                }
                supertype = match supertype {
                    None => Some(ty),
                    Some(ref prev) => match common_supertype(prev, &ty) {
                        Some(joined) => Some(joined),
                        None => {
                            incompatible = true;
                            break;
                        }
                    },
                };
            }
            for elem in void_elems {
                r.error(ErrorKind::VoidArrayElement, elem);
            }
            match supertype {
                Some(ty) if !incompatible => r.set_type(node, Type::array_of(ty)),
                _ if template_target => r.set_type(node, Type::template_array()),
                _ => r.error_for(ErrorKind::NoCommonSupertype, node, &[(node, Attr::Type)]),
            }
        });
    }

    fn field_access(&mut self, node: NodeId, object: NodeId, field: &str) {
        let field = field.to_string();
        self.solver
            .rule(vec![(node, Attr::Type)], vec![(object, Attr::Type)], move |r| {
                match r.get_typing(object).clone() {
                    Typing::Instantiated(entries) => {
                        let arrays = entries
                            .iter()
                            .all(|t| matches!(t, Type::Array { .. }) || t.is_placeholder());
                        if field == "length" && arrays {
                            r.set_type(node, Type::int());
                        } else {
                            let ty = entries.first().cloned().unwrap_or_else(Type::template);
                            r.error_for(
                                ErrorKind::FieldOnNonStruct { ty: ty.to_string() },
                                node,
                                &[(node, Attr::Type)],
                            );
                        }
                    }
                    Typing::Resolved(Type::Array { .. }) => {
                        if field == "length" {
                            r.set_type(node, Type::int());
                        } else {
                            r.error_for(
                                ErrorKind::NonLengthArrayField,
                                node,
                                &[(node, Attr::Type)],
                            );
                        }
                    }
                    Typing::Resolved(Type::Placeholder { .. }) => {
                        r.set_type(node, Type::template());
                    }
                    Typing::Resolved(Type::Struct { decl, .. }) => {
                        field_of_struct(r, node, decl, &field);
                    }
                    Typing::Resolved(other) => r.error_for(
                        ErrorKind::FieldOnNonStruct {
                            ty: other.to_string(),
                        },
                        node,
                        &[(node, Attr::Type)],
                    ),
                }
            });
    }

    fn array_access(&mut self, node: NodeId, array: NodeId, index: NodeId) {
        self.solver.rule(vec![], vec![(index, Attr::Type)], move |r| {
            let is_int =
                |t: &Type| matches!(t, Type::Primitive(Primitive::Int)) || t.is_placeholder();
            let ok = match r.get_typing(index) {
                Typing::Resolved(t) => is_int(t),
                Typing::Instantiated(list) => list.iter().all(is_int),
            };
            if !ok {
                r.error(ErrorKind::NonIntIndex, index);
            }
        });

        self.solver
            .rule(vec![(node, Attr::Type)], vec![(array, Attr::Type)], move |r| {
                match r.get_typing(array).clone() {
                    Typing::Resolved(Type::Array { elem, .. }) => r.set_type(node, *elem),
                    Typing::Resolved(t) if t.is_placeholder() => {
                        r.set_type(node, Type::template())
                    }
                    Typing::Resolved(t) => r.error_for(
                        ErrorKind::IndexingNonArray { ty: t.to_string() },
                        node,
                        &[(node, Attr::Type)],
                    ),
                    Typing::Instantiated(list) => {
                        let mut out = Vec::new();
                        for t in list {
                            match t {
                                Type::Array { elem, .. } => out.push(*elem),
                                t if t.is_placeholder() => out.push(Type::template()),
                                t => {
                                    r.error(
                                        ErrorKind::IndexingNonArray { ty: t.to_string() },
                                        node,
                                    );
                                    out.push(Type::template());
                                }
                            }
                        }
                        r.set_typing(node, Typing::Instantiated(out));
                    }
                }
            });
    }

    fn call(
        &mut self,
        node: NodeId,
        callee: NodeId,
        template_args: &Option<Vec<NodeId>>,
        args: &[NodeId],
    ) {
        let scope = self.cur();
        self.solver.set(node, Attr::Scope, Value::Scope(scope));
        self.scan(callee);
        if let Some(tas) = template_args {
            for &ta in tas {
                self.scan(ta);
            }
        }

        // resolve the callee eagerly for template-argument recording;
        // bindings are appended in call-site visit order
        let target = self.callee_decl(scope, callee);
        let generic_target = target.filter(|d| self.generics.is_generic(*d));
        let placeholder_names = generic_target
            .map(|d| self.decl_template_names(d))
            .unwrap_or_default();

        if let (Some(decl), Some(tas)) = (generic_target, template_args.as_ref()) {
            if !tas.is_empty() && tas.len() == placeholder_names.len() {
                let mut types = Vec::new();
                for &ta in tas {
                    let label = self.ast.contents(ta);
                    match template_arg_type(&label) {
                        Some(ty) => types.push(ty),
                        None => {
                            self.error(ErrorKind::TemplateArgNotAllowed { name: label }, ta);
                            types.push(Type::template());
                        }
                    }
                }
                self.generics
                    .record(decl, node, make_bindings(&placeholder_names, &types));
            }
        }

        let prev_inference = self.inference.replace(node);
        for &arg in args {
            self.scan(arg);
        }
        self.inference = prev_inference;

        let fun_label = self.ast.contents(callee);
        let targs_given = template_args.as_ref().map(Vec::len).unwrap_or(0);
        let is_generic = generic_target.is_some();
        let placeholder_count = placeholder_names.len();
        let target_decl = target;
        let args = args.to_vec();
        let mut deps = vec![(callee, Attr::Type)];
        deps.extend(args.iter().map(|a| (*a, Attr::Type)));

        self.solver.rule(vec![(node, Attr::Type)], deps, move |r| {
            let Typing::Resolved(Type::Fun { ret, params }) = r.get_typing(callee).clone() else {
                r.error_for(
                    ErrorKind::NotCallable {
                        what: fun_label.clone(),
                    },
                    callee,
                    &[(node, Attr::Type)],
                );
                return;
            };

            // template usage checks
            if is_generic {
                if targs_given == 0 {
                    r.error_for(
                        ErrorKind::TemplateArgsMissing {
                            name: fun_label.clone(),
                        },
                        node,
                        &[(node, Attr::Type)],
                    );
                    return;
                }
                if targs_given != placeholder_count {
                    r.error_for(
                        ErrorKind::TemplateArityMismatch {
                            name: fun_label.clone(),
                            expected: placeholder_count,
                            got: targs_given,
                        },
                        node,
                        &[(node, Attr::Type)],
                    );
                    return;
                }
            } else if targs_given != 0 && target_decl.is_some() {
                r.error_for(
                    ErrorKind::TemplateNotDeclared {
                        name: fun_label.clone(),
                    },
                    node,
                    &[(node, Attr::Type)],
                );
                return;
            }

            // substitute formals through this call's own binding entry
            let bindings = target_decl
                .and_then(|d| r.cx.generics.binding_for_call(d, node))
                .map(|inst| inst.bindings.clone());
            let substituted = |t: &Type| match &bindings {
                Some(b) => t.substitute(b),
                None => t.clone(),
            };
            let params: Vec<Type> = params.iter().map(&substituted).collect();
            let ret = substituted(ret.as_ref());

            if params.len() != args.len() {
                r.error(
                    ErrorKind::ArityMismatch {
                        expected: params.len(),
                        got: args.len(),
                    },
                    node,
                );
            }
            let checked = params.len().min(args.len());
            for i in 0..checked {
                let arg_typing = r.get_typing(args[i]).clone();
                let param_ty = &params[i];
                let candidates: Vec<Type> = match arg_typing {
                    Typing::Resolved(t) => vec![t],
                    Typing::Instantiated(list) => list,
                };
                for arg_ty in candidates {
                    if !arg_ty.is_assignable_to(param_ty) && !arg_ty.is_placeholder() {
                        r.error(
                            ErrorKind::IncompatibleArgument {
                                index: i,
                                expected: param_ty.to_string(),
                                got: arg_ty.to_string(),
                            },
                            args[i],
                        );
                    }
                }
            }
            r.set_type(node, ret);
        });
    }

    fn unary(&mut self, node: NodeId, op: UnaryOp, operand: NodeId) {
        let UnaryOp::Not = op;
        self.solver.set_type(node, Type::bool());
        self.solver.rule(vec![], vec![(operand, Attr::Type)], move |r| {
            let is_bool =
                |t: &Type| matches!(t, Type::Primitive(Primitive::Bool)) || t.is_placeholder();
            let offending = match r.get_typing(operand) {
                Typing::Resolved(t) => (!is_bool(t)).then(|| t.clone()),
                Typing::Instantiated(list) => list.iter().find(|t| !is_bool(t)).cloned(),
            };
            if let Some(t) = offending {
                r.error(ErrorKind::NegatingNonBool { ty: t.to_string() }, node);
            }
        });
    }

    fn binary(&mut self, node: NodeId, op: BinaryOp, broadcast: bool, left: NodeId, right: NodeId) {
        self.scan(left);
        self.scan(right);
        let scope = self.cur();
        self.solver.set(node, Attr::Scope, Value::Scope(scope));
        let fun = self.funs.last().map(|f| f.decl);

        self.solver.rule(
            vec![(node, Attr::Type)],
            vec![(left, Attr::Type), (right, Attr::Type)],
            move |r| {
                let left_typing = r.get_typing(left).clone();
                let right_typing = r.get_typing(right).clone();
                match per_site_pairs(r, fun, &left_typing, &right_typing) {
                    None => {
                        // literal path: both sides are single concrete types
                        let (Typing::Resolved(l), Typing::Resolved(rt)) =
                            (&left_typing, &right_typing)
                        else {
                            r.fail(node, Attr::Type);
                            return;
                        };
                        match binary_result(r, node, op, broadcast, l, rt, left, right) {
                            Some(ty) => r.set_type(node, ty),
                            None => r.fail(node, Attr::Type),
                        }
                    }
                    Some(pairs) => {
                        // templated path: one evaluation per instantiation
                        let mut out = Vec::new();
                        for (l, rt) in &pairs {
                            if let Some(ty) =
                                binary_result(r, node, op, broadcast, l, rt, left, right)
                            {
                                out.push(ty);
                            }
                        }
                        r.set_typing(node, Typing::Instantiated(out));
                    }
                }
            },
        );
    }

    fn assign(&mut self, node: NodeId, target: NodeId, value: NodeId) {
        self.scan(target);
        self.scan(value);
        let fun = self.funs.last().map(|f| f.decl);
        let lvalue = matches!(
            self.ast.kind(target),
            Node::Ref { .. } | Node::FieldAccess { .. } | Node::ArrayAccess { .. }
        );

        self.solver.rule(
            vec![(node, Attr::Type)],
            vec![(target, Attr::Type), (value, Attr::Type)],
            move |r| {
                if !lvalue {
                    r.error(ErrorKind::NotAnLvalue, target);
                }
                let target_typing = r.get_typing(target).clone();
                let value_typing = r.get_typing(value).clone();
                match per_site_pairs(r, fun, &target_typing, &value_typing) {
                    None => {
                        let (Typing::Resolved(t), Typing::Resolved(v)) =
                            (&target_typing, &value_typing)
                        else {
                            r.fail(node, Attr::Type);
                            return;
                        };
                        if lvalue && !v.is_assignable_to(t) {
                            r.error(
                                ErrorKind::IncompatibleAssignment {
                                    expected: t.to_string(),
                                    got: v.to_string(),
                                },
                                node,
                            );
                        }
                        // the type of the assignment is the left-side type
                        let ty = t.clone();
                        r.set_type(node, ty);
                    }
                    Some(pairs) => {
                        for (t, v) in &pairs {
                            if lvalue && !v.is_assignable_to(t) {
                                r.error(
                                    ErrorKind::IncompatibleAssignment {
                                        expected: t.to_string(),
                                        got: v.to_string(),
                                    },
                                    node,
                                );
                            }
                        }
                        r.set_typing(node, target_typing);
                    }
                }
            },
        );
    }

    // ==================== Types ====================

    fn simple_type(&mut self, node: NodeId, name: &str) {
        let scope = self.cur();
        let name = name.to_string();
        // type declarations may occur after use
        self.solver
            .rule(vec![(node, Attr::Value)], vec![], move |r| {
                match r.cx.scopes.lookup(scope, &name) {
                    None => r.error_for(
                        ErrorKind::UnresolvedReference { name: name.clone() },
                        node,
                        &[(node, Attr::Value)],
                    ),
                    Some((_, decl)) => {
                        let info = r.cx.decls.get(decl);
                        if !info.kind.is_type() {
                            r.error_for(
                                ErrorKind::NotAType {
                                    name: name.clone(),
                                    declared: info.kind.declared_thing().to_string(),
                                },
                                node,
                                &[(node, Attr::Value)],
                            );
                        } else {
                            let decl_node = info.node;
                            r.rule(
                                vec![(node, Attr::Value)],
                                vec![(decl_node, Attr::Declared)],
                                move |r| {
                                    let declared =
                                        r.get(decl_node, Attr::Declared).as_typing().clone();
                                    r.set(node, Attr::Value, Value::Types(declared));
                                },
                            );
                        }
                    }
                }
            });
    }

    // ==================== Scopes & Declarations ====================

    fn root(&mut self, node: NodeId, stmts: &[NodeId]) {
        let root_scope = self.scopes.push(node, None);
        self.scope = Some(root_scope);
        self.solver.set(node, Attr::Scope, Value::Scope(root_scope));

        for seed in builtin_seeds() {
            let decl = self.decls.add(seed.name, seed.kind, seed.node, root_scope);
            let _ = self.scopes.declare(root_scope, seed.name, decl);
            self.solver
                .set(seed.node, Attr::Type, Value::Types(Typing::Resolved(seed.ty)));
            if let Some(declared) = seed.declared {
                self.solver.set(
                    seed.node,
                    Attr::Declared,
                    Value::Types(Typing::Resolved(declared)),
                );
            }
        }

        for &stmt in stmts {
            self.scan(stmt);
        }
        self.scope = None;
    }

    fn block(&mut self, node: NodeId, stmts: &[NodeId]) {
        let parent = self.cur();
        let scope = self.scopes.push(node, Some(parent));
        self.scope = Some(scope);
        self.solver.set(node, Attr::Scope, Value::Scope(scope));
        for &stmt in stmts {
            self.scan(stmt);
        }
        self.register_block_returns(node, stmts);
        self.scope = Some(parent);
    }

    fn register_block_returns(&mut self, node: NodeId, stmts: &[NodeId]) {
        let containers: Vec<NodeId> = stmts
            .iter()
            .copied()
            .filter(|s| is_return_container(self.ast, *s))
            .collect();
        if containers.is_empty() {
            self.solver.set(node, Attr::Returns, Value::Bool(false));
            return;
        }
        let deps: Vec<AttrKey> = containers.iter().map(|c| (*c, Attr::Returns)).collect();
        let dep_nodes = containers;
        self.solver
            .rule(vec![(node, Attr::Returns)], deps, move |r| {
                let any = dep_nodes
                    .iter()
                    .any(|c| r.get(*c, Attr::Returns).as_bool());
                r.set(node, Attr::Returns, Value::Bool(any));
            });
    }

    fn var_decl(&mut self, node: NodeId, name: &str, ty: NodeId, init: NodeId) {
        let _decl = self.declare(name, DeclKind::Var, node);
        let scope = self.cur();
        self.solver.set(node, Attr::Scope, Value::Scope(scope));
        self.solver
            .rule(vec![(node, Attr::Type)], vec![(ty, Attr::Value)], move |r| {
                let t = value_type(r, ty);
                r.set_type(node, t);
            });

        let prev_inference = self.inference.replace(node);
        self.scan(ty);
        self.scan(init);
        self.inference = prev_inference;

        let fun = self.funs.last().map(|f| f.decl);
        let name = name.to_string();
        self.solver.rule(
            vec![],
            vec![(ty, Attr::Value), (init, Attr::Type)],
            move |r| {
                let expected = value_type(r, ty);
                let actual = r.get_typing(init).clone();
                let expected_typing = Typing::Resolved(expected.clone());
                match per_site_pairs(r, fun, &expected_typing, &actual) {
                    None => {
                        let Typing::Resolved(actual) = actual else {
                            return;
                        };
                        if !actual.is_assignable_to(&expected) {
                            r.error(
                                ErrorKind::IncompatibleInitializer {
                                    name: name.clone(),
                                    expected: expected.to_string(),
                                    got: actual.to_string(),
                                },
                                init,
                            );
                        }
                    }
                    Some(pairs) => {
                        for (expected, actual) in &pairs {
                            if !actual.is_assignable_to(expected) {
                                r.error(
                                    ErrorKind::IncompatibleInitializer {
                                        name: name.clone(),
                                        expected: expected.to_string(),
                                        got: actual.to_string(),
                                    },
                                    init,
                                );
                            }
                        }
                    }
                }
            },
        );
    }

    fn param(&mut self, node: NodeId, name: &str, ty: NodeId) {
        let _decl = self.declare(name, DeclKind::Param, node);
        let scope = self.cur();
        self.solver.set(node, Attr::Scope, Value::Scope(scope));
        self.scan(ty);
        self.solver
            .rule(vec![(node, Attr::Type)], vec![(ty, Attr::Value)], move |r| {
                let t = value_type(r, ty);
                r.set_type(node, t);
            });
    }

    fn template_param(&mut self, node: NodeId, name: &str) {
        let _decl = self.declare(name, DeclKind::TemplateParam, node);
        let scope = self.cur();
        self.solver.set(node, Attr::Scope, Value::Scope(scope));
        self.solver.set_type(node, Type::placeholder(name));
        self.solver.set(
            node,
            Attr::Declared,
            Value::Types(Typing::Resolved(Type::placeholder(name))),
        );
    }

    fn fun_decl(
        &mut self,
        node: NodeId,
        name: &str,
        template_params: &Option<Vec<NodeId>>,
        params: &[NodeId],
        ret: NodeId,
        body: NodeId,
    ) {
        // declared in the enclosing scope before the body scope is pushed,
        // so forward references resolve
        let scope_dup = self.scopes.lookup_local(self.cur(), name).is_some();
        let decl = self.declare(name, DeclKind::Fun, node);
        if !scope_dup && !self.program_names.insert(name.to_string()) {
            self.error(
                ErrorKind::Redeclaration {
                    name: name.to_string(),
                },
                node,
            );
        }

        let clause = self.clause_names(template_params);
        if template_params.is_some() {
            self.generics.register(decl);
            for clause_name in &clause {
                if !is_placeholder_name(clause_name) {
                    self.error(
                        ErrorKind::TemplateNameNotAllowed {
                            name: clause_name.clone(),
                        },
                        node,
                    );
                }
            }
        }

        let parent = self.cur();
        let fun_scope = self.scopes.push(node, Some(parent));
        self.scope = Some(fun_scope);
        self.solver.set(node, Attr::Scope, Value::Scope(fun_scope));
        self.funs.push(FunCtx { decl, ret_ty: ret });

        if let Some(tps) = template_params {
            for &tp in tps {
                self.scan(tp);
            }
        }
        for &param in params {
            self.scan(param);
        }

        // placeholder-typed parameters need a clause declaring them
        for &param in params {
            if let Node::Param { ty, .. } = self.ast.kind(param) {
                if let Some(base) = type_base_name(self.ast, *ty) {
                    if is_placeholder_name(&base) {
                        if template_params.is_none() {
                            self.error(ErrorKind::NoTemplateClause, node);
                        } else if !clause.contains(&base) {
                            self.error(ErrorKind::TemplateParamNotFound { name: base }, node);
                        }
                    }
                }
            }
        }

        self.scan(ret);
        self.scan(body);

        let params_c = params.to_vec();
        let mut deps = vec![(ret, Attr::Value)];
        deps.extend(params_c.iter().map(|p| (*p, Attr::Type)));
        self.solver.rule(vec![(node, Attr::Type)], deps, move |r| {
            let params = params_c
                .iter()
                .map(|p| r.get_typing(*p).single().clone())
                .collect();
            let ret_ty = value_type(r, ret);
            r.set_type(
                node,
                Type::Fun {
                    ret: Box::new(ret_ty),
                    params,
                },
            );
        });

        self.solver.rule(
            vec![],
            vec![(body, Attr::Returns), (ret, Attr::Value)],
            move |r| {
                let returns = r.get(body, Attr::Returns).as_bool();
                let ret_ty = value_type(r, ret);
                if !returns && !ret_ty.is_void() {
                    r.error(ErrorKind::MissingReturn, node);
                }
                // the returned value's presence and type are checked at
                // each return statement
            },
        );

        self.funs.pop();
        self.scope = Some(parent);
    }

    fn struct_decl(
        &mut self,
        node: NodeId,
        name: &str,
        template_params: &Option<Vec<NodeId>>,
        fields: &[NodeId],
    ) {
        let scope_dup = self.scopes.lookup_local(self.cur(), name).is_some();
        let decl = self.declare(name, DeclKind::Struct, node);
        if !scope_dup && !self.program_names.insert(name.to_string()) {
            self.error(
                ErrorKind::Redeclaration {
                    name: name.to_string(),
                },
                node,
            );
        }

        self.solver.set_type(node, Type::TypeOfType);
        self.solver.set(
            node,
            Attr::Declared,
            Value::Types(Typing::Resolved(Type::Struct {
                name: name.to_string(),
                decl,
            })),
        );

        let clause = self.clause_names(template_params);
        if template_params.is_some() {
            self.generics.register(decl);
            for clause_name in &clause {
                if !is_placeholder_name(clause_name) {
                    self.error(
                        ErrorKind::TemplateNameNotAllowed {
                            name: clause_name.clone(),
                        },
                        node,
                    );
                }
            }
        }

        // placeholder-typed fields must name a declared template parameter
        for &field in fields {
            if let Node::FieldDecl { name: field_name, ty } = self.ast.kind(field).clone() {
                if let Some(base) = type_base_name(self.ast, ty) {
                    if is_placeholder_name(&base) {
                        if template_params.is_none() {
                            self.error(
                                ErrorKind::PlaceholderFieldInPlainStruct {
                                    field: field_name,
                                    strukt: name.to_string(),
                                },
                                node,
                            );
                        } else if !clause.contains(&base) {
                            self.error(
                                ErrorKind::FieldPlaceholderNotDeclared {
                                    field: field_name,
                                    strukt: name.to_string(),
                                },
                                node,
                            );
                        } else {
                            self.generics.record_field(decl, &field_name, &base);
                        }
                    }
                }
            }
        }

        let parent = self.cur();
        let struct_scope = self.scopes.push(node, Some(parent));
        self.scope = Some(struct_scope);
        self.solver.set(node, Attr::Scope, Value::Scope(struct_scope));
        if let Some(tps) = template_params {
            for &tp in tps {
                self.scan(tp);
            }
        }
        for &field in fields {
            self.scan(field);
        }
        self.scope = Some(parent);
    }

    // ==================== Other Statements ====================

    fn if_stmt(
        &mut self,
        node: NodeId,
        cond: NodeId,
        then_branch: NodeId,
        else_branch: Option<NodeId>,
    ) {
        self.scan(cond);
        self.scan(then_branch);
        if let Some(else_branch) = else_branch {
            self.scan(else_branch);
        }
        self.condition_rule(cond, "if");

        // completes only with an else branch and both branches completing
        let both = else_branch.filter(|e| {
            is_return_container(self.ast, then_branch) && is_return_container(self.ast, *e)
        });
        match both {
            None => self.solver.set(node, Attr::Returns, Value::Bool(false)),
            Some(else_branch) => {
                self.solver.rule(
                    vec![(node, Attr::Returns)],
                    vec![(then_branch, Attr::Returns), (else_branch, Attr::Returns)],
                    move |r| {
                        let completes = r.get(then_branch, Attr::Returns).as_bool()
                            && r.get(else_branch, Attr::Returns).as_bool();
                        r.set(node, Attr::Returns, Value::Bool(completes));
                    },
                );
            }
        }
    }

    fn condition_rule(&mut self, cond: NodeId, construct: &'static str) {
        let fun = self.funs.last().map(|f| f.decl);
        self.solver.rule(vec![], vec![(cond, Attr::Type)], move |r| {
            let typing = r.get_typing(cond).clone();
            let is_bool =
                |t: &Type| matches!(t, Type::Primitive(Primitive::Bool)) || t.is_placeholder();
            let offending = site_types(r, fun, &typing)
                .into_iter()
                .find(|t| !is_bool(t));
            if let Some(t) = offending {
                r.error(
                    ErrorKind::NonBoolCondition {
                        construct: construct.to_string(),
                        ty: t.to_string(),
                    },
                    cond,
                );
            }
        });
    }

    fn return_stmt(&mut self, node: NodeId, expr: Option<NodeId>) {
        self.solver.set(node, Attr::Returns, Value::Bool(true));
        if let Some(expr) = expr {
            self.scan(expr);
        }
        let Some(fun) = self.funs.last() else {
            return; // top-level return
        };
        let fun_decl = fun.decl;
        let ret_ty = fun.ret_ty;

        match expr {
            None => {
                self.solver.rule(vec![], vec![(ret_ty, Attr::Value)], move |r| {
                    if !value_type(r, ret_ty).is_void() {
                        r.error(ErrorKind::ReturnWithoutValue, node);
                    }
                });
            }
            Some(expr) => {
                self.solver.rule(
                    vec![],
                    vec![(ret_ty, Attr::Value), (expr, Attr::Type)],
                    move |r| {
                        let formal = value_type(r, ret_ty);
                        if formal.is_void() {
                            r.error(ErrorKind::ReturnInVoidFunction, node);
                            return;
                        }
                        let actual = r.get_typing(expr).clone();
                        match per_site_pairs(
                            r,
                            Some(fun_decl),
                            &Typing::Resolved(formal.clone()),
                            &actual,
                        ) {
                            None => {
                                let Typing::Resolved(actual) = actual else {
                                    return;
                                };
                                if !actual.is_assignable_to(&formal) {
                                    r.error(
                                        ErrorKind::IncompatibleReturn {
                                            expected: formal.to_string(),
                                            got: actual.to_string(),
                                        },
                                        expr,
                                    );
                                }
                            }
                            Some(pairs) => {
                                for (formal, actual) in &pairs {
                                    if !actual.is_assignable_to(formal) {
                                        r.error(
                                            ErrorKind::IncompatibleReturn {
                                                expected: formal.to_string(),
                                                got: actual.to_string(),
                                            },
                                            expr,
                                        );
                                    }
                                }
                            }
                        }
                    },
                );
            }
        }
    }
}

// ==================== Rule Helpers ====================

fn value_type(r: &RuleCx, node: NodeId) -> Type {
    r.get(node, Attr::Value).as_typing().single().clone()
}

fn is_return_container(ast: &Ast, node: NodeId) -> bool {
    matches!(
        ast.kind(node),
        Node::Block { .. } | Node::If { .. } | Node::Return { .. }
    )
}

/// Base type name of a type-syntax node (`T[]` yields `T`).
fn type_base_name(ast: &Ast, ty: NodeId) -> Option<String> {
    match ast.kind(ty) {
        Node::SimpleType { name } => Some(name.clone()),
        Node::TemplateType { name } => Some(name.clone()),
        Node::ArrayType { elem } => type_base_name(ast, *elem),
        _ => None,
    }
}

/// The concrete types an expression takes, one per instantiation site of
/// the enclosing generic declaration (a single entry for the literal path).
fn site_types(r: &RuleCx, fun: Option<DeclId>, typing: &Typing) -> Vec<Type> {
    match typing {
        Typing::Instantiated(list) => list.clone(),
        Typing::Resolved(ty) if ty.has_named_placeholder() => {
            let sites = fun
                .and_then(|d| r.cx.generics.instantiations(d))
                .map(|t| t.sites.as_slice())
                .unwrap_or(&[]);
            sites
                .iter()
                .map(|site| ty.substitute(&site.bindings))
                .collect()
        }
        Typing::Resolved(ty) => vec![ty.clone()],
    }
}

/// Pair two operands per instantiation site, or `None` for the literal
/// path (both sides concrete). Per-entry substitution uses the enclosing
/// generic function's binding table, in call-site order.
fn per_site_pairs(
    r: &RuleCx,
    fun: Option<DeclId>,
    left: &Typing,
    right: &Typing,
) -> Option<Vec<(Type, Type)>> {
    let named = |t: &Typing| matches!(t, Typing::Resolved(ty) if ty.has_named_placeholder());
    let templated =
        left.is_instantiated() || right.is_instantiated() || named(left) || named(right);
    if !templated {
        return None;
    }

    let sites = fun
        .and_then(|d| r.cx.generics.instantiations(d))
        .map(|t| t.sites.as_slice())
        .unwrap_or(&[]);
    let count = match (left, right) {
        (Typing::Instantiated(l), Typing::Instantiated(rt)) => l.len().min(rt.len()),
        (Typing::Instantiated(l), _) => l.len(),
        (_, Typing::Instantiated(rt)) => rt.len(),
        _ => sites.len(),
    };
    let pick = |typing: &Typing, i: usize| match typing {
        Typing::Instantiated(list) => list[i].clone(),
        Typing::Resolved(ty) => match sites.get(i) {
            Some(site) => ty.substitute(&site.bindings),
            None => ty.clone(),
        },
    };
    Some((0..count).map(|i| (pick(left, i), pick(right, i))).collect())
}

/// Type one binary operation over concrete operands, recording errors.
/// Returns `None` when no best-effort result type exists.
fn binary_result(
    r: &mut RuleCx,
    node: NodeId,
    op: BinaryOp,
    broadcast: bool,
    left: &Type,
    right: &Type,
    left_node: NodeId,
    right_node: NodeId,
) -> Option<Type> {
    if broadcast {
        return broadcast_result(r, node, op, left, right);
    }

    if op == BinaryOp::Add
        && (matches!(left, Type::Primitive(Primitive::Str))
            || matches!(right, Type::Primitive(Primitive::Str)))
    {
        return Some(Type::string());
    }

    if op.is_arithmetic() {
        if left.is_placeholder() || right.is_placeholder() {
            return Some(Type::template());
        }
        return match (left, right) {
            (Type::Primitive(Primitive::Int), Type::Primitive(Primitive::Int)) => {
                Some(Type::int())
            }
            (Type::Primitive(Primitive::Int), Type::Primitive(Primitive::Float))
            | (Type::Primitive(Primitive::Float), Type::Primitive(Primitive::Int))
            | (Type::Primitive(Primitive::Float), Type::Primitive(Primitive::Float)) => {
                Some(Type::float())
            }
            _ => {
                r.error(
                    ErrorKind::ArithmeticMismatch {
                        op: op.verb().to_string(),
                        left: left.to_string(),
                        right: right.to_string(),
                    },
                    node,
                );
                None
            }
        };
    }

    if op.is_comparison() {
        if !left.is_numeric() && !left.is_placeholder() {
            r.error(
                ErrorKind::NonNumericComparison {
                    ty: left.to_string(),
                },
                left_node,
            );
        }
        if !right.is_numeric() && !right.is_placeholder() {
            r.error(
                ErrorKind::NonNumericComparison {
                    ty: right.to_string(),
                },
                right_node,
            );
        }
        return Some(Type::bool());
    }

    if op.is_logic() {
        if !matches!(left, Type::Primitive(Primitive::Bool)) && !left.is_placeholder() {
            r.error(
                ErrorKind::NonBoolLogic {
                    ty: left.to_string(),
                },
                left_node,
            );
        }
        if !matches!(right, Type::Primitive(Primitive::Bool)) && !right.is_placeholder() {
            r.error(
                ErrorKind::NonBoolLogic {
                    ty: right.to_string(),
                },
                right_node,
            );
        }
        return Some(Type::bool());
    }

    // equality
    if !left.is_comparable_to(right) {
        r.error(
            ErrorKind::IncomparableTypes {
                left: left.to_string(),
                right: right.to_string(),
            },
            node,
        );
    }
    Some(Type::bool())
}

/// Type the element-wise broadcast `left @(op) right`.
fn broadcast_result(
    r: &mut RuleCx,
    node: NodeId,
    op: BinaryOp,
    left: &Type,
    right: &Type,
) -> Option<Type> {
    if left.is_placeholder() || right.is_placeholder() {
        // unsubstituted operands; widen to a generic array
        return Some(Type::template_array());
    }
    let (
        Type::Array {
            elem: left_elem,
            generic: left_generic,
        },
        Type::Array {
            elem: right_elem,
            generic: right_generic,
        },
    ) = (left, right)
    else {
        r.error(ErrorKind::BroadcastNonArray, node);
        return None;
    };

    let generic = *left_generic || *right_generic;
    if !generic {
        let strings = matches!(left_elem.as_ref(), Type::Primitive(Primitive::Str))
            && matches!(right_elem.as_ref(), Type::Primitive(Primitive::Str));
        let bools = matches!(left_elem.as_ref(), Type::Primitive(Primitive::Bool))
            && matches!(right_elem.as_ref(), Type::Primitive(Primitive::Bool));
        if strings && op.is_arithmetic() && op != BinaryOp::Add {
            r.error(
                ErrorKind::BroadcastStringOp {
                    op: op.verb().to_string(),
                },
                node,
            );
        } else if bools && !op.is_logic() && !op.is_equality() {
            r.error(
                ErrorKind::BroadcastBoolOp {
                    op: op.verb().to_string(),
                },
                node,
            );
        } else if !strings && !bools && left_elem != right_elem {
            // mismatched element families; only numeric mixes are allowed
            let numeric = left_elem.is_numeric() && right_elem.is_numeric();
            if !numeric {
                r.error(
                    ErrorKind::BroadcastIncompatible {
                        left: left.to_string(),
                        right: right.to_string(),
                    },
                    node,
                );
            }
        }
    }

    let elem = if op.is_comparison() || op.is_equality() || op.is_logic() {
        Type::bool()
    } else if generic {
        Type::template()
    } else {
        common_supertype(left_elem, right_elem).unwrap_or_else(|| left_elem.as_ref().clone())
    };
    Some(Type::Array {
        elem: Box::new(elem),
        generic,
    })
}

/// Resolve a struct field access, once the object is known to be a struct.
fn field_of_struct(r: &mut RuleCx, node: NodeId, decl: DeclId, field: &str) {
    let info = r.cx.decls.get(decl);
    let decl_node = info.node;
    let strukt = info.name.clone();
    let Node::StructDecl { fields, .. } = r.cx.ast.kind(decl_node) else {
        r.error_for(
            ErrorKind::FieldOnNonStruct { ty: strukt },
            node,
            &[(node, Attr::Type)],
        );
        return;
    };
    let field_node = fields.iter().copied().find(|f| {
        matches!(r.cx.ast.kind(*f), Node::FieldDecl { name, .. } if name == field)
    });
    let Some(field_node) = field_node else {
        r.error_for(
            ErrorKind::MissingField {
                field: field.to_string(),
                strukt,
            },
            node,
            &[(node, Attr::Type)],
        );
        return;
    };

    // placeholder-typed fields of a generic struct type once per recorded
    // construction site
    let placeholder = r
        .cx
        .generics
        .instantiations(decl)
        .and_then(|t| t.field_placeholders.get(field).cloned());
    r.rule(
        vec![(node, Attr::Type)],
        vec![(field_node, Attr::Type)],
        move |r| {
            let field_ty = r.get_typing(field_node).single().clone();
            let sites = r
                .cx
                .generics
                .instantiations(decl)
                .map(|t| t.sites.as_slice())
                .unwrap_or(&[]);
            if placeholder.is_some() && !sites.is_empty() {
                let types = sites
                    .iter()
                    .map(|site| field_ty.substitute(&site.bindings))
                    .collect();
                r.set_typing(node, Typing::Instantiated(types));
            } else {
                r.set_typing(node, Typing::Resolved(field_ty));
            }
        },
    );
}
