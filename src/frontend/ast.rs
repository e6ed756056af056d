//! Abstract syntax tree for Quill
//!
//! The tree is arena-allocated: nodes live in a flat vector owned by [`Ast`]
//! and reference each other through copyable [`NodeId`]s. The parser builds
//! trees through the `Ast` constructor methods; semantic analysis attaches
//! its facts to node ids without touching the tree itself.

use serde::{Deserialize, Serialize};

use crate::utils::Span;

/// Index of a node inside an [`Ast`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_arithmetic(&self) -> bool {
        matches!(self, Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Rem)
    }

    pub fn is_comparison(&self) -> bool {
        matches!(self, Self::Gt | Self::Ge | Self::Lt | Self::Le)
    }

    pub fn is_logic(&self) -> bool {
        matches!(self, Self::And | Self::Or)
    }

    pub fn is_equality(&self) -> bool {
        matches!(self, Self::Eq | Self::Ne)
    }

    /// Verb form used in diagnostics ("trying to add Int with Int[]").
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "subtract",
            Self::Mul => "multiply",
            Self::Div => "divide",
            Self::Rem => "remainder",
            Self::Gt => "greater",
            Self::Ge => "greater_equal",
            Self::Lt => "lower",
            Self::Le => "lower_equal",
            Self::Eq => "equality",
            Self::Ne => "not_equals",
            Self::And => "and",
            Self::Or => "or",
        }
    }

    /// Surface syntax of the operator.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

/// AST node kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    // ==================== Expressions ====================
    IntLit(i64),
    FloatLit(f64),
    StrLit(String),
    BoolLit(bool),
    NullLit,
    /// Identifier reference
    Ref { name: String },
    /// Constructor reference `$S`; `target` is the struct reference
    CtorRef { target: NodeId },
    ArrayLit { elems: Vec<NodeId> },
    Paren { expr: NodeId },
    FieldAccess { object: NodeId, field: String },
    ArrayAccess { array: NodeId, index: NodeId },
    /// Function call, optionally with explicit template arguments
    Call {
        callee: NodeId,
        template_args: Option<Vec<NodeId>>,
        args: Vec<NodeId>,
    },
    Unary { op: UnaryOp, operand: NodeId },
    /// Binary expression; `broadcast` marks the element-wise form
    /// `left @(op) right`.
    Binary {
        op: BinaryOp,
        broadcast: bool,
        left: NodeId,
        right: NodeId,
    },
    Assign { target: NodeId, value: NodeId },

    // ==================== Type Syntax ====================
    SimpleType { name: String },
    ArrayType { elem: NodeId },
    /// The wildcard `Template` type in source position
    TemplateType { name: String },

    // ==================== Declarations ====================
    VarDecl { name: String, ty: NodeId, init: NodeId },
    FieldDecl { name: String, ty: NodeId },
    Param { name: String, ty: NodeId },
    TemplateParam { name: String },
    FunDecl {
        name: String,
        template_params: Option<Vec<NodeId>>,
        params: Vec<NodeId>,
        ret: NodeId,
        body: NodeId,
    },
    StructDecl {
        name: String,
        template_params: Option<Vec<NodeId>>,
        fields: Vec<NodeId>,
    },

    // ==================== Statements ====================
    Root { stmts: Vec<NodeId> },
    Block { stmts: Vec<NodeId> },
    If {
        cond: NodeId,
        then_branch: NodeId,
        else_branch: Option<NodeId>,
    },
    While { cond: NodeId, body: NodeId },
    Return { expr: Option<NodeId> },
    ExprStmt { expr: NodeId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct NodeData {
    span: Span,
    kind: Node,
}

/// Arena-allocated syntax tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ast {
    nodes: Vec<NodeData>,
    root: Option<NodeId>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a node. Constructor methods below are preferred; this is
    /// the raw escape hatch.
    pub fn push(&mut self, span: Span, kind: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData { span, kind });
        if matches!(self.nodes[id.0 as usize].kind, Node::Root { .. }) {
            self.root = Some(id);
        }
        id
    }

    /// Allocate an extra node id with no syntax behind it (used for
    /// synthetic builtin declarations).
    pub fn synthetic(&mut self, label: &str) -> NodeId {
        self.push(
            Span::dummy(),
            Node::Ref {
                name: label.to_string(),
            },
        )
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn kind(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize].kind
    }

    /// The source span of a node. Ids outside the arena (builtin
    /// declarations) yield a dummy span.
    pub fn span(&self, id: NodeId) -> Span {
        self.nodes
            .get(id.0 as usize)
            .map(|n| n.span)
            .unwrap_or_default()
    }

    /// Short human-readable label for diagnostics.
    pub fn contents(&self, id: NodeId) -> String {
        if self.nodes.get(id.0 as usize).is_none() {
            return "<built-in>".to_string();
        }
        match self.kind(id) {
            Node::IntLit(v) => v.to_string(),
            Node::FloatLit(v) => v.to_string(),
            Node::StrLit(s) => format!("\"{s}\""),
            Node::BoolLit(v) => v.to_string(),
            Node::NullLit => "null".to_string(),
            Node::Ref { name } => name.clone(),
            Node::CtorRef { target } => format!("${}", self.contents(*target)),
            Node::ArrayLit { elems } if elems.is_empty() => "[]".to_string(),
            Node::ArrayLit { .. } => "[...]".to_string(),
            Node::Paren { expr } => format!("({})", self.contents(*expr)),
            Node::FieldAccess { object, field } => {
                format!("{}.{}", self.contents(*object), field)
            }
            Node::ArrayAccess { array, .. } => format!("{}[...]", self.contents(*array)),
            Node::Call { callee, args, .. } => {
                let args = if args.is_empty() { "()" } else { "(...)" };
                format!("{}{}", self.contents(*callee), args)
            }
            Node::Unary { operand, .. } => format!("!{}", self.contents(*operand)),
            Node::Binary {
                op,
                broadcast,
                left,
                right,
            } => {
                let op = if *broadcast {
                    format!("@({})", op.symbol())
                } else {
                    op.symbol().to_string()
                };
                format!("{} {} {}", self.contents(*left), op, self.contents(*right))
            }
            Node::Assign { target, value } => {
                format!("{} = {}", self.contents(*target), self.contents(*value))
            }
            Node::SimpleType { name } => name.clone(),
            Node::ArrayType { elem } => format!("{}[]", self.contents(*elem)),
            Node::TemplateType { name } => name.clone(),
            Node::VarDecl { name, .. } => format!("var {name}"),
            Node::FieldDecl { name, .. } => name.clone(),
            Node::Param { name, .. } => name.clone(),
            Node::TemplateParam { name } => name.clone(),
            Node::FunDecl { name, .. } => format!("fun {name}"),
            Node::StructDecl { name, .. } => format!("struct {name}"),
            Node::Root { .. } => "<root>".to_string(),
            Node::Block { .. } => "{...}".to_string(),
            Node::If { .. } => "if".to_string(),
            Node::While { .. } => "while".to_string(),
            Node::Return { expr: None } => "return".to_string(),
            Node::Return { expr: Some(e) } => format!("return {}", self.contents(*e)),
            Node::ExprStmt { expr } => self.contents(*expr),
        }
    }

    /// What a declaration node declares, for diagnostics.
    pub fn declared_thing(&self, id: NodeId) -> &'static str {
        match self.kind(id) {
            Node::VarDecl { .. } => "variable",
            Node::FieldDecl { .. } => "field",
            Node::Param { .. } => "parameter",
            Node::TemplateParam { .. } => "template parameter",
            Node::FunDecl { .. } => "function",
            Node::StructDecl { .. } => "struct",
            _ => "expression",
        }
    }

    // ==================== Constructors ====================

    pub fn int_lit(&mut self, span: Span, value: i64) -> NodeId {
        self.push(span, Node::IntLit(value))
    }

    pub fn float_lit(&mut self, span: Span, value: f64) -> NodeId {
        self.push(span, Node::FloatLit(value))
    }

    pub fn str_lit(&mut self, span: Span, value: &str) -> NodeId {
        self.push(span, Node::StrLit(value.to_string()))
    }

    pub fn bool_lit(&mut self, span: Span, value: bool) -> NodeId {
        self.push(span, Node::BoolLit(value))
    }

    pub fn null_lit(&mut self, span: Span) -> NodeId {
        self.push(span, Node::NullLit)
    }

    pub fn reference(&mut self, span: Span, name: &str) -> NodeId {
        self.push(
            span,
            Node::Ref {
                name: name.to_string(),
            },
        )
    }

    pub fn ctor_ref(&mut self, span: Span, target: NodeId) -> NodeId {
        self.push(span, Node::CtorRef { target })
    }

    pub fn array_lit(&mut self, span: Span, elems: Vec<NodeId>) -> NodeId {
        self.push(span, Node::ArrayLit { elems })
    }

    pub fn paren(&mut self, span: Span, expr: NodeId) -> NodeId {
        self.push(span, Node::Paren { expr })
    }

    pub fn field_access(&mut self, span: Span, object: NodeId, field: &str) -> NodeId {
        self.push(
            span,
            Node::FieldAccess {
                object,
                field: field.to_string(),
            },
        )
    }

    pub fn array_access(&mut self, span: Span, array: NodeId, index: NodeId) -> NodeId {
        self.push(span, Node::ArrayAccess { array, index })
    }

    pub fn call(
        &mut self,
        span: Span,
        callee: NodeId,
        template_args: Option<Vec<NodeId>>,
        args: Vec<NodeId>,
    ) -> NodeId {
        self.push(
            span,
            Node::Call {
                callee,
                template_args,
                args,
            },
        )
    }

    pub fn unary(&mut self, span: Span, op: UnaryOp, operand: NodeId) -> NodeId {
        self.push(span, Node::Unary { op, operand })
    }

    pub fn binary(&mut self, span: Span, left: NodeId, op: BinaryOp, right: NodeId) -> NodeId {
        self.push(
            span,
            Node::Binary {
                op,
                broadcast: false,
                left,
                right,
            },
        )
    }

    /// Element-wise `left @(op) right`
    pub fn broadcast(&mut self, span: Span, left: NodeId, op: BinaryOp, right: NodeId) -> NodeId {
        self.push(
            span,
            Node::Binary {
                op,
                broadcast: true,
                left,
                right,
            },
        )
    }

    pub fn assign(&mut self, span: Span, target: NodeId, value: NodeId) -> NodeId {
        self.push(span, Node::Assign { target, value })
    }

    pub fn simple_type(&mut self, span: Span, name: &str) -> NodeId {
        self.push(
            span,
            Node::SimpleType {
                name: name.to_string(),
            },
        )
    }

    pub fn array_type(&mut self, span: Span, elem: NodeId) -> NodeId {
        self.push(span, Node::ArrayType { elem })
    }

    pub fn template_type(&mut self, span: Span, name: &str) -> NodeId {
        self.push(
            span,
            Node::TemplateType {
                name: name.to_string(),
            },
        )
    }

    pub fn var_decl(&mut self, span: Span, name: &str, ty: NodeId, init: NodeId) -> NodeId {
        self.push(
            span,
            Node::VarDecl {
                name: name.to_string(),
                ty,
                init,
            },
        )
    }

    pub fn field_decl(&mut self, span: Span, name: &str, ty: NodeId) -> NodeId {
        self.push(
            span,
            Node::FieldDecl {
                name: name.to_string(),
                ty,
            },
        )
    }

    pub fn param(&mut self, span: Span, name: &str, ty: NodeId) -> NodeId {
        self.push(
            span,
            Node::Param {
                name: name.to_string(),
                ty,
            },
        )
    }

    pub fn template_param(&mut self, span: Span, name: &str) -> NodeId {
        self.push(
            span,
            Node::TemplateParam {
                name: name.to_string(),
            },
        )
    }

    /// A missing return type defaults to `Void`, as the parser contract
    /// prescribes.
    pub fn fun_decl(
        &mut self,
        span: Span,
        name: &str,
        template_params: Option<Vec<NodeId>>,
        params: Vec<NodeId>,
        ret: Option<NodeId>,
        body: NodeId,
    ) -> NodeId {
        let ret = ret.unwrap_or_else(|| self.simple_type(Span::new(span.start, span.start), "Void"));
        self.push(
            span,
            Node::FunDecl {
                name: name.to_string(),
                template_params,
                params,
                ret,
                body,
            },
        )
    }

    pub fn struct_decl(
        &mut self,
        span: Span,
        name: &str,
        template_params: Option<Vec<NodeId>>,
        fields: Vec<NodeId>,
    ) -> NodeId {
        self.push(
            span,
            Node::StructDecl {
                name: name.to_string(),
                template_params,
                fields,
            },
        )
    }

    pub fn root_node(&mut self, span: Span, stmts: Vec<NodeId>) -> NodeId {
        self.push(span, Node::Root { stmts })
    }

    pub fn block(&mut self, span: Span, stmts: Vec<NodeId>) -> NodeId {
        self.push(span, Node::Block { stmts })
    }

    pub fn if_stmt(
        &mut self,
        span: Span,
        cond: NodeId,
        then_branch: NodeId,
        else_branch: Option<NodeId>,
    ) -> NodeId {
        self.push(
            span,
            Node::If {
                cond,
                then_branch,
                else_branch,
            },
        )
    }

    pub fn while_stmt(&mut self, span: Span, cond: NodeId, body: NodeId) -> NodeId {
        self.push(span, Node::While { cond, body })
    }

    pub fn return_stmt(&mut self, span: Span, expr: Option<NodeId>) -> NodeId {
        self.push(span, Node::Return { expr })
    }

    pub fn expr_stmt(&mut self, span: Span, expr: NodeId) -> NodeId {
        self.push(span, Node::ExprStmt { expr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contents_labels() {
        let mut ast = Ast::new();
        let s = Span::dummy();
        let one = ast.int_lit(s, 1);
        let two = ast.int_lit(s, 2);
        let sum = ast.binary(s, one, BinaryOp::Add, two);
        assert_eq!(ast.contents(sum), "1 + 2");

        let l = ast.array_lit(s, vec![one]);
        let r = ast.array_lit(s, vec![two]);
        let bc = ast.broadcast(s, l, BinaryOp::Add, r);
        assert_eq!(ast.contents(bc), "[...] @(+) [...]");

        let f = ast.reference(s, "f");
        let call = ast.call(s, f, None, vec![one]);
        assert_eq!(ast.contents(call), "f(...)");
    }

    #[test]
    fn test_missing_return_type_defaults_to_void() {
        let mut ast = Ast::new();
        let s = Span::dummy();
        let body = ast.block(s, vec![]);
        let f = ast.fun_decl(s, "f", None, vec![], None, body);
        let Node::FunDecl { ret, .. } = ast.kind(f) else {
            panic!("expected function declaration");
        };
        assert_eq!(
            ast.kind(*ret),
            &Node::SimpleType {
                name: "Void".to_string()
            }
        );
    }

    #[test]
    fn test_json_round_trip() {
        let mut ast = Ast::new();
        let s = Span::new(0, 9);
        let one = ast.int_lit(Span::new(7, 8), 1);
        let ret = ast.return_stmt(Span::new(0, 8), Some(one));
        ast.root_node(s, vec![ret]);

        let encoded = serde_json::to_string(&ast).unwrap();
        let decoded: Ast = serde_json::from_str(&encoded).unwrap();
        assert_eq!(ast, decoded);
        assert_eq!(decoded.root(), ast.root());
    }
}
