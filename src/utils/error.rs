//! Semantic error kinds for Quill
//!
//! Errors are collected during analysis, never thrown: every rule keeps
//! running so a single pass reports as many real errors as possible.

use thiserror::Error;

/// Kind of semantic error, with a user-facing message.
///
/// Type operands are carried pre-rendered as strings so diagnostics stay
/// decoupled from the type model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    // ==================== Name Resolution ====================
    #[error("could not resolve: {name}")]
    UnresolvedReference { name: String },

    #[error("variable used before declaration: {name}")]
    UsedBeforeDeclaration { name: String },

    #[error("{name} did not resolve to a type declaration but to a {declared}")]
    NotAType { name: String, declared: String },

    #[error("trying to declare an already existing name: {name}")]
    Redeclaration { name: String },

    // ==================== Assignment & Calls ====================
    #[error("incompatible initializer type provided for variable `{name}`: expected {expected} but got {got}")]
    IncompatibleInitializer {
        name: String,
        expected: String,
        got: String,
    },

    #[error("trying to assign a value of type {got} to a non-compatible lvalue of type {expected}")]
    IncompatibleAssignment { expected: String, got: String },

    #[error("trying to assign to a non-lvalue expression")]
    NotAnLvalue,

    #[error("incompatible argument provided for argument {index}: expected {expected} but got {got}")]
    IncompatibleArgument {
        index: usize,
        expected: String,
        got: String,
    },

    #[error("wrong number of arguments, expected {expected} but got {got}")]
    ArityMismatch { expected: usize, got: usize },

    #[error("trying to call a non-function expression: {what}")]
    NotCallable { what: String },

    #[error("applying the constructor operator ($) to a non-struct reference: {what}")]
    ConstructorOnNonStruct { what: String },

    // ==================== Templates ====================
    #[error("wrong number of template arguments in {name}: expected {expected} but got {got}")]
    TemplateArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("trying to call template function {name} without giving any types as arguments")]
    TemplateArgsMissing { name: String },

    #[error("trying to use templates that were not declared: {name}")]
    TemplateNotDeclared { name: String },

    #[error("{name} is not an allowed name for template")]
    TemplateNameNotAllowed { name: String },

    #[error("{name} is not an allowed type for a template argument")]
    TemplateArgNotAllowed { name: String },

    #[error("no template declaration was made")]
    NoTemplateClause,

    #[error("wrong template declaration: {name} was not found")]
    TemplateParamNotFound { name: String },

    #[error("field {field} of struct {strukt} uses a template parameter that was not declared")]
    FieldPlaceholderNotDeclared { field: String, strukt: String },

    #[error("field {field} uses a template type but struct {strukt} declares no template parameters")]
    PlaceholderFieldInPlainStruct { field: String, strukt: String },

    // ==================== Operators ====================
    #[error("trying to {op} {left} with {right}")]
    ArithmeticMismatch {
        op: String,
        left: String,
        right: String,
    },

    #[error("attempting to perform arithmetic comparison on non-numeric type: {ty}")]
    NonNumericComparison { ty: String },

    #[error("attempting to perform binary logic on non-boolean type: {ty}")]
    NonBoolLogic { ty: String },

    #[error("trying to compare incomparable types {left} and {right}")]
    IncomparableTypes { left: String, right: String },

    #[error("trying to negate type: {ty}")]
    NegatingNonBool { ty: String },

    // ==================== Broadcast Operator ====================
    #[error("trying to use the broadcast operator between non-array types")]
    BroadcastNonArray,

    #[error("trying to use {op} between arrays of String type")]
    BroadcastStringOp { op: String },

    #[error("trying to use {op} between arrays of Bool type")]
    BroadcastBoolOp { op: String },

    #[error("trying to broadcast between non-compatible array types {left} and {right}")]
    BroadcastIncompatible { left: String, right: String },

    // ==================== Arrays & Structs ====================
    #[error("void-valued expression in array literal")]
    VoidArrayElement,

    #[error("could not find common supertype in array literal")]
    NoCommonSupertype,

    #[error("indexing an array using a non-Int-valued expression")]
    NonIntIndex,

    #[error("trying to index a non-array expression of type {ty}")]
    IndexingNonArray { ty: String },

    #[error("trying to access a non-length field on an array")]
    NonLengthArrayField,

    #[error("trying to access a field on an expression of type {ty}")]
    FieldOnNonStruct { ty: String },

    #[error("trying to access missing field {field} on struct {strukt}")]
    MissingField { field: String, strukt: String },

    // ==================== Statements ====================
    #[error("{construct} statement with a non-boolean condition of type: {ty}")]
    NonBoolCondition { construct: String, ty: String },

    #[error("missing return in function")]
    MissingReturn,

    #[error("incompatible return type, expected {expected} but got {got}")]
    IncompatibleReturn { expected: String, got: String },

    #[error("return without value in a function with a return type")]
    ReturnWithoutValue,

    #[error("return with value in a Void function")]
    ReturnInVoidFunction,

    // ==================== Solver Backstop ====================
    #[error("could not resolve attribute {attr} of {what}")]
    UnresolvedAttribute { attr: String, what: String },
}
