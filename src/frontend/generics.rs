//! Generic (template) instantiation tracking
//!
//! Each generic declaration owns an append-only table of concrete-type
//! bindings, one entry per call or construction site, in visit order. The
//! ordinal order drives the per-instantiation evaluation of templated
//! expressions; the per-call index makes each site's binding explicit so
//! recursive calls and calls inside loops stay unambiguous.

use std::collections::HashMap;

use crate::frontend::ast::NodeId;
use crate::frontend::scopes::DeclId;
use crate::types::Type;

/// One concrete instantiation of a generic declaration.
#[derive(Debug, Clone)]
pub struct Instantiation {
    /// The call or construction expression that supplied the bindings.
    pub call: NodeId,
    /// Placeholder name (and derived `name[]` entry) to concrete type.
    pub bindings: HashMap<String, Type>,
}

/// All instantiations recorded for one generic declaration.
#[derive(Debug, Clone, Default)]
pub struct Instantiations {
    /// Append-only, in call-site visit order.
    pub sites: Vec<Instantiation>,
    site_of: HashMap<NodeId, usize>,
    /// For generic structs: field name to placeholder name, for the fields
    /// whose declared type is a placeholder.
    pub field_placeholders: HashMap<String, String>,
}

/// Instantiation tables for every generic declaration, keyed by the
/// declaration itself.
#[derive(Debug, Default)]
pub struct GenericTable {
    tables: HashMap<DeclId, Instantiations>,
}

impl GenericTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `decl` as generic (called when its template clause is visited),
    /// so an uncalled generic still owns an (empty) table.
    pub fn register(&mut self, decl: DeclId) {
        self.tables.entry(decl).or_default();
    }

    /// Append one instantiation for `decl`, recorded at `call`.
    pub fn record(&mut self, decl: DeclId, call: NodeId, bindings: HashMap<String, Type>) {
        let table = self.tables.entry(decl).or_default();
        let ordinal = table.sites.len();
        table.sites.push(Instantiation { call, bindings });
        table.site_of.insert(call, ordinal);
    }

    /// Record that field `field` of generic struct `decl` is declared with
    /// placeholder type `placeholder`.
    pub fn record_field(&mut self, decl: DeclId, field: &str, placeholder: &str) {
        self.tables
            .entry(decl)
            .or_default()
            .field_placeholders
            .insert(field.to_string(), placeholder.to_string());
    }

    pub fn instantiations(&self, decl: DeclId) -> Option<&Instantiations> {
        self.tables.get(&decl)
    }

    pub fn is_generic(&self, decl: DeclId) -> bool {
        self.tables.contains_key(&decl)
    }

    /// The binding entry recorded for one specific call expression.
    pub fn binding_for_call(&self, decl: DeclId, call: NodeId) -> Option<&Instantiation> {
        let table = self.tables.get(&decl)?;
        let ordinal = *table.site_of.get(&call)?;
        table.sites.get(ordinal)
    }
}

/// The concrete type denoted by an explicit template argument, restricted
/// to the allowed set.
pub fn template_arg_type(name: &str) -> Option<Type> {
    match name {
        "Int" => Some(Type::int()),
        "Float" => Some(Type::float()),
        "String" => Some(Type::string()),
        "Bool" => Some(Type::bool()),
        "Template" => Some(Type::template()),
        "Int[]" => Some(Type::array_of(Type::int())),
        "Float[]" => Some(Type::array_of(Type::float())),
        "String[]" => Some(Type::array_of(Type::string())),
        "Bool[]" => Some(Type::array_of(Type::bool())),
        "Template[]" => Some(Type::template_array()),
        _ => None,
    }
}

/// Build the binding map for one call site: each declared placeholder is
/// bound positionally, with a derived `name[]` entry so array-suffixed uses
/// of the placeholder substitute in one step.
pub fn make_bindings(placeholders: &[String], args: &[Type]) -> HashMap<String, Type> {
    let mut bindings = HashMap::new();
    for (name, ty) in placeholders.iter().zip(args.iter()) {
        if let Type::Array { .. } = ty {
            bindings.insert(name.clone(), Type::template());
            bindings.insert(format!("{name}[]"), ty.clone());
        } else {
            bindings.insert(name.clone(), ty.clone());
            bindings.insert(format!("{name}[]"), Type::array_of(ty.clone()));
        }
    }
    bindings
}
