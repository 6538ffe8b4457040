//! IR Builder
//!
//! Reads a marked declaration into a [`StoreIr`]. Reflects only what is
//! lexically present: field order is declaration order and generic arguments
//! are taken from the type as written.

use quote::ToTokens;
use syn::{Data, DeriveInput, Fields, GenericArgument, PathArguments, Type, Visibility};
use tracing::debug;

use crate::error::GenerateError;
use crate::ir::{FieldDescriptor, Namespace, Origin, StoreIr, StoreVisibility, TypeShape};
use crate::scope::TypeScope;

/// Field names the wrapper itself defines
const RESERVED_FIELDS: &[&str] = &["flow"];

// ─────────────────────────────────────────────────────────────────────────────
// Declaration
// ─────────────────────────────────────────────────────────────────────────────

/// A type declaration carrying the store-root marker, with the scope of the
/// module that declares it
#[derive(Debug, Clone)]
pub struct Declaration {
    pub input: DeriveInput,
    pub scope: TypeScope,
    pub origin: Origin,
}

impl Declaration {
    pub fn new(input: DeriveInput, scope: TypeScope, origin: Origin) -> Self {
        Self {
            input,
            scope,
            origin,
        }
    }

    /// Declaration handed to a derive macro: only the item itself is visible
    pub fn from_derive(input: DeriveInput) -> Self {
        Self::new(input, TypeScope::lenient(Namespace::local()), Origin::detached())
    }

    pub fn name(&self) -> String {
        self.input.ident.to_string()
    }

    pub fn namespace(&self) -> &Namespace {
        self.scope.namespace()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Build
// ─────────────────────────────────────────────────────────────────────────────

/// Build the IR for one declaration
pub fn build(declaration: &Declaration) -> Result<StoreIr, GenerateError> {
    let root_type_name = declaration.name();
    let namespace = declaration.namespace().clone();
    let input = &declaration.input;

    let missing_constructor = |reason: &str| GenerateError::MissingConstructor {
        namespace: namespace.clone(),
        declaration: root_type_name.clone(),
        reason: reason.to_string(),
    };
    let unsupported = |reason: String| GenerateError::Unsupported {
        namespace: namespace.clone(),
        declaration: root_type_name.clone(),
        reason,
    };

    if !input.generics.params.is_empty() {
        return Err(unsupported(
            "generic parameters are not supported on store roots".to_string(),
        ));
    }

    let fields: Vec<&syn::Field> = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => named.named.iter().collect(),
            Fields::Unit => Vec::new(),
            Fields::Unnamed(_) => {
                return Err(missing_constructor(
                    "tuple struct fields have no names to generate mutators for",
                ));
            }
        },
        Data::Enum(_) => {
            return Err(missing_constructor("enums have no single constructor"));
        }
        Data::Union(_) => {
            return Err(missing_constructor(
                "unions have no constructor taking every field",
            ));
        }
    };

    let mut descriptors = Vec::with_capacity(fields.len());
    for field in fields {
        let name = field
            .ident
            .as_ref()
            .map(ToString::to_string)
            .ok_or_else(|| missing_constructor("field without a name"))?;

        if RESERVED_FIELDS.contains(&name.as_str()) {
            return Err(unsupported(format!(
                "field `{}` collides with the generated `{}()` accessor",
                name, name
            )));
        }

        let shape = shape_of(&field.ty, declaration).map_err(|reason| {
            GenerateError::UnresolvedType {
                namespace: namespace.clone(),
                declaration: root_type_name.clone(),
                field: name.clone(),
                ty: field.ty.to_token_stream().to_string(),
                reason,
            }
        })?;

        debug!(root = %root_type_name, field = %name, shape = %shape, "Resolved field");
        descriptors.push(FieldDescriptor { name, shape });
    }

    if let Some(field) = descriptors.iter().find(|field| {
        descriptors
            .iter()
            .any(|other| other.async_mutator_name() == field.name)
    }) {
        return Err(unsupported(format!(
            "field `{}` collides with a generated awaiting mutator",
            field.name
        )));
    }

    Ok(StoreIr {
        origin: declaration.origin.clone(),
        namespace,
        root_type_name,
        visibility: visibility_of(&input.vis),
        fields: descriptors,
    })
}

/// Resolve a field type to its shape, recursing into generic arguments
fn shape_of(ty: &Type, declaration: &Declaration) -> Result<TypeShape, String> {
    match ty {
        Type::Paren(paren) => shape_of(&paren.elem, declaration),
        Type::Group(group) => shape_of(&group.elem, declaration),
        Type::Path(type_path) => {
            if type_path.qself.is_some() {
                return Err("qualified-self paths name an associated type".to_string());
            }
            let path = &type_path.path;

            let (namespace, simple_name) = if path.is_ident("Self") {
                (declaration.namespace().clone(), declaration.name())
            } else {
                declaration.scope.resolve(path)?
            };

            let last = path
                .segments
                .last()
                .ok_or_else(|| "empty type path".to_string())?;

            let type_arguments = match &last.arguments {
                PathArguments::None => Vec::new(),
                PathArguments::AngleBracketed(args) => args
                    .args
                    .iter()
                    .map(|arg| match arg {
                        GenericArgument::Type(ty) => shape_of(ty, declaration),
                        GenericArgument::Lifetime(_) => {
                            Err("lifetime arguments need a generic store root".to_string())
                        }
                        other => Err(format!(
                            "unsupported generic argument `{}`",
                            other.to_token_stream()
                        )),
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                PathArguments::Parenthesized(_) => {
                    return Err("`Fn(A) -> B` sugar does not name a type".to_string());
                }
            };

            Ok(TypeShape::new(namespace, simple_name).with_arguments(type_arguments))
        }
        Type::Reference(_) => Err("references need a lifetime on the store root".to_string()),
        Type::Tuple(_) => Err("tuple types have no declaration".to_string()),
        Type::Array(_) | Type::Slice(_) => {
            Err("array and slice types have no declaration".to_string())
        }
        Type::BareFn(_) => Err("function pointers have no declaration".to_string()),
        Type::TraitObject(_) | Type::ImplTrait(_) => {
            Err("trait types have no declaration".to_string())
        }
        _ => Err("type has no declaration to resolve".to_string()),
    }
}

fn visibility_of(vis: &Visibility) -> StoreVisibility {
    match vis {
        Visibility::Public(_) => StoreVisibility::Public,
        Visibility::Inherited => StoreVisibility::Inherited,
        Visibility::Restricted(restricted) => {
            let path = restricted.path.to_token_stream().to_string().replace(' ', "");
            match path.as_str() {
                "crate" => StoreVisibility::Crate,
                "super" => StoreVisibility::Super,
                "self" => StoreVisibility::Inherited,
                _ => StoreVisibility::Restricted(path),
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
