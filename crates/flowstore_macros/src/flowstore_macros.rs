//! Flowstore Macros - store-root markers
//!
//! - `#[derive(FlowStore)]` generates the `<Root>Store` wrapper in place
//! - `#[flow_store]` marks a root for the offline generator and expands to
//!   the item unchanged

use proc_macro::TokenStream;
use syn::{DeriveInput, Expr, Lit, Meta, Token, parse_macro_input, punctuated::Punctuated};

use flowstore_codegen::{Declaration, EmitOptions, build, emit};

/// Read `#[flowstore(crate = "path")]`, if present
fn runtime_path(attrs: &[syn::Attribute]) -> syn::Result<Option<String>> {
    let mut path = None;

    for attr in attrs.iter().filter(|attr| attr.path().is_ident("flowstore")) {
        let metas = attr.parse_args_with(Punctuated::<Meta, Token![,]>::parse_terminated)?;
        for meta in metas {
            match meta {
                Meta::NameValue(nv) if nv.path.is_ident("crate") => {
                    if let Expr::Lit(expr_lit) = &nv.value {
                        if let Lit::Str(s) = &expr_lit.lit {
                            path = Some(s.value());
                            continue;
                        }
                    }
                    return Err(syn::Error::new_spanned(nv.value, "expected a string literal"));
                }
                other => {
                    return Err(syn::Error::new_spanned(other, "unknown flowstore attribute"));
                }
            }
        }
    }

    Ok(path)
}

fn expand(input: DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let mut options = EmitOptions::inline();
    if let Some(path) = runtime_path(&input.attrs)? {
        options = options.with_runtime_path(path);
    }

    let ident = input.ident.clone();
    let ir = build(&Declaration::from_derive(input))
        .map_err(|e| syn::Error::new_spanned(&ident, e))?;

    emit(&ir, &options)
        .source
        .parse()
        .map_err(|e| syn::Error::new_spanned(&ident, format!("generated store does not lex: {}", e)))
}

/// Derive an observable store wrapper for a struct.
///
/// The struct must have named fields and implement `Clone`.
///
/// # Attributes
///
/// - `#[flowstore(crate = "path")]` (optional): path of the flowstore runtime
///   (default: `::flowstore`)
///
/// # Example
///
/// ```ignore
/// #[derive(Clone, FlowStore)]
/// struct UiState {
///     text: String,
///     count: i32,
/// }
///
/// let store = UiState { text: "1234".into(), count: 0 }.into_store();
/// store.count(|c| c + 1).await;
/// assert_eq!(store.flow().value().count, 1);
/// ```
///
/// This generates:
/// - `struct UiStateStore` holding a `MutableStateFlow<UiState>`
/// - `UiStateStore::flow() -> StateFlow<UiState>`
/// - `async fn text(&self, transform: impl FnOnce(String) -> String)` and one
///   such mutator per field, in declaration order
/// - `async fn text_with(&self, transform: impl FnOnce(String) -> F)` with
///   `F: Future<Output = String>`, right after each plain mutator
/// - `UiState::into_store()` and `impl From<UiState> for UiStateStore`
#[proc_macro_derive(FlowStore, attributes(flowstore))]
pub fn derive_flow_store(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Marks a struct as a store root for the offline generator
/// (`flowstore generate` or `flowstore_codegen::Builder`).
///
/// Takes no arguments and leaves the item untouched.
#[proc_macro_attribute]
pub fn flow_store(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        let attr = proc_macro2::TokenStream::from(attr);
        return syn::Error::new_spanned(attr, "#[flow_store] takes no arguments")
            .to_compile_error()
            .into();
    }
    item
}
