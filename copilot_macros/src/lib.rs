//! Procedural macros for **copilot-rs**
#![forbid(unsafe_code)]

use proc_macro::TokenStream;
use proc_macro2::{Ident, Span};
use proc_macro_crate::{FoundCrate, crate_name};
use proc_macro_error::{abort, proc_macro_error};
use quote::quote;
use syn::{
    Attribute, Data, DataEnum, DeriveInput, Expr, ExprLit, Fields, FnArg, ItemFn, Lit, LitStr,
    Meta, Pat, PatIdent, PatType, ReturnType, Type, TypePath, parse_macro_input,
};

// ============================================================================
// TOOL SCHEMA DERIVE MACRO
// ============================================================================

/// Derive `ToolSchema` for an enum.
///
/// Unit-only enums become string literal enumerations, using each variant's
/// serialized name. `#[serde(untagged)]` enums whose variants all wrap one
/// value become unions of the wrapped types.
#[proc_macro_error]
#[proc_macro_derive(ToolSchema)]
pub fn derive_tool_schema(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match &input.data {
        Data::Enum(data) if data.variants.is_empty() => {
            abort!(input.ident, "empty enums have no tool schema")
        }
        Data::Enum(data) if data.variants.iter().all(|v| v.fields.is_empty()) => {
            generate_literal_schema(&input, data)
        }
        Data::Enum(data) => generate_union_schema(&input, data),
        Data::Struct(_) => abort!(
            input.ident,
            "structs have no tool schema";
            help = "use a map or list parameter, or an enum"
        ),
        Data::Union(_) => abort!(input.ident, "Union schemas are not supported"),
    }
}

fn generate_literal_schema(input: &DeriveInput, data: &DataEnum) -> TokenStream {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let crate_path = get_crate_path();

    let rename_all = serde_options(&input.attrs).rename_all;
    let values: Vec<String> = data
        .variants
        .iter()
        .map(|variant| {
            serde_options(&variant.attrs)
                .rename
                .unwrap_or_else(|| rename_variant(&variant.ident.to_string(), rename_all.as_deref()))
        })
        .collect();

    TokenStream::from(quote! {
        impl #impl_generics #crate_path::ToolSchema for #name #ty_generics #where_clause {
            fn shape() -> #crate_path::TypeShape {
                #crate_path::TypeShape::Literal(::std::vec![#(::std::string::String::from(#values)),*])
            }
        }
    })
}

fn generate_union_schema(input: &DeriveInput, data: &DataEnum) -> TokenStream {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let crate_path = get_crate_path();

    if !serde_options(&input.attrs).untagged {
        abort!(
            input.ident,
            "enums with data need `#[serde(untagged)]` to match their tool schema"
        );
    }

    let alternatives: Vec<&Type> = data
        .variants
        .iter()
        .map(|variant| match &variant.fields {
            Fields::Unnamed(fields) if fields.unnamed.len() == 1 => &fields.unnamed[0].ty,
            _ => abort!(
                variant,
                "every variant must wrap exactly one unnamed value, like `{}(T)`",
                variant.ident
            ),
        })
        .collect();

    TokenStream::from(quote! {
        impl #impl_generics #crate_path::ToolSchema for #name #ty_generics #where_clause {
            fn shape() -> #crate_path::TypeShape {
                #crate_path::TypeShape::Union(::std::vec![
                    #(<#alternatives as #crate_path::ToolSchema>::shape()),*
                ])
            }
        }
    })
}

#[derive(Default)]
struct SerdeOptions {
    rename: Option<String>,
    rename_all: Option<String>,
    untagged: bool,
}

/// Read the `#[serde(...)]` options that change serialized names or tagging.
/// Other serde options are skipped.
fn serde_options(attrs: &[Attribute]) -> SerdeOptions {
    let mut options = SerdeOptions::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("serde")) {
        let parsed = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                options.rename = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("rename_all") {
                options.rename_all = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("untagged") {
                options.untagged = true;
            } else if meta.input.peek(syn::Token![=]) {
                meta.value()?.parse::<Expr>()?;
            } else if meta.input.peek(syn::token::Paren) {
                meta.parse_nested_meta(|nested| {
                    if nested.input.peek(syn::Token![=]) {
                        nested.value()?.parse::<Expr>()?;
                    }
                    Ok(())
                })?;
            }
            Ok(())
        });
        if let Err(err) = parsed {
            abort!(err.span(), "{}", err);
        }
    }
    options
}

fn split_words(ident: &str) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    for c in ident.chars() {
        if c == '_' {
            words.push(String::new());
        } else if c.is_uppercase() || words.is_empty() {
            words.push(c.to_lowercase().collect());
        } else if let Some(last) = words.last_mut() {
            last.push(c);
        }
    }
    words.retain(|w| !w.is_empty());
    words
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Apply a serde `rename_all` rule to a variant name.
fn rename_variant(ident: &str, rule: Option<&str>) -> String {
    let words = split_words(ident);
    match rule {
        Some("lowercase") => ident.to_lowercase(),
        Some("UPPERCASE") => ident.to_uppercase(),
        Some("snake_case") => words.join("_"),
        Some("SCREAMING_SNAKE_CASE") => words.join("_").to_uppercase(),
        Some("kebab-case") => words.join("-"),
        Some("SCREAMING-KEBAB-CASE") => words.join("-").to_uppercase(),
        Some("camelCase") => words
            .iter()
            .enumerate()
            .map(|(i, w)| if i == 0 { w.clone() } else { capitalize(w) })
            .collect(),
        _ => ident.to_string(),
    }
}

fn get_crate_path() -> proc_macro2::TokenStream {
    match crate_name("copilot_core") {
        Ok(FoundCrate::Itself) => return quote!(crate),
        Ok(FoundCrate::Name(name)) => {
            let ident = Ident::new(&name, Span::call_site());
            return quote!(::#ident);
        }
        Err(_) => {}
    }
    // Users of the facade crate reach the core through its re-export.
    match crate_name("copilot-rs") {
        Ok(FoundCrate::Name(name)) => {
            let ident = Ident::new(&name, Span::call_site());
            quote!(::#ident::copilot_core)
        }
        _ => quote!(::copilot_core),
    }
}

fn is_option_type(ty: &Type) -> bool {
    let Type::Path(TypePath { qself: None, path }) = ty else {
        return false;
    };

    let Some(last) = path.segments.last() else {
        return false;
    };
    if last.ident != "Option" {
        return false;
    }

    match path
        .segments
        .iter()
        .map(|s| &s.ident)
        .collect::<Vec<_>>()
        .as_slice()
    {
        [ident] if *ident == "Option" => true,

        [first, second, ident]
            if (*first == "std" || *first == "core")
                && *second == "option"
                && *ident == "Option" =>
        {
            true
        }

        _ => false,
    }
}

// ============================================================================
// TOOL ATTRIBUTE MACRO
// ============================================================================

/// Gather `///` doc-comments into a single string, trimming the leading space after `///`.
fn docs(attrs: &[Attribute]) -> String {
    attrs
        .iter()
        .filter_map(|a| match &a.meta {
            Meta::NameValue(nv) if a.path().is_ident("doc") => {
                if let Expr::Lit(ExprLit {
                    lit: Lit::Str(s), ..
                }) = &nv.value
                {
                    Some(s.value().trim_start().to_owned())
                } else {
                    None
                }
            }
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Default)]
struct ParamAttr {
    description: Option<LitStr>,
    default: Option<Expr>,
}

/// Remove `#[param(...)]` from `attrs` and parse it.
fn take_param_attr(attrs: &mut Vec<Attribute>) -> ParamAttr {
    let mut param = ParamAttr::default();
    let mut kept = Vec::with_capacity(attrs.len());
    for attr in attrs.drain(..) {
        if !attr.path().is_ident("param") {
            kept.push(attr);
            continue;
        }
        let parsed = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("description") {
                param.description = Some(meta.value()?.parse()?);
                Ok(())
            } else if meta.path.is_ident("default") {
                param.default = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("expected `description = \"...\"` or `default = <expr>`"))
            }
        });
        if let Err(err) = parsed {
            abort!(err.span(), "{}", err);
        }
    }
    *attrs = kept;
    param
}

struct ToolParam {
    ident: Ident,
    ty: Type,
    attr: ParamAttr,
}

fn parse_tool_attr(attr: TokenStream) -> syn::Result<Option<LitStr>> {
    let mut returns = None;
    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("returns") {
            returns = Some(meta.value()?.parse()?);
            Ok(())
        } else {
            Err(meta.error("expected `returns = \"...\"`"))
        }
    });
    syn::parse::Parser::parse(parser, attr)?;
    Ok(returns)
}

/// Default expression converted to the parameter type.
///
/// String literals go through `From<&str>`, so `default = "fast"` works for a
/// `String` parameter. Any other expression must already have the
/// parameter's type.
fn typed_default(ty: &Type, expr: &Expr) -> proc_macro2::TokenStream {
    match expr {
        Expr::Lit(ExprLit {
            lit: Lit::Str(_), ..
        }) => quote!(<#ty as ::std::convert::From<&'static str>>::from(#expr)),
        _ => quote!(#expr),
    }
}

/// Register a free function as a tool.
///
/// The doc comment becomes the tool description. Each parameter takes a
/// `#[param(description = "...", default = <expr>)]` annotation; the
/// description is required when the tool is registered.
#[proc_macro_error]
#[proc_macro_attribute]
pub fn tool(attr: TokenStream, item: TokenStream) -> TokenStream {
    let returns_doc = match parse_tool_attr(attr) {
        Ok(returns) => returns,
        Err(err) => abort!(err.span(), "{}", err),
    };

    // ───────── Parse the user function ─────────
    let mut func: ItemFn = parse_macro_input!(item);
    let fn_name = func.sig.ident.clone();
    let fn_name_str = fn_name.to_string();
    let doc = docs(&func.attrs);
    let crate_path = get_crate_path();

    if !func.sig.generics.params.is_empty() {
        abort!(func.sig.generics, "`#[tool]` functions may not be generic");
    }

    // ───────── Inputs → parameter specs (attributes stripped) ─────────
    let params: Vec<ToolParam> = func
        .sig
        .inputs
        .iter_mut()
        .map(|arg| match arg {
            FnArg::Typed(PatType { attrs, pat, ty, .. }) => {
                let Pat::Ident(PatIdent { ident, .. }) = &**pat else {
                    abort!(pat, "`#[tool]` supports only identifier patterns");
                };
                if let Type::Reference(reference) = &**ty {
                    abort!(reference, "`#[tool]` parameters must be owned types";
                        help = "use `String` instead of `&str`");
                }
                ToolParam {
                    ident: ident.clone(),
                    ty: (**ty).clone(),
                    attr: take_param_attr(attrs),
                }
            }
            FnArg::Receiver(_) => abort!(arg, "`#[tool]` may not be used on `self` methods"),
        })
        .collect();

    // ───────── Signature builder ─────────
    let doc_call = (!doc.trim().is_empty()).then(|| quote!(.doc(#doc)));
    let param_specs = params.iter().map(|p| {
        let name = p.ident.to_string();
        let ty = &p.ty;
        let description = p.attr.description.as_ref().map(|d| quote!(.description(#d)));
        let default = p.attr.default.as_ref().map(|expr| {
            let expr = typed_default(ty, expr);
            quote! {
                .default_value(
                    #crate_path::serde_json::to_value::<#ty>(#expr)
                        .unwrap_or(#crate_path::serde_json::Value::Null)
                )
            }
        });
        quote! {
            .param(#crate_path::ParamSpec::of::<#ty>(#name) #description #default)
        }
    });

    let return_ty = match &func.sig.output {
        ReturnType::Default => None,
        ReturnType::Type(_, ty) => Some(&**ty),
    };
    let returns_call = if return_ty.is_some() || returns_doc.is_some() {
        let type_name = return_ty
            .map(|ty| quote!(#ty).to_string().replace(' ', ""))
            .unwrap_or_else(|| "()".to_string());
        let required = !return_ty.is_some_and(is_option_type);
        let description = match &returns_doc {
            Some(d) => quote!(::std::option::Option::Some(::std::string::String::from(#d))),
            None => quote!(::std::option::Option::None),
        };
        Some(quote! {
            .returns(#crate_path::ReturnSpec {
                type_name: ::std::string::String::from(#type_name),
                description: #description,
                required: #required,
            })
        })
    } else {
        None
    };

    // ───────── Argument binding ─────────
    let bindings = params.iter().map(|p| {
        let ident = &p.ident;
        let name = ident.to_string();
        let ty = &p.ty;
        match &p.attr.default {
            Some(expr) => {
                let expr = typed_default(ty, expr);
                quote! {
                    let #ident: #ty = #crate_path::take_argument_or(&mut args, #name, || #expr)?;
                }
            }
            None => quote! {
                let #ident: #ty = #crate_path::take_argument(&mut args, #name)?;
            },
        }
    });
    let idents = params.iter().map(|p| &p.ident);
    let call = if func.sig.asyncness.is_some() {
        quote!(#fn_name(#(#idents),*).await)
    } else {
        quote!(#fn_name(#(#idents),*))
    };

    // ───────── Generated helper idents ─────────
    let signature_fn = Ident::new(&format!("__tool_signature_{fn_name}"), Span::call_site());
    let invoke_fn = Ident::new(&format!("__tool_invoke_{fn_name}"), Span::call_site());

    // ───────── Macro expansion ─────────
    TokenStream::from(quote! {
        #func

        #[doc(hidden)]
        #[allow(non_snake_case)]
        fn #signature_fn() -> #crate_path::ToolSignature {
            #crate_path::ToolSignature::new(#fn_name_str)
                #doc_call
                #(#param_specs)*
                #returns_call
        }

        #[doc(hidden)]
        #[allow(non_snake_case, unused_mut)]
        fn #invoke_fn(
            mut args: #crate_path::Arguments,
        ) -> #crate_path::futures::future::BoxFuture<
            'static,
            ::std::result::Result<::std::string::String, #crate_path::ToolFailure>,
        > {
            ::std::boxed::Box::pin(async move {
                #(#bindings)*
                #crate_path::reject_unexpected(#fn_name_str, &args)?;
                let out = #call;
                #crate_path::IntoToolOutput::into_tool_output(out)
            })
        }

        #crate_path::inventory::submit! {
            #crate_path::ToolRegistration::new(#fn_name_str, #signature_fn, #invoke_fn)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::{Type, parse_quote};

    #[test]
    fn test_is_option_type_detection() {
        let simple_option: Type = parse_quote!(Option<i32>);
        assert!(is_option_type(&simple_option));

        let std_option: Type = parse_quote!(std::option::Option<String>);
        assert!(is_option_type(&std_option));

        let core_option: Type = parse_quote!(core::option::Option<bool>);
        assert!(is_option_type(&core_option));

        let vec_type: Type = parse_quote!(Vec<i32>);
        assert!(!is_option_type(&vec_type));

        let custom_type: Type = parse_quote!(MyCustomOption<i32>);
        assert!(!is_option_type(&custom_type));

        let fake_option: Type = parse_quote!(my_mod::Option<i32>);
        assert!(!is_option_type(&fake_option));
    }

    #[test]
    fn test_docs_are_joined() {
        let item: ItemFn = parse_quote! {
            /// Get the current temperature
            /// for a specific location.
            fn get_current_temperature() {}
        };
        assert_eq!(
            docs(&item.attrs),
            "Get the current temperature\nfor a specific location."
        );
    }

    #[test]
    fn test_param_attr_is_parsed_and_stripped() {
        let mut item: ItemFn = parse_quote! {
            fn get_weather(
                #[param(description = "City name")] #[allow(unused)] location: String,
                #[param(description = "Forecast length", default = 1)] days: u32,
                unit: String,
            ) {}
        };

        let mut found = Vec::new();
        for arg in item.sig.inputs.iter_mut() {
            if let FnArg::Typed(PatType { attrs, .. }) = arg {
                let param = take_param_attr(attrs);
                found.push((
                    param.description.map(|d| d.value()),
                    param.default.is_some(),
                    attrs.len(),
                ));
            }
        }

        assert_eq!(
            found,
            [
                (Some("City name".to_string()), false, 1),
                (Some("Forecast length".to_string()), true, 0),
                (None, false, 0),
            ]
        );
    }

    #[test]
    fn test_string_defaults_are_converted() {
        let ty: Type = parse_quote!(String);
        let literal: Expr = parse_quote!("fast");
        let expected = quote!(<String as ::std::convert::From<&'static str>>::from("fast"));
        assert_eq!(typed_default(&ty, &literal).to_string(), expected.to_string());

        let ty: Type = parse_quote!(u32);
        let number: Expr = parse_quote!(1);
        assert_eq!(typed_default(&ty, &number).to_string(), "1");
    }

    #[test]
    fn test_serde_options() {
        let input: DeriveInput = parse_quote! {
            #[derive(Serialize)]
            #[serde(rename_all = "snake_case", deny_unknown_fields)]
            enum Unit {
                #[serde(rename = "C", alias = "celsius")]
                Celsius,
                #[serde(skip_serializing_if = "Option::is_none")]
                DegreesFahrenheit,
            }
        };
        let container = serde_options(&input.attrs);
        assert_eq!(container.rename_all.as_deref(), Some("snake_case"));
        assert!(!container.untagged);

        let Data::Enum(data) = &input.data else {
            panic!("expected enum");
        };
        assert_eq!(serde_options(&data.variants[0].attrs).rename.as_deref(), Some("C"));
        assert_eq!(serde_options(&data.variants[1].attrs).rename, None);
    }

    #[test]
    fn test_rename_rules() {
        assert_eq!(rename_variant("DegreesFahrenheit", None), "DegreesFahrenheit");
        assert_eq!(rename_variant("DegreesFahrenheit", Some("snake_case")), "degrees_fahrenheit");
        assert_eq!(rename_variant("DegreesFahrenheit", Some("kebab-case")), "degrees-fahrenheit");
        assert_eq!(rename_variant("DegreesFahrenheit", Some("camelCase")), "degreesFahrenheit");
        assert_eq!(rename_variant("DegreesFahrenheit", Some("lowercase")), "degreesfahrenheit");
        assert_eq!(
            rename_variant("DegreesFahrenheit", Some("SCREAMING_SNAKE_CASE")),
            "DEGREES_FAHRENHEIT"
        );
    }
}
