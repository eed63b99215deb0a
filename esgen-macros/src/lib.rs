// These lints are triggered by darling's generated code for
// `#[darling(default)]`.
#![allow(clippy::option_if_let_else)]
#![allow(clippy::needless_continue)]

use std::collections::{HashMap, HashSet};

use darling::{FromDeriveInput, FromField, FromVariant, ast::Data, util::Ignored};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{ToTokens, quote};
use syn::{DeriveInput, Ident, parse_macro_input};

/// Configuration read from the enum the derive is applied to.
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(event), supports(enum_newtype, enum_unit))]
struct EventSetArgs {
    ident: Ident,
    generics: syn::Generics,
    data: Data<EventVariant, Ignored>,
}

/// One member of the event set.
#[derive(Debug, FromVariant)]
#[darling(attributes(event))]
struct EventVariant {
    ident: Ident,
    fields: darling::ast::Fields<PayloadField>,
    /// Schema name of the event. Defaults to the variant name.
    #[darling(default)]
    name: Option<String>,
}

#[derive(Debug, FromField)]
struct PayloadField {
    ty: syn::Type,
}

/// Captures a variant, its schema name and its payload type, if any.
struct EventSpec<'a> {
    variant: &'a Ident,
    name: String,
    payload: Option<&'a syn::Type>,
}

impl<'a> EventSpec<'a> {
    fn new(variant: &'a EventVariant) -> Self {
        Self {
            variant: &variant.ident,
            name: variant
                .name
                .clone()
                .unwrap_or_else(|| variant.ident.to_string()),
            payload: variant.fields.fields.first().map(|field| &field.ty),
        }
    }
}

/// Parse derive input with darling and render errors as tokens.
fn parse_or_error<T, F>(input: &DeriveInput, f: F) -> TokenStream2
where
    T: FromDeriveInput,
    F: FnOnce(T) -> TokenStream2,
{
    match T::from_derive_input(input) {
        Ok(args) => f(args),
        Err(err) => err.write_errors(),
    }
}

/// Derives `EventSet` for an enum with one variant per schema event.
///
/// Newtype variants carry the event's properties in a type implementing
/// `Serialize` and `Deserialize`. Unit variants are events without
/// properties; their stored payload is ignored when decoding.
///
/// A `From<Payload>` impl is generated for every payload type used by
/// exactly one variant.
///
/// # Attributes
///
/// - `#[event(name = "Name")]` on a variant - Schema name of the event
///   (default: the variant name)
///
/// # Example
///
/// ```ignore
/// #[derive(Debug, Clone, EventSet)]
/// pub enum OrderEvent {
///     Created(OrderCreated),
///     #[event(name = "Shipped")]
///     Dispatched(OrderShipped),
///     Canceled,
/// }
/// ```
#[proc_macro_derive(EventSet, attributes(event))]
pub fn derive_event_set(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    derive_event_set_impl(&input).into()
}

/// Internal entry point that returns tokens for the event set derive.
fn derive_event_set_impl(input: &DeriveInput) -> TokenStream2 {
    parse_or_error::<EventSetArgs, _>(input, generate_event_set_impl)
}

/// Generate the event set implementation tokens.
fn generate_event_set_impl(args: EventSetArgs) -> TokenStream2 {
    let enum_name = &args.ident;
    let Data::Enum(variants) = &args.data else {
        unreachable!("darling only accepts enums");
    };
    if variants.is_empty() {
        return darling::Error::custom("an event set needs at least one variant")
            .with_span(enum_name)
            .write_errors();
    }

    let specs: Vec<EventSpec<'_>> = variants.iter().map(EventSpec::new).collect();

    let mut errors = darling::Error::accumulator();
    let mut seen = HashSet::new();
    for spec in &specs {
        if !seen.insert(spec.name.as_str()) {
            errors.push(
                darling::Error::custom(format!("duplicate event name `{}`", spec.name))
                    .with_span(spec.variant),
            );
        }
    }
    if let Err(errors) = errors.finish() {
        return errors.write_errors();
    }

    let (impl_generics, ty_generics, where_clause) = args.generics.split_for_impl();
    let names: Vec<&str> = specs.iter().map(|spec| spec.name.as_str()).collect();

    let name_arms = specs.iter().map(|spec| {
        let (variant, name) = (spec.variant, &spec.name);
        match spec.payload {
            Some(_) => quote! { Self::#variant(_) => #name },
            None => quote! { Self::#variant => #name },
        }
    });

    let to_payload_arms = specs.iter().map(|spec| {
        let variant = spec.variant;
        match spec.payload {
            Some(_) => quote! {
                Self::#variant(inner) => ::esgen::__private::serde_json::to_value(inner)
            },
            None => quote! {
                Self::#variant => Ok(::esgen::__private::serde_json::Value::Object(
                    ::esgen::__private::serde_json::Map::new(),
                ))
            },
        }
    });

    let from_payload_arms = specs.iter().map(|spec| {
        let (variant, name) = (spec.variant, &spec.name);
        match spec.payload {
            Some(_) => quote! {
                #name => ::esgen::__private::serde_json::from_value(payload)
                    .map(Self::#variant)
                    .map_err(::esgen::event::DecodeError::Payload)
            },
            None => quote! { #name => Ok(Self::#variant) },
        }
    });

    // Payload types shared by several variants get no `From` impl.
    let mut payload_uses: HashMap<String, usize> = HashMap::new();
    for ty in specs.iter().filter_map(|spec| spec.payload) {
        *payload_uses.entry(ty.to_token_stream().to_string()).or_default() += 1;
    }
    let from_impls = specs.iter().filter_map(|spec| {
        let ty = spec.payload?;
        if payload_uses[&ty.to_token_stream().to_string()] > 1 {
            return None;
        }
        let variant = spec.variant;
        Some(quote! {
            impl #impl_generics ::core::convert::From<#ty> for #enum_name #ty_generics #where_clause {
                fn from(event: #ty) -> Self {
                    Self::#variant(event)
                }
            }
        })
    });

    quote! {
        impl #impl_generics ::esgen::EventSet for #enum_name #ty_generics #where_clause {
            const NAMES: &'static [&'static str] = &[#(#names),*];

            fn name(&self) -> &'static str {
                match self {
                    #(#name_arms),*
                }
            }

            fn to_payload(
                &self,
            ) -> ::core::result::Result<
                ::esgen::__private::serde_json::Value,
                ::esgen::__private::serde_json::Error,
            > {
                match self {
                    #(#to_payload_arms),*
                }
            }

            fn from_payload(
                name: &str,
                payload: ::esgen::__private::serde_json::Value,
            ) -> ::core::result::Result<Self, ::esgen::event::DecodeError> {
                match name {
                    #(#from_payload_arms,)*
                    _ => Err(::esgen::event::DecodeError::UnknownEvent {
                        name: name.to_owned(),
                        expected: <Self as ::esgen::EventSet>::NAMES,
                    }),
                }
            }
        }

        #(#from_impls)*
    }
}

#[cfg(test)]
mod tests {
    use syn::parse_quote;

    use super::*;

    /// Normalise token output by removing whitespace.
    fn compact(tokens: &TokenStream2) -> String {
        tokens
            .to_string()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect()
    }

    #[test]
    fn names_default_to_variant_idents() {
        let input: DeriveInput = parse_quote! {
            pub enum OrderEvent {
                Created(OrderCreated),
                Canceled,
            }
        };

        let compact = compact(&derive_event_set_impl(&input));

        assert!(compact.contains("impl::esgen::EventSetforOrderEvent"));
        assert!(compact.contains("constNAMES:&'static[&'staticstr]=&[\"Created\",\"Canceled\"]"));
        assert!(compact.contains("Self::Created(_)=>\"Created\""));
        assert!(compact.contains("Self::Canceled=>\"Canceled\""));
        assert!(compact.contains("\"Canceled\"=>Ok(Self::Canceled)"));
    }

    #[test]
    fn name_attribute_overrides_the_schema_name() {
        let input: DeriveInput = parse_quote! {
            pub enum OrderEvent {
                #[event(name = "Shipped")]
                Dispatched(OrderShipped),
            }
        };

        let compact = compact(&derive_event_set_impl(&input));

        assert!(compact.contains("Self::Dispatched(_)=>\"Shipped\""));
        assert!(compact.contains("\"Shipped\"=>::esgen::__private::serde_json::from_value(payload).map(Self::Dispatched)"));
    }

    #[test]
    fn from_impls_skip_shared_payload_types() {
        let input: DeriveInput = parse_quote! {
            pub enum OrderEvent {
                Created(OrderCreated),
                Renamed(Label),
                Relabeled(Label),
            }
        };

        let compact = compact(&derive_event_set_impl(&input));

        assert!(compact.contains("impl::core::convert::From<OrderCreated>forOrderEvent"));
        assert!(!compact.contains("From<Label>"));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let input: DeriveInput = parse_quote! {
            pub enum OrderEvent {
                Created(OrderCreated),
                #[event(name = "Created")]
                Recreated(OrderCreated),
            }
        };

        let compact = compact(&derive_event_set_impl(&input));

        assert!(compact.contains("duplicateeventname`Created`"));
    }

    #[test]
    fn empty_enums_are_rejected() {
        let input: DeriveInput = parse_quote! {
            pub enum OrderEvent {}
        };

        let compact = compact(&derive_event_set_impl(&input));

        assert!(compact.contains("aneventsetneedsatleastonevariant"));
    }

    #[test]
    fn structs_are_rejected() {
        let input: DeriveInput = parse_quote! {
            pub struct OrderEvent(OrderCreated);
        };

        let compact = compact(&derive_event_set_impl(&input));

        assert!(compact.contains("compile_error"));
    }
}
