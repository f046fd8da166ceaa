//! Implementation of the `#[derive(Schema)]` macro.
//!
//! This module generates the `Schema` implementation and the typed field
//! constants for a struct with named fields.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::{Data, DeriveInput, Expr, Fields, FieldsNamed, Ident, Type, parse_macro_input};

/// One declared record field.
struct FieldSpec {
    ident: Ident,
    name: String,
    ty: Type,
    default: Option<Expr>,
}

/// Main implementation of the Schema derive macro.
pub fn derive_schema_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    TokenStream::from(expand(&input).unwrap_or_else(syn::Error::into_compile_error))
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let fields = match &input.data {
        Data::Struct(data_struct) => match &data_struct.fields {
            Fields::Named(named) => collect_fields(named)?,
            Fields::Unnamed(_) => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Schema can only be derived for structs with named fields, not tuple structs.",
                ));
            }
            Fields::Unit => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Schema cannot be derived for unit structs (structs with no fields).",
                ));
            }
        },
        Data::Enum(_) => {
            return Err(syn::Error::new_spanned(
                name,
                "Schema can only be derived for structs, not enums.",
            ));
        }
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(name, "Schema cannot be derived for unions."));
        }
    };

    let (impl_generics, type_generics, where_clause) = input.generics.split_for_impl();
    let type_name = name.unraw().to_string();
    let names: Vec<&String> = fields.iter().map(|field| &field.name).collect();
    let idents: Vec<&Ident> = fields.iter().map(|field| &field.ident).collect();
    let types: Vec<&Type> = fields.iter().map(|field| &field.ty).collect();

    let defaults = fields.iter().map(|field| {
        let ty = &field.ty;
        let initial = field.default.as_ref().map_or_else(
            || quote! { <#ty as ::std::default::Default>::default() },
            |expr| quote! { #expr },
        );
        quote! {
            {
                let initial: #ty = #initial;
                ::typed_map::FieldValue::into_value(initial)
            }
        }
    });

    let constants = fields.iter().map(|field| {
        let FieldSpec { name: field_name, ty, .. } = field;
        let constant = format_ident!("{}", field_name.to_uppercase());
        let doc = format!("Typed handle on the `{field_name}` field.");
        quote! {
            #[doc = #doc]
            pub const #constant: ::typed_map::Field<Self, #ty> = ::typed_map::Field::new(#field_name);
        }
    });

    Ok(quote! {
        impl #impl_generics ::typed_map::Schema for #name #type_generics #where_clause {
            const TYPE_NAME: &'static str = #type_name;
            const FIELDS: &'static [&'static str] = &[#(#names),*];

            fn defaults() -> ::std::vec::Vec<(&'static str, ::typed_map::Value)> {
                ::std::vec![#((#names, #defaults)),*]
            }

            fn into_fields(self) -> ::std::vec::Vec<(&'static str, ::typed_map::Value)> {
                ::std::vec![#((#names, ::typed_map::FieldValue::into_value(self.#idents))),*]
            }

            fn from_record(record: &::typed_map::TypedMap<Self>) -> ::std::option::Option<Self> {
                ::std::option::Option::Some(Self {
                    #(#idents: <#types as ::typed_map::FieldValue>::from_value(record.get_value(#names)?)?),*
                })
            }
        }

        impl #impl_generics #name #type_generics #where_clause {
            #(#constants)*
        }
    })
}

fn collect_fields(named: &FieldsNamed) -> syn::Result<Vec<FieldSpec>> {
    named
        .named
        .iter()
        .map(|field| {
            let ident = field
                .ident
                .clone()
                .ok_or_else(|| syn::Error::new_spanned(field, "named field without an identifier"))?;
            Ok(FieldSpec {
                name: ident.unraw().to_string(),
                ident,
                ty: field.ty.clone(),
                default: field_default(field)?,
            })
        })
        .collect()
}

/// Reads `#[field(default = expr)]`.
fn field_default(field: &syn::Field) -> syn::Result<Option<Expr>> {
    let mut default = None;
    for attribute in field.attrs.iter().filter(|attribute| attribute.path().is_ident("field")) {
        attribute.parse_nested_meta(|meta| {
            if meta.path.is_ident("default") {
                default = Some(meta.value()?.parse::<Expr>()?);
                Ok(())
            } else {
                Err(meta.error("unsupported field attribute; expected `default = ...`"))
            }
        })?;
    }
    Ok(default)
}
