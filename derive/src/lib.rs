extern crate proc_macro;

use itertools::izip;
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, Index, Member};

/// Attributes accepted on the deriving type.
struct TypeAttributes {
    id: Option<u32>,
}

/// How a field takes part in the wire format.
#[derive(Clone, Copy, PartialEq, Eq)]
enum FieldMode {
    Plain,
    Transient,
    Ignored,
}

/// Extract `#[transfer(id = N)]` from the type attributes.
fn get_type_attributes(attrs: &[Attribute]) -> syn::Result<TypeAttributes> {
    let mut id = None;
    for attr in attrs {
        if !attr.path().is_ident("transfer") {
            continue;
        }
        attr.parse_args_with(|input: syn::parse::ParseStream| {
            while !input.is_empty() {
                let ident = input.parse::<syn::Ident>()?;
                if ident == "id" {
                    input.parse::<syn::Token![=]>()?;
                    let lit = input.parse::<syn::LitInt>()?;
                    id = Some(lit.base10_parse::<u32>()?);
                } else {
                    return Err(syn::Error::new(
                        ident.span(),
                        format!("Unknown attribute: {}", ident),
                    ));
                }
                if input.peek(syn::Token![,]) {
                    input.parse::<syn::Token![,]>()?;
                }
            }
            Ok(())
        })?;
    }
    Ok(TypeAttributes { id })
}

/// Extract `#[transfer(transient)]` / `#[transfer(ignore)]` from field attributes.
fn get_field_mode(attrs: &[Attribute]) -> syn::Result<FieldMode> {
    let mut mode = FieldMode::Plain;
    for attr in attrs {
        if !attr.path().is_ident("transfer") {
            continue;
        }
        attr.parse_args_with(|input: syn::parse::ParseStream| {
            while !input.is_empty() {
                let ident = input.parse::<syn::Ident>()?;
                if ident == "transient" {
                    mode = FieldMode::Transient;
                } else if ident == "ignore" {
                    mode = FieldMode::Ignored;
                } else {
                    return Err(syn::Error::new(
                        ident.span(),
                        format!("Unknown attribute: {}", ident),
                    ));
                }
                if input.peek(syn::Token![,]) {
                    input.parse::<syn::Token![,]>()?;
                }
            }
            Ok(())
        })?;
    }
    Ok(mode)
}

/// Derive macro implementing `Transfer`, `TransferType`, `Object` and `Registrable`.
///
/// # Supported shapes
/// - Structs with named or tuple fields, or no fields. The struct must implement
///   `Default` and `Debug`; fields are written in declaration order.
/// - Enums whose variants are all unit variants. The ordinal of a constant is its
///   declaration index.
///
/// # Attributes
/// - `#[transfer(id = N)]` on the type: wire id used when the type is registered
///   on first use.
/// - `#[transfer(transient)]`, `#[transfer(ignore)]` on a field: the field is not
///   written and keeps its `Default` value on decode.
///
/// Generic types are not supported.
#[proc_macro_derive(Transferable, attributes(transfer))]
pub fn derive_transferable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let expanded = match expand(&input) {
        Ok(tokens) => tokens,
        Err(e) => e.to_compile_error(),
    };
    TokenStream::from(expanded)
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Transferable cannot be derived for generic types",
        ));
    }
    let attrs = get_type_attributes(&input.attrs)?;
    let (body, view) = match &input.data {
        Data::Struct(data) => expand_struct(input, &data.fields)?,
        Data::Enum(data) => expand_enum(input, data)?,
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "Transferable cannot be derived for unions",
            ))
        }
    };

    let name = &input.ident;
    let id = match attrs.id {
        Some(id) => quote! { ::std::option::Option::Some(#id) },
        None => quote! { ::std::option::Option::None },
    };
    Ok(quote! {
        const _: () = {
            impl ::transfer_codec::Transfer for #name {
                fn runtime_type(&self) -> ::transfer_codec::TypeRef {
                    <Self as ::transfer_codec::TransferType>::declared_type()
                }

                fn view(&self) -> ::transfer_codec::View<'_> {
                    #view
                }

                fn as_any(&self) -> &dyn ::std::any::Any {
                    self
                }
            }

            impl ::transfer_codec::Object for #name {
                fn as_transfer(&self) -> &dyn ::transfer_codec::Transfer {
                    self
                }

                fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                    self
                }

                fn into_any(self: ::std::boxed::Box<Self>) -> ::std::boxed::Box<dyn ::std::any::Any> {
                    self
                }
            }

            impl ::transfer_codec::TransferType for #name {
                fn declared_type() -> ::transfer_codec::TypeRef {
                    ::transfer_codec::TypeRef::Class(<Self as ::transfer_codec::Registrable>::key())
                }

                fn from_value(value: ::transfer_codec::Value) -> ::transfer_codec::Result<Self> {
                    value.into_object::<Self>()
                }
            }

            impl ::transfer_codec::Registrable for #name {
                const TRANSFER_ID: ::std::option::Option<u32> = #id;

                #body
            }
        };
    })
}

fn expand_struct(input: &DeriveInput, fields: &Fields) -> syn::Result<(TokenStream2, TokenStream2)> {
    let name = &input.ident;
    let name_str = name.to_string();

    let members: Vec<Member> = fields
        .iter()
        .enumerate()
        .map(|(index, field)| match &field.ident {
            Some(ident) => Member::Named(ident.clone()),
            None => Member::Unnamed(Index::from(index)),
        })
        .collect();
    let field_names: Vec<String> = fields
        .iter()
        .enumerate()
        .map(|(index, field)| match &field.ident {
            Some(ident) => ident.to_string(),
            None => index.to_string(),
        })
        .collect();
    let modes = fields
        .iter()
        .map(|field| get_field_mode(&field.attrs))
        .collect::<syn::Result<Vec<_>>>()?;

    let mut accessors = Vec::new();
    let mut descs = Vec::new();
    for (index, (member, field_name, mode, field)) in
        izip!(&members, &field_names, &modes, fields.iter()).enumerate()
    {
        match mode {
            FieldMode::Transient => {
                descs.push(quote! { ::transfer_codec::FieldDesc::transient(#field_name) });
                continue;
            }
            FieldMode::Ignored => {
                descs.push(quote! { ::transfer_codec::FieldDesc::ignored(#field_name) });
                continue;
            }
            FieldMode::Plain => {}
        }
        let ty = &field.ty;
        let declared = format_ident!("declared_{}", index);
        let getter = format_ident!("get_{}", index);
        let setter = format_ident!("set_{}", index);
        accessors.push(quote! {
            fn #declared() -> ::transfer_codec::TypeRef {
                <#ty as ::transfer_codec::TransferType>::declared_type()
            }

            fn #getter(owner: &dyn ::std::any::Any) -> ::std::option::Option<&dyn ::transfer_codec::Transfer> {
                owner
                    .downcast_ref::<#name>()
                    .map(|object| &object.#member as &dyn ::transfer_codec::Transfer)
            }

            fn #setter(
                owner: &mut dyn ::std::any::Any,
                value: ::transfer_codec::Value,
            ) -> ::transfer_codec::Result<()> {
                let object = owner.downcast_mut::<#name>().ok_or_else(|| {
                    ::transfer_codec::TransferError::TypeMismatch {
                        expected: #name_str,
                        found: ::std::string::String::from("a value of another type"),
                    }
                })?;
                object.#member = <#ty as ::transfer_codec::TransferType>::from_value(value)?;
                ::std::result::Result::Ok(())
            }
        });
        descs.push(quote! {
            ::transfer_codec::FieldDesc::plain(
                #field_name,
                ::transfer_codec::FieldAccess {
                    declared: #declared,
                    get: #getter,
                    set: #setter,
                },
            )
        });
    }

    let body = quote! {
        fn binding() -> ::transfer_codec::ClassBinding {
            #(#accessors)*

            fn describe() -> ::transfer_codec::ClassDesc {
                ::transfer_codec::ClassDesc {
                    name: #name_str,
                    fields: ::std::vec![#(#descs),*],
                }
            }

            fn new_default() -> ::std::boxed::Box<dyn ::transfer_codec::Object> {
                ::std::boxed::Box::new(<#name as ::std::default::Default>::default())
            }

            ::transfer_codec::ClassBinding::object(
                <#name as ::transfer_codec::Registrable>::TRANSFER_ID,
                describe,
                new_default,
            )
        }

        fn key() -> ::transfer_codec::TypeKey {
            ::transfer_codec::TypeKey::object::<Self>()
        }
    };
    Ok((body, quote! { ::transfer_codec::View::Object }))
}

fn expand_enum(
    input: &DeriveInput,
    data: &syn::DataEnum,
) -> syn::Result<(TokenStream2, TokenStream2)> {
    let name = &input.ident;
    let name_str = name.to_string();

    if data.variants.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "Transferable enums need at least one variant",
        ));
    }
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "Transferable enums may only have unit variants",
            ));
        }
    }
    let idents: Vec<_> = data.variants.iter().map(|variant| &variant.ident).collect();
    let variant_names: Vec<String> = idents.iter().map(|ident| ident.to_string()).collect();
    let ordinals: Vec<u32> = (0..idents.len() as u32).collect();

    let view = quote! {
        ::transfer_codec::View::Enum(match self {
            #(#name::#idents => #ordinals,)*
        })
    };
    let body = quote! {
        fn binding() -> ::transfer_codec::ClassBinding {
            fn from_ordinal(ordinal: u32) -> ::std::option::Option<::std::boxed::Box<dyn ::transfer_codec::Object>> {
                match ordinal {
                    #(#ordinals => ::std::option::Option::Some(::std::boxed::Box::new(#name::#idents)),)*
                    _ => ::std::option::Option::None,
                }
            }

            fn describe() -> ::transfer_codec::EnumDesc {
                ::transfer_codec::EnumDesc {
                    name: #name_str,
                    variants: &[#(#variant_names),*],
                    from_ordinal,
                }
            }

            ::transfer_codec::ClassBinding::enumeration(
                <#name as ::transfer_codec::Registrable>::TRANSFER_ID,
                describe,
            )
        }

        fn key() -> ::transfer_codec::TypeKey {
            ::transfer_codec::TypeKey::enumeration::<Self>()
        }
    };
    Ok((body, view))
}
