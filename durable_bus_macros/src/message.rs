use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, LitStr};

#[derive(Clone, Copy)]
pub enum Kind {
    Command,
    Event,
}

struct MessageOptions {
    name: Option<String>,
    durable: bool,
}

pub fn derive_message(input: TokenStream, kind: Kind) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);

    let options = match extract_options(&input) {
        Ok(options) => options,
        Err(err) => return err.to_compile_error().into(),
    };
    let header_field = match extract_header_field(&input) {
        Ok(field) => field,
        Err(err) => return err.to_compile_error().into(),
    };

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    // Unnamed messages are keyed by their full path so same-named types in
    // different modules never share a persisted type name.
    let message_type = match options.name {
        Some(explicit) => quote!(#explicit),
        None => quote!(::core::concat!(
            ::core::module_path!(),
            "::",
            ::core::stringify!(#name)
        )),
    };

    let (kind_variant, marker) = match kind {
        Kind::Command => (
            quote!(::durable_bus::MessageKind::Command),
            quote!(::durable_bus::Command),
        ),
        Kind::Event => (
            quote!(::durable_bus::MessageKind::Event),
            quote!(::durable_bus::Event),
        ),
    };

    let durable = if options.durable {
        quote! {
            impl #impl_generics ::durable_bus::DurableMessage for #name #ty_generics #where_clause {}
        }
    } else {
        quote!()
    };

    let expanded = quote! {
        impl #impl_generics ::durable_bus::Message for #name #ty_generics #where_clause {
            const MESSAGE_TYPE: &'static str = #message_type;
            const KIND: ::durable_bus::MessageKind = #kind_variant;

            fn header(&self) -> &::durable_bus::MessageHeader {
                &self.#header_field
            }

            fn header_mut(&mut self) -> &mut ::durable_bus::MessageHeader {
                &mut self.#header_field
            }
        }

        impl #impl_generics #marker for #name #ty_generics #where_clause {}

        #durable
    };

    TokenStream::from(expanded)
}

fn extract_options(input: &DeriveInput) -> syn::Result<MessageOptions> {
    let mut options = MessageOptions {
        name: None,
        durable: false,
    };

    for attr in &input.attrs {
        if !attr.path().is_ident("message") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("durable") {
                options.durable = true;
                Ok(())
            } else if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                options.name = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("expected `durable` or `name = \"...\"`"))
            }
        })?;
    }

    Ok(options)
}

fn extract_header_field(input: &DeriveInput) -> syn::Result<syn::Ident> {
    let Data::Struct(data_struct) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "messages must be structs with named fields",
        ));
    };
    let Fields::Named(fields) = &data_struct.fields else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "messages must be structs with named fields",
        ));
    };

    for field in &fields.named {
        for attr in &field.attrs {
            if !attr.path().is_ident("message") {
                continue;
            }
            let mut is_header = false;
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("header") {
                    is_header = true;
                    Ok(())
                } else {
                    Err(meta.error("expected `header`"))
                }
            })?;
            if is_header {
                if let Some(ident) = &field.ident {
                    return Ok(ident.clone());
                }
            }
        }
    }

    // Default: a field named "header"
    for field in &fields.named {
        if let Some(ident) = &field.ident {
            if ident == "header" {
                return Ok(ident.clone());
            }
        }
    }

    Err(syn::Error::new_spanned(
        &input.ident,
        "no field marked with #[message(header)] and no field named `header`",
    ))
}
