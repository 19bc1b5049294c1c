extern crate proc_macro2;

use proc_macro_crate::{FoundCrate, crate_name};
use proc_macro2::{Span, TokenStream};
use quote::{quote, quote_spanned};
use syn::{Data, DeriveInput, Fields, Ident, parse_macro_input, spanned::Spanned};

/// Derives `Parseable` and `Writable` for a struct with named fields. Fields are read and written
/// in declaration order, so the struct layout _is_ the on-disk layout.
#[proc_macro_derive(Serial)]
pub fn derive_serial(item: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    derive_serial_internal(input).into()
}

pub(crate) fn derive_serial_internal(input: DeriveInput) -> TokenStream {
    let found_crate = crate_name("bank-files").expect("bank-files is present in `Cargo.toml`");

    let crate_name = match found_crate {
        FoundCrate::Itself => quote!(crate),
        FoundCrate::Name(name) => {
            let ident = Ident::new(&name, Span::call_site());
            quote!(#ident)
        }
    };

    let ident = input.ident;
    let fields = match input.data {
        Data::Struct(s) => match s.fields {
            Fields::Named(fields) => fields.named,
            _ => panic!(
                "`#[derive(Serial)]` only supports named struct fields at the moment: {}",
                ident
            ),
        },
        _ => panic!("`#[derive(Serial)]` is only available on structs: {}", ident),
    };

    let parse_fields = fields.iter().map(|f| {
        let name = &f.ident;
        let ftype = &f.ty;
        // Qualified path, so generic field types (`[u8; 4]`, `Vec<T>`) work as well.
        quote_spanned! {f.span()=>
            #name: <#ftype as #crate_name::common::reader::Parseable<#ftype>>::parse(rdr)?,
        }
    });

    let write_fields = fields.iter().map(|f| {
        let name = &f.ident;
        quote_spanned! {f.span()=>
            #crate_name::common::writer::Writable::write(&self.#name, wtr)?;
        }
    });

    quote!(
        impl #crate_name::common::reader::Parseable<#ident> for #ident {
            fn parse<R: ::std::io::Read>(rdr: &mut R) -> Result<#ident, #crate_name::ParserError> {
                Ok(#ident {
                    #(#parse_fields)*
                })
            }
        }

        impl #crate_name::common::writer::Writable for #ident {
            fn write<W: ::std::io::Write>(&self, wtr: &mut W) -> Result<(), #crate_name::ParserError> {
                #(#write_fields)*
                Ok(())
            }
        }
    )
}
