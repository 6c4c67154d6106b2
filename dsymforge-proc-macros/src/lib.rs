extern crate proc_macro;

use proc_macro::TokenStream;

use quote::quote;
use syn::{Fields, Index, Item};

/// Derives a field-by-field `ByteSwap` implementation for `#[repr(C)]`
/// structs that get serialized directly into an output buffer.
#[proc_macro_derive(ByteSwap)]
pub fn derive_byte_swap(item: TokenStream) -> TokenStream {
    let item: Item = syn::parse(item).unwrap();
    let strukt = match item {
        Item::Struct(strukt) => strukt,
        _ => panic!("ByteSwap can only be derived on structs"),
    };
    let name = strukt.ident;
    // Fully-qualified calls, so the trait doesn't need to be in scope where
    // the derive is used.
    let swaps: Vec<_> = match strukt.fields {
        Fields::Named(fields) => fields.named.into_iter()
            .map(|field| {
                let field = field.ident.unwrap();
                quote! { crate::byte_swap::ByteSwap::byte_swap(&mut self.#field); }
            })
            .collect(),
        Fields::Unnamed(fields) => fields.unnamed.into_iter().enumerate()
            .map(|(i, _)| {
                let index = Index::from(i);
                quote! { crate::byte_swap::ByteSwap::byte_swap(&mut self.#index); }
            })
            .collect(),
        Fields::Unit => Vec::new(),
    };
    quote! {
        impl crate::byte_swap::ByteSwap for #name {
            fn byte_swap(&mut self) {
                #(#swaps)*
            }
        }
    }.into()
}
