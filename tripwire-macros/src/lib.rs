use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

/// `Debug` for config structs that carry closures.
///
/// Fields marked `#[redacted]` are printed as `<redacted>` instead of being
/// formatted, so the remaining fields need no extra bounds. Only structs with
/// named fields are supported.
#[proc_macro_derive(Redacted, attributes(redacted))]
pub fn derive_redacted(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return syn::Error::new_spanned(name, "Redacted derive needs named fields")
                    .to_compile_error()
                    .into();
            }
        },
        _ => {
            return syn::Error::new_spanned(name, "Redacted derive only supports structs")
                .to_compile_error()
                .into();
        }
    };

    let writers = fields.iter().filter_map(|f| {
        let ident = f.ident.as_ref()?;
        let value = if is_redacted(f) {
            quote! { &format_args!("<redacted>") }
        } else {
            quote! { &self.#ident }
        };
        Some(quote! { .field(stringify!(#ident), #value) })
    });

    quote! {
        impl #impl_generics std::fmt::Debug for #name #ty_generics #where_clause {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!(#name))
                    #(#writers)*
                    .finish()
            }
        }
    }
    .into()
}

fn is_redacted(field: &syn::Field) -> bool {
    field.attrs.iter().any(|attr| attr.path().is_ident("redacted"))
}
