use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{DeriveInput, Path, parse_macro_input, parse_quote};

fn strata_ecs_path() -> Path {
    parse_quote!(::strata_ecs)
}

/// Implements the marker trait at `trait_path` for the deriving type, adding
/// `Self: Send + Sync + 'static` to its where clause.
fn derive_marker(mut ast: DeriveInput, trait_path: Path) -> TokenStream2 {
    ast.generics
        .make_where_clause()
        .predicates
        .push(parse_quote! { Self: Send + Sync + 'static });

    let struct_name = &ast.ident;
    let (impl_generics, type_generics, where_clause) = ast.generics.split_for_impl();

    quote! {
        impl #impl_generics #trait_path for #struct_name #type_generics #where_clause {}
    }
}

#[proc_macro_derive(Component)]
pub fn derive_component(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    let strata_ecs_path = strata_ecs_path();
    derive_marker(ast, parse_quote!(#strata_ecs_path::component::Component)).into()
}

#[proc_macro_derive(Singleton)]
pub fn derive_singleton(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    let strata_ecs_path = strata_ecs_path();
    derive_marker(ast, parse_quote!(#strata_ecs_path::singleton::Singleton)).into()
}
