use proc_macro::TokenStream;
use quote::quote;

/// Wrap `fn main` with the actix-web single-threaded runtime the rest of
/// `gateway-core` assumes (request context is `Rc`-based, not `Arc`-based).
#[proc_macro_attribute]
pub fn main(_: TokenStream, item: TokenStream) -> TokenStream {
    let mut output: TokenStream = (quote! {
        #[gateway_core::actix_web::rt::main(system = "gateway_core::actix_web::rt::System")]
    })
    .into();

    output.extend(item);
    output
}
