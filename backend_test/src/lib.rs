use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, Ident, ItemFn, Pat, Signature, Type};

/// Backends every test is run against, paired with any extra attributes the
/// generated test needs.
const BACKENDS: &[(&str, &str, Option<&str>)] = &[
    ("memory", "Memory", None),
    ("relational", "Relational", None),
    ("single_table", "SingleTable", None),
    (
        "mongo",
        "Mongo",
        Some("requires a MongoDB server, see STORE_TEST_MONGO_URI"),
    ),
];

/// Run a synchronous test once against every backend.
///
/// The test must take exactly one `&dyn Backend` argument. The macro turns
/// `fn name(store: &dyn Backend)` into a module `name` holding one `#[test]`
/// per backend, each handing a fresh store to the original body and tearing
/// it down afterwards however the test terminates.
///
/// `#[backend_test(seeded)]` loads the shared example data before the body
/// runs.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Reject invalid function signatures.
    if let Err(err) = check_sig(&item_fn.sig) {
        return err.into_compile_error().into();
    }

    // Seed the store first if asked to.
    let seeded = match parse_macro_input!(args as Option<Ident>) {
        None => false,
        Some(arg) if arg == "seeded" => true,
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected `seeded` or no argument")
                .into_compile_error()
                .into();
        }
    };

    // The module takes the test's name; the body becomes a plain function in it.
    let name = item_fn.sig.ident.clone();
    item_fn.sig.ident = format_ident!("body");

    let tests = BACKENDS
        .iter()
        .map(|(test_name, variant, ignore)| {
            let test_name = format_ident!("{}", test_name);
            let variant = format_ident!("{}", variant);
            let ignore: TokenStream2 = match ignore {
                Some(reason) => quote! { #[ignore = #reason] },
                None => quote! {},
            };
            quote! {
                #[test]
                #ignore
                fn #test_name() {
                    crate::testing::with_backend(
                        crate::testing::TestBackend::#variant,
                        #seeded,
                        body,
                    );
                }
            }
        })
        .collect::<Vec<_>>();

    quote! {
        mod #name {
            #[allow(unused_imports)]
            use super::*;

            #item_fn

            #(#tests)*
        }
    }
    .into()
}

/// Ensure the wrapped test is synchronous and takes exactly one `&dyn Backend`.
fn check_sig(sig: &Signature) -> Result<(), syn::Error> {
    if let Some(asyncness) = sig.asyncness {
        return Err(syn::Error::new(
            asyncness.span(),
            "Test must not be `async`: the stores are synchronous",
        ));
    }

    if sig.inputs.len() != 1 {
        return Err(syn::Error::new(
            sig.inputs.span(),
            "Test must accept exactly one `store: &dyn Backend` argument",
        ));
    }

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let Pat::Ident(_) = &*pat_type.pat {
                if let Type::Reference(reference) = &*pat_type.ty {
                    if reference.mutability.is_none() {
                        if let Type::TraitObject(object) = &*reference.elem {
                            if object.dyn_token.is_some() {
                                return Ok(());
                            }
                        }
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected `store_ident: &dyn Backend`",
        ));
    }

    Ok(())
}
