use proc_macro::TokenStream;
use quote::quote;
use syn::{ItemFn, LitInt, parse_macro_input};

/// A `#[test]` wrapper that reports wall time and fails tests that run
/// longer than a budget (default: 1 second).
///
/// # Usage
/// ```ignore
/// use test_macros::timed_test;
///
/// #[timed_test]
/// fn fast_case() {
///     assert!(1 < 2);
/// }
///
/// #[timed_test(60)]
/// fn slower_case() {
///     // allowed up to 60 seconds
/// }
/// ```
#[proc_macro_attribute]
pub fn timed_test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let budget_secs: u64 = if attr.is_empty() {
        1
    } else {
        parse_macro_input!(attr as LitInt)
            .base10_parse()
            .expect("timed_test takes an integer budget in seconds")
    };

    let func = parse_macro_input!(item as ItemFn);
    let name = &func.sig.ident;
    let body = &func.block;
    let attrs = &func.attrs;
    let vis = &func.vis;

    let wrapped = quote! {
        #(#attrs)*
        #[test]
        #vis fn #name() {
            let __start = ::std::time::Instant::now();
            let __outcome = ::std::panic::catch_unwind(
                ::std::panic::AssertUnwindSafe(|| #body)
            );
            let __secs = __start.elapsed().as_secs_f64();

            eprintln!("[timed] {}: {:.3}s", stringify!(#name), __secs);

            if let Err(__panic) = __outcome {
                ::std::panic::resume_unwind(__panic);
            }
            assert!(
                __secs < #budget_secs as f64,
                "[timed] {} ran {:.3}s, budget {}s",
                stringify!(#name),
                __secs,
                #budget_secs
            );
        }
    };

    wrapped.into()
}
