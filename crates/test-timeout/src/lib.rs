//! `#[tokio_timeout_test]`: run an async test on its own current-thread
//! runtime and fail it once a wall-clock budget is spent.
//!
//! ```ignore
//! #[tokio_timeout_test]             // 30s budget
//! #[tokio_timeout_test(5)]          // 5s budget
//! #[tokio_timeout_test(10, paused)] // tokio clock starts paused
//! ```
//!
//! The budget is measured on a real clock from a watcher thread, so it keeps
//! working when the test pauses or advances tokio time. `paused` requires the
//! calling crate to enable tokio's `test-util` feature.

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::{parse_macro_input, Attribute, Ident, ItemFn, LitInt, Token};

const DEFAULT_BUDGET_SECS: u64 = 30;

struct Options {
    budget_secs: u64,
    paused: bool,
}

impl Parse for Options {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut options = Options {
            budget_secs: DEFAULT_BUDGET_SECS,
            paused: false,
        };
        while !input.is_empty() {
            if input.peek(LitInt) {
                let lit: LitInt = input.parse()?;
                options.budget_secs = lit.base10_parse()?;
                if options.budget_secs == 0 {
                    return Err(syn::Error::new(lit.span(), "budget must be at least one second"));
                }
            } else {
                let flag: Ident = input.parse()?;
                if flag != "paused" {
                    return Err(syn::Error::new(flag.span(), "expected a budget in seconds or `paused`"));
                }
                options.paused = true;
            }
            if !input.is_empty() {
                input.parse::<Token![,]>()?;
            }
        }
        Ok(options)
    }
}

#[proc_macro_attribute]
pub fn tokio_timeout_test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let options = parse_macro_input!(attr as Options);
    let ItemFn {
        attrs,
        vis,
        mut sig,
        block,
    } = parse_macro_input!(item as ItemFn);

    if sig.asyncness.take().is_none() {
        return syn::Error::new_spanned(&sig.fn_token, "tokio_timeout_test expects an async fn")
            .to_compile_error()
            .into();
    }
    if !sig.inputs.is_empty() {
        return syn::Error::new_spanned(&sig.inputs, "test functions take no arguments")
            .to_compile_error()
            .into();
    }

    let attrs: Vec<Attribute> = attrs.into_iter().filter(|a| !is_test_marker(a)).collect();
    let budget = options.budget_secs;
    let name = sig.ident.to_string();
    let paused = if options.paused {
        quote! { builder.start_paused(true); }
    } else {
        quote! {}
    };
    let thread_name = syn::LitStr::new(&format!("test:{name}"), Span::call_site());

    TokenStream::from(quote! {
        #[test]
        #(#attrs)*
        #vis #sig {
            let budget = ::std::time::Duration::from_secs(#budget);
            let (done_tx, done_rx) = ::std::sync::mpsc::channel();
            let worker = ::std::thread::Builder::new()
                .name(#thread_name.to_string())
                .spawn(move || {
                    let outcome = ::std::panic::catch_unwind(::std::panic::AssertUnwindSafe(|| {
                        let mut builder = ::tokio::runtime::Builder::new_current_thread();
                        builder.enable_all();
                        #paused
                        let runtime = builder.build().expect("build test runtime");
                        runtime.block_on(async move #block)
                    }));
                    let _ = done_tx.send(outcome);
                })
                .expect("spawn test thread");
            match done_rx.recv_timeout(budget) {
                Ok(Ok(output)) => {
                    let _ = worker.join();
                    output
                }
                Ok(Err(panic)) => ::std::panic::resume_unwind(panic),
                Err(::std::sync::mpsc::RecvTimeoutError::Timeout) => {
                    panic!("{} exceeded its {:?} budget", #name, budget)
                }
                Err(::std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                    panic!("{} exited without reporting", #name)
                }
            }
        }
    })
}

fn is_test_marker(attr: &Attribute) -> bool {
    let path = attr.path();
    path.is_ident("test")
        || (path.segments.len() == 2
            && path.segments[0].ident == "tokio"
            && path.segments[1].ident == "test")
}
