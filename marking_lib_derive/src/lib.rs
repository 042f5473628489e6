//! Attributes for actix handlers that need a logged in caller.
//!
//! The handler must take `req: HttpRequest` and `data: web::Data<MarkingCon>`
//! and return an `HttpResponse`. A refused request is answered with the
//! response of the `MarkingError`.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, ItemFn};

/// binds `user: AuthUser`, pending password changes included
#[proc_macro_attribute]
pub fn ensure_user(_attr: TokenStream, item: TokenStream) -> TokenStream {
    ensure_user_impl(item)
}

fn ensure_user_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as ItemFn);

    let ItemFn {
        sig,
        vis,
        block,
        attrs,
    } = input;

    let statements = block.stmts;

    quote!(
        // Reapply all the other attributes on this function.
        #(#attrs)*
        #vis #sig {
            let user = match markingLib::auth::get_user(&req, &data).await {
                Ok(u) => u,
                Err(e) => return actix_web::ResponseError::error_response(&e)
            };

            #(#statements)*
        }
    )
    .into()
}

/// binds `ctx: RequestContext` of a marker that is done with the first login
#[proc_macro_attribute]
pub fn ensure_marker(_attr: TokenStream, item: TokenStream) -> TokenStream {
    ensure_marker_impl(item)
}

fn ensure_marker_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as ItemFn);

    let ItemFn {
        sig,
        vis,
        block,
        attrs,
    } = input;

    let statements = block.stmts;

    quote!(
        #(#attrs)*
        #vis #sig {
            let ctx = match markingLib::auth::require_login(&req, &data).await {
                Ok(c) => c,
                Err(e) => return actix_web::ResponseError::error_response(&e)
            };

            #(#statements)*
        }
    )
    .into()
}

/// like `ensure_marker`, but only for administrators
#[proc_macro_attribute]
pub fn ensure_admin(_attr: TokenStream, item: TokenStream) -> TokenStream {
    ensure_admin_impl(item)
}

fn ensure_admin_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as ItemFn);

    let ItemFn {
        sig,
        vis,
        block,
        attrs,
    } = input;

    let statements = block.stmts;

    quote!(
        #(#attrs)*
        #vis #sig {
            let ctx = match markingLib::auth::require_admin(&req, &data).await {
                Ok(c) => c,
                Err(e) => return actix_web::ResponseError::error_response(&e)
            };

            #(#statements)*
        }
    )
    .into()
}
