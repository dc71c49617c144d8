use proc_macro2::TokenStream;
use quote::quote;
use std::collections::HashSet;
use syn::parse::{Parse, ParseStream};
use syn::{Attribute, Ident, LitStr, Result as SynResult, Token, Type, braced, parenthesized};

/// `impl Target { fn ...; }`
pub(crate) struct MethodTable {
    self_ty: Type,
    methods: Vec<MethodDecl>,
}

/// `[attrs] fn name([params]) -> Output = "remoteName";`
pub(crate) struct MethodDecl {
    attrs: Vec<Attribute>,
    name: Ident,
    takes_params: bool,
    output: Type,
    remote: LitStr,
}

impl Parse for MethodTable {
    fn parse(input: ParseStream) -> SynResult<Self> {
        input.parse::<Token![impl]>()?;
        let self_ty: Type = input.parse()?;

        let content;
        braced!(content in input);

        let mut methods = Vec::new();
        let mut seen = HashSet::new();
        while !content.is_empty() {
            let decl: MethodDecl = content.parse()?;
            if !seen.insert(decl.remote.value()) {
                return Err(syn::Error::new(
                    decl.remote.span(),
                    format!("duplicate remote method '{}'", decl.remote.value()),
                ));
            }
            methods.push(decl);
        }

        if !input.is_empty() {
            return Err(input.error("expected a single `impl Type { ... }` block"));
        }

        Ok(Self { self_ty, methods })
    }
}

impl Parse for MethodDecl {
    fn parse(input: ParseStream) -> SynResult<Self> {
        let attrs = input.call(Attribute::parse_outer)?;
        input.parse::<Token![fn]>()?;
        let name: Ident = input.parse()?;

        let args;
        parenthesized!(args in input);
        let takes_params = if args.is_empty() {
            false
        } else {
            let arg: Ident = args.parse()?;
            if arg != "params" {
                return Err(syn::Error::new(
                    arg.span(),
                    "expected `params` or no argument",
                ));
            }
            if !args.is_empty() {
                return Err(args.error("expected at most one argument"));
            }
            true
        };

        input.parse::<Token![->]>()?;
        let output: Type = input.parse()?;
        input.parse::<Token![=]>()?;
        let remote: LitStr = input.parse()?;
        if remote.value().trim().is_empty() {
            return Err(syn::Error::new(remote.span(), "remote method name is empty"));
        }
        input.parse::<Token![;]>()?;

        Ok(Self {
            attrs,
            name,
            takes_params,
            output,
            remote,
        })
    }
}

impl MethodDecl {
    fn expand(&self) -> TokenStream {
        let MethodDecl {
            attrs,
            name,
            output,
            remote,
            ..
        } = self;

        let ret = quote! {
            impl ::std::future::Future<Output = ::botwire_core::error::BotResult<#output>>
                + ::std::marker::Send
                + 'static
        };

        if self.takes_params {
            quote! {
                #(#attrs)*
                #[track_caller]
                pub fn #name<P: ::serde::Serialize>(&self, params: P) -> #ret {
                    self.call(#remote, params)
                }
            }
        } else {
            quote! {
                #(#attrs)*
                #[track_caller]
                pub fn #name(&self) -> #ret {
                    self.call(#remote, ())
                }
            }
        }
    }
}

pub(crate) fn expand(input: TokenStream) -> SynResult<TokenStream> {
    let table: MethodTable = syn::parse2(input)?;
    let self_ty = &table.self_ty;
    let remotes = table.methods.iter().map(|m| &m.remote);
    let methods = table.methods.iter().map(MethodDecl::expand);

    Ok(quote! {
        impl #self_ty {
            /// 已生成封装的远端方法名（按声明顺序）
            pub const METHODS: &'static [&'static str] = &[#(#remotes),*];

            #(#methods)*
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(src: &str) -> SynResult<MethodTable> {
        syn::parse_str(src)
    }

    #[test]
    fn parses_both_arities_and_keeps_docs() {
        let table = table(
            r#"impl Api {
                /// who am i
                fn get_me() -> User = "getMe";
                fn send_message(params) -> Value = "sendMessage";
            }"#,
        )
        .unwrap();

        assert_eq!(table.methods.len(), 2);
        assert!(!table.methods[0].takes_params);
        assert_eq!(table.methods[0].attrs.len(), 1);
        assert!(table.methods[1].takes_params);
        assert_eq!(table.methods[1].remote.value(), "sendMessage");
    }

    #[test]
    fn rejects_duplicate_remote_names() {
        let err = table(
            r#"impl Api {
                fn a(params) -> bool = "close";
                fn b(params) -> bool = "close";
            }"#,
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("duplicate remote method 'close'"));
    }

    #[test]
    fn rejects_unknown_argument_names() {
        let err = table(r#"impl Api { fn a(body) -> bool = "close"; }"#)
            .err()
            .unwrap();
        assert!(err.to_string().contains("expected `params`"));
    }

    #[test]
    fn rejects_empty_remote_name() {
        assert!(table(r#"impl Api { fn a() -> bool = ""; }"#).is_err());
    }

    #[test]
    fn expansion_forwards_to_call_with_caller_tracking() {
        let out = expand(quote! {
            impl Api {
                fn get_me() -> User = "getMe";
                fn get_updates(params) -> Vec<Update> = "getUpdates";
            }
        })
        .unwrap()
        .to_string();

        assert!(out.contains("pub const METHODS"));
        assert!(out.contains("\"getMe\" , \"getUpdates\""));
        assert!(out.contains("# [track_caller]"));
        assert!(out.contains("self . call (\"getMe\" , ())"));
        assert!(out.contains("self . call (\"getUpdates\" , params)"));
    }
}
