//! Procedural macros for prompt functions.
//!
//! `#[prompt(id = "...")]` turns a function whose doc comment holds a template
//! into a call through the process-wide resolver: the doc comment becomes the
//! inline default and every parameter becomes a named value.

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::{ToTokens, quote};
use syn::meta::ParseNestedMeta;
use syn::{
    Expr, ExprLit, FnArg, ItemFn, Lit, LitStr, Meta, Pat, ReturnType, parse_macro_input,
    parse_quote,
};

/// Resolves a prompt through the process-wide resolver, using the function's
/// doc comment as the inline default template.
///
/// The annotated function's body is replaced. Each parameter is converted
/// with `TemplateValue::from` and passed under its own name. Without an
/// explicit return type the function returns `ResolveResult<String>`.
///
/// Arguments:
///
/// - `id = "..."` (required): the prompt id looked up in the lockfile.
/// - `runtime = "path"` (optional): path of the runtime crate, defaults to
///   `::prompt_runtime`. Use `promptkit::runtime` through the facade crate.
///
/// ```ignore
/// #[prompt(id = "greeting")]
/// /// Hello {name}, you have {count} new messages.
/// fn greeting(name: &str, count: u32) {}
///
/// assert_eq!(greeting("Bo", 3)?, "Hello Bo, you have 3 new messages.");
/// ```
#[proc_macro_attribute]
pub fn prompt(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut args = PromptArgs::default();
    let parser = syn::meta::parser(|meta| args.parse(&meta));
    parse_macro_input!(attr with parser);
    let function = parse_macro_input!(item as ItemFn);

    expand(args, function)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

#[derive(Default)]
struct PromptArgs {
    id: Option<LitStr>,
    runtime: Option<syn::Path>,
}

impl PromptArgs {
    fn parse(&mut self, meta: &ParseNestedMeta<'_>) -> syn::Result<()> {
        if meta.path.is_ident("id") {
            let id: LitStr = meta.value()?.parse()?;
            if id.value().is_empty() {
                return Err(syn::Error::new(id.span(), "prompt id must not be empty"));
            }
            self.id = Some(id);
            Ok(())
        } else if meta.path.is_ident("runtime") {
            let path: LitStr = meta.value()?.parse()?;
            self.runtime = Some(path.parse()?);
            Ok(())
        } else {
            Err(meta.error("unsupported #[prompt] argument, expected `id` or `runtime`"))
        }
    }
}

fn expand(args: PromptArgs, mut function: ItemFn) -> syn::Result<proc_macro2::TokenStream> {
    let id = args.id.ok_or_else(|| {
        syn::Error::new(Span::call_site(), "#[prompt] requires `id = \"...\"`")
    })?;
    let runtime = args
        .runtime
        .unwrap_or_else(|| parse_quote!(::prompt_runtime));

    if let Some(asyncness) = &function.sig.asyncness {
        return Err(syn::Error::new_spanned(
            asyncness,
            "#[prompt] functions must be synchronous",
        ));
    }

    let doc_lines: Vec<String> = function
        .attrs
        .iter()
        .filter_map(|attr| match &attr.meta {
            Meta::NameValue(nv) if nv.path.is_ident("doc") => match &nv.value {
                Expr::Lit(ExprLit {
                    lit: Lit::Str(text),
                    ..
                }) => Some(text.value()),
                _ => None,
            },
            _ => None,
        })
        .collect();
    let template = clean_doc(&doc_lines);
    if template.is_empty() {
        return Err(syn::Error::new_spanned(
            &function.sig.ident,
            "#[prompt] functions need a doc comment holding the default template",
        ));
    }

    let mut names = Vec::new();
    let mut idents = Vec::new();
    for input in &function.sig.inputs {
        match input {
            FnArg::Receiver(receiver) => {
                return Err(syn::Error::new_spanned(
                    receiver,
                    "#[prompt] cannot be applied to methods taking `self`",
                ));
            }
            FnArg::Typed(typed) => match typed.pat.as_ref() {
                Pat::Ident(pat) => {
                    let ident = pat.ident.clone();
                    names.push(ident.to_string().trim_start_matches("r#").to_owned());
                    idents.push(ident);
                }
                other => {
                    return Err(syn::Error::new_spanned(
                        other.to_token_stream(),
                        "#[prompt] parameters must be plain identifiers",
                    ));
                }
            },
        }
    }

    if matches!(function.sig.output, ReturnType::Default) {
        function.sig.output =
            parse_quote!(-> #runtime::ResolveResult<::std::string::String>);
    }

    function.block = parse_quote!({
        let vars: #runtime::TemplateVars = [
            #((::std::string::String::from(#names), #runtime::TemplateValue::from(#idents)),)*
        ]
        .into_iter()
        .collect();
        #runtime::global::p(#id, ::std::option::Option::Some(#template), &vars)
    });

    Ok(quote!(#function))
}

/// Joins doc comment lines, strips their common indentation, and drops
/// leading and trailing blank lines.
fn clean_doc(lines: &[String]) -> String {
    let lines: Vec<&str> = lines
        .iter()
        .flat_map(|line| line.split('\n'))
        .map(str::trim_end)
        .collect();

    let indent = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    let dedented: Vec<&str> = lines
        .iter()
        .map(|line| line.get(indent..).unwrap_or_else(|| line.trim_start()))
        .collect();

    let start = dedented.iter().position(|line| !line.is_empty());
    let end = dedented.iter().rposition(|line| !line.is_empty());
    match (start, end) {
        (Some(start), Some(end)) => dedented[start..=end].join("\n"),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::clean_doc;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|line| (*line).to_owned()).collect()
    }

    #[test]
    fn strips_common_indent_and_blank_edges() {
        let doc = lines(&["", " Hello {name},", "   indented {x}", " bye", ""]);
        assert_eq!(clean_doc(&doc), "Hello {name},\n  indented {x}\nbye");
    }

    #[test]
    fn keeps_inner_blank_lines() {
        let doc = lines(&[" first", "", " second"]);
        assert_eq!(clean_doc(&doc), "first\n\nsecond");
    }

    #[test]
    fn block_doc_comments_are_split() {
        let doc = lines(&["\n    Summarise {text}\n    in {n} words.\n"]);
        assert_eq!(clean_doc(&doc), "Summarise {text}\nin {n} words.");
    }

    #[test]
    fn blank_lines_inside_block_docs_survive() {
        let doc = lines(&["\r\n    Intro.\r\n\r\n    Body {x}.\r\n"]);
        assert_eq!(clean_doc(&doc), "Intro.\n\nBody {x}.");
    }

    #[test]
    fn empty_doc_is_empty() {
        assert_eq!(clean_doc(&lines(&["   ", ""])), "");
    }
}
