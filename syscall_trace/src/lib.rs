use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{FnArg, GenericArgument, Ident, ItemFn, Pat, PathArguments, ReturnType, Type, parse_macro_input};

/// Which side of the call a traced argument is rendered for.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Phase {
    Enter,
    Leave,
}

/// Wraps a `LinuxResult` returning syscall so that its arguments are logged
/// on entry and its arguments plus result on return, both at `debug` level.
///
/// User pointers are rendered through their `fmt_trace*` helpers: input
/// pointers show their content on entry, output pointers only once the call
/// has filled them in. Byte pointers are rendered as C strings.
#[proc_macro_attribute]
pub fn syscall_trace(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut function = parse_macro_input!(item as ItemFn);
    let signature = &function.sig;
    let fn_name = &signature.ident;
    let ret_type = match &signature.output {
        ReturnType::Type(_, ty) => quote! { #ty },
        ReturnType::Default => quote! { () },
    };

    let fn_args: Vec<(&Ident, &Type)> = signature
        .inputs
        .iter()
        .filter_map(|arg| match arg {
            FnArg::Typed(pat_type) => match &*pat_type.pat {
                Pat::Ident(pat_ident) => Some((&pat_ident.ident, &*pat_type.ty)),
                _ => None,
            },
            FnArg::Receiver(_) => None,
        })
        .collect();

    let trace_in: Vec<_> = fn_args
        .iter()
        .map(|(name, ty)| trace_arg(name, ty, Phase::Enter))
        .collect();
    let trace_out: Vec<_> = fn_args
        .iter()
        .map(|(name, ty)| trace_arg(name, ty, Phase::Leave))
        .collect();

    let arg_list_pattern = fn_args
        .iter()
        .map(|(name, _)| format!("{} = {{}}", name))
        .collect::<Vec<_>>()
        .join(", ");
    let format_pattern_in = format!("[syscall] <= {}({})", fn_name, arg_list_pattern);
    let format_pattern_out = format!("[syscall] => {}({}) = {{}}", fn_name, arg_list_pattern);

    let fn_body = &function.block;
    let wrapped = quote! {{
        debug!(#format_pattern_in #(, #trace_in)*);

        let __result = (|| -> #ret_type { #fn_body })();

        let __rendered = match __result {
            Ok(ref value) => alloc::format!("{:?}", value),
            Err(ref error) => alloc::format!("{:?}", error),
        };
        debug!(#format_pattern_out #(, #trace_out)*, __rendered);
        __result
    }};
    function.block = match syn::parse2(wrapped) {
        Ok(block) => block,
        Err(err) => return err.to_compile_error().into(),
    };
    quote! { #function }.into()
}

fn trace_arg(name: &Ident, ty: &Type, phase: Phase) -> TokenStream2 {
    let Type::Path(type_path) = ty else {
        return quote! { #name };
    };
    let Some(outer) = type_path.path.segments.last() else {
        return quote! { #name };
    };
    let kind = outer.ident.to_string();
    let readable = match kind.as_str() {
        "UserConstPtr" | "UserInPtr" => true,
        "UserPtr" | "UserOutPtr" | "UserInOutPtr" => phase == Phase::Leave,
        _ => return quote! { #name },
    };
    if !readable {
        return quote! { #name.fmt_trace() };
    }
    if inner_is_byte(&outer.arguments) {
        quote! { #name.fmt_trace_as_str() }
    } else {
        quote! { #name.fmt_trace_content() }
    }
}

fn inner_is_byte(arguments: &PathArguments) -> bool {
    let PathArguments::AngleBracketed(args) = arguments else {
        return false;
    };
    match args.args.first() {
        Some(GenericArgument::Type(Type::Path(inner))) => inner
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "u8" || segment.ident == "c_char"),
        _ => false,
    }
}
