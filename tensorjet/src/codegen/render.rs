//! Renders a `TranslationUnit` into a `TokenStream`.
//!
//! Together with `value_expr` this is the only codegen code that depends on
//! proc_macro2/quote.

use proc_macro2::{Ident, Span, TokenStream};
use quote::quote;

use super::plan::*;
use super::types::ResolvedType;
use super::value_expr::{elem_ty, ident, index, internal, literal, matrix_params, read, ty};
use super::CompileOptions;

pub fn render(unit: &TranslationUnit, options: &CompileOptions) -> TokenStream {
    let unit_ident = Ident::new(&options.unit_name, Span::call_site());
    let method_ident = Ident::new(&options.method_name, Span::call_site());

    let constants = render_constants(unit);
    let fields = render_fields(unit);

    let params: Vec<TokenStream> = unit
        .arguments
        .iter()
        .map(|arg| {
            let name = ident(arg);
            let arg_ty = ty(&arg.ty);
            quote!(#name: #arg_ty)
        })
        .collect();

    let body: Vec<TokenStream> = unit.fragments.iter().map(render_fragment).collect();

    let return_types = unit.returns.iter().map(|b| ty(&b.ty));
    let return_values = unit.returns.iter().map(read);

    let (class_attr, bindings) = if options.python_bindings {
        (
            quote!(#[pyclass(unsendable)]),
            render_python_bindings(unit, options),
        )
    } else {
        (quote! {}, quote! {})
    };

    quote! {
        //! Generated by tensorjet.

        #![allow(non_upper_case_globals, non_snake_case, unused_variables, unused_parens, clippy::all)]

        #(#constants)*

        #class_attr
        #[derive(Debug, Clone, Default)]
        pub struct #unit_ident {
            #(#fields)*
        }

        impl #unit_ident {
            pub fn new() -> Self {
                Self::default()
            }

            pub fn #method_ident(&mut self, #(#params),*) -> (#(#return_types,)*) {
                #(#body)*

                (#(#return_values,)*)
            }
        }

        #bindings
    }
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

fn render_constants(unit: &TranslationUnit) -> Vec<TokenStream> {
    unit.constants
        .iter()
        .map(|decl| {
            let name = ident(&decl.binding);
            let const_ty = ty(&decl.binding.ty);
            let value = literal(&decl.value, &decl.binding.ty);
            quote! {
                const #name: #const_ty = #value;
            }
        })
        .collect()
}

fn render_fields(unit: &TranslationUnit) -> Vec<TokenStream> {
    unit.state
        .iter()
        .map(|field| {
            let name = ident(field);
            let field_ty = ty(&field.ty);
            quote!(#name: #field_ty,)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Method body
// ---------------------------------------------------------------------------

fn render_fragment(fragment: &CompiledFragment) -> TokenStream {
    let expr = render_statement(&fragment.statement);
    match &fragment.binds {
        Some(binding) => {
            let name = ident(binding);
            let local_ty = ty(&binding.ty);
            quote! { let #name: #local_ty = #expr; }
        }
        None => quote! { #expr; },
    }
}

fn render_statement(statement: &Statement) -> TokenStream {
    match statement {
        Statement::Binary { op, lhs, rhs, form } => {
            let op = binary_op(*op);
            let (a, b) = (read(lhs), read(rhs));
            let (l, r) = (internal("l"), internal("r"));
            match form {
                ElementwiseForm::Scalar => quote!(#a #op #b),
                ElementwiseForm::Zip => quote!(#a.zip_map(&#b, |#l, #r| #l #op #r)),
                ElementwiseForm::MapLhs => quote!(#a.map(|#l| #l #op #b)),
                ElementwiseForm::MapRhs => quote!(#b.map(|#r| #a #op #r)),
            }
        }

        Statement::Negate { operand } => {
            let a = read(operand);
            quote!(-#a)
        }

        Statement::Pow {
            base,
            exponent,
            form,
        } => {
            let float = base.ty.elem().is_float();
            let (a, b) = (read(base), read(exponent));
            let (l, r) = (internal("l"), internal("r"));
            // A negative int32 exponent has no int32 result; it panics like overflow does.
            let pow = |x: TokenStream, y: TokenStream| {
                if float {
                    quote!(#x.powf(#y))
                } else {
                    quote! {
                        #x.pow(
                            <u32 as ::core::convert::TryFrom<i32>>::try_from(#y)
                                .expect("negative int32 exponent"),
                        )
                    }
                }
            };
            match form {
                ElementwiseForm::Scalar => pow(a, b),
                ElementwiseForm::Zip => {
                    let each = pow(quote!(#l), quote!(#r));
                    quote!(#a.zip_map(&#b, |#l, #r| #each))
                }
                ElementwiseForm::MapLhs => {
                    let each = pow(quote!(#l), b);
                    quote!(#a.map(|#l| #each))
                }
                ElementwiseForm::MapRhs => {
                    let each = pow(a, quote!(#r));
                    quote!(#b.map(|#r| #each))
                }
            }
        }

        Statement::Assign { target, value } => {
            let (t, v) = (read(target), read(value));
            quote!(#t = #v)
        }

        Statement::Alias { source } => read(source),

        // Row-major element order is kept: transposing the column-major
        // source yields its elements row by row.
        Statement::Reshape { source, to } => {
            let a = read(source);
            let (elem, r, c) = matrix_params(to);
            match (source.ty.is_scalar(), to.is_scalar()) {
                (true, true) => a,
                (false, true) => quote!(#a[0]),
                (true, false) => quote!(::nalgebra::SMatrix::<#elem, #r, #c>::from_element(#a)),
                (false, false) => quote! {
                    ::nalgebra::SMatrix::<#elem, #r, #c>::from_row_slice(#a.transpose().as_slice())
                },
            }
        }

        Statement::Slice { source, form, .. } => {
            let a = read(source);
            match form {
                SliceForm::Alias => a,
                SliceForm::Index(at) => match at.as_slice() {
                    [i] => {
                        let i = index(*i);
                        quote!(#a[#i])
                    }
                    _ => {
                        let at = at.iter().map(|i| index(*i));
                        quote!(#a[(#(#at),*)])
                    }
                },
                SliceForm::Rows { start, len } => {
                    let (start, len) = (index(*start), index(*len));
                    quote!(#a.fixed_rows::<#len>(#start).into_owned())
                }
                SliceForm::View { start, size } => {
                    let (r, c) = (index(start.0), index(start.1));
                    let (nr, nc) = (index(size.0), index(size.1));
                    quote!(#a.fixed_view::<#nr, #nc>(#r, #c).into_owned())
                }
            }
        }
    }
}

fn binary_op(op: BinaryOp) -> TokenStream {
    match op {
        BinaryOp::Add => quote!(+),
        BinaryOp::Sub => quote!(-),
        BinaryOp::Mul => quote!(*),
        BinaryOp::Div => quote!(/),
    }
}

// ---------------------------------------------------------------------------
// Python bindings
// ---------------------------------------------------------------------------

/// pyo3 class + module export. Arrays cross the boundary as flat row-major
/// `Vec`s and are checked against their static extents on the way in.
fn render_python_bindings(unit: &TranslationUnit, options: &CompileOptions) -> TokenStream {
    let unit_ident = Ident::new(&options.unit_name, Span::call_site());
    let method_ident = Ident::new(&options.method_name, Span::call_site());
    let method_name = &options.method_name;
    let module_name = &options.module_name;

    let from_rows = internal("from_rows");
    let py_new = internal("py_new");
    let py_run = internal("py_run");
    let module_fn = internal("module");
    // Plain parameter names could collide with module constants.
    let values = internal("values");
    let module_arg = internal("m");

    let mut params = Vec::new();
    let mut conversions = Vec::new();
    let mut call_args = Vec::new();
    for arg in &unit.arguments {
        let name = ident(arg);
        params.push(match &arg.ty {
            ResolvedType::Scalar(_) => {
                let arg_ty = ty(&arg.ty);
                quote!(#name: #arg_ty)
            }
            ResolvedType::Array(elem, _) => {
                let elem = elem_ty(*elem);
                quote!(#name: Vec<#elem>)
            }
        });
        if !arg.ty.is_scalar() {
            let (elem, r, c) = matrix_params(&arg.ty);
            conversions.push(quote! {
                let #name = #from_rows::<#elem, #r, #c>(&#name)?;
            });
        }
        call_args.push(name);
    }

    let mut results = Vec::new();
    let mut py_types = Vec::new();
    let mut py_values = Vec::new();
    for (i, ret) in unit.returns.iter().enumerate() {
        let tmp = internal(&format!("r{i}"));
        match &ret.ty {
            ResolvedType::Scalar(_) => {
                py_types.push(ty(&ret.ty));
                py_values.push(quote!(#tmp));
            }
            ResolvedType::Array(elem, _) => {
                let elem = elem_ty(*elem);
                py_types.push(quote!(Vec<#elem>));
                py_values.push(quote!(#tmp.transpose().iter().copied().collect::<Vec<#elem>>()));
            }
        }
        results.push(tmp);
    }

    quote! {
        use pyo3::prelude::*;

        fn #from_rows<T: ::nalgebra::Scalar + Copy, const R: usize, const C: usize>(
            #values: &[T],
        ) -> PyResult<::nalgebra::SMatrix<T, R, C>> {
            if #values.len() != R * C {
                return Err(::pyo3::exceptions::PyValueError::new_err(format!(
                    "expected {} values, got {}",
                    R * C,
                    #values.len()
                )));
            }
            Ok(::nalgebra::SMatrix::<T, R, C>::from_row_slice(#values))
        }

        #[pymethods]
        impl #unit_ident {
            #[new]
            fn #py_new() -> Self {
                Self::new()
            }

            #[pyo3(name = #method_name)]
            fn #py_run(&mut self, #(#params),*) -> PyResult<(#(#py_types,)*)> {
                #(#conversions)*
                let (#(#results,)*) = self.#method_ident(#(#call_args),*);
                Ok((#(#py_values,)*))
            }
        }

        #[pymodule]
        #[pyo3(name = #module_name)]
        fn #module_fn(#module_arg: &Bound<'_, PyModule>) -> PyResult<()> {
            #module_arg.add_class::<#unit_ident>()?;
            Ok(())
        }
    }
}
