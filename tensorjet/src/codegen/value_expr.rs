use crate::ir::{ElemType, TensorData, TensorValue};
use proc_macro2::{Ident, Literal, Span, TokenStream};
use quote::quote;

use super::ident::RESERVED_PREFIX;
use super::plan::{Binding, BindingKind};
use super::types::ResolvedType;

/// Identifier for a binding: the sanitized node name.
pub fn ident(binding: &Binding) -> Ident {
    Ident::new(&binding.ident, Span::call_site())
}

/// Fixed internal identifier, always under the reserved prefix.
pub fn internal(name: &str) -> Ident {
    Ident::new(&format!("{RESERVED_PREFIX}{name}"), Span::call_site())
}

/// Read expression for a binding inside the generated method.
///
/// - State → `self.v` (fields are `Copy`, so every read is by value)
/// - Argument, constant, local → `v`
pub fn read(binding: &Binding) -> TokenStream {
    let ident = ident(binding);
    match binding.kind {
        BindingKind::State => quote!(self.#ident),
        BindingKind::Argument | BindingKind::Constant | BindingKind::Local => quote!(#ident),
    }
}

/// Index or extent literal without the `usize` suffix `quote` would add.
pub fn index(n: usize) -> Literal {
    Literal::usize_unsuffixed(n)
}

pub fn elem_ty(elem: ElemType) -> TokenStream {
    match elem {
        ElemType::F32 => quote!(f32),
        ElemType::F64 => quote!(f64),
        ElemType::I32 => quote!(i32),
    }
}

/// Target type for a resolved type: a primitive, `SVector` or `SMatrix`.
pub fn ty(resolved: &ResolvedType) -> TokenStream {
    let elem = elem_ty(resolved.elem());
    match resolved.dims() {
        [] => elem,
        [n] => {
            let n = index(*n);
            quote!(::nalgebra::SVector<#elem, #n>)
        }
        _ => {
            let (r, c) = resolved.matrix_dims();
            let (r, c) = (index(r), index(c));
            quote!(::nalgebra::SMatrix<#elem, #r, #c>)
        }
    }
}

/// Element type and `(rows, cols)` of an array type as literals, for turbofish use.
pub fn matrix_params(resolved: &ResolvedType) -> (TokenStream, Literal, Literal) {
    let (r, c) = resolved.matrix_dims();
    (elem_ty(resolved.elem()), index(r), index(c))
}

/// Constant expression for `value` typed as `resolved`.
///
/// Arrays go through `ArrayStorage`, which is column-major; the payload is
/// row-major.
pub fn literal(value: &TensorValue, resolved: &ResolvedType) -> TokenStream {
    let elems = element_literals(&value.data);
    if resolved.is_scalar() {
        return elems.into_iter().next().unwrap_or_else(|| quote!(0));
    }

    let (elem, r_lit, c_lit) = matrix_params(resolved);
    let (rows, cols) = resolved.matrix_dims();
    let columns = (0..cols).map(|c| {
        let column = (0..rows).map(|r| &elems[r * cols + c]);
        quote!([#(#column),*])
    });
    quote! {
        ::nalgebra::SMatrix::<#elem, #r_lit, #c_lit>::from_array_storage(
            ::nalgebra::ArrayStorage([#(#columns),*])
        )
    }
}

fn element_literals(data: &TensorData) -> Vec<TokenStream> {
    match data {
        TensorData::F32(values) => values.iter().map(|v| f32_literal(*v)).collect(),
        TensorData::F64(values) => values.iter().map(|v| f64_literal(*v)).collect(),
        TensorData::I32(values) => values.iter().map(|v| i32_literal(*v)).collect(),
    }
}

fn f32_literal(v: f32) -> TokenStream {
    if v.is_nan() {
        quote!(f32::NAN)
    } else if v.is_infinite() {
        if v > 0.0 {
            quote!(f32::INFINITY)
        } else {
            quote!(f32::NEG_INFINITY)
        }
    } else {
        signed(v.is_sign_negative(), Literal::f32_unsuffixed(v.abs()))
    }
}

fn f64_literal(v: f64) -> TokenStream {
    if v.is_nan() {
        quote!(f64::NAN)
    } else if v.is_infinite() {
        if v > 0.0 {
            quote!(f64::INFINITY)
        } else {
            quote!(f64::NEG_INFINITY)
        }
    } else {
        signed(v.is_sign_negative(), Literal::f64_unsuffixed(v.abs()))
    }
}

fn i32_literal(v: i32) -> TokenStream {
    signed(v < 0, Literal::u32_unsuffixed(v.unsigned_abs()))
}

fn signed(negative: bool, magnitude: Literal) -> TokenStream {
    if negative {
        quote!(-#magnitude)
    } else {
        quote!(#magnitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(tokens: TokenStream) -> String {
        tokens.to_string().replace(' ', "")
    }

    fn binding(ident: &str, kind: BindingKind) -> Binding {
        Binding {
            node: ident.into(),
            ident: ident.into(),
            ty: ResolvedType::Scalar(ElemType::F32),
            kind,
        }
    }

    #[test]
    fn state_reads_go_through_self() {
        assert_eq!(text(read(&binding("v", BindingKind::State))), "self.v");
        assert_eq!(text(read(&binding("x", BindingKind::Argument))), "x");
        assert_eq!(text(read(&binding("c", BindingKind::Constant))), "c");
    }

    #[test]
    fn types_by_rank() {
        assert_eq!(text(ty(&ResolvedType::Scalar(ElemType::I32))), "i32");
        assert_eq!(
            text(ty(&ResolvedType::Array(ElemType::F32, vec![3]))),
            "::nalgebra::SVector<f32,3>"
        );
        assert_eq!(
            text(ty(&ResolvedType::Array(ElemType::F64, vec![2, 4]))),
            "::nalgebra::SMatrix<f64,2,4>"
        );
    }

    #[test]
    fn matrix_literal_is_column_major() {
        let value = TensorValue::f32s(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let lit = text(literal(&value, &ResolvedType::Array(ElemType::F32, vec![2, 3])));
        assert!(lit.contains("[[1.0,4.0],[2.0,5.0],[3.0,6.0]]"), "got: {lit}");
        assert!(lit.starts_with("::nalgebra::SMatrix::<f32,2,3>::from_array_storage"));
    }

    #[test]
    fn scalar_literals_keep_sign_and_specials() {
        let scalar = ResolvedType::Scalar(ElemType::F32);
        assert_eq!(text(literal(&TensorValue::scalar_f32(-2.5), &scalar)), "-2.5");
        assert_eq!(text(literal(&TensorValue::scalar_f32(f32::NAN), &scalar)), "f32::NAN");
        assert_eq!(
            text(literal(&TensorValue::scalar_f32(f32::NEG_INFINITY), &scalar)),
            "f32::NEG_INFINITY"
        );

        let int = ResolvedType::Scalar(ElemType::I32);
        let min = TensorValue::i32s(vec![], vec![i32::MIN]).unwrap();
        assert_eq!(text(literal(&min, &int)), "-2147483648");
    }
}
