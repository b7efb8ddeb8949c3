use super::Type;
use crate::index::IndexPattern;

/// Index patterns of every position under `types` that may carry a pending
/// future or stream.
///
/// List and stream elements become wildcards. A receiver registers these
/// before reading so that data for undeclared indices can be rejected.
pub fn async_paths(types: &[Type]) -> Vec<IndexPattern> {
    let mut out = Vec::new();
    let mut prefix = Vec::new();
    for (i, ty) in types.iter().enumerate() {
        prefix.push(Some(i as u32));
        collect(ty, &mut prefix, &mut out);
        prefix.pop();
    }
    out.sort();
    out.dedup();
    out
}

fn collect(ty: &Type, prefix: &mut IndexPattern, out: &mut Vec<IndexPattern>) {
    match ty {
        Type::Future(inner) => {
            out.push(prefix.clone());
            nested(inner, Some(0), prefix, out);
        }
        Type::Stream(elem) => {
            out.push(prefix.clone());
            nested(elem, None, prefix, out);
        }
        Type::List(elem) => nested(elem, None, prefix, out),
        Type::Option(inner) => nested(inner, Some(1), prefix, out),
        Type::Record(fields) => {
            for (j, (_, t)) in fields.iter().enumerate() {
                nested(t, Some(j as u32), prefix, out);
            }
        }
        Type::Tuple(types) => {
            for (j, t) in types.iter().enumerate() {
                nested(t, Some(j as u32), prefix, out);
            }
        }
        Type::Variant(arms) => {
            for (a, (_, t)) in arms.iter().enumerate() {
                if let Some(t) = t {
                    nested(t, Some(a as u32), prefix, out);
                }
            }
        }
        Type::Result { ok, err } => {
            if let Some(t) = ok {
                nested(t, Some(0), prefix, out);
            }
            if let Some(t) = err {
                nested(t, Some(1), prefix, out);
            }
        }
        _ => {}
    }
}

fn nested(ty: &Type, component: Option<u32>, prefix: &mut IndexPattern, out: &mut Vec<IndexPattern>) {
    if !ty.is_async() {
        return;
    }
    prefix.push(component);
    collect(ty, prefix, out);
    prefix.pop();
}
