//! C3 linearisation (§4.D), ported from the teacher's
//! `builtins/type.rs::linearise_mro`/`take_next_base`.

use itertools::Itertools;

use crate::type_obj::TypeHandle;

fn take_next_base(bases: &mut [Vec<TypeHandle>]) -> Option<TypeHandle> {
    for base in bases.iter() {
        let head = base[0].clone();
        if !bases
            .iter()
            .any(|x| x[1..].iter().any(|x| x.is_same(&head)))
        {
            for item in bases.iter_mut() {
                if item[0].is_same(&head) {
                    item.remove(0);
                }
            }
            return Some(head);
        }
    }
    None
}

/// Merge the MROs of `bases` (each already linearised) plus the direct
/// `bases` list itself, per C3. Tie-breaks deterministically choose the
/// leftmost candidate whose head appears in no other list's tail.
pub fn linearise_mro(mut bases: Vec<Vec<TypeHandle>>) -> Result<Vec<TypeHandle>, String> {
    // Local precedence ordering: reject an MRO order that would put a
    // direct base after one of its own later siblings' ancestors.
    for (i, base_mro) in bases.iter().enumerate() {
        let base = &base_mro[0];
        for later_mro in &bases[i + 1..] {
            if later_mro[1..].iter().any(|cls| cls.is_same(base)) {
                return Err(
                    "Unable to find mro order which keeps local precedence ordering".to_owned(),
                );
            }
        }
    }

    let mut result = vec![];
    while !bases.is_empty() {
        let head = take_next_base(&mut bases).ok_or_else(|| {
            format!(
                "Cannot create a consistent method resolution order (MRO) for bases {}",
                bases.iter().map(|x| x.first().unwrap().name()).format(", ")
            )
        })?;
        result.push(head);
        bases.retain(|x| !x.is_empty());
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::fresh_object_type;

    #[test]
    fn single_base_collapses() {
        let object = fresh_object_type();
        let result = linearise_mro(vec![vec![object.clone()], vec![object.clone()]]).unwrap();
        assert_eq!(result.len(), 1);
        assert!(result[0].is_same(&object));
    }
}
