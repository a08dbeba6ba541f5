//! Operand unification for binary operators.
//!
//! Each operator class has a unifier that maps the (unboxed) operand types
//! to the single type both operands are coerced to before the operator
//! member is looked up. A unifier either yields that type or fails; there
//! is no partial result.

use crate::ty::{Prim, Ty};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Unifier {
    /// `+ - * / %`; `+` with a `String` operand concatenates.
    Additive,
    /// Shifts and `& | ^`.
    Bitwise,
    /// `< <= > >=`.
    Comparator,
    /// `== !=`.
    Equator,
}

impl Unifier {
    pub fn unify(self, left: &Ty, right: &Ty) -> Option<Ty> {
        match self {
            Unifier::Additive => {
                if left.is_string() || right.is_string() {
                    return Some(Ty::string());
                }
                numeric(left, right)
            }
            Unifier::Comparator => numeric(left, right),
            Unifier::Bitwise => match (left.as_prim()?, right.as_prim()?) {
                (Prim::Bool, Prim::Bool) => Some(Ty::bool()),
                (a, b) => integral(a, b),
            },
            Unifier::Equator => {
                if let (Some(a), Some(b)) = (left.as_prim(), right.as_prim()) {
                    return if a == Prim::Bool && b == Prim::Bool {
                        Some(Ty::bool())
                    } else {
                        numeric(left, right)
                    };
                }
                if left.is_reference() && right.is_reference() {
                    return Some(if left == right { left.clone() } else { Ty::Object });
                }
                None
            }
        }
    }
}

/// Common type of two numeric primitives: floating types dominate, integral
/// types widen by rank and never below `int`.
fn numeric(left: &Ty, right: &Ty) -> Option<Ty> {
    let (a, b) = (left.as_prim()?, right.as_prim()?);
    if !a.is_numeric() || !b.is_numeric() {
        return None;
    }
    if a == Prim::Double || b == Prim::Double {
        return Some(Ty::double());
    }
    if a == Prim::Float || b == Prim::Float {
        return Some(Ty::float());
    }
    integral(a, b)
}

fn integral(a: Prim, b: Prim) -> Option<Ty> {
    let rank = a.integral_rank()?.max(b.integral_rank()?);
    Some(if rank > Prim::Int.integral_rank()? { Ty::long() } else { Ty::int() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn additive_widens_to_larger_operand() {
        let u = Unifier::Additive;
        assert_eq!(u.unify(&Ty::int(), &Ty::long()), Some(Ty::long()));
        assert_eq!(u.unify(&Ty::long(), &Ty::double()), Some(Ty::double()));
        assert_eq!(u.unify(&Ty::int(), &Ty::int()), Some(Ty::int()));
        assert_eq!(u.unify(&Ty::Prim(Prim::Byte), &Ty::Prim(Prim::Short)), Some(Ty::int()));
        assert_eq!(u.unify(&Ty::float(), &Ty::long()), Some(Ty::float()));
    }

    #[test]
    fn strings_only_add_and_compare_for_equality() {
        assert_eq!(Unifier::Additive.unify(&Ty::string(), &Ty::int()), Some(Ty::string()));
        assert_eq!(Unifier::Comparator.unify(&Ty::string(), &Ty::string()), None);
        assert_eq!(Unifier::Bitwise.unify(&Ty::string(), &Ty::string()), None);
        assert_eq!(Unifier::Equator.unify(&Ty::string(), &Ty::string()), Some(Ty::string()));
        assert_eq!(Unifier::Equator.unify(&Ty::string(), &Ty::Object), Some(Ty::Object));
    }

    #[test]
    fn booleans_never_mix_with_numbers() {
        assert_eq!(Unifier::Additive.unify(&Ty::bool(), &Ty::int()), None);
        assert_eq!(Unifier::Equator.unify(&Ty::bool(), &Ty::int()), None);
        assert_eq!(Unifier::Equator.unify(&Ty::bool(), &Ty::bool()), Some(Ty::bool()));
        assert_eq!(Unifier::Bitwise.unify(&Ty::bool(), &Ty::bool()), Some(Ty::bool()));
        assert_eq!(Unifier::Bitwise.unify(&Ty::int(), &Ty::double()), None);
        assert_eq!(Unifier::Bitwise.unify(&Ty::int(), &Ty::long()), Some(Ty::long()));
    }
}
