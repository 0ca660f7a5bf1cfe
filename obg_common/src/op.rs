//! Operator-forwarding helpers for single-field tuple newtypes.

/// Forwards an operator trait implementation to the wrapped inner value.
///
/// `op!(binary Paise, Add, add)` expands to `impl Add for Paise` that applies `add` to the inner
/// values and re-wraps the result. `inplace` covers the `*Assign` traits and `unary` covers
/// single-operand traits like `Neg`. The trait must be in scope at the call site.
#[macro_export]
macro_rules! op {
    (binary $name:ident, $trait:ident, $method:ident) => {
        impl $trait for $name {
            type Output = Self;

            fn $method(self, rhs: Self) -> Self::Output {
                Self($trait::$method(self.0, rhs.0))
            }
        }
    };
    (inplace $name:ident, $trait:ident, $method:ident) => {
        impl $trait for $name {
            fn $method(&mut self, rhs: Self) {
                $trait::$method(&mut self.0, rhs.0)
            }
        }
    };
    (unary $name:ident, $trait:ident, $method:ident) => {
        impl $trait for $name {
            type Output = Self;

            fn $method(self) -> Self::Output {
                Self($trait::$method(self.0))
            }
        }
    };
}
