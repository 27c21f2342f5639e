//! Convenience macros.

/// Generates the `u32`/`usize` conversions required to use a newtype
/// as a typed index (`TiVec`, `TiMap`).
///
/// # Example
///
/// ```rust
/// pub struct Var(u32);
/// impl_idx_from!(Var(u32));
/// ```
#[macro_export]
macro_rules! impl_idx_from {
    ($ty:ident($raw: ident)) => {
        impl From<$raw> for $ty {
            #[inline(always)]
            fn from(it: $raw) -> $ty {
                $ty(it)
            }
        }

        impl From<$ty> for $raw {
            #[inline(always)]
            fn from(it: $ty) -> $raw {
                it.0
            }
        }

        impl From<usize> for $ty {
            #[inline(always)]
            fn from(it: usize) -> $ty {
                ::std::debug_assert!(it < $raw::MAX as usize);
                $ty(it as $raw)
            }
        }

        impl From<$ty> for usize {
            #[inline(always)]
            fn from(it: $ty) -> usize {
                it.0 as usize
            }
        }
    };
}

/// Generates a Display implementation
///
/// # Example
///
/// ```rust
/// impl_display! {
///     match Test{
///         Test::Bar(i) => "bar {}", i;
///         Test::Foo => "foo";
///     }
/// }
/// ```
#[macro_export]
macro_rules! impl_display {
    ( $($args: tt)*) => {
        $crate::impl_fmt!(Display $($args)*);
    };
}

/// Generates an implementation of the specified fmt Trait
///
/// # Example
///
/// ```rust
/// impl_fmt! {
///     Display match Test{
///         Test::Bar(i) => "bar {}", i;
///         Test::Foo => "foo";
///     }
/// }
/// ```
#[macro_export]
macro_rules! impl_fmt {
    (  $trait:ident  match $ty: ident{ $($variant: pat => $fmt:literal $(, $fmt_arg: expr)*;)*}) => {
        impl std::fmt::$trait for $ty{
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self{
                    $( $variant => write!(f, $fmt $(,$fmt_arg)*)),*
                }
            }
        }
    };


    (  $trait:ident $binding: ident @ $ty: ident => $fmt:literal $(, $fmt_arg: expr)*) => {
        impl std::fmt::$trait for $ty{
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let $binding = self;
                write!(f, $fmt $(,$fmt_arg)*)
            }
        }
    };
}
