//! Support for converting between Rust types and bitwise representations,
//! including registers with packed bitfields.
//!
//! This module reduces the boilerplate of interacting with packed 32-bit
//! registers without requiring a compiler plugin or a code generator: the
//! register map in [`crate::regs`] is hand-declared, but the bit-level
//! get/set boilerplate for each field is produced by the macros below.

/// Error type indicating that some bits read from the hardware weren't valid
/// for the expected type. Usually a driver bug; can also indicate
/// misbehaving hardware.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BadBits(pub u32);

/// Result type for [`BadBits`].
pub type BitsResult<T> = Result<T, BadBits>;

/// Construct `Self` from a small bitwise representation, without assuming
/// that every possible bit pattern can be represented.
pub trait FromBits: Sized {
    /// Constructs `Self` from `bits`. If `bits` is out of range, returns
    /// `BadBits`.
    fn from_bits(bits: u32) -> BitsResult<Self>;
}

impl FromBits for bool {
    fn from_bits(bits: u32) -> BitsResult<Self> {
        match bits {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(BadBits(bits)),
        }
    }
}

/// Construct `Self` from a small bitwise representation, assuming every bit
/// pattern that can appear in the field is valid (used for plain integer
/// fields, where "invalid" is not a concept).
pub trait FromBitsTotal {
    fn from_bits_total(bits: u32) -> Self;
}

impl FromBitsTotal for bool {
    fn from_bits_total(bits: u32) -> Self {
        bits != 0
    }
}

impl FromBitsTotal for u8 {
    fn from_bits_total(bits: u32) -> Self {
        bits as u8
    }
}

impl FromBitsTotal for u32 {
    fn from_bits_total(bits: u32) -> Self {
        bits
    }
}

/// Converts `self` into a small bitwise representation. Should not panic.
pub trait IntoBits {
    fn into_bits(self) -> u32;
}

impl IntoBits for bool {
    fn into_bits(self) -> u32 {
        self as u32
    }
}

impl IntoBits for u8 {
    fn into_bits(self) -> u32 {
        self as u32
    }
}

impl IntoBits for u32 {
    fn into_bits(self) -> u32 {
        self
    }
}

/// Associates a wrapped bits type (the typesafe contents of a packed
/// register) with its underlying raw type and a constructor from that type.
pub trait BitsWrapper {
    type Raw;
    fn from_raw(v: Self::Raw) -> Self;
}

/// Given a value `v`, extracts bits `hi` through `lo` (inclusive).
#[inline(always)]
pub const fn bitfield_extract(v: u32, hi: u32, lo: u32) -> u32 {
    let width = hi - lo + 1;
    let mask: u32 = if width < 32 { (1 << width) - 1 } else { !0 };
    (v >> lo) & mask
}

/// Given a value `v`, replaces bits `hi` through `lo` (inclusive) with the
/// same number of low-order bits from `new`.
#[inline(always)]
pub const fn bitfield_replace(orig: u32, hi: u32, lo: u32, new: u32) -> u32 {
    let width = hi - lo + 1;
    let mask: u32 = if width < 32 { (1 << width) - 1 } else { !0 };
    (orig & !(mask << lo)) | ((new & mask) << lo)
}

/// Declares wrapped bits types: a newtype around `u32` that can be handed to
/// [`bitfield_accessors`].
///
///     bit_wrappers! {
///         pub struct Cr(pub u32);
///     }
#[macro_export]
macro_rules! bit_wrappers {
    () => {};
    ($(#[$m:meta])* pub struct $name:ident(pub $ty:ty); $($rest:tt)*) => {
        #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
        $(#[$m])*
        pub struct $name(pub $ty);

        impl $crate::bits::BitsWrapper for $name {
            type Raw = $ty;

            fn from_raw(v: Self::Raw) -> Self {
                $name(v)
            }
        }

        $crate::bit_wrappers!{$($rest)*}
    };
}

/// Declares accessors for packed bitfields within an `impl` block for a
/// [`BitsWrapper`] type (normally declared with [`bit_wrappers`]).
///
///     bitfield_accessors! {
///         pub total [31] get_sign / with_sign: bool,
///         pub       [3:0] get_mode / with_mode: Mode,
///     }
///
/// `total` means every bit pattern in the field is a valid value of the
/// Rust type, so the accessor returns `T` directly (via [`FromBitsTotal`]).
/// Without `total`, the accessor returns `BitsResult<T>` (via [`FromBits`])
/// so that illegal patterns can be reported instead of panicking.
#[macro_export]
macro_rules! bitfield_accessors {
    () => {};

    (
        $(#[$m:meta])*
        pub [$bit:tt] $get:ident / $with:ident : $ty:ty,
        $($rest:tt)*
    ) => {
        $crate::bitfield_accessors! {
            @_impl
            $(#[$m])*
            partial [$bit : $bit] $get / $with : $ty
        }
        $crate::bitfield_accessors!{ $($rest)* }
    };

    (
        $(#[$m:meta])*
        pub total [$bit:tt] $get:ident / $with:ident : $ty:ty,
        $($rest:tt)*
    ) => {
        $crate::bitfield_accessors! {
            @_impl
            $(#[$m])*
            total [$bit : $bit] $get / $with : $ty
        }
        $crate::bitfield_accessors!{ $($rest)* }
    };

    (
        $(#[$m:meta])*
        pub [$hi:tt : $lo:tt] $get:ident / $with:ident : $ty:ty,
        $($rest:tt)*
    ) => {
        $crate::bitfield_accessors! {
            @_impl
            $(#[$m])*
            partial [$hi : $lo] $get / $with : $ty
        }
        $crate::bitfield_accessors!{ $($rest)* }
    };

    (
        $(#[$m:meta])*
        pub total [$hi:tt : $lo:tt] $get:ident / $with:ident : $ty:ty,
        $($rest:tt)*
    ) => {
        $crate::bitfield_accessors! {
            @_impl
            $(#[$m])*
            total [$hi : $lo] $get / $with : $ty
        }
        $crate::bitfield_accessors!{ $($rest)* }
    };

    (
        @_impl
        $(#[$m:meta])*
        partial [$hi:tt : $lo:tt]
        $get:ident / $with:ident : $ty:ty
    ) => {
        $(#[$m])*
        #[inline]
        pub fn $get(self) -> $crate::bits::BitsResult<$ty> {
            <$ty as $crate::bits::FromBits>::from_bits(
                $crate::bits::bitfield_extract(self.0, $hi, $lo))
        }

        $(#[$m])*
        #[inline]
        pub fn $with(self, v: $ty) -> Self {
            $crate::bits::BitsWrapper::from_raw(
                $crate::bits::bitfield_replace(
                    self.0, $hi, $lo,
                    <$ty as $crate::bits::IntoBits>::into_bits(v)))
        }
    };

    (
        @_impl
        $(#[$m:meta])*
        total [$hi:tt : $lo:tt]
        $get:ident / $with:ident : $ty:ty
    ) => {
        $(#[$m])*
        #[inline]
        pub fn $get(self) -> $ty {
            <$ty as $crate::bits::FromBitsTotal>::from_bits_total(
                $crate::bits::bitfield_extract(self.0, $hi, $lo))
        }

        $(#[$m])*
        #[inline]
        pub fn $with(self, v: $ty) -> Self {
            $crate::bits::BitsWrapper::from_raw(
                $crate::bits::bitfield_replace(
                    self.0, $hi, $lo,
                    <$ty as $crate::bits::IntoBits>::into_bits(v)))
        }
    };
}

/// Declares `bit_enum` types: plain C-like enums with a bidirectional
/// mapping to small bit patterns, usable as the `$ty` in
/// [`bitfield_accessors`].
///
///     bit_enums! {
///         pub bit_enum RecMode {
///             Continuous = 0,
///             TriggerMask = 1,
///         }
///     }
#[macro_export]
macro_rules! bit_enums {
    () => {};
    (
        $(#[$m:meta])*
        pub bit_enum $name:ident {
            $($e_name:ident = $e_val:expr,)+
        }
        $($rest:tt)*
    ) => {
        #[derive(Copy, Clone, Eq, PartialEq, Debug)]
        $(#[$m])*
        pub enum $name {
            $($e_name = $e_val),+
        }

        impl $crate::bits::IntoBits for $name {
            fn into_bits(self) -> u32 {
                self as u32
            }
        }

        impl $crate::bits::FromBits for $name {
            fn from_bits(bits: u32) -> $crate::bits::BitsResult<Self> {
                match bits {
                    $($e_val => Ok($name::$e_name),)+
                    _ => Err($crate::bits::BadBits(bits)),
                }
            }
        }

        impl $crate::bits::FromBitsTotal for $name {
            fn from_bits_total(bits: u32) -> Self {
                match bits {
                    $($e_val => $name::$e_name,)+
                    _ => unreachable!("illegal bit pattern {:#x} for {}", bits, stringify!($name)),
                }
            }
        }

        $crate::bit_enums!{$($rest)*}
    };
}
