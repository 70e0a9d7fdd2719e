// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A minimal `bitflags`-style macro for the flag sets of this crate.
//!
//! Generates a transparent newtype over an integer with named constants,
//! set operations and a readable `Debug` listing of the raised flags.

/// Declares a flag set.
///
/// ```
/// vbuffer_core::vbuffer_bitflags! {
///     /// Example flags.
///     pub struct Access: u32 {
///         /// Read access.
///         const READ = 1 << 0;
///         /// Write access.
///         const WRITE = 1 << 1;
///     }
/// }
///
/// let rw = Access::READ | Access::WRITE;
/// assert!(rw.contains(Access::READ));
/// assert_eq!(format!("{:?}", rw), "Access(READ | WRITE)");
/// ```
#[macro_export]
macro_rules! vbuffer_bitflags {
    (
        $(#[$outer:meta])*
        $vis:vis struct $name:ident: $repr:ty {
            $(
                $(#[$inner:meta])*
                const $flag:ident = $value:expr;
            )*
        }
    ) => {
        $(#[$outer])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        #[repr(transparent)]
        $vis struct $name($repr);

        #[allow(dead_code)]
        impl $name {
            $(
                $(#[$inner])*
                pub const $flag: Self = Self($value);
            )*

            /// No flag raised.
            #[inline]
            pub const fn empty() -> Self {
                Self(0)
            }

            /// Raw bit pattern.
            #[inline]
            pub const fn bits(&self) -> $repr {
                self.0
            }

            /// Builds a set from raw bits, dropping unknown bits.
            #[inline]
            pub const fn from_bits_truncate(bits: $repr) -> Self {
                Self(bits & (0 $(| $value)*))
            }

            /// `true` when no flag is raised.
            #[inline]
            pub const fn is_empty(&self) -> bool {
                self.0 == 0
            }

            /// `true` when every flag of `other` is raised in `self`.
            #[inline]
            pub const fn contains(&self, other: Self) -> bool {
                (self.0 & other.0) == other.0
            }

            /// `true` when `self` and `other` share at least one flag.
            #[inline]
            pub const fn intersects(&self, other: Self) -> bool {
                (self.0 & other.0) != 0
            }

            /// Raises the flags of `other`.
            #[inline]
            pub fn insert(&mut self, other: Self) {
                self.0 |= other.0;
            }

            /// Clears the flags of `other`.
            #[inline]
            pub fn remove(&mut self, other: Self) {
                self.0 &= !other.0;
            }

            /// Raises or clears the flags of `other`.
            #[inline]
            pub fn set(&mut self, other: Self, value: bool) {
                if value {
                    self.insert(other);
                } else {
                    self.remove(other);
                }
            }
        }

        impl ::std::ops::BitOr for $name {
            type Output = Self;
            #[inline]
            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl ::std::ops::BitOrAssign for $name {
            #[inline]
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }

        impl ::std::ops::BitAnd for $name {
            type Output = Self;
            #[inline]
            fn bitand(self, rhs: Self) -> Self {
                Self(self.0 & rhs.0)
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                let mut names: ::std::vec::Vec<&'static str> = ::std::vec::Vec::new();
                $(
                    if $value != 0 && self.contains(Self::$flag) {
                        names.push(stringify!($flag));
                    }
                )*
                if names.is_empty() {
                    write!(f, "{}(empty)", stringify!($name))
                } else {
                    write!(f, "{}({})", stringify!($name), names.join(" | "))
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    crate::vbuffer_bitflags! {
        struct TestFlags: u8 {
            const A = 1;
            const B = 2;
            const C = 4;
        }
    }

    #[test]
    fn test_set_operations() {
        let mut flags = TestFlags::A | TestFlags::C;
        assert!(flags.contains(TestFlags::A));
        assert!(!flags.contains(TestFlags::A | TestFlags::B));
        assert!(flags.intersects(TestFlags::B | TestFlags::C));
        flags.remove(TestFlags::A);
        assert_eq!(flags, TestFlags::C);
        flags.set(TestFlags::B, true);
        assert_eq!(flags.bits(), 6);
        assert_eq!(TestFlags::from_bits_truncate(0xFF).bits(), 7);
    }

    #[test]
    fn test_debug_lists_raised_flags() {
        assert_eq!(format!("{:?}", TestFlags::empty()), "TestFlags(empty)");
        assert_eq!(format!("{:?}", TestFlags::B), "TestFlags(B)");
    }
}
