//! Inline, fixed-capacity string that can travel inside plain-old-data events

use std::fmt;

use bytemuck::{Pod, Zeroable};

/// UTF-8 string stored inline in `N` bytes, zero padded.
///
/// Input longer than `N` bytes is truncated at the last char boundary that fits.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct FixedString<const N: usize> {
    bytes: [u8; N],
}

// SAFETY: a byte array has no padding and every bit pattern is valid.
unsafe impl<const N: usize> Zeroable for FixedString<N> {}
// SAFETY: see above; the type is `Copy` and `'static`.
unsafe impl<const N: usize> Pod for FixedString<N> {}

impl<const N: usize> FixedString<N> {
    /// Maximum length in bytes
    pub const CAPACITY: usize = N;

    /// Create an empty string
    pub const fn new() -> Self {
        Self { bytes: [0; N] }
    }

    /// Create from a string slice, truncating if needed
    pub fn from_str_truncate(value: &str) -> Self {
        let mut len = value.len().min(N);
        while !value.is_char_boundary(len) {
            len -= 1;
        }

        let mut bytes = [0; N];
        bytes[..len].copy_from_slice(&value.as_bytes()[..len]);
        Self { bytes }
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.bytes.iter().position(|b| *b == 0).unwrap_or(N)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// View as a string slice
    pub fn as_str(&self) -> &str {
        // Contents always come from a `&str` cut at a char boundary
        std::str::from_utf8(&self.bytes[..self.len()]).unwrap_or_default()
    }
}

impl<const N: usize> Default for FixedString<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> From<&str> for FixedString<N> {
    fn from(value: &str) -> Self {
        Self::from_str_truncate(value)
    }
}

impl<const N: usize> PartialEq<str> for FixedString<N> {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl<const N: usize> PartialEq<&str> for FixedString<N> {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl<const N: usize> fmt::Debug for FixedString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl<const N: usize> fmt::Display for FixedString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_string_basic() {
        let s = FixedString::<24>::from("position");
        assert_eq!(s.as_str(), "position");
        assert_eq!(s.len(), 8);
        assert_eq!(s, "position");
        assert!(FixedString::<24>::new().is_empty());
    }

    #[test]
    fn test_fixed_string_truncates_on_char_boundary() {
        // 'é' is two bytes; cutting at 4 would split it
        let s = FixedString::<4>::from("abcé");
        assert_eq!(s.as_str(), "abc");

        let s = FixedString::<4>::from("abcdef");
        assert_eq!(s.as_str(), "abcd");
    }

    #[test]
    fn test_fixed_string_is_pod() {
        let s = FixedString::<8>::from("rot");
        let bytes = bytemuck::bytes_of(&s);
        assert_eq!(bytes.len(), 8);
        let back: FixedString<8> = bytemuck::pod_read_unaligned(bytes);
        assert_eq!(back, s);
    }
}
