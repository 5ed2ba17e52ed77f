//! Limits applied while parsing untrusted input.

/// Configuration for [crate::Kdm].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of strings accepted in the string section.
    pub max_strings: usize,

    /// Maximum number of arrays accepted in the array section.
    pub max_arrays: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_strings: 1 << 16,
            max_arrays: 1 << 16,
        }
    }
}
