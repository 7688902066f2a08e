//! Macro for implementing Display and FromStr for closed domain enums
//!
//! Error kinds, HTTP methods, environments and connectivity states all need
//! the same pair of conversions: a canonical string for logs and wire
//! payloads, and a case-insensitive parser for environment variables and
//! config files.
//!
//! # Example
//!
//! ```rust
//! use backstop_domain::impl_domain_enum_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Phase {
//!     Idle,
//!     Running,
//! }
//!
//! impl_domain_enum_conversions!(Phase {
//!     Idle => "idle",
//!     Running => "running",
//! });
//!
//! assert_eq!("RUNNING".parse::<Phase>().unwrap(), Phase::Running);
//! assert_eq!(Phase::Idle.to_string(), "idle");
//! ```

/// Implements `as_str`, Display and FromStr for a fieldless enum
///
/// # Arguments
///
/// * `$enum_name` - The name of the enum type
/// * `$variant => $str` - Mapping of enum variants to their canonical string
///
/// Parsing ignores ASCII case, so `"get"`, `"GET"` and `"Get"` all match a
/// variant mapped to `"GET"`.
#[macro_export]
macro_rules! impl_domain_enum_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Canonical string form of this variant.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                let trimmed = s.trim();
                $(
                    if trimmed.eq_ignore_ascii_case($str) {
                        return Ok(Self::$variant);
                    }
                )+
                Err(format!("Invalid {}: {}", stringify!($enum_name), s))
            }
        }
    };
}
