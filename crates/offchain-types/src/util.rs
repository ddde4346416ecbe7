//! Marker types for literal-valued wire fields.
//!
//! Several protocol fields always carry the same value: `_ObjectType` tags,
//! `command_type`, the KYC payload discriminators, and the payment action
//! verb. Each is modeled as a zero-sized type that serializes to its constant
//! and rejects anything else on decode, so schema validation of these fields
//! happens inside `serde` with no separate validation pass.

/// Defines a zero-sized type that serializes to a fixed string literal.
#[macro_export]
macro_rules! lit_str {
    ($(#[$meta:meta])* $struct_name:ident, $val:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
        pub struct $struct_name;

        impl $struct_name {
            pub const VALUE: &'static str = $val;
        }

        impl AsRef<str> for $struct_name {
            fn as_ref(&self) -> &str {
                Self::VALUE
            }
        }

        impl serde::Serialize for $struct_name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(Self::VALUE)
            }
        }

        impl<'de> serde::Deserialize<'de> for $struct_name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                if s == Self::VALUE {
                    Ok($struct_name)
                } else {
                    Err(serde::de::Error::custom(format!(
                        "expected '{}', got '{}'",
                        Self::VALUE,
                        s
                    )))
                }
            }
        }

        impl std::fmt::Display for $struct_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(Self::VALUE)
            }
        }
    };
}

/// Defines a zero-sized type that serializes to a fixed unsigned integer.
#[macro_export]
macro_rules! lit_u64 {
    ($(#[$meta:meta])* $struct_name:ident, $val:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
        pub struct $struct_name;

        impl $struct_name {
            pub const VALUE: u64 = $val;
        }

        impl PartialEq<u64> for $struct_name {
            fn eq(&self, other: &u64) -> bool {
                *other == Self::VALUE
            }
        }

        impl serde::Serialize for $struct_name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_u64(Self::VALUE)
            }
        }

        impl<'de> serde::Deserialize<'de> for $struct_name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let num = u64::deserialize(deserializer)?;
                if num == Self::VALUE {
                    Ok($struct_name)
                } else {
                    Err(serde::de::Error::custom(format!(
                        "expected {}, got {}",
                        Self::VALUE,
                        num
                    )))
                }
            }
        }

        impl std::fmt::Display for $struct_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", Self::VALUE)
            }
        }
    };
}
