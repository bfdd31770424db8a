//! Declarative helpers that keep the encode and decode sides of every wire
//! type generated from one field list.

/// A struct whose fields are written and read in declaration order.
macro_rules! wire_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $(#[$fmeta:meta])* $fvis:vis $field:ident : $ty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $( $(#[$fmeta])* $fvis $field: $ty, )*
        }

        impl $crate::codec::Encode for $name {
            #[allow(unused_variables)]
            fn encode(&self, enc: &mut $crate::codec::Encoder) {
                $( $crate::codec::Encode::encode(&self.$field, enc); )*
            }
        }

        impl $crate::codec::Decode for $name {
            #[allow(unused_variables)]
            fn decode(dec: &mut $crate::codec::Decoder<'_>) -> $crate::error::Result<Self> {
                $( let $field = <$ty as $crate::codec::Decode>::decode(dec)?; )*
                Ok(Self { $( $field, )* })
            }
        }
    };
}

/// A fieldless enum carried as a single `u8` discriminant.
///
/// The enum must derive `Copy`.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $tag:literal ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(u8)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant = $tag, )*
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$( $name::$variant, )*];

            pub const fn name(self) -> &'static str {
                match self {
                    $( $name::$variant => stringify!($variant), )*
                }
            }
        }

        impl $crate::codec::Encode for $name {
            fn encode(&self, enc: &mut $crate::codec::Encoder) {
                enc.u8(*self as u8);
            }
        }

        impl $crate::codec::Decode for $name {
            fn decode(dec: &mut $crate::codec::Decoder<'_>) -> $crate::error::Result<Self> {
                match dec.u8()? {
                    $( $tag => Ok($name::$variant), )*
                    tag => Err($crate::error::WireError::InvalidTag {
                        ty: stringify!($name),
                        tag,
                    }),
                }
            }
        }
    };
}

/// A tagged union of unit and struct-like variants.
///
/// Each variant is written as `tag => Name` or `tag => Name { field: Type, .. }`;
/// the tag byte precedes the fields, which follow in declaration order.
macro_rules! wire_variants {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $tag:literal => $variant:ident
                $({ $( $(#[$fmeta:meta])* $field:ident : $ty:ty ),* $(,)? })?
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis enum $name {
            $(
                $(#[$vmeta])*
                $variant $({ $( $(#[$fmeta])* $field: $ty, )* })?,
            )*
        }

        impl $name {
            /// Variant name, used in logs and fault reports.
            pub const fn name(&self) -> &'static str {
                match self {
                    $( $name::$variant { .. } => stringify!($variant), )*
                }
            }
        }

        impl $crate::codec::Encode for $name {
            fn encode(&self, enc: &mut $crate::codec::Encoder) {
                match self {
                    $(
                        $name::$variant $({ $( $field, )* })? => {
                            enc.u8($tag);
                            $( $( $crate::codec::Encode::encode($field, enc); )* )?
                        }
                    )*
                }
            }
        }

        impl $crate::codec::Decode for $name {
            fn decode(dec: &mut $crate::codec::Decoder<'_>) -> $crate::error::Result<Self> {
                match dec.u8()? {
                    $(
                        $tag => Ok($name::$variant $({
                            $( $field: <$ty as $crate::codec::Decode>::decode(dec)?, )*
                        })?),
                    )*
                    tag => Err($crate::error::WireError::InvalidTag {
                        ty: stringify!($name),
                        tag,
                    }),
                }
            }
        }
    };
}
