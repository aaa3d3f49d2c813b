//! The `rpc_object!` registration macro.
//!
//! Rust has no runtime reflection, so struct types declare their schema
//! shape at definition time. The macro emits the struct unchanged plus the
//! [`Describe`](crate::schema::Describe) and
//! [`ParamsMeta`](crate::params::ParamsMeta) implementations the engine
//! needs. Field tags ride along as `=> "tag string"` suffixes using the
//! `key:"value"` syntax:
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use wirerpc_common::rpc_object;
//!
//! rpc_object! {
//!     #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//!     pub struct Profile {
//!         pub name: String => r#"label:"Name" validate:"required""#,
//!         pub age: i64,
//!     }
//! }
//! ```
//!
//! A params struct that wants the HTTP request headers declares a
//! [`Headers`](crate::params::Headers) field and names it after the body:
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use wirerpc_common::params::Headers;
//! use wirerpc_common::rpc_object;
//!
//! rpc_object! {
//!     #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//!     pub struct SearchParams {
//!         pub query: String,
//!         #[serde(skip)]
//!         pub header: Headers => r#"widget:"hidden""#,
//!     }
//!     headers: header
//! }
//! ```

#[macro_export]
macro_rules! rpc_object {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $fname:ident : $fty:ty $(=> $tags:literal)?
            ),* $(,)?
        }
    ) => {
        $crate::rpc_object!(@define
            $(#[$meta])*
            $vis struct $name {
                $( $(#[$fmeta])* $fvis $fname : $fty $(=> $tags)? ),*
            }
        );

        impl $crate::params::ParamsMeta for $name {}
    };

    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $fname:ident : $fty:ty $(=> $tags:literal)?
            ),* $(,)?
        }
        headers: $hfield:ident
    ) => {
        $crate::rpc_object!(@define
            $(#[$meta])*
            $vis struct $name {
                $( $(#[$fmeta])* $fvis $fname : $fty $(=> $tags)? ),*
            }
        );

        impl $crate::params::ParamsMeta for $name {
            fn header_slot(&mut self) -> Option<&mut $crate::params::Headers> {
                Some(&mut self.$hfield)
            }
        }
    };

    (@define
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $fname:ident : $fty:ty $(=> $tags:literal)?
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $( $(#[$fmeta])* $fvis $fname : $fty, )*
        }

        impl $crate::schema::Describe for $name {
            fn type_name() -> ::std::borrow::Cow<'static, str> {
                ::std::borrow::Cow::Borrowed(stringify!($name))
            }

            fn describe(walker: &mut $crate::schema::Walker<'_>) -> $crate::schema::Schema {
                const FIELDS: &[$crate::schema::FieldDef] = &[
                    $(
                        (
                            stringify!($fname),
                            $crate::rpc_object!(@tags $($tags)?),
                            <$fty as $crate::schema::Describe>::describe,
                        ),
                    )*
                ];
                walker.object(&Self::type_name(), FIELDS)
            }
        }
    };

    (@tags $tags:literal) => { $tags };
    (@tags) => { "" };
}
