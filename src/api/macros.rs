//! Purpose: Declarative sugar that derives descriptor tables from Rust type definitions.
//! Exports: `jsonable!`, `open_enum!` (both at the crate root).
//! Role: Stand-in for an external code generator; expansions only call public API items.
//! Invariants: Descriptor field order equals struct field order.
//! Invariants: Enum types stay open integer codes; unknown codes round-trip unchanged.

/// Declares a struct and implements `RecordAccess` + `Jsonable` for it.
///
/// Field types must implement `JsonField`: `i8..i64`, `u8..u32`, `FixedString<N>`,
/// `Option<String>`, `Option<Box<T>>`, `Vec<T>`, a nested `T` held by value
/// (each with `T: Jsonable`, including the struct itself behind a box or vec)
/// and enums declared through `open_enum!`.
///
/// A field whose first attribute is `#[jsonable(skip)]` stays on the struct but
/// is left out of the descriptor; decoding fills it with `Default::default()`.
///
/// ```
/// use jsonable::api::FixedString;
///
/// jsonable::jsonable! {
///     #[derive(Debug, Default, PartialEq)]
///     pub struct Scalars {
///         pub a: i32,
///         pub string: FixedString<500>,
///         #[jsonable(skip)]
///         pub scratch: Vec<u8>,
///     }
/// }
///
/// let value = Scalars {
///     a: 500,
///     string: FixedString::try_from("hello").unwrap(),
///     scratch: vec![1, 2],
/// };
/// assert_eq!(jsonable::api::to_string(&value), r#"{"a":500,"string":"hello"}"#);
/// ```
#[macro_export]
macro_rules! jsonable {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $($body:tt)*
        }
    ) => {
        $crate::__jsonable_fields! {
            [$(#[$meta])*] [$vis] $name
            all = []
            json = []
            skip = []
            rest = [$($body)*]
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __jsonable_fields {
    (
        [$(#[$meta:meta])*] [$vis:vis] $name:ident
        all = [$( { [$(#[$field_meta:meta])*] [$field_vis:vis] $field:ident : $ty:ty } )*]
        json = [$( { $json_field:ident : $json_ty:ty } )*]
        skip = [$($skip_field:ident)*]
        rest = []
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $ty,
            )*
        }

        impl $crate::api::RecordAccess for $name {
            fn descriptor(&self) -> &::std::sync::Arc<$crate::api::RecordDescriptor> {
                <Self as $crate::api::Jsonable>::type_descriptor()
            }

            #[allow(unused_assignments, unused_mut, unused_variables)]
            fn field(&self, index: usize) -> ::std::option::Option<$crate::api::FieldRef<'_>> {
                let mut position = 0usize;
                $(
                    if index == position {
                        return ::std::option::Option::Some(
                            $crate::api::JsonField::as_field(&self.$json_field),
                        );
                    }
                    position += 1;
                )*
                ::std::option::Option::None
            }
        }

        impl $crate::api::Jsonable for $name {
            fn type_descriptor() -> &'static ::std::sync::Arc<$crate::api::RecordDescriptor> {
                static DESCRIPTOR: $crate::api::__private::OnceLock<
                    ::std::sync::Arc<$crate::api::RecordDescriptor>,
                > = $crate::api::__private::OnceLock::new();
                DESCRIPTOR.get_or_init(|| {
                    let builder = $crate::api::__private::builder(stringify!($name))
                        $(
                            .field(
                                stringify!($json_field),
                                $crate::api::__private::kind_of::<$json_ty>(),
                            )
                        )*;
                    $crate::api::__private::finish(stringify!($name), builder)
                })
            }

            fn into_record(self) -> $crate::api::Record {
                let values = ::std::vec![
                    $( $crate::api::JsonField::into_value(self.$json_field), )*
                ];
                $crate::api::__private::assemble(
                    <Self as $crate::api::Jsonable>::type_descriptor(),
                    values,
                )
            }

            #[allow(unused_mut, unused_variables)]
            fn from_record(
                record: $crate::api::Record,
            ) -> ::std::result::Result<Self, $crate::api::Error> {
                let mut values = $crate::api::__private::open(
                    <Self as $crate::api::Jsonable>::type_descriptor(),
                    record,
                )?;
                ::std::result::Result::Ok(Self {
                    $(
                        $json_field: $crate::api::__private::take::<$json_ty>(
                            &mut values,
                            stringify!($name),
                            stringify!($json_field),
                        )?,
                    )*
                    $(
                        $skip_field: ::std::default::Default::default(),
                    )*
                })
            }
        }
    };
    (
        $head:tt $vis:tt $name:ident
        all = [$($all:tt)*]
        json = [$($json:tt)*]
        skip = [$($skip:tt)*]
        rest = [
            #[jsonable(skip)]
            $(#[$field_meta:meta])*
            $field_vis:vis $field:ident : $ty:ty
            $(, $($rest:tt)*)?
        ]
    ) => {
        $crate::__jsonable_fields! {
            $head $vis $name
            all = [$($all)* { [$(#[$field_meta])*] [$field_vis] $field : $ty }]
            json = [$($json)*]
            skip = [$($skip)* $field]
            rest = [$($($rest)*)?]
        }
    };
    (
        $head:tt $vis:tt $name:ident
        all = [$($all:tt)*]
        json = [$($json:tt)*]
        skip = [$($skip:tt)*]
        rest = [
            $(#[$field_meta:meta])*
            $field_vis:vis $field:ident : $ty:ty
            $(, $($rest:tt)*)?
        ]
    ) => {
        $crate::__jsonable_fields! {
            $head $vis $name
            all = [$($all)* { [$(#[$field_meta])*] [$field_vis] $field : $ty }]
            json = [$($json)* { $field : $ty }]
            skip = [$($skip)*]
            rest = [$($($rest)*)?]
        }
    };
}

/// Declares an open enumeration: a newtype over its integer code with named
/// members as associated constants. Any code that fits the underlying integer
/// is a valid value. The expansion already implements `Clone`, `Copy`,
/// `PartialEq`, `Eq`, `Hash`, `Default` and `Debug`.
///
/// ```
/// jsonable::open_enum! {
///     pub enum SomeEnum: i32 {
///         ENUM_VAL_1 = 0,
///         ENUM_VAL_2 = 1,
///     }
/// }
///
/// assert_eq!(SomeEnum::ENUM_VAL_2.code(), 1);
/// assert_eq!(SomeEnum(7).name(), None);
/// ```
#[macro_export]
macro_rules! open_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $repr:ty {
            $( $member:ident = $code:expr ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        $vis struct $name(pub $repr);

        #[allow(non_upper_case_globals)]
        impl $name {
            $( pub const $member: Self = Self($code); )*

            pub const fn code(self) -> $repr {
                self.0
            }

            pub fn name(self) -> ::std::option::Option<&'static str> {
                $(
                    if self == Self::$member {
                        return ::std::option::Option::Some(stringify!($member));
                    }
                )*
                ::std::option::Option::None
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self.name() {
                    ::std::option::Option::Some(member) => f.write_str(member),
                    ::std::option::Option::None => {
                        write!(f, "{}({})", stringify!($name), self.0)
                    }
                }
            }
        }

        impl $crate::api::JsonField for $name {
            fn kind() -> $crate::api::FieldKind {
                let spec = $crate::api::EnumSpec::new(
                    <$repr as $crate::api::Integral>::WIDTH,
                );
                $(
                    let spec = spec.member(
                        stringify!($member),
                        ::std::primitive::i64::from(Self::$member.0),
                    );
                )*
                $crate::api::FieldKind::Enum(spec)
            }

            fn as_field(&self) -> $crate::api::FieldRef<'_> {
                $crate::api::FieldRef::Enum(::std::primitive::i64::from(self.0))
            }

            fn into_value(self) -> $crate::api::FieldValue {
                $crate::api::FieldValue::Enum(::std::primitive::i64::from(self.0))
            }

            fn from_value(
                value: $crate::api::FieldValue,
            ) -> ::std::result::Result<Self, $crate::api::Error> {
                match value {
                    $crate::api::FieldValue::Enum(code) => {
                        <$repr as ::std::convert::TryFrom<i64>>::try_from(code)
                            .map(Self)
                            .map_err(|_| {
                                $crate::api::Error::new($crate::api::ErrorKind::TypeMismatch)
                                    .with_message(format!(
                                        "enum code {code} does not fit {}",
                                        stringify!($repr)
                                    ))
                            })
                    }
                    _ => ::std::result::Result::Err(
                        $crate::api::Error::new($crate::api::ErrorKind::TypeMismatch)
                            .with_message(concat!("expected enum value for ", stringify!($name))),
                    ),
                }
            }
        }
    };
}
