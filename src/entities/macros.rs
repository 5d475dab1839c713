//! Macros for declaring entity descriptors

/// Declare an [`EntityDescriptor`](crate::core::entity::EntityDescriptor)
///
/// Scalar fields name their type (`text`, `integer`, `long`, `boolean`,
/// `decimal`, `timestamp`, `json`). Relationship fields name their kind and
/// target type (`one_to_one(T)`, `many_to_one(T)`, `one_to_many(T)`,
/// `many_to_many(T)`). A field may carry `[unique]`, `[required]` or both.
///
/// # Example
/// ```
/// use entity_rest::entity;
///
/// let named = entity!(abstract Named {
///     name: text [required],
/// });
/// let item = entity!(Item extends Named {
///     code: text [unique, required],
///     price: decimal,
/// });
/// let line = entity!(Line {
///     quantity: integer,
///     item: many_to_one(Item),
/// });
///
/// assert!(named.is_abstract);
/// assert_eq!(item.parent.as_deref(), Some("Named"));
/// assert!(item.fields[0].unique);
/// assert_eq!(line.fields[1].kind.target(), Some("Item"));
/// ```
#[macro_export]
macro_rules! entity {
    (@fields $desc:expr ; ) => {
        $desc
    };
    (@fields $desc:expr ; $field:ident : $kind:ident $(($target:ident))? $([$($flag:ident),*])? $(, $($rest:tt)*)?) => {
        $crate::entity!(
            @fields $desc.field($crate::entity!(@field $field $kind $(($target))? $([$($flag),*])?)) ;
            $($($rest)*)?
        )
    };

    (@field $field:ident $kind:ident ($target:ident) $([$($flag:ident),*])?) => {
        $crate::core::field::FieldDescriptor::new(
            stringify!($field),
            $crate::entity!(@relation $kind $target),
        ) $($(.$flag())*)?
    };
    (@field $field:ident $kind:ident $([$($flag:ident),*])?) => {
        $crate::core::field::FieldDescriptor::scalar(
            stringify!($field),
            $crate::entity!(@scalar $kind),
        ) $($(.$flag())*)?
    };

    (@scalar text) => { $crate::core::field::ScalarType::Text };
    (@scalar integer) => { $crate::core::field::ScalarType::Integer };
    (@scalar long) => { $crate::core::field::ScalarType::Long };
    (@scalar boolean) => { $crate::core::field::ScalarType::Boolean };
    (@scalar decimal) => { $crate::core::field::ScalarType::Decimal };
    (@scalar timestamp) => { $crate::core::field::ScalarType::Timestamp };
    (@scalar json) => { $crate::core::field::ScalarType::Json };

    (@relation one_to_one $target:ident) => {
        $crate::core::field::FieldKind::ToOneOwning(stringify!($target).to_string())
    };
    (@relation many_to_one $target:ident) => {
        $crate::core::field::FieldKind::ToOneReferencing(stringify!($target).to_string())
    };
    (@relation one_to_many $target:ident) => {
        $crate::core::field::FieldKind::ToMany {
            target: stringify!($target).to_string(),
            cascade: true,
        }
    };
    (@relation many_to_many $target:ident) => {
        $crate::core::field::FieldKind::ToMany {
            target: stringify!($target).to_string(),
            cascade: false,
        }
    };

    (abstract $name:ident $(extends $parent:ident)? { $($body:tt)* }) => {
        $crate::entity!(
            @fields $crate::core::entity::EntityDescriptor::new(stringify!($name))
                .abstract_type()
                $(.extends(stringify!($parent)))? ;
            $($body)*
        )
    };
    ($name:ident $(extends $parent:ident)? { $($body:tt)* }) => {
        $crate::entity!(
            @fields $crate::core::entity::EntityDescriptor::new(stringify!($name))
                $(.extends(stringify!($parent)))? ;
            $($body)*
        )
    };
}
