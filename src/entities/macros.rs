//! Macros for reducing boilerplate when defining entities
//!
//! These macros generate the repetitive `Entity` implementation needed for
//! each record type served by a repository.

/// Implement [`Entity`](crate::core::entity::Entity) for a struct
///
/// The struct must serialize with serde and carry a `pub id: String` field,
/// which becomes the document identifier.
///
/// # Example
///
/// ```rust,ignore
/// use docrepo::prelude::*;
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct Product {
///     pub id: String,
///     pub name: String,
///     pub price: f64,
/// }
///
/// impl_entity!(
///     Product,
///     collection: "products",
///     repository: "product_repository",
///     fields: {
///         "name" => Text,
///         "price" => Number,
///     },
///     search: ["name"],
/// );
/// ```
#[macro_export]
macro_rules! impl_entity {
    (
        $type:ty,
        collection: $collection:expr,
        repository: $repository:expr,
        fields: { $( $field:literal => $kind:ident ),* $(,)? },
        search: [ $( $search:literal ),* $(,)? ] $(,)?
    ) => {
        impl $crate::core::entity::Entity for $type {
            fn collection_name() -> &'static str {
                $collection
            }

            fn repository_name() -> &'static str {
                $repository
            }

            fn id(&self) -> &str {
                &self.id
            }

            fn fields() -> &'static [$crate::core::field::FieldDef] {
                const FIELDS: &[$crate::core::field::FieldDef] = &[
                    $( $crate::core::field::FieldDef::new(
                        $field,
                        $crate::core::field::FieldKind::$kind,
                    ) ),*
                ];
                FIELDS
            }

            fn searchable_fields() -> &'static [&'static str] {
                &[ $( $search ),* ]
            }
        }
    };
}
