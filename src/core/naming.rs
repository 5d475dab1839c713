//! URL-safe entity names
//!
//! Entity types are registered under their PascalCase type name (`AddOnLevel`)
//! and exposed under the kebab-case form of that name (`add-on-level`).

use convert_case::{Case, Casing};

/// Utility for converting between type names and URL segments
pub struct EntityNaming;

impl EntityNaming {
    /// Convert a type name to the kebab-case segment used in URLs
    ///
    /// # Examples
    ///
    /// ```
    /// use entity_rest::core::naming::EntityNaming;
    ///
    /// assert_eq!(EntityNaming::url_name("Item"), "item");
    /// assert_eq!(EntityNaming::url_name("AddOnLevel"), "add-on-level");
    /// assert_eq!(EntityNaming::url_name("QuoteAddOn"), "quote-add-on");
    /// ```
    pub fn url_name(type_name: &str) -> String {
        type_name.to_case(Case::Kebab)
    }

    /// Normalize a URL segment before catalog lookup
    ///
    /// Lookups are case-insensitive, so `/rest/Invoice` and `/rest/invoice`
    /// address the same type.
    pub fn normalize_segment(segment: &str) -> String {
        segment.trim().to_lowercase()
    }

    /// Name of the key that references a to-one field by identifier
    ///
    /// ```
    /// use entity_rest::core::naming::EntityNaming;
    ///
    /// assert_eq!(EntityNaming::id_key("item"), "itemId");
    /// ```
    pub fn id_key(field: &str) -> String {
        format!("{}Id", field)
    }
}
