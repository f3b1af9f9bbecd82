//! String IDs for the entities in a scenario (projects, zones, timepoints and so on).
use anyhow::{Context, Result};
use indexmap::{IndexMap, IndexSet};
use std::borrow::Borrow;
use std::fmt::Display;
use std::hash::Hash;

/// Behaviour shared by every ID type
pub trait IDLike: Eq + Hash + Borrow<str> + Clone + Display {
    /// What the ID identifies, as used in error messages (e.g. "project")
    const KIND: &'static str;
}

/// Define a cheaply cloned string ID type.
///
/// The second argument names what the ID identifies, for error messages.
macro_rules! define_id_type {
    ($name:ident, $kind:literal) => {
        #[derive(
            Clone,
            std::hash::Hash,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Debug,
            serde::Deserialize,
            serde::Serialize,
        )]
        #[doc = concat!("Identifies one ", $kind)]
        pub struct $name(pub std::rc::Rc<str>);

        impl $name {
            /// Create a new ID from a string slice
            pub fn new(id: &str) -> Self {
                Self(std::rc::Rc::from(id))
            }
        }

        impl crate::id::IDLike for $name {
            const KIND: &'static str = $kind;
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(std::rc::Rc::from(s))
            }
        }
    };
}
pub(crate) use define_id_type;

/// A collection of known IDs which input files may refer to
pub trait IDCollection<ID: IDLike> {
    /// Look up an ID by its string form, so the stored (shared) copy can be reused.
    ///
    /// # Returns
    ///
    /// The stored ID, or an error naming the kind of ID if it is unknown.
    fn get_id_by_str(&self, id: &str) -> Result<ID>;
}

impl<ID: IDLike> IDCollection<ID> for IndexSet<ID> {
    fn get_id_by_str(&self, id: &str) -> Result<ID> {
        self.get(id)
            .cloned()
            .with_context(|| format!("Unknown {} {id}", ID::KIND))
    }
}

impl<ID: IDLike, V> IDCollection<ID> for IndexMap<ID, V> {
    fn get_id_by_str(&self, id: &str) -> Result<ID> {
        self.get_key_value(id)
            .map(|(found, _)| found.clone())
            .with_context(|| format!("Unknown {} {id}", ID::KIND))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::indexmap;
    use rstest::rstest;

    define_id_type!(WidgetID, "widget");

    #[rstest]
    #[case("a", true)]
    #[case("b", true)]
    #[case("c", false)]
    fn test_get_id_by_str_set(#[case] id: &str, #[case] found: bool) {
        let ids: IndexSet<WidgetID> = ["a".into(), "b".into()].into_iter().collect();
        assert_eq!(ids.get_id_by_str(id).is_ok(), found);
    }

    #[test]
    fn test_get_id_by_str_map() {
        let map: IndexMap<WidgetID, u32> = indexmap! {"a".into() => 1};
        let id = map.get_id_by_str("a").unwrap();
        assert_eq!(id, WidgetID::new("a"));

        // The stored copy is shared rather than reallocated
        assert!(std::rc::Rc::ptr_eq(&id.0, &map.get_index(0).unwrap().0.0));

        assert_eq!(
            map.get_id_by_str("z").unwrap_err().to_string(),
            "Unknown widget z"
        );
    }
}
