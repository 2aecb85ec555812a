//! Element Schema Registry
//!
//! External registry for element/attribute validation; the resolver only
//! consumes the default component element name.

pub trait ElementSchemaRegistry {
    /// Element name used for components that declare no selector.
    fn get_default_component_element_name(&self) -> String;
}
