//! Error types for schema loading and layout resolution.

/// Errors that can occur while loading a structure schema.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Malformed XML in the schema document.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// I/O error reading the schema file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A required attribute is absent.
    #[error("<{element}> is missing required attribute `{attribute}`")]
    MissingAttribute {
        /// Element the attribute belongs to.
        element: String,
        /// Name of the missing attribute.
        attribute: String,
    },

    /// A numeric attribute could not be parsed.
    #[error("attribute `{attribute}` has invalid numeric value `{value}`")]
    InvalidNumber {
        /// Name of the attribute.
        attribute: String,
        /// The offending raw value.
        value: String,
    },

    /// An element appeared outside of the element that must enclose it.
    #[error("<{element}> must appear inside <{expected}>")]
    Misplaced {
        /// The misplaced element.
        element: String,
        /// The element expected to enclose it.
        expected: String,
    },

    /// The document ended while an element was still open.
    #[error("document ended inside <{element}>")]
    Unterminated {
        /// The element left open.
        element: String,
    },
}

/// Errors that can occur while resolving a structure into a concrete layout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    /// A field names a nested structure the schema does not define.
    #[error("structure `{name}` used by field `{field}` is not defined")]
    UnknownStructure {
        /// Name of the missing structure.
        name: String,
        /// Dotted name of the field that referenced it.
        field: String,
    },

    /// A structure required by the engine itself is not defined.
    #[error("required structure `{0}` is not defined in the schema")]
    MissingStructure(String),

    /// Nested structures recurse deeper than the resolver allows.
    #[error("structure nesting exceeds {limit} levels at field `{field}`")]
    NestingTooDeep {
        /// Dotted name of the field where the limit was hit.
        field: String,
        /// The depth limit.
        limit: usize,
    },
}

/// Result type for schema operations.
pub type Result<T> = std::result::Result<T, SchemaError>;
