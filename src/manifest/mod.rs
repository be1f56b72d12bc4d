//! The deployment manifest (`package.xml`) model.
//!
//! A [`Manifest`] is built empty, filled through [`Manifest::add_member`],
//! and serialized once with [`Manifest::to_xml`]. Type entries and the
//! members inside each entry keep first-seen order and never repeat.
//!
//! ```
//! use sfpkg::manifest::Manifest;
//!
//! let mut manifest = Manifest::new("58.0");
//! assert!(manifest.add_member("ApexClass", "Foo"));
//! assert!(!manifest.add_member("ApexClass", "Foo"));
//!
//! let xml = manifest.to_xml().unwrap();
//! assert!(xml.contains("<members>Foo</members>"));
//! assert_eq!(Manifest::from_xml(&xml).unwrap(), manifest);
//! ```

use error_set::error_set;

mod text;
mod xml;

pub use text::RawText;

/// Namespace of the metadata API package schema
pub const METADATA_NAMESPACE: &str = "http://soap.sforce.com/2006/04/metadata";

error_set! {
    /// Errors from serializing a manifest
    EncodingError := {
        /// A string field holds bytes that are not valid UTF-8
        #[display("Invalid UTF-8 in {field}: '{value}'")]
        InvalidUtf8 { field: String, value: String },
    }

    /// Errors from reading a manifest document
    ParseError := {
        /// The document does not follow the package layout
        #[display("Malformed manifest at line {line}, column {column}: expected {expected}")]
        Malformed { line: usize, column: usize, expected: String },
        /// A required element is absent
        #[display("Missing <{element}> element at line {line}, column {column}")]
        MissingElement { element: String, line: usize, column: usize },
        /// An `&...;` reference that is neither a predefined entity nor a character reference
        #[display("Unknown entity '&{entity};' at line {line}, column {column}")]
        UnknownEntity { entity: String, line: usize, column: usize },
    }
}

/// One `<types>` block: a type identifier and its members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeEntry {
    name: RawText,
    members: Vec<RawText>,
}

impl TypeEntry {
    #[must_use]
    pub fn name(&self) -> &RawText {
        &self.name
    }

    /// Members in insertion order
    #[must_use]
    pub fn members(&self) -> &[RawText] {
        &self.members
    }
}

/// A package manifest: namespace, API version and per-type member lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    namespace: RawText,
    version: RawText,
    types: Vec<TypeEntry>,
}

impl Manifest {
    /// Create an empty manifest for the given API version.
    #[must_use]
    pub fn new(version: impl Into<RawText>) -> Self {
        Self::with_namespace(METADATA_NAMESPACE, version)
    }

    fn with_namespace(namespace: impl Into<RawText>, version: impl Into<RawText>) -> Self {
        Self {
            namespace: namespace.into(),
            version: version.into(),
            types: Vec::new(),
        }
    }

    /// Add a member under a type, creating the type entry on first use.
    ///
    /// Returns `false` if the member was already listed under that type.
    pub fn add_member(&mut self, type_name: impl Into<RawText>, member: impl Into<RawText>) -> bool {
        let type_name = type_name.into();
        let member = member.into();

        let idx = match self.types.iter().position(|t| t.name == type_name) {
            Some(idx) => idx,
            None => {
                self.types.push(TypeEntry {
                    name: type_name,
                    members: Vec::new(),
                });
                self.types.len() - 1
            }
        };

        let entry = &mut self.types[idx];
        if entry.members.contains(&member) {
            return false;
        }
        entry.members.push(member);
        true
    }

    #[must_use]
    pub fn namespace(&self) -> &RawText {
        &self.namespace
    }

    #[must_use]
    pub fn version(&self) -> &RawText {
        &self.version
    }

    /// Type entries in first-seen order
    #[must_use]
    pub fn types(&self) -> &[TypeEntry] {
        &self.types
    }

    /// Members listed under `type_name`, if the type is present
    #[must_use]
    pub fn members(&self, type_name: &str) -> Option<&[RawText]> {
        self.types
            .iter()
            .find(|t| t.name == type_name)
            .map(|t| t.members.as_slice())
    }

    /// Number of type entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Serialize to a `package.xml` document.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError`] naming the first field that is not valid UTF-8.
    pub fn to_xml(&self) -> Result<String, EncodingError> {
        xml::write(self)
    }

    /// Parse a `package.xml` document.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] with the line and column of the first problem.
    pub fn from_xml(text: &str) -> Result<Self, ParseError> {
        xml::read(text)
    }
}
