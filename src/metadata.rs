//! The fixed catalog of metadata types this tool knows about.
//!
//! Every type is described by one row of a static table: the source
//! directory it lives in under the metadata root, its manifest identifier,
//! and the rule used to turn a changed file path into a member name.
//! Adding a type is a table edit.

use std::fmt;
use std::str::FromStr;

/// A metadata type identifier from the closed catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetadataType {
    ApexClass,
    ApexTrigger,
    CustomObject,
    CustomField,
    CustomObjectTranslation,
    CustomPermission,
    CustomTab,
    ExperienceBundle,
    FlexiPage,
    Flow,
    GlobalPicklist,
    GlobalValueSet,
    GlobalValueSetTranslation,
    LightningComponentBundle,
    LightningMessageChannel,
    MilestoneType,
    PermissionSet,
    PermissionSetGroup,
    PlatformEventChannel,
    Profile,
    Queue,
    StandardValueSet,
    StandardValueSetTranslation,
    StaticResource,
    ListView,
}

/// How a member name is derived from a bucket-relative file path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberRule {
    /// Last path segment with everything from its first `.` removed
    /// (`Foo.cls-meta.xml` -> `Foo`).
    StripExtension,
    /// `<Parent>/<marker>/<Child>.<ext>` -> `Parent.Child`.
    ParentChild { marker: &'static str },
    /// The first path segment. With `require_nested`, files lying directly
    /// in the bucket (no bundle directory) yield nothing.
    FirstSegment { require_nested: bool },
    /// Only ever listed as `*` in a full package.
    WildcardOnly,
}

impl MemberRule {
    /// Derive a member name from a path relative to the type's bucket.
    ///
    /// Returns `None` when the path does not have the shape the rule needs.
    ///
    /// # Examples
    /// ```
    /// use sfpkg::metadata::MemberRule;
    ///
    /// let rule = MemberRule::ParentChild { marker: "fields" };
    /// assert_eq!(
    ///     rule.member_name("Account/fields/Bar__c.field-meta.xml").as_deref(),
    ///     Some("Account.Bar__c")
    /// );
    /// assert_eq!(rule.member_name("Account/Account.object-meta.xml"), None);
    /// ```
    #[must_use]
    pub fn member_name(&self, path: &str) -> Option<String> {
        let segments: Vec<&str> = path.split('/').collect();

        match *self {
            MemberRule::StripExtension => segments.last().and_then(|s| stem(s)).map(str::to_string),
            MemberRule::ParentChild { marker } => match segments.as_slice() {
                [parent, m, child] if *m == marker && !parent.is_empty() => {
                    stem(child).map(|child| format!("{parent}.{child}"))
                }
                _ => None,
            },
            MemberRule::FirstSegment { require_nested } => {
                if require_nested && segments.len() < 2 {
                    return None;
                }
                segments.first().filter(|s| !s.is_empty()).map(|s| s.to_string())
            }
            MemberRule::WildcardOnly => None,
        }
    }
}

/// File name up to its first `.`; `None` when that leaves nothing.
fn stem(file_name: &str) -> Option<&str> {
    let stem = file_name.split('.').next().unwrap_or_default();
    (!stem.is_empty()).then_some(stem)
}

struct Entry {
    kind: MetadataType,
    name: &'static str,
    directory: &'static str,
    rule: MemberRule,
    full_package: bool,
}

const fn entry(
    kind: MetadataType,
    name: &'static str,
    directory: &'static str,
    rule: MemberRule,
    full_package: bool,
) -> Entry {
    Entry {
        kind,
        name,
        directory,
        rule,
        full_package,
    }
}

use MemberRule::{FirstSegment, ParentChild, StripExtension, WildcardOnly};
use MetadataType as M;

// Rows are in declaration order of `MetadataType`; `Entry::of` indexes by discriminant.
static CATALOG: [Entry; 25] = [
    entry(M::ApexClass, "ApexClass", "classes", StripExtension, true),
    entry(M::ApexTrigger, "ApexTrigger", "triggers", StripExtension, true),
    entry(
        M::CustomObject,
        "CustomObject",
        "objects",
        FirstSegment {
            require_nested: false,
        },
        true,
    ),
    entry(
        M::CustomField,
        "CustomField",
        "fields",
        ParentChild { marker: "fields" },
        false,
    ),
    entry(
        M::CustomObjectTranslation,
        "CustomObjectTranslation",
        "objectTranslations",
        WildcardOnly,
        true,
    ),
    entry(
        M::CustomPermission,
        "CustomPermission",
        "customPermissions",
        StripExtension,
        true,
    ),
    entry(M::CustomTab, "CustomTab", "tabs", WildcardOnly, true),
    entry(
        M::ExperienceBundle,
        "ExperienceBundle",
        "experiences",
        WildcardOnly,
        true,
    ),
    entry(M::FlexiPage, "FlexiPage", "flexipages", WildcardOnly, true),
    entry(M::Flow, "Flow", "flows", StripExtension, true),
    entry(
        M::GlobalPicklist,
        "GlobalPicklist",
        "globalPicklists",
        WildcardOnly,
        true,
    ),
    entry(
        M::GlobalValueSet,
        "GlobalValueSet",
        "globalValueSets",
        StripExtension,
        true,
    ),
    entry(
        M::GlobalValueSetTranslation,
        "GlobalValueSetTranslation",
        "globalValueSetTranslations",
        WildcardOnly,
        true,
    ),
    entry(
        M::LightningComponentBundle,
        "LightningComponentBundle",
        "lwc",
        FirstSegment {
            require_nested: true,
        },
        true,
    ),
    entry(
        M::LightningMessageChannel,
        "LightningMessageChannel",
        "messageChannels",
        WildcardOnly,
        true,
    ),
    entry(
        M::MilestoneType,
        "MilestoneType",
        "milestoneTypes",
        WildcardOnly,
        true,
    ),
    entry(
        M::PermissionSet,
        "PermissionSet",
        "permissionsets",
        StripExtension,
        true,
    ),
    entry(
        M::PermissionSetGroup,
        "PermissionSetGroup",
        "permissionsetgroups",
        WildcardOnly,
        true,
    ),
    entry(
        M::PlatformEventChannel,
        "PlatformEventChannel",
        "platformEventChannels",
        WildcardOnly,
        true,
    ),
    entry(M::Profile, "Profile", "profiles", StripExtension, true),
    entry(M::Queue, "Queue", "queues", WildcardOnly, true),
    entry(
        M::StandardValueSet,
        "StandardValueSet",
        "standardValueSets",
        StripExtension,
        true,
    ),
    entry(
        M::StandardValueSetTranslation,
        "StandardValueSetTranslation",
        "standardValueSetTranslations",
        WildcardOnly,
        true,
    ),
    entry(
        M::StaticResource,
        "StaticResource",
        "staticresources",
        WildcardOnly,
        true,
    ),
    entry(
        M::ListView,
        "ListView",
        "listViews",
        ParentChild {
            marker: "listViews",
        },
        false,
    ),
];

impl Entry {
    fn of(kind: MetadataType) -> &'static Entry {
        &CATALOG[kind as usize]
    }
}

impl MetadataType {
    /// Look up the type stored under a directory bucket.
    ///
    /// # Examples
    /// ```
    /// use sfpkg::metadata::MetadataType;
    ///
    /// assert_eq!(MetadataType::from_directory("classes"), Some(MetadataType::ApexClass));
    /// assert_eq!(MetadataType::from_directory("reports"), None);
    /// ```
    #[must_use]
    pub fn from_directory(directory: &str) -> Option<Self> {
        CATALOG
            .iter()
            .find(|e| e.directory == directory)
            .map(|e| e.kind)
    }

    /// Manifest identifier, e.g. `ApexClass`
    #[must_use]
    pub fn name(self) -> &'static str {
        Entry::of(self).name
    }

    /// Source directory bucket, e.g. `classes`
    #[must_use]
    pub fn directory(self) -> &'static str {
        Entry::of(self).directory
    }

    #[must_use]
    pub fn member_rule(self) -> MemberRule {
        Entry::of(self).rule
    }

    /// Every type in the catalog, in table order.
    pub fn all() -> impl Iterator<Item = MetadataType> {
        CATALOG.iter().map(|e| e.kind)
    }

    /// The types listed with a `*` member in a full package.
    pub fn full_package() -> impl Iterator<Item = MetadataType> {
        CATALOG.iter().filter(|e| e.full_package).map(|e| e.kind)
    }
}

impl fmt::Display for MetadataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when parsing a name outside the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMetadataType(pub String);

impl fmt::Display for UnknownMetadataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown metadata type '{}'", self.0)
    }
}

impl std::error::Error for UnknownMetadataType {}

impl FromStr for MetadataType {
    type Err = UnknownMetadataType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CATALOG
            .iter()
            .find(|e| e.name == s)
            .map(|e| e.kind)
            .ok_or_else(|| UnknownMetadataType(s.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    #[test]
    fn table_rows_follow_enum_order() {
        for (i, e) in CATALOG.iter().enumerate() {
            assert_eq!(e.kind as usize, i, "row for {} is out of place", e.name);
            assert_eq!(format!("{:?}", e.kind), e.name);
        }
    }

    #[test]
    fn directories_map_to_types() {
        let cases = [
            ("classes", M::ApexClass),
            ("triggers", M::ApexTrigger),
            ("objects", M::CustomObject),
            ("fields", M::CustomField),
            ("objectTranslations", M::CustomObjectTranslation),
            ("customPermissions", M::CustomPermission),
            ("tabs", M::CustomTab),
            ("experiences", M::ExperienceBundle),
            ("flexipages", M::FlexiPage),
            ("flows", M::Flow),
            ("globalPicklists", M::GlobalPicklist),
            ("globalValueSets", M::GlobalValueSet),
            ("globalValueSetTranslations", M::GlobalValueSetTranslation),
            ("lwc", M::LightningComponentBundle),
            ("messageChannels", M::LightningMessageChannel),
            ("milestoneTypes", M::MilestoneType),
            ("permissionsets", M::PermissionSet),
            ("permissionsetgroups", M::PermissionSetGroup),
            ("platformEventChannels", M::PlatformEventChannel),
            ("profiles", M::Profile),
            ("queues", M::Queue),
            ("standardValueSets", M::StandardValueSet),
            ("standardValueSetTranslations", M::StandardValueSetTranslation),
            ("staticresources", M::StaticResource),
            ("listViews", M::ListView),
        ];
        assert_eq!(cases.len(), MetadataType::all().count());
        for (dir, kind) in cases {
            assert_eq!(MetadataType::from_directory(dir), Some(kind), "{dir}");
            assert_eq!(kind.directory(), dir);
        }
    }

    #[test]
    fn directory_lookup_is_case_sensitive() {
        assert_eq!(MetadataType::from_directory("Classes"), None);
        assert_eq!(MetadataType::from_directory(""), None);
        assert_eq!(MetadataType::from_directory("aura"), None);
    }

    #[test]
    fn full_package_catalog_has_23_types() {
        let types: Vec<_> = MetadataType::full_package().collect();
        assert_eq!(types.len(), 23);
        assert!(!types.contains(&M::CustomField));
        assert!(!types.contains(&M::ListView));
        assert_eq!(types.first(), Some(&M::ApexClass));
        assert_eq!(types.last(), Some(&M::StaticResource));
    }

    #[test]
    fn names_parse_back() {
        for kind in MetadataType::all() {
            assert_eq!(kind.name().parse::<MetadataType>().unwrap(), kind);
            assert_eq!(kind.to_string(), kind.name());
        }
        assert!("Workflow".parse::<MetadataType>().is_err());
    }

    #[test]
    fn strip_extension_uses_first_dot() {
        let rule = M::ApexClass.member_rule();
        assert_eq!(rule.member_name("Foo.cls").as_deref(), Some("Foo"));
        assert_eq!(rule.member_name("Foo.cls-meta.xml").as_deref(), Some("Foo"));
        assert_eq!(
            M::Flow.member_rule().member_name("Lead_Router.flow-meta.xml").as_deref(),
            Some("Lead_Router")
        );
        assert_eq!(rule.member_name("nested/dir/Bar.cls").as_deref(), Some("Bar"));
        assert_eq!(rule.member_name(".hidden"), None);
    }

    #[test]
    fn parent_child_requires_exact_shape() {
        let rule = M::CustomField.member_rule();
        assert_eq!(
            rule.member_name("Account/fields/Bar__c.field-meta.xml").as_deref(),
            Some("Account.Bar__c")
        );
        assert_eq!(rule.member_name("Account/listViews/All.listView-meta.xml"), None);
        assert_eq!(rule.member_name("fields/Bar__c.field-meta.xml"), None);
        assert_eq!(rule.member_name("Account/fields/sub/Bar__c.field-meta.xml"), None);

        let rule = M::ListView.member_rule();
        assert_eq!(
            rule.member_name("Case/listViews/Open.listView-meta.xml").as_deref(),
            Some("Case.Open")
        );
    }

    #[test]
    fn bundles_need_a_directory() {
        let rule = M::LightningComponentBundle.member_rule();
        assert_eq!(rule.member_name("myButton/myButton.js").as_deref(), Some("myButton"));
        assert_eq!(rule.member_name("jsconfig.json"), None);

        let rule = M::CustomObject.member_rule();
        assert_eq!(
            rule.member_name("Account/Account.object-meta.xml").as_deref(),
            Some("Account")
        );
        assert_eq!(rule.member_name("Account").as_deref(), Some("Account"));
    }

    #[test]
    fn wildcard_only_never_derives() {
        assert_eq!(M::StaticResource.member_rule().member_name("logo.png"), None);
        assert_eq!(M::Queue.member_rule().member_name("Support.queue-meta.xml"), None);
    }
}
