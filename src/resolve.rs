//! Turning change buckets into manifest members.

use std::fmt;

use crate::classify::ChangeBuckets;
use crate::manifest::Manifest;
use crate::metadata::{MemberRule, MetadataType};

/// Member listed for every type of a full package
pub const WILDCARD: &str = "*";

/// A bucket with no metadata type; its files were left out of the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmappedBucket {
    pub bucket: String,
    pub files: usize,
}

impl fmt::Display for UnmappedBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unknown metadata type for directory '{}' ({} file(s) skipped)",
            self.bucket, self.files
        )
    }
}

/// A manifest built from change buckets, plus the buckets it had to skip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub manifest: Manifest,
    pub warnings: Vec<UnmappedBucket>,
}

/// Build a manifest listing the members touched by `buckets`.
///
/// Buckets without a metadata type are reported in
/// [`Resolution::warnings`] instead of failing the whole manifest.
///
/// # Examples
/// ```
/// use sfpkg::classify::ChangeBuckets;
/// use sfpkg::resolve::resolve;
///
/// let mut buckets = ChangeBuckets::new();
/// buckets.insert("classes", "Foo.cls");
/// buckets.insert("classes", "Foo.cls-meta.xml");
/// buckets.insert("reports", "Sales/Q1.report-meta.xml");
///
/// let resolution = resolve(&buckets, "58.0");
/// assert_eq!(resolution.manifest.members("ApexClass").unwrap().len(), 1);
/// assert_eq!(resolution.warnings[0].bucket, "reports");
/// ```
#[must_use]
pub fn resolve(buckets: &ChangeBuckets, api_version: &str) -> Resolution {
    let mut manifest = Manifest::new(api_version);
    let mut warnings = Vec::new();

    for (bucket, paths) in buckets {
        let Some(kind) = MetadataType::from_directory(bucket) else {
            let warning = UnmappedBucket {
                bucket: bucket.to_string(),
                files: paths.len(),
            };
            tracing::warn!("{warning}");
            warnings.push(warning);
            continue;
        };

        let rule = kind.member_rule();
        if rule == MemberRule::WildcardOnly {
            tracing::debug!(%kind, count = paths.len(), "no member rule for type; skipping changed files");
            continue;
        }

        for path in paths {
            match rule.member_name(path) {
                Some(member) => {
                    if manifest.add_member(kind, member.as_str()) {
                        tracing::debug!(%kind, %member, "added member");
                    }
                }
                None => tracing::debug!(%kind, path = %path, "path does not name a member"),
            }
        }
    }

    Resolution { manifest, warnings }
}

/// Build a manifest listing `*` for every type in the full-package catalog.
///
/// # Examples
/// ```
/// let manifest = sfpkg::resolve::full_package("58.0");
/// assert_eq!(manifest.len(), 23);
/// ```
#[must_use]
pub fn full_package(api_version: &str) -> Manifest {
    let mut manifest = Manifest::new(api_version);
    for kind in MetadataType::full_package() {
        manifest.add_member(kind, WILDCARD);
    }
    manifest
}
