//! Grouping changed paths into directory buckets.
//!
//! Paths under the metadata root are split into a bucket (the first
//! directory below the root) and the path inside that bucket. Fields and
//! list views live inside object directories but are deployed as their own
//! types, so `objects/<Object>/fields/...` and `objects/<Object>/listViews/...`
//! are moved to the `fields` and `listViews` buckets.

use std::collections::BTreeMap;

use crate::git::{ChangeSource, ChangedPath, DiffExecutionError};

/// Directory under which all deployable sources live
pub const METADATA_ROOT: &str = "force-app/main/default";

const OBJECTS_BUCKET: &str = "objects";
const NESTED_BUCKETS: [&str; 2] = ["fields", "listViews"];

/// Changed files grouped by bucket name.
///
/// Buckets iterate in name order; paths inside a bucket keep the order in
/// which they were classified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeBuckets {
    buckets: BTreeMap<String, Vec<String>>,
}

impl ChangeBuckets {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a bucket-relative path to `bucket`
    pub fn insert(&mut self, bucket: impl Into<String>, path: impl Into<String>) {
        self.buckets.entry(bucket.into()).or_default().push(path.into());
    }

    #[must_use]
    pub fn get(&self, bucket: &str) -> Option<&[String]> {
        self.buckets.get(bucket).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.buckets.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of buckets
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

impl<'a> IntoIterator for &'a ChangeBuckets {
    type Item = (&'a str, &'a [String]);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a [String])> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// Split a repository-relative path into `(bucket, bucket-relative path)`.
///
/// Returns `None` for paths outside [`METADATA_ROOT`] and for files lying
/// directly in it.
///
/// # Examples
/// ```
/// use sfpkg::classify::bucket_path;
///
/// assert_eq!(
///     bucket_path("force-app/main/default/classes/Foo.cls"),
///     Some(("classes", "Foo.cls"))
/// );
/// assert_eq!(
///     bucket_path("force-app/main/default/objects/Account/fields/Bar__c.field-meta.xml"),
///     Some(("fields", "Account/fields/Bar__c.field-meta.xml"))
/// );
/// assert_eq!(bucket_path("force-app/main/default/README.md"), None);
/// ```
#[must_use]
pub fn bucket_path(path: &str) -> Option<(&str, &str)> {
    let relative = path.strip_prefix(METADATA_ROOT)?.strip_prefix('/')?;
    let (bucket, rest) = relative.split_once('/')?;
    if bucket.is_empty() || rest.is_empty() {
        return None;
    }

    if bucket == OBJECTS_BUCKET {
        let nested = NESTED_BUCKETS
            .into_iter()
            .find(|marker| rest.contains(&format!("/{marker}/")));
        if let Some(nested) = nested {
            return Some((nested, rest));
        }
    }

    Some((bucket, rest))
}

/// Group changed paths into buckets, dropping deletions and paths that
/// cannot be classified.
#[must_use]
pub fn classify<I>(changes: I) -> ChangeBuckets
where
    I: IntoIterator<Item = ChangedPath>,
{
    let mut buckets = ChangeBuckets::new();

    for change in changes {
        if change.status.is_deletion() {
            tracing::debug!(path = %change.path, "skipping deleted path");
            continue;
        }
        match bucket_path(&change.path) {
            Some((bucket, relative)) => buckets.insert(bucket, relative),
            None => tracing::debug!(path = %change.path, "skipping path outside metadata buckets"),
        }
    }

    buckets
}

/// List the changes between `from` and `to` and bucket them.
///
/// # Errors
///
/// Returns [`DiffExecutionError`] if the change listing fails; nothing is
/// classified in that case.
pub fn classify_changes<S>(source: &S, from: &str, to: &str) -> Result<ChangeBuckets, DiffExecutionError>
where
    S: ChangeSource + ?Sized,
{
    let buckets = classify(source.changed_paths(from, to)?);
    for (bucket, paths) in &buckets {
        tracing::debug!(bucket, count = paths.len(), "classified bucket");
    }
    Ok(buckets)
}
