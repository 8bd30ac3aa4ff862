//! Region identifiers and their resolution from caller discriminators.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Characters the backend rejects in region names.
#[allow(clippy::expect_used)]
static DISALLOWED_REGION_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9 -]").expect("region pattern is valid"));

/// Strip every character outside `[A-Za-z0-9 -]`.
#[must_use]
pub fn sanitize_region_name(raw: &str) -> String {
    DISALLOWED_REGION_CHARS.replace_all(raw, "").into_owned()
}

/// A named partition of the cache backend
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Region(Arc<str>);

impl Region {
    /// Regions are only built by [`RegionKeyResolver`], which applies the
    /// instance prefix and schema version.
    fn new(name: &str) -> Self {
        Self(Arc::from(sanitize_region_name(name)))
    }

    /// The sanitized identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Region {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A caller-supplied value that selects a region, typically an enum variant.
///
/// ```
/// use cache_core::Discriminator;
///
/// #[derive(Debug)]
/// enum Catalog {
///     Products,
/// }
///
/// impl Discriminator for Catalog {}
///
/// assert_eq!(Catalog::Products.discriminator_type(), "Catalog");
/// assert_eq!(Catalog::Products.discriminator_value(), "Products");
/// ```
pub trait Discriminator: fmt::Debug {
    /// Name of the discriminator type; defaults to the unqualified type name
    fn discriminator_type(&self) -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// The discriminator value; defaults to the `Debug` rendering
    fn discriminator_value(&self) -> String {
        format!("{self:?}")
    }
}

/// Memoizing resolver from discriminators to regions.
///
/// Region names are `{instance_prefix}-{schema_version}-{type}-{value}` with the
/// disallowed characters removed. The first resolution of a discriminator wins;
/// later and concurrent resolutions return the same [`Region`].
#[derive(Debug)]
pub struct RegionKeyResolver {
    instance_prefix: String,
    schema_version: String,
    regions: RwLock<HashMap<(&'static str, String), Region>>,
}

impl RegionKeyResolver {
    /// Create a resolver for the given instance prefix and schema version
    pub fn new(instance_prefix: impl Into<String>, schema_version: impl Into<String>) -> Self {
        Self {
            instance_prefix: instance_prefix.into(),
            schema_version: schema_version.into(),
            regions: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve the region of a discriminator
    pub fn resolve<D: Discriminator + ?Sized>(&self, discriminator: &D) -> Region {
        let key = (
            discriminator.discriminator_type(),
            discriminator.discriminator_value(),
        );

        if let Some(region) = self.regions.read().get(&key) {
            return region.clone();
        }

        let candidate = self.build(key.0, &key.1);
        let mut regions = self.regions.write();
        let region = regions.entry(key).or_insert(candidate);
        debug!(region = %region, "Region resolved");
        region.clone()
    }

    /// Number of memoized regions
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.read().len()
    }

    /// Whether nothing has been resolved yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.read().is_empty()
    }

    /// Drop every memoized region
    pub fn reset(&self) {
        self.regions.write().clear();
    }

    fn build(&self, discriminator_type: &str, value: &str) -> Region {
        Region::new(&format!(
            "{}-{}-{}-{}",
            self.instance_prefix, self.schema_version, discriminator_type, value
        ))
    }
}
