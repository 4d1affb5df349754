//! Version selection over catalog versions.

use std::cmp::Ordering;

use jumpship_core::ModelVersion;

/// Dotted numeric version as used by catalog entries, e.g. `1.2.0`.
#[derive(Debug, Clone)]
pub struct CatalogVersion(Vec<u64>);

impl CatalogVersion {
    /// Parse a dotted numeric version. Returns `None` for anything else.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        raw.split('.')
            .map(|part| part.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()
            .filter(|parts| !parts.is_empty())
            .map(Self)
    }

    fn starts_with(&self, prefix: &[u64]) -> bool {
        self.0.starts_with(prefix)
    }
}

impl Ord for CatalogVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        // Missing trailing components count as zero: 1.2 == 1.2.0.
        let len = self.0.len().max(other.0.len());
        (0..len)
            .map(|i| {
                let a = self.0.get(i).copied().unwrap_or(0);
                let b = other.0.get(i).copied().unwrap_or(0);
                a.cmp(&b)
            })
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialEq for CatalogVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for CatalogVersion {}

impl PartialOrd for CatalogVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// How a [`ModelVersion`] picks among available versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSelector {
    /// Highest version.
    Latest,
    /// Highest version whose leading components equal these.
    Prefix(Vec<u64>),
    /// Exactly this version string.
    Exact(String),
}

impl VersionSelector {
    /// Interpret a version selector.
    #[must_use]
    pub fn new(version: &ModelVersion) -> Self {
        let raw = version.as_str();
        if raw == ModelVersion::LATEST {
            return Self::Latest;
        }
        if let Some(prefix) = raw.strip_suffix(".*") {
            if let Some(CatalogVersion(parts)) = CatalogVersion::parse(prefix) {
                return Self::Prefix(parts);
            }
        }
        Self::Exact(raw.to_owned())
    }

    /// Pick the best matching version from `available`.
    ///
    /// Returns the index into `available`.
    pub fn select<'a>(&self, available: impl IntoIterator<Item = &'a str>) -> Option<usize> {
        let available: Vec<&str> = available.into_iter().collect();
        match self {
            Self::Exact(wanted) => available.iter().position(|v| *v == wanted.as_str()),
            Self::Latest => Self::highest(&available, |_| true),
            Self::Prefix(prefix) => Self::highest(&available, |v| v.starts_with(prefix)),
        }
    }

    fn highest(available: &[&str], keep: impl Fn(&CatalogVersion) -> bool) -> Option<usize> {
        available
            .iter()
            .enumerate()
            .filter_map(|(i, raw)| CatalogVersion::parse(raw).map(|v| (i, v)))
            .filter(|(_, v)| keep(v))
            .max_by(|(_, a), (_, b)| a.cmp(b))
            .map(|(i, _)| i)
    }
}
