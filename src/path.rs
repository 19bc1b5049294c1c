use std::borrow::Borrow;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Hierarchical item name, segments separated by dots (e.g. `sounds.explosion`).
///
/// Empty segments are dropped on construction, so `"a..b."` and `"a.b"` name the same item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DotPath(String);

impl DotPath {
    pub const SEPARATOR: char = '.';

    pub fn new(path: impl AsRef<str>) -> Self {
        let normalized = path
            .as_ref()
            .split(Self::SEPARATOR)
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join(".");
        Self(normalized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(Self::SEPARATOR).filter(|s| !s.is_empty())
    }

    /// The leaf segment, which is also the file name in hot storage.
    pub fn name(&self) -> &str {
        self.0
            .rsplit_once(Self::SEPARATOR)
            .map_or(self.0.as_str(), |(_, name)| name)
    }

    pub fn parent(&self) -> Option<DotPath> {
        self.0
            .rsplit_once(Self::SEPARATOR)
            .map(|(parent, _)| DotPath(parent.to_string()))
    }

    /// Whether `self` equals `prefix` or lies in the subtree below it.
    pub fn starts_with(&self, prefix: &DotPath) -> bool {
        if prefix.is_empty() {
            return true;
        }

        self.0 == prefix.0
            || (self.0.starts_with(&prefix.0) && self.0[prefix.0.len()..].starts_with(Self::SEPARATOR))
    }

    /// The leaf segment as a file name: [`DotPath::name`] with path separators escaped.
    pub fn file_name(&self) -> String {
        escape_segment(self.name())
    }

    /// Relative file system path: every dot becomes a directory separator. Segments are
    /// escaped so the result never leaves the folder it is joined to.
    ///
    /// An item's file and the folder of the items below it share a name, so `a` and `a.b`
    /// cannot both be kept in the same hot storage. Whichever is serialized second fails and
    /// stays where it is.
    pub fn to_relative_path(&self) -> PathBuf {
        self.segments().map(escape_segment).collect()
    }
}

/// Dots already split segments, so `.` and `..` cannot occur; separators and drive or stream
/// prefixes can.
fn escape_segment(segment: &str) -> String {
    segment.replace(['/', '\\', ':'], "_")
}

impl Display for DotPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DotPath {
    fn from(value: &str) -> Self {
        DotPath::new(value)
    }
}

impl From<String> for DotPath {
    fn from(value: String) -> Self {
        DotPath::new(value)
    }
}

impl From<&DotPath> for DotPath {
    fn from(value: &DotPath) -> Self {
        value.clone()
    }
}

impl Borrow<str> for DotPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for DotPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn normalization() {
        assert_eq!(DotPath::new("a..b."), DotPath::new("a.b"));
        assert_eq!(DotPath::new(" textures . wall ").as_str(), "textures.wall");
        assert!(DotPath::new("..").is_empty());
    }

    #[test]
    fn name_and_parent() {
        let path = DotPath::new("sounds.weapons.explosion");
        assert_eq!(path.name(), "explosion");
        assert_eq!(path.parent(), Some(DotPath::new("sounds.weapons")));
        assert_eq!(DotPath::new("leaf").parent(), None);
        assert_eq!(DotPath::new("leaf").name(), "leaf");
    }

    #[test]
    fn subtree_prefix() {
        let path = DotPath::new("sounds.explosion");
        assert!(path.starts_with(&DotPath::new("sounds")));
        assert!(path.starts_with(&DotPath::new("sounds.explosion")));
        assert!(path.starts_with(&DotPath::new("")));
        assert!(!path.starts_with(&DotPath::new("sound")));
        assert!(!path.starts_with(&DotPath::new("sounds.explosion.big")));
    }

    #[test]
    fn separators_cannot_escape_the_folder() {
        let path = DotPath::new("a./tmp/x");
        assert_eq!(path.as_str(), "a./tmp/x");
        assert_eq!(path.to_relative_path(), Path::new("a").join("_tmp_x"));
        assert!(path.to_relative_path().is_relative());
        assert_eq!(path.file_name(), "_tmp_x");
        assert_eq!(DotPath::new(r"C:\windows").to_relative_path(), Path::new("C__windows"));
    }

    #[test]
    fn dots_become_directories() {
        let path = DotPath::new("models.monsters.imp");
        assert_eq!(path.to_relative_path(), Path::new("models").join("monsters").join("imp"));
    }
}
