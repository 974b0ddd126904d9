use super::models::NodeKind;
use std::fs::{self, OpenOptions};
use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};

/*
 * This module defines the hierarchical content provider boundary: the
 * capability interface through which the erasure engine enumerates, opens,
 * measures and deletes entries. The engine does not know whether the
 * provider is backed by a local filesystem, a content-resolver abstraction
 * or a remote document tree; `FsContentProvider` is the concrete
 * implementation over `std::fs` used by the command-line front end and the
 * filesystem tests.
 */

#[derive(Debug)]
pub enum ProviderError {
    Io(io::Error),
    InvalidPath(PathBuf),
}

impl From<io::Error> for ProviderError {
    fn from(err: io::Error) -> Self {
        ProviderError::Io(err)
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderError::Io(e) => write!(f, "Provider I/O error: {e}"),
            ProviderError::InvalidPath(p) => write!(f, "Invalid provider path: {p:?}"),
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProviderError::Io(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/*
 * A writable byte stream positioned by the leaf eraser. Overwrite passes
 * only need seek-to-start, sequential writes and a flush, so any seekable
 * writer qualifies; tests substitute in-memory handles.
 */
pub trait WritableByteTarget: Write + Seek + Send {}

impl<T: Write + Seek + Send> WritableByteTarget for T {}

/*
 * One direct child of a container, as reported by `list_children`. The byte
 * length of leaves is measured separately so that discovery controls when
 * measurement happens relative to mutation.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildEntry {
    pub path: PathBuf,
    pub name: String,
    pub kind: NodeKind,
}

/*
 * Defines the operations the erasure engine consumes from a hierarchical
 * content source. Implementations must not follow destructive shortcuts of
 * their own: `delete` removes exactly the named entry (a non-empty container
 * fails), and `open_for_write` must hand back a handle positioned at offset
 * zero without truncating existing content, since the overwrite passes need
 * the original length to stay addressable.
 */
pub trait ContentProviderOperations: Send + Sync {
    fn kind_of(&self, path: &Path) -> Result<NodeKind>;
    fn list_children(&self, container: &Path) -> Result<Vec<ChildEntry>>;
    fn measure(&self, leaf: &Path) -> Result<u64>;
    fn open_for_write(&self, leaf: &Path) -> Result<Box<dyn WritableByteTarget>>;
    fn delete(&self, path: &Path) -> Result<()>;
}

/*
 * The `std::fs` implementation of `ContentProviderOperations`. Symbolic
 * links are classified as leaves and the link entry itself is what gets
 * deleted: they measure as zero-length and are never opened for writing,
 * since following a link would overwrite a file outside the tree being
 * erased. Directory-ness is taken from the entry metadata without following
 * links, so a link loop can never masquerade as a container here.
 */
pub struct FsContentProvider {}

impl FsContentProvider {
    pub fn new() -> Self {
        FsContentProvider {}
    }
}

impl Default for FsContentProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentProviderOperations for FsContentProvider {
    fn kind_of(&self, path: &Path) -> Result<NodeKind> {
        let metadata = fs::symlink_metadata(path)?;
        if metadata.is_dir() {
            Ok(NodeKind::Container)
        } else {
            Ok(NodeKind::Leaf)
        }
    }

    fn list_children(&self, container: &Path) -> Result<Vec<ChildEntry>> {
        if !container.is_dir() {
            return Err(ProviderError::InvalidPath(container.to_path_buf()));
        }
        let mut children = Vec::new();
        for entry in fs::read_dir(container)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let kind = if file_type.is_dir() {
                NodeKind::Container
            } else {
                NodeKind::Leaf
            };
            children.push(ChildEntry {
                path: entry.path(),
                name: entry.file_name().to_string_lossy().into_owned(),
                kind,
            });
        }
        // Deterministic processing order, matching what a document-tree
        // provider presents to the user.
        children.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(children)
    }

    fn measure(&self, leaf: &Path) -> Result<u64> {
        let metadata = fs::symlink_metadata(leaf)?;
        // A link holds no content of its own; erasing it means deleting the
        // link entry, so there is nothing to overwrite.
        if metadata.file_type().is_symlink() {
            return Ok(0);
        }
        Ok(metadata.len())
    }

    fn open_for_write(&self, leaf: &Path) -> Result<Box<dyn WritableByteTarget>> {
        // `open` would follow a link and hand back a handle to the link's
        // target, outside the tree being erased. Refuse instead.
        if fs::symlink_metadata(leaf)?.file_type().is_symlink() {
            return Err(ProviderError::InvalidPath(leaf.to_path_buf()));
        }
        let file = OpenOptions::new().write(true).open(leaf)?;
        Ok(Box::new(file))
    }

    fn delete(&self, path: &Path) -> Result<()> {
        let metadata = fs::symlink_metadata(path)?;
        if metadata.is_dir() {
            // remove_dir fails on non-empty directories, which is exactly the
            // contract: a container whose children survived must not vanish.
            fs::remove_dir(path)?;
        } else {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write as _;
    use tempfile::tempdir;

    #[test]
    fn test_kind_of_distinguishes_containers_and_leaves() -> Result<()> {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("leaf.bin");
        File::create(&file_path).unwrap();

        let provider = FsContentProvider::new();
        assert_eq!(provider.kind_of(dir.path())?, NodeKind::Container);
        assert_eq!(provider.kind_of(&file_path)?, NodeKind::Leaf);
        Ok(())
    }

    #[test]
    fn test_list_children_reports_kind_and_sorted_names() -> Result<()> {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("zeta_dir")).unwrap();
        File::create(dir.path().join("alpha.txt")).unwrap();
        File::create(dir.path().join("beta.txt")).unwrap();

        let provider = FsContentProvider::new();
        let children = provider.list_children(dir.path())?;

        let names: Vec<&str> = children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["alpha.txt", "beta.txt", "zeta_dir"]);
        assert_eq!(children[0].kind, NodeKind::Leaf);
        assert_eq!(children[2].kind, NodeKind::Container);
        Ok(())
    }

    #[test]
    fn test_list_children_on_leaf_is_invalid_path() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("not_a_dir.txt");
        File::create(&file_path).unwrap();

        let provider = FsContentProvider::new();
        let result = provider.list_children(&file_path);
        assert!(matches!(result, Err(ProviderError::InvalidPath(_))));
    }

    #[test]
    fn test_measure_returns_logical_length() -> Result<()> {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("sized.bin");
        let mut file = File::create(&file_path).unwrap();
        file.write_all(&[0xAB; 1234]).unwrap();
        file.sync_all().unwrap();

        let provider = FsContentProvider::new();
        assert_eq!(provider.measure(&file_path)?, 1234);
        Ok(())
    }

    #[test]
    fn test_open_for_write_does_not_truncate() -> Result<()> {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("keep_length.bin");
        std::fs::write(&file_path, [0x11; 512]).unwrap();

        let provider = FsContentProvider::new();
        {
            let mut handle = provider.open_for_write(&file_path)?;
            handle.write_all(&[0x00; 16]).unwrap();
            handle.flush().unwrap();
        }
        assert_eq!(provider.measure(&file_path)?, 512);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_measures_zero_and_is_never_opened() {
        use std::os::unix::fs::symlink;

        // Arrange: a link inside the tree pointing at a file outside it.
        let outside = tempdir().unwrap();
        let victim = outside.path().join("victim.bin");
        std::fs::write(&victim, [0xAB; 64]).unwrap();
        let dir = tempdir().unwrap();
        let link = dir.path().join("link");
        symlink(&victim, &link).unwrap();

        let provider = FsContentProvider::new();

        // Act / Assert: a leaf with no content of its own and no handle.
        assert_eq!(provider.kind_of(&link).unwrap(), NodeKind::Leaf);
        assert_eq!(provider.measure(&link).unwrap(), 0);
        assert!(matches!(
            provider.open_for_write(&link),
            Err(ProviderError::InvalidPath(_))
        ));

        // Deleting removes the link entry; the target is untouched.
        provider.delete(&link).unwrap();
        assert!(!link.exists());
        assert_eq!(std::fs::read(&victim).unwrap(), vec![0xAB; 64]);
    }

    #[test]
    fn test_delete_refuses_non_empty_container() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("occupied");
        std::fs::create_dir(&sub).unwrap();
        File::create(sub.join("inhabitant.txt")).unwrap();

        let provider = FsContentProvider::new();
        assert!(provider.delete(&sub).is_err());
        assert!(sub.exists());

        provider.delete(&sub.join("inhabitant.txt")).unwrap();
        provider.delete(&sub).unwrap();
        assert!(!sub.exists());
    }
}
