use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

const IMAGE_EXTENSIONS: &[&str] = &["png", "tif", "tiff"];
const THUMBNAIL_MARKER: &str = "thumb";

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|i| ext.eq_ignore_ascii_case(i)))
        .unwrap_or(false)
}

/// Dot files and dot directories, including `._*` resource fork sidecars.
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

fn should_skip(entry: &DirEntry) -> bool {
    if entry.depth() == 0 {
        return false;
    }
    if is_hidden(entry.path()) {
        return true;
    }
    let name = entry.file_name().to_string_lossy();

    entry.file_type().is_dir() && name.contains(THUMBNAIL_MARKER)
}

fn is_file(entry: &DirEntry) -> bool {
    entry.file_type().is_file() || (entry.path_is_symlink() && entry.path().is_file())
}

/// Lazily yields every directory that directly holds at least one image file.
///
/// The walk is depth first. Once an image turns up in a directory, the rest of
/// that directory's entries are skipped, so each directory is yielded once and
/// subdirectories listed after the first image are not visited.
pub struct ImageDirScanner {
    roots: std::vec::IntoIter<PathBuf>,
    current: Option<walkdir::IntoIter>,
    sorted: bool,
}

impl ImageDirScanner {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let roots: Vec<PathBuf> = roots.into_iter().map(|r| r.as_ref().to_path_buf()).collect();
        Self {
            roots: roots.into_iter(),
            current: None,
            sorted: false,
        }
    }

    /// Visits entries of each directory in file name order.
    pub fn sorted(mut self) -> Self {
        self.sorted = true;
        self
    }

    fn walker(&self, root: &Path) -> walkdir::IntoIter {
        let walk = WalkDir::new(root).min_depth(0);
        if self.sorted {
            walk.sort_by_file_name().into_iter()
        } else {
            walk.into_iter()
        }
    }
}

impl Iterator for ImageDirScanner {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        loop {
            if self.current.is_none() {
                let root = self.roots.next()?;
                tracing::debug!("scanning root {}", root.display());
                self.current = Some(self.walker(&root));
            }
            let walker = self.current.as_mut()?;

            let Some(next) = walker.next() else {
                self.current = None;
                continue;
            };

            let entry = match next {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("skipping unreadable entry: {e}");
                    continue;
                }
            };

            if should_skip(&entry) {
                if entry.file_type().is_dir() {
                    walker.skip_current_dir();
                }
                continue;
            }

            if entry.depth() > 0 && is_file(&entry) && is_image_file(entry.path()) {
                let Some(parent) = entry.path().parent().map(Path::to_path_buf) else {
                    continue;
                };
                // done with this directory, move on to its siblings
                walker.skip_current_dir();
                return Some(parent);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    fn scan(root: &Path) -> Vec<PathBuf> {
        ImageDirScanner::new([root]).collect()
    }

    #[test]
    fn test_yields_leaf_image_dirs_once() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("proj/plateA/r01c01f01p01-ch1sk1fk1fl1.tif"));
        touch(&root.join("proj/plateA/r01c02f01p01-ch1sk1fk1fl1.TIFF"));
        touch(&root.join("proj/plateB/img.png"));
        touch(&root.join("proj/notes/readme.txt"));

        let found: HashSet<PathBuf> = scan(root).into_iter().collect();
        let expected: HashSet<PathBuf> =
            [root.join("proj/plateA"), root.join("proj/plateB")].into_iter().collect();
        assert_eq!(found, expected);
        assert_eq!(scan(root).len(), 2);
    }

    #[test]
    fn test_skips_hidden_and_thumbnail_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join(".snapshot/plate/a.tif"));
        touch(&root.join("plate/thumbs/a.png"));
        touch(&root.join("plate/my_thumbnails/deep/a.png"));
        touch(&root.join("plate/.hidden.tif"));

        assert!(scan(root).is_empty());
    }

    #[test]
    fn test_stops_descending_after_first_image() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("plateA/0_early/x.tif"));
        touch(&root.join("plateA/a.tif"));
        touch(&root.join("plateA/b_late/y.tif"));
        touch(&root.join("plateA/c.tif"));

        let found: Vec<PathBuf> = ImageDirScanner::new([root]).sorted().collect();
        assert_eq!(
            found,
            vec![root.join("plateA/0_early"), root.join("plateA")]
        );
    }

    #[test]
    fn test_hidden_names() {
        assert!(is_hidden(Path::new("/a/._r01c01f01p01-ch1sk1fk1fl1.tif")));
        assert!(is_hidden(Path::new("/a/.snapshot")));
        assert!(!is_hidden(Path::new("/a/plate.tif")));
    }

    #[test]
    fn test_case_insensitive_extensions() {
        assert!(is_image_file(Path::new("/a/b.TIF")));
        assert!(is_image_file(Path::new("/a/b.Png")));
        assert!(is_image_file(Path::new("/a/b.tiff")));
        assert!(!is_image_file(Path::new("/a/b.jpg")));
        assert!(!is_image_file(Path::new("/a/tif")));
    }

    #[test]
    fn test_multiple_roots_and_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let root_a = dir.path().join("a");
        let root_b = dir.path().join("b");
        touch(&root_a.join("p1/x.tif"));
        touch(&root_b.join("p2/y.png"));

        let found: HashSet<PathBuf> = ImageDirScanner::new([
            root_a.clone(),
            dir.path().join("missing"),
            root_b.clone(),
        ])
        .collect();
        assert_eq!(found.len(), 2);
        assert!(found.contains(&root_a.join("p1")));
        assert!(found.contains(&root_b.join("p2")));
    }

    #[test]
    fn test_images_directly_in_root() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("z.tif"));
        assert_eq!(scan(dir.path()), vec![dir.path().to_path_buf()]);
    }
}
