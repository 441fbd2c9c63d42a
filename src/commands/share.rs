use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::auth::Session;
use crate::error::{Error, Result};
use crate::files::{self, upload};
use crate::permissions::{self, Role};

/// The whole pipeline behind the `gdshare` binary: mirror `local_root`
/// into Drive under `parent`, then grant `role` to `email` on the root
/// folder. Returns the root folder id.
pub async fn share(
    local_root: impl AsRef<Path>,
    parent: &str,
    email: &str,
    role: Role,
    session: &Session,
) -> Result<String> {
    let local_root = local_root.as_ref();
    if !local_root.exists() {
        return Err(Error::Upload(format!(
            "folder {} does not exist",
            local_root.display()
        )));
    }
    if !local_root.is_dir() {
        return Err(Error::Upload(format!(
            "{} is not a directory",
            local_root.display()
        )));
    }

    let folder_id = upload_tree(local_root, parent, &session.access_token).await?;
    permissions::grant(&folder_id, email, role, &session.access_token).await?;
    Ok(folder_id)
}

/// A local tree entry with its path relative to the walked root. Parent
/// directories always precede their contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TreeEntry {
    Dir(PathBuf),
    File(PathBuf),
}

pub(crate) fn walk_tree(root: &Path) -> Result<Vec<TreeEntry>> {
    let mut entries = vec![];
    let mut dirs = vec![PathBuf::new()];
    let mut index = 0;

    while index < dirs.len() {
        let rel_dir = dirs[index].clone();
        index += 1;

        let dir = root.join(&rel_dir);
        let read_dir = std::fs::read_dir(&dir)
            .map_err(|e| Error::Upload(format!("cannot read {}: {}", dir.display(), e)))?;
        let mut children: Vec<_> = read_dir
            .collect::<std::io::Result<_>>()
            .map_err(|e| Error::Upload(format!("cannot read {}: {}", dir.display(), e)))?;
        children.sort_by_key(|entry| entry.file_name());

        for child in children {
            let rel = rel_dir.join(child.file_name());
            let file_type = child
                .file_type()
                .map_err(|e| Error::Upload(format!("cannot stat {}: {}", rel.display(), e)))?;
            if file_type.is_dir() {
                dirs.push(rel.clone());
                entries.push(TreeEntry::Dir(rel));
            } else if file_type.is_file() {
                entries.push(TreeEntry::File(rel));
            }
            // symlinks and special files are not mirrored
        }
    }

    Ok(entries)
}

/// Mirrors `local_root` into a remote folder under `parent` and returns
/// the remote root id. Folders are created or reused by name; files are
/// always uploaded as new entries, so re-running on an unchanged tree may
/// leave duplicates.
pub(crate) async fn upload_tree(local_root: &Path, parent: &str, token: &str) -> Result<String> {
    let root_name = local_root
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            Error::Upload(format!(
                "cannot derive a folder name from {}",
                local_root.display()
            ))
        })?;

    let root = files::ensure_folder(root_name, parent, token).await?;
    println!("Uploading {} to folder {} ...", local_root.display(), root.id);

    // Remote folder id for each relative directory seen so far.
    let mut folder_ids: HashMap<PathBuf, String> = HashMap::new();
    folder_ids.insert(PathBuf::new(), root.id.clone());

    for entry in walk_tree(local_root)? {
        match entry {
            TreeEntry::Dir(rel) => {
                let parent_id = &folder_ids[rel.parent().unwrap_or(Path::new(""))];
                let name = rel
                    .file_name()
                    .and_then(|n| n.to_str())
                    .ok_or_else(|| Error::Upload(format!("invalid name {}", rel.display())))?;
                let folder = files::ensure_folder(name, parent_id, token).await?;
                folder_ids.insert(rel, folder.id);
            }
            TreeEntry::File(rel) => {
                let parent_id = &folder_ids[rel.parent().unwrap_or(Path::new(""))];
                println!("Uploading {} ...", rel.display());
                upload::upload_file(local_root.join(&rel), parent_id, token).await?;
            }
        }
    }

    Ok(root.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk_tree_test() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join("b.txt"), b"b").unwrap();
        std::fs::write(root.join("a.txt"), b"a").unwrap();
        std::fs::create_dir(root.join("sub")).unwrap();
        std::fs::write(root.join("sub").join("c.txt"), b"c").unwrap();
        std::fs::create_dir(root.join("sub").join("inner")).unwrap();
        std::fs::write(root.join("sub").join("inner").join("d.txt"), b"d").unwrap();

        let entries = walk_tree(root).unwrap();
        assert_eq!(
            entries,
            vec![
                TreeEntry::File(PathBuf::from("a.txt")),
                TreeEntry::File(PathBuf::from("b.txt")),
                TreeEntry::Dir(PathBuf::from("sub")),
                TreeEntry::File(PathBuf::from("sub/c.txt")),
                TreeEntry::Dir(PathBuf::from("sub/inner")),
                TreeEntry::File(PathBuf::from("sub/inner/d.txt")),
            ]
        );
    }

    #[test]
    fn walk_tree_parents_first_test() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("x/y/z")).unwrap();
        std::fs::write(root.join("x/y/z/deep.txt"), b"d").unwrap();

        let entries = walk_tree(root).unwrap();
        let mut seen_dirs = vec![PathBuf::new()];
        for entry in entries {
            match entry {
                TreeEntry::Dir(rel) => {
                    assert!(seen_dirs.contains(&rel.parent().unwrap().to_path_buf()));
                    seen_dirs.push(rel);
                }
                TreeEntry::File(rel) => {
                    assert!(seen_dirs.contains(&rel.parent().unwrap().to_path_buf()));
                }
            }
        }
    }

    #[test]
    fn walk_tree_missing_root_test() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            walk_tree(&missing),
            Err(Error::Upload(_))
        ));
    }
}
