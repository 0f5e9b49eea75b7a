//! Mapping between a local file tree and artifacts.

use std::collections::{BTreeMap, HashMap};
use std::fs::Metadata;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use arbor_object::{Artifact, Blob, Directory, File, Symlink};
use arbor_store::Handle;
use futures::future::{BoxFuture, FutureExt};
use walkdir::WalkDir;

#[cfg(unix)]
fn is_executable(metadata: &Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &Metadata) -> bool {
    false
}

/// Build an artifact for the tree at `root`. Nothing is stored.
///
/// Directories are built after their contents. Symlinks become path
/// symlinks unless `follow_symlinks` is set.
pub async fn checkin(root: &Path, follow_symlinks: bool) -> anyhow::Result<Artifact> {
    let mut pending: HashMap<PathBuf, BTreeMap<String, Artifact>> = HashMap::new();
    let mut result = None;
    let walk = WalkDir::new(root)
        .follow_links(follow_symlinks)
        .contents_first(true)
        .sort_by_file_name();
    for entry in walk {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type();
        let artifact: Artifact = if file_type.is_dir() {
            let entries = pending.remove(path).unwrap_or_default();
            Directory::with_entries(entries)?.into()
        } else if file_type.is_symlink() {
            let target = std::fs::read_link(path)
                .with_context(|| format!("reading link {}", path.display()))?;
            let target = target
                .to_str()
                .ok_or_else(|| anyhow!("symlink target of {} is not utf-8", path.display()))?;
            Symlink::new(target)?.into()
        } else {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let executable = is_executable(&entry.metadata()?);
            File::with_contents(Blob::leaf(bytes), executable).into()
        };
        tracing::debug!(path = %path.display(), kind = %artifact.kind(), "checked in");

        if entry.depth() == 0 {
            result = Some(artifact);
            continue;
        }
        let name = entry
            .file_name()
            .to_str()
            .ok_or_else(|| anyhow!("file name {} is not utf-8", path.display()))?
            .to_string();
        let parent = path
            .parent()
            .ok_or_else(|| anyhow!("{} has no parent", path.display()))?
            .to_path_buf();
        pending.entry(parent).or_default().insert(name, artifact);
    }
    result.ok_or_else(|| anyhow!("nothing to check in at {}", root.display()))
}

/// Write `artifact` to `dest`, which must not exist yet.
///
/// Symlinks that name an artifact are written as the artifact they resolve
/// to. Path-only symlinks become filesystem symlinks.
pub fn checkout<'a>(
    artifact: &'a Artifact,
    dest: &'a Path,
    handle: &'a dyn Handle,
) -> BoxFuture<'a, anyhow::Result<()>> {
    async move {
        if tokio::fs::symlink_metadata(dest).await.is_ok() {
            bail!("{} already exists", dest.display());
        }
        match artifact {
            Artifact::Directory(directory) => {
                tokio::fs::create_dir(dest).await?;
                for (name, entry) in directory.entries(handle).await? {
                    checkout(&entry, &dest.join(name), handle).await?;
                }
            }
            Artifact::File(file) => {
                tokio::fs::write(dest, file.bytes(handle).await?).await?;
                if file.executable(handle).await? {
                    set_executable(dest).await?;
                }
            }
            Artifact::Symlink(symlink) => {
                if symlink.artifact(handle).await?.is_some() {
                    let target = symlink
                        .resolve(handle)
                        .await?
                        .ok_or_else(|| anyhow!("symlink at {} is dangling", dest.display()))?;
                    checkout(&target, dest, handle).await?;
                } else {
                    let path = symlink.path(handle).await?.unwrap_or_default();
                    create_symlink(&path, dest).await?;
                }
            }
        }
        Ok(())
    }
    .boxed()
}

#[cfg(unix)]
async fn set_executable(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = tokio::fs::metadata(path).await?.permissions();
    permissions.set_mode(permissions.mode() | 0o111);
    tokio::fs::set_permissions(path, permissions).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn set_executable(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}

#[cfg(unix)]
async fn create_symlink(target: &str, dest: &Path) -> anyhow::Result<()> {
    tokio::fs::symlink(target, dest).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn create_symlink(_target: &str, dest: &Path) -> anyhow::Result<()> {
    bail!("cannot create symlink {} on this platform", dest.display())
}
