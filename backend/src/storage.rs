use chrono::Utc;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

pub fn match_file_path(data_dir: &Path, year: i32) -> PathBuf {
    data_dir.join(format!("secret-santa-{year}.json"))
}

/// Resolve the year's assignment file, copying a seed file from the working
/// directory into the data dir when only the former has one (first boot on a
/// fresh volume).
pub async fn ensure_match_file(data_dir: &Path, year: i32) -> io::Result<PathBuf> {
    let target = match_file_path(data_dir, year);
    if fs::try_exists(&target).await? {
        return Ok(target);
    }
    let seed = std::env::current_dir()?.join(format!("secret-santa-{year}.json"));
    if seed != target && fs::try_exists(&seed).await? {
        fs::copy(&seed, &target).await?;
    }
    Ok(target)
}

pub fn snapshots_root(data_dir: &Path) -> PathBuf {
    data_dir.join("snapshots")
}

pub async fn list_snapshots(data_dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = match fs::read_dir(snapshots_root(data_dir)).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(names),
        Err(err) => return Err(err),
    };
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Files worth snapshotting: the env file, the score store, and every year's
/// assignment file in the data dir.
async fn snapshot_sources(
    data_dir: &Path,
    env_file: Option<&Path>,
    scores_path: &Path,
) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if let Some(env_file) = env_file {
        if fs::try_exists(env_file).await? {
            files.push(env_file.to_path_buf());
        }
    }
    if fs::try_exists(scores_path).await? {
        files.push(scores_path.to_path_buf());
    }
    let mut entries = fs::read_dir(data_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with("secret-santa-")
            && name.ends_with(".json")
            && entry.file_type().await?.is_file()
        {
            files.push(entry.path());
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

/// Copy the current data files into `snapshots/<UTC stamp>/` and return the
/// stamp.
pub async fn create_snapshot(
    data_dir: &Path,
    env_file: Option<&Path>,
    scores_path: &Path,
) -> io::Result<String> {
    let stamp = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
    let target = snapshots_root(data_dir).join(&stamp);
    fs::create_dir_all(&target).await?;
    for source in snapshot_sources(data_dir, env_file, scores_path).await? {
        if let Some(file_name) = source.file_name() {
            fs::copy(&source, target.join(file_name)).await?;
        }
    }
    Ok(stamp)
}

/// Copy a snapshot's files back into the data dir. The caller reloads any
/// in-memory state afterwards.
pub async fn restore_snapshot(data_dir: &Path, name: &str) -> io::Result<()> {
    // snapshot names are plain directory names, never paths
    if name.is_empty() || name.contains(['/', '\\']) || name == ".." {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("snapshot '{name}' does not exist"),
        ));
    }
    let source = snapshots_root(data_dir).join(name);
    match fs::metadata(&source).await {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("snapshot '{name}' does not exist"),
            ))
        }
        Err(err) => return Err(err),
    }
    let mut entries = fs::read_dir(&source).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            fs::copy(entry.path(), data_dir.join(entry.file_name())).await?;
        }
    }
    Ok(())
}
