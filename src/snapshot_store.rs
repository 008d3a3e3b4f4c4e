use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::formats::Snapshot;

pub const SNAPSHOT_EXT: &str = "json";

/// Directory of `<taxon>.json` snapshot files.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `snapshot` as `<taxon>.json`, or `<taxon> (N).json` when that
    /// name is taken and `replace` is off. Returns the path written.
    pub fn write_snapshot(
        &self,
        taxon: &str,
        snapshot: &Snapshot,
        replace: bool,
    ) -> anyhow::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("create snapshot dir: {}", self.dir.display()))?;

        let path = output_path(&self.dir, &sanitize_name(taxon), SNAPSHOT_EXT, replace);
        let json = serde_json::to_string_pretty(snapshot).context("serialize snapshot")?;
        write_new_or_replace(&path, json.as_bytes(), replace)?;

        tracing::debug!(path = %path.display(), "wrote snapshot");
        Ok(path)
    }

    /// An existing `.json` path is taken as is. Otherwise `name` is looked up
    /// as a snapshot name first, then as a path.
    pub fn resolve(&self, name: &str) -> anyhow::Result<PathBuf> {
        let as_path = PathBuf::from(name);
        if name.ends_with(&format!(".{SNAPSHOT_EXT}")) && as_path.is_file() {
            return Ok(as_path);
        }
        let by_name = self
            .dir
            .join(format!("{}.{SNAPSHOT_EXT}", sanitize_name(name)));
        if by_name.is_file() {
            return Ok(by_name);
        }
        if as_path.is_file() {
            return Ok(as_path);
        }
        anyhow::bail!(
            "no snapshot named '{name}' in {} (run `list` to see what has been imported)",
            self.dir.display()
        )
    }

    /// Snapshot files in name order. A missing directory has none.
    pub fn list(&self) -> anyhow::Result<Vec<PathBuf>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.dir)
            .with_context(|| format!("read snapshot dir: {}", self.dir.display()))?
        {
            let path = entry
                .with_context(|| format!("read snapshot dir: {}", self.dir.display()))?
                .path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == SNAPSHOT_EXT) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

pub fn read_snapshot(path: &Path) -> anyhow::Result<Snapshot> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("read snapshot: {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parse snapshot: {}", path.display()))
}

/// Makes a taxon name usable as a file stem.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_owned();
    if cleaned.is_empty() {
        "snapshot".to_owned()
    } else {
        cleaned
    }
}

/// `<dir>/<stem>.<ext>`, or the first free `<stem> (N).<ext>` unless
/// `replace` is set.
pub fn output_path(dir: &Path, stem: &str, ext: &str, replace: bool) -> PathBuf {
    let first = dir.join(format!("{stem}.{ext}"));
    if replace || !first.exists() {
        return first;
    }
    (1u32..)
        .map(|n| dir.join(format!("{stem} ({n}).{ext}")))
        .find(|path| !path.exists())
        .unwrap_or(first)
}

pub fn write_new_or_replace(path: &Path, contents: &[u8], replace: bool) -> anyhow::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true);
    if replace {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    let mut file = options
        .open(path)
        .with_context(|| format!("open output: {}", path.display()))?;
    file.write_all(contents)
        .with_context(|| format!("write output: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::Header;

    fn snapshot(date: &str) -> Snapshot {
        Snapshot {
            snapshot_date: date.to_owned(),
            header: Header {
                html: "Genus <i>Anax</i>".to_owned(),
                plain: "Genus Anax".to_owned(),
            },
            parent_rank: "genus".to_owned(),
            start_url: "https://bugguide.net/node/view/9137/bgimage".to_owned(),
            sections: Vec::new(),
        }
    }

    #[test]
    fn existing_snapshots_are_not_overwritten() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = SnapshotStore::new(dir.path().join("data"));

        let first = store.write_snapshot("Anax", &snapshot("one"), false)?;
        let second = store.write_snapshot("Anax", &snapshot("two"), false)?;
        let third = store.write_snapshot("Anax", &snapshot("three"), false)?;

        assert_eq!(first.file_name().and_then(|n| n.to_str()), Some("Anax.json"));
        assert_eq!(second.file_name().and_then(|n| n.to_str()), Some("Anax (1).json"));
        assert_eq!(third.file_name().and_then(|n| n.to_str()), Some("Anax (2).json"));
        assert_eq!(read_snapshot(&first)?.snapshot_date, "one");
        Ok(())
    }

    #[test]
    fn replace_overwrites_the_plain_name() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = SnapshotStore::new(dir.path());

        store.write_snapshot("Anax", &snapshot("one"), false)?;
        let path = store.write_snapshot("Anax", &snapshot("two"), true)?;

        assert_eq!(path, dir.path().join("Anax.json"));
        assert_eq!(read_snapshot(&path)?.snapshot_date, "two");
        assert_eq!(store.list()?.len(), 1);
        Ok(())
    }

    #[test]
    fn resolve_accepts_names_and_paths() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = SnapshotStore::new(dir.path());
        let path = store.write_snapshot("Anax", &snapshot("one"), false)?;

        assert_eq!(store.resolve("Anax")?, path);
        assert_eq!(store.resolve(&path.display().to_string())?, path);
        assert!(store.resolve("Aeshna").is_err());
        Ok(())
    }

    #[test]
    fn existing_json_paths_win_over_names() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let elsewhere = dir.path().join("elsewhere");
        let direct = SnapshotStore::new(&elsewhere).write_snapshot("Aeshna", &snapshot("direct"), false)?;

        let store = SnapshotStore::new(dir.path().join("data"));
        let arg = direct.display().to_string();
        let shadow = store.write_snapshot(&arg, &snapshot("shadow"), false)?;
        assert_ne!(shadow, direct);

        let resolved = store.resolve(&arg)?;
        assert_eq!(resolved, direct);
        assert_eq!(read_snapshot(&resolved)?.snapshot_date, "direct");
        Ok(())
    }

    #[test]
    fn list_is_sorted_and_ignores_other_files() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = SnapshotStore::new(dir.path());
        store.write_snapshot("Libellula", &snapshot("x"), false)?;
        store.write_snapshot("Anax", &snapshot("x"), false)?;
        std::fs::write(dir.path().join("notes.txt"), "hi")?;

        let names: Vec<String> = store
            .list()?
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_owned))
            .collect();
        assert_eq!(names, vec!["Anax.json", "Libellula.json"]);

        assert!(SnapshotStore::new(dir.path().join("missing")).list()?.is_empty());
        Ok(())
    }

    #[test]
    fn names_lose_path_separators() {
        assert_eq!(sanitize_name("Anax/junius"), "Anax_junius");
        assert_eq!(sanitize_name(" Common Green Darner "), "Common Green Darner");
        assert_eq!(sanitize_name(".."), "snapshot");
    }
}
