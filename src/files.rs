use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use glob::glob;
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::{DirEntry, WalkDir};

use crate::vault::is_markdown;

#[derive(Debug, Clone, Default)]
pub struct TargetSpec {
    pub explicit: Vec<PathBuf>,
    pub globs: Vec<String>,
    pub exclude: Vec<String>,
    pub include_hidden: bool,
}

/// An empty result is not an error; callers report it as "no file open".
pub fn resolve_targets(root: &Path, spec: &TargetSpec) -> Result<Vec<PathBuf>> {
    let exclude = build_exclude_globs(&spec.exclude)?;
    let filter = Filter {
        root,
        include_hidden: spec.include_hidden,
        exclude: exclude.as_ref(),
    };
    let mut notes = Vec::new();

    for path in &spec.explicit {
        let path = root.join(path);
        append_path(&path, &filter, &mut notes)
            .with_context(|| format!("processing target {}", path.display()))?;
    }

    for pattern in &spec.globs {
        let anchored = root.join(pattern);
        let anchored = anchored.to_string_lossy();
        let matches =
            glob(&anchored).map_err(|err| anyhow!("invalid glob pattern '{pattern}': {err}"))?;
        for entry in matches {
            let path =
                entry.map_err(|err| anyhow!("error reading matches for '{pattern}': {err}"))?;
            append_path(&path, &filter, &mut notes)
                .with_context(|| format!("processing match {}", path.display()))?;
        }
    }

    notes.sort();
    notes.dedup();
    Ok(notes)
}

struct Filter<'a> {
    root: &'a Path,
    include_hidden: bool,
    exclude: Option<&'a GlobSet>,
}

impl Filter<'_> {
    fn relative<'p>(&self, path: &'p Path) -> &'p Path {
        path.strip_prefix(self.root).unwrap_or(path)
    }

    fn skips(&self, path: &Path) -> bool {
        let relative = self.relative(path);
        if !self.include_hidden && path_components_start_with_dot(relative) {
            return true;
        }
        if let Some(set) = self.exclude {
            let candidate = normalize_slashes(relative);
            return set.is_match(candidate.as_str());
        }
        false
    }
}

fn append_path(path: &Path, filter: &Filter<'_>, acc: &mut Vec<PathBuf>) -> Result<()> {
    let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let metadata = fs::metadata(&canonical)
        .with_context(|| format!("unable to read metadata for {}", canonical.display()))?;

    if metadata.is_dir() {
        return walk_directory(&canonical, filter, acc);
    }
    if metadata.is_file() && is_markdown(&canonical) && !filter.skips(&canonical) {
        acc.push(canonical);
    }
    Ok(())
}

fn walk_directory(dir: &Path, filter: &Filter<'_>, acc: &mut Vec<PathBuf>) -> Result<()> {
    let walker = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || filter.include_hidden || !is_hidden(entry));

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        if is_markdown(&path) && !filter.skips(&path) {
            acc.push(path);
        }
    }
    Ok(())
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn path_components_start_with_dot(path: &Path) -> bool {
    path.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .map(|segment| segment.starts_with('.') && segment != "." && segment != "..")
            .unwrap_or(false)
    })
}

fn normalize_slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn build_exclude_globs(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob =
            Glob::new(pattern).map_err(|err| anyhow!("invalid exclude glob '{pattern}': {err}"))?;
        builder.add(glob);
    }

    builder
        .build()
        .map(Some)
        .map_err(|err| anyhow!("unable to build exclude globs: {err}"))
}
