use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde_yaml::{Mapping, Value};
use time::OffsetDateTime;
use walkdir::{DirEntry, WalkDir};

use crate::repair::repair_note_text;
use crate::tags::{hash_tag, tag_list};

pub const STATE_DIR: &str = ".quicktag";
const DELIMITER: &str = "---";

pub trait Vault {
    fn read_text(&self, path: &Path) -> Result<String>;

    fn write_text(&self, path: &Path, text: &str) -> Result<()>;

    fn markdown_files(&self) -> Result<Vec<PathBuf>>;

    /// Parsed front matter as it reads once the header is repaired; `None`
    /// when a note has none or it is not valid YAML. Nothing is written.
    fn frontmatter(&self, path: &Path) -> Result<Option<Mapping>> {
        let text = self.read_text(path)?;
        let outcome = repair_note_text(&text);
        let parts = split_note(outcome.repaired.as_deref().unwrap_or(&text));
        Ok(parts.header.and_then(|header| parse_header(header).ok()))
    }

    /// Reads the note, lets `edit` mutate its front matter and writes it back.
    ///
    /// Only well formed headers are recognised; a note whose header cannot be
    /// found gets a fresh one prepended.
    fn process_frontmatter(&self, path: &Path, edit: &mut dyn FnMut(&mut Mapping)) -> Result<()> {
        let text = self.read_text(path)?;
        let parts = split_note(&text);
        let mut mapping = match parts.header {
            Some(header) => parse_header(header)
                .with_context(|| format!("parsing front matter of {}", path.display()))?,
            None => Mapping::new(),
        };
        edit(&mut mapping);
        let rendered = render_note(&mapping, parts.body)?;
        if rendered != text {
            self.write_text(path, &rendered)?;
        }
        Ok(())
    }

    /// Every tag known across the vault, `#`-prefixed and sorted.
    fn all_tags(&self) -> Result<Vec<String>> {
        let mut found = BTreeSet::new();
        for path in self.markdown_files()? {
            let text = self.read_text(&path)?;
            let parts = split_note(&text);
            if let Some(mapping) = parts.header.and_then(|header| parse_header(header).ok()) {
                found.extend(tag_list(&mapping).iter().map(|tag| hash_tag(tag)));
            }
            found.extend(inline_tags(parts.body)?.into_iter().map(|tag| hash_tag(&tag)));
        }
        Ok(found.into_iter().collect())
    }
}

pub fn note_tags(vault: &dyn Vault, path: &Path) -> Result<Vec<String>> {
    Ok(vault
        .frontmatter(path)?
        .map(|mapping| tag_list(&mapping))
        .unwrap_or_default())
}

pub fn basename(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub struct NoteParts<'a> {
    pub header: Option<&'a str>,
    pub body: &'a str,
}

pub fn split_note(text: &str) -> NoteParts<'_> {
    let unsplit = NoteParts {
        header: None,
        body: text,
    };
    let Some(first) = text.split_inclusive('\n').next() else {
        return unsplit;
    };
    if first.trim_end_matches(['\n', '\r']) != DELIMITER || !first.ends_with('\n') {
        return unsplit;
    }

    let mut offset = first.len();
    for line in text[first.len()..].split_inclusive('\n') {
        if line.trim_end_matches(['\n', '\r']) == DELIMITER {
            return NoteParts {
                header: Some(&text[first.len()..offset]),
                body: &text[offset + line.len()..],
            };
        }
        offset += line.len();
    }
    unsplit
}

pub fn parse_header(header: &str) -> Result<Mapping> {
    match serde_yaml::from_str::<Value>(header)? {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(mapping) => Ok(mapping),
        _ => bail!("front matter is not a mapping"),
    }
}

pub fn render_note(mapping: &Mapping, body: &str) -> Result<String> {
    let yaml = if mapping.is_empty() {
        String::new()
    } else {
        serde_yaml::to_string(mapping)?
    };
    Ok(format!("{DELIMITER}\n{yaml}{DELIMITER}\n{body}"))
}

fn inline_tag_pattern() -> Result<&'static Regex> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    if let Some(pattern) = PATTERN.get() {
        return Ok(pattern);
    }
    let compiled = Regex::new(r#"(?:^|[\s(])#([^\s#,.:;!?"'()\[\]{}<>*&^%$@+=~`|\\]+)"#)?;
    Ok(PATTERN.get_or_init(|| compiled))
}

/// Inline `#tag` occurrences in a note body. Purely numeric words are not tags.
pub fn inline_tags(body: &str) -> Result<Vec<String>> {
    Ok(inline_tag_pattern()?
        .captures_iter(body)
        .filter_map(|caps| caps.get(1))
        .map(|found| found.as_str())
        .filter(|tag| !tag.chars().all(|ch| ch.is_ascii_digit() || ch == '/'))
        .map(str::to_string)
        .collect())
}

pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    pub fn open(root: &Path) -> Result<Self> {
        let root = fs::canonicalize(root)
            .with_context(|| format!("opening vault {}", root.display()))?;
        if !root.is_dir() {
            bail!("vault {} is not a directory", root.display());
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }
}

impl Vault for FsVault {
    fn read_text(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
    }

    fn write_text(&self, path: &Path, text: &str) -> Result<()> {
        write_via_temp(path, text.as_bytes()).with_context(|| format!("writing {}", path.display()))
    }

    fn markdown_files(&self) -> Result<Vec<PathBuf>> {
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry?;
            if entry.file_type().is_file() && is_markdown(entry.path()) {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

pub fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("md"))
        .unwrap_or(false)
}

pub fn write_via_temp(path: &Path, data: &[u8]) -> Result<()> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    let base_dir = parent.unwrap_or_else(|| Path::new("."));
    let unique = format!(
        ".quicktag-tmp-{}-{}",
        std::process::id(),
        OffsetDateTime::now_utc().unix_timestamp_nanos()
    );
    let temp_path = base_dir.join(unique);
    {
        let mut file = fs::File::create(&temp_path)
            .with_context(|| format!("creating temp file {}", temp_path.display()))?;
        file.write_all(data)
            .with_context(|| format!("writing temp file {}", temp_path.display()))?;
        file.sync_all()
            .with_context(|| format!("syncing temp file {}", temp_path.display()))?;
    }
    fs::rename(&temp_path, path).or_else(|err| {
        let _ = fs::remove_file(&temp_path);
        Err(err).with_context(|| format!("replacing {}", path.display()))
    })?;
    Ok(())
}

#[cfg(test)]
pub mod testing {
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};

    use anyhow::{Result, anyhow};

    use super::Vault;

    #[derive(Default)]
    pub struct MemoryVault {
        files: RefCell<BTreeMap<PathBuf, String>>,
        writes: RefCell<Vec<PathBuf>>,
    }

    impl MemoryVault {
        pub fn with_notes(notes: &[(&str, &str)]) -> Self {
            let vault = Self::default();
            for (path, text) in notes {
                vault
                    .files
                    .borrow_mut()
                    .insert(PathBuf::from(path), text.to_string());
            }
            vault
        }

        pub fn text(&self, path: &str) -> String {
            self.files
                .borrow()
                .get(Path::new(path))
                .cloned()
                .unwrap_or_default()
        }

        pub fn writes(&self) -> Vec<PathBuf> {
            self.writes.borrow().clone()
        }
    }

    impl Vault for MemoryVault {
        fn read_text(&self, path: &Path) -> Result<String> {
            self.files
                .borrow()
                .get(path)
                .cloned()
                .ok_or_else(|| anyhow!("no such note {}", path.display()))
        }

        fn write_text(&self, path: &Path, text: &str) -> Result<()> {
            self.files
                .borrow_mut()
                .insert(path.to_path_buf(), text.to_string());
            self.writes.borrow_mut().push(path.to_path_buf());
            Ok(())
        }

        fn markdown_files(&self) -> Result<Vec<PathBuf>> {
            Ok(self
                .files
                .borrow()
                .keys()
                .filter(|path| super::is_markdown(path))
                .cloned()
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MemoryVault;
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn split_finds_header_and_body() {
        let parts = split_note("---\ntags: [a]\n---\nbody\n");
        assert_eq!(parts.header, Some("tags: [a]\n"));
        assert_eq!(parts.body, "body\n");
    }

    #[test]
    fn split_rejects_unclean_closing_delimiter() {
        let parts = split_note("---\ntags: [a]\n---   \nbody\n");
        assert!(parts.header.is_none());
    }

    #[test]
    fn process_frontmatter_creates_missing_header() {
        let vault = MemoryVault::with_notes(&[("n.md", "just text\n")]);
        vault
            .process_frontmatter(Path::new("n.md"), &mut |fm| {
                fm.insert("tags".into(), Value::Sequence(vec!["x".into()]));
            })
            .unwrap();
        assert_eq!(vault.text("n.md"), "---\ntags:\n- x\n---\njust text\n");
    }

    #[test]
    fn process_frontmatter_skips_write_without_change() {
        let text = "---\ntitle: t\n---\nbody\n";
        let vault = MemoryVault::with_notes(&[("n.md", text)]);
        vault
            .process_frontmatter(Path::new("n.md"), &mut |_| {})
            .unwrap();
        assert!(vault.writes().is_empty());
    }

    #[test]
    fn process_frontmatter_propagates_invalid_yaml() {
        let vault = MemoryVault::with_notes(&[("n.md", "---\n[unclosed\n---\n")]);
        assert!(
            vault
                .process_frontmatter(Path::new("n.md"), &mut |_| {})
                .is_err()
        );
        assert!(vault.frontmatter(Path::new("n.md")).unwrap().is_none());
    }

    #[test]
    fn note_tags_see_through_repairable_headers() {
        let vault = MemoryVault::with_notes(&[("n.md", "\n\n---\ntags: a b\n---  \n")]);
        assert_eq!(note_tags(&vault, Path::new("n.md")).unwrap(), vec!["a", "b"]);
        let mapping = vault.frontmatter(Path::new("n.md")).unwrap().unwrap();
        assert_eq!(mapping.get("tags"), Some(&Value::String("a b".into())));
        assert!(vault.writes().is_empty());
    }

    #[test]
    fn inline_tags_skip_headings_and_numbers() {
        let body = "# Heading\nSome #work and (#home/kitchen), issue #42.\n";
        assert_eq!(inline_tags(body).unwrap(), vec!["work", "home/kitchen"]);
    }

    #[test]
    fn all_tags_merges_front_matter_and_inline_tags() {
        let vault = MemoryVault::with_notes(&[
            ("a.md", "---\ntag: b\ntags: a\n---\ntext #c\n"),
            ("b.md", "#a again\n"),
            ("c.txt", "#ignored\n"),
        ]);
        assert_eq!(vault.all_tags().unwrap(), vec!["#a", "#b", "#c"]);
    }

    #[test]
    fn fs_vault_lists_markdown_outside_hidden_dirs() {
        let temp = tempdir().expect("temp dir");
        std::fs::create_dir_all(temp.path().join(STATE_DIR)).unwrap();
        std::fs::create_dir_all(temp.path().join("sub")).unwrap();
        std::fs::write(temp.path().join("sub/one.md"), "x").unwrap();
        std::fs::write(temp.path().join("two.MD"), "x").unwrap();
        std::fs::write(temp.path().join("skip.txt"), "x").unwrap();
        std::fs::write(temp.path().join(STATE_DIR).join("hidden.md"), "x").unwrap();

        let vault = FsVault::open(temp.path()).unwrap();
        let names: Vec<_> = vault
            .markdown_files()
            .unwrap()
            .iter()
            .map(|path| basename(path))
            .collect();
        assert_eq!(names, vec!["one", "two"]);
    }

    #[test]
    fn fs_vault_round_trips_text() {
        let temp = tempdir().expect("temp dir");
        let vault = FsVault::open(temp.path()).unwrap();
        let path = vault.root().join("note.md");
        vault.write_text(&path, "hello").unwrap();
        assert_eq!(vault.read_text(&path).unwrap(), "hello");
    }
}
