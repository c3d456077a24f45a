use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::query::Casing;
use crate::tags::strip_hash;
use crate::vault::write_via_temp;

const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StarredTag {
    pub value: String,
    #[serde(default)]
    pub show_first: bool,
    #[serde(default)]
    pub has_command: bool,
    #[serde(default)]
    pub show_in_status_bar: bool,
    #[serde(default)]
    pub show_in_context_menu: bool,
}

impl StarredTag {
    pub fn new(value: &str) -> Self {
        Self {
            value: strip_hash(value).to_string(),
            show_first: true,
            has_command: false,
            show_in_status_bar: false,
            show_in_context_menu: false,
        }
    }

    pub fn flag(&self, flag: StarFlag) -> bool {
        match flag {
            StarFlag::ShowFirst => self.show_first,
            StarFlag::Command => self.has_command,
            StarFlag::StatusBar => self.show_in_status_bar,
            StarFlag::ContextMenu => self.show_in_context_menu,
        }
    }

    fn flag_mut(&mut self, flag: StarFlag) -> &mut bool {
        match flag {
            StarFlag::ShowFirst => &mut self.show_first,
            StarFlag::Command => &mut self.has_command,
            StarFlag::StatusBar => &mut self.show_in_status_bar,
            StarFlag::ContextMenu => &mut self.show_in_context_menu,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StarFlag {
    ShowFirst,
    Command,
    StatusBar,
    ContextMenu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SavedStash {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub all_tags: bool,
    pub preferred_casing: Casing,
    pub priority_tags: Vec<StarredTag>,
    pub last_used_tag: String,
    pub tag_stash: Vec<String>,
    pub saved_stashes: Vec<SavedStash>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            all_tags: true,
            preferred_casing: Casing::None,
            priority_tags: Vec::new(),
            last_used_tag: String::new(),
            tag_stash: Vec::new(),
            saved_stashes: Vec::new(),
        }
    }
}

impl Settings {
    pub fn starred_values(&self, flag: Option<StarFlag>) -> Vec<String> {
        self.priority_tags
            .iter()
            .filter(|tag| flag.map(|flag| tag.flag(flag)).unwrap_or(true))
            .map(|tag| tag.value.clone())
            .collect()
    }

    pub fn starred(&self, tag: &str) -> Option<&StarredTag> {
        let tag = strip_hash(tag);
        self.priority_tags.iter().find(|starred| starred.value == tag)
    }

    fn starred_index(&self, tag: &str) -> Result<usize> {
        let bare = strip_hash(tag);
        self.priority_tags
            .iter()
            .position(|starred| starred.value == bare)
            .with_context(|| format!("#{bare} is not a starred tag"))
    }

    pub fn add_starred(&mut self, tag: &str) -> Result<bool> {
        let bare = strip_hash(tag);
        if bare.is_empty() {
            bail!("cannot star an empty tag");
        }
        if self.starred(bare).is_some() {
            return Ok(false);
        }
        self.priority_tags.push(StarredTag::new(bare));
        Ok(true)
    }

    pub fn remove_starred(&mut self, tag: &str) -> Result<StarredTag> {
        let index = self.starred_index(tag)?;
        Ok(self.priority_tags.remove(index))
    }

    /// Swaps a starred tag with its neighbour; returns false at either end.
    pub fn move_starred(&mut self, tag: &str, direction: Direction) -> Result<bool> {
        let index = self.starred_index(tag)?;
        let target = match direction {
            Direction::Up if index > 0 => index - 1,
            Direction::Down if index + 1 < self.priority_tags.len() => index + 1,
            _ => return Ok(false),
        };
        self.priority_tags.swap(index, target);
        Ok(true)
    }

    pub fn set_star_flag(&mut self, tag: &str, flag: StarFlag, value: bool) -> Result<()> {
        let index = self.starred_index(tag)?;
        *self.priority_tags[index].flag_mut(flag) = value;
        Ok(())
    }

    /// Adds tags to the active stash, keeping it sorted and unique.
    pub fn stash_tags(&mut self, tags: &[String]) {
        for tag in tags {
            let bare = strip_hash(tag);
            if !bare.is_empty() && !self.tag_stash.iter().any(|stashed| stashed == bare) {
                self.tag_stash.push(bare.to_string());
            }
        }
        self.tag_stash.sort();
    }

    pub fn unstash_tag(&mut self, tag: &str) -> bool {
        let bare = strip_hash(tag);
        let before = self.tag_stash.len();
        self.tag_stash.retain(|stashed| stashed != bare);
        before != self.tag_stash.len()
    }

    pub fn clear_stash(&mut self) {
        self.tag_stash.clear();
    }

    /// Copies the active stash under `name`, replacing a saved stash of that name.
    pub fn save_stash(&mut self, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            bail!("a saved stash needs a name");
        }
        if self.tag_stash.is_empty() {
            bail!("the active stash is empty");
        }
        let saved = SavedStash {
            name: name.to_string(),
            tags: self.tag_stash.clone(),
        };
        match self.saved_stashes.iter_mut().find(|stash| stash.name == name) {
            Some(existing) => *existing = saved,
            None => self.saved_stashes.push(saved),
        }
        Ok(())
    }

    pub fn drop_saved_stash(&mut self, name: &str) -> bool {
        let before = self.saved_stashes.len();
        self.saved_stashes.retain(|stash| stash.name != name);
        before != self.saved_stashes.len()
    }

    pub fn end_session(&mut self) {
        self.last_used_tag.clear();
    }
}

pub struct SettingsStore {
    path: Option<PathBuf>,
    pub settings: Settings,
}

impl SettingsStore {
    pub fn load(state_dir: &Path) -> Result<Self> {
        let path = state_dir.join(SETTINGS_FILE);
        let settings = if path.exists() {
            let data =
                fs::read(&path).with_context(|| format!("reading settings {}", path.display()))?;
            serde_json::from_slice(&data)
                .with_context(|| format!("parsing settings {}", path.display()))?
        } else {
            Settings::default()
        };
        Ok(Self {
            path: Some(path),
            settings,
        })
    }

    #[cfg(test)]
    pub fn in_memory(settings: Settings) -> Self {
        Self {
            path: None,
            settings,
        }
    }

    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let json = serde_json::to_string_pretty(&self.settings)?;
        write_via_temp(path, (json + "\n").as_bytes())
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn with_stars(values: &[&str]) -> Settings {
        let mut settings = Settings::default();
        for value in values {
            settings.add_starred(value).unwrap();
        }
        settings
    }

    #[test]
    fn load_merges_stored_fields_over_defaults() {
        let temp = tempdir().expect("temp dir");
        fs::write(
            temp.path().join(SETTINGS_FILE),
            r#"{"preferred_casing": "kebab", "priority_tags": [{"value": "todo"}]}"#,
        )
        .unwrap();
        let store = SettingsStore::load(temp.path()).unwrap();
        assert!(store.settings.all_tags);
        assert_eq!(store.settings.preferred_casing, Casing::Kebab);
        assert_eq!(store.settings.priority_tags[0].value, "todo");
        assert!(!store.settings.priority_tags[0].show_first);
    }

    #[test]
    fn save_then_load_round_trips() {
        let temp = tempdir().expect("temp dir");
        let mut store = SettingsStore::load(&temp.path().join("state")).unwrap();
        store.settings.stash_tags(&["b".into(), "#a".into()]);
        store.settings.last_used_tag = "a".into();
        store.save().unwrap();

        let reloaded = SettingsStore::load(&temp.path().join("state")).unwrap();
        assert_eq!(reloaded.settings, store.settings);
        assert_eq!(reloaded.settings.tag_stash, vec!["a", "b"]);
    }

    #[test]
    fn save_replaces_the_file_without_leftovers() {
        let temp = tempdir().expect("temp dir");
        let state = temp.path().join("state");
        let mut store = SettingsStore::load(&state).unwrap();
        store.settings.last_used_tag = "a".repeat(4096);
        store.save().unwrap();
        store.settings.last_used_tag = "b".into();
        store.save().unwrap();

        let names: Vec<_> = fs::read_dir(&state)
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![SETTINGS_FILE]);
        let reloaded = SettingsStore::load(&state).unwrap();
        assert_eq!(reloaded.settings.last_used_tag, "b");
    }

    #[test]
    fn starring_is_unique_and_bare() {
        let mut settings = with_stars(&["#todo"]);
        assert!(!settings.add_starred("todo").unwrap());
        assert_eq!(settings.starred_values(None), vec!["todo"]);
        assert!(settings.add_starred("#").is_err());
    }

    #[test]
    fn starred_values_filter_by_flag() {
        let mut settings = with_stars(&["a", "b"]);
        settings.set_star_flag("b", StarFlag::ShowFirst, false).unwrap();
        settings.set_star_flag("b", StarFlag::StatusBar, true).unwrap();
        assert_eq!(settings.starred_values(Some(StarFlag::ShowFirst)), vec!["a"]);
        assert_eq!(settings.starred_values(Some(StarFlag::StatusBar)), vec!["b"]);
    }

    #[test]
    fn reorder_is_adjacent_swap_only() {
        let mut settings = with_stars(&["a", "b", "c"]);
        assert!(settings.move_starred("c", Direction::Up).unwrap());
        assert_eq!(settings.starred_values(None), vec!["a", "c", "b"]);
        assert!(!settings.move_starred("a", Direction::Up).unwrap());
        assert!(!settings.move_starred("b", Direction::Down).unwrap());
        assert!(settings.move_starred("missing", Direction::Up).is_err());
    }

    #[test]
    fn remove_starred_returns_entry() {
        let mut settings = with_stars(&["a", "b"]);
        assert_eq!(settings.remove_starred("#a").unwrap().value, "a");
        assert_eq!(settings.starred_values(None), vec!["b"]);
        assert!(settings.remove_starred("a").is_err());
    }

    #[test]
    fn stash_sorting_and_saving() {
        let mut settings = Settings::default();
        assert!(settings.save_stash("empty").is_err());
        settings.stash_tags(&["zeta".into(), "alpha".into(), "zeta".into()]);
        assert_eq!(settings.tag_stash, vec!["alpha", "zeta"]);

        settings.save_stash("greek").unwrap();
        settings.unstash_tag("#zeta");
        settings.save_stash("greek").unwrap();
        assert_eq!(settings.saved_stashes.len(), 1);
        assert_eq!(settings.saved_stashes[0].tags, vec!["alpha"]);

        assert!(settings.drop_saved_stash("greek"));
        assert!(!settings.drop_saved_stash("greek"));
    }

    #[test]
    fn end_session_clears_last_used_tag() {
        let mut settings = Settings {
            last_used_tag: "x".into(),
            ..Settings::default()
        };
        settings.end_session();
        assert!(settings.last_used_tag.is_empty());
    }
}
