use std::path::PathBuf;

use anyhow::{Result, bail};

use crate::bulk::{self, Mode, NO_FILE};
use crate::gather::NonStarredTags;
use crate::query::{Casing, clean_new_tag};
use crate::select::{Selection, select_tag};
use crate::session::Session;
use crate::settings::{Direction, StarFlag};
use crate::stash::stash_indicator;
use crate::tags::{hash_tag, strip_hash};
use crate::vault::note_tags;

const STATUS_WRAP: usize = 25;

/// Stars `tag`, or asks for one among the tags that are not starred yet.
/// Returns the starred tag, `None` when the dialog was dismissed.
pub fn add_star(session: &mut Session<'_>, tag: Option<&str>) -> Result<Option<String>> {
    let tag = match tag {
        Some(tag) => clean_new_tag(tag, Casing::None)?,
        None => match select_tag(session, "Star tag", &NonStarredTags, &[])? {
            Selection::Chosen(choice) => strip_hash(&choice).to_string(),
            Selection::Cancelled => return Ok(None),
        },
    };
    if session.store.settings.add_starred(&tag)? {
        session.store.save()?;
        session.ui.notice(&format!("{} starred", hash_tag(&tag)));
    } else {
        session
            .ui
            .notice(&format!("{} is already starred", hash_tag(&tag)));
    }
    Ok(Some(tag))
}

pub fn remove_star(session: &mut Session<'_>, tag: &str) -> Result<()> {
    let mut removed = session.store.settings.remove_starred(tag)?;
    session.store.save()?;
    removed.has_command = false;
    session.commands.toggle_starred_command(&removed);
    session
        .ui
        .notice(&format!("{} unstarred", hash_tag(&removed.value)));
    Ok(())
}

pub fn move_star(session: &mut Session<'_>, tag: &str, direction: Direction) -> Result<bool> {
    let moved = session.store.settings.move_starred(tag, direction)?;
    if moved {
        session.store.save()?;
    }
    Ok(moved)
}

/// Sets one flag of a starred tag and keeps its toggle command in step.
pub fn set_star_flag(
    session: &mut Session<'_>,
    tag: &str,
    flag: StarFlag,
    value: bool,
) -> Result<()> {
    session.store.settings.set_star_flag(tag, flag, value)?;
    session.store.save()?;
    if flag == StarFlag::Command {
        if let Some(starred) = session.store.settings.starred(tag) {
            session.commands.toggle_starred_command(starred);
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusItem {
    pub tag: String,
    /// Presence on the target note; only known for a single note.
    pub active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusBar {
    pub items: Vec<StatusItem>,
    pub stash: Option<String>,
}

pub fn status_bar(session: &Session<'_>, files: &[PathBuf]) -> Result<StatusBar> {
    let present = match files {
        [only] => Some(note_tags(session.vault, only)?),
        _ => None,
    };
    let items = session
        .store
        .settings
        .starred_values(Some(StarFlag::StatusBar))
        .into_iter()
        .map(|tag| StatusItem {
            active: present.as_ref().map(|present| present.contains(&tag)),
            tag,
        })
        .collect();
    let settings = &session.store.settings;
    let stash = (!settings.tag_stash.is_empty()).then(|| stash_indicator(settings, STATUS_WRAP));
    Ok(StatusBar { items, stash })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAction {
    Toggle(String),
    AddToAll(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub label: String,
    pub action: MenuAction,
}

pub fn context_menu(session: &Session<'_>, files: &[PathBuf]) -> Result<Vec<MenuItem>> {
    let tags = session
        .store
        .settings
        .starred_values(Some(StarFlag::ContextMenu));
    let items = match files {
        [] => Vec::new(),
        [only] => {
            let present = note_tags(session.vault, only)?;
            tags.into_iter()
                .map(|tag| {
                    let verb = if present.contains(&tag) { "Remove" } else { "Add" };
                    MenuItem {
                        label: format!("{verb} {}", hash_tag(&tag)),
                        action: MenuAction::Toggle(tag),
                    }
                })
                .collect()
        }
        _ => tags
            .into_iter()
            .map(|tag| MenuItem {
                label: format!("Tag with {}", hash_tag(&tag)),
                action: MenuAction::AddToAll(tag),
            })
            .collect(),
    };
    Ok(items)
}

/// Runs the menu entry at 1-based `position`.
pub fn run_menu_item(session: &mut Session<'_>, files: &[PathBuf], position: usize) -> Result<()> {
    if files.is_empty() {
        session.ui.notice(NO_FILE);
        return Ok(());
    }
    let items = context_menu(session, files)?;
    let Some(item) = position.checked_sub(1).and_then(|idx| items.get(idx)) else {
        bail!("no menu item {position} (there are {})", items.len());
    };
    match &item.action {
        MenuAction::Toggle(tag) => {
            bulk::toggle(session, tag, files)?;
        }
        MenuAction::AddToAll(tag) => {
            bulk::apply(session, Mode::Add, std::slice::from_ref(tag), files)?;
        }
    }
    Ok(())
}
