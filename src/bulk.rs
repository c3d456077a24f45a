use std::path::{Path, PathBuf};

use anyhow::{Result, bail};

use crate::gather::{AddCandidates, TagGatherer, TagsOnFiles};
use crate::query::{clean_tag_name, is_valid_new_tag};
use crate::repair::{RepairReport, repair_note_text};
use crate::session::Session;
use crate::tags::{TagEdit, is_sentinel, strip_hash, tag_label};
use crate::vault::{Vault, basename, note_tags};

/// Above this many files a progress line is shown while processing.
pub const MANY_FILES: usize = 100;

pub const NO_FILE: &str = "No file open!";
pub const NOTHING_TO_CHANGE: &str = "No file tags to change!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Add,
    Remove,
}

impl Mode {
    pub fn gatherer(self) -> &'static dyn TagGatherer {
        match self {
            Mode::Add => &AddCandidates,
            Mode::Remove => &TagsOnFiles,
        }
    }

    pub fn edit(self, tags: &[String]) -> TagEdit {
        match self {
            Mode::Add => TagEdit::Add(tags.to_vec()),
            Mode::Remove => TagEdit::removal(tags),
        }
    }

    pub fn verb(self) -> &'static str {
        match self {
            Mode::Add => "add",
            Mode::Remove => "remove",
        }
    }

    fn past(self) -> &'static str {
        match self {
            Mode::Add => "added",
            Mode::Remove => "removed",
        }
    }

    fn preposition(self) -> &'static str {
        match self {
            Mode::Add => "to",
            Mode::Remove => "from",
        }
    }
}

pub fn is_applicable(edit: &TagEdit, present: &[String]) -> bool {
    let has = |tag: &String| present.iter().any(|existing| existing == strip_hash(tag));
    match edit {
        TagEdit::Add(tags) => !tags.iter().all(has),
        TagEdit::Remove(tags) => tags.iter().any(has),
        TagEdit::RemoveAll => true,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkOutcome {
    NoFiles,
    NothingToChange,
    Declined,
    Applied { files: usize },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToggleTally {
    pub added: usize,
    pub removed: usize,
}

pub fn describe_targets(files: &[PathBuf]) -> String {
    match files {
        [only] => basename(only),
        _ => count_notes(files.len()),
    }
}

fn count_notes(count: usize) -> String {
    if count == 1 {
        "1 note".to_string()
    } else {
        format!("{count} notes")
    }
}

fn edit_label(edit: &TagEdit) -> String {
    match edit {
        TagEdit::RemoveAll => "all tags".to_string(),
        other => tag_label(other.tags()),
    }
}

/// Repairs a note's raw text, then applies `edit` through the front matter
/// service. Returns what the repair fixed, if anything.
pub fn edit_note(vault: &dyn Vault, path: &Path, edit: &TagEdit) -> Result<Option<RepairReport>> {
    let text = vault.read_text(path)?;
    let outcome = repair_note_text(&text);
    let repaired = match outcome.repaired {
        Some(repaired) => {
            vault.write_text(path, &repaired)?;
            Some(outcome.report)
        }
        None => None,
    };
    vault.process_frontmatter(path, &mut |frontmatter| edit.apply(frontmatter))?;
    Ok(repaired)
}

fn process_file(session: &mut Session<'_>, command: &str, path: &Path, edit: &TagEdit) -> Result<()> {
    if let Some(report) = edit_note(session.vault, path, edit)? {
        session.ui.notice(&format!(
            "fixing malformed front matter in {}: {}",
            basename(path),
            report.describe()
        ));
        record(session, command, path, "repair", &[]);
    }
    record(session, command, path, edit.action(), edit.tags());
    Ok(())
}

fn record(session: &mut Session<'_>, command: &str, path: &Path, action: &str, tags: &[String]) {
    if let Err(err) = session.log.record(command, path, action, tags) {
        session
            .ui
            .notice(&format!("warning: change log not updated: {err:#}"));
    }
}

fn show_progress(session: &mut Session<'_>, total: usize, done: usize, label: &str) {
    if total > MANY_FILES {
        session
            .ui
            .progress(&format!("Processing {label}: {done}/{total}"));
    }
}

/// Remembers a single plain tag as the one `repeat` toggles.
fn remember_last_used(session: &mut Session<'_>, tags: &[String]) -> Result<()> {
    let [tag] = tags else {
        return Ok(());
    };
    let tag = strip_hash(tag);
    if tag.is_empty() || is_sentinel(tag) {
        return Ok(());
    }
    session.store.settings.last_used_tag = tag.to_string();
    session.store.save()?;
    session.commands.register_repeat_last(tag);
    Ok(())
}

pub fn apply(
    session: &mut Session<'_>,
    mode: Mode,
    tags: &[String],
    files: &[PathBuf],
) -> Result<BulkOutcome> {
    if files.is_empty() {
        session.ui.notice(NO_FILE);
        return Ok(BulkOutcome::NoFiles);
    }

    let edit = mode.edit(tags);
    let mut applicable = Vec::new();
    for file in files {
        if is_applicable(&edit, &note_tags(session.vault, file)?) {
            applicable.push(file.clone());
        }
    }
    if applicable.is_empty() {
        session.ui.notice(NOTHING_TO_CHANGE);
        return Ok(BulkOutcome::NothingToChange);
    }

    let label = edit_label(&edit);
    let total = applicable.len();
    if edit == TagEdit::RemoveAll {
        let question = format!(
            "Remove all tags from {}? This cannot be undone.",
            describe_targets(&applicable)
        );
        if !session.ui.confirm(&question)? {
            return Ok(BulkOutcome::Declined);
        }
    }
    if total > 1 {
        let question = format!(
            "You are about to {} {label} {} {total} notes, are you sure?",
            mode.verb(),
            mode.preposition()
        );
        if !session.ui.confirm(&question)? {
            return Ok(BulkOutcome::Declined);
        }
    }

    for (idx, file) in applicable.iter().enumerate() {
        process_file(session, mode.verb(), file, &edit)?;
        show_progress(session, total, idx + 1, &label);
    }
    session.ui.clear_progress();

    let summary = match edit {
        TagEdit::RemoveAll => format!("All tags removed from {}", describe_targets(&applicable)),
        _ => format!(
            "{label} {} {} {}",
            mode.past(),
            mode.preposition(),
            describe_targets(&applicable)
        ),
    };
    session.ui.notice(&summary);

    remember_last_used(session, tags)?;
    Ok(BulkOutcome::Applied { files: total })
}

/// Adds `tag` where it is missing and removes it where present, deciding per
/// file. Nothing is written when a note would gain a tag that is not a valid
/// new tag.
pub fn toggle(session: &mut Session<'_>, tag: &str, files: &[PathBuf]) -> Result<ToggleTally> {
    let mut tally = ToggleTally::default();
    if files.is_empty() {
        session.ui.notice(NO_FILE);
        return Ok(tally);
    }
    let tag = clean_tag_name(tag)?;
    let tags = vec![tag.clone()];
    let label = tag_label(&tags);

    let mut edits = Vec::with_capacity(files.len());
    for file in files {
        let present = note_tags(session.vault, file)?;
        if is_applicable(&TagEdit::Add(tags.clone()), &present) {
            tally.added += 1;
            edits.push(TagEdit::Add(tags.clone()));
        } else {
            tally.removed += 1;
            edits.push(TagEdit::Remove(tags.clone()));
        }
    }
    if tally.added > 0 && !is_valid_new_tag(&tag) {
        bail!("'{tag}' is not a valid tag");
    }

    for (idx, (file, edit)) in files.iter().zip(&edits).enumerate() {
        process_file(session, "toggle", file, edit)?;
        show_progress(session, files.len(), idx + 1, &label);
    }
    session.ui.clear_progress();

    let summary = match (tally.added, tally.removed) {
        (_, 0) => format!("{label} added to {}", describe_targets(files)),
        (0, _) => format!("{label} removed from {}", describe_targets(files)),
        (added, removed) => format!(
            "{label} added to {}, removed from {}",
            count_notes(added),
            count_notes(removed)
        ),
    };
    session.ui.notice(&summary);

    remember_last_used(session, &tags)?;
    Ok(tally)
}
