use std::path::PathBuf;

use anyhow::{Result, bail};

use crate::bulk::{self, BulkOutcome, Mode, NO_FILE, ToggleTally};
use crate::commands::CommandAction;
use crate::select::{Selection, select_many_tags, select_tag};
use crate::session::Session;
use crate::stash::{is_stash_selection, resolve_stash_selection};

fn dialog_title(mode: Mode, many: bool) -> &'static str {
    match (mode, many) {
        (Mode::Add, false) => "Add tag",
        (Mode::Add, true) => "Add tags",
        (Mode::Remove, false) => "Remove tag",
        (Mode::Remove, true) => "Remove tags",
    }
}

/// Picks one tag (or a whole stash when adding) and applies it to `files`.
/// Returns `None` when there was nothing to open or the dialog was dismissed.
pub fn tag_via_dialog(
    session: &mut Session<'_>,
    mode: Mode,
    files: &[PathBuf],
) -> Result<Option<BulkOutcome>> {
    if files.is_empty() {
        session.ui.notice(NO_FILE);
        return Ok(None);
    }
    let choice = match select_tag(session, dialog_title(mode, false), mode.gatherer(), files)? {
        Selection::Chosen(choice) => choice,
        Selection::Cancelled => return Ok(None),
    };
    let tags = if is_stash_selection(&choice) {
        match resolve_stash_selection(&session.store.settings, &choice) {
            Some(tags) => tags,
            None => return Ok(None),
        }
    } else {
        vec![choice]
    };
    bulk::apply(session, mode, &tags, files).map(Some)
}

pub fn tag_many_via_dialog(
    session: &mut Session<'_>,
    mode: Mode,
    files: &[PathBuf],
) -> Result<Option<BulkOutcome>> {
    if files.is_empty() {
        session.ui.notice(NO_FILE);
        return Ok(None);
    }
    let tags = match select_many_tags(session, dialog_title(mode, true), mode.gatherer(), files)? {
        Some(tags) if !tags.is_empty() => tags,
        _ => return Ok(None),
    };
    bulk::apply(session, mode, &tags, files).map(Some)
}

pub fn repeat_last(session: &mut Session<'_>, files: &[PathBuf]) -> Result<Option<ToggleTally>> {
    let last = session.store.settings.last_used_tag.clone();
    if last.is_empty() {
        session.ui.notice("No recently used tag to repeat");
        return Ok(None);
    }
    bulk::toggle(session, &last, files).map(Some)
}

pub fn run_command(session: &mut Session<'_>, id: &str, files: &[PathBuf]) -> Result<ToggleTally> {
    let Some(command) = session.commands.find(id) else {
        bail!("unknown command '{id}'");
    };
    let tag = match &command.action {
        CommandAction::ToggleTag(tag) | CommandAction::RepeatLast(tag) => tag.clone(),
    };
    bulk::toggle(session, &tag, files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::REPEAT_LAST_ID;
    use crate::session::testing::Fixture;
    use crate::settings::{SavedStash, Settings};
    use crate::tags::{FINISHED_SELECTING, REMOVE_ALL};
    use crate::ui::testing::Scripted;

    fn paths(items: &[&str]) -> Vec<PathBuf> {
        items.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn add_dialog_end_to_end() {
        let mut fixture = Fixture::new(&[
            ("note.md", "---\ntags: [work]\n---\n"),
            ("other.md", "---\ntags: [home]\n---\n"),
        ]);
        fixture.ui.script(Scripted::pick("", "#home"));
        let outcome = tag_via_dialog(&mut fixture.session(), Mode::Add, &paths(&["note.md"])).unwrap();
        assert_eq!(outcome, Some(BulkOutcome::Applied { files: 1 }));
        assert_eq!(fixture.ui.seen()[0], vec!["#home"]);
        assert_eq!(fixture.vault.text("note.md"), "---\ntags:\n- work\n- home\n---\n");
        assert_eq!(fixture.ui.last_notice(), "#home added to note");
    }

    #[test]
    fn add_dialog_accepts_a_new_tag() {
        let mut fixture = Fixture::new(&[("note.md", "text\n")]);
        fixture.ui.script(Scripted::pick("Big Idea", "#BigIdea (new tag)"));
        tag_via_dialog(&mut fixture.session(), Mode::Add, &paths(&["note.md"])).unwrap();
        assert_eq!(fixture.vault.text("note.md"), "---\ntags:\n- BigIdea\n---\ntext\n");
    }

    #[test]
    fn add_dialog_applies_a_whole_stash() {
        let settings = Settings {
            saved_stashes: vec![SavedStash {
                name: "meeting".into(),
                tags: vec!["agenda".into(), "notes".into()],
            }],
            ..Settings::default()
        };
        let mut fixture = Fixture::with_settings(&[("n.md", "x\n")], settings);
        fixture
            .ui
            .script(Scripted::pick("", "meeting (stash): #agenda, #notes"));
        tag_via_dialog(&mut fixture.session(), Mode::Add, &paths(&["n.md"])).unwrap();
        assert_eq!(fixture.vault.text("n.md"), "---\ntags:\n- agenda\n- notes\n---\nx\n");
        assert!(fixture.settings().last_used_tag.is_empty());
    }

    #[test]
    fn remove_dialog_offers_remove_all() {
        let mut fixture = Fixture::new(&[("n.md", "---\ntags: [a, b]\n---\n")]);
        fixture.ui.script(Scripted::pick("", REMOVE_ALL));
        fixture.ui.answer(true);
        tag_via_dialog(&mut fixture.session(), Mode::Remove, &paths(&["n.md"])).unwrap();
        assert_eq!(fixture.ui.seen()[0], vec!["#a", "#b", REMOVE_ALL]);
        assert_eq!(fixture.vault.text("n.md"), "---\ntags: []\n---\n");
    }

    #[test]
    fn dismissed_dialog_changes_nothing() {
        let mut fixture = Fixture::new(&[("n.md", "---\ntags: [a]\n---\n")]);
        fixture.ui.script(Scripted::Cancel);
        let outcome = tag_via_dialog(&mut fixture.session(), Mode::Remove, &paths(&["n.md"])).unwrap();
        assert_eq!(outcome, None);
        assert!(fixture.vault.writes().is_empty());
        assert!(fixture.ui.notices.is_empty());
    }

    #[test]
    fn dialogs_need_a_target() {
        let mut fixture = Fixture::new(&[]);
        let outcome = tag_via_dialog(&mut fixture.session(), Mode::Add, &[]).unwrap();
        assert_eq!(outcome, None);
        assert_eq!(fixture.ui.notices, vec![NO_FILE]);
        assert!(fixture.ui.seen().is_empty());
    }

    #[test]
    fn remove_many_applies_collected_tags() {
        let mut fixture = Fixture::new(&[
            ("a.md", "---\ntags: [x, y, z]\n---\n"),
            ("b.md", "---\ntags: [y]\n---\n"),
        ]);
        fixture.ui.script(Scripted::pick("", "#y (2 notes)"));
        fixture.ui.script(Scripted::pick("", "#z"));
        fixture.ui.script(Scripted::pick("", FINISHED_SELECTING));
        fixture.ui.answer(true);
        let outcome =
            tag_many_via_dialog(&mut fixture.session(), Mode::Remove, &paths(&["a.md", "b.md"])).unwrap();
        assert_eq!(outcome, Some(BulkOutcome::Applied { files: 2 }));
        assert_eq!(fixture.vault.text("a.md"), "---\ntags:\n- x\n---\n");
        assert_eq!(fixture.ui.last_notice(), "#y, #z removed from 2 notes");
    }

    #[test]
    fn repeat_toggles_last_used_tag() {
        let mut fixture = Fixture::new(&[("n.md", "---\ntags: [a]\n---\n")]);
        assert_eq!(repeat_last(&mut fixture.session(), &paths(&["n.md"])).unwrap(), None);

        bulk::apply(&mut fixture.session(), Mode::Add, &["b".to_string()], &paths(&["n.md"])).unwrap();
        let tally = repeat_last(&mut fixture.session(), &paths(&["n.md"])).unwrap();
        assert_eq!(tally, Some(ToggleTally { added: 0, removed: 1 }));

        let tally = run_command(&mut fixture.session(), REPEAT_LAST_ID, &paths(&["n.md"])).unwrap();
        assert_eq!(tally.added, 1);
        assert!(run_command(&mut fixture.session(), "missing", &paths(&["n.md"])).is_err());
    }
}
