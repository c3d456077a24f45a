use anyhow::Result;

use crate::gather::{NonStashedTags, StashedTags};
use crate::query::{Casing, clean_new_tag};
use crate::select::{Selection, select_many_tags, select_tag};
use crate::session::Session;
use crate::settings::Settings;
use crate::tags::{REMOVE_ALL, hash_tag, strip_hash, tag_label};

pub const ACTIVE_STASH_TITLE: &str = "Active stash";
const ACTIVE_SEPARATOR: &str = ": ";
pub const STASH_INDICATOR: &str = " (stash): ";

fn render_entry(name: &str, separator: &str, tags: &[String]) -> String {
    let listed = tags
        .iter()
        .map(|tag| hash_tag(tag))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{name}{separator}{listed}")
}

/// Selection entries for the active stash (when non-empty) and every saved stash.
pub fn stash_entries(settings: &Settings) -> Vec<String> {
    let mut entries = Vec::new();
    if !settings.tag_stash.is_empty() {
        entries.push(render_entry(
            ACTIVE_STASH_TITLE,
            ACTIVE_SEPARATOR,
            &settings.tag_stash,
        ));
    }
    for stash in &settings.saved_stashes {
        entries.push(render_entry(&stash.name, STASH_INDICATOR, &stash.tags));
    }
    entries
}

pub fn is_stash_selection(choice: &str) -> bool {
    choice.contains(STASH_INDICATOR) || choice.starts_with(&format!("{ACTIVE_STASH_TITLE}{ACTIVE_SEPARATOR}"))
}

/// Resolves a chosen stash entry back into its tags.
///
/// The stash is looked up by name in the current settings; when that name is
/// gone the tag list embedded in the entry text is used instead.
pub fn resolve_stash_selection(settings: &Settings, choice: &str) -> Option<Vec<String>> {
    let active_prefix = format!("{ACTIVE_STASH_TITLE}{ACTIVE_SEPARATOR}");
    let (stored, listed) = if let Some(listed) = choice.strip_prefix(&active_prefix) {
        let stored = (!settings.tag_stash.is_empty()).then(|| settings.tag_stash.clone());
        (stored, listed)
    } else {
        let (name, listed) = choice.split_once(STASH_INDICATOR)?;
        let stored = settings
            .saved_stashes
            .iter()
            .find(|stash| stash.name == name)
            .map(|stash| stash.tags.clone());
        (stored, listed)
    };

    stored.or_else(|| {
        let parsed: Vec<String> = listed
            .split(',')
            .map(|tag| strip_hash(tag.trim()).to_string())
            .filter(|tag| !tag.is_empty())
            .collect();
        (!parsed.is_empty()).then_some(parsed)
    })
}

pub fn stash_indicator(settings: &Settings, width: usize) -> String {
    let listed = settings
        .tag_stash
        .iter()
        .map(|tag| hash_tag(tag))
        .collect::<Vec<_>>()
        .join(", ");
    word_wrap(&format!("Stashed tags:\n{listed}"), width, "\n ")
}

/// Breaks lines longer than `width` at spaces, joining pieces with `separator`.
pub fn word_wrap(text: &str, width: usize, separator: &str) -> String {
    let mut wrapped_lines = Vec::new();
    for line in text.split('\n') {
        let mut pieces = Vec::new();
        let mut current = String::new();
        for word in line.split(' ') {
            if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
                pieces.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        pieces.push(current);
        wrapped_lines.push(pieces.join(separator));
    }
    wrapped_lines.join("\n")
}

pub fn add_to_stash(session: &mut Session<'_>, tag: Option<&str>) -> Result<bool> {
    let tag = match tag {
        Some(tag) => clean_new_tag(tag, Casing::None)?,
        None => match select_tag(session, "Stash tag", &NonStashedTags, &[])? {
            Selection::Chosen(choice) => choice,
            Selection::Cancelled => return Ok(false),
        },
    };
    stash_and_save(session, &[tag])
}

pub fn add_many_to_stash(session: &mut Session<'_>) -> Result<bool> {
    match select_many_tags(session, "Stash tags", &NonStashedTags, &[])? {
        Some(tags) if !tags.is_empty() => stash_and_save(session, &tags),
        _ => Ok(false),
    }
}

fn stash_and_save(session: &mut Session<'_>, tags: &[String]) -> Result<bool> {
    session.store.settings.stash_tags(tags);
    session.store.save()?;
    session
        .ui
        .notice(&format!("stashed {}", tag_label(tags)));
    Ok(true)
}

/// Drops `tag` from the active stash, or one picked from it; picking
/// `REMOVE ALL` empties the stash.
pub fn remove_from_stash(session: &mut Session<'_>, tag: Option<&str>) -> Result<bool> {
    let tag = match tag {
        Some(tag) => tag.to_string(),
        None => match select_tag(session, "Unstash tag", &StashedTags, &[])? {
            Selection::Chosen(choice) => choice,
            Selection::Cancelled => return Ok(false),
        },
    };
    if tag == REMOVE_ALL {
        return clear_stash(session).map(|()| true);
    }
    if !session.store.settings.unstash_tag(&tag) {
        session
            .ui
            .notice(&format!("{} is not stashed", hash_tag(&tag)));
        return Ok(false);
    }
    session.store.save()?;
    session
        .ui
        .notice(&format!("unstashed {}", hash_tag(&tag)));
    Ok(true)
}

pub fn clear_stash(session: &mut Session<'_>) -> Result<()> {
    session.store.settings.clear_stash();
    session.store.save()?;
    session.ui.notice("stash cleared");
    Ok(())
}

pub fn save_stash(session: &mut Session<'_>, name: &str) -> Result<()> {
    session.store.settings.save_stash(name)?;
    session.store.save()?;
    session
        .ui
        .notice(&format!("stash saved as '{}'", name.trim()));
    Ok(())
}

pub fn drop_stash(session: &mut Session<'_>, name: &str) -> Result<bool> {
    let dropped = session.store.settings.drop_saved_stash(name);
    if dropped {
        session.store.save()?;
    }
    Ok(dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::Fixture;
    use crate::settings::SavedStash;
    use crate::tags::FINISHED_SELECTING;
    use crate::ui::testing::Scripted;

    fn settings() -> Settings {
        Settings {
            tag_stash: vec!["a".into(), "b".into()],
            saved_stashes: vec![SavedStash {
                name: "work".into(),
                tags: vec!["meeting".into(), "todo".into()],
            }],
            ..Settings::default()
        }
    }

    #[test]
    fn typed_stash_tags_are_cleaned() {
        let mut fixture = Fixture::new(&[]);
        assert!(add_to_stash(&mut fixture.session(), Some("123")).is_err());
        assert!(fixture.settings().tag_stash.is_empty());

        add_to_stash(&mut fixture.session(), Some("#b c")).unwrap();
        assert_eq!(fixture.settings().tag_stash, vec!["bc"]);
    }

    #[test]
    fn entries_render_active_then_saved() {
        assert_eq!(
            stash_entries(&settings()),
            vec!["Active stash: #a, #b", "work (stash): #meeting, #todo"]
        );
        assert!(stash_entries(&Settings::default()).is_empty());
    }

    #[test]
    fn entries_are_recognised_as_stashes() {
        for entry in stash_entries(&settings()) {
            assert!(is_stash_selection(&entry), "{entry}");
        }
        assert!(!is_stash_selection("#work"));
    }

    #[test]
    fn selection_resolves_by_name() {
        let settings = settings();
        assert_eq!(
            resolve_stash_selection(&settings, "work (stash): #stale"),
            Some(vec!["meeting".to_string(), "todo".to_string()])
        );
        assert_eq!(
            resolve_stash_selection(&settings, "Active stash: #a, #b"),
            Some(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn unknown_stash_falls_back_to_listed_tags() {
        assert_eq!(
            resolve_stash_selection(&Settings::default(), "gone (stash): #x, #y/z"),
            Some(vec!["x".to_string(), "y/z".to_string()])
        );
        assert_eq!(resolve_stash_selection(&Settings::default(), "#plain"), None);
    }

    #[test]
    fn word_wrap_breaks_long_lines() {
        assert_eq!(
            word_wrap("Stashed tags:\n#alpha, #beta, #gamma, #delta", 15, "\n "),
            "Stashed tags:\n#alpha, #beta,\n #gamma, #delta"
        );
    }

    #[test]
    fn stash_flows_keep_the_stash_sorted() {
        let mut fixture = Fixture::new(&[("n.md", "#zeta #alpha #mid\n")]);
        fixture.ui.script(Scripted::pick("", "#zeta"));
        assert!(add_to_stash(&mut fixture.session(), None).unwrap());
        assert!(add_to_stash(&mut fixture.session(), Some("#alpha")).unwrap());
        assert_eq!(fixture.settings().tag_stash, vec!["alpha", "zeta"]);

        fixture.ui.script(Scripted::pick("", "#mid"));
        fixture.ui.script(Scripted::pick("", FINISHED_SELECTING));
        assert!(add_many_to_stash(&mut fixture.session()).unwrap());
        assert_eq!(fixture.settings().tag_stash, vec!["alpha", "mid", "zeta"]);
        assert_eq!(fixture.ui.seen()[1], vec![FINISHED_SELECTING, "#mid"]);
    }

    #[test]
    fn unstash_by_dialog_and_remove_all() {
        let settings = Settings {
            tag_stash: vec!["a".into(), "b".into()],
            ..Settings::default()
        };
        let mut fixture = Fixture::with_settings(&[], settings);
        fixture.ui.script(Scripted::pick("", "#a"));
        assert!(remove_from_stash(&mut fixture.session(), None).unwrap());
        assert_eq!(fixture.settings().tag_stash, vec!["b"]);
        assert!(!remove_from_stash(&mut fixture.session(), Some("a")).unwrap());

        fixture.ui.script(Scripted::pick("", REMOVE_ALL));
        assert!(remove_from_stash(&mut fixture.session(), None).unwrap());
        assert!(fixture.settings().tag_stash.is_empty());
    }

    #[test]
    fn saved_stashes_show_up_in_entries() {
        let mut fixture = Fixture::new(&[]);
        assert!(save_stash(&mut fixture.session(), "empty").is_err());
        add_to_stash(&mut fixture.session(), Some("x")).unwrap();
        save_stash(&mut fixture.session(), " kept ").unwrap();
        assert_eq!(
            stash_entries(fixture.settings()),
            vec!["Active stash: #x", "kept (stash): #x"]
        );
        assert!(drop_stash(&mut fixture.session(), "kept").unwrap());
        assert!(!drop_stash(&mut fixture.session(), "kept").unwrap());
    }
}
