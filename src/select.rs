use std::path::PathBuf;

use anyhow::Result;
use nucleo_matcher::pattern::{CaseMatching, Normalization, Pattern};
use nucleo_matcher::{Config, Matcher, Utf32Str};

use crate::gather::{GatherContext, RecursiveTagLoop, TagGatherer, candidate_tag};
use crate::query::{Casing, clean_query, is_valid_new_tag};
use crate::session::Session;
use crate::stash::is_stash_selection;
use crate::tags::{FINISHED_SELECTING, is_sentinel, strip_hash, tag_label};

const NEW_TAG_SUFFIX: &str = "(new tag)";

/// Outcome of a selection dialog. Dismissal is its own variant so that it can
/// never be confused with choosing a sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Chosen(String),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub text: String,
    pub score: Option<u32>,
}

pub struct SelectionDialog {
    title: String,
    items: Vec<String>,
    allows_new_tag: bool,
    casing: Casing,
    matcher: Matcher,
}

impl SelectionDialog {
    /// Fetches the candidate list once; it is never refreshed while the dialog lives.
    pub fn open(
        title: &str,
        gatherer: &dyn TagGatherer,
        ctx: &GatherContext<'_>,
        files: &[PathBuf],
    ) -> Result<Self> {
        let items = gatherer.retrieve(ctx, files)?;
        Ok(Self::with_items(
            title,
            items,
            gatherer.allows_new_tag(),
            ctx.settings.preferred_casing,
        ))
    }

    pub fn with_items(title: &str, items: Vec<String>, allows_new_tag: bool, casing: Casing) -> Self {
        Self {
            title: title.to_string(),
            items,
            allows_new_tag,
            casing,
            matcher: Matcher::new(Config::DEFAULT),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    #[cfg(test)]
    pub fn items(&self) -> &[String] {
        &self.items
    }

    /// Ranked matches for `raw_query`, best first, with an optional trailing
    /// new-tag entry that is never ranked above a real match.
    pub fn suggestions(&mut self, raw_query: &str) -> Vec<Suggestion> {
        let query = clean_query(raw_query, self.casing);
        if query.is_empty() {
            return self
                .items
                .iter()
                .map(|item| Suggestion {
                    text: item.clone(),
                    score: None,
                })
                .collect();
        }

        let pattern = Pattern::parse(&query, CaseMatching::Ignore, Normalization::Smart);
        let mut buf = Vec::new();
        let mut matches: Vec<Suggestion> = Vec::new();
        for item in &self.items {
            let haystack = Utf32Str::new(item, &mut buf);
            if let Some(score) = pattern.score(haystack, &mut self.matcher) {
                matches.push(Suggestion {
                    text: item.clone(),
                    score: Some(score),
                });
            }
        }
        matches.sort_by(|a, b| b.score.cmp(&a.score));

        if self.offers_new_tag(&query) {
            matches.push(Suggestion {
                text: format!("#{query} {NEW_TAG_SUFFIX}"),
                score: None,
            });
        }
        matches
    }

    fn offers_new_tag(&self, query: &str) -> bool {
        if !self.allows_new_tag || !is_valid_new_tag(query) {
            return false;
        }
        let wanted = strip_hash(query).to_lowercase();
        !self
            .items
            .iter()
            .filter(|item| !is_sentinel(item) && !is_stash_selection(item))
            .any(|item| candidate_tag(item).to_lowercase() == wanted)
    }

    /// Value handed back for a chosen entry: sentinels and stash entries pass
    /// through, anything else is cut at the first space.
    pub fn choose(&self, chosen: &str) -> String {
        if is_sentinel(chosen) || is_stash_selection(chosen) {
            return chosen.to_string();
        }
        chosen.split(' ').next().unwrap_or(chosen).to_string()
    }
}

/// Opens a dialog for `gatherer` and waits for the user's choice.
///
/// A gatherer failure is reported and leaves the dialog empty.
pub fn select_tag(
    session: &mut Session<'_>,
    title: &str,
    gatherer: &dyn TagGatherer,
    files: &[PathBuf],
) -> Result<Selection> {
    let opened = SelectionDialog::open(title, gatherer, &session.gather_context(), files);
    let mut dialog = match opened {
        Ok(dialog) => dialog,
        Err(err) => {
            session
                .ui
                .notice(&format!("error: unable to list tags: {err:#}"));
            SelectionDialog::with_items(title, Vec::new(), false, session.store.settings.preferred_casing)
        }
    };
    session.ui.select(&mut dialog)
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoopState {
    chosen: Vec<String>,
}

impl LoopState {
    pub fn chosen(&self) -> &[String] {
        &self.chosen
    }

    pub fn accept(&mut self, tag: &str) -> bool {
        let bare = strip_hash(tag);
        if bare.is_empty() || self.chosen.iter().any(|chosen| chosen == bare) {
            return false;
        }
        self.chosen.push(bare.to_string());
        true
    }

    pub fn into_tags(self) -> Vec<String> {
        self.chosen
    }
}

/// Repeats [`select_tag`] until the finish sentinel is chosen. Returns `None`
/// when any round is dismissed.
pub fn select_many_tags(
    session: &mut Session<'_>,
    title: &str,
    gatherer: &dyn TagGatherer,
    files: &[PathBuf],
) -> Result<Option<Vec<String>>> {
    let mut state = LoopState::default();
    loop {
        let looped = RecursiveTagLoop::new(gatherer, state.chosen());
        let selection = select_tag(session, title, &looped, files)?;
        let choice = match selection {
            Selection::Cancelled => return Ok(None),
            Selection::Chosen(choice) if choice == FINISHED_SELECTING => {
                return Ok(Some(state.into_tags()));
            }
            Selection::Chosen(choice) => choice,
        };

        if state.accept(&choice) {
            session
                .ui
                .notice(&format!("selected: {}", tag_label(state.chosen())));
        }
    }
}
