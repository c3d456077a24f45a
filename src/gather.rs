use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Result;

use crate::settings::{Settings, StarFlag};
use crate::stash::{is_stash_selection, stash_entries};
use crate::tags::{FINISHED_SELECTING, REMOVE_ALL, hash_tag, strip_hash};
use crate::vault::{Vault, note_tags};

pub struct GatherContext<'a> {
    pub vault: &'a dyn Vault,
    pub settings: &'a Settings,
}

/// Builds the ordered candidate list offered by a selection dialog.
pub trait TagGatherer {
    fn retrieve(&self, ctx: &GatherContext<'_>, files: &[PathBuf]) -> Result<Vec<String>>;

    fn allows_new_tag(&self) -> bool;
}

/// First word of a candidate with `#` stripped: `#x (3 notes)` is `x`.
pub fn candidate_tag(candidate: &str) -> &str {
    strip_hash(candidate.split(' ').next().unwrap_or(candidate))
}

fn contains_tag(list: &[String], tag: &str) -> bool {
    let tag = strip_hash(tag);
    list.iter().any(|item| strip_hash(item) == tag)
}

/// Starred "show first" tags, then every known tag, then stash entries.
pub struct AddCandidates;

impl TagGatherer for AddCandidates {
    fn retrieve(&self, ctx: &GatherContext<'_>, files: &[PathBuf]) -> Result<Vec<String>> {
        let mut candidates: Vec<String> = ctx
            .settings
            .starred_values(Some(StarFlag::ShowFirst))
            .iter()
            .map(|tag| strip_hash(tag))
            .filter(|tag| !tag.is_empty())
            .map(hash_tag)
            .collect();

        if !ctx.settings.all_tags {
            return Ok(candidates);
        }

        for tag in ctx.vault.all_tags()? {
            if !contains_tag(&candidates, &tag) {
                candidates.push(tag);
            }
        }

        if let [only] = files {
            let present = note_tags(ctx.vault, only)?;
            candidates.retain(|candidate| !contains_tag(&present, candidate));
        }

        candidates.extend(stash_entries(ctx.settings));
        Ok(candidates)
    }

    fn allows_new_tag(&self) -> bool {
        true
    }
}

/// Tags present on the target files, with counts, plus `REMOVE ALL`.
pub struct TagsOnFiles;

impl TagsOnFiles {
    pub fn tally(vault: &dyn Vault, files: &[PathBuf]) -> Result<Vec<(String, usize)>> {
        let mut order: Vec<String> = Vec::new();
        let mut counts: HashMap<String, usize> = HashMap::new();
        for file in files {
            for tag in note_tags(vault, file)? {
                let count = counts.entry(tag.clone()).or_insert(0);
                if *count == 0 {
                    order.push(tag);
                }
                *count += 1;
            }
        }
        Ok(order
            .into_iter()
            .map(|tag| {
                let count = counts.get(&tag).copied().unwrap_or(0);
                (tag, count)
            })
            .collect())
    }
}

impl TagGatherer for TagsOnFiles {
    fn retrieve(&self, ctx: &GatherContext<'_>, files: &[PathBuf]) -> Result<Vec<String>> {
        let mut candidates: Vec<String> = Self::tally(ctx.vault, files)?
            .into_iter()
            .map(|(tag, count)| {
                if count > 1 {
                    format!("{} ({count} notes)", hash_tag(&tag))
                } else {
                    hash_tag(&tag)
                }
            })
            .collect();
        candidates.push(REMOVE_ALL.to_string());
        Ok(candidates)
    }

    fn allows_new_tag(&self) -> bool {
        false
    }
}

pub struct NonStarredTags;

impl TagGatherer for NonStarredTags {
    fn retrieve(&self, ctx: &GatherContext<'_>, _files: &[PathBuf]) -> Result<Vec<String>> {
        let starred = ctx.settings.starred_values(None);
        let mut tags = ctx.vault.all_tags()?;
        tags.retain(|tag| !contains_tag(&starred, tag));
        tags.sort();
        Ok(tags)
    }

    fn allows_new_tag(&self) -> bool {
        false
    }
}

pub struct NonStashedTags;

impl TagGatherer for NonStashedTags {
    fn retrieve(&self, ctx: &GatherContext<'_>, _files: &[PathBuf]) -> Result<Vec<String>> {
        let mut tags = ctx.vault.all_tags()?;
        tags.retain(|tag| !contains_tag(&ctx.settings.tag_stash, tag));
        Ok(tags)
    }

    fn allows_new_tag(&self) -> bool {
        false
    }
}

pub struct StashedTags;

impl TagGatherer for StashedTags {
    fn retrieve(&self, ctx: &GatherContext<'_>, _files: &[PathBuf]) -> Result<Vec<String>> {
        let mut tags: Vec<String> = ctx.settings.tag_stash.iter().map(|tag| hash_tag(tag)).collect();
        tags.push(REMOVE_ALL.to_string());
        Ok(tags)
    }

    fn allows_new_tag(&self) -> bool {
        false
    }
}

/// Wraps another gatherer for one round of a multi-select loop: offers the
/// finish sentinel first and hides what was already chosen.
pub struct RecursiveTagLoop<'a> {
    inner: &'a dyn TagGatherer,
    chosen: &'a [String],
}

impl<'a> RecursiveTagLoop<'a> {
    pub fn new(inner: &'a dyn TagGatherer, chosen: &'a [String]) -> Self {
        Self { inner, chosen }
    }
}

impl TagGatherer for RecursiveTagLoop<'_> {
    fn retrieve(&self, ctx: &GatherContext<'_>, files: &[PathBuf]) -> Result<Vec<String>> {
        let mut candidates = vec![FINISHED_SELECTING.to_string()];
        for candidate in self.inner.retrieve(ctx, files)? {
            if candidate == REMOVE_ALL || candidate == FINISHED_SELECTING {
                continue;
            }
            if is_stash_selection(&candidate) {
                continue;
            }
            if contains_tag(self.chosen, candidate_tag(&candidate)) {
                continue;
            }
            candidates.push(candidate);
        }
        Ok(candidates)
    }

    fn allows_new_tag(&self) -> bool {
        false
    }
}
