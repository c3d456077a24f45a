use serde_yaml::{Mapping, Value};

pub const TAG_KEY: &str = "tags";
pub const ALTERNATE_KEYS: [&str; 3] = ["tag", "Tag", "Tags"];

pub const REMOVE_ALL: &str = "REMOVE ALL";
pub const FINISHED_SELECTING: &str = "FINISHED SELECTING TAGS";

/// Canonical stored form of a tag: no leading `#`.
pub fn strip_hash(tag: &str) -> &str {
    tag.trim_start_matches('#')
}

/// Display form of a tag: exactly one leading `#`.
pub fn hash_tag(tag: &str) -> String {
    format!("#{}", strip_hash(tag))
}

pub fn is_sentinel(value: &str) -> bool {
    value == REMOVE_ALL || value == FINISHED_SELECTING
}

pub fn tag_label(tags: &[String]) -> String {
    tags.iter()
        .map(|tag| hash_tag(tag))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Converts any stored shape of a tag field into a flat list.
///
/// Strings are split on commas first. Every resulting fragment is then split on
/// whitespace, since a tag never contains a space and the host stores space
/// separated tags as one string.
pub fn conform_to_list(value: &Value) -> Vec<String> {
    let fragments: Vec<String> = match value {
        Value::Null => Vec::new(),
        Value::String(text) => text.split(',').map(|part| part.to_string()).collect(),
        Value::Sequence(items) => items.iter().filter_map(scalar_text).collect(),
        Value::Tagged(tagged) => return conform_to_list(&tagged.value),
        other => scalar_text(other).into_iter().collect(),
    };

    fragments
        .iter()
        .flat_map(|fragment| fragment.split_whitespace())
        .map(|tag| tag.to_string())
        .collect()
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn push_unique(tags: &mut Vec<String>, tag: &str) {
    let tag = strip_hash(tag);
    if tag.is_empty() || tags.iter().any(|existing| existing == tag) {
        return;
    }
    tags.push(tag.to_string());
}

fn is_tag_key(key: &Value) -> bool {
    key.as_str()
        .map(|name| name == TAG_KEY || ALTERNATE_KEYS.contains(&name))
        .unwrap_or(false)
}

/// Folds every tag-like key into a single `tags` list of bare tag strings.
///
/// The canonical key's own entries come first, followed by entries from the
/// alternate keys in [`ALTERNATE_KEYS`] order. The `tags` entry takes the
/// position of the first tag-like key in the mapping, or is appended.
pub fn normalize(frontmatter: &mut Mapping) {
    let mut tags = Vec::new();
    if let Some(value) = frontmatter.get(TAG_KEY) {
        for tag in conform_to_list(value) {
            push_unique(&mut tags, &tag);
        }
    }
    for key in ALTERNATE_KEYS {
        if let Some(value) = frontmatter.get(key) {
            for tag in conform_to_list(value) {
                push_unique(&mut tags, &tag);
            }
        }
    }

    let list = Value::Sequence(tags.into_iter().map(Value::String).collect());
    let mut pending = Some(list);
    let mut rebuilt = Mapping::new();
    for (key, value) in std::mem::take(frontmatter) {
        if !is_tag_key(&key) {
            rebuilt.insert(key, value);
            continue;
        }
        if let Some(list) = pending.take() {
            rebuilt.insert(Value::String(TAG_KEY.to_string()), list);
        }
    }
    if let Some(list) = pending {
        rebuilt.insert(Value::String(TAG_KEY.to_string()), list);
    }
    *frontmatter = rebuilt;
}

pub fn tag_list(frontmatter: &Mapping) -> Vec<String> {
    let mut copy = frontmatter.clone();
    normalize(&mut copy);
    copy.get(TAG_KEY)
        .and_then(Value::as_sequence)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

pub fn add_tags(existing: &[String], tags: &[String]) -> Vec<String> {
    let mut result = existing.to_vec();
    for tag in tags {
        push_unique(&mut result, tag);
    }
    result
}

pub fn remove_tags(existing: &[String], tags: &[String]) -> Vec<String> {
    existing
        .iter()
        .filter(|tag| {
            !tags
                .iter()
                .any(|target| strip_hash(target) == strip_hash(tag))
        })
        .cloned()
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagEdit {
    Add(Vec<String>),
    Remove(Vec<String>),
    RemoveAll,
}

impl TagEdit {
    /// Picks the removal flavour from the requested tags: the `REMOVE ALL`
    /// sentinel as the first element clears everything.
    pub fn removal(tags: &[String]) -> Self {
        match tags.first() {
            Some(first) if first == REMOVE_ALL => TagEdit::RemoveAll,
            _ => TagEdit::Remove(tags.to_vec()),
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            TagEdit::Add(_) => "add",
            TagEdit::Remove(_) => "remove",
            TagEdit::RemoveAll => "remove-all",
        }
    }

    pub fn tags(&self) -> &[String] {
        match self {
            TagEdit::Add(tags) | TagEdit::Remove(tags) => tags,
            TagEdit::RemoveAll => &[],
        }
    }

    pub fn apply(&self, frontmatter: &mut Mapping) {
        normalize(frontmatter);
        let existing = tag_list(frontmatter);
        let updated = match self {
            TagEdit::Add(tags) => add_tags(&existing, tags),
            TagEdit::Remove(tags) => remove_tags(&existing, tags),
            TagEdit::RemoveAll => Vec::new(),
        };
        frontmatter.insert(
            Value::String(TAG_KEY.to_string()),
            Value::Sequence(updated.into_iter().map(Value::String).collect()),
        );
    }
}
