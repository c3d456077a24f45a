use crate::settings::{Settings, StarredTag};
use crate::tags::strip_hash;

pub const TOGGLE_PREFIX: &str = "quick-add-tag:";
pub const REPEAT_LAST_ID: &str = "repeat-last-tag";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandAction {
    ToggleTag(String),
    RepeatLast(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicCommand {
    pub id: String,
    pub name: String,
    pub action: CommandAction,
}

/// Commands registered at runtime, in registration order.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: Vec<DynamicCommand>,
}

pub fn toggle_command_id(tag: &str) -> String {
    format!("{TOGGLE_PREFIX}{}", strip_hash(tag))
}

impl CommandRegistry {
    pub fn from_settings(settings: &Settings) -> Self {
        let mut registry = Self::default();
        for starred in settings.priority_tags.iter().filter(|tag| tag.has_command) {
            registry.toggle_starred_command(starred);
        }
        if !settings.last_used_tag.is_empty() {
            registry.register_repeat_last(&settings.last_used_tag);
        }
        registry
    }

    /// Adds `command`, replacing any earlier registration with the same id.
    pub fn register(&mut self, command: DynamicCommand) {
        self.unregister(&command.id);
        self.commands.push(command);
    }

    pub fn unregister(&mut self, id: &str) -> bool {
        let before = self.commands.len();
        self.commands.retain(|command| command.id != id);
        before != self.commands.len()
    }

    pub fn find(&self, id: &str) -> Option<&DynamicCommand> {
        self.commands.iter().find(|command| command.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DynamicCommand> {
        self.commands.iter()
    }

    pub fn toggle_starred_command(&mut self, starred: &StarredTag) {
        let id = toggle_command_id(&starred.value);
        if starred.has_command {
            self.register(DynamicCommand {
                id,
                name: format!("Toggle #{}", starred.value),
                action: CommandAction::ToggleTag(starred.value.clone()),
            });
        } else {
            self.unregister(&id);
        }
    }

    pub fn register_repeat_last(&mut self, tag: &str) {
        let tag = strip_hash(tag);
        self.register(DynamicCommand {
            id: REPEAT_LAST_ID.to_string(),
            name: format!("Toggle recently used tag (#{tag})"),
            action: CommandAction::RepeatLast(tag.to_string()),
        });
    }
}
