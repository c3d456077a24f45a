use crate::commands::CommandRegistry;
use crate::gather::GatherContext;
use crate::logging::ChangeLog;
use crate::settings::SettingsStore;
use crate::ui::Ui;
use crate::vault::Vault;

/// Everything a tagging flow needs, passed explicitly instead of held globally.
pub struct Session<'a> {
    pub vault: &'a dyn Vault,
    pub ui: &'a mut dyn Ui,
    pub store: &'a mut SettingsStore,
    pub commands: &'a mut CommandRegistry,
    pub log: &'a ChangeLog,
}

impl Session<'_> {
    pub fn gather_context(&self) -> GatherContext<'_> {
        GatherContext {
            vault: self.vault,
            settings: &self.store.settings,
        }
    }
}

#[cfg(test)]
pub mod testing {
    use super::Session;
    use crate::commands::CommandRegistry;
    use crate::logging::ChangeLog;
    use crate::settings::{Settings, SettingsStore};
    use crate::ui::testing::ScriptedUi;
    use crate::vault::testing::MemoryVault;

    pub struct Fixture {
        pub vault: MemoryVault,
        pub ui: ScriptedUi,
        pub store: SettingsStore,
        pub commands: CommandRegistry,
        pub log: ChangeLog,
    }

    impl Fixture {
        pub fn new(notes: &[(&str, &str)]) -> Self {
            Self::with_settings(notes, Settings::default())
        }

        pub fn with_settings(notes: &[(&str, &str)], settings: Settings) -> Self {
            Self {
                vault: MemoryVault::with_notes(notes),
                ui: ScriptedUi::default(),
                commands: CommandRegistry::from_settings(&settings),
                store: SettingsStore::in_memory(settings),
                log: ChangeLog::disabled(),
            }
        }

        pub fn settings(&self) -> &Settings {
            &self.store.settings
        }

        pub fn session(&mut self) -> Session<'_> {
            Session {
                vault: &self.vault,
                ui: &mut self.ui,
                store: &mut self.store,
                commands: &mut self.commands,
                log: &self.log,
            }
        }
    }
}
