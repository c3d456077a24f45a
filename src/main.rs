use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

mod actions;
mod bulk;
mod commands;
mod files;
mod gather;
mod logging;
mod query;
mod repair;
mod select;
mod session;
mod settings;
mod starred;
mod stash;
mod tags;
mod ui;
mod vault;

use bulk::{Mode, NO_FILE};
use commands::{CommandRegistry, REPEAT_LAST_ID};
use files::{TargetSpec, resolve_targets};
use gather::TagsOnFiles;
use logging::ChangeLog;
use query::{Casing, clean_new_tag};
use repair::repair_note_text;
use session::Session;
use settings::{Direction, SettingsStore, StarFlag};
use tags::{REMOVE_ALL, hash_tag, strip_hash};
use ui::{TerminalUi, Ui};
use vault::{FsVault, Vault};

fn main() -> Result<()> {
    let cli = Cli::parse();
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    let mut app = App::open(&cli.vault, cli.auto_confirm)?;
    match cli.command {
        Command::Add(cmd) => handle_add(&mut app, cmd)?,
        Command::Remove(cmd) => handle_remove(&mut app, cmd)?,
        Command::Toggle(cmd) => handle_toggle(&mut app, cmd)?,
        Command::Repeat(cmd) => handle_repeat(&mut app, cmd)?,
        Command::Tags(cmd) => handle_tags(&mut app, cmd)?,
        Command::Repair(cmd) => handle_repair(&mut app, cmd)?,
        Command::Status(cmd) => handle_status(&mut app, cmd)?,
        Command::Menu(cmd) => handle_menu(&mut app, cmd)?,
        Command::Star(cmd) => handle_star(&mut app, cmd.action)?,
        Command::Stash(cmd) => handle_stash(&mut app, cmd.action)?,
        Command::Config(cmd) => handle_config(&mut app, cmd.action)?,
        Command::Commands(cmd) => handle_commands(&mut app, cmd.action)?,
        Command::Log(cmd) => handle_log(&app, cmd)?,
        Command::SessionEnd => handle_session_end(&mut app)?,
    }

    Ok(())
}

struct App {
    vault: FsVault,
    ui: TerminalUi,
    store: SettingsStore,
    commands: CommandRegistry,
    log: ChangeLog,
}

impl App {
    fn open(root: &Path, auto_confirm: bool) -> Result<Self> {
        let vault = FsVault::open(root)?;
        let store = SettingsStore::load(&vault.state_dir())?;
        let commands = CommandRegistry::from_settings(&store.settings);
        let log = ChangeLog::new(&vault.state_dir());
        Ok(Self {
            vault,
            ui: TerminalUi::new(auto_confirm),
            store,
            commands,
            log,
        })
    }

    fn session(&mut self) -> Session<'_> {
        Session {
            vault: &self.vault,
            ui: &mut self.ui,
            store: &mut self.store,
            commands: &mut self.commands,
            log: &self.log,
        }
    }

    fn targets(&self, args: &TargetArgs) -> Result<Vec<PathBuf>> {
        resolve_targets(self.vault.root(), &args.spec())
    }

    fn display<'p>(&self, path: &'p Path) -> std::path::Display<'p> {
        path.strip_prefix(self.vault.root()).unwrap_or(path).display()
    }
}

fn handle_add(app: &mut App, cmd: AddCommand) -> Result<()> {
    let files = app.targets(&cmd.targets)?;
    let casing = app.store.settings.preferred_casing;
    let mut session = app.session();
    if cmd.tags.is_empty() {
        if cmd.many {
            actions::tag_many_via_dialog(&mut session, Mode::Add, &files)?;
        } else {
            actions::tag_via_dialog(&mut session, Mode::Add, &files)?;
        }
        return Ok(());
    }
    let tags = cmd
        .tags
        .iter()
        .map(|tag| clean_new_tag(tag, casing))
        .collect::<Result<Vec<_>>>()?;
    bulk::apply(&mut session, Mode::Add, &tags, &files)?;
    Ok(())
}

fn handle_remove(app: &mut App, cmd: RemoveCommand) -> Result<()> {
    let files = app.targets(&cmd.targets)?;
    let mut session = app.session();
    let tags: Vec<String> = if cmd.all {
        vec![REMOVE_ALL.to_string()]
    } else {
        cmd.tags.iter().map(|tag| strip_hash(tag).to_string()).collect()
    };
    if tags.is_empty() {
        if cmd.many {
            actions::tag_many_via_dialog(&mut session, Mode::Remove, &files)?;
        } else {
            actions::tag_via_dialog(&mut session, Mode::Remove, &files)?;
        }
        return Ok(());
    }
    bulk::apply(&mut session, Mode::Remove, &tags, &files)?;
    Ok(())
}

fn handle_toggle(app: &mut App, cmd: ToggleCommand) -> Result<()> {
    let files = app.targets(&cmd.targets)?;
    bulk::toggle(&mut app.session(), &cmd.tag, &files)?;
    Ok(())
}

fn handle_repeat(app: &mut App, cmd: TargetCommand) -> Result<()> {
    let files = app.targets(&cmd.targets)?;
    actions::repeat_last(&mut app.session(), &files)?;
    Ok(())
}

fn handle_tags(app: &mut App, cmd: TargetCommand) -> Result<()> {
    let files = app.targets(&cmd.targets)?;
    if files.is_empty() {
        app.ui.notice(NO_FILE);
        return Ok(());
    }
    let tally = TagsOnFiles::tally(&app.vault, &files)?;
    if tally.is_empty() {
        println!("no tags on {}", bulk::describe_targets(&files));
        return Ok(());
    }
    for (tag, count) in tally {
        println!("{:<30} {count}", hash_tag(&tag));
    }
    Ok(())
}

#[derive(Default)]
struct RepairStats {
    fixed: usize,
    would_fix: usize,
    clean: usize,
}

impl RepairStats {
    fn print(&self) {
        println!(
            "repair summary: fixed={}, would-fix={}, clean={}",
            self.fixed, self.would_fix, self.clean
        );
    }
}

fn handle_repair(app: &mut App, cmd: RepairCommand) -> Result<()> {
    let files = app.targets(&cmd.targets)?;
    if files.is_empty() {
        app.ui.notice(NO_FILE);
        return Ok(());
    }
    let mut stats = RepairStats::default();
    for path in &files {
        let text = app.vault.read_text(path)?;
        let outcome = repair_note_text(&text);
        let Some(repaired) = outcome.repaired else {
            stats.clean += 1;
            continue;
        };
        let shown = app.display(path);
        if cmd.check {
            println!("{shown}: would fix ({})", outcome.report.describe());
            stats.would_fix += 1;
            continue;
        }
        app.vault.write_text(path, &repaired)?;
        println!("{shown}: {}", outcome.report.describe());
        if let Err(err) = app.log.record("repair", path, "repair", &[]) {
            eprintln!("warning: change log not updated: {err:#}");
        }
        stats.fixed += 1;
    }
    stats.print();
    Ok(())
}

fn handle_status(app: &mut App, cmd: TargetCommand) -> Result<()> {
    let files = app.targets(&cmd.targets)?;
    let bar = starred::status_bar(&app.session(), &files)?;
    if bar.items.is_empty() && bar.stash.is_none() {
        println!("status bar is empty.");
        return Ok(());
    }
    for item in &bar.items {
        let marker = match item.active {
            Some(true) => "[x]",
            Some(false) => "[ ]",
            None => "   ",
        };
        println!("{marker} {}", hash_tag(&item.tag));
    }
    if let Some(stash) = bar.stash {
        println!("{stash}");
    }
    Ok(())
}

fn handle_menu(app: &mut App, cmd: MenuCommand) -> Result<()> {
    let files = app.targets(&cmd.targets)?;
    let mut session = app.session();
    if let Some(position) = cmd.run {
        return starred::run_menu_item(&mut session, &files, position);
    }
    let items = starred::context_menu(&session, &files)?;
    if items.is_empty() {
        println!("no context menu items.");
    }
    for (idx, item) in items.iter().enumerate() {
        println!("{:>2}. {}", idx + 1, item.label);
    }
    Ok(())
}

fn handle_star(app: &mut App, action: StarAction) -> Result<()> {
    let mut session = app.session();
    match action {
        StarAction::List => {
            let stars = &session.store.settings.priority_tags;
            if stars.is_empty() {
                println!("no starred tags.");
            }
            for (idx, star) in stars.iter().enumerate() {
                let flags: Vec<&str> = [
                    (star.show_first, "show-first"),
                    (star.has_command, "command"),
                    (star.show_in_status_bar, "status-bar"),
                    (star.show_in_context_menu, "context-menu"),
                ]
                .into_iter()
                .filter_map(|(on, name)| on.then_some(name))
                .collect();
                println!(
                    "{:>2}. {:<24} {}",
                    idx + 1,
                    hash_tag(&star.value),
                    flags.join(", ")
                );
            }
        }
        StarAction::Add { tag } => {
            starred::add_star(&mut session, tag.as_deref())?;
        }
        StarAction::Remove { tag } => starred::remove_star(&mut session, &tag)?,
        StarAction::Up { tag } => report_move(&tag, starred::move_star(&mut session, &tag, Direction::Up)?),
        StarAction::Down { tag } => {
            report_move(&tag, starred::move_star(&mut session, &tag, Direction::Down)?)
        }
        StarAction::Set {
            tag,
            show_first,
            command,
            status_bar,
            context_menu,
        } => {
            let requested = [
                (StarFlag::ShowFirst, show_first),
                (StarFlag::Command, command),
                (StarFlag::StatusBar, status_bar),
                (StarFlag::ContextMenu, context_menu),
            ];
            if requested.iter().all(|(_, value)| value.is_none()) {
                bail!("nothing to set; pass at least one flag");
            }
            for (flag, value) in requested {
                if let Some(value) = value {
                    starred::set_star_flag(&mut session, &tag, flag, value)?;
                }
            }
        }
    }
    Ok(())
}

fn report_move(tag: &str, moved: bool) {
    if moved {
        println!("moved {}", hash_tag(tag));
    } else {
        println!("{} cannot move further", hash_tag(tag));
    }
}

fn handle_stash(app: &mut App, action: StashAction) -> Result<()> {
    let mut session = app.session();
    match action {
        StashAction::List => {
            let entries = stash::stash_entries(&session.store.settings);
            if entries.is_empty() {
                println!("no stashed tags.");
            }
            for entry in entries {
                println!("{entry}");
            }
        }
        StashAction::Add { tag } => {
            stash::add_to_stash(&mut session, tag.as_deref())?;
        }
        StashAction::AddMany => {
            stash::add_many_to_stash(&mut session)?;
        }
        StashAction::Remove { tag } => {
            stash::remove_from_stash(&mut session, tag.as_deref())?;
        }
        StashAction::Clear => stash::clear_stash(&mut session)?,
        StashAction::Save { name } => stash::save_stash(&mut session, &name)?,
        StashAction::Drop { name } => {
            if !stash::drop_stash(&mut session, &name)? {
                bail!("no saved stash named '{name}'");
            }
        }
    }
    Ok(())
}

fn handle_config(app: &mut App, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let json = serde_json::to_string_pretty(&app.store.settings)
                .context("serialising settings")?;
            println!("{json}");
            return Ok(());
        }
        ConfigAction::AllTags { value } => app.store.settings.all_tags = value,
        ConfigAction::Casing { casing } => app.store.settings.preferred_casing = casing,
    }
    app.store.save()
}

fn handle_commands(app: &mut App, action: CommandsAction) -> Result<()> {
    match action {
        CommandsAction::List => {
            let mut listed = 0usize;
            for command in app.commands.iter() {
                println!("{:<32} {}", command.id, command.name);
                listed += 1;
            }
            if listed == 0 {
                println!("no dynamic commands registered.");
            }
        }
        CommandsAction::Run { id, targets } => {
            let files = app.targets(&targets)?;
            actions::run_command(&mut app.session(), &id, &files)?;
        }
    }
    Ok(())
}

fn handle_log(app: &App, cmd: LogCommand) -> Result<()> {
    let entries = app.log.read_recent(cmd.tail)?;
    if entries.is_empty() {
        println!("change log is empty.");
        return Ok(());
    }
    for entry in entries {
        let tags = entry
            .tags
            .iter()
            .map(|tag| hash_tag(tag))
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "[{}] {:<8} {:<10} {} {}",
            entry.timestamp,
            entry.command,
            entry.action,
            app.display(&entry.path),
            tags
        );
    }
    Ok(())
}

fn handle_session_end(app: &mut App) -> Result<()> {
    app.store.settings.end_session();
    app.store.save()?;
    app.commands.unregister(REPEAT_LAST_ID);
    println!("session ended; last used tag cleared.");
    Ok(())
}

#[derive(Debug, Parser)]
#[command(name = "quicktag", version, about = "Quick front matter tagging for markdown notes")]
struct Cli {
    #[arg(
        long = "vault",
        value_name = "DIR",
        default_value = ".",
        global = true,
        value_hint = ValueHint::DirPath
    )]
    vault: PathBuf,
    #[arg(long = "yes", global = true, action = ArgAction::SetTrue)]
    auto_confirm: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Add(AddCommand),
    Remove(RemoveCommand),
    Toggle(ToggleCommand),
    Repeat(TargetCommand),
    Tags(TargetCommand),
    Repair(RepairCommand),
    Status(TargetCommand),
    Menu(MenuCommand),
    Star(StarCommand),
    Stash(StashCommand),
    Config(ConfigCommand),
    Commands(CommandsCommand),
    Log(LogCommand),
    SessionEnd,
}

#[derive(Debug, Clone, Args)]
struct TargetArgs {
    #[arg(long = "target", value_name = "PATH", value_hint = ValueHint::AnyPath)]
    targets: Vec<PathBuf>,
    #[arg(long = "glob", value_name = "GLOB")]
    globs: Vec<String>,
    #[arg(long = "exclude", value_name = "GLOB")]
    exclude: Vec<String>,
    #[arg(long = "include-hidden", action = ArgAction::SetTrue)]
    include_hidden: bool,
}

impl TargetArgs {
    fn spec(&self) -> TargetSpec {
        TargetSpec {
            explicit: self.targets.clone(),
            globs: self.globs.clone(),
            exclude: self.exclude.clone(),
            include_hidden: self.include_hidden,
        }
    }
}

#[derive(Debug, Args)]
struct TargetCommand {
    #[command(flatten)]
    targets: TargetArgs,
}

#[derive(Debug, Args)]
struct AddCommand {
    #[command(flatten)]
    targets: TargetArgs,
    #[arg(long = "tag", value_name = "TAG")]
    tags: Vec<String>,
    #[arg(long, action = ArgAction::SetTrue, conflicts_with = "tags")]
    many: bool,
}

#[derive(Debug, Args)]
struct RemoveCommand {
    #[command(flatten)]
    targets: TargetArgs,
    #[arg(long = "tag", value_name = "TAG")]
    tags: Vec<String>,
    #[arg(long, action = ArgAction::SetTrue, conflicts_with = "tags")]
    many: bool,
    #[arg(long, action = ArgAction::SetTrue, conflicts_with_all = ["tags", "many"])]
    all: bool,
}

#[derive(Debug, Args)]
struct ToggleCommand {
    #[command(flatten)]
    targets: TargetArgs,
    #[arg(long = "tag", value_name = "TAG")]
    tag: String,
}

#[derive(Debug, Args)]
struct RepairCommand {
    #[command(flatten)]
    targets: TargetArgs,
    #[arg(long, action = ArgAction::SetTrue)]
    check: bool,
}

#[derive(Debug, Args)]
struct MenuCommand {
    #[command(flatten)]
    targets: TargetArgs,
    #[arg(long = "run", value_name = "N")]
    run: Option<usize>,
}

#[derive(Debug, Args)]
struct StarCommand {
    #[command(subcommand)]
    action: StarAction,
}

#[derive(Debug, Subcommand)]
enum StarAction {
    List,
    Add { tag: Option<String> },
    Remove { tag: String },
    Up { tag: String },
    Down { tag: String },
    Set {
        tag: String,
        #[arg(long = "show-first", value_name = "BOOL")]
        show_first: Option<bool>,
        #[arg(long = "command", value_name = "BOOL")]
        command: Option<bool>,
        #[arg(long = "status-bar", value_name = "BOOL")]
        status_bar: Option<bool>,
        #[arg(long = "context-menu", value_name = "BOOL")]
        context_menu: Option<bool>,
    },
}

#[derive(Debug, Args)]
struct StashCommand {
    #[command(subcommand)]
    action: StashAction,
}

#[derive(Debug, Subcommand)]
enum StashAction {
    List,
    Add { tag: Option<String> },
    AddMany,
    Remove { tag: Option<String> },
    Clear,
    Save { name: String },
    Drop { name: String },
}

#[derive(Debug, Args)]
struct ConfigCommand {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
    AllTags {
        #[arg(action = ArgAction::Set)]
        value: bool,
    },
    Casing {
        #[arg(value_enum)]
        casing: Casing,
    },
}

#[derive(Debug, Args)]
struct CommandsCommand {
    #[command(subcommand)]
    action: CommandsAction,
}

#[derive(Debug, Subcommand)]
enum CommandsAction {
    List,
    Run {
        id: String,
        #[command(flatten)]
        targets: TargetArgs,
    },
}

#[derive(Debug, Args)]
struct LogCommand {
    #[arg(long = "tail", default_value_t = 20)]
    tail: usize,
}
