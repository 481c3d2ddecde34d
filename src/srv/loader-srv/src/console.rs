//! Console front end: dialogs and menus printed to stdout, and a line-oriented command shell.
use std::io::{BufRead, Write};

use loader::{
    registry::{AppCategory, MenuApp},
    ui::{LoaderUi, MenuKind, MenuView, MismatchChoice},
    CloseHook, Loader, LoaderStatus, SlotStats,
};
use miette::IntoDiagnostic;
use parking_lot::Mutex;

pub struct ConsoleUi {
    mismatch: MismatchChoice,
    main_menu: Vec<MenuApp>,
    games_menu: Vec<MenuApp>,
    open: Mutex<Vec<CloseHook>>,
}

impl ConsoleUi {
    pub fn new(mismatch: MismatchChoice, main_menu: &[MenuApp], games_menu: &[MenuApp]) -> Self {
        Self {
            mismatch,
            main_menu: main_menu.to_vec(),
            games_menu: games_menu.to_vec(),
            open: Mutex::new(Vec::new()),
        }
    }

    /// Close every menu and browser currently shown.
    pub fn close_all(&self) -> usize {
        let hooks: Vec<_> = self.open.lock().drain(..).collect();
        for hook in &hooks {
            hook.close();
        }
        hooks.len()
    }
}

struct ConsoleView;

impl MenuView for ConsoleView {}

fn print_menu(title: &str, entries: &[MenuApp]) {
    println!("-- {} --", title);
    for entry in entries {
        if entry.label == entry.target {
            println!("  {}", entry.label);
        } else {
            println!("  {} ({})", entry.label, entry.target);
        }
    }
}

impl LoaderUi for ConsoleUi {
    fn confirm_api_mismatch(&self) -> MismatchChoice {
        println!("!! API mismatch: this app was built for a different firmware.");
        println!("!! answering {:?}", self.mismatch);
        self.mismatch
    }

    fn show_error(&self, header: &str, text: &str) {
        println!("== {} ==", header);
        println!("{}", text);
    }

    fn open_menu(&self, kind: MenuKind, on_close: CloseHook) -> Box<dyn MenuView> {
        match kind {
            MenuKind::Main => print_menu("main menu", &self.main_menu),
            MenuKind::Games => print_menu("games", &self.games_menu),
        }
        self.open.lock().push(on_close);
        Box::new(ConsoleView)
    }

    fn open_applications(&self, on_close: CloseHook) -> Box<dyn MenuView> {
        println!("-- applications -- (open a file path to run it)");
        self.open.lock().push(on_close);
        Box::new(ConsoleView)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    List,
    Open { name: &'a str, args: Option<&'a str> },
    Info,
    Close,
    Lock,
    Unlock,
    Menu,
    Games,
    Back,
    Help,
    Quit,
}

/// Split `open` arguments into the app name and its arguments. A name containing spaces must be
/// quoted.
fn split_open(rest: &str) -> Option<(&str, Option<&str>)> {
    let rest = rest.trim();
    let (name, args) = if let Some(quoted) = rest.strip_prefix('"') {
        let end = quoted.find('"')?;
        (&quoted[..end], &quoted[end + 1..])
    } else {
        rest.split_once(char::is_whitespace).unwrap_or((rest, ""))
    };
    let args = args.trim();
    (!name.is_empty()).then_some((name, (!args.is_empty()).then_some(args)))
}

fn parse(line: &str) -> Result<Command<'_>, String> {
    let line = line.trim();
    let (cmd, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    Ok(match cmd {
        "list" => Command::List,
        "open" => {
            let (name, args) = split_open(rest).ok_or("usage: open <name> [args]")?;
            Command::Open { name, args }
        }
        "info" => Command::Info,
        "close" => Command::Close,
        "lock" => Command::Lock,
        "unlock" => Command::Unlock,
        "menu" => Command::Menu,
        "games" => Command::Games,
        "back" => Command::Back,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command '{}', try 'help'", other)),
    })
}

fn print_help() {
    println!("commands:");
    println!("  list                  list applications");
    println!("  open <name> [args]    start an application");
    println!("  info                  show loader state");
    println!("  close                 ask the running application to exit");
    println!("  lock | unlock         reserve or release the application slot");
    println!("  menu | games          show a menu");
    println!("  back                  close open menus");
    println!("  quit");
}

fn print_list(loader: &Loader) {
    let registry = loader.registry();
    for category in AppCategory::SEARCH_ORDER {
        let apps: Vec<_> = registry
            .internal_apps()
            .filter(|app| app.category() == category)
            .map(|app| app.name())
            .collect();
        if !apps.is_empty() {
            println!("{:?}: {}", category, apps.join(", "));
        }
    }
    for app in registry.external_apps() {
        if let Some(path) = app.path() {
            println!("External: {} ({})", app.name(), path.display());
        }
    }
}

fn print_info(loader: &Loader) -> miette::Result<()> {
    let stats = loader.stat()?;
    match stats.slot {
        SlotStats::NoApp => println!("no application running"),
        SlotStats::Reserved => println!("loader is locked"),
        SlotStats::Running(app) => {
            println!(
                "running: {} (id {}, up {:.1}s)",
                app.name,
                app.app_id,
                app.uptime.as_secs_f32()
            );
            println!(
                "  file backed: {}, insomnia: {}, heap trace: {}",
                app.file_backed, app.insomnia_held, app.heap_trace
            );
        }
    }
    println!(
        "started {}, failed {}, menu open: {}, browser open: {}",
        stats.apps_started, stats.failed_starts, stats.menu_open, stats.applications_open
    );
    Ok(())
}

/// Read commands from stdin until `quit` or end of input.
pub fn run_shell(loader: &Loader, ui: &ConsoleUi) -> miette::Result<()> {
    let stdin = std::io::stdin();
    // Locks taken from this shell; unlocking someone else's lock is a bug.
    let mut held_locks = 0usize;
    print!("> ");
    std::io::stdout().flush().into_diagnostic()?;
    for line in stdin.lock().lines() {
        let line = line.into_diagnostic()?;
        if !line.trim().is_empty() {
            match parse(&line) {
                Ok(Command::Quit) => break,
                Ok(cmd) => run_command(loader, ui, cmd, &mut held_locks)?,
                Err(e) => println!("{}", e),
            }
        }
        print!("> ");
        std::io::stdout().flush().into_diagnostic()?;
    }
    for _ in 0..held_locks {
        loader.unlock();
    }
    Ok(())
}

fn run_command(
    loader: &Loader,
    ui: &ConsoleUi,
    cmd: Command<'_>,
    held_locks: &mut usize,
) -> miette::Result<()> {
    match cmd {
        Command::List => print_list(loader),
        Command::Open { name, args } => {
            let status = loader.start_with_gui_error(name, args);
            // Unknown and internal errors were already shown as dialogs.
            if !matches!(
                status,
                LoaderStatus::ErrorUnknownApp { .. } | LoaderStatus::ErrorInternal { .. }
            ) {
                println!("{}", status);
            }
        }
        Command::Info => print_info(loader)?,
        Command::Close => {
            if !loader.signal_exit() {
                println!("no application running");
            }
        }
        Command::Lock => {
            if loader.lock() {
                *held_locks += 1;
                println!("locked");
            } else {
                println!("loader is busy");
            }
        }
        Command::Unlock => {
            if *held_locks == 0 {
                println!("not locked from this shell");
            } else {
                *held_locks -= 1;
                loader.unlock();
                println!("unlocked");
            }
        }
        Command::Menu => loader.show_menu(),
        Command::Games => loader.show_games_menu(),
        Command::Back => {
            if ui.close_all() == 0 {
                println!("no menu open");
            }
        }
        Command::Help => print_help(),
        Command::Quit => {}
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_open() {
        assert_eq!(
            parse("open Clock").unwrap(),
            Command::Open {
                name: "Clock",
                args: None
            }
        );
        assert_eq!(
            parse("open Counter  10 ").unwrap(),
            Command::Open {
                name: "Counter",
                args: Some("10")
            }
        );
        assert_eq!(
            parse("open \"CFW Settings\" fast").unwrap(),
            Command::Open {
                name: "CFW Settings",
                args: Some("fast")
            }
        );
        assert!(parse("open").is_err());
        assert!(parse("open \"unterminated").is_err());
    }

    #[test]
    fn parse_simple() {
        assert_eq!(parse(" info ").unwrap(), Command::Info);
        assert_eq!(parse("exit").unwrap(), Command::Quit);
        assert!(parse("reboot").is_err());
    }
}
