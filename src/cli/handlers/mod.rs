mod init;
mod lists;
pub use init::cmd_init;

use std::path::PathBuf;
use std::sync::Mutex;

/// Global override for the store directory (set by -C flag)
static STORE_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io;
use crate::io::lock::StoreLock;
use crate::io::store_io::{self, Store, StoreError};
use crate::model::{ItemId, ListColor, ListItem};
use crate::presenter::{ListPresenter, PresentationPolicy};
use crate::util::sync::lock;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let json = cli.json;

    // Store -C override for load_store_cwd()
    if let Some(ref dir) = cli.store_dir {
        let abs = std::fs::canonicalize(dir)
            .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?;
        lock(&STORE_DIR_OVERRIDE).replace(abs);
    }

    match cli.command {
        Commands::Init(args) => cmd_init(args),

        // Store commands, run through a lists controller
        Commands::Lists => lists::cmd_lists(json),
        Commands::New(args) => lists::cmd_new(args, json),
        Commands::Rm(args) => lists::cmd_rm(args),
        Commands::Watch(args) => lists::cmd_watch(args, json),

        // List commands, run through a presenter
        Commands::Show(args) => cmd_show(args, json),
        Commands::Add(args) => cmd_add(args),
        Commands::Toggle(args) => cmd_toggle(args),
        Commands::Edit(args) => cmd_edit(args),
        Commands::Mv(args) => cmd_mv(args),
        Commands::Color(args) => cmd_color(args),
        Commands::CheckAll(args) => cmd_check_all(args),

        Commands::Config(cmd) => match cmd.action {
            ConfigAction::Set(args) => cmd_config_set(args),
        },
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Where store discovery starts: the -C directory, else the working directory
fn start_dir() -> Result<PathBuf, StoreError> {
    match lock(&STORE_DIR_OVERRIDE).as_ref() {
        Some(dir) => Ok(dir.clone()),
        None => std::env::current_dir().map_err(StoreError::IoError),
    }
}

fn load_store_cwd() -> Result<Store, StoreError> {
    let root = store_io::discover_store(&start_dir()?)?;
    store_io::open_store(&root)
}

/// Load list `name` into a presenter. Returns the document path for saving.
fn open_list(
    store: &Store,
    name: &str,
    policy: PresentationPolicy,
) -> Result<(PathBuf, ListPresenter), StoreError> {
    let path = store.list_path(name)?;
    if !path.is_file() {
        return Err(StoreError::NoSuchList(name.to_string()));
    }
    let parsed = store_io::read_list(&path)?;
    Ok((path, ListPresenter::with_list(policy, parsed.list)))
}

fn save_list(path: &std::path::Path, presenter: &ListPresenter) -> Result<(), StoreError> {
    store_io::write_list(path, &presenter.list())
}

/// Resolve a 1-based item number, as printed by `lk show`, to the item
fn item_at(presenter: &ListPresenter, number: usize) -> Result<ListItem, Box<dyn std::error::Error>> {
    let items = presenter.presented_items();
    number
        .checked_sub(1)
        .and_then(|i| items.get(i))
        .cloned()
        .ok_or_else(|| format!("no item {} (list has {} items)", number, items.len()).into())
}

/// `4 [x] buy milk`: the item's position and state after a change
fn describe(presenter: &ListPresenter, id: ItemId) -> String {
    match (presenter.presented_index(id), presenter.item(id)) {
        (Some(index), Some(item)) => format_item(index + 1, &item, 0),
        _ => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_show(args: ShowArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let store = load_store_cwd()?;
    let policy = if args.incomplete {
        PresentationPolicy::IncompleteOnly
    } else {
        PresentationPolicy::ShowAllGrouped
    };
    let (_path, presenter) = open_list(&store, &args.name, policy)?;
    let items = presenter.presented_items();
    let hidden = presenter.list().len() - items.len();

    if json {
        let out = ListJson {
            name: args.name.clone(),
            color: presenter.color(),
            items: items_to_json(&items),
            hidden,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{} ({})", args.name, presenter.color());
    if items.is_empty() && hidden == 0 {
        println!("  (empty)");
    }
    for line in format_items(&items) {
        println!("{}", line);
    }
    if hidden > 0 {
        println!("({} checked hidden)", hidden);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

fn cmd_add(args: AddArgs) -> Result<(), Box<dyn std::error::Error>> {
    let store = load_store_cwd()?;
    let _lock = StoreLock::acquire_default(&store.dir)?;
    let (path, presenter) = open_list(&store, &args.name, PresentationPolicy::ShowAllGrouped)?;

    let count = args.text.len();
    presenter.insert_items(args.text.into_iter().map(ListItem::new).collect());

    save_list(&path, &presenter)?;
    println!(
        "added {} item{} to {}",
        count,
        if count == 1 { "" } else { "s" },
        args.name
    );
    Ok(())
}

fn cmd_toggle(args: ItemArg) -> Result<(), Box<dyn std::error::Error>> {
    let store = load_store_cwd()?;
    let _lock = StoreLock::acquire_default(&store.dir)?;
    let (path, presenter) = open_list(&store, &args.name, PresentationPolicy::ShowAllGrouped)?;

    let item = item_at(&presenter, args.item)?;
    presenter.toggle_item(item.id());

    save_list(&path, &presenter)?;
    println!("{}", describe(&presenter, item.id()));
    Ok(())
}

fn cmd_edit(args: EditArgs) -> Result<(), Box<dyn std::error::Error>> {
    let store = load_store_cwd()?;
    let _lock = StoreLock::acquire_default(&store.dir)?;
    let (path, presenter) = open_list(&store, &args.name, PresentationPolicy::ShowAllGrouped)?;

    let item = item_at(&presenter, args.item)?;
    presenter.update_item(item.id(), args.text);

    save_list(&path, &presenter)?;
    println!("{}", describe(&presenter, item.id()));
    Ok(())
}

fn cmd_mv(args: MvArgs) -> Result<(), Box<dyn std::error::Error>> {
    let store = load_store_cwd()?;
    let _lock = StoreLock::acquire_default(&store.dir)?;
    let (path, presenter) = open_list(&store, &args.name, PresentationPolicy::ShowAllGrouped)?;

    let item = item_at(&presenter, args.item)?;
    let moved = args
        .to
        .checked_sub(1)
        .is_some_and(|to| presenter.move_item(item.id(), to));
    if !moved {
        let group = if item.is_complete { "checked" } else { "unchecked" };
        return Err(format!(
            "cannot move item {} to {}: {} items only move among themselves",
            args.item, args.to, group
        )
        .into());
    }

    save_list(&path, &presenter)?;
    println!("{}", describe(&presenter, item.id()));
    Ok(())
}

fn cmd_color(args: ColorArgs) -> Result<(), Box<dyn std::error::Error>> {
    let color: ListColor = args.color.parse()?;
    let store = load_store_cwd()?;
    let _lock = StoreLock::acquire_default(&store.dir)?;
    let (path, presenter) = open_list(&store, &args.name, PresentationPolicy::ShowAllGrouped)?;

    presenter.set_color(color);

    save_list(&path, &presenter)?;
    println!("{} → {}", args.name, color);
    Ok(())
}

fn cmd_check_all(args: CheckAllArgs) -> Result<(), Box<dyn std::error::Error>> {
    let store = load_store_cwd()?;
    let _lock = StoreLock::acquire_default(&store.dir)?;
    let (path, presenter) = open_list(&store, &args.name, PresentationPolicy::ShowAllGrouped)?;

    let complete = !args.uncheck;
    let changed = presenter
        .presented_items()
        .iter()
        .filter(|item| item.is_complete != complete)
        .count();
    presenter.update_presented_items_to_completion_state(complete);

    save_list(&path, &presenter)?;
    println!(
        "{} {} item{} in {}",
        if complete { "checked" } else { "unchecked" },
        changed,
        if changed == 1 { "" } else { "s" },
        args.name
    );
    Ok(())
}

fn cmd_config_set(args: ConfigSetArgs) -> Result<(), Box<dyn std::error::Error>> {
    let store = load_store_cwd()?;
    let _lock = StoreLock::acquire_default(&store.dir)?;

    let (_config, mut doc) = config_io::read_config(&store.dir)?;
    config_io::set_config_value(&mut doc, &args.key, &args.value)?;
    config_io::write_config(&store.dir, &doc)?;

    println!("{} = {}", args.key, args.value);
    Ok(())
}
