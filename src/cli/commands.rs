use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "lk", about = concat!("listkeeper v", env!("CARGO_PKG_VERSION"), " - colored checklists in plain text"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different store directory
    #[arg(short = 'C', long = "store-dir", global = true)]
    pub store_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new list store in the current directory
    Init(InitArgs),
    /// Show every list with its color
    Lists,
    /// Create a new, empty list
    New(NewArgs),
    /// Delete a list
    Rm(ListNameArg),
    /// Show the items of a list
    Show(ShowArgs),
    /// Add items to the top of a list
    Add(AddArgs),
    /// Check or uncheck an item
    Toggle(ItemArg),
    /// Change an item's text
    Edit(EditArgs),
    /// Move an item within its group
    Mv(MvArgs),
    /// Change a list's color
    Color(ColorArgs),
    /// Check (or uncheck) every item of a list
    CheckAll(CheckAllArgs),
    /// Print list changes in the store as they happen
    Watch(WatchArgs),
    /// Edit lists.toml
    Config(ConfigCmd),
}

// ---------------------------------------------------------------------------
// Store args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct InitArgs {
    /// Reinitialize even if lists/ already exists
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct NewArgs {
    /// List name (becomes the file name)
    pub name: String,
    /// List color (default: from lists.toml)
    #[arg(long)]
    pub color: Option<String>,
}

#[derive(Args)]
pub struct ListNameArg {
    /// List name
    pub name: String,
}

#[derive(Args)]
pub struct WatchArgs {
    /// Stop after this many milliseconds (default: run until interrupted)
    #[arg(long, value_name = "MS")]
    pub timeout: Option<u64>,
}

// ---------------------------------------------------------------------------
// List args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ShowArgs {
    /// List name
    pub name: String,
    /// Hide checked items
    #[arg(long)]
    pub incomplete: bool,
}

#[derive(Args)]
pub struct AddArgs {
    /// List name
    pub name: String,
    /// Item text (several items may be given; the last one ends up first)
    #[arg(required = true)]
    pub text: Vec<String>,
}

#[derive(Args)]
pub struct ItemArg {
    /// List name
    pub name: String,
    /// Item number as printed by `lk show`
    pub item: usize,
}

#[derive(Args)]
pub struct EditArgs {
    /// List name
    pub name: String,
    /// Item number as printed by `lk show`
    pub item: usize,
    /// New text
    pub text: String,
}

#[derive(Args)]
pub struct MvArgs {
    /// List name
    pub name: String,
    /// Item number as printed by `lk show`
    pub item: usize,
    /// Destination number
    pub to: usize,
}

#[derive(Args)]
pub struct ColorArgs {
    /// List name
    pub name: String,
    /// New color: gray, blue, green, yellow, orange, red
    pub color: String,
}

#[derive(Args)]
pub struct CheckAllArgs {
    /// List name
    pub name: String,
    /// Uncheck instead
    #[arg(long)]
    pub uncheck: bool,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ConfigCmd {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Set a value, e.g. `lk config set lists.default_color blue`
    Set(ConfigSetArgs),
}

#[derive(Args)]
pub struct ConfigSetArgs {
    /// Dotted key (section.key)
    pub key: String,
    /// New value
    pub value: String,
}
