use crate::cli::commands::InitArgs;
use crate::io::store_io;

use super::start_dir;

pub fn cmd_init(args: InitArgs) -> Result<(), Box<dyn std::error::Error>> {
    let root = start_dir()?;
    let store = store_io::init_store(&root, args.force)?;
    println!("Initialized list store in {}", store.dir.display());
    Ok(())
}
