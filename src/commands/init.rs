//! Initialize shipline configuration for a control workspace

use crate::core::config::ShipConfig;
use crate::core::error::{ShipError, ShipResult};
use std::env;

/// Run the init command
pub fn run_init(force: bool) -> ShipResult<()> {
  let root = env::current_dir()?;

  if ShipConfig::exists(&root) && !force {
    return Err(ShipError::with_help(
      "A shipline configuration already exists in this directory",
      "Use --force to overwrite it with defaults.",
    ));
  }

  let config = ShipConfig::new();
  config.save(&root)?;

  println!("\n✅ Created ship.toml");
  println!("\n   Next steps:");
  println!("   1. Register repositories with [[repos]] entries (id, path)");
  println!("   2. Create a release window: shipline window create <key>");
  println!("   3. Attach iterations: shipline iteration attach <window> <iteration>\n");

  Ok(())
}
