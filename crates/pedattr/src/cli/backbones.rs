//! The `pedattr backbones` command.

use pedattr_core::BackboneRegistry;

/// Print every registered backbone and its feature width.
pub fn execute() -> anyhow::Result<()> {
    let registry = BackboneRegistry::builtin();
    println!("{:<14} {:>8}", "BACKBONE", "FEATURES");
    for entry in registry.entries() {
        println!("{:<14} {:>8}", entry.name, entry.feature_width);
    }
    Ok(())
}
