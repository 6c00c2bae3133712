//! `shadegen targets`: list the supported target languages.

use anyhow::Result;
use shadegen_syntax::Target;

pub fn run() -> Result<()> {
    println!("Targets:");
    println!();
    for target in Target::ALL {
        let syntax = target.syntax();
        println!(
            "  {:<8} {:<10} .{:<7} stages: {}",
            target.name(),
            target.target_name(),
            syntax.source_extension,
            target.stage_names().join(", ")
        );
    }
    Ok(())
}
