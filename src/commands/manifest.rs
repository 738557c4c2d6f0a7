use anyhow::Result;

use crate::cli::ManifestArgs;
use crate::error::GateError;
use crate::manifest::write_manifest;

pub fn run(args: ManifestArgs) -> Result<()> {
    if !args.run_dir.is_dir() {
        return Err(GateError::Config(format!(
            "run directory does not exist: {}",
            args.run_dir.display()
        ))
        .into());
    }

    write_manifest(&args.run_dir)?;
    Ok(())
}
