use anyhow::Result;

use crate::cli::LatestArgs;
use crate::latest::refresh;

pub fn run(args: LatestArgs) -> Result<()> {
    refresh(&args.export_root, &args.latest_path)?;
    Ok(())
}
