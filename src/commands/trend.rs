use anyhow::Result;
use tracing::info;

use crate::cli::TrendArgs;
use crate::history::cross_run_view;
use crate::model::TREND_FILE;
use crate::util::write_json_pretty;

pub fn run(args: TrendArgs) -> Result<()> {
    let view = cross_run_view(&args.export_root)?;
    let output = args
        .output
        .unwrap_or_else(|| args.export_root.join(TREND_FILE));

    write_json_pretty(&output, &view)?;
    info!(
        path = %output.display(),
        runs = view.count,
        sparkline = %view.sparkline,
        "wrote benchmark trend"
    );

    Ok(())
}
