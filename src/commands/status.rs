use anyhow::Result;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::history::cross_run_view;
use crate::latest::newest_run_dir;
use crate::model::ArtifactRead;
use crate::util::read_json_artifact;

pub fn run(args: StatusArgs) -> Result<()> {
    match read_json_artifact::<Map<String, Value>>(&args.latest_path) {
        ArtifactRead::Loaded(pointer) => {
            if let Some(error) = pointer.get("error").and_then(Value::as_str) {
                warn!(path = %args.latest_path.display(), error, "latest pointer holds an error");
            } else {
                let regression = pointer
                    .get("regression")
                    .and_then(|status| status.get("regression"))
                    .cloned()
                    .unwrap_or(Value::Null);
                info!(
                    path = %args.latest_path.display(),
                    run = %field(&pointer, "path"),
                    generated_at = %field(&pointer, "generated_at"),
                    regression = %regression,
                    "latest validation"
                );
            }
        }
        ArtifactRead::Missing => {
            warn!(path = %args.latest_path.display(), "latest pointer missing");
        }
        ArtifactRead::Invalid { reason } => {
            warn!(path = %args.latest_path.display(), reason = %reason, "latest pointer unreadable");
        }
    }

    match newest_run_dir(&args.export_root)? {
        Some(run_dir) => info!(path = %run_dir.display(), "newest run directory"),
        None => warn!(path = %args.export_root.display(), "no validation directories found"),
    }

    let view = cross_run_view(&args.export_root)?;
    info!(
        runs = view.count,
        skipped = view.skipped.len(),
        sparkline = %view.sparkline,
        "benchmark trend"
    );

    Ok(())
}

fn field<'a>(pointer: &'a Map<String, Value>, key: &str) -> &'a str {
    pointer.get(key).and_then(Value::as_str).unwrap_or("-")
}
