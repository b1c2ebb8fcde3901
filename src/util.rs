use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};

use crate::table::StaticTable;

/// A progress bar over `len` items, hidden unless `verbose`.
pub fn progress_bar(len: u64, verbose: bool) -> ProgressBar {
    if !verbose {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::with_template(
        "[{elapsed}/{eta}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

/// Logs how many rows of `table` were computed and why the rest were not.
pub fn log_table_summary(table: &StaticTable) {
    let missing = table.len() - table.num_computed();
    info!(
        "Built {} of {} rows ({} pooling, layer {})",
        table.num_computed(),
        table.len(),
        table.meta().pooling,
        table.meta().layer
    );
    if missing > 0 {
        warn!("{} words are unrepresentable", missing);
        for (word, reason) in table.unrepresentable() {
            debug!("{:?}: {}", word, reason);
        }
    }
}
