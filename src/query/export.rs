//! Bulk path export
//!
//! Streams the full paths of a subset to any `Write` sink, one per line. The
//! limit is applied before sorting, matching the behavior callers rely on:
//! the first `limit` records of the subset are chosen, then written in path
//! order.

use std::io::{BufWriter, Write};
use std::time::Instant;

use rayon::slice::ParallelSliceMut;
use tracing::info;

use crate::config::ParallelConfig;
use crate::metrics;
use crate::query::error::QueryResult;
use crate::storage::Subset;

/// Write up to `limit` paths from `subset`, sorted, one per line
///
/// `None` writes every record. Returns the number of lines written.
pub fn dump_paths<W: Write>(
    subset: &Subset,
    limit: Option<usize>,
    sink: W,
    parallel: &ParallelConfig,
) -> QueryResult<usize> {
    let start = Instant::now();
    let take = limit.map_or(subset.len(), |l| l.min(subset.len()));

    let mut paths: Vec<&str> = subset.iter().take(take).map(|r| r.path.as_str()).collect();
    if parallel.should_parallelize(paths.len()) {
        paths.par_sort_unstable();
    } else {
        paths.sort_unstable();
    }

    let mut writer = BufWriter::new(sink);
    for path in &paths {
        writer.write_all(path.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;

    info!(
        records = subset.len(),
        written = paths.len(),
        elapsed_ms = metrics::elapsed_ms(start.elapsed()),
        "Dumped record paths"
    );
    Ok(paths.len())
}
