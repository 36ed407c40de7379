use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use tracing::{debug, warn};

use super::coordinator::ListCoordinator;
use super::reconcile::FetchedColor;
use crate::model::ListColor;

/// One color to read: the record name, where it lives, and who can read it
#[derive(Clone)]
pub(crate) struct FetchJob {
    pub name: String,
    pub location: PathBuf,
    pub coordinator: Arc<dyn ListCoordinator>,
}

/// Read every job's list color, at most `max_workers` reads in flight.
///
/// Jobs are split into contiguous chunks, one scoped thread per chunk, and
/// the call returns once all of them have finished. A failed read resolves
/// to the default color. Results come back in job order.
pub(crate) fn fetch_colors(jobs: &[FetchJob], max_workers: usize) -> Vec<FetchedColor> {
    if jobs.is_empty() {
        return Vec::new();
    }
    let workers = max_workers.clamp(1, jobs.len());
    let chunk_size = jobs.len().div_ceil(workers);
    debug!(jobs = jobs.len(), workers, "fetching list colors");

    thread::scope(|scope| {
        let handles: Vec<_> = jobs
            .chunks(chunk_size)
            .map(|chunk| scope.spawn(move || chunk.iter().map(fetch_one).collect::<Vec<_>>()))
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| match handle.join() {
                Ok(results) => results,
                Err(_) => {
                    warn!("color fetch worker panicked; its records keep their cached color");
                    Vec::new()
                }
            })
            .collect()
    })
}

fn fetch_one(job: &FetchJob) -> FetchedColor {
    let color = match job.coordinator.read_list(&job.location) {
        Ok(list) => list.color,
        Err(e) => {
            warn!(
                list = %job.name,
                location = %job.location.display(),
                error = %e,
                "could not read list, using placeholder color"
            );
            ListColor::default()
        }
    };
    FetchedColor {
        name: job.name.clone(),
        location: job.location.clone(),
        color,
    }
}
