//! Parallel title discovery.
//!
//! Every disc is inspected in its own task. A semaphore caps how many tasks
//! run the disc tool at once. Tasks share nothing: each one owns a copy of its
//! disc and hands back the enriched copy.

use crate::catalog::Disc;
use crate::inspect::{inspect_disc, InspectError, InspectSettings};
use crate::tool::DiscTool;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Error type for the discovery phase
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The operator interrupted discovery; running tool processes were killed.
    /// `inspected` holds the discs whose inspection finished, in input order.
    #[error("Discovery interrupted after {} discs were inspected", inspected.len())]
    Interrupted { inspected: Vec<Disc> },
}

/// Inspects `discs` on a pool of `workers` concurrent tasks.
///
/// Returns exactly one disc per input disc, in input order. A disc whose
/// inspection fails comes back without candidates; a disc whose task panics
/// comes back unchanged. Cancellation kills every running tool process and
/// returns [`DiscoveryError::Interrupted`] carrying the discs finished so far.
pub async fn discover(
    discs: Vec<Disc>,
    tool: Arc<dyn DiscTool>,
    settings: InspectSettings,
    workers: usize,
    cancel: &CancellationToken,
) -> Result<Vec<Disc>, DiscoveryError> {
    let total = discs.len();
    let workers = workers.max(1);
    let semaphore = Arc::new(Semaphore::new(workers));
    let originals = discs.clone();
    let mut handles = Vec::with_capacity(total);

    info!(discs = total, workers, "starting title discovery");

    for disc in discs {
        let semaphore = semaphore.clone();
        let tool = tool.clone();
        let cancel = cancel.clone();

        handles.push(tokio::spawn(async move {
            let permit = tokio::select! {
                permit = semaphore.acquire_owned() => permit,
                _ = cancel.cancelled() => return Err(InspectError::Interrupted),
            };
            let Ok(_permit) = permit else {
                return Err(InspectError::Interrupted);
            };
            inspect_disc(disc, tool.as_ref(), settings, &cancel).await
        }));
    }

    let mut interrupted = false;
    let mut results = Vec::with_capacity(total);
    let mut completed = Vec::with_capacity(total);
    for (position, (handle, original)) in handles.into_iter().zip(originals).enumerate() {
        match handle.await {
            Ok(Ok(disc)) => {
                info!(
                    finished = position + 1,
                    total,
                    path = %disc.path.display(),
                    "disc inspected"
                );
                results.push(disc);
                completed.push(true);
            }
            Ok(Err(InspectError::Interrupted)) => {
                interrupted = true;
                results.push(original);
                completed.push(false);
            }
            Err(join_err) => {
                error!(
                    error = %join_err,
                    path = %original.path.display(),
                    "inspection task panicked"
                );
                results.push(original);
                completed.push(false);
            }
        }
    }

    if interrupted || cancel.is_cancelled() {
        let inspected = results
            .into_iter()
            .zip(completed)
            .filter_map(|(disc, done)| done.then_some(disc))
            .collect();
        return Err(DiscoveryError::Interrupted { inspected });
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::tests::{title_info, ListingTool};
    use crate::tool::{DiscInfo, ToolError};
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn disc_path(i: usize) -> PathBuf {
        PathBuf::from(format!("/media/disc{:03}/disc{:03}.iso", i, i))
    }

    fn listing(size: u64) -> DiscInfo {
        DiscInfo {
            name: None,
            titles: vec![title_info(0, size, Some(12), "Feature")],
        }
    }

    /// Tool that records how many inspections overlap.
    struct CountingTool {
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl DiscTool for CountingTool {
        async fn inspect(
            &self,
            _image: &Path,
            _min_length_secs: u32,
            _cancel: &CancellationToken,
        ) -> Result<DiscInfo, ToolError> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(listing(900))
        }

        async fn remux(
            &self,
            _image: &Path,
            _title_index: u32,
            _destination: &Path,
            _min_length_secs: u32,
            _cancel: &CancellationToken,
        ) -> Result<(), ToolError> {
            Ok(())
        }
    }

    /// Tool that blocks until cancelled.
    struct HangingTool;

    #[async_trait]
    impl DiscTool for HangingTool {
        async fn inspect(
            &self,
            _image: &Path,
            _min_length_secs: u32,
            cancel: &CancellationToken,
        ) -> Result<DiscInfo, ToolError> {
            cancel.cancelled().await;
            Err(ToolError::Cancelled)
        }

        async fn remux(
            &self,
            _image: &Path,
            _title_index: u32,
            _destination: &Path,
            _min_length_secs: u32,
            _cancel: &CancellationToken,
        ) -> Result<(), ToolError> {
            Ok(())
        }
    }

    /// Tool that panics for one specific image.
    struct PanickingTool {
        poison: PathBuf,
    }

    #[async_trait]
    impl DiscTool for PanickingTool {
        async fn inspect(
            &self,
            image: &Path,
            _min_length_secs: u32,
            _cancel: &CancellationToken,
        ) -> Result<DiscInfo, ToolError> {
            if image == self.poison {
                panic!("tool crashed");
            }
            Ok(listing(900))
        }

        async fn remux(
            &self,
            _image: &Path,
            _title_index: u32,
            _destination: &Path,
            _min_length_secs: u32,
            _cancel: &CancellationToken,
        ) -> Result<(), ToolError> {
            Ok(())
        }
    }

    /// Tool that answers for listed images and hangs on the rest until cancelled.
    struct PartialTool {
        listings: HashMap<PathBuf, DiscInfo>,
    }

    #[async_trait]
    impl DiscTool for PartialTool {
        async fn inspect(
            &self,
            image: &Path,
            _min_length_secs: u32,
            cancel: &CancellationToken,
        ) -> Result<DiscInfo, ToolError> {
            match self.listings.get(image) {
                Some(info) => Ok(info.clone()),
                None => {
                    cancel.cancelled().await;
                    Err(ToolError::Cancelled)
                }
            }
        }

        async fn remux(
            &self,
            _image: &Path,
            _title_index: u32,
            _destination: &Path,
            _min_length_secs: u32,
            _cancel: &CancellationToken,
        ) -> Result<(), ToolError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_output_preserves_input_order() {
        let discs: Vec<Disc> = (0..6).map(|i| Disc::new(disc_path(i), 1000)).collect();
        let listings = (0..6).map(|i| (disc_path(i), listing(900))).collect();
        let tool = Arc::new(ListingTool { listings });

        let result = discover(
            discs.clone(),
            tool,
            InspectSettings::default(),
            3,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let paths: Vec<&PathBuf> = result.iter().map(|d| &d.path).collect();
        let expected: Vec<&PathBuf> = discs.iter().map(|d| &d.path).collect();
        assert_eq!(paths, expected);
        assert!(result.iter().all(|d| d.titles.len() == 1));
    }

    #[tokio::test]
    async fn test_worker_pool_bounds_concurrency() {
        let tool = Arc::new(CountingTool {
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let discs: Vec<Disc> = (0..12).map(|i| Disc::new(disc_path(i), 1000)).collect();

        let result = discover(
            discs,
            tool.clone(),
            InspectSettings::default(),
            3,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(result.len(), 12);
        let peak = tool.peak.load(Ordering::SeqCst);
        assert!(peak >= 1 && peak <= 3, "peak concurrency was {}", peak);
    }

    #[tokio::test]
    async fn test_panicking_task_returns_original_disc() {
        let poison = disc_path(1);
        let tool = Arc::new(PanickingTool {
            poison: poison.clone(),
        });
        let discs: Vec<Disc> = (0..3).map(|i| Disc::new(disc_path(i), 1000)).collect();

        let result = discover(
            discs.clone(),
            tool,
            InspectSettings::default(),
            2,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(result[1], discs[1]);
        assert_eq!(result[0].titles.len(), 1);
        assert_eq!(result[2].titles.len(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_discovery() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });
        let discs: Vec<Disc> = (0..8).map(|i| Disc::new(disc_path(i), 1000)).collect();

        let result = discover(
            discs,
            Arc::new(HangingTool),
            InspectSettings::default(),
            2,
            &cancel,
        )
        .await;

        assert!(matches!(result, Err(DiscoveryError::Interrupted { .. })));
    }

    #[tokio::test]
    async fn test_interruption_returns_finished_discs() {
        let listings = [0, 2]
            .into_iter()
            .map(|i| (disc_path(i), listing(900)))
            .collect();
        let tool = Arc::new(PartialTool { listings });
        let discs: Vec<Disc> = (0..4).map(|i| Disc::new(disc_path(i), 1000)).collect();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let result = discover(discs, tool, InspectSettings::default(), 4, &cancel).await;

        let inspected = match result {
            Err(DiscoveryError::Interrupted { inspected }) => inspected,
            Ok(_) => panic!("expected interruption"),
        };
        let paths: Vec<PathBuf> = inspected.iter().map(|d| d.path.clone()).collect();
        assert_eq!(paths, vec![disc_path(0), disc_path(2)]);
        assert!(inspected.iter().all(|d| d.titles.len() == 1));
    }

    #[tokio::test]
    async fn test_scan_discover_save_load_scenario() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let library = temp_dir.path().join("library");
        std::fs::create_dir_all(library.join("movie1")).unwrap();
        let feature = library.join("movie1/movie1.iso");
        let extras = library.join("movie1/movie1_extras.iso");
        std::fs::write(&feature, vec![0u8; 5000]).unwrap();
        std::fs::write(&extras, vec![0u8; 5000]).unwrap();

        let tool = Arc::new(ListingTool {
            listings: HashMap::from([
                (
                    feature.clone(),
                    DiscInfo {
                        name: None,
                        titles: vec![title_info(0, 4000, Some(12), "Movie 1")],
                    },
                ),
                (
                    extras.clone(),
                    DiscInfo {
                        name: None,
                        titles: vec![title_info(0, 200, Some(0), "Extras")],
                    },
                ),
            ]),
        });

        let images = crate::scan::scan_disc_images(&[library]).unwrap();
        let discs = crate::scan::discs_from_paths(images).unwrap();
        let catalog = discover(
            discs,
            tool,
            InspectSettings::default(),
            2,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let document = temp_dir.path().join("catalog.json");
        crate::checkpoint::save_catalog(&catalog, &document).unwrap();
        let loaded = crate::checkpoint::load_catalog(&document).unwrap();

        assert_eq!(loaded, catalog);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].path, feature);
        assert_eq!(loaded[0].size, 5000);
        assert_eq!(loaded[0].title, "Movie 1");
        assert_eq!(loaded[0].titles.len(), 1);
        assert_eq!(loaded[0].titles[0].size, 4000);
        assert_eq!(loaded[1].path, extras);
        assert!(loaded[1].titles.is_empty());
        assert!(loaded.iter().all(|d| !d.processed));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let tool = Arc::new(ListingTool {
            listings: HashMap::new(),
        });
        let result = discover(
            Vec::new(),
            tool,
            InspectSettings::default(),
            4,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(result.is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(30))]

        #[test]
        fn prop_fan_out_cardinality(
            outcomes in prop::collection::vec(proptest::bool::ANY, 0..20),
            workers in 1usize..8,
        ) {
            let discs: Vec<Disc> = (0..outcomes.len())
                .map(|i| Disc::new(disc_path(i), 1000))
                .collect();
            // Discs mapped to `false` have no listing, so the tool fails for them
            let listings = outcomes
                .iter()
                .enumerate()
                .filter(|(_, ok)| **ok)
                .map(|(i, _)| (disc_path(i), listing(900)))
                .collect();
            let tool = Arc::new(ListingTool { listings });

            let runtime = tokio::runtime::Runtime::new().unwrap();
            let result = runtime
                .block_on(discover(
                    discs,
                    tool,
                    InspectSettings::default(),
                    workers,
                    &CancellationToken::new(),
                ))
                .unwrap();

            prop_assert_eq!(result.len(), outcomes.len());
            for (disc, ok) in result.iter().zip(&outcomes) {
                prop_assert_eq!(disc.titles.len(), if *ok { 1 } else { 0 });
            }
        }
    }
}
