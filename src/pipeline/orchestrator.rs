use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{error, info, warn};

use crate::models::{cadastral_map_link, DetailBundle, LotRecord};
use crate::pipeline::collector::{collect, CollectOutcome};
use crate::pipeline::dataset::{prune_datasets, write_dataset};
use crate::pipeline::details::fetch_details;
use crate::pipeline::geometry::resolve;
use crate::pipeline::normalizer::normalize;
use crate::pipeline::timestamp::normalize_lot_timestamps;
use crate::reference::ReferenceData;
use crate::scrapers::traits::{GeometryApi, RegistryApi};
use crate::scrapers::types::SearchParams;

/// Where the pipeline reads and writes, and what it asks for
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub params: SearchParams,
    pub artifact_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Earlier datasets kept next to the one a run writes; older ones are
    /// removed before the new dataset is saved
    pub keep_datasets: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            params: SearchParams::default(),
            artifact_dir: PathBuf::from("data/torgi_json_files"),
            output_dir: PathBuf::from("data/results"),
            keep_datasets: 2,
        }
    }
}

/// Registry error page that ended a run
#[derive(Debug, Clone)]
pub struct HardStop {
    pub subject: String,
    pub messages: Vec<String>,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub processed: Vec<String>,
    pub skipped: Vec<String>,
    pub lots: usize,
    pub dataset: Option<PathBuf>,
    pub aborted: Option<HardStop>,
}

enum SubjectOutcome {
    Lots(Vec<LotRecord>),
    NoData,
    Abort(Vec<String>),
}

/// Drives collection and enrichment over a list of subjects
pub struct Pipeline<R, G> {
    registry: R,
    geometry: G,
    reference: ReferenceData,
    config: PipelineConfig,
}

impl<R: RegistryApi, G: GeometryApi> Pipeline<R, G> {
    pub fn new(registry: R, geometry: G, reference: ReferenceData, config: PipelineConfig) -> Self {
        Self {
            registry,
            geometry,
            reference,
            config,
        }
    }

    /// Process `subjects` one by one (all known subjects when empty) and write one dataset.
    ///
    /// An unknown category fails the run before anything is requested. A
    /// registry error page stops the loop; whatever earlier subjects produced
    /// is still written.
    pub async fn run(&self, subjects: &[String]) -> Result<RunReport> {
        if let Some(category) = self.config.params.category.as_deref() {
            self.reference
                .categories
                .code_for_name(category)
                .context("Category is not in the reference tables")?;
        }

        let run_stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let subjects = if subjects.is_empty() {
            self.reference.subject_names()
        } else {
            subjects.to_vec()
        };

        let mut report = RunReport::default();
        let mut dataset = Vec::new();
        let mut queried = false;

        for subject in subjects {
            if let Err(e) = self.reference.subjects.code_for_name(&subject) {
                error!(error = %e, "subject skipped");
                report.skipped.push(subject);
                continue;
            }
            queried = true;

            match self.process_subject(&subject, &run_stamp).await {
                Ok(SubjectOutcome::Lots(lots)) => {
                    info!("✅ {} lots ready for \"{}\"", lots.len(), subject);
                    dataset.extend(lots);
                    report.processed.push(subject);
                }
                Ok(SubjectOutcome::NoData) => {
                    error!("No data for subject \"{}\", moving on", subject);
                    report.skipped.push(subject);
                }
                Ok(SubjectOutcome::Abort(messages)) => {
                    error!(
                        "Registry answered with an error page for \"{}\", aborting run:\n{}",
                        subject,
                        messages.join("\n")
                    );
                    report.aborted = Some(HardStop { subject, messages });
                    break;
                }
                Err(e) => {
                    error!(subject = %subject, error = %format!("{e:#}"), "subject failed, moving on");
                    report.skipped.push(subject);
                }
            }
        }

        if !queried {
            warn!("No subject was queried, existing datasets left untouched");
            return Ok(report);
        }

        report.lots = dataset.len();
        // empty runs never prune
        if !dataset.is_empty() {
            if let Err(e) = prune_datasets(&self.config.output_dir, self.config.keep_datasets) {
                error!(error = %format!("{e:#}"), "failed to remove old datasets");
            }
        }
        info!("Saving {} lots...", dataset.len());
        match write_dataset(&self.config.output_dir, &run_stamp, &dataset) {
            Ok(path) => report.dataset = Some(path),
            Err(e) => error!(error = %format!("{e:#}"), "failed to save dataset"),
        }

        Ok(report)
    }

    async fn process_subject(&self, subject: &str, run_stamp: &str) -> Result<SubjectOutcome> {
        let outcome = collect(
            &self.registry,
            &self.reference,
            subject,
            &self.config.params,
            &self.config.artifact_dir,
            run_stamp,
        )
        .await?;

        let mut lots = match outcome {
            CollectOutcome::Collected(artifact) => normalize(artifact, &self.reference)?,
            CollectOutcome::NoData => return Ok(SubjectOutcome::NoData),
            CollectOutcome::HardStop(messages) => return Ok(SubjectOutcome::Abort(messages)),
        };

        self.resolve_locations(&mut lots).await;
        let before = lots.len();
        lots.retain(LotRecord::is_complete);
        info!("{} of {} lots located", lots.len(), before);

        for lot in &mut lots {
            lot.cadastral_map_link = lot
                .cadastral_number
                .as_deref()
                .and_then(|number| cadastral_map_link(lot.coords_center, number));
        }

        self.enrich(&mut lots).await;
        lots.iter_mut().for_each(normalize_lot_timestamps);

        Ok(SubjectOutcome::Lots(lots))
    }

    async fn resolve_locations(&self, lots: &mut [LotRecord]) {
        info!("Resolving coordinates from cadastral numbers via {}...", self.geometry.source_name());

        for lot in lots.iter_mut() {
            let Some(number) = lot.cadastral_number.clone() else {
                continue;
            };
            match resolve(&self.geometry, &number).await {
                Ok(location) => {
                    lot.coords_center = Some(location.coords);
                    lot.address = location.address;
                }
                Err(e) => warn!(lot = %lot.id, cadastral_number = %number, reason = %e, "location unresolved"),
            }
        }
    }

    async fn enrich(&self, lots: &mut [LotRecord]) {
        info!("Fetching lot details...");

        for lot in lots.iter_mut() {
            let details = match fetch_details(&self.registry, &lot.id).await {
                Ok(details) => details,
                Err(e) => {
                    warn!(lot = %lot.id, reason = %e, "lot details unavailable");
                    DetailBundle::default()
                }
            };
            lot.apply_details(details);
        }
    }
}
