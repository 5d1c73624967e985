use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::pipeline::PipelineConfig;
use crate::scrapers::types::{SearchParams, DEFAULT_CATEGORY};

#[derive(Debug, Parser)]
#[command(name = "land-scout", version, about = "Collects land-parcel tenders from torgi.gov.ru")]
pub struct Cli {
    /// Subject of the federation to collect; repeat for several. Defaults to all of them.
    #[arg(long = "subject")]
    pub subjects: Vec<String>,

    /// Lot category name as listed in catCode.json
    #[arg(long, default_value = DEFAULT_CATEGORY)]
    pub category: String,

    /// Comma-delimited lot statuses
    #[arg(long = "status", value_delimiter = ',', default_value = "APPLICATIONS_SUBMISSION,PUBLISHED")]
    pub statuses: Vec<String>,

    /// Free-text filter passed to the registry search
    #[arg(long)]
    pub text: Option<String>,

    /// Directory holding dynSubjRF.json, catCode.json and subject.json
    #[arg(long, env = "LAND_SCOUT_REFERENCE_DIR", default_value = "data/const_filters")]
    pub reference_dir: PathBuf,

    /// Scratch directory for raw search payloads
    #[arg(long, env = "LAND_SCOUT_ARTIFACT_DIR", default_value = "data/torgi_json_files")]
    pub artifact_dir: PathBuf,

    #[arg(long, env = "LAND_SCOUT_OUTPUT_DIR", default_value = "data/results")]
    pub output_dir: PathBuf,

    /// Earlier datasets kept next to the one this run writes
    #[arg(long, default_value_t = 2)]
    pub keep_datasets: usize,

    /// Minimum spacing between registry requests
    #[arg(long, default_value_t = 250)]
    pub registry_delay_ms: u64,

    /// Geometry service request budget per minute
    #[arg(long, default_value_t = 300)]
    pub geometry_per_minute: u32,
}

impl Cli {
    pub fn registry_delay(&self) -> Duration {
        Duration::from_millis(self.registry_delay_ms)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            params: SearchParams {
                category: Some(self.category.clone()).filter(|c| !c.is_empty()),
                statuses: self.statuses.iter().filter(|s| !s.is_empty()).cloned().collect(),
                text: self.text.clone(),
            },
            artifact_dir: self.artifact_dir.clone(),
            output_dir: self.output_dir.clone(),
            keep_datasets: self.keep_datasets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_usual_land_query() {
        let cli = Cli::parse_from(["land-scout"]);
        let config = cli.pipeline_config();

        assert!(cli.subjects.is_empty());
        assert_eq!(config.params.category.as_deref(), Some("Земельные участки"));
        assert_eq!(config.params.statuses, vec!["APPLICATIONS_SUBMISSION", "PUBLISHED"]);
        assert_eq!(config.keep_datasets, 2);
        assert_eq!(cli.registry_delay(), Duration::from_millis(250));
    }

    #[test]
    fn subjects_repeat_and_statuses_split() {
        let cli = Cli::parse_from([
            "land-scout",
            "--subject",
            "Пензенская область",
            "--subject",
            "Московская область",
            "--status",
            "PUBLISHED",
            "--text",
            "ИЖС",
        ]);
        let config = cli.pipeline_config();

        assert_eq!(cli.subjects, vec!["Пензенская область", "Московская область"]);
        assert_eq!(config.params.statuses, vec!["PUBLISHED"]);
        assert_eq!(config.params.text.as_deref(), Some("ИЖС"));
    }
}
