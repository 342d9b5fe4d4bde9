use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub catalog: CatalogSettings,
    pub registry: RegistrySettings,
    pub slurm: SlurmSettings,
    pub output: OutputSettings,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    pub url: String,
    pub suffix: String,
    pub selection_size: usize,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            url: "https://parasite.wormbase.org/ftp.html".into(),
            suffix: ".protein.fa.gz".into(),
            selection_size: 3,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    pub base_url: String,
    pub identifier_prefix: String,
    pub default_table: String,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            base_url: "https://www.ebi.ac.uk/interpro/wwwapi".into(),
            identifier_prefix: "PF".into(),
            default_table: "SearchResults-succinatedehydrogenase.tsv".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SlurmSettings {
    pub job_name: String,
    pub nodes: u32,
    pub tasks_per_node: u32,
    pub memory: String,
    pub time_limit: String,
    pub mail_type: String,
    pub hmmsearch: String,
    pub modules: Vec<String>,
    pub e_value: f64,
    pub script_name: String,
}

impl Default for SlurmSettings {
    fn default() -> Self {
        Self {
            job_name: "HMMer_Nematodes".into(),
            nodes: 1,
            tasks_per_node: 1,
            memory: "8gb".into(),
            time_limit: "02:00:00".into(),
            mail_type: "BEGIN,END,FAIL".into(),
            hmmsearch: "/cm/shared/spack/opt/spack/linux-rocky9-x86_64_v3/gcc-12.3.0/hmmer-3.3.2-ipmjfm2vvzhroirpnpn5i4rw5wptqf7r/bin/hmmsearch".into(),
            modules: vec![
                "gcc/12.3.0-yxgv2bl".into(),
                "openmpi/4.1.5-fzc7xdf".into(),
                "hmmer/3.3.2-ipmjfm2".into(),
            ],
            e_value: 0.1,
            script_name: "HMMsearch.sh".into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub summary: String,
    pub heatmap: String,
    pub bar_chart: String,
    pub top_n: usize,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            summary: "hmmer_output_summary.csv".into(),
            heatmap: "hmmer_output_heatmap.png".into(),
            bar_chart: "hmmer_top_hits_bar_chart.png".into(),
            top_n: 10,
        }
    }
}

pub fn load_config(yaml_path: Option<&Path>) -> Result<Config> {
    let Some(yaml_path) = yaml_path else {
        info!("⚙️  No configuration file given, using built-in defaults");
        return Ok(Config::default());
    };
    if !yaml_path.exists() {
        return Err(anyhow!(
            "YAML configuration file not found: {}",
            yaml_path.display()
        ));
    }
    info!("⚙️  Loading configuration from: {}", yaml_path.display());
    let content = fs::read_to_string(yaml_path)?;
    let config: Config = serde_yaml::from_str(&content)
        .with_context(|| format!("Invalid configuration in {}", yaml_path.display()))?;
    if config.catalog.selection_size == 0 {
        return Err(anyhow!("catalog.selection_size must be at least 1"));
    }
    info!("✅ Configuration loaded successfully");
    Ok(config)
}
