use crate::aggregate::{collect_hits, print_table, top_hits, write_summary, ScoreMatrix};
use crate::catalog::fetch_catalog;
use crate::charts::{display_image, render_heatmap, render_top_hits};
use crate::config::{Config, OutputSettings};
use crate::console::Console;
use crate::download::download_and_decompress;
use crate::error::{InputError, PipelineError, PipelineResult};
use crate::hmmer::HitRecord;
use crate::profiles::extract_profiles;
use crate::script::write_job_script;
use crate::selector::select_entries;
use regex::Regex;
use reqwest::Client;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Files fetched before the search job runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inputs {
    pub sequence_sets: Vec<String>,
    pub profiles: Vec<String>,
}

#[derive(Debug)]
pub struct Summary {
    pub table: Vec<HitRecord>,
    pub matrix: ScoreMatrix,
    pub top: Vec<HitRecord>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum TableChoice {
    Default,
    Change,
}

pub fn parse_table_choice(answer: &str) -> Result<TableChoice, InputError> {
    match answer.trim().to_lowercase().as_str() {
        "y" => Ok(TableChoice::Default),
        "change" => Ok(TableChoice::Change),
        _ => Err(InputError::UnknownChoice),
    }
}

fn contact_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("contact pattern is valid"))
}

pub fn validate_contact(answer: &str) -> Result<String, InputError> {
    let address = answer.trim();
    if contact_pattern().is_match(address) {
        Ok(address.to_string())
    } else {
        Err(InputError::InvalidContact(address.to_string()))
    }
}

pub struct Pipeline {
    client: Client,
    config: Config,
    workdir: PathBuf,
    max_attempts: Option<u32>,
    display: bool,
}

impl Pipeline {
    pub fn new(config: Config, workdir: PathBuf, max_attempts: Option<u32>, display: bool) -> Self {
        Self {
            client: Client::new(),
            config,
            workdir,
            max_attempts,
            display,
        }
    }

    pub async fn run<R: BufRead, W: Write>(&self, console: &mut Console<R, W>) -> PipelineResult<()> {
        let inputs = self.fetch_inputs(console).await?;

        let contact = self.ask_contact(console)?;
        let script_path = self.workdir.join(&self.config.slurm.script_name);
        write_job_script(
            &script_path,
            &self.config.slurm,
            &contact,
            &inputs.profiles,
            &inputs.sequence_sets,
        )?;
        console.say(&format!(
            "\nSubmission script ({}) created successfully in {}\n",
            self.config.slurm.script_name,
            self.workdir.display()
        ))?;

        self.wait_for_outputs(console)?;
        let summary = summarise(&mut io::stdout().lock(), &self.workdir, &inputs, &self.config.output)?;
        for chart in render_charts(&self.workdir, &self.config.output, &summary)? {
            self.show(&chart);
        }
        Ok(())
    }

    /// Catalog, proteome selection and download, then profile download.
    pub async fn fetch_inputs<R: BufRead, W: Write>(&self, console: &mut Console<R, W>) -> PipelineResult<Inputs> {
        let wanted = self.config.catalog.selection_size;
        let catalog = fetch_catalog(&self.client, &self.config.catalog.url, &self.config.catalog.suffix).await?;
        if catalog.len() < wanted {
            return Err(PipelineError::CatalogFetch {
                url: self.config.catalog.url.clone(),
                reason: format!("only {} entries listed, {} needed", catalog.len(), wanted),
            });
        }

        let selected = select_entries(console, &catalog, wanted, self.max_attempts)?;
        let mut sequence_sets = Vec::with_capacity(selected.len());
        for entry in selected {
            info!("🧬 {} ({})", entry.label, entry.group);
            sequence_sets.push(download_and_decompress(&self.client, &entry.url, &self.workdir).await?);
        }
        console.say(&format!("\nFASTA files downloaded successfully in {}\n", self.workdir.display()))?;

        let table = self.ask_table_path(console)?;
        let profiles = extract_profiles(
            &self.client,
            &self.config.registry.base_url,
            &table,
            &self.config.registry.identifier_prefix,
            &self.workdir,
        )
        .await?;
        console.say(&format!("\nHMM files downloaded successfully in {}\n", self.workdir.display()))?;

        Ok(Inputs {
            sequence_sets,
            profiles,
        })
    }

    pub fn ask_table_path<R: BufRead, W: Write>(&self, console: &mut Console<R, W>) -> PipelineResult<PathBuf> {
        let default = &self.config.registry.default_table;
        loop {
            let answer = console.ask(&format!(
                "If you have the file '{}' in {}, type 'y'. Otherwise, type 'change' to change the name of the TSV file:",
                default,
                self.workdir.display()
            ))?;
            match parse_table_choice(&answer) {
                Ok(TableChoice::Default) => return Ok(self.workdir.join(default)),
                Ok(TableChoice::Change) => {
                    let name = console.ask("Input tsv file name:")?;
                    let name = name.trim();
                    if name.is_empty() {
                        console.say(&format!("Invalid input: {}", InputError::EmptyFileName))?;
                        continue;
                    }
                    return Ok(self.workdir.join(name));
                }
                Err(e) => console.say(&format!("Invalid input: {}", e))?,
            }
        }
    }

    pub fn ask_contact<R: BufRead, W: Write>(&self, console: &mut Console<R, W>) -> PipelineResult<String> {
        loop {
            let answer = console.ask("To generate a SLURM submission script, please enter your email:")?;
            match validate_contact(&answer) {
                Ok(address) => return Ok(address),
                Err(e) => {
                    warn!("⚠️  {}", e);
                    console.say(&format!("Invalid input: {}", e))?;
                }
            }
        }
    }

    pub fn wait_for_outputs<R: BufRead, W: Write>(&self, console: &mut Console<R, W>) -> PipelineResult<()> {
        loop {
            console.say(&format!(
                "\nRun {} on the cluster to get the output files. The HMMer outputs must be in {}",
                self.config.slurm.script_name,
                self.workdir.display()
            ))?;
            let answer = console.ask("Please type 'y' once you have generated the HMMer outputs:")?;
            if answer.trim().eq_ignore_ascii_case("y") {
                return Ok(());
            }
        }
    }

    fn show(&self, path: &Path) {
        if self.display {
            display_image(path);
        }
    }
}

/// Collects every search output, prints and saves the hit table, then reshapes it.
/// The table is printed and written before the reshape so a collision still
/// leaves it on screen and on disk.
pub fn summarise<W: Write>(out: &mut W, dir: &Path, inputs: &Inputs, output: &OutputSettings) -> PipelineResult<Summary> {
    let table = collect_hits(dir, &inputs.profiles, &inputs.sequence_sets)?;
    print_table(out, &table)?;
    write_summary(&dir.join(&output.summary), &table)?;
    let matrix = ScoreMatrix::from_hits(&table)?;
    let top = top_hits(&table, output.top_n);
    Ok(Summary { table, matrix, top })
}

/// Draws the heatmap and the top-hits chart into `dir`. Returns the written
/// files; an empty hit table draws nothing.
pub fn render_charts(dir: &Path, output: &OutputSettings, summary: &Summary) -> PipelineResult<Vec<PathBuf>> {
    if summary.table.is_empty() {
        warn!("⚠️  No hits in any search output, skipping charts");
        return Ok(Vec::new());
    }

    let heatmap = dir.join(&output.heatmap);
    render_heatmap(&heatmap, &summary.matrix)?;

    let bar_chart = dir.join(&output.bar_chart);
    render_top_hits(&bar_chart, &summary.top)?;
    Ok(vec![heatmap, bar_chart])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::scripted;
    use crate::test_support::{gzip, serve};
    use std::fs;
    use tempfile::tempdir;

    fn pipeline(config: Config, dir: &Path) -> Pipeline {
        Pipeline::new(config, dir.to_path_buf(), Some(5), false)
    }

    #[test]
    fn table_choice_is_case_insensitive() {
        assert_eq!(parse_table_choice("Y"), Ok(TableChoice::Default));
        assert_eq!(parse_table_choice(" CHANGE "), Ok(TableChoice::Change));
        assert_eq!(parse_table_choice("n"), Err(InputError::UnknownChoice));
    }

    #[test]
    fn contact_needs_user_and_domain() {
        assert_eq!(validate_contact(" ab123@le.ac.uk \n"), Ok("ab123@le.ac.uk".to_string()));
        assert!(validate_contact("ab123").is_err());
        assert!(validate_contact("ab 123@le.ac.uk").is_err());
        assert!(validate_contact("@le.ac.uk").is_err());
        assert!(validate_contact("").is_err());
    }

    #[test]
    fn table_prompt_reasks_then_takes_new_name() {
        let td = tempdir().unwrap();
        let p = pipeline(Config::default(), td.path());
        let mut console = scripted("maybe\nchange\n\nchange\nsdh.tsv\n");
        let path = p.ask_table_path(&mut console).unwrap();
        assert_eq!(path, td.path().join("sdh.tsv"));

        let mut console = scripted("y\n");
        let path = p.ask_table_path(&mut console).unwrap();
        assert_eq!(path, td.path().join("SearchResults-succinatedehydrogenase.tsv"));
    }

    #[test]
    fn readiness_waits_for_y() {
        let td = tempdir().unwrap();
        let p = pipeline(Config::default(), td.path());
        let mut console = scripted("not yet\nn\nY\n");
        p.wait_for_outputs(&mut console).unwrap();
        let written = String::from_utf8(console.into_output()).unwrap();
        assert_eq!(written.matches("Please type 'y'").count(), 3);
    }

    #[tokio::test]
    async fn fetches_selected_proteomes_and_profiles() {
        let page = r#"<a href="/species/brugia_malayi/PRJNA10729/bm.protein.fa.gz">1</a>
<a href="/species/brugia_malayi/PRJNA10729/bm.genomic.fa.gz">skip</a>
<a href="/species/necator_americanus/PRJNA72135/na.protein.fa.gz">2</a>
<a href="/species/trichuris_muris/PRJEB126/tm.protein.fa.gz">3</a>"#;
        // Links in the page are relative; rewrite them once the port is known.
        let td = tempdir().unwrap();
        let base = serve(vec![
            ("/species/brugia_malayi/PRJNA10729/bm.protein.fa.gz", gzip(">bm1\nMK\n")),
            ("/species/necator_americanus/PRJNA72135/na.protein.fa.gz", gzip(">na1\nMV\n")),
            ("/species/trichuris_muris/PRJEB126/tm.protein.fa.gz", gzip(">tm1\nML\n")),
            ("/entry/pfam/PF00890?annotation=hmm", gzip("HMMER3/f\nNAME  FAD_binding_2\n//\n")),
        ])
        .await;
        let page = page.replace("href=\"/", &format!("href=\"{}/", base));
        let catalog_base = serve(vec![("/ftp.html", page.into_bytes())]).await;

        fs::write(
            td.path().join("SearchResults-succinatedehydrogenase.tsv"),
            "Accession\tName\nIPR003953\tFAD\nPF00890\tFAD_binding_2\n",
        )
        .unwrap();

        let mut config = Config::default();
        config.catalog.url = format!("{}/ftp.html", catalog_base);
        config.registry.base_url = base.clone();
        let p = pipeline(config, td.path());

        let mut console = scripted("0 1\n2 0 1\ny\n");
        let inputs = p.fetch_inputs(&mut console).await.unwrap();
        assert_eq!(inputs.sequence_sets, vec!["tm.protein.fa", "bm.protein.fa", "na.protein.fa"]);
        assert_eq!(inputs.profiles, vec!["PF00890"]);
        assert_eq!(fs::read_to_string(td.path().join("tm.protein.fa")).unwrap(), ">tm1\nML\n");
        assert!(td.path().join("PF00890.hmm").exists());
    }

    #[tokio::test]
    async fn short_catalog_is_refused() {
        let catalog_base = serve(vec![("/ftp.html", b"<a href=\"x/y/z/a.protein.fa.gz\">a</a>".to_vec())]).await;
        let td = tempdir().unwrap();
        let mut config = Config::default();
        config.catalog.url = format!("{}/ftp.html", catalog_base);
        let p = pipeline(config, td.path());
        let err = p.fetch_inputs(&mut scripted("")).await.unwrap_err();
        assert!(matches!(err, PipelineError::CatalogFetch { .. }));
    }

    fn tbl_row(target: &str, query: &str, score: &str) -> String {
        format!("{target} - {query} PF00890.27 1e-20 {score} 0.0 1e-20 {score} 0.0 1.0 1 0 0 1 1 1 1 -\n")
    }

    #[test]
    fn summarise_writes_table_and_ranks() {
        let td = tempdir().unwrap();
        let inputs = Inputs {
            sequence_sets: vec!["a.fa".into(), "b.fa".into()],
            profiles: vec!["PF00890".into()],
        };
        fs::write(
            td.path().join("PF00890_a.fa.out"),
            format!("{}{}", tbl_row("a1", "FAD_binding_2", "120.0"), tbl_row("a2", "FAD_binding_2", "30.5")),
        )
        .unwrap();
        fs::write(
            td.path().join("PF00890_b.fa.out"),
            format!("{}{}", tbl_row("b1", "FAD_binding_2", "99.0"), tbl_row("b2", "FAD_binding_2", "7.0")),
        )
        .unwrap();

        let mut output = OutputSettings::default();
        output.top_n = 3;
        let mut printed = Vec::new();
        let summary = summarise(&mut printed, td.path(), &inputs, &output).unwrap();
        assert_eq!(summary.table.len(), 4);
        assert_eq!(summary.matrix.targets, vec!["a1", "a2", "b1", "b2"]);
        let top: Vec<&str> = summary.top.iter().map(|h| h.target_name.as_str()).collect();
        assert_eq!(top, vec!["a1", "b1", "a2"]);

        let saved = fs::read_to_string(td.path().join("hmmer_output_summary.csv")).unwrap();
        assert_eq!(saved.lines().count(), 5);

        let charts = render_charts(td.path(), &output, &summary).unwrap();
        assert_eq!(charts, vec![td.path().join(&output.heatmap), td.path().join(&output.bar_chart)]);
        assert!(charts.iter().all(|c| fs::metadata(c).unwrap().len() > 0));
    }

    #[test]
    fn collision_keeps_saved_table() {
        let td = tempdir().unwrap();
        let inputs = Inputs {
            sequence_sets: vec!["a.fa".into(), "b.fa".into()],
            profiles: vec!["PF00890".into()],
        };
        fs::write(td.path().join("PF00890_a.fa.out"), tbl_row("same", "FAD_binding_2", "10.0")).unwrap();
        fs::write(td.path().join("PF00890_b.fa.out"), tbl_row("same", "FAD_binding_2", "11.0")).unwrap();

        let mut printed = Vec::new();
        let err = summarise(&mut printed, td.path(), &inputs, &OutputSettings::default()).unwrap_err();
        assert!(matches!(err, PipelineError::ReshapeCollision { .. }));
        assert!(td.path().join("hmmer_output_summary.csv").exists());

        let printed = String::from_utf8(printed).unwrap();
        assert_eq!(printed.matches("same").count(), 2, "{printed}");
    }

    #[test]
    fn empty_outputs_skip_charts() {
        let td = tempdir().unwrap();
        let inputs = Inputs {
            sequence_sets: vec!["a.fa".into()],
            profiles: vec!["PF00890".into()],
        };
        fs::write(td.path().join("PF00890_a.fa.out"), "# no hits
#
").unwrap();

        let output = OutputSettings::default();
        let summary = summarise(&mut Vec::<u8>::new(), td.path(), &inputs, &output).unwrap();
        assert!(summary.table.is_empty());
        assert!(td.path().join(&output.summary).exists());

        let charts = render_charts(td.path(), &output, &summary).unwrap();
        assert!(charts.is_empty());
        assert!(!td.path().join(&output.heatmap).exists());
        assert!(!td.path().join(&output.bar_chart).exists());
    }
}
