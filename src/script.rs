use crate::config::SlurmSettings;
use crate::error::PipelineResult;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tracing::info;

/// Name of the `--tblout` file for one (profile, sequence set) pair.
/// The aggregator looks the results up by this exact name.
pub fn output_file_name(profile: &str, sequence_set: &str) -> String {
    format!("{}_{}.out", profile, sequence_set)
}

pub fn render_job_script(
    settings: &SlurmSettings,
    contact: &str,
    profiles: &[String],
    sequence_sets: &[String],
) -> String {
    let mut s = String::new();

    // SLURM directives
    s.push_str("#!/bin/bash\n");
    let _ = writeln!(s, "#SBATCH --job-name={}", settings.job_name);
    let _ = writeln!(s, "#SBATCH --nodes={}", settings.nodes);
    let _ = writeln!(s, "#SBATCH --tasks-per-node={}", settings.tasks_per_node);
    let _ = writeln!(s, "#SBATCH --mem={}", settings.memory);
    let _ = writeln!(s, "#SBATCH --time={}", settings.time_limit);
    let _ = writeln!(s, "#SBATCH --mail-type={}", settings.mail_type);
    let _ = writeln!(s, "#SBATCH --mail-user={}\n", contact);

    s.push_str("# executable from ALICE\n");
    let _ = writeln!(s, "hmmsearch={}\n", settings.hmmsearch);

    s.push_str("# Module needed for using HPC installed software\n");
    for module in &settings.modules {
        let _ = writeln!(s, "module load {}", module);
    }
    s.push('\n');

    s.push_str("# HMM and FASTA files (assumed to be the current directory)\n");
    s.push_str("hmm_dir=$(pwd)\n");
    s.push_str("fasta_dir=$(pwd)\n");
    s.push_str("output_dir=$(pwd)\n\n");

    for profile in profiles {
        for sequence_set in sequence_sets {
            let _ = writeln!(
                s,
                "hmmsearch --tblout ${{output_dir}}/{} -E {} --noali ${{hmm_dir}}/{}.hmm ${{fasta_dir}}/{}",
                output_file_name(profile, sequence_set),
                settings.e_value,
                profile,
                sequence_set
            );
        }
    }
    s
}

pub fn write_job_script(
    path: &Path,
    settings: &SlurmSettings,
    contact: &str,
    profiles: &[String],
    sequence_sets: &[String],
) -> PipelineResult<()> {
    fs::write(path, render_job_script(settings, contact, profiles, sequence_sets))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms)?;
    }

    info!(
        "📝 Job script {} created with {} hmmsearch runs",
        path.display(),
        profiles.len() * sequence_sets.len()
    );
    Ok(())
}
