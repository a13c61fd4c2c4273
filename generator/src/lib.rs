//! Generation of slurm array job scripts running an application over the Cartesian product
//! of its argument ranges.

pub mod cli;
pub mod config;
pub mod encoder;
pub mod range;
pub mod script;
pub mod summary;
pub mod template;


use crate::{
    config::{ConfigErrors, GeneratorConfig},
    encoder::MixedRadix,
    script::ScriptWriter,
    summary::Summary,
    template::{Template, TemplateError},
};
use std::io::Write;
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("Failed to parse application arguments: {0}")]
    Parse(#[from] TemplateError),
    #[error("Invalid configuration: {0}")]
    Validation(#[from] ConfigErrors),
    #[error("Failed to write sbatch script: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to move sbatch script into place: {0}")]
    Persist(#[from] tempfile::PersistError),
    #[error("Failed to serialize summary: {0}")]
    Summary(#[from] serde_yaml::Error),
}

/// Generate the sbatch script described by `config` and return the number of array jobs.
///
/// Nothing is written unless the whole configuration and template are valid.
#[instrument(skip(config), level = "debug")]
pub fn generate(config: &GeneratorConfig) -> Result<u64, GeneratorError> {
    config.preflight_checks()?;

    let template = Template::parse(&config.command)?;
    let encoder = MixedRadix::from_template(&template)?;
    info!("Total number of jobs to run: {}", encoder.total());

    if config.verbose {
        let summary = Summary::new(config, &template, &encoder).to_yaml()?;
        std::io::stderr().lock().write_all(summary.as_bytes())?;
    }

    let writer = ScriptWriter::new(config, &template, &encoder);
    info!("Slurm output files: {}_<id>.out", writer.basename());
    writer.write_to(config.output.as_deref())?;

    Ok(encoder.total())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(command: &[&str], output: &std::path::Path) -> GeneratorConfig {
        GeneratorConfig {
            command: command.iter().map(|arg| arg.to_string()).collect(),
            output: Some(output.to_path_buf()),
            slurm_output: Some("run".into()),
            ..Default::default()
        }
    }

    #[test]
    fn generates_script_file() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("job.sbatch");

        let total = generate(&config(&["./app", "-a", "[foo,bar]", "-b", "[2-0]"], &path)).unwrap();

        assert_eq!(total, 6);
        let script = std::fs::read_to_string(&path).unwrap();
        assert!(script.starts_with("#!/bin/bash -l\n"));
        assert!(script.contains("#SBATCH --array=0-5\n"));
        assert!(script.contains("varray0=(foo bar)\nvarray1=(2 1 0)\n"));
        assert!(script.contains("    srun ./app -a ${v0} -b ${v1}\n"));
    }

    #[test]
    fn parse_errors_write_nothing() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("job.sbatch");

        for command in [&["./app", "[]"][..], &["./app", "[1-3"], &["./app", "x]"], &["a", "[[1]]"]] {
            let result = generate(&config(command, &path));

            assert!(matches!(result, Err(GeneratorError::Parse(_))), "{command:?}: {result:?}");
            assert!(!path.exists());
        }
        assert_eq!(std::fs::read_dir(directory.path()).unwrap().count(), 0);
    }

    #[test]
    fn validation_errors_write_nothing() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("job.sbatch");
        let mut config = config(&["./app", "[1-3]"], &path);
        config.limit = Some(0);

        assert!(matches!(
            generate(&config),
            Err(GeneratorError::Validation(ConfigErrors::InvalidLimit))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn existing_output_is_replaced() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("job.sbatch");
        std::fs::write(&path, "old").unwrap();

        generate(&config(&["./app", "[1-2]"], &path)).unwrap();

        assert!(std::fs::read_to_string(&path).unwrap().contains("varray0=(1 2)"));
    }
}
