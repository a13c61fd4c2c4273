use crate::cli::Args;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigErrors {
    #[error("No application given, expected `-- [application] [application arguments]`")]
    MissingCommand,
    #[error("Slurm argument `{0}` must look like ARGUMENT=VALUE")]
    InvalidDirective(String),
    #[error("Environment variable `{0}` must look like VARIABLE=VALUE")]
    InvalidEnvironment(String),
    #[error("Parallel job limit must be positive")]
    InvalidLimit,
    #[error("Slurm output basename `{0}` must be non-empty and contain no whitespace")]
    InvalidBasename(String),
    #[error("Range {dimension} does not contain any values")]
    ZeroCardinality { dimension: usize },
    #[error("Total number of jobs does not fit into 64 bits")]
    TooManyCombinations,
}

/// Everything the generator needs, assembled once from the command line
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GeneratorConfig {
    // slurm options in the form ARGUMENT=VALUE, emitted as `#SBATCH --ARGUMENT=VALUE`
    #[serde(default)]
    pub directives: Vec<String>,
    // VARIABLE=VALUE pairs prefixed onto the srun invocation
    #[serde(default)]
    pub environment: Vec<String>,
    // maximum number of array jobs running at the same time
    pub limit: Option<u32>,
    // target file for the sbatch script, stdout if missing
    pub output: Option<PathBuf>,
    // basename for the slurm output files, derived from the command if missing
    pub slurm_output: Option<String>,
    #[serde(default)]
    pub verbose: bool,
    // application and its arguments, including ranges
    pub command: Vec<String>,
}

impl From<Args> for GeneratorConfig {
    fn from(args: Args) -> Self {
        Self {
            directives: args.slurm,
            environment: args.environment,
            limit: args.limit,
            output: args.output,
            slurm_output: args.slurm_output,
            verbose: args.verbose,
            command: args.command,
        }
    }
}

fn is_variable_name(name: &str) -> bool {
    let mut chars = name.chars();

    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl GeneratorConfig {
    /// Validate the configuration. The first problem found is returned, any further ones are
    /// logged.
    pub fn preflight_checks(&self) -> Result<(), ConfigErrors> {
        // attempt to catch all errors instead of piece-by-piece to make debugging easier for users
        let mut errors = Vec::new();

        if self.command.iter().all(|arg| arg.trim().is_empty()) {
            errors.push(ConfigErrors::MissingCommand);
        }

        for directive in self.directives.iter() {
            let key = directive.split_once('=').map_or(directive.as_str(), |(key, _)| key);
            if key.trim().is_empty() {
                errors.push(ConfigErrors::InvalidDirective(directive.clone()));
            }
        }

        for variable in self.environment.iter() {
            match variable.split_once('=') {
                Some((name, _)) if is_variable_name(name) => {}
                _ => errors.push(ConfigErrors::InvalidEnvironment(variable.clone())),
            }
        }

        if self.limit == Some(0) {
            errors.push(ConfigErrors::InvalidLimit);
        }

        if let Some(ref basename) = self.slurm_output {
            if basename.is_empty() || basename.contains(char::is_whitespace) {
                errors.push(ConfigErrors::InvalidBasename(basename.clone()));
            }
        }

        let mut errors = errors.into_iter();
        match errors.next() {
            Some(first) => {
                for error in errors {
                    error!("{error}");
                }

                Err(first)
            }
            None => Ok(()),
        }
    }
}
