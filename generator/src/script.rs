//! Rendering of the final sbatch script.

use crate::{
    config::GeneratorConfig,
    encoder::MixedRadix,
    template::{Template, TASK_ID_VARIABLE},
    GeneratorError,
};
use itertools::Itertools;
use sha2::{Digest, Sha256};
use std::{
    borrow::Cow,
    fmt::{self, Display, Formatter},
    fs::Permissions,
    io::{self, Write},
    os::unix::fs::PermissionsExt,
    path::Path,
};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// srun prints this into the job output when a step fails, such jobs are run again
pub const ERROR_MARKER: &str = "srun: error";

/// number of digest bytes used for derived output basenames
const BASENAME_DIGEST_BYTES: usize = 16;

/// Output basename derived from the rendered command, stable across invocations
pub fn derived_basename(command: &str) -> String {
    Sha256::digest(command.as_bytes())
        .iter()
        .take(BASENAME_DIGEST_BYTES)
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// Quote `value` for use as a single word in bash unless it is obviously safe
fn shell_word(value: &str) -> Cow<'_, str> {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-.,:/+=@%^".contains(c));

    if safe {
        Cow::Borrowed(value)
    } else {
        Cow::Owned(format!("'{}'", value.replace('\'', r"'\''")))
    }
}

pub struct ScriptWriter<'a> {
    config: &'a GeneratorConfig,
    template: &'a Template,
    encoder: &'a MixedRadix,
    command: String,
    basename: String,
}

impl<'a> ScriptWriter<'a> {
    pub fn new(config: &'a GeneratorConfig, template: &'a Template, encoder: &'a MixedRadix) -> Self {
        let command = template.render();
        let basename = match config.slurm_output {
            Some(ref basename) => basename.clone(),
            None => derived_basename(&command),
        };

        Self {
            config,
            template,
            encoder,
            command,
            basename,
        }
    }

    /// basename of the slurm output files, `<basename>_<id>.out`
    pub fn basename(&self) -> &str {
        &self.basename
    }

    /// Write the script to `output`, or stdout if there is none.
    ///
    /// Files are written to a temporary file next to the target first and renamed into
    /// place afterwards, a failure never leaves a partial script behind.
    pub fn write_to(&self, output: Option<&Path>) -> Result<(), GeneratorError> {
        match output {
            Some(path) => {
                let directory = path
                    .parent()
                    .filter(|parent| !parent.as_os_str().is_empty())
                    .unwrap_or(Path::new("."));
                let mut file = NamedTempFile::new_in(directory)?;
                debug!(temporary = ?file.path(), "Writing sbatch script");

                write!(file, "{self}")?;
                file.flush()?;
                file.as_file().set_permissions(Permissions::from_mode(0o644))?;
                file.persist(path)?;

                info!(path = ?path, "Wrote sbatch script");
            }
            None => {
                let mut stdout = io::stdout().lock();
                write!(stdout, "{self}")?;
                stdout.flush()?;
            }
        }

        Ok(())
    }

    fn write_header(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "#!/bin/bash -l")?;
        for directive in self.config.directives.iter() {
            writeln!(f, "#SBATCH --{directive}")?;
        }

        let last = self.encoder.total() - 1;
        match self.config.limit {
            Some(limit) => writeln!(f, "#SBATCH --array=0-{last}%{limit}")?,
            None => writeln!(f, "#SBATCH --array=0-{last}")?,
        }
        writeln!(f, "#SBATCH --output={}_%a.out", self.basename)?;
        writeln!(f)?;

        writeln!(f, "# sbatch script generated by slurm-gen using arguments:")?;
        // a newline inside an argument would end the comment
        writeln!(f, "# {}", self.template.source.replace('\n', " "))?;
        writeln!(f)
    }

    fn write_ranges(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (k, dimension) in self.template.dimensions.iter().enumerate() {
            writeln!(
                f,
                "varray{k}=({})",
                dimension.values.iter().map(|value| shell_word(value)).join(" ")
            )?;
        }
        if !self.template.dimensions.is_empty() {
            writeln!(f)?;
        }

        for line in self.encoder.shell_lines() {
            writeln!(f, "{line}")?;
        }

        Ok(())
    }

    fn write_invocation(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let output_file = format!("{}_{TASK_ID_VARIABLE}.out", self.basename);

        // only run if there is no output yet or the previous run failed
        writeln!(
            f,
            "if [ ! -s \"{output_file}\" ] || [ -n \"$(grep -l '{ERROR_MARKER}' \"{output_file}\")\" ]"
        )?;
        writeln!(f, "then")?;
        write!(f, "    ")?;
        for variable in self.config.environment.iter() {
            match variable.split_once('=') {
                Some((name, value)) => write!(f, "{name}={} ", shell_word(value))?,
                None => write!(f, "{variable} ")?,
            }
        }
        writeln!(f, "srun {}", self.command)?;
        writeln!(f, "fi")
    }
}

impl Display for ScriptWriter<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.write_header(f)?;
        self.write_ranges(f)?;
        self.write_invocation(f)
    }
}
