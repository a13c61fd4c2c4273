use clap::Parser;
use std::path::PathBuf;

const RANGE_HELP: &str = "\
range examples:
  [1-5]     -> 1, 2, 3, 4, 5
  [1-5:1]   -> 1, 2, 3, 4, 5
  [1-5:+1]  -> 1, 2, 3, 4, 5
  [1-5:+2]  -> 1, 3, 5
  [5-1]     -> 5, 4, 3, 2, 1
  [5-1:-2]  -> 5, 3, 1
  [2-8:*2]  -> 2, 4, 8
  [8-2:/2]  -> 8, 4, 2
  [0.1-0.3] -> 0.1, 0.2, 0.3
  [foo,bar] -> foo, bar
  [id]      -> the array task id itself, adds no jobs

range groups:
  Range groups allow to use the same range in several places:
  [0=1-3] creates group 0 with values 1, 2, 3
  [0=]    references group 0 with values 1, 2, 3

range syntax:
  RANGE := '[' [ GROUP ] ID | NUMRANGE | LIST ']'
  GROUP := NAME '='
  ID := 'id'
  NUMRANGE := NUM '-' NUM [ ':' STEP ]
  STEP := [ ( '+' | '-' | '*' | '/' ) ] NUM
  LIST := LISTITEM [ ',' LIST ]

full examples:
  create sbatch file for 30 runs of ./app, with argument x = 1, ..., 10, y = 3, 4, 5 and z = 1,
  export OMP_NUM_THREADS=4 and run at max 4 jobs in parallel:
    slurm-gen -e OMP_NUM_THREADS=4 -l 4 -- ./app --x [1-10] -y [3-5] -z 1

  create sbatch file for 5 runs of ./app, with argument x = y = 1, 2, 4, 8, 16, z = linear index
    slurm-gen -- ./app --x [0=1-16:*2] --y [0=] -z [id]

  create sbatch file for 6 runs of ./app, with argument a = foo, bar, b = 2, 1, 0
    slurm-gen -- ./app -a [foo,bar] -b [2-0]";

/// Generates a slurm array job script for starting the given application with the given
/// arguments.
///
/// Arguments given in brackets are interpreted as ranges of values and lead to multiple
/// executions of the given application. The resulting sbatch file is printed to stdout
/// unless an output file is given.
#[derive(Parser, Debug)]
#[command(
    version,
    about,
    override_usage = "slurm-gen [OPTIONS] -- [application] [application arguments]",
    after_help = RANGE_HELP
)]
pub struct Args {
    /// slurm arguments that should be added, e.g. `-s time=02:00:00 -s constraint=GPU`
    #[arg(short = 's', long = "slurm", value_name = "ARGUMENT=VALUE")]
    pub slurm: Vec<String>,

    /// environment variables to define, e.g. `-e OMP_NUM_THREADS=16`
    #[arg(short = 'e', long, value_name = "VARIABLE=VALUE")]
    pub environment: Vec<String>,

    /// maximum number of array jobs to run in parallel
    #[arg(short = 'l', long, value_name = "N")]
    pub limit: Option<u32>,

    /// output sbatch file
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// basename for slurm output files, full name will be BASENAME_ID.out
    #[arg(short = 'u', long, value_name = "BASENAME")]
    pub slurm_output: Option<String>,

    /// print a summary of the generated jobs to stderr
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// application and application arguments, following `--`
    #[arg(last = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}
