use std::{fs, path::PathBuf, process::exit};

use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, warn};

use sesamerge::{
    semistructured_merge_files,
    settings::{HandlerSettings, MergeSettings},
    textual::TextualMergeStrategy,
    three_way_textual_merge_files, MergeError, MergeResult,
};

/// Semistructured merge driver for Java source files.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct CliArgs {
    /// Verbosity
    #[clap(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Do a semistructured three-way merge
    Merge {
        /// The path to the file containing the base revision
        base: PathBuf,
        /// The path to the file containing the left revision
        left: PathBuf,
        /// The path to the file containing the right revision
        right: PathBuf,
        /// The path to the file to write the merge result to
        #[clap(short, long, conflicts_with = "git")]
        output: Option<PathBuf>,
        /// Behave as a git merge driver: overwrite the left revision
        #[clap(short, long)]
        git: bool,
        /// Length of conflict markers
        #[arg(short = 'l', long)]
        // the choice of 'l' is inherited from Git's merge driver interface
        conflict_marker_size: Option<usize>,
        /// Do not show the base revision in conflicts
        #[clap(long)]
        no_base: bool,
        /// Ignore whitespace differences when comparing revisions
        #[clap(long)]
        ignore_whitespace: bool,
        /// Textual merge strategy for leaf bodies
        #[clap(long, value_enum, default_value = "diff3")]
        strategy: StrategyArg,
        /// Disable the handler for ambiguous imports
        #[clap(long)]
        no_type_ambiguity: bool,
        /// Disable the handler for added elements referencing edited ones
        #[clap(long)]
        no_new_element_check: bool,
        /// Disable the renaming/deletion handler for methods and constructors
        #[clap(long)]
        no_renaming: bool,
        /// Disable the single initialization-block handler
        #[clap(long)]
        no_init_blocks: bool,
        /// Enable the multiple initialization-blocks handler
        /// (only runs while the single-block handler is disabled)
        #[clap(long)]
        init_blocks_multiple: bool,
        /// Disable the duplicated-declarations handler
        #[clap(long)]
        no_duplicated_declarations: bool,
        /// Name to use for the base revision in conflict markers
        #[clap(short = 's', long)]
        // the choice of 's' is inherited from Git's merge driver interface
        base_name: Option<String>,
        /// Name to use for the left revision in conflict markers
        #[clap(short = 'x', long)]
        // the choice of 'x' is inherited from Git's merge driver interface
        left_name: Option<String>,
        /// Name to use for the right revision in conflict markers
        #[clap(short = 'y', long)]
        // the choice of 'y' is inherited from Git's merge driver interface
        right_name: Option<String>,
    },
    /// Do a purely textual three-way merge
    Textual {
        /// The path to the file containing the base revision
        base: PathBuf,
        /// The path to the file containing the left revision
        left: PathBuf,
        /// The path to the file containing the right revision
        right: PathBuf,
        /// The path to the file to write the merge result to
        #[clap(short, long)]
        output: Option<PathBuf>,
        /// Length of conflict markers
        #[arg(short = 'l', long)]
        conflict_marker_size: Option<usize>,
        /// Do not show the base revision in conflicts
        #[clap(long)]
        no_base: bool,
        /// Ignore whitespace differences when comparing revisions
        #[clap(long)]
        ignore_whitespace: bool,
        /// Textual merge strategy
        #[clap(long, value_enum, default_value = "diff3")]
        strategy: StrategyArg,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
enum StrategyArg {
    #[default]
    Diff3,
    CsdiffDiff3,
}

impl From<StrategyArg> for TextualMergeStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Diff3 => Self::Diff3,
            StrategyArg::CsdiffDiff3 => Self::CsDiffAndDiff3,
        }
    }
}

fn main() {
    let args = CliArgs::parse();
    stderrlog::new()
        .verbosity(if args.verbose { 4 } else { 2 })
        .init()
        .expect("logging was already initialized");
    exit(real_main(args));
}

fn real_main(args: CliArgs) -> i32 {
    match args.command {
        CliCommand::Merge {
            base,
            left,
            right,
            output,
            git,
            conflict_marker_size,
            no_base,
            ignore_whitespace,
            strategy,
            no_type_ambiguity,
            no_new_element_check,
            no_renaming,
            no_init_blocks,
            init_blocks_multiple,
            no_duplicated_declarations,
            base_name,
            left_name,
            right_name,
        } => {
            let defaults = MergeSettings::default();
            let settings = MergeSettings {
                show_base: !no_base,
                ignore_whitespace,
                is_git: git,
                strategy: strategy.into(),
                conflict_marker_size: conflict_marker_size
                    .unwrap_or(defaults.conflict_marker_size),
                left_label: left_name.unwrap_or(defaults.left_label),
                base_label: base_name.unwrap_or(defaults.base_label),
                right_label: right_name.unwrap_or(defaults.right_label),
                handlers: HandlerSettings {
                    type_ambiguity: !no_type_ambiguity,
                    new_element_referencing_edited_one: !no_new_element_check,
                    method_and_constructor_renaming_and_deletion: !no_renaming,
                    initialization_blocks: !no_init_blocks,
                    initialization_blocks_multiple: init_blocks_multiple,
                    duplicated_declarations: !no_duplicated_declarations,
                },
            };
            let result = match semistructured_merge_files(&left, &base, &right, &settings) {
                Ok(result) => result,
                Err(err @ MergeError::Semistructured { .. }) => {
                    // the context is discarded and the whole file is merged
                    // textually instead
                    debug!("{err}");
                    warn!("falling back to a textual merge of the whole file");
                    match three_way_textual_merge_files(&left, &base, &right, &settings) {
                        Ok(result) => result,
                        Err(err) => return fail(&err),
                    }
                }
                Err(err) => return fail(&err),
            };
            let destination = if git { Some(left) } else { output };
            write_result(&result, destination)
        }
        CliCommand::Textual {
            base,
            left,
            right,
            output,
            conflict_marker_size,
            no_base,
            ignore_whitespace,
            strategy,
        } => {
            let defaults = MergeSettings::default();
            let settings = MergeSettings {
                show_base: !no_base,
                ignore_whitespace,
                strategy: strategy.into(),
                conflict_marker_size: conflict_marker_size
                    .unwrap_or(defaults.conflict_marker_size),
                ..defaults
            };
            match three_way_textual_merge_files(&left, &base, &right, &settings) {
                Ok(result) => write_result(&result, output),
                Err(err) => fail(&err),
            }
        }
    }
}

/// Writes the merge result and returns the exit code dictated by Git's
/// merge driver protocol: 0 for a clean merge, 1 when conflicts remain.
fn write_result(result: &MergeResult, output: Option<PathBuf>) -> i32 {
    match output {
        Some(path) => {
            if let Err(err) = fs::write(&path, &result.contents) {
                eprintln!("sesamerge: cannot write {}: {err}", path.display());
                return MERGE_DRIVER_FAILURE;
            }
        }
        None => print!("{}", result.contents),
    }
    match result.conflict_count {
        0 => 0,
        conflicts => {
            warn!("merge completed with {conflicts} remaining conflict(s)");
            1
        }
    }
}

/// Exit code above 128, as Git's merge driver protocol requires for hard
/// failures.
const MERGE_DRIVER_FAILURE: i32 = 129;

fn fail(err: &MergeError) -> i32 {
    eprintln!("sesamerge: {err}");
    MERGE_DRIVER_FAILURE
}
