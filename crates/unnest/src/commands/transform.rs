//! Transform command - runs the pass over one IR module

use anyhow::{anyhow, Context as _, Result};
use clap::{Args, ValueEnum};
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::path::PathBuf;
use unnest_diagnostics::Diagnostics;
use unnest_ir::Module;
use unnest_transform::{transform, Action, ConfigOverrides, Target, TargetConfig};

use crate::{ir_io, report, OutputFormat};

#[derive(Args, Debug)]
pub struct TransformArgs {
    /// Input IR module (JSON)
    pub input: PathBuf,

    /// Which transformation to run
    #[arg(long, value_enum, default_value = "hoist")]
    pub action: ActionArg,

    /// Target language family (c, java, csharp); defaults to the config file's, then c
    #[arg(long)]
    pub target: Option<Target>,

    /// TOML file overriding target settings
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// How to write the transformed module
    #[arg(long, value_enum, default_value = "json")]
    pub emit: EmitFormat,

    /// Print a diff of the pretty-printed module instead of writing it to stdout
    #[arg(long)]
    pub diff: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ActionArg {
    /// Move nested functions to module scope
    Hoist,
    /// Chain GC stack frames
    Chain,
    /// Hoist, then chain
    Both,
}

impl ActionArg {
    fn actions(self) -> &'static [Action] {
        match self {
            ActionArg::Hoist => &[Action::HoistNestedFuncs],
            ActionArg::Chain => &[Action::ChainGcStackFrames],
            ActionArg::Both => &[Action::HoistNestedFuncs, Action::ChainGcStackFrames],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum EmitFormat {
    /// JSON, loadable by later passes
    Json,
    /// Pretty-printed C-like text
    Text,
}

/// Resolve the target configuration from the command line and config file
fn target_config(target: Option<Target>, config: Option<&PathBuf>) -> Result<TargetConfig> {
    let overrides = match config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            toml::from_str::<ConfigOverrides>(&text)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => ConfigOverrides::default(),
    };
    let target = target.or(overrides.target).unwrap_or(Target::C);
    Ok(TargetConfig::for_target(target).with_overrides(&overrides))
}

fn render(module: &Module, emit: EmitFormat) -> Result<String> {
    match emit {
        EmitFormat::Json => Ok(ir_io::module_to_json(module)?),
        EmitFormat::Text => Ok(module.to_string()),
    }
}

fn print_diff(before: &str, after: &str, use_color: bool) {
    let diff = TextDiff::from_lines(before, after);
    let mut unified = diff.unified_diff();
    unified.context_radius(3).header("before", "after");
    if !use_color {
        print!("{}", unified);
        return;
    }
    for hunk in unified.iter_hunks() {
        println!("{}", console::style(hunk.header()).cyan());
        for change in hunk.iter_changes() {
            let line = match change.tag() {
                ChangeTag::Delete => console::style(format!("-{}", change)).red(),
                ChangeTag::Insert => console::style(format!("+{}", change)).green(),
                ChangeTag::Equal => console::style(format!(" {}", change)),
            };
            print!("{}", line);
            if change.missing_newline() {
                println!();
            }
        }
    }
}

pub fn run(args: TransformArgs, format: OutputFormat, use_color: bool, verbose: u8) -> Result<()> {
    let config = target_config(args.target, args.config.as_ref())?;
    log::debug!("target config: {:?}", config);

    let module = match ir_io::read_module(&args.input) {
        Ok(module) => module,
        Err(diag) => {
            let mut diagnostics = Diagnostics::new();
            diagnostics.push(diag);
            report::emit(&diagnostics, format, use_color)?;
            return Err(anyhow!("Failed to load {}", args.input.display()));
        }
    };
    let before = module.to_string();
    let defns_in = module.defns.len();

    let mut module = module;
    for &action in args.action.actions() {
        module = match transform(action, &config, module) {
            Ok(module) => module,
            Err(err) => {
                let mut diagnostics = Diagnostics::new();
                diagnostics.push(report::elim_error(&err, &args.input));
                report::emit(&diagnostics, format, use_color)?;
                return Err(anyhow!("{} failed on {}", action, args.input.display()));
            }
        };
    }

    if verbose > 0 {
        eprintln!(
            "{}: {} -> {} definitions",
            args.input.display(),
            defns_in,
            module.defns.len()
        );
    }

    let rendered = render(&module, args.emit)?;
    match &args.output {
        Some(path) => {
            fs::write(path, &rendered).with_context(|| format!("Failed to write {}", path.display()))?;
            if let OutputFormat::Json = format {
                let summary = serde_json::json!({
                    "type": "summary",
                    "success": true,
                    "input": args.input.display().to_string(),
                    "output": path.display().to_string(),
                    "definitions": module.defns.len(),
                });
                if !args.diff {
                    println!("{}", serde_json::to_string(&summary)?);
                }
            }
        }
        None if !args.diff => print!("{}", rendered),
        None => {}
    }

    if args.diff {
        print_diff(&before, &module.to_string(), use_color);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_runs_hoist_first() {
        assert_eq!(
            ActionArg::Both.actions(),
            &[Action::HoistNestedFuncs, Action::ChainGcStackFrames]
        );
    }

    #[test]
    fn test_target_config_precedence() {
        let path = std::env::temp_dir().join(format!("unnest-config-{}.toml", std::process::id()));
        fs::write(&path, "target = \"java\"\nimplicit_zero_init = false\n").unwrap();

        let from_file = target_config(None, Some(&path)).unwrap();
        assert!(from_file.on_heap);
        assert!(!from_file.implicit_zero_init);

        let from_flag = target_config(Some(Target::C), Some(&path)).unwrap();
        assert!(!from_flag.on_heap);
        assert!(!from_flag.implicit_zero_init);

        let _ = fs::remove_file(&path);
        assert_eq!(target_config(None, None).unwrap(), TargetConfig::default());
    }
}
