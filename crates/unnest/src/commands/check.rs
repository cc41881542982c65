//! Check command - verifies the output contract of transformed modules

use anyhow::{anyhow, Result};
use clap::Args;
use std::path::PathBuf;
use unnest_diagnostics::Diagnostics;
use unnest_transform::check_module;

use crate::{ir_io, report, OutputFormat};

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// IR module (JSON) or directory of modules
    #[arg(default_value = ".")]
    pub input: PathBuf,
}

pub fn run(args: CheckArgs, format: OutputFormat, use_color: bool, verbose: u8) -> Result<()> {
    let files = ir_io::collect_ir_files(&args.input);

    if files.is_empty() {
        match format {
            OutputFormat::Text => println!("No IR modules found."),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "success": true,
                        "files": 0,
                        "errors": 0,
                        "warnings": 0,
                    })
                );
            }
        }
        return Ok(());
    }

    if let OutputFormat::Text = format {
        println!("Checking {} module(s)...", files.len());
    }

    let mut all_diagnostics = Diagnostics::new();
    let mut checked_files = 0;
    let mut functions = 0;

    for file in &files {
        let module = match ir_io::read_module(file) {
            Ok(module) => module,
            Err(diag) => {
                all_diagnostics.push(diag);
                continue;
            }
        };

        functions += module.defns.iter().filter(|d| d.as_function().is_some()).count();
        let violations = check_module(&module);
        if verbose > 0 {
            eprintln!("{}: {} violation(s)", file.display(), violations.len());
        }
        all_diagnostics.extend(violations.iter().map(|v| report::violation(v, file)));
        checked_files += 1;
    }

    report::emit(&all_diagnostics, format, use_color)?;

    let errors = all_diagnostics.error_count();
    let warnings = all_diagnostics.warning_count();
    match format {
        OutputFormat::Text => {
            println!();
            if errors > 0 {
                if use_color {
                    println!(
                        "{}: {} error(s), {} warning(s)",
                        console::style("Check failed").red().bold(),
                        errors,
                        warnings
                    );
                } else {
                    println!("Check failed: {} error(s), {} warning(s)", errors, warnings);
                }
            } else if use_color {
                println!(
                    "{} - {} module(s), {} function(s) checked",
                    console::style("All checks passed!").green().bold(),
                    checked_files,
                    functions
                );
            } else {
                println!(
                    "All checks passed! - {} module(s), {} function(s) checked",
                    checked_files, functions
                );
            }
        }
        OutputFormat::Json => {
            let summary = serde_json::json!({
                "type": "summary",
                "success": errors == 0,
                "files_checked": checked_files,
                "functions_checked": functions,
                "errors": errors,
                "warnings": warnings,
            });
            println!("{}", serde_json::to_string(&summary)?);
        }
    }

    if all_diagnostics.has_errors() {
        Err(anyhow!("Check failed with errors"))
    } else {
        Ok(())
    }
}
