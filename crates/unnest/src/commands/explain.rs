//! Explain command - explain diagnostic codes

use anyhow::{anyhow, Result};
use clap::Args;
use unnest_diagnostics::DiagnosticCode;

use crate::OutputFormat;

#[derive(Args, Debug)]
pub struct ExplainArgs {
    /// Diagnostic code to explain (e.g., I003, V002)
    pub code: String,
}

struct ErrorExplanation {
    code: DiagnosticCode,
    title: &'static str,
    description: &'static str,
    example: Option<&'static str>,
    suggestion: Option<&'static str>,
    related: &'static [&'static str],
}

const ERROR_EXPLANATIONS: &[ErrorExplanation] = &[
    ErrorExplanation {
        code: DiagnosticCode::InvalidIr,
        title: "Invalid IR Module",
        description: "The input file could not be read, or is not a JSON document describing an IR module.",
        example: Some(r#"{ "name": "m", "defns": [ 1 ] }   // a definition must be an object"#),
        suggestion: Some("Regenerate the module with the front end, or fix the reported line."),
        related: &[],
    },
    ErrorExplanation {
        code: DiagnosticCode::NestedClass,
        title: "Class Defined Inside a Function",
        description: "Only functions, variables and static constants may be defined inside a function body. A class or struct definition there means an earlier pass produced malformed IR.",
        example: None,
        suggestion: Some("Define the class at module scope."),
        related: &["I006"],
    },
    ErrorExplanation {
        code: DiagnosticCode::NestedFunctionWithoutBody,
        title: "Nested Function Without a Body",
        description: "A function nested in another function is always defined by the enclosing code, so it must have a body. External functions can only be declared at module scope.",
        example: None,
        suggestion: None,
        related: &["I001"],
    },
    ErrorExplanation {
        code: DiagnosticCode::DuplicateCapture,
        title: "Variable Captured Twice",
        description: r#"Every variable moved into an environment or frame record becomes a field named after it.
Two variables with the same name in one top-level function (including all of
its nested functions) would need the same field."#,
        example: Some(r#"f() {
    { int x; g() { return x; } }
    { int x; h() { return x; } }   // second `x`
}"#),
        suggestion: Some("Give variables unique names within each top-level function, e.g. by numbering them."),
        related: &[],
    },
    ErrorExplanation {
        code: DiagnosticCode::MissingEnvPtrArg,
        title: "Missing Environment Parameter",
        description: r#"A nested function reads variables of its enclosing function, so after hoisting it
reaches them through the environment record. The record pointer is passed in the
`env_ptr_arg` parameter, which the front end must declare."#,
        example: Some("g() { return x; }   // x lives in the enclosing function"),
        suggestion: Some("Declare `void *env_ptr_arg` on every nested function and pass `env_ptr` at each call."),
        related: &[],
    },
    ErrorExplanation {
        code: DiagnosticCode::UnsupportedCapturedInitializer,
        title: "Compound Initializer on a Captured Variable",
        description: "A captured variable's initializer becomes an assignment to its record field. Struct and array initializers have no assignment form.",
        example: Some("struct pair p = { 1, 2 };   // p used by a nested function"),
        suggestion: Some("Initialize the variable field by field with assignments."),
        related: &["I007"],
    },
    ErrorExplanation {
        code: DiagnosticCode::MalformedDefinition,
        title: "Malformed Definition",
        description: "A definition's name does not fit its body, such as a variable definition carrying a function name.",
        example: None,
        suggestion: None,
        related: &["I001"],
    },
    ErrorExplanation {
        code: DiagnosticCode::CompoundInitializerReadsCaptured,
        title: "Compound Initializer Reads a Captured Variable",
        description: r#"A captured variable's initializer runs as an assignment after the block's
declarations. A later struct or array initializer in the same block that reads
it would see the field before that assignment, and has no assignment form to
move after it."#,
        example: Some(r#"int x = 1;            // x used by a nested function
int a[] = { x };      // reads x before `env_ptr->x = 1` runs"#),
        suggestion: Some("Initialize the later variable element by element with assignments."),
        related: &["I005"],
    },
    ErrorExplanation {
        code: DiagnosticCode::RemainingNestedFunction,
        title: "Nested Function Remains",
        description: "After hoisting, every function must be defined at module scope. A function body that still contains function definitions was not transformed.",
        example: None,
        suggestion: Some("Run `unnest transform --action hoist` on the module."),
        related: &["V002"],
    },
    ErrorExplanation {
        code: DiagnosticCode::UnbalancedStackChain,
        title: "Unbalanced Stack Chain",
        description: r#"A function that links its frame onto the stack chain must link it exactly once,
restore the previous frame before every return, tail call and call that never
returns, and at its end if it returns nothing. Otherwise the collector walks a
frame that no longer exists."#,
        example: Some(r#"stack_chain = (void *) frame_ptr;
...
return r;            // missing: stack_chain = frame_ptr->prev;"#),
        suggestion: Some("Run `unnest transform --action chain` on the untransformed module instead of editing chained code."),
        related: &["V001"],
    },
];

pub fn run(args: ExplainArgs, format: OutputFormat, use_color: bool) -> Result<()> {
    let code = DiagnosticCode::parse(&args.code)
        .ok_or_else(|| anyhow!("Unknown diagnostic code: {}", args.code.to_uppercase()))?;

    let explanation = ERROR_EXPLANATIONS
        .iter()
        .find(|e| e.code == code)
        .ok_or_else(|| anyhow!("No explanation for {}", code))?;
    let code = code.as_str();

    match format {
        OutputFormat::Text => {
            if use_color {
                println!(
                    "\n{}: {}\n{}",
                    console::style(code).bold().cyan(),
                    console::style(explanation.title).bold(),
                    "=".repeat(code.len() + explanation.title.len() + 2)
                );
            } else {
                println!(
                    "\n{}: {}\n{}",
                    code,
                    explanation.title,
                    "=".repeat(code.len() + explanation.title.len() + 2)
                );
            }

            println!("\n{}\n", explanation.description);

            if let Some(example) = explanation.example {
                if use_color {
                    println!("{}:", console::style("Example").bold());
                } else {
                    println!("Example:");
                }
                for line in example.lines() {
                    println!("  {}", line);
                }
                println!();
            }

            if let Some(suggestion) = explanation.suggestion {
                if use_color {
                    println!("{}:", console::style("Suggestion").bold().green());
                } else {
                    println!("Suggestion:");
                }
                for line in suggestion.lines() {
                    println!("  {}", line);
                }
                println!();
            }

            if !explanation.related.is_empty() {
                if use_color {
                    println!(
                        "{}: {}",
                        console::style("Related").dim(),
                        explanation.related.join(", ")
                    );
                } else {
                    println!("Related: {}", explanation.related.join(", "));
                }
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "code": code,
                "title": explanation.title,
                "description": explanation.description,
                "example": explanation.example,
                "suggestion": explanation.suggestion,
                "related": explanation.related,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_code_explained() {
        for code in DiagnosticCode::ALL {
            assert!(
                ERROR_EXPLANATIONS.iter().any(|e| e.code == *code),
                "{} has no explanation",
                code
            );
        }
    }

    #[test]
    fn test_related_codes_exist() {
        for explanation in ERROR_EXPLANATIONS {
            for related in explanation.related {
                assert!(DiagnosticCode::parse(related).is_some(), "{}", related);
            }
        }
    }
}
