use std::io::{self, Read};

use tessella::{Document, evaluate_to_string, render_template};

fn main() {
    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    match config {
        Config::Eval { expression } => {
            println!("{}", evaluate_to_string(&expression));
        }
        Config::Render { data, template } => {
            let data = match data {
                Some(path) => match std::fs::read_to_string(&path) {
                    Ok(json) => Document::from_json_with_comments(&json),
                    Err(err) => {
                        eprintln!("error: failed to read '{path}': {err}");
                        std::process::exit(2);
                    }
                },
                None => Document::new(),
            };

            let template = match template {
                Some(path) => match std::fs::read_to_string(&path) {
                    Ok(content) => content,
                    Err(err) => {
                        eprintln!("error: failed to read '{path}': {err}");
                        std::process::exit(2);
                    }
                },
                None => match read_stdin() {
                    Ok(content) => content,
                    Err(err) => {
                        eprintln!("{err}");
                        std::process::exit(2);
                    }
                },
            };

            print!("{}", render_template(&template, &data));
        }
    }
}

enum Config {
    Eval { expression: String },
    Render { data: Option<String>, template: Option<String> },
}

fn parse_args() -> Result<Config, String> {
    let mut args = std::env::args().skip(1);

    let command = loop {
        match args.next() {
            Some(arg) => match arg.as_str() {
                "-h" | "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "-V" | "--version" => {
                    println!("tessella {}", env!("CARGO_PKG_VERSION"));
                    std::process::exit(0);
                }
                _ => break arg,
            },
            None => return Err(format!("error: no command given\n\n{}", help_text())),
        }
    };

    match command.as_str() {
        "eval" => {
            let expression = args.collect::<Vec<_>>().join(" ");
            if expression.trim().is_empty() {
                return Err("error: eval expects an expression".to_string());
            }
            Ok(Config::Eval { expression })
        }
        "render" => {
            let mut data: Option<String> = None;
            let mut template: Option<String> = None;

            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "--data" | "-d" => {
                        let value = args.next().ok_or_else(|| "error: --data expects a path".to_string())?;
                        data = Some(value);
                    }
                    "--template" | "-t" => {
                        let value = args.next().ok_or_else(|| "error: --template expects a path".to_string())?;
                        template = Some(value);
                    }
                    _ if arg.starts_with("--data=") => {
                        data = Some(arg.trim_start_matches("--data=").to_string());
                    }
                    _ if arg.starts_with("--template=") => {
                        template = Some(arg.trim_start_matches("--template=").to_string());
                    }
                    _ => return Err(format!("error: unknown option '{arg}'")),
                }
            }

            Ok(Config::Render { data, template })
        }
        _ => Err(format!("error: unknown command '{command}'\n\n{}", help_text())),
    }
}

fn read_stdin() -> Result<String, String> {
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer).map_err(|err| format!("error: failed to read stdin: {err}"))?;
    Ok(buffer)
}

fn print_help() {
    println!("{}", help_text());
}

fn help_text() -> String {
    format!(
        "tessella {version}

Rule-driven text transformation CLI.

Usage:
  tessella eval <expression...>
  tessella render [--data <file.json>] [--template <file>]

Commands:
  eval                       Evaluate an arithmetic/logic expression and
                             print the result.
  render                     Render a template against a JSON document.
                             The template comes from --template or stdin.

Options:
  -d, --data <file.json>     JSON data for the template (comments allowed).
  -t, --template <file>      Template file. Stdin is used when omitted.
  -h, --help                 Show this help message.
  -V, --version              Print version information.

Exit codes:
  0  Success.
  2  Invalid arguments or unreadable input.
",
        version = env!("CARGO_PKG_VERSION")
    )
}
