use anyhow::{Context, Result};
use calltrace::{
    cli::{Cli, Commands, OutputFormat},
    codec::Parser as TraceParser,
    config::{ColorMode, ToolConfig},
    diff_state,
    filter::CallFilter,
    fingerprint::Fingerprinter,
    json_output::{JsonCall, JsonOutput},
};
use clap::Parser;
use std::fs::File;
use std::io::{BufReader, IsTerminal, Write};
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

struct DumpOptions<'a> {
    color: ColorMode,
    format: OutputFormat,
    filter: Option<&'a str>,
    fingerprint: bool,
    ignore_pointers: bool,
}

/// Decode a trace file and print its calls
fn run_dump(path: &Path, options: DumpOptions<'_>) -> Result<()> {
    let filter = match options.filter {
        Some(expr) => CallFilter::from_expr(expr)?,
        None => CallFilter::all(),
    };
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let parser = TraceParser::new(BufReader::new(file))
        .with_context(|| format!("failed to read trace header of {}", path.display()))?;
    let version = parser.version();
    let fingerprinter = Fingerprinter::new().ignore_pointers(options.ignore_pointers);

    let stdout = std::io::stdout();
    let color = options.color.enabled(stdout.is_terminal());
    let mut out = stdout.lock();
    let mut json = JsonOutput::new(version);

    for call in parser {
        let call = call.with_context(|| format!("failed to decode {}", path.display()))?;
        json.summary.total_calls += 1;
        if !filter.should_show(call.name()) {
            continue;
        }

        match options.format {
            OutputFormat::Text => {
                if options.fingerprint {
                    writeln!(
                        out,
                        "{} {} [{}]",
                        call.no,
                        call.dump(color),
                        fingerprinter.call_hex(&call)
                    )?;
                } else {
                    writeln!(out, "{} {}", call.no, call.dump(color))?;
                }
            }
            OutputFormat::Json => {
                let mut entry = JsonCall::from_call(&call);
                if options.fingerprint {
                    entry.fingerprint = Some(fingerprinter.call_hex(&call));
                }
                json.add_call(entry);
            }
        }
    }

    if options.format == OutputFormat::Json {
        writeln!(out, "{}", json.to_json()?)?;
    }
    out.flush()?;
    Ok(())
}

fn run(args: Cli) -> Result<i32> {
    let config = ToolConfig::load(args.config.as_deref())?;

    match args.command {
        Commands::Dump {
            trace,
            color,
            format,
            filter,
            fingerprint,
            ignore_pointers,
        } => {
            run_dump(
                &trace,
                DumpOptions {
                    color: color.unwrap_or(config.color),
                    format,
                    filter: filter.as_deref(),
                    fingerprint,
                    ignore_pointers,
                },
            )?;
            Ok(0)
        }
        Commands::DiffState {
            state1,
            state2,
            script,
        } => diff_state::diff_state(&state1, &state2, script.as_deref(), &config),
    }
}

fn main() {
    let args = Cli::parse();

    // Initialize tracing if --debug flag is set
    init_tracing(args.debug);

    let code = match run(args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            1
        }
    };
    std::process::exit(code);
}
