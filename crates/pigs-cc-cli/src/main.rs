use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use pigs_cc::CompileOptions;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "pcc")]
#[command(about = "pcc - PIGS C compiler", disable_version_flag = true)]
struct Cli {
    #[arg(value_name = "C_FILE", required_unless_present = "version")]
    filenames: Vec<PathBuf>,

    #[arg(short, value_name = "FILE", help = "Place the output into FILE (\"-\" for stdout)")]
    o: Option<String>,

    #[arg(short, help = "Add source comments to the assembly output")]
    comments: bool,

    #[arg(short, help = "Do not reduce the assembly output")]
    no_reduce: bool,

    #[arg(short, help = "Enable debug diagnostics")]
    debug: bool,

    #[arg(short, long, help = "Print the compiler version")]
    version: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.version {
        println!("pcc {VERSION}");
        return Ok(());
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(if cli.debug { "debug" } else { "warn" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let mut files = Vec::with_capacity(cli.filenames.len());
    for path in &cli.filenames {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        files.push((path.to_string_lossy().into_owned(), text));
    }
    let file_refs: Vec<(&str, &str)> = files
        .iter()
        .map(|(name, text)| (name.as_str(), text.as_str()))
        .collect();

    let options = CompileOptions { reduce: !cli.no_reduce };
    let program = match pigs_cc::compile_with_options(&file_refs, &options) {
        Ok(program) => program,
        Err(errors) => {
            for error in &errors {
                if cli.debug {
                    eprintln!("error: {error:?}");
                } else {
                    eprintln!("error: {error}");
                }
            }
            eprintln!("*** aborted with {} compiler error(s)", errors.len());
            std::process::exit(1);
        }
    };

    let asm = program.encode(cli.comments);
    let out_name = match &cli.o {
        Some(name) => name.clone(),
        None => {
            let last = cli.filenames.last().expect("clap requires at least one input");
            let stem = last
                .file_stem()
                .map_or_else(|| "out".to_owned(), |s| s.to_string_lossy().into_owned());
            format!("{stem}.s")
        }
    };
    if out_name == "-" {
        print!("{asm}");
    } else {
        fs::write(&out_name, &asm).with_context(|| format!("failed to write {out_name}"))?;
    }

    eprintln!("{}", program.stats().summary());
    Ok(())
}
