//! The Etude compiler CLI.
//!
//! `etudec -m <module>` compiles the named module (default `main`) from
//! the working directory, consulting `ETUDE_STDLIB` for modules not
//! found locally. `-t` compiles the entry module's `@test` functions
//! instead of `main`.
//!
//! Diagnostics print one line each, `line = L, column = C: <message>`,
//! 1-indexed; `--pretty` renders a labeled source report instead.
//!
//! Exit codes: 0 on success, 1 on any compile-time error, 2 on usage
//! errors (clap's native behavior).

use std::process::ExitCode;

use clap::Parser;
use etude_common::span::LineIndex;
use etude_common::Diagnostic;
use etude_driver::{CompilationDriver, FsProvider};

#[derive(Parser)]
#[command(name = "etudec", version, about = "The Etude compiler")]
struct Cli {
    /// Entry module name (searched as <name>.et)
    #[arg(short = 'm', default_value = "main")]
    module: String,

    /// Compile the entry module's @test functions instead of main
    #[arg(short = 't')]
    test: bool,

    /// Render diagnostics as labeled source reports
    #[arg(long)]
    pretty: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut driver = CompilationDriver::new(FsProvider::from_env());
    driver.set_main_module(&cli.module);
    if cli.test {
        driver.set_test_build();
    }

    match driver.compile() {
        Ok(_) => ExitCode::SUCCESS,
        Err(diagnostic) => {
            report(&driver, &diagnostic, cli.pretty);
            ExitCode::FAILURE
        }
    }
}

/// Print one diagnostic: the plain single-line contract by default, an
/// ariadne report when the user asked for pretty output and the error
/// has a source position we still hold text for.
fn report(driver: &CompilationDriver<FsProvider>, diagnostic: &Diagnostic, pretty: bool) {
    if pretty {
        if let Some(location) = diagnostic.location {
            if let Some(source) = driver.source_of(location.module) {
                use ariadne::{Label, Report, ReportKind, Source};
                let offset = LineIndex::new(source).offset(location.line, location.column) as usize;
                let span = offset..offset + 1;
                let _ = Report::<std::ops::Range<usize>>::build(ReportKind::Error, span.clone())
                    .with_message("Compile error")
                    .with_label(Label::new(span).with_message(&diagnostic.message))
                    .finish()
                    .eprint(Source::from(source));
                return;
            }
        }
    }
    eprintln!("{}", diagnostic);
}
