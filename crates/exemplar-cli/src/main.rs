use std::io;

fn main() {
    // Logs go to stderr; stdout carries rewritten sources in print mode
    exemplar_core::init_tracing();

    let code = exemplar_cli::run(std::env::args(), &mut io::stdout().lock(), &mut io::stderr());
    std::process::exit(code);
}
