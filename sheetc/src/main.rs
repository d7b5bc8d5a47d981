mod cli;
mod rlpl;
mod rppl;

use std::{path::PathBuf, rc::Rc};

use clap::Parser;
use cli::{print_analyzed, print_analyzing, print_running};
use sheet_core::{
    analyzer::analyze_from_stream,
    eval::run,
    utils::prelude::{Warning, WarningEmitterIO},
};

#[derive(Parser)]
enum Command {
    /// Performs lexical, syntactical and semantical analysis
    /// and evaluates the program
    Run {
        /// Path of source file
        path: PathBuf,
    },
    /// Performs lexical, syntactical and semantical analysis
    Analyze {
        /// Path of source file
        path: PathBuf,
        /// Do not print parsed source code
        #[arg(short, long, default_value_t = false)]
        no_output: bool,
        /// Print ast instead of parsed source code
        #[arg(long, default_value_t = false)]
        print_ast: bool,
    },
    /// Runs Read Lex Print Loop
    Rlpl,
    /// Runs Read Parse Print Loop
    Rppl,
}

fn main() {
    match Command::parse() {
        Command::Run { path } => {
            let warning_emitter = Rc::new(ConsoleWarningEmitter);

            let buf_writer = crate::cli::stderr_buffer_writer();
            let mut buf = buf_writer.buffer();

            print_running(path.to_str().unwrap_or_default());

            if let Err(err) = run(path, warning_emitter) {
                err.pretty(&mut buf);
                buf_writer
                    .print(&buf)
                    .expect("writing error to stderr");

                std::process::exit(1);
            }
        },
        Command::Analyze { path, no_output, print_ast } => {
            let warning_emitter = Rc::new(ConsoleWarningEmitter);

            let buf_writer = crate::cli::stderr_buffer_writer();
            let mut buf = buf_writer.buffer();

            print_analyzing(path.to_str().unwrap_or_default());
            let start = std::time::Instant::now();

            match analyze_from_stream(path, warning_emitter) {
                Ok(module) => {
                    if !no_output {
                        if print_ast {
                            println!("{:#?}", module.program);
                        } else {
                            println!("{}", module.program);
                        }
                    }
                },
                Err(err) => {
                    err.pretty(&mut buf);
                    buf_writer
                        .print(&buf)
                        .expect("writing error to stderr");
                }
            };

            print_analyzed(std::time::Instant::now() - start);
        },
        Command::Rlpl => {
            install_interrupt_handler();
            let _ = rlpl::start();
        },
        Command::Rppl => {
            install_interrupt_handler();
            let _ = rppl::start();
        },
    };
}

fn install_interrupt_handler() {
    let _ = ctrlc::set_handler(|| std::process::exit(0));
}

#[derive(Debug, Clone, Copy)]
pub struct ConsoleWarningEmitter;

impl WarningEmitterIO for ConsoleWarningEmitter {
    fn emit_warning(&self, warning: Warning) {
        let buffer_writer = crate::cli::stderr_buffer_writer();
        let mut buffer = buffer_writer.buffer();
        warning.pretty(&mut buffer);
        buffer_writer
            .print(&buffer)
            .expect("writing warning to stderr");
    }
}
