pub mod error;
pub mod analyzer;

pub mod prelude {
    pub use super::{
        analyzer::*,
        error::*
    };
}

use std::{path::PathBuf, rc::Rc};

use utf8_chars::BufReadCharsExt;

use crate::{
    analyzer::prelude::{ModuleAnalyzer, Outcome},
    parser::prelude::{parse_module, parse_module_from_stream, Module},
    utils::prelude::{Error, TypeWarningEmitter, WarningEmitter, WarningEmitterIO},
};

/// Parses and analyzes a source string. A parse error or a non-empty
/// diagnostic list prevents the module from reaching evaluation.
pub fn analyze_source(
    src: &str,
    path: PathBuf,
    warnings: Rc<dyn WarningEmitterIO>,
) -> Result<Module, Error> {
    let warnings = WarningEmitter::new(warnings);

    let parsed = match parse_module(src) {
        Ok(parsed) => parsed,
        Err(error) => {
            return Err(Error::Parse {
                path,
                src: src.to_string(),
                error,
            })
        }
    };

    let warnings = TypeWarningEmitter::new(path.clone(), src.to_string(), warnings);

    match ModuleAnalyzer::analyze(parsed.module, &warnings) {
        Outcome::Ok(module) => Ok(module),
        Outcome::PartialFailure(_, errors) => Err(Error::Analysis {
            path,
            src: src.to_string(),
            errors,
        }),
    }
}

pub fn analyze(path: PathBuf, warnings: Rc<dyn WarningEmitterIO>) -> Result<Module, Error> {
    let src = std::fs::read_to_string(&path)
        .map_err(|err| Error::StdIo { err: err.kind() })?;

    analyze_source(&src, path, warnings)
}

/// Like [`analyze`], but feeds the lexer from a buffered character
/// stream instead of an upfront read of the whole file.
pub fn analyze_from_stream(
    path: PathBuf,
    warnings: Rc<dyn WarningEmitterIO>,
) -> Result<Module, Error> {
    let warnings = WarningEmitter::new(warnings);

    let file = std::fs::File::open(&path)
        .map_err(|err| Error::StdIo { err: err.kind() })?;
    let file_size = file.metadata()
        .map_err(|err| Error::StdIo { err: err.kind() })?
        .len() as usize;

    let mut src = String::with_capacity(file_size);
    let mut reader = std::io::BufReader::new(file);

    let parsed = {
        let stream = reader.chars()
            .map_while(Result::ok)
            .map(|c| {
                src.push(c);
                c
            });

        parse_module_from_stream(stream)
    };

    let parsed = match parsed {
        Ok(parsed) => parsed,
        Err(error) => return Err(Error::Parse { path, src, error }),
    };

    let warnings = TypeWarningEmitter::new(path.clone(), src.clone(), warnings);

    match ModuleAnalyzer::analyze(parsed.module, &warnings) {
        Outcome::Ok(module) => Ok(module),
        Outcome::PartialFailure(_, errors) => Err(Error::Analysis { path, src, errors }),
    }
}

#[cfg(test)]
mod tests;
