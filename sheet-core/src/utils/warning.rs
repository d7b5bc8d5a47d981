use std::{path::PathBuf, rc::Rc, sync::{Arc, RwLock}};

use termcolor::Buffer;

use crate::analyzer::error::Warning as AnalyzerWarning;
use super::diagnostic::{Diagnostic, Label, Level, Location};

pub trait WarningEmitterIO {
    fn emit_warning(&self, warning: Warning);
}

#[derive(Debug, Clone, Copy)]
pub struct NullWarningEmitterIO;

impl WarningEmitterIO for NullWarningEmitterIO {
    fn emit_warning(&self, _warning: Warning) {}
}

/// Collects warnings for later inspection, used by tests.
#[derive(Debug, Default, Clone)]
pub struct VectorWarningEmitterIO {
    pub warnings: Arc<RwLock<Vec<Warning>>>,
}

impl VectorWarningEmitterIO {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<Warning> {
        let mut warnings = self.write_lock();
        std::mem::take(&mut *warnings)
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Warning>> {
        self.warnings.write().expect("warning vector lock poisoned")
    }
}

impl WarningEmitterIO for VectorWarningEmitterIO {
    fn emit_warning(&self, warning: Warning) {
        let mut warnings = self.write_lock();
        warnings.push(warning);
    }
}

pub struct WarningEmitter {
    emitter: Rc<dyn WarningEmitterIO>,
}

impl WarningEmitter {
    pub fn new(emitter: Rc<dyn WarningEmitterIO>) -> Self {
        Self { emitter }
    }

    pub fn null() -> Self {
        Self::new(Rc::new(NullWarningEmitterIO))
    }

    pub fn emit(&self, warning: Warning) {
        self.emitter.emit_warning(warning);
    }
}

/// Pairs the analyzer's bare warnings with the module source so they can
/// be rendered as full diagnostics.
pub struct TypeWarningEmitter {
    module_path: PathBuf,
    module_src: String,
    emitter: WarningEmitter,
}

impl TypeWarningEmitter {
    pub fn new(module_path: PathBuf, module_src: String, emitter: WarningEmitter) -> Self {
        Self {
            module_path,
            module_src,
            emitter,
        }
    }

    pub fn null() -> Self {
        Self {
            module_path: PathBuf::new(),
            module_src: String::new(),
            emitter: WarningEmitter::null(),
        }
    }

    pub fn emit(&self, warning: AnalyzerWarning) {
        self.emitter.emit(Warning::Analysis {
            path: self.module_path.clone(),
            src: self.module_src.clone(),
            warning,
        });
    }
}

#[derive(Debug, Clone)]
pub enum Warning {
    Analysis {
        path: PathBuf,
        src: String,
        warning: AnalyzerWarning,
    },
}

impl Warning {
    pub fn pretty_string(&self) -> String {
        let mut nocolor = Buffer::no_color();
        self.pretty(&mut nocolor);
        String::from_utf8(nocolor.into_inner()).expect("warning printing produced invalid utf8")
    }

    pub fn pretty(&self, buf: &mut Buffer) {
        use std::io::Write;

        self.to_diagnostic().write(buf);
        buf.write_all(b"\n").expect("warning buffer write");
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Warning::Analysis { path, src, warning } => {
                let (title, label) = match warning {
                    AnalyzerWarning::UnusedDefinition { name, .. } => (
                        "Unused definition",
                        Some(format!("`{name}` is never used")),
                    ),
                    AnalyzerWarning::InfiniteLoop { .. } => (
                        "Infinite loop",
                        Some("This condition is never zero".into()),
                    ),
                    AnalyzerWarning::UnreachableLoopBody { .. } => (
                        "Unreachable loop body",
                        Some("This condition is always zero".into()),
                    ),
                    AnalyzerWarning::UnreachableIfBranch { .. } => (
                        "Unreachable if branch",
                        None,
                    ),
                    AnalyzerWarning::UnreachableElseBranch { .. } => (
                        "Unreachable else branch",
                        None,
                    ),
                };

                Diagnostic {
                    title: title.into(),
                    text: "".into(),
                    level: Level::Warning,
                    location: Some(Location {
                        src,
                        path: path.to_path_buf(),
                        label: Label {
                            text: label,
                            span: warning.location(),
                        },
                        extra_labels: vec![],
                    }),
                }
            },
        }
    }
}
