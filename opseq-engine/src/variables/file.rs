//! JSON-file-backed variable kind.

use crate::constants;
use crate::error::SetupError;
use crate::variable::{SharedSetup, Variable, VariableKind, VariableSetupContext};
use opseq_value::{Value, ValueType};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Type tag of file variables.
pub const FILE_TYPE: &str = "File";

/// Create a `File` variable.
///
/// Attributes: mandatory `file` (JSON document, resolved relative to the
/// procedure file), optional `pretty` (boolean). Reads go to the file every
/// time; writes rewrite it. The variable is available while the file parses.
pub fn file_variable() -> Variable {
    let var = Variable::new(FILE_TYPE, Box::new(FileKind::default()));
    var.with_attrs(|attrs| {
        attrs.define(constants::FILE, ValueType::String).mandatory();
        attrs.define(constants::PRETTY, ValueType::Bool);
    });
    var
}

#[derive(Default)]
struct FileKind {
    path: Mutex<Option<PathBuf>>,
    pretty: AtomicBool,
}

impl FileKind {
    fn read_file(&self) -> Option<Value> {
        let guard = self.path.lock();
        let path = guard.as_ref()?;
        let text = std::fs::read_to_string(path).ok()?;
        let json: serde_json::Value = serde_json::from_str(&text).ok()?;
        opseq_value::from_json(&json).ok()
    }
}

impl VariableKind for FileKind {
    fn setup(&self, ctx: &VariableSetupContext<'_>) -> Result<Option<SharedSetup>, SetupError> {
        let filename = ctx.attrs.raw(constants::FILE).unwrap_or_default();
        let path = resolve_path(ctx.base_dir, filename);
        self.pretty.store(
            ctx.attrs.value_as::<bool>(constants::PRETTY).unwrap_or(false),
            Ordering::SeqCst,
        );
        *self.path.lock() = Some(path);
        Ok(None)
    }

    fn teardown(&self) {
        *self.path.lock() = None;
    }

    fn read(&self) -> Option<Value> {
        self.read_file()
    }

    fn write(&self, value: &Value) -> Option<Value> {
        let json = opseq_value::to_json(value);
        let text = if self.pretty.load(Ordering::SeqCst) {
            serde_json::to_string_pretty(&json).ok()?
        } else {
            serde_json::to_string(&json).ok()?
        };
        let guard = self.path.lock();
        let path = guard.as_ref()?;
        std::fs::write(path, text).ok()?;
        Some(value.clone())
    }

    fn is_available(&self) -> bool {
        self.read_file().is_some()
    }
}

fn resolve_path(base_dir: Option<&Path>, filename: &str) -> PathBuf {
    let file = Path::new(filename);
    match base_dir {
        Some(dir) if file.is_relative() => dir.join(file),
        _ => file.to_path_buf(),
    }
}
