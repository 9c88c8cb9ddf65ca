//! The procedure document parser.

use crate::error::ParseError;
use opseq_engine::catalogue::InstructionRegistry;
use opseq_engine::error::SetupError;
use opseq_engine::instruction::Instruction;
use opseq_engine::procedure::{Procedure, ProcedureLoader, TypeRegistration};
use opseq_engine::variables::VariableRegistry;
use serde_json::Value as Json;
use std::path::Path;
use std::sync::Arc;

/// Parses procedure documents against instruction and variable registries.
///
/// Cheap to clone; every parsed procedure gets a clone installed as its
/// include loader so nested `Include` instructions resolve through the same
/// registries.
#[derive(Clone)]
pub struct ProcedureParser {
    instructions: Arc<InstructionRegistry>,
    variables: Arc<VariableRegistry>,
}

impl ProcedureParser {
    /// Parser over the built-in catalogue and variable kinds.
    pub fn new() -> Self {
        ProcedureParser {
            instructions: Arc::new(InstructionRegistry::new()),
            variables: Arc::new(VariableRegistry::new()),
        }
    }

    /// Parser over custom registries.
    pub fn with_registries(
        instructions: Arc<InstructionRegistry>,
        variables: Arc<VariableRegistry>,
    ) -> Self {
        ProcedureParser {
            instructions,
            variables,
        }
    }

    /// Parse a document from a file.
    pub fn parse_file(&self, path: &Path) -> Result<Procedure, ParseError> {
        let text = std::fs::read_to_string(path).map_err(|e| ParseError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        self.parse_string(&text, Some(path))
    }

    /// Parse a document from a string. `filename` resolves relative paths
    /// of includes, file variables and type files.
    pub fn parse_string(
        &self,
        text: &str,
        filename: Option<&Path>,
    ) -> Result<Procedure, ParseError> {
        let json: Json =
            serde_json::from_str(text).map_err(|e| ParseError::Json(e.to_string()))?;
        let doc = json
            .as_object()
            .ok_or_else(|| structure("procedure document must be a JSON object"))?;

        let proc = Procedure::new();
        if let Some(path) = filename {
            proc.set_filename(path.to_path_buf());
        }
        proc.store().set_loader(Arc::new(self.clone()));

        if let Some(attrs) = doc.get("procedure") {
            let attrs = attrs
                .as_object()
                .ok_or_else(|| structure("[procedure] must be an object of attributes"))?;
            for (name, value) in attrs {
                proc.add_attribute(name, &attribute_string(name, value)?);
            }
        }
        for registration in doc
            .get("registerTypes")
            .map(as_array("registerTypes"))
            .transpose()?
            .into_iter()
            .flatten()
        {
            proc.add_type_registration(parse_type_registration(registration)?);
        }
        for plugin in doc
            .get("plugins")
            .map(as_array("plugins"))
            .transpose()?
            .into_iter()
            .flatten()
        {
            let path = plugin
                .as_str()
                .ok_or_else(|| structure("[plugins] entries must be strings"))?;
            proc.add_plugin_path(path);
        }
        for entry in doc
            .get("workspace")
            .map(as_array("workspace"))
            .transpose()?
            .into_iter()
            .flatten()
        {
            self.parse_variable(&proc, entry)?;
        }
        for entry in doc
            .get("instructions")
            .map(as_array("instructions"))
            .transpose()?
            .into_iter()
            .flatten()
        {
            proc.push_instruction(self.parse_instruction(entry)?);
        }
        Ok(proc)
    }

    fn parse_variable(&self, proc: &Procedure, json: &Json) -> Result<(), ParseError> {
        let entry = json
            .as_object()
            .ok_or_else(|| structure("workspace entries must be objects"))?;
        let type_tag = entry
            .get("type")
            .and_then(Json::as_str)
            .ok_or_else(|| structure("workspace entries need a [type] string"))?;
        let var = self.variables.create(type_tag).ok_or_else(|| {
            structure(&format!("unknown variable type <{type_tag}>"))
        })?;
        if let Some(attrs) = entry.get("attributes") {
            let attrs = attrs
                .as_object()
                .ok_or_else(|| structure("[attributes] must be an object"))?;
            for (name, value) in attrs {
                if !var.add_attribute(name, &attribute_string(name, value)?) {
                    return Err(structure(&format!("duplicate attribute [{name}]")));
                }
            }
        }
        let name = var.name();
        if name.is_empty() {
            return Err(structure("workspace variables need a [name] attribute"));
        }
        proc.add_variable(&name, var)
            .map_err(|e| structure(&e.to_string()))
    }

    fn parse_instruction(&self, json: &Json) -> Result<Instruction, ParseError> {
        let entry = json
            .as_object()
            .ok_or_else(|| structure("instructions must be objects"))?;
        let type_tag = entry
            .get("type")
            .and_then(Json::as_str)
            .ok_or_else(|| structure("instructions need a [type] string"))?;
        let mut children = Vec::new();
        for child in entry
            .get("children")
            .map(as_array("children"))
            .transpose()?
            .into_iter()
            .flatten()
        {
            children.push(self.parse_instruction(child)?);
        }
        let instr = self
            .instructions
            .create(type_tag, children)
            .map_err(|e| structure(&e.to_string()))?;
        if let Some(attrs) = entry.get("attributes") {
            let attrs = attrs
                .as_object()
                .ok_or_else(|| structure("[attributes] must be an object"))?;
            for (name, value) in attrs {
                if !instr.add_attribute(name, &attribute_string(name, value)?) {
                    return Err(structure(&format!("duplicate attribute [{name}]")));
                }
            }
        }
        Ok(instr)
    }
}

impl Default for ProcedureParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcedureLoader for ProcedureParser {
    fn parse(&self, text: &str, filename: Option<&Path>) -> Result<Procedure, SetupError> {
        self.parse_string(text, filename)
            .map_err(|e| SetupError::Parse(e.to_string()))
    }
}

fn structure(message: &str) -> ParseError {
    ParseError::Structure(message.to_string())
}

fn as_array(what: &'static str) -> impl Fn(&Json) -> Result<&Vec<Json>, ParseError> {
    move |json| {
        json.as_array()
            .ok_or_else(|| structure(&format!("[{what}] must be an array")))
    }
}

/// Attribute values land as strings: strings verbatim, numbers and booleans
/// via their canonical JSON form.
fn attribute_string(name: &str, value: &Json) -> Result<String, ParseError> {
    match value {
        Json::String(s) => Ok(s.clone()),
        Json::Number(n) => Ok(n.to_string()),
        Json::Bool(b) => Ok(b.to_string()),
        _ => Err(structure(&format!(
            "attribute [{name}] must be a string, number or boolean"
        ))),
    }
}

fn parse_type_registration(json: &Json) -> Result<TypeRegistration, ParseError> {
    let entry = json
        .as_object()
        .ok_or_else(|| structure("[registerTypes] entries must be objects"))?;
    if let Some(jsontype) = entry.get("jsontype") {
        let repr = match jsontype {
            Json::String(s) => s.clone(),
            inline @ Json::Object(_) => serde_json::to_string(inline)
                .map_err(|e| structure(&format!("unserializable type description: {e}")))?,
            _ => return Err(structure("[jsontype] must be a string or an object")),
        };
        return Ok(TypeRegistration::JsonType(repr));
    }
    if let Some(jsonfile) = entry.get("jsonfile") {
        let path = jsonfile
            .as_str()
            .ok_or_else(|| structure("[jsonfile] must be a string"))?;
        return Ok(TypeRegistration::JsonFile(path.to_string()));
    }
    Err(structure(
        "[registerTypes] entries need [jsontype] or [jsonfile]",
    ))
}
