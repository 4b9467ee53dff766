//! Builtin procedures and boot modules.
//!
//! Builtin-module descriptors come from the VM build as `*-builtin.json`
//! files. Each descriptor turns into one boot module reachable under
//! `x-oz://boot/<name>`, exporting its builtins by name.

use indexmap::IndexMap;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BuiltinId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ParamKind {
    In,
    Out,
}

#[derive(Debug, Clone)]
pub struct Builtin {
    /// The boot module the builtin belongs to.
    pub module: String,
    pub name: String,
    /// Fully qualified C++ name of the builtin class.
    pub full_cpp_name: String,
    pub inlineable: bool,
    pub inline_op_code: Option<u32>,
    pub params: Vec<ParamKind>,
}

impl Builtin {
    /// Total call arity, inputs and outputs included.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn in_arity(&self) -> usize {
        self.params
            .iter()
            .filter(|kind| matches!(kind, ParamKind::In))
            .count()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDescriptor {
    pub name: String,
    pub builtins: Vec<BuiltinDescriptor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuiltinDescriptor {
    pub full_cpp_name: String,
    pub name: String,
    pub inlineable: bool,
    #[serde(default)]
    pub inline_op_code: Option<u32>,
    pub params: Vec<ParamDescriptor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamDescriptor {
    pub kind: ParamKind,
}

/// One loaded boot module: an export list of builtins, keyed by URL.
#[derive(Debug)]
pub struct BootModule {
    pub name: String,
    pub url: String,
    pub exports: Vec<(String, BuiltinId)>,
}

pub fn boot_url(module_name: &str) -> String {
    format!("x-oz://boot/{}", module_name)
}

#[derive(Debug, Default)]
pub struct BuiltinRegistry {
    builtins: Vec<Builtin>,
    modules: IndexMap<String, BootModule>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        BuiltinRegistry::default()
    }

    /// Register a parsed module descriptor.
    pub fn register_module(&mut self, descriptor: ModuleDescriptor) {
        let mut exports = Vec::with_capacity(descriptor.builtins.len());
        for builtin in descriptor.builtins {
            let id = BuiltinId(self.builtins.len() as u32);
            self.builtins.push(Builtin {
                module: descriptor.name.clone(),
                name: builtin.name.clone(),
                full_cpp_name: builtin.full_cpp_name,
                inlineable: builtin.inlineable,
                inline_op_code: builtin.inline_op_code,
                params: builtin.params.into_iter().map(|param| param.kind).collect(),
            });
            exports.push((builtin.name, id));
        }
        let url = boot_url(&descriptor.name);
        self.modules.insert(
            descriptor.name.clone(),
            BootModule {
                name: descriptor.name,
                url,
                exports,
            },
        );
    }

    /// Parse and register one `*-builtin.json` document.
    pub fn load_str(&mut self, json: &str) -> Result<(), serde_json::Error> {
        let descriptor: ModuleDescriptor = serde_json::from_str(json)?;
        self.register_module(descriptor);
        Ok(())
    }

    pub fn get(&self, id: BuiltinId) -> &Builtin {
        &self.builtins[id.0 as usize]
    }

    pub fn lookup(&self, module: &str, name: &str) -> Option<BuiltinId> {
        let module = self.modules.get(module)?;
        module
            .exports
            .iter()
            .find(|(export_name, _)| export_name == name)
            .map(|(_, id)| *id)
    }

    pub fn modules(&self) -> impl Iterator<Item = &BootModule> {
        self.modules.values()
    }

    pub fn module_by_url(&self, url: &str) -> Option<&BootModule> {
        self.modules.values().find(|module| module.url == url)
    }

    pub fn builtin_count(&self) -> usize {
        self.builtins.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALUE_JSON: &str = r#"{
        "name": "Value",
        "builtins": [
            {
                "fullCppName": "mozart::builtins::ModValue::Dot",
                "name": ".",
                "inlineable": true,
                "inlineOpCode": 64,
                "params": [ {"kind": "In"}, {"kind": "In"}, {"kind": "Out"} ]
            },
            {
                "fullCppName": "mozart::builtins::ModValue::EqEq",
                "name": "==",
                "inlineable": false,
                "params": [ {"kind": "In"}, {"kind": "In"}, {"kind": "Out"} ]
            }
        ]
    }"#;

    #[test]
    fn test_load_descriptor() {
        let mut registry = BuiltinRegistry::new();
        registry.load_str(VALUE_JSON).unwrap();

        let dot = registry.lookup("Value", ".").unwrap();
        let builtin = registry.get(dot);
        assert_eq!(builtin.full_cpp_name, "mozart::builtins::ModValue::Dot");
        assert_eq!(builtin.arity(), 3);
        assert_eq!(builtin.in_arity(), 2);
        assert_eq!(builtin.inline_op_code, Some(64));

        let eq = registry.get(registry.lookup("Value", "==").unwrap());
        assert_eq!(eq.inline_op_code, None);
    }

    #[test]
    fn test_boot_module_url() {
        let mut registry = BuiltinRegistry::new();
        registry.load_str(VALUE_JSON).unwrap();

        let module = registry.module_by_url("x-oz://boot/Value").unwrap();
        assert_eq!(module.name, "Value");
        assert_eq!(module.exports.len(), 2);
        assert!(registry.module_by_url("x-oz://boot/Nope").is_none());
    }

    #[test]
    fn test_unknown_lookup() {
        let registry = BuiltinRegistry::new();
        assert!(registry.lookup("Value", ".").is_none());
    }
}
