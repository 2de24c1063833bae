use std::{collections::HashMap, fmt, ops::Index, sync::Arc};

use indexmap::IndexMap;
use slotmap::{new_key_type, SlotMap};

use crate::{
    parsed_module::{ModulePath, ParsedModule},
    parser::{parse_module, parser_output::ParseError, ParseOptions},
};

new_key_type! {
    /// A key for a module in the registry.
    pub struct ModuleKey;
}

/// Produces the text of a generated declaration from its linked name and its arguments.
pub type GenerateFn = Arc<dyn Fn(&str, &IndexMap<String, String>) -> String + Send + Sync>;

/// A declaration that is generated at link time instead of being parsed, imported with
/// `#import name(args) from module`.
#[derive(Clone)]
pub struct GeneratorExport {
    pub module: ModulePath,
    pub name: String,
    /// Parameter names with their default values.
    pub params: Vec<(String, Option<String>)>,
    pub generate: GenerateFn,
}

impl GeneratorExport {
    pub fn new(
        module: ModulePath,
        name: impl Into<String>,
        params: Vec<(String, Option<String>)>,
        generate: impl Fn(&str, &IndexMap<String, String>) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            module,
            name: name.into(),
            params,
            generate: Arc::new(generate),
        }
    }
}

impl fmt::Debug for GeneratorExport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorExport")
            .field("module", &self.module)
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// All modules that can take part in a link, indexed by their path.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    options: ParseOptions,
    /// Whenever a module is updated, it gets a new key.
    modules: SlotMap<ModuleKey, ParsedModule>,
    module_paths: HashMap<ModulePath, ModuleKey>,
    failures: HashMap<ModulePath, ParseError>,
    generators: IndexMap<(ModulePath, String), GeneratorExport>,
}

impl ModuleRegistry {
    pub fn new(options: ParseOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    /// Parses all sources, given as (file path, text) pairs. Modules that fail to parse are
    /// remembered, and linking a module that depends on them reports the parse error.
    pub fn from_sources<P, T>(
        sources: impl IntoIterator<Item = (P, T)>,
        generators: impl IntoIterator<Item = GeneratorExport>,
        options: ParseOptions,
    ) -> Self
    where
        P: AsRef<str>,
        T: AsRef<str>,
    {
        let mut registry = Self::new(options);
        for (path, text) in sources {
            let _ = registry.add_source(path.as_ref(), text.as_ref());
        }
        for generator in generators {
            registry.register_generator(generator);
        }
        registry
    }

    /// Parses and adds or replaces a module.
    pub fn add_source(&mut self, file_path: &str, text: &str) -> Result<ModuleKey, ParseError> {
        match parse_module(text, file_path, &self.options) {
            Ok(module) => {
                self.failures.remove(&ModulePath::from_file_path(file_path));
                Ok(self.insert_module(module))
            }
            Err(error) => {
                let path = ModulePath::declared_in(text)
                    .unwrap_or_else(|| ModulePath::from_file_path(file_path));
                tracing::warn!(module = %path, %error, "module failed to parse");
                self.remove_module(&path);
                self.failures.insert(path, error.clone());
                Err(error)
            }
        }
    }

    /// Adds or replaces a parsed module.
    pub fn insert_module(&mut self, module: ParsedModule) -> ModuleKey {
        let path = module.path.clone();
        let key = self.modules.insert(module);
        if let Some(old_module) = self.module_paths.insert(path.clone(), key) {
            self.modules.remove(old_module);
        }
        self.failures.remove(&path);
        key
    }

    pub fn remove_module(&mut self, path: &ModulePath) -> Option<ParsedModule> {
        let key = self.module_paths.remove(path)?;
        self.modules.remove(key)
    }

    pub fn register_generator(&mut self, generator: GeneratorExport) {
        self.generators.insert(
            (generator.module.clone(), generator.name.clone()),
            generator,
        );
    }

    pub fn module(&self, path: &ModulePath) -> Option<&ParsedModule> {
        self.modules.get(*self.module_paths.get(path)?)
    }

    pub fn module_key(&self, path: &ModulePath) -> Option<ModuleKey> {
        self.module_paths.get(path).copied()
    }

    pub fn get(&self, key: ModuleKey) -> Option<&ParsedModule> {
        self.modules.get(key)
    }

    pub fn modules(&self) -> impl Iterator<Item = (ModuleKey, &ParsedModule)> {
        self.modules.iter()
    }

    /// The error of the last failed attempt to parse a module.
    pub fn parse_failure(&self, path: &ModulePath) -> Option<&ParseError> {
        self.failures.get(path)
    }

    pub fn generator(&self, module: &ModulePath, name: &str) -> Option<&GeneratorExport> {
        self.generators.get(&(module.clone(), name.to_string()))
    }

    pub fn generators_of<'a>(
        &'a self,
        module: &'a ModulePath,
    ) -> impl Iterator<Item = &'a GeneratorExport> + 'a {
        self.generators
            .values()
            .filter(move |generator| &generator.module == module)
    }

    /// Modules that export a declaration or a generator with this name, in path order.
    pub fn exporters(&self, name: &str) -> Vec<ModulePath> {
        let mut paths: Vec<ModulePath> = self
            .modules
            .values()
            .filter(|module| module.find_export(name).is_some())
            .map(|module| module.path.clone())
            .chain(
                self.generators
                    .values()
                    .filter(|generator| generator.name == name)
                    .map(|generator| generator.module.clone()),
            )
            .collect();
        paths.sort();
        paths.dedup();
        paths
    }
}

impl Index<ModuleKey> for ModuleRegistry {
    type Output = ParsedModule;

    fn index(&self, key: ModuleKey) -> &Self::Output {
        &self.modules[key]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replacing_a_module_drops_the_old_one() {
        let mut registry = ModuleRegistry::default();
        let first = registry.add_source("./lib/util.wgsl", "fn a() {}").unwrap();
        let second = registry.add_source("lib/util.wesl", "fn b() {}").unwrap();
        assert_ne!(first, second);
        assert!(registry.get(first).is_none());
        let module = registry
            .module(&ModulePath::from_slice(&["lib", "util"]))
            .unwrap();
        assert!(module.find_decl("b").is_some());
    }

    #[test]
    fn failures_are_remembered() {
        let mut registry = ModuleRegistry::default();
        registry.add_source("util", "fn a() {}").unwrap();
        assert!(registry.add_source("util", "fn (").is_err());
        let path = ModulePath::from_slice(&["util"]);
        assert!(registry.module(&path).is_none());
        assert!(registry.parse_failure(&path).is_some());
    }

    #[test]
    fn failures_use_the_module_directive() {
        let mut registry = ModuleRegistry::default();
        assert!(registry
            .add_source("whatever.wgsl", "// math\nmodule pkg.math;\nfn add( {")
            .is_err());
        assert!(registry
            .parse_failure(&ModulePath::from_slice(&["pkg", "math"]))
            .is_some());
        assert!(registry
            .parse_failure(&ModulePath::from_slice(&["whatever"]))
            .is_none());
    }

    #[test]
    fn module_directive_names_the_module() {
        let mut registry = ModuleRegistry::default();
        registry
            .add_source("whatever.wgsl", "module pkg.math\nfn add() {}")
            .unwrap();
        assert!(registry
            .module(&ModulePath::from_slice(&["pkg", "math"]))
            .is_some());
    }
}
