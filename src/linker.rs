//! Links a root module and everything it references into one shader.

pub mod import_resolver;
pub mod registry;
mod renaming;

use std::collections::{hash_map::Entry, HashMap, HashSet};

use indexmap::{IndexMap, IndexSet};
use thiserror::Error;

use crate::{
    parsed_module::{ModulePath, ParsedModule},
    parser::{
        parser_output::{AbstractElem, ParseError, RefElem},
        Span,
    },
    rewriter::{replace_words, slice_replace, Slice},
    src_map::{line_column, SourceId, SrcMap},
    warning::Warning,
};
use import_resolver::{build_resolve_map, ExportTarget, ResolveMap, Resolution};
use registry::{ModuleKey, ModuleRegistry};
pub use renaming::uniquify;

#[derive(Debug, Clone, Default)]
pub struct LinkOptions {
    /// Values for generator parameters and export parameters that the imports don't set.
    pub params: IndexMap<String, String>,
    /// Include every declaration of every contributing module, not only the reachable ones.
    pub whole_file: bool,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinkError {
    #[error("module `{module}` not found")]
    RootNotFound { module: ModulePath },
    #[error("module `{module}` failed to parse: {source}")]
    Parse {
        module: ModulePath,
        source: ParseError,
    },
    #[error("`{reference}` in module `{module}` is ambiguous, it could be {}", .candidates.join(" or "))]
    AmbiguousImport {
        module: ModulePath,
        reference: String,
        candidates: Vec<String>,
    },
}

/// The linked shader.
#[derive(Debug, Clone)]
pub struct LinkOutput {
    pub text: String,
    /// From `text` back to the module sources and generated texts.
    pub src_map: SrcMap,
    pub warnings: Vec<Warning>,
    /// The texts that `src_map` points into.
    pub sources: IndexMap<SourceId, String>,
}

/// A position in one of the texts a linked shader was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrcLocation {
    pub source: SourceId,
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl LinkOutput {
    /// Finds where a byte of the linked text came from. Separators that the linker inserted
    /// have no location.
    pub fn locate(&self, offset: usize) -> Option<SrcLocation> {
        let position = self.src_map.dest_to_src(offset)?;
        let text = self.sources.get(&position.src)?;
        let (line, column) = line_column(text, position.offset);
        Some(SrcLocation {
            source: position.src,
            offset: position.offset,
            line,
            column,
        })
    }
}

/// Links `root` with all declarations it needs from the other modules of the registry.
///
/// The root module's text is kept as it is, minus its imports and export markers. The other
/// declarations follow it in the order in which they were found.
pub fn link(
    registry: &ModuleRegistry,
    root: &ModulePath,
    options: &LinkOptions,
) -> Result<LinkOutput, LinkError> {
    let Some(root_key) = registry.module_key(root) else {
        return Err(match registry.parse_failure(root) {
            Some(error) => LinkError::Parse {
                module: root.clone(),
                source: error.clone(),
            },
            None => LinkError::RootNotFound {
                module: root.clone(),
            },
        });
    };

    let mut linker = Linker {
        registry,
        options,
        root: root_key,
        instances: IndexMap::new(),
        used_names: HashSet::new(),
        resolve_maps: HashMap::new(),
        modules: IndexSet::new(),
        warnings: Vec::new(),
    };
    linker.seed()?;
    let mut next = 0;
    while next < linker.instances.len() {
        linker.visit(next)?;
        next += 1;
    }
    let output = linker.emit();
    tracing::debug!(
        root = %root,
        length = output.text.len(),
        warnings = output.warnings.len(),
        "linked"
    );
    Ok(output)
}

/// A declaration or generator with fixed parameter values. Emitted once.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct InstanceKey {
    target: ExportTarget,
    args: Vec<(String, String)>,
}

#[derive(Debug)]
struct Instance {
    /// The name in the linked output.
    name: String,
    renames: Vec<Slice>,
}

struct Linker<'r> {
    registry: &'r ModuleRegistry,
    options: &'r LinkOptions,
    root: ModuleKey,
    instances: IndexMap<InstanceKey, Instance>,
    used_names: HashSet<String>,
    resolve_maps: HashMap<ModuleKey, ResolveMap>,
    /// Modules that contribute declarations, in the order they were reached.
    modules: IndexSet<ModuleKey>,
    warnings: Vec<Warning>,
}

impl<'r> Linker<'r> {
    fn seed(&mut self) -> Result<(), LinkError> {
        let registry = self.registry;
        let root = &registry[self.root];
        self.modules.insert(self.root);
        // Root declarations keep their names
        for (_, decl) in root.decls() {
            self.used_names.insert(decl.name.clone());
        }
        // A renamed reference must not be captured by a local of the same name
        for (_, module) in registry.modules() {
            self.used_names
                .extend(module.scopes.local_decl_names().map(str::to_string));
        }
        for (index, decl) in root.decls() {
            self.instances.insert(
                InstanceKey {
                    target: ExportTarget::Decl {
                        module: self.root,
                        decl: index,
                    },
                    args: Vec::new(),
                },
                Instance {
                    name: decl.name.clone(),
                    renames: Vec::new(),
                },
            );
        }
        // Surfaces broken dependencies even if nothing refers to them
        self.resolve_map(self.root)?;
        Ok(())
    }

    fn resolve_map(&mut self, module: ModuleKey) -> Result<&ResolveMap, LinkError> {
        match self.resolve_maps.entry(module) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let (map, warnings) = build_resolve_map(self.registry, &self.registry[module])?;
                self.warnings.extend(warnings);
                Ok(entry.insert(map))
            }
        }
    }

    /// The output name of an instance, creating it if it is new.
    fn instance(&mut self, target: ExportTarget, args: Vec<(String, String)>) -> String {
        let key = InstanceKey { target, args };
        if let Some(instance) = self.instances.get(&key) {
            return instance.name.clone();
        }
        let registry = self.registry;
        let base = match &key.target {
            ExportTarget::Decl { module, decl } => registry[*module]
                .decl(*decl)
                .map_or("", |decl| decl.name.as_str()),
            ExportTarget::Generator { name, .. } => name.as_str(),
        };
        let name = uniquify(base, &mut self.used_names);
        tracing::trace!(instance = %name, ?key, "new instance");
        let new_module = match key.target {
            ExportTarget::Decl { module, .. } => Some(module).filter(|m| self.modules.insert(*m)),
            ExportTarget::Generator { .. } => None,
        };
        self.instances.insert(
            key,
            Instance {
                name: name.clone(),
                renames: Vec::new(),
            },
        );
        if let (Some(module), true) = (new_module, self.options.whole_file) {
            for (decl, _) in registry[module].decls() {
                self.instance(ExportTarget::Decl { module, decl }, Vec::new());
            }
        }
        name
    }

    /// Finds the references of one instance and the instances they lead to.
    fn visit(&mut self, index: usize) -> Result<(), LinkError> {
        let Some((key, instance)) = self.instances.get_index(index) else {
            return Ok(());
        };
        let ExportTarget::Decl {
            module: module_key,
            decl,
        } = key.target
        else {
            return Ok(());
        };
        let args = key.args.clone();
        let name = instance.name.clone();
        let registry = self.registry;
        let module = &registry[module_key];
        let Some(decl) = module.decl(decl) else {
            return Ok(());
        };

        let mut renames = Vec::new();
        if name != decl.name {
            renames.push(Slice::new(decl.name_span, name));
        }
        for reference in module.references(decl) {
            if let Some(linked) = self.link_reference(module_key, &args, reference)? {
                if linked != reference.span.text(&module.text) {
                    renames.push(Slice::new(reference.span, linked));
                }
            }
        }
        if let Some((_, instance)) = self.instances.get_index_mut(index) {
            instance.renames = renames;
        }
        Ok(())
    }

    /// The output name of what a reference refers to, or `None` if it stays as written.
    fn link_reference(
        &mut self,
        module_key: ModuleKey,
        args: &[(String, String)],
        reference: &RefElem,
    ) -> Result<Option<String>, LinkError> {
        let registry = self.registry;
        let module = &registry[module_key];
        if let Some(binding) = module.scopes.ident(reference.ident).binding {
            if !module.scopes.is_global(binding) {
                return Ok(None);
            }
            let Some((decl, _)) = module.decls().find(|(_, decl)| decl.ident == binding) else {
                return Ok(None);
            };
            let target = ExportTarget::Decl {
                module: module_key,
                decl,
            };
            return Ok(Some(self.instance(target, args.to_vec())));
        }
        if let [name] = reference.path.as_slice() {
            if args.iter().any(|(param, _)| param == name) {
                return Ok(None);
            }
        }

        let resolution = self.resolve_map(module_key)?.resolve(&reference.path);
        match resolution {
            Resolution::Found {
                target,
                args: import_args,
                ..
            } => {
                let instance_args = self.instance_args(
                    module_key,
                    args,
                    &target,
                    import_args.as_deref(),
                    reference.span,
                )?;
                Ok(Some(self.instance(target, instance_args)))
            }
            Resolution::Unresolved => {
                if reference.path.len() > 1 {
                    let message = format!("unresolved reference `{}`", reference.path.join("::"));
                    self.warnings
                        .push(module.warning(reference.span.start, message));
                }
                Ok(None)
            }
            Resolution::Ambiguous(candidates) => Err(LinkError::AmbiguousImport {
                module: module.path.clone(),
                reference: reference.path.join("::"),
                candidates,
            }),
        }
    }

    /// Binds the parameters of an export. Import arguments come first, then the link options,
    /// then the defaults of a generator.
    fn instance_args(
        &mut self,
        importer: ModuleKey,
        caller_args: &[(String, String)],
        target: &ExportTarget,
        import_args: Option<&[String]>,
        span: Span,
    ) -> Result<Vec<(String, String)>, LinkError> {
        let registry = self.registry;
        let (params, is_generator): (Vec<(String, Option<String>)>, bool) = match target {
            ExportTarget::Decl { module, decl } => (
                registry[*module]
                    .decl(*decl)
                    .map(|decl| decl.params.iter().map(|p| (p.clone(), None)).collect())
                    .unwrap_or_default(),
                false,
            ),
            ExportTarget::Generator { module, name } => (
                registry
                    .generator(module, name)
                    .map(|generator| generator.params.clone())
                    .unwrap_or_default(),
                true,
            ),
        };

        let mut args = Vec::with_capacity(params.len());
        for (position, (param, default)) in params.into_iter().enumerate() {
            let value = match import_args.and_then(|import_args| import_args.get(position)) {
                Some(arg) => Some(self.arg_value(importer, caller_args, arg)?),
                None => self.options.params.get(&param).cloned().or(default),
            };
            match value {
                Some(value) => args.push((param, value)),
                None if is_generator => {
                    let message = format!("no value for generator parameter `{param}`");
                    self.warnings
                        .push(registry[importer].warning(span.start, message));
                    args.push((param.clone(), param));
                }
                None => {}
            }
        }
        Ok(args)
    }

    /// An import argument as seen from the importing module. Names of declarations are linked
    /// like references.
    fn arg_value(
        &mut self,
        importer: ModuleKey,
        caller_args: &[(String, String)],
        arg: &str,
    ) -> Result<String, LinkError> {
        if let Some((_, value)) = caller_args.iter().find(|(param, _)| param == arg) {
            return Ok(value.clone());
        }
        let registry = self.registry;
        if let Some((decl, _)) = registry[importer].find_decl(arg) {
            let target = ExportTarget::Decl {
                module: importer,
                decl,
            };
            return Ok(self.instance(target, caller_args.to_vec()));
        }
        let resolution = self.resolve_map(importer)?.resolve(&[arg.to_string()]);
        match resolution {
            // Arguments of arguments are not followed
            Resolution::Found {
                target, args: None, ..
            } => Ok(self.instance(target, Vec::new())),
            _ => Ok(arg.to_string()),
        }
    }

    fn emit(self) -> LinkOutput {
        let registry = self.registry;
        let linker_id = SourceId::new("<linker>");
        let mut output = SrcMap::new(SourceId::new("<linked>"));
        let mut sources = IndexMap::new();
        let mut warnings = Vec::new();
        for key in &self.modules {
            let module = &registry[*key];
            sources.insert(module.source_id.clone(), module.source.clone());
            warnings.extend(module.warnings.iter().cloned());
        }
        warnings.extend(self.warnings);

        let root = &registry[self.root];
        let is_root_instance = |key: &InstanceKey| {
            key.args.is_empty()
                && matches!(key.target, ExportTarget::Decl { module, .. } if module == self.root)
        };
        let mut root_slices: Vec<Slice> = root
            .elems
            .iter()
            .filter(|elem| {
                matches!(
                    elem,
                    AbstractElem::Module(_) | AbstractElem::Import(_) | AbstractElem::Export(_)
                )
            })
            .map(|elem| Slice::delete(elem.span()))
            .collect();
        for (key, instance) in &self.instances {
            if is_root_instance(key) {
                root_slices.extend(instance.renames.iter().cloned());
            }
        }
        // Directives that dependencies need go first, WGSL wants them before any declaration
        let mut directives: HashSet<&str> = global_directives(root)
            .map(|span| span.text(&root.text))
            .collect();
        for key in self.modules.iter().filter(|key| **key != self.root) {
            let module = &registry[*key];
            for span in global_directives(module) {
                if directives.insert(span.text(&module.text)) {
                    output.append(&declaration_text(module, span, &[], &[]));
                    output.add("\n", &linker_id, 0, 0);
                }
            }
        }

        let sliced = slice_replace(&root.text, root.text_id(), &root_slices, None);
        output.append(&root.src_map.merge(&sliced.src_map));

        for (index, (key, instance)) in self.instances.iter().enumerate() {
            if is_root_instance(key) {
                continue;
            }
            let piece = match &key.target {
                ExportTarget::Decl { module, decl } => {
                    let module = &registry[*module];
                    let Some(decl) = module.decl(*decl) else {
                        continue;
                    };
                    declaration_text(module, decl.span, &instance.renames, &key.args)
                }
                ExportTarget::Generator { module, name } => {
                    let Some(generator) = registry.generator(module, name) else {
                        continue;
                    };
                    let args: IndexMap<String, String> = key.args.iter().cloned().collect();
                    let text = (generator.generate)(&instance.name, &args);
                    let id = SourceId::new(format!("generator:{module}/{name}#{index}"));
                    let mut map = SrcMap::new(id.clone());
                    map.add(&text, &id, 0, text.len());
                    sources.insert(id, text);
                    map
                }
            };
            if !output.dest.is_empty() && !output.dest.ends_with("\n\n") {
                let separator = if output.dest.ends_with('\n') { "\n" } else { "\n\n" };
                output.add(separator, &linker_id, 0, 0);
            }
            output.append(&piece);
        }

        output.compact();
        if let Err(error) = output.check_coverage() {
            panic!("linked source map is inconsistent: {error}");
        }
        LinkOutput {
            text: output.dest.clone(),
            src_map: output,
            warnings,
            sources,
        }
    }
}

/// One declaration of a module with its references renamed and its parameters replaced.
fn declaration_text(
    module: &ParsedModule,
    span: Span,
    renames: &[Slice],
    args: &[(String, String)],
) -> SrcMap {
    let sliced = slice_replace(&module.text, module.text_id(), renames, Some(span));
    let mapped = module.src_map.merge(&sliced.src_map);
    if args.is_empty() {
        return mapped;
    }
    let table: HashMap<String, String> = args.iter().cloned().collect();
    let replaced = replace_words(&mapped.dest, &mapped.id, &table);
    mapped.merge(&replaced.src_map)
}

/// The `enable`, `requires` and `diagnostic` directives of a module.
fn global_directives(module: &ParsedModule) -> impl Iterator<Item = Span> + '_ {
    module.elems.iter().filter_map(move |elem| match elem {
        AbstractElem::Text(text) => {
            let keyword = text
                .span
                .text(&module.text)
                .split(|c: char| !c.is_alphanumeric() && c != '_')
                .next()?;
            matches!(keyword, "enable" | "requires" | "diagnostic").then_some(text.span)
        }
        _ => None,
    })
}
