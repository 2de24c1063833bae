//! Maps the paths used inside a module to the declarations of other modules.

use indexmap::IndexMap;

use super::{
    registry::{ModuleKey, ModuleRegistry},
    LinkError,
};
use crate::{
    parsed_module::{ModulePath, ParsedModule},
    parser::{import_tree::ImportLeaf, Span},
    warning::Warning,
};

/// What an export path names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExportTarget {
    Decl { module: ModuleKey, decl: usize },
    Generator { module: ModulePath, name: String },
}

/// One imported item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEntry {
    /// The path as it is visible in the importing module, with the alias applied.
    pub import_path: Vec<String>,
    /// The absolute path of what is imported.
    pub export_path: Vec<String>,
    pub args: Option<Vec<String>>,
    /// The import statement.
    pub span: Span,
}

/// The imports of one module, ready to resolve references.
#[derive(Debug, Clone, Default)]
pub struct ResolveMap {
    pub paths: Vec<ImportEntry>,
    /// Every declaration and generator that an import could refer to, by absolute path.
    pub exports: IndexMap<Vec<String>, ExportTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found {
        target: ExportTarget,
        export_path: Vec<String>,
        /// Arguments written at the import, to be resolved in the importing module.
        args: Option<Vec<String>>,
    },
    /// Not imported. Treated as an external name, like a builtin.
    Unresolved,
    /// Several imports match equally well. Holds their export paths.
    Ambiguous(Vec<String>),
}

/// The rest of `b` after the longest suffix of `a` that is also a prefix of `b`.
///
/// `overlap_tail(["a", "b"], ["b", "c", "d"])` is `["c", "d"]`.
pub fn overlap_tail<'b, T: PartialEq>(a: &[T], b: &'b [T]) -> Option<&'b [T]> {
    (1..=a.len().min(b.len()))
        .rev()
        .find(|&overlap| a[a.len() - overlap..] == b[..overlap])
        .map(|overlap| &b[overlap..])
}

impl ResolveMap {
    /// Finds what a reference like `foo` or `util::foo` refers to.
    ///
    /// Imports whose path overlaps more of the reference win. Among equally long overlaps, all
    /// must agree on the target.
    pub fn resolve(&self, reference: &[String]) -> Resolution {
        let mut best_overlap = 0;
        let mut candidates: Vec<(&ExportTarget, Vec<String>, &Option<Vec<String>>)> = Vec::new();
        for entry in &self.paths {
            // A wildcard import without alias makes the names visible as they are
            let rest = if entry.import_path.is_empty() {
                Some(reference)
            } else {
                overlap_tail(&entry.import_path, reference)
            };
            let Some(rest) = rest else {
                continue;
            };
            let overlap = reference.len() - rest.len();
            let export_path: Vec<String> =
                entry.export_path.iter().chain(rest).cloned().collect();
            let Some(target) = self.exports.get(&export_path) else {
                continue;
            };
            if overlap < best_overlap {
                continue;
            } else if overlap > best_overlap {
                best_overlap = overlap;
                candidates.clear();
            }
            candidates.push((target, export_path, &entry.args));
        }

        let Some((target, export_path, args)) = candidates.first() else {
            return Resolution::Unresolved;
        };
        if candidates.iter().all(|(other, _, _)| other == target) {
            Resolution::Found {
                target: (*target).clone(),
                export_path: export_path.clone(),
                args: (*args).clone(),
            }
        } else {
            let mut paths: Vec<String> = candidates
                .iter()
                .map(|(_, path, _)| path.join("::"))
                .collect();
            paths.dedup();
            Resolution::Ambiguous(paths)
        }
    }
}

struct Builder<'r> {
    registry: &'r ModuleRegistry,
    module: &'r ParsedModule,
    map: ResolveMap,
    warnings: Vec<Warning>,
}

/// Builds the [`ResolveMap`] of a module. Missing modules are reported as warnings, modules
/// that failed to parse are errors.
pub fn build_resolve_map(
    registry: &ModuleRegistry,
    module: &ParsedModule,
) -> Result<(ResolveMap, Vec<Warning>), LinkError> {
    let mut builder = Builder {
        registry,
        module,
        map: ResolveMap::default(),
        warnings: Vec::new(),
    };
    let leaves: Vec<(Span, ImportLeaf)> = module
        .import_leaves()
        .map(|(import, leaf)| (import.span, leaf))
        .collect();
    for (span, leaf) in &leaves {
        builder.add_leaf(*span, leaf, &leaves)?;
    }
    tracing::debug!(
        module = %module.path,
        imports = builder.map.paths.len(),
        exports = builder.map.exports.len(),
        "built resolve map"
    );
    Ok((builder.map, builder.warnings))
}

impl<'r> Builder<'r> {
    fn add_leaf(
        &mut self,
        span: Span,
        leaf: &ImportLeaf,
        all_leaves: &[(Span, ImportLeaf)],
    ) -> Result<(), LinkError> {
        let Some(absolute) = self.module.path.resolve_relative(&leaf.path) else {
            self.warn(span, format!("import `{}` leaves the root", leaf.path.join("/")));
            return Ok(());
        };
        if leaf.wildcard {
            if !self.add_module_exports(&absolute)? {
                let module = ModulePath::new(absolute.iter().cloned());
                self.warn(span, format!("module `{module}` not found"));
            }
            self.map.paths.push(ImportEntry {
                import_path: leaf.alias.iter().cloned().collect(),
                export_path: absolute,
                args: None,
                span,
            });
            return Ok(());
        }

        let mut visible: Vec<String> = leaf
            .path
            .iter()
            .filter(|segment| *segment != "." && *segment != "..")
            .cloned()
            .collect();
        if let (Some(alias), Some(last)) = (&leaf.alias, visible.last_mut()) {
            *last = alias.clone();
        }

        let mut found = self.add_item(&absolute)?;
        found |= self.add_module_exports(&absolute)?;
        let mut export_path = absolute;
        if !found && leaf.path.len() == 1 {
            if let Some(path) = self.search_bare(&leaf.path[0], all_leaves)? {
                export_path = path;
                found = true;
            }
        }
        if !found {
            self.missing(span, &export_path);
        }
        self.map.paths.push(ImportEntry {
            import_path: visible,
            export_path,
            args: leaf.args.clone(),
            span,
        });
        Ok(())
    }

    /// Adds `path` as a single declaration or generator. Returns whether it exists.
    fn add_item(&mut self, path: &[String]) -> Result<bool, LinkError> {
        let Some((name, module_path)) = path.split_last() else {
            return Ok(false);
        };
        let module_path = ModulePath::new(module_path.iter().cloned());
        self.check_parsed(&module_path)?;
        if let Some(generator) = self.registry.generator(&module_path, name) {
            self.map.exports.insert(
                path.to_vec(),
                ExportTarget::Generator {
                    module: generator.module.clone(),
                    name: generator.name.clone(),
                },
            );
            return Ok(true);
        }
        let Some(key) = self.registry.module_key(&module_path) else {
            return Ok(false);
        };
        match self.registry[key].find_export(name) {
            Some((decl, _)) => {
                self.map
                    .exports
                    .insert(path.to_vec(), ExportTarget::Decl { module: key, decl });
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Adds every export of the module at `path`. Returns whether the module exists.
    fn add_module_exports(&mut self, path: &[String]) -> Result<bool, LinkError> {
        let module_path = ModulePath::new(path.iter().cloned());
        self.check_parsed(&module_path)?;
        let mut found = false;
        for generator in self.registry.generators_of(&module_path) {
            let mut export_path = path.to_vec();
            export_path.push(generator.name.clone());
            self.map.exports.insert(
                export_path,
                ExportTarget::Generator {
                    module: generator.module.clone(),
                    name: generator.name.clone(),
                },
            );
            found = true;
        }
        let Some(key) = self.registry.module_key(&module_path) else {
            return Ok(found);
        };
        for (decl_index, decl) in self.registry[key].exports() {
            let mut export_path = path.to_vec();
            export_path.push(decl.name.clone());
            self.map.exports.insert(
                export_path,
                ExportTarget::Decl {
                    module: key,
                    decl: decl_index,
                },
            );
        }
        Ok(true)
    }

    /// `#import foo` without a module: look in this module, then in the modules named by the
    /// other imports, and finally in the whole registry if only one module exports `foo`.
    fn search_bare(
        &mut self,
        name: &str,
        all_leaves: &[(Span, ImportLeaf)],
    ) -> Result<Option<Vec<String>>, LinkError> {
        let mut candidates = vec![self.module.path.clone()];
        for (_, leaf) in all_leaves {
            if let Some(absolute) = self.module.path.resolve_relative(&leaf.path) {
                if leaf.wildcard || absolute.len() > 1 {
                    let end = if leaf.wildcard {
                        absolute.len()
                    } else {
                        absolute.len() - 1
                    };
                    candidates.push(ModulePath::new(absolute[..end].iter().cloned()));
                }
            }
        }
        let exporters = self.registry.exporters(name);
        let module_path = candidates
            .into_iter()
            .find(|candidate| exporters.contains(candidate))
            .or_else(|| match exporters.as_slice() {
                [only] => Some(only.clone()),
                _ => None,
            });
        let Some(module_path) = module_path else {
            return Ok(None);
        };
        let mut path = module_path.0;
        path.push(name.to_string());
        self.add_item(&path)?;
        Ok(Some(path))
    }

    fn check_parsed(&self, path: &ModulePath) -> Result<(), LinkError> {
        match self.registry.parse_failure(path) {
            Some(error) => Err(LinkError::Parse {
                module: path.clone(),
                source: error.clone(),
            }),
            None => Ok(()),
        }
    }

    fn missing(&mut self, span: Span, path: &[String]) {
        let message = match path.split_last() {
            Some((name, module)) if !module.is_empty() => {
                let module = ModulePath::new(module.iter().cloned());
                if self.registry.module(&module).is_some() {
                    format!("module `{module}` has no export `{name}`")
                } else {
                    format!("module `{module}` not found, `{name}` stays unresolved")
                }
            }
            _ => format!("cannot find `{}` in any module", path.join("/")),
        };
        self.warn(span, message);
    }

    fn warn(&mut self, span: Span, message: String) {
        self.warnings.push(self.module.warning(span.start, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(path: &[&str]) -> Vec<String> {
        path.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn overlap() {
        assert_eq!(
            overlap_tail(&strings(&["a", "b"]), &strings(&["b", "c", "d"])),
            Some(&strings(&["c", "d"])[..])
        );
        assert_eq!(
            overlap_tail(&strings(&["a", "b"]), &strings(&["c", "d"])),
            None
        );
        assert_eq!(
            overlap_tail(&strings(&["a", "b"]), &strings(&["a", "b"])),
            Some(&[][..])
        );
    }
}
