//! Type declarations discovered in Rust source trees.
//!
//! A source root is a directory of `.rs` files. The module path of a file
//! follows the file layout: `lib.rs`, `main.rs` and `mod.rs` belong to the
//! module of their directory, `billing/invoice.rs` is `billing.invoice`.
//! Inline `mod` blocks nest further. Only `struct`, `enum`, `union` and
//! `type` items count as declarations.

use std::{
    collections::HashMap,
    fmt, fs, io,
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::ident::TypeRef;

/// Where a declaration's name appears. Line and column are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    Struct,
    Enum,
    Union,
    Alias,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub kind: DeclarationKind,
    pub location: SourceLocation,
    /// `///` doc comment lines, leading space trimmed.
    pub doc: Vec<String>,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source root {} is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: syn::Error,
    },
}

/// Outcome of looking up a [`TypeRef`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'a> {
    Found(&'a Declaration),
    Missing,
    Ambiguous(usize),
}

/// Declarations indexed by module path and type name.
#[derive(Debug, Clone, Default)]
pub struct SourceTree {
    modules: HashMap<Vec<String>, HashMap<String, Vec<Declaration>>>,
}

impl SourceTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every root into a fresh tree.
    ///
    /// # Errors
    ///
    /// Fails on the first unreadable directory, unreadable file or file
    /// that does not parse as Rust.
    pub fn load<P: AsRef<Path>>(roots: impl IntoIterator<Item = P>) -> Result<Self, SourceError> {
        let mut tree = Self::new();
        for root in roots {
            tree.load_root(root.as_ref())?;
        }
        Ok(tree)
    }

    /// Walks `root` in sorted order, skipping hidden directories and `target`.
    /// Symbolic links to directories are not followed.
    ///
    /// # Errors
    ///
    /// See [`SourceTree::load`].
    #[tracing::instrument(skip_all, fields(root = %root.display()))]
    pub fn load_root(&mut self, root: &Path) -> Result<(), SourceError> {
        if !root.is_dir() {
            return Err(SourceError::NotADirectory(root.to_path_buf()));
        }
        let before = self.len();
        self.walk(root, Path::new(""))?;
        tracing::debug!(declarations = self.len() - before, "loaded source root");
        Ok(())
    }

    fn walk(&mut self, root: &Path, relative: &Path) -> Result<(), SourceError> {
        let dir = root.join(relative);
        let io_error = |source| SourceError::Io {
            path: dir.clone(),
            source,
        };
        let mut entries = fs::read_dir(&dir)
            .map_err(io_error)?
            .map(|entry| entry.and_then(|e| Ok((e.path(), e.file_type()?))))
            .collect::<Result<Vec<_>, _>>()
            .map_err(io_error)?;
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));

        for (path, file_type) in entries {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let child = relative.join(name);
            // not followed through symlinks
            if file_type.is_dir() {
                if !name.starts_with('.') && name != "target" {
                    self.walk(root, &child)?;
                }
            } else if path.extension().is_some_and(|ext| ext == "rs") {
                let content = fs::read_to_string(&path).map_err(|source| SourceError::Io {
                    path: path.clone(),
                    source,
                })?;
                self.add_file(&path, &child, &content)?;
            }
        }
        Ok(())
    }

    /// Adds an in-memory source file. `path` is relative to the source root
    /// and determines the module path.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Parse`] if `content` is not valid Rust.
    pub fn add_source(
        &mut self,
        path: impl AsRef<Path>,
        content: &str,
    ) -> Result<(), SourceError> {
        let path = path.as_ref();
        self.add_file(path, path, content)
    }

    fn add_file(&mut self, file: &Path, relative: &Path, content: &str) -> Result<(), SourceError> {
        let parsed = syn::parse_file(content).map_err(|source| SourceError::Parse {
            path: file.to_path_buf(),
            source,
        })?;
        self.collect(&parsed.items, module_path(relative), file);
        Ok(())
    }

    fn collect(&mut self, items: &[syn::Item], module: Vec<String>, file: &Path) {
        for item in items {
            let (kind, ident, attrs) = match item {
                syn::Item::Struct(i) => (DeclarationKind::Struct, &i.ident, &i.attrs),
                syn::Item::Enum(i) => (DeclarationKind::Enum, &i.ident, &i.attrs),
                syn::Item::Union(i) => (DeclarationKind::Union, &i.ident, &i.attrs),
                syn::Item::Type(i) => (DeclarationKind::Alias, &i.ident, &i.attrs),
                syn::Item::Mod(m) => {
                    if let Some((_, nested)) = &m.content {
                        let mut inner = module.clone();
                        inner.push(m.ident.to_string());
                        self.collect(nested, inner, file);
                    }
                    continue;
                }
                _ => continue,
            };
            let start = ident.span().start();
            let declaration = Declaration {
                kind,
                location: SourceLocation {
                    file: file.to_path_buf(),
                    line: start.line,
                    column: start.column + 1,
                },
                doc: doc_lines(attrs),
            };
            tracing::trace!(name = %ident, module = ?module, "found declaration");
            self.modules
                .entry(module.clone())
                .or_default()
                .entry(ident.to_string())
                .or_default()
                .push(declaration);
        }
    }

    #[must_use]
    pub fn resolve(&self, reference: &TypeRef) -> Resolution<'_> {
        let found = self
            .modules
            .get(reference.modules())
            .and_then(|types| types.get(reference.name()));
        match found.map(Vec::as_slice) {
            None | Some([]) => Resolution::Missing,
            Some([declaration]) => Resolution::Found(declaration),
            Some(many) => Resolution::Ambiguous(many.len()),
        }
    }

    /// Number of declarations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules
            .values()
            .flat_map(HashMap::values)
            .map(Vec::len)
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Merges the declarations of `other` into `self`.
    pub fn extend(&mut self, other: Self) {
        for (module, types) in other.modules {
            let target = self.modules.entry(module).or_default();
            for (name, declarations) in types {
                target.entry(name).or_default().extend(declarations);
            }
        }
    }
}

fn module_path(relative: &Path) -> Vec<String> {
    let mut segments: Vec<String> = relative
        .parent()
        .into_iter()
        .flat_map(Path::components)
        .filter_map(|c| c.as_os_str().to_str().map(str::to_owned))
        .collect();
    match relative.file_stem().and_then(|s| s.to_str()) {
        Some("lib" | "main" | "mod") | None => {}
        Some(stem) => segments.push(stem.to_owned()),
    }
    segments
}

fn doc_lines(attrs: &[syn::Attribute]) -> Vec<String> {
    attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            syn::Meta::NameValue(syn::MetaNameValue {
                value:
                    syn::Expr::Lit(syn::ExprLit {
                        lit: syn::Lit::Str(text),
                        ..
                    }),
                ..
            }) => Some(text.value()),
            _ => None,
        })
        .flat_map(|text| {
            text.lines()
                .map(|line| line.strip_prefix(' ').unwrap_or(line).trim_end().to_owned())
                .collect::<Vec<_>>()
        })
        .collect()
}
