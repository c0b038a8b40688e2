//! Module tree for the generated package files.
//!
//! Generated clients reach types in other packages through `super::`
//! paths, so the package files must be included into modules nested the
//! way the proto packages are.

use std::collections::BTreeMap;
use std::io::Result;
use std::path::Path;

#[derive(Default)]
struct PackageModule {
    /// File stem to `include!`, e.g. `items.v1`.
    file: Option<String>,
    /// `pub use` target for an extern package.
    reexport: Option<String>,
    children: BTreeMap<String, PackageModule>,
}

impl PackageModule {
    fn entry(&mut self, package: &str) -> &mut PackageModule {
        package
            .split('.')
            .fold(self, |node, segment| node.children.entry(segment.to_string()).or_default())
    }

    fn render(&self, out: &mut String, depth: usize) {
        let indent = "    ".repeat(depth);
        for (name, child) in &self.children {
            out.push_str(&format!("{indent}pub mod {name} {{\n"));
            if let Some(reexport) = &child.reexport {
                out.push_str(&format!("{indent}    pub use {reexport}::*;\n"));
            }
            if let Some(file) = &child.file {
                out.push_str(&format!(
                    "{indent}    include!(concat!(env!(\"OUT_DIR\"), \"/{file}.rs\"));\n"
                ));
            }
            child.render(out, depth + 1);
            out.push_str(&format!("{indent}}}\n"));
        }
    }
}

/// Write `include_file_name` into `out_dir`, nesting every generated
/// `{package}.rs` by package segment.
///
/// `reexports` are `(package, rust path)` pairs for packages provided by
/// other crates, e.g. `("google.protobuf", "::pbjson_types")`.
pub(crate) fn generate(
    include_file_name: &str,
    out_dir: &Path,
    reexports: &[(String, String)],
) -> Result<()> {
    let mut root = PackageModule::default();

    for entry in std::fs::read_dir(out_dir)? {
        let path = entry?.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(stem) = file_name.strip_suffix(".rs") else {
            continue;
        };
        // `_.rs` holds packageless definitions
        if file_name == include_file_name || stem.ends_with(".serde") || stem == "_" {
            continue;
        }
        root.entry(stem).file = Some(stem.to_string());
    }

    for (package, rust_path) in reexports {
        root.entry(package.trim_start_matches('.')).reexport = Some(rust_path.clone());
    }

    let mut out = String::from("// @generated by gateway-client-build\n");
    root.render(&mut out, 0);
    std::fs::write(out_dir.join(include_file_name), out)
}
