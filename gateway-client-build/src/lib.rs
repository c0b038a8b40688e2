//! Build-script code generation for REST gateway clients.
//!
//! Message types come from `prost-build`, their serde implementations from
//! `pbjson-build`. For every service with `google.api.http` annotated methods
//! a `{service}_gateway_client` module is appended to the package file:
//!
//! ```rust,ignore
//! pub mod item_service_gateway_client {
//!     pub struct ItemServiceGatewayClient { /* .. */ }
//!
//!     impl ItemServiceGatewayClient {
//!         pub fn new(client: gateway_client::GatewayClient) -> Self;
//!         pub async fn get_item(
//!             &self,
//!             ctx: &gateway_client::CallContext,
//!             req: &super::GetItemRequest,
//!         ) -> Result<super::Item, gateway_client::GatewayError>;
//!     }
//! }
//! ```
//!
//! Each method binds request fields to the path template, the query string
//! and the body as its HTTP rule directs. Methods without a rule, with a
//! `custom` rule or with client streaming are skipped.
//!
//! The include directory must provide `google/api/annotations.proto` and
//! `google/api/http.proto`.

use std::io::Result;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use r#gen::GatewayServiceGenerator;
use index::ProtoIndex;

mod descriptor;
mod r#gen;
mod include_file;
mod index;
mod rule;

/// Marker indicating a feature is enabled.
pub struct Enabled;

/// Marker indicating a feature is disabled.
pub struct Disabled;

/// Trait to convert type markers to runtime booleans.
pub trait BuildMarker {
    const VALUE: bool;
}

impl BuildMarker for Enabled {
    const VALUE: bool = true;
}

impl BuildMarker for Disabled {
    const VALUE: bool = false;
}

/// Builder for compiling proto files.
///
/// `Clients` controls whether gateway clients are generated; the default
/// state generates them.
pub struct CompileBuilder<Clients = Enabled> {
    includes_dir: PathBuf,
    prost_config: Option<Box<dyn FnOnce(&mut prost_build::Config)>>,
    extern_paths: Vec<(String, String)>,
    include_file: Option<String>,
    _marker: PhantomData<Clients>,
}

impl CompileBuilder<Enabled> {
    /// Skip generating gateway clients.
    ///
    /// Only message types and their serde implementations are generated.
    pub fn no_clients(self) -> CompileBuilder<Disabled> {
        CompileBuilder {
            includes_dir: self.includes_dir,
            prost_config: self.prost_config,
            extern_paths: self.extern_paths,
            include_file: self.include_file,
            _marker: PhantomData,
        }
    }
}

impl<C> CompileBuilder<C> {
    /// Fetch and configure the protoc compiler.
    ///
    /// Downloads the specified version of protoc and sets the `PROTOC`
    /// environment variable so that prost-build uses the downloaded binary.
    ///
    /// * `version` - protoc version, "31.1" if `None`
    /// * `path` - download directory, `OUT_DIR` if `None`
    #[cfg(feature = "fetch-protoc")]
    pub fn fetch_protoc(self, version: Option<&str>, path: Option<&Path>) -> Result<Self> {
        let version = version.unwrap_or("31.1");
        let out_dir = match path {
            Some(p) => p.to_path_buf(),
            None => PathBuf::from(out_dir()?),
        };

        let protoc_path = protoc_fetcher::protoc(version, &out_dir)
            .map_err(|e| std::io::Error::other(format!("failed to fetch protoc: {e}")))?;

        // SAFETY: build scripts run single-threaded before compilation.
        unsafe {
            std::env::set_var("PROTOC", protoc_path);
        }

        Ok(self)
    }

    /// Customize the prost builder with a configuration closure.
    ///
    /// Applied before the internal configuration (descriptor set path,
    /// service generator), which takes precedence.
    ///
    /// Extern paths set here are not visible to the client generator; use
    /// [`extern_path`](Self::extern_path) for types that appear in request
    /// or response messages.
    pub fn with_prost_config<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut prost_build::Config) + 'static,
    {
        self.prost_config = Some(Box::new(f));
        self
    }

    /// Map a proto path to an existing Rust path, for prost, pbjson and the
    /// client generator alike.
    ///
    /// ```rust,ignore
    /// gateway_client_build::compile_dir("proto")
    ///     .extern_path(".google.protobuf", "::pbjson_types")
    ///     .compile()?;
    /// ```
    pub fn extern_path(mut self, proto_path: impl Into<String>, rust_path: impl Into<String>) -> Self {
        self.extern_paths.push((proto_path.into(), rust_path.into()));
        self
    }

    /// Also write `name` into `OUT_DIR`: a module tree that includes every
    /// generated package file, nested by package.
    ///
    /// ```rust,ignore
    /// include!(concat!(env!("OUT_DIR"), "/gateway.rs"));
    /// ```
    pub fn include_file(mut self, name: impl Into<String>) -> Self {
        self.include_file = Some(name.into());
        self
    }
}

impl<C: BuildMarker> CompileBuilder<C> {
    /// Execute code generation.
    pub fn compile(self) -> Result<()> {
        let generate_clients = C::VALUE;
        let out_dir = out_dir()?;
        let descriptor_path = format!("{out_dir}/descriptor.bin");

        let mut config = prost_build::Config::default();
        if let Some(config_fn) = self.prost_config {
            config_fn(&mut config);
        }
        for (proto, rust) in &self.extern_paths {
            config.extern_path(proto, rust);
        }
        config.file_descriptor_set_path(&descriptor_path);

        let mut proto_files = Vec::new();
        discover_proto_files(&self.includes_dir, &mut proto_files)?;
        if proto_files.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!(
                    "No .proto files found in directory: {}",
                    self.includes_dir.display()
                ),
            ));
        }

        // protoc writes the descriptor set with options intact; prost's own
        // decoding drops the http extension, so the bytes are decoded again.
        let fds = config.load_fds(&proto_files, &[&self.includes_dir])?;
        let descriptor_bytes = std::fs::read(&descriptor_path)
            .map_err(|e| std::io::Error::other(format!("read descriptor: {e}")))?;
        let descriptors = descriptor::decode(&descriptor_bytes)
            .map_err(|e| std::io::Error::other(format!("decode descriptor: {e}")))?;
        let packages: Vec<String> = descriptors
            .file
            .iter()
            .filter_map(|f| f.package.as_ref().map(|p| format!(".{p}")))
            .collect();

        if generate_clients {
            let index = ProtoIndex::new(descriptors, self.extern_paths.clone());
            config.service_generator(Box::new(GatewayServiceGenerator::new(index)));
        }
        config.compile_fds(fds)?;

        append_serde_impls(&out_dir, &descriptor_bytes, &self.extern_paths)?;

        if let Some(include_file) = &self.include_file {
            let reexports: Vec<(String, String)> = self
                .extern_paths
                .iter()
                .filter(|(proto, _)| packages.contains(proto))
                .cloned()
                .collect();
            include_file::generate(include_file, Path::new(&out_dir), &reexports)?;
        }

        let _ = std::fs::remove_file(&descriptor_path);
        Ok(())
    }
}

fn out_dir() -> Result<String> {
    std::env::var("OUT_DIR").map_err(|e| std::io::Error::other(format!("OUT_DIR not set: {e}")))
}

/// Run pbjson-build and append each `{package}.serde.rs` to `{package}.rs`.
fn append_serde_impls(
    out_dir: &str,
    descriptor_bytes: &[u8],
    extern_paths: &[(String, String)],
) -> Result<()> {
    let mut builder = pbjson_build::Builder::new();
    builder
        .register_descriptors(descriptor_bytes)
        .map_err(|e| std::io::Error::other(format!("register descriptors: {e}")))?;
    for (proto, rust) in extern_paths {
        builder.extern_path(proto, rust);
    }
    builder
        .build(&["."])
        .map_err(|e| std::io::Error::other(format!("pbjson build: {e}")))?;

    for entry in std::fs::read_dir(out_dir)? {
        let path = entry?.path();
        let Some(package) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(".serde.rs"))
        else {
            continue;
        };

        let main_file = Path::new(out_dir).join(format!("{package}.rs"));
        if !main_file.exists() {
            continue;
        }
        let mut content = std::fs::read_to_string(&main_file)?;
        content.push_str("\n// --- pbjson serde implementations ---\n");
        content.push_str(&std::fs::read_to_string(&path)?);
        std::fs::write(&main_file, content)?;
        let _ = std::fs::remove_file(&path);
    }
    Ok(())
}

/// Auto-discover all `.proto` files under `includes_dir` and compile them.
///
/// ```rust,no_run
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     gateway_client_build::compile_dir("proto").compile()?;
///     Ok(())
/// }
/// ```
///
/// With custom configuration:
/// ```rust,no_run
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     gateway_client_build::compile_dir("proto")
///         .with_prost_config(|config| {
///             config.type_attribute(".", "#[derive(Eq)]");
///         })
///         .include_file("gateway.rs")
///         .compile()?;
///     Ok(())
/// }
/// ```
pub fn compile_dir(includes_dir: impl AsRef<Path>) -> CompileBuilder {
    CompileBuilder {
        includes_dir: includes_dir.as_ref().to_path_buf(),
        prost_config: None,
        extern_paths: Vec::new(),
        include_file: None,
        _marker: PhantomData,
    }
}

fn discover_proto_files(dir: &Path, proto_files: &mut Vec<PathBuf>) -> Result<()> {
    if !dir.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Directory not found: {}", dir.display()),
        ));
    }

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("proto") {
            proto_files.push(path);
        } else if path.is_dir() {
            discover_proto_files(&path, proto_files)?;
        }
    }
    proto_files.sort();

    Ok(())
}
