//! Holds the sources of all shaders.

use std::collections::HashMap;

use rust_embed::RustEmbed;
use silhouette::{OutlineError, OutlineResult};

#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/shaders"]
struct SilhouetteShaderSources;

/// Shader sources by file name.
#[derive(Debug, Clone)]
pub struct ShaderLibrary {
    files: HashMap<String, String>,
}

impl ShaderLibrary {
    /// Library holding the builtin shaders.
    pub fn new() -> Self {
        let mut v = Self::empty();
        v.add_shaders_embed::<SilhouetteShaderSources>();
        v
    }

    pub fn empty() -> Self {
        Self { files: HashMap::new() }
    }

    pub fn add_shaders_embed<T: RustEmbed>(&mut self) {
        for file in T::iter() {
            let Some(embedded) = T::get(&file) else {
                continue;
            };
            match String::from_utf8(embedded.data.into_owned()) {
                Ok(contents) => {
                    self.files.insert(file.into_owned(), contents);
                }
                Err(_) => log::warn!("Shader {file} is not valid utf-8, skipping"),
            }
        }
    }

    /// Add or replace a shader.
    pub fn add_shader(&mut self, name: &str, contents: &str) {
        self.files.insert(name.to_owned(), contents.to_owned());
    }

    pub fn remove_shader(&mut self, name: &str) -> Option<String> {
        self.files.remove(name)
    }

    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Source of a shader, failing with `MissingAsset` when it is absent.
    pub fn get(&self, name: &str) -> OutlineResult<&str> {
        self.files
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| OutlineError::MissingAsset { name: name.to_owned() })
    }
}

impl Default for ShaderLibrary {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use silhouette::{OUTLINE_BUFFER_SHADER, OUTLINE_COMPOSITE_SHADER};

    use super::*;

    fn validate(name: &str, source: &str) {
        let module = match naga::front::wgsl::parse_str(source) {
            Ok(module) => module,
            Err(e) => panic!("{name} failed to parse:\n{}", e.emit_to_string(source)),
        };
        let mut validator =
            naga::valid::Validator::new(naga::valid::ValidationFlags::all(), naga::valid::Capabilities::empty());
        if let Err(e) = validator.validate(&module) {
            panic!("{name} failed validation: {e:?}");
        }
    }

    #[test]
    fn builtin_shaders_validate() {
        let library = ShaderLibrary::new();
        for name in [OUTLINE_BUFFER_SHADER, OUTLINE_COMPOSITE_SHADER] {
            validate(name, library.get(name).unwrap());
        }
    }

    #[test]
    fn missing_shader_is_an_error() {
        let mut library = ShaderLibrary::new();
        library.remove_shader(OUTLINE_COMPOSITE_SHADER);
        assert!(matches!(
            library.get(OUTLINE_COMPOSITE_SHADER),
            Err(OutlineError::MissingAsset { .. })
        ));
    }
}
