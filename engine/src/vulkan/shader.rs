use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use vulkanalia::bytecode::Bytecode;
use vulkanalia::vk::{self, DeviceV1_0, HasBuilder};
use vulkanalia::Device;

use crate::error::SampleError;

/// Loads compiled SPIR-V by the name of its GLSL source.
///
/// `color_write_enable/composition.frag` resolves to
/// `<shader_dir>/color_write_enable/composition.frag.spv`.
#[derive(Clone, Debug)]
pub struct ShaderLoader {
    dir: PathBuf,
}

impl ShaderLoader {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        let mut file = self.dir.join(name).into_os_string();
        file.push(".spv");
        PathBuf::from(file)
    }

    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path(name);
        std::fs::read(&path).map_err(|e| anyhow!("Failed to read shader {}: {}", path.display(), e))
    }

    pub unsafe fn load(&self, device: &Device, name: &str) -> Result<vk::ShaderModule> {
        let bytes = self.read(name)?;
        create_shader_module(device, Path::new(name), &bytes)
    }
}

unsafe fn create_shader_module(
    device: &Device,
    name: &Path,
    bytecode: &[u8],
) -> Result<vk::ShaderModule> {
    let bytecode = Bytecode::new(bytecode)
        .map_err(|e| anyhow!("Invalid SPIR-V in {}: {:?}", name.display(), e))?;
    let info = vk::ShaderModuleCreateInfo::builder()
        .code_size(bytecode.code_size())
        .code(bytecode.code());

    Ok(device
        .create_shader_module(&info, None)
        .map_err(SampleError::driver("create shader module"))?)
}
