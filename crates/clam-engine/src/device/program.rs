use std::borrow::Cow;
use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};

use crate::kernel::ENTRY_POINT;
use crate::preprocess::{parse_define_flags, preprocess};

/// Override constants the pipeline fills with the computed group size.
pub const LOCAL_SIZE_OVERRIDES: [&str; 2] = ["LOCAL_X", "LOCAL_Y"];

/// Launch info at `@group(0) @binding(1)`.
///
/// The kernel adds `offset` to its global invocation id; `global_size` is
/// the padded launch extent of the current tile.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct LaunchUniform {
    pub offset: [u32; 2],
    pub global_size: [u32; 2],
}

/// Layout shared by every kernel program.
///
/// binding 0: output texels, binding 1: [`LaunchUniform`],
/// binding 2: argument words.
pub(super) struct KernelLayout {
    pub bind_group_layout: wgpu::BindGroupLayout,
    pub pipeline_layout: wgpu::PipelineLayout,
}

impl KernelLayout {
    pub fn new(device: &wgpu::Device) -> Self {
        let storage = |binding, read_only| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("clam kernel bind group layout"),
            entries: &[
                storage(0, false),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(
                            std::mem::size_of::<LaunchUniform>() as u64,
                        ),
                    },
                    count: None,
                },
                storage(2, true),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("clam kernel pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        Self {
            bind_group_layout,
            pipeline_layout,
        }
    }
}

/// A validated kernel module and its entry point.
///
/// The compute pipeline depends on the group size, which is only known at
/// the first dispatch; it is created then and kept until the size changes.
pub struct GpuProgram {
    module: wgpu::ShaderModule,
    entry_point: String,
    pipeline: Option<([u32; 2], wgpu::ComputePipeline)>,
}

impl GpuProgram {
    pub(super) fn new(module: wgpu::ShaderModule, entry_point: &str) -> Self {
        Self {
            module,
            entry_point: entry_point.to_string(),
            pipeline: None,
        }
    }

    /// Pipeline specialized for `local`, created on first use.
    pub(super) fn pipeline(
        &mut self,
        device: &wgpu::Device,
        layout: &KernelLayout,
        local: [u32; 2],
    ) -> &wgpu::ComputePipeline {
        let Self { module, entry_point, pipeline } = self;
        if pipeline.as_ref().is_some_and(|(size, _)| *size != local) {
            *pipeline = None;
        }
        let (_, pipeline) = pipeline.get_or_insert_with(|| {
            log::debug!("creating pipeline for `{entry_point}` with group {local:?}");
            let constants = [
                (LOCAL_SIZE_OVERRIDES[0], f64::from(local[0])),
                (LOCAL_SIZE_OVERRIDES[1], f64::from(local[1])),
            ];
            let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("clam kernel pipeline"),
                layout: Some(&layout.pipeline_layout),
                module,
                entry_point: Some(entry_point.as_str()),
                compilation_options: wgpu::PipelineCompilationOptions {
                    constants: &constants,
                    zero_initialize_workgroup_memory: true,
                },
                cache: None,
            });
            (local, pipeline)
        });
        pipeline
    }
}

/// Runs preprocessing, parsing, validation and the interface check without
/// a device. Returns the warning log, or the full build log on failure.
pub fn check_kernel(sources: &[String], options: &str) -> Result<String, String> {
    validate_sources(sources, options, ENTRY_POINT).map(|v| v.log)
}

/// Preprocessed WGSL that passed validation and the interface check.
#[derive(Debug)]
pub(super) struct ValidatedSource {
    pub source: String,
    /// Non-fatal diagnostics; empty for a clean build.
    pub log: String,
}

/// Preprocesses, parses and validates `sources`; the error is the full
/// build log.
pub(super) fn validate_sources(
    sources: &[String],
    options: &str,
    entry_point: &str,
) -> Result<ValidatedSource, String> {
    let defines = parse_define_flags(options).map_err(|e| format!("invalid build options: {e}"))?;
    let pre = preprocess(sources, &defines).map_err(|e| format!("preprocessor: {e}"))?;

    let module = naga::front::wgsl::parse_str(&pre.source)
        .map_err(|e| e.emit_to_string(&pre.source))?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::default(),
    );
    validator
        .validate(&module)
        .map_err(|e| e.emit_to_string(&pre.source))?;

    check_interface(&module, entry_point)?;

    Ok(ValidatedSource {
        source: pre.source,
        log: pre.warnings.join("\n"),
    })
}

/// Checks that `module` matches the kernel ABI the backend binds.
fn check_interface(module: &naga::Module, entry_point: &str) -> Result<(), String> {
    let has_entry = module
        .entry_points
        .iter()
        .any(|ep| ep.name == entry_point && ep.stage == naga::ShaderStage::Compute);
    if !has_entry {
        return Err(format!("no compute entry point named `{entry_point}`"));
    }

    for name in LOCAL_SIZE_OVERRIDES {
        let declared = module
            .overrides
            .iter()
            .any(|(_, o)| o.name.as_deref() == Some(name));
        if !declared {
            return Err(format!(
                "missing `override {name}: u32;` for the work-group size"
            ));
        }
    }

    for (_, global) in module.global_variables.iter() {
        let Some(binding) = &global.binding else {
            continue;
        };
        let name = global.name.as_deref().unwrap_or("<unnamed>");
        if binding.group != 0 {
            return Err(format!("`{name}` uses group {}; kernels only get group 0", binding.group));
        }
        let expected = match (binding.binding, global.space) {
            (0, naga::AddressSpace::Storage { access }) => {
                access.contains(naga::StorageAccess::STORE)
            }
            (1, naga::AddressSpace::Uniform) => true,
            (2, naga::AddressSpace::Storage { access }) => {
                !access.contains(naga::StorageAccess::STORE)
            }
            _ => false,
        };
        if !expected {
            return Err(format!(
                "`{name}` at binding {} does not match the kernel layout \
                 (0: storage read_write, 1: uniform, 2: storage read)",
                binding.binding
            ));
        }
    }
    Ok(())
}

/// Creates the wgpu module for already validated source.
pub(super) fn create_module(device: &wgpu::Device, source: String) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("clam kernel"),
        source: wgpu::ShaderSource::Wgsl(Cow::Owned(source)),
    })
}
