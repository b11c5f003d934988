//! Shift-and-insert on the GPU.
//!
//! The input column lives in an `H x 1` texture (horizontal, so the CPU writes it as one
//! contiguous row). A fullscreen pass over the `W x H` target copies `previous(x - 1, y)` into
//! every column but the first, which takes `column(y)`. The result is read back into the
//! caller's image.

use wgpu;

use super::gpu::GpuContext;
use super::image::{InputColumn, SpectrogramImage};
use super::sweep::{check_shapes, SweepComposer};
use crate::error::{Result, SweepError};

// Unorm, not sRGB: intensities must survive the round trip bit-exact.
pub const SWEEP_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const SWEEP_SHADER: &str = r#"
@group(0) @binding(0) var previous_tex: texture_2d<f32>;
@group(0) @binding(1) var column_tex: texture_2d<f32>;

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> @builtin(position) vec4<f32> {
    let x = f32(i32(vertex_index) / 2) * 4.0 - 1.0;
    let y = f32(i32(vertex_index) % 2) * 4.0 - 1.0;
    return vec4<f32>(x, y, 0.0, 1.0);
}

@fragment
fn fs_main(@builtin(position) frag: vec4<f32>) -> @location(0) vec4<f32> {
    let x = i32(frag.x);
    let y = i32(frag.y);
    if x == 0 {
        return textureLoad(column_tex, vec2<i32>(y, 0), 0);
    }
    return textureLoad(previous_tex, vec2<i32>(x - 1, y), 0);
}
"#;

struct ColumnTexture {
    height: u32,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

struct SweepTargets {
    width: u32,
    height: u32,
    previous: wgpu::Texture,
    previous_view: wgpu::TextureView,
    next: wgpu::Texture,
    next_view: wgpu::TextureView,
    readback: wgpu::Buffer,
    padded_bytes_per_row: u32,
    unpadded_bytes_per_row: u32,
}

pub struct GpuSweep {
    gpu: GpuContext,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    column: Option<ColumnTexture>,
    targets: Option<SweepTargets>,
}

impl GpuSweep {
    pub fn new(gpu: GpuContext) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("sweep_shader"),
            source: wgpu::ShaderSource::Wgsl(SWEEP_SHADER.into()),
        });

        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sweep_bind_group_layout"),
            entries: &[
                // @binding(0): previous sweep
                texture_entry(0),
                // @binding(1): input column strip
                texture_entry(1),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sweep_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("sweep_render_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: SWEEP_FORMAT,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            gpu,
            pipeline,
            bind_group_layout,
            column: None,
            targets: None,
        }
    }

    fn check_side(&self, what: &str, side: usize) -> Result<u32> {
        let max = self.gpu.max_texture_side();
        if side > max {
            return Err(SweepError::config(format!(
                "{} of {} exceeds the device texture limit of {}",
                what, side, max
            )));
        }
        Ok(side as u32)
    }
}

fn create_texture(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
    usage: wgpu::TextureUsages,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: SWEEP_FORMAT,
        usage,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

fn create_targets(device: &wgpu::Device, width: u32, height: u32) -> SweepTargets {
    log::debug!("Allocating GPU sweep targets {}x{}", width, height);

    let (previous, previous_view) = create_texture(
        device,
        "sweep_previous",
        width,
        height,
        wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
    );
    let (next, next_view) = create_texture(
        device,
        "sweep_next",
        width,
        height,
        wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
    );

    let unpadded_bytes_per_row = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

    let readback = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("sweep_readback"),
        size: (padded_bytes_per_row * height) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    SweepTargets {
        width,
        height,
        previous,
        previous_view,
        next,
        next_view,
        readback,
        padded_bytes_per_row,
        unpadded_bytes_per_row,
    }
}

fn write_rows(queue: &wgpu::Queue, texture: &wgpu::Texture, width: u32, height: u32, data: &[u8]) {
    queue.write_texture(
        texture.as_image_copy(),
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * 4),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
}

impl SweepComposer for GpuSweep {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn upload_column(&mut self, column: &InputColumn) -> Result<()> {
        if column.height() == 0 {
            return Ok(());
        }
        let height = self.check_side("column height", column.height())?;

        if self.column.as_ref().map(|c| c.height) != Some(height) {
            log::debug!("Allocating GPU column strip for {} bins", height);
            let (texture, view) = create_texture(
                &self.gpu.device,
                "sweep_column",
                height,
                1,
                wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            );
            self.column = Some(ColumnTexture {
                height,
                texture,
                view,
            });
        }

        if let Some(strip) = &self.column {
            write_rows(&self.gpu.queue, &strip.texture, height, 1, column.as_bytes());
        }
        Ok(())
    }

    fn compose(
        &mut self,
        previous: &SpectrogramImage,
        column: &InputColumn,
        next: &mut SpectrogramImage,
    ) -> Result<()> {
        check_shapes(previous, column, next)?;
        if previous.width() == 0 || previous.height() == 0 {
            return Ok(());
        }

        let width = self.check_side("sweep width", previous.width())?;
        let height = self.check_side("bin count", previous.height())?;

        if self.column.as_ref().map(|c| c.height) != Some(height) {
            self.upload_column(column)?;
        }
        if self
            .targets
            .as_ref()
            .map_or(true, |t| (t.width, t.height) != (width, height))
        {
            self.targets = Some(create_targets(&self.gpu.device, width, height));
        }

        let (Some(strip), Some(targets)) = (&self.column, &self.targets) else {
            return Err(SweepError::InvalidState("GPU sweep targets missing"));
        };
        let gpu = &self.gpu;

        write_rows(&gpu.queue, &targets.previous, width, height, previous.as_bytes());

        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sweep_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&targets.previous_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&strip.view),
                },
            ],
        });

        let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("sweep_encoder"),
        });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("sweep_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &targets.next_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, &bind_group, &[]);
            render_pass.draw(0..3, 0..1); // fullscreen triangle
        }

        encoder.copy_texture_to_buffer(
            targets.next.as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &targets.readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(targets.padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        gpu.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = targets.readback.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        gpu.device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|e| SweepError::Backend(format!("readback channel closed: {}", e)))?
            .map_err(|e| SweepError::Backend(format!("readback mapping failed: {}", e)))?;

        {
            let data = buffer_slice.get_mapped_range();
            let padded = targets.padded_bytes_per_row as usize;
            let unpadded = targets.unpadded_bytes_per_row as usize;

            // Strip row padding
            for (row, dst) in next.as_bytes_mut().chunks_exact_mut(unpadded).enumerate() {
                let start = row * padded;
                dst.copy_from_slice(&data[start..start + unpadded]);
            }
        }
        targets.readback.unmap();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::sweep::CpuSweep;

    #[test]
    #[ignore = "needs a GPU adapter"]
    fn matches_cpu_sweep() {
        let gpu = GpuContext::new().unwrap();
        let mut gpu_sweep = GpuSweep::new(gpu);
        let mut cpu_sweep = CpuSweep;

        let (width, height) = (5, 7);
        let mut gpu_image = SpectrogramImage::new(width, height);
        let mut cpu_image = SpectrogramImage::new(width, height);
        let mut scratch = SpectrogramImage::new(width, height);

        for tick in 0..8u8 {
            let column = InputColumn::from_pixels(
                (0..height)
                    .map(|bin| {
                        let level = tick.wrapping_mul(31).wrapping_add(bin as u8 * 9);
                        [level, level, level, 255]
                    })
                    .collect(),
            );

            gpu_sweep.upload_column(&column).unwrap();
            gpu_sweep.compose(&gpu_image, &column, &mut scratch).unwrap();
            gpu_image.copy_from(&scratch);

            cpu_sweep.compose(&cpu_image, &column, &mut scratch).unwrap();
            cpu_image.copy_from(&scratch);

            assert_eq!(gpu_image, cpu_image, "tick {}", tick);
        }
    }
}
