//! Write and accumulation textures, always sized to the viewport.

/// Format of both targets. Float so accumulation keeps precision and stays blendable.
pub const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// A texture and its default view.
pub struct Target {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl Target {
    fn new(
        device: &wgpu::Device,
        label: &str,
        size: (u32, u32),
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.0,
                height: size.1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

/// Kernel output (`write`) and the running result (`accumulation`).
#[derive(Default)]
pub struct RenderTargets {
    targets: Option<(Target, Target)>,
    size: (u32, u32),
}

impl RenderTargets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure both targets exist at `width` x `height`.
    ///
    /// Returns `true` if they were (re)allocated, in which case previous
    /// accumulation is gone.
    pub fn ensure(&mut self, device: &wgpu::Device, width: u32, height: u32) -> bool {
        let size = (width.max(1), height.max(1));
        if !needs_realloc(self.targets.is_some(), self.size, size) {
            return false;
        }

        if let Some((write, accumulation)) = self.targets.take() {
            write.texture.destroy();
            accumulation.texture.destroy();
        }

        let write = Target::new(
            device,
            "write_target",
            size,
            wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
        );
        let accumulation = Target::new(
            device,
            "accumulation_target",
            size,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        );

        log::debug!("Allocated render targets {}x{}", size.0, size.1);
        self.targets = Some((write, accumulation));
        self.size = size;
        true
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn write(&self) -> Option<&Target> {
        self.targets.as_ref().map(|(write, _)| write)
    }

    pub fn accumulation(&self) -> Option<&Target> {
        self.targets.as_ref().map(|(_, accumulation)| accumulation)
    }
}

fn needs_realloc(allocated: bool, current: (u32, u32), requested: (u32, u32)) -> bool {
    !allocated || current != requested
}
