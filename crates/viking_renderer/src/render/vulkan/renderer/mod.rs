//! High-level Vulkan renderer
//!
//! Brings up the device, swapchain, pipeline and scene resources for one
//! textured model, then drives [`FrameLoop`] with a [`FrameOps`]
//! implementation that talks to the GPU.

pub mod frame_loop;
pub mod resources;

use ash::vk;

pub use frame_loop::{AcquireOutcome, FrameLoop, FrameOps, FrameOutcome, PresentStatus};
pub use resources::SceneResources;

use super::commands::{CommandPool, CommandRecorder};
use super::context::{VulkanContext, VulkanError, VulkanResult};
use super::descriptor_set::{model_layout_builder, DescriptorSetLayout};
use super::render_pass::RenderPass;
use super::shader::{GraphicsPipeline, ShaderModule};
use super::swapchain::Swapchain;
use super::sync::FrameSync;
use super::window::Window;
use crate::assets::{ObjLoader, TextureImage};
use crate::core::{ApplicationConfig, AssetConfig, CameraPreset};
use crate::foundation::time::AnimationClock;
use crate::render::mesh::Mesh;
use crate::render::ubo::UniformBufferObject;

const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Everything the frame steps touch. Fields drop top to bottom, so the
/// context goes last.
struct RendererState {
    frame_sync: Vec<FrameSync>,
    command_recorders: Vec<CommandRecorder>,
    _command_pool: CommandPool,
    resources: SceneResources,
    pipeline: GraphicsPipeline,
    _descriptor_set_layout: DescriptorSetLayout,
    swapchain: Swapchain,
    render_pass: RenderPass,
    clock: AnimationClock,
    camera: CameraPreset,
    context: VulkanContext,
}

/// Vulkan renderer for a single textured model
pub struct VulkanRenderer {
    frames: FrameLoop,
    state: RendererState,
}

impl VulkanRenderer {
    /// Initialize all GPU state for `window`
    pub fn new(window: &mut Window, config: &ApplicationConfig) -> VulkanResult<Self> {
        let renderer_config = &config.renderer;
        let frames_in_flight = renderer_config.max_frames_in_flight;

        log::debug!("Creating Vulkan context...");
        let context = VulkanContext::new(window, renderer_config)?;
        let device = context.raw_device();

        let mut swapchain = Swapchain::new(&context, window.framebuffer_size())?;

        let render_pass =
            RenderPass::new_forward_pass(device.clone(), swapchain.format().format, context.depth_format())?;
        swapchain.create_framebuffers(render_pass.handle())?;

        let descriptor_set_layout = model_layout_builder().build(&device)?;

        log::debug!("Loading shaders...");
        let vertex_shader = ShaderModule::from_file(device.clone(), &renderer_config.shaders.vertex_shader_path)?;
        let fragment_shader = ShaderModule::from_file(device.clone(), &renderer_config.shaders.fragment_shader_path)?;
        let pipeline = GraphicsPipeline::new(
            device.clone(),
            render_pass.handle(),
            &vertex_shader,
            &fragment_shader,
            descriptor_set_layout.handle(),
        )?;

        let command_pool = CommandPool::new(device.clone(), context.queue_families().graphics)?;
        let command_recorders = command_pool
            .allocate_command_buffers(frames_in_flight as u32)?
            .into_iter()
            .map(|command_buffer| CommandRecorder::new(command_buffer, device.clone()))
            .collect();

        let mesh = load_mesh(&config.assets)?;
        let texture_image = TextureImage::from_file(&config.assets.texture_path)?;
        let resources = SceneResources::new(
            &context,
            &mesh,
            &texture_image,
            &descriptor_set_layout,
            frames_in_flight,
        )?;

        let frame_sync = FrameSync::create_for_frames(&device, frames_in_flight)?;

        log::debug!("Vulkan renderer initialization complete");

        Ok(Self {
            frames: FrameLoop::new(frames_in_flight),
            state: RendererState {
                frame_sync,
                command_recorders,
                _command_pool: command_pool,
                resources,
                pipeline,
                _descriptor_set_layout: descriptor_set_layout,
                swapchain,
                render_pass,
                clock: AnimationClock::start_now(),
                camera: config.assets.camera(),
                context,
            },
        })
    }

    /// Render and present one frame
    pub fn draw_frame(&mut self, window: &mut Window) -> VulkanResult<FrameOutcome> {
        let mut driver = FrameDriver {
            state: &mut self.state,
            window,
        };
        self.frames.draw_frame(&mut driver)
    }

    /// Current swapchain extent
    pub fn swapchain_extent(&self) -> (u32, u32) {
        self.state.swapchain_extent()
    }

    /// Block until the GPU has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        self.state.context.wait_idle()
    }
}

impl Drop for VulkanRenderer {
    fn drop(&mut self) {
        log::debug!("Cleaning up Vulkan renderer...");
        if let Err(e) = self.wait_idle() {
            log::warn!("wait_idle failed during shutdown: {}", e);
        }
    }
}

/// The configured OBJ model, or the built-in quads when none is configured
fn load_mesh(assets: &AssetConfig) -> VulkanResult<Mesh> {
    match &assets.model_path {
        Some(path) => Ok(ObjLoader::load_obj(path)?),
        None => {
            let mesh = Mesh::layered_quads();
            log::info!(
                "Using built-in quad mesh: {} vertices, {} indices",
                mesh.vertices.len(),
                mesh.indices.len()
            );
            Ok(mesh)
        }
    }
}

/// Binds the renderer state to the window for one frame
struct FrameDriver<'a> {
    state: &'a mut RendererState,
    window: &'a mut Window,
}

impl FrameOps for FrameDriver<'_> {
    fn wait_for_slot(&mut self, slot: usize) -> VulkanResult<()> {
        self.state.frame_sync[slot].in_flight.wait(u64::MAX)
    }

    fn acquire_image(&mut self, slot: usize) -> VulkanResult<AcquireOutcome> {
        let semaphore = self.state.frame_sync[slot].image_available.handle();
        let outcome = frame_loop::classify_acquire(self.state.swapchain.acquire_next_image(semaphore))?;
        if outcome == AcquireOutcome::OutOfDate {
            log::debug!("Swapchain out of date during acquire");
        }
        Ok(outcome)
    }

    fn update_uniforms(&mut self, slot: usize) -> VulkanResult<()> {
        let ubo = UniformBufferObject::animated(
            self.state.clock.elapsed(),
            self.state.swapchain_extent(),
            &self.state.camera,
        );
        self.state.resources.write_uniforms(slot, &ubo);
        Ok(())
    }

    fn reset_fence(&mut self, slot: usize) -> VulkanResult<()> {
        self.state.frame_sync[slot].in_flight.reset()
    }

    fn record_commands(&mut self, slot: usize, image_index: u32) -> VulkanResult<()> {
        let state = &mut *self.state;
        let extent = state.swapchain.extent();
        let framebuffer = state.swapchain.framebuffer(image_index)?;

        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue { float32: CLEAR_COLOR },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            },
        ];
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };

        let recorder = &mut state.command_recorders[slot];
        recorder.reset()?;
        recorder.begin(vk::CommandBufferUsageFlags::empty())?;
        {
            let mut pass = recorder.begin_render_pass(state.render_pass.handle(), framebuffer, render_area, &clear_values)?;
            pass.cmd_bind_pipeline(state.pipeline.handle());
            pass.cmd_bind_vertex_buffers(0, &[state.resources.vertex_buffer()], &[0]);
            pass.cmd_bind_index_buffer(state.resources.index_buffer(), 0, vk::IndexType::UINT32);
            pass.set_viewport(&viewport);
            pass.set_scissor(&render_area);
            pass.cmd_bind_descriptor_sets(state.pipeline.layout(), 0, &[state.resources.descriptor_set(slot)]);
            pass.cmd_draw_indexed(state.resources.index_count(), 1, 0, 0, 0);
        }
        recorder.end()?;
        Ok(())
    }

    fn submit(&mut self, slot: usize) -> VulkanResult<()> {
        let sync = &self.state.frame_sync[slot];

        let wait_semaphores = [sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [self.state.command_recorders[slot].handle()];
        let signal_semaphores = [sync.render_finished.handle()];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        let device = &self.state.context.device().device;
        unsafe {
            device
                .queue_submit(
                    self.state.context.graphics_queue(),
                    &[submit_info.build()],
                    sync.in_flight.handle(),
                )
                .map_err(VulkanError::Api)
        }
    }

    fn present(&mut self, slot: usize, image_index: u32) -> VulkanResult<PresentStatus> {
        let wait_semaphore = self.state.frame_sync[slot].render_finished.handle();
        let result = self
            .state
            .swapchain
            .present(self.state.context.present_queue(), image_index, wait_semaphore);
        frame_loop::classify_present(result)
    }

    fn take_resize_flag(&mut self) -> bool {
        self.window.take_framebuffer_resized()
    }

    fn recreate_swapchain(&mut self) -> VulkanResult<()> {
        let size = self.window.wait_while_minimized();
        if size.0 == 0 || size.1 == 0 {
            // Closed while minimized; the main loop exits next iteration
            return Ok(());
        }

        self.state.context.wait_idle()?;
        let render_pass = self.state.render_pass.handle();
        self.state.swapchain.recreate(&self.state.context, render_pass, size)
    }
}

impl RendererState {
    fn swapchain_extent(&self) -> (u32, u32) {
        let extent = self.swapchain.extent();
        (extent.width, extent.height)
    }
}
