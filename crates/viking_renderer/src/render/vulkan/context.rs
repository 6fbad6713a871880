//! Vulkan context management
//!
//! Instance creation with optional validation, physical device selection,
//! queue family resolution and logical device creation. Everything here
//! lives for the whole process; the swapchain and per-frame state are owned
//! by the renderer and must be dropped before the context.

use std::collections::BTreeSet;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device, Entry, Instance};
use thiserror::Error;

use super::surface::{Surface, SwapchainSupport};
use super::window::{Window, WindowError};
use crate::assets::AssetError;
use crate::core::VulkanRendererConfig;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";
const ENGINE_NAME: &CStr = c"Viking Renderer";

/// Depth formats in order of preference
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// Instance extensions requested by the window system are unavailable
    #[error("Required instance extensions not available: {}", .0.join(", "))]
    MissingExtensions(Vec<String>),

    /// Requested validation layers are unavailable
    #[error("Requested validation layers not available: {}", .0.join(", "))]
    MissingLayers(Vec<String>),

    /// No physical device supports Vulkan
    #[error("Failed to find GPUs with Vulkan support")]
    NoPhysicalDevice,

    /// Devices exist but none meets the renderer's requirements
    #[error("No suitable physical device found")]
    NoSuitablePhysicalDevice,

    /// A required queue family was missing at logical device creation
    #[error("Failed to find required queue families: {0:?}")]
    IncompleteQueueFamilies(QueueFamilyIndices),

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// None of the depth format candidates can be a depth attachment
    #[error("No supported depth attachment format")]
    NoSupportedDepthFormat,

    /// Image layout transition outside the supported table
    #[error("Unsupported image layout transition: {old:?} -> {new:?}")]
    UnsupportedLayoutTransition {
        /// Current layout
        old: vk::ImageLayout,
        /// Requested layout
        new: vk::ImageLayout,
    },

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// Asset loading failed
    #[error(transparent)]
    Asset(#[from] AssetError),

    /// Windowing failed
    #[error(transparent)]
    Window(#[from] WindowError),
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Queue family indices as discovered on a physical device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// First family with graphics support
    pub graphics: Option<u32>,
    /// First family able to present to the surface
    pub present: Option<u32>,
    /// A transfer-only family if one exists, otherwise the graphics family
    pub transfer: Option<u32>,
}

impl QueueFamilyIndices {
    /// Scan queue families; `supports_present` answers surface support per family
    pub fn find<F>(families: &[vk::QueueFamilyProperties], mut supports_present: F) -> VulkanResult<Self>
    where
        F: FnMut(u32) -> VulkanResult<bool>,
    {
        let mut indices = Self::default();

        for (index, family) in families.iter().enumerate() {
            let index = index as u32;
            let graphics = family.queue_flags.contains(vk::QueueFlags::GRAPHICS);

            if graphics && indices.graphics.is_none() {
                indices.graphics = Some(index);
            }
            if indices.present.is_none() && supports_present(index)? {
                indices.present = Some(index);
            }
            if !graphics && family.queue_flags.contains(vk::QueueFlags::TRANSFER) {
                indices.transfer = Some(index);
            }
        }

        // Graphics families always accept transfer work
        if indices.transfer.is_none() {
            indices.transfer = indices.graphics;
        }

        Ok(indices)
    }

    /// Whether all three families were found
    pub fn is_complete(&self) -> bool {
        self.resolve().is_some()
    }

    /// Resolved indices, if complete
    pub fn resolve(&self) -> Option<QueueFamilies> {
        Some(QueueFamilies {
            graphics: self.graphics?,
            present: self.present?,
            transfer: self.transfer?,
        })
    }
}

/// Complete set of queue family indices used by the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    /// Graphics family
    pub graphics: u32,
    /// Presentation family
    pub present: u32,
    /// Transfer family
    pub transfer: u32,
}

impl QueueFamilies {
    /// Distinct families, ascending
    pub fn unique(&self) -> Vec<u32> {
        distinct(&[self.graphics, self.present, self.transfer])
    }

    /// Families sharing uploaded resources
    pub fn graphics_and_transfer(&self) -> Vec<u32> {
        distinct(&[self.graphics, self.transfer])
    }

    /// Families sharing swapchain images
    pub fn graphics_and_present(&self) -> Vec<u32> {
        distinct(&[self.graphics, self.present])
    }
}

fn distinct(families: &[u32]) -> Vec<u32> {
    families.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
}

/// What a physical device offers, reduced to the renderer's requirements
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceSuitability {
    /// Queue families found on the device
    pub queue_families: QueueFamilyIndices,
    /// `VK_KHR_swapchain` is supported
    pub swapchain_extension: bool,
    /// Number of surface formats reported
    pub surface_formats: usize,
    /// Number of present modes reported
    pub present_modes: usize,
    /// `samplerAnisotropy` feature is supported
    pub sampler_anisotropy: bool,
}

impl DeviceSuitability {
    /// Whether the device can run the renderer
    pub fn is_suitable(&self) -> bool {
        self.queue_families.is_complete()
            && self.swapchain_extension
            && self.surface_formats > 0
            && self.present_modes > 0
            && self.sampler_anisotropy
    }
}

/// Choose among suitable devices in enumeration order.
///
/// The first discrete GPU wins; without one, the last candidate is used.
pub fn pick_preferred_device<T>(candidates: impl IntoIterator<Item = (T, vk::PhysicalDeviceType)>) -> Option<T> {
    let mut chosen = None;
    for (device, device_type) in candidates {
        chosen = Some(device);
        if device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
            break;
        }
    }
    chosen
}

/// First candidate format accepted by `supports_depth_attachment`
pub fn choose_depth_format<F>(candidates: &[vk::Format], mut supports_depth_attachment: F) -> VulkanResult<vk::Format>
where
    F: FnMut(vk::Format) -> bool,
{
    candidates
        .iter()
        .copied()
        .find(|&format| supports_depth_attachment(format))
        .ok_or(VulkanError::NoSupportedDepthFormat)
}

/// Names from `required` that do not appear in `available`
pub fn missing_names(required: &[CString], available: &[String]) -> Vec<String> {
    required
        .iter()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !available.iter().any(|a| a == name))
        .collect()
}

/// Decode a fixed-size, nul-terminated name array from a Vulkan struct
pub fn name_from_chars(chars: &[c_char]) -> String {
    let bytes: Vec<u8> = chars.iter().take_while(|&&c| c != 0).map(|&c| c as u8).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

struct DebugMessenger {
    loader: DebugUtils,
    messenger: vk::DebugUtilsMessengerEXT,
}

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    debug: Option<DebugMessenger>,
}

impl VulkanInstance {
    /// Create a Vulkan instance with the window-required extensions
    pub fn new(required_extensions: &[String], app_name: &str, enable_validation: bool) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to load Vulkan: {e}")))?;

        let mut extensions = required_extensions
            .iter()
            .map(|ext| CString::new(ext.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| VulkanError::InitializationFailed(format!("Invalid extension name: {e}")))?;
        if enable_validation {
            extensions.push(DebugUtils::name().to_owned());
        }

        let available_extensions: Vec<String> = entry
            .enumerate_instance_extension_properties(None)
            .map_err(VulkanError::Api)?
            .iter()
            .map(|props| name_from_chars(&props.extension_name))
            .collect();
        let missing = missing_names(&extensions, &available_extensions);
        if !missing.is_empty() {
            return Err(VulkanError::MissingExtensions(missing));
        }

        let layers = if enable_validation {
            vec![VALIDATION_LAYER.to_owned()]
        } else {
            Vec::new()
        };
        if !layers.is_empty() {
            let available_layers: Vec<String> = entry
                .enumerate_instance_layer_properties()
                .map_err(VulkanError::Api)?
                .iter()
                .map(|props| name_from_chars(&props.layer_name))
                .collect();
            let missing = missing_names(&layers, &available_layers);
            if !missing.is_empty() {
                return Err(VulkanError::MissingLayers(missing));
            }
        }

        let app_name_cstr = CString::new(app_name)
            .map_err(|e| VulkanError::InitializationFailed(format!("Invalid application name: {e}")))?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(ENGINE_NAME)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_3);

        let extension_ptrs: Vec<*const c_char> = extensions.iter().map(|ext| ext.as_ptr()).collect();
        let layer_ptrs: Vec<*const c_char> = layers.iter().map(|layer| layer.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs);

        let instance = unsafe { entry.create_instance(&create_info, None).map_err(VulkanError::Api)? };
        log::debug!(
            "Created Vulkan instance with {} extensions, validation {}",
            extensions.len(),
            if enable_validation { "on" } else { "off" }
        );

        let debug = if enable_validation {
            let loader = DebugUtils::new(&entry, &instance);
            match Self::setup_debug_messenger(&loader) {
                Ok(messenger) => Some(DebugMessenger { loader, messenger }),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        Ok(Self { entry, instance, debug })
    }

    fn setup_debug_messenger(debug_utils: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        unsafe {
            debug_utils
                .create_debug_utils_messenger(&create_info, None)
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some(debug) = self.debug.take() {
                debug.loader.destroy_debug_utils_messenger(debug.messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::trace!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

/// Selected physical device and the properties the renderer consults later
pub struct PhysicalDeviceInfo {
    /// Physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties, including limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory heaps and types
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Resolved queue families
    pub queue_families: QueueFamilies,
}

impl PhysicalDeviceInfo {
    /// Enumerate devices and pick the preferred suitable one
    pub fn select_suitable_device(instance: &Instance, surface: &Surface) -> VulkanResult<Self> {
        let devices = unsafe { instance.enumerate_physical_devices().map_err(VulkanError::Api)? };
        if devices.is_empty() {
            return Err(VulkanError::NoPhysicalDevice);
        }

        let mut suitable = Vec::new();
        for device in devices {
            let properties = unsafe { instance.get_physical_device_properties(device) };
            let name = name_from_chars(&properties.device_name);
            let suitability = Self::evaluate_device(instance, device, surface)?;

            if let Some(queue_families) = suitability.queue_families.resolve().filter(|_| suitability.is_suitable()) {
                log::debug!("Suitable GPU: {} ({:?})", name, properties.device_type);
                suitable.push((
                    Self {
                        device,
                        properties,
                        memory_properties: unsafe { instance.get_physical_device_memory_properties(device) },
                        queue_families,
                    },
                    properties.device_type,
                ));
            } else {
                log::debug!("Rejected GPU {}: {:?}", name, suitability);
            }
        }

        let chosen = pick_preferred_device(suitable).ok_or(VulkanError::NoSuitablePhysicalDevice)?;
        log::info!("Selected GPU: {} ({:?})", chosen.name(), chosen.properties.device_type);
        log::debug!(
            "Queue families: graphics={} present={} transfer={}",
            chosen.queue_families.graphics,
            chosen.queue_families.present,
            chosen.queue_families.transfer
        );
        Ok(chosen)
    }

    fn evaluate_device(
        instance: &Instance,
        device: vk::PhysicalDevice,
        surface: &Surface,
    ) -> VulkanResult<DeviceSuitability> {
        let features = unsafe { instance.get_physical_device_features(device) };
        let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
        let queue_families = QueueFamilyIndices::find(&families, |index| surface.supports_present(device, index))?;

        let extensions: Vec<String> = unsafe {
            instance
                .enumerate_device_extension_properties(device)
                .map_err(VulkanError::Api)?
        }
        .iter()
        .map(|props| name_from_chars(&props.extension_name))
        .collect();
        let swapchain_extension = missing_names(&[SwapchainLoader::name().to_owned()], &extensions).is_empty();

        let mut suitability = DeviceSuitability {
            queue_families,
            swapchain_extension,
            sampler_anisotropy: features.sampler_anisotropy == vk::TRUE,
            ..Default::default()
        };

        // Surface queries are only valid once the swapchain extension is known to exist
        if swapchain_extension {
            let support = SwapchainSupport::query(surface, device)?;
            suitability.surface_formats = support.formats.len();
            suitability.present_modes = support.present_modes.len();
        }

        Ok(suitability)
    }

    /// Device name as reported by the driver
    pub fn name(&self) -> String {
        name_from_chars(&self.properties.device_name)
    }

    /// Maximum sampler anisotropy supported by the device
    pub fn max_sampler_anisotropy(&self) -> f32 {
        self.properties.limits.max_sampler_anisotropy
    }
}

/// Logical device with its three queues
pub struct LogicalDevice {
    /// Logical device handle
    pub device: Device,
    /// Graphics queue
    pub graphics_queue: vk::Queue,
    /// Presentation queue
    pub present_queue: vk::Queue,
    /// Transfer queue
    pub transfer_queue: vk::Queue,
    /// Swapchain extension loader
    pub swapchain_loader: SwapchainLoader,
}

impl LogicalDevice {
    /// Create the logical device with one queue per distinct family
    pub fn new(instance: &Instance, physical_device_info: &PhysicalDeviceInfo) -> VulkanResult<Self> {
        let families = physical_device_info.queue_families;
        let priorities = [1.0_f32];

        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = families
            .unique()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let required_extensions = [SwapchainLoader::name().as_ptr()];

        let device_features = vk::PhysicalDeviceFeatures::builder().sampler_anisotropy(true).build();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions)
            .enabled_features(&device_features);

        let device = unsafe {
            instance
                .create_device(physical_device_info.device, &create_info, None)
                .map_err(VulkanError::Api)?
        };

        let graphics_queue = unsafe { device.get_device_queue(families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(families.present, 0) };
        let transfer_queue = unsafe { device.get_device_queue(families.transfer, 0) };

        let swapchain_loader = SwapchainLoader::new(instance, &device);
        log::debug!("Created logical device with {} queue families", queue_infos.len());

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            transfer_queue,
            swapchain_loader,
        })
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}

/// Process-lifetime Vulkan state
///
/// Fields drop in declaration order: device, then surface, then instance.
pub struct VulkanContext {
    device: LogicalDevice,
    surface: Surface,
    physical_device: PhysicalDeviceInfo,
    depth_format: vk::Format,
    instance: VulkanInstance,
}

impl VulkanContext {
    /// Bring up instance, surface and devices for `window`
    pub fn new(window: &mut Window, config: &VulkanRendererConfig) -> VulkanResult<Self> {
        let required_extensions = window.required_instance_extensions()?;
        let instance = VulkanInstance::new(
            &required_extensions,
            &config.application_name,
            config.validation_enabled(),
        )?;

        let surface = Surface::new(&instance, window)?;
        let physical_device = PhysicalDeviceInfo::select_suitable_device(&instance.instance, &surface)?;

        let depth_format = choose_depth_format(&DEPTH_FORMAT_CANDIDATES, |format| {
            let props = unsafe {
                instance
                    .instance
                    .get_physical_device_format_properties(physical_device.device, format)
            };
            props
                .optimal_tiling_features
                .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        })?;
        log::debug!("Depth format: {:?}", depth_format);

        let device = LogicalDevice::new(&instance.instance, &physical_device)?;

        Ok(Self {
            device,
            surface,
            physical_device,
            depth_format,
            instance,
        })
    }

    /// Get a reference to the Vulkan instance
    pub fn instance(&self) -> &Instance {
        &self.instance.instance
    }

    /// Get the presentation surface
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Get the physical device info
    pub fn physical_device(&self) -> &PhysicalDeviceInfo {
        &self.physical_device
    }

    /// Resolved queue families
    pub fn queue_families(&self) -> QueueFamilies {
        self.physical_device.queue_families
    }

    /// Get the logical device
    pub fn device(&self) -> &LogicalDevice {
        &self.device
    }

    /// Get the raw Device handle
    pub fn raw_device(&self) -> Device {
        self.device.device.clone()
    }

    /// Get the swapchain loader
    pub fn swapchain_loader(&self) -> &SwapchainLoader {
        &self.device.swapchain_loader
    }

    /// Get the graphics queue
    pub fn graphics_queue(&self) -> vk::Queue {
        self.device.graphics_queue
    }

    /// Get the present queue
    pub fn present_queue(&self) -> vk::Queue {
        self.device.present_queue
    }

    /// Get the transfer queue
    pub fn transfer_queue(&self) -> vk::Queue {
        self.device.transfer_queue
    }

    /// Depth attachment format chosen for this device
    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    /// Current surface capabilities, formats and present modes
    pub fn swapchain_support(&self) -> VulkanResult<SwapchainSupport> {
        SwapchainSupport::query(&self.surface, self.physical_device.device)
    }

    /// Block until the device has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device.device_wait_idle().map_err(VulkanError::Api) }
    }
}
