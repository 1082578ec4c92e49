use std::ffi::{CStr, CString, c_char, c_void};

use anyhow::Context;
use ash::{Entry, ext::debug_utils, vk};

const VALIDATION_LAYERS: [&str; 1] = ["VK_LAYER_KHRONOS_validation"];

unsafe extern "system" fn vulkan_debug_callback(
    flag: vk::DebugUtilsMessageSeverityFlagsEXT,
    typ: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _: *mut c_void,
) -> vk::Bool32 {
    unsafe {
        use vk::DebugUtilsMessageSeverityFlagsEXT as Flag;

        if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
            return vk::FALSE;
        }
        let message = CStr::from_ptr((*p_callback_data).p_message).to_string_lossy();
        match flag {
            Flag::VERBOSE => log::debug!("{:?} - {}", typ, message),
            Flag::INFO => log::info!("{:?} - {}", typ, message),
            Flag::WARNING => log::warn!("{:?} - {}", typ, message),
            _ => log::error!("{:?} - {}", typ, message),
        }
        vk::FALSE
    }
}

pub fn get_layer_names_and_pointers() -> (Vec<CString>, Vec<*const c_char>) {
    let layer_names = VALIDATION_LAYERS
        .iter()
        .filter_map(|&name| match CString::new(name) {
            Ok(cstr) => Some(cstr),
            Err(_) => {
                log::warn!("skipping invalid vulkan layer name: {name}");
                None
            }
        })
        .collect::<Vec<_>>();
    let layer_names_ptrs = layer_names
        .iter()
        .map(|name| name.as_ptr())
        .collect::<Vec<_>>();
    (layer_names, layer_names_ptrs)
}

/// Returns false, with a warning, when any validation layer is missing.
pub fn validation_layers_available(entry: &Entry) -> anyhow::Result<bool> {
    let supported_layers = unsafe {
        entry
            .enumerate_instance_layer_properties()
            .context("failed to enumerate Vulkan instance layer properties")?
    };
    for required in VALIDATION_LAYERS.iter() {
        let found = supported_layers.iter().any(|layer| {
            layer
                .layer_name_as_c_str()
                .is_ok_and(|name| name.to_bytes() == required.as_bytes())
        });

        if !found {
            log::warn!("Validation layer not supported: {required}, continuing without it");
            return Ok(false);
        }
    }
    Ok(true)
}

pub fn setup_debug_messenger(
    entry: &Entry,
    instance: &ash::Instance,
) -> Option<(debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
    let create_info = create_debug_create_info();
    let debug_utils = debug_utils::Instance::new(entry, instance);
    let debug_utils_messenger = unsafe {
        match debug_utils.create_debug_utils_messenger(&create_info, None) {
            Ok(m) => m,
            Err(e) => {
                log::warn!("failed to create debug_utils_messenger: {:?}", e);
                return None;
            }
        }
    };

    Some((debug_utils, debug_utils_messenger))
}

pub fn create_debug_create_info() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .flags(vk::DebugUtilsMessengerCreateFlagsEXT::empty())
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(vulkan_debug_callback))
}
