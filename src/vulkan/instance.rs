use std::ffi::CString;

use anyhow::Context;
use ash::{ext::debug_utils, vk};

use super::debug::{create_debug_create_info, get_layer_names_and_pointers, validation_layers_available};

/// Creates an instance without any surface extensions.
///
/// Returns the instance and whether validation ended up enabled.
pub fn create_instance(
    entry: &ash::Entry,
    application_name: &str,
    api_version: u32,
    validation: bool,
) -> anyhow::Result<(ash::Instance, bool)> {
    let validation = validation
        && validation_layers_available(entry)
            .context("failed to check validation layer support")?;

    let app_name = CString::new(application_name).context("application name contains a nul byte")?;
    let engine_name = CString::new("vibwa")?;

    let app_info = vk::ApplicationInfo::default()
        .api_version(api_version)
        .application_name(app_name.as_c_str())
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(engine_name.as_c_str())
        .engine_version(vk::make_api_version(0, 0, 1, 0));

    let mut extension_names = Vec::new();
    if validation {
        extension_names.push(debug_utils::NAME.as_ptr());
    }
    let create_flags = if cfg!(any(target_os = "macos", target_os = "ios")) {
        extension_names.push(ash::khr::portability_enumeration::NAME.as_ptr());
        vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR
    } else {
        vk::InstanceCreateFlags::default()
    };

    let (_layer_names, layer_names_ptrs) = get_layer_names_and_pointers();

    let mut debug_create_info = create_debug_create_info();
    let mut instance_create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&extension_names)
        .flags(create_flags);
    if validation {
        instance_create_info = instance_create_info
            .enabled_layer_names(&layer_names_ptrs)
            .push_next(&mut debug_create_info);
    }

    let instance = unsafe {
        entry
            .create_instance(&instance_create_info, None)
            .context("failed to create ash::Instance")?
    };
    log::trace!(
        "Created instance (api {}, validation {})",
        version_to_string(api_version),
        validation
    );

    Ok((instance, validation))
}

pub fn version_to_string(version: u32) -> String {
    format!(
        "{}.{}.{}",
        vk::api_version_major(version),
        vk::api_version_minor(version),
        vk::api_version_patch(version)
    )
}
